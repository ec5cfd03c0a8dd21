// Licensed to the Apache Software Foundation (ASF) under one
// or more contributor license agreements.  See the NOTICE file
// distributed with this work for additional information
// regarding copyright ownership.  The ASF licenses this file
// to you under the Apache License, Version 2.0 (the
// "License"); you may not use this file except in compliance
// with the License.  You may obtain a copy of the License at
//
//   http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing,
// software distributed under the License is distributed on an
// "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied.  See the License for the
// specific language governing permissions and limitations
// under the License.

#[cfg(feature = "hdfs")]
mod hdfs_native;

use crate::error::WorkerError;
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use bytes::Bytes;
use std::collections::HashMap;
use std::path::Path;
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};

/// The named interface to the remote distributed filesystem. The cold
/// store only ever talks through this seam; concrete clients bind to it.
#[async_trait]
pub trait RemoteStorageDelegator: Send + Sync {
    async fn create_dir(&self, dir: &str) -> Result<(), WorkerError>;
    async fn append(&self, path: &str, data: Bytes) -> Result<(), WorkerError>;
    async fn read(&self, path: &str, offset: i64, length: Option<i64>)
        -> Result<Bytes, WorkerError>;
    async fn len(&self, path: &str) -> Result<u64, WorkerError>;
    async fn delete_dir(&self, dir: &str) -> Result<(), WorkerError>;
    fn root(&self) -> String;
}

/// Resolve the delegator for a remote storage root by scheme.
pub fn get_remote_delegator(
    root: &str,
    _conf: HashMap<String, String>,
) -> Result<Box<dyn RemoteStorageDelegator>> {
    if root.starts_with("hdfs://") {
        #[cfg(feature = "hdfs")]
        {
            return Ok(Box::new(hdfs_native::HdfsNativeDelegator::new(root, _conf)?));
        }
        #[cfg(not(feature = "hdfs"))]
        return Err(anyhow!(
            "The binary is not compiled with the hdfs feature, root: {}",
            root
        ));
    }

    let root = root.strip_prefix("file://").unwrap_or(root);
    Ok(Box::new(LocalFsDelegator {
        root: root.to_string(),
    }))
}

/// A plain-filesystem binding of the remote interface, used for
/// file:// roots and tests.
pub struct LocalFsDelegator {
    root: String,
}

impl LocalFsDelegator {
    pub fn new(root: String) -> Self {
        Self { root }
    }

    fn absolute(&self, path: &str) -> String {
        format!("{}/{}", &self.root, path)
    }
}

#[async_trait]
impl RemoteStorageDelegator for LocalFsDelegator {
    async fn create_dir(&self, dir: &str) -> Result<(), WorkerError> {
        tokio::fs::create_dir_all(self.absolute(dir)).await?;
        Ok(())
    }

    async fn append(&self, path: &str, data: Bytes) -> Result<(), WorkerError> {
        let abs_path = self.absolute(path);
        if let Some(parent) = Path::new(&abs_path).parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let mut file = tokio::fs::OpenOptions::new()
            .append(true)
            .create(true)
            .open(&abs_path)
            .await?;
        file.write_all(&data).await?;
        file.flush().await?;
        Ok(())
    }

    async fn read(
        &self,
        path: &str,
        offset: i64,
        length: Option<i64>,
    ) -> Result<Bytes, WorkerError> {
        let abs_path = self.absolute(path);
        let mut file = tokio::fs::File::open(&abs_path).await?;
        file.seek(std::io::SeekFrom::Start(offset as u64)).await?;
        let mut buffer = vec![];
        match length {
            Some(len) => {
                file.take(len as u64).read_to_end(&mut buffer).await?;
            }
            _ => {
                file.read_to_end(&mut buffer).await?;
            }
        }
        Ok(Bytes::from(buffer))
    }

    async fn len(&self, path: &str) -> Result<u64, WorkerError> {
        let meta = tokio::fs::metadata(self.absolute(path)).await?;
        Ok(meta.len())
    }

    async fn delete_dir(&self, dir: &str) -> Result<(), WorkerError> {
        let abs_dir = self.absolute(dir);
        if tokio::fs::try_exists(&abs_dir).await.unwrap_or(false) {
            tokio::fs::remove_dir_all(&abs_dir).await?;
        }
        Ok(())
    }

    fn root(&self) -> String {
        self.root.to_string()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[tokio::test]
    async fn localfs_delegator_roundtrip() -> anyhow::Result<()> {
        let temp_dir = tempdir::TempDir::new("localfs_delegator_test").unwrap();
        let root = temp_dir.path().to_str().unwrap().to_string();

        let delegator = get_remote_delegator(&format!("file://{}", &root), HashMap::new())?;
        delegator.create_dir("app/0/").await?;
        delegator
            .append("app/0/1.data", Bytes::from_static(b"hello"))
            .await?;
        delegator
            .append("app/0/1.data", Bytes::from_static(b" world"))
            .await?;

        assert_eq!(11, delegator.len("app/0/1.data").await?);
        assert_eq!(
            Bytes::from_static(b"hello world"),
            delegator.read("app/0/1.data", 0, None).await?
        );
        assert_eq!(
            Bytes::from_static(b"world"),
            delegator.read("app/0/1.data", 6, Some(5)).await?
        );

        delegator.delete_dir("app").await?;
        assert!(delegator.len("app/0/1.data").await.is_err());
        Ok(())
    }
}
