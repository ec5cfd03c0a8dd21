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

use crate::error::WorkerError;
use crate::store::hadoop::RemoteStorageDelegator;
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use bytes::Bytes;
use hdfs_native::{Client, WriteOptions};
use std::collections::HashMap;

/// Binding of the remote interface onto the pure-rust hdfs client.
pub struct HdfsNativeDelegator {
    client: Client,
    root: String,
}

impl HdfsNativeDelegator {
    pub fn new(root: &str, conf: HashMap<String, String>) -> Result<Self> {
        let url = url_parse(root)?;
        let client = Client::new_with_config(&url.0, conf)
            .map_err(|e| anyhow!("Errors on creating hdfs client: {}", e))?;
        Ok(Self {
            client,
            root: url.1,
        })
    }

    fn absolute(&self, path: &str) -> String {
        format!("{}/{}", &self.root, path)
    }
}

/// Split "hdfs://host:port/base/dir" into the namenode url and base dir.
fn url_parse(root: &str) -> Result<(String, String)> {
    let without_scheme = root
        .strip_prefix("hdfs://")
        .ok_or_else(|| anyhow!("Illegal hdfs url: {}", root))?;
    match without_scheme.find('/') {
        Some(idx) => {
            let (authority, base) = without_scheme.split_at(idx);
            Ok((
                format!("hdfs://{}", authority),
                base.trim_end_matches('/').to_string(),
            ))
        }
        _ => Ok((format!("hdfs://{}", without_scheme), "".to_string())),
    }
}

#[async_trait]
impl RemoteStorageDelegator for HdfsNativeDelegator {
    async fn create_dir(&self, dir: &str) -> Result<(), WorkerError> {
        self.client
            .mkdirs(&self.absolute(dir), 0o755, true)
            .await
            .map_err(|e| WorkerError::Other(anyhow!("Errors on creating dir: {}", e)))?;
        Ok(())
    }

    async fn append(&self, path: &str, data: Bytes) -> Result<(), WorkerError> {
        let abs_path = self.absolute(path);
        let mut writer = match self.client.append(&abs_path).await {
            Ok(writer) => writer,
            // first write creates the file
            Err(_) => self
                .client
                .create(&abs_path, WriteOptions::default())
                .await
                .map_err(|e| WorkerError::Other(anyhow!("Errors on creating file: {}", e)))?,
        };
        writer
            .write(data)
            .await
            .map_err(|e| WorkerError::Other(anyhow!("Errors on appending: {}", e)))?;
        writer
            .close()
            .await
            .map_err(|e| WorkerError::Other(anyhow!("Errors on closing writer: {}", e)))?;
        Ok(())
    }

    async fn read(
        &self,
        path: &str,
        offset: i64,
        length: Option<i64>,
    ) -> Result<Bytes, WorkerError> {
        let abs_path = self.absolute(path);
        let reader = self
            .client
            .read(&abs_path)
            .await
            .map_err(|e| WorkerError::Other(anyhow!("Errors on opening reader: {}", e)))?;
        let file_len = reader.file_length();
        let read_len = match length {
            Some(len) => len as usize,
            _ => file_len.saturating_sub(offset as usize),
        };
        let data = reader
            .read_range(offset as usize, read_len)
            .await
            .map_err(|e| WorkerError::Other(anyhow!("Errors on reading range: {}", e)))?;
        Ok(data)
    }

    async fn len(&self, path: &str) -> Result<u64, WorkerError> {
        let status = self
            .client
            .get_file_info(&self.absolute(path))
            .await
            .map_err(|e| WorkerError::Other(anyhow!("Errors on file status: {}", e)))?;
        Ok(status.length as u64)
    }

    async fn delete_dir(&self, dir: &str) -> Result<(), WorkerError> {
        self.client
            .delete(&self.absolute(dir), true)
            .await
            .map_err(|e| WorkerError::Other(anyhow!("Errors on deleting dir: {}", e)))?;
        Ok(())
    }

    fn root(&self) -> String {
        self.root.to_string()
    }
}

#[cfg(test)]
mod test {
    use super::url_parse;

    #[test]
    fn url_parse_test() {
        let (url, base) = url_parse("hdfs://rbf-1:19999/a/b").unwrap();
        assert_eq!("hdfs://rbf-1:19999", url);
        assert_eq!("/a/b", base);

        let (url, base) = url_parse("hdfs://rbf-1:19999").unwrap();
        assert_eq!("hdfs://rbf-1:19999", url);
        assert_eq!("", base);
    }
}
