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

use crate::app::ReadingOptions::FILE_OFFSET_AND_LEN;
use crate::app::{
    PartitionedUId, PurgeDataContext, ReadingIndexViewContext, ReadingViewContext,
    RegisterAppContext, RegisterShuffleContext, WritingViewContext, SHUFFLE_SERVER_ID,
};
use crate::config::{RemoteStoreConfig, StorageType};
use crate::error::WorkerError;
use crate::lazy_initializer::LazyInit;
use crate::runtime::manager::RuntimeManager;
use crate::store::hadoop::{get_remote_delegator, RemoteStorageDelegator};
use crate::store::spill::SpillWritingViewContext;
use crate::store::{
    Block, LocalDataIndex, PartitionedLocalData, Persistent, PersistentStore, ResponseData,
    ResponseDataIndex, Store,
};
use anyhow::Result;
use async_trait::async_trait;
use dashmap::DashMap;
use ferry_core::common::PartitionRange;
use log::{info, warn};
use std::any::Any;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::AtomicI64;
use std::sync::atomic::Ordering::SeqCst;
use std::sync::Arc;
use tokio::sync::{Mutex, Semaphore};

struct WritingHandler {
    data_len: AtomicI64,
    dir_created: AtomicBool,
}

impl Default for WritingHandler {
    fn default() -> Self {
        Self {
            data_len: AtomicI64::new(0),
            dir_created: AtomicBool::new(false),
        }
    }
}

/// The cold tier. One delegator per app bound to the remote root the
/// coordinator assigned; files carry this server's id so that replicas
/// sharing the root never collide.
pub struct HdfsStore {
    concurrency_access_limiter: Semaphore,

    // key: app_id
    app_remote_clients: DashMap<String, Arc<LazyInit<Box<dyn RemoteStorageDelegator>>>>,

    // key: data_file_path
    partition_file_locks: DashMap<String, Arc<Mutex<()>>>,
    partition_cached_meta: DashMap<String, WritingHandler>,

    // key: (app_id, shuffle_id)
    shuffle_ranges: DashMap<(String, i32), Vec<PartitionRange>>,

    health: AtomicBool,

    #[allow(dead_code)]
    runtime_manager: RuntimeManager,
}

impl Persistent for HdfsStore {}

impl PersistentStore for HdfsStore {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl HdfsStore {
    pub fn from(conf: RemoteStoreConfig, runtime_manager: &RuntimeManager) -> Self {
        HdfsStore {
            concurrency_access_limiter: Semaphore::new(conf.max_concurrency),
            app_remote_clients: Default::default(),
            partition_file_locks: Default::default(),
            partition_cached_meta: Default::default(),
            shuffle_ranges: Default::default(),
            health: AtomicBool::new(true),
            runtime_manager: runtime_manager.clone(),
        }
    }

    fn get_app_dir(app_id: &str) -> String {
        format!("{}", app_id)
    }

    fn get_shuffle_dir(app_id: &str, shuffle_id: i32) -> String {
        format!("{}/{}", app_id, shuffle_id)
    }

    fn resolve_range(&self, uid: &PartitionedUId) -> PartitionRange {
        if let Some(ranges) = self
            .shuffle_ranges
            .get(&(uid.app_id.to_owned(), uid.shuffle_id))
        {
            for range in ranges.iter() {
                if range.contains(uid.partition_id) {
                    return *range;
                }
            }
        }
        PartitionRange::new(uid.partition_id, uid.partition_id + 1)
    }

    fn get_file_path_by_uid(&self, uid: &PartitionedUId) -> (String, String) {
        let range = self.resolve_range(uid);
        let server_id = SHUFFLE_SERVER_ID
            .get()
            .map(|id| id.to_string())
            .unwrap_or_else(|| "default".to_string());
        (
            format!(
                "{}/{}/{}/{}-{}.data",
                uid.app_id, uid.shuffle_id, range, uid.partition_id, server_id
            ),
            format!(
                "{}/{}/{}/{}-{}.index",
                uid.app_id, uid.shuffle_id, range, uid.partition_id, server_id
            ),
        )
    }

    fn delegator_of(
        &self,
        app_id: &str,
    ) -> Result<Arc<LazyInit<Box<dyn RemoteStorageDelegator>>>, WorkerError> {
        self.app_remote_clients
            .get(app_id)
            .map(|entry| entry.clone())
            .ok_or_else(|| WorkerError::REMOTE_STORAGE_NOT_REGISTERED(app_id.to_string()))
    }

    // only for tests
    pub fn with_delegator(
        &self,
        app_id: &str,
        delegator: Arc<LazyInit<Box<dyn RemoteStorageDelegator>>>,
    ) {
        self.app_remote_clients
            .insert(app_id.to_string(), delegator);
    }

    async fn data_insert(
        &self,
        uid: PartitionedUId,
        data_blocks: Vec<&Block>,
    ) -> Result<(), WorkerError> {
        if !self.health.load(SeqCst) {
            return Err(WorkerError::REMOTE_STORAGE_UNHEALTHY);
        }

        let _permit = self.concurrency_access_limiter.acquire().await?;

        let (data_file_path, index_file_path) = self.get_file_path_by_uid(&uid);

        let lock_cloned = self
            .partition_file_locks
            .entry(data_file_path.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let _locked = lock_cloned.lock().await;

        let fs_fork = self.delegator_of(&uid.app_id)?;
        let filesystem = fs_fork.get_or_init();

        if !self.partition_cached_meta.contains_key(&data_file_path) {
            self.partition_cached_meta
                .insert(data_file_path.clone(), Default::default());
        }
        // snapshot the meta without holding the map entry across awaits
        let (next_offset, dir_created) = {
            let meta = self
                .partition_cached_meta
                .get(&data_file_path)
                .ok_or(WorkerError::APP_HAS_BEEN_PURGED)?;
            (meta.data_len.load(SeqCst), meta.dir_created.load(SeqCst))
        };

        if !dir_created {
            if let Some(parent) = std::path::Path::new(&data_file_path).parent() {
                filesystem
                    .create_dir(&format!("{}/", parent.to_str().unwrap()))
                    .await?;
            }
            if let Some(meta) = self.partition_cached_meta.get(&data_file_path) {
                meta.dir_created.store(true, SeqCst);
            }
        }

        let shuffle_file_format = self.create_shuffle_format(data_blocks, next_offset)?;

        filesystem
            .append(&data_file_path, shuffle_file_format.data)
            .await?;
        filesystem
            .append(&index_file_path, shuffle_file_format.index)
            .await?;

        let meta = self
            .partition_cached_meta
            .get(&data_file_path)
            .ok_or(WorkerError::APP_HAS_BEEN_PURGED)?;
        meta.data_len.store(shuffle_file_format.offset, SeqCst);
        Ok(())
    }
}

#[async_trait]
impl Store for HdfsStore {
    fn start(self: Arc<Self>) {
        info!("There is nothing to do in the remote store");
    }

    async fn insert(&self, ctx: WritingViewContext) -> Result<(), WorkerError> {
        let uid = ctx.uid;
        let blocks: Vec<&Block> = ctx.data_blocks.iter().collect();
        self.data_insert(uid, blocks).await
    }

    async fn get(&self, ctx: ReadingViewContext) -> Result<ResponseData, WorkerError> {
        let uid = ctx.uid;
        let FILE_OFFSET_AND_LEN(offset, len) = ctx.reading_options;

        let (data_file_path, _) = self.get_file_path_by_uid(&uid);
        let fs_fork = self.delegator_of(&uid.app_id)?;
        let filesystem = fs_fork.get_or_init();

        let data = filesystem
            .read(&data_file_path, offset, Some(len))
            .await?;
        Ok(ResponseData::Local(PartitionedLocalData { data }))
    }

    async fn get_index(
        &self,
        ctx: ReadingIndexViewContext,
    ) -> Result<ResponseDataIndex, WorkerError> {
        let uid = &ctx.partition_id;
        let (data_file_path, index_file_path) = self.get_file_path_by_uid(uid);

        let data_file_len = match self.partition_cached_meta.get(&data_file_path) {
            Some(meta) => meta.data_len.load(SeqCst),
            _ => {
                return Ok(ResponseDataIndex::Local(LocalDataIndex::default()));
            }
        };

        let fs_fork = self.delegator_of(&uid.app_id)?;
        let filesystem = fs_fork.get_or_init();
        let index_data = filesystem.read(&index_file_path, 0, None).await?;

        Ok(ResponseDataIndex::Local(LocalDataIndex {
            index_data,
            data_file_len,
        }))
    }

    async fn purge(&self, ctx: &PurgeDataContext) -> Result<i64> {
        let (app_id, shuffle_id_option) = ctx.extract();

        let fs_option = match shuffle_id_option {
            // app level deletion drops the client as well
            None => self.app_remote_clients.remove(&app_id).map(|kv| kv.1),
            _ => self.app_remote_clients.get(&app_id).map(|kv| kv.clone()),
        };
        let fs = match fs_option {
            Some(fs) => fs,
            _ => {
                warn!("The app has been purged. app_id: {}", &app_id);
                return Ok(0);
            }
        };

        let dir = match shuffle_id_option {
            Some(shuffle_id) => HdfsStore::get_shuffle_dir(app_id.as_str(), shuffle_id),
            _ => HdfsStore::get_app_dir(app_id.as_str()),
        };

        let prefix = format!("{}/", &dir);
        let keys_to_delete: Vec<_> = self
            .partition_file_locks
            .iter()
            .filter(|entry| entry.key().starts_with(&prefix))
            .map(|entry| entry.key().to_string())
            .collect();

        let mut removed_size = 0i64;
        for deleted_key in &keys_to_delete {
            self.partition_file_locks.remove(deleted_key);
            if let Some(meta) = self.partition_cached_meta.remove(deleted_key) {
                removed_size += meta.1.data_len.load(SeqCst);
            }
        }

        if shuffle_id_option.is_none() {
            self.shuffle_ranges
                .retain(|(key_app, _), _| key_app != &app_id);
        } else {
            self.shuffle_ranges
                .remove(&(app_id.clone(), shuffle_id_option.unwrap()));
        }

        if fs.is_initialized() {
            fs.get_or_init().delete_dir(dir.as_str()).await?;
        }

        Ok(removed_size)
    }

    async fn is_healthy(&self) -> Result<bool> {
        Ok(self.health.load(SeqCst))
    }

    fn register_app(&self, ctx: RegisterAppContext) -> Result<()> {
        let remote_storage = match ctx.remote_storage {
            Some(remote_storage) if !remote_storage.is_empty() => remote_storage,
            _ => return Ok(()),
        };

        let app_id = ctx.app_id.clone();
        self.app_remote_clients.entry(app_id).or_insert_with(|| {
            Arc::new(LazyInit::new(move || {
                get_remote_delegator(remote_storage.path.as_str(), remote_storage.conf_overrides)
                    .expect("Errors on getting the remote storage delegator")
            }))
        });
        Ok(())
    }

    fn register_shuffle(&self, ctx: RegisterShuffleContext) -> Result<()> {
        self.shuffle_ranges.insert(
            (ctx.app_id.clone(), ctx.shuffle_id),
            ctx.partition_ranges.clone(),
        );
        Ok(())
    }

    async fn name(&self) -> StorageType {
        StorageType::HDFS
    }

    async fn spill_insert(&self, ctx: SpillWritingViewContext) -> Result<(), WorkerError> {
        let uid = ctx.uid;
        let mut data: Vec<&Block> = ctx.data_blocks.iter().collect();
        data.sort_by_key(|block| block.task_attempt_id);
        self.data_insert(uid, data).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::hadoop::LocalFsDelegator;
    use bytes::Bytes;

    fn localfs_backed_store(temp_path: String) -> (HdfsStore, String) {
        let runtime_manager = RuntimeManager::default();
        let store = HdfsStore::from(RemoteStoreConfig::default(), &runtime_manager);

        let app_id = "hdfs_store_test_app";
        let root = temp_path.clone();
        store.with_delegator(
            app_id,
            Arc::new(LazyInit::new(move || {
                let delegator: Box<dyn RemoteStorageDelegator> =
                    Box::new(LocalFsDelegator::new(root));
                delegator
            })),
        );
        (store, app_id.to_string())
    }

    #[tokio::test]
    async fn append_and_read_test() -> anyhow::Result<()> {
        let temp_dir = tempdir::TempDir::new("hdfs_store_test").unwrap();
        let temp_path = temp_dir.path().to_str().unwrap().to_string();
        let (store, app_id) = localfs_backed_store(temp_path);

        let uid = PartitionedUId::from(app_id.clone(), 1, 1);
        let data = b"hello world";
        let ctx = WritingViewContext::new(
            uid.clone(),
            vec![
                Block {
                    block_id: 0,
                    length: data.len() as i32,
                    uncompress_length: data.len() as i32,
                    crc: 0,
                    task_attempt_id: 0,
                    data: Bytes::from_static(data),
                },
                Block {
                    block_id: 1,
                    length: data.len() as i32,
                    uncompress_length: data.len() as i32,
                    crc: 0,
                    task_attempt_id: 0,
                    data: Bytes::from_static(data),
                },
            ],
        );
        store.insert(ctx).await?;

        let index = store
            .get_index(ReadingIndexViewContext {
                partition_id: uid.clone(),
            })
            .await?;
        let ResponseDataIndex::Local(index) = index;
        assert_eq!(22, index.data_file_len);

        let read = store
            .get(ReadingViewContext {
                uid: uid.clone(),
                reading_options: FILE_OFFSET_AND_LEN(11, 11),
            })
            .await?;
        assert_eq!(Bytes::from_static(data), read.into_bytes());

        // purge at app level removes the delegator
        store
            .purge(&PurgeDataContext::new(
                &crate::app::PurgeReason::APP_LEVEL_EXPLICIT_UNREGISTER(app_id.clone()),
            ))
            .await?;
        assert_eq!(0, store.app_remote_clients.len());
        Ok(())
    }
}
