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
    RegisterAppContext, RegisterShuffleContext, WritingViewContext,
};
use crate::config::{LocalfileStoreConfig, StorageType};
use crate::error::WorkerError;
use crate::readable_size::ReadableSize;
use crate::runtime::manager::RuntimeManager;
use crate::store::spill::SpillWritingViewContext;
use crate::store::{
    Block, LocalDataIndex, PartitionedLocalData, Persistent, PersistentStore, ResponseData,
    ResponseDataIndex, Store,
};
use anyhow::Result;
use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;
use ferry_core::common::PartitionRange;
use log::{info, warn};
use std::any::Any;
use std::path::Path;
use std::str::FromStr;
use std::sync::atomic::Ordering::SeqCst;
use std::sync::atomic::{AtomicI64, AtomicU64};
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};
use tokio::sync::RwLock;

struct LockedObj {
    root: String,
    pointer: AtomicI64,
}

/// The warm tier: one append-mode data/index file pair per partition,
/// grouped beneath the partition-range directory of its shuffle.
pub struct LocalFileStore {
    data_paths: Vec<String>,
    disk_capacity: u64,
    disk_high_watermark: f32,
    used_bytes: AtomicU64,

    // key: relative data file path
    partition_locks: DashMap<String, Arc<RwLock<LockedObj>>>,
    // key: (app_id, shuffle_id)
    shuffle_ranges: DashMap<(String, i32), Vec<PartitionRange>>,

    runtime_manager: RuntimeManager,
}

impl Persistent for LocalFileStore {}

impl PersistentStore for LocalFileStore {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl LocalFileStore {
    // only for test cases
    pub fn new(data_paths: Vec<String>) -> Self {
        LocalFileStore {
            data_paths,
            disk_capacity: ReadableSize::gb(1024).as_bytes(),
            disk_high_watermark: 0.8,
            used_bytes: Default::default(),
            partition_locks: Default::default(),
            shuffle_ranges: Default::default(),
            runtime_manager: Default::default(),
        }
    }

    pub fn from(config: LocalfileStoreConfig, runtime_manager: RuntimeManager) -> Self {
        if config.data_paths.is_empty() {
            panic!("Must specify at least one local data path!");
        }
        info!(
            "Initializing localfile store with the disk paths: [{:?}]",
            &config.data_paths
        );
        LocalFileStore {
            data_paths: config.data_paths,
            disk_capacity: ReadableSize::from_str(&config.disk_capacity)
                .unwrap()
                .as_bytes(),
            disk_high_watermark: config.disk_high_watermark,
            used_bytes: Default::default(),
            partition_locks: Default::default(),
            shuffle_ranges: Default::default(),
            runtime_manager,
        }
    }

    pub fn used_ratio(&self) -> f32 {
        self.used_bytes.load(SeqCst) as f32 / self.disk_capacity.max(1) as f32
    }

    pub fn is_above_high_watermark(&self) -> bool {
        self.used_ratio() > self.disk_high_watermark
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

    fn gen_relative_path_for_app(app_id: &str) -> String {
        format!("{}", app_id)
    }

    fn gen_relative_path_for_shuffle(app_id: &str, shuffle_id: i32) -> String {
        format!("{}/{}", app_id, shuffle_id)
    }

    fn gen_relative_path_for_partition(
        uid: &PartitionedUId,
        range: &PartitionRange,
    ) -> (String, String) {
        (
            format!(
                "{}/{}/{}/{}.data",
                uid.app_id, uid.shuffle_id, range, uid.partition_id
            ),
            format!(
                "{}/{}/{}/{}.index",
                uid.app_id, uid.shuffle_id, range, uid.partition_id
            ),
        )
    }

    fn select_root(&self, uid: &PartitionedUId) -> &str {
        let hash_value = PartitionedUId::get_hash(uid);
        let index = (hash_value % self.data_paths.len() as u64) as usize;
        &self.data_paths[index]
    }

    async fn data_insert(
        &self,
        uid: PartitionedUId,
        blocks: Vec<&Block>,
    ) -> Result<(), WorkerError> {
        if self.is_above_high_watermark() {
            return Err(WorkerError::LOCAL_DISK_OVER_WATERMARK(format!(
                "used ratio: {}",
                self.used_ratio()
            )));
        }

        let range = self.resolve_range(&uid);
        let (data_file_path, index_file_path) =
            LocalFileStore::gen_relative_path_for_partition(&uid, &range);

        // the cached guard must be released before a vacant entry is filled
        let cached = self
            .partition_locks
            .get(&data_file_path)
            .map(|entry| entry.clone());
        let mut parent_dir_is_created = true;
        let locked_obj = match cached {
            Some(locked_obj) => locked_obj,
            _ => {
                parent_dir_is_created = false;
                let root = self.select_root(&uid).to_string();
                self.partition_locks
                    .entry(data_file_path.clone())
                    .or_insert_with(|| {
                        Arc::new(RwLock::new(LockedObj {
                            root,
                            pointer: Default::default(),
                        }))
                    })
                    .clone()
            }
        };

        let locked_obj = locked_obj.write().await;
        let root = &locked_obj.root;
        let next_offset = locked_obj.pointer.load(SeqCst);

        let abs_data_path = format!("{}/{}", root, &data_file_path);
        let abs_index_path = format!("{}/{}", root, &index_file_path);

        if !parent_dir_is_created {
            if let Some(parent) = Path::new(&abs_data_path).parent() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let shuffle_file_format = self.create_shuffle_format(blocks, next_offset)?;

        let mut data_file = tokio::fs::OpenOptions::new()
            .append(true)
            .create(true)
            .open(&abs_data_path)
            .await?;
        data_file.write_all(&shuffle_file_format.data).await?;
        data_file.flush().await?;

        let mut index_file = tokio::fs::OpenOptions::new()
            .append(true)
            .create(true)
            .open(&abs_index_path)
            .await?;
        index_file.write_all(&shuffle_file_format.index).await?;
        index_file.flush().await?;

        self.used_bytes
            .fetch_add(shuffle_file_format.len as u64, SeqCst);
        locked_obj.pointer.store(shuffle_file_format.offset, SeqCst);

        Ok(())
    }
}

#[async_trait]
impl Store for LocalFileStore {
    fn start(self: Arc<Self>) {
        // ignore
    }

    async fn insert(&self, ctx: WritingViewContext) -> Result<(), WorkerError> {
        if ctx.data_blocks.is_empty() {
            return Ok(());
        }
        let uid = ctx.uid;
        let blocks: Vec<&Block> = ctx.data_blocks.iter().collect();
        self.data_insert(uid, blocks).await
    }

    async fn get(&self, ctx: ReadingViewContext) -> Result<ResponseData, WorkerError> {
        let uid = ctx.uid;
        let FILE_OFFSET_AND_LEN(offset, len) = ctx.reading_options;

        if len == 0 {
            return Ok(ResponseData::Local(PartitionedLocalData {
                data: Default::default(),
            }));
        }

        let range = self.resolve_range(&uid);
        let (data_file_path, _) = LocalFileStore::gen_relative_path_for_partition(&uid, &range);

        let locked_obj = match self.partition_locks.get(&data_file_path) {
            Some(entry) => entry.clone(),
            _ => {
                warn!("There is no data in localfile store for [{:?}]", &uid);
                return Ok(ResponseData::Local(PartitionedLocalData {
                    data: Default::default(),
                }));
            }
        };

        let locked_obj = locked_obj.read().await;
        let abs_data_path = format!("{}/{}", &locked_obj.root, &data_file_path);

        let mut file = tokio::fs::File::open(&abs_data_path).await?;
        file.seek(std::io::SeekFrom::Start(offset as u64)).await?;
        let mut buffer = Vec::with_capacity(len as usize);
        file.take(len as u64).read_to_end(&mut buffer).await?;

        Ok(ResponseData::Local(PartitionedLocalData {
            data: Bytes::from(buffer),
        }))
    }

    async fn get_index(
        &self,
        ctx: ReadingIndexViewContext,
    ) -> Result<ResponseDataIndex, WorkerError> {
        let uid = &ctx.partition_id;
        let range = self.resolve_range(uid);
        let (data_file_path, index_file_path) =
            LocalFileStore::gen_relative_path_for_partition(uid, &range);

        let locked_obj = match self.partition_locks.get(&data_file_path) {
            Some(entry) => entry.clone(),
            _ => {
                return Ok(ResponseDataIndex::Local(LocalDataIndex::default()));
            }
        };

        let locked_obj = locked_obj.read().await;
        let abs_index_path = format!("{}/{}", &locked_obj.root, &index_file_path);
        let data_file_len = locked_obj.pointer.load(SeqCst);

        let index_data = tokio::fs::read(&abs_index_path).await?;
        Ok(ResponseDataIndex::Local(LocalDataIndex {
            index_data: Bytes::from(index_data),
            data_file_len,
        }))
    }

    async fn purge(&self, ctx: &PurgeDataContext) -> Result<i64> {
        let (app_id, shuffle_id_option) = ctx.extract();

        let data_relative_dir_path = match shuffle_id_option {
            Some(shuffle_id) => LocalFileStore::gen_relative_path_for_shuffle(&app_id, shuffle_id),
            _ => LocalFileStore::gen_relative_path_for_app(&app_id),
        };

        for root in &self.data_paths {
            let abs_dir = format!("{}/{}", root, &data_relative_dir_path);
            if tokio::fs::try_exists(&abs_dir).await.unwrap_or(false) {
                tokio::fs::remove_dir_all(&abs_dir).await?;
            }
        }

        if shuffle_id_option.is_none() {
            self.shuffle_ranges
                .retain(|(key_app, _), _| key_app != &app_id);
        } else {
            self.shuffle_ranges
                .remove(&(app_id.clone(), shuffle_id_option.unwrap()));
        }

        let prefix = format!("{}/", &data_relative_dir_path);
        let keys_to_delete: Vec<_> = self
            .partition_locks
            .iter()
            .filter(|entry| entry.key().starts_with(&prefix))
            .map(|entry| entry.key().to_string())
            .collect();

        let mut removed_data_size = 0i64;
        for key in keys_to_delete {
            if let Some(entry) = self.partition_locks.remove(&key) {
                let locked = entry.1.write().await;
                removed_data_size += locked.pointer.load(SeqCst);
            }
        }
        self.used_bytes
            .fetch_sub(removed_data_size as u64, SeqCst);

        Ok(removed_data_size)
    }

    async fn is_healthy(&self) -> Result<bool> {
        Ok(self.used_ratio() < 1.0)
    }

    fn register_app(&self, _ctx: RegisterAppContext) -> Result<()> {
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
        StorageType::LOCALFILE
    }

    async fn spill_insert(&self, ctx: SpillWritingViewContext) -> Result<(), WorkerError> {
        let uid = ctx.uid;
        let mut data: Vec<&Block> = ctx.data_blocks.iter().collect();
        // stable order for downstream readers of reattempted stages
        data.sort_by_key(|block| block.task_attempt_id);
        self.data_insert(uid, data).await
    }
}

#[cfg(test)]
mod test {
    use crate::app::{
        PartitionedUId, PurgeDataContext, PurgeReason, ReadingIndexViewContext, ReadingOptions,
        ReadingViewContext, RegisterShuffleContext, WritingViewContext,
    };
    use crate::store::index_codec::IndexCodec;
    use crate::store::localfile::LocalFileStore;
    use crate::store::{Block, ResponseData, ResponseDataIndex, Store};
    use bytes::Bytes;

    fn create_writing_ctx_by_uid(uid: &PartitionedUId) -> WritingViewContext {
        let data = b"hello world!hello china!";
        let size = data.len();
        WritingViewContext::new(
            uid.clone(),
            vec![
                Block {
                    block_id: 0,
                    length: size as i32,
                    uncompress_length: 200,
                    crc: 0,
                    task_attempt_id: 0,
                    data: Bytes::copy_from_slice(data),
                },
                Block {
                    block_id: 1,
                    length: size as i32,
                    uncompress_length: 200,
                    crc: 0,
                    task_attempt_id: 0,
                    data: Bytes::copy_from_slice(data),
                },
            ],
        )
    }

    #[test]
    fn write_read_index_test() -> anyhow::Result<()> {
        let temp_dir = tempdir::TempDir::new("write_read_index_test").unwrap();
        let temp_path = temp_dir.path().to_str().unwrap().to_string();
        let local_store = LocalFileStore::new(vec![temp_path.clone()]);
        let runtime = local_store.runtime_manager.clone();

        let uid = PartitionedUId::from("100".to_string(), 0, 0);
        runtime.wait(local_store.insert(create_writing_ctx_by_uid(&uid)))?;

        // data lands under the partition-range directory
        assert!(runtime.wait(tokio::fs::try_exists(format!(
            "{}/100/0/0-1/0.data",
            &temp_path
        )))?);

        let index = runtime.wait(local_store.get_index(ReadingIndexViewContext {
            partition_id: uid.clone(),
        }))?;
        let ResponseDataIndex::Local(index) = index;
        assert_eq!(48, index.data_file_len);

        let records = IndexCodec::decode_all(index.index_data)?;
        assert_eq!(2, records.len());
        assert_eq!(0, records[0].offset);
        assert_eq!(24, records[1].offset);
        assert_eq!(1, records[1].block_id);

        let read = runtime.wait(local_store.get(ReadingViewContext {
            uid: uid.clone(),
            reading_options: ReadingOptions::FILE_OFFSET_AND_LEN(24, 24),
        }))?;
        match read {
            ResponseData::Local(local) => {
                assert_eq!(Bytes::from_static(b"hello world!hello china!"), local.data);
            }
            _ => panic!(),
        }

        Ok(())
    }

    #[test]
    fn registered_range_names_the_directory() -> anyhow::Result<()> {
        let temp_dir = tempdir::TempDir::new("range_dir_test").unwrap();
        let temp_path = temp_dir.path().to_str().unwrap().to_string();
        let local_store = LocalFileStore::new(vec![temp_path.clone()]);
        let runtime = local_store.runtime_manager.clone();

        local_store.register_shuffle(RegisterShuffleContext {
            app_id: "100".to_string(),
            shuffle_id: 0,
            partition_ranges: vec![ferry_core::common::PartitionRange::new(0, 4)],
        })?;

        let uid = PartitionedUId::from("100".to_string(), 0, 2);
        runtime.wait(local_store.insert(create_writing_ctx_by_uid(&uid)))?;
        assert!(runtime.wait(tokio::fs::try_exists(format!(
            "{}/100/0/0-4/2.data",
            &temp_path
        )))?);
        Ok(())
    }

    #[test]
    fn purge_test() -> anyhow::Result<()> {
        let temp_dir = tempdir::TempDir::new("localfile_purge_test").unwrap();
        let temp_path = temp_dir.path().to_str().unwrap().to_string();
        let local_store = LocalFileStore::new(vec![temp_path.clone()]);
        let runtime = local_store.runtime_manager.clone();

        let app_id = "purge_test-app-id".to_string();
        let uid_1 = PartitionedUId::from(app_id.clone(), 1, 0);
        let uid_2 = PartitionedUId::from(app_id.clone(), 13, 0);

        runtime.wait(local_store.insert(create_writing_ctx_by_uid(&uid_1)))?;
        runtime.wait(local_store.insert(create_writing_ctx_by_uid(&uid_2)))?;

        // shuffle level purge
        runtime.wait(local_store.purge(&PurgeDataContext::new(
            &PurgeReason::SHUFFLE_LEVEL_EXPLICIT_UNREGISTER(app_id.clone(), 1),
        )))?;
        assert!(!runtime.wait(tokio::fs::try_exists(format!(
            "{}/{}/1",
            &temp_path, &app_id
        )))?);

        // shuffle 13 is untouched
        let index = runtime.wait(local_store.get_index(ReadingIndexViewContext {
            partition_id: uid_2.clone(),
        }))?;
        let ResponseDataIndex::Local(index) = index;
        assert!(index.data_file_len > 0);

        // app level purge
        runtime.wait(local_store.purge(&PurgeDataContext::new(
            &PurgeReason::APP_LEVEL_EXPLICIT_UNREGISTER(app_id.clone()),
        )))?;
        assert!(!runtime.wait(tokio::fs::try_exists(format!("{}/{}", &temp_path, &app_id)))?);

        Ok(())
    }
}
