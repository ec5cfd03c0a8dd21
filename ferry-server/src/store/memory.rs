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
use crate::config::{MemoryStoreConfig, StorageType};
use crate::error::WorkerError;
use crate::readable_size::ReadableSize;
use crate::runtime::manager::RuntimeManager;
use crate::store::index_codec::{IndexBlock, IndexCodec};
use crate::store::mem::budget::{CapacitySnapshot, MemoryBudget};
use crate::store::mem::buffer::{BufferSpillResult, MemoryBuffer};
use crate::store::spill::SpillWritingViewContext;
use crate::store::{
    LocalDataIndex, PartitionedMemoryData, ResponseData, ResponseDataIndex, Store,
};
use anyhow::anyhow;
use anyhow::Result;
use async_trait::async_trait;
use bytes::BytesMut;
use dashmap::DashMap;
use log::info;
use std::collections::{BTreeMap, HashMap};
use std::str::FromStr;
use std::sync::Arc;

pub struct MemoryStore {
    memory_capacity: i64,
    state: DashMap<PartitionedUId, Arc<MemoryBuffer>>,
    budget: MemoryBudget,
    runtime_manager: RuntimeManager,
}

impl MemoryStore {
    // only for test cases
    pub fn new(max_memory_size: i64) -> Self {
        MemoryStore {
            memory_capacity: max_memory_size,
            state: DashMap::new(),
            budget: MemoryBudget::new(max_memory_size),
            runtime_manager: Default::default(),
        }
    }

    pub fn from(conf: MemoryStoreConfig, runtime_manager: RuntimeManager) -> Self {
        let capacity = ReadableSize::from_str(&conf.capacity).unwrap();
        MemoryStore {
            memory_capacity: capacity.as_bytes() as i64,
            state: DashMap::new(),
            budget: MemoryBudget::new(capacity.as_bytes() as i64),
            runtime_manager,
        }
    }

    pub fn memory_snapshot(&self) -> CapacitySnapshot {
        self.budget.snapshot()
    }

    pub fn get_capacity(&self) -> i64 {
        self.memory_capacity
    }

    pub fn get_or_create_buffer(&self, uid: PartitionedUId) -> Arc<MemoryBuffer> {
        self.state
            .entry(uid)
            .or_insert_with(|| Arc::new(MemoryBuffer::new()))
            .clone()
    }

    pub fn get_buffer(&self, uid: &PartitionedUId) -> Result<Arc<MemoryBuffer>> {
        match self.state.get(uid) {
            Some(buffer) => Ok(buffer.clone()),
            _ => Err(anyhow!(format!(
                "No such existing buffer for: {:?}. This may has been deleted.",
                uid
            ))),
        }
    }

    pub fn buffer_staging_size(&self, uid: &PartitionedUId) -> u64 {
        self.state
            .get(uid)
            .map(|buffer| buffer.staging_size() as u64)
            .unwrap_or(0)
    }

    /// Pick spill candidates biggest-staging first until the expected
    /// amount of bytes is covered.
    pub fn lookup_spill_buffers(
        &self,
        expected_spill_total_bytes: i64,
    ) -> HashMap<PartitionedUId, Arc<MemoryBuffer>> {
        let mut sorted_tree_map = BTreeMap::new();

        for entry in self.state.iter() {
            let staging_size = entry.value().staging_size();
            if staging_size == 0 {
                continue;
            }
            let valset = sorted_tree_map.entry(staging_size).or_insert_with(Vec::new);
            valset.push((entry.key().clone(), entry.value().clone()));
        }

        let mut real_spill_total_bytes = 0;
        let mut spill_candidates = HashMap::new();
        'outer: for (size, vals) in sorted_tree_map.iter().rev() {
            for (uid, buffer) in vals {
                if real_spill_total_bytes >= expected_spill_total_bytes {
                    break 'outer;
                }
                real_spill_total_bytes += *size;
                spill_candidates.insert(uid.clone(), buffer.clone());
            }
        }
        spill_candidates
    }

    /// All buffers of one (app, shuffle) that still stage data, for commit
    /// and finish barriers.
    pub fn buffers_of_shuffle(
        &self,
        app_id: &str,
        shuffle_id: i32,
    ) -> Vec<(PartitionedUId, Arc<MemoryBuffer>)> {
        self.state
            .iter()
            .filter(|entry| {
                let uid = entry.key();
                uid.app_id == app_id && uid.shuffle_id == shuffle_id
            })
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect()
    }

    pub fn spill_buffer(&self, uid: &PartitionedUId) -> Result<Option<BufferSpillResult>> {
        let buffer = self.get_buffer(uid)?;
        buffer.spill()
    }

    pub fn clear_spilled_buffer(
        &self,
        uid: &PartitionedUId,
        flight_id: u64,
        flight_len: i64,
    ) -> Result<()> {
        if let Ok(buffer) = self.get_buffer(uid) {
            buffer.clear_flight(flight_id, flight_len)?;
        }
        self.budget.dec_used(flight_len);
        Ok(())
    }
}

#[async_trait]
impl Store for MemoryStore {
    fn start(self: Arc<Self>) {
        // ignore
    }

    async fn insert(&self, ctx: WritingViewContext) -> Result<(), WorkerError> {
        let size = ctx.data_size as i64;
        if !self.budget.try_inc_used(size) {
            return Err(WorkerError::NO_ENOUGH_MEMORY_TO_BE_ALLOCATED);
        }

        let buffer = self.get_or_create_buffer(ctx.uid);
        buffer.append(ctx.data_blocks, size)?;
        Ok(())
    }

    async fn get(&self, ctx: ReadingViewContext) -> Result<ResponseData, WorkerError> {
        let buffer = match self.state.get(&ctx.uid) {
            Some(buffer) => buffer.clone(),
            _ => {
                return Ok(ResponseData::Mem(PartitionedMemoryData::default()));
            }
        };

        let FILE_OFFSET_AND_LEN(offset, length) = ctx.reading_options;

        let mut segments = vec![];
        let mut cursor = 0i64;
        for block in buffer.all_blocks() {
            if cursor >= offset && cursor + block.length as i64 <= offset + length {
                segments.push(crate::store::DataSegment {
                    block_id: block.block_id,
                    offset: cursor,
                    length: block.length,
                    uncompress_length: block.uncompress_length,
                    crc: block.crc,
                    task_attempt_id: block.task_attempt_id,
                });
            }
            cursor += block.length as i64;
        }

        let data = buffer.concatenated_data().freeze();
        let start = (offset.max(0) as usize).min(data.len());
        let end = ((offset + length).max(0) as usize).min(data.len());
        Ok(ResponseData::Mem(PartitionedMemoryData {
            data: data.slice(start..end),
            shuffle_data_block_segments: segments,
        }))
    }

    async fn get_index(
        &self,
        ctx: ReadingIndexViewContext,
    ) -> Result<ResponseDataIndex, WorkerError> {
        let buffer = match self.state.get(&ctx.partition_id) {
            Some(buffer) => buffer.clone(),
            _ => {
                return Ok(ResponseDataIndex::Local(LocalDataIndex::default()));
            }
        };

        let mut index_bytes_holder = BytesMut::new();
        let mut offset = 0i64;
        for block in buffer.all_blocks() {
            IndexCodec::encode_into(
                &IndexBlock {
                    offset,
                    length: block.length,
                    uncompress_length: block.uncompress_length,
                    crc: block.crc,
                    block_id: block.block_id,
                    task_attempt_id: block.task_attempt_id,
                },
                &mut index_bytes_holder,
            );
            offset += block.length as i64;
        }

        Ok(ResponseDataIndex::Local(LocalDataIndex {
            index_data: index_bytes_holder.freeze(),
            data_file_len: offset,
        }))
    }

    async fn purge(&self, ctx: &PurgeDataContext) -> Result<i64> {
        let (app_id, shuffle_id_option) = ctx.extract();

        let removed_uids: Vec<PartitionedUId> = self
            .state
            .iter()
            .filter(|entry| {
                let uid = entry.key();
                uid.app_id == app_id
                    && shuffle_id_option
                        .map(|shuffle_id| uid.shuffle_id == shuffle_id)
                        .unwrap_or(true)
            })
            .map(|entry| entry.key().clone())
            .collect();

        let mut used = 0;
        for uid in removed_uids {
            if let Some(entry) = self.state.remove(&uid) {
                used += entry.1.total_size();
            }
        }

        self.budget.dec_used(used);
        info!(
            "removed used buffer size:[{}] for [{:?}], [{:?}]",
            used, &app_id, shuffle_id_option
        );
        Ok(used)
    }

    async fn is_healthy(&self) -> Result<bool> {
        Ok(true)
    }

    fn register_app(&self, _ctx: RegisterAppContext) -> Result<()> {
        Ok(())
    }

    fn register_shuffle(&self, _ctx: RegisterShuffleContext) -> Result<()> {
        Ok(())
    }

    async fn name(&self) -> StorageType {
        StorageType::MEMORY
    }

    async fn spill_insert(&self, _ctx: SpillWritingViewContext) -> Result<(), WorkerError> {
        Err(WorkerError::INTERNAL_ERROR)
    }
}

#[cfg(test)]
mod test {
    use crate::app::{
        PartitionedUId, PurgeDataContext, PurgeReason, ReadingOptions, ReadingViewContext,
        WritingViewContext,
    };
    use crate::store::memory::MemoryStore;
    use crate::store::ResponseData;
    use crate::store::{Block, ResponseDataIndex, Store};
    use bytes::Bytes;

    fn write_blocks(store: &MemoryStore, uid: &PartitionedUId, batch: i64, payload: &'static [u8]) {
        let runtime = store.runtime_manager.clone();
        for idx in 0..batch {
            let ctx = WritingViewContext::new(
                uid.clone(),
                vec![Block {
                    block_id: idx,
                    length: payload.len() as i32,
                    uncompress_length: payload.len() as i32,
                    crc: 0,
                    task_attempt_id: 0,
                    data: Bytes::from_static(payload),
                }],
            );
            runtime.wait(store.insert(ctx)).unwrap();
        }
    }

    #[test]
    fn test_put_and_get_for_memory() {
        let store = MemoryStore::new(1024 * 1024 * 1024);
        let runtime = store.runtime_manager.clone();

        let uid = PartitionedUId::from("100".to_string(), 0, 0);

        write_blocks(&store, &uid, 2, b"hello world!");

        let reading_ctx = ReadingViewContext {
            uid: uid.clone(),
            reading_options: ReadingOptions::FILE_OFFSET_AND_LEN(0, 1000000),
        };
        match runtime.wait(store.get(reading_ctx)).unwrap() {
            ResponseData::Mem(data) => {
                assert_eq!(2, data.shuffle_data_block_segments.len());
                assert_eq!(0, data.shuffle_data_block_segments[0].offset);
                assert_eq!(12, data.shuffle_data_block_segments[1].offset);
                assert_eq!(
                    Bytes::from_static(b"hello world!hello world!"),
                    data.data
                );
            }
            _ => panic!("should not"),
        }
    }

    #[test]
    fn test_index_is_synthesized_from_buffer() {
        let store = MemoryStore::new(1024 * 1024);
        let runtime = store.runtime_manager.clone();
        let uid = PartitionedUId::from("100".to_string(), 0, 1);

        write_blocks(&store, &uid, 3, b"abcd");

        let index = runtime
            .wait(store.get_index(crate::app::ReadingIndexViewContext {
                partition_id: uid.clone(),
            }))
            .unwrap();
        match index {
            ResponseDataIndex::Local(local) => {
                assert_eq!(12, local.data_file_len);
                let records =
                    crate::store::index_codec::IndexCodec::decode_all(local.index_data).unwrap();
                assert_eq!(3, records.len());
                assert_eq!(4, records[1].offset);
            }
        }
    }

    #[test]
    fn test_budget_backpressure() {
        let store = MemoryStore::new(10);
        let runtime = store.runtime_manager.clone();
        let uid = PartitionedUId::from("100".to_string(), 0, 0);

        let ctx = WritingViewContext::new(
            uid.clone(),
            vec![Block {
                block_id: 0,
                length: 20,
                uncompress_length: 20,
                crc: 0,
                task_attempt_id: 0,
                data: Bytes::from_static(&[0u8; 20]),
            }],
        );
        match runtime.wait(store.insert(ctx)) {
            Err(crate::error::WorkerError::NO_ENOUGH_MEMORY_TO_BE_ALLOCATED) => {}
            _ => panic!(),
        }
    }

    #[test]
    fn test_purge() {
        let store = MemoryStore::new(1024);
        let runtime = store.runtime_manager.clone();

        let app_id = "purge_app";
        let uid_1 = PartitionedUId::from(app_id.to_string(), 1, 1);
        let uid_2 = PartitionedUId::from(app_id.to_string(), 2, 1);
        write_blocks(&store, &uid_1, 1, b"hello");
        write_blocks(&store, &uid_2, 1, b"hello");

        // shuffle level purge does not touch the sibling shuffle
        runtime
            .wait(store.purge(&PurgeDataContext::new(
                &PurgeReason::SHUFFLE_LEVEL_EXPLICIT_UNREGISTER(app_id.to_string(), 1),
            )))
            .unwrap();
        assert!(store.get_buffer(&uid_1).is_err());
        assert!(store.get_buffer(&uid_2).is_ok());

        // app level purge frees the budget completely
        runtime
            .wait(store.purge(&PurgeDataContext::new(
                &PurgeReason::APP_LEVEL_EXPLICIT_UNREGISTER(app_id.to_string()),
            )))
            .unwrap();
        let snapshot = store.memory_snapshot();
        assert_eq!(0, snapshot.used());
        assert_eq!(1024, snapshot.capacity());
    }
}
