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

pub mod hadoop;
pub mod hdfs;
pub mod hybrid;
pub mod index_codec;
pub mod localfile;
pub mod mem;
pub mod memory;
pub mod spill;

use crate::app::{
    PurgeDataContext, ReadingIndexViewContext, ReadingViewContext, RegisterAppContext,
    RegisterShuffleContext, WritingViewContext,
};
use crate::config::{Config, StorageType};
use crate::error::WorkerError;
use crate::runtime::manager::RuntimeManager;
use crate::store::hybrid::HybridStore;
use crate::store::index_codec::{IndexBlock, IndexCodec};
use crate::store::spill::SpillWritingViewContext;
use anyhow::Result;
use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use std::any::Any;
use std::sync::Arc;

pub use ferry_core::common::ShuffleBlock as Block;

// ===============

#[derive(Clone, Debug)]
pub struct DataSegment {
    pub block_id: i64,
    pub offset: i64,
    pub length: i32,
    pub uncompress_length: i32,
    pub crc: i64,
    pub task_attempt_id: i64,
}

#[derive(Debug)]
pub enum ResponseData {
    Local(PartitionedLocalData),
    Mem(PartitionedMemoryData),
}

impl ResponseData {
    pub fn into_bytes(self) -> Bytes {
        match self {
            ResponseData::Local(local) => local.data,
            ResponseData::Mem(mem) => mem.data,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            ResponseData::Local(local) => local.data.len(),
            ResponseData::Mem(mem) => mem.data.len(),
        }
    }
}

#[derive(Debug, Default)]
pub struct PartitionedLocalData {
    pub data: Bytes,
}

#[derive(Debug, Default)]
pub struct PartitionedMemoryData {
    pub data: Bytes,
    pub shuffle_data_block_segments: Vec<DataSegment>,
}

pub enum ResponseDataIndex {
    Local(LocalDataIndex),
}

#[derive(Default, Debug)]
pub struct LocalDataIndex {
    pub index_data: Bytes,
    pub data_file_len: i64,
}

// =====================================================

pub struct ShuffleFileFormat {
    pub data: Bytes,
    pub index: Bytes,
    pub len: usize,
    pub offset: i64,
}

#[async_trait]
pub trait Store {
    fn start(self: Arc<Self>);
    async fn insert(&self, ctx: WritingViewContext) -> Result<(), WorkerError>;
    async fn get(&self, ctx: ReadingViewContext) -> Result<ResponseData, WorkerError>;
    async fn get_index(
        &self,
        ctx: ReadingIndexViewContext,
    ) -> Result<ResponseDataIndex, WorkerError>;
    async fn purge(&self, ctx: &PurgeDataContext) -> Result<i64>;
    async fn is_healthy(&self) -> Result<bool>;

    fn register_app(&self, ctx: RegisterAppContext) -> Result<()>;
    fn register_shuffle(&self, ctx: RegisterShuffleContext) -> Result<()>;

    async fn name(&self) -> StorageType;

    async fn spill_insert(&self, ctx: SpillWritingViewContext) -> Result<(), WorkerError>;

    /// Assemble the on-disk representation of a block batch appended at
    /// `offset`: the concatenated payloads plus the fixed-width index
    /// records describing them.
    fn create_shuffle_format(&self, blocks: Vec<&Block>, offset: i64) -> Result<ShuffleFileFormat> {
        let mut offset = offset;

        let blocks_len = blocks.len();
        let mut index_bytes_holder = BytesMut::with_capacity(blocks_len * index_codec::INDEX_BLOCK_SIZE);
        let mut total_size = 0usize;
        for block in &blocks {
            total_size += block.length as usize;
        }
        let mut data_bytes_holder = BytesMut::with_capacity(total_size);

        for block in blocks {
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
            data_bytes_holder.extend_from_slice(&block.data);
        }

        Ok(ShuffleFileFormat {
            data: data_bytes_holder.freeze(),
            index: index_bytes_holder.freeze(),
            len: total_size,
            offset,
        })
    }
}

pub trait Persistent {}

pub trait PersistentStore: Store + Persistent + Send + Sync + Any {
    fn as_any(&self) -> &dyn Any;
}

pub struct StoreProvider {}

impl StoreProvider {
    pub fn get(runtime_manager: RuntimeManager, config: Config) -> HybridStore {
        HybridStore::from(config, runtime_manager)
    }
}
