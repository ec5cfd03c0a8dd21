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

pub mod event_handler;

use crate::config::StorageType;
use crate::store::Block;
use ferry_core::common::PartitionedUId;
use parking_lot::Mutex;
use std::sync::Arc;

/// One flush event: all blocks of one partition accumulated since the
/// previous flush, bound for exactly one storage tier.
#[derive(Clone)]
pub struct SpillMessage {
    pub ctx: SpillWritingViewContext,
    pub size: i64,
    pub retry_cnt: i32,
    pub flight_id: u64,
    pub candidate_storage_type: Arc<Mutex<Option<StorageType>>>,
}

impl SpillMessage {
    pub fn get_candidate_storage_type(&self) -> Option<StorageType> {
        *self.candidate_storage_type.lock()
    }

    pub fn set_candidate_storage_type(&self, storage_type: StorageType) {
        *self.candidate_storage_type.lock() = Some(storage_type);
    }
}

#[derive(Clone)]
pub struct SpillWritingViewContext {
    pub uid: PartitionedUId,
    pub data_blocks: Arc<Vec<Block>>,
    app_is_exist_func: Arc<dyn Fn(&str) -> bool + Send + Sync>,
}

impl SpillWritingViewContext {
    pub fn new<F>(uid: PartitionedUId, blocks: Arc<Vec<Block>>, func: F) -> Self
    where
        F: Fn(&str) -> bool + Send + Sync + 'static,
    {
        Self {
            uid,
            data_blocks: blocks,
            app_is_exist_func: Arc::new(func),
        }
    }

    /// A flush for a purged app is a no-op.
    pub fn is_valid(&self) -> bool {
        let app_id = &self.uid.app_id;
        (self.app_is_exist_func)(app_id)
    }
}
