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

use once_cell::sync::Lazy;

pub static DEFAULT_BLOCK_ID_LAYOUT: Lazy<IdLayout> = Lazy::new(|| {
    IdLayout::new(
        DEFAULT_SEQUENCE_NO_BIT,
        DEFAULT_PARTITION_ID_BIT,
        DEFAULT_TASK_ID_BIT,
    )
});

const DEFAULT_SEQUENCE_NO_BIT: i32 = 18;
const DEFAULT_PARTITION_ID_BIT: i32 = 24;
const DEFAULT_TASK_ID_BIT: i32 = 21;

/// The 63 usable bits of a block id are split into
/// sequence | partition | task-attempt sections.
#[derive(Debug, Clone)]
pub struct IdLayout {
    pub sequence_no_bits: i32,
    pub partition_id_bits: i32,
    pub task_attempt_id_bits: i32,

    partition_id_mask: i64,
    partition_id_offset: i32,
    task_attempt_id_mask: i64,
}

impl IdLayout {
    pub fn new(sequence_no_bits: i32, partition_id_bits: i32, task_attempt_id_bits: i32) -> Self {
        let max_partition_id: i64 = (1 << partition_id_bits) - 1;
        let max_task_attempt_id: i64 = (1 << task_attempt_id_bits) - 1;
        Self {
            sequence_no_bits,
            partition_id_bits,
            task_attempt_id_bits,
            partition_id_mask: max_partition_id << task_attempt_id_bits,
            partition_id_offset: task_attempt_id_bits,
            task_attempt_id_mask: max_task_attempt_id,
        }
    }

    pub fn get_partition_id(&self, block_id: i64) -> i64 {
        (block_id & self.partition_id_mask) >> self.partition_id_offset
    }

    pub fn get_task_attempt_id(&self, block_id: i64) -> i64 {
        block_id & self.task_attempt_id_mask
    }

    pub fn get_block_id(&self, sequence_no: i64, partition_id: i64, task_attempt_id: i64) -> i64 {
        let s = sequence_no << (self.partition_id_bits + self.task_attempt_id_bits);
        let p = partition_id << self.task_attempt_id_bits;
        s | p | task_attempt_id
    }
}

#[cfg(test)]
mod tests {
    use crate::id_layout::{IdLayout, DEFAULT_BLOCK_ID_LAYOUT};

    #[test]
    fn test_id_layout() {
        let layout = IdLayout::new(18, 24, 21);
        let block_id = layout.get_block_id(123, 45, 67);
        assert_eq!(45, layout.get_partition_id(block_id));
        assert_eq!(67, layout.get_task_attempt_id(block_id));
    }

    #[test]
    fn test_default_layout() {
        let block_id = DEFAULT_BLOCK_ID_LAYOUT.get_block_id(1, 100, 3);
        assert_eq!(100, DEFAULT_BLOCK_ID_LAYOUT.get_partition_id(block_id));
    }
}
