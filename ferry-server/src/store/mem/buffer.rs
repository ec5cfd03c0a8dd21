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

use anyhow::Result;
use bytes::BytesMut;
use ferry_core::common::ShuffleBlock;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::Arc;

/// The in-memory accumulation of one partition: a staging area taking new
/// blocks plus the in-flight batches picked for flush but not yet durable.
/// Within one partition blocks keep their append order.
pub struct MemoryBuffer {
    inner: Mutex<BufferInner>,
}

struct BufferInner {
    staging: Vec<ShuffleBlock>,
    staging_size: i64,

    // flight_id -> batch. BTreeMap keeps flush order for reads.
    in_flight: BTreeMap<u64, Arc<Vec<ShuffleBlock>>>,
    in_flight_size: i64,
    flight_counter: u64,
}

pub struct BufferSpillResult {
    pub flight_id: u64,
    pub flight_len: i64,
    pub blocks: Arc<Vec<ShuffleBlock>>,
}

impl MemoryBuffer {
    pub fn new() -> MemoryBuffer {
        MemoryBuffer {
            inner: Mutex::new(BufferInner {
                staging: vec![],
                staging_size: 0,
                in_flight: BTreeMap::new(),
                in_flight_size: 0,
                flight_counter: 0,
            }),
        }
    }

    pub fn append(&self, blocks: Vec<ShuffleBlock>, size: i64) -> Result<()> {
        let mut inner = self.inner.lock();
        inner.staging.extend(blocks);
        inner.staging_size += size;
        Ok(())
    }

    pub fn staging_size(&self) -> i64 {
        self.inner.lock().staging_size
    }

    pub fn total_size(&self) -> i64 {
        let inner = self.inner.lock();
        inner.staging_size + inner.in_flight_size
    }

    /// Move the staging batch into flight. `None` when nothing is staged.
    pub fn spill(&self) -> Result<Option<BufferSpillResult>> {
        let mut inner = self.inner.lock();
        if inner.staging.is_empty() {
            return Ok(None);
        }

        let blocks = Arc::new(std::mem::take(&mut inner.staging));
        let flight_len = inner.staging_size;
        inner.staging_size = 0;

        let flight_id = inner.flight_counter;
        inner.flight_counter += 1;
        inner.in_flight.insert(flight_id, blocks.clone());
        inner.in_flight_size += flight_len;

        Ok(Some(BufferSpillResult {
            flight_id,
            flight_len,
            blocks,
        }))
    }

    /// Drop a flushed batch once its data is durable on some tier.
    pub fn clear_flight(&self, flight_id: u64, flight_len: i64) -> Result<()> {
        let mut inner = self.inner.lock();
        if inner.in_flight.remove(&flight_id).is_some() {
            inner.in_flight_size -= flight_len;
        }
        Ok(())
    }

    /// Blocks in stable read order: finished flights first, then staging.
    pub fn all_blocks(&self) -> Vec<ShuffleBlock> {
        let inner = self.inner.lock();
        let mut blocks = vec![];
        for batch in inner.in_flight.values() {
            blocks.extend(batch.iter().cloned());
        }
        blocks.extend(inner.staging.iter().cloned());
        blocks
    }

    /// The concatenation of all buffered block payloads, in read order.
    pub fn concatenated_data(&self) -> BytesMut {
        let blocks = self.all_blocks();
        let total: usize = blocks.iter().map(|b| b.data.len()).sum();
        let mut data = BytesMut::with_capacity(total);
        for block in blocks {
            data.extend_from_slice(&block.data);
        }
        data
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use bytes::Bytes;

    fn block(block_id: i64, payload: &'static [u8]) -> ShuffleBlock {
        ShuffleBlock {
            block_id,
            length: payload.len() as i32,
            uncompress_length: payload.len() as i32,
            crc: 0,
            task_attempt_id: 0,
            data: Bytes::from_static(payload),
        }
    }

    #[test]
    fn append_spill_clear() {
        let buffer = MemoryBuffer::new();
        buffer.append(vec![block(1, b"aa"), block(2, b"bb")], 4).unwrap();
        assert_eq!(4, buffer.staging_size());
        assert_eq!(4, buffer.total_size());

        let spilled = buffer.spill().unwrap().unwrap();
        assert_eq!(4, spilled.flight_len);
        assert_eq!(2, spilled.blocks.len());
        assert_eq!(0, buffer.staging_size());
        // still readable while in flight
        assert_eq!(4, buffer.total_size());

        buffer.clear_flight(spilled.flight_id, spilled.flight_len).unwrap();
        assert_eq!(0, buffer.total_size());

        assert!(buffer.spill().unwrap().is_none());
    }

    #[test]
    fn read_order_is_append_order_across_flights() {
        let buffer = MemoryBuffer::new();
        buffer.append(vec![block(1, b"a")], 1).unwrap();
        let _flight = buffer.spill().unwrap().unwrap();
        buffer.append(vec![block(2, b"b"), block(3, b"c")], 2).unwrap();

        let ids: Vec<i64> = buffer.all_blocks().iter().map(|b| b.block_id).collect();
        assert_eq!(vec![1, 2, 3], ids);
        assert_eq!(b"abc".as_ref(), &buffer.concatenated_data()[..]);
    }
}
