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
use bytes::Bytes;
use croaring::{JvmLegacy, Treemap};
use dashmap::DashMap;
use parking_lot::RwLock;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering::SeqCst;
use std::sync::Arc;

/// Tracks the reported block ids of one app as per-partition bitmaps.
/// Reports only ever add ids, so cross-server reconciliation by union
/// stays commutative and idempotent.
#[derive(Default)]
pub struct BlockIdManager {
    // key: (shuffle_id, partition_id)
    block_id_bitmap: DashMap<(i32, i32), Arc<RwLock<Treemap>>>,
    number: AtomicU64,
}

impl BlockIdManager {
    pub fn report_block_ids(
        &self,
        shuffle_id: i32,
        partition_to_block_ids: Vec<(i32, Vec<i64>)>,
    ) -> Result<()> {
        let mut number = 0;
        for (partition_id, block_ids) in partition_to_block_ids {
            number += block_ids.len();
            let treemap = self
                .block_id_bitmap
                .entry((shuffle_id, partition_id))
                .or_insert_with(|| Arc::new(RwLock::new(Treemap::new())))
                .clone();
            let mut treemap = treemap.write();
            for block_id in block_ids {
                treemap.add(block_id as u64);
            }
        }
        self.number.fetch_add(number as u64, SeqCst);
        Ok(())
    }

    pub fn get_block_ids(&self, shuffle_id: i32, partition_id: i32) -> Result<Bytes> {
        let mut treemap = Treemap::new();
        if let Some(bitmap) = self.block_id_bitmap.get(&(shuffle_id, partition_id)) {
            let bitmap = bitmap.clone();
            let bitmap = bitmap.read();
            treemap.extend(bitmap.iter());
        }
        Ok(Bytes::from(treemap.serialize::<JvmLegacy>()))
    }

    pub fn purge_block_ids(&self, shuffle_id: i32) -> Result<()> {
        let deletion_keys: Vec<(i32, i32)> = self
            .block_id_bitmap
            .iter()
            .filter(|entry| entry.key().0 == shuffle_id)
            .map(|entry| *entry.key())
            .collect();
        let mut number = 0;
        for deletion_key in deletion_keys {
            if let Some(bitmap) = self.block_id_bitmap.remove(&deletion_key) {
                number += bitmap.1.read().cardinality();
            }
        }
        self.number.fetch_sub(number, SeqCst);
        Ok(())
    }

    pub fn get_blocks_number(&self) -> u64 {
        self.number.load(SeqCst)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn report_and_get() -> Result<()> {
        let manager = BlockIdManager::default();
        manager.report_block_ids(0, vec![(0, vec![1, 2]), (1, vec![3])])?;
        manager.report_block_ids(0, vec![(0, vec![2, 9])])?;

        let raw = manager.get_block_ids(0, 0)?;
        let bitmap = Treemap::deserialize::<JvmLegacy>(&raw);
        assert_eq!(3, bitmap.cardinality());
        assert!(bitmap.contains(1));
        assert!(bitmap.contains(2));
        assert!(bitmap.contains(9));

        // unknown partition returns an empty bitmap
        let raw = manager.get_block_ids(0, 100)?;
        let bitmap = Treemap::deserialize::<JvmLegacy>(&raw);
        assert_eq!(0, bitmap.cardinality());

        assert_eq!(5, manager.get_blocks_number());
        Ok(())
    }

    #[test]
    fn purge_is_shuffle_scoped() -> Result<()> {
        let manager = BlockIdManager::default();
        manager.report_block_ids(0, vec![(0, vec![1, 2])])?;
        manager.report_block_ids(7, vec![(0, vec![3])])?;

        manager.purge_block_ids(0)?;
        let raw = manager.get_block_ids(0, 0)?;
        assert_eq!(0, Treemap::deserialize::<JvmLegacy>(&raw).cardinality());

        let raw = manager.get_block_ids(7, 0)?;
        assert_eq!(1, Treemap::deserialize::<JvmLegacy>(&raw).cardinality());
        assert_eq!(1, manager.get_blocks_number());
        Ok(())
    }
}
