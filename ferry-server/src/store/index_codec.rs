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

use anyhow::{anyhow, Result};
use bytes::{Buf, BufMut, Bytes, BytesMut};

/// One fixed-width index record:
///
/// 1. offset            (i64, 8 bytes)
/// 2. length            (i32, 4 bytes)
/// 3. uncompress_length (i32, 4 bytes)
/// 4. crc               (i64, 8 bytes)
/// 5. block_id          (i64, 8 bytes)
/// 6. task_attempt_id   (i64, 8 bytes)
///
/// Bulk readers stride records without any parsing state.
pub const INDEX_BLOCK_SIZE: usize = 8 + 4 + 4 + 8 + 8 + 8;

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct IndexBlock {
    pub offset: i64,
    pub length: i32,
    pub uncompress_length: i32,
    pub crc: i64,
    pub block_id: i64,
    pub task_attempt_id: i64,
}

pub struct IndexCodec;

impl IndexCodec {
    pub fn encode_into(index: &IndexBlock, holder: &mut BytesMut) {
        holder.put_i64(index.offset);
        holder.put_i32(index.length);
        holder.put_i32(index.uncompress_length);
        holder.put_i64(index.crc);
        holder.put_i64(index.block_id);
        holder.put_i64(index.task_attempt_id);
    }

    pub fn encode(index: &IndexBlock) -> Bytes {
        let mut holder = BytesMut::with_capacity(INDEX_BLOCK_SIZE);
        Self::encode_into(index, &mut holder);
        holder.freeze()
    }

    pub fn decode(mut raw: Bytes) -> Result<IndexBlock> {
        if raw.len() < INDEX_BLOCK_SIZE {
            return Err(anyhow!(
                "Corrupted index record. expected {} bytes but got {}",
                INDEX_BLOCK_SIZE,
                raw.len()
            ));
        }
        Ok(IndexBlock {
            offset: raw.get_i64(),
            length: raw.get_i32(),
            uncompress_length: raw.get_i32(),
            crc: raw.get_i64(),
            block_id: raw.get_i64(),
            task_attempt_id: raw.get_i64(),
        })
    }

    /// Decode every record of an index file.
    pub fn decode_all(mut raw: Bytes) -> Result<Vec<IndexBlock>> {
        let mut records = Vec::with_capacity(raw.len() / INDEX_BLOCK_SIZE);
        while raw.remaining() >= INDEX_BLOCK_SIZE {
            let record = raw.split_to(INDEX_BLOCK_SIZE);
            records.push(Self::decode(record)?);
        }
        if raw.has_remaining() {
            return Err(anyhow!(
                "Dangling {} bytes at the end of the index data",
                raw.remaining()
            ));
        }
        Ok(records)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn codec_roundtrip_is_bytewise_identical() {
        let index = IndexBlock {
            offset: 1024,
            length: 64,
            uncompress_length: 128,
            crc: 0x1234_5678,
            block_id: 42,
            task_attempt_id: 7,
        };

        let encoded = IndexCodec::encode(&index);
        assert_eq!(INDEX_BLOCK_SIZE, encoded.len());

        let decoded = IndexCodec::decode(encoded.clone()).unwrap();
        assert_eq!(index, decoded);

        // bytewise identity after re-encode
        assert_eq!(encoded, IndexCodec::encode(&decoded));
    }

    #[test]
    fn decode_all_strides_fixed_width_records() {
        let mut holder = BytesMut::new();
        for idx in 0..10 {
            IndexCodec::encode_into(
                &IndexBlock {
                    offset: idx * 100,
                    length: 100,
                    uncompress_length: 200,
                    crc: idx,
                    block_id: idx,
                    task_attempt_id: 0,
                },
                &mut holder,
            );
        }

        let records = IndexCodec::decode_all(holder.freeze()).unwrap();
        assert_eq!(10, records.len());
        assert_eq!(900, records[9].offset);
    }

    #[test]
    fn truncated_record_is_rejected() {
        let raw = Bytes::from(vec![0u8; INDEX_BLOCK_SIZE - 1]);
        assert!(IndexCodec::decode(raw.clone()).is_err());
        assert!(IndexCodec::decode_all(raw).is_err());
    }
}
