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

//! Typed request/response messages for every verb of the service.
//!
//! Every message knows how to encode its scalar fields into the frame
//! content section. Messages that move a large opaque payload (shuffle
//! data, index bytes, serialized bitmaps) place it into the frame body
//! section instead, so the transport can account for it separately.

use crate::common::{PartitionRange, RemoteStorageInfo, ShuffleBlock, ShuffleServerInfo};
use crate::error::WireError;
use crate::rpc::frame::{get_bytes, get_i32, get_i64, get_string, get_u16, put_bytes, put_string};
use bytes::{Buf, BufMut, Bytes, BytesMut};
use std::collections::HashMap;
use std::io::Cursor;

/// The generic `{request_id, status, message}` envelope used by every verb
/// that carries no payload back.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RpcResponse {
    pub request_id: i64,
    pub status_code: i32,
    pub ret_msg: String,
}

impl RpcResponse {
    pub fn encode(&self, dst: &mut BytesMut) {
        dst.put_i64(self.request_id);
        dst.put_i32(self.status_code);
        put_string(dst, &self.ret_msg);
    }

    pub fn decode(src: &mut Cursor<&[u8]>) -> Result<Self, WireError> {
        Ok(Self {
            request_id: get_i64(src)?,
            status_code: get_i32(src)?,
            ret_msg: get_string(src)?,
        })
    }
}

// =========================== shuffle server ===========================

#[derive(Clone, Debug, PartialEq)]
pub struct RegisterShuffleRequest {
    pub request_id: i64,
    pub app_id: String,
    pub shuffle_id: i32,
    pub partition_ranges: Vec<PartitionRange>,
    pub remote_storage: RemoteStorageInfo,
}

impl RegisterShuffleRequest {
    pub fn encode(&self, dst: &mut BytesMut) {
        dst.put_i64(self.request_id);
        put_string(dst, &self.app_id);
        dst.put_i32(self.shuffle_id);
        dst.put_i32(self.partition_ranges.len() as i32);
        for range in &self.partition_ranges {
            dst.put_i32(range.start);
            dst.put_i32(range.end);
        }
        put_string(dst, &self.remote_storage.path);
        dst.put_i32(self.remote_storage.conf_overrides.len() as i32);
        for (k, v) in &self.remote_storage.conf_overrides {
            put_string(dst, k);
            put_string(dst, v);
        }
    }

    pub fn decode(src: &mut Cursor<&[u8]>) -> Result<Self, WireError> {
        let request_id = get_i64(src)?;
        let app_id = get_string(src)?;
        let shuffle_id = get_i32(src)?;
        let range_num = get_i32(src)?;
        let mut partition_ranges = Vec::with_capacity(range_num as usize);
        for _ in 0..range_num {
            let start = get_i32(src)?;
            let end = get_i32(src)?;
            partition_ranges.push(PartitionRange::new(start, end));
        }
        let path = get_string(src)?;
        let conf_num = get_i32(src)?;
        let mut conf_overrides = HashMap::with_capacity(conf_num as usize);
        for _ in 0..conf_num {
            let k = get_string(src)?;
            let v = get_string(src)?;
            conf_overrides.insert(k, v);
        }
        Ok(Self {
            request_id,
            app_id,
            shuffle_id,
            partition_ranges,
            remote_storage: RemoteStorageInfo {
                path,
                conf_overrides,
            },
        })
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct SendShuffleDataRequest {
    pub request_id: i64,
    pub app_id: String,
    pub shuffle_id: i32,
    pub timestamp: i64,
    // partition_id -> blocks
    pub partition_blocks: Vec<(i32, Vec<ShuffleBlock>)>,
}

impl SendShuffleDataRequest {
    pub fn encode(&self, dst: &mut BytesMut) {
        dst.put_i64(self.request_id);
        put_string(dst, &self.app_id);
        dst.put_i32(self.shuffle_id);
        dst.put_i64(self.timestamp);
        dst.put_i32(self.partition_blocks.len() as i32);
        for (partition_id, blocks) in &self.partition_blocks {
            dst.put_i32(*partition_id);
            dst.put_i32(blocks.len() as i32);
            for block in blocks {
                dst.put_i64(block.block_id);
                dst.put_i32(block.length);
                dst.put_i32(block.uncompress_length);
                dst.put_i64(block.crc);
                dst.put_i64(block.task_attempt_id);
                put_bytes(dst, &block.data);
            }
        }
    }

    pub fn decode(src: &mut Cursor<&[u8]>) -> Result<Self, WireError> {
        let request_id = get_i64(src)?;
        let app_id = get_string(src)?;
        let shuffle_id = get_i32(src)?;
        let timestamp = get_i64(src)?;
        let partition_batch = get_i32(src)?;
        let mut partition_blocks = Vec::with_capacity(partition_batch as usize);
        for _ in 0..partition_batch {
            let partition_id = get_i32(src)?;
            let block_batch = get_i32(src)?;
            let mut blocks = Vec::with_capacity(block_batch as usize);
            for _ in 0..block_batch {
                let block_id = get_i64(src)?;
                let length = get_i32(src)?;
                let uncompress_length = get_i32(src)?;
                let crc = get_i64(src)?;
                let task_attempt_id = get_i64(src)?;
                let data = get_bytes(src)?.unwrap_or_else(Bytes::new);
                blocks.push(ShuffleBlock {
                    block_id,
                    length,
                    uncompress_length,
                    crc,
                    task_attempt_id,
                    data,
                });
            }
            partition_blocks.push((partition_id, blocks));
        }
        Ok(Self {
            request_id,
            app_id,
            shuffle_id,
            timestamp,
            partition_blocks,
        })
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct SendCommitRequest {
    pub request_id: i64,
    pub app_id: String,
    pub shuffle_id: i32,
}

impl SendCommitRequest {
    pub fn encode(&self, dst: &mut BytesMut) {
        dst.put_i64(self.request_id);
        put_string(dst, &self.app_id);
        dst.put_i32(self.shuffle_id);
    }

    pub fn decode(src: &mut Cursor<&[u8]>) -> Result<Self, WireError> {
        Ok(Self {
            request_id: get_i64(src)?,
            app_id: get_string(src)?,
            shuffle_id: get_i32(src)?,
        })
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct SendCommitResponse {
    pub request_id: i64,
    pub status_code: i32,
    pub ret_msg: String,
    pub commit_count: i32,
}

impl SendCommitResponse {
    pub fn encode(&self, dst: &mut BytesMut) {
        dst.put_i64(self.request_id);
        dst.put_i32(self.status_code);
        put_string(dst, &self.ret_msg);
        dst.put_i32(self.commit_count);
    }

    pub fn decode(src: &mut Cursor<&[u8]>) -> Result<Self, WireError> {
        Ok(Self {
            request_id: get_i64(src)?,
            status_code: get_i32(src)?,
            ret_msg: get_string(src)?,
            commit_count: get_i32(src)?,
        })
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct FinishShuffleRequest {
    pub request_id: i64,
    pub app_id: String,
    pub shuffle_id: i32,
}

impl FinishShuffleRequest {
    pub fn encode(&self, dst: &mut BytesMut) {
        dst.put_i64(self.request_id);
        put_string(dst, &self.app_id);
        dst.put_i32(self.shuffle_id);
    }

    pub fn decode(src: &mut Cursor<&[u8]>) -> Result<Self, WireError> {
        Ok(Self {
            request_id: get_i64(src)?,
            app_id: get_string(src)?,
            shuffle_id: get_i32(src)?,
        })
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct UnregisterShuffleRequest {
    pub request_id: i64,
    pub app_id: String,
    // negative means the whole app
    pub shuffle_id: i32,
}

impl UnregisterShuffleRequest {
    pub fn encode(&self, dst: &mut BytesMut) {
        dst.put_i64(self.request_id);
        put_string(dst, &self.app_id);
        dst.put_i32(self.shuffle_id);
    }

    pub fn decode(src: &mut Cursor<&[u8]>) -> Result<Self, WireError> {
        Ok(Self {
            request_id: get_i64(src)?,
            app_id: get_string(src)?,
            shuffle_id: get_i32(src)?,
        })
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ReportShuffleResultRequest {
    pub request_id: i64,
    pub app_id: String,
    pub shuffle_id: i32,
    pub task_attempt_id: i64,
    pub bitmap_num: i32,
    pub partition_to_block_ids: Vec<(i32, Vec<i64>)>,
}

impl ReportShuffleResultRequest {
    pub fn encode(&self, dst: &mut BytesMut) {
        dst.put_i64(self.request_id);
        put_string(dst, &self.app_id);
        dst.put_i32(self.shuffle_id);
        dst.put_i64(self.task_attempt_id);
        dst.put_i32(self.bitmap_num);
        dst.put_i32(self.partition_to_block_ids.len() as i32);
        for (partition_id, block_ids) in &self.partition_to_block_ids {
            dst.put_i32(*partition_id);
            dst.put_i32(block_ids.len() as i32);
            for block_id in block_ids {
                dst.put_i64(*block_id);
            }
        }
    }

    pub fn decode(src: &mut Cursor<&[u8]>) -> Result<Self, WireError> {
        let request_id = get_i64(src)?;
        let app_id = get_string(src)?;
        let shuffle_id = get_i32(src)?;
        let task_attempt_id = get_i64(src)?;
        let bitmap_num = get_i32(src)?;
        let partition_batch = get_i32(src)?;
        let mut partition_to_block_ids = Vec::with_capacity(partition_batch as usize);
        for _ in 0..partition_batch {
            let partition_id = get_i32(src)?;
            let id_batch = get_i32(src)?;
            let mut block_ids = Vec::with_capacity(id_batch as usize);
            for _ in 0..id_batch {
                block_ids.push(get_i64(src)?);
            }
            partition_to_block_ids.push((partition_id, block_ids));
        }
        Ok(Self {
            request_id,
            app_id,
            shuffle_id,
            task_attempt_id,
            bitmap_num,
            partition_to_block_ids,
        })
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct GetShuffleResultRequest {
    pub request_id: i64,
    pub app_id: String,
    pub shuffle_id: i32,
    pub partition_id: i32,
}

impl GetShuffleResultRequest {
    pub fn encode(&self, dst: &mut BytesMut) {
        dst.put_i64(self.request_id);
        put_string(dst, &self.app_id);
        dst.put_i32(self.shuffle_id);
        dst.put_i32(self.partition_id);
    }

    pub fn decode(src: &mut Cursor<&[u8]>) -> Result<Self, WireError> {
        Ok(Self {
            request_id: get_i64(src)?,
            app_id: get_string(src)?,
            shuffle_id: get_i32(src)?,
            partition_id: get_i32(src)?,
        })
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct GetShuffleResultResponse {
    pub request_id: i64,
    pub status_code: i32,
    pub ret_msg: String,
    pub serialized_bitmap: Bytes,
}

impl GetShuffleResultResponse {
    pub fn encode(&self, dst: &mut BytesMut) {
        dst.put_i64(self.request_id);
        dst.put_i32(self.status_code);
        put_string(dst, &self.ret_msg);
    }

    pub fn decode(src: &mut Cursor<&[u8]>) -> Result<Self, WireError> {
        Ok(Self {
            request_id: get_i64(src)?,
            status_code: get_i32(src)?,
            ret_msg: get_string(src)?,
            serialized_bitmap: Bytes::new(),
        })
    }

    pub fn body(&self) -> Bytes {
        self.serialized_bitmap.clone()
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct GetShuffleDataRequest {
    pub request_id: i64,
    pub app_id: String,
    pub shuffle_id: i32,
    pub partition_id: i32,
    pub offset: i64,
    pub length: i32,
}

impl GetShuffleDataRequest {
    pub fn encode(&self, dst: &mut BytesMut) {
        dst.put_i64(self.request_id);
        put_string(dst, &self.app_id);
        dst.put_i32(self.shuffle_id);
        dst.put_i32(self.partition_id);
        dst.put_i64(self.offset);
        dst.put_i32(self.length);
    }

    pub fn decode(src: &mut Cursor<&[u8]>) -> Result<Self, WireError> {
        Ok(Self {
            request_id: get_i64(src)?,
            app_id: get_string(src)?,
            shuffle_id: get_i32(src)?,
            partition_id: get_i32(src)?,
            offset: get_i64(src)?,
            length: get_i32(src)?,
        })
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct GetShuffleDataResponse {
    pub request_id: i64,
    pub status_code: i32,
    pub ret_msg: String,
    pub data: Bytes,
}

impl GetShuffleDataResponse {
    pub fn encode(&self, dst: &mut BytesMut) {
        dst.put_i64(self.request_id);
        dst.put_i32(self.status_code);
        put_string(dst, &self.ret_msg);
    }

    pub fn decode(src: &mut Cursor<&[u8]>) -> Result<Self, WireError> {
        Ok(Self {
            request_id: get_i64(src)?,
            status_code: get_i32(src)?,
            ret_msg: get_string(src)?,
            data: Bytes::new(),
        })
    }

    pub fn body(&self) -> Bytes {
        self.data.clone()
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct GetShuffleIndexRequest {
    pub request_id: i64,
    pub app_id: String,
    pub shuffle_id: i32,
    pub partition_id: i32,
}

impl GetShuffleIndexRequest {
    pub fn encode(&self, dst: &mut BytesMut) {
        dst.put_i64(self.request_id);
        put_string(dst, &self.app_id);
        dst.put_i32(self.shuffle_id);
        dst.put_i32(self.partition_id);
    }

    pub fn decode(src: &mut Cursor<&[u8]>) -> Result<Self, WireError> {
        Ok(Self {
            request_id: get_i64(src)?,
            app_id: get_string(src)?,
            shuffle_id: get_i32(src)?,
            partition_id: get_i32(src)?,
        })
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct GetShuffleIndexResponse {
    pub request_id: i64,
    pub status_code: i32,
    pub ret_msg: String,
    pub data_file_len: i64,
    pub index_data: Bytes,
}

impl GetShuffleIndexResponse {
    pub fn encode(&self, dst: &mut BytesMut) {
        dst.put_i64(self.request_id);
        dst.put_i32(self.status_code);
        put_string(dst, &self.ret_msg);
        dst.put_i64(self.data_file_len);
    }

    pub fn decode(src: &mut Cursor<&[u8]>) -> Result<Self, WireError> {
        Ok(Self {
            request_id: get_i64(src)?,
            status_code: get_i32(src)?,
            ret_msg: get_string(src)?,
            data_file_len: get_i64(src)?,
            index_data: Bytes::new(),
        })
    }

    pub fn body(&self) -> Bytes {
        self.index_data.clone()
    }
}

// =========================== shared ===========================

#[derive(Clone, Debug, PartialEq)]
pub struct AppHeartBeatRequest {
    pub request_id: i64,
    pub app_id: String,
}

impl AppHeartBeatRequest {
    pub fn encode(&self, dst: &mut BytesMut) {
        dst.put_i64(self.request_id);
        put_string(dst, &self.app_id);
    }

    pub fn decode(src: &mut Cursor<&[u8]>) -> Result<Self, WireError> {
        Ok(Self {
            request_id: get_i64(src)?,
            app_id: get_string(src)?,
        })
    }
}

// =========================== coordinator ===========================

#[derive(Clone, Debug, PartialEq)]
pub struct GetShuffleAssignmentsRequest {
    pub request_id: i64,
    pub app_id: String,
    pub shuffle_id: i32,
    pub partition_num: i32,
    pub partition_num_per_range: i32,
    pub replica: i32,
    pub required_tags: Vec<String>,
}

impl GetShuffleAssignmentsRequest {
    pub fn encode(&self, dst: &mut BytesMut) {
        dst.put_i64(self.request_id);
        put_string(dst, &self.app_id);
        dst.put_i32(self.shuffle_id);
        dst.put_i32(self.partition_num);
        dst.put_i32(self.partition_num_per_range);
        dst.put_i32(self.replica);
        dst.put_i32(self.required_tags.len() as i32);
        for tag in &self.required_tags {
            put_string(dst, tag);
        }
    }

    pub fn decode(src: &mut Cursor<&[u8]>) -> Result<Self, WireError> {
        let request_id = get_i64(src)?;
        let app_id = get_string(src)?;
        let shuffle_id = get_i32(src)?;
        let partition_num = get_i32(src)?;
        let partition_num_per_range = get_i32(src)?;
        let replica = get_i32(src)?;
        let tag_num = get_i32(src)?;
        let mut required_tags = Vec::with_capacity(tag_num as usize);
        for _ in 0..tag_num {
            required_tags.push(get_string(src)?);
        }
        Ok(Self {
            request_id,
            app_id,
            shuffle_id,
            partition_num,
            partition_num_per_range,
            replica,
            required_tags,
        })
    }
}

/// One partition range together with its ordered replica server list.
#[derive(Clone, Debug, PartialEq)]
pub struct PartitionRangeAssignment {
    pub range: PartitionRange,
    pub servers: Vec<ShuffleServerInfo>,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct GetShuffleAssignmentsResponse {
    pub request_id: i64,
    pub status_code: i32,
    pub ret_msg: String,
    pub assignments: Vec<PartitionRangeAssignment>,
}

fn put_server(dst: &mut BytesMut, server: &ShuffleServerInfo) {
    put_string(dst, &server.id);
    put_string(dst, &server.host);
    dst.put_u16(server.port);
}

fn get_server(src: &mut Cursor<&[u8]>) -> Result<ShuffleServerInfo, WireError> {
    Ok(ShuffleServerInfo {
        id: get_string(src)?,
        host: get_string(src)?,
        port: get_u16(src)?,
    })
}

impl GetShuffleAssignmentsResponse {
    pub fn encode(&self, dst: &mut BytesMut) {
        dst.put_i64(self.request_id);
        dst.put_i32(self.status_code);
        put_string(dst, &self.ret_msg);
        dst.put_i32(self.assignments.len() as i32);
        for assignment in &self.assignments {
            dst.put_i32(assignment.range.start);
            dst.put_i32(assignment.range.end);
            dst.put_i32(assignment.servers.len() as i32);
            for server in &assignment.servers {
                put_server(dst, server);
            }
        }
    }

    pub fn decode(src: &mut Cursor<&[u8]>) -> Result<Self, WireError> {
        let request_id = get_i64(src)?;
        let status_code = get_i32(src)?;
        let ret_msg = get_string(src)?;
        let assignment_num = get_i32(src)?;
        let mut assignments = Vec::with_capacity(assignment_num as usize);
        for _ in 0..assignment_num {
            let start = get_i32(src)?;
            let end = get_i32(src)?;
            let server_num = get_i32(src)?;
            let mut servers = Vec::with_capacity(server_num as usize);
            for _ in 0..server_num {
                servers.push(get_server(src)?);
            }
            assignments.push(PartitionRangeAssignment {
                range: PartitionRange::new(start, end),
                servers,
            });
        }
        Ok(Self {
            request_id,
            status_code,
            ret_msg,
            assignments,
        })
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct AccessClusterRequest {
    pub request_id: i64,
    pub access_id: String,
    pub tags: Vec<String>,
    pub timeout_ms: i64,
}

impl AccessClusterRequest {
    pub fn encode(&self, dst: &mut BytesMut) {
        dst.put_i64(self.request_id);
        put_string(dst, &self.access_id);
        dst.put_i32(self.tags.len() as i32);
        for tag in &self.tags {
            put_string(dst, tag);
        }
        dst.put_i64(self.timeout_ms);
    }

    pub fn decode(src: &mut Cursor<&[u8]>) -> Result<Self, WireError> {
        let request_id = get_i64(src)?;
        let access_id = get_string(src)?;
        let tag_num = get_i32(src)?;
        let mut tags = Vec::with_capacity(tag_num as usize);
        for _ in 0..tag_num {
            tags.push(get_string(src)?);
        }
        let timeout_ms = get_i64(src)?;
        Ok(Self {
            request_id,
            access_id,
            tags,
            timeout_ms,
        })
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct FetchClientConfRequest {
    pub request_id: i64,
    pub timeout_ms: i64,
}

impl FetchClientConfRequest {
    pub fn encode(&self, dst: &mut BytesMut) {
        dst.put_i64(self.request_id);
        dst.put_i64(self.timeout_ms);
    }

    pub fn decode(src: &mut Cursor<&[u8]>) -> Result<Self, WireError> {
        Ok(Self {
            request_id: get_i64(src)?,
            timeout_ms: get_i64(src)?,
        })
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct FetchClientConfResponse {
    pub request_id: i64,
    pub status_code: i32,
    pub ret_msg: String,
    pub client_conf: Vec<(String, String)>,
}

impl FetchClientConfResponse {
    pub fn encode(&self, dst: &mut BytesMut) {
        dst.put_i64(self.request_id);
        dst.put_i32(self.status_code);
        put_string(dst, &self.ret_msg);
        dst.put_i32(self.client_conf.len() as i32);
        for (k, v) in &self.client_conf {
            put_string(dst, k);
            put_string(dst, v);
        }
    }

    pub fn decode(src: &mut Cursor<&[u8]>) -> Result<Self, WireError> {
        let request_id = get_i64(src)?;
        let status_code = get_i32(src)?;
        let ret_msg = get_string(src)?;
        let conf_num = get_i32(src)?;
        let mut client_conf = Vec::with_capacity(conf_num as usize);
        for _ in 0..conf_num {
            let k = get_string(src)?;
            let v = get_string(src)?;
            client_conf.push((k, v));
        }
        Ok(Self {
            request_id,
            status_code,
            ret_msg,
            client_conf,
        })
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct FetchRemoteStorageRequest {
    pub request_id: i64,
    pub app_id: String,
}

impl FetchRemoteStorageRequest {
    pub fn encode(&self, dst: &mut BytesMut) {
        dst.put_i64(self.request_id);
        put_string(dst, &self.app_id);
    }

    pub fn decode(src: &mut Cursor<&[u8]>) -> Result<Self, WireError> {
        Ok(Self {
            request_id: get_i64(src)?,
            app_id: get_string(src)?,
        })
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct FetchRemoteStorageResponse {
    pub request_id: i64,
    pub status_code: i32,
    pub ret_msg: String,
    pub remote_storage: RemoteStorageInfo,
}

impl FetchRemoteStorageResponse {
    pub fn encode(&self, dst: &mut BytesMut) {
        dst.put_i64(self.request_id);
        dst.put_i32(self.status_code);
        put_string(dst, &self.ret_msg);
        put_string(dst, &self.remote_storage.path);
        dst.put_i32(self.remote_storage.conf_overrides.len() as i32);
        for (k, v) in &self.remote_storage.conf_overrides {
            put_string(dst, k);
            put_string(dst, v);
        }
    }

    pub fn decode(src: &mut Cursor<&[u8]>) -> Result<Self, WireError> {
        let request_id = get_i64(src)?;
        let status_code = get_i32(src)?;
        let ret_msg = get_string(src)?;
        let path = get_string(src)?;
        let conf_num = get_i32(src)?;
        let mut conf_overrides = HashMap::with_capacity(conf_num as usize);
        for _ in 0..conf_num {
            let k = get_string(src)?;
            let v = get_string(src)?;
            conf_overrides.insert(k, v);
        }
        Ok(Self {
            request_id,
            status_code,
            ret_msg,
            remote_storage: RemoteStorageInfo {
                path,
                conf_overrides,
            },
        })
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ServerHeartBeatRequest {
    pub request_id: i64,
    pub server: ShuffleServerInfo,
    pub used_memory: i64,
    pub pre_allocated_memory: i64,
    pub available_memory: i64,
    pub event_num_in_flush: i32,
    pub app_num: i32,
    pub partition_num: i64,
    pub tags: Vec<String>,
    pub is_healthy: bool,
}

impl ServerHeartBeatRequest {
    pub fn encode(&self, dst: &mut BytesMut) {
        dst.put_i64(self.request_id);
        put_server(dst, &self.server);
        dst.put_i64(self.used_memory);
        dst.put_i64(self.pre_allocated_memory);
        dst.put_i64(self.available_memory);
        dst.put_i32(self.event_num_in_flush);
        dst.put_i32(self.app_num);
        dst.put_i64(self.partition_num);
        dst.put_i32(self.tags.len() as i32);
        for tag in &self.tags {
            put_string(dst, tag);
        }
        dst.put_u8(if self.is_healthy { 1 } else { 0 });
    }

    pub fn decode(src: &mut Cursor<&[u8]>) -> Result<Self, WireError> {
        let request_id = get_i64(src)?;
        let server = get_server(src)?;
        let used_memory = get_i64(src)?;
        let pre_allocated_memory = get_i64(src)?;
        let available_memory = get_i64(src)?;
        let event_num_in_flush = get_i32(src)?;
        let app_num = get_i32(src)?;
        let partition_num = get_i64(src)?;
        let tag_num = get_i32(src)?;
        let mut tags = Vec::with_capacity(tag_num as usize);
        for _ in 0..tag_num {
            tags.push(get_string(src)?);
        }
        let is_healthy = {
            if !src.has_remaining() {
                return Err(WireError::STREAM_INCORRECT("get_u8".into()));
            }
            src.get_u8() == 1
        };
        Ok(Self {
            request_id,
            server,
            used_memory,
            pre_allocated_memory,
            available_memory,
            event_num_in_flush,
            app_num,
            partition_num,
            tags,
            is_healthy,
        })
    }
}
