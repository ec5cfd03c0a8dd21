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

use crate::error::WireError;
use crate::error::WireError::{STREAM_INCOMPLETE, STREAM_INCORRECT};
use crate::rpc::messages::*;
use bytes::{Buf, BufMut, Bytes, BytesMut};
use std::io::Cursor;

///
/// The encoded frame:
///
/// HEADER
/// 1. content_length   (i32, 4 bytes)
/// 2. message_type     (u8, 1 byte)
/// 3. body_length      (i32, 4 bytes)
///
/// CONTENT: scalar fields, big endian
/// BODY: opaque payload (data / index / bitmap), raw bytes
///
const HEADER_LEN: usize = 4 + 1 + 4;

#[allow(non_camel_case_types)]
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
#[repr(u8)]
enum MessageType {
    RpcResponse = 0,

    AppHeartBeat = 1,
    RegisterShuffle = 2,
    SendShuffleData = 3,
    SendCommit = 4,
    FinishShuffle = 5,
    ReportShuffleResult = 6,
    GetShuffleResult = 7,
    GetShuffleData = 8,
    GetShuffleIndex = 9,
    UnregisterShuffle = 10,

    SendCommitResponse = 14,
    GetShuffleResultResponse = 17,
    GetShuffleDataResponse = 18,
    GetShuffleIndexResponse = 19,

    GetShuffleAssignments = 20,
    AccessCluster = 21,
    FetchClientConf = 22,
    FetchRemoteStorage = 23,
    ServerHeartBeat = 24,

    GetShuffleAssignmentsResponse = 30,
    FetchClientConfResponse = 32,
    FetchRemoteStorageResponse = 33,
}

impl MessageType {
    fn from_u8(value: u8) -> Result<MessageType, WireError> {
        let msg_type = match value {
            0 => MessageType::RpcResponse,
            1 => MessageType::AppHeartBeat,
            2 => MessageType::RegisterShuffle,
            3 => MessageType::SendShuffleData,
            4 => MessageType::SendCommit,
            5 => MessageType::FinishShuffle,
            6 => MessageType::ReportShuffleResult,
            7 => MessageType::GetShuffleResult,
            8 => MessageType::GetShuffleData,
            9 => MessageType::GetShuffleIndex,
            10 => MessageType::UnregisterShuffle,
            14 => MessageType::SendCommitResponse,
            17 => MessageType::GetShuffleResultResponse,
            18 => MessageType::GetShuffleDataResponse,
            19 => MessageType::GetShuffleIndexResponse,
            20 => MessageType::GetShuffleAssignments,
            21 => MessageType::AccessCluster,
            22 => MessageType::FetchClientConf,
            23 => MessageType::FetchRemoteStorage,
            24 => MessageType::ServerHeartBeat,
            30 => MessageType::GetShuffleAssignmentsResponse,
            32 => MessageType::FetchClientConfResponse,
            33 => MessageType::FetchRemoteStorageResponse,
            other => return Err(WireError::STREAM_MESSAGE_TYPE_NOT_FOUND(other)),
        };
        Ok(msg_type)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    RpcResponse(RpcResponse),

    AppHeartBeat(AppHeartBeatRequest),
    RegisterShuffle(RegisterShuffleRequest),
    SendShuffleData(SendShuffleDataRequest),
    SendCommit(SendCommitRequest),
    FinishShuffle(FinishShuffleRequest),
    ReportShuffleResult(ReportShuffleResultRequest),
    GetShuffleResult(GetShuffleResultRequest),
    GetShuffleData(GetShuffleDataRequest),
    GetShuffleIndex(GetShuffleIndexRequest),
    UnregisterShuffle(UnregisterShuffleRequest),

    SendCommitResponse(SendCommitResponse),
    GetShuffleResultResponse(GetShuffleResultResponse),
    GetShuffleDataResponse(GetShuffleDataResponse),
    GetShuffleIndexResponse(GetShuffleIndexResponse),

    GetShuffleAssignments(GetShuffleAssignmentsRequest),
    AccessCluster(AccessClusterRequest),
    FetchClientConf(FetchClientConfRequest),
    FetchRemoteStorage(FetchRemoteStorageRequest),
    ServerHeartBeat(ServerHeartBeatRequest),

    GetShuffleAssignmentsResponse(GetShuffleAssignmentsResponse),
    FetchClientConfResponse(FetchClientConfResponse),
    FetchRemoteStorageResponse(FetchRemoteStorageResponse),
}

impl Frame {
    fn message_type(&self) -> MessageType {
        match self {
            Frame::RpcResponse(_) => MessageType::RpcResponse,
            Frame::AppHeartBeat(_) => MessageType::AppHeartBeat,
            Frame::RegisterShuffle(_) => MessageType::RegisterShuffle,
            Frame::SendShuffleData(_) => MessageType::SendShuffleData,
            Frame::SendCommit(_) => MessageType::SendCommit,
            Frame::FinishShuffle(_) => MessageType::FinishShuffle,
            Frame::ReportShuffleResult(_) => MessageType::ReportShuffleResult,
            Frame::GetShuffleResult(_) => MessageType::GetShuffleResult,
            Frame::GetShuffleData(_) => MessageType::GetShuffleData,
            Frame::GetShuffleIndex(_) => MessageType::GetShuffleIndex,
            Frame::UnregisterShuffle(_) => MessageType::UnregisterShuffle,
            Frame::SendCommitResponse(_) => MessageType::SendCommitResponse,
            Frame::GetShuffleResultResponse(_) => MessageType::GetShuffleResultResponse,
            Frame::GetShuffleDataResponse(_) => MessageType::GetShuffleDataResponse,
            Frame::GetShuffleIndexResponse(_) => MessageType::GetShuffleIndexResponse,
            Frame::GetShuffleAssignments(_) => MessageType::GetShuffleAssignments,
            Frame::AccessCluster(_) => MessageType::AccessCluster,
            Frame::FetchClientConf(_) => MessageType::FetchClientConf,
            Frame::FetchRemoteStorage(_) => MessageType::FetchRemoteStorage,
            Frame::ServerHeartBeat(_) => MessageType::ServerHeartBeat,
            Frame::GetShuffleAssignmentsResponse(_) => MessageType::GetShuffleAssignmentsResponse,
            Frame::FetchClientConfResponse(_) => MessageType::FetchClientConfResponse,
            Frame::FetchRemoteStorageResponse(_) => MessageType::FetchRemoteStorageResponse,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Frame::RpcResponse(_) => "RpcResponse",
            Frame::AppHeartBeat(_) => "AppHeartBeat",
            Frame::RegisterShuffle(_) => "RegisterShuffle",
            Frame::SendShuffleData(_) => "SendShuffleData",
            Frame::SendCommit(_) => "SendCommit",
            Frame::FinishShuffle(_) => "FinishShuffle",
            Frame::ReportShuffleResult(_) => "ReportShuffleResult",
            Frame::GetShuffleResult(_) => "GetShuffleResult",
            Frame::GetShuffleData(_) => "GetShuffleData",
            Frame::GetShuffleIndex(_) => "GetShuffleIndex",
            Frame::UnregisterShuffle(_) => "UnregisterShuffle",
            Frame::SendCommitResponse(_) => "SendCommitResponse",
            Frame::GetShuffleResultResponse(_) => "GetShuffleResultResponse",
            Frame::GetShuffleDataResponse(_) => "GetShuffleDataResponse",
            Frame::GetShuffleIndexResponse(_) => "GetShuffleIndexResponse",
            Frame::GetShuffleAssignments(_) => "GetShuffleAssignments",
            Frame::AccessCluster(_) => "AccessCluster",
            Frame::FetchClientConf(_) => "FetchClientConf",
            Frame::FetchRemoteStorage(_) => "FetchRemoteStorage",
            Frame::ServerHeartBeat(_) => "ServerHeartBeat",
            Frame::GetShuffleAssignmentsResponse(_) => "GetShuffleAssignmentsResponse",
            Frame::FetchClientConfResponse(_) => "FetchClientConfResponse",
            Frame::FetchRemoteStorageResponse(_) => "FetchRemoteStorageResponse",
        }
    }

    /// The id that correlates a response to its request on one connection.
    pub fn request_id(&self) -> i64 {
        match self {
            Frame::RpcResponse(m) => m.request_id,
            Frame::AppHeartBeat(m) => m.request_id,
            Frame::RegisterShuffle(m) => m.request_id,
            Frame::SendShuffleData(m) => m.request_id,
            Frame::SendCommit(m) => m.request_id,
            Frame::FinishShuffle(m) => m.request_id,
            Frame::ReportShuffleResult(m) => m.request_id,
            Frame::GetShuffleResult(m) => m.request_id,
            Frame::GetShuffleData(m) => m.request_id,
            Frame::GetShuffleIndex(m) => m.request_id,
            Frame::UnregisterShuffle(m) => m.request_id,
            Frame::SendCommitResponse(m) => m.request_id,
            Frame::GetShuffleResultResponse(m) => m.request_id,
            Frame::GetShuffleDataResponse(m) => m.request_id,
            Frame::GetShuffleIndexResponse(m) => m.request_id,
            Frame::GetShuffleAssignments(m) => m.request_id,
            Frame::AccessCluster(m) => m.request_id,
            Frame::FetchClientConf(m) => m.request_id,
            Frame::FetchRemoteStorage(m) => m.request_id,
            Frame::ServerHeartBeat(m) => m.request_id,
            Frame::GetShuffleAssignmentsResponse(m) => m.request_id,
            Frame::FetchClientConfResponse(m) => m.request_id,
            Frame::FetchRemoteStorageResponse(m) => m.request_id,
        }
    }

    /// Encode the full frame (header + content + body) into a buffer ready
    /// to be written to the stream.
    pub fn encode(&self) -> Bytes {
        let mut content = BytesMut::new();
        let body = match self {
            Frame::RpcResponse(m) => {
                m.encode(&mut content);
                Bytes::new()
            }
            Frame::AppHeartBeat(m) => {
                m.encode(&mut content);
                Bytes::new()
            }
            Frame::RegisterShuffle(m) => {
                m.encode(&mut content);
                Bytes::new()
            }
            Frame::SendShuffleData(m) => {
                m.encode(&mut content);
                Bytes::new()
            }
            Frame::SendCommit(m) => {
                m.encode(&mut content);
                Bytes::new()
            }
            Frame::FinishShuffle(m) => {
                m.encode(&mut content);
                Bytes::new()
            }
            Frame::ReportShuffleResult(m) => {
                m.encode(&mut content);
                Bytes::new()
            }
            Frame::GetShuffleResult(m) => {
                m.encode(&mut content);
                Bytes::new()
            }
            Frame::GetShuffleData(m) => {
                m.encode(&mut content);
                Bytes::new()
            }
            Frame::GetShuffleIndex(m) => {
                m.encode(&mut content);
                Bytes::new()
            }
            Frame::UnregisterShuffle(m) => {
                m.encode(&mut content);
                Bytes::new()
            }
            Frame::SendCommitResponse(m) => {
                m.encode(&mut content);
                Bytes::new()
            }
            Frame::GetShuffleResultResponse(m) => {
                m.encode(&mut content);
                m.body()
            }
            Frame::GetShuffleDataResponse(m) => {
                m.encode(&mut content);
                m.body()
            }
            Frame::GetShuffleIndexResponse(m) => {
                m.encode(&mut content);
                m.body()
            }
            Frame::GetShuffleAssignments(m) => {
                m.encode(&mut content);
                Bytes::new()
            }
            Frame::AccessCluster(m) => {
                m.encode(&mut content);
                Bytes::new()
            }
            Frame::FetchClientConf(m) => {
                m.encode(&mut content);
                Bytes::new()
            }
            Frame::FetchRemoteStorage(m) => {
                m.encode(&mut content);
                Bytes::new()
            }
            Frame::ServerHeartBeat(m) => {
                m.encode(&mut content);
                Bytes::new()
            }
            Frame::GetShuffleAssignmentsResponse(m) => {
                m.encode(&mut content);
                Bytes::new()
            }
            Frame::FetchClientConfResponse(m) => {
                m.encode(&mut content);
                Bytes::new()
            }
            Frame::FetchRemoteStorageResponse(m) => {
                m.encode(&mut content);
                Bytes::new()
            }
        };

        let mut dst = BytesMut::with_capacity(HEADER_LEN + content.len() + body.len());
        dst.put_i32(content.len() as i32);
        dst.put_u8(self.message_type() as u8);
        dst.put_i32(body.len() as i32);
        dst.extend_from_slice(&content);
        dst.extend_from_slice(&body);
        dst.freeze()
    }

    /// Fast check whether a complete frame is buffered, advancing the
    /// cursor past it when so.
    pub fn check(src: &mut Cursor<&[u8]>) -> Result<(), WireError> {
        if Buf::remaining(src) < HEADER_LEN {
            return Err(STREAM_INCOMPLETE);
        }

        let content_len = get_i32(src)?;
        let _msg_type = get_u8(src)?;
        let body_len = get_i32(src)?;

        if Buf::remaining(src) < (content_len + body_len) as usize {
            return Err(STREAM_INCOMPLETE);
        }
        skip(src, (content_len + body_len) as usize)?;
        Ok(())
    }

    /// Parse one complete frame. Must only be invoked after a successful
    /// `check` on the same bytes.
    pub fn parse(src: &mut Cursor<&[u8]>) -> Result<Frame, WireError> {
        let content_len = get_i32(src)?;
        let msg_type = get_u8(src)?;
        let body_len = get_i32(src)?;

        if Buf::remaining(src) < (content_len + body_len) as usize {
            return Err(STREAM_INCOMPLETE);
        }

        let msg_type = MessageType::from_u8(msg_type)?;
        let frame = match msg_type {
            MessageType::RpcResponse => Frame::RpcResponse(RpcResponse::decode(src)?),
            MessageType::AppHeartBeat => Frame::AppHeartBeat(AppHeartBeatRequest::decode(src)?),
            MessageType::RegisterShuffle => {
                Frame::RegisterShuffle(RegisterShuffleRequest::decode(src)?)
            }
            MessageType::SendShuffleData => {
                Frame::SendShuffleData(SendShuffleDataRequest::decode(src)?)
            }
            MessageType::SendCommit => Frame::SendCommit(SendCommitRequest::decode(src)?),
            MessageType::FinishShuffle => Frame::FinishShuffle(FinishShuffleRequest::decode(src)?),
            MessageType::ReportShuffleResult => {
                Frame::ReportShuffleResult(ReportShuffleResultRequest::decode(src)?)
            }
            MessageType::GetShuffleResult => {
                Frame::GetShuffleResult(GetShuffleResultRequest::decode(src)?)
            }
            MessageType::GetShuffleData => {
                Frame::GetShuffleData(GetShuffleDataRequest::decode(src)?)
            }
            MessageType::GetShuffleIndex => {
                Frame::GetShuffleIndex(GetShuffleIndexRequest::decode(src)?)
            }
            MessageType::UnregisterShuffle => {
                Frame::UnregisterShuffle(UnregisterShuffleRequest::decode(src)?)
            }
            MessageType::SendCommitResponse => {
                Frame::SendCommitResponse(SendCommitResponse::decode(src)?)
            }
            MessageType::GetShuffleResultResponse => {
                let mut decoded = GetShuffleResultResponse::decode(src)?;
                decoded.serialized_bitmap = take_body(src, body_len)?;
                Frame::GetShuffleResultResponse(decoded)
            }
            MessageType::GetShuffleDataResponse => {
                let mut decoded = GetShuffleDataResponse::decode(src)?;
                decoded.data = take_body(src, body_len)?;
                Frame::GetShuffleDataResponse(decoded)
            }
            MessageType::GetShuffleIndexResponse => {
                let mut decoded = GetShuffleIndexResponse::decode(src)?;
                decoded.index_data = take_body(src, body_len)?;
                Frame::GetShuffleIndexResponse(decoded)
            }
            MessageType::GetShuffleAssignments => {
                Frame::GetShuffleAssignments(GetShuffleAssignmentsRequest::decode(src)?)
            }
            MessageType::AccessCluster => Frame::AccessCluster(AccessClusterRequest::decode(src)?),
            MessageType::FetchClientConf => {
                Frame::FetchClientConf(FetchClientConfRequest::decode(src)?)
            }
            MessageType::FetchRemoteStorage => {
                Frame::FetchRemoteStorage(FetchRemoteStorageRequest::decode(src)?)
            }
            MessageType::ServerHeartBeat => {
                Frame::ServerHeartBeat(ServerHeartBeatRequest::decode(src)?)
            }
            MessageType::GetShuffleAssignmentsResponse => {
                Frame::GetShuffleAssignmentsResponse(GetShuffleAssignmentsResponse::decode(src)?)
            }
            MessageType::FetchClientConfResponse => {
                Frame::FetchClientConfResponse(FetchClientConfResponse::decode(src)?)
            }
            MessageType::FetchRemoteStorageResponse => {
                Frame::FetchRemoteStorageResponse(FetchRemoteStorageResponse::decode(src)?)
            }
        };
        Ok(frame)
    }
}

/// The frame body directly trails the content section. The content decoder
/// consumes the scalar fields exactly, so the cursor sits at the body start.
fn take_body(src: &mut Cursor<&[u8]>, body_len: i32) -> Result<Bytes, WireError> {
    if body_len <= 0 {
        return Ok(Bytes::new());
    }
    let remaining = Buf::remaining(src);
    if remaining < body_len as usize {
        return Err(STREAM_INCORRECT(format!(
            "take_body: expected {} bytes, remaining {}",
            body_len, remaining
        )));
    }
    let body = Bytes::copy_from_slice(&Buf::chunk(src)[..body_len as usize]);
    skip(src, body_len as usize)?;
    Ok(body)
}

pub(crate) fn get_bytes(src: &mut Cursor<&[u8]>) -> Result<Option<Bytes>, WireError> {
    if !Buf::has_remaining(src) {
        return Err(STREAM_INCORRECT("get_bytes".into()));
    }
    let bytes_data_len = get_i32(src)?;
    if bytes_data_len <= 0 {
        return Ok(None);
    }

    if Buf::remaining(src) < bytes_data_len as usize {
        return Err(STREAM_INCORRECT(format!(
            "get_bytes but not have enough remaining bytes. expected: {}, real: {}",
            bytes_data_len,
            Buf::remaining(src)
        )));
    }

    let data = Bytes::copy_from_slice(&Buf::chunk(src)[..bytes_data_len as usize]);
    skip(src, bytes_data_len as usize)?;
    Ok(Some(data))
}

pub(crate) fn put_bytes(dst: &mut BytesMut, data: &Bytes) {
    dst.put_i32(data.len() as i32);
    dst.extend_from_slice(data);
}

pub(crate) fn get_i64(src: &mut Cursor<&[u8]>) -> Result<i64, WireError> {
    if Buf::remaining(src) < 8 {
        return Err(STREAM_INCORRECT("get_i64".into()));
    }
    Ok(src.get_i64())
}

pub(crate) fn get_i32(src: &mut Cursor<&[u8]>) -> Result<i32, WireError> {
    if Buf::remaining(src) < 4 {
        return Err(STREAM_INCORRECT("get_i32".into()));
    }
    Ok(src.get_i32())
}

pub(crate) fn get_u16(src: &mut Cursor<&[u8]>) -> Result<u16, WireError> {
    if Buf::remaining(src) < 2 {
        return Err(STREAM_INCORRECT("get_u16".into()));
    }
    Ok(src.get_u16())
}

pub(crate) fn get_u8(src: &mut Cursor<&[u8]>) -> Result<u8, WireError> {
    if !Buf::has_remaining(src) {
        return Err(STREAM_INCORRECT("get_u8".into()));
    }
    Ok(src.get_u8())
}

fn skip(src: &mut Cursor<&[u8]>, n: usize) -> Result<(), WireError> {
    if Buf::remaining(src) < n {
        return Err(STREAM_INCORRECT("skip".into()));
    }
    Buf::advance(src, n);
    Ok(())
}

pub(crate) fn put_string(dst: &mut BytesMut, value: &str) {
    let raw = value.as_bytes();
    dst.put_i32(raw.len() as i32);
    dst.extend_from_slice(raw);
}

pub(crate) fn get_string(src: &mut Cursor<&[u8]>) -> Result<String, WireError> {
    if !Buf::has_remaining(src) {
        return Err(STREAM_INCORRECT("get_string".into()));
    }
    let len = get_i32(src)?;
    if len <= 0 {
        return Ok("".into());
    }
    let len = len as usize;

    if Buf::remaining(src) < len {
        return Err(STREAM_INCORRECT(format!(
            "get_string. src remaining: {}. len: {}",
            Buf::remaining(src),
            len
        )));
    }

    let msg = Bytes::copy_from_slice(&Buf::chunk(src)[..len]);
    skip(src, len)?;

    Ok(String::from_utf8(msg.to_vec())?)
}

#[cfg(test)]
mod test {
    use crate::common::{PartitionRange, RemoteStorageInfo, ShuffleBlock, ShuffleServerInfo};
    use crate::error::WireError;
    use crate::rpc::frame::Frame;
    use crate::rpc::messages::*;
    use anyhow::Result;
    use bytes::{Buf, BufMut, Bytes, BytesMut};
    use std::io::Cursor;

    fn roundtrip(frame: Frame) -> Frame {
        let encoded = frame.encode();
        let mut cursor = Cursor::new(&encoded[..]);
        Frame::check(&mut cursor).expect("complete frame should pass check");
        cursor.set_position(0);
        Frame::parse(&mut cursor).expect("complete frame should parse")
    }

    #[test]
    fn frame_check_incomplete() {
        let mut raw = BytesMut::new();
        raw.put_i32(128);
        raw.put_u8(0);
        raw.put_i32(0);

        let cursor = &mut Cursor::new(&raw[..]);
        match Frame::check(cursor) {
            Err(WireError::STREAM_INCOMPLETE) => {}
            _ => panic!(),
        }

        raw.put(Bytes::from(vec![0u8; 128]));
        let cursor = &mut Cursor::new(&raw[..]);
        Frame::check(cursor).unwrap();
    }

    #[test]
    fn rpc_response_roundtrip() {
        let frame = Frame::RpcResponse(RpcResponse {
            request_id: 42,
            status_code: 0,
            ret_msg: "SUCCESS".to_string(),
        });
        assert_eq!(frame.clone(), roundtrip(frame));
    }

    #[test]
    fn send_shuffle_data_roundtrip() {
        let frame = Frame::SendShuffleData(SendShuffleDataRequest {
            request_id: 1,
            app_id: "app-1".to_string(),
            shuffle_id: 0,
            timestamp: 1234567,
            partition_blocks: vec![(
                7,
                vec![ShuffleBlock {
                    block_id: 100,
                    length: 11,
                    uncompress_length: 11,
                    crc: 99,
                    task_attempt_id: 3,
                    data: Bytes::from_static(b"hello world"),
                }],
            )],
        });
        assert_eq!(frame.clone(), roundtrip(frame));
    }

    #[test]
    fn register_shuffle_roundtrip() {
        let mut remote = RemoteStorageInfo::new("hdfs://ns1/ferry");
        remote
            .conf_overrides
            .insert("dfs.replication".to_string(), "2".to_string());
        let frame = Frame::RegisterShuffle(RegisterShuffleRequest {
            request_id: 2,
            app_id: "app-1".to_string(),
            shuffle_id: 3,
            partition_ranges: vec![PartitionRange::new(0, 2), PartitionRange::new(2, 4)],
            remote_storage: remote,
        });
        assert_eq!(frame.clone(), roundtrip(frame));
    }

    #[test]
    fn assignments_roundtrip() {
        let frame = Frame::GetShuffleAssignmentsResponse(GetShuffleAssignmentsResponse {
            request_id: 9,
            status_code: 0,
            ret_msg: "".to_string(),
            assignments: vec![PartitionRangeAssignment {
                range: PartitionRange::new(0, 1),
                servers: vec![
                    ShuffleServerInfo::new("s1", "10.0.0.1", 19999),
                    ShuffleServerInfo::new("s2", "10.0.0.2", 19999),
                ],
            }],
        });
        assert_eq!(frame.clone(), roundtrip(frame));
    }

    #[test]
    fn body_payload_roundtrip() {
        let frame = Frame::GetShuffleDataResponse(GetShuffleDataResponse {
            request_id: 11,
            status_code: 0,
            ret_msg: "".to_string(),
            data: Bytes::from_static(b"partition payload bytes"),
        });
        assert_eq!(frame.clone(), roundtrip(frame));

        let frame = Frame::GetShuffleIndexResponse(GetShuffleIndexResponse {
            request_id: 12,
            status_code: 0,
            ret_msg: "".to_string(),
            data_file_len: 1024,
            index_data: Bytes::from_static(b"index bytes"),
        });
        assert_eq!(frame.clone(), roundtrip(frame));
    }

    #[test]
    fn consecutive_frames_in_one_buffer() -> Result<()> {
        let first = Frame::AppHeartBeat(AppHeartBeatRequest {
            request_id: 1,
            app_id: "a".to_string(),
        });
        let second = Frame::FinishShuffle(FinishShuffleRequest {
            request_id: 2,
            app_id: "a".to_string(),
            shuffle_id: 0,
        });

        let mut buffered = BytesMut::new();
        buffered.extend_from_slice(&first.encode());
        buffered.extend_from_slice(&second.encode());

        let mut cursor = Cursor::new(&buffered[..]);
        Frame::check(&mut cursor)?;
        let first_end = cursor.position();
        cursor.set_position(0);
        assert_eq!(first, Frame::parse(&mut cursor)?);

        cursor.set_position(first_end);
        Frame::check(&mut cursor)?;
        cursor.set_position(first_end);
        assert_eq!(second, Frame::parse(&mut cursor)?);

        assert_eq!(0, Buf::remaining(&cursor));
        Ok(())
    }
}
