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

use crate::error::ClientError;
use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;
use ferry_core::common::{PartitionRange, RemoteStorageInfo, ShuffleBlock, ShuffleServerInfo};
use ferry_core::rpc::client::{RetryPolicy, RpcClient};
use ferry_core::rpc::frame::Frame;
use ferry_core::rpc::messages::*;
use ferry_core::status::StatusCode;
use std::sync::Arc;

/// The client-side seam onto one shuffle server. Production binds it to
/// the wire; tests substitute fakes to drive the quorum paths.
#[async_trait]
pub trait ShuffleServerClient: Send + Sync {
    async fn register_shuffle(
        &self,
        app_id: &str,
        shuffle_id: i32,
        partition_ranges: Vec<PartitionRange>,
        remote_storage: RemoteStorageInfo,
    ) -> Result<StatusCode, ClientError>;

    async fn send_shuffle_data(
        &self,
        app_id: &str,
        shuffle_id: i32,
        partition_blocks: Vec<(i32, Vec<ShuffleBlock>)>,
    ) -> Result<StatusCode, ClientError>;

    async fn send_commit(&self, app_id: &str, shuffle_id: i32)
        -> Result<(StatusCode, i32), ClientError>;

    async fn finish_shuffle(&self, app_id: &str, shuffle_id: i32)
        -> Result<StatusCode, ClientError>;

    async fn report_shuffle_result(
        &self,
        app_id: &str,
        shuffle_id: i32,
        task_attempt_id: i64,
        bitmap_num: i32,
        partition_to_block_ids: Vec<(i32, Vec<i64>)>,
    ) -> Result<StatusCode, ClientError>;

    async fn get_shuffle_result(
        &self,
        app_id: &str,
        shuffle_id: i32,
        partition_id: i32,
    ) -> Result<(StatusCode, Bytes), ClientError>;

    async fn get_shuffle_data(
        &self,
        app_id: &str,
        shuffle_id: i32,
        partition_id: i32,
        offset: i64,
        length: i32,
    ) -> Result<(StatusCode, Bytes), ClientError>;

    async fn get_shuffle_index(
        &self,
        app_id: &str,
        shuffle_id: i32,
        partition_id: i32,
    ) -> Result<(StatusCode, Bytes, i64), ClientError>;

    async fn unregister_shuffle(
        &self,
        app_id: &str,
        shuffle_id: Option<i32>,
    ) -> Result<StatusCode, ClientError>;

    async fn app_heartbeat(&self, app_id: &str) -> Result<StatusCode, ClientError>;
}

/// The wire-backed implementation over the framed tcp protocol.
pub struct RpcShuffleServerClient {
    client: RpcClient,
    retry_policy: RetryPolicy,
}

impl RpcShuffleServerClient {
    pub fn new(server: &ShuffleServerInfo, retry_policy: RetryPolicy) -> Self {
        Self {
            client: RpcClient::new(server.address()),
            retry_policy,
        }
    }

    async fn call(&self, frame: Frame) -> Result<Frame, ClientError> {
        Ok(self.client.call_with_retry(frame, &self.retry_policy).await?)
    }
}

fn unexpected(frame: Frame) -> ClientError {
    ClientError::UNEXPECTED_RESPONSE(frame.name().to_string())
}

#[async_trait]
impl ShuffleServerClient for RpcShuffleServerClient {
    async fn register_shuffle(
        &self,
        app_id: &str,
        shuffle_id: i32,
        partition_ranges: Vec<PartitionRange>,
        remote_storage: RemoteStorageInfo,
    ) -> Result<StatusCode, ClientError> {
        let response = self
            .call(Frame::RegisterShuffle(RegisterShuffleRequest {
                request_id: self.client.next_request_id(),
                app_id: app_id.to_string(),
                shuffle_id,
                partition_ranges,
                remote_storage,
            }))
            .await?;
        match response {
            Frame::RpcResponse(resp) => Ok(StatusCode::from_i32(resp.status_code)),
            other => Err(unexpected(other)),
        }
    }

    async fn send_shuffle_data(
        &self,
        app_id: &str,
        shuffle_id: i32,
        partition_blocks: Vec<(i32, Vec<ShuffleBlock>)>,
    ) -> Result<StatusCode, ClientError> {
        let response = self
            .call(Frame::SendShuffleData(SendShuffleDataRequest {
                request_id: self.client.next_request_id(),
                app_id: app_id.to_string(),
                shuffle_id,
                timestamp: ferry_core::util::now_timestamp_as_millis() as i64,
                partition_blocks,
            }))
            .await?;
        match response {
            Frame::RpcResponse(resp) => Ok(StatusCode::from_i32(resp.status_code)),
            other => Err(unexpected(other)),
        }
    }

    async fn send_commit(
        &self,
        app_id: &str,
        shuffle_id: i32,
    ) -> Result<(StatusCode, i32), ClientError> {
        let response = self
            .call(Frame::SendCommit(SendCommitRequest {
                request_id: self.client.next_request_id(),
                app_id: app_id.to_string(),
                shuffle_id,
            }))
            .await?;
        match response {
            Frame::SendCommitResponse(resp) => {
                Ok((StatusCode::from_i32(resp.status_code), resp.commit_count))
            }
            other => Err(unexpected(other)),
        }
    }

    async fn finish_shuffle(
        &self,
        app_id: &str,
        shuffle_id: i32,
    ) -> Result<StatusCode, ClientError> {
        let response = self
            .call(Frame::FinishShuffle(FinishShuffleRequest {
                request_id: self.client.next_request_id(),
                app_id: app_id.to_string(),
                shuffle_id,
            }))
            .await?;
        match response {
            Frame::RpcResponse(resp) => Ok(StatusCode::from_i32(resp.status_code)),
            other => Err(unexpected(other)),
        }
    }

    async fn report_shuffle_result(
        &self,
        app_id: &str,
        shuffle_id: i32,
        task_attempt_id: i64,
        bitmap_num: i32,
        partition_to_block_ids: Vec<(i32, Vec<i64>)>,
    ) -> Result<StatusCode, ClientError> {
        let response = self
            .call(Frame::ReportShuffleResult(ReportShuffleResultRequest {
                request_id: self.client.next_request_id(),
                app_id: app_id.to_string(),
                shuffle_id,
                task_attempt_id,
                bitmap_num,
                partition_to_block_ids,
            }))
            .await?;
        match response {
            Frame::RpcResponse(resp) => Ok(StatusCode::from_i32(resp.status_code)),
            other => Err(unexpected(other)),
        }
    }

    async fn get_shuffle_result(
        &self,
        app_id: &str,
        shuffle_id: i32,
        partition_id: i32,
    ) -> Result<(StatusCode, Bytes), ClientError> {
        let response = self
            .call(Frame::GetShuffleResult(GetShuffleResultRequest {
                request_id: self.client.next_request_id(),
                app_id: app_id.to_string(),
                shuffle_id,
                partition_id,
            }))
            .await?;
        match response {
            Frame::GetShuffleResultResponse(resp) => Ok((
                StatusCode::from_i32(resp.status_code),
                resp.serialized_bitmap,
            )),
            other => Err(unexpected(other)),
        }
    }

    async fn get_shuffle_data(
        &self,
        app_id: &str,
        shuffle_id: i32,
        partition_id: i32,
        offset: i64,
        length: i32,
    ) -> Result<(StatusCode, Bytes), ClientError> {
        let response = self
            .call(Frame::GetShuffleData(GetShuffleDataRequest {
                request_id: self.client.next_request_id(),
                app_id: app_id.to_string(),
                shuffle_id,
                partition_id,
                offset,
                length,
            }))
            .await?;
        match response {
            Frame::GetShuffleDataResponse(resp) => {
                Ok((StatusCode::from_i32(resp.status_code), resp.data))
            }
            other => Err(unexpected(other)),
        }
    }

    async fn get_shuffle_index(
        &self,
        app_id: &str,
        shuffle_id: i32,
        partition_id: i32,
    ) -> Result<(StatusCode, Bytes, i64), ClientError> {
        let response = self
            .call(Frame::GetShuffleIndex(GetShuffleIndexRequest {
                request_id: self.client.next_request_id(),
                app_id: app_id.to_string(),
                shuffle_id,
                partition_id,
            }))
            .await?;
        match response {
            Frame::GetShuffleIndexResponse(resp) => Ok((
                StatusCode::from_i32(resp.status_code),
                resp.index_data,
                resp.data_file_len,
            )),
            other => Err(unexpected(other)),
        }
    }

    async fn unregister_shuffle(
        &self,
        app_id: &str,
        shuffle_id: Option<i32>,
    ) -> Result<StatusCode, ClientError> {
        let response = self
            .call(Frame::UnregisterShuffle(UnregisterShuffleRequest {
                request_id: self.client.next_request_id(),
                app_id: app_id.to_string(),
                shuffle_id: shuffle_id.unwrap_or(-1),
            }))
            .await?;
        match response {
            Frame::RpcResponse(resp) => Ok(StatusCode::from_i32(resp.status_code)),
            other => Err(unexpected(other)),
        }
    }

    async fn app_heartbeat(&self, app_id: &str) -> Result<StatusCode, ClientError> {
        let response = self
            .call(Frame::AppHeartBeat(AppHeartBeatRequest {
                request_id: self.client.next_request_id(),
                app_id: app_id.to_string(),
            }))
            .await?;
        match response {
            Frame::RpcResponse(resp) => Ok(StatusCode::from_i32(resp.status_code)),
            other => Err(unexpected(other)),
        }
    }
}

/// Hands out one cached client per shuffle server. The test seam: fakes
/// implement this to stand in for whole servers.
pub trait ShuffleServerClientFactory: Send + Sync {
    fn get_client(&self, server: &ShuffleServerInfo) -> Arc<dyn ShuffleServerClient>;
}

pub struct RpcShuffleServerClientFactory {
    retry_policy: RetryPolicy,
    cache: DashMap<ShuffleServerInfo, Arc<dyn ShuffleServerClient>>,
}

impl RpcShuffleServerClientFactory {
    pub fn new(retry_policy: RetryPolicy) -> Self {
        Self {
            retry_policy,
            cache: DashMap::new(),
        }
    }
}

impl ShuffleServerClientFactory for RpcShuffleServerClientFactory {
    fn get_client(&self, server: &ShuffleServerInfo) -> Arc<dyn ShuffleServerClient> {
        self.cache
            .entry(server.clone())
            .or_insert_with(|| {
                Arc::new(RpcShuffleServerClient::new(server, self.retry_policy))
                    as Arc<dyn ShuffleServerClient>
            })
            .clone()
    }
}
