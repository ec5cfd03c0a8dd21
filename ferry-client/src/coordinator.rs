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
use ferry_core::common::RemoteStorageInfo;
use ferry_core::rpc::client::{RetryPolicy, RpcClient};
use ferry_core::rpc::frame::Frame;
use ferry_core::rpc::messages::*;
use ferry_core::status::StatusCode;

/// One coordinator endpoint. The write client fails over across the
/// quorum list, so every call here is a single attempt with rpc-layer
/// retries only.
pub struct CoordinatorClient {
    client: RpcClient,
    retry_policy: RetryPolicy,
}

impl CoordinatorClient {
    pub fn new(target: impl Into<String>, retry_policy: RetryPolicy) -> Self {
        Self {
            client: RpcClient::new(target),
            retry_policy,
        }
    }

    pub fn desc(&self) -> String {
        format!("Coordinator[{}]", self.client.target())
    }

    async fn call(&self, frame: Frame) -> Result<Frame, ClientError> {
        Ok(self.client.call_with_retry(frame, &self.retry_policy).await?)
    }

    pub async fn get_shuffle_assignments(
        &self,
        app_id: &str,
        shuffle_id: i32,
        partition_num: i32,
        partition_num_per_range: i32,
        replica: i32,
        required_tags: Vec<String>,
    ) -> Result<GetShuffleAssignmentsResponse, ClientError> {
        let response = self
            .call(Frame::GetShuffleAssignments(GetShuffleAssignmentsRequest {
                request_id: self.client.next_request_id(),
                app_id: app_id.to_string(),
                shuffle_id,
                partition_num,
                partition_num_per_range,
                replica,
                required_tags,
            }))
            .await?;
        match response {
            Frame::GetShuffleAssignmentsResponse(resp) => Ok(resp),
            other => Err(ClientError::UNEXPECTED_RESPONSE(other.name().to_string())),
        }
    }

    pub async fn access_cluster(
        &self,
        access_id: &str,
        tags: Vec<String>,
        timeout_ms: i64,
    ) -> Result<(StatusCode, String), ClientError> {
        let response = self
            .call(Frame::AccessCluster(AccessClusterRequest {
                request_id: self.client.next_request_id(),
                access_id: access_id.to_string(),
                tags,
                timeout_ms,
            }))
            .await?;
        match response {
            Frame::RpcResponse(resp) => {
                Ok((StatusCode::from_i32(resp.status_code), resp.ret_msg))
            }
            other => Err(ClientError::UNEXPECTED_RESPONSE(other.name().to_string())),
        }
    }

    pub async fn fetch_client_conf(
        &self,
        timeout_ms: i64,
    ) -> Result<Vec<(String, String)>, ClientError> {
        let response = self
            .call(Frame::FetchClientConf(FetchClientConfRequest {
                request_id: self.client.next_request_id(),
                timeout_ms,
            }))
            .await?;
        match response {
            Frame::FetchClientConfResponse(resp) => {
                if StatusCode::from_i32(resp.status_code).is_success() {
                    Ok(resp.client_conf)
                } else {
                    Err(ClientError::SERVER_ERROR {
                        server: self.desc(),
                        status: resp.status_code,
                        message: resp.ret_msg,
                    })
                }
            }
            other => Err(ClientError::UNEXPECTED_RESPONSE(other.name().to_string())),
        }
    }

    pub async fn fetch_remote_storage(
        &self,
        app_id: &str,
    ) -> Result<RemoteStorageInfo, ClientError> {
        let response = self
            .call(Frame::FetchRemoteStorage(FetchRemoteStorageRequest {
                request_id: self.client.next_request_id(),
                app_id: app_id.to_string(),
            }))
            .await?;
        match response {
            Frame::FetchRemoteStorageResponse(resp) => {
                if StatusCode::from_i32(resp.status_code).is_success() {
                    Ok(resp.remote_storage)
                } else {
                    Err(ClientError::SERVER_ERROR {
                        server: self.desc(),
                        status: resp.status_code,
                        message: resp.ret_msg,
                    })
                }
            }
            other => Err(ClientError::UNEXPECTED_RESPONSE(other.name().to_string())),
        }
    }

    pub async fn app_heartbeat(&self, app_id: &str) -> Result<StatusCode, ClientError> {
        let response = self
            .call(Frame::AppHeartBeat(AppHeartBeatRequest {
                request_id: self.client.next_request_id(),
                app_id: app_id.to_string(),
            }))
            .await?;
        match response {
            Frame::RpcResponse(resp) => Ok(StatusCode::from_i32(resp.status_code)),
            other => Err(ClientError::UNEXPECTED_RESPONSE(other.name().to_string())),
        }
    }
}
