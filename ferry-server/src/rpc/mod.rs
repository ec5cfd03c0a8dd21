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

use crate::app::{
    AppManagerRef, PartitionedUId, PurgeReason, ReadingIndexViewContext, ReadingOptions,
    ReadingViewContext, WritingViewContext,
};
use anyhow::Result;
use bytes::Bytes;
use ferry_core::error::WireError;
use ferry_core::rpc::connection::Connection;
use ferry_core::rpc::frame::Frame;
use ferry_core::rpc::messages::*;
use ferry_core::status::StatusCode;
use log::{debug, error, info};
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Semaphore;

const MAX_CONNECTIONS: usize = 40000;

/// The shuffle server's rpc endpoint. Every error degrades to a status
/// code plus message, nothing is raised across the wire.
pub struct ShuffleServerRpcService {
    app_manager_ref: AppManagerRef,
}

impl ShuffleServerRpcService {
    pub fn from(app_manager_ref: AppManagerRef) -> Self {
        Self { app_manager_ref }
    }

    pub async fn start(self, listener: TcpListener) -> Result<()> {
        info!(
            "Shuffle server rpc service is listening on {}",
            listener.local_addr()?
        );
        let service = Arc::new(self);
        let limit_connections = Arc::new(Semaphore::new(MAX_CONNECTIONS));

        loop {
            let permit = limit_connections.clone().acquire_owned().await?;
            let (socket, addr) = listener.accept().await?;
            debug!("Accepted connection from client: {}", addr);

            let service = service.clone();
            tokio::spawn(async move {
                if let Err(e) = service.handle_connection(socket).await {
                    error!("Errors on handling the connection. err: {:#?}", e);
                }
                drop(permit);
            });
        }
    }

    async fn handle_connection(&self, socket: TcpStream) -> Result<(), WireError> {
        let mut connection = Connection::new(socket);
        while let Some(frame) = connection.read_frame().await? {
            let response = self.handle_frame(frame).await;
            connection.write_frame(&response).await?;
        }
        Ok(())
    }

    async fn handle_frame(&self, frame: Frame) -> Frame {
        match frame {
            Frame::RegisterShuffle(request) => self.register_shuffle(request),
            Frame::SendShuffleData(request) => self.send_shuffle_data(request).await,
            Frame::SendCommit(request) => self.send_commit(request).await,
            Frame::FinishShuffle(request) => self.finish_shuffle(request).await,
            Frame::ReportShuffleResult(request) => self.report_shuffle_result(request),
            Frame::GetShuffleResult(request) => self.get_shuffle_result(request),
            Frame::GetShuffleData(request) => self.get_shuffle_data(request).await,
            Frame::GetShuffleIndex(request) => self.get_shuffle_index(request).await,
            Frame::UnregisterShuffle(request) => self.unregister_shuffle(request),
            Frame::AppHeartBeat(request) => self.app_heartbeat(request),
            other => Frame::RpcResponse(RpcResponse {
                request_id: other.request_id(),
                status_code: StatusCode::INVALID_REQUEST.into(),
                ret_msg: format!("Unexpected verb for the shuffle server: {}", other.name()),
            }),
        }
    }

    fn rpc_response(request_id: i64, status: StatusCode, msg: impl Into<String>) -> Frame {
        Frame::RpcResponse(RpcResponse {
            request_id,
            status_code: status.into(),
            ret_msg: msg.into(),
        })
    }

    fn register_shuffle(&self, request: RegisterShuffleRequest) -> Frame {
        let remote_storage = if request.remote_storage.is_empty() {
            None
        } else {
            Some(request.remote_storage)
        };
        let result = self.app_manager_ref.register(
            request.app_id,
            request.shuffle_id,
            request.partition_ranges,
            remote_storage,
        );
        match result {
            Ok(_) => Self::rpc_response(request.request_id, StatusCode::SUCCESS, ""),
            Err(e) => {
                error!("Errors on registering shuffle. err: {:?}", e);
                Self::rpc_response(request.request_id, StatusCode::INTERNAL_ERROR, e.to_string())
            }
        }
    }

    async fn send_shuffle_data(&self, request: SendShuffleDataRequest) -> Frame {
        let app_id = request.app_id;
        let app = match self.app_manager_ref.get_app(&app_id) {
            Some(app) => app,
            _ => {
                return Self::rpc_response(
                    request.request_id,
                    StatusCode::NO_REGISTER,
                    "The app is not found",
                );
            }
        };

        for (partition_id, blocks) in request.partition_blocks {
            let uid = PartitionedUId {
                app_id: app_id.clone(),
                shuffle_id: request.shuffle_id,
                partition_id,
            };
            let ctx = WritingViewContext::new(uid.clone(), blocks);

            if let Err(err) = app.insert(ctx).await {
                let msg = format!(
                    "Errors on putting data. app_id: {}, err: {}",
                    &app_id, &err
                );
                error!("{}", &msg);
                return Self::rpc_response(request.request_id, err.to_status_code(), msg);
            }
        }

        Self::rpc_response(request.request_id, StatusCode::SUCCESS, "")
    }

    async fn send_commit(&self, request: SendCommitRequest) -> Frame {
        let app = match self.app_manager_ref.get_app(&request.app_id) {
            Some(app) => app,
            _ => {
                return Frame::SendCommitResponse(SendCommitResponse {
                    request_id: request.request_id,
                    status_code: StatusCode::NO_REGISTER.into(),
                    ret_msg: "The app is not found".to_string(),
                    commit_count: 0,
                });
            }
        };

        match app.commit_shuffle(request.shuffle_id).await {
            Ok(commit_count) => Frame::SendCommitResponse(SendCommitResponse {
                request_id: request.request_id,
                status_code: StatusCode::SUCCESS.into(),
                ret_msg: "".to_string(),
                commit_count,
            }),
            Err(e) => Frame::SendCommitResponse(SendCommitResponse {
                request_id: request.request_id,
                status_code: e.to_status_code().into(),
                ret_msg: e.to_string(),
                commit_count: 0,
            }),
        }
    }

    async fn finish_shuffle(&self, request: FinishShuffleRequest) -> Frame {
        let app = match self.app_manager_ref.get_app(&request.app_id) {
            Some(app) => app,
            _ => {
                return Self::rpc_response(
                    request.request_id,
                    StatusCode::NO_REGISTER,
                    "The app is not found",
                );
            }
        };
        match app.finish_shuffle(request.shuffle_id).await {
            Ok(_) => Self::rpc_response(request.request_id, StatusCode::SUCCESS, ""),
            Err(e) => Self::rpc_response(request.request_id, e.to_status_code(), e.to_string()),
        }
    }

    fn report_shuffle_result(&self, request: ReportShuffleResultRequest) -> Frame {
        let app = match self.app_manager_ref.get_app(&request.app_id) {
            Some(app) => app,
            _ => {
                return Self::rpc_response(
                    request.request_id,
                    StatusCode::NO_REGISTER,
                    "The app is not found",
                );
            }
        };
        match app.report_block_ids(request.shuffle_id, request.partition_to_block_ids) {
            Ok(_) => Self::rpc_response(request.request_id, StatusCode::SUCCESS, ""),
            Err(e) => {
                Self::rpc_response(request.request_id, StatusCode::INTERNAL_ERROR, e.to_string())
            }
        }
    }

    fn get_shuffle_result(&self, request: GetShuffleResultRequest) -> Frame {
        let app = match self.app_manager_ref.get_app(&request.app_id) {
            Some(app) => app,
            _ => {
                return Frame::GetShuffleResultResponse(GetShuffleResultResponse {
                    request_id: request.request_id,
                    status_code: StatusCode::NO_REGISTER.into(),
                    ret_msg: "The app is not found".to_string(),
                    serialized_bitmap: Bytes::new(),
                });
            }
        };
        match app.get_block_ids(request.shuffle_id, request.partition_id) {
            Ok(serialized_bitmap) => Frame::GetShuffleResultResponse(GetShuffleResultResponse {
                request_id: request.request_id,
                status_code: StatusCode::SUCCESS.into(),
                ret_msg: "".to_string(),
                serialized_bitmap,
            }),
            Err(e) => Frame::GetShuffleResultResponse(GetShuffleResultResponse {
                request_id: request.request_id,
                status_code: StatusCode::INTERNAL_ERROR.into(),
                ret_msg: e.to_string(),
                serialized_bitmap: Bytes::new(),
            }),
        }
    }

    async fn get_shuffle_data(&self, request: GetShuffleDataRequest) -> Frame {
        let app = match self.app_manager_ref.get_app(&request.app_id) {
            Some(app) => app,
            _ => {
                return Frame::GetShuffleDataResponse(GetShuffleDataResponse {
                    request_id: request.request_id,
                    status_code: StatusCode::NO_REGISTER.into(),
                    ret_msg: "The app is not found".to_string(),
                    data: Bytes::new(),
                });
            }
        };

        let uid = PartitionedUId {
            app_id: request.app_id.clone(),
            shuffle_id: request.shuffle_id,
            partition_id: request.partition_id,
        };
        let ctx = ReadingViewContext {
            uid,
            reading_options: ReadingOptions::FILE_OFFSET_AND_LEN(
                request.offset,
                request.length as i64,
            ),
        };
        match app.select(ctx).await {
            Ok(data) => Frame::GetShuffleDataResponse(GetShuffleDataResponse {
                request_id: request.request_id,
                status_code: StatusCode::SUCCESS.into(),
                ret_msg: "".to_string(),
                data: data.into_bytes(),
            }),
            Err(e) => Frame::GetShuffleDataResponse(GetShuffleDataResponse {
                request_id: request.request_id,
                status_code: e.to_status_code().into(),
                ret_msg: e.to_string(),
                data: Bytes::new(),
            }),
        }
    }

    async fn get_shuffle_index(&self, request: GetShuffleIndexRequest) -> Frame {
        let app = match self.app_manager_ref.get_app(&request.app_id) {
            Some(app) => app,
            _ => {
                return Frame::GetShuffleIndexResponse(GetShuffleIndexResponse {
                    request_id: request.request_id,
                    status_code: StatusCode::NO_REGISTER.into(),
                    ret_msg: "The app is not found".to_string(),
                    data_file_len: 0,
                    index_data: Bytes::new(),
                });
            }
        };

        let uid = PartitionedUId {
            app_id: request.app_id.clone(),
            shuffle_id: request.shuffle_id,
            partition_id: request.partition_id,
        };
        match app.list_index(ReadingIndexViewContext { partition_id: uid }).await {
            Ok(crate::store::ResponseDataIndex::Local(index)) => {
                Frame::GetShuffleIndexResponse(GetShuffleIndexResponse {
                    request_id: request.request_id,
                    status_code: StatusCode::SUCCESS.into(),
                    ret_msg: "".to_string(),
                    data_file_len: index.data_file_len,
                    index_data: index.index_data,
                })
            }
            Err(e) => Frame::GetShuffleIndexResponse(GetShuffleIndexResponse {
                request_id: request.request_id,
                status_code: e.to_status_code().into(),
                ret_msg: e.to_string(),
                data_file_len: 0,
                index_data: Bytes::new(),
            }),
        }
    }

    fn unregister_shuffle(&self, request: UnregisterShuffleRequest) -> Frame {
        let shuffle_id = if request.shuffle_id < 0 {
            None
        } else {
            Some(request.shuffle_id)
        };
        let reason = match shuffle_id {
            Some(shuffle_id) => {
                PurgeReason::SHUFFLE_LEVEL_EXPLICIT_UNREGISTER(request.app_id.clone(), shuffle_id)
            }
            _ => PurgeReason::APP_LEVEL_EXPLICIT_UNREGISTER(request.app_id.clone()),
        };
        match self.app_manager_ref.unregister_in_background(reason) {
            Ok(_) => Self::rpc_response(request.request_id, StatusCode::SUCCESS, ""),
            Err(e) => {
                Self::rpc_response(request.request_id, StatusCode::INTERNAL_ERROR, e.to_string())
            }
        }
    }

    fn app_heartbeat(&self, request: AppHeartBeatRequest) -> Frame {
        match self.app_manager_ref.get_app(&request.app_id) {
            Some(app) => {
                let _ = app.heartbeat();
                Self::rpc_response(request.request_id, StatusCode::SUCCESS, "")
            }
            _ => Self::rpc_response(
                request.request_id,
                StatusCode::NO_REGISTER,
                "The app is not found",
            ),
        }
    }
}
