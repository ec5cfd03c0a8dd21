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

use crate::access::{AccessInfo, AccessManager};
use crate::cluster::cluster_manager::{AssignmentRequest, HeartbeatInfo};
use crate::cluster::ClusterManagerRef;
use anyhow::Result;
use ferry_core::error::WireError;
use ferry_core::rpc::connection::Connection;
use ferry_core::rpc::frame::Frame;
use ferry_core::rpc::messages::*;
use ferry_core::status::StatusCode;
use log::{debug, error, info};
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Semaphore;

const MAX_CONNECTIONS: usize = 10000;

/// The coordinator's RPC endpoint: one handler task per client
/// connection, one response frame per request frame.
pub struct CoordinatorRpcService {
    cluster_manager: ClusterManagerRef,
    access_manager: Arc<AccessManager>,
}

impl CoordinatorRpcService {
    pub fn new(cluster_manager: ClusterManagerRef, access_manager: Arc<AccessManager>) -> Self {
        Self {
            cluster_manager,
            access_manager,
        }
    }

    pub async fn start(self, listener: TcpListener) -> Result<()> {
        info!(
            "Coordinator rpc service is listening on {}",
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
            let response = self.handle_frame(frame);
            connection.write_frame(&response).await?;
        }
        Ok(())
    }

    fn handle_frame(&self, frame: Frame) -> Frame {
        match frame {
            Frame::ServerHeartBeat(request) => self.server_heartbeat(request),
            Frame::AppHeartBeat(request) => self.app_heartbeat(request),
            Frame::GetShuffleAssignments(request) => self.get_shuffle_assignments(request),
            Frame::AccessCluster(request) => self.access_cluster(request),
            Frame::FetchClientConf(request) => self.fetch_client_conf(request),
            Frame::FetchRemoteStorage(request) => self.fetch_remote_storage(request),
            other => Frame::RpcResponse(RpcResponse {
                request_id: other.request_id(),
                status_code: StatusCode::INVALID_REQUEST.into(),
                ret_msg: format!("Unexpected verb for the coordinator: {}", other.name()),
            }),
        }
    }

    fn server_heartbeat(&self, request: ServerHeartBeatRequest) -> Frame {
        self.cluster_manager.handle_heartbeat(HeartbeatInfo {
            server: request.server,
            used_memory: request.used_memory,
            pre_allocated_memory: request.pre_allocated_memory,
            available_memory: request.available_memory,
            event_num_in_flush: request.event_num_in_flush,
            app_num: request.app_num,
            partition_num: request.partition_num,
            tags: request.tags,
            is_healthy: request.is_healthy,
        });
        Frame::RpcResponse(RpcResponse {
            request_id: request.request_id,
            status_code: StatusCode::SUCCESS.into(),
            ret_msg: "".to_string(),
        })
    }

    fn app_heartbeat(&self, request: AppHeartBeatRequest) -> Frame {
        self.cluster_manager.app_heartbeat(&request.app_id);
        Frame::RpcResponse(RpcResponse {
            request_id: request.request_id,
            status_code: StatusCode::SUCCESS.into(),
            ret_msg: "".to_string(),
        })
    }

    fn get_shuffle_assignments(&self, request: GetShuffleAssignmentsRequest) -> Frame {
        let assignment_request = AssignmentRequest {
            app_id: request.app_id.clone(),
            shuffle_id: request.shuffle_id,
            partition_num: request.partition_num,
            partition_num_per_range: request.partition_num_per_range,
            replica: request.replica,
            required_tags: request.required_tags,
        };
        match self.cluster_manager.get_shuffle_assignments(assignment_request) {
            Ok(resolved) => {
                let assignments = resolved
                    .into_iter()
                    .map(|(assignment, servers)| PartitionRangeAssignment {
                        range: assignment.range,
                        servers,
                    })
                    .collect();
                Frame::GetShuffleAssignmentsResponse(GetShuffleAssignmentsResponse {
                    request_id: request.request_id,
                    status_code: StatusCode::SUCCESS.into(),
                    ret_msg: "".to_string(),
                    assignments,
                })
            }
            Err(e) => {
                error!(
                    "Failed to get shuffle assignments for app: {}. err: {}",
                    &request.app_id, e
                );
                Frame::GetShuffleAssignmentsResponse(GetShuffleAssignmentsResponse {
                    request_id: request.request_id,
                    status_code: StatusCode::INTERNAL_ERROR.into(),
                    ret_msg: e.to_string(),
                    assignments: vec![],
                })
            }
        }
    }

    fn access_cluster(&self, request: AccessClusterRequest) -> Frame {
        let (code, msg) = self.access_manager.check(&AccessInfo {
            access_id: request.access_id,
            tags: request.tags,
        });
        Frame::RpcResponse(RpcResponse {
            request_id: request.request_id,
            status_code: code.into(),
            ret_msg: msg,
        })
    }

    fn fetch_client_conf(&self, request: FetchClientConfRequest) -> Frame {
        Frame::FetchClientConfResponse(FetchClientConfResponse {
            request_id: request.request_id,
            status_code: StatusCode::SUCCESS.into(),
            ret_msg: "".to_string(),
            client_conf: self.cluster_manager.client_conf(),
        })
    }

    fn fetch_remote_storage(&self, request: FetchRemoteStorageRequest) -> Frame {
        let remote_storage = self.cluster_manager.select_remote_storage(&request.app_id);
        Frame::FetchRemoteStorageResponse(FetchRemoteStorageResponse {
            request_id: request.request_id,
            status_code: StatusCode::SUCCESS.into(),
            ret_msg: "".to_string(),
            remote_storage,
        })
    }
}
