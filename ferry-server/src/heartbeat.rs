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

use crate::app::{AppManagerRef, SHUFFLE_SERVER_ID, SHUFFLE_SERVER_IP};
use crate::config::Config;
use crate::runtime::manager::RuntimeManager;
use ferry_core::common::ShuffleServerInfo;
use ferry_core::rpc::client::RpcClient;
use ferry_core::rpc::frame::Frame;
use ferry_core::rpc::messages::ServerHeartBeatRequest;
use log::error;
use std::time::Duration;

const DEFAULT_SHUFFLE_SERVER_TAG: &str = "ss_v5";

/// Periodically reports this server's identity and load to every
/// coordinator of the quorum so that placement and eviction see it.
pub struct HeartbeatTask;

impl HeartbeatTask {
    pub fn run(config: &Config, runtime_manager: &RuntimeManager, app_manager: &AppManagerRef) {
        let app_manager = app_manager.clone();
        let coordinator_quorum = config.coordinator_quorum.clone();
        let tags = config.tags.clone().unwrap_or_default();
        let interval_seconds = config.heartbeat_interval_seconds;
        let rpc_port = config.rpc_port;

        let ip = SHUFFLE_SERVER_IP
            .get()
            .map(|v| v.to_string())
            .unwrap_or_else(|| "127.0.0.1".to_string());
        let id = SHUFFLE_SERVER_ID
            .get()
            .map(|v| v.to_string())
            .unwrap_or_else(|| format!("{}-{}", &ip, rpc_port));

        let server = ShuffleServerInfo::new(id, ip, rpc_port as u16);

        runtime_manager.default_runtime.spawn(async move {
            let clients: Vec<RpcClient> = coordinator_quorum
                .iter()
                .map(|quorum| RpcClient::new(quorum.clone()))
                .collect();

            loop {
                tokio::time::sleep(Duration::from_secs(interval_seconds as u64)).await;

                let mut all_tags = vec![DEFAULT_SHUFFLE_SERVER_TAG.to_string()];
                all_tags.extend_from_slice(&tags);

                let healthy = app_manager.store_is_healthy().await.unwrap_or(false);
                let memory_snapshot = app_manager.store_memory_snapshot();
                let event_num_in_flush = app_manager.store_memory_spill_event_num() as i32;

                for client in &clients {
                    let heartbeat_req = ServerHeartBeatRequest {
                        request_id: client.next_request_id(),
                        server: server.clone(),
                        used_memory: memory_snapshot.used(),
                        pre_allocated_memory: 0,
                        available_memory: memory_snapshot.available(),
                        event_num_in_flush,
                        app_num: app_manager.get_alive_app_number() as i32,
                        partition_num: app_manager.get_partition_number() as i64,
                        tags: all_tags.clone(),
                        is_healthy: healthy,
                    };
                    if let Err(err) = client.call(Frame::ServerHeartBeat(heartbeat_req)).await {
                        error!(
                            "Errors on heartbeat with coordinator: {}. errors: {}",
                            client.target(),
                            err
                        );
                    }
                }
            }
        });
    }
}
