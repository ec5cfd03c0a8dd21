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

pub mod app;
pub mod block_id_manager;
pub mod config;
pub mod error;
pub mod event_bus;
pub mod heartbeat;
pub mod lazy_initializer;
pub mod log_service;
pub mod metric;
pub mod readable_size;
pub mod rpc;
pub mod runtime;
pub mod storage;
pub mod store;

use crate::app::{AppManager, AppManagerRef};
use crate::heartbeat::HeartbeatTask;
use crate::rpc::ShuffleServerRpcService;
use crate::runtime::manager::RuntimeManager;
use crate::storage::StorageService;
use anyhow::Result;
use ferry_core::util::get_local_ip;
use tokio::net::TcpListener;

/// Boot a full shuffle server: storage tiers, app manager, heartbeat
/// reporter and the rpc endpoint. Returns the app manager handle for
/// embedding callers (tests, tooling).
pub async fn start_ferry_server(config: config::Config) -> Result<AppManagerRef> {
    let ip = get_local_ip()
        .map(|v| v.to_string())
        .unwrap_or_else(|_| "127.0.0.1".to_string());
    let _ = app::SHUFFLE_SERVER_IP.set(ip.clone());
    let _ = app::SHUFFLE_SERVER_ID.set(format!("{}-{}", &ip, config.rpc_port));

    metric::register_all();

    let runtime_manager = RuntimeManager::from(config.runtime_config.clone());
    let storage = StorageService::init(&runtime_manager, &config);
    let app_manager_ref = AppManager::get_ref(runtime_manager.clone(), config.clone(), &storage);

    HeartbeatTask::run(&config, &runtime_manager, &app_manager_ref);

    let listener = TcpListener::bind(format!("0.0.0.0:{}", config.rpc_port)).await?;
    let app_manager_ref_cloned = app_manager_ref.clone();
    runtime_manager.default_runtime.spawn(async move {
        let service = ShuffleServerRpcService::from(app_manager_ref_cloned);
        if let Err(err) = service.start(listener).await {
            log::error!("Errors on running the rpc service. err: {:#?}", err);
        }
    });

    Ok(app_manager_ref)
}
