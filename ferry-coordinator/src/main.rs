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

use clap::Parser;
use ferry_coordinator::access::AccessManager;
use ferry_coordinator::cluster::ClusterManager;
use ferry_coordinator::config::Config;
use ferry_coordinator::metric;
use ferry_coordinator::rpc::CoordinatorRpcService;
use log::info;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;

#[derive(Parser, Debug)]
#[command(name = "ferry-coordinator")]
#[command(about = "Ferry coordinator - remote shuffle service control plane", long_about = None)]
struct Args {
    /// rpc port to listen on
    #[arg(long)]
    rpc_port: Option<u16>,

    /// heartbeat timeout in seconds
    #[arg(long)]
    heartbeat_timeout_seconds: Option<i64>,

    /// configuration file path
    #[arg(long)]
    config_file: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();

    let args = Args::parse();
    let mut config = match &args.config_file {
        Some(config_file) => Config::from(config_file)?,
        _ => Config::default(),
    };
    if let Some(rpc_port) = args.rpc_port {
        config.rpc_port = rpc_port;
    }
    if let Some(timeout) = args.heartbeat_timeout_seconds {
        config.heartbeat_timeout_seconds = timeout;
    }

    metric::register_all();

    info!("Starting ferry coordinator on rpc port: {}", config.rpc_port);

    let cluster_manager = ClusterManager::new(config.clone());
    let access_manager = Arc::new(AccessManager::from_config(&config, &cluster_manager)?);

    // registry cleaner: evict servers and apps whose heartbeat stopped
    let cleaner_cluster_manager = cluster_manager.clone();
    let check_interval = config.node_expiry_check_interval_seconds.max(1) as u64;
    tokio::spawn(async move {
        loop {
            tokio::time::sleep(Duration::from_secs(check_interval)).await;
            cleaner_cluster_manager.cleanup_expired_nodes();
            cleaner_cluster_manager.cleanup_expired_applications();
        }
    });

    let addr = SocketAddr::new(IpAddr::V4(Ipv4Addr::new(0, 0, 0, 0)), config.rpc_port);
    let listener = TcpListener::bind(&addr).await?;
    CoordinatorRpcService::new(cluster_manager, access_manager)
        .start(listener)
        .await
}
