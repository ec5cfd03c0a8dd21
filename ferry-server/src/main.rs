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
use ferry_server::config::Config;
use ferry_server::log_service::LogService;
use ferry_server::start_ferry_server;
use log::info;
use tokio::signal::unix::{signal, SignalKind};

#[derive(Parser, Debug)]
#[command(name = "ferry-server")]
#[command(about = "Ferry shuffle server - remote shuffle service data plane", long_about = None)]
struct Args {
    /// configuration file path. Falls back to the env var
    /// FERRY_SERVER_CONFIG_PATH when absent.
    #[arg(long)]
    config_file: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let config = match &args.config_file {
        Some(config_file) => Config::from(config_file),
        _ => Config::create_from_env(),
    };

    let _guard = LogService::init(&config.log);
    info!("Starting ferry shuffle server on rpc port: {}", config.rpc_port);

    let _app_manager_ref = start_ferry_server(config).await?;

    let mut sig = signal(SignalKind::terminate())?;
    let _ = sig.recv().await;
    info!("Accepting the shutdown signal");
    Ok(())
}
