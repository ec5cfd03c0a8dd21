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

use ferry_client::coordinator::CoordinatorClient;
use ferry_coordinator::access::AccessManager;
use ferry_coordinator::cluster::ClusterManager;
use ferry_coordinator::config::Config;
use ferry_coordinator::rpc::CoordinatorRpcService;
use ferry_core::common::ShuffleServerInfo;
use ferry_core::rpc::client::{RetryPolicy, RpcClient};
use ferry_core::rpc::frame::Frame;
use ferry_core::rpc::messages::ServerHeartBeatRequest;
use ferry_core::status::StatusCode;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::net::TcpListener;

async fn heartbeat(rpc: &RpcClient, id: &str) -> anyhow::Result<()> {
    let response = rpc
        .call(Frame::ServerHeartBeat(ServerHeartBeatRequest {
            request_id: rpc.next_request_id(),
            server: ShuffleServerInfo::new(id, "127.0.0.1", 19999),
            used_memory: 0,
            pre_allocated_memory: 0,
            available_memory: 1024,
            event_num_in_flush: 0,
            app_num: 0,
            partition_num: 0,
            tags: vec!["ss_v5".to_string()],
            is_healthy: true,
        }))
        .await?;
    match response {
        Frame::RpcResponse(resp) => {
            assert_eq!(StatusCode::SUCCESS, StatusCode::from_i32(resp.status_code));
        }
        other => panic!("unexpected response: {}", other.name()),
    }
    Ok(())
}

#[tokio::test]
async fn coordinator_verbs_over_the_wire() -> anyhow::Result<()> {
    let mut config = Config::default();
    config.remote_storage_paths = vec!["hdfs://ns1/ferry".to_string()];
    config.client_conf = vec![(
        "ferry.client.retry.max".to_string(),
        "5".to_string(),
    )];

    let cluster_manager = ClusterManager::new(config.clone());
    let access_manager = Arc::new(AccessManager::from_config(&config, &cluster_manager)?);

    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    tokio::spawn(CoordinatorRpcService::new(cluster_manager, access_manager).start(listener));

    // two shuffle servers join via heartbeats
    let rpc = RpcClient::new(addr.to_string());
    heartbeat(&rpc, "s1").await?;
    heartbeat(&rpc, "s2").await?;

    let client = CoordinatorClient::new(addr.to_string(), RetryPolicy::default());

    // dynamic client conf is served
    let conf = client.fetch_client_conf(1000).await?;
    assert_eq!(1, conf.len());
    assert_eq!("ferry.client.retry.max", conf[0].0);

    // remote storage selection is sticky per app
    let first = client.fetch_remote_storage("app-1").await?;
    assert_eq!("hdfs://ns1/ferry", first.path);
    let again = client.fetch_remote_storage("app-1").await?;
    assert_eq!(first.path, again.path);

    // assignments with replica 2 over 2 live servers
    let response = client
        .get_shuffle_assignments("app-1", 0, 4, 1, 2, vec!["ss_v5".to_string()])
        .await?;
    assert_eq!(StatusCode::SUCCESS, StatusCode::from_i32(response.status_code));
    assert_eq!(4, response.assignments.len());
    for assignment in &response.assignments {
        assert_eq!(2, assignment.servers.len());
        let distinct: HashSet<_> = assignment.servers.iter().map(|s| &s.id).collect();
        assert_eq!(2, distinct.len());
    }

    // a replica demand the cluster cannot satisfy is answered, not raised
    let client_replica_3 = client
        .get_shuffle_assignments("app-1", 1, 4, 1, 3, vec!["ss_v5".to_string()])
        .await?;
    assert_ne!(
        StatusCode::SUCCESS,
        StatusCode::from_i32(client_replica_3.status_code)
    );
    assert!(client_replica_3.ret_msg.contains("INSUFFICIENT_SERVERS"));

    // app heartbeat registers the app
    assert_eq!(
        StatusCode::SUCCESS,
        client.app_heartbeat("app-heartbeat").await?
    );

    Ok(())
}
