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

use chrono::{Duration, Utc};
use dashmap::DashMap;
use ferry_core::common::{RemoteStorageInfo, ShuffleServerInfo};
use log::{info, warn};
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering::SeqCst;
use std::sync::Arc;

use super::application::ApplicationInfo;
use super::assignment::{
    AssignmentError, AssignmentStrategy, LoadBalancedAssignment, PartitionAssignment,
};
use super::server_node::ShuffleServerNode;
use crate::config::Config;
use crate::metric::{GAUGE_ALIVE_APP_NUM, GAUGE_ALIVE_SERVER_NUM, TOTAL_ASSIGNMENT_REQUEST};

pub type ClusterManagerRef = Arc<ClusterManager>;

#[derive(Clone, Debug)]
pub struct AssignmentRequest {
    pub app_id: String,
    pub shuffle_id: i32,
    pub partition_num: i32,
    pub partition_num_per_range: i32,
    pub replica: i32,
    pub required_tags: Vec<String>,
}

/// Heartbeat payload from one shuffle server.
#[derive(Clone, Debug)]
pub struct HeartbeatInfo {
    pub server: ShuffleServerInfo,
    pub used_memory: i64,
    pub pre_allocated_memory: i64,
    pub available_memory: i64,
    pub event_num_in_flush: i32,
    pub app_num: i32,
    pub partition_num: i64,
    pub tags: Vec<String>,
    pub is_healthy: bool,
}

/// The single owner of all cluster soft state: alive servers, alive apps
/// and the per-app remote storage choice. Everything is rebuilt from
/// heartbeats after a restart.
pub struct ClusterManager {
    servers: DashMap<String, ShuffleServerNode>,
    applications: DashMap<String, ApplicationInfo>,

    // key: app_id. Sticky choice among the configured roots.
    app_remote_storages: DashMap<String, RemoteStorageInfo>,
    remote_storage_cursor: AtomicUsize,

    config: Config,
    assignment_strategy: Box<dyn AssignmentStrategy>,
}

impl ClusterManager {
    pub fn new(config: Config) -> ClusterManagerRef {
        Arc::new(Self {
            servers: DashMap::new(),
            applications: DashMap::new(),
            app_remote_storages: DashMap::new(),
            remote_storage_cursor: AtomicUsize::new(0),
            config,
            assignment_strategy: Box::new(LoadBalancedAssignment::default()),
        })
    }

    // ==================== heartbeat handling ====================

    pub fn handle_heartbeat(&self, heartbeat: HeartbeatInfo) {
        let now = Utc::now();
        let server = heartbeat.server;

        self.servers
            .entry(server.id.clone())
            .and_modify(|node| {
                node.used_memory = heartbeat.used_memory;
                node.available_memory = heartbeat.available_memory;
                node.pre_allocated_memory = heartbeat.pre_allocated_memory;
                node.event_num_in_flush = heartbeat.event_num_in_flush;
                node.app_num = heartbeat.app_num;
                node.partition_num = heartbeat.partition_num;
                node.tags = heartbeat.tags.clone();
                node.is_healthy = heartbeat.is_healthy;
                node.last_heartbeat = now;
            })
            .or_insert_with(|| {
                info!("New shuffle server registered: {} ({})", server.id, server.host);
                GAUGE_ALIVE_SERVER_NUM.inc();
                ShuffleServerNode {
                    id: server.id.clone(),
                    host: server.host,
                    port: server.port,
                    used_memory: heartbeat.used_memory,
                    available_memory: heartbeat.available_memory,
                    pre_allocated_memory: heartbeat.pre_allocated_memory,
                    event_num_in_flush: heartbeat.event_num_in_flush,
                    app_num: heartbeat.app_num,
                    partition_num: heartbeat.partition_num,
                    tags: heartbeat.tags,
                    is_healthy: heartbeat.is_healthy,
                    last_heartbeat: now,
                    registration_time: now,
                }
            });
    }

    pub fn app_heartbeat(&self, app_id: &str) {
        let now = Utc::now();
        self.applications
            .entry(app_id.to_string())
            .and_modify(|app| app.last_heartbeat = now)
            .or_insert_with(|| {
                // first contact registers the app
                info!("Application registered: {}", app_id);
                GAUGE_ALIVE_APP_NUM.inc();
                ApplicationInfo::new(app_id.to_string())
            });
    }

    // ==================== queries ====================

    pub fn get_alive_server_num(&self) -> usize {
        self.servers
            .iter()
            .filter(|entry| entry.value().is_available_for_assignment())
            .count()
    }

    pub fn get_server_by_id(&self, server_id: &str) -> Option<ShuffleServerNode> {
        self.servers.get(server_id).map(|entry| entry.clone())
    }

    pub fn application_num(&self) -> usize {
        self.applications.len()
    }

    // ==================== assignment ====================

    pub fn get_shuffle_assignments(
        &self,
        request: AssignmentRequest,
    ) -> Result<Vec<(PartitionAssignment, Vec<ShuffleServerInfo>)>, AssignmentError> {
        TOTAL_ASSIGNMENT_REQUEST.inc();

        let candidates: Vec<ShuffleServerNode> = self
            .servers
            .iter()
            .filter(|entry| {
                let node = entry.value();
                node.is_available_for_assignment() && node.matches_tags(&request.required_tags)
            })
            .map(|entry| entry.value().clone())
            .collect();

        let replica = request.replica.max(1) as usize;
        if candidates.len() < replica {
            return Err(AssignmentError::INSUFFICIENT_SERVERS {
                required: replica,
                available: candidates.len(),
            });
        }

        let assignments = self.assignment_strategy.assign(
            &candidates,
            request.partition_num,
            request.partition_num_per_range,
            replica,
        )?;

        // the first coordinator contact of an app counts as its registration
        self.app_heartbeat(&request.app_id);

        let mut resolved = Vec::with_capacity(assignments.len());
        for assignment in assignments {
            let servers = assignment
                .server_ids
                .iter()
                .filter_map(|id| self.get_server_by_id(id).map(|node| node.to_server_info()))
                .collect();
            resolved.push((assignment, servers));
        }
        Ok(resolved)
    }

    // ==================== remote storage ====================

    /// Pick the remote storage for an app, round-robin over the configured
    /// roots and sticky for the app's lifetime.
    pub fn select_remote_storage(&self, app_id: &str) -> RemoteStorageInfo {
        let paths = &self.config.remote_storage_paths;
        if paths.is_empty() {
            return RemoteStorageInfo::default();
        }
        self.app_remote_storages
            .entry(app_id.to_string())
            .or_insert_with(|| {
                let idx = self.remote_storage_cursor.fetch_add(1, SeqCst) % paths.len();
                RemoteStorageInfo::new(paths[idx].clone())
            })
            .clone()
    }

    pub fn client_conf(&self) -> Vec<(String, String)> {
        self.config.client_conf.clone()
    }

    // ==================== cleanup ====================

    pub fn cleanup_expired_nodes(&self) {
        let timeout = Duration::seconds(self.config.heartbeat_timeout_seconds);
        let now = Utc::now();

        self.servers.retain(|id, node| {
            let expired = now - node.last_heartbeat > timeout;
            if expired {
                warn!("Removing expired shuffle server: {}", id);
                GAUGE_ALIVE_SERVER_NUM.dec();
            }
            !expired
        });
    }

    pub fn cleanup_expired_applications(&self) {
        let timeout = Duration::seconds(self.config.heartbeat_timeout_seconds * 2);
        let now = Utc::now();

        self.applications.retain(|id, app| {
            let expired = now - app.last_heartbeat > timeout;
            if expired {
                warn!("Removing expired application: {}", id);
                GAUGE_ALIVE_APP_NUM.dec();
                self.app_remote_storages.remove(id);
            }
            !expired
        });
    }

    pub fn config(&self) -> &Config {
        &self.config
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn heartbeat(id: &str, tags: Vec<&str>, used_memory: i64) -> HeartbeatInfo {
        HeartbeatInfo {
            server: ShuffleServerInfo::new(id, "10.0.0.1", 19999),
            used_memory,
            pre_allocated_memory: 0,
            available_memory: 1024,
            event_num_in_flush: 0,
            app_num: 0,
            partition_num: 0,
            tags: tags.into_iter().map(|t| t.to_string()).collect(),
            is_healthy: true,
        }
    }

    #[test]
    fn heartbeat_registers_and_refreshes() {
        let manager = ClusterManager::new(Config::default());
        manager.handle_heartbeat(heartbeat("s1", vec!["ss_v5"], 10));
        assert_eq!(1, manager.get_alive_server_num());

        manager.handle_heartbeat(heartbeat("s1", vec!["ss_v5"], 999));
        assert_eq!(1, manager.get_alive_server_num());
        assert_eq!(999, manager.get_server_by_id("s1").unwrap().used_memory);
    }

    #[test]
    fn assignment_respects_tags_and_replica() {
        let manager = ClusterManager::new(Config::default());
        manager.handle_heartbeat(heartbeat("s1", vec!["ss_v5"], 0));
        manager.handle_heartbeat(heartbeat("s2", vec!["ss_v5"], 0));
        manager.handle_heartbeat(heartbeat("s3", vec!["other"], 0));

        let request = AssignmentRequest {
            app_id: "app-1".to_string(),
            shuffle_id: 0,
            partition_num: 4,
            partition_num_per_range: 1,
            replica: 2,
            required_tags: vec!["ss_v5".to_string()],
        };
        let assignments = manager.get_shuffle_assignments(request.clone()).unwrap();
        assert_eq!(4, assignments.len());
        for (assignment, servers) in &assignments {
            assert_eq!(2, servers.len());
            assert_eq!(2, assignment.server_ids.len());
            for server in servers {
                assert_ne!("s3", server.id);
            }
        }

        // tag nobody carries
        let mut impossible = request;
        impossible.required_tags = vec!["NETTY".to_string()];
        match manager.get_shuffle_assignments(impossible) {
            Err(AssignmentError::INSUFFICIENT_SERVERS { .. }) => {}
            _ => panic!(),
        }
    }

    #[test]
    fn remote_storage_round_robin_is_sticky() {
        let mut config = Config::default();
        config.remote_storage_paths =
            vec!["hdfs://ns1/ferry".to_string(), "hdfs://ns2/ferry".to_string()];
        let manager = ClusterManager::new(config);

        let first = manager.select_remote_storage("app-1");
        let second = manager.select_remote_storage("app-2");
        assert_ne!(first.path, second.path);
        // sticky per app
        assert_eq!(first.path, manager.select_remote_storage("app-1").path);

        // spreads over both roots
        let third = manager.select_remote_storage("app-3");
        assert_eq!(first.path, third.path);
    }

    #[test]
    fn expired_server_is_evicted() {
        let mut config = Config::default();
        config.heartbeat_timeout_seconds = 0;
        let manager = ClusterManager::new(config);
        manager.handle_heartbeat(heartbeat("s1", vec![], 0));

        std::thread::sleep(std::time::Duration::from_millis(1100));
        manager.cleanup_expired_nodes();
        assert_eq!(0, manager.get_alive_server_num());
    }
}
