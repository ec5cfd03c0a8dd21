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

pub mod candidates;
pub mod cluster_load;

use crate::cluster::ClusterManagerRef;
use crate::config::Config;
use crate::metric::TOTAL_ACCESS_DENIED;
use anyhow::{anyhow, Result};
use candidates::AccessCandidatesChecker;
use cluster_load::AccessClusterLoadChecker;
use ferry_core::status::StatusCode;
use log::info;

/// One admission request routed through the checker chain.
#[derive(Clone, Debug)]
pub struct AccessInfo {
    pub access_id: String,
    pub tags: Vec<String>,
}

/// A checker either admits the app or rejects it with a reason.
#[derive(Clone, Debug, PartialEq)]
pub enum AccessCheckResult {
    Allowed,
    Denied(String),
}

/// The built-in checkers as a closed set of variants. A new checker is a
/// new variant plus one arm in `name`/`check`.
pub enum AccessChecker {
    Candidates(AccessCandidatesChecker),
    ClusterLoad(AccessClusterLoadChecker),
}

impl AccessChecker {
    pub fn name(&self) -> &'static str {
        match self {
            AccessChecker::Candidates(_) => "AccessCandidatesChecker",
            AccessChecker::ClusterLoad(_) => "AccessClusterLoadChecker",
        }
    }

    pub fn check(&self, access_info: &AccessInfo) -> AccessCheckResult {
        match self {
            AccessChecker::Candidates(checker) => checker.check(access_info),
            AccessChecker::ClusterLoad(checker) => checker.check(access_info),
        }
    }
}

/// Ordered pipeline: the first non-success short-circuits with
/// `ACCESS_DENIED` and the deciding checker's name in the message.
pub struct AccessManager {
    checkers: Vec<AccessChecker>,
}

impl AccessManager {
    pub fn from_config(config: &Config, cluster_manager: &ClusterManagerRef) -> Result<Self> {
        let mut checkers = vec![];
        for name in &config.access_checkers {
            let checker = match name.as_str() {
                "AccessCandidatesChecker" => {
                    let path = config.access_candidates_path.as_ref().ok_or_else(|| {
                        anyhow!("access_candidates_path must be set for AccessCandidatesChecker")
                    })?;
                    AccessChecker::Candidates(AccessCandidatesChecker::new(
                        path,
                        config.access_candidates_update_interval_sec,
                    )?)
                }
                "AccessClusterLoadChecker" => {
                    AccessChecker::ClusterLoad(AccessClusterLoadChecker::new(
                        cluster_manager.clone(),
                        config.access_load_checker_server_num_threshold,
                    ))
                }
                other => return Err(anyhow!("Unknown access checker: {}", other)),
            };
            info!("Access checker enabled: {}", checker.name());
            checkers.push(checker);
        }
        Ok(Self { checkers })
    }

    pub fn check(&self, access_info: &AccessInfo) -> (StatusCode, String) {
        for checker in &self.checkers {
            if let AccessCheckResult::Denied(reason) = checker.check(access_info) {
                TOTAL_ACCESS_DENIED.inc();
                return (
                    StatusCode::ACCESS_DENIED,
                    format!("Denied by {}, {}", checker.name(), reason),
                );
            }
        }
        (
            StatusCode::SUCCESS,
            format!("SUCCESS, accessId: {}", &access_info.access_id),
        )
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::cluster::cluster_manager::HeartbeatInfo;
    use crate::cluster::ClusterManager;
    use ferry_core::common::ShuffleServerInfo;
    use std::io::Write;

    fn server_heartbeat(id: &str) -> HeartbeatInfo {
        HeartbeatInfo {
            server: ShuffleServerInfo::new(id, "10.0.0.1", 19999),
            used_memory: 0,
            pre_allocated_memory: 0,
            available_memory: 1024,
            event_num_in_flush: 0,
            app_num: 0,
            partition_num: 0,
            tags: vec!["SHUFFLE_SERVER_VERSION".to_string()],
            is_healthy: true,
        }
    }

    fn manager_with_checkers(
        candidates_file: &str,
        threshold: i32,
        cluster_manager: &ClusterManagerRef,
    ) -> AccessManager {
        let mut config = Config::default();
        config.access_checkers = vec![
            "AccessCandidatesChecker".to_string(),
            "AccessClusterLoadChecker".to_string(),
        ];
        config.access_candidates_path = Some(candidates_file.to_string());
        config.access_load_checker_server_num_threshold = threshold;
        AccessManager::from_config(&config, cluster_manager).unwrap()
    }

    #[tokio::test]
    async fn pipeline_short_circuits_in_order() {
        let temp_dir = tempdir::TempDir::new("access_pipeline_test").unwrap();
        let file_path = temp_dir.path().join("candidates");
        let mut file = std::fs::File::create(&file_path).unwrap();
        file.write_all(b"9527\n 135 \n2\n").unwrap();

        let cluster_manager = ClusterManager::new(Config::default());
        let access_manager = manager_with_checkers(
            file_path.to_str().unwrap(),
            2,
            &cluster_manager,
        );

        // case1: denied by the allow-list
        let (code, msg) = access_manager.check(&AccessInfo {
            access_id: "111111".to_string(),
            tags: vec!["SHUFFLE_SERVER_VERSION".to_string()],
        });
        assert_eq!(StatusCode::ACCESS_DENIED, code);
        assert!(msg.starts_with("Denied by AccessCandidatesChecker"));

        // case2: allow-list passes, load checker denies with one live server
        cluster_manager.handle_heartbeat(server_heartbeat("s1"));
        let (code, msg) = access_manager.check(&AccessInfo {
            access_id: "135".to_string(),
            tags: vec!["SHUFFLE_SERVER_VERSION".to_string()],
        });
        assert_eq!(StatusCode::ACCESS_DENIED, code);
        assert!(msg.starts_with("Denied by AccessClusterLoadChecker"));

        // case3: a second server joins, the same call is admitted
        cluster_manager.handle_heartbeat(server_heartbeat("s2"));
        let (code, msg) = access_manager.check(&AccessInfo {
            access_id: "135".to_string(),
            tags: vec!["SHUFFLE_SERVER_VERSION".to_string()],
        });
        assert_eq!(StatusCode::SUCCESS, code);
        assert!(msg.starts_with("SUCCESS"));
    }

    #[tokio::test]
    async fn empty_chain_admits_everything() {
        let cluster_manager = ClusterManager::new(Config::default());
        let access_manager =
            AccessManager::from_config(&Config::default(), &cluster_manager).unwrap();
        let (code, _) = access_manager.check(&AccessInfo {
            access_id: "whatever".to_string(),
            tags: vec![],
        });
        assert_eq!(StatusCode::SUCCESS, code);
    }

    #[test]
    fn unknown_checker_is_rejected() {
        let mut config = Config::default();
        config.access_checkers = vec!["NoSuchChecker".to_string()];
        let cluster_manager = ClusterManager::new(Config::default());
        assert!(AccessManager::from_config(&config, &cluster_manager).is_err());
    }
}
