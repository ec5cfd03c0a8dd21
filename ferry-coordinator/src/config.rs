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

use serde::Deserialize;

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    pub rpc_port: u16,

    pub heartbeat_timeout_seconds: i64,
    pub node_expiry_check_interval_seconds: i64,

    /// Ordered access checker chain, by name. Empty chain admits everything.
    pub access_checkers: Vec<String>,
    pub access_candidates_path: Option<String>,
    pub access_candidates_update_interval_sec: u64,
    pub access_load_checker_server_num_threshold: i32,

    /// Remote storage roots handed to apps round-robin.
    pub remote_storage_paths: Vec<String>,

    /// Knobs pushed down to clients via fetchClientConf.
    pub client_conf: Vec<(String, String)>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            rpc_port: 19999,
            heartbeat_timeout_seconds: 60,
            node_expiry_check_interval_seconds: 30,
            access_checkers: vec![],
            access_candidates_path: None,
            access_candidates_update_interval_sec: 60,
            access_load_checker_server_num_threshold: 1,
            remote_storage_paths: vec![],
            client_conf: vec![],
        }
    }
}

impl Config {
    pub fn from(cfg_path: &str) -> anyhow::Result<Self> {
        let file_content = std::fs::read_to_string(cfg_path)?;
        Ok(toml::from_str(&file_content)?)
    }
}

#[cfg(test)]
mod test {
    use crate::config::Config;

    #[test]
    fn config_test() {
        let toml_str = r#"
        rpc_port = 21000
        heartbeat_timeout_seconds = 30
        access_checkers = ["AccessCandidatesChecker", "AccessClusterLoadChecker"]
        access_candidates_path = "/tmp/candidates"
        access_load_checker_server_num_threshold = 2
        remote_storage_paths = ["hdfs://ns1/ferry", "hdfs://ns2/ferry"]
        client_conf = [["ferry.client.retry.max", "5"]]
        "#;

        let decoded: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(21000, decoded.rpc_port);
        assert_eq!(30, decoded.heartbeat_timeout_seconds);
        assert_eq!(2, decoded.access_checkers.len());
        assert_eq!(2, decoded.remote_storage_paths.len());
        assert_eq!(1, decoded.client_conf.len());
        // untouched field falls back to the default
        assert_eq!(30, decoded.node_expiry_check_interval_seconds);
    }
}
