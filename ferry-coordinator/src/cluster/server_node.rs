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

use chrono::{DateTime, Utc};
use ferry_core::common::ShuffleServerInfo;

/// One shuffle server as seen by the coordinator, refreshed on every
/// heartbeat and evicted when the heartbeat stops.
#[derive(Clone, Debug)]
pub struct ShuffleServerNode {
    pub id: String,
    pub host: String,
    pub port: u16,

    // resource state
    pub used_memory: i64,
    pub available_memory: i64,
    pub pre_allocated_memory: i64,
    pub event_num_in_flush: i32,
    pub app_num: i32,
    pub partition_num: i64,

    pub tags: Vec<String>,
    pub is_healthy: bool,

    pub last_heartbeat: DateTime<Utc>,
    pub registration_time: DateTime<Utc>,
}

impl ShuffleServerNode {
    pub fn is_available_for_assignment(&self) -> bool {
        self.is_healthy
    }

    pub fn matches_tags(&self, required_tags: &[String]) -> bool {
        if required_tags.is_empty() {
            return true;
        }
        required_tags.iter().all(|tag| self.tags.contains(tag))
    }

    /// Ascending sort key: lightly loaded servers first.
    pub fn load_key(&self) -> (i32, i64) {
        (self.app_num, self.used_memory)
    }

    pub fn to_server_info(&self) -> ShuffleServerInfo {
        ShuffleServerInfo::new(self.id.clone(), self.host.clone(), self.port)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn node(tags: Vec<&str>) -> ShuffleServerNode {
        let now = Utc::now();
        ShuffleServerNode {
            id: "s1".to_string(),
            host: "10.0.0.1".to_string(),
            port: 19999,
            used_memory: 0,
            available_memory: 1024,
            pre_allocated_memory: 0,
            event_num_in_flush: 0,
            app_num: 0,
            partition_num: 0,
            tags: tags.into_iter().map(|t| t.to_string()).collect(),
            is_healthy: true,
            last_heartbeat: now,
            registration_time: now,
        }
    }

    #[test]
    fn tag_matching_is_superset() {
        let node = node(vec!["ss_v5", "GRPC"]);
        assert!(node.matches_tags(&[]));
        assert!(node.matches_tags(&["ss_v5".to_string()]));
        assert!(node.matches_tags(&["ss_v5".to_string(), "GRPC".to_string()]));
        assert!(!node.matches_tags(&["NETTY".to_string()]));
    }
}
