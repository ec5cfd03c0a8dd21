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

use super::{AccessCheckResult, AccessInfo};
use crate::cluster::ClusterManagerRef;

/// Admits an app iff the cluster currently has enough live shuffle
/// servers to take new load.
pub struct AccessClusterLoadChecker {
    cluster_manager: ClusterManagerRef,
    server_num_threshold: i32,
}

impl AccessClusterLoadChecker {
    pub fn new(cluster_manager: ClusterManagerRef, server_num_threshold: i32) -> Self {
        Self {
            cluster_manager,
            server_num_threshold,
        }
    }

    pub fn check(&self, _access_info: &AccessInfo) -> AccessCheckResult {
        let alive = self.cluster_manager.get_alive_server_num() as i32;
        if alive >= self.server_num_threshold {
            AccessCheckResult::Allowed
        } else {
            AccessCheckResult::Denied(format!(
                "alive servers[{}] is less than the threshold[{}]",
                alive, self.server_num_threshold
            ))
        }
    }
}
