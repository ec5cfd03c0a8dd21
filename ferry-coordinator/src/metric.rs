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

use lazy_static::lazy_static;
use prometheus::{IntCounter, IntGauge, Registry};

lazy_static! {
    pub static ref COORDINATOR_REGISTRY: Registry = Registry::new();
    pub static ref GAUGE_ALIVE_SERVER_NUM: IntGauge =
        IntGauge::new("alive_server_num", "alive shuffle server number").unwrap();
    pub static ref GAUGE_ALIVE_APP_NUM: IntGauge =
        IntGauge::new("alive_app_num", "alive application number").unwrap();
    pub static ref TOTAL_ACCESS_DENIED: IntCounter =
        IntCounter::new("total_access_denied", "denied accessCluster requests").unwrap();
    pub static ref TOTAL_ASSIGNMENT_REQUEST: IntCounter =
        IntCounter::new("total_assignment_request", "getShuffleAssignments requests").unwrap();
}

pub fn register_all() {
    let registry = &COORDINATOR_REGISTRY;
    let _ = registry.register(Box::new(GAUGE_ALIVE_SERVER_NUM.clone()));
    let _ = registry.register(Box::new(GAUGE_ALIVE_APP_NUM.clone()));
    let _ = registry.register(Box::new(TOTAL_ACCESS_DENIED.clone()));
    let _ = registry.register(Box::new(TOTAL_ASSIGNMENT_REQUEST.clone()));
}
