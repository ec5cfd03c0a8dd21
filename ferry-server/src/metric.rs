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
    pub static ref SERVER_REGISTRY: Registry = Registry::new();

    pub static ref TOTAL_RECEIVED_DATA: IntCounter =
        IntCounter::new("total_received_data", "received data bytes").unwrap();
    pub static ref TOTAL_READ_DATA: IntCounter =
        IntCounter::new("total_read_data", "read data bytes").unwrap();

    pub static ref TOTAL_APP_NUMBER: IntCounter =
        IntCounter::new("total_app_number", "total registered app number").unwrap();
    pub static ref GAUGE_APP_NUMBER: IntGauge =
        IntGauge::new("app_number", "alive app number").unwrap();
    pub static ref GAUGE_PARTITION_NUMBER: IntGauge =
        IntGauge::new("partition_number", "alive partition number").unwrap();

    pub static ref TOTAL_MEMORY_SPILL_BYTES: IntCounter =
        IntCounter::new("total_memory_spill_bytes", "flushed bytes").unwrap();
    pub static ref TOTAL_MEMORY_SPILL_TO_LOCALFILE: IntCounter = IntCounter::new(
        "total_memory_spill_to_localfile",
        "flush events routed to the local tier"
    )
    .unwrap();
    pub static ref TOTAL_MEMORY_SPILL_TO_HDFS: IntCounter = IntCounter::new(
        "total_memory_spill_to_hdfs",
        "flush events routed to the cold tier"
    )
    .unwrap();
    pub static ref GAUGE_MEMORY_SPILL_IN_FLIGHT_BYTES: IntGauge = IntGauge::new(
        "memory_spill_in_flight_bytes",
        "bytes picked for flush but not yet released"
    )
    .unwrap();
    pub static ref TOTAL_SPILL_EVENTS_DROPPED: IntCounter =
        IntCounter::new("total_spill_events_dropped", "flush events dropped").unwrap();

    pub static ref PURGE_FAILED_COUNTER: IntCounter =
        IntCounter::new("total_purge_failed", "failed purge operations").unwrap();
}

pub fn register_all() {
    let registry = &SERVER_REGISTRY;
    let _ = registry.register(Box::new(TOTAL_RECEIVED_DATA.clone()));
    let _ = registry.register(Box::new(TOTAL_READ_DATA.clone()));
    let _ = registry.register(Box::new(TOTAL_APP_NUMBER.clone()));
    let _ = registry.register(Box::new(GAUGE_APP_NUMBER.clone()));
    let _ = registry.register(Box::new(GAUGE_PARTITION_NUMBER.clone()));
    let _ = registry.register(Box::new(TOTAL_MEMORY_SPILL_BYTES.clone()));
    let _ = registry.register(Box::new(TOTAL_MEMORY_SPILL_TO_LOCALFILE.clone()));
    let _ = registry.register(Box::new(TOTAL_MEMORY_SPILL_TO_HDFS.clone()));
    let _ = registry.register(Box::new(GAUGE_MEMORY_SPILL_IN_FLIGHT_BYTES.clone()));
    let _ = registry.register(Box::new(TOTAL_SPILL_EVENTS_DROPPED.clone()));
    let _ = registry.register(Box::new(PURGE_FAILED_COUNTER.clone()));
}
