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

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct MemoryStoreConfig {
    pub capacity: String,
}

impl MemoryStoreConfig {
    pub fn new(capacity: String) -> Self {
        Self { capacity }
    }
}

// =========================================================

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct LocalfileStoreConfig {
    pub data_paths: Vec<String>,

    #[serde(default = "as_default_disk_capacity")]
    pub disk_capacity: String,
    #[serde(default = "as_default_disk_high_watermark")]
    pub disk_high_watermark: f32,
}

fn as_default_disk_capacity() -> String {
    "1T".to_string()
}

fn as_default_disk_high_watermark() -> f32 {
    0.8
}

impl LocalfileStoreConfig {
    pub fn new(data_paths: Vec<String>) -> Self {
        LocalfileStoreConfig {
            data_paths,
            disk_capacity: as_default_disk_capacity(),
            disk_high_watermark: as_default_disk_high_watermark(),
        }
    }
}

// =========================================================

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct RemoteStoreConfig {
    #[serde(default = "as_default_max_concurrency")]
    pub max_concurrency: usize,

    #[serde(default = "as_default_flush_retry_max")]
    pub flush_retry_max: i32,
}

fn as_default_max_concurrency() -> usize {
    50
}

fn as_default_flush_retry_max() -> i32 {
    3
}

impl Default for RemoteStoreConfig {
    fn default() -> Self {
        Self {
            max_concurrency: as_default_max_concurrency(),
            flush_retry_max: as_default_flush_retry_max(),
        }
    }
}

// =========================================================

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct HybridStoreConfig {
    #[serde(default = "as_default_memory_spill_high_watermark")]
    pub memory_spill_high_watermark: f32,
    #[serde(default = "as_default_memory_spill_low_watermark")]
    pub memory_spill_low_watermark: f32,

    /// Flush events larger than this route to the cold (remote) tier.
    pub flush_cold_storage_threshold_size: Option<String>,

    /// A single partition buffer exceeding this is flushed eagerly.
    pub memory_single_buffer_max_spill_size: Option<String>,
}

fn as_default_memory_spill_high_watermark() -> f32 {
    0.8
}

fn as_default_memory_spill_low_watermark() -> f32 {
    0.2
}

impl HybridStoreConfig {
    pub fn new(
        memory_spill_high_watermark: f32,
        memory_spill_low_watermark: f32,
        memory_single_buffer_max_spill_size: Option<String>,
    ) -> Self {
        HybridStoreConfig {
            memory_spill_high_watermark,
            memory_spill_low_watermark,
            flush_cold_storage_threshold_size: None,
            memory_single_buffer_max_spill_size,
        }
    }
}

impl Default for HybridStoreConfig {
    fn default() -> Self {
        HybridStoreConfig {
            memory_spill_high_watermark: as_default_memory_spill_high_watermark(),
            memory_spill_low_watermark: as_default_memory_spill_low_watermark(),
            flush_cold_storage_threshold_size: None,
            memory_single_buffer_max_spill_size: None,
        }
    }
}

// =========================================================

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RuntimeConfig {
    pub read_thread_num: usize,
    pub localfile_write_thread_num: usize,
    pub remote_write_thread_num: usize,
    pub default_thread_num: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        RuntimeConfig {
            read_thread_num: 10,
            localfile_write_thread_num: 10,
            remote_write_thread_num: 4,
            default_thread_num: 4,
        }
    }
}

// =========================================================

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct AppConfig {
    #[serde(default = "as_default_app_heartbeat_timeout_min")]
    pub app_heartbeat_timeout_min: u32,

    #[serde(default = "as_default_commit_drain_timeout_sec")]
    pub commit_drain_timeout_sec: u64,
}

fn as_default_app_heartbeat_timeout_min() -> u32 {
    5
}

fn as_default_commit_drain_timeout_sec() -> u64 {
    60
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            app_heartbeat_timeout_min: as_default_app_heartbeat_timeout_min(),
            commit_drain_timeout_sec: as_default_commit_drain_timeout_sec(),
        }
    }
}

// =========================================================

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct LogConfig {
    pub path: String,
    #[serde(default = "as_default_rotation_config")]
    pub rotation: RotationConfig,
}

fn as_default_rotation_config() -> RotationConfig {
    RotationConfig::Daily
}

impl Default for LogConfig {
    fn default() -> Self {
        LogConfig {
            path: "/tmp/".to_string(),
            rotation: RotationConfig::Hourly,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub enum RotationConfig {
    Hourly,
    Daily,
    Never,
}

// =========================================================

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Copy, Eq, Hash)]
#[allow(non_camel_case_types)]
pub enum StorageType {
    MEMORY = 1,
    LOCALFILE = 2,
    MEMORY_LOCALFILE = 3,
    HDFS = 4,
    MEMORY_HDFS = 5,
    MEMORY_LOCALFILE_HDFS = 7,
}

impl Default for StorageType {
    fn default() -> Self {
        StorageType::MEMORY
    }
}

impl StorageType {
    pub fn contains_localfile(storage_type: &StorageType) -> bool {
        let val = *storage_type as u8;
        val & StorageType::LOCALFILE as u8 != 0
    }

    pub fn contains_memory(storage_type: &StorageType) -> bool {
        let val = *storage_type as u8;
        val & StorageType::MEMORY as u8 != 0
    }

    pub fn contains_hdfs(storage_type: &StorageType) -> bool {
        let val = *storage_type as u8;
        val & StorageType::HDFS as u8 != 0
    }
}

// =========================================================

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Default)]
pub struct Config {
    #[serde(default = "as_default_hybrid_store_config")]
    pub hybrid_store: HybridStoreConfig,

    pub memory_store: Option<MemoryStoreConfig>,
    pub localfile_store: Option<LocalfileStoreConfig>,
    pub remote_store: Option<RemoteStoreConfig>,

    #[serde(default = "as_default_storage_type")]
    pub store_type: StorageType,

    #[serde(default = "as_default_runtime_config")]
    pub runtime_config: RuntimeConfig,

    #[serde(default = "as_default_rpc_port")]
    pub rpc_port: i32,

    #[serde(default)]
    pub coordinator_quorum: Vec<String>,
    pub tags: Option<Vec<String>>,

    #[serde(default = "as_default_log_config")]
    pub log: LogConfig,

    #[serde(default = "as_default_app_config")]
    pub app_config: AppConfig,

    #[serde(default = "as_default_heartbeat_interval_seconds")]
    pub heartbeat_interval_seconds: u32,
}

fn as_default_hybrid_store_config() -> HybridStoreConfig {
    HybridStoreConfig::default()
}

fn as_default_storage_type() -> StorageType {
    StorageType::MEMORY
}

fn as_default_runtime_config() -> RuntimeConfig {
    RuntimeConfig::default()
}

fn as_default_rpc_port() -> i32 {
    19999
}

fn as_default_log_config() -> LogConfig {
    Default::default()
}

fn as_default_app_config() -> AppConfig {
    Default::default()
}

fn as_default_heartbeat_interval_seconds() -> u32 {
    2
}

const CONFIG_FILE_PATH_KEY: &str = "FERRY_SERVER_CONFIG_PATH";

impl Config {
    pub fn from(cfg_path: &str) -> Self {
        let path = Path::new(cfg_path);
        let file_content = fs::read_to_string(path).expect("Failed to read config file");
        toml::from_str(&file_content).unwrap()
    }

    pub fn create_from_env() -> Config {
        let path = match std::env::var(CONFIG_FILE_PATH_KEY) {
            Ok(val) => val,
            _ => panic!(
                "config path must be set in env args. key: {}",
                CONFIG_FILE_PATH_KEY
            ),
        };

        Config::from(&path)
    }

    pub fn create_mem_localfile_config(
        rpc_port: i32,
        capacity: String,
        local_data_path: String,
    ) -> Config {
        let toml_str = format!(
            r#"
        store_type = "MEMORY_LOCALFILE"
        coordinator_quorum = []
        rpc_port = {:?}

        [memory_store]
        capacity = {:?}

        [localfile_store]
        data_paths = [{:?}]
        "#,
            rpc_port, capacity, local_data_path
        );

        toml::from_str(toml_str.as_str()).unwrap()
    }

    pub fn create_simple_config() -> Config {
        let toml_str = r#"
        store_type = "MEMORY"
        coordinator_quorum = []
        rpc_port = 19999

        [memory_store]
        capacity = "1M"

        [hybrid_store]
        memory_spill_high_watermark = 0.8
        memory_spill_low_watermark = 0.2
        memory_single_buffer_max_spill_size = "256M"
        "#;

        toml::from_str(toml_str).unwrap()
    }
}

#[cfg(test)]
mod test {
    use crate::config::{Config, RuntimeConfig, StorageType};
    use crate::readable_size::ReadableSize;
    use std::str::FromStr;

    #[test]
    fn storage_type_test() {
        let stype = StorageType::MEMORY_LOCALFILE;
        assert_eq!(true, StorageType::contains_localfile(&stype));
        assert_eq!(true, StorageType::contains_memory(&stype));
        assert_eq!(false, StorageType::contains_hdfs(&stype));

        let stype = StorageType::MEMORY_LOCALFILE_HDFS;
        assert_eq!(true, StorageType::contains_hdfs(&stype));
    }

    #[test]
    fn config_test() {
        let toml_str = r#"
        store_type = "MEMORY_LOCALFILE_HDFS"
        coordinator_quorum = ["coord-1:19999"]

        [memory_store]
        capacity = "1024M"

        [localfile_store]
        data_paths = ["/data1/ferry"]
        disk_capacity = "1G"

        [hybrid_store]
        memory_spill_high_watermark = 0.8
        memory_spill_low_watermark = 0.2
        flush_cold_storage_threshold_size = "2000"

        [remote_store]
        max_concurrency = 10
        "#;

        let decoded: Config = toml::from_str(toml_str).unwrap();

        let capacity = ReadableSize::from_str(&decoded.memory_store.unwrap().capacity).unwrap();
        assert_eq!(1024 * 1024 * 1024, capacity.as_bytes());

        assert_eq!(
            decoded.runtime_config.read_thread_num,
            RuntimeConfig::default().read_thread_num
        );
        assert_eq!(StorageType::MEMORY_LOCALFILE_HDFS, decoded.store_type);
        assert_eq!(10, decoded.remote_store.unwrap().max_concurrency);
        assert_eq!(
            "2000",
            decoded
                .hybrid_store
                .flush_cold_storage_threshold_size
                .unwrap()
        );
    }
}
