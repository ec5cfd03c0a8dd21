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

pub const KEY_REPLICA: &str = "ferry.data.replica";
pub const KEY_REPLICA_WRITE: &str = "ferry.data.replica.write";
pub const KEY_REPLICA_READ: &str = "ferry.data.replica.read";
pub const KEY_REPLICA_SKIP_ENABLED: &str = "ferry.data.replica.skip.enabled";
pub const KEY_DATA_TRANSFER_POOL_SIZE: &str = "ferry.client.data.transfer.pool.size";
pub const KEY_RETRY_MAX: &str = "ferry.client.retry.max";
pub const KEY_RETRY_INTERVAL_MAX_MS: &str = "ferry.client.retry.interval.max.ms";

/// The immutable, validated client configuration handed to the write
/// client at construction.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ClientConfig {
    pub replica: i32,
    pub replica_write: i32,
    pub replica_read: i32,
    pub replica_skip_enabled: bool,
    pub data_transfer_pool_size: usize,
    pub retry_max: i32,
    pub retry_interval_max_ms: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        ClientConfigBuilder::default().build()
    }
}

/// Three-layer resolution: an explicitly set value always wins, a
/// coordinator-pushed dynamic value fills the gaps, the defaults close
/// the rest. Dynamic values are applied once at startup.
#[derive(Clone, Debug, Default)]
pub struct ClientConfigBuilder {
    replica: Option<i32>,
    replica_write: Option<i32>,
    replica_read: Option<i32>,
    replica_skip_enabled: Option<bool>,
    data_transfer_pool_size: Option<usize>,
    retry_max: Option<i32>,
    retry_interval_max_ms: Option<u64>,
}

impl ClientConfigBuilder {
    pub fn replica(mut self, replica: i32) -> Self {
        self.replica = Some(replica);
        self
    }

    pub fn replica_write(mut self, replica_write: i32) -> Self {
        self.replica_write = Some(replica_write);
        self
    }

    pub fn replica_read(mut self, replica_read: i32) -> Self {
        self.replica_read = Some(replica_read);
        self
    }

    pub fn replica_skip_enabled(mut self, enabled: bool) -> Self {
        self.replica_skip_enabled = Some(enabled);
        self
    }

    pub fn data_transfer_pool_size(mut self, size: usize) -> Self {
        self.data_transfer_pool_size = Some(size);
        self
    }

    pub fn retry_max(mut self, retry_max: i32) -> Self {
        self.retry_max = Some(retry_max);
        self
    }

    pub fn retry_interval_max_ms(mut self, interval: u64) -> Self {
        self.retry_interval_max_ms = Some(interval);
        self
    }

    /// Overlay the coordinator-curated conf onto fields that were not set
    /// explicitly. Unknown keys and unparsable values are skipped.
    pub fn apply_dynamic(mut self, dynamic_conf: &[(String, String)]) -> Self {
        for (key, value) in dynamic_conf {
            match key.as_str() {
                KEY_REPLICA => {
                    if self.replica.is_none() {
                        self.replica = value.parse().ok();
                    }
                }
                KEY_REPLICA_WRITE => {
                    if self.replica_write.is_none() {
                        self.replica_write = value.parse().ok();
                    }
                }
                KEY_REPLICA_READ => {
                    if self.replica_read.is_none() {
                        self.replica_read = value.parse().ok();
                    }
                }
                KEY_REPLICA_SKIP_ENABLED => {
                    if self.replica_skip_enabled.is_none() {
                        self.replica_skip_enabled = value.parse().ok();
                    }
                }
                KEY_DATA_TRANSFER_POOL_SIZE => {
                    if self.data_transfer_pool_size.is_none() {
                        self.data_transfer_pool_size = value.parse().ok();
                    }
                }
                KEY_RETRY_MAX => {
                    if self.retry_max.is_none() {
                        self.retry_max = value.parse().ok();
                    }
                }
                KEY_RETRY_INTERVAL_MAX_MS => {
                    if self.retry_interval_max_ms.is_none() {
                        self.retry_interval_max_ms = value.parse().ok();
                    }
                }
                _ => {}
            }
        }
        self
    }

    pub fn build(self) -> ClientConfig {
        ClientConfig {
            replica: self.replica.unwrap_or(1),
            replica_write: self.replica_write.unwrap_or(1),
            replica_read: self.replica_read.unwrap_or(1),
            replica_skip_enabled: self.replica_skip_enabled.unwrap_or(true),
            data_transfer_pool_size: self.data_transfer_pool_size.unwrap_or(10),
            retry_max: self.retry_max.unwrap_or(3),
            retry_interval_max_ms: self.retry_interval_max_ms.unwrap_or(2000),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn explicit_config_wins_over_dynamic() {
        let dynamic = vec![
            (KEY_REPLICA.to_string(), "3".to_string()),
            (KEY_RETRY_MAX.to_string(), "7".to_string()),
            ("some.unknown.key".to_string(), "whatever".to_string()),
        ];

        let config = ClientConfigBuilder::default()
            .replica(2)
            .apply_dynamic(&dynamic)
            .build();

        // explicitly set: untouched by dynamic conf
        assert_eq!(2, config.replica);
        // not set: dynamic wins over the default
        assert_eq!(7, config.retry_max);
        // untouched everywhere: default
        assert_eq!(1, config.replica_write);
    }

    #[test]
    fn unparsable_dynamic_value_falls_back_to_default() {
        let dynamic = vec![(KEY_REPLICA.to_string(), "not-a-number".to_string())];
        let config = ClientConfigBuilder::default().apply_dynamic(&dynamic).build();
        assert_eq!(1, config.replica);
    }
}
