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

use bytes::Bytes;
use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};

/// A contiguous `[start, end)` of reducer partitions co-located on a server.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub struct PartitionRange {
    pub start: i32,
    pub end: i32,
}

impl PartitionRange {
    pub fn new(start: i32, end: i32) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, partition_id: i32) -> bool {
        partition_id >= self.start && partition_id < self.end
    }

    pub fn width(&self) -> i32 {
        self.end - self.start
    }
}

impl fmt::Display for PartitionRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.start, self.end)
    }
}

/// The identity of a shuffle server as published by the coordinator and
/// dialed by clients.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct ShuffleServerInfo {
    pub id: String,
    pub host: String,
    pub port: u16,
}

impl ShuffleServerInfo {
    pub fn new(id: impl Into<String>, host: impl Into<String>, port: u16) -> Self {
        Self {
            id: id.into(),
            host: host.into(),
            port,
        }
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl fmt::Display for ShuffleServerInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ShuffleServer[{}]", self.id)
    }
}

/// The per-app remote storage root plus filesystem conf overrides.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct RemoteStorageInfo {
    pub path: String,
    pub conf_overrides: HashMap<String, String>,
}

impl RemoteStorageInfo {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            conf_overrides: HashMap::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.path.is_empty()
    }
}

/// One immutable shuffle block produced by a map task.
#[derive(Clone, Debug, PartialEq)]
pub struct ShuffleBlock {
    pub block_id: i64,
    pub length: i32,
    pub uncompress_length: i32,
    pub crc: i64,
    pub task_attempt_id: i64,
    pub data: Bytes,
}

/// Identifies one partition of one shuffle of one app on a server.
#[derive(Clone, Debug, Default, Eq, PartialEq, Hash)]
pub struct PartitionedUId {
    pub app_id: String,
    pub shuffle_id: i32,
    pub partition_id: i32,
}

impl PartitionedUId {
    pub fn from(app_id: String, shuffle_id: i32, partition_id: i32) -> Self {
        Self {
            app_id,
            shuffle_id,
            partition_id,
        }
    }

    pub fn get_hash(uid: &PartitionedUId) -> u64 {
        let mut hasher = DefaultHasher::new();
        uid.hash(&mut hasher);
        hasher.finish()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn partition_range_is_half_open() {
        let range = PartitionRange::new(0, 4);
        assert!(range.contains(0));
        assert!(range.contains(3));
        assert!(!range.contains(4));
        assert_eq!(4, range.width());
        assert_eq!("0-4", format!("{}", range));
    }

    #[test]
    fn uid_hash_is_stable() {
        let uid = PartitionedUId::from("app".to_string(), 1, 2);
        assert_eq!(PartitionedUId::get_hash(&uid), PartitionedUId::get_hash(&uid.clone()));
    }
}
