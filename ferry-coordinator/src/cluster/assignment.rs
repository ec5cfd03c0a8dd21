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

use super::server_node::ShuffleServerNode;
use ferry_core::common::PartitionRange;
use std::fmt;
use thiserror::Error;

#[derive(Error, Debug)]
#[allow(non_camel_case_types)]
pub enum AssignmentError {
    #[error("INSUFFICIENT_SERVERS: required {required}, available {available}")]
    INSUFFICIENT_SERVERS { required: usize, available: usize },

    #[error("Invalid assignment parameters: {0}")]
    INVALID_PARAMETERS(String),
}

/// One partition range together with its ordered replica server ids.
#[derive(Clone, Debug)]
pub struct PartitionAssignment {
    pub range: PartitionRange,
    pub server_ids: Vec<String>,
}

impl fmt::Display for PartitionAssignment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "PartitionRange[{}] -> servers={:?}",
            self.range, self.server_ids
        )
    }
}

pub trait AssignmentStrategy: Send + Sync {
    fn assign(
        &self,
        candidates: &[ShuffleServerNode],
        partition_num: i32,
        partition_num_per_range: i32,
        replica: usize,
    ) -> Result<Vec<PartitionAssignment>, AssignmentError>;
}

/// Orders the candidate set by increasing load (`(app_num, used_memory)`)
/// and hands every range `replica` distinct servers round-robin, rotating
/// the starting index so that successive ranges spread across the cluster.
#[derive(Clone, Debug, Default)]
pub struct LoadBalancedAssignment;

impl AssignmentStrategy for LoadBalancedAssignment {
    fn assign(
        &self,
        candidates: &[ShuffleServerNode],
        partition_num: i32,
        partition_num_per_range: i32,
        replica: usize,
    ) -> Result<Vec<PartitionAssignment>, AssignmentError> {
        if partition_num <= 0 || partition_num_per_range <= 0 {
            return Err(AssignmentError::INVALID_PARAMETERS(
                "partition_num and partition_num_per_range must be positive".to_string(),
            ));
        }
        if replica > candidates.len() {
            return Err(AssignmentError::INSUFFICIENT_SERVERS {
                required: replica,
                available: candidates.len(),
            });
        }

        let mut sorted = candidates.to_vec();
        sorted.sort_by_key(|node| node.load_key());

        let range_num = (partition_num as i64 + partition_num_per_range as i64 - 1)
            / partition_num_per_range as i64;

        let mut assignments = Vec::with_capacity(range_num as usize);
        for range_idx in 0..range_num {
            let start = range_idx * partition_num_per_range as i64;
            let end = std::cmp::min(
                (range_idx + 1) * partition_num_per_range as i64,
                partition_num as i64,
            );

            let mut server_ids = Vec::with_capacity(replica);
            for replica_idx in 0..replica {
                let server_idx = (range_idx as usize + replica_idx) % sorted.len();
                server_ids.push(sorted[server_idx].id.clone());
            }

            assignments.push(PartitionAssignment {
                range: PartitionRange::new(start as i32, end as i32),
                server_ids,
            });
        }

        Ok(assignments)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use chrono::Utc;
    use std::collections::HashSet;

    fn node(id: &str, app_num: i32, used_memory: i64) -> ShuffleServerNode {
        let now = Utc::now();
        ShuffleServerNode {
            id: id.to_string(),
            host: format!("host-{}", id),
            port: 19999,
            used_memory,
            available_memory: 1024,
            pre_allocated_memory: 0,
            event_num_in_flush: 0,
            app_num,
            partition_num: 0,
            tags: vec![],
            is_healthy: true,
            last_heartbeat: now,
            registration_time: now,
        }
    }

    #[test]
    fn every_range_gets_distinct_replicas() {
        let candidates = vec![node("s1", 0, 0), node("s2", 0, 0), node("s3", 0, 0)];
        let strategy = LoadBalancedAssignment::default();
        let assignments = strategy.assign(&candidates, 8, 2, 3).unwrap();

        assert_eq!(4, assignments.len());
        for assignment in &assignments {
            assert_eq!(3, assignment.server_ids.len());
            let distinct: HashSet<_> = assignment.server_ids.iter().collect();
            assert_eq!(3, distinct.len());
        }
        // the ranges cover [0, 8) without overlap
        assert_eq!(0, assignments[0].range.start);
        assert_eq!(2, assignments[0].range.end);
        assert_eq!(6, assignments[3].range.start);
        assert_eq!(8, assignments[3].range.end);
    }

    #[test]
    fn ranges_rotate_over_candidates() {
        let candidates = vec![node("s1", 0, 0), node("s2", 0, 0), node("s3", 0, 0)];
        let strategy = LoadBalancedAssignment::default();
        let assignments = strategy.assign(&candidates, 3, 1, 1).unwrap();

        let picked: Vec<_> = assignments
            .iter()
            .map(|a| a.server_ids[0].clone())
            .collect();
        let distinct: HashSet<_> = picked.iter().collect();
        assert_eq!(3, distinct.len());
    }

    #[test]
    fn lightly_loaded_server_is_preferred() {
        // s2 carries fewer apps, s3 less memory than s1
        let candidates = vec![node("s1", 2, 100), node("s2", 0, 500), node("s3", 2, 50)];
        let strategy = LoadBalancedAssignment::default();
        let assignments = strategy.assign(&candidates, 1, 1, 1).unwrap();
        assert_eq!("s2", assignments[0].server_ids[0]);
    }

    #[test]
    fn insufficient_servers() {
        let candidates = vec![node("s1", 0, 0)];
        let strategy = LoadBalancedAssignment::default();
        match strategy.assign(&candidates, 4, 1, 2) {
            Err(AssignmentError::INSUFFICIENT_SERVERS {
                required,
                available,
            }) => {
                assert_eq!(2, required);
                assert_eq!(1, available);
            }
            _ => panic!(),
        }
    }

    #[test]
    fn tail_range_is_clipped() {
        let candidates = vec![node("s1", 0, 0)];
        let strategy = LoadBalancedAssignment::default();
        let assignments = strategy.assign(&candidates, 5, 2, 1).unwrap();
        assert_eq!(3, assignments.len());
        assert_eq!(4, assignments[2].range.start);
        assert_eq!(5, assignments[2].range.end);
    }
}
