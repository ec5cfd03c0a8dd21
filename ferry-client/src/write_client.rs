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

use crate::config::ClientConfig;
use crate::coordinator::CoordinatorClient;
use crate::error::ClientError;
use crate::server_client::{
    RpcShuffleServerClientFactory, ShuffleServerClient, ShuffleServerClientFactory,
};
use bytes::{Buf, Bytes};
use croaring::{JvmLegacy, Treemap};
use dashmap::DashMap;
use ferry_core::common::{PartitionRange, RemoteStorageInfo, ShuffleBlock, ShuffleServerInfo};
use ferry_core::rpc::client::RetryPolicy;
use ferry_core::rpc::messages::GetShuffleAssignmentsResponse;
use ferry_core::status::StatusCode;
use log::{info, warn};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::Ordering::SeqCst;
use std::sync::atomic::{AtomicBool, AtomicI32};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;

/// One block annotated with its ordered target server list of length
/// `replica`.
#[derive(Clone, Debug)]
pub struct ShuffleBlockInfo {
    pub shuffle_id: i32,
    pub partition_id: i32,
    pub block: ShuffleBlock,
    pub shuffle_servers: Vec<ShuffleServerInfo>,
}

/// The partition of the input block ids of one send into acknowledged
/// and failed sets.
#[derive(Debug, Default)]
pub struct SendShuffleDataResult {
    pub success_block_ids: HashSet<i64>,
    pub failed_block_ids: HashSet<i64>,
}

/// Both projections of one assignment: what clients need for the write
/// fan-out and what servers need to pre-allocate.
#[derive(Clone, Debug, Default)]
pub struct ShuffleAssignmentsInfo {
    pub partition_to_servers: HashMap<i32, Vec<ShuffleServerInfo>>,
    pub server_to_partition_ranges: HashMap<ShuffleServerInfo, Vec<PartitionRange>>,
}

// server -> shuffle_id -> partition_id -> blocks
type ServerBatches = HashMap<ShuffleServerInfo, HashMap<i32, HashMap<i32, Vec<ShuffleBlock>>>>;
type ServerBlockIds = HashMap<ShuffleServerInfo, Vec<i64>>;

/// The engine-linked client: obtains assignments, registers shuffles,
/// ships blocks to the write quorum, commits, and reads results back.
pub struct ShuffleWriteClient {
    config: ClientConfig,
    coordinator_clients: Vec<CoordinatorClient>,
    registered_servers: DashMap<ShuffleServerInfo, ()>,
    client_factory: Arc<dyn ShuffleServerClientFactory>,
    data_transfer_pool: Arc<Semaphore>,
}

impl ShuffleWriteClient {
    pub fn new(config: ClientConfig) -> Self {
        let retry_policy = RetryPolicy {
            retry_max: config.retry_max,
            retry_interval_max_ms: config.retry_interval_max_ms,
        };
        Self::with_factory(config, Arc::new(RpcShuffleServerClientFactory::new(retry_policy)))
    }

    pub fn with_factory(
        config: ClientConfig,
        client_factory: Arc<dyn ShuffleServerClientFactory>,
    ) -> Self {
        let pool_size = config.data_transfer_pool_size.max(1);
        Self {
            config,
            coordinator_clients: vec![],
            registered_servers: DashMap::new(),
            client_factory,
            data_transfer_pool: Arc::new(Semaphore::new(pool_size)),
        }
    }

    /// Accepts a comma separated quorum list, e.g. "host1:19999,host2:19999".
    pub fn register_coordinators(&mut self, coordinators: &str) {
        let retry_policy = RetryPolicy {
            retry_max: self.config.retry_max,
            retry_interval_max_ms: self.config.retry_interval_max_ms,
        };
        for quorum in coordinators.split(',') {
            let quorum = quorum.trim();
            if quorum.is_empty() {
                continue;
            }
            self.coordinator_clients
                .push(CoordinatorClient::new(quorum.to_string(), retry_policy));
        }
    }

    pub fn registered_servers(&self) -> Vec<ShuffleServerInfo> {
        self.registered_servers
            .iter()
            .map(|entry| entry.key().clone())
            .collect()
    }

    fn get_client(&self, server: &ShuffleServerInfo) -> Arc<dyn ShuffleServerClient> {
        self.client_factory.get_client(server)
    }

    // ==================== write path ====================

    fn gen_server_to_blocks(
        block_info: &ShuffleBlockInfo,
        server_list: &[ShuffleServerInfo],
        server_to_blocks: &mut ServerBatches,
        server_to_block_ids: &mut ServerBlockIds,
    ) {
        for server in server_list {
            server_to_block_ids
                .entry(server.clone())
                .or_default()
                .push(block_info.block.block_id);

            server_to_blocks
                .entry(server.clone())
                .or_default()
                .entry(block_info.shuffle_id)
                .or_default()
                .entry(block_info.partition_id)
                .or_default()
                .push(block_info.block.clone());
        }
    }

    async fn send_shuffle_data_async(
        &self,
        app_id: &str,
        server_to_blocks: ServerBatches,
        server_to_block_ids: &ServerBlockIds,
        block_ids_tracker: &DashMap<i64, AtomicI32>,
    ) -> bool {
        // if one or more servers is failed, the sending is not totally successful
        let is_all_servers_success = AtomicBool::new(true);

        let mut futures = vec![];
        for (server, shuffle_to_blocks) in server_to_blocks {
            let client = self.get_client(&server);
            let pool = self.data_transfer_pool.clone();
            let app_id = app_id.to_string();
            futures.push(async move {
                let _permit = pool.acquire().await;
                let mut server_success = true;
                for (shuffle_id, partition_to_blocks) in shuffle_to_blocks {
                    let partition_blocks: Vec<(i32, Vec<ShuffleBlock>)> =
                        partition_to_blocks.into_iter().collect();
                    match client
                        .send_shuffle_data(&app_id, shuffle_id, partition_blocks)
                        .await
                    {
                        Ok(StatusCode::SUCCESS) => {}
                        Ok(status) => {
                            warn!(
                                "Send blocks to [{}] failed with statusCode[{:?}]",
                                &server.id, status
                            );
                            server_success = false;
                        }
                        Err(e) => {
                            warn!("Send blocks to [{}] failed. err: {}", &server.id, e);
                            server_success = false;
                        }
                    }
                }
                (server, server_success)
            });
        }

        let round_results = futures::future::join_all(futures).await;
        for (server, server_success) in round_results {
            if !server_success {
                is_all_servers_success.store(false, SeqCst);
                continue;
            }
            // mark a replica of every block that reached this server
            if let Some(block_ids) = server_to_block_ids.get(&server) {
                info!(
                    "Send: {} blocks to [{}] successfully",
                    block_ids.len(),
                    &server.id
                );
                for block_id in block_ids {
                    if let Some(counter) = block_ids_tracker.get(block_id) {
                        counter.fetch_add(1, SeqCst);
                    }
                }
            }
        }
        is_all_servers_success.load(SeqCst)
    }

    /// Ship a batch of blocks to their replica servers in up to two
    /// rounds. A block succeeds iff at least `replica_write` of its
    /// servers acknowledged it.
    pub async fn send_shuffle_data(
        &self,
        app_id: &str,
        blocks: Vec<ShuffleBlockInfo>,
    ) -> SendShuffleDataResult {
        let replica = self.config.replica as usize;
        let replica_write = self.config.replica_write as usize;

        let mut primary_server_to_blocks: ServerBatches = HashMap::new();
        let mut secondary_server_to_blocks: ServerBatches = HashMap::new();
        let mut primary_server_to_block_ids: ServerBlockIds = HashMap::new();
        let mut secondary_server_to_block_ids: ServerBlockIds = HashMap::new();

        // In order to reduce the data to send in the quorum protocol,
        // the blocks are split into two rounds: primary and secondary.
        // The primary round contains [0, replica_write) replicas, which
        // is the minimum number when there is no sending failure.
        for block_info in &blocks {
            let all_servers = &block_info.shuffle_servers;
            if self.config.replica_skip_enabled && replica_write < replica {
                Self::gen_server_to_blocks(
                    block_info,
                    &all_servers[0..replica_write],
                    &mut primary_server_to_blocks,
                    &mut primary_server_to_block_ids,
                );
                Self::gen_server_to_blocks(
                    block_info,
                    &all_servers[replica_write..replica],
                    &mut secondary_server_to_blocks,
                    &mut secondary_server_to_block_ids,
                );
            } else {
                // with replica skip disabled, all replicas go in one round
                Self::gen_server_to_blocks(
                    block_info,
                    all_servers,
                    &mut primary_server_to_blocks,
                    &mut primary_server_to_block_ids,
                );
            }
        }

        // the count of acknowledged replicas per block
        let block_ids_tracker: DashMap<i64, AtomicI32> = DashMap::new();
        for block_info in &blocks {
            block_ids_tracker.insert(block_info.block.block_id, AtomicI32::new(0));
        }

        let is_all_success = self
            .send_shuffle_data_async(
                app_id,
                primary_server_to_blocks,
                &primary_server_to_block_ids,
                &block_ids_tracker,
            )
            .await;

        // The secondary round is sent only when the primary round saw a
        // failed server. The whole batch goes out, even for blocks that
        // already reached their quorum; server failures are rare enough
        // that per-block routing is not worth its complexity.
        if !is_all_success && !secondary_server_to_blocks.is_empty() {
            info!("The sending of primary round is failed partially, so start the secondary round");
            self.send_shuffle_data_async(
                app_id,
                secondary_server_to_blocks,
                &secondary_server_to_block_ids,
                &block_ids_tracker,
            )
            .await;
        }

        let mut result = SendShuffleDataResult::default();
        for entry in block_ids_tracker.iter() {
            let block_id = *entry.key();
            let count = entry.value().load(SeqCst);
            if count >= self.config.replica_write {
                result.success_block_ids.insert(block_id);
            } else {
                result.failed_block_ids.insert(block_id);
            }
        }
        result
    }

    // ==================== registration / commit ====================

    pub async fn register_shuffle(
        &self,
        server: &ShuffleServerInfo,
        app_id: &str,
        shuffle_id: i32,
        partition_ranges: Vec<PartitionRange>,
        remote_storage: RemoteStorageInfo,
    ) -> Result<(), ClientError> {
        let client = self.get_client(server);
        let status = client
            .register_shuffle(app_id, shuffle_id, partition_ranges, remote_storage)
            .await?;
        if !status.is_success() {
            return Err(ClientError::SERVER_ERROR {
                server: server.id.clone(),
                status: status.into(),
                message: format!(
                    "Error happened when registerShuffle with appId[{}], shuffleId[{}]",
                    app_id, shuffle_id
                ),
            });
        }
        self.registered_servers.insert(server.clone(), ());
        Ok(())
    }

    /// Commit on every server; once a server's commit count covers all
    /// map tasks, finish the shuffle there. `true` iff every server
    /// committed (and finished when due).
    pub async fn send_commit(
        &self,
        servers: &[ShuffleServerInfo],
        app_id: &str,
        shuffle_id: i32,
        num_maps: i32,
    ) -> bool {
        let mut successful_commit = 0;
        for server in servers {
            let client = self.get_client(server);
            match client.send_commit(app_id, shuffle_id).await {
                Ok((StatusCode::SUCCESS, commit_count)) => {
                    info!(
                        "Successfully sendCommit for appId[{}], shuffleId[{}] to [{}], committed maps[{}], map number of stage is {}",
                        app_id, shuffle_id, &server.id, commit_count, num_maps
                    );
                    if commit_count >= num_maps {
                        match client.finish_shuffle(app_id, shuffle_id).await {
                            Ok(StatusCode::SUCCESS) => {
                                info!(
                                    "Successfully finish shuffle to [{}] for shuffleId[{}]",
                                    &server.id, shuffle_id
                                );
                            }
                            other => {
                                warn!(
                                    "Failed to finish shuffle to [{}] for shuffleId[{}], result: {:?}",
                                    &server.id, shuffle_id, other
                                );
                                continue;
                            }
                        }
                    }
                    successful_commit += 1;
                }
                other => {
                    warn!(
                        "Failed to commit shuffle data to [{}] for shuffleId[{}], result: {:?}",
                        &server.id, shuffle_id, other
                    );
                }
            }
        }
        successful_commit == servers.len()
    }

    pub async fn unregister_shuffle(
        &self,
        server: &ShuffleServerInfo,
        app_id: &str,
        shuffle_id: Option<i32>,
    ) -> Result<(), ClientError> {
        let client = self.get_client(server);
        let status = client.unregister_shuffle(app_id, shuffle_id).await?;
        if !status.is_success() {
            return Err(ClientError::SERVER_ERROR {
                server: server.id.clone(),
                status: status.into(),
                message: "Errors on unregistering shuffle".to_string(),
            });
        }
        Ok(())
    }

    // ==================== coordinator interactions ====================

    pub async fn get_shuffle_assignments(
        &self,
        app_id: &str,
        shuffle_id: i32,
        partition_num: i32,
        partition_num_per_range: i32,
        required_tags: Vec<String>,
    ) -> Result<ShuffleAssignmentsInfo, ClientError> {
        let mut last_error_msg = "Empty coordinator clients".to_string();
        for coordinator_client in &self.coordinator_clients {
            match coordinator_client
                .get_shuffle_assignments(
                    app_id,
                    shuffle_id,
                    partition_num,
                    partition_num_per_range,
                    self.config.replica,
                    required_tags.clone(),
                )
                .await
            {
                Ok(response) => {
                    if StatusCode::from_i32(response.status_code).is_success() {
                        info!(
                            "Success to get shuffle server assignment from {}",
                            coordinator_client.desc()
                        );
                        return Ok(Self::to_assignments_info(response));
                    }
                    last_error_msg = response.ret_msg;
                }
                Err(e) => {
                    warn!(
                        "Errors on getting assignments from {}. err: {}",
                        coordinator_client.desc(),
                        e
                    );
                    last_error_msg = e.to_string();
                }
            }
        }
        Err(ClientError::COORDINATOR_UNAVAILABLE(last_error_msg))
    }

    fn to_assignments_info(response: GetShuffleAssignmentsResponse) -> ShuffleAssignmentsInfo {
        let mut info = ShuffleAssignmentsInfo::default();
        for assignment in response.assignments {
            for partition_id in assignment.range.start..assignment.range.end {
                info.partition_to_servers
                    .insert(partition_id, assignment.servers.clone());
            }
            for server in assignment.servers {
                info.server_to_partition_ranges
                    .entry(server)
                    .or_default()
                    .push(assignment.range);
            }
        }
        info
    }

    pub async fn access_cluster(
        &self,
        access_id: &str,
        tags: Vec<String>,
        timeout_ms: i64,
    ) -> Result<(), ClientError> {
        let mut last_error_msg = "Empty coordinator clients".to_string();
        for coordinator_client in &self.coordinator_clients {
            match coordinator_client
                .access_cluster(access_id, tags.clone(), timeout_ms)
                .await
            {
                Ok((StatusCode::SUCCESS, _)) => return Ok(()),
                Ok((StatusCode::ACCESS_DENIED, msg)) => {
                    return Err(ClientError::ACCESS_DENIED(msg));
                }
                Ok((_, msg)) => last_error_msg = msg,
                Err(e) => last_error_msg = e.to_string(),
            }
        }
        Err(ClientError::COORDINATOR_UNAVAILABLE(last_error_msg))
    }

    pub async fn fetch_client_conf(&self, timeout_ms: i64) -> Vec<(String, String)> {
        for coordinator_client in &self.coordinator_clients {
            match coordinator_client.fetch_client_conf(timeout_ms).await {
                Ok(conf) => {
                    info!("Success to get conf from {}", coordinator_client.desc());
                    return conf;
                }
                Err(_) => {
                    warn!("Fail to get conf from {}", coordinator_client.desc());
                }
            }
        }
        vec![]
    }

    pub async fn fetch_remote_storage(&self, app_id: &str) -> RemoteStorageInfo {
        for coordinator_client in &self.coordinator_clients {
            match coordinator_client.fetch_remote_storage(app_id).await {
                Ok(remote_storage) => {
                    info!(
                        "Success to get storage {:?} from {}",
                        &remote_storage,
                        coordinator_client.desc()
                    );
                    return remote_storage;
                }
                Err(_) => {
                    warn!(
                        "Fail to get remote storage from {}",
                        coordinator_client.desc()
                    );
                }
            }
        }
        RemoteStorageInfo::default()
    }

    // ==================== shuffle result ====================

    /// Report the per-partition block ids to every assigned server and
    /// require at least `replica_write` acknowledgements per partition.
    pub async fn report_shuffle_result(
        &self,
        partition_to_servers: &HashMap<i32, Vec<ShuffleServerInfo>>,
        app_id: &str,
        shuffle_id: i32,
        task_attempt_id: i64,
        partition_to_block_ids: &HashMap<i32, Vec<i64>>,
        bitmap_num: i32,
    ) -> Result<(), ClientError> {
        let mut grouped_partitions: HashMap<ShuffleServerInfo, Vec<i32>> = HashMap::new();
        let mut partition_report_tracker: HashMap<i32, i32> = HashMap::new();
        for (partition_id, servers) in partition_to_servers {
            for server in servers {
                grouped_partitions
                    .entry(server.clone())
                    .or_default()
                    .push(*partition_id);
            }
            partition_report_tracker.insert(*partition_id, 0);
        }

        for (server, partition_ids) in grouped_partitions {
            let request_block_ids: Vec<(i32, Vec<i64>)> = partition_ids
                .iter()
                .map(|partition_id| {
                    (
                        *partition_id,
                        partition_to_block_ids
                            .get(partition_id)
                            .cloned()
                            .unwrap_or_default(),
                    )
                })
                .collect();

            let client = self.get_client(&server);
            match client
                .report_shuffle_result(
                    app_id,
                    shuffle_id,
                    task_attempt_id,
                    bitmap_num,
                    request_block_ids,
                )
                .await
            {
                Ok(StatusCode::SUCCESS) => {
                    for partition_id in &partition_ids {
                        if let Some(count) = partition_report_tracker.get_mut(partition_id) {
                            *count += 1;
                        }
                    }
                }
                other => {
                    warn!(
                        "Report shuffle result to [{}] for appId[{}], shuffleId[{}] failed: {:?}",
                        &server.id, app_id, shuffle_id, other
                    );
                }
            }
        }

        // quorum check
        for (_, count) in partition_report_tracker {
            if count < self.config.replica_write {
                return Err(ClientError::REPORT_QUORUM_FAILED(
                    app_id.to_string(),
                    shuffle_id,
                ));
            }
        }
        Ok(())
    }

    /// Contact the assigned servers in order and union the returned
    /// bitmaps, stopping after `replica_read` distinct successful reads.
    pub async fn get_shuffle_result(
        &self,
        servers: &[ShuffleServerInfo],
        app_id: &str,
        shuffle_id: i32,
        partition_id: i32,
    ) -> Result<Treemap, ClientError> {
        let mut block_id_bitmap = Treemap::new();
        let mut success_cnt = 0;
        for server in servers {
            let client = self.get_client(server);
            match client
                .get_shuffle_result(app_id, shuffle_id, partition_id)
                .await
            {
                Ok((StatusCode::SUCCESS, serialized_bitmap)) => {
                    // merge block ids from multiple servers
                    let bitmap_of_server = Treemap::deserialize::<JvmLegacy>(&serialized_bitmap);
                    block_id_bitmap.extend(bitmap_of_server.iter());
                    success_cnt += 1;
                    if success_cnt >= self.config.replica_read {
                        return Ok(block_id_bitmap);
                    }
                }
                other => {
                    warn!(
                        "Get shuffle result is failed from [{}] for appId[{}], shuffleId[{}], result: {:?}",
                        &server.id, app_id, shuffle_id, other
                    );
                }
            }
        }
        Err(ClientError::READ_QUORUM_FAILED(app_id.to_string(), shuffle_id))
    }

    /// Reconstruct a partition: walk the assigned servers in order,
    /// collect the expected blocks, stop once the bitmap is covered.
    pub async fn read_partition_blocks(
        &self,
        servers: &[ShuffleServerInfo],
        app_id: &str,
        shuffle_id: i32,
        partition_id: i32,
        expected_blocks: &Treemap,
    ) -> Result<HashMap<i64, Bytes>, ClientError> {
        let expected_num = expected_blocks.cardinality();
        let mut collected: HashMap<i64, Bytes> = HashMap::new();

        for server in servers {
            if collected.len() as u64 >= expected_num {
                break;
            }
            let client = self.get_client(server);

            let (status, index_data, data_file_len) = match client
                .get_shuffle_index(app_id, shuffle_id, partition_id)
                .await
            {
                Ok(result) => result,
                Err(e) => {
                    warn!("Errors on reading index from [{}]. err: {}", &server.id, e);
                    continue;
                }
            };
            if status != StatusCode::SUCCESS || index_data.is_empty() {
                continue;
            }

            let (data_status, data) = match client
                .get_shuffle_data(app_id, shuffle_id, partition_id, 0, data_file_len as i32)
                .await
            {
                Ok(result) => result,
                Err(e) => {
                    warn!("Errors on reading data from [{}]. err: {}", &server.id, e);
                    continue;
                }
            };
            if data_status != StatusCode::SUCCESS {
                continue;
            }

            // stride the fixed-width index records
            let mut index = index_data.clone();
            while index.remaining() >= 40 {
                let offset = index.get_i64();
                let length = index.get_i32();
                let _uncompress_length = index.get_i32();
                let _crc = index.get_i64();
                let block_id = index.get_i64();
                let _task_attempt_id = index.get_i64();

                if !expected_blocks.contains(block_id as u64) {
                    continue;
                }
                if collected.contains_key(&block_id) {
                    continue;
                }
                let start = offset as usize;
                let end = start + length as usize;
                if end > data.len() {
                    continue;
                }
                collected.insert(block_id, data.slice(start..end));
            }
        }

        if (collected.len() as u64) < expected_num {
            return Err(ClientError::READ_QUORUM_FAILED(
                app_id.to_string(),
                shuffle_id,
            ));
        }
        Ok(collected)
    }

    // ==================== heartbeats ====================

    /// Heartbeat every known server and coordinator in parallel under a
    /// wall-clock deadline; in-flight calls past it are cancelled.
    pub async fn send_app_heartbeat(&self, app_id: &str, timeout_ms: u64) {
        let heartbeats = async {
            let mut futures = vec![];
            for entry in self.registered_servers.iter() {
                let server = entry.key().clone();
                let client = self.get_client(&server);
                let app_id = app_id.to_string();
                futures.push(async move {
                    if let Err(e) = client.app_heartbeat(&app_id).await {
                        warn!("Failed to send heartbeat to [{}]. err: {}", &server.id, e);
                    }
                });
            }
            let coordinator_heartbeats = self
                .coordinator_clients
                .iter()
                .map(|coordinator_client| async move {
                    if let Err(e) = coordinator_client.app_heartbeat(app_id).await {
                        warn!(
                            "Failed to send heartbeat to {}. err: {}",
                            coordinator_client.desc(),
                            e
                        );
                    }
                });
            futures::future::join(
                futures::future::join_all(futures),
                futures::future::join_all(coordinator_heartbeats),
            )
            .await;
        };

        if tokio::time::timeout(Duration::from_millis(timeout_ms), heartbeats)
            .await
            .is_err()
        {
            warn!("app heartbeat is timeout after {}ms", timeout_ms);
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::config::ClientConfigBuilder;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::sync::atomic::AtomicUsize;

    /// A whole shuffle server faked at the client seam.
    #[derive(Default)]
    struct FakedShuffleServer {
        fail_send: AtomicBool,
        received_block_ids: Mutex<Vec<i64>>,
        bitmap: Mutex<Treemap>,
        get_result_calls: AtomicUsize,
    }

    impl FakedShuffleServer {
        fn with_bitmap(block_ids: &[u64]) -> Arc<Self> {
            let server = Self::default();
            let mut bitmap = server.bitmap.lock();
            for id in block_ids {
                bitmap.add(*id);
            }
            drop(bitmap);
            Arc::new(server)
        }
    }

    #[async_trait]
    impl ShuffleServerClient for FakedShuffleServer {
        async fn register_shuffle(
            &self,
            _app_id: &str,
            _shuffle_id: i32,
            _partition_ranges: Vec<PartitionRange>,
            _remote_storage: RemoteStorageInfo,
        ) -> Result<StatusCode, ClientError> {
            Ok(StatusCode::SUCCESS)
        }

        async fn send_shuffle_data(
            &self,
            _app_id: &str,
            _shuffle_id: i32,
            partition_blocks: Vec<(i32, Vec<ShuffleBlock>)>,
        ) -> Result<StatusCode, ClientError> {
            if self.fail_send.load(SeqCst) {
                return Ok(StatusCode::INTERNAL_ERROR);
            }
            let mut received = self.received_block_ids.lock();
            for (_, blocks) in partition_blocks {
                for block in blocks {
                    received.push(block.block_id);
                }
            }
            Ok(StatusCode::SUCCESS)
        }

        async fn send_commit(
            &self,
            _app_id: &str,
            _shuffle_id: i32,
        ) -> Result<(StatusCode, i32), ClientError> {
            Ok((StatusCode::SUCCESS, 1))
        }

        async fn finish_shuffle(
            &self,
            _app_id: &str,
            _shuffle_id: i32,
        ) -> Result<StatusCode, ClientError> {
            Ok(StatusCode::SUCCESS)
        }

        async fn report_shuffle_result(
            &self,
            _app_id: &str,
            _shuffle_id: i32,
            _task_attempt_id: i64,
            _bitmap_num: i32,
            partition_to_block_ids: Vec<(i32, Vec<i64>)>,
        ) -> Result<StatusCode, ClientError> {
            if self.fail_send.load(SeqCst) {
                return Ok(StatusCode::INTERNAL_ERROR);
            }
            let mut bitmap = self.bitmap.lock();
            for (_, block_ids) in partition_to_block_ids {
                for block_id in block_ids {
                    bitmap.add(block_id as u64);
                }
            }
            Ok(StatusCode::SUCCESS)
        }

        async fn get_shuffle_result(
            &self,
            _app_id: &str,
            _shuffle_id: i32,
            _partition_id: i32,
        ) -> Result<(StatusCode, Bytes), ClientError> {
            self.get_result_calls.fetch_add(1, SeqCst);
            let serialized = self.bitmap.lock().serialize::<JvmLegacy>();
            Ok((StatusCode::SUCCESS, Bytes::from(serialized)))
        }

        async fn get_shuffle_data(
            &self,
            _app_id: &str,
            _shuffle_id: i32,
            _partition_id: i32,
            _offset: i64,
            _length: i32,
        ) -> Result<(StatusCode, Bytes), ClientError> {
            Ok((StatusCode::SUCCESS, Bytes::new()))
        }

        async fn get_shuffle_index(
            &self,
            _app_id: &str,
            _shuffle_id: i32,
            _partition_id: i32,
        ) -> Result<(StatusCode, Bytes, i64), ClientError> {
            Ok((StatusCode::SUCCESS, Bytes::new(), 0))
        }

        async fn unregister_shuffle(
            &self,
            _app_id: &str,
            _shuffle_id: Option<i32>,
        ) -> Result<StatusCode, ClientError> {
            Ok(StatusCode::SUCCESS)
        }

        async fn app_heartbeat(&self, _app_id: &str) -> Result<StatusCode, ClientError> {
            Ok(StatusCode::SUCCESS)
        }
    }

    struct FakedFactory {
        servers: HashMap<String, Arc<FakedShuffleServer>>,
    }

    impl ShuffleServerClientFactory for FakedFactory {
        fn get_client(&self, server: &ShuffleServerInfo) -> Arc<dyn ShuffleServerClient> {
            self.servers.get(&server.id).unwrap().clone()
        }
    }

    fn server_info(id: &str) -> ShuffleServerInfo {
        ShuffleServerInfo::new(id, "127.0.0.1", 19999)
    }

    fn blocks_targeting(servers: &[ShuffleServerInfo], block_num: i64) -> Vec<ShuffleBlockInfo> {
        (0..block_num)
            .map(|block_id| ShuffleBlockInfo {
                shuffle_id: 0,
                partition_id: 0,
                block: ShuffleBlock {
                    block_id,
                    length: 4,
                    uncompress_length: 4,
                    crc: 0,
                    task_attempt_id: 0,
                    data: Bytes::from_static(b"data"),
                },
                shuffle_servers: servers.to_vec(),
            })
            .collect()
    }

    fn quorum_client(
        replica: i32,
        replica_write: i32,
        replica_read: i32,
        fakes: &[(&str, Arc<FakedShuffleServer>)],
    ) -> ShuffleWriteClient {
        let config = ClientConfigBuilder::default()
            .replica(replica)
            .replica_write(replica_write)
            .replica_read(replica_read)
            .replica_skip_enabled(true)
            .build();
        let factory = FakedFactory {
            servers: fakes
                .iter()
                .map(|(id, server)| (id.to_string(), server.clone()))
                .collect(),
        };
        ShuffleWriteClient::with_factory(config, Arc::new(factory))
    }

    #[tokio::test]
    async fn quorum_write_with_primary_failure_triggers_secondary_round() {
        let s1 = Arc::new(FakedShuffleServer::default());
        let s2 = Arc::new(FakedShuffleServer::default());
        let s3 = Arc::new(FakedShuffleServer::default());
        s2.fail_send.store(true, SeqCst);

        let client = quorum_client(3, 2, 1, &[("s1", s1.clone()), ("s2", s2), ("s3", s3.clone())]);
        let servers = vec![server_info("s1"), server_info("s2"), server_info("s3")];

        let result = client
            .send_shuffle_data("app-quorum", blocks_targeting(&servers, 10))
            .await;

        // every block was acknowledged by s1 and s3, reaching the quorum of 2
        assert_eq!(10, result.success_block_ids.len());
        assert!(result.failed_block_ids.is_empty());
        assert_eq!(10, s1.received_block_ids.lock().len());
        assert_eq!(10, s3.received_block_ids.lock().len());
    }

    #[tokio::test]
    async fn quorum_write_skips_secondary_round_when_primary_succeeds() {
        let s1 = Arc::new(FakedShuffleServer::default());
        let s2 = Arc::new(FakedShuffleServer::default());
        let s3 = Arc::new(FakedShuffleServer::default());

        let client = quorum_client(
            3,
            2,
            1,
            &[("s1", s1.clone()), ("s2", s2.clone()), ("s3", s3.clone())],
        );
        let servers = vec![server_info("s1"), server_info("s2"), server_info("s3")];

        let result = client
            .send_shuffle_data("app-skip", blocks_targeting(&servers, 5))
            .await;

        assert_eq!(5, result.success_block_ids.len());
        // the secondary server never received anything
        assert!(s3.received_block_ids.lock().is_empty());
        assert_eq!(5, s1.received_block_ids.lock().len());
        assert_eq!(5, s2.received_block_ids.lock().len());
    }

    #[tokio::test]
    async fn quorum_write_fails_blocks_below_replica_write() {
        let s1 = Arc::new(FakedShuffleServer::default());
        let s2 = Arc::new(FakedShuffleServer::default());
        let s3 = Arc::new(FakedShuffleServer::default());
        s2.fail_send.store(true, SeqCst);
        s3.fail_send.store(true, SeqCst);

        let client = quorum_client(3, 2, 1, &[("s1", s1), ("s2", s2), ("s3", s3)]);
        let servers = vec![server_info("s1"), server_info("s2"), server_info("s3")];

        let result = client
            .send_shuffle_data("app-fail", blocks_targeting(&servers, 3))
            .await;

        // only one replica landed, below the write quorum of 2
        assert!(result.success_block_ids.is_empty());
        assert_eq!(3, result.failed_block_ids.len());
    }

    #[tokio::test]
    async fn quorum_read_stops_after_replica_read_and_never_drops_a_block() {
        // bitmaps {1,2}, {2,3}, {1,3}: any two of them union to {1,2,3}
        let s1 = FakedShuffleServer::with_bitmap(&[1, 2]);
        let s2 = FakedShuffleServer::with_bitmap(&[2, 3]);
        let s3 = FakedShuffleServer::with_bitmap(&[1, 3]);

        let client = quorum_client(
            3,
            2,
            2,
            &[("s1", s1.clone()), ("s2", s2.clone()), ("s3", s3.clone())],
        );
        let servers = vec![server_info("s1"), server_info("s2"), server_info("s3")];

        let bitmap = client
            .get_shuffle_result(&servers, "app-read", 0, 0)
            .await
            .unwrap();

        assert_eq!(3, bitmap.cardinality());
        for id in [1u64, 2, 3] {
            assert!(bitmap.contains(id));
        }
        // stopped after the first two distinct successful reads
        assert_eq!(1, s1.get_result_calls.load(SeqCst));
        assert_eq!(1, s2.get_result_calls.load(SeqCst));
        assert_eq!(0, s3.get_result_calls.load(SeqCst));
    }

    #[tokio::test]
    async fn report_quorum_failure_is_fatal() {
        let s1 = Arc::new(FakedShuffleServer::default());
        let s2 = Arc::new(FakedShuffleServer::default());
        s1.fail_send.store(true, SeqCst);
        s2.fail_send.store(true, SeqCst);

        let client = quorum_client(2, 2, 1, &[("s1", s1), ("s2", s2)]);
        let partition_to_servers: HashMap<i32, Vec<ShuffleServerInfo>> =
            HashMap::from([(0, vec![server_info("s1"), server_info("s2")])]);
        let partition_to_block_ids: HashMap<i32, Vec<i64>> = HashMap::from([(0, vec![1, 2, 3])]);

        match client
            .report_shuffle_result(&partition_to_servers, "app-report", 0, 0, &partition_to_block_ids, 1)
            .await
        {
            Err(ClientError::REPORT_QUORUM_FAILED(app_id, 0)) => {
                assert_eq!("app-report", app_id);
            }
            _ => panic!(),
        }
    }
}
