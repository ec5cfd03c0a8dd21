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

use crate::block_id_manager::BlockIdManager;
use crate::config::Config;
use crate::error::WorkerError;
use crate::metric::{
    GAUGE_APP_NUMBER, GAUGE_PARTITION_NUMBER, PURGE_FAILED_COUNTER, TOTAL_APP_NUMBER,
    TOTAL_READ_DATA, TOTAL_RECEIVED_DATA,
};
use crate::runtime::manager::RuntimeManager;
use crate::store::hybrid::HybridStore;
use crate::store::{Block, ResponseData, ResponseDataIndex, Store};
use anyhow::{anyhow, Result};
use bytes::Bytes;
use dashmap::DashMap;
use ferry_core::common::{PartitionRange, RemoteStorageInfo};
use ferry_core::util::{now_timestamp_as_millis, now_timestamp_as_sec};
use log::{error, info, warn};
use parking_lot::RwLock;
use std::sync::atomic::Ordering::SeqCst;
use std::sync::atomic::{AtomicI32, AtomicU64};
use std::sync::{Arc, OnceLock};
use std::time::Duration;

pub use ferry_core::common::PartitionedUId;

pub static SHUFFLE_SERVER_ID: OnceLock<String> = OnceLock::new();
pub static SHUFFLE_SERVER_IP: OnceLock<String> = OnceLock::new();

// =============================================================

#[derive(Debug, Clone)]
pub struct WritingViewContext {
    pub uid: PartitionedUId,
    pub data_blocks: Vec<Block>,
    pub data_size: u64,
}

impl WritingViewContext {
    pub fn new(uid: PartitionedUId, data_blocks: Vec<Block>) -> Self {
        let len: u64 = data_blocks.iter().map(|block| block.length).sum::<i32>() as u64;
        WritingViewContext {
            uid,
            data_blocks,
            data_size: len,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ReadingViewContext {
    pub uid: PartitionedUId,
    pub reading_options: ReadingOptions,
}

#[derive(Debug, Clone)]
pub enum ReadingOptions {
    #[allow(non_camel_case_types)]
    FILE_OFFSET_AND_LEN(i64, i64),
}

pub struct ReadingIndexViewContext {
    pub partition_id: PartitionedUId,
}

#[derive(Debug, Clone)]
pub struct RegisterAppContext {
    pub app_id: String,
    pub remote_storage: Option<RemoteStorageInfo>,
}

#[derive(Debug, Clone)]
pub struct RegisterShuffleContext {
    pub app_id: String,
    pub shuffle_id: i32,
    pub partition_ranges: Vec<PartitionRange>,
}

#[allow(non_camel_case_types)]
#[derive(Debug, Clone)]
pub enum PurgeReason {
    SHUFFLE_LEVEL_EXPLICIT_UNREGISTER(String, i32),
    APP_LEVEL_EXPLICIT_UNREGISTER(String),
    APP_LEVEL_HEARTBEAT_TIMEOUT(String),
}

impl PurgeReason {
    pub fn extract(&self) -> (String, Option<i32>) {
        match &self {
            PurgeReason::SHUFFLE_LEVEL_EXPLICIT_UNREGISTER(x, y) => (x.to_owned(), Some(*y)),
            PurgeReason::APP_LEVEL_EXPLICIT_UNREGISTER(x) => (x.to_owned(), None),
            PurgeReason::APP_LEVEL_HEARTBEAT_TIMEOUT(x) => (x.to_owned(), None),
        }
    }

    pub fn extract_app_id(&self) -> String {
        match &self {
            PurgeReason::SHUFFLE_LEVEL_EXPLICIT_UNREGISTER(x, _) => x.to_owned(),
            PurgeReason::APP_LEVEL_EXPLICIT_UNREGISTER(x) => x.to_owned(),
            PurgeReason::APP_LEVEL_HEARTBEAT_TIMEOUT(x) => x.to_owned(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct PurgeDataContext {
    pub purge_reason: PurgeReason,
}

impl PurgeDataContext {
    pub fn new(reason: &PurgeReason) -> PurgeDataContext {
        PurgeDataContext {
            purge_reason: reason.clone(),
        }
    }

    pub fn extract(&self) -> (String, Option<i32>) {
        self.purge_reason.extract()
    }
}

// =============================================================

/// The per-(app, shuffle, server) lifecycle:
///
/// INIT --register--> REGISTERED --sendShuffleData--> WRITING
/// WRITING --sendCommit--> COMMITTING --(drain)--> COMMITTED
/// COMMITTED --finishShuffle--> READABLE
/// READABLE --heartbeat timeout or unregister--> TOMBSTONED
///
/// Writes after READABLE and reads before READABLE answer
/// STATE_UNEXPECTED; the TTL expiry tombstones any state.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ShuffleStage {
    Registered,
    Writing,
    Committing,
    Committed,
    Readable,
}

struct ShuffleMeta {
    stage: RwLock<ShuffleStage>,
    commit_count: AtomicI32,
}

// =============================================================

pub struct App {
    pub app_id: String,
    remote_storage: Option<RemoteStorageInfo>,

    latest_heartbeat_time: AtomicU64,
    store: Arc<HybridStore>,

    // key: shuffle_id
    shuffles: DashMap<i32, Arc<ShuffleMeta>>,

    // key: (shuffle_id, partition_id), value: partition size
    partition_meta_infos: DashMap<(i32, i32), AtomicU64>,

    // partitions whose flush was dropped after retry exhaustion
    faulted_partitions: DashMap<(i32, i32), ()>,

    block_id_manager: BlockIdManager,

    total_received_data_size: AtomicU64,

    pub(crate) registry_timestamp: u128,

    commit_drain_timeout: Duration,
}

impl App {
    fn from(
        app_id: String,
        remote_storage: Option<RemoteStorageInfo>,
        store: Arc<HybridStore>,
        config: &Config,
    ) -> Self {
        if let Err(error) = store.register_app(RegisterAppContext {
            app_id: app_id.clone(),
            remote_storage: remote_storage.clone(),
        }) {
            error!("Errors on registering app to store: {:#?}", error);
        }

        App {
            app_id,
            remote_storage,
            latest_heartbeat_time: AtomicU64::new(now_timestamp_as_sec()),
            store,
            shuffles: DashMap::new(),
            partition_meta_infos: DashMap::new(),
            faulted_partitions: DashMap::new(),
            block_id_manager: BlockIdManager::default(),
            total_received_data_size: Default::default(),
            registry_timestamp: now_timestamp_as_millis(),
            commit_drain_timeout: Duration::from_secs(
                config.app_config.commit_drain_timeout_sec,
            ),
        }
    }

    fn get_latest_heartbeat_time(&self) -> u64 {
        self.latest_heartbeat_time.load(SeqCst)
    }

    pub fn heartbeat(&self) -> Result<()> {
        self.latest_heartbeat_time
            .store(now_timestamp_as_sec(), SeqCst);
        Ok(())
    }

    pub fn remote_storage(&self) -> Option<&RemoteStorageInfo> {
        self.remote_storage.as_ref()
    }

    pub fn partition_number(&self) -> usize {
        self.partition_meta_infos.len()
    }

    pub fn total_received_data_size(&self) -> u64 {
        self.total_received_data_size.load(SeqCst)
    }

    // ==================== lifecycle ====================

    pub fn register_shuffle(
        &self,
        shuffle_id: i32,
        partition_ranges: Vec<PartitionRange>,
    ) -> Result<()> {
        self.heartbeat()?;
        self.shuffles.entry(shuffle_id).or_insert_with(|| {
            Arc::new(ShuffleMeta {
                stage: RwLock::new(ShuffleStage::Registered),
                commit_count: AtomicI32::new(0),
            })
        });
        self.store.register_shuffle(RegisterShuffleContext {
            app_id: self.app_id.clone(),
            shuffle_id,
            partition_ranges,
        })?;
        Ok(())
    }

    fn shuffle_meta(&self, shuffle_id: i32) -> Result<Arc<ShuffleMeta>, WorkerError> {
        self.shuffles
            .get(&shuffle_id)
            .map(|meta| meta.clone())
            .ok_or(WorkerError::SHUFFLE_IS_NOT_REGISTERED)
    }

    pub fn shuffle_stage(&self, shuffle_id: i32) -> Result<ShuffleStage, WorkerError> {
        Ok(*self.shuffle_meta(shuffle_id)?.stage.read())
    }

    pub fn mark_partition_faulted(&self, shuffle_id: i32, partition_id: i32) {
        warn!(
            "Partition is marked as faulted. app: {}, shuffle: {}, partition: {}",
            &self.app_id, shuffle_id, partition_id
        );
        self.faulted_partitions
            .insert((shuffle_id, partition_id), ());
    }

    fn reject_faulted(&self, uid: &PartitionedUId) -> Result<(), WorkerError> {
        if self
            .faulted_partitions
            .contains_key(&(uid.shuffle_id, uid.partition_id))
        {
            return Err(WorkerError::PARTITION_FAULTED(format!(
                "app: {}, shuffle: {}, partition: {}",
                &uid.app_id, uid.shuffle_id, uid.partition_id
            )));
        }
        Ok(())
    }

    // ==================== write path ====================

    pub async fn insert(&self, ctx: WritingViewContext) -> Result<i32, WorkerError> {
        self.heartbeat()?;

        let meta = self.shuffle_meta(ctx.uid.shuffle_id)?;
        {
            let mut stage = meta.stage.write();
            match *stage {
                ShuffleStage::Registered => *stage = ShuffleStage::Writing,
                ShuffleStage::Writing | ShuffleStage::Committing | ShuffleStage::Committed => {}
                ShuffleStage::Readable => {
                    return Err(WorkerError::STAGE_UNEXPECTED(format!(
                        "the shuffle {} is readable, writes are rejected",
                        ctx.uid.shuffle_id
                    )));
                }
            }
        }
        self.reject_faulted(&ctx.uid)?;

        let len = ctx.data_size;
        TOTAL_RECEIVED_DATA.inc_by(len);
        self.total_received_data_size.fetch_add(len, SeqCst);

        self.partition_meta_infos
            .entry((ctx.uid.shuffle_id, ctx.uid.partition_id))
            .or_insert_with(|| {
                GAUGE_PARTITION_NUMBER.inc();
                Default::default()
            })
            .fetch_add(len, SeqCst);

        self.store.insert(ctx).await?;
        Ok(len as i32)
    }

    /// The commit barrier: flush what the shuffle stages, wait for
    /// durability, then count this map task's commit.
    pub async fn commit_shuffle(&self, shuffle_id: i32) -> Result<i32, WorkerError> {
        self.heartbeat()?;

        let meta = self.shuffle_meta(shuffle_id)?;
        {
            let mut stage = meta.stage.write();
            match *stage {
                ShuffleStage::Registered
                | ShuffleStage::Writing
                | ShuffleStage::Committing
                | ShuffleStage::Committed => *stage = ShuffleStage::Committing,
                ShuffleStage::Readable => {
                    return Err(WorkerError::STAGE_UNEXPECTED(format!(
                        "the shuffle {} is readable, commits are rejected",
                        shuffle_id
                    )));
                }
            }
        }

        self.store.force_spill(&self.app_id, shuffle_id).await?;
        self.store
            .wait_flush_drained(&self.app_id, shuffle_id, self.commit_drain_timeout)
            .await?;

        *meta.stage.write() = ShuffleStage::Committed;
        let count = meta.commit_count.fetch_add(1, SeqCst) + 1;
        Ok(count)
    }

    /// The finish barrier: after the acknowledgement the shuffle is
    /// read-ready and rejects further writes.
    pub async fn finish_shuffle(&self, shuffle_id: i32) -> Result<(), WorkerError> {
        self.heartbeat()?;

        let meta = self.shuffle_meta(shuffle_id)?;
        // late blocks may still sit in memory when the commit raced a write
        self.store.force_spill(&self.app_id, shuffle_id).await?;
        self.store
            .wait_flush_drained(&self.app_id, shuffle_id, self.commit_drain_timeout)
            .await?;

        *meta.stage.write() = ShuffleStage::Readable;
        info!(
            "Shuffle is readable now. app: {}, shuffle: {}",
            &self.app_id, shuffle_id
        );
        Ok(())
    }

    // ==================== read path ====================

    fn ensure_readable(&self, shuffle_id: i32) -> Result<(), WorkerError> {
        match self.shuffle_stage(shuffle_id)? {
            ShuffleStage::Readable => Ok(()),
            stage => Err(WorkerError::STAGE_UNEXPECTED(format!(
                "the shuffle {} is not readable yet, stage: {:?}",
                shuffle_id, stage
            ))),
        }
    }

    pub async fn select(&self, ctx: ReadingViewContext) -> Result<ResponseData, WorkerError> {
        self.heartbeat()?;
        self.ensure_readable(ctx.uid.shuffle_id)?;
        self.reject_faulted(&ctx.uid)?;

        let response = self.store.get(ctx).await;
        response.map(|data| {
            TOTAL_READ_DATA.inc_by(data.len() as u64);
            data
        })
    }

    pub async fn list_index(
        &self,
        ctx: ReadingIndexViewContext,
    ) -> Result<ResponseDataIndex, WorkerError> {
        self.heartbeat()?;
        self.ensure_readable(ctx.partition_id.shuffle_id)?;
        self.reject_faulted(&ctx.partition_id)?;

        self.store.get_index(ctx).await
    }

    // ==================== shuffle result bitmaps ====================

    pub fn report_block_ids(
        &self,
        shuffle_id: i32,
        partition_to_block_ids: Vec<(i32, Vec<i64>)>,
    ) -> Result<()> {
        self.heartbeat()?;
        self.block_id_manager
            .report_block_ids(shuffle_id, partition_to_block_ids)
    }

    pub fn get_block_ids(&self, shuffle_id: i32, partition_id: i32) -> Result<Bytes> {
        self.heartbeat()?;
        self.block_id_manager.get_block_ids(shuffle_id, partition_id)
    }

    // ==================== purge ====================

    pub async fn purge(&self, reason: &PurgeReason) -> Result<()> {
        let (_, shuffle_id_option) = reason.extract();
        self.store.purge(&PurgeDataContext::new(reason)).await?;

        match shuffle_id_option {
            Some(shuffle_id) => {
                self.shuffles.remove(&shuffle_id);
                self.block_id_manager.purge_block_ids(shuffle_id)?;

                let deletion_keys: Vec<(i32, i32)> = self
                    .partition_meta_infos
                    .iter()
                    .filter(|entry| entry.key().0 == shuffle_id)
                    .map(|entry| *entry.key())
                    .collect();
                GAUGE_PARTITION_NUMBER.sub(deletion_keys.len() as i64);
                for deletion_key in deletion_keys {
                    self.partition_meta_infos.remove(&deletion_key);
                    self.faulted_partitions.remove(&deletion_key);
                }
            }
            _ => {
                GAUGE_PARTITION_NUMBER.sub(self.partition_meta_infos.len() as i64);
                self.shuffles.clear();
                self.partition_meta_infos.clear();
                self.faulted_partitions.clear();
            }
        }
        Ok(())
    }
}

// ==========================================================

#[derive(Debug, Clone)]
pub struct PurgeEvent {
    reason: PurgeReason,
}

pub type AppManagerRef = Arc<AppManager>;

pub struct AppManager {
    // key: app_id
    pub(crate) apps: DashMap<String, Arc<App>>,
    receiver: async_channel::Receiver<PurgeEvent>,
    sender: async_channel::Sender<PurgeEvent>,
    store: Arc<HybridStore>,
    app_heartbeat_timeout_min: u32,
    config: Config,
    runtime_manager: RuntimeManager,
}

impl AppManager {
    fn new(runtime_manager: RuntimeManager, config: Config, store: &Arc<HybridStore>) -> Self {
        let (sender, receiver) = async_channel::unbounded();
        let app_heartbeat_timeout_min = config.app_config.app_heartbeat_timeout_min;
        AppManager {
            apps: DashMap::new(),
            receiver,
            sender,
            store: store.clone(),
            app_heartbeat_timeout_min,
            config,
            runtime_manager,
        }
    }

    pub fn get_ref(
        runtime_manager: RuntimeManager,
        config: Config,
        store: &Arc<HybridStore>,
    ) -> AppManagerRef {
        let app_ref = Arc::new(AppManager::new(runtime_manager.clone(), config, store));
        store.with_app_manager(&app_ref);

        let app_manager_ref_cloned = app_ref.clone();
        runtime_manager.default_runtime.spawn(async move {
            info!("Starting app heartbeat checker...");
            loop {
                tokio::time::sleep(Duration::from_secs(10)).await;

                for item in app_manager_ref_cloned.apps.iter() {
                    let (key, app) = item.pair();
                    let last_time = app.get_latest_heartbeat_time();
                    let current = now_timestamp_as_sec();
                    let timeout_sec =
                        (app_manager_ref_cloned.app_heartbeat_timeout_min * 60) as u64;

                    if current - last_time > timeout_sec {
                        info!(
                            "Detected app:{:?} heartbeat timeout. now: {:?}, latest heartbeat: {:?}. timeout threshold: {:?}(min)",
                            key, current, last_time, app_manager_ref_cloned.app_heartbeat_timeout_min
                        );
                        if app_manager_ref_cloned
                            .sender
                            .send(PurgeEvent {
                                reason: PurgeReason::APP_LEVEL_HEARTBEAT_TIMEOUT(key.clone()),
                            })
                            .await
                            .is_err()
                        {
                            error!(
                                "Errors on sending purge event when app: {} heartbeat timeout",
                                key
                            );
                        }
                    }
                }
            }
        });

        let app_manager_cloned = app_ref.clone();
        runtime_manager.default_runtime.spawn(async move {
            info!("Starting purge event handler...");
            while let Ok(event) = app_manager_cloned.receiver.recv().await {
                let reason = event.reason;
                info!("Purging data with reason: {:?}", &reason);
                if let Err(err) = app_manager_cloned.purge_app_data(&reason).await {
                    PURGE_FAILED_COUNTER.inc();
                    error!(
                        "Errors on purging data with reason: {:?}. err: {:?}",
                        &reason, err
                    );
                }
            }
        });

        app_ref
    }

    pub fn app_is_exist(&self, app_id: &str) -> bool {
        self.apps.contains_key(app_id)
    }

    pub fn get_app(&self, app_id: &str) -> Option<Arc<App>> {
        self.apps.get(app_id).map(|v| v.value().clone())
    }

    pub fn get_alive_app_number(&self) -> usize {
        self.apps.len()
    }

    pub fn get_partition_number(&self) -> usize {
        self.apps
            .iter()
            .map(|entry| entry.value().partition_number())
            .sum()
    }

    pub async fn store_is_healthy(&self) -> Result<bool> {
        self.store.is_healthy().await
    }

    pub fn store_memory_snapshot(&self) -> crate::store::mem::budget::CapacitySnapshot {
        self.store.mem_snapshot()
    }

    pub fn store_memory_spill_event_num(&self) -> u64 {
        self.store.get_spill_event_num()
    }

    pub fn register(
        &self,
        app_id: String,
        shuffle_id: i32,
        partition_ranges: Vec<PartitionRange>,
        remote_storage: Option<RemoteStorageInfo>,
    ) -> Result<()> {
        info!(
            "Accepting registry. app_id: {}, shuffle_id: {}",
            &app_id, shuffle_id
        );
        let app_ref = self
            .apps
            .entry(app_id.clone())
            .or_insert_with(|| {
                TOTAL_APP_NUMBER.inc();
                GAUGE_APP_NUMBER.inc();
                Arc::new(App::from(
                    app_id,
                    remote_storage,
                    self.store.clone(),
                    &self.config,
                ))
            })
            .clone();
        app_ref.register_shuffle(shuffle_id, partition_ranges)
    }

    pub fn unregister_in_background(&self, reason: PurgeReason) -> Result<()> {
        let sender = self.sender.clone();
        self.runtime_manager.default_runtime.spawn(async move {
            if let Err(err) = sender.send(PurgeEvent { reason }).await {
                error!("Errors on sending purge event. err: {:?}", err);
            }
        });
        Ok(())
    }

    async fn purge_app_data(&self, reason: &PurgeReason) -> Result<()> {
        let (app_id, shuffle_id_option) = reason.extract();
        let app = self.get_app(&app_id).ok_or_else(|| {
            anyhow!(format!(
                "App:{} don't exist when purging data, this should not happen",
                &app_id
            ))
        })?;
        if shuffle_id_option.is_none() {
            self.apps.remove(&app_id);
            GAUGE_APP_NUMBER.dec();
        }
        app.purge(reason).await?;
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::config::Config;
    use crate::store::StoreProvider;
    use bytes::Bytes;

    fn mem_only_manager(capacity: &str) -> (AppManagerRef, RuntimeManager) {
        let mut config = Config::create_simple_config();
        config.memory_store.as_mut().unwrap().capacity = capacity.to_string();
        let runtime_manager: RuntimeManager = Default::default();
        let store = Arc::new(StoreProvider::get(runtime_manager.clone(), config.clone()));
        store.clone().start();
        (
            AppManager::get_ref(runtime_manager.clone(), config, &store),
            runtime_manager,
        )
    }

    fn writing_ctx_with_one_block(uid: &PartitionedUId, block_id: i64) -> WritingViewContext {
        let data = b"hello world";
        WritingViewContext::new(
            uid.clone(),
            vec![Block {
                block_id,
                length: data.len() as i32,
                uncompress_length: data.len() as i32,
                crc: 0,
                task_attempt_id: 0,
                data: Bytes::from_static(data),
            }],
        )
    }

    #[test]
    fn app_register_and_write_read_lifecycle() -> Result<()> {
        let (app_manager, runtime) = mem_only_manager("10M");
        let app_id = "lifecycle-app";

        app_manager.register(
            app_id.to_string(),
            1,
            vec![PartitionRange::new(0, 1)],
            None,
        )?;
        let app = app_manager.get_app(app_id).unwrap();
        assert_eq!(ShuffleStage::Registered, app.shuffle_stage(1)?);

        let uid = PartitionedUId::from(app_id.to_string(), 1, 0);
        runtime.wait(app.insert(writing_ctx_with_one_block(&uid, 100)))?;
        assert_eq!(ShuffleStage::Writing, app.shuffle_stage(1)?);

        // reads before finish are rejected
        let premature_read = runtime.wait(app.select(ReadingViewContext {
            uid: uid.clone(),
            reading_options: ReadingOptions::FILE_OFFSET_AND_LEN(0, 1024),
        }));
        match premature_read {
            Err(WorkerError::STAGE_UNEXPECTED(_)) => {}
            _ => panic!(),
        }

        let commit_count = runtime.wait(app.commit_shuffle(1))?;
        assert_eq!(1, commit_count);
        assert_eq!(ShuffleStage::Committed, app.shuffle_stage(1)?);

        runtime.wait(app.finish_shuffle(1))?;
        assert_eq!(ShuffleStage::Readable, app.shuffle_stage(1)?);

        // writes after finish are rejected
        let late_write = runtime.wait(app.insert(writing_ctx_with_one_block(&uid, 101)));
        match late_write {
            Err(WorkerError::STAGE_UNEXPECTED(_)) => {}
            _ => panic!(),
        }

        // reads are now served
        let read = runtime.wait(app.select(ReadingViewContext {
            uid: uid.clone(),
            reading_options: ReadingOptions::FILE_OFFSET_AND_LEN(0, 1024),
        }))?;
        assert_eq!(11, read.len());

        Ok(())
    }

    #[test]
    fn commit_counts_map_tasks() -> Result<()> {
        let (app_manager, runtime) = mem_only_manager("10M");
        let app_id = "commit-count-app";
        app_manager.register(app_id.to_string(), 0, vec![PartitionRange::new(0, 1)], None)?;
        let app = app_manager.get_app(app_id).unwrap();

        assert_eq!(1, runtime.wait(app.commit_shuffle(0))?);
        assert_eq!(2, runtime.wait(app.commit_shuffle(0))?);
        assert_eq!(3, runtime.wait(app.commit_shuffle(0))?);
        Ok(())
    }

    #[test]
    fn writing_to_unregistered_shuffle_fails() {
        let (app_manager, runtime) = mem_only_manager("10M");
        let app_id = "unregistered-shuffle-app";
        app_manager
            .register(app_id.to_string(), 0, vec![PartitionRange::new(0, 1)], None)
            .unwrap();
        let app = app_manager.get_app(app_id).unwrap();

        let uid = PartitionedUId::from(app_id.to_string(), 99, 0);
        match runtime.wait(app.insert(writing_ctx_with_one_block(&uid, 1))) {
            Err(WorkerError::SHUFFLE_IS_NOT_REGISTERED) => {}
            _ => panic!(),
        }
    }

    #[test]
    fn purge_only_touches_the_target_app() -> Result<()> {
        let (app_manager, runtime) = mem_only_manager("10M");

        for app_id in ["gc-app-1", "gc-app-2"] {
            app_manager.register(
                app_id.to_string(),
                0,
                vec![PartitionRange::new(0, 1)],
                None,
            )?;
            let app = app_manager.get_app(app_id).unwrap();
            let uid = PartitionedUId::from(app_id.to_string(), 0, 0);
            runtime.wait(app.insert(writing_ctx_with_one_block(&uid, 1)))?;
        }

        runtime.wait(
            app_manager.purge_app_data(&PurgeReason::APP_LEVEL_HEARTBEAT_TIMEOUT(
                "gc-app-1".to_string(),
            )),
        )?;

        assert!(!app_manager.app_is_exist("gc-app-1"));
        assert!(app_manager.app_is_exist("gc-app-2"));
        assert!(app_manager.get_app("gc-app-2").unwrap().total_received_data_size() > 0);
        Ok(())
    }

    #[test]
    fn faulted_partition_rejects_reads() -> Result<()> {
        let (app_manager, runtime) = mem_only_manager("10M");
        let app_id = "faulted-app";
        app_manager.register(app_id.to_string(), 0, vec![PartitionRange::new(0, 1)], None)?;
        let app = app_manager.get_app(app_id).unwrap();

        let uid = PartitionedUId::from(app_id.to_string(), 0, 0);
        runtime.wait(app.insert(writing_ctx_with_one_block(&uid, 1)))?;
        runtime.wait(app.commit_shuffle(0))?;
        runtime.wait(app.finish_shuffle(0))?;

        app.mark_partition_faulted(0, 0);
        match runtime.wait(app.select(ReadingViewContext {
            uid: uid.clone(),
            reading_options: ReadingOptions::FILE_OFFSET_AND_LEN(0, 1024),
        })) {
            Err(WorkerError::PARTITION_FAULTED(_)) => {}
            _ => panic!(),
        }
        Ok(())
    }
}
