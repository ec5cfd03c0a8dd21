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

use crate::app::{
    AppManagerRef, PurgeDataContext, ReadingIndexViewContext, ReadingViewContext,
    RegisterAppContext, RegisterShuffleContext, WritingViewContext,
};
use crate::config::{Config, HybridStoreConfig, StorageType};
use crate::error::WorkerError;
use crate::event_bus::EventBus;
use crate::metric::{
    GAUGE_MEMORY_SPILL_IN_FLIGHT_BYTES, TOTAL_MEMORY_SPILL_TO_HDFS,
    TOTAL_MEMORY_SPILL_TO_LOCALFILE,
};
use crate::readable_size::ReadableSize;
use crate::runtime::manager::RuntimeManager;
use crate::store::hdfs::HdfsStore;
use crate::store::localfile::LocalFileStore;
use crate::store::mem::buffer::MemoryBuffer;
use crate::store::mem::budget::CapacitySnapshot;
use crate::store::memory::MemoryStore;
use crate::store::spill::event_handler::SpillEventHandler;
use crate::store::spill::{SpillMessage, SpillWritingViewContext};
use crate::store::{
    PersistentStore, ResponseData, ResponseDataIndex, Store,
};
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use dashmap::DashMap;
use ferry_core::common::PartitionedUId;
use log::{error, info, warn};
use once_cell::sync::OnceCell;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::str::FromStr;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering::SeqCst;
use std::sync::Arc;
use std::time::Duration;

const DEFAULT_SPILL_CONCURRENCY: usize = 8;
const DEFAULT_FLUSH_RETRY_MAX: i32 = 3;

/// The multi-tier storage manager: hot memory buffers, warm local disk,
/// cold remote filesystem. Flush events route between the persistent
/// tiers by size and pressure, writers are never blocked on a flush.
pub struct HybridStore {
    pub(crate) hot_store: Arc<MemoryStore>,
    warm_store: Option<Box<dyn PersistentStore>>,
    cold_store: Option<Box<dyn PersistentStore>>,

    config: HybridStoreConfig,

    memory_spill_lock: tokio::sync::Mutex<()>,
    memory_spill_event_num: AtomicU64,
    in_flight_bytes: AtomicU64,
    // key: (app_id, shuffle_id). Drained by the commit barrier.
    shuffle_in_flight_events: DashMap<(String, i32), Arc<AtomicU64>>,

    memory_spill_partition_max_threshold: Option<u64>,
    memory_spill_to_cold_threshold_size: Option<u64>,
    flush_retry_max: i32,

    // apps that registered a usable remote storage root
    app_remote_registered: DashMap<String, ()>,

    pub(crate) runtime_manager: RuntimeManager,
    pub(crate) event_bus: EventBus<SpillMessage>,

    app_manager: OnceCell<AppManagerRef>,
}

impl HybridStore {
    pub fn from(config: Config, runtime_manager: RuntimeManager) -> Self {
        let store_type = &config.store_type;
        if !StorageType::contains_memory(store_type) {
            panic!("Storage type must contains memory.");
        }

        let mut persistent_stores: VecDeque<Box<dyn PersistentStore>> = VecDeque::with_capacity(2);
        if StorageType::contains_localfile(store_type) {
            let localfile_store = LocalFileStore::from(
                config.localfile_store.clone().unwrap(),
                runtime_manager.clone(),
            );
            persistent_stores.push_back(Box::new(localfile_store));
        }
        if StorageType::contains_hdfs(store_type) {
            let hdfs_store = HdfsStore::from(
                config.remote_store.clone().unwrap_or_default(),
                &runtime_manager,
            );
            persistent_stores.push_back(Box::new(hdfs_store));
        }

        let hybrid_conf = config.hybrid_store.clone();
        let memory_spill_to_cold_threshold_size = hybrid_conf
            .flush_cold_storage_threshold_size
            .as_ref()
            .map(|v| ReadableSize::from_str(v).unwrap().as_bytes());
        let memory_spill_partition_max_threshold = hybrid_conf
            .memory_single_buffer_max_spill_size
            .as_ref()
            .map(|v| ReadableSize::from_str(v).unwrap().as_bytes());
        let flush_retry_max = config
            .remote_store
            .as_ref()
            .map(|c| c.flush_retry_max)
            .unwrap_or(DEFAULT_FLUSH_RETRY_MAX);

        let event_bus = EventBus::new(
            runtime_manager.localfile_write_runtime.clone(),
            "spill".to_string(),
            DEFAULT_SPILL_CONCURRENCY,
        );

        HybridStore {
            hot_store: Arc::new(MemoryStore::from(
                config.memory_store.unwrap(),
                runtime_manager.clone(),
            )),
            warm_store: persistent_stores.pop_front(),
            cold_store: persistent_stores.pop_front(),
            config: hybrid_conf,
            memory_spill_lock: tokio::sync::Mutex::new(()),
            memory_spill_event_num: Default::default(),
            in_flight_bytes: Default::default(),
            shuffle_in_flight_events: Default::default(),
            memory_spill_partition_max_threshold,
            memory_spill_to_cold_threshold_size,
            flush_retry_max,
            app_remote_registered: Default::default(),
            runtime_manager,
            event_bus,
            app_manager: OnceCell::new(),
        }
    }

    pub fn with_app_manager(&self, app_manager_ref: &AppManagerRef) {
        let _ = self.app_manager.set(app_manager_ref.clone());
    }

    fn is_memory_only(&self) -> bool {
        self.cold_store.is_none() && self.warm_store.is_none()
    }

    fn cold_available_for(&self, app_id: &str) -> bool {
        self.cold_store.is_some() && self.app_remote_registered.contains_key(app_id)
    }

    fn warm_localfile(&self) -> Option<&LocalFileStore> {
        self.warm_store
            .as_ref()
            .and_then(|store| store.as_any().downcast_ref::<LocalFileStore>())
    }

    fn is_local_disk_pressured(&self) -> bool {
        self.warm_localfile()
            .map(|localfile| localfile.is_above_high_watermark())
            .unwrap_or(false)
    }

    pub fn mem_snapshot(&self) -> CapacitySnapshot {
        self.hot_store.memory_snapshot()
    }

    pub fn get_spill_event_num(&self) -> u64 {
        self.memory_spill_event_num.load(SeqCst)
    }

    pub fn get_in_flight_size(&self) -> u64 {
        self.in_flight_bytes.load(SeqCst)
    }

    // ==================== flush event routing ====================

    /// Pick the tier a flush event lands on. The routing is monotone in
    /// event size: events over the cold threshold go to the cold tier,
    /// smaller events stay on the local disk unless it is pressured.
    /// An already retried event is promoted to the cold tier.
    pub async fn select_storage_for_buffer(
        &self,
        message: &SpillMessage,
    ) -> Result<StorageType, WorkerError> {
        if !message.ctx.is_valid() {
            return Err(WorkerError::APP_IS_NOT_FOUND);
        }
        let app_id = &message.ctx.uid.app_id;
        if message.retry_cnt >= self.flush_retry_max {
            return Err(WorkerError::FLUSH_EVENT_EXCEED_RETRY_MAX_LIMIT(
                app_id.to_string(),
            ));
        }

        let cold_available = self.cold_available_for(app_id);
        if self.warm_store.is_none() {
            return if cold_available {
                Ok(StorageType::HDFS)
            } else {
                Err(WorkerError::NO_CANDIDATE_STORE)
            };
        }

        let spill_size = message.size as u64;
        let over_cold_threshold = self
            .memory_spill_to_cold_threshold_size
            .map(|threshold| spill_size > threshold)
            .unwrap_or(false);

        if cold_available
            && (over_cold_threshold || message.retry_cnt >= 1 || self.is_local_disk_pressured())
        {
            return Ok(StorageType::HDFS);
        }

        Ok(StorageType::LOCALFILE)
    }

    pub async fn flush_storage_for_buffer(
        &self,
        message: &SpillMessage,
    ) -> Result<(), WorkerError> {
        let storage_type = message
            .get_candidate_storage_type()
            .ok_or(WorkerError::NO_CANDIDATE_STORE)?;

        let warm = self
            .warm_store
            .as_ref()
            .or(self.cold_store.as_ref())
            .ok_or_else(|| anyhow!("empty persistent store. It should not happen"))?;
        let cold = self.cold_store.as_ref().unwrap_or(warm);
        let candidate_store = match &storage_type {
            StorageType::HDFS => {
                TOTAL_MEMORY_SPILL_TO_HDFS.inc();
                cold
            }
            _ => {
                TOTAL_MEMORY_SPILL_TO_LOCALFILE.inc();
                warm
            }
        };

        candidate_store.spill_insert(message.ctx.clone()).await
    }

    pub async fn publish_spill_event(&self, message: SpillMessage) -> Result<()> {
        let size = message.size as u64;
        let shuffle_key = (
            message.ctx.uid.app_id.to_owned(),
            message.ctx.uid.shuffle_id,
        );
        self.shuffle_in_flight_events
            .entry(shuffle_key)
            .or_insert_with(|| Arc::new(AtomicU64::new(0)))
            .fetch_add(1, SeqCst);
        self.memory_spill_event_num.fetch_add(1, SeqCst);
        self.in_flight_bytes.fetch_add(size, SeqCst);
        GAUGE_MEMORY_SPILL_IN_FLIGHT_BYTES.add(size as i64);

        self.event_bus.publish(message.into()).await?;
        Ok(())
    }

    /// Re-enqueue a failed event without touching the in-flight counters.
    pub async fn reenqueue_spill_event(&self, message: SpillMessage) -> Result<()> {
        self.event_bus.publish(message.into()).await?;
        Ok(())
    }

    pub fn finish_spill_event(&self, message: &SpillMessage) {
        let size = message.size as u64;
        let shuffle_key = (
            message.ctx.uid.app_id.to_owned(),
            message.ctx.uid.shuffle_id,
        );
        if let Some(counter) = self.shuffle_in_flight_events.get(&shuffle_key) {
            counter.fetch_sub(1, SeqCst);
        }
        self.memory_spill_event_num.fetch_sub(1, SeqCst);
        self.in_flight_bytes.fetch_sub(size, SeqCst);
        GAUGE_MEMORY_SPILL_IN_FLIGHT_BYTES.sub(size as i64);
    }

    pub async fn release_memory_buffer(
        &self,
        data_size: i64,
        message: &SpillMessage,
    ) -> Result<()> {
        self.hot_store
            .clear_spilled_buffer(&message.ctx.uid, message.flight_id, data_size)
    }

    pub async fn mark_partition_faulted(&self, uid: &PartitionedUId) {
        if let Some(app_manager) = self.app_manager.get() {
            if let Some(app) = app_manager.get_app(&uid.app_id) {
                app.mark_partition_faulted(uid.shuffle_id, uid.partition_id);
            }
        }
    }

    // ==================== spill triggers ====================

    async fn buffer_spill_impl(
        &self,
        uid: &PartitionedUId,
        buffer: Arc<MemoryBuffer>,
    ) -> Result<u64> {
        let spill_result = match buffer.spill()? {
            Some(spill_result) => spill_result,
            _ => return Ok(0),
        };
        let flight_len = spill_result.flight_len;

        let app_manager_ref = self.app_manager.clone();
        let app_is_exist_func = move |app_id: &str| -> bool {
            match app_manager_ref.get() {
                Some(app_manager) => app_manager.app_is_exist(app_id),
                _ => true,
            }
        };

        let writing_ctx =
            SpillWritingViewContext::new(uid.clone(), spill_result.blocks, app_is_exist_func);
        let message = SpillMessage {
            ctx: writing_ctx,
            size: flight_len,
            retry_cnt: 0,
            flight_id: spill_result.flight_id,
            candidate_storage_type: Arc::new(Mutex::new(None)),
        };
        self.publish_spill_event(message).await?;
        Ok(flight_len as u64)
    }

    async fn single_buffer_spill(&self, uid: &PartitionedUId) -> Result<u64> {
        let buffer = self.hot_store.get_buffer(uid)?;
        self.buffer_spill_impl(uid, buffer).await
    }

    fn memory_used_ratio(&self) -> f32 {
        let snapshot = self.mem_snapshot();
        let staged = snapshot.used() - self.in_flight_bytes.load(SeqCst) as i64;
        staged.max(0) as f32 / snapshot.capacity().max(1) as f32
    }

    async fn watermark_spill(&self) -> Result<()> {
        let ratio = self.memory_used_ratio();
        if ratio < self.config.memory_spill_high_watermark {
            return Ok(());
        }

        let capacity = self.hot_store.get_capacity();
        let mem_target_used = (capacity as f32 * self.config.memory_spill_low_watermark) as i64;
        let mem_real_used =
            self.mem_snapshot().used() - self.in_flight_bytes.load(SeqCst) as i64;
        let mem_expected_spill_bytes = mem_real_used - mem_target_used;
        if mem_expected_spill_bytes <= 0 {
            return Ok(());
        }

        info!(
            "[Spill] Watermark spill is triggered. ratio: {}. expected spill bytes: {}",
            ratio, mem_expected_spill_bytes
        );

        let buffers = self.hot_store.lookup_spill_buffers(mem_expected_spill_bytes);
        for (uid, buffer) in buffers {
            if let Err(err) = self.buffer_spill_impl(&uid, buffer).await {
                error!("Errors on making buffer spill. err: {:?}", err);
            }
        }
        Ok(())
    }

    // ==================== commit/finish barriers ====================

    /// Flush everything one shuffle still stages.
    pub async fn force_spill(&self, app_id: &str, shuffle_id: i32) -> Result<()> {
        if self.is_memory_only() {
            return Ok(());
        }
        for (uid, buffer) in self.hot_store.buffers_of_shuffle(app_id, shuffle_id) {
            if buffer.staging_size() > 0 {
                self.buffer_spill_impl(&uid, buffer).await?;
            }
        }
        Ok(())
    }

    /// Wait until every pending flush of one shuffle hit its storage tier.
    /// Acknowledged writes are durable once this returns.
    pub async fn wait_flush_drained(
        &self,
        app_id: &str,
        shuffle_id: i32,
        timeout: Duration,
    ) -> Result<(), WorkerError> {
        let shuffle_key = (app_id.to_string(), shuffle_id);
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let pending = self
                .shuffle_in_flight_events
                .get(&shuffle_key)
                .map(|counter| counter.load(SeqCst))
                .unwrap_or(0);
            if pending == 0 {
                return Ok(());
            }
            if tokio::time::Instant::now() > deadline {
                return Err(WorkerError::COMMIT_DRAIN_TIMEOUT(app_id.to_string()));
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
    }
}

#[async_trait]
impl Store for HybridStore {
    fn start(self: Arc<HybridStore>) {
        if self.is_memory_only() {
            return;
        }
        self.event_bus.subscribe(SpillEventHandler {
            store: self.clone(),
        });
    }

    async fn insert(&self, ctx: WritingViewContext) -> Result<(), WorkerError> {
        let uid = ctx.uid.clone();
        let insert_result = self.hot_store.insert(ctx).await;

        if self.is_memory_only() {
            return insert_result;
        }

        // maybe the same partition will trigger spill at the same time, the
        // thread safe will be ensured by the buffer itself
        if let Some(threshold) = self.memory_spill_partition_max_threshold {
            if self.hot_store.buffer_staging_size(&uid) > threshold {
                if let Err(err) = self.single_buffer_spill(&uid).await {
                    warn!(
                        "Errors on single buffer spill. uid: {:?}. err: {:?}",
                        &uid, err
                    );
                }
            }
        }

        if let Ok(_lock) = self.memory_spill_lock.try_lock() {
            if let Err(err) = self.watermark_spill().await {
                warn!("Errors on watermark spill. {:?}", err)
            }
        }

        insert_result
    }

    async fn get(&self, ctx: ReadingViewContext) -> Result<ResponseData, WorkerError> {
        // serve from the tier the partition currently lives on
        if self
            .hot_store
            .get_buffer(&ctx.uid)
            .map(|buffer| buffer.total_size() > 0)
            .unwrap_or(false)
        {
            return self.hot_store.get(ctx).await;
        }
        if let Some(warm) = self.warm_store.as_ref() {
            let data = warm.get(ctx.clone()).await?;
            if data.len() > 0 || self.cold_store.is_none() {
                return Ok(data);
            }
        }
        match self.cold_store.as_ref() {
            Some(cold) => cold.get(ctx).await,
            _ => Err(WorkerError::NO_CANDIDATE_STORE),
        }
    }

    async fn get_index(
        &self,
        ctx: ReadingIndexViewContext,
    ) -> Result<ResponseDataIndex, WorkerError> {
        if self
            .hot_store
            .get_buffer(&ctx.partition_id)
            .map(|buffer| buffer.total_size() > 0)
            .unwrap_or(false)
        {
            return self.hot_store.get_index(ctx).await;
        }
        if let Some(warm) = self.warm_store.as_ref() {
            let index = warm.get_index(ReadingIndexViewContext {
                partition_id: ctx.partition_id.clone(),
            })
            .await?;
            let ResponseDataIndex::Local(ref local) = index;
            if !local.index_data.is_empty() || self.cold_store.is_none() {
                return Ok(index);
            }
        }
        match self.cold_store.as_ref() {
            Some(cold) => cold.get_index(ctx).await,
            _ => Err(WorkerError::NO_CANDIDATE_STORE),
        }
    }

    async fn purge(&self, ctx: &PurgeDataContext) -> Result<i64> {
        let (app_id, shuffle_id_option) = ctx.extract();
        let mut removed_size = 0i64;

        removed_size += self.hot_store.purge(ctx).await?;
        if let Some(warm) = self.warm_store.as_ref() {
            removed_size += warm.purge(ctx).await?;
        }
        if let Some(cold) = self.cold_store.as_ref() {
            removed_size += cold.purge(ctx).await?;
        }

        match shuffle_id_option {
            Some(shuffle_id) => {
                self.shuffle_in_flight_events
                    .remove(&(app_id.clone(), shuffle_id));
            }
            _ => {
                self.shuffle_in_flight_events
                    .retain(|(key_app, _), _| key_app != &app_id);
                self.app_remote_registered.remove(&app_id);
            }
        }
        info!("Removed data of app:[{}] in all stores", &app_id);
        Ok(removed_size)
    }

    async fn is_healthy(&self) -> Result<bool> {
        let warm = match self.warm_store.as_ref() {
            Some(warm) => warm.is_healthy().await.unwrap_or(false),
            _ => true,
        };
        let cold = match self.cold_store.as_ref() {
            Some(cold) => cold.is_healthy().await.unwrap_or(false),
            _ => true,
        };
        Ok(self.hot_store.is_healthy().await? && warm && cold)
    }

    fn register_app(&self, ctx: RegisterAppContext) -> Result<()> {
        self.hot_store.register_app(ctx.clone())?;
        if let Some(warm) = self.warm_store.as_ref() {
            warm.register_app(ctx.clone())?;
        }
        if let Some(cold) = self.cold_store.as_ref() {
            cold.register_app(ctx.clone())?;
        }
        if let Some(remote_storage) = &ctx.remote_storage {
            if !remote_storage.is_empty() && self.cold_store.is_some() {
                self.app_remote_registered.insert(ctx.app_id.clone(), ());
            }
        }
        Ok(())
    }

    fn register_shuffle(&self, ctx: RegisterShuffleContext) -> Result<()> {
        self.hot_store.register_shuffle(ctx.clone())?;
        if let Some(warm) = self.warm_store.as_ref() {
            warm.register_shuffle(ctx.clone())?;
        }
        if let Some(cold) = self.cold_store.as_ref() {
            cold.register_shuffle(ctx.clone())?;
        }
        Ok(())
    }

    async fn name(&self) -> StorageType {
        unimplemented!()
    }

    async fn spill_insert(&self, _ctx: SpillWritingViewContext) -> Result<(), WorkerError> {
        unimplemented!()
    }
}

#[cfg(test)]
mod tests {
    use crate::app::{
        PartitionedUId, ReadingIndexViewContext, ReadingOptions, ReadingViewContext,
        RegisterAppContext, WritingViewContext,
    };
    use crate::config::{
        Config, HybridStoreConfig, LocalfileStoreConfig, MemoryStoreConfig, RemoteStoreConfig,
        StorageType,
    };
    use crate::store::hybrid::HybridStore;
    use crate::store::spill::{SpillMessage, SpillWritingViewContext};
    use crate::store::{Block, ResponseDataIndex, Store};
    use bytes::Bytes;
    use ferry_core::common::RemoteStorageInfo;
    use std::sync::Arc;
    use std::time::Duration;

    fn start_store(
        memory_single_buffer_max_spill_size: Option<String>,
        memory_capacity: String,
        temp_path: String,
    ) -> Arc<HybridStore> {
        let mut config = Config::default();
        config.memory_store = Some(MemoryStoreConfig::new(memory_capacity));
        config.localfile_store = Some(LocalfileStoreConfig::new(vec![temp_path]));
        config.hybrid_store =
            HybridStoreConfig::new(0.8, 0.2, memory_single_buffer_max_spill_size);
        config.store_type = StorageType::MEMORY_LOCALFILE;

        Arc::new(HybridStore::from(config, Default::default()))
    }

    fn spill_message_of_size(app_id: &str, size: i64) -> SpillMessage {
        SpillMessage {
            ctx: SpillWritingViewContext::new(
                PartitionedUId::from(app_id.to_string(), 1, 1),
                Arc::new(vec![Block {
                    block_id: 1,
                    length: 100,
                    uncompress_length: 100,
                    crc: 0,
                    task_attempt_id: 0,
                    data: Bytes::from_static(&[0u8; 100]),
                }]),
                |_| true,
            ),
            size,
            retry_cnt: 0,
            flight_id: 0,
            candidate_storage_type: Arc::new(parking_lot::Mutex::new(None)),
        }
    }

    #[test]
    fn select_storage_routes_by_size() -> anyhow::Result<()> {
        let temp_dir = tempdir::TempDir::new("select_storage_test").unwrap();
        let temp_path = temp_dir.path().to_str().unwrap().to_string();

        let app_id = "select_storage_test_app_id";
        let mut config = Config::default();
        config.memory_store = Some(MemoryStoreConfig::new("1G".to_string()));
        let mut localfile_config = LocalfileStoreConfig::new(vec![temp_path]);
        localfile_config.disk_capacity = "1G".to_string();
        config.localfile_store = Some(localfile_config);
        config.remote_store = Some(RemoteStoreConfig::default());
        config.hybrid_store = HybridStoreConfig::default();
        config.hybrid_store.flush_cold_storage_threshold_size = Some("2000".to_string());
        config.store_type = StorageType::MEMORY_LOCALFILE_HDFS;

        let store = Arc::new(HybridStore::from(config, Default::default()));
        store.register_app(RegisterAppContext {
            app_id: app_id.to_string(),
            remote_storage: Some(RemoteStorageInfo::new("test")),
        })?;

        let runtime = store.runtime_manager.clone();

        // a small event stays on the local disk
        let message = spill_message_of_size(app_id, 1000);
        assert_eq!(
            StorageType::LOCALFILE,
            runtime.wait(store.select_storage_for_buffer(&message))?
        );

        // a big event routes to the cold tier
        let message = spill_message_of_size(app_id, 1000000);
        assert_eq!(
            StorageType::HDFS,
            runtime.wait(store.select_storage_for_buffer(&message))?
        );

        // a retried event is promoted to the cold tier
        let mut message = spill_message_of_size(app_id, 1000);
        message.retry_cnt = 1;
        assert_eq!(
            StorageType::HDFS,
            runtime.wait(store.select_storage_for_buffer(&message))?
        );

        // without a registered remote storage everything stays local
        let message = spill_message_of_size("unknown_app", 1000000);
        assert_eq!(
            StorageType::LOCALFILE,
            runtime.wait(store.select_storage_for_buffer(&message))?
        );

        Ok(())
    }

    fn write_some_data(
        store: Arc<HybridStore>,
        uid: PartitionedUId,
        data: &'static [u8],
        batch_size: i64,
    ) -> Vec<i64> {
        let runtime = store.runtime_manager.clone();
        let mut block_ids = vec![];
        for i in 0..batch_size {
            block_ids.push(i);
            let writing_ctx = WritingViewContext::new(
                uid.clone(),
                vec![Block {
                    block_id: i,
                    length: data.len() as i32,
                    uncompress_length: data.len() as i32,
                    crc: 0,
                    task_attempt_id: 0,
                    data: Bytes::from_static(data),
                }],
            );
            runtime.wait(store.insert(writing_ctx)).unwrap();
        }
        block_ids
    }

    #[test]
    fn single_buffer_spill_lands_on_disk() -> anyhow::Result<()> {
        let data = b"hello world!";
        let temp_dir = tempdir::TempDir::new("single_buffer_spill_test").unwrap();
        let temp_path = temp_dir.path().to_str().unwrap().to_string();

        // every insert crosses the single-buffer threshold
        let store = start_store(
            Some("1".to_string()),
            ((data.len() * 10000) as u64).to_string(),
            temp_path,
        );
        store.clone().start();

        let runtime = store.runtime_manager.clone();
        let uid = PartitionedUId::from("1000".to_string(), 0, 0);
        let expected_block_ids = write_some_data(store.clone(), uid.clone(), data, 100);

        awaitility::at_most(Duration::from_secs(10)).until(|| store.get_in_flight_size() == 0);

        let index = runtime.wait(store.get_index(ReadingIndexViewContext {
            partition_id: uid.clone(),
        }))?;
        let ResponseDataIndex::Local(index) = index;
        let records = crate::store::index_codec::IndexCodec::decode_all(index.index_data)?;

        let mut accepted_block_ids: Vec<i64> = records.iter().map(|r| r.block_id).collect();
        accepted_block_ids.sort();
        assert_eq!(expected_block_ids, accepted_block_ids);

        // the data read back from disk matches what was written
        let read = runtime.wait(store.get(ReadingViewContext {
            uid: uid.clone(),
            reading_options: ReadingOptions::FILE_OFFSET_AND_LEN(0, (data.len() * 100) as i64),
        }))?;
        assert_eq!(data.len() * 100, read.len());

        Ok(())
    }
}
