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

use crate::error::WorkerError;
use crate::event_bus::{Event, Subscriber};
use crate::metric::{TOTAL_MEMORY_SPILL_BYTES, TOTAL_SPILL_EVENTS_DROPPED};
use crate::store::hybrid::HybridStore;
use crate::store::spill::SpillMessage;
use async_trait::async_trait;
use log::{error, warn};
use std::sync::Arc;

/// Consumes flush events off the bus: picks the storage tier, writes the
/// batch, releases the buffered memory. A retriable failure re-enters the
/// queue with a bumped counter; exhaustion drops the event and marks the
/// partition faulted.
pub struct SpillEventHandler {
    pub store: Arc<HybridStore>,
}

#[async_trait]
impl Subscriber for SpillEventHandler {
    type Input = SpillMessage;

    async fn on_event(&self, event: Event<Self::Input>) {
        let message = event.get_data();
        let size = message.size;

        let store_ref = &self.store;
        let result = async {
            let storage_type = store_ref.select_storage_for_buffer(message).await?;
            message.set_candidate_storage_type(storage_type);
            store_ref.flush_storage_for_buffer(message).await
        }
        .await;

        match result {
            Ok(_) => {
                TOTAL_MEMORY_SPILL_BYTES.inc_by(size as u64);
                if let Err(err) = store_ref.release_memory_buffer(size, message).await {
                    error!(
                        "Errors on releasing memory data, that should not happen. err: {:#?}",
                        err
                    );
                }
                store_ref.finish_spill_event(message);
            }
            Err(WorkerError::APP_IS_NOT_FOUND) | Err(WorkerError::APP_HAS_BEEN_PURGED) => {
                // the owning app is gone, nothing left to write
                store_ref.finish_spill_event(message);
            }
            Err(WorkerError::FLUSH_EVENT_EXCEED_RETRY_MAX_LIMIT(_))
            | Err(WorkerError::NO_CANDIDATE_STORE) => {
                warn!(
                    "Dropping the flush event for app: {:?}. Attention: this will make data lost!",
                    &message.ctx.uid.app_id
                );
                store_ref.mark_partition_faulted(&message.ctx.uid).await;
                if let Err(err) = store_ref.release_memory_buffer(size, message).await {
                    error!(
                        "Errors on releasing memory data when dropping the flush event. err: {:#?}",
                        err
                    );
                }
                TOTAL_SPILL_EVENTS_DROPPED.inc();
                store_ref.finish_spill_event(message);
            }
            Err(error) => {
                error!(
                    "Errors on flushing data to persistent storage. The error: {:#?}",
                    error
                );
                let mut new_message = message.clone();
                new_message.retry_cnt = message.retry_cnt + 1;
                // re-push to the queue to execute
                let _ = store_ref.reenqueue_spill_event(new_message).await;
            }
        }
    }
}
