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

use anyhow::Error;
use ferry_core::status::StatusCode;
use thiserror::Error;

#[derive(Error, Debug)]
#[allow(non_camel_case_types)]
pub enum WorkerError {
    #[error("Internal error, it should not happen")]
    INTERNAL_ERROR,

    #[error("App is not found")]
    APP_IS_NOT_FOUND,

    #[error("App has been purged")]
    APP_HAS_BEEN_PURGED,

    #[error("Shuffle is not registered")]
    SHUFFLE_IS_NOT_REGISTERED,

    #[error("Operation rejected in current shuffle stage: {0}")]
    STAGE_UNEXPECTED(String),

    #[error("No enough memory to be allocated.")]
    NO_ENOUGH_MEMORY_TO_BE_ALLOCATED,

    #[error("No candidate storage selected for this flush event")]
    NO_CANDIDATE_STORE,

    #[error("Local disk used over the high watermark: {0}")]
    LOCAL_DISK_OVER_WATERMARK(String),

    #[error("Remote storage is not registered for app: {0}")]
    REMOTE_STORAGE_NOT_REGISTERED(String),

    #[error("Remote storage is unhealthy")]
    REMOTE_STORAGE_UNHEALTHY,

    #[error("Flush event has been retried exceed the max limit for app: {0}")]
    FLUSH_EVENT_EXCEED_RETRY_MAX_LIMIT(String),

    #[error("Partition has been marked as faulted: {0}")]
    PARTITION_FAULTED(String),

    #[error("Commit drain is not finished in time for app: {0}")]
    COMMIT_DRAIN_TIMEOUT(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl From<std::io::Error> for WorkerError {
    fn from(err: std::io::Error) -> Self {
        WorkerError::Other(Error::new(err))
    }
}

impl From<tokio::sync::AcquireError> for WorkerError {
    fn from(err: tokio::sync::AcquireError) -> Self {
        WorkerError::Other(Error::new(err))
    }
}

impl WorkerError {
    /// The envelope code this error degrades to on the wire.
    pub fn to_status_code(&self) -> StatusCode {
        match self {
            WorkerError::APP_IS_NOT_FOUND
            | WorkerError::APP_HAS_BEEN_PURGED
            | WorkerError::SHUFFLE_IS_NOT_REGISTERED => StatusCode::NO_REGISTER,
            WorkerError::STAGE_UNEXPECTED(_) => StatusCode::STATE_UNEXPECTED,
            WorkerError::NO_ENOUGH_MEMORY_TO_BE_ALLOCATED => StatusCode::NO_BUFFER,
            WorkerError::COMMIT_DRAIN_TIMEOUT(_) => StatusCode::TIMEOUT,
            _ => StatusCode::INTERNAL_ERROR,
        }
    }
}
