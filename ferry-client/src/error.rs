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

use ferry_core::error::WireError;
use thiserror::Error;

/// The client-facing error taxonomy. Quorum failures are fatal for the
/// shuffle; the engine reruns the affected tasks on them.
#[derive(Error, Debug)]
#[allow(non_camel_case_types)]
pub enum ClientError {
    #[error("Quorum check of report shuffle result is failed for appId[{0}], shuffleId[{1}]")]
    REPORT_QUORUM_FAILED(String, i32),

    #[error("Get shuffle result is failed for appId[{0}], shuffleId[{1}]")]
    READ_QUORUM_FAILED(String, i32),

    #[error("Access denied: {0}")]
    ACCESS_DENIED(String),

    #[error("No coordinator answered the request: {0}")]
    COORDINATOR_UNAVAILABLE(String),

    #[error("Error happened from server [{server}]: status {status}, {message}")]
    SERVER_ERROR {
        server: String,
        status: i32,
        message: String,
    },

    #[error("Unexpected response frame: {0}")]
    UNEXPECTED_RESPONSE(String),

    #[error(transparent)]
    Wire(#[from] WireError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
