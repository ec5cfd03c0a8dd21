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

use thiserror::Error;

#[derive(Error, Debug)]
#[allow(non_camel_case_types)]
pub enum WireError {
    #[error("rpc stream is incomplete")]
    STREAM_INCOMPLETE,

    #[error("rpc stream is incorrect: {0}")]
    STREAM_INCORRECT(String),

    #[error("rpc stream message type not found: {0}")]
    STREAM_MESSAGE_TYPE_NOT_FOUND(u8),

    #[error("connection reset by peer")]
    CONNECTION_RESET,

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl From<std::string::FromUtf8Error> for WireError {
    fn from(value: std::string::FromUtf8Error) -> Self {
        WireError::STREAM_INCORRECT(format!("invalid utf8: {}", value))
    }
}
