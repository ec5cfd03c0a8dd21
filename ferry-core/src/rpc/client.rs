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

use crate::error::WireError;
use crate::rpc::connection::Connection;
use crate::rpc::frame::Frame;
use anyhow::anyhow;
use log::warn;
use rand::Rng;
use std::sync::atomic::AtomicI64;
use std::sync::atomic::Ordering::SeqCst;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::Mutex;

/// Transient-network retry knobs applied around a whole call, with a
/// jittered backoff capped by `retry_interval_max_ms`.
#[derive(Clone, Copy, Debug)]
pub struct RetryPolicy {
    pub retry_max: i32,
    pub retry_interval_max_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            retry_max: 3,
            retry_interval_max_ms: 2000,
        }
    }
}

impl RetryPolicy {
    pub fn backoff(&self, attempt: i32) -> Duration {
        let base = 100u64.saturating_mul(1 << attempt.min(10) as u64);
        let capped = base.min(self.retry_interval_max_ms.max(1));
        let jittered = rand::thread_rng().gen_range(0..=capped);
        Duration::from_millis(jittered)
    }
}

/// One request/response channel to a remote endpoint. Calls are serialized
/// on the underlying connection; the request id correlates the answer.
pub struct RpcClient {
    target: String,
    connection: Mutex<Option<Connection>>,
    request_id: AtomicI64,
}

impl RpcClient {
    pub fn new(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            connection: Mutex::new(None),
            request_id: AtomicI64::new(0),
        }
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn next_request_id(&self) -> i64 {
        self.request_id.fetch_add(1, SeqCst)
    }

    /// Issue one call. A broken connection is dropped so that the next call
    /// redials the target.
    pub async fn call(&self, frame: Frame) -> Result<Frame, WireError> {
        let mut guard = self.connection.lock().await;
        if guard.is_none() {
            let stream = TcpStream::connect(&self.target).await?;
            *guard = Some(Connection::new(stream));
        }

        let connection = guard.as_mut().unwrap();
        let result = Self::roundtrip(connection, &frame).await;
        if result.is_err() {
            *guard = None;
        }
        result
    }

    async fn roundtrip(connection: &mut Connection, frame: &Frame) -> Result<Frame, WireError> {
        connection.write_frame(frame).await?;
        match connection.read_frame().await? {
            Some(response) => {
                if response.request_id() != frame.request_id() {
                    return Err(WireError::STREAM_INCORRECT(format!(
                        "response id {} does not match request id {}",
                        response.request_id(),
                        frame.request_id()
                    )));
                }
                Ok(response)
            }
            None => Err(WireError::CONNECTION_RESET),
        }
    }

    /// `call` with the retry policy applied to transient failures.
    pub async fn call_with_retry(
        &self,
        frame: Frame,
        policy: &RetryPolicy,
    ) -> Result<Frame, WireError> {
        let mut attempt = 0;
        loop {
            match self.call(frame.clone()).await {
                Ok(response) => return Ok(response),
                Err(e) => {
                    if attempt >= policy.retry_max {
                        return Err(WireError::Other(anyhow!(
                            "rpc to {} failed after {} attempts: {}",
                            &self.target,
                            attempt + 1,
                            e
                        )));
                    }
                    warn!(
                        "Errors on rpc [{}] to {}, attempt {}. err: {}",
                        frame.name(),
                        &self.target,
                        attempt,
                        e
                    );
                    tokio::time::sleep(policy.backoff(attempt)).await;
                    attempt += 1;
                }
            }
        }
    }
}
