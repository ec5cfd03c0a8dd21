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

use crate::config::RuntimeConfig;
use crate::runtime::{create_runtime, RuntimeRef};
use std::future::Future;

#[derive(Clone, Debug)]
pub struct RuntimeManager {
    // for reading data
    pub read_runtime: RuntimeRef,
    // for flushing data to local disks
    pub localfile_write_runtime: RuntimeRef,
    // for flushing data to the remote storage
    pub remote_write_runtime: RuntimeRef,
    // the default runtime for background tasks.
    // like the data purging / heartbeat
    pub default_runtime: RuntimeRef,
}

impl Default for RuntimeManager {
    fn default() -> Self {
        RuntimeManager::from(Default::default())
    }
}

impl RuntimeManager {
    pub fn from(config: RuntimeConfig) -> Self {
        Self {
            read_runtime: create_runtime(config.read_thread_num, "read_thread_pool"),
            localfile_write_runtime: create_runtime(
                config.localfile_write_thread_num,
                "localfile_write_thread_pool",
            ),
            remote_write_runtime: create_runtime(
                config.remote_write_thread_num,
                "remote_write_thread_pool",
            ),
            default_runtime: create_runtime(config.default_thread_num, "default_thread_pool"),
        }
    }

    // for test cases to wait the future
    pub fn wait<F: Future>(&self, future: F) -> F::Output {
        self.default_runtime.block_on(future)
    }
}
