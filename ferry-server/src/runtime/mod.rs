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

pub mod manager;

use std::future::Future;
use std::sync::Arc;
use tokio::runtime::Builder as TokioRuntimeBuilder;
use tokio::runtime::Runtime as TokioRuntime;
use tokio::task::JoinHandle;

pub type RuntimeRef = Arc<Runtime>;

/// A named tokio runtime dedicated to one class of work so that slow
/// storage never starves the rpc path.
#[derive(Debug)]
pub struct Runtime {
    rt: TokioRuntime,
}

impl Runtime {
    pub fn spawn<F>(&self, future: F) -> JoinHandle<F::Output>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        self.rt.spawn(future)
    }

    pub fn spawn_blocking<F, R>(&self, func: F) -> JoinHandle<R>
    where
        F: FnOnce() -> R + Send + 'static,
        R: Send + 'static,
    {
        self.rt.spawn_blocking(func)
    }

    pub fn block_on<F: Future>(&self, future: F) -> F::Output {
        self.rt.block_on(future)
    }
}

pub fn create_runtime(pool_size: usize, name: &str) -> RuntimeRef {
    Arc::new(Runtime {
        rt: TokioRuntimeBuilder::new_multi_thread()
            .worker_threads(pool_size)
            .thread_name(name)
            .enable_all()
            .build()
            .unwrap(),
    })
}

#[cfg(test)]
mod tests {
    use crate::runtime::create_runtime;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_spawn() {
        let runtime = create_runtime(2, "test_spawn");
        let handle = runtime.spawn(async {
            thread::sleep(Duration::from_millis(50));
            1
        });
        assert_eq!(1, runtime.block_on(handle).unwrap());
    }

    #[test]
    fn test_nested_spawn() {
        let runtime = create_runtime(4, "test_nested_spawn");
        let cloned_rt = runtime.clone();

        let handle = runtime.spawn(async move {
            let mut counter = 0;
            for _ in 0..3 {
                counter += cloned_rt
                    .spawn(async move {
                        thread::sleep(Duration::from_millis(20));
                        1
                    })
                    .await
                    .unwrap()
            }
            counter
        });

        assert_eq!(3, runtime.block_on(handle).unwrap())
    }
}
