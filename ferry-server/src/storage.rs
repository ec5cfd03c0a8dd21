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

use crate::config::Config;
use crate::runtime::manager::RuntimeManager;
use crate::store::hybrid::HybridStore;
use crate::store::{Store, StoreProvider};
use std::sync::Arc;

pub type HybridStorage = Arc<HybridStore>;

pub struct StorageService;

impl StorageService {
    pub fn init(runtime_manager: &RuntimeManager, config: &Config) -> HybridStorage {
        let storage = Arc::new(StoreProvider::get(runtime_manager.clone(), config.clone()));
        storage.clone().start();
        storage
    }
}
