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

use once_cell::sync::OnceCell;
use parking_lot::Mutex;

/// Defers an expensive construction (like dialing a remote filesystem)
/// until the value is first needed.
pub struct LazyInit<T> {
    init_fn: Mutex<Option<Box<dyn FnOnce() -> T + Send>>>,
    value: OnceCell<T>,
}

impl<T> LazyInit<T> {
    pub fn new<F>(init_fn: F) -> Self
    where
        F: FnOnce() -> T + Send + 'static,
    {
        Self {
            init_fn: Mutex::new(Some(Box::new(init_fn))),
            value: OnceCell::new(),
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.value.get().is_some()
    }

    pub fn get_or_init(&self) -> &T {
        self.value.get_or_init(|| {
            let init_fn = self
                .init_fn
                .lock()
                .take()
                .expect("The lazy init fn has been consumed. This should not happen.");
            init_fn()
        })
    }
}

#[cfg(test)]
mod test {
    use crate::lazy_initializer::LazyInit;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn init_happens_once() {
        let counter = Arc::new(AtomicUsize::new(0));
        let cloned = counter.clone();
        let lazy = LazyInit::new(move || {
            cloned.fetch_add(1, Ordering::SeqCst);
            42
        });

        assert!(!lazy.is_initialized());
        assert_eq!(&42, lazy.get_or_init());
        assert_eq!(&42, lazy.get_or_init());
        assert!(lazy.is_initialized());
        assert_eq!(1, counter.load(Ordering::SeqCst));
    }
}
