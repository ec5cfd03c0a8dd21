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

use parking_lot::Mutex;
use std::sync::Arc;

/// Bounded memory accounting for the buffer pool. Writers reserve against
/// the capacity; flushed bytes are released once the flush event finishes.
#[derive(Clone)]
pub struct MemoryBudget {
    inner: Arc<Mutex<MemoryBudgetInner>>,
}

struct MemoryBudgetInner {
    capacity: i64,
    used: i64,
}

#[derive(Clone, Copy, Debug)]
pub struct CapacitySnapshot {
    capacity: i64,
    used: i64,
}

impl CapacitySnapshot {
    pub fn capacity(&self) -> i64 {
        self.capacity
    }

    pub fn used(&self) -> i64 {
        self.used
    }

    pub fn available(&self) -> i64 {
        self.capacity - self.used
    }
}

impl MemoryBudget {
    pub fn new(capacity: i64) -> MemoryBudget {
        MemoryBudget {
            inner: Arc::new(Mutex::new(MemoryBudgetInner { capacity, used: 0 })),
        }
    }

    pub fn snapshot(&self) -> CapacitySnapshot {
        let inner = self.inner.lock();
        CapacitySnapshot {
            capacity: inner.capacity,
            used: inner.used,
        }
    }

    /// Reserve memory for incoming blocks. `false` means the pool is
    /// exhausted and the caller should answer with back-pressure.
    pub fn try_inc_used(&self, size: i64) -> bool {
        let mut inner = self.inner.lock();
        if inner.used + size > inner.capacity {
            return false;
        }
        inner.used += size;
        true
    }

    pub fn dec_used(&self, size: i64) {
        let mut inner = self.inner.lock();
        inner.used = (inner.used - size).max(0);
    }
}

#[cfg(test)]
mod test {
    use crate::store::mem::budget::MemoryBudget;

    #[test]
    fn budget_is_bounded() {
        let budget = MemoryBudget::new(100);
        assert!(budget.try_inc_used(60));
        assert!(budget.try_inc_used(40));
        assert!(!budget.try_inc_used(1));

        budget.dec_used(40);
        assert!(budget.try_inc_used(30));

        let snapshot = budget.snapshot();
        assert_eq!(100, snapshot.capacity());
        assert_eq!(90, snapshot.used());
        assert_eq!(10, snapshot.available());
    }
}
