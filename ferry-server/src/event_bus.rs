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

use crate::runtime::RuntimeRef;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::Semaphore;

#[async_trait]
pub trait Subscriber: Send + Sync {
    type Input;

    async fn on_event(&self, event: Event<Self::Input>);
}

#[derive(Clone)]
pub struct Event<T> {
    pub data: T,
}

impl<T: Send + Sync + Clone> Event<T> {
    pub fn new(data: T) -> Event<T> {
        Event { data }
    }

    pub fn get_data(&self) -> &T {
        &self.data
    }
}

impl<T: Send + Sync + Clone> From<T> for Event<T> {
    fn from(data: T) -> Self {
        Event::new(data)
    }
}

/// A queue decoupling event producers from the single consumer loop. The
/// subscriber runs on the given runtime with bounded concurrency.
#[derive(Clone)]
pub struct EventBus<T> {
    subscriber: Arc<Mutex<Option<Arc<dyn Subscriber<Input = T>>>>>,

    queue_recv: async_channel::Receiver<Event<T>>,
    queue_send: async_channel::Sender<Event<T>>,

    name: String,
}

impl<T: Send + Sync + Clone + 'static> EventBus<T> {
    pub fn new(runtime: RuntimeRef, name: String, concurrency_limit: usize) -> EventBus<T> {
        let (send, recv) = async_channel::unbounded();
        let event_bus = EventBus {
            subscriber: Arc::new(Mutex::new(None)),
            queue_recv: recv,
            queue_send: send,
            name: name.to_string(),
        };

        let cloned = event_bus.clone();
        let handling_runtime = runtime.clone();
        runtime.spawn(async move {
            let limiter = Arc::new(Semaphore::new(concurrency_limit));
            while let Ok(message) = cloned.queue_recv.recv().await {
                // an event is never dropped: wait for the subscriber to attach
                let subscriber = loop {
                    if let Some(subscriber) = cloned.subscriber.lock().clone() {
                        break subscriber;
                    }
                    tokio::time::sleep(std::time::Duration::from_millis(10)).await;
                };
                let permit = limiter.clone().acquire_owned().await.unwrap();
                handling_runtime.spawn(async move {
                    subscriber.on_event(message).await;
                    drop(permit);
                });
            }
        });

        event_bus
    }

    pub fn subscribe<R: Subscriber<Input = T> + 'static>(&self, listener: R) {
        *self.subscriber.lock() = Some(Arc::new(listener));
    }

    pub async fn publish(&self, event: Event<T>) -> anyhow::Result<()> {
        self.queue_send.send(event).await?;
        Ok(())
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod test {
    use crate::event_bus::{Event, EventBus, Subscriber};
    use crate::runtime::create_runtime;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicI64, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn test_event_bus() -> anyhow::Result<()> {
        let runtime = create_runtime(1, "test");
        let event_bus: EventBus<String> = EventBus::new(runtime.clone(), "test".to_string(), 1);

        let flag = Arc::new(AtomicI64::new(0));

        struct SimpleCallback {
            flag: Arc<AtomicI64>,
        }
        #[async_trait]
        impl Subscriber for SimpleCallback {
            type Input = String;

            async fn on_event(&self, event: Event<Self::Input>) {
                println!("SimpleCallback has accepted event: {:?}", event.get_data());
                self.flag.fetch_add(1, Ordering::SeqCst);
            }
        }
        event_bus.subscribe(SimpleCallback { flag: flag.clone() });

        let cloned = event_bus.clone();
        let _ = runtime.block_on(async move { cloned.publish("singleEvent".to_string().into()).await });

        awaitility::at_most(Duration::from_secs(1)).until(|| flag.load(Ordering::SeqCst) == 1);
        Ok(())
    }
}
