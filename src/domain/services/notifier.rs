/*
Copyright 2024 San Francisco Compute Company

Licensed under the Apache License, Version 2.0 (the "License");
you may not use this file except in compliance with the License.
You may obtain a copy of the License at

    http://www.apache.org/licenses/LICENSE-2.0

Unless required by applicable law or agreed to in writing, software
distributed under the License is distributed on an "AS IS" BASIS,
WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
See the License for the specific language governing permissions and
limitations under the License.
*/

use crate::ports::ChangePublisher;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Queue of change callbacks drained by a single publishing worker
///
/// Arrival order is preserved. A rejected callback is logged and dropped.
pub struct Notifier {
    sender: Mutex<Option<mpsc::UnboundedSender<String>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl Notifier {
    /// Spawn the worker; must be called inside a tokio runtime
    pub fn start(publisher: Arc<dyn ChangePublisher>) -> Self {
        let (sender, mut receiver) = mpsc::unbounded_channel::<String>();
        let worker = tokio::spawn(async move {
            while let Some(callback) = receiver.recv().await {
                match publisher.publish(&callback).await {
                    Ok(()) => log::debug!("op=notify callback={}", callback),
                    Err(e) => log::warn!("op=notify callback={} error={}", callback, e),
                }
            }
        });

        Self {
            sender: Mutex::new(Some(sender)),
            worker: Mutex::new(Some(worker)),
        }
    }

    /// Notifier that accepts nothing, for runs with notifications disabled
    pub fn disabled() -> Self {
        Self {
            sender: Mutex::new(None),
            worker: Mutex::new(None),
        }
    }

    /// Queue a callback URL
    ///
    /// # Returns
    /// `true` when the callback was queued, `false` when disabled or closed
    pub fn publish(&self, callback: String) -> bool {
        let sender = self.sender.lock().unwrap_or_else(|e| e.into_inner());
        match sender.as_ref() {
            Some(sender) => sender.send(callback).is_ok(),
            None => {
                log::debug!("op=notify callback={} skipped, notifier closed", callback);
                false
            }
        }
    }

    /// Stop accepting callbacks, drain the queue and wait for the worker
    pub async fn close(&self) {
        self.sender.lock().unwrap_or_else(|e| e.into_inner()).take();
        let worker = self.worker.lock().unwrap_or_else(|e| e.into_inner()).take();
        if let Some(worker) = worker {
            if let Err(e) = worker.await {
                log::error!("op=notify worker failed: {}", e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::PublishError;
    use async_trait::async_trait;

    #[derive(Default)]
    struct RecordingPublisher {
        seen: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl ChangePublisher for RecordingPublisher {
        async fn publish(&self, callback: &str) -> Result<(), PublishError> {
            self.seen.lock().unwrap().push(callback.to_string());
            if callback.ends_with("/rejected") {
                return Err(PublishError::Rejected(500));
            }
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_close_drains_in_arrival_order() {
        let publisher = Arc::new(RecordingPublisher::default());
        let notifier = Notifier::start(publisher.clone());
        for serial in ["a", "rejected", "c"] {
            assert!(notifier.publish(format!("https://inventory/blades/{serial}")));
        }
        notifier.close().await;

        let seen = publisher.seen.lock().unwrap().clone();
        assert_eq!(
            seen,
            vec![
                "https://inventory/blades/a",
                "https://inventory/blades/rejected",
                "https://inventory/blades/c"
            ]
        );
        assert!(!notifier.publish("https://inventory/blades/late".into()));
    }

    #[tokio::test]
    async fn test_disabled_notifier_drops_everything() {
        let notifier = Notifier::disabled();
        assert!(!notifier.publish("https://inventory/chassis/x".into()));
        notifier.close().await;
    }
}
