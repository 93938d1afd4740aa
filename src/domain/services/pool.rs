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

use futures_util::FutureExt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};

/// Process items over a fixed number of workers fed by a bounded FIFO queue
///
/// The queue is closed once every item is enqueued; workers exit when it
/// drains. A panicking handler is logged and the worker moves on to the next
/// item, so one bad host never stops the pool.
///
/// # Arguments
/// * `width` - Number of workers, at least one is started
/// * `items` - Work items in dispatch order
/// * `handler` - Async handler run once per item
///
/// # Returns
/// Outputs of every handler that completed, in completion order
pub async fn run_pool<T, R, F, Fut>(width: usize, items: Vec<T>, handler: F) -> Vec<R>
where
    T: Send + 'static,
    R: Send + 'static,
    F: Fn(T) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
{
    let width = width.max(1);
    let (sender, receiver) = mpsc::channel::<T>(width);
    let receiver = Arc::new(Mutex::new(receiver));
    let handler = Arc::new(handler);

    let workers: Vec<_> = (0..width)
        .map(|worker| {
            let receiver = Arc::clone(&receiver);
            let handler = Arc::clone(&handler);
            tokio::spawn(async move {
                let mut outputs = Vec::new();
                loop {
                    let item = receiver.lock().await.recv().await;
                    let Some(item) = item else { break };
                    match AssertUnwindSafe(handler(item)).catch_unwind().await {
                        Ok(output) => outputs.push(output),
                        Err(panic) => {
                            log::error!("op=pool worker={} panic={}", worker, panic_message(&*panic))
                        }
                    }
                }
                outputs
            })
        })
        .collect();

    for item in items {
        if sender.send(item).await.is_err() {
            log::error!("op=pool every worker exited before the queue drained");
            break;
        }
    }
    drop(sender);

    let mut outputs = Vec::new();
    for worker in workers {
        match worker.await {
            Ok(mut done) => outputs.append(&mut done),
            Err(e) => log::error!("op=pool worker join failed: {}", e),
        }
    }
    outputs
}

/// Best-effort text of a panic payload
pub fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
