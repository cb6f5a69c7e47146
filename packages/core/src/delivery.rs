//! Delivery of aggregated batches to the downstream sink.
//!
//! The scheduler hands every merge pass to a task's [`DeliveryCallback`].
//! A callback error is logged by the scheduler and swallowed; it never
//! affects scheduling or provider health.

use std::future::Future;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;
use tokio::sync::mpsc;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Delivery failed: {message}")]
pub struct DeliveryError {
    pub message: String,
}

impl DeliveryError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[async_trait]
pub trait DeliveryCallback<T: Send + 'static>: Send + Sync {
    async fn deliver(&self, task_id: &str, batch: Vec<T>) -> Result<(), DeliveryError>;
}

/// Logs a one-line summary per batch and the full batch at `debug`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingSink;

#[async_trait]
impl<T> DeliveryCallback<T> for LoggingSink
where
    T: Serialize + Send + Sync + 'static,
{
    async fn deliver(&self, task_id: &str, batch: Vec<T>) -> Result<(), DeliveryError> {
        tracing::info!(task_id = %task_id, items = batch.len(), "Aggregated batch ready");

        if tracing::enabled!(tracing::Level::DEBUG) {
            let body = serde_json::to_string(&batch)
                .map_err(|e| DeliveryError::new(format!("Failed to serialise batch: {}", e)))?;
            tracing::debug!(task_id = %task_id, "{}", body);
        }
        Ok(())
    }
}

/// Forwards `(task_id, batch)` into a bounded channel.
pub struct ChannelSink<T> {
    tx: mpsc::Sender<(String, Vec<T>)>,
}

impl<T> ChannelSink<T> {
    pub fn new(tx: mpsc::Sender<(String, Vec<T>)>) -> Self {
        Self { tx }
    }

    /// Sink plus the receiving end of its channel.
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<(String, Vec<T>)>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { tx }, rx)
    }
}

#[async_trait]
impl<T: Send + 'static> DeliveryCallback<T> for ChannelSink<T> {
    async fn deliver(&self, task_id: &str, batch: Vec<T>) -> Result<(), DeliveryError> {
        self.tx
            .send((task_id.to_string(), batch))
            .await
            .map_err(|_| DeliveryError::new("Delivery channel closed"))
    }
}

/// Adapts an async closure into a callback.
pub struct FnSink<F>(F);

pub fn from_fn<F>(f: F) -> FnSink<F> {
    FnSink(f)
}

#[async_trait]
impl<T, F, Fut> DeliveryCallback<T> for FnSink<F>
where
    T: Send + 'static,
    F: Fn(String, Vec<T>) -> Fut + Send + Sync,
    Fut: Future<Output = Result<(), DeliveryError>> + Send,
{
    async fn deliver(&self, task_id: &str, batch: Vec<T>) -> Result<(), DeliveryError> {
        (self.0)(task_id.to_string(), batch).await
    }
}
