//! Test double that records every call it receives.

use std::sync::{Arc, Mutex};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use rtcgate_protocol::PluginDescriptor;
use serde_json::json;
use tokio::sync::Notify;

use super::{EventSink, HandleRef, Plugin, PluginError, PluginMessage, PluginResult};

pub(crate) struct RecordingPlugin {
    package: String,
    refuse_attach: bool,
    fail_init: bool,
    fail_release: bool,
    attach_gate: Option<Arc<Notify>>,
    teardown_delay: Duration,
    sink: Mutex<Option<EventSink>>,
    initialized: AtomicBool,
    closed: AtomicBool,
    created: Mutex<Vec<HandleRef>>,
    destroyed: Mutex<Vec<HandleRef>>,
}

impl RecordingPlugin {
    pub(crate) fn new(package: &str) -> Self {
        Self {
            package: package.to_string(),
            refuse_attach: false,
            fail_init: false,
            fail_release: false,
            attach_gate: None,
            teardown_delay: Duration::ZERO,
            sink: Mutex::new(None),
            initialized: AtomicBool::new(false),
            closed: AtomicBool::new(false),
            created: Mutex::new(Vec::new()),
            destroyed: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn refusing_attach(mut self) -> Self {
        self.refuse_attach = true;
        self
    }

    pub(crate) fn failing_init(mut self) -> Self {
        self.fail_init = true;
        self
    }

    pub(crate) fn failing_release(mut self) -> Self {
        self.fail_release = true;
        self
    }

    /// Hold every `create_handle` call until `gate` is notified.
    pub(crate) fn with_attach_gate(mut self, gate: Arc<Notify>) -> Self {
        self.attach_gate = Some(gate);
        self
    }

    pub(crate) fn with_teardown_delay(mut self, delay: Duration) -> Self {
        self.teardown_delay = delay;
        self
    }

    pub(crate) fn initialized(&self) -> bool {
        self.initialized.load(Ordering::SeqCst)
    }

    pub(crate) fn closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub(crate) fn created(&self) -> Vec<HandleRef> {
        self.created.lock().unwrap().clone()
    }

    pub(crate) fn destroyed(&self) -> Vec<HandleRef> {
        self.destroyed.lock().unwrap().clone()
    }

    /// Wait until `count` handles have reached `create_handle`.
    pub(crate) async fn wait_created(&self, count: usize) {
        tokio::time::timeout(Duration::from_secs(2), async {
            while self.created.lock().unwrap().len() < count {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("attach never reached the plugin");
    }

    /// Wait until `count` handles have been released (detach runs on a
    /// spawned task).
    pub(crate) async fn wait_destroyed(&self, count: usize) {
        tokio::time::timeout(Duration::from_secs(2), async {
            while self.destroyed.lock().unwrap().len() < count {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("handles were not released in time");
    }
}

#[async_trait]
impl Plugin for RecordingPlugin {
    fn package(&self) -> &str {
        &self.package
    }

    fn descriptor(&self) -> PluginDescriptor {
        PluginDescriptor {
            name: format!("Recording {}", self.package),
            version: "1.0.0".to_string(),
            description: "Records calls for tests".to_string(),
        }
    }

    async fn init(&self, sink: EventSink) -> Result<(), PluginError> {
        if self.fail_init {
            return Err(PluginError::Init {
                package: self.package.clone(),
                reason: "configured to fail".to_string(),
            });
        }
        *self.sink.lock().unwrap() = Some(sink);
        self.initialized.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn create_handle(&self, handle: HandleRef) -> Result<(), PluginError> {
        if self.refuse_attach {
            return Err(PluginError::Rejected("attach refused".to_string()));
        }
        self.created.lock().unwrap().push(handle);
        if let Some(gate) = &self.attach_gate {
            gate.notified().await;
        }
        Ok(())
    }

    async fn handle_message(
        &self,
        handle: HandleRef,
        message: PluginMessage,
    ) -> Result<PluginResult, PluginError> {
        if let Some(reason) = message.body.get("reject").and_then(|r| r.as_str()) {
            return Err(PluginError::Rejected(reason.to_string()));
        }
        if message.body.get("async").is_some() {
            let sink = self.sink.lock().unwrap().clone();
            if let Some(sink) = sink {
                sink.push_event(handle, message.transaction, message.body, message.jsep)
                    .map_err(|e| PluginError::Rejected(e.to_string()))?;
            }
            return Ok(PluginResult::OkWait(Some("queued".to_string())));
        }
        Ok(PluginResult::Ok(json!({ "echo": message.body })))
    }

    async fn destroy_handle(&self, handle: HandleRef) -> Result<(), PluginError> {
        self.destroyed.lock().unwrap().push(handle);
        if self.fail_release {
            return Err(PluginError::Rejected("release failed".to_string()));
        }
        Ok(())
    }

    async fn destroy(&self) {
        tokio::time::sleep(self.teardown_delay).await;
        self.closed.store(true, Ordering::SeqCst);
    }
}
