//! Channel through which plugins push asynchronous events to clients.

use rtcgate_protocol::{GatewayMessage, PluginData};
use serde_json::Value;
use tracing::debug;

use super::HandleRef;
use crate::error::GatewayError;
use crate::session::{Event, SessionRegistry};

/// Handed to every plugin at init. Cheap to clone and safe to use from any
/// thread or task.
#[derive(Clone)]
pub struct EventSink {
    sessions: SessionRegistry,
}

impl EventSink {
    pub fn new(sessions: SessionRegistry) -> Self {
        Self { sessions }
    }

    /// Queue an event for the session owning `handle`.
    ///
    /// Fails if the session is gone or the handle has been detached.
    pub fn push_event(
        &self,
        handle: HandleRef,
        transaction: Option<String>,
        data: Value,
        jsep: Option<Value>,
    ) -> Result<(), GatewayError> {
        let session = self
            .sessions
            .find_any(handle.session_id)
            .ok_or(GatewayError::SessionNotFound(handle.session_id))?;
        let plugin = session.handle(handle.handle_id)?.package().to_string();

        let message = GatewayMessage::Event {
            session_id: handle.session_id,
            sender: handle.handle_id,
            transaction,
            plugindata: PluginData { plugin, data },
            jsep,
        };
        let payload =
            serde_json::to_string(&message).map_err(|e| GatewayError::Internal(e.to_string()))?;
        session.push_event(Event::new(200, payload));
        debug!(
            session_id = handle.session_id,
            handle_id = handle.handle_id,
            queued = session.events().len(),
            "Plugin event queued"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use serde_json::json;
    use tokio_util::sync::CancellationToken;

    use super::*;
    use crate::plugin::testing::RecordingPlugin;
    use crate::plugin::{Plugin, PluginRegistry};
    use crate::session::PollOutcome;

    #[tokio::test]
    async fn pushes_event_envelope() {
        let sessions = SessionRegistry::new();
        let plugins = PluginRegistry::from_plugins(vec![
            Arc::new(RecordingPlugin::new("demo")) as Arc<dyn Plugin>
        ])
        .unwrap();
        let session = sessions.create();
        let handle_id = session.attach(&plugins, "demo").await.unwrap();

        let sink = EventSink::new(sessions.clone());
        sink.push_event(
            HandleRef::new(session.id(), handle_id),
            Some("t9".into()),
            json!({"status": "ok"}),
            None,
        )
        .unwrap();

        let guard = session.events().register_poller().unwrap();
        let PollOutcome::Event(event) = guard
            .pop_or_wait(Duration::from_secs(1), &CancellationToken::new())
            .await
        else {
            panic!("expected event");
        };
        assert_eq!(event.status, 200);
        assert!(event.is_allocated());
        let value: Value = serde_json::from_str(&event.payload).unwrap();
        assert_eq!(value["janus"], "event");
        assert_eq!(value["session_id"], session.id());
        assert_eq!(value["sender"], handle_id);
        assert_eq!(value["transaction"], "t9");
        assert_eq!(value["plugindata"]["plugin"], "demo");
        assert_eq!(value["plugindata"]["data"]["status"], "ok");
    }

    #[tokio::test]
    async fn rejects_unknown_session_and_handle() {
        let sessions = SessionRegistry::new();
        let sink = EventSink::new(sessions.clone());
        let err = sink
            .push_event(HandleRef::new(1, 2), None, json!({}), None)
            .unwrap_err();
        assert!(matches!(err, GatewayError::SessionNotFound(1)));

        let session = sessions.create();
        let err = sink
            .push_event(HandleRef::new(session.id(), 2), None, json!({}), None)
            .unwrap_err();
        assert!(matches!(err, GatewayError::HandleNotFound { handle_id: 2, .. }));
        assert!(session.events().is_empty());
    }
}
