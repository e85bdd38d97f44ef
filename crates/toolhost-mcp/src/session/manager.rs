//! Per-connection session: lifecycle state, in-flight ids and the shared registry.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{watch, Mutex};
use uuid::Uuid;

use toolhost::CapabilityRegistry;

use crate::protocol::negotiation::NegotiatedCapabilities;

use super::inflight::InFlightRequests;
use super::state::SessionState;

pub const DEFAULT_TOOL_TIMEOUT: Duration = Duration::from_secs(30);

/// State bound to one transport connection.
///
/// The registry is shared across sessions and only read once the first
/// session becomes ready.
#[derive(Debug)]
pub struct Session {
    id: Uuid,
    registry: Arc<CapabilityRegistry>,
    state: watch::Sender<SessionState>,
    inflight: InFlightRequests,
    negotiated: Mutex<Option<NegotiatedCapabilities>>,
    tool_timeout: Duration,
}

impl Session {
    pub fn new(registry: Arc<CapabilityRegistry>, tool_timeout: Duration) -> Self {
        let (state, _) = watch::channel(SessionState::Uninitialized);
        let id = Uuid::new_v4();
        tracing::debug!("Session {id} created ({} capabilities)", registry.len());
        Self {
            id,
            registry,
            state,
            inflight: InFlightRequests::new(),
            negotiated: Mutex::new(None),
            tool_timeout,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn registry(&self) -> &CapabilityRegistry {
        &self.registry
    }

    pub fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    /// Watch lifecycle changes, e.g. to stop a transport loop once shutdown begins.
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    pub fn inflight(&self) -> &InFlightRequests {
        &self.inflight
    }

    pub fn tool_timeout(&self) -> Duration {
        self.tool_timeout
    }

    /// Move to `next` if that is a forward transition. Returns whether the state changed.
    pub fn advance(&self, next: SessionState) -> bool {
        let mut previous = None;
        let changed = self.state.send_if_modified(|current| {
            if current.can_advance_to(next) {
                previous = Some(*current);
                *current = next;
                true
            } else {
                false
            }
        });

        match previous {
            Some(from) => tracing::info!("Session {} state {from} -> {next}", self.id),
            None => tracing::warn!(
                "Session {} refused transition {} -> {next}",
                self.id,
                self.state()
            ),
        }
        changed
    }

    /// Complete the handshake: record what was negotiated, seal the registry, become Ready.
    ///
    /// Fails (returns `false`) unless the session is still uninitialized.
    pub async fn mark_ready(&self, negotiated: NegotiatedCapabilities) -> bool {
        let mut slot = self.negotiated.lock().await;
        if self.state() != SessionState::Uninitialized {
            return false;
        }
        self.registry.seal();
        if !self.advance(SessionState::Ready) {
            return false;
        }
        *slot = Some(negotiated);
        true
    }

    pub async fn negotiated(&self) -> Option<NegotiatedCapabilities> {
        self.negotiated.lock().await.clone()
    }

    pub fn begin_shutdown(&self) -> bool {
        self.advance(SessionState::ShuttingDown)
    }

    pub fn close(&self) -> bool {
        self.advance(SessionState::Closed)
    }

    /// Close a shutting-down session once its last in-flight request has finished.
    pub fn close_if_drained(&self) -> bool {
        self.state() == SessionState::ShuttingDown && self.inflight.is_empty() && self.close()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ClientCapabilities, Implementation, RequestId};

    fn negotiated() -> NegotiatedCapabilities {
        NegotiatedCapabilities {
            protocol_version: "2025-06-18".to_string(),
            client_info: Implementation {
                name: "test".to_string(),
                version: "0.0.1".to_string(),
            },
            client: ClientCapabilities::default(),
        }
    }

    #[tokio::test]
    async fn test_ready_seals_registry() {
        let session = Session::new(Arc::new(CapabilityRegistry::new()), DEFAULT_TOOL_TIMEOUT);
        assert_eq!(session.state(), SessionState::Uninitialized);
        assert!(!session.registry().is_sealed());

        assert!(session.mark_ready(negotiated()).await);
        assert_eq!(session.state(), SessionState::Ready);
        assert!(session.registry().is_sealed());
        assert_eq!(
            session.negotiated().await.unwrap().protocol_version,
            "2025-06-18"
        );

        assert!(!session.mark_ready(negotiated()).await);
    }

    #[tokio::test]
    async fn test_backward_transition_refused() {
        let session = Session::new(Arc::new(CapabilityRegistry::new()), DEFAULT_TOOL_TIMEOUT);
        assert!(session.begin_shutdown());
        assert!(!session.advance(SessionState::Ready));
        assert!(!session.mark_ready(negotiated()).await);
        assert!(session.close());
        assert!(!session.close());
        assert_eq!(session.state(), SessionState::Closed);
    }

    #[tokio::test]
    async fn test_close_waits_for_in_flight() {
        let session = Session::new(Arc::new(CapabilityRegistry::new()), DEFAULT_TOOL_TIMEOUT);
        let guard = session.inflight().try_acquire(&RequestId::Number(7)).unwrap();
        assert!(!session.close_if_drained());

        session.begin_shutdown();
        assert!(!session.close_if_drained());
        assert_eq!(session.state(), SessionState::ShuttingDown);

        drop(guard);
        assert!(session.close_if_drained());
        assert_eq!(session.state(), SessionState::Closed);
    }

    #[tokio::test]
    async fn test_subscribers_see_transitions() {
        let session = Session::new(Arc::new(CapabilityRegistry::new()), DEFAULT_TOOL_TIMEOUT);
        let mut rx = session.subscribe();
        session.begin_shutdown();
        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow(), SessionState::ShuttingDown);
    }
}
