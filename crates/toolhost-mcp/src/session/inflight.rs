//! Tracking of request ids currently being executed in a session.

use std::sync::Arc;
use std::time::Instant;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use crate::types::RequestId;

/// Concurrent set of in-flight request ids, each tagged with its receive time.
#[derive(Debug, Clone, Default)]
pub struct InFlightRequests {
    ids: Arc<DashMap<RequestId, Instant>>,
}

impl InFlightRequests {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim `id` for the lifetime of the returned guard.
    ///
    /// Returns `None` if another request with the same id is still running.
    pub fn try_acquire(&self, id: &RequestId) -> Option<InFlightGuard> {
        match self.ids.entry(id.clone()) {
            Entry::Occupied(_) => None,
            Entry::Vacant(slot) => {
                slot.insert(Instant::now());
                Some(InFlightGuard {
                    ids: Arc::clone(&self.ids),
                    id: id.clone(),
                })
            }
        }
    }

    pub fn contains(&self, id: &RequestId) -> bool {
        self.ids.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

/// Holds one id in the in-flight set; the id is released on drop.
#[derive(Debug)]
pub struct InFlightGuard {
    ids: Arc<DashMap<RequestId, Instant>>,
    id: RequestId,
}

impl InFlightGuard {
    pub fn id(&self) -> &RequestId {
        &self.id
    }

    pub fn elapsed_ms(&self) -> u128 {
        self.ids
            .get(&self.id)
            .map(|started| started.elapsed().as_millis())
            .unwrap_or_default()
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.ids.remove(&self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duplicate_id_refused_while_held() {
        let inflight = InFlightRequests::new();
        let id = RequestId::from("7");

        let guard = inflight.try_acquire(&id).unwrap();
        assert!(inflight.try_acquire(&id).is_none());
        assert!(inflight.contains(&id));

        drop(guard);
        assert!(!inflight.contains(&id));
        assert!(inflight.try_acquire(&id).is_some());
    }

    #[test]
    fn test_string_and_number_ids_are_distinct() {
        let inflight = InFlightRequests::new();
        let _a = inflight.try_acquire(&RequestId::from("1")).unwrap();
        let _b = inflight.try_acquire(&RequestId::Number(1)).unwrap();
        assert_eq!(inflight.len(), 2);
    }

    #[tokio::test]
    async fn test_guard_released_when_task_aborted() {
        let inflight = InFlightRequests::new();
        let guard = inflight.try_acquire(&RequestId::Number(9)).unwrap();

        let task = tokio::spawn(async move {
            let _guard = guard;
            std::future::pending::<()>().await;
        });
        tokio::task::yield_now().await;
        task.abort();
        let _ = task.await;

        assert!(inflight.is_empty());
    }
}
