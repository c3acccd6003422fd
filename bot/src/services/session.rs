//! Per-user session state, owned by one component instead of loose globals:
//! the live-stream task handle and the cached VIP signal list used for
//! pagination.

use std::collections::HashMap;

use shared::entity::signals;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

#[derive(Default)]
pub struct SessionStore {
    streams: Mutex<HashMap<i64, JoinHandle<()>>>,
    signal_pages: Mutex<HashMap<i64, Vec<signals::Model>>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a stream task for the user, returning any task it replaced.
    pub async fn put_stream(&self, user_id: i64, handle: JoinHandle<()>) -> Option<JoinHandle<()>> {
        self.streams.lock().await.insert(user_id, handle)
    }

    /// Removes and returns the user's stream task, if any.
    pub async fn take_stream(&self, user_id: i64) -> Option<JoinHandle<()>> {
        self.streams.lock().await.remove(&user_id)
    }

    /// Frees the slot without touching the task. Called by the stream task
    /// itself on its way out, whatever the exit path was.
    pub async fn clear_stream(&self, user_id: i64) {
        self.streams.lock().await.remove(&user_id);
    }

    pub async fn has_stream(&self, user_id: i64) -> bool {
        self.streams.lock().await.contains_key(&user_id)
    }

    pub async fn set_signal_page(&self, user_id: i64, signals: Vec<signals::Model>) {
        self.signal_pages.lock().await.insert(user_id, signals);
    }

    pub async fn signal_page(&self, user_id: i64) -> Option<Vec<signals::Model>> {
        self.signal_pages.lock().await.get(&user_id).cloned()
    }

    pub async fn clear_signal_page(&self, user_id: i64) {
        self.signal_pages.lock().await.remove(&user_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_signal(id: i64) -> signals::Model {
        signals::Model {
            id,
            pair: "bitcoin".to_string(),
            direction: "long".to_string(),
            entry_price: 100.0,
            target_price: 110.0,
            stop_loss: 90.0,
            is_vip: true,
            hit_target: 0,
            created_at: None,
        }
    }

    #[tokio::test]
    async fn stream_slot_is_per_user() {
        let store = SessionStore::new();
        assert!(!store.has_stream(7).await);

        let handle = tokio::spawn(async {});
        assert!(store.put_stream(7, handle).await.is_none());
        assert!(store.has_stream(7).await);
        assert!(!store.has_stream(8).await);

        assert!(store.take_stream(7).await.is_some());
        assert!(!store.has_stream(7).await);
        assert!(store.take_stream(7).await.is_none());
    }

    #[tokio::test]
    async fn putting_a_stream_returns_the_replaced_task() {
        let store = SessionStore::new();
        assert!(store.put_stream(1, tokio::spawn(async {})).await.is_none());
        let old = store.put_stream(1, tokio::spawn(async {})).await;
        assert!(old.is_some());
    }

    #[tokio::test]
    async fn signal_pages_round_trip() {
        let store = SessionStore::new();
        assert!(store.signal_page(5).await.is_none());

        store
            .set_signal_page(5, vec![sample_signal(1), sample_signal(2)])
            .await;
        let cached = store.signal_page(5).await.unwrap();
        assert_eq!(cached.len(), 2);

        store.clear_signal_page(5).await;
        assert!(store.signal_page(5).await.is_none());
    }
}
