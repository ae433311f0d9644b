use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

use super::TemplateEditor;

pub type SharedEditor = Arc<Mutex<TemplateEditor>>;

/// Sessions untouched for this long are dropped by [`sweep_idle`].
pub const SESSION_IDLE_TIMEOUT: Duration = Duration::from_secs(30 * 60);

const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

struct Session {
    editor: SharedEditor,
    last_accessed: Instant,
}

/// Open editor sessions, one editor each.
#[derive(Default)]
pub struct EditorSessions {
    sessions: RwLock<HashMap<Uuid, Session>>,
}

impl EditorSessions {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn open(&self, editor: TemplateEditor) -> (Uuid, SharedEditor) {
        let id = Uuid::new_v4();
        let shared = Arc::new(Mutex::new(editor));
        self.sessions.write().await.insert(
            id,
            Session {
                editor: shared.clone(),
                last_accessed: Instant::now(),
            },
        );
        tracing::debug!(session = %id, "Editor session opened");
        (id, shared)
    }

    /// Look up a session and mark it as used.
    pub async fn get(&self, id: Uuid) -> Option<SharedEditor> {
        let mut sessions = self.sessions.write().await;
        let session = sessions.get_mut(&id)?;
        session.last_accessed = Instant::now();
        Some(session.editor.clone())
    }

    pub async fn close(&self, id: Uuid) -> bool {
        let removed = self.sessions.write().await.remove(&id).is_some();
        if removed {
            tracing::debug!(session = %id, "Editor session closed");
        }
        removed
    }

    /// Drop sessions idle for at least `max_idle`. Returns how many went.
    ///
    /// A request already holding the editor keeps it alive until it returns.
    pub async fn expire_idle(&self, max_idle: Duration) -> usize {
        let now = Instant::now();
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, s| now.duration_since(s.last_accessed) < max_idle);
        before - sessions.len()
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}

/// Background task dropping abandoned editor sessions.
pub async fn sweep_idle(sessions: Arc<EditorSessions>) {
    let mut interval = tokio::time::interval(SWEEP_INTERVAL);
    loop {
        interval.tick().await;
        let expired = sessions.expire_idle(SESSION_IDLE_TIMEOUT).await;
        if expired > 0 {
            let remaining = sessions.len().await;
            tracing::info!(
                expired,
                remaining,
                "Expired idle editor sessions"
            );
        }
    }
}
