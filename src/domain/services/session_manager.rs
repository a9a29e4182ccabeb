#[cfg(test)]
#[path = "session_manager_test.rs"]
mod tests;

use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;

use futures::future::BoxFuture;
use futures::future::Shared;
use futures::FutureExt;
use tokio::sync::Mutex;

use crate::domain::models::BackendBox;
use crate::domain::models::Role;
use crate::domain::models::SessionError;
use crate::domain::models::SessionHandle;

type Creation = Shared<BoxFuture<'static, Result<SessionHandle, SessionError>>>;

#[derive(Clone, Copy, Debug, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum Lifecycle {
    Absent,
    Creating,
    Ready,
    Failed,
}

enum SessionState {
    Absent,
    Creating {
        id: u64,
        role: Role,
        creation: Creation,
    },
    Ready { session: SessionHandle, role: Role },
    Failed(SessionError),
}

/// Owns the one language model session of the process. The session is
/// created on first use and every caller gets the same handle afterwards.
pub struct SessionManager {
    backend: BackendBox,
    state: Mutex<SessionState>,
    creations: AtomicU64,
}

impl SessionManager {
    pub fn new(backend: BackendBox) -> SessionManager {
        return SessionManager {
            backend,
            state: Mutex::new(SessionState::Absent),
            creations: AtomicU64::new(0),
        };
    }

    pub async fn state(&self) -> Lifecycle {
        match &*self.state.lock().await {
            SessionState::Absent => return Lifecycle::Absent,
            SessionState::Creating { .. } => return Lifecycle::Creating,
            SessionState::Ready { .. } => return Lifecycle::Ready,
            SessionState::Failed(_) => return Lifecycle::Failed,
        }
    }

    /// The ready session and the role it was created for, if any.
    pub async fn current(&self) -> Option<(SessionHandle, Role)> {
        if let SessionState::Ready { session, role } = &*self.state.lock().await {
            return Some((session.clone(), *role));
        }

        return None;
    }

    /// Returns the existing session, or creates one configured for `role`.
    /// Concurrent callers while a creation is in flight all wait on that same
    /// creation. A failed creation is not retried here, calling again starts a
    /// new attempt.
    pub async fn ensure_session(&self, role: &str) -> Result<SessionHandle, SessionError> {
        let role = Role::parse(role)?;

        let (id, creator_role, creation) = {
            let mut state = self.state.lock().await;
            match &*state {
                SessionState::Ready { session, role: current } => {
                    if *current != role {
                        tracing::debug!(
                            requested = %role,
                            current = %current,
                            "Session exists for another role, reusing it"
                        );
                    }
                    return Ok(session.clone());
                }
                SessionState::Creating { id, role, creation } => (*id, *role, creation.clone()),
                SessionState::Absent | SessionState::Failed(_) => {
                    let id = self.creations.fetch_add(1, Ordering::SeqCst) + 1;
                    let backend = self.backend.clone();
                    let creation = async move {
                        tracing::info!(%role, backend = %backend.name(), "Creating language model session");
                        return backend
                            .create_session(role.system_prompt())
                            .await
                            .map_err(|err| {
                                return SessionError::Creation {
                                    reason: err.to_string(),
                                };
                            });
                    }
                    .boxed()
                    .shared();

                    *state = SessionState::Creating {
                        id,
                        role,
                        creation: creation.clone(),
                    };
                    (id, role, creation)
                }
            }
        };

        let res = creation.await;

        let mut state = self.state.lock().await;
        if let SessionState::Creating { id: current, .. } = &*state {
            if *current == id {
                match &res {
                    Ok(session) => {
                        *state = SessionState::Ready {
                            session: session.clone(),
                            role: creator_role,
                        };
                    }
                    Err(err) => {
                        tracing::error!(error = %err, "Language model session creation failed");
                        *state = SessionState::Failed(err.clone());
                    }
                }
            }
        }

        return res;
    }
}
