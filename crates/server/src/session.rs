//! In-process session store keyed by opaque tokens.

use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Duration, Utc};
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use crmlite_core::domain::user::{User, UserId};

#[derive(Clone, PartialEq, Eq, Hash)]
pub struct SessionToken(String);

impl SessionToken {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().simple().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for SessionToken {
    fn from(value: String) -> Self {
        Self(value)
    }
}

// Tokens are bearer credentials; keep them out of logs.
impl fmt::Debug for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SessionToken(..)")
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Session {
    pub user_id: UserId,
    pub username: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Session {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

pub struct SessionStore {
    ttl: Duration,
    sessions: RwLock<HashMap<SessionToken, Session>>,
}

impl SessionStore {
    pub fn new(ttl_secs: u64) -> Self {
        let ttl =
            i64::try_from(ttl_secs).ok().and_then(Duration::try_seconds).unwrap_or(Duration::MAX);
        Self { ttl, sessions: RwLock::new(HashMap::new()) }
    }

    pub async fn issue(&self, user: &User) -> SessionToken {
        self.issue_at(user, Utc::now()).await
    }

    /// Issuing also drops every session that has expired by `now`, so tokens
    /// that are never presented again do not accumulate.
    pub async fn issue_at(&self, user: &User, now: DateTime<Utc>) -> SessionToken {
        let token = SessionToken::generate();
        let session = Session {
            user_id: user.id,
            username: user.username.clone(),
            issued_at: now,
            expires_at: now.checked_add_signed(self.ttl).unwrap_or(DateTime::<Utc>::MAX_UTC),
        };

        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, existing| !existing.is_expired_at(now));
        let evicted = before - sessions.len();
        if evicted > 0 {
            debug!(event_name = "crm.session.evicted", evicted, "expired sessions dropped");
        }
        sessions.insert(token.clone(), session);
        token
    }

    pub async fn resolve(&self, token: &SessionToken) -> Option<Session> {
        self.resolve_at(token, Utc::now()).await
    }

    /// Expired sessions are evicted and reported as absent.
    pub async fn resolve_at(&self, token: &SessionToken, now: DateTime<Utc>) -> Option<Session> {
        let session = self.sessions.read().await.get(token).cloned()?;
        if session.is_expired_at(now) {
            self.sessions.write().await.remove(token);
            return None;
        }
        Some(session)
    }

    /// Returns whether a session was removed.
    pub async fn revoke(&self, token: &SessionToken) -> bool {
        self.sessions.write().await.remove(token).is_some()
    }

    pub async fn active_count(&self) -> usize {
        self.sessions.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};

    use crmlite_core::domain::user::{User, UserId};

    use super::{SessionStore, SessionToken};

    fn user() -> User {
        User {
            id: UserId(1),
            username: "admin".to_string(),
            password_hash: "unused".to_string(),
            is_active: true,
            created_at: Utc::now(),
            last_login_at: None,
        }
    }

    #[tokio::test]
    async fn issued_token_resolves_until_revoked() {
        let store = SessionStore::new(60);
        let token = store.issue(&user()).await;

        let session = store.resolve(&token).await.expect("session");
        assert_eq!(session.username, "admin");

        assert!(store.revoke(&token).await);
        assert!(store.resolve(&token).await.is_none());
        assert!(!store.revoke(&token).await);
    }

    #[tokio::test]
    async fn expired_session_is_evicted_on_lookup() {
        let store = SessionStore::new(60);
        let issued = Utc::now();
        let token = store.issue_at(&user(), issued).await;

        assert!(store.resolve_at(&token, issued + Duration::seconds(59)).await.is_some());
        assert!(store.resolve_at(&token, issued + Duration::seconds(60)).await.is_none());
        assert_eq!(store.active_count().await, 0);
    }

    #[tokio::test]
    async fn issuing_drops_sessions_that_were_never_presented_again() {
        let store = SessionStore::new(60);
        let start = Utc::now();
        for _ in 0..100 {
            store.issue_at(&user(), start).await;
        }
        let kept = store.issue_at(&user(), start + Duration::seconds(30)).await;

        let later = start + Duration::seconds(75);
        let fresh = store.issue_at(&user(), later).await;

        assert_eq!(store.active_count().await, 2);
        assert!(store.resolve_at(&kept, later).await.is_some());
        assert!(store.resolve_at(&fresh, later).await.is_some());
    }

    #[tokio::test]
    async fn unknown_token_does_not_resolve() {
        let store = SessionStore::new(60);
        store.issue(&user()).await;

        assert!(store.resolve(&SessionToken::from("forged".to_string())).await.is_none());
        assert_ne!(SessionToken::generate(), SessionToken::generate());
    }

    #[test]
    fn debug_output_hides_token_value() {
        let token = SessionToken::from("secret-value".to_string());
        assert!(!format!("{token:?}").contains("secret-value"));
    }
}
