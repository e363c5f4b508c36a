//! Admin sessions.
//!
//! A session starts when the admin presents the configured password and ends
//! on logout or once its TTL lapses. Tokens are opaque random UUIDs handed
//! back to the client as bearer tokens.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use subtle::ConstantTimeEq;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize)]
pub struct AdminSession {
    pub token: String,
    pub started_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl AdminSession {
    fn is_live(&self, now: DateTime<Utc>) -> bool { now < self.expires_at }
}

#[derive(Clone)]
pub struct AdminSessions {
    password: Arc<str>,
    ttl: chrono::Duration,
    sessions: Arc<RwLock<HashMap<String, AdminSession>>>,
}

impl AdminSessions {
    pub fn new(password: impl Into<String>, ttl: Duration) -> Self {
        let ttl = chrono::Duration::from_std(ttl).unwrap_or_else(|_| chrono::Duration::days(36_500));
        let password: String = password.into();
        Self { password: Arc::from(password), ttl, sessions: Arc::default() }
    }

    fn password_matches(&self, candidate: &str) -> bool {
        bool::from(self.password.as_bytes().ct_eq(candidate.as_bytes()))
    }

    /// Starts a session if `password` is correct.
    pub async fn login(&self, password: &str) -> Option<AdminSession> {
        if !self.password_matches(password) {
            tracing::warn!("admin login rejected");
            return None;
        }
        let now = Utc::now();
        let session = AdminSession {
            token: Uuid::new_v4().simple().to_string(),
            started_at: now,
            expires_at: now.checked_add_signed(self.ttl).unwrap_or(DateTime::<Utc>::MAX_UTC),
        };
        let mut sessions = self.sessions.write().await;
        sessions.retain(|_, s| s.is_live(now));
        sessions.insert(session.token.clone(), session.clone());
        tracing::info!(active = sessions.len(), "admin session started");
        Some(session)
    }

    /// Returns the live session for `token`, dropping it if it has expired.
    pub async fn authorize(&self, token: &str) -> Option<AdminSession> {
        let now = Utc::now();
        {
            let sessions = self.sessions.read().await;
            match sessions.get(token) {
                Some(s) if s.is_live(now) => return Some(s.clone()),
                None => return None,
                Some(_) => {}
            }
        }
        self.sessions.write().await.remove(token);
        tracing::debug!("admin session expired");
        None
    }

    /// Ends the session. Returns whether one was active.
    pub async fn logout(&self, token: &str) -> bool {
        let ended = self.sessions.write().await.remove(token).is_some();
        if ended {
            tracing::info!("admin session ended");
        }
        ended
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn login_requires_correct_password() {
        let sessions = AdminSessions::new("hunter2", Duration::from_secs(60));
        assert!(sessions.login("hunter").await.is_none());
        assert!(sessions.login("hunter22").await.is_none());
        assert!(sessions.login("").await.is_none());
        assert!(sessions.login("hunter2").await.is_some());
    }

    #[tokio::test]
    async fn session_lifecycle() {
        let sessions = AdminSessions::new("pw", Duration::from_secs(60));
        let session = sessions.login("pw").await.unwrap();
        assert!(session.expires_at > session.started_at);
        assert!(sessions.authorize(&session.token).await.is_some());
        assert!(sessions.logout(&session.token).await);
        assert!(sessions.authorize(&session.token).await.is_none());
        assert!(!sessions.logout(&session.token).await);
    }

    #[tokio::test]
    async fn expired_sessions_are_rejected() {
        let sessions = AdminSessions::new("pw", Duration::ZERO);
        let session = sessions.login("pw").await.unwrap();
        assert!(sessions.authorize(&session.token).await.is_none());
    }

    #[tokio::test]
    async fn unknown_token_is_rejected() {
        let sessions = AdminSessions::new("pw", Duration::from_secs(60));
        assert!(sessions.authorize("nope").await.is_none());
    }
}
