//! Server-side sessions: opaque cookie token mapped to a user id.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use rand::{distributions::Alphanumeric, rngs::OsRng, Rng};
use tracing::debug;
use uuid::Uuid;

use crate::database::Database;
use crate::error::StoreError;

pub const SESSION_COOKIE: &str = "vt_session";

const TOKEN_LEN: usize = 48;

#[derive(Debug, Clone)]
pub struct Session {
    pub token: String,
    pub user_id: Uuid,
    pub expires_at: DateTime<Utc>,
}

impl Session {
    fn issue(user_id: Uuid, ttl: Duration) -> Self {
        let token = OsRng
            .sample_iter(&Alphanumeric)
            .take(TOKEN_LEN)
            .map(char::from)
            .collect();
        let ttl = chrono::Duration::from_std(ttl).unwrap_or_else(|_| chrono::Duration::days(1));
        Self {
            token,
            user_id,
            expires_at: Utc::now() + ttl,
        }
    }

    fn is_live(&self, now: DateTime<Utc>) -> bool {
        self.expires_at > now
    }
}

#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Issues a fresh token bound to `user_id`.
    async fn create(&self, user_id: Uuid, ttl: Duration) -> Result<Session, StoreError>;
    /// The user bound to `token`, if the session exists and has not expired.
    async fn lookup(&self, token: &str) -> Result<Option<Uuid>, StoreError>;
    /// Removing an unknown token is not an error.
    async fn destroy(&self, token: &str) -> Result<(), StoreError>;
}

/// Process-local store. Sessions do not survive a restart.
#[derive(Default)]
pub struct MemorySessionStore {
    sessions: DashMap<String, Session>,
}

impl MemorySessionStore {
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn create(&self, user_id: Uuid, ttl: Duration) -> Result<Session, StoreError> {
        let now = Utc::now();
        self.sessions.retain(|_, session| session.is_live(now));

        let session = Session::issue(user_id, ttl);
        self.sessions.insert(session.token.clone(), session.clone());
        Ok(session)
    }

    async fn lookup(&self, token: &str) -> Result<Option<Uuid>, StoreError> {
        let now = Utc::now();
        let expired = match self.sessions.get(token) {
            Some(session) if session.is_live(now) => return Ok(Some(session.user_id)),
            Some(_) => true,
            None => false,
        };
        if expired {
            debug!("dropping expired session");
            self.sessions.remove_if(token, |_, session| !session.is_live(now));
        }
        Ok(None)
    }

    async fn destroy(&self, token: &str) -> Result<(), StoreError> {
        self.sessions.remove(token);
        Ok(())
    }
}

/// Sessions kept in the `sessions` table, shared by every server process.
#[derive(Clone)]
pub struct PgSessionStore {
    db: Database,
}

impl PgSessionStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

#[async_trait]
impl SessionStore for PgSessionStore {
    async fn create(&self, user_id: Uuid, ttl: Duration) -> Result<Session, StoreError> {
        sqlx::query("DELETE FROM sessions WHERE expires_at <= NOW()")
            .execute(&self.db)
            .await?;

        let session = Session::issue(user_id, ttl);
        sqlx::query("INSERT INTO sessions (token, user_id, expires_at) VALUES ($1, $2, $3)")
            .bind(&session.token)
            .bind(session.user_id)
            .bind(session.expires_at)
            .execute(&self.db)
            .await
            .map_err(StoreError::from_sqlx)?;
        Ok(session)
    }

    async fn lookup(&self, token: &str) -> Result<Option<Uuid>, StoreError> {
        let user_id = sqlx::query_scalar::<_, Uuid>(
            "SELECT user_id FROM sessions WHERE token = $1 AND expires_at > NOW()",
        )
        .bind(token)
        .fetch_optional(&self.db)
        .await?;
        Ok(user_id)
    }

    async fn destroy(&self, token: &str) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM sessions WHERE token = $1")
            .bind(token)
            .execute(&self.db)
            .await?;
        Ok(())
    }
}
