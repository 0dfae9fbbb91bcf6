use std::sync::Arc;
use std::time::Duration;

use argon2::{
    password_hash::{PasswordHash, PasswordHasher as _, PasswordVerifier, SaltString},
    Algorithm, Argon2, Params, Version,
};
use chrono::Utc;
use rand::rngs::OsRng;
use tokio::sync::OnceCell;
use tracing::{debug, info, instrument};
use uuid::Uuid;

use crate::config::{ConfigError, HashConfig};
use crate::error::{AppError, StoreError};
use crate::models::auth::{CredentialsRequest, User};
use crate::repository::UserRepository;
use crate::session::{Session, SessionStore};

const INVALID_CREDENTIALS: &str = "invalid credentials";
const NOT_LOGGED_IN: &str = "not logged in";
const CREDENTIALS_REQUIRED: &str = "email and password required";

/// Argon2id hashing, run on the blocking pool.
#[derive(Clone)]
pub struct PasswordHasher {
    argon: Argon2<'static>,
    /// Verified against when the email is unknown so both login failures cost
    /// the same.
    dummy_hash: Arc<OnceCell<String>>,
}

impl PasswordHasher {
    pub fn new(config: HashConfig) -> Result<Self, ConfigError> {
        let params = Params::new(config.memory_kib, config.iterations, config.parallelism, None)
            .map_err(|err| ConfigError::PasswordHash(err.to_string()))?;
        Ok(Self {
            argon: Argon2::new(Algorithm::Argon2id, Version::V0x13, params),
            dummy_hash: Arc::new(OnceCell::new()),
        })
    }

    pub async fn hash(&self, password: String) -> Result<String, AppError> {
        let argon = self.argon.clone();
        tokio::task::spawn_blocking(move || {
            let salt = SaltString::generate(&mut OsRng);
            argon
                .hash_password(password.as_bytes(), &salt)
                .map(|hash| hash.to_string())
        })
        .await
        .map_err(AppError::internal)?
        .map_err(AppError::internal)
    }

    pub async fn verify(&self, password: String, hash: String) -> Result<bool, AppError> {
        let argon = self.argon.clone();
        tokio::task::spawn_blocking(move || {
            let parsed = PasswordHash::new(&hash)?;
            Ok::<_, argon2::password_hash::Error>(argon.verify_password(password.as_bytes(), &parsed).is_ok())
        })
        .await
        .map_err(AppError::internal)?
        .map_err(AppError::internal)
    }

    async fn burn_verify(&self, password: String) -> Result<(), AppError> {
        let dummy = self
            .dummy_hash
            .get_or_try_init(|| self.hash("vitaltrack-dummy-password".to_string()))
            .await?
            .clone();
        self.verify(password, dummy).await?;
        Ok(())
    }
}

/// Users, credentials and the sessions bound to them.
#[derive(Clone)]
pub struct IdentityService {
    users: Arc<dyn UserRepository>,
    sessions: Arc<dyn SessionStore>,
    hasher: PasswordHasher,
    session_ttl: Duration,
}

impl IdentityService {
    pub fn new(
        users: Arc<dyn UserRepository>,
        sessions: Arc<dyn SessionStore>,
        hasher: PasswordHasher,
        session_ttl: Duration,
    ) -> Self {
        Self { users, sessions, hasher, session_ttl }
    }

    /// Creates the user and logs them in. `previous` is the caller's current
    /// session token, which is dropped in favour of the new one.
    #[instrument(skip_all, fields(email = credentials.email.as_deref().unwrap_or_default()))]
    pub async fn register(
        &self,
        credentials: CredentialsRequest,
        previous: Option<&str>,
    ) -> Result<Session, AppError> {
        let (email, password) = credentials
            .into_parts()
            .ok_or_else(|| AppError::Validation(CREDENTIALS_REQUIRED.into()))?;
        let password_hash = self.hasher.hash(password).await?;
        let user = User {
            id: Uuid::new_v4(),
            email,
            password_hash,
            created_at: Utc::now(),
        };

        match self.users.insert(&user).await {
            Ok(()) => {}
            Err(StoreError::Duplicate) => return Err(AppError::Conflict("email already exists")),
            Err(err) => return Err(err.into()),
        }
        info!(user_id = %user.id, "user_registered");

        self.start_session(user.id, previous).await
    }

    #[instrument(skip_all, fields(email = credentials.email.as_deref().unwrap_or_default()))]
    pub async fn login(
        &self,
        credentials: CredentialsRequest,
        previous: Option<&str>,
    ) -> Result<Session, AppError> {
        let (email, password) = credentials
            .into_parts()
            .ok_or_else(|| AppError::Validation(CREDENTIALS_REQUIRED.into()))?;
        let Some(user) = self.users.find_by_email(&email).await? else {
            self.hasher.burn_verify(password).await?;
            debug!("login for unknown email");
            return Err(AppError::Auth(INVALID_CREDENTIALS));
        };

        if !self.hasher.verify(password, user.password_hash).await? {
            debug!(user_id = %user.id, "login with wrong password");
            return Err(AppError::Auth(INVALID_CREDENTIALS));
        }
        info!(user_id = %user.id, "user_logged_in");

        self.start_session(user.id, previous).await
    }

    pub async fn logout(&self, token: Option<&str>) -> Result<(), AppError> {
        if let Some(token) = token {
            self.sessions.destroy(token).await?;
        }
        Ok(())
    }

    pub async fn whoami(&self, token: Option<&str>) -> Result<Uuid, AppError> {
        let Some(token) = token else {
            return Err(AppError::Auth(NOT_LOGGED_IN));
        };
        self.sessions
            .lookup(token)
            .await?
            .ok_or(AppError::Auth(NOT_LOGGED_IN))
    }

    async fn start_session(&self, user_id: Uuid, previous: Option<&str>) -> Result<Session, AppError> {
        if let Some(token) = previous {
            self.sessions.destroy(token).await?;
        }
        Ok(self.sessions.create(user_id, self.session_ttl).await?)
    }
}
