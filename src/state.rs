use std::sync::Arc;

use crate::config::{CookieConfig, RateLimitConfig};
use crate::models::record::{MEALS, WORKOUTS};
use crate::rate_limit::RateLimiter;
use crate::repository::{RecordRepository, UserRepository};
use crate::services::{IdentityService, PasswordHasher, RecordService};
use crate::session::SessionStore;

/// Storage implementations the services run on.
pub struct Backends {
    pub users: Arc<dyn UserRepository>,
    pub records: Arc<dyn RecordRepository>,
    pub sessions: Arc<dyn SessionStore>,
}

#[derive(Clone)]
pub struct AppState {
    pub identity: IdentityService,
    pub workouts: RecordService,
    pub meals: RecordService,
    pub cookie: CookieConfig,
    pub limiter: RateLimiter,
}

impl AppState {
    pub fn new(
        backends: Backends,
        hasher: PasswordHasher,
        cookie: CookieConfig,
        rate_limit: RateLimitConfig,
    ) -> Self {
        Self {
            identity: IdentityService::new(backends.users, backends.sessions, hasher, cookie.ttl),
            workouts: RecordService::new(&WORKOUTS, backends.records.clone()),
            meals: RecordService::new(&MEALS, backends.records),
            cookie,
            limiter: RateLimiter::new(rate_limit),
        }
    }
}
