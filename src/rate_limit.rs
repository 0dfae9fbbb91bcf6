use std::collections::VecDeque;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    extract::{ConnectInfo, Request, State},
    http::HeaderMap,
    middleware::Next,
    response::{IntoResponse, Response},
};
use dashmap::DashMap;
use tracing::{debug, warn};

use crate::config::RateLimitConfig;
use crate::error::AppError;

/// Map size above which idle keys are swept on the next check.
const SWEEP_THRESHOLD: usize = 10_000;

/// Sliding-window log: at most `max_attempts` per key within any `window`.
#[derive(Clone)]
pub struct RateLimiter {
    hits: Arc<DashMap<IpAddr, VecDeque<Instant>>>,
    max_attempts: usize,
    window: Duration,
    trust_proxy: bool,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            hits: Arc::new(DashMap::new()),
            max_attempts: config.max_attempts,
            window: config.window,
            trust_proxy: config.trust_proxy,
        }
    }

    /// Records an attempt from `key`. On rejection returns how long until the
    /// oldest attempt leaves the window.
    pub fn check(&self, key: IpAddr) -> Result<(), Duration> {
        self.check_at(key, Instant::now())
    }

    fn check_at(&self, key: IpAddr, now: Instant) -> Result<(), Duration> {
        if self.hits.len() > SWEEP_THRESHOLD {
            self.sweep(now);
        }

        let mut attempts = self.hits.entry(key).or_default();
        while let Some(oldest) = attempts.front() {
            if now.duration_since(*oldest) >= self.window {
                attempts.pop_front();
            } else {
                break;
            }
        }

        if attempts.len() >= self.max_attempts {
            let retry_after = attempts
                .front()
                .map(|oldest| self.window.saturating_sub(now.duration_since(*oldest)))
                .unwrap_or(self.window);
            warn!(client = %key, attempts = attempts.len(), "auth rate limit exceeded");
            return Err(retry_after);
        }

        attempts.push_back(now);
        debug!(client = %key, attempts = attempts.len(), "auth attempt recorded");
        Ok(())
    }

    fn sweep(&self, now: Instant) {
        self.hits.retain(|_, attempts| {
            attempts
                .back()
                .is_some_and(|latest| now.duration_since(*latest) < self.window)
        });
    }

    /// Source address of a request. Behind a trusted proxy the last hop of
    /// `X-Forwarded-For` is used.
    fn client_addr(&self, headers: &HeaderMap, peer: Option<SocketAddr>) -> IpAddr {
        if self.trust_proxy {
            let forwarded = headers
                .get("x-forwarded-for")
                .and_then(|value| value.to_str().ok())
                .and_then(|value| value.rsplit(',').next())
                .and_then(|hop| hop.trim().parse::<IpAddr>().ok());
            if let Some(addr) = forwarded {
                return addr;
            }
        }
        peer.map(|addr| addr.ip())
            .unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED))
    }
}

/// Middleware guarding the auth routes.
pub async fn limit_auth_attempts(
    State(limiter): State<RateLimiter>,
    request: Request,
    next: Next,
) -> Response {
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    let client = limiter.client_addr(request.headers(), peer);

    match limiter.check(client) {
        Ok(()) => next.run(request).await,
        Err(retry_after) => AppError::RateLimited {
            retry_after_secs: retry_after.as_secs().max(1),
        }
        .into_response(),
    }
}
