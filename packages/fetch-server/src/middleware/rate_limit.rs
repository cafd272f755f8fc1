//! Fixed-window in-memory rate limiter keyed by tenant (spec §6: every
//! response carries `X-RateLimit-*` headers; exhaustion returns 429).

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::Response;

use crate::error::ApiError;
use crate::middleware::auth::AuthUser;
use crate::state::AppState;

struct Window {
    count: u32,
    started_at: Instant,
}

/// One fixed one-minute window per tenant. Good enough for a single
/// process; a multi-instance deployment would move this to a shared store.
pub struct RateLimiter {
    limit: u32,
    windows: RwLock<HashMap<String, Window>>,
}

impl RateLimiter {
    pub fn new(limit: u32) -> Self {
        Self { limit, windows: RwLock::new(HashMap::new()) }
    }

    /// Returns `(remaining, reset_in)` on success, or `Err(retry_after)` once exhausted.
    fn check(&self, key: &str) -> Result<(u32, Duration), Duration> {
        let mut windows = self.windows.write().unwrap();
        let now = Instant::now();
        let window = windows.entry(key.to_string()).or_insert(Window { count: 0, started_at: now });

        if now.duration_since(window.started_at) >= Duration::from_secs(60) {
            window.count = 0;
            window.started_at = now;
        }

        let reset_in = Duration::from_secs(60).saturating_sub(now.duration_since(window.started_at));

        if window.count >= self.limit {
            return Err(reset_in);
        }
        window.count += 1;
        Ok((self.limit - window.count, reset_in))
    }
}

pub async fn enforce(State(state): State<Arc<AppState>>, req: Request, next: Next) -> Result<Response, ApiError> {
    let key = req
        .extensions()
        .get::<AuthUser>()
        .map(|u| u.tenant.0.clone())
        .unwrap_or_else(|| "anonymous".to_string());

    match state.rate_limiter.check(&key) {
        Ok((remaining, reset_in)) => {
            let mut resp = next.run(req).await;
            let headers = resp.headers_mut();
            headers.insert("X-RateLimit-Limit", state.rate_limiter.limit.into());
            headers.insert("X-RateLimit-Remaining", remaining.into());
            headers.insert("X-RateLimit-Reset", reset_in.as_secs().into());
            Ok(resp)
        }
        Err(retry_after) => Err(ApiError::RateLimited { retry_after_secs: retry_after.as_secs() }),
    }
}
