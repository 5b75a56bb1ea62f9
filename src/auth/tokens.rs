//! Session token store

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use parking_lot::RwLock;
use rand::RngCore;

/// Random bytes per token; hex encoding doubles the length
pub const TOKEN_BYTES: usize = 20;

/// Upper bound on the token lifetime, well inside the range chrono can represent
pub const MAX_TTL_HOURS: i64 = 24 * 365 * 100;

/// Issued bearer tokens with their issue time
#[derive(Clone)]
pub struct TokenStore {
    inner: Arc<TokenStoreInner>,
}

struct TokenStoreInner {
    tokens: RwLock<HashMap<String, DateTime<Utc>>>,
    ttl: Duration,
}

impl TokenStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            inner: Arc::new(TokenStoreInner {
                tokens: RwLock::new(HashMap::new()),
                ttl,
            }),
        }
    }

    pub fn with_ttl_hours(hours: i64) -> Self {
        Self::new(Duration::hours(hours.clamp(1, MAX_TTL_HOURS)))
    }

    /// Issue and remember a fresh token
    pub fn issue(&self) -> String {
        let mut bytes = [0u8; TOKEN_BYTES];
        rand::thread_rng().fill_bytes(&mut bytes);
        let token = hex::encode(bytes);

        self.inner.tokens.write().insert(token.clone(), Utc::now());
        token
    }

    /// Whether `token` was issued and has not expired
    pub fn validate(&self, token: &str) -> bool {
        let issued_at = match self.inner.tokens.read().get(token) {
            Some(issued_at) => *issued_at,
            None => return false,
        };

        if Utc::now().signed_duration_since(issued_at) < self.inner.ttl {
            return true;
        }

        self.inner.tokens.write().remove(token);
        false
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.inner.tokens.read().len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remove expired tokens, returning how many were dropped
    pub fn purge_expired(&self) -> usize {
        let cutoff = match Utc::now().checked_sub_signed(self.inner.ttl) {
            Some(cutoff) => cutoff,
            None => return 0,
        };
        let mut tokens = self.inner.tokens.write();
        let before = tokens.len();
        tokens.retain(|_, issued_at| *issued_at > cutoff);
        before - tokens.len()
    }

    /// Start background cleanup task
    pub fn start_cleanup_task(self) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(std::time::Duration::from_secs(300)); // 5 minutes

            loop {
                interval.tick().await;
                let purged = self.purge_expired();
                if purged > 0 {
                    tracing::info!(count = purged, "Purged expired session tokens");
                }
            }
        })
    }
}
