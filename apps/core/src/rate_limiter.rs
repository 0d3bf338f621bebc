use crate::error::Result;
use crate::services::traits::TransientStore;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use std::time::Duration;

/// A fixed-window rate limiter backed by the transient store.
///
/// Each session gets one counter that is created with the window as its
/// expiry. Every check is a single atomic increment, so two simultaneous
/// requests can never both observe the pre-increment count.
pub struct SessionRateLimiter {
    store: Arc<dyn TransientStore>,
    /// The maximum number of accepted requests per `window`.
    limit: u64,
    window: Duration,
}

/// Counter key for a session: a hash prefix, so raw ids never reach the store.
pub fn session_key(session_id: &str) -> String {
    let digest = format!("{:x}", Sha256::digest(session_id.as_bytes()));
    format!("gap_rl_{}", &digest[..16])
}

impl SessionRateLimiter {
    pub fn new(store: Arc<dyn TransientStore>, limit: u64, window: Duration) -> Self {
        Self {
            store,
            limit,
            window,
        }
    }

    /// Records a request for `session_id` and returns `true` if it is within
    /// the limit.
    pub async fn check(&self, session_id: &str) -> Result<bool> {
        let count = self
            .store
            .increment(&session_key(session_id), self.window)
            .await?;
        Ok(count <= self.limit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::memory::MemoryTransientStore;

    fn limiter(limit: u64, window: Duration) -> SessionRateLimiter {
        SessionRateLimiter::new(Arc::new(MemoryTransientStore::new()), limit, window)
    }

    #[tokio::test]
    async fn test_rate_limiter_allows_requests_within_limit() {
        let limiter = limiter(5, Duration::from_secs(1));
        for _ in 0..5 {
            assert!(limiter.check("client1").await.unwrap());
        }
        assert!(!limiter.check("client1").await.unwrap());
        assert!(limiter.check("client2").await.unwrap());
    }

    #[tokio::test]
    async fn test_rate_limiter_resets_after_window() {
        let limiter = limiter(2, Duration::from_millis(50));
        assert!(limiter.check("client2").await.unwrap());
        assert!(limiter.check("client2").await.unwrap());
        assert!(!limiter.check("client2").await.unwrap());

        tokio::time::sleep(Duration::from_millis(60)).await;

        assert!(limiter.check("client2").await.unwrap());
    }

    #[tokio::test]
    async fn test_concurrent_checks_share_one_counter() {
        let limiter = Arc::new(limiter(3, Duration::from_secs(5)));
        let handles: Vec<_> = (0..6)
            .map(|_| {
                let limiter = Arc::clone(&limiter);
                tokio::spawn(async move { limiter.check("burst").await.unwrap() })
            })
            .collect();

        let mut allowed = 0;
        for handle in handles {
            if handle.await.unwrap() {
                allowed += 1;
            }
        }
        assert_eq!(allowed, 3);
    }

    #[test]
    fn test_session_key_is_hashed() {
        let key = session_key("abc");
        assert_eq!(key, "gap_rl_ba7816bf8f01cfea");
        assert_eq!(key.len(), "gap_rl_".len() + 16);
    }
}
