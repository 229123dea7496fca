//! Admission control for concurrent exchanges.

use std::sync::Arc;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::error::{AgentError, Result};

/// Default number of concurrent exchanges.
pub const DEFAULT_EXCHANGE_LIMIT: usize = 4;

/// Bounds how many exchanges may run at once.
///
/// Admission is non-blocking: an exchange beyond the limit is rejected with
/// [`AgentError::Busy`] immediately rather than queued.
#[derive(Clone)]
pub struct ExchangeLimiter {
    semaphore: Arc<Semaphore>,
}

impl ExchangeLimiter {
    /// Create a limiter admitting up to `limit` concurrent exchanges.
    pub fn new(limit: usize) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(limit.max(1))),
        }
    }

    /// Try to admit one exchange. The permit is released on drop.
    pub fn try_admit(&self) -> Result<ExchangePermit> {
        match self.semaphore.clone().try_acquire_owned() {
            Ok(permit) => Ok(ExchangePermit { _permit: permit }),
            Err(_) => Err(AgentError::Busy),
        }
    }

    /// How many exchanges could be admitted right now.
    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }
}

impl Default for ExchangeLimiter {
    fn default() -> Self {
        Self::new(DEFAULT_EXCHANGE_LIMIT)
    }
}

/// Admission token for one running exchange.
pub struct ExchangePermit {
    _permit: OwnedSemaphorePermit,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_beyond_limit() {
        let limiter = ExchangeLimiter::new(2);
        let _a = limiter.try_admit().unwrap();
        let _b = limiter.try_admit().unwrap();
        assert!(matches!(limiter.try_admit(), Err(AgentError::Busy)));
    }

    #[test]
    fn test_permit_release_on_drop() {
        let limiter = ExchangeLimiter::new(1);
        {
            let _permit = limiter.try_admit().unwrap();
            assert_eq!(limiter.available(), 0);
        }
        assert_eq!(limiter.available(), 1);
        assert!(limiter.try_admit().is_ok());
    }

    #[test]
    fn test_zero_limit_clamps_to_one() {
        let limiter = ExchangeLimiter::new(0);
        assert!(limiter.try_admit().is_ok());
    }
}
