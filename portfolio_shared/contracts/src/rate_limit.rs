use std::{future::Future, net::IpAddr, time::Duration};

/// Fixed window rate limiting keyed by client address.
#[cfg_attr(feature = "mock", mockall::automock)]
pub trait RateLimitService: Send + Sync + 'static {
    /// Record a request from `client` and decide whether it may proceed.
    ///
    /// Every call counts as a hit, including calls which are rejected.
    fn hit(&self, client: IpAddr) -> impl Future<Output = RateLimitStatus> + Send;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimitStatus {
    Allowed {
        /// Maximum number of requests per window.
        limit: u32,
        /// Requests left in the current window.
        remaining: u32,
        /// Time until the current window ends.
        reset_in: Duration,
    },
    Exceeded {
        /// Maximum number of requests per window.
        limit: u32,
        /// Time until the client may send requests again.
        retry_after: Duration,
    },
}

impl RateLimitStatus {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allowed { .. })
    }
}

#[cfg(feature = "mock")]
impl MockRateLimitService {
    pub fn with_hit(mut self, client: IpAddr, result: RateLimitStatus) -> Self {
        self.expect_hit()
            .once()
            .with(mockall::predicate::eq(client))
            .return_once(move |_| Box::pin(std::future::ready(result)));
        self
    }
}
