use std::{collections::HashMap, net::IpAddr, sync::Arc, time::Duration};

use chrono::{DateTime, TimeDelta, Utc};
use portfolio_shared_contracts::{
    rate_limit::{RateLimitService, RateLimitStatus},
    time::TimeService,
};
use tokio::sync::Mutex;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct RateLimitServiceImpl<Time> {
    time: Time,
    config: RateLimitServiceConfig,
    window_length: TimeDelta,
    state: Arc<Mutex<State>>,
}

#[derive(Debug, Clone, Copy)]
pub struct RateLimitServiceConfig {
    pub window: Duration,
    pub max_requests: u32,
}

#[derive(Debug, Default)]
struct State {
    windows: HashMap<IpAddr, Window>,
    /// Expired windows are removed at most once per window length, so a burst
    /// of new clients does not rescan the whole table on every request.
    next_prune_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy)]
struct Window {
    started_at: DateTime<Utc>,
    hits: u32,
}

impl State {
    fn prune(&mut self, now: DateTime<Utc>, length: TimeDelta) {
        if self.next_prune_at.is_some_and(|next_prune_at| now < next_prune_at) {
            return;
        }

        self.windows
            .retain(|_, window| now < window.ends_at(length));
        self.next_prune_at = Some(saturating_add(now, length));
    }
}

impl Window {
    fn ends_at(&self, length: TimeDelta) -> DateTime<Utc> {
        saturating_add(self.started_at, length)
    }
}

fn saturating_add(time: DateTime<Utc>, delta: TimeDelta) -> DateTime<Utc> {
    time.checked_add_signed(delta)
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

impl<Time> RateLimitServiceImpl<Time> {
    pub fn new(time: Time, config: RateLimitServiceConfig) -> Self {
        Self {
            time,
            config,
            window_length: TimeDelta::from_std(config.window).unwrap_or(TimeDelta::MAX),
            state: Default::default(),
        }
    }
}

impl<Time> RateLimitService for RateLimitServiceImpl<Time>
where
    Time: TimeService,
{
    #[tracing::instrument(skip(self))]
    async fn hit(&self, client: IpAddr) -> RateLimitStatus {
        let now = self.time.now();
        let length = self.window_length;

        let mut state = self.state.lock().await;
        state.prune(now, length);

        let window = state
            .windows
            .entry(client)
            .and_modify(|window| {
                if now >= window.ends_at(length) {
                    *window = Window {
                        started_at: now,
                        hits: 0,
                    };
                }
            })
            .or_insert(Window {
                started_at: now,
                hits: 0,
            });

        window.hits = window.hits.saturating_add(1);

        let reset_in = (window.ends_at(length) - now).to_std().unwrap_or_default();

        if window.hits > self.config.max_requests {
            debug!(hits = window.hits, ?reset_in, "rate limit exceeded");
            RateLimitStatus::Exceeded {
                limit: self.config.max_requests,
                retry_after: reset_in,
            }
        } else {
            RateLimitStatus::Allowed {
                limit: self.config.max_requests,
                remaining: self.config.max_requests - window.hits,
                reset_in,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex as StdMutex;

    use portfolio_shared_contracts::time::MockTimeService;

    use super::*;

    const CLIENT_A: IpAddr = IpAddr::V4(std::net::Ipv4Addr::new(192, 0, 2, 1));
    const CLIENT_B: IpAddr = IpAddr::V4(std::net::Ipv4Addr::new(192, 0, 2, 2));

    fn setup() -> (
        RateLimitServiceImpl<MockTimeService>,
        Arc<StdMutex<DateTime<Utc>>>,
    ) {
        let clock = Arc::new(StdMutex::new(
            DateTime::from_timestamp(1_700_000_000, 0).unwrap(),
        ));
        let time = MockTimeService::new().with_clock(Arc::clone(&clock));
        let config = RateLimitServiceConfig {
            window: Duration::from_secs(60),
            max_requests: 5,
        };
        (RateLimitServiceImpl::new(time, config), clock)
    }

    fn advance(clock: &StdMutex<DateTime<Utc>>, by: Duration) {
        let mut now = clock.lock().unwrap();
        *now = *now + by;
    }

    #[tokio::test]
    async fn allows_up_to_max_requests() {
        // Arrange
        let (sut, clock) = setup();

        for expected_remaining in (0..5).rev() {
            // Act
            let result = sut.hit(CLIENT_A).await;

            // Assert
            assert_eq!(
                result,
                RateLimitStatus::Allowed {
                    limit: 5,
                    remaining: expected_remaining,
                    reset_in: Duration::from_secs(60),
                }
            );
        }

        advance(&clock, Duration::from_secs(15));
        let result = sut.hit(CLIENT_A).await;
        assert_eq!(
            result,
            RateLimitStatus::Exceeded {
                limit: 5,
                retry_after: Duration::from_secs(45)
            }
        );
    }

    #[tokio::test]
    async fn resets_after_window() {
        // Arrange
        let (sut, clock) = setup();
        for _ in 0..6 {
            sut.hit(CLIENT_A).await;
        }
        assert!(!sut.hit(CLIENT_A).await.is_allowed());

        // Act
        advance(&clock, Duration::from_secs(60));
        let result = sut.hit(CLIENT_A).await;

        // Assert
        assert_eq!(
            result,
            RateLimitStatus::Allowed {
                limit: 5,
                remaining: 4,
                reset_in: Duration::from_secs(60),
            }
        );
    }

    #[tokio::test]
    async fn clients_are_independent() {
        // Arrange
        let (sut, _clock) = setup();
        for _ in 0..5 {
            sut.hit(CLIENT_A).await;
        }

        // Act
        let a = sut.hit(CLIENT_A).await;
        let b = sut.hit(CLIENT_B).await;

        // Assert
        assert!(!a.is_allowed());
        assert!(b.is_allowed());
    }

    #[tokio::test]
    async fn prunes_expired_windows() {
        // Arrange
        let (sut, clock) = setup();
        sut.hit(CLIENT_A).await;
        advance(&clock, Duration::from_secs(61));

        // Act
        sut.hit(CLIENT_B).await;

        // Assert
        let state = sut.state.lock().await;
        assert!(!state.windows.contains_key(&CLIENT_A));
        assert!(state.windows.contains_key(&CLIENT_B));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_hits_are_not_lost() {
        // Arrange
        let (sut, _clock) = setup();
        let sut = Arc::new(sut);

        // Act
        let results = futures::future::join_all((0..50).map(|_| {
            let sut = Arc::clone(&sut);
            tokio::spawn(async move { sut.hit(CLIENT_A).await })
        }))
        .await;

        // Assert
        let allowed = results
            .into_iter()
            .map(Result::unwrap)
            .filter(RateLimitStatus::is_allowed)
            .count();
        assert_eq!(allowed, 5);
        assert_eq!(sut.state.lock().await.windows[&CLIENT_A].hits, 50);
    }

    #[tokio::test]
    async fn new_clients_do_not_rescan_the_table() {
        // Arrange
        let (sut, clock) = setup();
        let started_at = *clock.lock().unwrap();
        sut.hit(CLIENT_A).await;
        advance(&clock, Duration::from_secs(30));

        // Act
        for i in 0..20_000u128 {
            let client = IpAddr::V6(std::net::Ipv6Addr::from((0x2001_0db8_u128 << 96) | i));
            assert!(sut.hit(client).await.is_allowed());
        }

        // Assert
        let state = sut.state.lock().await;
        assert_eq!(state.windows.len(), 20_001);
        assert_eq!(
            state.next_prune_at,
            Some(started_at + TimeDelta::seconds(60))
        );
    }

    #[tokio::test]
    async fn burst_of_new_clients_is_pruned_in_next_window() {
        // Arrange
        let (sut, clock) = setup();
        for i in 0..1_000u128 {
            sut.hit(IpAddr::V6(std::net::Ipv6Addr::from(i))).await;
        }
        advance(&clock, Duration::from_secs(60));

        // Act
        sut.hit(CLIENT_A).await;

        // Assert
        let state = sut.state.lock().await;
        assert_eq!(state.windows.len(), 1);
        assert!(state.windows.contains_key(&CLIENT_A));
    }

    #[tokio::test]
    async fn huge_window_does_not_overflow() {
        // Arrange
        let time = MockTimeService::new().with_clock(Arc::new(StdMutex::new(
            DateTime::from_timestamp(1_700_000_000, 0).unwrap(),
        )));
        let sut = RateLimitServiceImpl::new(
            time,
            RateLimitServiceConfig {
                window: Duration::from_secs(u64::MAX),
                max_requests: 1,
            },
        );

        // Act
        let first = sut.hit(CLIENT_A).await;
        let second = sut.hit(CLIENT_A).await;

        // Assert
        assert!(first.is_allowed());
        assert!(!second.is_allowed());
    }
}
