//! Periodic full listings fed into a [`Store`].

use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::store::Store;

/// Indexed access over one listing result.
pub trait Enumerator<T> {
    /// Number of items; zero for an absent listing.
    fn len(&self) -> usize;

    /// Identity and item at `index` (`index < len()`).
    fn get(&self, index: usize) -> (String, T);

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Produces a fresh enumerator on every poll.
#[async_trait]
pub trait PollSource<T>: Send + Sync {
    type Enum: Enumerator<T> + Send;

    async fn poll(&self) -> Result<Self::Enum>;
}

/// Shortest period a poller ticks at; shorter requests are raised to it.
pub const MIN_POLL_PERIOD: Duration = Duration::from_millis(1);

/// Background task reconciling a sink to a listing on a fixed interval.
pub struct Poller<T, P, S> {
    name: String,
    source: Arc<P>,
    store: Arc<S>,
    period: Duration,
    _marker: PhantomData<fn() -> T>,
}

impl<T, P, S> Poller<T, P, S>
where
    T: Send + 'static,
    P: PollSource<T> + 'static,
    S: Store<T> + 'static,
{
    pub fn new(name: impl Into<String>, source: Arc<P>, store: Arc<S>, period: Duration) -> Self {
        Self {
            name: name.into(),
            source,
            store,
            period: period.max(MIN_POLL_PERIOD),
            _marker: PhantomData,
        }
    }

    /// Spawns the polling loop; the first tick fires immediately.
    pub fn run(self) -> JoinHandle<()> {
        tokio::spawn(async move {
            info!(poller = %self.name, period_ms = self.period.as_millis() as u64, "poller started");
            let mut tick = interval(self.period);
            tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tick.tick().await;
                if let Err(e) = self.sync().await {
                    warn!(poller = %self.name, error = %e, "poll failed; keeping last listing");
                }
            }
        })
    }

    /// One poll. On failure the sink is left untouched.
    pub async fn sync(&self) -> Result<usize> {
        let listing = self.source.poll().await?;
        let count = listing.len();
        let items = (0..count).map(|i| listing.get(i)).collect();
        self.store.replace(items);
        debug!(poller = %self.name, count, "applied listing");
        Ok(count)
    }
}
