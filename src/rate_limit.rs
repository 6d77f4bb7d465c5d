use dashmap::DashMap;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::metrics::VISITORS_TRACKED;

// Token bucket - refills lazily whenever it is checked
pub struct TokenBucket {
    capacity: u32,
    refill_interval: Duration, // time to earn one token
    state: Mutex<BucketState>,
}

struct BucketState {
    tokens: u32,
    last_refill: Instant,
}

impl TokenBucket {
    pub fn new(capacity: u32, refill_interval: Duration) -> Self {
        Self::starting_at(capacity, refill_interval, Instant::now())
    }

    pub fn starting_at(capacity: u32, refill_interval: Duration, now: Instant) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            refill_interval: refill_interval.max(Duration::from_nanos(1)),
            state: Mutex::new(BucketState {
                tokens: capacity,
                last_refill: now,
            }),
        }
    }

    /// Takes one token if available.
    pub fn allow(&self) -> bool {
        self.check_at(Instant::now()).is_ok()
    }

    /// Refills, then takes one token. On denial returns the time left until
    /// the next token is earned.
    ///
    /// `last_refill` jumps to `now` whenever at least one token is added, so
    /// the partial interval since the previous refill is dropped.
    pub fn check_at(&self, now: Instant) -> Result<(), Duration> {
        let mut state = self.state.lock();

        // saturating: a caller that read the clock before a competing caller
        // took the lock must not move last_refill backwards
        let elapsed = now.saturating_duration_since(state.last_refill);
        let to_add = elapsed.as_nanos() / self.refill_interval.as_nanos();

        if to_add > 0 {
            let refilled = (u128::from(state.tokens) + to_add).min(u128::from(self.capacity));
            state.tokens = refilled as u32;
            state.last_refill = now;
        }

        if state.tokens > 0 {
            state.tokens -= 1;
            return Ok(());
        }

        Err((state.last_refill + self.refill_interval).saturating_duration_since(now))
    }

    pub fn tokens(&self) -> u32 {
        self.state.lock().tokens
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }
}

// One client's bucket plus when we last heard from it
pub struct Visitor {
    bucket: TokenBucket,
    last_seen: Mutex<Instant>,
}

impl Visitor {
    fn new(capacity: u32, refill_interval: Duration, now: Instant) -> Self {
        Self {
            bucket: TokenBucket::starting_at(capacity, refill_interval, now),
            last_seen: Mutex::new(now),
        }
    }

    pub fn last_seen(&self) -> Instant {
        *self.last_seen.lock()
    }

    pub fn bucket(&self) -> &TokenBucket {
        &self.bucket
    }
}

/// Per-client token buckets keyed by client identifier.
///
/// The map shard lock only covers lookup/insert and the `last_seen` update;
/// the bucket itself is checked under its own lock, so a busy client never
/// holds up admission checks for other clients.
pub struct VisitorRegistry {
    visitors: DashMap<String, Arc<Visitor>>,
    capacity: u32,
    refill_interval: Duration,
    ttl: Duration,
}

impl VisitorRegistry {
    // `rate` requests per `window`, one token back every window/rate
    pub fn new(rate: u32, window: Duration, ttl: Duration) -> Self {
        let capacity = rate.max(1);
        Self {
            visitors: DashMap::new(),
            capacity,
            refill_interval: window / capacity,
            ttl,
        }
    }

    /// Builds the registry and starts its eviction task. The task stops when
    /// `cancel` fires or the registry is dropped.
    pub fn start(
        rate: u32,
        window: Duration,
        ttl: Duration,
        sweep_every: Duration,
        cancel: CancellationToken,
    ) -> Arc<Self> {
        let registry = Arc::new(Self::new(rate, window, ttl));
        Self::spawn_eviction(&registry, sweep_every, cancel);
        registry
    }

    pub fn admit(&self, client: &str) -> bool {
        self.check(client).is_ok()
    }

    /// Like [`admit`](Self::admit) but reports how long a denied client should wait.
    pub fn check(&self, client: &str) -> Result<(), Duration> {
        let now = Instant::now();
        self.touch(client, now).bucket.check_at(now)
    }

    fn touch(&self, client: &str, now: Instant) -> Arc<Visitor> {
        if let Some(visitor) = self.visitors.get(client) {
            *visitor.last_seen.lock() = now;
            return Arc::clone(&visitor);
        }

        // entry() holds the shard write lock, so two first requests from the
        // same client end up sharing one bucket
        let visitor = {
            let entry = self
                .visitors
                .entry(client.to_owned())
                .or_insert_with(|| {
                    debug!(client, "new visitor");
                    Arc::new(Visitor::new(self.capacity, self.refill_interval, now))
                });
            *entry.last_seen.lock() = now;
            Arc::clone(&entry)
        };

        VISITORS_TRACKED.set(self.visitors.len() as f64);
        visitor
    }

    /// Drops visitors idle for longer than the retention threshold.
    pub fn evict_idle(&self) -> usize {
        self.evict_idle_at(Instant::now())
    }

    pub fn evict_idle_at(&self, now: Instant) -> usize {
        let before = self.visitors.len();
        self.visitors
            .retain(|_, visitor| now.saturating_duration_since(visitor.last_seen()) <= self.ttl);
        let after = self.visitors.len();

        VISITORS_TRACKED.set(after as f64);
        before.saturating_sub(after)
    }

    pub fn spawn_eviction(
        registry: &Arc<Self>,
        every: Duration,
        cancel: CancellationToken,
    ) -> JoinHandle<()> {
        // weak so a dropped gateway doesn't keep the map alive through this task
        let registry = Arc::downgrade(registry);

        tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + every, every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        let Some(registry) = registry.upgrade() else { break };
                        let removed = registry.evict_idle();
                        debug!(removed, remaining = registry.len(), "visitor sweep");
                    }
                }
            }
            debug!("visitor eviction stopped");
        })
    }

    pub fn get(&self, client: &str) -> Option<Arc<Visitor>> {
        self.visitors.get(client).map(|v| Arc::clone(&v))
    }

    pub fn len(&self) -> usize {
        self.visitors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.visitors.is_empty()
    }

    pub fn refill_interval(&self) -> Duration {
        self.refill_interval
    }
}
