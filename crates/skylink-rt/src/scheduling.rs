//! ---
//! sky_section: "03-simulation-clock"
//! sky_subsection: "module"
//! sky_type: "source"
//! sky_scope: "code"
//! sky_description: "Simulation clock and timer helpers for the server loop."
//! sky_version: "v0.1.0"
//! sky_owner: "tbd"
//! ---
use std::hash::Hash;
use std::time::Duration;

use indexmap::IndexMap;
use tokio::time::{Instant, MissedTickBehavior};

const MIN_PERIOD: Duration = Duration::from_micros(1);

/// Async rate limiter that keeps loop intervals steady.
///
/// Missed ticks are delayed rather than bursted so a long `run_for` never
/// triggers a catch-up storm afterwards.
#[derive(Debug)]
pub struct RateLimiter {
    interval: tokio::time::Interval,
}

impl RateLimiter {
    /// Tick every `period`, first tick immediately.
    pub fn new(period: Duration) -> Self {
        let mut interval = tokio::time::interval(period.max(MIN_PERIOD));
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        Self { interval }
    }

    /// Configured period.
    pub fn period(&self) -> Duration {
        self.interval.period()
    }

    /// Restart the period from now.
    pub fn reset(&mut self) {
        self.interval.reset();
    }

    /// Wait for the next tick. Cancel safe.
    pub async fn tick(&mut self) -> Instant {
        self.interval.tick().await
    }
}

#[derive(Debug, Clone, Copy)]
struct Slot {
    period: Duration,
    next_due: Instant,
}

/// Independent periodic deadlines keyed by destination.
///
/// Each key fires on its own period; [`PushSchedule::wait`] sleeps until the
/// earliest one, so a single `select!` branch can serve any number of keys.
#[derive(Debug)]
pub struct PushSchedule<K> {
    slots: IndexMap<K, Slot>,
}

impl<K> Default for PushSchedule<K> {
    fn default() -> Self {
        Self {
            slots: IndexMap::new(),
        }
    }
}

impl<K: Hash + Eq + Clone> PushSchedule<K> {
    /// Empty schedule.
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule `key` every `period`, first firing one period from `now`.
    /// An existing key keeps its position and takes the new period.
    pub fn insert(&mut self, key: K, period: Duration, now: Instant) -> bool {
        self.slots
            .insert(
                key,
                Slot {
                    period,
                    next_due: now + period,
                },
            )
            .is_some()
    }

    /// Drop `key`; returns whether it was scheduled.
    pub fn remove(&mut self, key: &K) -> bool {
        self.slots.shift_remove(key).is_some()
    }

    /// Whether `key` is scheduled.
    pub fn contains(&self, key: &K) -> bool {
        self.slots.contains_key(key)
    }

    /// Period of `key`, if scheduled.
    pub fn period(&self, key: &K) -> Option<Duration> {
        self.slots.get(key).map(|slot| slot.period)
    }

    /// Number of scheduled keys.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Whether nothing is scheduled.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Scheduled keys in insertion order.
    pub fn keys(&self) -> impl Iterator<Item = &K> {
        self.slots.keys()
    }

    /// Earliest pending deadline.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.slots.values().map(|slot| slot.next_due).min()
    }

    /// Sleep until the earliest deadline; never resolves while empty.
    pub async fn wait(&self) {
        match self.next_deadline() {
            Some(deadline) => tokio::time::sleep_until(deadline).await,
            None => std::future::pending::<()>().await,
        }
    }

    /// Collect every key due at `now` and move it to its next deadline.
    pub fn take_due(&mut self, now: Instant) -> Vec<K> {
        let mut due = Vec::new();
        for (key, slot) in self.slots.iter_mut() {
            if slot.next_due <= now {
                slot.next_due += slot.period;
                if slot.next_due <= now {
                    slot.next_due = now + slot.period;
                }
                due.push(key.clone());
            }
        }
        due
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn keys_fire_on_their_own_periods() {
        let start = Instant::now();
        let mut schedule = PushSchedule::new();
        schedule.insert("fast", Duration::from_millis(100), start);
        schedule.insert("slow", Duration::from_millis(250), start);

        let mut fired = Vec::new();
        while Instant::now() < start + Duration::from_millis(500) {
            schedule.wait().await;
            fired.extend(schedule.take_due(Instant::now()));
        }
        assert_eq!(fired.iter().filter(|k| **k == "fast").count(), 5);
        assert_eq!(fired.iter().filter(|k| **k == "slow").count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn reinsert_replaces_period() {
        let now = Instant::now();
        let mut schedule = PushSchedule::new();
        assert!(!schedule.insert(1u8, Duration::from_secs(1), now));
        assert!(schedule.insert(1u8, Duration::from_millis(10), now));
        assert_eq!(schedule.len(), 1);
        assert_eq!(schedule.period(&1), Some(Duration::from_millis(10)));
        assert!(schedule.remove(&1));
        assert!(schedule.next_deadline().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn empty_schedule_never_fires() {
        let schedule: PushSchedule<u8> = PushSchedule::new();
        let outcome = tokio::time::timeout(Duration::from_secs(5), schedule.wait()).await;
        assert!(outcome.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn rate_limiter_ticks_at_period() {
        let mut limiter = RateLimiter::new(Duration::from_millis(20));
        let first = limiter.tick().await;
        let second = limiter.tick().await;
        assert_eq!(second - first, Duration::from_millis(20));
        assert_eq!(limiter.period(), Duration::from_millis(20));
    }
}
