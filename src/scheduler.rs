//! Refresh scheduling.
//!
//! Every [`Feed`] runs in its own tokio task, so a slow provider only ever
//! delays itself. One cycle of a feed is:
//!
//! 1. fetch from the feed's source client, bounded by the request timeout
//! 2. store the outcome in the cache, success or failure
//! 3. for a new weather snapshot, extend the rolling window, recompute
//!    derived metrics and evaluate alerts
//!
//! # Cadence
//!
//! After a failure the feed is retried after `retry_delay`, at most
//! `max_fast_retries` times in a row; past that it falls back to its normal
//! cadence until it succeeds again. The normal cadence is the product's
//! nominal interval for satellite feeds, and the base interval for weather,
//! dropping to the fast interval while any HIGH alert is active.
//!
//! # Shutdown
//!
//! Tasks watch a shutdown channel. A fetch still in flight when it fires is
//! dropped before its result reaches the cache.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

use crate::alerts::Transition;
use crate::cache::CacheKey;
use crate::config::ScheduleConfig;
use crate::error::FetchError;
use crate::metrics;
use crate::model::{Record, WeatherSnapshot};
use crate::monitor::Monitor;
use crate::sources::{Feed, Sources};

/// What one cycle did.
#[derive(Debug, Clone, PartialEq)]
pub struct CycleReport {
    pub feed: Feed,
    /// Records stored this cycle.
    pub stored: usize,
    pub error: Option<FetchError>,
    /// Failed attempts on the feed's primary key since its last success.
    pub consecutive_failures: u32,
    pub transitions: Vec<Transition>,
}

impl CycleReport {
    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}

/// Delay before the next cycle of `feed`.
pub fn next_delay(
    feed: Feed,
    consecutive_failures: u32,
    fast_mode: bool,
    schedule: &ScheduleConfig,
) -> Duration {
    let weather_interval = if fast_mode {
        schedule.fast_interval
    } else {
        schedule.base_interval
    };
    let normal = feed.nominal_interval(weather_interval);

    if consecutive_failures > 0 && consecutive_failures <= schedule.max_fast_retries {
        schedule.retry_delay.min(normal)
    } else {
        normal
    }
}

/// Drives every feed of one monitor.
#[derive(Clone)]
pub struct Scheduler {
    monitor: Arc<Monitor>,
    sources: Sources,
}

impl Scheduler {
    pub fn new(monitor: Arc<Monitor>, sources: Sources) -> Self {
        Self { monitor, sources }
    }

    pub fn monitor(&self) -> &Arc<Monitor> {
        &self.monitor
    }

    fn schedule(&self) -> &ScheduleConfig {
        &self.monitor.config().schedule
    }

    /// Fetch one feed, bounded by the request timeout.
    pub async fn fetch(&self, feed: Feed) -> Result<Vec<Record>, FetchError> {
        let config = self.monitor.config();
        let since = self
            .monitor
            .cache()
            .get(&feed.primary_key())
            .and_then(|entry| entry.record.as_ref().map(Record::captured_at));
        let client = self.sources.client_for(feed);

        match tokio::time::timeout(
            config.schedule.request_timeout,
            client.fetch(feed, config.location, since),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(FetchError::Timeout),
        }
    }

    /// Run one full cycle of `feed` now.
    #[instrument(skip(self), fields(feed = %feed))]
    pub async fn run_cycle(&self, feed: Feed) -> CycleReport {
        let outcome = self.fetch(feed).await;
        self.apply(feed, outcome, Utc::now())
    }

    /// Store a fetch outcome and run the downstream stages.
    pub fn apply(
        &self,
        feed: Feed,
        outcome: Result<Vec<Record>, FetchError>,
        now: DateTime<Utc>,
    ) -> CycleReport {
        let cache = self.monitor.cache();
        let mut report = CycleReport {
            feed,
            stored: 0,
            error: None,
            consecutive_failures: 0,
            transitions: Vec::new(),
        };

        match outcome {
            Err(err) => {
                for key in feed.keys() {
                    cache.put(key, Err(err.clone()), now);
                }
                report.consecutive_failures = cache
                    .get(&feed.primary_key())
                    .map_or(0, |entry| entry.attempts);
                warn!(
                    feed = %feed,
                    error = %err,
                    kind = err.kind(),
                    attempts = report.consecutive_failures,
                    "Fetch failed"
                );
                report.error = Some(err);
            }
            Ok(records) if records.is_empty() => {
                for key in feed.keys() {
                    cache.confirm_unchanged(&key, now);
                }
                debug!(feed = %feed, "Nothing new from provider");
            }
            Ok(records) => {
                let mut newest: HashMap<CacheKey, Record> = HashMap::new();
                for record in records {
                    let key = CacheKey::for_record(&record);
                    let newer = newest
                        .get(&key)
                        .is_none_or(|held| record.captured_at() > held.captured_at());
                    if newer {
                        newest.insert(key, record);
                    }
                }

                let mut snapshot = None;
                for (key, record) in newest {
                    if let Record::Weather(s) = &record {
                        snapshot = Some(s.clone());
                    }
                    let entry = cache.put(key, Ok(record), now);
                    report.stored += 1;
                    debug!(feed = %feed, key = %key, quality = ?entry.quality, "Record stored");
                }

                if let Some(snapshot) = snapshot {
                    report.transitions = self.process_weather(snapshot, now);
                }
                info!(feed = %feed, records = report.stored, "Fetch succeeded");
            }
        }

        report
    }

    /// Derived metrics then alerts for a freshly stored snapshot.
    fn process_weather(
        &self,
        snapshot: WeatherSnapshot,
        now: DateTime<Utc>,
    ) -> Vec<Transition> {
        let config = self.monitor.config();
        let cache = self.monitor.cache();

        cache.push_history(snapshot.clone());
        let history = cache.history();
        let derived = metrics::derive(&snapshot, &history, &config.comfort, &config.trend, now);
        debug!(
            feels_like = derived.feels_like,
            comfort = derived.comfort_score,
            "Derived metrics updated"
        );
        self.monitor.set_metrics(derived);

        let was_fast = self.monitor.fast_mode();
        let transitions = self.monitor.evaluate_alerts(&snapshot);
        let is_fast = self.monitor.fast_mode();
        if was_fast != is_fast {
            let interval = if is_fast {
                config.schedule.fast_interval
            } else {
                config.schedule.base_interval
            };
            info!(
                fast_mode = is_fast,
                interval_secs = interval.as_secs(),
                "Weather polling interval changed"
            );
        }
        transitions
    }

    /// Loop one feed until shutdown is signalled.
    pub async fn run_feed(self, feed: Feed, mut shutdown: watch::Receiver<bool>) {
        info!(feed = %feed, "Feed started");
        loop {
            if *shutdown.borrow() {
                break;
            }

            let outcome = tokio::select! {
                outcome = self.fetch(feed) => outcome,
                _ = shutdown.changed() => break,
            };
            let report = self.apply(feed, outcome, Utc::now());

            let delay = next_delay(
                feed,
                report.consecutive_failures,
                self.monitor.fast_mode(),
                self.schedule(),
            );
            debug!(feed = %feed, delay_secs = delay.as_secs(), "Next cycle scheduled");

            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = shutdown.changed() => break,
            }
        }
        info!(feed = %feed, "Feed stopped");
    }

    /// Spawn one task per feed.
    pub fn spawn(&self, shutdown: watch::Receiver<bool>) -> Vec<JoinHandle<()>> {
        Feed::all()
            .into_iter()
            .map(|feed| tokio::spawn(self.clone().run_feed(feed, shutdown.clone())))
            .collect()
    }
}
