use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use common::{
    Candle, Error, MarketDataFeed, Notifier, PriceEvent, PriceEventStore, PricePoint, PriceStats,
    Result, Signal, SubscriberSource, TrackerConfig,
};
use strategy::Strategy;

use crate::announce::announce;
use crate::ops::logged;

/// What a single iteration ended up doing.
#[derive(Debug, Clone, PartialEq)]
pub enum TickOutcome {
    /// The move is smaller than the tracker's minimum.
    BelowThreshold(PriceStats),
    /// The move is large enough but the last event for the pair is too recent.
    RateLimited { stats: PriceStats, last: PriceEvent },
    /// A new event was recorded and sent to `delivered` subscribers.
    Announced {
        stats: PriceStats,
        event: PriceEvent,
        delivered: usize,
    },
}

impl TickOutcome {
    pub fn stats(&self) -> &PriceStats {
        match self {
            TickOutcome::BelowThreshold(stats)
            | TickOutcome::RateLimited { stats, .. }
            | TickOutcome::Announced { stats, .. } => stats,
        }
    }

    fn log(&self) {
        let stats = self.stats();
        match self {
            TickOutcome::BelowThreshold(_) => debug!(
                pair = %stats.pair,
                signal = %stats.signal,
                price = stats.current.price,
                change_pct = stats.percent_change,
                "Tick"
            ),
            TickOutcome::RateLimited { last, .. } => info!(
                pair = %stats.pair,
                change_pct = stats.percent_change,
                last_event_at = %last.recorded_at,
                "Move suppressed by rate limit"
            ),
            TickOutcome::Announced { event, delivered, .. } => info!(
                pair = %stats.pair,
                event_id = event.id,
                delivered,
                "Tick announced"
            ),
        }
    }
}

/// Current vs. one-hour-ago prices for the latest window.
///
/// "Current" is the last candle's close at its open time; "one hour ago" is
/// the close of the candle `hour_ago_offset` positions from the end, at its
/// close time. The change is taken relative to the current price, which must
/// be positive.
pub fn price_stats(
    pair: &str,
    candles: &[Candle],
    hour_ago_offset: usize,
    signal: Signal,
) -> Result<PriceStats> {
    let available = candles.len();
    if hour_ago_offset == 0 || available < hour_ago_offset {
        return Err(Error::InsufficientData {
            required: hour_ago_offset.max(1),
            available,
        });
    }
    let last = &candles[available - 1];
    let then = &candles[available - hour_ago_offset];

    let percent_change = (last.close - then.close).abs() / last.close * 100.0;
    if last.close <= 0.0 || !percent_change.is_finite() {
        return Err(Error::Validation(format!(
            "cannot measure a move from {} to {}",
            then.close, last.close
        )));
    }

    Ok(PriceStats {
        pair: pair.to_string(),
        signal,
        current: PricePoint {
            time: last.open_time,
            price: last.close,
        },
        hour_ago: PricePoint {
            time: then.close_time,
            price: then.close,
        },
        percent_change,
    })
}

/// True when enough time has passed since `last` to record a new event at `now`.
pub fn rate_limit_allows(
    last: Option<&PriceEvent>,
    now: DateTime<Utc>,
    window: chrono::Duration,
) -> bool {
    match last {
        None => true,
        Some(event) => now - event.recorded_at >= window,
    }
}

/// Cloneable handle used to stop a running tracker.
#[derive(Clone)]
pub struct TrackerHandle {
    shutdown_tx: Arc<watch::Sender<bool>>,
}

impl TrackerHandle {
    /// Ask the tracker to stop. It finishes the current iteration first.
    pub fn shutdown(&self) {
        self.shutdown_tx.send_replace(true);
    }

    pub fn is_shutting_down(&self) -> bool {
        *self.shutdown_tx.borrow()
    }

    /// Receiver that flips to `true` on shutdown, for tasks that stop alongside the tracker.
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.shutdown_tx.subscribe()
    }
}

/// The polling loop: fetch, evaluate, compare, rate-limit, record, announce.
pub struct Tracker {
    cfg: TrackerConfig,
    feed: Arc<dyn MarketDataFeed>,
    strategy: Arc<dyn Strategy>,
    events: Arc<dyn PriceEventStore>,
    subscribers: Arc<dyn SubscriberSource>,
    notifier: Arc<dyn Notifier>,
    shutdown_rx: watch::Receiver<bool>,
}

impl Tracker {
    pub fn new(
        cfg: TrackerConfig,
        feed: Arc<dyn MarketDataFeed>,
        strategy: Arc<dyn Strategy>,
        events: Arc<dyn PriceEventStore>,
        subscribers: Arc<dyn SubscriberSource>,
        notifier: Arc<dyn Notifier>,
    ) -> (Self, TrackerHandle) {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let tracker = Tracker {
            cfg,
            feed,
            strategy,
            events,
            subscribers,
            notifier,
            shutdown_rx,
        };
        let handle = TrackerHandle {
            shutdown_tx: Arc::new(shutdown_tx),
        };
        (tracker, handle)
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.cfg
    }

    fn stopping(&self) -> bool {
        *self.shutdown_rx.borrow()
    }

    /// Run iterations until shutdown is requested.
    /// Errors abandon the current iteration only; the loop keeps going.
    pub async fn run(self: Arc<Self>) {
        let mut shutdown = self.shutdown_rx.clone();
        info!(
            pair = %self.cfg.pair,
            strategy = self.strategy.name(),
            interval = ?self.cfg.poll_interval,
            "Tracker running"
        );

        while !self.stopping() {
            match self.tick().await {
                Ok(outcome) => outcome.log(),
                Err(e) => debug!(error = %e, "Iteration abandoned"),
            }

            tokio::select! {
                _ = tokio::time::sleep(self.cfg.poll_interval) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        warn!("Tracker handle dropped, stopping");
                        break;
                    }
                }
            }
        }
        info!(pair = %self.cfg.pair, "Tracker stopped");
    }

    /// Keep `run` alive across panics, restarting with exponential backoff.
    /// Returns once the tracker exits cleanly.
    pub async fn supervise(self: Arc<Self>) {
        let mut backoff = Duration::from_secs(1);
        const MAX_BACKOFF: Duration = Duration::from_secs(60);

        loop {
            match tokio::spawn(self.clone().run()).await {
                Ok(()) => return,
                Err(e) if e.is_panic() => {
                    if self.stopping() {
                        return;
                    }
                    error!(backoff = ?backoff, "Tracker panicked, restarting");
                    tokio::time::sleep(backoff).await;
                    backoff = (backoff * 2).min(MAX_BACKOFF);
                }
                Err(e) => {
                    warn!(error = %e, "Tracker task cancelled");
                    return;
                }
            }
        }
    }

    /// One full iteration.
    pub async fn tick(&self) -> Result<TickOutcome> {
        let candles = logged("fetch_candles", self.fetch_candles()).await?;
        let signal = logged("evaluate", async { self.strategy.evaluate(&candles) }).await?;
        let stats = logged("price_stats", async {
            price_stats(&self.cfg.pair, &candles, self.cfg.hour_ago_offset, signal)
        })
        .await?;

        if stats.percent_change < self.cfg.price_change_threshold_pct {
            return Ok(TickOutcome::BelowThreshold(stats));
        }

        let last = logged("last_price_event", self.events.last_event(&stats.pair)).await?;
        if let Some(last) = last {
            if !rate_limit_allows(Some(&last), stats.current.time, self.cfg.rate_limit_window) {
                return Ok(TickOutcome::RateLimited { stats, last });
            }
        }

        let event = logged(
            "record_price_event",
            self.events
                .record(&stats.pair, stats.current.price, stats.current.time),
        )
        .await?;

        let delivered = logged(
            "announce",
            announce(
                &stats,
                self.subscribers.as_ref(),
                self.notifier.as_ref(),
                self.cfg.request_timeout,
            ),
        )
        .await?;

        Ok(TickOutcome::Announced {
            stats,
            event,
            delivered,
        })
    }

    async fn fetch_candles(&self) -> Result<Vec<Candle>> {
        let timeout = self.cfg.request_timeout;
        tokio::time::timeout(
            timeout,
            self.feed.recent_candles(&self.cfg.pair, self.cfg.window),
        )
        .await
        .map_err(|_| Error::Fetch(format!("no response within {timeout:?}")))?
    }
}
