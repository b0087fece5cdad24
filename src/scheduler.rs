//! Per-widget refresh scheduling.
//!
//! Every mounted widget owns one refresher task. The task ticks once per
//! second, counting down from the refresh interval; at zero it fetches the
//! widget's data and starts over. A manual refresh fetches immediately and
//! restarts the countdown. Refreshers share nothing with each other.
//!
//! Fetches run in their own tasks so a slow data source never stalls the
//! countdown. Overlapping fetches for one widget are allowed; each carries a
//! sequence number and only a response newer than the last applied one is
//! kept. Responses for a previous period, or for an unmounted widget, are
//! dropped.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use crate::error::{DashboardError, WidgetError};
use crate::feed::{self, MarketDataSource, WidgetData};
use crate::types::{Period, Widget, WidgetId, WidgetKind};

/// Default refresh interval (60 seconds)
pub const DEFAULT_INTERVAL_SECS: u32 = 60;

const TICK: Duration = Duration::from_secs(1);

/// Countdown gauge colour band
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum GaugeColor {
    Green,
    Yellow,
    Red,
}

/// Countdown between refreshes, advanced one second per tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefreshCountdown {
    interval: u32,
    remaining: u32,
}

impl RefreshCountdown {
    pub fn new(interval_secs: u32) -> Self {
        let interval = interval_secs.max(1);
        Self {
            interval,
            remaining: interval,
        }
    }

    /// Advance one second. Returns true when a refresh is due, in which
    /// case the countdown has already restarted.
    pub fn tick(&mut self) -> bool {
        if self.remaining <= 1 {
            self.remaining = self.interval;
            true
        } else {
            self.remaining -= 1;
            false
        }
    }

    /// Restart from the full interval (manual refresh, period change).
    pub fn reset(&mut self) {
        self.remaining = self.interval;
    }

    pub fn remaining(&self) -> u32 {
        self.remaining
    }

    pub fn interval(&self) -> u32 {
        self.interval
    }

    /// Fraction of the interval still to go, in `(0, 1]`.
    pub fn progress(&self) -> f64 {
        self.remaining as f64 / self.interval as f64
    }

    pub fn gauge_color(&self) -> GaugeColor {
        let progress = self.progress();
        if progress > 0.5 {
            GaugeColor::Green
        } else if progress > 0.2 {
            GaugeColor::Yellow
        } else {
            GaugeColor::Red
        }
    }
}

/// What the widget card renders.
#[derive(Debug, Clone)]
pub struct RefreshState {
    pub widget_id: WidgetId,
    pub period: Period,
    pub countdown: RefreshCountdown,
    pub data: Option<WidgetData>,
    /// Inline error shown in place of the chart
    pub error: Option<WidgetError>,
    pub last_updated: Option<DateTime<Utc>>,
}

struct Slot {
    view: RefreshState,
    /// Bumped on period change; responses from older generations are dropped
    generation: u64,
    issued: u64,
    applied: u64,
}

/// Read-only view of a refresher's state, cloneable for the presentation layer.
#[derive(Clone)]
pub struct RefreshWatch {
    slot: Arc<Mutex<Slot>>,
    alive: Arc<AtomicBool>,
}

impl RefreshWatch {
    pub fn snapshot(&self) -> RefreshState {
        self.slot.lock().view.clone()
    }

    pub fn remaining(&self) -> u32 {
        self.slot.lock().view.countdown.remaining()
    }

    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct RefreshOptions {
    pub interval_secs: u32,
    /// Fetch as soon as the widget mounts
    pub fetch_on_mount: bool,
}

impl Default for RefreshOptions {
    fn default() -> Self {
        Self {
            interval_secs: DEFAULT_INTERVAL_SECS,
            fetch_on_mount: true,
        }
    }
}

#[derive(Debug)]
enum Command {
    RefreshNow,
    SetPeriod(Period),
}

/// Owning handle of one widget's refresher. Dropping it stops the timer
/// and discards any response still in flight.
pub struct RefreshHandle {
    widget_id: WidgetId,
    commands: mpsc::UnboundedSender<Command>,
    watch: RefreshWatch,
    task: JoinHandle<()>,
}

impl RefreshHandle {
    /// Mount a refresher for `widget`. Must be called within a tokio runtime.
    pub fn spawn(
        widget: &Widget,
        period: Period,
        source: Arc<dyn MarketDataSource>,
        options: RefreshOptions,
    ) -> Self {
        let countdown = RefreshCountdown::new(options.interval_secs);
        let slot = Arc::new(Mutex::new(Slot {
            view: RefreshState {
                widget_id: widget.id,
                period,
                countdown,
                data: None,
                error: None,
                last_updated: None,
            },
            generation: 0,
            issued: 0,
            applied: 0,
        }));
        let alive = Arc::new(AtomicBool::new(true));
        let watch = RefreshWatch { slot, alive };

        let (tx, rx) = mpsc::unbounded_channel();
        let refresher = Refresher {
            widget_id: widget.id,
            kind: widget.kind.clone(),
            period,
            countdown,
            source,
            watch: watch.clone(),
        };
        let task = tokio::spawn(refresher.run(rx, options.fetch_on_mount));

        log::debug!(
            "Refresh: mounted widget {} ({}, every {}s)",
            widget.id,
            widget.kind,
            countdown.interval()
        );

        Self {
            widget_id: widget.id,
            commands: tx,
            watch,
            task,
        }
    }

    pub fn widget_id(&self) -> WidgetId {
        self.widget_id
    }

    /// Fetch now and restart the countdown.
    pub fn refresh_now(&self) {
        let _ = self.commands.send(Command::RefreshNow);
    }

    /// Switch period: restarts the countdown and fetches for the new period.
    pub fn set_period(&self, period: Period) {
        let _ = self.commands.send(Command::SetPeriod(period));
    }

    pub fn watch(&self) -> RefreshWatch {
        self.watch.clone()
    }

    pub fn snapshot(&self) -> RefreshState {
        self.watch.snapshot()
    }
}

impl Drop for RefreshHandle {
    fn drop(&mut self) {
        self.watch.alive.store(false, Ordering::SeqCst);
        self.task.abort();
        log::debug!("Refresh: unmounted widget {}", self.widget_id);
    }
}

struct Refresher {
    widget_id: WidgetId,
    kind: WidgetKind,
    period: Period,
    countdown: RefreshCountdown,
    source: Arc<dyn MarketDataSource>,
    watch: RefreshWatch,
}

impl Refresher {
    async fn run(mut self, mut commands: mpsc::UnboundedReceiver<Command>, fetch_on_mount: bool) {
        let mut ticker = tokio::time::interval_at(Instant::now() + TICK, TICK);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        if fetch_on_mount {
            self.start_fetch();
        }

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let due = self.countdown.tick();
                    self.publish_countdown();
                    if due {
                        self.start_fetch();
                    }
                }
                command = commands.recv() => match command {
                    Some(Command::RefreshNow) => {
                        log::debug!("Refresh: manual refresh of widget {}", self.widget_id);
                        self.countdown.reset();
                        ticker.reset();
                        self.publish_countdown();
                        self.start_fetch();
                    }
                    Some(Command::SetPeriod(period)) => {
                        log::debug!(
                            "Refresh: widget {} period {} -> {}",
                            self.widget_id,
                            self.period,
                            period
                        );
                        self.period = period;
                        self.countdown.reset();
                        ticker.reset();
                        {
                            let mut slot = self.watch.slot.lock();
                            slot.generation += 1;
                            slot.view.period = period;
                            slot.view.countdown = self.countdown;
                        }
                        self.start_fetch();
                    }
                    None => break,
                },
            }
        }
    }

    fn publish_countdown(&self) {
        self.watch.slot.lock().view.countdown = self.countdown;
    }

    fn start_fetch(&self) {
        let (seq, generation) = {
            let mut slot = self.watch.slot.lock();
            slot.issued += 1;
            (slot.issued, slot.generation)
        };

        let widget_id = self.widget_id;
        let kind = self.kind.clone();
        let period = self.period;
        let source = Arc::clone(&self.source);
        let watch = self.watch.clone();

        tokio::spawn(async move {
            let result = feed::fetch_for(source.as_ref(), &kind, period).await;

            if !watch.is_alive() {
                log::debug!("Refresh: widget {} unmounted, response dropped", widget_id);
                return;
            }

            let mut slot = watch.slot.lock();
            if slot.generation != generation || seq < slot.applied {
                log::debug!(
                    "Refresh: stale response #{} for widget {} dropped",
                    seq,
                    widget_id
                );
                return;
            }
            slot.applied = seq;

            match result {
                Ok(data) => {
                    slot.view.data = Some(data);
                    slot.view.error = None;
                    slot.view.last_updated = Some(Utc::now());
                }
                Err(e) => {
                    let err = DashboardError::FetchFailed(e);
                    log::warn!("Refresh: widget {}: {}", widget_id, err);
                    slot.view.error = Some(WidgetError::from(&err));
                }
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::testing::{call_number, ScriptedSource};
    use crate::grid;
    use crate::types::{Rectangle, WidgetConfig};

    fn widget(kind: WidgetKind) -> Widget {
        Widget {
            id: 1,
            name: "Gold".into(),
            kind,
            config: WidgetConfig::default(),
            layout: Rectangle::new(grid::widget_key(1), 0, 0, 3, 3),
            created_at: Utc::now(),
            updated_at: None,
        }
    }

    fn quiet() -> RefreshOptions {
        RefreshOptions {
            interval_secs: 60,
            fetch_on_mount: false,
        }
    }

    async fn advance(ms: u64) {
        tokio::time::sleep(Duration::from_millis(ms)).await;
    }

    #[test]
    fn test_countdown_fires_once_per_interval() {
        let mut countdown = RefreshCountdown::new(60);
        let fired = (0..60).filter(|_| countdown.tick()).count();
        assert_eq!(fired, 1);
        assert_eq!(countdown.remaining(), 60);
    }

    #[test]
    fn test_manual_reset_postpones_scheduled_fire() {
        let mut countdown = RefreshCountdown::new(60);
        for _ in 0..20 {
            assert!(!countdown.tick());
        }
        assert_eq!(countdown.remaining(), 40);

        countdown.reset();
        // The originally scheduled fire would have been 40 ticks away.
        for _ in 0..40 {
            assert!(!countdown.tick());
        }
        assert_eq!(countdown.remaining(), 20);
    }

    #[test]
    fn test_gauge_colours() {
        let mut countdown = RefreshCountdown::new(10);
        assert_eq!(countdown.gauge_color(), GaugeColor::Green);
        for _ in 0..5 {
            countdown.tick();
        }
        assert_eq!(countdown.gauge_color(), GaugeColor::Yellow);
        for _ in 0..3 {
            countdown.tick();
        }
        assert_eq!(countdown.gauge_color(), GaugeColor::Red);
        assert!((countdown.progress() - 0.2).abs() < f64::EPSILON);
    }

    #[test]
    fn test_zero_interval_is_one_second() {
        let mut countdown = RefreshCountdown::new(0);
        assert_eq!(countdown.interval(), 1);
        assert!(countdown.tick());
    }

    #[tokio::test(start_paused = true)]
    async fn test_sixty_ticks_fetch_once() {
        let source = Arc::new(ScriptedSource::default());
        let handle = RefreshHandle::spawn(
            &widget(WidgetKind::InternationalGold),
            Period::Month,
            source.clone(),
            quiet(),
        );

        advance(59_500).await;
        assert_eq!(source.calls(), 0);
        assert_eq!(handle.watch().remaining(), 1);

        advance(1_000).await;
        assert_eq!(source.calls(), 1);
        assert_eq!(handle.watch().remaining(), 60);
        assert!(handle.snapshot().data.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_manual_trigger_resets_without_double_fire() {
        let source = Arc::new(ScriptedSource::default());
        let handle = RefreshHandle::spawn(
            &widget(WidgetKind::KrxGold),
            Period::Month,
            source.clone(),
            quiet(),
        );

        advance(20_500).await;
        assert_eq!(handle.watch().remaining(), 40);

        handle.refresh_now();
        advance(1).await;
        assert_eq!(source.calls(), 1);
        assert_eq!(handle.watch().remaining(), 60);

        // Past the originally scheduled time: no second fetch.
        advance(39_499).await;
        assert_eq!(source.calls(), 1);
        assert_eq!(handle.watch().remaining(), 21);

        advance(21_000).await;
        assert_eq!(source.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_mount_fetches_immediately() {
        let source = Arc::new(ScriptedSource::default());
        let handle = RefreshHandle::spawn(
            &widget(WidgetKind::KimchiPremium),
            Period::Week,
            source.clone(),
            RefreshOptions::default(),
        );

        advance(1).await;
        assert_eq!(source.calls(), 1);
        assert!(matches!(handle.snapshot().data, Some(WidgetData::Premium(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_sets_error_and_next_tick_retries() {
        let source = Arc::new(ScriptedSource::default());
        source.set_failing(true);
        let handle = RefreshHandle::spawn(
            &widget(WidgetKind::InternationalGold),
            Period::Month,
            source.clone(),
            RefreshOptions::default(),
        );

        advance(1).await;
        let state = handle.snapshot();
        assert!(state.data.is_none());
        assert!(state.error.as_ref().unwrap().can_retry);

        source.set_failing(false);
        advance(60_000).await;
        let state = handle.snapshot();
        assert_eq!(source.calls(), 2);
        assert!(state.error.is_none());
        assert!(state.data.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_late_earlier_response_is_discarded() {
        let source = Arc::new(ScriptedSource::default());
        source.push_delay(Duration::from_secs(5));
        let handle = RefreshHandle::spawn(
            &widget(WidgetKind::InternationalGold),
            Period::Month,
            source.clone(),
            RefreshOptions::default(),
        );

        advance(500).await;
        handle.refresh_now();
        advance(500).await;
        assert_eq!(call_number(handle.snapshot().data.as_ref().unwrap()), 2);

        // The slow first response lands now and must not overwrite #2.
        advance(5_000).await;
        assert_eq!(source.calls(), 2);
        assert_eq!(call_number(handle.snapshot().data.as_ref().unwrap()), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_period_change_drops_old_period_response() {
        let source = Arc::new(ScriptedSource::default());
        source.push_delay(Duration::from_secs(3));
        source.push_delay(Duration::from_secs(10));
        let handle = RefreshHandle::spawn(
            &widget(WidgetKind::KrxGold),
            Period::Month,
            source.clone(),
            RefreshOptions::default(),
        );

        advance(500).await;
        handle.set_period(Period::Year);
        advance(4_800).await;
        let state = handle.snapshot();
        assert_eq!(state.period, Period::Year);
        assert!(state.data.is_none());
        assert_eq!(state.countdown.remaining(), 56);

        advance(6_000).await;
        assert_eq!(call_number(handle.snapshot().data.as_ref().unwrap()), 2);
        assert_eq!(*source.periods.lock(), vec![Period::Month, Period::Year]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unmount_stops_timer_and_drops_in_flight_response() {
        let source = Arc::new(ScriptedSource::default());
        source.push_delay(Duration::from_secs(2));
        let handle = RefreshHandle::spawn(
            &widget(WidgetKind::InternationalGold),
            Period::Month,
            source.clone(),
            RefreshOptions::default(),
        );
        let watch = handle.watch();

        advance(500).await;
        drop(handle);
        advance(120_000).await;

        assert!(!watch.is_alive());
        assert_eq!(source.calls(), 1);
        assert!(watch.snapshot().data.is_none());
    }
}
