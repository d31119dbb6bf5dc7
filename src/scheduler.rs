//! Timetable-driven run scheduler with an overlap guard.
//!
//! A run starts immediately at startup and then whenever a timetable slot
//! comes due. At most one run is in flight: a trigger that arrives while a
//! run is active is skipped, not queued. Run errors and panics are logged
//! and never take the loop down.

use std::collections::BTreeSet;
use std::error::Error;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use chrono::{Local, NaiveDateTime, NaiveTime, TimeDelta};
use futures::FutureExt;
use tokio::time::{MissedTickBehavior, interval};
use tracing::{debug, error, info, instrument, warn};

use crate::utils::panic_message;

/// Local wall-clock times at which a run is due.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Timetable {
    slots: BTreeSet<NaiveTime>,
}

impl Timetable {
    pub fn new(slots: impl IntoIterator<Item = NaiveTime>) -> Self {
        Self {
            slots: slots.into_iter().collect(),
        }
    }

    /// Every `:00` and `:30` from 09:00 through 22:30, plus 07:00, 12:00,
    /// 19:00 and 23:00.
    pub fn standard() -> Self {
        let half_hours = (9..=22).flat_map(|h| [(h, 0), (h, 30)]);
        let extras = [(7, 0), (12, 0), (19, 0), (23, 0)];
        Self::new(
            half_hours
                .chain(extras)
                .filter_map(|(h, m)| NaiveTime::from_hms_opt(h, m, 0)),
        )
    }

    pub fn slots(&self) -> impl Iterator<Item = &NaiveTime> {
        self.slots.iter()
    }

    /// Slot instants in `(prev, now]`, oldest first.
    ///
    /// Gaps longer than a day are clamped to the last day.
    pub fn due_between(&self, prev: NaiveDateTime, now: NaiveDateTime) -> Vec<NaiveDateTime> {
        if now <= prev {
            return Vec::new();
        }
        let prev = prev.max(now - TimeDelta::days(1));

        let mut due = Vec::new();
        let mut day = prev.date();
        while day <= now.date() {
            for slot in &self.slots {
                let at = day.and_time(*slot);
                if at > prev && at <= now {
                    due.push(at);
                }
            }
            match day.succ_opt() {
                Some(next) => day = next,
                None => break,
            }
        }
        due
    }
}

/// Whether a run is in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    Running,
}

/// Single-flight flag. [`OverlapGuard::try_begin`] is one compare-and-swap.
#[derive(Debug, Default)]
pub struct OverlapGuard {
    running: AtomicBool,
}

/// Held for the duration of a run; dropping it (also while unwinding)
/// returns the guard to [`RunState::Idle`].
#[derive(Debug)]
pub struct RunPermit<'a> {
    flag: &'a AtomicBool,
}

impl Drop for RunPermit<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

impl OverlapGuard {
    pub fn try_begin(&self) -> Option<RunPermit<'_>> {
        self.running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| RunPermit {
                flag: &self.running,
            })
    }

    pub fn state(&self) -> RunState {
        if self.running.load(Ordering::Acquire) {
            RunState::Running
        } else {
            RunState::Idle
        }
    }
}

/// How a trigger ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerOutcome {
    Completed,
    Failed,
    Panicked,
    /// Another run was in flight.
    Skipped,
}

/// What a scheduler loop did before it stopped.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SchedulerReport {
    /// Runs attempted, the startup run included.
    pub runs: usize,
    /// Slots that came due while a run was in flight.
    pub missed_slots: usize,
}

type Clock = Arc<dyn Fn() -> NaiveDateTime + Send + Sync>;

pub struct Scheduler {
    timetable: Timetable,
    guard: OverlapGuard,
    poll_interval: Duration,
    clock: Clock,
}

impl Scheduler {
    pub fn new(timetable: Timetable, poll_interval: Duration) -> Self {
        Self {
            timetable,
            guard: OverlapGuard::default(),
            poll_interval,
            clock: Arc::new(|| Local::now().naive_local()),
        }
    }

    #[cfg(test)]
    fn with_clock(mut self, clock: impl Fn() -> NaiveDateTime + Send + Sync + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    pub fn state(&self) -> RunState {
        self.guard.state()
    }

    /// Run `job` unless a run is already in flight.
    #[instrument(level = "info", skip(self, job))]
    pub async fn trigger<F, Fut, T>(&self, reason: &str, job: F) -> TriggerOutcome
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, Box<dyn Error>>>,
    {
        let Some(_permit) = self.guard.try_begin() else {
            warn!("Previous run still in progress; skipping");
            return TriggerOutcome::Skipped;
        };

        info!("Run started");
        match AssertUnwindSafe(job()).catch_unwind().await {
            Ok(Ok(_)) => {
                info!("Run finished");
                TriggerOutcome::Completed
            }
            Ok(Err(e)) => {
                error!(error = %e, "Run failed");
                TriggerOutcome::Failed
            }
            Err(payload) => {
                error!(panic = %panic_message(payload.as_ref()), "Run panicked");
                TriggerOutcome::Panicked
            }
        }
    }

    /// Slots in `(from, to]` could not fire because a run was in flight.
    fn log_missed(&self, from: NaiveDateTime, to: NaiveDateTime) -> usize {
        let missed = self.timetable.due_between(from, to);
        for slot in &missed {
            warn!(slot = %slot.format("%H:%M"), "Slot came due during a run; skipped");
        }
        missed.len()
    }

    /// Run once now, then on every due slot until `shutdown` resolves.
    ///
    /// `shutdown` is polled once before the startup run, so listeners such
    /// as `ctrl_c` are installed while it executes. After that it is only
    /// observed between ticks, and an in-flight run always finishes.
    pub async fn run_until<F, Fut, T, S>(&self, mut job: F, shutdown: S) -> SchedulerReport
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, Box<dyn Error>>>,
        S: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        let slots: Vec<String> = self.timetable.slots().map(|t| t.format("%H:%M").to_string()).collect();
        info!(?slots, poll_secs = self.poll_interval.as_secs(), "Scheduler started");

        let stop_early = futures::poll!(&mut shutdown).is_ready();
        let mut report = SchedulerReport {
            runs: 1,
            missed_slots: 0,
        };
        let started = (self.clock)();
        self.trigger("startup", &mut job).await;
        let mut last = (self.clock)();
        report.missed_slots += self.log_missed(started, last);

        if stop_early {
            info!("Shutdown requested before startup run; scheduler stopping");
            return report;
        }

        let mut ticker = interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        ticker.tick().await;

        loop {
            tokio::select! {
                biased;
                _ = &mut shutdown => {
                    info!("Shutdown requested; scheduler stopping");
                    break;
                }
                _ = ticker.tick() => {}
            }

            let now = (self.clock)();
            debug!(%now, state = ?self.state(), "Scheduler tick");
            let Some(slot) = self.timetable.due_between(last, now).pop() else {
                last = now;
                continue;
            };

            report.runs += 1;
            let reason = format!("slot {}", slot.format("%H:%M"));
            self.trigger(&reason, &mut job).await;

            let finished = (self.clock)();
            report.missed_slots += self.log_missed(now, finished);
            last = finished;
        }
        report
    }
}
