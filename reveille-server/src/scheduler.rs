//! Wakeup-window scheduler.
//!
//! A single long-lived task polls the preference store on a fixed
//! interval, computes the time left until the next occurrence of the
//! configured wakeup time, and hands off to the alarm state machine once
//! inside the wakeup window. The countdown between entering the window
//! and actually ringing is deliberately immune to preference edits; only
//! daemon shutdown can interrupt it.

use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::alarm::AlarmStateMachine;
use crate::clock::{Clock, SECONDS_PER_DAY, TimeOfDay};
use crate::store::PreferenceStore;
use crate::tracing::prelude::*;

pub struct Scheduler {
    store: PreferenceStore,
    clock: Box<dyn Clock>,
    alarm: AlarmStateMachine,
    poll_interval: Duration,
}

impl Scheduler {
    pub fn new(
        store: PreferenceStore,
        clock: Box<dyn Clock>,
        alarm: AlarmStateMachine,
        poll_interval: Duration,
    ) -> Self {
        Self {
            store,
            clock,
            alarm,
            poll_interval,
        }
    }

    pub async fn run(mut self, running: CancellationToken) {
        trace!("scheduler task started");
        let mut interval = tokio::time::interval(self.poll_interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = running.cancelled() => break,
                _ = interval.tick() => self.tick(&running).await,
            }
        }
        trace!("scheduler task stopped");
    }

    async fn tick(&mut self, running: &CancellationToken) {
        let prefs = self.store.snapshot();
        if !prefs.active_state {
            return;
        }

        let now = self.clock.now_local(prefs.utc_offset);
        let seconds_left = seconds_until(now, prefs.wakeup_hour, prefs.wakeup_minute);
        debug!(
            seconds_left,
            wakeup_hour = prefs.wakeup_hour,
            wakeup_minute = prefs.wakeup_minute,
            "minutes until wakeup: {}",
            seconds_left / 60
        );

        // A window of zero only fires on the tick where seconds_left is
        // exactly zero, so it can slip through between polls. Keep the
        // poll interval at or below the tightest window in use.
        if seconds_left > u64::from(prefs.wakeup_window) * 60 {
            return;
        }

        info!(seconds_left, "entered wakeup window, counting down");
        tokio::select! {
            _ = running.cancelled() => return,
            _ = tokio::time::sleep(Duration::from_secs(seconds_left)) => {}
        }
        self.alarm.enter_ringing(running).await;
    }
}

/// Seconds until the next occurrence of `hour:minute`, today or
/// tomorrow. Zero when that time is exactly now.
fn seconds_until(now: TimeOfDay, hour: u8, minute: u8) -> u64 {
    let wakeup = (i64::from(hour) * 60 + i64::from(minute)) * 60;
    (wakeup - i64::from(now.seconds_of_day())).rem_euclid(SECONDS_PER_DAY) as u64
}
