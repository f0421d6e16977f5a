//! Alarm state and the ringing loop.
//!
//! The ringing flag lives in a watch channel so the ring loop wakes the
//! moment a silence command lands, rather than at the next duty-cycle
//! boundary. Everything that flips the flag goes through [`AlarmState`];
//! the loop itself runs inside the scheduler task via
//! [`AlarmStateMachine::enter_ringing`].

use std::io;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::store::{PrefField, PreferenceStore};
use crate::tracing::prelude::*;

/// Shared handle to the ringing flag. Cloning is cheap.
#[derive(Clone)]
pub struct AlarmState {
    tx: Arc<watch::Sender<bool>>,
}

impl AlarmState {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    pub fn is_ringing(&self) -> bool {
        *self.tx.borrow()
    }

    pub fn set_ringing(&self, ringing: bool) {
        self.tx.send_replace(ringing);
    }

    /// Stop the alarm. A no-op when already idle.
    pub fn silence(&self) {
        self.set_ringing(false);
    }

    fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }
}

impl Default for AlarmState {
    fn default() -> Self {
        Self::new()
    }
}

/// On/off capability of the physical sounder.
#[async_trait]
pub trait Buzzer: Send + Sync {
    async fn on(&mut self) -> io::Result<()>;
    async fn off(&mut self) -> io::Result<()>;
}

/// Software stand-in that only logs. Wire a GPIO- or serial-backed
/// implementation here on real hardware.
pub struct LogBuzzer;

#[async_trait]
impl Buzzer for LogBuzzer {
    async fn on(&mut self) -> io::Result<()> {
        info!("buzzer on");
        Ok(())
    }

    async fn off(&mut self) -> io::Result<()> {
        info!("buzzer off");
        Ok(())
    }
}

/// Owns the ringing phase: drive the buzzer on a duty cycle until the
/// flag flips false, then force the buzzer off and disarm.
pub struct AlarmStateMachine {
    state: AlarmState,
    buzzer: Box<dyn Buzzer>,
    store: PreferenceStore,
    ring_cycle: Duration,
}

impl AlarmStateMachine {
    pub fn new(
        state: AlarmState,
        buzzer: Box<dyn Buzzer>,
        store: PreferenceStore,
        ring_cycle: Duration,
    ) -> Self {
        Self {
            state,
            buzzer,
            store,
            ring_cycle,
        }
    }

    /// Ring until silenced (or the daemon shuts down).
    ///
    /// Actuator errors are logged and the loop keeps toggling; a broken
    /// buzzer must not end the ringing phase on its own. On a normal
    /// (silenced) exit the active flag is cleared so the alarm does not
    /// re-arm for the same day. Shutdown exits leave it set.
    pub async fn enter_ringing(&mut self, running: &CancellationToken) {
        self.state.set_ringing(true);
        let mut ringing_rx = self.state.subscribe();
        info!("wakeup time reached, sounding alarm");

        let silenced = loop {
            if let Err(e) = self.buzzer.on().await {
                warn!(error = %e, "buzzer refused to switch on");
            }
            match self.wait_half_cycle(&mut ringing_rx, running).await {
                Wait::Elapsed => {}
                Wait::Silenced => break true,
                Wait::Cancelled => break false,
            }
            if let Err(e) = self.buzzer.off().await {
                warn!(error = %e, "buzzer refused to switch off");
            }
            match self.wait_half_cycle(&mut ringing_rx, running).await {
                Wait::Elapsed => {}
                Wait::Silenced => break true,
                Wait::Cancelled => break false,
            }
        };

        if let Err(e) = self.buzzer.off().await {
            warn!(error = %e, "buzzer refused to switch off");
        }
        self.state.set_ringing(false);

        if silenced {
            info!("alarm silenced, disarming");
            if let Err(e) = self.store.set(PrefField::ActiveState, 0) {
                warn!(error = %e, "could not clear the active flag");
            }
        } else {
            debug!("ringing interrupted by shutdown");
        }
    }

    async fn wait_half_cycle(
        &self,
        ringing_rx: &mut watch::Receiver<bool>,
        running: &CancellationToken,
    ) -> Wait {
        tokio::select! {
            _ = running.cancelled() => Wait::Cancelled,
            changed = ringing_rx.changed() => match changed {
                Ok(()) if *ringing_rx.borrow_and_update() => Wait::Elapsed,
                _ => Wait::Silenced,
            },
            _ = tokio::time::sleep(self.ring_cycle) => Wait::Elapsed,
        }
    }
}

enum Wait {
    Elapsed,
    Silenced,
    Cancelled,
}

#[cfg(test)]
mod tests {
    use parking_lot::Mutex;

    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum BuzzerEvent {
        On,
        Off,
    }

    /// Records every toggle so tests can assert on the sequence.
    struct RecordingBuzzer {
        events: Arc<Mutex<Vec<BuzzerEvent>>>,
    }

    impl RecordingBuzzer {
        fn new() -> (Self, Arc<Mutex<Vec<BuzzerEvent>>>) {
            let events = Arc::new(Mutex::new(Vec::new()));
            (
                Self {
                    events: events.clone(),
                },
                events,
            )
        }
    }

    #[async_trait]
    impl Buzzer for RecordingBuzzer {
        async fn on(&mut self) -> io::Result<()> {
            self.events.lock().push(BuzzerEvent::On);
            Ok(())
        }

        async fn off(&mut self) -> io::Result<()> {
            self.events.lock().push(BuzzerEvent::Off);
            Ok(())
        }
    }

    #[test]
    fn silence_is_idempotent_from_idle() {
        let alarm = AlarmState::new();
        alarm.silence();
        assert!(!alarm.is_ringing());
        alarm.silence();
        assert!(!alarm.is_ringing());
    }

    #[tokio::test(start_paused = true)]
    async fn ringing_stops_when_silenced() {
        let store = PreferenceStore::in_memory();
        store.set(PrefField::ActiveState, 1).unwrap();
        let alarm = AlarmState::new();
        let (buzzer, events) = RecordingBuzzer::new();
        let mut machine = AlarmStateMachine::new(
            alarm.clone(),
            Box::new(buzzer),
            store.clone(),
            Duration::from_secs(1),
        );

        let running = CancellationToken::new();
        let token = running.clone();
        let handle = tokio::spawn(async move { machine.enter_ringing(&token).await });

        let mut rx = alarm.subscribe();
        rx.wait_for(|ringing| *ringing).await.unwrap();
        alarm.silence();
        handle.await.unwrap();

        assert!(!alarm.is_ringing());
        assert!(!store.snapshot().active_state, "ring exit must disarm");
        let events = events.lock();
        assert_eq!(*events.last().unwrap(), BuzzerEvent::Off);
        assert_eq!(*events.first().unwrap(), BuzzerEvent::On);
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_interrupts_ringing_without_disarming() {
        let store = PreferenceStore::in_memory();
        store.set(PrefField::ActiveState, 1).unwrap();
        let alarm = AlarmState::new();
        let (buzzer, events) = RecordingBuzzer::new();
        let mut machine = AlarmStateMachine::new(
            alarm.clone(),
            Box::new(buzzer),
            store.clone(),
            Duration::from_secs(1),
        );

        let running = CancellationToken::new();
        let token = running.clone();
        let handle = tokio::spawn(async move { machine.enter_ringing(&token).await });

        let mut rx = alarm.subscribe();
        rx.wait_for(|ringing| *ringing).await.unwrap();
        running.cancel();
        handle.await.unwrap();

        assert!(!alarm.is_ringing());
        assert!(store.snapshot().active_state, "shutdown must not disarm");
        assert_eq!(*events.lock().last().unwrap(), BuzzerEvent::Off);
    }
}
