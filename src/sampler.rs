use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use log::{debug, info, warn};
use tokio::runtime::Handle;
use tokio::sync::mpsc::{self, error::TrySendError};

use crate::prober::Prober;
use crate::sample::{Sample, SampleEvent, SampleLog};
use crate::stats::{self, StatsSnapshot};
use crate::timer::{self, TimerHandle};

#[derive(Debug, Clone)]
pub struct SamplerSettings {
    /// Pause between one probe settling and the next one starting.
    pub interval: Duration,
    /// Size of the trailing window behind [`Sampler::recent`].
    pub window_size: usize,
    /// Capacity of each subscriber channel.
    pub event_capacity: usize,
}

impl Default for SamplerSettings {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(1000),
            window_size: stats::DEFAULT_WINDOW,
            event_capacity: 64,
        }
    }
}

/// Consistent read of the sampler taken under a single lock.
#[derive(Debug, Clone)]
pub struct SamplerView {
    pub running: bool,
    pub recent: Vec<Sample>,
    pub stats: StatsSnapshot,
    pub recent_stats: StatsSnapshot,
}

/// Drives a [`Prober`] on a fixed cadence, one probe at a time.
///
/// Cloning yields another handle to the same loop. Once the last handle is
/// dropped the pending timer is cancelled and no further probes are issued.
#[derive(Clone)]
pub struct Sampler {
    inner: Arc<Inner>,
}

struct Inner {
    prober: Mutex<Arc<dyn Prober>>,
    runtime: Handle,
    settings: SamplerSettings,
    state: Mutex<LoopState>,
    // Held for the duration of a probe.
    in_flight: tokio::sync::Mutex<()>,
}

#[derive(Default)]
struct LoopState {
    running: bool,
    session: u64,
    pending: Option<TimerHandle>,
    log: SampleLog,
    subscribers: Vec<mpsc::Sender<SampleEvent>>,
}

impl LoopState {
    fn is_active(&self, session: u64) -> bool {
        self.running && self.session == session
    }

    fn publish(&mut self, event: SampleEvent) {
        self.subscribers.retain(|tx| match tx.try_send(event) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                warn!("subscriber is lagging, dropped sample event {event:?}");
                true
            }
            Err(TrySendError::Closed(_)) => {
                debug!("subscriber went away");
                false
            }
        });
    }
}

impl Sampler {
    pub fn new(prober: Arc<dyn Prober>, settings: SamplerSettings, runtime: Handle) -> Self {
        Self {
            inner: Arc::new(Inner {
                prober: Mutex::new(prober),
                runtime,
                settings,
                state: Mutex::new(LoopState::default()),
                in_flight: tokio::sync::Mutex::new(()),
            }),
        }
    }

    /// Clears the log and starts probing immediately. No-op while running.
    pub fn start(&self) {
        let mut state = self.inner.lock_state();
        if state.running {
            debug!("sampler already running");
            return;
        }

        state.running = true;
        state.session += 1;
        state.log.reset();
        let session = state.session;
        state.pending = Some(self.inner.schedule_cycle(session, Duration::ZERO));
        info!("sampling started (session {session})");
    }

    /// Cancels the next scheduled probe. A probe already in flight still
    /// settles and is recorded, but nothing is scheduled after it.
    pub fn stop(&self) {
        let mut state = self.inner.lock_state();
        if !state.running {
            return;
        }

        state.running = false;
        if let Some(timer) = state.pending.take() {
            timer.cancel();
        }
        info!("sampling stopped after {} samples", state.log.len());
    }

    /// Replaces the probe target. Takes effect from the next cycle; a probe
    /// already in flight still finishes before the new target is contacted.
    pub fn set_prober(&self, prober: Arc<dyn Prober>) {
        *self.inner.prober.lock().unwrap_or_else(PoisonError::into_inner) = prober;
    }

    pub fn is_running(&self) -> bool {
        self.inner.lock_state().running
    }

    pub fn settings(&self) -> &SamplerSettings {
        &self.inner.settings
    }

    /// Registers a listener for every sample appended from now on.
    pub fn subscribe(&self) -> mpsc::Receiver<SampleEvent> {
        let (tx, rx) = mpsc::channel(self.inner.settings.event_capacity.max(1));
        self.inner.lock_state().subscribers.push(tx);
        rx
    }

    pub fn len(&self) -> usize {
        self.inner.lock_state().log.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn samples(&self) -> Vec<Sample> {
        self.inner.lock_state().log.as_slice().to_vec()
    }

    /// The trailing window of the log.
    pub fn recent(&self) -> Vec<Sample> {
        let state = self.inner.lock_state();
        state.log.window(self.inner.settings.window_size).to_vec()
    }

    pub fn stats(&self) -> StatsSnapshot {
        stats::compute_stats(self.inner.lock_state().log.as_slice())
    }

    pub fn recent_stats(&self) -> StatsSnapshot {
        let state = self.inner.lock_state();
        stats::compute_window_stats(state.log.as_slice(), self.inner.settings.window_size)
    }

    pub fn view(&self) -> SamplerView {
        let state = self.inner.lock_state();
        let window = state.log.window(self.inner.settings.window_size);
        SamplerView {
            running: state.running,
            recent: window.to_vec(),
            stats: stats::compute_stats(state.log.as_slice()),
            recent_stats: stats::compute_stats(window),
        }
    }
}

impl Inner {
    fn lock_state(&self) -> MutexGuard<'_, LoopState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn schedule_cycle(self: &Arc<Self>, session: u64, delay: Duration) -> TimerHandle {
        let weak = Arc::downgrade(self);
        timer::schedule(&self.runtime, delay, move || {
            if let Some(inner) = weak.upgrade() {
                let runtime = inner.runtime.clone();
                runtime.spawn(inner.run_cycle(session));
            }
        })
    }

    async fn run_cycle(self: Arc<Self>, session: u64) {
        let _in_flight = self.in_flight.lock().await;
        if !self.lock_state().is_active(session) {
            return;
        }

        let prober = self.prober.lock().unwrap_or_else(PoisonError::into_inner).clone();
        let latency = prober.probe().await;
        let sample = Sample::now(latency);

        let mut state = self.lock_state();
        if state.session != session {
            debug!("discarding {latency:?} from earlier session {session}");
            return;
        }

        let event = state.log.push(sample).to_event();
        debug!("sample #{}: {} ms", state.log.len(), event.latency_ms());
        state.publish(event);

        if state.running {
            state.pending = Some(self.schedule_cycle(session, self.settings.interval));
        }
    }
}
