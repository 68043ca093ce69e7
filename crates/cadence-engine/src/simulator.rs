//! The simulator kernel: lifecycle state machine and run loop.
//!
//! A [`Simulator`] is a cloneable handle over shared kernel state. All
//! public operations serialize through the kernel lock, so model
//! actions and external threads (UIs, experiment drivers) may call in
//! at any time. The run loop executes on the thread that calls
//! [`start`](Simulator::start), [`run_until`](Simulator::run_until) or
//! [`step`](Simulator::step); the kernel lock is released while an
//! event action runs, so actions re-enter the kernel through their
//! captured handle to schedule, cancel, or stop.
//!
//! # Ordering
//!
//! Events fire in `(time asc, priority desc, insertion seq asc)` order.
//! The warmup marker carries a priority above the model band and the
//! end-replication marker one below it, so at their instants warmup
//! precedes, and the end follows, every model event.

use std::cmp::Ordering as CmpOrdering;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use cadence_bus::{EventProducer, Payload};
use cadence_core::{
    EventError, EventHandle, EventList, SimEvent, SimTime, END_REPLICATION_PRIORITY, MAX_PRIORITY,
    MIN_PRIORITY, NORMAL_PRIORITY, WARMUP_PRIORITY,
};

use crate::error::SimulatorError;
use crate::events::{
    END_REPLICATION_EVENT, EVENTLIST_CHANGED_EVENT, START_EVENT, STOP_EVENT, TIME_CHANGED_EVENT,
    WARMUP_EVENT,
};
use crate::model::ModelRef;
use crate::replication::Replication;

// ── RunState ───────────────────────────────────────────────────────

/// Lifecycle state of the kernel.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RunState {
    /// Fresh kernel, no replication bound.
    Initial,
    /// Replication bound, clock at the start time.
    Initialized,
    /// A run was requested and is about to enter its loop.
    Starting,
    /// The run loop is dispatching events.
    Started,
    /// A stop was requested; the loop exits before the next event.
    Stopping,
    /// At rest between runs; `start` resumes.
    Stopped,
    /// The replication ended; the event list is empty.
    Ended,
}

impl RunState {
    /// True while a run is being set up or dispatching events.
    pub fn is_starting_or_running(self) -> bool {
        matches!(self, Self::Starting | Self::Started)
    }

    /// True while a stop is in progress or complete.
    pub fn is_stopping_or_stopped(self) -> bool {
        matches!(self, Self::Stopping | Self::Stopped)
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Initial => "initial",
            Self::Initialized => "initialized",
            Self::Starting => "starting",
            Self::Started => "started",
            Self::Stopping => "stopping",
            Self::Stopped => "stopped",
            Self::Ended => "ended",
        };
        write!(f, "{s}")
    }
}

// ── ErrorStrategy ──────────────────────────────────────────────────

/// What the kernel does when an event action fails.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ErrorStrategy {
    /// Log the fault and keep dispatching.
    LogAndContinue,
    /// Log the fault and pause the run (transition to stopping).
    #[default]
    WarnAndPause,
    /// Log the fault and end the replication.
    WarnAndEnd,
}

impl fmt::Display for ErrorStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::LogAndContinue => "log-and-continue",
            Self::WarnAndPause => "warn-and-pause",
            Self::WarnAndEnd => "warn-and-end",
        };
        write!(f, "{s}")
    }
}

// ── Kernel state ───────────────────────────────────────────────────

struct Kernel<T: SimTime> {
    sim_time: T,
    event_list: EventList<T>,
    run_state: RunState,
    replication: Option<Replication<T>>,
    error_strategy: ErrorStrategy,
    run_until_time: T,
    run_until_including: bool,
}

struct Shared<T: SimTime> {
    id: String,
    kernel: Mutex<Kernel<T>>,
    bus: EventProducer<T>,
    model: Mutex<Option<ModelRef<T>>>,
}

/// What the run loop decided to do with the lock held.
enum Next<T: SimTime> {
    Execute {
        event: SimEvent<T>,
        time_changed: bool,
    },
    Halt,
}

// ── Simulator ──────────────────────────────────────────────────────

/// Cloneable handle to one simulation kernel.
pub struct Simulator<T: SimTime> {
    shared: Arc<Shared<T>>,
}

// Handles must move freely between model actions and driver threads.
const _: () = {
    #[allow(dead_code)]
    fn assert_send_sync<X: Send + Sync>() {}
    #[allow(dead_code)]
    fn check() {
        assert_send_sync::<Simulator<cadence_core::Seconds>>();
        assert_send_sync::<Simulator<cadence_core::Ticks>>();
    }
};

impl<T: SimTime> Clone for Simulator<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T: SimTime> Simulator<T> {
    /// Create a kernel with the given id (used in logging).
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            shared: Arc::new(Shared {
                id: id.into(),
                kernel: Mutex::new(Kernel {
                    sim_time: T::ZERO,
                    event_list: EventList::new(),
                    run_state: RunState::Initial,
                    replication: None,
                    error_strategy: ErrorStrategy::default(),
                    run_until_time: T::ZERO,
                    run_until_including: true,
                }),
                bus: EventProducer::new(),
                model: Mutex::new(None),
            }),
        }
    }

    fn from_shared(shared: Arc<Shared<T>>) -> Self {
        Self { shared }
    }

    // A panicked driver thread must not wedge the kernel; recover the
    // guard and keep the state machine authoritative.
    fn kernel(&self) -> MutexGuard<'_, Kernel<T>> {
        self.shared
            .kernel
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    // ── Lifecycle ──────────────────────────────────────────────

    /// Bind a replication and a model, reset the clock to the start
    /// time, and schedule the warmup and end-replication markers.
    ///
    /// Clears any previous pending events, then calls the model's
    /// `construct_model` exactly once. Fails with
    /// [`SimulatorError::IllegalState`] while a run is starting or
    /// running.
    pub fn initialize(
        &self,
        model: ModelRef<T>,
        replication: Replication<T>,
    ) -> Result<(), SimulatorError> {
        {
            let mut k = self.kernel();
            // Check BEFORE clearing: a running kernel keeps its events.
            if k.run_state.is_starting_or_running() {
                return Err(SimulatorError::IllegalState {
                    operation: "initialize",
                    state: k.run_state,
                });
            }
            k.event_list.clear();
            k.sim_time = replication.start_time();

            let warmup = Arc::downgrade(&self.shared);
            k.event_list.insert(SimEvent::new(
                replication.warmup_time(),
                WARMUP_PRIORITY,
                move || {
                    if let Some(shared) = warmup.upgrade() {
                        Simulator::from_shared(shared).fire_warmup();
                    }
                    Ok(())
                },
            ));
            let end = Arc::downgrade(&self.shared);
            k.event_list.insert(SimEvent::new(
                replication.end_time(),
                END_REPLICATION_PRIORITY,
                move || {
                    if let Some(shared) = end.upgrade() {
                        Simulator::from_shared(shared).end_replication();
                    }
                    Ok(())
                },
            ));

            k.replication = Some(replication);
            k.run_state = RunState::Initialized;
        }
        *self
            .shared
            .model
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(Arc::clone(&model));
        self.shared
            .bus
            .fire_event(&EVENTLIST_CHANGED_EVENT, Payload::Empty);

        model
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .construct_model()
            .map_err(SimulatorError::ModelConstruction)
    }

    /// Run until the replication end, inclusive.
    ///
    /// Blocks the calling thread; other threads may schedule, cancel,
    /// or [`stop`](Simulator::stop) through their own handles while the
    /// loop runs. Requires an initialized or stopped kernel.
    pub fn start(&self) -> Result<(), SimulatorError> {
        let bound = {
            let k = self.kernel();
            let replication =
                k.replication
                    .as_ref()
                    .ok_or(SimulatorError::NotInitialized { operation: "start" })?;
            replication.end_time()
        };
        self.run_bounded("start", bound, true)
    }

    /// Run until `until`, exclusive or inclusive of events at the bound.
    ///
    /// When the bound is reached the clock is set to `until` and the
    /// kernel stops; with `including == false`, events at the bound
    /// stay pending.
    pub fn run_until(&self, until: T, including: bool) -> Result<(), SimulatorError> {
        self.run_bounded("run_until", until, including)
    }

    fn run_bounded(
        &self,
        operation: &'static str,
        until: T,
        including: bool,
    ) -> Result<(), SimulatorError> {
        {
            let mut k = self.kernel();
            match k.run_state {
                RunState::Initialized | RunState::Stopped => {}
                state => {
                    return Err(SimulatorError::IllegalState { operation, state });
                }
            }
            if k.replication.is_none() {
                return Err(SimulatorError::NotInitialized { operation });
            }
            if until < k.sim_time {
                return Err(SimulatorError::RunUntilInPast {
                    until: until.to_string(),
                    sim_time: k.sim_time.to_string(),
                });
            }
            k.run_until_time = until;
            k.run_until_including = including;
            k.run_state = RunState::Starting;
        }
        self.shared.bus.fire_event(&START_EVENT, Payload::Empty);
        self.run_loop();
        Ok(())
    }

    /// Single-event advance: pop the earliest event, advance the clock,
    /// execute. A no-op when the event list is empty.
    ///
    /// Requires an initialized or stopped kernel; leaves it stopped.
    pub fn step(&self) -> Result<(), SimulatorError> {
        let next = {
            let mut k = self.kernel();
            match k.run_state {
                RunState::Initialized | RunState::Stopped => {}
                state => {
                    return Err(SimulatorError::IllegalState {
                        operation: "step",
                        state,
                    });
                }
            }
            if k.replication.is_none() {
                return Err(SimulatorError::NotInitialized { operation: "step" });
            }
            match k.event_list.pop_first() {
                None => return Ok(()),
                Some(event) => {
                    k.run_state = RunState::Started;
                    let time_changed = event.time() != k.sim_time;
                    k.sim_time = event.time();
                    (event, time_changed)
                }
            }
        };

        let (mut event, time_changed) = next;
        if time_changed {
            self.shared
                .bus
                .fire_timed(&TIME_CHANGED_EVENT, Payload::Empty, event.time());
        }
        let result = event.execute();
        if let Err(fault) = result {
            self.apply_error_strategy(&fault);
        }

        let mut k = self.kernel();
        if matches!(k.run_state, RunState::Started | RunState::Stopping) {
            k.run_state = RunState::Stopped;
        }
        Ok(())
    }

    /// Request a pause. The loop exits before dispatching the next
    /// event. Fails unless a run is starting or running.
    pub fn stop(&self) -> Result<(), SimulatorError> {
        let mut k = self.kernel();
        if !k.run_state.is_starting_or_running() {
            return Err(SimulatorError::IllegalState {
                operation: "stop",
                state: k.run_state,
            });
        }
        k.run_state = RunState::Stopping;
        Ok(())
    }

    /// Clear all pending events and detach the replication and model,
    /// returning the kernel to its initial state. Frees the closures
    /// held by pending events of an abandoned run.
    pub fn cleanup(&self) {
        {
            let mut k = self.kernel();
            k.event_list.clear();
            k.replication = None;
            k.run_state = RunState::Initial;
            k.sim_time = T::ZERO;
        }
        *self
            .shared
            .model
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = None;
    }

    // ── Scheduling ─────────────────────────────────────────────

    /// Schedule an action at absolute time `time` with an explicit
    /// priority from the model band.
    pub fn schedule_event_abs(
        &self,
        time: T,
        priority: i16,
        action: impl FnOnce() -> Result<(), EventError> + Send + 'static,
    ) -> Result<EventHandle<T>, SimulatorError> {
        validate_priority(priority)?;
        let mut k = self.kernel();
        self.guard_schedulable(&k, "schedule_event_abs")?;
        insert_checked(&mut k, time, priority, action)
    }

    /// Schedule an action `delay` after the current simulation time.
    pub fn schedule_event_rel(
        &self,
        delay: T::Delta,
        priority: i16,
        action: impl FnOnce() -> Result<(), EventError> + Send + 'static,
    ) -> Result<EventHandle<T>, SimulatorError> {
        validate_priority(priority)?;
        let mut k = self.kernel();
        self.guard_schedulable(&k, "schedule_event_rel")?;
        let time = k.sim_time.checked_add(delay)?;
        insert_checked(&mut k, time, priority, action)
    }

    /// Schedule an action at the current simulation instant. It fires
    /// after events already popped, ordered against other same-time
    /// events by priority and insertion sequence.
    pub fn schedule_event_now(
        &self,
        priority: i16,
        action: impl FnOnce() -> Result<(), EventError> + Send + 'static,
    ) -> Result<EventHandle<T>, SimulatorError> {
        validate_priority(priority)?;
        let mut k = self.kernel();
        self.guard_schedulable(&k, "schedule_event_now")?;
        let time = k.sim_time;
        insert_checked(&mut k, time, priority, action)
    }

    /// [`schedule_event_abs`](Simulator::schedule_event_abs) at normal
    /// priority.
    pub fn schedule_abs(
        &self,
        time: T,
        action: impl FnOnce() -> Result<(), EventError> + Send + 'static,
    ) -> Result<EventHandle<T>, SimulatorError> {
        self.schedule_event_abs(time, NORMAL_PRIORITY, action)
    }

    /// [`schedule_event_rel`](Simulator::schedule_event_rel) at normal
    /// priority.
    pub fn schedule_rel(
        &self,
        delay: T::Delta,
        action: impl FnOnce() -> Result<(), EventError> + Send + 'static,
    ) -> Result<EventHandle<T>, SimulatorError> {
        self.schedule_event_rel(delay, NORMAL_PRIORITY, action)
    }

    /// [`schedule_event_now`](Simulator::schedule_event_now) at normal
    /// priority.
    pub fn schedule_now(
        &self,
        action: impl FnOnce() -> Result<(), EventError> + Send + 'static,
    ) -> Result<EventHandle<T>, SimulatorError> {
        self.schedule_event_now(NORMAL_PRIORITY, action)
    }

    /// Cancel a scheduled event. Idempotent: returns false when the
    /// event already executed or was already cancelled.
    pub fn cancel_event(&self, handle: &EventHandle<T>) -> bool {
        self.kernel().event_list.remove(handle)
    }

    fn guard_schedulable(
        &self,
        k: &Kernel<T>,
        operation: &'static str,
    ) -> Result<(), SimulatorError> {
        if k.replication.is_none() {
            return Err(SimulatorError::NotInitialized { operation });
        }
        if k.run_state == RunState::Ended {
            return Err(SimulatorError::IllegalState {
                operation,
                state: k.run_state,
            });
        }
        Ok(())
    }

    // ── Run loop ───────────────────────────────────────────────

    fn run_loop(&self) {
        {
            let mut k = self.kernel();
            if k.run_state == RunState::Starting {
                k.run_state = RunState::Started;
            }
        }

        loop {
            let next = {
                let mut k = self.kernel();
                if k.run_state != RunState::Started {
                    Next::Halt
                } else {
                    let within = k.event_list.first().map(|e| e.time()).is_some_and(|t| {
                        match t.cmp(&k.run_until_time) {
                            CmpOrdering::Less => true,
                            CmpOrdering::Equal => k.run_until_including,
                            CmpOrdering::Greater => false,
                        }
                    });
                    if !within {
                        // Exhausted or past the bound: park the clock at
                        // the bound and come to rest.
                        k.sim_time = k.run_until_time;
                        k.run_state = RunState::Stopping;
                        Next::Halt
                    } else {
                        match k.event_list.pop_first() {
                            Some(event) => {
                                let time_changed = event.time() != k.sim_time;
                                k.sim_time = event.time();
                                Next::Execute {
                                    event,
                                    time_changed,
                                }
                            }
                            None => Next::Halt,
                        }
                    }
                }
            };

            match next {
                Next::Halt => break,
                Next::Execute {
                    mut event,
                    time_changed,
                } => {
                    if time_changed {
                        self.shared
                            .bus
                            .fire_timed(&TIME_CHANGED_EVENT, Payload::Empty, event.time());
                    }
                    if let Err(fault) = event.execute() {
                        self.apply_error_strategy(&fault);
                    }
                }
            }
        }

        let stopped = {
            let mut k = self.kernel();
            if k.run_state == RunState::Stopping {
                k.run_state = RunState::Stopped;
                true
            } else {
                false
            }
        };
        if stopped {
            self.shared.bus.fire_event(&STOP_EVENT, Payload::Empty);
        }
    }

    fn apply_error_strategy(&self, fault: &EventError) {
        let strategy = self.kernel().error_strategy;
        match strategy {
            ErrorStrategy::LogAndContinue => {
                tracing::error!(simulator = %self.shared.id, %fault, "event failed; continuing");
            }
            ErrorStrategy::WarnAndPause => {
                tracing::warn!(simulator = %self.shared.id, %fault, "event failed; pausing");
                let mut k = self.kernel();
                if k.run_state == RunState::Started {
                    k.run_state = RunState::Stopping;
                }
            }
            ErrorStrategy::WarnAndEnd => {
                tracing::warn!(
                    simulator = %self.shared.id, %fault,
                    "event failed; ending replication"
                );
                self.end_replication();
            }
        }
    }

    fn fire_warmup(&self) {
        let t = self.kernel().sim_time;
        self.shared.bus.fire_timed(&WARMUP_EVENT, Payload::Empty, t);
    }

    fn end_replication(&self) {
        let t = {
            let mut k = self.kernel();
            k.event_list.clear();
            k.run_state = RunState::Ended;
            k.sim_time
        };
        self.shared
            .bus
            .fire_timed(&END_REPLICATION_EVENT, Payload::Empty, t);
    }

    // ── Accessors ──────────────────────────────────────────────

    /// The kernel id, used in logging.
    pub fn id(&self) -> &str {
        &self.shared.id
    }

    /// Current simulation time.
    pub fn sim_time(&self) -> T {
        self.kernel().sim_time
    }

    /// Current lifecycle state.
    pub fn run_state(&self) -> RunState {
        self.kernel().run_state
    }

    /// The bound replication, if initialized.
    pub fn replication(&self) -> Option<Replication<T>> {
        self.kernel().replication.clone()
    }

    /// The bound model, if initialized.
    pub fn model(&self) -> Option<ModelRef<T>> {
        self.shared
            .model
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// The error strategy applied to failing event actions.
    pub fn error_strategy(&self) -> ErrorStrategy {
        self.kernel().error_strategy
    }

    /// Replace the error strategy.
    pub fn set_error_strategy(&self, strategy: ErrorStrategy) {
        self.kernel().error_strategy = strategy;
    }

    /// Number of pending events.
    pub fn pending_event_count(&self) -> usize {
        self.kernel().event_list.len()
    }

    /// The bus this kernel publishes on; subscribe here for
    /// [`TIME_CHANGED_EVENT`], [`WARMUP_EVENT`] and the rest of the
    /// kernel event table.
    pub fn bus(&self) -> &EventProducer<T> {
        &self.shared.bus
    }

    /// True while a run is being set up or dispatching events.
    pub fn is_starting_or_running(&self) -> bool {
        self.run_state().is_starting_or_running()
    }

    /// True while a stop is in progress or complete.
    pub fn is_stopping_or_stopped(&self) -> bool {
        self.run_state().is_stopping_or_stopped()
    }
}

fn validate_priority(priority: i16) -> Result<(), SimulatorError> {
    if (MIN_PRIORITY..=MAX_PRIORITY).contains(&priority) {
        Ok(())
    } else {
        Err(SimulatorError::InvalidPriority { priority })
    }
}

fn insert_checked<T: SimTime>(
    k: &mut Kernel<T>,
    time: T,
    priority: i16,
    action: impl FnOnce() -> Result<(), EventError> + Send + 'static,
) -> Result<EventHandle<T>, SimulatorError> {
    if time < k.sim_time {
        return Err(SimulatorError::ScheduleInPast {
            event_time: time.to_string(),
            sim_time: k.sim_time.to_string(),
        });
    }
    Ok(k.event_list.insert(SimEvent::new(time, priority, action)))
}

impl<T: SimTime> fmt::Debug for Simulator<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let k = self.kernel();
        f.debug_struct("Simulator")
            .field("id", &self.shared.id)
            .field("sim_time", &k.sim_time)
            .field("run_state", &k.run_state)
            .field("pending_events", &k.event_list.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Model, OutputStatistics};
    use cadence_core::{EventState, Ticks};
    use std::sync::atomic::{AtomicU64, Ordering};

    /// A model that schedules nothing by itself.
    struct EmptyModel {
        simulator: Simulator<Ticks>,
        statistics: OutputStatistics<Ticks>,
    }

    impl EmptyModel {
        fn bind(simulator: &Simulator<Ticks>) -> ModelRef<Ticks> {
            Arc::new(Mutex::new(Self {
                simulator: simulator.clone(),
                statistics: OutputStatistics::new(),
            }))
        }
    }

    impl Model<Ticks> for EmptyModel {
        fn construct_model(&mut self) -> Result<(), EventError> {
            Ok(())
        }
        fn simulator(&self) -> &Simulator<Ticks> {
            &self.simulator
        }
        fn output_statistics(&mut self) -> &mut OutputStatistics<Ticks> {
            &mut self.statistics
        }
    }

    fn initialized(start: u64, warmup: u64, end: u64) -> Simulator<Ticks> {
        let simulator = Simulator::new("test");
        let replication =
            Replication::new("rep", Ticks(start), Ticks(warmup), Ticks(end)).unwrap();
        simulator
            .initialize(EmptyModel::bind(&simulator), replication)
            .unwrap();
        simulator
    }

    #[test]
    fn new_simulator_is_pristine() {
        let simulator = Simulator::<Ticks>::new("fresh");
        assert_eq!(simulator.run_state(), RunState::Initial);
        assert_eq!(simulator.sim_time(), Ticks(0));
        assert_eq!(simulator.pending_event_count(), 0);
        assert!(simulator.replication().is_none());
    }

    #[test]
    fn initialize_sets_clock_and_schedules_markers() {
        let simulator = initialized(5, 10, 100);
        assert_eq!(simulator.run_state(), RunState::Initialized);
        assert_eq!(simulator.sim_time(), Ticks(5));
        // Warmup and end-replication markers.
        assert_eq!(simulator.pending_event_count(), 2);
    }

    #[test]
    fn schedule_before_initialize_fails() {
        let simulator = Simulator::<Ticks>::new("bare");
        let err = simulator.schedule_abs(Ticks(1), || Ok(())).unwrap_err();
        assert_eq!(
            err,
            SimulatorError::NotInitialized {
                operation: "schedule_event_abs"
            }
        );
    }

    #[test]
    fn schedule_in_past_fails() {
        let simulator = initialized(10, 10, 100);
        let err = simulator.schedule_abs(Ticks(9), || Ok(())).unwrap_err();
        assert_eq!(
            err,
            SimulatorError::ScheduleInPast {
                event_time: "9".into(),
                sim_time: "10".into(),
            }
        );
    }

    #[test]
    fn reserved_priorities_are_rejected() {
        let simulator = initialized(0, 0, 100);
        for priority in [WARMUP_PRIORITY, END_REPLICATION_PRIORITY, 0, 11, i16::MAX] {
            let err = simulator
                .schedule_event_abs(Ticks(1), priority, || Ok(()))
                .unwrap_err();
            assert_eq!(err, SimulatorError::InvalidPriority { priority });
        }
    }

    #[test]
    fn relative_scheduling_resolves_against_clock() {
        let simulator = initialized(100, 100, 1000);
        let handle = simulator.schedule_rel(25, || Ok(())).unwrap();
        assert_eq!(handle.time(), Ticks(125));
    }

    #[test]
    fn relative_scheduling_surfaces_overflow() {
        let simulator = Simulator::new("overflow");
        let replication = Replication::new(
            "rep",
            Ticks(u64::MAX - 10),
            Ticks(u64::MAX - 10),
            Ticks(u64::MAX),
        )
        .unwrap();
        simulator
            .initialize(EmptyModel::bind(&simulator), replication)
            .unwrap();
        let err = simulator.schedule_rel(100, || Ok(())).unwrap_err();
        assert!(matches!(err, SimulatorError::Time(_)));
    }

    #[test]
    fn start_runs_to_replication_end() {
        let simulator = initialized(0, 0, 50);
        let fired = Arc::new(AtomicU64::new(0));
        let f = Arc::clone(&fired);
        simulator
            .schedule_abs(Ticks(10), move || {
                f.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
            .unwrap();

        simulator.start().unwrap();
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert_eq!(simulator.run_state(), RunState::Ended);
        assert_eq!(simulator.sim_time(), Ticks(50));
        assert_eq!(simulator.pending_event_count(), 0);
    }

    #[test]
    fn start_twice_fails_after_end() {
        let simulator = initialized(0, 0, 10);
        simulator.start().unwrap();
        let err = simulator.start().unwrap_err();
        assert_eq!(
            err,
            SimulatorError::IllegalState {
                operation: "start",
                state: RunState::Ended,
            }
        );
    }

    #[test]
    fn run_until_excluding_leaves_boundary_events_pending() {
        let simulator = initialized(0, 0, 100);
        let handle = simulator.schedule_abs(Ticks(7), || Ok(())).unwrap();

        simulator.run_until(Ticks(7), false).unwrap();
        assert_eq!(simulator.run_state(), RunState::Stopped);
        assert_eq!(simulator.sim_time(), Ticks(7));
        assert!(handle.is_pending());

        // Resuming inclusively dispatches it.
        simulator.run_until(Ticks(7), true).unwrap();
        assert_eq!(handle.state(), EventState::Executed);
    }

    #[test]
    fn run_until_in_past_fails() {
        let simulator = initialized(10, 10, 100);
        let err = simulator.run_until(Ticks(5), true).unwrap_err();
        assert_eq!(
            err,
            SimulatorError::RunUntilInPast {
                until: "5".into(),
                sim_time: "10".into(),
            }
        );
    }

    #[test]
    fn step_dispatches_one_event() {
        let simulator = initialized(0, 2, 100);
        let fired = Arc::new(AtomicU64::new(0));
        let f = Arc::clone(&fired);
        simulator
            .schedule_abs(Ticks(1), move || {
                f.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
            .unwrap();

        // Earliest is the model event at t=1 (warmup is at t=2).
        simulator.step().unwrap();
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert_eq!(simulator.sim_time(), Ticks(1));
        assert_eq!(simulator.run_state(), RunState::Stopped);
    }

    #[test]
    fn step_requires_initialized_or_stopped() {
        let simulator = initialized(0, 0, 10);
        simulator.start().unwrap();
        // Ended: stepping is illegal now.
        assert!(simulator.step().is_err());

        let bare = Simulator::<Ticks>::new("bare");
        assert!(bare.step().is_err());
    }

    #[test]
    fn stop_from_within_an_event_pauses_the_run() {
        let simulator = initialized(0, 0, 100);
        let handle = simulator.clone();
        simulator
            .schedule_abs(Ticks(5), move || {
                handle.stop().map_err(|e| EventError::failed(e.to_string()))
            })
            .unwrap();
        let late = simulator.schedule_abs(Ticks(6), || Ok(())).unwrap();

        simulator.start().unwrap();
        assert_eq!(simulator.run_state(), RunState::Stopped);
        assert_eq!(simulator.sim_time(), Ticks(5));
        assert!(late.is_pending());

        // Resume to completion.
        simulator.start().unwrap();
        assert_eq!(simulator.run_state(), RunState::Ended);
        assert_eq!(late.state(), EventState::Executed);
    }

    #[test]
    fn stop_when_not_running_fails() {
        let simulator = initialized(0, 0, 10);
        assert!(matches!(
            simulator.stop(),
            Err(SimulatorError::IllegalState { .. })
        ));
    }

    #[test]
    fn events_can_schedule_more_events() {
        let simulator = initialized(0, 0, 100);
        let fired = Arc::new(AtomicU64::new(0));
        let f = Arc::clone(&fired);
        let handle = simulator.clone();
        simulator
            .schedule_abs(Ticks(1), move || {
                let f2 = Arc::clone(&f);
                handle
                    .schedule_rel(3, move || {
                        f2.fetch_add(10, Ordering::SeqCst);
                        Ok(())
                    })
                    .map_err(|e| EventError::failed(e.to_string()))?;
                f.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
            .unwrap();

        simulator.start().unwrap();
        assert_eq!(fired.load(Ordering::SeqCst), 11);
    }

    #[test]
    fn cancel_event_is_idempotent() {
        let simulator = initialized(0, 0, 100);
        let handle = simulator.schedule_abs(Ticks(4), || Ok(())).unwrap();
        assert!(simulator.cancel_event(&handle));
        assert!(!simulator.cancel_event(&handle));
        assert_eq!(handle.state(), EventState::Cancelled);
    }

    #[test]
    fn initialize_while_running_fails() {
        let simulator = initialized(0, 0, 100);
        let inner = simulator.clone();
        simulator
            .schedule_abs(Ticks(1), move || {
                let replication =
                    Replication::new("rep2", Ticks(0), Ticks(0), Ticks(10)).unwrap();
                let model = EmptyModel::bind(&inner);
                match inner.initialize(model, replication) {
                    Err(SimulatorError::IllegalState {
                        operation: "initialize",
                        state: RunState::Started,
                    }) => Ok(()),
                    other => Err(EventError::failed(format!(
                        "expected illegal-state error, got {other:?}"
                    ))),
                }
            })
            .unwrap();
        simulator.start().unwrap();
        assert_eq!(simulator.run_state(), RunState::Ended);
    }

    #[test]
    fn reinitialize_discards_previous_events() {
        let simulator = initialized(0, 0, 100);
        let stale = simulator.schedule_abs(Ticks(50), || Ok(())).unwrap();

        let replication = Replication::new("rep2", Ticks(0), Ticks(0), Ticks(10)).unwrap();
        simulator
            .initialize(EmptyModel::bind(&simulator), replication)
            .unwrap();

        assert_eq!(stale.state(), EventState::Cancelled);
        assert_eq!(simulator.pending_event_count(), 2);
        simulator.start().unwrap();
        assert_eq!(simulator.sim_time(), Ticks(10));
    }

    #[test]
    fn error_strategy_warn_and_pause_stops_the_run() {
        let simulator = initialized(0, 0, 100);
        assert_eq!(simulator.error_strategy(), ErrorStrategy::WarnAndPause);
        simulator
            .schedule_abs(Ticks(3), || Err(EventError::failed("boom")))
            .unwrap();
        let later = simulator.schedule_abs(Ticks(4), || Ok(())).unwrap();

        simulator.start().unwrap();
        assert_eq!(simulator.run_state(), RunState::Stopped);
        assert_eq!(simulator.sim_time(), Ticks(3));
        assert!(later.is_pending());
    }

    #[test]
    fn error_strategy_log_and_continue_keeps_running() {
        let simulator = initialized(0, 0, 100);
        simulator.set_error_strategy(ErrorStrategy::LogAndContinue);
        simulator
            .schedule_abs(Ticks(3), || Err(EventError::failed("boom")))
            .unwrap();
        let later = simulator.schedule_abs(Ticks(4), || Ok(())).unwrap();

        simulator.start().unwrap();
        assert_eq!(simulator.run_state(), RunState::Ended);
        assert_eq!(later.state(), EventState::Executed);
    }

    #[test]
    fn error_strategy_warn_and_end_ends_the_replication() {
        let simulator = initialized(0, 0, 100);
        simulator.set_error_strategy(ErrorStrategy::WarnAndEnd);
        simulator
            .schedule_abs(Ticks(3), || Err(EventError::failed("boom")))
            .unwrap();
        let later = simulator.schedule_abs(Ticks(4), || Ok(())).unwrap();

        simulator.start().unwrap();
        assert_eq!(simulator.run_state(), RunState::Ended);
        assert_eq!(simulator.pending_event_count(), 0);
        assert_eq!(later.state(), EventState::Cancelled);
    }

    #[test]
    fn cleanup_returns_to_initial() {
        let simulator = initialized(0, 0, 100);
        simulator.schedule_abs(Ticks(5), || Ok(())).unwrap();
        simulator.cleanup();

        assert_eq!(simulator.run_state(), RunState::Initial);
        assert_eq!(simulator.pending_event_count(), 0);
        assert!(simulator.replication().is_none());
        assert!(simulator.model().is_none());
    }

    #[test]
    fn monotone_clock_under_random_schedules() {
        use proptest::prelude::*;

        proptest!(|(times in proptest::collection::vec(0u64..100, 1..40))| {
            let simulator = initialized(0, 0, 100);
            let observed = Arc::new(Mutex::new(Vec::new()));
            for &t in &times {
                let sim = simulator.clone();
                let observed = Arc::clone(&observed);
                simulator
                    .schedule_abs(Ticks(t), move || {
                        observed.lock().unwrap().push(sim.sim_time());
                        Ok(())
                    })
                    .unwrap();
            }
            simulator.start().unwrap();

            let observed = observed.lock().unwrap();
            prop_assert_eq!(observed.len(), times.len());
            for pair in observed.windows(2) {
                prop_assert!(pair[0] <= pair[1], "clock went backwards: {:?}", pair);
            }
        });
    }
}
