//! M/M/1 queue — a complete, minimal simulation from scratch.
//!
//! Demonstrates:
//!   1. Implementing the Model trait
//!   2. Scheduling a self-perpetuating arrival process
//!   3. Tally, persistent, and counter observers with warmup
//!   4. Initializing a replication and running to its end
//!   5. Reading the collected statistics against queueing theory
//!
//! Run with:
//!   cargo run --example mm1

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use cadence_core::{EventError, Seconds, SimTime};
use cadence_engine::{Model, ModelRef, OutputStatistics, Replication, RunState, Simulator};
use cadence_stats::{SimCounter, SimPersistent, SimTally};

// ─── Queue parameters ───────────────────────────────────────────

const ARRIVAL_RATE: f64 = 0.8; // lambda, customers per time unit
const SERVICE_RATE: f64 = 1.0; // mu
const WARMUP: f64 = 1_000.0;
const RUN_LENGTH: f64 = 20_000.0;
const SEED: u64 = 42;

/// Inverse-transform exponential sample.
fn exp_sample(rng: &mut ChaCha8Rng, rate: f64) -> f64 {
    let u: f64 = rng.gen_range(0.0_f64..1.0_f64);
    -(1.0 - u).ln() / rate
}

// ─── Model state shared by the event actions ────────────────────

struct Mm1State {
    rng: ChaCha8Rng,
    /// Arrival times of customers waiting for service.
    queue: VecDeque<f64>,
    server_busy: bool,
    waiting_time: Arc<Mutex<SimTally<Seconds>>>,
    queue_length: Arc<Mutex<SimPersistent<Seconds>>>,
    served: Arc<Mutex<SimCounter<Seconds>>>,
}

fn schedule_arrival(
    simulator: &Simulator<Seconds>,
    state: &Arc<Mutex<Mm1State>>,
    delay: f64,
) -> Result<(), EventError> {
    let sim = simulator.clone();
    let st = Arc::clone(state);
    simulator
        .schedule_rel(delay, move || on_arrival(&sim, &st))
        .map_err(|e| EventError::failed(e.to_string()))?;
    Ok(())
}

fn on_arrival(
    simulator: &Simulator<Seconds>,
    state: &Arc<Mutex<Mm1State>>,
) -> Result<(), EventError> {
    let now = simulator.sim_time().value();
    let mut st = state.lock().unwrap();

    st.queue.push_back(now);
    let depth = st.queue.len() as f64;
    st.queue_length.lock().unwrap().register(depth);

    let next = exp_sample(&mut st.rng, ARRIVAL_RATE);
    drop(st);
    schedule_arrival(simulator, state, next)?;

    let mut st = state.lock().unwrap();
    if !st.server_busy {
        begin_service(simulator, state, &mut st)?;
    }
    Ok(())
}

fn begin_service(
    simulator: &Simulator<Seconds>,
    state: &Arc<Mutex<Mm1State>>,
    st: &mut Mm1State,
) -> Result<(), EventError> {
    let Some(arrived) = st.queue.pop_front() else {
        return Ok(());
    };
    let now = simulator.sim_time().value();
    st.waiting_time.lock().unwrap().register(now - arrived);
    st.queue_length
        .lock()
        .unwrap()
        .register(st.queue.len() as f64);
    st.server_busy = true;

    let service = exp_sample(&mut st.rng, SERVICE_RATE);
    let sim = simulator.clone();
    let state = Arc::clone(state);
    simulator
        .schedule_rel(service, move || on_departure(&sim, &state))
        .map_err(|e| EventError::failed(e.to_string()))?;
    Ok(())
}

fn on_departure(
    simulator: &Simulator<Seconds>,
    state: &Arc<Mutex<Mm1State>>,
) -> Result<(), EventError> {
    let mut st = state.lock().unwrap();
    st.served.lock().unwrap().register(1);
    st.server_busy = false;
    if !st.queue.is_empty() {
        begin_service(simulator, state, &mut st)?;
    }
    Ok(())
}

// ─── Model ──────────────────────────────────────────────────────

struct Mm1Model {
    simulator: Simulator<Seconds>,
    statistics: OutputStatistics<Seconds>,
    state: Option<Arc<Mutex<Mm1State>>>,
}

impl Model<Seconds> for Mm1Model {
    fn construct_model(&mut self) -> Result<(), EventError> {
        let waiting_time = SimTally::new("waiting time", self)
            .map_err(|e| EventError::failed(e.to_string()))?;
        let queue_length = SimPersistent::new("queue length", self)
            .map_err(|e| EventError::failed(e.to_string()))?;
        let served =
            SimCounter::new("served", self).map_err(|e| EventError::failed(e.to_string()))?;

        let mut rng = ChaCha8Rng::seed_from_u64(SEED);
        let first = exp_sample(&mut rng, ARRIVAL_RATE);
        let state = Arc::new(Mutex::new(Mm1State {
            rng,
            queue: VecDeque::new(),
            server_busy: false,
            waiting_time,
            queue_length,
            served,
        }));
        self.state = Some(Arc::clone(&state));

        schedule_arrival(&self.simulator, &state, first)
    }

    fn simulator(&self) -> &Simulator<Seconds> {
        &self.simulator
    }

    fn output_statistics(&mut self) -> &mut OutputStatistics<Seconds> {
        &mut self.statistics
    }
}

// ─── Main ───────────────────────────────────────────────────────

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt().compact().init();

    println!("=== M/M/1 queue ===\n");

    // 1. Create the simulator and model.
    let simulator = Simulator::new("mm1");
    let model = Arc::new(Mutex::new(Mm1Model {
        simulator: simulator.clone(),
        statistics: OutputStatistics::new(),
        state: None,
    }));
    let model_ref: ModelRef<Seconds> = model.clone();

    // 2. One replication: warmup, then the measured horizon.
    let replication =
        Replication::with_durations("mm1-rep-1", Seconds::ZERO, WARMUP, RUN_LENGTH)?;
    println!(
        "Replication: start=0, warmup={}, end={} (lambda={}, mu={}, seed={})",
        WARMUP, RUN_LENGTH, ARRIVAL_RATE, SERVICE_RATE, SEED
    );

    // 3. Initialize and run to the end of the replication.
    simulator.initialize(model_ref, replication)?;
    simulator.start()?;
    assert_eq!(simulator.run_state(), RunState::Ended);
    println!(
        "Run ended at t={:.1} with {} pending events\n",
        simulator.sim_time().value(),
        simulator.pending_event_count()
    );

    // 4. Read the statistics out of the model.
    let mut guard = model.lock().unwrap();
    println!("Observers registered: {}", guard.output_statistics().len());
    let state = guard.state.as_ref().expect("state built").clone();
    drop(guard);
    let st = state.lock().unwrap();

    let waiting = st.waiting_time.lock().unwrap();
    let queue_length = st.queue_length.lock().unwrap();
    let served = st.served.lock().unwrap();

    // 5. Compare with queueing theory.
    let rho = ARRIVAL_RATE / SERVICE_RATE;
    let wq_theory = rho / (SERVICE_RATE - ARRIVAL_RATE);
    let lq_theory = rho * rho / (1.0 - rho);

    println!("\n{:<22} {:>10} {:>10}", "statistic", "observed", "theory");
    println!(
        "{:<22} {:>10.3} {:>10.3}",
        "mean waiting time",
        waiting.sample_mean().unwrap_or(f64::NAN),
        wq_theory
    );
    println!(
        "{:<22} {:>10.3} {:>10}",
        "waiting time std dev",
        waiting.sample_std_dev().unwrap_or(f64::NAN),
        "-"
    );
    println!(
        "{:<22} {:>10.3} {:>10.3}",
        "mean queue length",
        queue_length.weighted_mean().unwrap_or(f64::NAN),
        lq_theory
    );
    println!("{:<22} {:>10} {:>10}", "customers served", served.count(), "-");
    println!(
        "{:<22} {:>10} {:>10.0}",
        "observations (tally)",
        waiting.n(),
        ARRIVAL_RATE * (RUN_LENGTH - WARMUP)
    );

    println!("\nDone.");
    Ok(())
}
