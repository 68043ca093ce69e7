//! Determinism: two runs with the same seed produce identical event
//! traces, timestamps included.

use std::sync::{Arc, Mutex};

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use cadence_core::{EventError, Seconds, SimTime};
use cadence_engine::{Model, ModelRef, OutputStatistics, Replication, RunState, Simulator};

type Trace = Arc<Mutex<Vec<String>>>;

struct PumpModel {
    simulator: Simulator<Seconds>,
    statistics: OutputStatistics<Seconds>,
    rng: Arc<Mutex<ChaCha8Rng>>,
    trace: Trace,
}

impl Model<Seconds> for PumpModel {
    fn construct_model(&mut self) -> Result<(), EventError> {
        pump(&self.simulator, &self.rng, &self.trace)
    }
    fn simulator(&self) -> &Simulator<Seconds> {
        &self.simulator
    }
    fn output_statistics(&mut self) -> &mut OutputStatistics<Seconds> {
        &mut self.statistics
    }
}

/// Schedule the next event of a self-perpetuating random chain: a
/// random delay, a random payload value, and a reschedule on firing.
fn pump(
    simulator: &Simulator<Seconds>,
    rng: &Arc<Mutex<ChaCha8Rng>>,
    trace: &Trace,
) -> Result<(), EventError> {
    let delay = rng.lock().unwrap().gen_range(0.25..2.0);
    let value: u32 = rng.lock().unwrap().gen_range(0..1_000_000);

    let sim = simulator.clone();
    let rng = Arc::clone(rng);
    let trace_ref = Arc::clone(trace);
    simulator
        .schedule_rel(delay, move || {
            trace_ref
                .lock()
                .unwrap()
                .push(format!("{:.12}:{value}", sim.sim_time()));
            pump(&sim, &rng, &trace_ref)
        })
        .map_err(|e| EventError::failed(e.to_string()))?;
    Ok(())
}

fn run_once(seed: u64) -> Vec<String> {
    let simulator = Simulator::new("determinism");
    let trace: Trace = Arc::new(Mutex::new(Vec::new()));
    let model: ModelRef<Seconds> = Arc::new(Mutex::new(PumpModel {
        simulator: simulator.clone(),
        statistics: OutputStatistics::new(),
        rng: Arc::new(Mutex::new(ChaCha8Rng::seed_from_u64(seed))),
        trace: Arc::clone(&trace),
    }));
    let replication = Replication::new(
        "rep",
        Seconds::ZERO,
        Seconds::ZERO,
        Seconds::new(200.0),
    )
    .unwrap();

    simulator.initialize(model, replication).unwrap();
    simulator.start().unwrap();
    assert_eq!(simulator.run_state(), RunState::Ended);

    let guard = trace.lock().unwrap();
    guard.clone()
}

#[test]
fn identical_seeds_produce_identical_traces() {
    let a = run_once(42);
    let b = run_once(42);
    assert!(a.len() > 50, "chain should fire many times, got {}", a.len());
    assert_eq!(a, b);
}

#[test]
fn different_seeds_diverge() {
    let a = run_once(1);
    let b = run_once(2);
    assert_ne!(a, b);
}
