//! End-to-end scenario runs checked against the standard invariants.

use std::cell::RefCell;

use cosim_core::{LogSink, Phase, PhasePolicy, Status};
use cosim_harness::{
    InputSchedule, InvariantRegistry, Scenario, ScenarioConfig, ScenarioError, Trace,
};
use proptest::prelude::*;

#[derive(Default)]
struct Recorder {
    messages: RefCell<Vec<(Status, String)>>,
}

impl LogSink for Recorder {
    fn log(&self, _instance_name: &str, status: Status, _category: &str, message: &str) {
        self.messages.borrow_mut().push((status, message.to_string()));
    }
}

fn run(config: ScenarioConfig) -> Trace {
    Scenario::new(config).unwrap().run_with(cosim_core::NullSink).unwrap()
}

#[test]
fn constant_input_table() {
    let trace = run(ScenarioConfig {
        stop_time: 0.3,
        inputs: InputSchedule::Constant(2.5),
        ..ScenarioConfig::default()
    });

    insta::assert_snapshot!(trace.to_table().trim_end(), @r"
    step       time      input     output
       0     0.0000     2.5000     2.5000
       1     0.1000     2.5000     2.5000
       2     0.2000     2.5000     2.5000
    ");
}

#[test]
fn default_scenario_satisfies_invariants() {
    let trace = run(ScenarioConfig::default());

    assert_eq!(trace.steps.len(), 10);
    assert_eq!(trace.final_phase, Phase::Terminated);
    assert!(InvariantRegistry::standard().check_all(&trace).is_ok());
}

#[test]
fn test_param_set_during_initialization_is_kept() {
    let trace = run(ScenarioConfig { test_param: Some(-3.5), ..ScenarioConfig::default() });

    assert!(trace.steps.iter().all(|step| step.test_param == -3.5));
}

#[test]
fn default_test_param_is_reported() {
    let trace = run(ScenarioConfig::default());

    assert!(trace.steps.iter().all(|step| step.test_param == 20.0));
    assert!(trace.steps.iter().all(|step| step.state_size == 24));
}

#[test]
fn checkpoint_replays_tail() {
    let trace = run(ScenarioConfig {
        inputs: InputSchedule::Seeded(9),
        checkpoint_at: Some(6),
        ..ScenarioConfig::default()
    });

    let replay = trace.replay.as_ref().unwrap();
    assert_eq!(replay.from, 6);
    assert_eq!(replay.steps.as_slice(), &trace.steps[6..]);
    assert!(InvariantRegistry::standard().check_all(&trace).is_ok());
}

#[test]
fn permissive_policy_runs_the_same() {
    let strict = run(ScenarioConfig::default());
    let permissive = run(ScenarioConfig {
        phase_policy: PhasePolicy::Permissive,
        ..ScenarioConfig::default()
    });

    assert_eq!(strict, permissive);
}

#[test]
fn logging_reports_each_step() {
    let recorder = Recorder::default();
    let scenario = Scenario::new(ScenarioConfig {
        stop_time: 0.2,
        logging_on: true,
        ..ScenarioConfig::default()
    })
    .unwrap();

    scenario.run_with(&recorder).unwrap();

    let messages = recorder.messages.borrow();
    let steps: Vec<_> =
        messages.iter().filter(|(_, message)| message.starts_with("fmi2DoStep at time")).collect();
    assert_eq!(steps.len(), 2);
    assert!(steps[1].1.starts_with("fmi2DoStep at time 0.10"));
    assert!(messages.iter().all(|(status, _)| *status == Status::Ok));
}

#[test]
fn silent_without_logging() {
    let recorder = Recorder::default();

    Scenario::new(ScenarioConfig::default()).unwrap().run_with(&recorder).unwrap();

    assert!(recorder.messages.borrow().is_empty());
}

#[test]
fn violations_convert_to_error() {
    let mut trace = run(ScenarioConfig::default());
    trace.steps[3].output += 1.0;

    let err = InvariantRegistry::standard()
        .check_all(&trace)
        .map_err(ScenarioError::Violations)
        .unwrap_err();

    assert!(err.to_string().starts_with("1 invariant violation(s), first: output_tracks_input"));
}

fn scenario_config() -> impl Strategy<Value = ScenarioConfig> {
    (any::<u64>(), -10.0..10.0f64, 0.01..1.0f64, 1usize..200, any::<bool>()).prop_flat_map(
        |(seed, start_time, step_size, steps, checkpoint)| {
            // Half a step past the last communication point
            #[allow(clippy::cast_precision_loss)]
            let stop_time = start_time + (steps as f64 - 0.5) * step_size;
            let checkpoints =
                if checkpoint { (0..steps).prop_map(Some).boxed() } else { Just(None).boxed() };
            checkpoints.prop_map(move |checkpoint_at| ScenarioConfig {
                start_time,
                stop_time,
                step_size,
                inputs: InputSchedule::Seeded(seed),
                checkpoint_at,
                ..ScenarioConfig::default()
            })
        },
    )
}

#[test]
fn prop_seeded_scenarios_satisfy_invariants() {
    proptest!(|(config in scenario_config())| {
        // PROPERTY: every valid scenario run satisfies the standard invariants
        let trace = run(config);
        prop_assert!(InvariantRegistry::standard().check_all(&trace).is_ok());
    });
}

#[test]
fn prop_same_seed_same_trace() {
    proptest!(|(config in scenario_config())| {
        // PROPERTY: a scenario is a pure function of its configuration
        prop_assert_eq!(run(config.clone()), run(config));
    });
}
