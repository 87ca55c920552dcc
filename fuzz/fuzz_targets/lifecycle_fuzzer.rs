//! Fuzz target for the slave lifecycle
//!
//! Drive one strict instance with arbitrary call sequences and compare
//! against a shadow phase model.
//!
//! # Invariants
//!
//! - The phase only moves along the legal transitions
//! - Out-of-phase calls are rejected and change nothing
//! - The output only changes on a successful step, and then equals the input
//! - Restoring a snapshot restores every variable bit for bit

#![no_main]

use arbitrary::Arbitrary;
use cosim_core::{
    identity::{VR_INPUT_VALUE, VR_OUTPUT_VALUE, VR_TEST_PARAM},
    Experiment, IdentityBlock, Instance, InstanceConfig, InstanceInfo, NullSink, Phase,
    StateSnapshot,
};
use libfuzzer_sys::fuzz_target;

#[derive(Debug, Clone, Arbitrary)]
enum SlaveOp {
    SetupExperiment { start_time: f64, stop_time: Option<f64> },
    EnterInitialization,
    ExitInitialization,
    SetReal { vr: u8, value: f64 },
    GetReal { vr: u8 },
    DoStep { current_time: f64, step_size: f64 },
    GetState,
    SetState,
    Serialize,
    Terminate,
    Reset,
}

fn bits(slave: &Instance<IdentityBlock, NullSink>) -> Vec<u64> {
    slave.store().values().iter().map(|value| value.to_bits()).collect()
}

fuzz_target!(|ops: Vec<SlaveOp>| {
    let Ok(mut slave) = Instance::identity(
        InstanceInfo::co_simulation("fuzz"),
        InstanceConfig::default(),
        NullSink,
    ) else {
        return;
    };
    let mut phase = Phase::Instantiated;
    let mut saved: Option<StateSnapshot> = None;

    for op in ops {
        let before = bits(&slave);

        match op {
            SlaveOp::SetupExperiment { start_time, stop_time } => {
                let experiment = Experiment { tolerance: None, start_time, stop_time };
                let result = slave.setup_experiment(experiment);
                assert_eq!(
                    result.is_ok(),
                    phase == Phase::Instantiated && experiment.validate().is_ok()
                );
            },
            SlaveOp::EnterInitialization => {
                let result = slave.enter_initialization_mode();
                assert_eq!(result.is_ok(), phase == Phase::Instantiated);
                if result.is_ok() {
                    phase = Phase::Initializing;
                }
            },
            SlaveOp::ExitInitialization => {
                let result = slave.exit_initialization_mode();
                assert_eq!(result.is_ok(), phase == Phase::Initializing);
                if result.is_ok() {
                    phase = Phase::Runnable;
                }
            },
            SlaveOp::SetReal { vr, value } => {
                let vr = u32::from(vr % 4);
                let result = slave.set_real(&[vr], &[value]);
                let settable = vr == VR_TEST_PARAM || vr == VR_INPUT_VALUE;
                if result.is_ok() {
                    assert!(settable && phase != Phase::Terminated);
                } else {
                    assert_eq!(bits(&slave), before);
                }
            },
            SlaveOp::GetReal { vr } => {
                let mut out = [0.0];
                let result = slave.get_real(&[u32::from(vr % 4)], &mut out);
                if vr % 4 == 3 {
                    assert!(result.is_err());
                }
            },
            SlaveOp::DoStep { current_time, step_size } => {
                let result = slave.do_step(current_time, step_size, false);
                if result.is_ok() {
                    assert_eq!(phase, Phase::Runnable);
                    let mut io = [0.0; 2];
                    if slave.get_real(&[VR_INPUT_VALUE, VR_OUTPUT_VALUE], &mut io).is_ok() {
                        assert_eq!(io[0].to_bits(), io[1].to_bits());
                    }
                } else {
                    assert_eq!(bits(&slave), before);
                }
            },
            SlaveOp::GetState => {
                let result = slave.get_state();
                assert_eq!(result.is_ok(), phase == Phase::Runnable);
                saved = result.ok().or(saved);
            },
            SlaveOp::SetState => {
                if let Some(snapshot) = &saved {
                    if slave.set_state(snapshot).is_ok() {
                        let restored: Vec<u64> =
                            snapshot.values().iter().map(|value| value.to_bits()).collect();
                        assert_eq!(bits(&slave), restored);
                    }
                }
            },
            SlaveOp::Serialize => {
                let mut buf = [0u8; 32];
                if let Ok(written) = slave.serialize_into(&mut buf) {
                    let decoded = StateSnapshot::decode(&buf[..written], before.len());
                    assert!(decoded.is_ok());
                }
            },
            SlaveOp::Terminate => {
                let result = slave.terminate();
                assert_eq!(result.is_ok(), phase == Phase::Runnable);
                if result.is_ok() {
                    phase = Phase::Terminated;
                }
            },
            SlaveOp::Reset => {
                let result = slave.reset();
                let allowed = matches!(phase, Phase::Runnable | Phase::Terminated);
                assert_eq!(result.is_ok(), allowed);
                if result.is_ok() {
                    phase = Phase::Instantiated;
                }
            },
        }

        assert_eq!(slave.phase(), phase);
    }
});
