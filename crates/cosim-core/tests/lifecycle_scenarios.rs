//! End-to-end scenarios through the instance facade
//!
//! Each test drives a full orchestrator sequence: instantiate, initialize,
//! step, snapshot, terminate, reset.

use cosim_core::{
    Experiment, IdentityBlock, Instance, InstanceConfig, InstanceInfo, NullSink, Operation, Phase,
    PhasePolicy, ReferenceFault, SlaveError, Status, StateSnapshot,
    identity::{DEFAULT_TEST_PARAM, VR_INPUT_VALUE, VR_OUTPUT_VALUE, VR_TEST_PARAM},
};

fn instance(policy: PhasePolicy) -> Instance<IdentityBlock, NullSink> {
    let info = InstanceInfo::co_simulation("scenario");
    Instance::identity(info, InstanceConfig::with_phase_policy(policy), NullSink).unwrap()
}

fn runnable() -> Instance<IdentityBlock, NullSink> {
    let mut instance = instance(PhasePolicy::Strict);
    instance.setup_experiment(Experiment::default()).unwrap();
    instance.enter_initialization_mode().unwrap();
    instance.exit_initialization_mode().unwrap();
    instance
}

fn serialized(instance: &Instance<IdentityBlock, NullSink>) -> String {
    let mut buf = vec![0u8; instance.serialized_size()];
    instance.serialize_into(&mut buf).unwrap();
    hex::encode(buf)
}

#[test]
fn full_lifecycle() {
    let mut instance = instance(PhasePolicy::Strict);
    assert_eq!(instance.phase(), Phase::Instantiated);

    instance
        .setup_experiment(Experiment { tolerance: None, start_time: 0.0, stop_time: Some(1.0) })
        .unwrap();
    instance.enter_initialization_mode().unwrap();
    assert_eq!(instance.phase(), Phase::Initializing);

    instance.set_real(&[VR_TEST_PARAM], &[3.0]).unwrap();
    instance.exit_initialization_mode().unwrap();
    assert_eq!(instance.phase(), Phase::Runnable);

    let mut t = 0.0;
    for input in [1.0, -2.0, 0.5] {
        instance.set_real(&[VR_INPUT_VALUE], &[input]).unwrap();
        instance.do_step(t, 0.25, true).unwrap();
        t += 0.25;

        let mut out = [0.0];
        instance.get_real(&[VR_OUTPUT_VALUE], &mut out).unwrap();
        assert_eq!(out, [input]);
    }

    instance.terminate().unwrap();
    assert_eq!(instance.phase(), Phase::Terminated);

    instance.reset().unwrap();
    assert_eq!(instance.phase(), Phase::Instantiated);
    assert_eq!(instance.store().values(), &[DEFAULT_TEST_PARAM, 0.0, 0.0]);
}

#[test]
fn output_changes_only_on_step() {
    let mut instance = runnable();
    instance.set_real(&[VR_INPUT_VALUE], &[5.0]).unwrap();

    assert_eq!(instance.store().value(VR_OUTPUT_VALUE), Some(0.0));

    instance.do_step(0.0, 0.1, false).unwrap();
    assert_eq!(instance.store().value(VR_OUTPUT_VALUE), Some(5.0));
}

#[test]
fn zero_step_size_still_updates_output() {
    let mut instance = runnable();
    instance.set_real(&[VR_INPUT_VALUE], &[-7.5]).unwrap();

    instance.do_step(0.0, 0.0, false).unwrap();

    assert_eq!(instance.store().value(VR_OUTPUT_VALUE), Some(-7.5));
}

#[test]
fn output_not_settable() {
    let mut instance = runnable();

    let result = instance.set_real(&[VR_OUTPUT_VALUE], &[1.0]);

    assert_eq!(
        result,
        Err(SlaveError::InvalidReference {
            vr: VR_OUTPUT_VALUE,
            fault: ReferenceFault::NotSettable,
        })
    );
}

#[test]
fn unknown_reference_rejected_on_get() {
    let instance = runnable();
    let mut out = [f64::NAN; 2];

    let result = instance.get_real(&[VR_INPUT_VALUE, 42], &mut out);

    assert_eq!(
        result,
        Err(SlaveError::InvalidReference { vr: 42, fault: ReferenceFault::Unknown })
    );
}

#[test]
fn mismatched_lengths_rejected() {
    let mut instance = runnable();

    let result = instance.set_real(&[VR_TEST_PARAM, VR_INPUT_VALUE], &[1.0]);

    assert_eq!(result, Err(SlaveError::LengthMismatch { expected: 2, actual: 1 }));
    assert_eq!(instance.store().value(VR_TEST_PARAM), Some(DEFAULT_TEST_PARAM));
}

#[test]
fn empty_batches_succeed() {
    let mut instance = runnable();

    instance.set_real(&[], &[]).unwrap();
    instance.get_real(&[], &mut []).unwrap();
}

#[test]
fn default_state_bytes() {
    let instance = runnable();

    insta::assert_snapshot!(
        serialized(&instance),
        @"000000000000344000000000000000000000000000000000"
    );
}

#[test]
fn stepped_state_bytes() {
    let mut instance = runnable();
    instance.set_real(&[VR_INPUT_VALUE], &[5.0]).unwrap();
    instance.do_step(0.0, 1.0, false).unwrap();

    insta::assert_snapshot!(
        serialized(&instance),
        @"000000000000344000000000000014400000000000001440"
    );
}

#[test]
fn undersized_buffer_is_discard() {
    let instance = runnable();
    let mut buf = [0xAAu8; 16];

    let err = instance.serialize_into(&mut buf).unwrap_err();

    assert_eq!(err, SlaveError::BufferTooSmall { required: 24, capacity: 16 });
    assert_eq!(err.status(), Status::Discard);
    assert_eq!(buf, [0xAA; 16]);
}

#[test]
fn oversized_buffer_reports_exact_size() {
    let instance = runnable();
    let mut buf = [0u8; 64];

    assert_eq!(instance.serialize_into(&mut buf), Ok(24));
}

#[test]
fn state_restore_rolls_back() {
    let mut instance = runnable();
    instance.set_real(&[VR_INPUT_VALUE], &[1.0]).unwrap();
    instance.do_step(0.0, 1.0, false).unwrap();
    let saved = instance.get_state().unwrap();

    instance.set_real(&[VR_TEST_PARAM, VR_INPUT_VALUE], &[-1.0, 2.0]).unwrap();
    instance.do_step(1.0, 1.0, false).unwrap();
    assert_eq!(instance.store().values(), &[-1.0, 2.0, 2.0]);

    instance.set_state(&saved).unwrap();

    assert_eq!(instance.store().values(), &[DEFAULT_TEST_PARAM, 1.0, 1.0]);
}

#[test]
fn snapshot_is_independent_of_instance() {
    let mut instance = runnable();
    let snapshot = instance.get_state().unwrap();

    instance.set_real(&[VR_INPUT_VALUE], &[9.0]).unwrap();
    instance.do_step(0.0, 1.0, false).unwrap();

    assert_eq!(snapshot.values(), &[DEFAULT_TEST_PARAM, 0.0, 0.0]);
}

#[test]
fn snapshot_from_other_instance_applies() {
    let mut first = runnable();
    first.set_real(&[VR_INPUT_VALUE], &[4.0]).unwrap();
    first.do_step(0.0, 1.0, false).unwrap();
    let bytes = first.get_state().unwrap().to_bytes();

    let mut second = runnable();
    second.deserialize(&bytes).unwrap();

    assert_eq!(second.store().values(), first.store().values());
}

#[test]
fn truncated_state_rejected() {
    let mut instance = runnable();
    instance.set_state(&StateSnapshot::decode(&[0u8; 24], 3).unwrap()).unwrap();
    assert_eq!(instance.store().values(), &[0.0, 0.0, 0.0]);

    let result = instance.deserialize(&[0u8; 23]);

    assert_eq!(result, Err(SlaveError::Truncated { expected: 24, actual: 23 }));
}

#[test]
fn strict_policy_rejects_out_of_order_calls() {
    let mut instance = instance(PhasePolicy::Strict);

    assert_eq!(
        instance.exit_initialization_mode(),
        Err(SlaveError::InvalidPhase {
            phase: Phase::Instantiated,
            operation: Operation::ExitInitialization
        })
    );
    assert!(instance.get_state().is_err());
    assert!(instance.terminate().is_err());
    assert_eq!(instance.phase(), Phase::Instantiated);

    instance.enter_initialization_mode().unwrap();
    assert!(instance.setup_experiment(Experiment::default()).is_err());
    assert!(instance.do_step(0.0, 1.0, false).is_err());

    instance.exit_initialization_mode().unwrap();
    instance.terminate().unwrap();

    let mut out = [0.0];
    assert!(instance.get_real(&[VR_INPUT_VALUE], &mut out).is_err());
    assert!(instance.do_step(0.0, 1.0, false).is_err());
    instance.set_debug_logging(true, Vec::new()).unwrap();
    assert_eq!(instance.phase(), Phase::Terminated);
}

#[test]
fn permissive_policy_accepts_everything_but_keeps_transitions() {
    let mut instance = instance(PhasePolicy::Permissive);

    instance.exit_initialization_mode().unwrap();
    assert_eq!(instance.phase(), Phase::Runnable);

    instance.terminate().unwrap();
    instance.set_real(&[VR_INPUT_VALUE], &[3.0]).unwrap();
    instance.do_step(0.0, 1.0, false).unwrap();

    assert_eq!(instance.store().value(VR_OUTPUT_VALUE), Some(3.0));
    assert_eq!(instance.phase(), Phase::Terminated);
}

#[test]
fn invalid_experiment_rejected() {
    let mut instance = instance(PhasePolicy::Strict);

    let result = instance.setup_experiment(Experiment {
        tolerance: Some(1e-4),
        start_time: 5.0,
        stop_time: Some(1.0),
    });

    assert!(matches!(result, Err(SlaveError::InvalidExperiment { .. })));
    assert_eq!(instance.experiment(), None);
}

#[test]
fn derivatives_during_initialization() {
    let mut instance = instance(PhasePolicy::Strict);
    instance.enter_initialization_mode().unwrap();
    let mut out = [0.0];

    instance
        .directional_derivative(&[VR_OUTPUT_VALUE], &[VR_INPUT_VALUE], &[4.0], &mut out)
        .unwrap();

    assert_eq!(out, [4.0]);
}

#[test]
fn derivative_length_mismatch_rejected() {
    let instance = runnable();
    let mut out = [0.0; 2];

    let result =
        instance.directional_derivative(&[VR_OUTPUT_VALUE], &[VR_INPUT_VALUE], &[1.0], &mut out);

    assert_eq!(result, Err(SlaveError::LengthMismatch { expected: 1, actual: 2 }));
}
