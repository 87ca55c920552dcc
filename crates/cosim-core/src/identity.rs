//! Identity block: `output_value := input_value` on every step.
//!
//! `test_param` is stored and snapshotted but does not influence the output.

use crate::{
    error::{ReferenceFault, SlaveError},
    step::{StepContext, StepFunction},
    variables::{Causality, ValueReference, VariableSpec, VariableStore},
};

/// Model identifier (base name of the shared library inside the FMU).
pub const MODEL_IDENTIFIER: &str = "CIdentityBlock";

/// Value reference of the free parameter.
pub const VR_TEST_PARAM: ValueReference = 0;

/// Value reference of the input.
pub const VR_INPUT_VALUE: ValueReference = 1;

/// Value reference of the output.
pub const VR_OUTPUT_VALUE: ValueReference = 2;

/// Default of `test_param` after instantiation and reset.
pub const DEFAULT_TEST_PARAM: f64 = 20.0;

/// Variable table of the identity block.
pub static VARIABLES: [VariableSpec; 3] = [
    VariableSpec {
        name: "test_param",
        vr: VR_TEST_PARAM,
        causality: Causality::Parameter,
        default: DEFAULT_TEST_PARAM,
    },
    VariableSpec {
        name: "input_value",
        vr: VR_INPUT_VALUE,
        causality: Causality::Input,
        default: 0.0,
    },
    VariableSpec {
        name: "output_value",
        vr: VR_OUTPUT_VALUE,
        causality: Causality::Output,
        default: 0.0,
    },
];

/// Pass-through step function.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityBlock;

impl StepFunction for IdentityBlock {
    fn variables(&self) -> &'static [VariableSpec] {
        &VARIABLES
    }

    fn step(&self, store: &mut VariableStore, _context: &StepContext) -> Result<(), SlaveError> {
        let input = store.value(VR_INPUT_VALUE).ok_or(SlaveError::InvalidReference {
            vr: VR_INPUT_VALUE,
            fault: ReferenceFault::Unknown,
        })?;

        store.assign(VR_OUTPUT_VALUE, input)
    }

    fn partial_derivative(
        &self,
        _store: &VariableStore,
        unknown: ValueReference,
        known: ValueReference,
    ) -> f64 {
        if unknown == VR_OUTPUT_VALUE && known == VR_INPUT_VALUE { 1.0 } else { 0.0 }
    }
}
