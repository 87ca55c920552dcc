//! Addressable variable store.
//!
//! A slave declares its variables once as a `'static` table of
//! [`VariableSpec`]s. The table is shared read-only by every instance; each
//! [`VariableStore`] owns only the values, kept in table order. That order is
//! also the encoding order of the state codec.

use std::fmt;

use crate::error::{ReferenceFault, SlaveError};

/// Opaque handle of one variable (`fmi2ValueReference`).
pub type ValueReference = u32;

/// Non-real variable types of the FMI surface. The slave declares none.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VariableKind {
    /// `fmi2Integer`
    Integer,
    /// `fmi2Boolean`
    Boolean,
    /// `fmi2String`
    String,
}

impl fmt::Display for VariableKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Integer => "integer",
            Self::Boolean => "boolean",
            Self::String => "string",
        };
        f.write_str(name)
    }
}

/// Causality of a variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Causality {
    /// Settable by the orchestrator, not changed by the step function
    Parameter,
    /// Settable by the orchestrator, consumed by the step function
    Input,
    /// Computed by the step function, read-only from outside
    Output,
}

/// Static description of one real variable.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VariableSpec {
    /// Name as listed in the model description
    pub name: &'static str,
    /// Value reference used on the C surface
    pub vr: ValueReference,
    /// Causality
    pub causality: Causality,
    /// Value after instantiation and reset
    pub default: f64,
}

impl VariableSpec {
    /// Whether the orchestrator may write this variable.
    #[must_use]
    pub fn is_settable(&self) -> bool {
        self.causality != Causality::Output
    }
}

/// Current values of a slave's variables.
///
/// # Invariants
///
/// - `values.len() == table.len()` at all times.
/// - Batched `get`/`set` are all-or-nothing: every reference is validated
///   before the first value is read or written.
#[derive(Debug, Clone, PartialEq)]
pub struct VariableStore {
    table: &'static [VariableSpec],
    values: Box<[f64]>,
}

impl VariableStore {
    /// Create a store with every variable at its default.
    pub fn new(table: &'static [VariableSpec]) -> Self {
        let values = table.iter().map(|spec| spec.default).collect();
        Self { table, values }
    }

    /// Variable table this store was built from.
    #[must_use]
    pub fn table(&self) -> &'static [VariableSpec] {
        self.table
    }

    /// Number of variables.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// True if the table declares no variables.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Values in table order.
    #[must_use]
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Table entry for `vr`. `None` if unknown.
    #[must_use]
    pub fn spec(&self, vr: ValueReference) -> Option<&'static VariableSpec> {
        self.table.iter().find(|spec| spec.vr == vr)
    }

    /// Current value of `vr`. `None` if unknown.
    #[must_use]
    pub fn value(&self, vr: ValueReference) -> Option<f64> {
        self.index_of(vr).map(|index| self.values[index])
    }

    /// Read a batch of variables into `out`.
    ///
    /// # Errors
    ///
    /// - `SlaveError::LengthMismatch` if `out.len() != vrs.len()`
    /// - `SlaveError::InvalidReference` on the first unknown reference;
    ///   `out` is left untouched
    pub fn get(&self, vrs: &[ValueReference], out: &mut [f64]) -> Result<(), SlaveError> {
        check_lengths(vrs.len(), out.len())?;
        let indices = self.resolve(vrs, false)?;

        for (slot, index) in out.iter_mut().zip(indices) {
            *slot = self.values[index];
        }

        Ok(())
    }

    /// Write a batch of variables.
    ///
    /// # Errors
    ///
    /// - `SlaveError::LengthMismatch` if `values.len() != vrs.len()`
    /// - `SlaveError::InvalidReference` on the first unknown or output
    ///   reference; no value in the batch is written
    pub fn set(&mut self, vrs: &[ValueReference], values: &[f64]) -> Result<(), SlaveError> {
        check_lengths(vrs.len(), values.len())?;
        let indices = self.resolve(vrs, true)?;

        for (index, value) in indices.into_iter().zip(values) {
            self.values[index] = *value;
        }

        Ok(())
    }

    /// Write one variable regardless of causality.
    ///
    /// Used by step functions to publish outputs.
    ///
    /// # Errors
    ///
    /// - `SlaveError::InvalidReference` if `vr` is unknown
    pub fn assign(&mut self, vr: ValueReference, value: f64) -> Result<(), SlaveError> {
        let index = self
            .index_of(vr)
            .ok_or(SlaveError::InvalidReference { vr, fault: ReferenceFault::Unknown })?;
        self.values[index] = value;
        Ok(())
    }

    /// Restore every variable to its default.
    pub fn reset(&mut self) {
        for (value, spec) in self.values.iter_mut().zip(self.table) {
            *value = spec.default;
        }
    }

    /// Overwrite all values in table order.
    pub(crate) fn load(&mut self, values: &[f64]) {
        debug_assert_eq!(values.len(), self.values.len());
        self.values.copy_from_slice(values);
    }

    fn index_of(&self, vr: ValueReference) -> Option<usize> {
        self.table.iter().position(|spec| spec.vr == vr)
    }

    fn resolve(&self, vrs: &[ValueReference], for_write: bool) -> Result<Vec<usize>, SlaveError> {
        vrs.iter()
            .map(|&vr| {
                let index = self
                    .index_of(vr)
                    .ok_or(SlaveError::InvalidReference { vr, fault: ReferenceFault::Unknown })?;

                if for_write && !self.table[index].is_settable() {
                    return Err(SlaveError::InvalidReference {
                        vr,
                        fault: ReferenceFault::NotSettable,
                    });
                }

                Ok(index)
            })
            .collect()
    }
}

fn check_lengths(expected: usize, actual: usize) -> Result<(), SlaveError> {
    if expected == actual { Ok(()) } else { Err(SlaveError::LengthMismatch { expected, actual }) }
}

#[cfg(test)]
mod tests {
    use super::*;

    static TABLE: [VariableSpec; 3] = [
        VariableSpec { name: "gain", vr: 10, causality: Causality::Parameter, default: 2.0 },
        VariableSpec { name: "u", vr: 11, causality: Causality::Input, default: 0.0 },
        VariableSpec { name: "y", vr: 12, causality: Causality::Output, default: 0.0 },
    ];

    #[test]
    fn new_store_holds_defaults() {
        let store = VariableStore::new(&TABLE);

        assert_eq!(store.len(), 3);
        assert_eq!(store.values(), &[2.0, 0.0, 0.0]);
        assert_eq!(store.value(10), Some(2.0));
        assert_eq!(store.value(99), None);
    }

    #[test]
    fn get_reads_in_request_order() {
        let mut store = VariableStore::new(&TABLE);
        store.set(&[11, 10], &[5.0, 3.0]).unwrap();

        let mut out = [0.0; 3];
        store.get(&[12, 11, 10], &mut out).unwrap();

        assert_eq!(out, [0.0, 5.0, 3.0]);
    }

    #[test]
    fn set_rejects_output() {
        let mut store = VariableStore::new(&TABLE);

        let result = store.set(&[12], &[1.0]);

        assert_eq!(
            result,
            Err(SlaveError::InvalidReference { vr: 12, fault: ReferenceFault::NotSettable })
        );
        assert_eq!(store.value(12), Some(0.0));
    }

    #[test]
    fn failed_batch_writes_nothing() {
        let mut store = VariableStore::new(&TABLE);

        let result = store.set(&[10, 11, 42], &[7.0, 8.0, 9.0]);

        assert!(matches!(
            result,
            Err(SlaveError::InvalidReference { vr: 42, fault: ReferenceFault::Unknown })
        ));
        assert_eq!(store.values(), &[2.0, 0.0, 0.0]);
    }

    #[test]
    fn failed_get_leaves_output_untouched() {
        let store = VariableStore::new(&TABLE);
        let mut out = [-1.0, -1.0];

        assert!(store.get(&[10, 3], &mut out).is_err());
        assert_eq!(out, [-1.0, -1.0]);
    }

    #[test]
    fn mismatched_lengths_rejected() {
        let mut store = VariableStore::new(&TABLE);

        assert_eq!(
            store.set(&[10, 11], &[1.0]),
            Err(SlaveError::LengthMismatch { expected: 2, actual: 1 })
        );

        let mut out = [0.0; 1];
        assert_eq!(
            store.get(&[10, 11], &mut out),
            Err(SlaveError::LengthMismatch { expected: 2, actual: 1 })
        );
    }

    #[test]
    fn assign_ignores_causality() {
        let mut store = VariableStore::new(&TABLE);

        store.assign(12, 4.5).unwrap();

        assert_eq!(store.value(12), Some(4.5));
        assert!(store.assign(13, 1.0).is_err());
    }

    #[test]
    fn reset_restores_defaults() {
        let mut store = VariableStore::new(&TABLE);
        store.set(&[10, 11], &[-1.0, 6.0]).unwrap();
        store.assign(12, 6.0).unwrap();

        store.reset();

        assert_eq!(store.values(), &[2.0, 0.0, 0.0]);
    }
}
