//! Opaque state codec.
//!
//! A [`StateSnapshot`] is the value form of a full store snapshot. Its flat
//! form is the concatenation of every variable in table order, each an
//! 8-byte IEEE-754 double in little-endian byte order:
//!
//! ```text
//! offset  0        8        16       24
//!         ┌────────┬────────┬────────┐
//!         │ vr 0   │ vr 1   │ vr 2   │   (identity block)
//!         └────────┴────────┴────────┘
//! ```
//!
//! There is no header, version byte or padding, so the serialized size is a
//! function of the table length only and never of the live values.

use bytes::{Buf, BufMut, Bytes};

use crate::{error::SlaveError, variables::VariableStore};

/// Encoded size of one variable.
pub const ENTRY_SIZE: usize = std::mem::size_of::<f64>();

/// Flat size of a store with `entries` variables.
#[must_use]
pub const fn serialized_size(entries: usize) -> usize {
    entries * ENTRY_SIZE
}

/// Snapshot of every variable of one instance.
///
/// Owned by whoever requested it; the instance keeps no reference after
/// handing it out.
#[derive(Debug, Clone, PartialEq)]
pub struct StateSnapshot {
    values: Box<[f64]>,
}

impl StateSnapshot {
    /// Capture the current values of `store`.
    pub fn capture(store: &VariableStore) -> Self {
        Self { values: store.values().into() }
    }

    /// Captured values in table order.
    #[must_use]
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Size of the flat form.
    #[must_use]
    pub fn encoded_len(&self) -> usize {
        serialized_size(self.values.len())
    }

    /// Append the flat form to `dst`.
    pub fn encode(&self, dst: &mut impl BufMut) {
        for value in &self.values {
            dst.put_f64_le(*value);
        }
    }

    /// Flat form as an owned buffer.
    #[must_use]
    pub fn to_bytes(&self) -> Bytes {
        let mut buf = Vec::with_capacity(self.encoded_len());
        self.encode(&mut buf);
        Bytes::from(buf)
    }

    /// Write the flat form into caller storage.
    ///
    /// Returns the number of bytes written, always [`Self::encoded_len`].
    ///
    /// # Errors
    ///
    /// - `SlaveError::BufferTooSmall` if `buf` cannot hold the flat form;
    ///   `buf` is left untouched and the error carries the required size
    pub fn encode_into(&self, buf: &mut [u8]) -> Result<usize, SlaveError> {
        let required = self.encoded_len();
        if buf.len() < required {
            return Err(SlaveError::BufferTooSmall { required, capacity: buf.len() });
        }

        let mut dst = &mut buf[..required];
        self.encode(&mut dst);

        Ok(required)
    }

    /// Decode a flat form holding `entries` variables.
    ///
    /// Bytes past the fixed layout are ignored.
    ///
    /// # Errors
    ///
    /// - `SlaveError::Truncated` if `src` is shorter than the layout
    pub fn decode(src: &[u8], entries: usize) -> Result<Self, SlaveError> {
        let expected = serialized_size(entries);
        if src.len() < expected {
            return Err(SlaveError::Truncated { expected, actual: src.len() });
        }

        let mut src = &src[..expected];
        let values = (0..entries).map(|_| src.get_f64_le()).collect();

        debug_assert!(!src.has_remaining());

        Ok(Self { values })
    }

    /// Overwrite every variable of `store` from this snapshot.
    ///
    /// # Errors
    ///
    /// - `SlaveError::Truncated` if the snapshot holds fewer variables than
    ///   the store; the store is left untouched
    pub fn restore_into(&self, store: &mut VariableStore) -> Result<(), SlaveError> {
        let entries = store.len();
        if self.values.len() < entries {
            return Err(SlaveError::Truncated {
                expected: serialized_size(entries),
                actual: self.encoded_len(),
            });
        }

        store.load(&self.values[..entries]);

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::variables::{Causality, VariableSpec};

    static TABLE: [VariableSpec; 2] = [
        VariableSpec { name: "a", vr: 0, causality: Causality::Input, default: 1.5 },
        VariableSpec { name: "b", vr: 1, causality: Causality::Output, default: -2.0 },
    ];

    #[test]
    fn size_depends_on_entry_count_only() {
        assert_eq!(serialized_size(0), 0);
        assert_eq!(serialized_size(3), 24);

        let mut store = VariableStore::new(&TABLE);
        let before = StateSnapshot::capture(&store).encoded_len();
        store.assign(1, f64::MAX).unwrap();
        let after = StateSnapshot::capture(&store).encoded_len();

        assert_eq!(before, 16);
        assert_eq!(before, after);
    }

    #[test]
    fn layout_is_little_endian_in_table_order() {
        let store = VariableStore::new(&TABLE);
        let bytes = StateSnapshot::capture(&store).to_bytes();

        assert_eq!(&bytes[0..8], &1.5f64.to_le_bytes());
        assert_eq!(&bytes[8..16], &(-2.0f64).to_le_bytes());
    }

    #[test]
    fn decode_ignores_trailing_bytes() {
        let store = VariableStore::new(&TABLE);
        let mut bytes = StateSnapshot::capture(&store).to_bytes().to_vec();
        bytes.extend_from_slice(&[0xAB; 5]);

        let decoded = StateSnapshot::decode(&bytes, 2).unwrap();

        assert_eq!(decoded.values(), &[1.5, -2.0]);
    }

    #[test]
    fn decode_rejects_short_input() {
        let result = StateSnapshot::decode(&[0u8; 15], 2);

        assert_eq!(result, Err(SlaveError::Truncated { expected: 16, actual: 15 }));
    }

    #[test]
    fn encode_into_reports_required_size() {
        let store = VariableStore::new(&TABLE);
        let snapshot = StateSnapshot::capture(&store);

        let mut small = [0u8; 8];
        assert_eq!(
            snapshot.encode_into(&mut small),
            Err(SlaveError::BufferTooSmall { required: 16, capacity: 8 })
        );
        assert_eq!(small, [0u8; 8]);

        let mut big = [0u8; 32];
        assert_eq!(snapshot.encode_into(&mut big), Ok(16));
        assert_eq!(&big[..16], &snapshot.to_bytes()[..]);
        assert_eq!(&big[16..], &[0u8; 16]);
    }

    #[test]
    fn restore_overwrites_store() {
        let mut store = VariableStore::new(&TABLE);
        let saved = StateSnapshot::capture(&store);

        store.set(&[0], &[9.0]).unwrap();
        store.assign(1, 9.0).unwrap();
        saved.restore_into(&mut store).unwrap();

        assert_eq!(store.values(), &[1.5, -2.0]);
    }

    #[test]
    fn restore_rejects_shorter_snapshot() {
        let mut store = VariableStore::new(&TABLE);
        let short = StateSnapshot::decode(&[0u8; 8], 1).unwrap();

        assert_eq!(
            short.restore_into(&mut store),
            Err(SlaveError::Truncated { expected: 16, actual: 8 })
        );
        assert_eq!(store.values(), &[1.5, -2.0]);
    }
}
