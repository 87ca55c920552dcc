//! Fuzz target for flat state decoding
//!
//! Arbitrary bytes are handed to `fmi2DeSerializeFMUstate`'s decoder. Short
//! input must be rejected, anything else must decode the leading entries and
//! re-encode to the same bytes.
//!
//! The fuzzer should NEVER panic. All invalid inputs should return an error.

#![no_main]

use cosim_core::{
    serialized_size, Instance, InstanceConfig, InstanceInfo, NullSink, StateSnapshot,
};
use libfuzzer_sys::fuzz_target;

const ENTRIES: usize = 3;

fuzz_target!(|data: &[u8]| {
    let expected = serialized_size(ENTRIES);

    match StateSnapshot::decode(data, ENTRIES) {
        Ok(snapshot) => {
            assert!(data.len() >= expected, "decoded {} bytes, need {expected}", data.len());
            assert_eq!(&snapshot.to_bytes()[..], &data[..expected]);
        },
        Err(_) => assert!(data.len() < expected, "rejected {} bytes", data.len()),
    }

    let Ok(mut slave) = Instance::identity(
        InstanceInfo::co_simulation("fuzz"),
        InstanceConfig::default(),
        NullSink,
    ) else {
        return;
    };
    let before = slave.store().clone();

    if slave.deserialize(data).is_err() {
        assert_eq!(slave.store(), &before, "failed decode modified the store");
    }
});
