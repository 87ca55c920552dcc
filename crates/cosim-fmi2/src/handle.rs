//! Opaque handles handed across the C boundary.
//!
//! Instances and FMU states are boxed and their addresses recorded in a
//! registry. Every incoming handle is looked up before it is dereferenced, so
//! a null, foreign or already freed handle is an error rather than undefined
//! behaviour. The registry is the only process-wide state.

use std::{
    collections::BTreeSet,
    ffi::CString,
    sync::{Mutex, MutexGuard, PoisonError},
};

use cosim_core::{IdentityBlock, Instance, LogSink, StateSnapshot};

use crate::{
    abi::{Fmi2Component, Fmi2FmuState},
    error::CallError,
    sink::c_string,
};

/// Instance type behind every `fmi2Component`.
pub type Slave = Instance<IdentityBlock, Box<dyn LogSink>>;

/// What an `fmi2Component` points to.
pub struct Component {
    slave: Slave,
    // Backing storage for strings returned to the orchestrator; valid until
    // the next call that returns strings.
    strings: Vec<CString>,
}

impl Component {
    /// Wrap an instance.
    pub fn new(slave: Slave) -> Self {
        Self { slave, strings: Vec::new() }
    }

    /// The instance.
    pub fn slave(&self) -> &Slave {
        &self.slave
    }

    /// The instance, mutably.
    pub fn slave_mut(&mut self) -> &mut Slave {
        &mut self.slave
    }

    /// Keep `values` alive as C strings, replacing whatever was kept before.
    pub(crate) fn retain_strings<I>(&mut self, values: I) -> &[CString]
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        self.strings = values.into_iter().map(|value| c_string(value.as_ref())).collect();
        &self.strings
    }

    /// Log a boundary error the instance has not seen.
    pub(crate) fn report(&self, err: &CallError) {
        if err.needs_logging() {
            self.slave.sink().log(
                self.slave.name(),
                err.status(),
                "logStatusError",
                &err.to_string(),
            );
        }
    }
}

struct Registry {
    live: Mutex<BTreeSet<usize>>,
}

impl Registry {
    const fn new() -> Self {
        Self { live: Mutex::new(BTreeSet::new()) }
    }

    fn live(&self) -> MutexGuard<'_, BTreeSet<usize>> {
        // Entries are plain addresses; a panic while holding the lock cannot
        // leave the set inconsistent
        self.live.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn insert(&self, addr: usize) {
        self.live().insert(addr);
    }

    fn contains(&self, addr: usize) -> bool {
        self.live().contains(&addr)
    }

    fn remove(&self, addr: usize) -> bool {
        self.live().remove(&addr)
    }
}

static COMPONENTS: Registry = Registry::new();
static STATES: Registry = Registry::new();

/// Box `component` and return its handle.
pub(crate) fn component_into_handle(component: Component) -> Fmi2Component {
    let ptr = Box::into_raw(Box::new(component));
    COMPONENTS.insert(ptr.addr());
    ptr.cast()
}

/// Resolve a live component handle.
///
/// # Safety
///
/// The caller must not hold another reference to the same component while
/// the returned one is alive. Calls on one instance are serialized by the
/// orchestrator.
pub(crate) unsafe fn component<'a>(handle: Fmi2Component) -> Option<&'a mut Component> {
    if handle.is_null() || !COMPONENTS.contains(handle.addr()) {
        return None;
    }

    // SAFETY: registered addresses come from `Box::into_raw` in
    // `component_into_handle` and are removed before being freed
    Some(unsafe { &mut *handle.cast::<Component>() })
}

/// Free a component handle. Null and unknown handles are ignored.
///
/// # Safety
///
/// No reference obtained through [`component`] may be alive.
pub(crate) unsafe fn free_component(handle: Fmi2Component) {
    if !handle.is_null() && COMPONENTS.remove(handle.addr()) {
        // SAFETY: the address was registered, so it is a live box we own
        drop(unsafe { Box::from_raw(handle.cast::<Component>()) });
    }
}

/// Box `snapshot` and return its handle.
pub(crate) fn state_into_handle(snapshot: StateSnapshot) -> Fmi2FmuState {
    let ptr = Box::into_raw(Box::new(snapshot));
    STATES.insert(ptr.addr());
    ptr.cast()
}

/// Resolve a live FMU state handle.
///
/// # Safety
///
/// Same aliasing rule as [`component`].
pub(crate) unsafe fn state<'a>(handle: Fmi2FmuState) -> Result<&'a mut StateSnapshot, CallError> {
    if handle.is_null() || !STATES.contains(handle.addr()) {
        return Err(CallError::UnknownState);
    }

    // SAFETY: registered by `state_into_handle`, removed before being freed
    Ok(unsafe { &mut *handle.cast::<StateSnapshot>() })
}

/// Store `snapshot` at `*slot`: overwrite the live state already there or
/// allocate a new one.
///
/// # Safety
///
/// Same aliasing rule as [`component`].
pub(crate) unsafe fn store_state(slot: &mut Fmi2FmuState, snapshot: StateSnapshot) {
    // SAFETY: forwarded caller contract
    match unsafe { state(*slot) } {
        Ok(existing) => *existing = snapshot,
        Err(_) => *slot = state_into_handle(snapshot),
    }
}

/// Free an FMU state handle.
///
/// # Safety
///
/// Same aliasing rule as [`free_component`].
pub(crate) unsafe fn free_state(handle: Fmi2FmuState) -> Result<(), CallError> {
    if handle.is_null() || !STATES.remove(handle.addr()) {
        return Err(CallError::UnknownState);
    }

    // SAFETY: the address was registered, so it is a live box we own
    drop(unsafe { Box::from_raw(handle.cast::<StateSnapshot>()) });

    Ok(())
}
