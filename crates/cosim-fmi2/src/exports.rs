//! Exported `fmi2*` functions.
//!
//! Each function resolves its handle, validates every pointer argument,
//! converts to Rust types and calls the matching [`Instance`] method. Results
//! are mapped to `fmi2Status` here and nowhere else.
//!
//! # Safety
//!
//! The contract shared by every function in this module:
//!
//! - `c` is null or a handle returned by [`fmi2Instantiate`]. Null, freed
//!   and foreign handles are rejected with `fmi2Error`.
//! - Array pointers are null only when their count is zero, and otherwise
//!   point to at least that many initialized elements.
//! - String arguments are null or NUL-terminated.
//! - Calls on one instance are not concurrent.
//!
//! [`Instance`]: cosim_core::Instance

#![allow(non_snake_case)]
#![allow(clippy::missing_safety_doc)]

use std::{
    ffi::{CStr, c_char},
    ptr, slice,
};

use cosim_core::{
    ConsoleSink, Experiment, IdentityBlock, InstanceConfig, InstanceInfo, InterfaceKind, LogSink,
    Status, StatusKind,
};

use crate::{
    FMI_VERSION, TYPES_PLATFORM,
    abi::{
        CallbackFunctions, FMI2_FALSE, FMI2_TRUE, Fmi2Boolean, Fmi2Byte, Fmi2Component,
        Fmi2FmuState, Fmi2Integer, Fmi2Real, Fmi2Status, Fmi2StatusKind, Fmi2String, Fmi2Type,
        Fmi2ValueReference, is_true,
    },
    error::CallError,
    handle::{self, Component, Slave},
    sink::CallbackSink,
};

type CallResult = Result<(), CallError>;

/// Run `f` on the component behind `c` and map the outcome to a status.
unsafe fn with_component(
    c: Fmi2Component,
    f: impl FnOnce(&mut Component) -> CallResult,
) -> Fmi2Status {
    // SAFETY: calls on one instance are serialized by the orchestrator
    let Some(component) = (unsafe { handle::component(c) }) else {
        tracing::warn!("call on null or unknown instance handle");
        return Status::Error.to_i32();
    };

    match f(&mut *component) {
        Ok(()) => Status::Ok.to_i32(),
        Err(err) => {
            component.report(&err);
            err.status().to_i32()
        },
    }
}

unsafe fn array<'a, T>(
    ptr: *const T,
    len: usize,
    argument: &'static str,
) -> Result<&'a [T], CallError> {
    if len == 0 {
        return Ok(&[]);
    }
    if ptr.is_null() {
        return Err(CallError::NullArgument { argument });
    }

    // SAFETY: non-null and, per the module contract, `len` elements long
    Ok(unsafe { slice::from_raw_parts(ptr, len) })
}

unsafe fn array_mut<'a, T>(
    ptr: *mut T,
    len: usize,
    argument: &'static str,
) -> Result<&'a mut [T], CallError> {
    if len == 0 {
        return Ok(&mut []);
    }
    if ptr.is_null() {
        return Err(CallError::NullArgument { argument });
    }

    // SAFETY: non-null and, per the module contract, `len` elements long
    Ok(unsafe { slice::from_raw_parts_mut(ptr, len) })
}

unsafe fn out<'a, T>(ptr: *mut T, argument: &'static str) -> Result<&'a mut T, CallError> {
    // SAFETY: null is handled by `as_mut`; anything else is a writable slot
    unsafe { ptr.as_mut() }.ok_or(CallError::NullArgument { argument })
}

unsafe fn read_str(ptr: Fmi2String) -> Option<String> {
    if ptr.is_null() {
        return None;
    }

    // SAFETY: non-null strings are NUL-terminated per the module contract
    Some(unsafe { CStr::from_ptr(ptr) }.to_string_lossy().into_owned())
}

fn status_kind(raw: Fmi2StatusKind) -> Result<StatusKind, CallError> {
    StatusKind::from_i32(raw).ok_or(CallError::UnknownStatusKind { kind: raw })
}

/// `fmi2GetTypesPlatform`
#[unsafe(no_mangle)]
pub extern "C" fn fmi2GetTypesPlatform() -> *const c_char {
    TYPES_PLATFORM.as_ptr()
}

/// `fmi2GetVersion`
#[unsafe(no_mangle)]
pub extern "C" fn fmi2GetVersion() -> *const c_char {
    FMI_VERSION.as_ptr()
}

/// `fmi2Instantiate`. Returns null for a null name, an unsupported interface
/// type or a rejected instantiation.
///
/// Log messages go to `functions.logger` when one is given, otherwise to the
/// process streams. The phase policy comes from `COSIM_PHASE_POLICY`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn fmi2Instantiate(
    instance_name: Fmi2String,
    fmu_type: Fmi2Type,
    fmu_guid: Fmi2String,
    fmu_resource_location: Fmi2String,
    functions: *const CallbackFunctions,
    visible: Fmi2Boolean,
    logging_on: Fmi2Boolean,
) -> Fmi2Component {
    // SAFETY: string arguments are null or NUL-terminated
    let Some(name) = (unsafe { read_str(instance_name) }) else {
        tracing::warn!("fmi2Instantiate called without an instance name");
        return ptr::null_mut();
    };

    // SAFETY: `functions` is null or points to a valid callback table
    let callbacks = unsafe { functions.as_ref() }.copied().unwrap_or(CallbackFunctions::none());
    let sink: Box<dyn LogSink> = match callbacks.logger {
        Some(logger) => Box::new(CallbackSink::new(logger, callbacks.component_environment)),
        None => Box::new(ConsoleSink),
    };

    let kind = match InterfaceKind::from_i32(fmu_type) {
        Ok(kind) => kind,
        Err(err) => {
            sink.log(&name, err.status(), err.category(), &err.to_string());
            return ptr::null_mut();
        },
    };

    let info = InstanceInfo {
        name,
        kind,
        // SAFETY: as above
        guid: unsafe { read_str(fmu_guid) }.unwrap_or_default(),
        resource_location: unsafe { read_str(fmu_resource_location) },
        visible: is_true(visible),
        logging_on: is_true(logging_on),
    };

    match Slave::new(info, InstanceConfig::from_env(), IdentityBlock, sink) {
        Ok(slave) => handle::component_into_handle(Component::new(slave)),
        Err(_) => ptr::null_mut(),
    }
}

/// `fmi2FreeInstance`. Null and unknown handles are ignored.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn fmi2FreeInstance(c: Fmi2Component) {
    // SAFETY: no reference to the component outlives any other call
    unsafe { handle::free_component(c) };
}

/// `fmi2SetDebugLogging`
#[unsafe(no_mangle)]
pub unsafe extern "C" fn fmi2SetDebugLogging(
    c: Fmi2Component,
    logging_on: Fmi2Boolean,
    n_categories: usize,
    categories: *const Fmi2String,
) -> Fmi2Status {
    unsafe {
        with_component(c, |component| {
            let categories = array(categories, n_categories, "categories")?
                .iter()
                .filter_map(|&category| read_str(category))
                .collect();
            component.slave_mut().set_debug_logging(is_true(logging_on), categories)?;
            Ok(())
        })
    }
}

/// `fmi2SetupExperiment`
#[unsafe(no_mangle)]
pub unsafe extern "C" fn fmi2SetupExperiment(
    c: Fmi2Component,
    tolerance_defined: Fmi2Boolean,
    tolerance: Fmi2Real,
    start_time: Fmi2Real,
    stop_time_defined: Fmi2Boolean,
    stop_time: Fmi2Real,
) -> Fmi2Status {
    let experiment = Experiment {
        tolerance: is_true(tolerance_defined).then_some(tolerance),
        start_time,
        stop_time: is_true(stop_time_defined).then_some(stop_time),
    };

    unsafe {
        with_component(c, |component| {
            component.slave_mut().setup_experiment(experiment)?;
            Ok(())
        })
    }
}

/// `fmi2EnterInitializationMode`
#[unsafe(no_mangle)]
pub unsafe extern "C" fn fmi2EnterInitializationMode(c: Fmi2Component) -> Fmi2Status {
    unsafe { with_component(c, |component| Ok(component.slave_mut().enter_initialization_mode()?)) }
}

/// `fmi2ExitInitializationMode`
#[unsafe(no_mangle)]
pub unsafe extern "C" fn fmi2ExitInitializationMode(c: Fmi2Component) -> Fmi2Status {
    unsafe { with_component(c, |component| Ok(component.slave_mut().exit_initialization_mode()?)) }
}

/// `fmi2Terminate`
#[unsafe(no_mangle)]
pub unsafe extern "C" fn fmi2Terminate(c: Fmi2Component) -> Fmi2Status {
    unsafe { with_component(c, |component| Ok(component.slave_mut().terminate()?)) }
}

/// `fmi2Reset`
#[unsafe(no_mangle)]
pub unsafe extern "C" fn fmi2Reset(c: Fmi2Component) -> Fmi2Status {
    unsafe { with_component(c, |component| Ok(component.slave_mut().reset()?)) }
}

/// `fmi2GetReal`
#[unsafe(no_mangle)]
pub unsafe extern "C" fn fmi2GetReal(
    c: Fmi2Component,
    vr: *const Fmi2ValueReference,
    nvr: usize,
    value: *mut Fmi2Real,
) -> Fmi2Status {
    unsafe {
        with_component(c, |component| {
            let vrs = array(vr, nvr, "vr")?;
            let out = array_mut(value, nvr, "value")?;
            component.slave().get_real(vrs, out)?;
            Ok(())
        })
    }
}

/// `fmi2SetReal`
#[unsafe(no_mangle)]
pub unsafe extern "C" fn fmi2SetReal(
    c: Fmi2Component,
    vr: *const Fmi2ValueReference,
    nvr: usize,
    value: *const Fmi2Real,
) -> Fmi2Status {
    unsafe {
        with_component(c, |component| {
            let vrs = array(vr, nvr, "vr")?;
            let values = array(value, nvr, "value")?;
            component.slave_mut().set_real(vrs, values)?;
            Ok(())
        })
    }
}

/// `fmi2GetInteger`
#[unsafe(no_mangle)]
pub unsafe extern "C" fn fmi2GetInteger(
    c: Fmi2Component,
    vr: *const Fmi2ValueReference,
    nvr: usize,
    value: *mut Fmi2Integer,
) -> Fmi2Status {
    unsafe {
        with_component(c, |component| {
            let vrs = array(vr, nvr, "vr")?;
            let out = array_mut(value, nvr, "value")?;
            component.slave().get_integer(vrs, out)?;
            Ok(())
        })
    }
}

/// `fmi2SetInteger`
#[unsafe(no_mangle)]
pub unsafe extern "C" fn fmi2SetInteger(
    c: Fmi2Component,
    vr: *const Fmi2ValueReference,
    nvr: usize,
    value: *const Fmi2Integer,
) -> Fmi2Status {
    unsafe {
        with_component(c, |component| {
            let vrs = array(vr, nvr, "vr")?;
            let values = array(value, nvr, "value")?;
            component.slave_mut().set_integer(vrs, values)?;
            Ok(())
        })
    }
}

/// `fmi2GetBoolean`
#[unsafe(no_mangle)]
pub unsafe extern "C" fn fmi2GetBoolean(
    c: Fmi2Component,
    vr: *const Fmi2ValueReference,
    nvr: usize,
    value: *mut Fmi2Boolean,
) -> Fmi2Status {
    unsafe {
        with_component(c, |component| {
            let vrs = array(vr, nvr, "vr")?;
            let out = array_mut(value, nvr, "value")?;

            let mut flags = vec![false; out.len()];
            component.slave().get_boolean(vrs, &mut flags)?;
            for (slot, flag) in out.iter_mut().zip(flags) {
                *slot = if flag { FMI2_TRUE } else { FMI2_FALSE };
            }

            Ok(())
        })
    }
}

/// `fmi2SetBoolean`
#[unsafe(no_mangle)]
pub unsafe extern "C" fn fmi2SetBoolean(
    c: Fmi2Component,
    vr: *const Fmi2ValueReference,
    nvr: usize,
    value: *const Fmi2Boolean,
) -> Fmi2Status {
    unsafe {
        with_component(c, |component| {
            let vrs = array(vr, nvr, "vr")?;
            let flags: Vec<bool> =
                array(value, nvr, "value")?.iter().map(|&v| is_true(v)).collect();
            component.slave_mut().set_boolean(vrs, &flags)?;
            Ok(())
        })
    }
}

/// `fmi2GetString`. Returned strings stay valid until the next call that
/// returns strings on the same instance.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn fmi2GetString(
    c: Fmi2Component,
    vr: *const Fmi2ValueReference,
    nvr: usize,
    value: *mut Fmi2String,
) -> Fmi2Status {
    unsafe {
        with_component(c, |component| {
            let vrs = array(vr, nvr, "vr")?;
            let out = array_mut(value, nvr, "value")?;

            let mut strings = vec![String::new(); out.len()];
            component.slave().get_string(vrs, &mut strings)?;
            for (slot, kept) in out.iter_mut().zip(component.retain_strings(strings)) {
                *slot = kept.as_ptr();
            }

            Ok(())
        })
    }
}

/// `fmi2SetString`
#[unsafe(no_mangle)]
pub unsafe extern "C" fn fmi2SetString(
    c: Fmi2Component,
    vr: *const Fmi2ValueReference,
    nvr: usize,
    value: *const Fmi2String,
) -> Fmi2Status {
    unsafe {
        with_component(c, |component| {
            let vrs = array(vr, nvr, "vr")?;
            let strings = array(value, nvr, "value")?
                .iter()
                .map(|&s| read_str(s).ok_or(CallError::NullArgument { argument: "value" }))
                .collect::<Result<Vec<_>, _>>()?;
            let strs: Vec<&str> = strings.iter().map(String::as_str).collect();
            component.slave_mut().set_string(vrs, &strs)?;
            Ok(())
        })
    }
}

/// `fmi2DoStep`
#[unsafe(no_mangle)]
pub unsafe extern "C" fn fmi2DoStep(
    c: Fmi2Component,
    current_communication_point: Fmi2Real,
    communication_step_size: Fmi2Real,
    no_set_fmu_state_prior_to_current_point: Fmi2Boolean,
) -> Fmi2Status {
    unsafe {
        with_component(c, |component| {
            component.slave_mut().do_step(
                current_communication_point,
                communication_step_size,
                is_true(no_set_fmu_state_prior_to_current_point),
            )?;
            Ok(())
        })
    }
}

/// `fmi2CancelStep`
#[unsafe(no_mangle)]
pub unsafe extern "C" fn fmi2CancelStep(c: Fmi2Component) -> Fmi2Status {
    unsafe { with_component(c, |component| Ok(component.slave_mut().cancel_step()?)) }
}

/// `fmi2GetFMUstate`. Overwrites the snapshot at `*state` if it is a live
/// handle, otherwise allocates a new one.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn fmi2GetFMUstate(c: Fmi2Component, state: *mut Fmi2FmuState) -> Fmi2Status {
    unsafe {
        with_component(c, |component| {
            let slot = out(state, "FMUstate")?;
            let snapshot = component.slave().get_state()?;
            handle::store_state(slot, snapshot);
            Ok(())
        })
    }
}

/// `fmi2SetFMUstate`
#[unsafe(no_mangle)]
pub unsafe extern "C" fn fmi2SetFMUstate(c: Fmi2Component, state: Fmi2FmuState) -> Fmi2Status {
    unsafe {
        with_component(c, |component| {
            let snapshot = handle::state(state)?;
            component.slave_mut().set_state(snapshot)?;
            Ok(())
        })
    }
}

/// `fmi2FreeFMUstate`. Sets `*state` to null; a null `*state` is a no-op.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn fmi2FreeFMUstate(
    c: Fmi2Component,
    state: *mut Fmi2FmuState,
) -> Fmi2Status {
    unsafe {
        with_component(c, |component| {
            let slot = out(state, "FMUstate")?;
            if slot.is_null() {
                return Ok(());
            }

            handle::free_state(*slot)?;
            *slot = ptr::null_mut();
            component.slave().trace("fmi2FreeFMUstate called.");

            Ok(())
        })
    }
}

/// `fmi2SerializedFMUstateSize`
#[unsafe(no_mangle)]
pub unsafe extern "C" fn fmi2SerializedFMUstateSize(
    c: Fmi2Component,
    size: *mut usize,
) -> Fmi2Status {
    unsafe {
        with_component(c, |component| {
            *out(size, "size")? = component.slave().serialized_size();
            Ok(())
        })
    }
}

/// `fmi2SerializeFMUstate`. Serializes the live variables.
///
/// `*serialized_size` is set to the required size on every outcome except a
/// rejected handle, so a caller that got `fmi2Discard` can retry with a
/// larger buffer.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn fmi2SerializeFMUstate(
    c: Fmi2Component,
    serialized_state: *mut Fmi2Byte,
    capacity: usize,
    serialized_size: *mut usize,
) -> Fmi2Status {
    unsafe {
        with_component(c, |component| {
            *out(serialized_size, "serializedSize")? =
                cosim_core::serialized_size(component.slave().store().len());

            let buf = array_mut(serialized_state, capacity, "serializedState")?;
            component.slave().serialize_into(buf)?;

            Ok(())
        })
    }
}

/// `fmi2DeSerializeFMUstate`. Applies the decoded state to the instance and
/// stores it at `*state` like [`fmi2GetFMUstate`].
#[unsafe(no_mangle)]
pub unsafe extern "C" fn fmi2DeSerializeFMUstate(
    c: Fmi2Component,
    serialized_state: *const Fmi2Byte,
    size: usize,
    state: *mut Fmi2FmuState,
) -> Fmi2Status {
    unsafe {
        with_component(c, |component| {
            let bytes = array(serialized_state, size, "serializedState")?;
            let slot = out(state, "FMUstate")?;
            let snapshot = component.slave_mut().deserialize(bytes)?;
            handle::store_state(slot, snapshot);
            Ok(())
        })
    }
}

/// `fmi2GetDirectionalDerivative`
#[unsafe(no_mangle)]
pub unsafe extern "C" fn fmi2GetDirectionalDerivative(
    c: Fmi2Component,
    v_unknown_ref: *const Fmi2ValueReference,
    n_unknown: usize,
    v_known_ref: *const Fmi2ValueReference,
    n_known: usize,
    dv_known: *const Fmi2Real,
    dv_unknown: *mut Fmi2Real,
) -> Fmi2Status {
    unsafe {
        with_component(c, |component| {
            let unknown = array(v_unknown_ref, n_unknown, "vUnknown_ref")?;
            let known = array(v_known_ref, n_known, "vKnown_ref")?;
            let deltas = array(dv_known, n_known, "dvKnown")?;
            let out = array_mut(dv_unknown, n_unknown, "dvUnknown")?;
            component.slave().directional_derivative(unknown, known, deltas, out)?;
            Ok(())
        })
    }
}

/// `fmi2GetRealOutputDerivatives`. Always zero.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn fmi2GetRealOutputDerivatives(
    c: Fmi2Component,
    vr: *const Fmi2ValueReference,
    nvr: usize,
    order: *const Fmi2Integer,
    value: *mut Fmi2Real,
) -> Fmi2Status {
    unsafe {
        with_component(c, |component| {
            let vrs = array(vr, nvr, "vr")?;
            let orders = array(order, nvr, "order")?;
            let out = array_mut(value, nvr, "value")?;
            component.slave().get_output_derivatives(vrs, orders, out)?;
            Ok(())
        })
    }
}

/// `fmi2SetRealInputDerivatives`. Accepted and ignored.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn fmi2SetRealInputDerivatives(
    c: Fmi2Component,
    vr: *const Fmi2ValueReference,
    nvr: usize,
    order: *const Fmi2Integer,
    value: *const Fmi2Real,
) -> Fmi2Status {
    unsafe {
        with_component(c, |component| {
            let vrs = array(vr, nvr, "vr")?;
            let orders = array(order, nvr, "order")?;
            let values = array(value, nvr, "value")?;
            component.slave_mut().set_input_derivatives(vrs, orders, values)?;
            Ok(())
        })
    }
}

/// `fmi2GetStatus`
#[unsafe(no_mangle)]
pub unsafe extern "C" fn fmi2GetStatus(
    c: Fmi2Component,
    s: Fmi2StatusKind,
    value: *mut Fmi2Status,
) -> Fmi2Status {
    unsafe {
        with_component(c, |component| {
            let kind = status_kind(s)?;
            *out(value, "value")? = component.slave().get_status(kind)?.to_i32();
            Ok(())
        })
    }
}

/// `fmi2GetRealStatus`
#[unsafe(no_mangle)]
pub unsafe extern "C" fn fmi2GetRealStatus(
    c: Fmi2Component,
    s: Fmi2StatusKind,
    value: *mut Fmi2Real,
) -> Fmi2Status {
    unsafe {
        with_component(c, |component| {
            let kind = status_kind(s)?;
            *out(value, "value")? = component.slave().get_real_status(kind)?;
            Ok(())
        })
    }
}

/// `fmi2GetIntegerStatus`
#[unsafe(no_mangle)]
pub unsafe extern "C" fn fmi2GetIntegerStatus(
    c: Fmi2Component,
    s: Fmi2StatusKind,
    value: *mut Fmi2Integer,
) -> Fmi2Status {
    unsafe {
        with_component(c, |component| {
            let kind = status_kind(s)?;
            *out(value, "value")? = component.slave().get_integer_status(kind)?;
            Ok(())
        })
    }
}

/// `fmi2GetBooleanStatus`
#[unsafe(no_mangle)]
pub unsafe extern "C" fn fmi2GetBooleanStatus(
    c: Fmi2Component,
    s: Fmi2StatusKind,
    value: *mut Fmi2Boolean,
) -> Fmi2Status {
    unsafe {
        with_component(c, |component| {
            let kind = status_kind(s)?;
            let flag = component.slave().get_boolean_status(kind)?;
            *out(value, "value")? = if flag { FMI2_TRUE } else { FMI2_FALSE };
            Ok(())
        })
    }
}

/// `fmi2GetStringStatus`. The string stays valid until the next call that
/// returns strings on the same instance.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn fmi2GetStringStatus(
    c: Fmi2Component,
    s: Fmi2StatusKind,
    value: *mut Fmi2String,
) -> Fmi2Status {
    unsafe {
        with_component(c, |component| {
            let kind = status_kind(s)?;
            let slot = out(value, "value")?;
            let text = component.slave().get_string_status(kind)?;
            *slot = component
                .retain_strings([text])
                .first()
                .map_or(ptr::null(), |kept| kept.as_ptr());
            Ok(())
        })
    }
}
