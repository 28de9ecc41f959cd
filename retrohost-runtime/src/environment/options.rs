//! Variables and core options.

use std::ffi::{c_char, c_uint, c_void};

use super::{Dispatcher, HandlerResult, Payload, payload, payload_mut, write};
use crate::abi::{
    self, CoreOptionDefinition, CoreOptionDisplay, CoreOptionsIntl,
    CoreOptionsUpdateDisplayCallback, CoreOptionsV2, CoreOptionsV2Intl, EnvCommand, Variable,
};
use crate::error::EnvironmentCommandError;
use crate::options::CORE_OPTIONS_VERSION;
use crate::state::SessionContext;

pub(super) fn register(d: &mut Dispatcher) {
    d.add(EnvCommand::GetVariable, Payload::Required, get_variable);
    d.add(EnvCommand::SetVariables, Payload::Required, set_variables);
    d.add(EnvCommand::GetVariableUpdate, Payload::Required, get_variable_update);
    d.add(EnvCommand::SetVariable, Payload::Optional, set_variable);
    d.add(EnvCommand::GetCoreOptionsVersion, Payload::Required, get_core_options_version);
    d.add(EnvCommand::SetCoreOptions, Payload::Required, set_core_options);
    d.add(EnvCommand::SetCoreOptionsIntl, Payload::Required, set_core_options_intl);
    d.add(EnvCommand::SetCoreOptionsV2, Payload::Required, set_core_options_v2);
    d.add(EnvCommand::SetCoreOptionsV2Intl, Payload::Required, set_core_options_v2_intl);
    d.add(EnvCommand::SetCoreOptionsDisplay, Payload::Required, set_core_options_display);
    d.add(
        EnvCommand::SetCoreOptionsUpdateDisplayCallback,
        Payload::Optional,
        set_update_display_callback,
    );
}

unsafe fn key_of<'a>(
    command: &'static str,
    key: *const c_char,
) -> Result<&'a str, EnvironmentCommandError> {
    unsafe { abi::cstr::to_str(key) }.ok_or(EnvironmentCommandError::InvalidString { command })
}

unsafe fn get_variable(ctx: &mut SessionContext, data: *mut c_void) -> HandlerResult {
    let variable = unsafe { payload_mut::<Variable>(data) };
    variable.value = std::ptr::null();
    let key = unsafe { key_of("GET_VARIABLE", variable.key) }?;
    let value = ctx.options.get_variable(key).ok_or_else(|| {
        EnvironmentCommandError::UnknownVariable {
            command: "GET_VARIABLE",
            key: key.to_owned(),
        }
    })?;
    variable.value = value.as_ptr();
    Ok(())
}

unsafe fn set_variables(ctx: &mut SessionContext, data: *mut c_void) -> HandlerResult {
    let count = unsafe { ctx.options.set_variables(data.cast::<Variable>()) };
    tracing::debug!(count, "core declared variables");
    Ok(())
}

unsafe fn get_variable_update(ctx: &mut SessionContext, data: *mut c_void) -> HandlerResult {
    unsafe { write(data, ctx.options.take_update()) };
    Ok(())
}

unsafe fn set_variable(ctx: &mut SessionContext, data: *mut c_void) -> HandlerResult {
    // Null asks whether the command is supported.
    if data.is_null() {
        return Ok(());
    }
    let variable = unsafe { payload::<Variable>(data) };
    let key = unsafe { key_of("SET_VARIABLE", variable.key) }?;
    let value = unsafe { key_of("SET_VARIABLE", variable.value) }?;
    if ctx.options.set_from_core(key, value) {
        Ok(())
    } else {
        Err(EnvironmentCommandError::UnknownVariable {
            command: "SET_VARIABLE",
            key: key.to_owned(),
        })
    }
}

unsafe fn get_core_options_version(_ctx: &mut SessionContext, data: *mut c_void) -> HandlerResult {
    unsafe { write::<c_uint>(data, CORE_OPTIONS_VERSION) };
    Ok(())
}

unsafe fn set_core_options(ctx: &mut SessionContext, data: *mut c_void) -> HandlerResult {
    let count = unsafe { ctx.options.set_core_options(data.cast::<CoreOptionDefinition>()) };
    tracing::debug!(count, "core declared options (v1)");
    Ok(())
}

unsafe fn set_core_options_intl(ctx: &mut SessionContext, data: *mut c_void) -> HandlerResult {
    let count = unsafe { ctx.options.set_core_options_intl(payload::<CoreOptionsIntl>(data)) };
    tracing::debug!(count, "core declared options (v1 intl)");
    Ok(())
}

unsafe fn set_core_options_v2(ctx: &mut SessionContext, data: *mut c_void) -> HandlerResult {
    let count = unsafe { ctx.options.set_core_options_v2(payload::<CoreOptionsV2>(data)) };
    tracing::debug!(count, "core declared options (v2)");
    Ok(())
}

unsafe fn set_core_options_v2_intl(ctx: &mut SessionContext, data: *mut c_void) -> HandlerResult {
    let count =
        unsafe { ctx.options.set_core_options_v2_intl(payload::<CoreOptionsV2Intl>(data)) };
    tracing::debug!(count, "core declared options (v2 intl)");
    Ok(())
}

unsafe fn set_core_options_display(ctx: &mut SessionContext, data: *mut c_void) -> HandlerResult {
    let display = unsafe { payload::<CoreOptionDisplay>(data) };
    let key = unsafe { key_of("SET_CORE_OPTIONS_DISPLAY", display.key) }?;
    if ctx.options.set_visible(key, display.visible) {
        Ok(())
    } else {
        Err(EnvironmentCommandError::UnknownVariable {
            command: "SET_CORE_OPTIONS_DISPLAY",
            key: key.to_owned(),
        })
    }
}

unsafe fn set_update_display_callback(ctx: &mut SessionContext, data: *mut c_void) -> HandlerResult {
    ctx.options.update_display_callback = if data.is_null() {
        None
    } else {
        Some(*unsafe { payload::<CoreOptionsUpdateDisplayCallback>(data) })
    };
    Ok(())
}
