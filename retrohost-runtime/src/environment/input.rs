//! Input commands.

use std::ffi::{c_uint, c_void};

use super::{Dispatcher, HandlerResult, Payload, payload, payload_mut, write};
use crate::abi::{ControllerInfo, EnvCommand, InputDescriptor, KeyboardCallback, RumbleInterface};
use crate::input::DEVICE_CAPABILITIES;
use crate::runtime::callbacks;
use crate::state::SessionContext;

pub(super) fn register(d: &mut Dispatcher) {
    d.add(EnvCommand::SetInputDescriptors, Payload::Required, set_input_descriptors);
    d.add(EnvCommand::SetKeyboardCallback, Payload::Required, set_keyboard_callback);
    d.add(EnvCommand::GetRumbleInterface, Payload::Required, get_rumble_interface);
    d.add(
        EnvCommand::GetInputDeviceCapabilities,
        Payload::Required,
        get_input_device_capabilities,
    );
    d.add(EnvCommand::SetControllerInfo, Payload::Required, set_controller_info);
    d.add(EnvCommand::GetInputBitmasks, Payload::Optional, get_input_bitmasks);
    d.add(EnvCommand::GetInputMaxUsers, Payload::Required, get_input_max_users);
}

unsafe fn set_input_descriptors(ctx: &mut SessionContext, data: *mut c_void) -> HandlerResult {
    unsafe { ctx.input.set_descriptors(data.cast::<InputDescriptor>()) };
    Ok(())
}

unsafe fn set_keyboard_callback(ctx: &mut SessionContext, data: *mut c_void) -> HandlerResult {
    ctx.input.keyboard_callback = Some(*unsafe { payload::<KeyboardCallback>(data) });
    Ok(())
}

unsafe fn get_rumble_interface(_ctx: &mut SessionContext, data: *mut c_void) -> HandlerResult {
    unsafe { payload_mut::<RumbleInterface>(data) }.set_rumble_state = Some(callbacks::rumble);
    Ok(())
}

unsafe fn get_input_device_capabilities(
    _ctx: &mut SessionContext,
    data: *mut c_void,
) -> HandlerResult {
    unsafe { write::<u64>(data, DEVICE_CAPABILITIES) };
    Ok(())
}

unsafe fn set_controller_info(ctx: &mut SessionContext, data: *mut c_void) -> HandlerResult {
    unsafe { ctx.input.set_controller_info(data.cast::<ControllerInfo>()) };
    Ok(())
}

unsafe fn get_input_bitmasks(_ctx: &mut SessionContext, data: *mut c_void) -> HandlerResult {
    if !data.is_null() {
        unsafe { write(data, true) };
    }
    Ok(())
}

unsafe fn get_input_max_users(ctx: &mut SessionContext, data: *mut c_void) -> HandlerResult {
    unsafe { write::<c_uint>(data, ctx.input.max_users) };
    Ok(())
}
