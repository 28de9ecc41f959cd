//! Frontend identity, directories, logging and messaging, timing state.

use std::ffi::{CStr, c_char, c_int, c_uint, c_void};

use super::{Dispatcher, HandlerResult, Payload, payload, payload_mut, write};
use crate::abi::{
    EnvCommand, FastforwardingOverride, GetProcAddressInterface, LedInterface, LogCallback,
    Message, MessageExt, ThrottleState, VfsInterfaceInfo, serialization_quirk,
};
use crate::error::EnvironmentCommandError;
use crate::messages::MESSAGE_INTERFACE_VERSION;
use crate::runtime::callbacks;
use crate::state::{FastforwardOverride, SessionContext};
use crate::vfs;

/// Serialization quirks the session knows how to honor; others are cleared.
const SUPPORTED_QUIRKS: u64 = serialization_quirk::INCOMPLETE
    | serialization_quirk::MUST_INITIALIZE
    | serialization_quirk::CORE_VARIABLE_SIZE
    | serialization_quirk::SINGLE_SESSION
    | serialization_quirk::ENDIAN_DEPENDENT
    | serialization_quirk::PLATFORM_DEPENDENT;

pub(super) fn register(d: &mut Dispatcher) {
    d.add(EnvCommand::Shutdown, Payload::Optional, shutdown);
    d.add(EnvCommand::SetPerformanceLevel, Payload::Required, set_performance_level);
    d.add(EnvCommand::GetSystemDirectory, Payload::Required, get_system_directory);
    d.add(EnvCommand::GetSaveDirectory, Payload::Required, get_save_directory);
    d.add(EnvCommand::GetCoreAssetsDirectory, Payload::Required, get_core_assets_directory);
    d.add(EnvCommand::GetPlaylistDirectory, Payload::Required, get_playlist_directory);
    d.add(EnvCommand::GetLibretroPath, Payload::Required, get_libretro_path);
    d.add(EnvCommand::SetSupportNoGame, Payload::Required, set_support_no_game);
    d.add(EnvCommand::GetUsername, Payload::Required, get_username);
    d.add(EnvCommand::GetLanguage, Payload::Required, get_language);
    d.add(EnvCommand::GetLogInterface, Payload::Required, get_log_interface);
    d.add(EnvCommand::SetMessage, Payload::Required, set_message);
    d.add(EnvCommand::SetMessageExt, Payload::Required, set_message_ext);
    d.add(
        EnvCommand::GetMessageInterfaceVersion,
        Payload::Required,
        get_message_interface_version,
    );
    d.add(EnvCommand::GetLedInterface, Payload::Required, get_led_interface);
    d.add(EnvCommand::SetSupportAchievements, Payload::Required, set_support_achievements);
    d.add(EnvCommand::SetSerializationQuirks, Payload::Required, set_serialization_quirks);
    d.add(EnvCommand::GetSavestateContext, Payload::Required, get_savestate_context);
    d.add(EnvCommand::GetJitCapable, Payload::Required, get_jit_capable);
    d.add(EnvCommand::SetProcAddressCallback, Payload::Optional, set_proc_address_callback);
    d.add(EnvCommand::GetVfsInterface, Payload::Required, get_vfs_interface);
    d.add(EnvCommand::GetFastforwarding, Payload::Required, get_fastforwarding);
    d.add(
        EnvCommand::SetFastforwardingOverride,
        Payload::Optional,
        set_fastforwarding_override,
    );
    d.add(EnvCommand::GetThrottleState, Payload::Required, get_throttle_state);
}

unsafe fn shutdown(ctx: &mut SessionContext, _data: *mut c_void) -> HandlerResult {
    tracing::info!(core = %ctx.core_name, "core requested shutdown");
    ctx.shutdown_requested = true;
    Ok(())
}

unsafe fn set_performance_level(ctx: &mut SessionContext, data: *mut c_void) -> HandlerResult {
    ctx.performance_level = unsafe { *payload::<c_uint>(data) };
    tracing::debug!(level = ctx.performance_level, "core performance level");
    Ok(())
}

unsafe fn write_str(data: *mut c_void, value: &CStr) {
    unsafe { write::<*const c_char>(data, value.as_ptr()) };
}

unsafe fn get_system_directory(ctx: &mut SessionContext, data: *mut c_void) -> HandlerResult {
    unsafe { write_str(data, &ctx.directories.system) };
    Ok(())
}

unsafe fn get_save_directory(ctx: &mut SessionContext, data: *mut c_void) -> HandlerResult {
    unsafe { write_str(data, &ctx.directories.save) };
    Ok(())
}

unsafe fn get_core_assets_directory(ctx: &mut SessionContext, data: *mut c_void) -> HandlerResult {
    unsafe { write_str(data, &ctx.directories.core_assets) };
    Ok(())
}

unsafe fn get_playlist_directory(ctx: &mut SessionContext, data: *mut c_void) -> HandlerResult {
    unsafe { write_str(data, &ctx.directories.playlist) };
    Ok(())
}

unsafe fn get_libretro_path(ctx: &mut SessionContext, data: *mut c_void) -> HandlerResult {
    let path = ctx
        .directories
        .libretro
        .as_ref()
        .ok_or(EnvironmentCommandError::Unavailable {
            command: "GET_LIBRETRO_PATH",
            reason: "core was not loaded from a file",
        })?;
    unsafe { write_str(data, path) };
    Ok(())
}

unsafe fn set_support_no_game(ctx: &mut SessionContext, data: *mut c_void) -> HandlerResult {
    ctx.capabilities.supports_no_game = unsafe { *payload::<bool>(data) };
    Ok(())
}

unsafe fn get_username(ctx: &mut SessionContext, data: *mut c_void) -> HandlerResult {
    unsafe { write_str(data, &ctx.username) };
    Ok(())
}

unsafe fn get_language(ctx: &mut SessionContext, data: *mut c_void) -> HandlerResult {
    unsafe { write::<c_uint>(data, ctx.language) };
    Ok(())
}

unsafe fn get_log_interface(_ctx: &mut SessionContext, data: *mut c_void) -> HandlerResult {
    unsafe { payload_mut::<LogCallback>(data) }.log = Some(callbacks::log_printf);
    Ok(())
}

unsafe fn set_message(ctx: &mut SessionContext, data: *mut c_void) -> HandlerResult {
    unsafe { ctx.message.show(payload::<Message>(data)) };
    Ok(())
}

unsafe fn set_message_ext(ctx: &mut SessionContext, data: *mut c_void) -> HandlerResult {
    unsafe { ctx.message.show_ext(payload::<MessageExt>(data)) };
    Ok(())
}

unsafe fn get_message_interface_version(
    _ctx: &mut SessionContext,
    data: *mut c_void,
) -> HandlerResult {
    unsafe { write::<c_uint>(data, MESSAGE_INTERFACE_VERSION) };
    Ok(())
}

unsafe fn get_led_interface(_ctx: &mut SessionContext, data: *mut c_void) -> HandlerResult {
    unsafe { payload_mut::<LedInterface>(data) }.set_led_state = Some(callbacks::led);
    Ok(())
}

unsafe fn set_support_achievements(ctx: &mut SessionContext, data: *mut c_void) -> HandlerResult {
    ctx.support_achievements = unsafe { *payload::<bool>(data) };
    Ok(())
}

unsafe fn set_serialization_quirks(ctx: &mut SessionContext, data: *mut c_void) -> HandlerResult {
    let quirks = unsafe { payload_mut::<u64>(data) };
    *quirks &= SUPPORTED_QUIRKS;
    ctx.serialization_quirks = *quirks;
    tracing::debug!(quirks = *quirks, "serialization quirks");
    Ok(())
}

unsafe fn get_savestate_context(ctx: &mut SessionContext, data: *mut c_void) -> HandlerResult {
    unsafe { write::<c_int>(data, ctx.savestate_context) };
    Ok(())
}

unsafe fn get_jit_capable(ctx: &mut SessionContext, data: *mut c_void) -> HandlerResult {
    unsafe { write(data, ctx.jit_capable) };
    Ok(())
}

unsafe fn set_proc_address_callback(ctx: &mut SessionContext, data: *mut c_void) -> HandlerResult {
    ctx.proc_address = if data.is_null() {
        None
    } else {
        Some(*unsafe { payload::<GetProcAddressInterface>(data) })
    };
    Ok(())
}

unsafe fn get_vfs_interface(_ctx: &mut SessionContext, data: *mut c_void) -> HandlerResult {
    if vfs::negotiate(unsafe { payload_mut::<VfsInterfaceInfo>(data) }) {
        Ok(())
    } else {
        Err(EnvironmentCommandError::Unavailable {
            command: "GET_VFS_INTERFACE",
            reason: "requested interface version is newer than supported",
        })
    }
}

unsafe fn get_fastforwarding(ctx: &mut SessionContext, data: *mut c_void) -> HandlerResult {
    unsafe { write(data, ctx.is_fast_forwarding()) };
    Ok(())
}

unsafe fn set_fastforwarding_override(
    ctx: &mut SessionContext,
    data: *mut c_void,
) -> HandlerResult {
    // Null asks whether overrides are supported.
    if data.is_null() {
        return Ok(());
    }
    let o = unsafe { payload::<FastforwardingOverride>(data) };
    ctx.fastforward_override = Some(FastforwardOverride {
        ratio: o.ratio,
        fastforward: o.fastforward,
        notification: o.notification,
        inhibit_toggle: o.inhibit_toggle,
    });
    Ok(())
}

unsafe fn get_throttle_state(ctx: &mut SessionContext, data: *mut c_void) -> HandlerResult {
    let (mode, rate) = ctx.throttle_state();
    let state = unsafe { payload_mut::<ThrottleState>(data) };
    state.mode = mode;
    state.rate = rate;
    Ok(())
}
