//! Video negotiation commands.

use std::ffi::{c_int, c_uint, c_void};

use super::{Dispatcher, HandlerResult, Payload, payload, payload_mut, write};
use crate::abi::{EnvCommand, GameGeometry, HwRenderCallback, SystemAvInfo};
use crate::binding::AvInfo;
use crate::error::EnvironmentCommandError;
use crate::runtime::callbacks;
use crate::state::SessionContext;

pub(super) fn register(d: &mut Dispatcher) {
    d.add(EnvCommand::SetRotation, Payload::Required, set_rotation);
    d.add(EnvCommand::GetOverscan, Payload::Required, get_overscan);
    d.add(EnvCommand::GetCanDupe, Payload::Required, get_can_dupe);
    d.add(EnvCommand::SetPixelFormat, Payload::Required, set_pixel_format);
    d.add(EnvCommand::SetHwRender, Payload::Required, set_hw_render);
    d.add(EnvCommand::SetSystemAvInfo, Payload::Required, set_system_av_info);
    d.add(EnvCommand::SetGeometry, Payload::Required, set_geometry);
    d.add(EnvCommand::GetPreferredHwRender, Payload::Required, get_preferred_hw_render);
    d.add(EnvCommand::GetAudioVideoEnable, Payload::Required, get_audio_video_enable);
    d.add(EnvCommand::GetTargetRefreshRate, Payload::Required, get_target_refresh_rate);
}

unsafe fn set_rotation(ctx: &mut SessionContext, data: *mut c_void) -> HandlerResult {
    let rotation = unsafe { *payload::<c_uint>(data) };
    if rotation > 3 {
        return Err(EnvironmentCommandError::InvalidValue {
            command: "SET_ROTATION",
            value: rotation,
        });
    }
    ctx.graphics.rotation = rotation;
    Ok(())
}

unsafe fn get_overscan(ctx: &mut SessionContext, data: *mut c_void) -> HandlerResult {
    unsafe { write(data, ctx.overscan) };
    Ok(())
}

unsafe fn get_can_dupe(_ctx: &mut SessionContext, data: *mut c_void) -> HandlerResult {
    unsafe { write(data, true) };
    Ok(())
}

unsafe fn set_pixel_format(ctx: &mut SessionContext, data: *mut c_void) -> HandlerResult {
    let raw = unsafe { *payload::<c_uint>(data) };
    ctx.graphics.set_pixel_format(raw)
}

unsafe fn set_hw_render(ctx: &mut SessionContext, data: *mut c_void) -> HandlerResult {
    let callback = unsafe { payload_mut::<HwRenderCallback>(data) };
    ctx.graphics.negotiate_hw_render(
        callback,
        callbacks::hw_get_current_framebuffer,
        callbacks::hw_get_proc_address,
    )?;
    ctx.capabilities.hw_render = true;
    Ok(())
}

unsafe fn set_system_av_info(ctx: &mut SessionContext, data: *mut c_void) -> HandlerResult {
    let info = AvInfo::from_raw(unsafe { payload::<SystemAvInfo>(data) });
    tracing::info!(
        width = info.base_width,
        height = info.base_height,
        fps = info.fps,
        sample_rate = info.sample_rate,
        "core changed system av info"
    );
    ctx.audio.init(info.sample_rate);
    ctx.av_info = info;
    ctx.av_info_changed = true;
    Ok(())
}

unsafe fn set_geometry(ctx: &mut SessionContext, data: *mut c_void) -> HandlerResult {
    let geometry = unsafe { payload::<GameGeometry>(data) };
    ctx.av_info.apply_geometry(geometry);
    tracing::debug!(
        width = geometry.base_width,
        height = geometry.base_height,
        "core changed geometry"
    );
    Ok(())
}

unsafe fn get_preferred_hw_render(ctx: &mut SessionContext, data: *mut c_void) -> HandlerResult {
    let preferred = ctx.graphics.preferred_hw_context();
    if preferred == crate::abi::hw_context::NONE {
        return Err(EnvironmentCommandError::Unavailable {
            command: "GET_PREFERRED_HW_RENDER",
            reason: "graphics processor has no hardware context",
        });
    }
    unsafe { write::<c_uint>(data, preferred) };
    Ok(())
}

unsafe fn get_audio_video_enable(ctx: &mut SessionContext, data: *mut c_void) -> HandlerResult {
    unsafe { write::<c_int>(data, ctx.av_enable_flags()) };
    Ok(())
}

unsafe fn get_target_refresh_rate(ctx: &mut SessionContext, data: *mut c_void) -> HandlerResult {
    unsafe { write::<f32>(data, ctx.target_refresh_rate) };
    Ok(())
}
