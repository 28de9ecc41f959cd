//! Content, disk control, frame timing and audio pacing commands.

use std::ffi::{c_uint, c_void};

use super::{Dispatcher, HandlerResult, Payload, payload, write};
use crate::abi::{
    self, AudioBufferStatusCallback, AudioCallback, DiskControlCallback, DiskControlExtCallback,
    EnvCommand, FrameTimeCallback, GameInfoExt, SystemContentInfoOverride,
};
use crate::disk::{self, DiskControl};
use crate::error::EnvironmentCommandError;
use crate::state::{ContentOverride, SessionContext};

pub(super) fn register(d: &mut Dispatcher) {
    d.add(EnvCommand::SetDiskControlInterface, Payload::Required, set_disk_control);
    d.add(EnvCommand::SetDiskControlExtInterface, Payload::Required, set_disk_control_ext);
    d.add(
        EnvCommand::GetDiskControlInterfaceVersion,
        Payload::Required,
        get_disk_control_interface_version,
    );
    d.add(EnvCommand::SetFrameTimeCallback, Payload::Required, set_frame_time_callback);
    d.add(EnvCommand::SetAudioCallback, Payload::Required, set_audio_callback);
    d.add(
        EnvCommand::SetAudioBufferStatusCallback,
        Payload::Optional,
        set_audio_buffer_status_callback,
    );
    d.add(EnvCommand::SetMinimumAudioLatency, Payload::Required, set_minimum_audio_latency);
    d.add(EnvCommand::SetContentInfoOverride, Payload::Optional, set_content_info_override);
    d.add(EnvCommand::GetGameInfoExt, Payload::Required, get_game_info_ext);
}

unsafe fn set_disk_control(ctx: &mut SessionContext, data: *mut c_void) -> HandlerResult {
    ctx.disk = Some(DiskControl::basic(*unsafe { payload::<DiskControlCallback>(data) }));
    tracing::debug!("disk control interface registered");
    Ok(())
}

unsafe fn set_disk_control_ext(ctx: &mut SessionContext, data: *mut c_void) -> HandlerResult {
    ctx.disk = Some(DiskControl::extended(*unsafe {
        payload::<DiskControlExtCallback>(data)
    }));
    tracing::debug!("extended disk control interface registered");
    Ok(())
}

unsafe fn get_disk_control_interface_version(
    _ctx: &mut SessionContext,
    data: *mut c_void,
) -> HandlerResult {
    unsafe { write::<c_uint>(data, disk::INTERFACE_VERSION) };
    Ok(())
}

unsafe fn set_frame_time_callback(ctx: &mut SessionContext, data: *mut c_void) -> HandlerResult {
    let callback = *unsafe { payload::<FrameTimeCallback>(data) };
    ctx.frame_time = callback.callback.is_some().then_some(callback);
    Ok(())
}

unsafe fn set_audio_callback(ctx: &mut SessionContext, data: *mut c_void) -> HandlerResult {
    let callback = *unsafe { payload::<AudioCallback>(data) };
    ctx.audio.callback = callback.callback.is_some().then_some(callback);
    Ok(())
}

unsafe fn set_audio_buffer_status_callback(
    ctx: &mut SessionContext,
    data: *mut c_void,
) -> HandlerResult {
    ctx.audio.buffer_status = if data.is_null() {
        None
    } else {
        unsafe { payload::<AudioBufferStatusCallback>(data) }.callback
    };
    Ok(())
}

unsafe fn set_minimum_audio_latency(ctx: &mut SessionContext, data: *mut c_void) -> HandlerResult {
    ctx.audio.minimum_latency_ms = unsafe { *payload::<c_uint>(data) };
    Ok(())
}

unsafe fn set_content_info_override(ctx: &mut SessionContext, data: *mut c_void) -> HandlerResult {
    // Null asks whether overrides are supported.
    if data.is_null() {
        return Ok(());
    }
    let mut entry = data.cast::<SystemContentInfoOverride>().cast_const();
    ctx.content_overrides.clear();
    // SAFETY: the array is terminated by an entry with null `extensions`.
    unsafe {
        while let Some(o) = entry.as_ref() {
            let Some(extensions) = abi::cstr::to_str(o.extensions) else {
                break;
            };
            ctx.content_overrides.push(ContentOverride {
                extensions: extensions
                    .split('|')
                    .filter(|e| !e.is_empty())
                    .map(str::to_lowercase)
                    .collect(),
                need_fullpath: o.need_fullpath,
                persistent_data: o.persistent_data,
            });
            entry = entry.add(1);
        }
    }
    tracing::debug!(count = ctx.content_overrides.len(), "content info overrides");
    Ok(())
}

unsafe fn get_game_info_ext(ctx: &mut SessionContext, data: *mut c_void) -> HandlerResult {
    let content = ctx.content.as_ref().ok_or(EnvironmentCommandError::Unavailable {
        command: "GET_GAME_INFO_EXT",
        reason: "no content is loaded",
    })?;
    unsafe { write::<*const GameInfoExt>(data, content.ext()) };
    Ok(())
}
