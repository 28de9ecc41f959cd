use std::ffi::{CStr, c_char, c_uint, c_void};
use std::path::Path;

use super::{UNSUPPORTED, dispatcher};
use crate::abi::{
    self, EnvCommand, GameGeometry, HwRenderCallback, SystemContentInfoOverride, ThrottleState,
    Variable, VfsInterfaceInfo, serialization_quirk, throttle_mode,
};
use crate::config::HostConfig;
use crate::options::{OptionScope, OptionsStore};
use crate::processor::Processors;
use crate::state::SessionContext;

fn context() -> SessionContext {
    SessionContext::new(&HostConfig::rooted_at(Path::new("/srv/retro")), Processors::default())
}

fn send<T>(ctx: &mut SessionContext, command: EnvCommand, value: &mut T) -> bool {
    unsafe { dispatcher().dispatch(ctx, command.raw(), (value as *mut T).cast()) }
}

fn send_null(ctx: &mut SessionContext, command: EnvCommand) -> bool {
    unsafe { dispatcher().dispatch(ctx, command.raw(), std::ptr::null_mut()) }
}

fn variables() -> [Variable; 3] {
    [
        Variable {
            key: c"fake_region".as_ptr(),
            value: c"Region; auto|ntsc|pal".as_ptr(),
        },
        Variable {
            key: c"fake_turbo".as_ptr(),
            value: c"Turbo; off|on".as_ptr(),
        },
        Variable {
            key: std::ptr::null(),
            value: std::ptr::null(),
        },
    ]
}

fn get_variable(ctx: &mut SessionContext, key: &CStr) -> Option<String> {
    let mut var = Variable {
        key: key.as_ptr(),
        value: std::ptr::null(),
    };
    send(ctx, EnvCommand::GetVariable, &mut var)
        .then(|| unsafe { abi::cstr::to_owned_lossy(var.value) })
}

#[test]
fn every_command_is_handled_or_declined() {
    for &command in EnvCommand::ALL {
        assert_ne!(
            dispatcher().is_supported(command),
            UNSUPPORTED.contains(&command),
            "{} must be either implemented or listed as unsupported",
            command.name()
        );
    }
}

#[test]
fn unknown_and_unsupported_commands_return_false() {
    let mut ctx = context();
    let mut scratch = [0u64; 8];
    assert!(!send(&mut ctx, EnvCommand::GetSensorInterface, &mut scratch));
    assert!(!send(&mut ctx, EnvCommand::GetMicrophoneInterface, &mut scratch));
    assert!(!unsafe { dispatcher().dispatch(&mut ctx, 4, scratch.as_mut_ptr().cast()) });
    assert!(!unsafe { dispatcher().dispatch(&mut ctx, 0xdead, std::ptr::null_mut()) });
}

#[test]
fn null_payload_fails_required_commands_only() {
    let mut ctx = context();
    assert!(!send_null(&mut ctx, EnvCommand::GetVariable));
    assert!(!send_null(&mut ctx, EnvCommand::SetPixelFormat));
    assert!(send_null(&mut ctx, EnvCommand::SetVariable));
    assert!(send_null(&mut ctx, EnvCommand::GetInputBitmasks));
    assert!(send_null(&mut ctx, EnvCommand::Shutdown));
    assert!(ctx.shutdown_requested);
}

#[test]
fn pixel_format_is_validated() {
    let mut ctx = context();
    let mut format: c_uint = abi::pixel_format::RGB565;
    assert!(send(&mut ctx, EnvCommand::SetPixelFormat, &mut format));
    assert_eq!(ctx.graphics.pixel_format(), crate::av::PixelFormat::Rgb565);

    let mut bogus: c_uint = 7;
    assert!(!send(&mut ctx, EnvCommand::SetPixelFormat, &mut bogus));
    assert_eq!(ctx.graphics.pixel_format(), crate::av::PixelFormat::Rgb565);
}

#[test]
fn variables_resolve_game_then_core() {
    let dir = tempfile::tempdir().unwrap();
    let mut ctx = context();
    ctx.options = OptionsStore::new(Some(dir.path()), "fake");
    ctx.options.set_game(Some("mario"));

    let mut vars = variables();
    assert!(send(&mut ctx, EnvCommand::SetVariables, &mut vars[0]));
    assert_eq!(get_variable(&mut ctx, c"fake_turbo").as_deref(), Some("off"));

    assert!(ctx.options.set_value(OptionScope::Game, "fake_turbo", "on"));
    assert_eq!(get_variable(&mut ctx, c"fake_turbo").as_deref(), Some("on"));
    assert_eq!(get_variable(&mut ctx, c"fake_missing"), None);

    let mut updated = false;
    assert!(send(&mut ctx, EnvCommand::GetVariableUpdate, &mut updated));
    assert!(updated);
    assert!(send(&mut ctx, EnvCommand::GetVariableUpdate, &mut updated));
    assert!(!updated);
}

#[test]
fn core_can_change_its_own_variable() {
    let mut ctx = context();
    let mut vars = variables();
    send(&mut ctx, EnvCommand::SetVariables, &mut vars[0]);

    let mut set = Variable {
        key: c"fake_region".as_ptr(),
        value: c"pal".as_ptr(),
    };
    assert!(send(&mut ctx, EnvCommand::SetVariable, &mut set));
    assert_eq!(ctx.options.get("fake_region"), Some("pal"));

    set.value = c"secam".as_ptr();
    assert!(!send(&mut ctx, EnvCommand::SetVariable, &mut set));
}

#[test]
fn directories_and_identity_come_from_config() {
    let mut ctx = context();
    let mut ptr: *const c_char = std::ptr::null();
    assert!(send(&mut ctx, EnvCommand::GetSystemDirectory, &mut ptr));
    assert_eq!(unsafe { abi::cstr::to_str(ptr) }, Some("/srv/retro/system"));
    assert!(send(&mut ctx, EnvCommand::GetSaveDirectory, &mut ptr));
    assert_eq!(unsafe { abi::cstr::to_str(ptr) }, Some("/srv/retro/saves"));
    assert!(send(&mut ctx, EnvCommand::GetUsername, &mut ptr));
    assert_eq!(unsafe { abi::cstr::to_str(ptr) }, Some("retrohost"));

    // In-process cores have no library path.
    assert!(!send(&mut ctx, EnvCommand::GetLibretroPath, &mut ptr));
}

#[test]
fn vfs_version_is_capped() {
    let mut ctx = context();
    let mut info = VfsInterfaceInfo {
        required_interface_version: 1,
        iface: std::ptr::null(),
    };
    assert!(send(&mut ctx, EnvCommand::GetVfsInterface, &mut info));
    assert_eq!(info.required_interface_version, crate::vfs::SUPPORTED_VERSION);
    assert!(!info.iface.is_null());

    let mut too_new = VfsInterfaceInfo {
        required_interface_version: 3,
        iface: std::ptr::null(),
    };
    assert!(!send(&mut ctx, EnvCommand::GetVfsInterface, &mut too_new));
    assert!(too_new.iface.is_null());
}

#[test]
fn hw_render_fails_without_a_context_provider() {
    let mut ctx = context();
    let mut callback = HwRenderCallback {
        context_type: abi::hw_context::OPENGL_CORE,
        context_reset: None,
        get_current_framebuffer: None,
        get_proc_address: None,
        depth: true,
        stencil: false,
        bottom_left_origin: true,
        version_major: 3,
        version_minor: 3,
        cache_context: false,
        context_destroy: None,
        debug_context: false,
    };
    assert!(!send(&mut ctx, EnvCommand::SetHwRender, &mut callback));
    assert!(callback.get_current_framebuffer.is_none());
    assert!(!ctx.capabilities.hw_render);

    let mut preferred: c_uint = 0;
    assert!(!send(&mut ctx, EnvCommand::GetPreferredHwRender, &mut preferred));
}

#[test]
fn geometry_updates_av_info() {
    let mut ctx = context();
    ctx.av_info.fps = 60.0;
    let mut geometry = GameGeometry {
        base_width: 320,
        base_height: 240,
        max_width: 640,
        max_height: 480,
        aspect_ratio: 4.0 / 3.0,
    };
    assert!(send(&mut ctx, EnvCommand::SetGeometry, &mut geometry));
    assert_eq!((ctx.av_info.base_width, ctx.av_info.max_height), (320, 480));
    assert_eq!(ctx.av_info.fps, 60.0);
}

#[test]
fn rotation_is_bounded() {
    let mut ctx = context();
    let mut rotation: c_uint = 1;
    assert!(send(&mut ctx, EnvCommand::SetRotation, &mut rotation));
    let mut rotation: c_uint = 4;
    assert!(!send(&mut ctx, EnvCommand::SetRotation, &mut rotation));
    assert_eq!(ctx.graphics.rotation, 1);
}

#[test]
fn serialization_quirks_are_masked() {
    let mut ctx = context();
    let mut quirks =
        serialization_quirk::CORE_VARIABLE_SIZE | serialization_quirk::FRONT_VARIABLE_SIZE;
    assert!(send(&mut ctx, EnvCommand::SetSerializationQuirks, &mut quirks));
    assert_eq!(quirks, serialization_quirk::CORE_VARIABLE_SIZE);
    assert_eq!(ctx.serialization_quirks, quirks);
}

#[test]
fn content_overrides_are_parsed() {
    let mut ctx = context();
    let mut overrides = [
        SystemContentInfoOverride {
            extensions: c"CUE|chd".as_ptr(),
            need_fullpath: true,
            persistent_data: false,
        },
        SystemContentInfoOverride {
            extensions: std::ptr::null(),
            need_fullpath: false,
            persistent_data: false,
        },
    ];
    assert!(send(&mut ctx, EnvCommand::SetContentInfoOverride, &mut overrides[0]));
    assert_eq!(ctx.content_overrides.len(), 1);
    assert_eq!(ctx.content_overrides[0].extensions, vec!["cue", "chd"]);
}

#[test]
fn game_info_ext_needs_content() {
    let mut ctx = context();
    let mut ptr: *const c_void = std::ptr::null();
    assert!(!send(&mut ctx, EnvCommand::GetGameInfoExt, &mut ptr));
}

#[test]
fn throttle_and_fastforward_reflect_the_session() {
    let mut ctx = context();
    ctx.av_info.fps = 50.0;
    ctx.fast_forward = true;

    let mut fast = false;
    assert!(send(&mut ctx, EnvCommand::GetFastforwarding, &mut fast));
    assert!(fast);

    let mut state = ThrottleState { mode: 0, rate: 0.0 };
    assert!(send(&mut ctx, EnvCommand::GetThrottleState, &mut state));
    assert_eq!(state.mode, throttle_mode::FAST_FORWARD);
}

#[test]
fn capability_queries() {
    let mut ctx = context();
    let mut caps = 0u64;
    assert!(send(&mut ctx, EnvCommand::GetInputDeviceCapabilities, &mut caps));
    assert_ne!(caps & (1 << abi::DEVICE_ANALOG), 0);

    let mut users: c_uint = 0;
    assert!(send(&mut ctx, EnvCommand::GetInputMaxUsers, &mut users));
    assert_eq!(users, 8);

    let mut flags = 0i32;
    assert!(send(&mut ctx, EnvCommand::GetAudioVideoEnable, &mut flags));
    assert_eq!(flags, abi::av_enable::VIDEO | abi::av_enable::AUDIO);

    let mut version: c_uint = 0;
    assert!(send(&mut ctx, EnvCommand::GetCoreOptionsVersion, &mut version));
    assert_eq!(version, 2);
}
