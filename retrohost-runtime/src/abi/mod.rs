//! retrohost ABI module
//!
//! This module defines the binary contract between:
//! - **Frontend**: `retrohost-runtime` (this crate)
//! - **Core**: a native shared library exporting the `retro_*` entry points
//!
//! ## Where the layouts come from
//! The classic structures (`retro_game_info`, `retro_system_info`, `retro_system_av_info`,
//! `retro_variable`, ...) and the input device classes are re-exported from `libretro-sys`.
//! Everything added to the protocol after that crate was cut (core options v1/v2, VFS,
//! disk control ext, message ext, LED, throttle state, ...) is declared here with
//! `#[repr(C)]` and must match `libretro.h` field for field.
//!
//! ## Callbacks the core receives
//! All callbacks handed to the core are bare function pointers without a user-data slot.
//! The frontend implementations live in `crate::runtime::callbacks` and route through the
//! thread-keyed registry in `crate::state::registry`.
//!
//! ## Environment commands
//! The environment ids are enumerated in [`environment::EnvCommand`].

pub mod environment;

use std::ffi::{c_char, c_int, c_uint, c_void};

pub use environment::EnvCommand;
pub use libretro_sys::{
    DEVICE_ANALOG, DEVICE_JOYPAD, DEVICE_KEYBOARD, DEVICE_LIGHTGUN, DEVICE_MOUSE, DEVICE_NONE,
    DEVICE_POINTER, GameGeometry, GameInfo, SystemAvInfo, SystemInfo, SystemTiming, Variable,
};

/// `RETRO_API_VERSION` expected from `retro_api_version()`.
pub const API_VERSION: u32 = 1;

/// Low bits of a device id select the device class; the rest is a subclass.
pub const DEVICE_MASK: u32 = 0xff;

/// `RETRO_HW_FRAME_BUFFER_VALID`: passed as `data` to video refresh when the frame lives
/// in the hardware framebuffer instead of system memory.
pub const HW_FRAME_BUFFER_VALID: usize = usize::MAX;

/// Maximum number of values a v1/v2 core option definition can carry.
pub const NUM_CORE_OPTION_VALUES_MAX: usize = 128;

/// `RETRO_MEMORY_SAVE_RAM`.
pub const MEMORY_SAVE_RAM: u32 = 0;

/// `retro_log_level`.
pub mod log_level {
    pub const DEBUG: u32 = 0;
    pub const INFO: u32 = 1;
    pub const WARN: u32 = 2;
    pub const ERROR: u32 = 3;
}

/// `retro_pixel_format`.
pub mod pixel_format {
    pub const ORGB1555: u32 = 0;
    pub const XRGB8888: u32 = 1;
    pub const RGB565: u32 = 2;
}

/// `retro_hw_context_type`.
pub mod hw_context {
    pub const NONE: u32 = 0;
    pub const OPENGL: u32 = 1;
    pub const OPENGLES2: u32 = 2;
    pub const OPENGL_CORE: u32 = 3;
    pub const OPENGLES3: u32 = 4;
    pub const OPENGLES_VERSION: u32 = 5;
    pub const VULKAN: u32 = 6;
    pub const D3D11: u32 = 7;
    pub const D3D10: u32 = 8;
    pub const D3D12: u32 = 9;
    pub const D3D9: u32 = 10;
}

/// `retro_throttle_state::mode`.
pub mod throttle_mode {
    pub const NONE: u32 = 0;
    pub const FRAME_STEPPING: u32 = 1;
    pub const FAST_FORWARD: u32 = 2;
    pub const SLOW_MOTION: u32 = 3;
    pub const REWINDING: u32 = 4;
    pub const VSYNC: u32 = 5;
    pub const UNBLOCKED: u32 = 6;
}

/// `retro_savestate_context`.
pub mod savestate_context {
    pub const NORMAL: i32 = 0;
    pub const RUNAHEAD_SAME_INSTANCE: i32 = 1;
    pub const RUNAHEAD_SAME_BINARY: i32 = 2;
    pub const ROLLBACK_NETPLAY: i32 = 3;
}

/// `RETRO_SERIALIZATION_QUIRK_*` bits set through `SET_SERIALIZATION_QUIRKS`.
pub mod serialization_quirk {
    pub const INCOMPLETE: u64 = 1 << 0;
    pub const MUST_INITIALIZE: u64 = 1 << 1;
    pub const CORE_VARIABLE_SIZE: u64 = 1 << 2;
    pub const FRONT_VARIABLE_SIZE: u64 = 1 << 3;
    pub const SINGLE_SESSION: u64 = 1 << 4;
    pub const ENDIAN_DEPENDENT: u64 = 1 << 5;
    pub const PLATFORM_DEPENDENT: u64 = 1 << 6;
}

/// Bits reported by `GET_AUDIO_VIDEO_ENABLE`.
pub mod av_enable {
    use super::c_int;

    pub const VIDEO: c_int = 1 << 0;
    pub const AUDIO: c_int = 1 << 1;
}

/// VFS open modes, hints and seek origins.
pub mod vfs_flags {
    pub const ACCESS_READ: u32 = 1 << 0;
    pub const ACCESS_WRITE: u32 = 1 << 1;
    pub const ACCESS_READ_WRITE: u32 = ACCESS_READ | ACCESS_WRITE;
    pub const ACCESS_UPDATE_EXISTING: u32 = 1 << 2;

    pub const SEEK_POSITION_START: i32 = 0;
    pub const SEEK_POSITION_CURRENT: i32 = 1;
    pub const SEEK_POSITION_END: i32 = 2;
}

/// `RETRO_DEVICE_ID_*` / `RETRO_DEVICE_INDEX_*` values the input bridge interprets.
pub mod device_id {
    /// Joypad: query all buttons at once as a bitmask (`GET_INPUT_BITMASKS`).
    pub const JOYPAD_MASK: u32 = 256;
    pub const JOYPAD_BUTTONS: u32 = 16;

    pub const MOUSE_X: u32 = 0;
    pub const MOUSE_Y: u32 = 1;

    pub const LIGHTGUN_SCREEN_X: u32 = 13;
    pub const LIGHTGUN_SCREEN_Y: u32 = 14;
    pub const LIGHTGUN_IS_OFFSCREEN: u32 = 15;

    pub const ANALOG_X: u32 = 0;
    pub const ANALOG_Y: u32 = 1;
    pub const INDEX_ANALOG_LEFT: u32 = 0;
    pub const INDEX_ANALOG_RIGHT: u32 = 1;
    pub const INDEX_ANALOG_BUTTON: u32 = 2;

    pub const POINTER_X: u32 = 0;
    pub const POINTER_Y: u32 = 1;
    pub const POINTER_PRESSED: u32 = 2;
    pub const POINTER_COUNT: u32 = 3;
}

// --- Frontend callbacks set through `retro_set_*` ---

pub type EnvironmentFn = unsafe extern "C" fn(cmd: c_uint, data: *mut c_void) -> bool;
pub type VideoRefreshFn =
    unsafe extern "C" fn(data: *const c_void, width: c_uint, height: c_uint, pitch: usize);
pub type AudioSampleFn = unsafe extern "C" fn(left: i16, right: i16);
pub type AudioSampleBatchFn = unsafe extern "C" fn(data: *const i16, frames: usize) -> usize;
pub type InputPollFn = unsafe extern "C" fn();
pub type InputStateFn =
    unsafe extern "C" fn(port: c_uint, device: c_uint, index: c_uint, id: c_uint) -> i16;

// --- Logging / messages / LED ---

/// `retro_log_printf_t`.
///
/// The C declaration is variadic. Stable Rust cannot define a variadic function, so the
/// frontend implementation only reads the fixed arguments and forwards the format string
/// verbatim.
pub type LogPrintfFn = unsafe extern "C" fn(level: c_uint, fmt: *const c_char);

#[repr(C)]
pub struct LogCallback {
    pub log: Option<LogPrintfFn>,
}

#[repr(C)]
pub struct Message {
    pub msg: *const c_char,
    pub frames: c_uint,
}

#[repr(C)]
pub struct MessageExt {
    pub msg: *const c_char,
    pub duration: c_uint,
    pub priority: c_uint,
    pub level: c_uint,
    pub target: c_uint,
    pub kind: c_uint,
    pub progress: i8,
}

pub type SetLedStateFn = unsafe extern "C" fn(led: c_int, state: c_int);

#[repr(C)]
pub struct LedInterface {
    pub set_led_state: Option<SetLedStateFn>,
}

// --- Input ---

#[repr(C)]
pub struct InputDescriptor {
    pub port: c_uint,
    pub device: c_uint,
    pub index: c_uint,
    pub id: c_uint,
    pub description: *const c_char,
}

#[repr(C)]
pub struct ControllerDescription {
    pub desc: *const c_char,
    pub id: c_uint,
}

#[repr(C)]
pub struct ControllerInfo {
    pub types: *const ControllerDescription,
    pub num_types: c_uint,
}

pub type SetRumbleStateFn = unsafe extern "C" fn(port: c_uint, effect: c_uint, strength: u16) -> bool;

#[repr(C)]
pub struct RumbleInterface {
    pub set_rumble_state: Option<SetRumbleStateFn>,
}

pub type KeyboardEventFn =
    unsafe extern "C" fn(down: bool, keycode: c_uint, character: u32, key_modifiers: u16);

#[repr(C)]
#[derive(Clone, Copy)]
pub struct KeyboardCallback {
    pub callback: Option<KeyboardEventFn>,
}

// --- Options ---

#[repr(C)]
#[derive(Clone, Copy)]
pub struct CoreOptionValue {
    pub value: *const c_char,
    pub label: *const c_char,
}

#[repr(C)]
pub struct CoreOptionDefinition {
    pub key: *const c_char,
    pub desc: *const c_char,
    pub info: *const c_char,
    pub values: [CoreOptionValue; NUM_CORE_OPTION_VALUES_MAX],
    pub default_value: *const c_char,
}

#[repr(C)]
pub struct CoreOptionsIntl {
    pub us: *const CoreOptionDefinition,
    pub local: *const CoreOptionDefinition,
}

#[repr(C)]
pub struct CoreOptionV2Category {
    pub key: *const c_char,
    pub desc: *const c_char,
    pub info: *const c_char,
}

#[repr(C)]
pub struct CoreOptionV2Definition {
    pub key: *const c_char,
    pub desc: *const c_char,
    pub desc_categorized: *const c_char,
    pub info: *const c_char,
    pub info_categorized: *const c_char,
    pub category_key: *const c_char,
    pub values: [CoreOptionValue; NUM_CORE_OPTION_VALUES_MAX],
    pub default_value: *const c_char,
}

#[repr(C)]
pub struct CoreOptionsV2 {
    pub categories: *const CoreOptionV2Category,
    pub definitions: *const CoreOptionV2Definition,
}

#[repr(C)]
pub struct CoreOptionsV2Intl {
    pub us: *const CoreOptionsV2,
    pub local: *const CoreOptionsV2,
}

#[repr(C)]
pub struct CoreOptionDisplay {
    pub key: *const c_char,
    pub visible: bool,
}

#[repr(C)]
#[derive(Clone, Copy)]
pub struct CoreOptionsUpdateDisplayCallback {
    pub callback: Option<unsafe extern "C" fn() -> bool>,
}

// --- Hardware rendering ---

/// `retro_proc_address_t`.
pub type ProcAddress = Option<unsafe extern "C" fn()>;
pub type HwContextFn = unsafe extern "C" fn();
pub type HwGetCurrentFramebufferFn = unsafe extern "C" fn() -> usize;
pub type HwGetProcAddressFn = unsafe extern "C" fn(sym: *const c_char) -> ProcAddress;

#[repr(C)]
pub struct HwRenderCallback {
    pub context_type: c_uint,
    pub context_reset: Option<HwContextFn>,
    pub get_current_framebuffer: Option<HwGetCurrentFramebufferFn>,
    pub get_proc_address: Option<HwGetProcAddressFn>,
    pub depth: bool,
    pub stencil: bool,
    pub bottom_left_origin: bool,
    pub version_major: c_uint,
    pub version_minor: c_uint,
    pub cache_context: bool,
    pub context_destroy: Option<HwContextFn>,
    pub debug_context: bool,
}

#[repr(C)]
#[derive(Clone, Copy)]
pub struct GetProcAddressInterface {
    pub get_proc_address: Option<HwGetProcAddressFn>,
}

// --- Timing / audio ---

pub type FrameTimeFn = unsafe extern "C" fn(usec: i64);

#[repr(C)]
#[derive(Clone, Copy)]
pub struct FrameTimeCallback {
    pub callback: Option<FrameTimeFn>,
    pub reference: i64,
}

#[repr(C)]
#[derive(Clone, Copy)]
pub struct AudioCallback {
    pub callback: Option<unsafe extern "C" fn()>,
    pub set_state: Option<unsafe extern "C" fn(enabled: bool)>,
}

pub type AudioBufferStatusFn =
    unsafe extern "C" fn(active: bool, occupancy: c_uint, underrun_likely: bool);

#[repr(C)]
#[derive(Clone, Copy)]
pub struct AudioBufferStatusCallback {
    pub callback: Option<AudioBufferStatusFn>,
}

#[repr(C)]
pub struct FastforwardingOverride {
    pub ratio: f32,
    pub fastforward: bool,
    pub notification: bool,
    pub inhibit_toggle: bool,
}

#[repr(C)]
pub struct ThrottleState {
    pub mode: c_uint,
    pub rate: f32,
}

// --- Content ---

#[repr(C)]
pub struct SystemContentInfoOverride {
    pub extensions: *const c_char,
    pub need_fullpath: bool,
    pub persistent_data: bool,
}

#[repr(C)]
#[derive(Debug)]
pub struct GameInfoExt {
    pub full_path: *const c_char,
    pub archive_path: *const c_char,
    pub archive_file: *const c_char,
    pub dir: *const c_char,
    pub name: *const c_char,
    pub ext: *const c_char,
    pub meta: *const c_char,
    pub data: *const c_void,
    pub size: usize,
    pub file_in_archive: bool,
    pub persistent_data: bool,
}

// --- Disk control ---

#[repr(C)]
#[derive(Clone, Copy)]
pub struct DiskControlCallback {
    pub set_eject_state: Option<unsafe extern "C" fn(ejected: bool) -> bool>,
    pub get_eject_state: Option<unsafe extern "C" fn() -> bool>,
    pub get_image_index: Option<unsafe extern "C" fn() -> c_uint>,
    pub set_image_index: Option<unsafe extern "C" fn(index: c_uint) -> bool>,
    pub get_num_images: Option<unsafe extern "C" fn() -> c_uint>,
    pub replace_image_index:
        Option<unsafe extern "C" fn(index: c_uint, info: *const GameInfo) -> bool>,
    pub add_image_index: Option<unsafe extern "C" fn() -> bool>,
}

#[repr(C)]
#[derive(Clone, Copy)]
pub struct DiskControlExtCallback {
    pub set_eject_state: Option<unsafe extern "C" fn(ejected: bool) -> bool>,
    pub get_eject_state: Option<unsafe extern "C" fn() -> bool>,
    pub get_image_index: Option<unsafe extern "C" fn() -> c_uint>,
    pub set_image_index: Option<unsafe extern "C" fn(index: c_uint) -> bool>,
    pub get_num_images: Option<unsafe extern "C" fn() -> c_uint>,
    pub replace_image_index:
        Option<unsafe extern "C" fn(index: c_uint, info: *const GameInfo) -> bool>,
    pub add_image_index: Option<unsafe extern "C" fn() -> bool>,
    pub set_initial_image: Option<unsafe extern "C" fn(index: c_uint, path: *const c_char) -> bool>,
    pub get_image_path:
        Option<unsafe extern "C" fn(index: c_uint, path: *mut c_char, len: usize) -> bool>,
    pub get_image_label:
        Option<unsafe extern "C" fn(index: c_uint, label: *mut c_char, len: usize) -> bool>,
}

// --- VFS ---

/// Opaque to the core; the frontend hands out table indices disguised as pointers.
#[repr(C)]
pub struct VfsFileHandle {
    _private: [u8; 0],
}

#[repr(C)]
pub struct VfsInterface {
    // v1
    pub get_path: Option<unsafe extern "C" fn(stream: *mut VfsFileHandle) -> *const c_char>,
    pub open: Option<
        unsafe extern "C" fn(path: *const c_char, mode: c_uint, hints: c_uint) -> *mut VfsFileHandle,
    >,
    pub close: Option<unsafe extern "C" fn(stream: *mut VfsFileHandle) -> c_int>,
    pub size: Option<unsafe extern "C" fn(stream: *mut VfsFileHandle) -> i64>,
    pub tell: Option<unsafe extern "C" fn(stream: *mut VfsFileHandle) -> i64>,
    pub seek:
        Option<unsafe extern "C" fn(stream: *mut VfsFileHandle, offset: i64, whence: c_int) -> i64>,
    pub read:
        Option<unsafe extern "C" fn(stream: *mut VfsFileHandle, buf: *mut c_void, len: u64) -> i64>,
    pub write: Option<
        unsafe extern "C" fn(stream: *mut VfsFileHandle, buf: *const c_void, len: u64) -> i64,
    >,
    pub flush: Option<unsafe extern "C" fn(stream: *mut VfsFileHandle) -> c_int>,
    pub remove: Option<unsafe extern "C" fn(path: *const c_char) -> c_int>,
    pub rename: Option<unsafe extern "C" fn(old: *const c_char, new: *const c_char) -> c_int>,
    // v2
    pub truncate: Option<unsafe extern "C" fn(stream: *mut VfsFileHandle, length: i64) -> i64>,
}

#[repr(C)]
pub struct VfsInterfaceInfo {
    pub required_interface_version: u32,
    pub iface: *const VfsInterface,
}

/// Helpers for reading C strings handed over by the core.
pub mod cstr {
    use std::ffi::{CStr, c_char};

    /// Borrow a NUL-terminated string, `None` for a null pointer or invalid UTF-8.
    ///
    /// # Safety
    /// `ptr` must be null or point to a NUL-terminated string valid for `'a`.
    pub unsafe fn to_str<'a>(ptr: *const c_char) -> Option<&'a str> {
        if ptr.is_null() {
            return None;
        }
        unsafe { CStr::from_ptr(ptr) }.to_str().ok()
    }

    /// Copy a NUL-terminated string, replacing invalid UTF-8. Null becomes `""`.
    ///
    /// # Safety
    /// Same as [`to_str`].
    pub unsafe fn to_owned_lossy(ptr: *const c_char) -> String {
        if ptr.is_null() {
            return String::new();
        }
        unsafe { CStr::from_ptr(ptr) }.to_string_lossy().into_owned()
    }
}
