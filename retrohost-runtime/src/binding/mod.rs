//! Core binding: the `retro_*` entry point table and the [`CoreLibrary`] that owns it.
//!
//! Required entry points must all resolve or the core is rejected. Optional ones resolve
//! to local stand-ins so callers never have to null-check.

use std::ffi::{CStr, c_char, c_uint, c_void};
use std::path::{Path, PathBuf};

use crate::abi::{
    self, AudioSampleBatchFn, AudioSampleFn, EnvironmentFn, GameGeometry, GameInfo,
    InputPollFn, InputStateFn, SystemAvInfo, SystemInfo, SystemTiming, VideoRefreshFn,
};
use crate::error::{BindingError, Result};
use crate::loader::DynamicLibrary;

pub type UnitFn = unsafe extern "C" fn();
pub type UintFn = unsafe extern "C" fn() -> c_uint;
pub type PortDeviceFn = unsafe extern "C" fn(port: c_uint, device: c_uint);
pub type CheatSetFn = unsafe extern "C" fn(index: c_uint, enabled: bool, code: *const c_char);
pub type LoadGameSpecialFn =
    unsafe extern "C" fn(game_type: c_uint, info: *const GameInfo, num_info: usize) -> bool;
pub type MemoryDataFn = unsafe extern "C" fn(id: c_uint) -> *mut c_void;
pub type MemorySizeFn = unsafe extern "C" fn(id: c_uint) -> usize;

/// Resolved `retro_*` entry points.
#[derive(Clone, Copy)]
pub struct CoreApi {
    pub set_environment: unsafe extern "C" fn(EnvironmentFn),
    pub set_video_refresh: unsafe extern "C" fn(VideoRefreshFn),
    pub set_audio_sample: unsafe extern "C" fn(AudioSampleFn),
    pub set_audio_sample_batch: unsafe extern "C" fn(AudioSampleBatchFn),
    pub set_input_poll: unsafe extern "C" fn(InputPollFn),
    pub set_input_state: unsafe extern "C" fn(InputStateFn),
    pub init: UnitFn,
    pub deinit: UnitFn,
    pub api_version: UintFn,
    pub get_system_info: unsafe extern "C" fn(*mut SystemInfo),
    pub get_system_av_info: unsafe extern "C" fn(*mut SystemAvInfo),
    pub set_controller_port_device: PortDeviceFn,
    pub reset: UnitFn,
    pub run: UnitFn,
    pub serialize_size: unsafe extern "C" fn() -> usize,
    pub serialize: unsafe extern "C" fn(data: *mut c_void, size: usize) -> bool,
    pub unserialize: unsafe extern "C" fn(data: *const c_void, size: usize) -> bool,
    pub cheat_reset: UnitFn,
    pub cheat_set: CheatSetFn,
    pub load_game: unsafe extern "C" fn(game: *const GameInfo) -> bool,
    pub load_game_special: LoadGameSpecialFn,
    pub unload_game: UnitFn,
    pub get_region: UintFn,
    pub get_memory_data: MemoryDataFn,
    pub get_memory_size: MemorySizeFn,
}

/// Names of the entry points that must be exported.
pub const REQUIRED_SYMBOLS: &[&str] = &[
    "retro_set_environment",
    "retro_set_video_refresh",
    "retro_set_audio_sample",
    "retro_set_audio_sample_batch",
    "retro_set_input_poll",
    "retro_set_input_state",
    "retro_init",
    "retro_deinit",
    "retro_get_system_info",
    "retro_get_system_av_info",
    "retro_run",
    "retro_serialize_size",
    "retro_serialize",
    "retro_unserialize",
    "retro_load_game",
    "retro_unload_game",
];

impl CoreApi {
    /// Resolve every entry point from a loaded library.
    pub fn resolve(library: &DynamicLibrary) -> Result<Self, BindingError> {
        // SAFETY: every symbol is resolved with the signature `libretro.h` declares for it.
        unsafe {
            Ok(Self {
                set_environment: library.get("retro_set_environment")?,
                set_video_refresh: library.get("retro_set_video_refresh")?,
                set_audio_sample: library.get("retro_set_audio_sample")?,
                set_audio_sample_batch: library.get("retro_set_audio_sample_batch")?,
                set_input_poll: library.get("retro_set_input_poll")?,
                set_input_state: library.get("retro_set_input_state")?,
                init: library.get("retro_init")?,
                deinit: library.get("retro_deinit")?,
                api_version: library
                    .get_optional::<UintFn>("retro_api_version")
                    .unwrap_or(fallback::api_version),
                get_system_info: library.get("retro_get_system_info")?,
                get_system_av_info: library.get("retro_get_system_av_info")?,
                set_controller_port_device: library
                    .get_optional::<PortDeviceFn>("retro_set_controller_port_device")
                    .unwrap_or(fallback::set_controller_port_device),
                reset: library.get_optional::<UnitFn>("retro_reset").unwrap_or(fallback::reset),
                run: library.get("retro_run")?,
                serialize_size: library.get("retro_serialize_size")?,
                serialize: library.get("retro_serialize")?,
                unserialize: library.get("retro_unserialize")?,
                cheat_reset: library
                    .get_optional::<UnitFn>("retro_cheat_reset")
                    .unwrap_or(fallback::cheat_reset),
                cheat_set: library
                    .get_optional::<CheatSetFn>("retro_cheat_set")
                    .unwrap_or(fallback::cheat_set),
                load_game: library.get("retro_load_game")?,
                load_game_special: library
                    .get_optional::<LoadGameSpecialFn>("retro_load_game_special")
                    .unwrap_or(fallback::load_game_special),
                unload_game: library.get("retro_unload_game")?,
                get_region: library
                    .get_optional::<UintFn>("retro_get_region")
                    .unwrap_or(fallback::get_region),
                get_memory_data: library
                    .get_optional::<MemoryDataFn>("retro_get_memory_data")
                    .unwrap_or(fallback::get_memory_data),
                get_memory_size: library
                    .get_optional::<MemorySizeFn>("retro_get_memory_size")
                    .unwrap_or(fallback::get_memory_size),
            })
        }
    }
}

/// Stand-ins for optional entry points a core did not export.
pub mod fallback {
    use super::*;

    pub unsafe extern "C" fn api_version() -> c_uint {
        abi::API_VERSION
    }
    pub unsafe extern "C" fn set_controller_port_device(_port: c_uint, _device: c_uint) {}
    pub unsafe extern "C" fn reset() {}
    pub unsafe extern "C" fn cheat_reset() {}
    pub unsafe extern "C" fn cheat_set(_index: c_uint, _enabled: bool, _code: *const c_char) {}
    pub unsafe extern "C" fn load_game_special(
        _game_type: c_uint,
        _info: *const GameInfo,
        _num_info: usize,
    ) -> bool {
        false
    }
    pub unsafe extern "C" fn get_region() -> c_uint {
        0
    }
    pub unsafe extern "C" fn get_memory_data(_id: c_uint) -> *mut c_void {
        std::ptr::null_mut()
    }
    pub unsafe extern "C" fn get_memory_size(_id: c_uint) -> usize {
        0
    }
}

/// Owned copy of `retro_system_info`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CoreSystemInfo {
    pub library_name: String,
    pub library_version: String,
    pub valid_extensions: Vec<String>,
    pub need_fullpath: bool,
    pub block_extract: bool,
}

/// Owned copy of `retro_system_av_info`.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct AvInfo {
    pub base_width: u32,
    pub base_height: u32,
    pub max_width: u32,
    pub max_height: u32,
    pub aspect_ratio: f32,
    pub fps: f64,
    pub sample_rate: f64,
}

impl AvInfo {
    /// Aspect ratio, falling back to `base_width / base_height` when the core reports
    /// zero or a negative value.
    pub fn effective_aspect_ratio(&self) -> f32 {
        if self.aspect_ratio > 0.0 {
            self.aspect_ratio
        } else if self.base_height != 0 {
            self.base_width as f32 / self.base_height as f32
        } else {
            1.0
        }
    }

    pub(crate) fn from_raw(raw: &SystemAvInfo) -> Self {
        Self {
            base_width: raw.geometry.base_width,
            base_height: raw.geometry.base_height,
            max_width: raw.geometry.max_width,
            max_height: raw.geometry.max_height,
            aspect_ratio: raw.geometry.aspect_ratio,
            fps: raw.timing.fps,
            sample_rate: raw.timing.sample_rate,
        }
    }

    /// Apply a `retro_game_geometry` update, keeping timing.
    pub(crate) fn apply_geometry(&mut self, geometry: &GameGeometry) {
        self.base_width = geometry.base_width;
        self.base_height = geometry.base_height;
        self.aspect_ratio = geometry.aspect_ratio;
        if geometry.max_width != 0 {
            self.max_width = geometry.max_width;
        }
        if geometry.max_height != 0 {
            self.max_height = geometry.max_height;
        }
    }
}

/// Capabilities a core declared through the environment callback.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CoreCapabilities {
    pub hw_render: bool,
    pub supports_no_game: bool,
}

/// A bound core: its library mapping (if any) plus the resolved entry points.
pub struct CoreLibrary {
    name: String,
    api: CoreApi,
    library: Option<DynamicLibrary>,
    system_info: CoreSystemInfo,
    pub(crate) capabilities: CoreCapabilities,
}

impl CoreLibrary {
    /// Load a core from disk and resolve its entry points.
    ///
    /// With `scratch_dir` set, the library is copied there before it is mapped.
    pub fn load(path: impl AsRef<Path>, scratch_dir: Option<&Path>) -> Result<Self> {
        let path = path.as_ref();
        let library = match scratch_dir {
            Some(dir) => DynamicLibrary::open_with_scratch(path, dir)?,
            None => DynamicLibrary::open(path)?,
        };
        let api = CoreApi::resolve(&library)?;

        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "core".to_owned());

        let mut core = Self::from_parts(name, api, Some(library));
        let version = core.api_version();
        if version != abi::API_VERSION {
            return Err(BindingError::ApiVersion {
                found: version,
                expected: abi::API_VERSION,
            }
            .into());
        }
        core.system_info = core.query_system_info();
        tracing::info!(
            core = %core.name,
            library = %core.system_info.library_name,
            version = %core.system_info.library_version,
            "bound core"
        );
        Ok(core)
    }

    /// Bind an entry point table that does not come from a shared library, e.g. a core
    /// linked statically into the frontend.
    pub fn from_api(name: impl Into<String>, api: CoreApi) -> Self {
        let mut core = Self::from_parts(name.into(), api, None);
        core.system_info = core.query_system_info();
        core
    }

    fn from_parts(name: String, api: CoreApi, library: Option<DynamicLibrary>) -> Self {
        Self {
            name,
            api,
            library,
            system_info: CoreSystemInfo::default(),
            capabilities: CoreCapabilities::default(),
        }
    }

    /// Short name used for per-core directories and option files (library file stem).
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Path of the shared library, `None` for in-process cores.
    pub fn path(&self) -> Option<&Path> {
        self.library.as_ref().map(DynamicLibrary::path)
    }

    pub fn api(&self) -> &CoreApi {
        &self.api
    }

    pub fn system_info(&self) -> &CoreSystemInfo {
        &self.system_info
    }

    pub fn capabilities(&self) -> CoreCapabilities {
        self.capabilities
    }

    fn query_system_info(&self) -> CoreSystemInfo {
        let mut raw = SystemInfo {
            library_name: std::ptr::null(),
            library_version: std::ptr::null(),
            valid_extensions: std::ptr::null(),
            need_fullpath: false,
            block_extract: false,
        };
        // SAFETY: `raw` is a valid out-parameter; the strings it receives are owned by the
        // core and copied before this function returns.
        unsafe {
            (self.api.get_system_info)(&mut raw);
            CoreSystemInfo {
                library_name: abi::cstr::to_owned_lossy(raw.library_name),
                library_version: abi::cstr::to_owned_lossy(raw.library_version),
                valid_extensions: abi::cstr::to_owned_lossy(raw.valid_extensions)
                    .split('|')
                    .filter(|e| !e.is_empty())
                    .map(str::to_owned)
                    .collect(),
                need_fullpath: raw.need_fullpath,
                block_extract: raw.block_extract,
            }
        }
    }

    // The wrappers below are thin: the entry points were resolved with their declared
    // signatures and must be called from the session's owning thread.

    pub fn api_version(&self) -> u32 {
        unsafe { (self.api.api_version)() }
    }

    pub(crate) fn set_environment(&self, callback: EnvironmentFn) {
        unsafe { (self.api.set_environment)(callback) }
    }

    pub(crate) fn set_callbacks(
        &self,
        video: VideoRefreshFn,
        sample: AudioSampleFn,
        batch: AudioSampleBatchFn,
        poll: InputPollFn,
        state: InputStateFn,
    ) {
        unsafe {
            (self.api.set_video_refresh)(video);
            (self.api.set_audio_sample)(sample);
            (self.api.set_audio_sample_batch)(batch);
            (self.api.set_input_poll)(poll);
            (self.api.set_input_state)(state);
        }
    }

    pub(crate) fn init(&self) {
        unsafe { (self.api.init)() }
    }

    pub(crate) fn deinit(&self) {
        unsafe { (self.api.deinit)() }
    }

    pub(crate) fn run(&self) {
        unsafe { (self.api.run)() }
    }

    pub(crate) fn reset(&self) {
        unsafe { (self.api.reset)() }
    }

    pub(crate) fn system_av_info(&self) -> AvInfo {
        let mut raw = SystemAvInfo {
            geometry: GameGeometry {
                base_width: 0,
                base_height: 0,
                max_width: 0,
                max_height: 0,
                aspect_ratio: 0.0,
            },
            timing: SystemTiming {
                fps: 0.0,
                sample_rate: 0.0,
            },
        };
        unsafe { (self.api.get_system_av_info)(&mut raw) };
        AvInfo::from_raw(&raw)
    }

    pub(crate) fn load_game(&self, game: Option<&GameInfo>) -> bool {
        let ptr = game.map_or(std::ptr::null(), |g| g as *const GameInfo);
        unsafe { (self.api.load_game)(ptr) }
    }

    pub(crate) fn unload_game(&self) {
        unsafe { (self.api.unload_game)() }
    }

    pub(crate) fn set_controller_port_device(&self, port: u32, device: u32) {
        unsafe { (self.api.set_controller_port_device)(port, device) }
    }

    pub(crate) fn serialize_size(&self) -> usize {
        unsafe { (self.api.serialize_size)() }
    }

    pub(crate) fn serialize(&self, buffer: &mut [u8]) -> bool {
        unsafe { (self.api.serialize)(buffer.as_mut_ptr().cast(), buffer.len()) }
    }

    pub(crate) fn unserialize(&self, buffer: &[u8]) -> bool {
        unsafe { (self.api.unserialize)(buffer.as_ptr().cast(), buffer.len()) }
    }

    pub(crate) fn cheat_reset(&self) {
        unsafe { (self.api.cheat_reset)() }
    }

    pub(crate) fn cheat_set(&self, index: u32, enabled: bool, code: &CStr) {
        unsafe { (self.api.cheat_set)(index, enabled, code.as_ptr()) }
    }

    pub fn region(&self) -> u32 {
        unsafe { (self.api.get_region)() }
    }

    /// Borrow one of the core's memory regions (`RETRO_MEMORY_*`).
    pub(crate) fn memory(&mut self, id: u32) -> Option<&mut [u8]> {
        // SAFETY: the core guarantees the region stays valid and `size` bytes long until
        // the game is unloaded; the borrow is tied to `&mut self`.
        unsafe {
            let data = (self.api.get_memory_data)(id);
            let size = (self.api.get_memory_size)(id);
            if data.is_null() || size == 0 {
                return None;
            }
            Some(std::slice::from_raw_parts_mut(data.cast::<u8>(), size))
        }
    }

    /// Unmap the library. Entry points must not be called afterwards.
    pub(crate) fn unload(&mut self) {
        if let Some(mut library) = self.library.take() {
            library.unload();
        }
    }
}

impl std::fmt::Debug for CoreLibrary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoreLibrary")
            .field("name", &self.name)
            .field("path", &self.path().map(PathBuf::from))
            .field("system_info", &self.system_info)
            .field("capabilities", &self.capabilities)
            .finish()
    }
}
