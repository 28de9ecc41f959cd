//! Per-session shared state.
//!
//! A [`SessionContext`] owns everything the core's callbacks touch: the bridges, the
//! values negotiated through the environment callback, and the C strings handed back to
//! the core. The session keeps the core itself; callbacks only ever see the context.
//!
//! Ownership model:
//! - The session creates the context and registers it in [`registry`] under its thread.
//! - Trampolines look the context up by thread and lock it for one callback.
//! - The session never holds the lock while calling into the core, so callbacks made
//!   from inside `retro_run` and friends always find it free.

pub mod registry;

use std::ffi::{CStr, CString, c_void};
use std::path::{Path, PathBuf};

use crate::abi::{self, GameInfo, GameInfoExt, GetProcAddressInterface, throttle_mode};
use crate::av::{AudioBridge, GraphicsBridge};
use crate::binding::{AvInfo, CoreCapabilities};
use crate::config::HostConfig;
use crate::disk::DiskControl;
use crate::error::ContentLoadError;
use crate::input::InputBridge;
use crate::messages::{LedBridge, LogBridge, MessageBridge};
use crate::options::OptionsStore;
use crate::processor::Processors;

pub use registry::SharedContext;

/// Directories served through the `GET_*_DIRECTORY` commands.
#[derive(Debug, Default)]
pub struct Directories {
    pub system: CString,
    pub save: CString,
    pub core_assets: CString,
    pub playlist: CString,
    /// `GET_LIBRETRO_PATH`; `None` for cores that were not loaded from disk.
    pub libretro: Option<CString>,
}

impl Directories {
    fn from_config(config: &HostConfig) -> Self {
        Self {
            system: path_cstring(&config.paths.system),
            save: path_cstring(&config.paths.saves),
            core_assets: path_cstring(&config.paths.core_assets),
            playlist: path_cstring(&config.paths.playlists),
            libretro: None,
        }
    }
}

/// Lossy conversion for strings served to the core. Interior NULs truncate.
pub(crate) fn path_cstring(path: &Path) -> CString {
    lossy_cstring(&path.to_string_lossy())
}

pub(crate) fn lossy_cstring(text: &str) -> CString {
    let end = text.find('\0').unwrap_or(text.len());
    CString::new(&text[..end]).unwrap_or_default()
}

/// One entry of `SET_CONTENT_INFO_OVERRIDE`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ContentOverride {
    pub extensions: Vec<String>,
    pub need_fullpath: bool,
    pub persistent_data: bool,
}

/// `SET_FASTFORWARDING_OVERRIDE` as last requested by the core.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct FastforwardOverride {
    pub ratio: f32,
    pub fastforward: bool,
    pub notification: bool,
    pub inhibit_toggle: bool,
}

/// Loaded content, kept in the C layouts the core reads back.
///
/// The strings and data live on the heap, so the pointers in `ext` stay valid when the
/// struct moves.
#[derive(Debug)]
pub struct ContentInfo {
    path: Option<PathBuf>,
    name: String,
    full_path: Option<CString>,
    dir: CString,
    stem: CString,
    extension: CString,
    data: Option<Vec<u8>>,
    ext: Box<GameInfoExt>,
}

// SAFETY: the raw pointers in `ext` point into buffers owned by the same struct.
unsafe impl Send for ContentInfo {}

impl ContentInfo {
    /// Describe `path` for `retro_load_game`, reading it into memory unless the core
    /// wants only the path.
    pub fn load(
        path: &Path,
        need_fullpath: bool,
        persistent_data: bool,
    ) -> Result<Self, ContentLoadError> {
        let full_path = CString::new(path.to_string_lossy().as_bytes())
            .map_err(|_| ContentLoadError::InvalidPath(path.to_path_buf()))?;
        let data = if need_fullpath {
            None
        } else {
            Some(std::fs::read(path).map_err(|source| ContentLoadError::Read {
                path: path.to_path_buf(),
                source,
            })?)
        };

        let dir = path.parent().map(path_cstring).unwrap_or_default();
        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let extension = path
            .extension()
            .map(|e| lossy_cstring(&e.to_string_lossy().to_lowercase()))
            .unwrap_or_default();

        let mut content = Self {
            path: Some(path.to_path_buf()),
            stem: lossy_cstring(&name),
            name,
            full_path: Some(full_path),
            dir,
            extension,
            data,
            ext: Box::new(empty_ext()),
        };
        content.ext = Box::new(content.build_ext(persistent_data));
        Ok(content)
    }

    fn build_ext(&self, persistent_data: bool) -> GameInfoExt {
        let (data, size) = self.data_ptr();
        GameInfoExt {
            full_path: self.full_path.as_ref().map_or(std::ptr::null(), |p| p.as_ptr()),
            archive_path: std::ptr::null(),
            archive_file: std::ptr::null(),
            dir: self.dir.as_ptr(),
            name: self.stem.as_ptr(),
            ext: self.extension.as_ptr(),
            meta: std::ptr::null(),
            data,
            size,
            file_in_archive: false,
            persistent_data,
        }
    }

    fn data_ptr(&self) -> (*const c_void, usize) {
        match &self.data {
            Some(d) => (d.as_ptr().cast(), d.len()),
            None => (std::ptr::null(), 0),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// File stem, used to name per-game files.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn extension(&self) -> &str {
        self.extension.to_str().unwrap_or_default()
    }

    pub fn data(&self) -> Option<&[u8]> {
        self.data.as_deref()
    }

    /// `retro_game_info` pointing into this struct.
    pub fn game_info(&self) -> GameInfo {
        let (data, size) = self.data_ptr();
        GameInfo {
            path: self.full_path.as_ref().map_or(std::ptr::null(), |p| p.as_ptr()),
            data,
            size,
            meta: std::ptr::null(),
        }
    }

    pub fn ext(&self) -> *const GameInfoExt {
        &*self.ext
    }
}

fn empty_ext() -> GameInfoExt {
    GameInfoExt {
        full_path: std::ptr::null(),
        archive_path: std::ptr::null(),
        archive_file: std::ptr::null(),
        dir: std::ptr::null(),
        name: std::ptr::null(),
        ext: std::ptr::null(),
        meta: std::ptr::null(),
        data: std::ptr::null(),
        size: 0,
        file_in_archive: false,
        persistent_data: false,
    }
}

/// Everything reachable from the core's callbacks for one session.
pub struct SessionContext {
    pub core_name: String,

    pub graphics: GraphicsBridge,
    pub audio: AudioBridge,
    pub input: InputBridge,
    pub options: OptionsStore,
    pub log: LogBridge,
    pub message: MessageBridge,
    pub led: LedBridge,
    pub disk: Option<DiskControl>,

    pub capabilities: CoreCapabilities,
    pub av_info: AvInfo,
    /// Set by `SET_SYSTEM_AV_INFO`; the session picks up the new timing and clears it.
    pub av_info_changed: bool,

    pub directories: Directories,
    pub username: CString,
    pub language: u32,
    pub overscan: bool,
    pub target_refresh_rate: f32,
    pub jit_capable: bool,

    pub shutdown_requested: bool,
    pub fast_forward: bool,
    pub fastforward_override: Option<FastforwardOverride>,
    pub rewinding: bool,
    pub paused: bool,

    pub frame_time: Option<abi::FrameTimeCallback>,
    pub proc_address: Option<GetProcAddressInterface>,

    pub content: Option<ContentInfo>,
    pub content_overrides: Vec<ContentOverride>,

    pub performance_level: u32,
    pub serialization_quirks: u64,
    pub support_achievements: bool,
    /// Reported by `GET_SAVESTATE_CONTEXT`. Informational only.
    pub savestate_context: i32,
}

impl SessionContext {
    pub fn new(config: &HostConfig, processors: Processors) -> Self {
        let Processors {
            graphics,
            audio,
            input,
            log,
            message,
            led,
        } = processors;

        let mut input = InputBridge::new(input);
        input.max_users = config.input.max_users;
        let mut graphics = GraphicsBridge::new(graphics);
        graphics.enabled = config.video.enabled;
        let mut audio = AudioBridge::new(audio);
        audio.enabled = config.audio.enabled;

        Self {
            core_name: String::new(),
            graphics,
            audio,
            input,
            options: OptionsStore::default(),
            log: LogBridge::new(log),
            message: MessageBridge::new(message),
            led: LedBridge::new(led),
            disk: None,
            capabilities: CoreCapabilities::default(),
            av_info: AvInfo::default(),
            av_info_changed: false,
            directories: Directories::from_config(config),
            username: lossy_cstring(&config.user.username),
            language: config.user.language,
            overscan: config.video.overscan,
            target_refresh_rate: config.video.target_refresh_rate,
            jit_capable: config.session.jit_capable,
            shutdown_requested: false,
            fast_forward: false,
            fastforward_override: None,
            rewinding: false,
            paused: false,
            frame_time: None,
            proc_address: None,
            content: None,
            content_overrides: Vec::new(),
            performance_level: 0,
            serialization_quirks: 0,
            support_achievements: false,
            savestate_context: abi::savestate_context::NORMAL,
        }
    }

    /// Reset everything a previous core negotiated and bind the context to a new one.
    pub(crate) fn prepare_for_core(
        &mut self,
        core_name: &str,
        libretro_path: Option<&Path>,
        config: &HostConfig,
    ) {
        self.core_name = core_name.to_owned();
        self.directories.libretro = libretro_path.map(path_cstring);

        self.options = OptionsStore::new(Some(&config.paths.options), core_name);
        if let Err(e) = self.options.deserialize() {
            tracing::warn!(core = core_name, error = %e, "starting with default options");
        }

        self.graphics.reset();
        self.graphics.enabled = config.video.enabled;
        self.audio.enabled = config.audio.enabled;
        self.input.reset();
        self.input.max_users = config.input.max_users;
        self.input.enabled = true;
        self.log.enabled = true;
        self.message.enabled = true;
        self.led.enabled = true;
        self.disk = None;
        self.capabilities = CoreCapabilities::default();
        self.av_info = AvInfo::default();
        self.av_info_changed = false;
        self.shutdown_requested = false;
        self.fastforward_override = None;
        self.rewinding = false;
        self.paused = false;
        self.frame_time = None;
        self.proc_address = None;
        self.content = None;
        self.content_overrides.clear();
        self.performance_level = 0;
        self.serialization_quirks = 0;
        self.support_achievements = false;
    }

    /// Whether content with `extension` must be passed by path, honoring
    /// `SET_CONTENT_INFO_OVERRIDE`.
    pub fn content_policy(&self, extension: &str, need_fullpath: bool) -> (bool, bool) {
        self.content_overrides
            .iter()
            .find(|o| o.extensions.iter().any(|e| e.eq_ignore_ascii_case(extension)))
            .map_or((need_fullpath, false), |o| (o.need_fullpath, o.persistent_data))
    }

    /// Effective fast-forward state, the core's override winning over the host.
    pub fn is_fast_forwarding(&self) -> bool {
        match self.fastforward_override {
            Some(o) if o.fastforward || o.inhibit_toggle => o.fastforward,
            _ => self.fast_forward,
        }
    }

    /// `GET_THROTTLE_STATE`: `(mode, rate)`.
    pub fn throttle_state(&self) -> (u32, f32) {
        let fps = self.av_info.fps as f32;
        if self.paused {
            (throttle_mode::FRAME_STEPPING, 0.0)
        } else if self.rewinding {
            (throttle_mode::REWINDING, fps)
        } else if self.is_fast_forwarding() {
            let ratio = self.fastforward_override.map_or(0.0, |o| o.ratio);
            // A ratio of zero means "as fast as possible".
            let rate = if ratio > 0.0 { fps * ratio } else { 0.0 };
            (throttle_mode::FAST_FORWARD, rate)
        } else {
            (throttle_mode::VSYNC, fps)
        }
    }

    /// `GET_AUDIO_VIDEO_ENABLE` bits.
    pub fn av_enable_flags(&self) -> i32 {
        let mut flags = 0;
        if self.graphics.enabled {
            flags |= abi::av_enable::VIDEO;
        }
        if self.audio.enabled {
            flags |= abi::av_enable::AUDIO;
        }
        flags
    }

    pub fn username(&self) -> &CStr {
        &self.username
    }
}
