//! The session state machine.
//!
//! A [`Session`] binds one core and at most one piece of content to the thread that
//! created it:
//!
//! ```text
//! Unloaded -> Loaded (core bound) -> Running <-> Paused
//!     ^__________________ stop() ___________________|
//! ```
//!
//! The core itself lives here, outside the shared [`SessionContext`], and the context
//! lock is always released before calling into the core. Callbacks made from inside
//! `retro_run` and friends therefore find the context free.

pub mod rewind;
pub mod timing;

#[cfg(test)]
mod tests;

use std::ffi::CString;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread::{self, ThreadId};
use std::time::Instant;

use parking_lot::Mutex;

use crate::abi::{self, serialization_quirk};
use crate::av::{HwRender, screenshot};
use crate::binding::{AvInfo, CoreLibrary};
use crate::config::HostConfig;
use crate::disk::DiskControl;
use crate::error::{ContentLoadError, DiskControlError, Result, SessionError};
use crate::options::OptionScope;
use crate::processor::{Frame, Processors};
use crate::runtime::callbacks;
use crate::state::{ContentInfo, SessionContext, SharedContext, registry};
use crate::vfs;

pub use rewind::RewindBuffer;
pub use timing::FrameTimer;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No core bound.
    Unloaded,
    /// Core bound and initialized, no content.
    Loaded,
    /// Content loaded, frames are being run.
    Running,
    /// Content loaded, run loop suspended.
    Paused,
}

pub struct Session {
    state: SessionState,
    config: HostConfig,
    context: SharedContext,
    owner: ThreadId,
    core: Option<CoreLibrary>,
    initialized: bool,
    game_loaded: bool,
    game_name: Option<String>,
    timer: FrameTimer,
    rewind: RewindBuffer,
    frame_count: u64,
}

const ACTIVE: &[SessionState] = &[SessionState::Running, SessionState::Paused];

impl Session {
    /// Create a session and bind it to the calling thread. Fails if the thread already
    /// owns one.
    pub fn new(config: HostConfig, processors: Processors) -> Result<Self> {
        let context = Arc::new(Mutex::new(SessionContext::new(&config, processors)));
        registry::register(Arc::clone(&context))?;
        Ok(Self {
            state: SessionState::Unloaded,
            config,
            context,
            owner: thread::current().id(),
            core: None,
            initialized: false,
            game_loaded: false,
            game_name: None,
            timer: FrameTimer::new(60.0),
            rewind: RewindBuffer::default(),
            frame_count: 0,
        })
    }

    fn check_thread(&self) -> Result<(), SessionError> {
        if thread::current().id() != self.owner {
            return Err(SessionError::WrongThread);
        }
        Ok(())
    }

    fn require(&self, operation: &'static str, allowed: &[SessionState]) -> Result<(), SessionError> {
        self.check_thread()?;
        if !allowed.contains(&self.state) {
            return Err(SessionError::InvalidState {
                operation,
                state: self.state,
            });
        }
        Ok(())
    }

    fn bound_core(&self) -> Result<&CoreLibrary, SessionError> {
        self.core.as_ref().ok_or(SessionError::InvalidState {
            operation: "core access",
            state: self.state,
        })
    }

    /// Load the core at `path` and start `game` on it. On failure the session is back
    /// in [`SessionState::Unloaded`].
    pub fn start(&mut self, path: impl AsRef<Path>, game: Option<&Path>) -> Result<()> {
        self.require("start", &[SessionState::Unloaded])?;
        let core = CoreLibrary::load(path, self.config.paths.scratch.as_deref())?;
        self.start_with(core, game)
    }

    /// Like [`Session::start`] for an already bound core.
    pub fn start_with(&mut self, core: CoreLibrary, game: Option<&Path>) -> Result<()> {
        self.require("start", &[SessionState::Unloaded])?;
        let result = self.load_core(core).and_then(|()| self.load_game(game));
        if let Err(e) = &result {
            tracing::error!(error = %e, "session failed to start, rolling back");
            self.stop();
        }
        result
    }

    /// Bind `core`: install the callbacks and run `retro_init`.
    pub fn load_core(&mut self, core: CoreLibrary) -> Result<()> {
        self.require("load_core", &[SessionState::Unloaded])?;

        self.context
            .lock()
            .prepare_for_core(core.name(), core.path(), &self.config);

        core.set_environment(callbacks::environment);
        core.set_callbacks(
            callbacks::video_refresh,
            callbacks::audio_sample,
            callbacks::audio_sample_batch,
            callbacks::input_poll,
            callbacks::input_state,
        );
        core.init();
        self.initialized = true;

        let mut core = core;
        core.capabilities = self.context.lock().capabilities;
        tracing::info!(core = core.name(), capabilities = ?core.capabilities, "core initialized");

        self.core = Some(core);
        self.state = SessionState::Loaded;
        Ok(())
    }

    /// Hand `game` to the core. `None` is only accepted by cores that declared
    /// `SET_SUPPORT_NO_GAME`.
    pub fn load_game(&mut self, game: Option<&Path>) -> Result<()> {
        self.require("load_game", &[SessionState::Loaded])?;
        let game_name = game
            .and_then(Path::file_stem)
            .map(|s| s.to_string_lossy().into_owned());

        let Some(core) = self.core.as_mut() else {
            return Err(SessionError::InvalidState {
                operation: "load_game",
                state: self.state,
            }
            .into());
        };

        let content = {
            let mut ctx = self.context.lock();
            ctx.options.set_game(game_name.as_deref());
            if let Err(e) = ctx.options.deserialize() {
                tracing::warn!(error = %e, "starting with default options");
            }
            core.capabilities = ctx.capabilities;

            match game {
                Some(path) => {
                    let extension = path
                        .extension()
                        .map(|e| e.to_string_lossy().to_lowercase())
                        .unwrap_or_default();
                    let (need_fullpath, persistent) =
                        ctx.content_policy(&extension, core.system_info().need_fullpath);
                    Some(ContentInfo::load(path, need_fullpath, persistent)?)
                }
                None if core.capabilities.supports_no_game => None,
                None => return Err(ContentLoadError::ContentRequired.into()),
            }
        };

        // The buffers behind `info` are owned by the content stored in the context.
        let info = content.as_ref().map(ContentInfo::game_info);
        self.context.lock().content = content;
        if !core.load_game(info.as_ref()) {
            self.context.lock().content = None;
            return Err(ContentLoadError::Rejected(game.map(Path::to_path_buf)).into());
        }
        self.game_loaded = true;
        self.game_name = game_name;

        let av = core.system_av_info();
        let (context_reset, audio_callback) = {
            let mut ctx = self.context.lock();
            ctx.av_info = av;
            ctx.av_info_changed = false;
            ctx.audio.init(av.sample_rate);
            ctx.graphics.make_current();
            (
                ctx.graphics.hw_render().and_then(HwRender::context_reset),
                ctx.audio.callback,
            )
        };
        if let Some(reset) = context_reset {
            unsafe { reset() };
        }
        if let Some(set_state) = audio_callback.and_then(|c| c.set_state) {
            unsafe { set_state(true) };
        }

        self.timer = FrameTimer::new(av.fps);
        self.frame_count = 0;
        self.rewind = if self.config.session.rewind_capacity > 0 && core.serialize_size() > 0 {
            RewindBuffer::new(
                self.config.session.rewind_capacity,
                self.config.session.rewind_interval,
            )
        } else {
            RewindBuffer::default()
        };

        self.state = SessionState::Running;
        if self.config.session.autosave_sram {
            self.load_sram();
        }
        tracing::info!(
            core = self.core_name(),
            game = ?self.game_name,
            fps = av.fps,
            sample_rate = av.sample_rate,
            "content loaded"
        );
        Ok(())
    }

    /// Tear everything down. Valid in every state and idempotent; failures are logged.
    pub fn stop(&mut self) {
        if self.check_thread().is_err() {
            tracing::warn!("session stopped from a thread other than its owner");
        }
        let Some(mut core) = self.core.take() else {
            self.state = SessionState::Unloaded;
            return;
        };

        let (audio_callback, context_destroy) = {
            let mut ctx = self.context.lock();
            ctx.graphics.enabled = false;
            ctx.audio.enabled = false;
            ctx.input.enabled = false;
            (
                ctx.audio.callback,
                ctx.graphics.hw_render().and_then(HwRender::context_destroy),
            )
        };

        if self.game_loaded {
            if let Some(set_state) = audio_callback.and_then(|c| c.set_state) {
                unsafe { set_state(false) };
            }
            if self.config.session.autosave_sram {
                let path = self.sram_path(core.name());
                if let Err(e) = write_sram(&mut core, &path) {
                    tracing::warn!(error = %e, "failed to save battery RAM");
                }
            }
            core.unload_game();
            self.game_loaded = false;
        }
        if let Some(destroy) = context_destroy {
            unsafe { destroy() };
        }
        if self.initialized {
            core.deinit();
            self.initialized = false;
        }
        core.unload();

        let closed = vfs::close_owned_by(self.owner);
        if closed > 0 {
            tracing::debug!(closed, "closed VFS files the core left open");
        }

        {
            let mut ctx = self.context.lock();
            ctx.content = None;
            ctx.disk = None;
            ctx.frame_time = None;
            ctx.proc_address = None;
            ctx.input.reset();
            ctx.log.enabled = false;
            ctx.message.enabled = false;
            ctx.led.enabled = false;
            ctx.graphics.dispose();
            ctx.audio.dispose();
        }

        self.rewind.clear();
        self.game_name = None;
        self.frame_count = 0;
        self.state = SessionState::Unloaded;
        tracing::info!(core = core.name(), "session stopped");
    }

    /// Run one frame. A no-op while paused; while rewinding, restores the newest
    /// snapshot instead of running the core.
    pub fn run_frame(&mut self) -> Result<()> {
        self.require("run_frame", ACTIVE)?;
        if self.state == SessionState::Paused {
            return Ok(());
        }
        let Some(core) = self.core.as_ref() else {
            return Ok(());
        };

        let (changed, rewinding, frame_time, fast_forward, audio_callback) = {
            let mut ctx = self.context.lock();
            let changed = std::mem::take(&mut ctx.av_info_changed).then_some(ctx.av_info);
            (
                changed,
                ctx.rewinding,
                ctx.frame_time,
                ctx.is_fast_forwarding(),
                ctx.audio.callback,
            )
        };
        if let Some(av) = changed {
            tracing::debug!(fps = av.fps, "core changed its timing");
            self.timer.set_fps(av.fps);
        }

        if rewinding && self.rewind.is_enabled() {
            if let Some(snapshot) = self.rewind.pop() {
                if !core.unserialize(&snapshot) {
                    tracing::warn!("core rejected a rewind snapshot");
                }
            }
            return Ok(());
        }

        if let Some(frame_time) = frame_time {
            if let Some(callback) = frame_time.callback {
                let usec = self
                    .timer
                    .frame_delta(Instant::now(), frame_time.reference, fast_forward);
                unsafe { callback(usec) };
            }
        }

        core.run();
        if let Some(callback) = audio_callback.and_then(|c| c.callback) {
            unsafe { callback() };
        }
        self.context.lock().graphics.finalize_frame();
        self.frame_count += 1;

        if self.rewind.is_due(self.frame_count) {
            let size = core.serialize_size();
            self.rewind.capture(size, |buffer| core.serialize(buffer));
        }
        Ok(())
    }

    /// Run as many frames as are due at `now`. Stops early when the core asks to shut
    /// down. Returns the number of frames run.
    pub fn run_due(&mut self, now: Instant) -> Result<u32> {
        self.require("run_due", ACTIVE)?;
        if self.state == SessionState::Paused {
            return Ok(0);
        }
        let due = self.timer.advance(now);
        for ran in 0..due {
            if self.shutdown_requested() {
                return Ok(ran);
            }
            self.run_frame()?;
        }
        Ok(due)
    }

    pub fn pause(&mut self) -> Result<()> {
        self.require("pause", ACTIVE)?;
        self.state = SessionState::Paused;
        self.context.lock().paused = true;
        Ok(())
    }

    pub fn resume(&mut self) -> Result<()> {
        self.require("resume", ACTIVE)?;
        self.state = SessionState::Running;
        self.context.lock().paused = false;
        self.timer.reset();
        Ok(())
    }

    pub fn set_fast_forward(&mut self, enabled: bool) {
        self.context.lock().fast_forward = enabled;
    }

    /// Toggle rewinding. Returns whether rewind is available for this content.
    pub fn set_rewinding(&mut self, enabled: bool) -> bool {
        let available = self.rewind.is_enabled();
        self.context.lock().rewinding = enabled && available;
        available
    }

    pub fn shutdown_requested(&self) -> bool {
        self.context.lock().shutdown_requested
    }

    /// Serialize the core into save slot `slot`, holding the run loop paused. Returns
    /// the path written.
    pub fn save_state(&mut self, slot: u32) -> Result<PathBuf> {
        self.require("save_state", ACTIVE)?;
        self.with_paused(|session| session.write_state(slot))
    }

    /// Restore save slot `slot` and reset frame timing.
    pub fn load_state(&mut self, slot: u32) -> Result<()> {
        self.require("load_state", ACTIVE)?;
        self.with_paused(|session| session.read_state(slot))
    }

    fn with_paused<T>(&mut self, f: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        let previous = self.state;
        self.state = SessionState::Paused;
        self.context.lock().paused = true;
        let result = f(self);
        self.state = previous;
        self.context.lock().paused = previous == SessionState::Paused;
        result
    }

    fn write_state(&mut self, slot: u32) -> Result<PathBuf> {
        let core = self.bound_core()?;
        let size = core.serialize_size();
        if size == 0 {
            return Err(SessionError::SerializationUnsupported.into());
        }
        let mut buffer = vec![0u8; size];
        if !core.serialize(&mut buffer) {
            return Err(SessionError::SerializationFailed("save").into());
        }

        let path = self.state_path(core.name(), slot);
        write_file(&path, &buffer)?;
        tracing::info!(slot, path = %path.display(), size, "state saved");

        if self.config.session.screenshot_on_save {
            let frame = self.context.lock().graphics.last_frame().cloned();
            if let Some(frame) = frame {
                let png = screenshot_path(&path);
                if let Err(e) = screenshot::write_png(&png, &frame) {
                    tracing::warn!(path = %png.display(), error = %e, "failed to write state screenshot");
                }
            }
        }
        Ok(path)
    }

    fn read_state(&mut self, slot: u32) -> Result<()> {
        let core = self.bound_core()?;
        let path = self.state_path(core.name(), slot);
        let data = std::fs::read(&path).map_err(|source| SessionError::Io {
            path: path.clone(),
            source,
        })?;

        let expected = core.serialize_size();
        if expected == 0 {
            return Err(SessionError::SerializationUnsupported.into());
        }
        let variable_size = {
            let quirks = self.context.lock().serialization_quirks;
            quirks & serialization_quirk::CORE_VARIABLE_SIZE != 0
        };
        if data.len() != expected && !variable_size {
            return Err(SessionError::StateSizeMismatch {
                path,
                found: data.len(),
                expected,
            }
            .into());
        }
        if !core.unserialize(&data) {
            return Err(SessionError::SerializationFailed("load").into());
        }
        self.timer.reset();
        tracing::info!(slot, path = %path.display(), "state loaded");
        Ok(())
    }

    fn state_path(&self, core: &str, slot: u32) -> PathBuf {
        self.config
            .state_path(core, self.game_name.as_deref().unwrap_or(core), slot)
    }

    fn sram_path(&self, core: &str) -> PathBuf {
        self.config
            .sram_path(core, self.game_name.as_deref().unwrap_or(core))
    }

    /// Write the last presented frame to `path` as PNG. `false` when nothing has been
    /// presented yet.
    pub fn screenshot(&self, path: &Path) -> Result<bool> {
        let Some(frame) = self.last_frame() else {
            return Ok(false);
        };
        screenshot::write_png(path, &frame)?;
        Ok(true)
    }

    /// Write battery RAM to the save directory. `false` when the core exposes none.
    pub fn save_sram(&mut self) -> Result<bool> {
        self.require("save_sram", ACTIVE)?;
        let Some(mut core) = self.core.take() else {
            return Ok(false);
        };
        let path = self.sram_path(core.name());
        let result = write_sram(&mut core, &path);
        self.core = Some(core);
        Ok(result?)
    }

    fn load_sram(&mut self) {
        let Some(core) = self.core.as_mut() else {
            return;
        };
        let path = self
            .config
            .sram_path(core.name(), self.game_name.as_deref().unwrap_or(core.name()));
        let data = match std::fs::read(&path) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "failed to read battery RAM");
                return;
            }
        };
        let Some(memory) = core.memory(abi::MEMORY_SAVE_RAM) else {
            return;
        };
        if memory.len() != data.len() {
            tracing::warn!(
                path = %path.display(),
                found = data.len(),
                expected = memory.len(),
                "ignoring battery RAM of the wrong size"
            );
            return;
        }
        memory.copy_from_slice(&data);
        tracing::debug!(path = %path.display(), "battery RAM restored");
    }

    pub fn reset(&mut self) -> Result<()> {
        self.require("reset", ACTIVE)?;
        self.bound_core()?.reset();
        self.timer.reset();
        Ok(())
    }

    pub fn cheat_reset(&mut self) -> Result<()> {
        self.require("cheat_reset", ACTIVE)?;
        self.bound_core()?.cheat_reset();
        Ok(())
    }

    pub fn cheat_set(&mut self, index: u32, enabled: bool, code: &str) -> Result<()> {
        self.require("cheat_set", ACTIVE)?;
        let code = CString::new(code).map_err(|_| SessionError::InvalidString("cheat code"))?;
        self.bound_core()?.cheat_set(index, enabled, &code);
        Ok(())
    }

    pub fn set_controller_port_device(&mut self, port: u32, device: u32) -> Result<()> {
        self.require(
            "set_controller_port_device",
            &[SessionState::Loaded, SessionState::Running, SessionState::Paused],
        )?;
        self.bound_core()?.set_controller_port_device(port, device);
        self.context.lock().input.set_port_device(port, device);
        Ok(())
    }

    /// Disk control interface registered by the core, if any.
    pub fn disk_control(&self) -> Option<DiskControl> {
        self.context.lock().disk
    }

    /// Open the tray, select image `index` and close it again.
    pub fn swap_disk(&mut self, index: u32) -> Result<()> {
        self.require("swap_disk", ACTIVE)?;
        let disk = self.disk_control().ok_or(DiskControlError::NotSupported)?;
        disk.set_ejected(true)?;
        let selected = disk.set_image_index(index);
        disk.set_ejected(false)?;
        Ok(selected?)
    }

    /// Forward a key event to a core that registered `SET_KEYBOARD_CALLBACK`.
    pub fn keyboard_event(&mut self, down: bool, keycode: u32, character: u32, modifiers: u16) {
        let callback = self
            .context
            .lock()
            .input
            .keyboard_callback
            .and_then(|k| k.callback);
        if let Some(callback) = callback {
            unsafe { callback(down, keycode, character, modifiers) };
        }
    }

    /// Change an option. Game scope needs loaded content.
    pub fn set_option(&mut self, scope: OptionScope, key: &str, value: &str) -> bool {
        self.context.lock().options.set_value(scope, key, value)
    }

    pub fn option(&self, key: &str) -> Option<String> {
        self.context.lock().options.get(key).map(str::to_owned)
    }

    pub fn last_frame(&self) -> Option<Frame> {
        self.context.lock().graphics.last_frame().cloned()
    }

    pub fn av_info(&self) -> AvInfo {
        self.context.lock().av_info
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn config(&self) -> &HostConfig {
        &self.config
    }

    pub fn core(&self) -> Option<&CoreLibrary> {
        self.core.as_ref()
    }

    fn core_name(&self) -> &str {
        self.core.as_ref().map_or("", CoreLibrary::name)
    }

    pub fn context(&self) -> &SharedContext {
        &self.context
    }

    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    pub fn rewind_len(&self) -> usize {
        self.rewind.len()
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.stop();
        registry::unregister(&self.context);
    }
}

fn write_sram(core: &mut CoreLibrary, path: &Path) -> Result<bool, SessionError> {
    let Some(memory) = core.memory(abi::MEMORY_SAVE_RAM) else {
        return Ok(false);
    };
    write_file(path, memory)?;
    tracing::debug!(path = %path.display(), size = memory.len(), "battery RAM saved");
    Ok(true)
}

fn write_file(path: &Path, data: &[u8]) -> Result<(), SessionError> {
    let io = |source| SessionError::Io {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(io)?;
    }
    std::fs::write(path, data).map_err(io)
}

/// `<state>.png` next to a state file.
fn screenshot_path(state: &Path) -> PathBuf {
    let mut path = state.as_os_str().to_owned();
    path.push(".png");
    PathBuf::from(path)
}
