//! Session tests against an in-process fake core.

use std::cell::{Cell, RefCell};
use std::ffi::{CString, c_char, c_uint, c_void};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;

use super::{Session, SessionState};
use crate::abi::{
    self, AudioSampleBatchFn, DEVICE_JOYPAD, DEVICE_NONE, EnvCommand, EnvironmentFn,
    GameGeometry, GameInfo, InputPollFn, InputStateFn, SystemAvInfo, SystemInfo, SystemTiming,
    Variable, VfsInterfaceInfo, VideoRefreshFn, vfs_flags,
};
use crate::av::PixelFormat;
use crate::binding::{CoreApi, CoreLibrary, fallback};
use crate::config::HostConfig;
use crate::error::{ContentLoadError, HostError, SessionError};
use crate::options::OptionScope;
use crate::processor::{AudioProcessor, Processors};
use crate::vfs;

mod fake {
    use super::*;

    thread_local! {
        static ENV: Cell<Option<EnvironmentFn>> = const { Cell::new(None) };
        static VIDEO: Cell<Option<VideoRefreshFn>> = const { Cell::new(None) };
        static BATCH: Cell<Option<AudioSampleBatchFn>> = const { Cell::new(None) };
        pub static COUNTER: Cell<u64> = const { Cell::new(0) };
        pub static INITS: Cell<u32> = const { Cell::new(0) };
        pub static DEINITS: Cell<u32> = const { Cell::new(0) };
        pub static UNLOADS: Cell<u32> = const { Cell::new(0) };
        pub static LOAD_OK: Cell<bool> = const { Cell::new(true) };
        pub static SUPPORTS_NO_GAME: Cell<bool> = const { Cell::new(false) };
        pub static SRAM: RefCell<[u8; 16]> = const { RefCell::new([0; 16]) };
        /// Skip `SET_PIXEL_FORMAT` in `init`, leaving the protocol default.
        pub static PLAIN_INIT: Cell<bool> = const { Cell::new(false) };
        /// Opened through the VFS interface by `load_game` and never closed.
        pub static VFS_FILE: RefCell<Option<CString>> = const { RefCell::new(None) };
    }

    /// Thread-locals outlive a test when the harness reuses its thread.
    pub fn reset() {
        ENV.set(None);
        VIDEO.set(None);
        BATCH.set(None);
        COUNTER.set(0);
        INITS.set(0);
        DEINITS.set(0);
        UNLOADS.set(0);
        LOAD_OK.set(true);
        SUPPORTS_NO_GAME.set(false);
        SRAM.with(|s| *s.borrow_mut() = [0; 16]);
        PLAIN_INIT.set(false);
        VFS_FILE.set(None);
    }

    fn env<T>(command: EnvCommand, data: &mut T) -> bool {
        match ENV.get() {
            Some(env) => unsafe { env(command.raw(), (data as *mut T).cast()) },
            None => false,
        }
    }

    const FRAME: [u32; 8] = [
        0x00FF_0000, 0x0000_FF00, 0x0000_00FF, 0x00FF_FFFF,
        0x0000_0000, 0x0012_3456, 0x00AB_CDEF, 0x0080_8080,
    ];

    unsafe extern "C" fn set_environment(cb: EnvironmentFn) {
        ENV.set(Some(cb));
        let mut no_game = SUPPORTS_NO_GAME.get();
        env(EnvCommand::SetSupportNoGame, &mut no_game);
    }
    unsafe extern "C" fn set_video_refresh(cb: VideoRefreshFn) {
        VIDEO.set(Some(cb));
    }
    unsafe extern "C" fn set_audio_sample(_cb: abi::AudioSampleFn) {}
    unsafe extern "C" fn set_audio_sample_batch(cb: AudioSampleBatchFn) {
        BATCH.set(Some(cb));
    }
    unsafe extern "C" fn set_input_poll(_cb: InputPollFn) {}
    unsafe extern "C" fn set_input_state(_cb: InputStateFn) {}

    unsafe extern "C" fn init() {
        INITS.set(INITS.get() + 1);
        if !PLAIN_INIT.get() {
            let mut format: c_uint = abi::pixel_format::XRGB8888;
            env(EnvCommand::SetPixelFormat, &mut format);
        }
        let mut vars = [
            Variable {
                key: c"fake_speed".as_ptr(),
                value: c"Speed; normal|fast".as_ptr(),
            },
            Variable {
                key: std::ptr::null(),
                value: std::ptr::null(),
            },
        ];
        env(EnvCommand::SetVariables, &mut vars[0]);
    }
    unsafe extern "C" fn deinit() {
        DEINITS.set(DEINITS.get() + 1);
    }

    unsafe extern "C" fn get_system_info(info: *mut SystemInfo) {
        let info = unsafe { &mut *info };
        info.library_name = c"Fake".as_ptr();
        info.library_version = c"1.0".as_ptr();
        info.valid_extensions = c"bin".as_ptr();
        info.need_fullpath = false;
        info.block_extract = false;
    }
    unsafe extern "C" fn get_system_av_info(info: *mut SystemAvInfo) {
        let info = unsafe { &mut *info };
        info.geometry = GameGeometry {
            base_width: 4,
            base_height: 2,
            max_width: 4,
            max_height: 2,
            aspect_ratio: 2.0,
        };
        info.timing = SystemTiming {
            fps: 60.0,
            sample_rate: 48_000.0,
        };
    }

    unsafe extern "C" fn run() {
        let frame = COUNTER.get() + 1;
        COUNTER.set(frame);
        SRAM.with(|s| s.borrow_mut()[0] = frame as u8);
        if let Some(video) = VIDEO.get() {
            unsafe { video(FRAME.as_ptr().cast(), 4, 2, 16) };
        }
        if let Some(batch) = BATCH.get() {
            let samples = [0i16, 0, 16_384, -16_384];
            unsafe { batch(samples.as_ptr(), 2) };
        }
    }

    unsafe extern "C" fn serialize_size() -> usize {
        8
    }
    unsafe extern "C" fn serialize(data: *mut c_void, size: usize) -> bool {
        if size < 8 {
            return false;
        }
        let bytes = COUNTER.get().to_le_bytes();
        unsafe { std::ptr::copy_nonoverlapping(bytes.as_ptr(), data.cast::<u8>(), 8) };
        true
    }
    unsafe extern "C" fn unserialize(data: *const c_void, size: usize) -> bool {
        if size != 8 {
            return false;
        }
        let mut bytes = [0u8; 8];
        unsafe { std::ptr::copy_nonoverlapping(data.cast::<u8>(), bytes.as_mut_ptr(), 8) };
        COUNTER.set(u64::from_le_bytes(bytes));
        true
    }

    unsafe extern "C" fn load_game(game: *const GameInfo) -> bool {
        if !LOAD_OK.get() {
            return false;
        }
        if game.is_null() {
            return SUPPORTS_NO_GAME.get();
        }
        SRAM.with(|s| *s.borrow_mut() = [0; 16]);
        VFS_FILE.with_borrow(|path| {
            let Some(path) = path else { return };
            let mut info = VfsInterfaceInfo {
                required_interface_version: 1,
                iface: std::ptr::null(),
            };
            if env(EnvCommand::GetVfsInterface, &mut info) {
                let open = unsafe { (*info.iface).open.unwrap() };
                unsafe { open(path.as_ptr(), vfs_flags::ACCESS_WRITE, 0) };
            }
        });
        true
    }
    unsafe extern "C" fn unload_game() {
        UNLOADS.set(UNLOADS.get() + 1);
    }

    unsafe extern "C" fn get_memory_data(id: c_uint) -> *mut c_void {
        if id != abi::MEMORY_SAVE_RAM {
            return std::ptr::null_mut();
        }
        SRAM.with(|s| s.as_ptr().cast())
    }
    unsafe extern "C" fn get_memory_size(id: c_uint) -> usize {
        if id == abi::MEMORY_SAVE_RAM { 16 } else { 0 }
    }

    unsafe extern "C" fn cheat_set(_index: c_uint, _enabled: bool, _code: *const c_char) {}

    pub fn core() -> CoreLibrary {
        CoreLibrary::from_api(
            "fake",
            CoreApi {
                set_environment,
                set_video_refresh,
                set_audio_sample,
                set_audio_sample_batch,
                set_input_poll,
                set_input_state,
                init,
                deinit,
                api_version: fallback::api_version,
                get_system_info,
                get_system_av_info,
                set_controller_port_device: fallback::set_controller_port_device,
                reset: fallback::reset,
                run,
                serialize_size,
                serialize,
                unserialize,
                cheat_reset: fallback::cheat_reset,
                cheat_set,
                load_game,
                load_game_special: fallback::load_game_special,
                unload_game,
                get_region: fallback::get_region,
                get_memory_data,
                get_memory_size,
            },
        )
    }
}

struct Fixture {
    dir: tempfile::TempDir,
    rom: PathBuf,
}

impl Fixture {
    fn new() -> Self {
        fake::reset();
        let dir = tempfile::tempdir().unwrap();
        let rom = dir.path().join("game.bin");
        std::fs::write(&rom, [0xAA; 32]).unwrap();
        Self { dir, rom }
    }

    fn config(&self) -> HostConfig {
        HostConfig::rooted_at(self.dir.path())
    }

    fn session(&self) -> Session {
        Session::new(self.config(), Processors::default()).unwrap()
    }

    fn started(&self) -> Session {
        let mut session = self.session();
        session.start_with(fake::core(), Some(&self.rom)).unwrap();
        session
    }

    fn root(&self) -> &Path {
        self.dir.path()
    }
}

#[test]
fn stop_is_idempotent() {
    let fx = Fixture::new();
    let mut session = fx.session();
    session.stop();
    session.stop();
    assert_eq!(session.state(), SessionState::Unloaded);

    session.start_with(fake::core(), Some(&fx.rom)).unwrap();
    session.stop();
    session.stop();
    assert_eq!(session.state(), SessionState::Unloaded);
    assert_eq!(fake::DEINITS.get(), 1);
    assert_eq!(fake::UNLOADS.get(), 1);
    assert!(session.core().is_none());
}

#[test]
fn running_session_presents_frames() {
    let fx = Fixture::new();
    let mut session = fx.started();
    assert_eq!(session.state(), SessionState::Running);
    assert_eq!(fake::INITS.get(), 1);
    assert_eq!(session.av_info().fps, 60.0);

    for _ in 0..3 {
        session.run_frame().unwrap();
    }
    assert_eq!(session.frame_count(), 3);
    assert_eq!(fake::COUNTER.get(), 3);

    let frame = session.last_frame().unwrap();
    assert_eq!((frame.width, frame.height), (4, 2));
    assert_eq!(frame.pixels[0] & 0x00FF_FFFF, 0x00FF_0000);
}

#[test]
fn missing_content_rolls_back() {
    let fx = Fixture::new();
    let mut session = fx.session();
    let err = session.start_with(fake::core(), None).unwrap_err();
    assert!(matches!(err, HostError::Content(ContentLoadError::ContentRequired)));
    assert_eq!(session.state(), SessionState::Unloaded);
    assert_eq!(fake::DEINITS.get(), 1);
    assert!(session.core().is_none());
}

#[test]
fn rejected_content_rolls_back() {
    let fx = Fixture::new();
    fake::LOAD_OK.set(false);
    let mut session = fx.session();
    let err = session.start_with(fake::core(), Some(&fx.rom)).unwrap_err();
    assert!(matches!(err, HostError::Content(ContentLoadError::Rejected(Some(_)))));
    assert_eq!(session.state(), SessionState::Unloaded);
    assert_eq!(fake::UNLOADS.get(), 0);
    assert_eq!(fake::DEINITS.get(), 1);
}

#[test]
fn no_game_cores_start_without_content() {
    let fx = Fixture::new();
    fake::SUPPORTS_NO_GAME.set(true);
    let mut session = fx.session();
    session.start_with(fake::core(), None).unwrap();
    assert_eq!(session.state(), SessionState::Running);
    assert!(session.core().unwrap().capabilities().supports_no_game);
}

#[test]
fn save_then_load_reproduces_the_state() {
    let fx = Fixture::new();
    let mut session = fx.started();
    session.run_frame().unwrap();
    session.run_frame().unwrap();

    let path = session.save_state(0).unwrap();
    assert_eq!(path, fx.root().join("states/fake/game.state0"));
    let first = std::fs::read(&path).unwrap();
    assert!(fx.root().join("states/fake/game.state0.png").exists());

    session.run_frame().unwrap();
    assert_eq!(fake::COUNTER.get(), 3);
    session.load_state(0).unwrap();
    assert_eq!(fake::COUNTER.get(), 2);
    assert_eq!(session.state(), SessionState::Running);

    session.save_state(0).unwrap();
    assert_eq!(std::fs::read(&path).unwrap(), first);
}

#[test]
fn truncated_state_is_rejected() {
    let fx = Fixture::new();
    let mut session = fx.started();
    let path = session.save_state(1).unwrap();
    std::fs::write(&path, [0u8; 3]).unwrap();
    let err = session.load_state(1).unwrap_err();
    assert!(matches!(
        err,
        HostError::Session(SessionError::StateSizeMismatch { found: 3, expected: 8, .. })
    ));
}

#[test]
fn operations_need_content() {
    let fx = Fixture::new();
    let mut session = fx.session();
    assert!(matches!(
        session.save_state(0),
        Err(HostError::Session(SessionError::InvalidState {
            state: SessionState::Unloaded,
            ..
        }))
    ));
    assert!(session.run_frame().is_err());
    assert!(session.reset().is_err());
}

#[test]
fn paused_session_does_not_run() {
    let fx = Fixture::new();
    let mut session = fx.started();
    session.pause().unwrap();
    session.run_frame().unwrap();
    assert_eq!(session.frame_count(), 0);
    assert_eq!(fake::COUNTER.get(), 0);

    // Saving while paused keeps the session paused.
    session.save_state(0).unwrap();
    assert_eq!(session.state(), SessionState::Paused);

    session.resume().unwrap();
    session.run_frame().unwrap();
    assert_eq!(session.frame_count(), 1);
}

#[test]
fn options_declared_at_init_are_served() {
    let fx = Fixture::new();
    let mut session = fx.started();
    assert_eq!(session.option("fake_speed").as_deref(), Some("normal"));
    assert!(session.set_option(OptionScope::Core, "fake_speed", "fast"));
    assert!(!session.set_option(OptionScope::Core, "fake_speed", "warp"));
    assert_eq!(session.option("fake_speed").as_deref(), Some("fast"));
    assert!(fx.root().join("options/fake.json").exists());
}

#[test]
fn battery_ram_survives_restarts() {
    let fx = Fixture::new();
    let mut session = fx.started();
    for _ in 0..5 {
        session.run_frame().unwrap();
    }
    session.stop();

    let sram = fx.config().sram_path("fake", "game");
    let saved = std::fs::read(&sram).unwrap();
    assert_eq!(saved.len(), 16);
    assert_eq!(saved[0], 5);

    session.start_with(fake::core(), Some(&fx.rom)).unwrap();
    assert_eq!(fake::SRAM.with(|s| s.borrow()[0]), 5);
}

#[test]
fn rewind_steps_back_through_snapshots() {
    let fx = Fixture::new();
    let mut config = fx.config();
    config.session.rewind_capacity = 4;
    let mut session = Session::new(config, Processors::default()).unwrap();
    session.start_with(fake::core(), Some(&fx.rom)).unwrap();

    for _ in 0..3 {
        session.run_frame().unwrap();
    }
    assert_eq!(session.rewind_len(), 3);

    assert!(session.set_rewinding(true));
    session.run_frame().unwrap();
    session.run_frame().unwrap();
    assert_eq!(fake::COUNTER.get(), 2);
    assert_eq!(session.frame_count(), 3);

    session.set_rewinding(false);
    session.run_frame().unwrap();
    assert_eq!(fake::COUNTER.get(), 3);
}

#[test]
fn rewind_is_off_by_default() {
    let fx = Fixture::new();
    let mut session = fx.started();
    session.run_frame().unwrap();
    assert!(!session.set_rewinding(true));
    session.run_frame().unwrap();
    assert_eq!(fake::COUNTER.get(), 2);
}

#[test]
fn one_session_per_thread() {
    let fx = Fixture::new();
    let first = fx.session();
    assert!(matches!(
        Session::new(fx.config(), Processors::default()),
        Err(HostError::Session(SessionError::ThreadOccupied))
    ));
    drop(first);
    let _second = fx.session();
}

#[test]
fn cheat_codes_must_be_c_strings() {
    let fx = Fixture::new();
    let mut session = fx.started();
    session.cheat_set(0, true, "ABCD-1234").unwrap();
    assert!(matches!(
        session.cheat_set(1, true, "AB\0CD"),
        Err(HostError::Session(SessionError::InvalidString(_)))
    ));
}

/// Counts processor lifecycle calls across restarts.
#[derive(Clone, Default)]
struct CountingAudio {
    inits: Arc<AtomicUsize>,
    disposes: Arc<AtomicUsize>,
}

impl AudioProcessor for CountingAudio {
    fn init(&mut self, _sample_rate: f64) {
        self.inits.fetch_add(1, Ordering::SeqCst);
    }

    fn dispose(&mut self) {
        self.disposes.fetch_add(1, Ordering::SeqCst);
    }
}

#[test]
fn restart_reinitializes_the_audio_processor() {
    let fx = Fixture::new();
    let audio = CountingAudio::default();
    let processors = Processors::default().with_audio(audio.clone());
    let mut session = Session::new(fx.config(), processors).unwrap();

    session.start_with(fake::core(), Some(&fx.rom)).unwrap();
    assert_eq!(audio.inits.load(Ordering::SeqCst), 1);
    session.stop();
    assert_eq!(audio.disposes.load(Ordering::SeqCst), 1);
    assert_eq!(session.context().lock().audio.sample_rate(), 0.0);

    // Same negotiated rate as before, the processor still has to come back up.
    session.start_with(fake::core(), Some(&fx.rom)).unwrap();
    assert_eq!(audio.inits.load(Ordering::SeqCst), 2);
    assert_eq!(session.context().lock().audio.sample_rate(), 48_000.0);
}

#[test]
fn restart_forgets_negotiated_video_and_input() {
    let fx = Fixture::new();
    let mut session = fx.started();
    session.run_frame().unwrap();
    session.set_controller_port_device(0, DEVICE_NONE).unwrap();
    {
        let ctx = session.context().lock();
        assert_eq!(ctx.graphics.pixel_format(), PixelFormat::Xrgb8888);
        assert_eq!(ctx.input.port_device(0), DEVICE_NONE);
    }

    session.stop();
    assert!(session.last_frame().is_none());

    fake::PLAIN_INIT.set(true);
    session.start_with(fake::core(), Some(&fx.rom)).unwrap();
    {
        let ctx = session.context().lock();
        assert_eq!(ctx.graphics.pixel_format(), PixelFormat::Orgb1555);
        assert_eq!(ctx.graphics.rotation, 0);
        assert_eq!(ctx.graphics.frames_presented(), 0);
        assert_eq!(ctx.input.port_device(0), DEVICE_JOYPAD);
        assert!(ctx.input.controllers().is_empty());
    }
    assert!(session.last_frame().is_none());
}

#[test]
fn stop_closes_vfs_files_the_core_left_open() {
    let fx = Fixture::new();
    let path = fx.root().join("core-scratch.bin");
    fake::VFS_FILE.set(Some(CString::new(path.to_str().unwrap()).unwrap()));

    let me = thread::current().id();
    let mut session = fx.started();
    assert!(path.exists());
    assert_eq!(vfs::open_files_for(me), 1);

    session.stop();
    assert_eq!(vfs::open_files_for(me), 0);
}

#[test]
fn stop_silences_every_bridge() {
    let fx = Fixture::new();
    let mut session = fx.started();
    session.stop();
    {
        let ctx = session.context().lock();
        assert!(!ctx.graphics.enabled);
        assert!(!ctx.audio.enabled);
        assert!(!ctx.input.enabled);
        assert!(!ctx.log.enabled);
        assert!(!ctx.message.enabled);
        assert!(!ctx.led.enabled);
    }

    session.start_with(fake::core(), Some(&fx.rom)).unwrap();
    let ctx = session.context().lock();
    assert!(ctx.input.enabled && ctx.log.enabled && ctx.message.enabled && ctx.led.enabled);
}
