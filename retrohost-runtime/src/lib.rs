//! retrohost-runtime: hosts libretro cores loaded from native shared libraries.
//!
//! A [`Session`] loads a core, answers its environment commands, and routes its
//! video/audio/input callbacks to host-supplied processors:
//! - Graphics frames arrive converted to 32-bit BGRA ([`processor::Frame`]).
//! - Audio arrives as interleaved `f32` stereo.
//! - Input state is queried per port/device/id.
//!
//! Core callbacks carry no user data. Each session is bound to the thread that created
//! it, and the callbacks find their session through a thread-keyed registry
//! ([`state::registry`]). All calls into a session must happen on that thread.

pub mod abi;
pub mod av;
pub mod binding;
pub mod config;
pub mod disk;
pub mod environment;
pub mod error;
pub mod input;
pub mod loader;
pub mod messages;
pub mod options;
pub mod processor;
pub mod runtime;
pub mod session;
pub mod state;
pub mod vfs;

pub use binding::{AvInfo, CoreLibrary, CoreSystemInfo};
pub use config::HostConfig;
pub use error::{HostError, Result};
pub use options::OptionScope;
pub use processor::{
    AudioProcessor, Frame, GraphicsProcessor, InputProcessor, LedProcessor, LogLevel,
    LogProcessor, MessageProcessor, MessageRequest, Processors,
};
pub use session::{Session, SessionState};
