//! Error types for retrohost-runtime.
//!
//! Only `LoadError`, `BindingError`, `ContentLoadError` and the session-level errors ever
//! reach a caller as `Err`. Environment, VFS and disk-control failures are local: the ABI
//! surface turns them into `false` / `-1` before returning to the core.

use std::path::PathBuf;

use thiserror::Error;

/// The shared library could not be mapped into the process.
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("core library not found: {0}")]
    NotFound(PathBuf),

    #[error("failed to copy core library to scratch path {path}: {source}")]
    ScratchCopy {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("platform loader rejected {path}: {source}")]
    Platform {
        path: PathBuf,
        #[source]
        source: libloading::Error,
    },
}

/// A symbol could not be resolved from a loaded core.
#[derive(Error, Debug)]
pub enum BindingError {
    #[error("missing required symbol `{0}`")]
    MissingSymbol(String),

    #[error("core reports API version {found}, expected {expected}")]
    ApiVersion { found: u32, expected: u32 },
}

/// `retro_load_game` rejected the content, or the content could not be read.
#[derive(Error, Debug)]
pub enum ContentLoadError {
    #[error("core refused content {0:?}")]
    Rejected(Option<PathBuf>),

    #[error("core requires content but none was given")]
    ContentRequired,

    #[error("failed to read content {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("content path contains an interior NUL byte: {0}")]
    InvalidPath(PathBuf),
}

/// Failure answering one environment command. Always converted into a `false` return.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum EnvironmentCommandError {
    #[error("{0}: payload pointer is null")]
    NullPayload(&'static str),

    #[error("{command}: invalid value {value}")]
    InvalidValue { command: &'static str, value: u32 },

    #[error("{command}: unknown variable `{key}`")]
    UnknownVariable { command: &'static str, key: String },

    #[error("{command}: string is not valid UTF-8")]
    InvalidString { command: &'static str },

    #[error("{command}: {reason}")]
    Unavailable {
        command: &'static str,
        reason: &'static str,
    },
}

/// VFS bridge failure. Reported to the core as `-1`.
#[derive(Error, Debug)]
pub enum VfsError {
    #[error("unknown VFS handle {0}")]
    UnknownHandle(usize),

    #[error("invalid VFS open mode {0:#x}")]
    InvalidMode(u32),

    #[error("invalid seek origin {0}")]
    InvalidSeek(i32),

    #[error("VFS path is not valid UTF-8")]
    InvalidPath,

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Disk control failure. Reported to the caller as `false`.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum DiskControlError {
    #[error("core did not register a disk control interface")]
    NotSupported,

    #[error("image index {index} out of range (core has {count} images)")]
    IndexOutOfRange { index: u32, count: u32 },

    #[error("core rejected disk control request `{0}`")]
    Rejected(&'static str),

    #[error("tray must be open to change images")]
    TrayClosed,
}

/// Options persistence failure.
#[derive(Error, Debug)]
pub enum OptionsError {
    #[error("failed to access options file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed options file {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Host configuration failure.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to access config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("failed to encode config: {0}")]
    Encode(#[from] toml::ser::Error),
}

/// Session lifecycle failure.
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("operation `{operation}` is not valid in state {state:?}")]
    InvalidState {
        operation: &'static str,
        state: crate::session::SessionState,
    },

    #[error("another session is already registered on this thread")]
    ThreadOccupied,

    #[error("session called from a thread other than the one that created it")]
    WrongThread,

    #[error("{0} contains an interior NUL byte")]
    InvalidString(&'static str),

    #[error("core does not support save states")]
    SerializationUnsupported,

    #[error("core failed to {0} state")]
    SerializationFailed(&'static str),

    #[error("save state {path} is {found} bytes, core expects {expected}")]
    StateSizeMismatch {
        path: PathBuf,
        found: usize,
        expected: usize,
    },

    #[error("failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write screenshot: {0}")]
    Screenshot(#[from] png::EncodingError),
}

/// Umbrella error returned by [`crate::Session`] operations.
#[derive(Error, Debug)]
pub enum HostError {
    #[error("load error: {0}")]
    Load(#[from] LoadError),

    #[error("binding error: {0}")]
    Binding(#[from] BindingError),

    #[error("content error: {0}")]
    Content(#[from] ContentLoadError),

    #[error("session error: {0}")]
    Session(#[from] SessionError),

    #[error("disk control error: {0}")]
    DiskControl(#[from] DiskControlError),

    #[error("options error: {0}")]
    Options(#[from] OptionsError),

    #[error("config error: {0}")]
    Config(#[from] ConfigError),
}

pub type Result<T, E = HostError> = std::result::Result<T, E>;
