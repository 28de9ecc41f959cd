//! Environment command dispatcher.
//!
//! `retro_environment` is a single upcall multiplexing every capability query the core
//! can make. Each implemented command is a [`Handler`] in a table keyed by
//! [`EnvCommand`]; the per-category modules register their handlers and own the payload
//! layouts they read and write.
//!
//! Dispatch rules:
//! - unknown ids and commands without a handler return `false` (the core falls back);
//! - a handler that needs a payload is never called with a null one;
//! - handler errors are logged and turned into `false`, the session keeps running.

mod graphics;
mod input;
mod media;
mod options;
mod system;

#[cfg(test)]
mod tests;

use std::collections::HashMap;
use std::ffi::c_void;

use lazy_static::lazy_static;

use crate::abi::EnvCommand;
use crate::error::EnvironmentCommandError;
use crate::state::SessionContext;

/// Result of one handler.
pub(crate) type HandlerResult = Result<(), EnvironmentCommandError>;

/// Handler entry point. `data` is non-null whenever the handler declared a payload.
pub(crate) type HandlerFn = unsafe fn(&mut SessionContext, *mut c_void) -> HandlerResult;

#[derive(Clone, Copy)]
pub(crate) enum Payload {
    /// A null `data` fails the command before the handler runs.
    Required,
    /// The handler accepts null, usually to ask whether the command is supported.
    Optional,
}

#[derive(Clone, Copy)]
pub(crate) struct Handler {
    pub payload: Payload,
    pub run: HandlerFn,
}

/// Commands the runtime recognizes but deliberately does not implement.
pub const UNSUPPORTED: &[EnvCommand] = &[
    EnvCommand::GetSensorInterface,
    EnvCommand::GetCameraInterface,
    EnvCommand::GetPerfInterface,
    EnvCommand::GetLocationInterface,
    EnvCommand::SetSubsystemInfo,
    EnvCommand::SetMemoryMaps,
    EnvCommand::GetCurrentSoftwareFramebuffer,
    EnvCommand::GetHwRenderInterface,
    EnvCommand::SetHwRenderContextNegotiationInterface,
    EnvCommand::SetHwSharedContext,
    EnvCommand::GetMidiInterface,
    EnvCommand::GetHwRenderContextNegotiationInterfaceSupport,
    EnvCommand::GetMicrophoneInterface,
    EnvCommand::GetDevicePower,
    EnvCommand::SetNetpacketInterface,
];

pub struct Dispatcher {
    handlers: HashMap<EnvCommand, Handler>,
}

impl Dispatcher {
    fn new() -> Self {
        let mut dispatcher = Self {
            handlers: HashMap::new(),
        };
        graphics::register(&mut dispatcher);
        options::register(&mut dispatcher);
        input::register(&mut dispatcher);
        system::register(&mut dispatcher);
        media::register(&mut dispatcher);
        dispatcher
    }

    pub(crate) fn add(&mut self, command: EnvCommand, payload: Payload, run: HandlerFn) {
        let previous = self.handlers.insert(command, Handler { payload, run });
        debug_assert!(previous.is_none(), "{} registered twice", command.name());
    }

    pub fn is_supported(&self, command: EnvCommand) -> bool {
        self.handlers.contains_key(&command)
    }

    /// Decode and answer one `retro_environment` call.
    ///
    /// # Safety
    /// `data` must be null or point to the payload `libretro.h` defines for `raw`.
    pub unsafe fn dispatch(&self, ctx: &mut SessionContext, raw: u32, data: *mut c_void) -> bool {
        let Some(command) = EnvCommand::from_raw(raw) else {
            tracing::debug!(command = raw, "unknown environment command");
            return false;
        };
        let Some(handler) = self.handlers.get(&command) else {
            tracing::debug!(command = command.name(), "environment command not supported");
            return false;
        };

        let result = match handler.payload {
            Payload::Required if data.is_null() => {
                Err(EnvironmentCommandError::NullPayload(command.name()))
            }
            // SAFETY: guaranteed by the caller.
            _ => unsafe { (handler.run)(ctx, data) },
        };

        match result {
            Ok(()) => {
                tracing::trace!(command = command.name(), "environment command handled");
                true
            }
            Err(e @ EnvironmentCommandError::Unavailable { .. }) => {
                tracing::debug!(command = command.name(), error = %e, "environment command declined");
                false
            }
            Err(e) => {
                tracing::warn!(command = command.name(), error = %e, "environment command failed");
                false
            }
        }
    }
}

lazy_static! {
    static ref DISPATCHER: Dispatcher = Dispatcher::new();
}

pub fn dispatcher() -> &'static Dispatcher {
    &DISPATCHER
}

/// Borrow the payload as `T`.
///
/// # Safety
/// `data` must be non-null and point to a valid `T` for the duration of the call.
pub(crate) unsafe fn payload<'a, T>(data: *mut c_void) -> &'a T {
    unsafe { &*data.cast::<T>() }
}

/// Borrow the payload as a mutable `T`, for out-parameters.
///
/// # Safety
/// Same as [`payload`].
pub(crate) unsafe fn payload_mut<'a, T>(data: *mut c_void) -> &'a mut T {
    unsafe { &mut *data.cast::<T>() }
}

/// Write an out-parameter.
///
/// # Safety
/// Same as [`payload`].
pub(crate) unsafe fn write<T>(data: *mut c_void, value: T) {
    unsafe { data.cast::<T>().write(value) }
}
