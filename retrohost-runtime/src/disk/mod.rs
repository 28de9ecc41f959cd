//! Disk control bridge for multi-disk content.
//!
//! The core registers a table of callbacks (`SET_DISK_CONTROL_INTERFACE` or the `_EXT`
//! variant); the host drives it. [`DiskControl`] is `Copy` so a session can take it out
//! of the shared context and call into the core without holding any lock.

use std::ffi::{CString, c_char};
use std::path::Path;

use crate::abi::{DiskControlCallback, DiskControlExtCallback, GameInfo};
use crate::error::DiskControlError;

/// Version reported by `GET_DISK_CONTROL_INTERFACE_VERSION` (1 = extended interface).
pub const INTERFACE_VERSION: u32 = 1;

const LABEL_CAPACITY: usize = 512;

#[derive(Clone, Copy)]
enum Callbacks {
    Basic(DiskControlCallback),
    Extended(DiskControlExtCallback),
}

#[derive(Clone, Copy)]
pub struct DiskControl {
    callbacks: Callbacks,
}

macro_rules! field {
    ($self:ident, $name:ident) => {
        match &$self.callbacks {
            Callbacks::Basic(c) => c.$name,
            Callbacks::Extended(c) => c.$name,
        }
    };
}

impl DiskControl {
    pub fn basic(callbacks: DiskControlCallback) -> Self {
        Self {
            callbacks: Callbacks::Basic(callbacks),
        }
    }

    pub fn extended(callbacks: DiskControlExtCallback) -> Self {
        Self {
            callbacks: Callbacks::Extended(callbacks),
        }
    }

    pub fn is_extended(&self) -> bool {
        matches!(self.callbacks, Callbacks::Extended(_))
    }

    fn extended_callbacks(&self) -> Result<&DiskControlExtCallback, DiskControlError> {
        match &self.callbacks {
            Callbacks::Extended(c) => Ok(c),
            Callbacks::Basic(_) => Err(DiskControlError::NotSupported),
        }
    }

    pub fn is_ejected(&self) -> bool {
        field!(self, get_eject_state).is_some_and(|f| unsafe { f() })
    }

    pub fn set_ejected(&self, ejected: bool) -> Result<(), DiskControlError> {
        let f = field!(self, set_eject_state).ok_or(DiskControlError::NotSupported)?;
        if unsafe { f(ejected) } {
            tracing::info!(ejected, "disk tray state changed");
            Ok(())
        } else {
            Err(DiskControlError::Rejected("set_eject_state"))
        }
    }

    pub fn image_index(&self) -> u32 {
        field!(self, get_image_index).map_or(0, |f| unsafe { f() })
    }

    pub fn image_count(&self) -> u32 {
        field!(self, get_num_images).map_or(0, |f| unsafe { f() })
    }

    /// Select an image. The tray must be open and `index` below the image count; on
    /// failure the current index is left untouched.
    pub fn set_image_index(&self, index: u32) -> Result<(), DiskControlError> {
        let f = field!(self, set_image_index).ok_or(DiskControlError::NotSupported)?;
        let count = self.image_count();
        if index >= count {
            return Err(DiskControlError::IndexOutOfRange { index, count });
        }
        if !self.is_ejected() {
            return Err(DiskControlError::TrayClosed);
        }
        if unsafe { f(index) } {
            tracing::info!(index, count, "disk image selected");
            Ok(())
        } else {
            Err(DiskControlError::Rejected("set_image_index"))
        }
    }

    /// Append an empty image slot; returns its index.
    pub fn add_image(&self) -> Result<u32, DiskControlError> {
        let f = field!(self, add_image_index).ok_or(DiskControlError::NotSupported)?;
        if unsafe { f() } {
            Ok(self.image_count().saturating_sub(1))
        } else {
            Err(DiskControlError::Rejected("add_image_index"))
        }
    }

    /// Point image `index` at `path`, or remove it when `path` is `None`.
    pub fn replace_image(&self, index: u32, path: Option<&Path>) -> Result<(), DiskControlError> {
        let f = field!(self, replace_image_index).ok_or(DiskControlError::NotSupported)?;
        let count = self.image_count();
        if index >= count {
            return Err(DiskControlError::IndexOutOfRange { index, count });
        }
        let path = path.map(path_to_cstring).transpose()?;
        let info = path.as_ref().map(|p| GameInfo {
            path: p.as_ptr(),
            data: std::ptr::null(),
            size: 0,
            meta: std::ptr::null(),
        });
        let ptr = info.as_ref().map_or(std::ptr::null(), |i| i as *const GameInfo);
        if unsafe { f(index, ptr) } {
            Ok(())
        } else {
            Err(DiskControlError::Rejected("replace_image_index"))
        }
    }

    /// Extended interface: choose the image inserted when content loads. Must be called
    /// before `retro_load_game`.
    pub fn set_initial_image(&self, index: u32, path: &Path) -> Result<(), DiskControlError> {
        let f = self
            .extended_callbacks()?
            .set_initial_image
            .ok_or(DiskControlError::NotSupported)?;
        let path = path_to_cstring(path)?;
        if unsafe { f(index, path.as_ptr()) } {
            Ok(())
        } else {
            Err(DiskControlError::Rejected("set_initial_image"))
        }
    }

    pub fn image_path(&self, index: u32) -> Result<String, DiskControlError> {
        let f = self
            .extended_callbacks()?
            .get_image_path
            .ok_or(DiskControlError::NotSupported)?;
        self.query_string(index, "get_image_path", f)
    }

    pub fn image_label(&self, index: u32) -> Result<String, DiskControlError> {
        let f = self
            .extended_callbacks()?
            .get_image_label
            .ok_or(DiskControlError::NotSupported)?;
        self.query_string(index, "get_image_label", f)
    }

    fn query_string(
        &self,
        index: u32,
        op: &'static str,
        f: unsafe extern "C" fn(u32, *mut c_char, usize) -> bool,
    ) -> Result<String, DiskControlError> {
        let count = self.image_count();
        if index >= count {
            return Err(DiskControlError::IndexOutOfRange { index, count });
        }
        let mut buf = vec![0u8; LABEL_CAPACITY];
        if !unsafe { f(index, buf.as_mut_ptr().cast(), buf.len()) } {
            return Err(DiskControlError::Rejected(op));
        }
        let end = buf.iter().position(|&b| b == 0).unwrap_or(buf.len());
        buf.truncate(end);
        Ok(String::from_utf8_lossy(&buf).into_owned())
    }
}

impl std::fmt::Debug for DiskControl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiskControl")
            .field("extended", &self.is_extended())
            .finish()
    }
}

fn path_to_cstring(path: &Path) -> Result<CString, DiskControlError> {
    path.to_str()
        .and_then(|p| CString::new(p).ok())
        .ok_or(DiskControlError::Rejected("non UTF-8 image path"))
}
