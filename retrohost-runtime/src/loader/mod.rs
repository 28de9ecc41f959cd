//! Dynamic library loader.
//!
//! Responsibilities:
//! - Map a core shared object into the process (`dlopen` on POSIX, `LoadLibraryW` on
//!   Windows; both behind `libloading::Library`).
//! - Optionally copy the library to a scratch directory first, so the original file can be
//!   replaced or deleted while the core is running, and so two sessions can load the same
//!   core binary without sharing its static state.
//! - Resolve symbols into typed function pointers.
//! - Unload exactly once and remove the scratch copy (best-effort).

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use libloading::Library;

use crate::error::{BindingError, LoadError};

static SCRATCH_COUNTER: AtomicUsize = AtomicUsize::new(0);

/// A loaded native library.
#[derive(Debug)]
pub struct DynamicLibrary {
    /// Path the caller asked for.
    source: PathBuf,
    /// Scratch copy that was actually mapped, if any.
    scratch: Option<PathBuf>,
    library: Option<Library>,
}

impl DynamicLibrary {
    /// Load the library at `path` in place.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, LoadError> {
        let source = path.as_ref().to_path_buf();
        if !source.is_file() {
            return Err(LoadError::NotFound(source));
        }
        let library = map(&source)?;
        tracing::debug!(path = %source.display(), "mapped core library");

        Ok(Self {
            source,
            scratch: None,
            library: Some(library),
        })
    }

    /// Copy the library into `scratch_dir` and load the copy.
    ///
    /// The copy is removed again if mapping fails.
    pub fn open_with_scratch(
        path: impl AsRef<Path>,
        scratch_dir: impl AsRef<Path>,
    ) -> Result<Self, LoadError> {
        let source = path.as_ref().to_path_buf();
        if !source.is_file() {
            return Err(LoadError::NotFound(source));
        }

        let scratch = scratch_path(&source, scratch_dir.as_ref());
        let copy = std::fs::create_dir_all(scratch_dir.as_ref())
            .and_then(|_| std::fs::copy(&source, &scratch));
        if let Err(source) = copy {
            return Err(LoadError::ScratchCopy {
                path: scratch,
                source,
            });
        }

        match map(&scratch) {
            Ok(library) => {
                tracing::debug!(
                    path = %source.display(),
                    scratch = %scratch.display(),
                    "mapped core library from scratch copy"
                );
                Ok(Self {
                    source,
                    scratch: Some(scratch),
                    library: Some(library),
                })
            }
            Err(e) => {
                remove_scratch(&scratch);
                Err(e)
            }
        }
    }

    /// Path the library was requested from (not the scratch copy).
    pub fn path(&self) -> &Path {
        &self.source
    }

    /// Path of the scratch copy, if the library was loaded from one.
    pub fn scratch_path(&self) -> Option<&Path> {
        self.scratch.as_deref()
    }

    pub fn is_loaded(&self) -> bool {
        self.library.is_some()
    }

    /// Resolve `name` as a value of type `T` (normally an `unsafe extern "C" fn`).
    ///
    /// # Safety
    /// `T` must match the real type of the exported symbol.
    pub unsafe fn get<T: Copy>(&self, name: &str) -> Result<T, BindingError> {
        let library = self
            .library
            .as_ref()
            .ok_or_else(|| BindingError::MissingSymbol(name.to_owned()))?;
        // SAFETY: the caller guarantees `T` matches the symbol's type.
        let symbol = unsafe { library.get::<T>(name.as_bytes()) }
            .map_err(|_| BindingError::MissingSymbol(name.to_owned()))?;
        Ok(*symbol)
    }

    /// Resolve `name`, treating a missing symbol as `None`.
    ///
    /// # Safety
    /// Same as [`DynamicLibrary::get`].
    pub unsafe fn get_optional<T: Copy>(&self, name: &str) -> Option<T> {
        unsafe { self.get(name) }.ok()
    }

    /// Unmap the library and delete the scratch copy. Safe to call more than once.
    pub fn unload(&mut self) {
        let Some(library) = self.library.take() else {
            return;
        };

        if let Err(e) = library.close() {
            tracing::warn!(path = %self.source.display(), error = %e, "failed to unmap core library");
        } else {
            tracing::debug!(path = %self.source.display(), "unmapped core library");
        }

        if let Some(scratch) = self.scratch.take() {
            remove_scratch(&scratch);
        }
    }
}

impl Drop for DynamicLibrary {
    fn drop(&mut self) {
        self.unload();
    }
}

fn map(path: &Path) -> Result<Library, LoadError> {
    // SAFETY: loading a library runs its initializers. Cores are trusted native code the
    // user chose to run; there is nothing more the frontend can check up front.
    unsafe { Library::new(path) }.map_err(|source| LoadError::Platform {
        path: path.to_path_buf(),
        source,
    })
}

fn scratch_path(source: &Path, scratch_dir: &Path) -> PathBuf {
    let stem = source
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "core".to_owned());
    let n = SCRATCH_COUNTER.fetch_add(1, Ordering::Relaxed);
    let mut name = format!("{stem}-{}-{n}", std::process::id());
    if let Some(ext) = source.extension() {
        name.push('.');
        name.push_str(&ext.to_string_lossy());
    }
    scratch_dir.join(name)
}

fn remove_scratch(path: &Path) {
    if let Err(e) = std::fs::remove_file(path) {
        tracing::debug!(path = %path.display(), error = %e, "could not remove scratch copy");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_path_is_load_error() {
        let err = DynamicLibrary::open("/definitely/not/here/core.so").unwrap_err();
        assert!(matches!(err, LoadError::NotFound(_)));
    }

    #[test]
    fn garbage_file_is_rejected_by_platform_loader() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("garbage_libretro.so");
        std::fs::write(&path, b"this is not a shared object").unwrap();

        let err = DynamicLibrary::open(&path).unwrap_err();
        assert!(matches!(err, LoadError::Platform { .. }));
    }

    #[test]
    fn failed_scratch_load_removes_copy() {
        let dir = tempfile::tempdir().unwrap();
        let scratch = tempfile::tempdir().unwrap();
        let path = dir.path().join("garbage_libretro.so");
        std::fs::write(&path, b"not a library").unwrap();

        assert!(DynamicLibrary::open_with_scratch(&path, scratch.path()).is_err());
        assert_eq!(std::fs::read_dir(scratch.path()).unwrap().count(), 0);
    }

    #[test]
    fn scratch_names_are_unique_and_keep_extension() {
        let dir = Path::new("/tmp/scratch");
        let a = scratch_path(Path::new("/cores/snes_libretro.so"), dir);
        let b = scratch_path(Path::new("/cores/snes_libretro.so"), dir);
        assert_ne!(a, b);
        assert_eq!(a.extension().unwrap(), "so");
        assert!(a.starts_with(dir));
    }

    #[cfg(target_os = "linux")]
    fn system_libc() -> Option<PathBuf> {
        [
            "/lib/x86_64-linux-gnu/libc.so.6",
            "/lib/aarch64-linux-gnu/libc.so.6",
            "/usr/lib/x86_64-linux-gnu/libc.so.6",
            "/usr/lib/libc.so.6",
            "/lib64/libc.so.6",
        ]
        .iter()
        .map(PathBuf::from)
        .find(|p| p.is_file())
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn resolves_present_and_reports_missing_symbols() {
        let Some(path) = system_libc() else {
            return;
        };
        let mut lib = DynamicLibrary::open(&path).unwrap();

        let strlen: unsafe extern "C" fn(*const std::ffi::c_char) -> usize =
            unsafe { lib.get("strlen") }.unwrap();
        assert_eq!(unsafe { strlen(c"retro".as_ptr()) }, 5);

        let missing = unsafe { lib.get::<unsafe extern "C" fn()>("retro_init") }.unwrap_err();
        assert_eq!(missing.to_string(), "missing required symbol `retro_init`");

        lib.unload();
        lib.unload();
        assert!(!lib.is_loaded());
    }
}
