//! Virtual file system bridge (`GET_VFS_INTERFACE`).
//!
//! The core receives [`INTERFACE`], a table of `extern "C"` functions backed by real
//! files. Open files live in a process-wide handle table: cores are free to do file I/O
//! from their own worker threads, so VFS calls are not routed through the per-thread
//! session registry. Each handle remembers the thread that opened it, and a stopping
//! session closes whatever its thread left open.
//!
//! The table lock covers lookups, inserts and removals only. Every open file has its own
//! lock, taken for the I/O itself, so a slow read never blocks another session.
//!
//! Every failure (including an unknown handle) is reported to the core as `-1`.

use std::collections::HashMap;
use std::ffi::{CString, c_char, c_int, c_uint, c_void};
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;
use std::sync::Arc;
use std::thread::{self, ThreadId};

use lazy_static::lazy_static;
use parking_lot::Mutex;

use crate::abi::{self, VfsFileHandle, VfsInterface, VfsInterfaceInfo, vfs_flags};
use crate::error::VfsError;

/// Highest VFS interface version served (v3 adds directory enumeration, not provided).
pub const SUPPORTED_VERSION: u32 = 2;

/// An open file, shared between the table and whoever is doing I/O on it.
pub type SharedFile = Arc<Mutex<File>>;

struct OpenFile {
    path: CString,
    owner: ThreadId,
    file: SharedFile,
}

/// Open VFS files keyed by the handle value given to the core.
#[derive(Default)]
pub struct HandleTable {
    next: usize,
    files: HashMap<usize, OpenFile>,
}

impl HandleTable {
    /// Register an opened file. Handles start at 1.
    pub fn insert(&mut self, path: CString, owner: ThreadId, file: File) -> usize {
        self.next += 1;
        let handle = self.next;
        self.files.insert(
            handle,
            OpenFile {
                path,
                owner,
                file: Arc::new(Mutex::new(file)),
            },
        );
        handle
    }

    pub fn get(&self, handle: usize) -> Result<SharedFile, VfsError> {
        self.files
            .get(&handle)
            .map(|f| Arc::clone(&f.file))
            .ok_or(VfsError::UnknownHandle(handle))
    }

    /// Forget `handle`. The file closes once any I/O still running on it finishes.
    pub fn close(&mut self, handle: usize) -> Result<(), VfsError> {
        self.files
            .remove(&handle)
            .map(drop)
            .ok_or(VfsError::UnknownHandle(handle))
    }

    /// Close every handle opened from `owner`. Returns how many were open.
    pub fn close_owned_by(&mut self, owner: ThreadId) -> usize {
        let before = self.files.len();
        self.files.retain(|_, f| f.owner != owner);
        before - self.files.len()
    }

    pub fn owned_by(&self, owner: ThreadId) -> usize {
        self.files.values().filter(|f| f.owner == owner).count()
    }

    pub fn path(&self, handle: usize) -> Option<*const c_char> {
        self.files.get(&handle).map(|f| f.path.as_ptr())
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

lazy_static! {
    static ref HANDLES: Mutex<HandleTable> = Mutex::new(HandleTable::default());
}

/// Open `path` with `RETRO_VFS_FILE_ACCESS_*` flags. The file system call runs before
/// the table lock is taken.
pub fn open_file(path: &str, mode: u32) -> Result<File, VfsError> {
    let update = mode & vfs_flags::ACCESS_UPDATE_EXISTING != 0;
    let mut options = OpenOptions::new();
    match mode & vfs_flags::ACCESS_READ_WRITE {
        vfs_flags::ACCESS_READ => options.read(true),
        vfs_flags::ACCESS_WRITE => options.write(true).create(!update).truncate(!update),
        vfs_flags::ACCESS_READ_WRITE => options
            .read(true)
            .write(true)
            .create(!update)
            .truncate(!update),
        _ => return Err(VfsError::InvalidMode(mode)),
    };
    Ok(options.open(path)?)
}

/// Open `path` and hand out a handle owned by the calling thread.
pub fn open(path: &str, mode: u32) -> Result<usize, VfsError> {
    let c_path = CString::new(path).map_err(|_| VfsError::InvalidPath)?;
    let file = open_file(path, mode)?;
    let handle = HANDLES.lock().insert(c_path, thread::current().id(), file);
    tracing::trace!(handle, path, mode, "vfs open");
    Ok(handle)
}

pub fn close(handle: usize) -> Result<(), VfsError> {
    HANDLES.lock().close(handle)
}

/// Run `op` on an open file. Only the file's own lock is held while it runs.
pub fn with_file<T>(
    handle: usize,
    op: impl FnOnce(&mut File) -> Result<T, VfsError>,
) -> Result<T, VfsError> {
    let file = HANDLES.lock().get(handle)?;
    let mut file = file.lock();
    op(&mut file)
}

/// Close every VFS file `owner` left open; called when its session stops.
pub fn close_owned_by(owner: ThreadId) -> usize {
    HANDLES.lock().close_owned_by(owner)
}

/// Number of VFS files currently open by any core.
pub fn open_files() -> usize {
    HANDLES.lock().len()
}

/// Number of VFS files opened from `owner` and not yet closed.
pub fn open_files_for(owner: ThreadId) -> usize {
    HANDLES.lock().owned_by(owner)
}

fn read_full(file: &mut File, buf: &mut [u8]) -> Result<usize, VfsError> {
    let mut total = 0;
    while total < buf.len() {
        match file.read(&mut buf[total..])? {
            0 => break,
            n => total += n,
        }
    }
    Ok(total)
}

fn seek_from(offset: i64, whence: i32) -> Result<SeekFrom, VfsError> {
    Ok(match whence {
        vfs_flags::SEEK_POSITION_START => {
            SeekFrom::Start(u64::try_from(offset).map_err(|_| VfsError::InvalidSeek(whence))?)
        }
        vfs_flags::SEEK_POSITION_CURRENT => SeekFrom::Current(offset),
        vfs_flags::SEEK_POSITION_END => SeekFrom::End(offset),
        _ => return Err(VfsError::InvalidSeek(whence)),
    })
}

/// Answer `GET_VFS_INTERFACE`.
pub fn negotiate(info: &mut VfsInterfaceInfo) -> bool {
    if info.required_interface_version > SUPPORTED_VERSION {
        tracing::debug!(
            requested = info.required_interface_version,
            supported = SUPPORTED_VERSION,
            "vfs interface version too new"
        );
        return false;
    }
    info.required_interface_version = SUPPORTED_VERSION;
    info.iface = &INTERFACE;
    true
}

/// The function table handed to cores.
pub static INTERFACE: VfsInterface = VfsInterface {
    get_path: Some(vfs_get_path),
    open: Some(vfs_open),
    close: Some(vfs_close),
    size: Some(vfs_size),
    tell: Some(vfs_tell),
    seek: Some(vfs_seek),
    read: Some(vfs_read),
    write: Some(vfs_write),
    flush: Some(vfs_flush),
    remove: Some(vfs_remove),
    rename: Some(vfs_rename),
    truncate: Some(vfs_truncate),
};

fn handle_of(stream: *mut VfsFileHandle) -> usize {
    stream as usize
}

/// Map a result to the ABI's `-1` convention.
fn report<T>(op: &'static str, result: Result<T, VfsError>, ok: impl FnOnce(T) -> i64) -> i64 {
    match result {
        Ok(v) => ok(v),
        Err(e) => {
            tracing::debug!(op, error = %e, "vfs operation failed");
            -1
        }
    }
}

unsafe extern "C" fn vfs_get_path(stream: *mut VfsFileHandle) -> *const c_char {
    HANDLES
        .lock()
        .path(handle_of(stream))
        .unwrap_or(std::ptr::null())
}

unsafe extern "C" fn vfs_open(path: *const c_char, mode: c_uint, _hints: c_uint) -> *mut VfsFileHandle {
    let Some(path) = (unsafe { abi::cstr::to_str(path) }) else {
        return std::ptr::null_mut();
    };
    match open(path, mode) {
        Ok(handle) => handle as *mut VfsFileHandle,
        Err(e) => {
            tracing::debug!(path, error = %e, "vfs open failed");
            std::ptr::null_mut()
        }
    }
}

unsafe extern "C" fn vfs_close(stream: *mut VfsFileHandle) -> c_int {
    report("close", close(handle_of(stream)), |_| 0) as c_int
}

unsafe extern "C" fn vfs_size(stream: *mut VfsFileHandle) -> i64 {
    let size = with_file(handle_of(stream), |f| Ok(f.metadata()?.len()));
    report("size", size, |n| n as i64)
}

unsafe extern "C" fn vfs_tell(stream: *mut VfsFileHandle) -> i64 {
    let position = with_file(handle_of(stream), |f| Ok(f.stream_position()?));
    report("tell", position, |n| n as i64)
}

unsafe extern "C" fn vfs_seek(stream: *mut VfsFileHandle, offset: i64, whence: c_int) -> i64 {
    let position = seek_from(offset, whence)
        .and_then(|from| with_file(handle_of(stream), |f| Ok(f.seek(from)?)));
    report("seek", position, |n| n as i64)
}

unsafe extern "C" fn vfs_read(stream: *mut VfsFileHandle, buf: *mut c_void, len: u64) -> i64 {
    if buf.is_null() {
        return -1;
    }
    // SAFETY: the core provides `len` writable bytes at `buf`.
    let buf = unsafe { std::slice::from_raw_parts_mut(buf.cast::<u8>(), len as usize) };
    report("read", with_file(handle_of(stream), |f| read_full(f, buf)), |n| n as i64)
}

unsafe extern "C" fn vfs_write(stream: *mut VfsFileHandle, buf: *const c_void, len: u64) -> i64 {
    if buf.is_null() {
        return -1;
    }
    // SAFETY: the core provides `len` readable bytes at `buf`.
    let buf = unsafe { std::slice::from_raw_parts(buf.cast::<u8>(), len as usize) };
    let written = with_file(handle_of(stream), |f| Ok(f.write_all(buf)?));
    report("write", written, |_| buf.len() as i64)
}

unsafe extern "C" fn vfs_flush(stream: *mut VfsFileHandle) -> c_int {
    report("flush", with_file(handle_of(stream), |f| Ok(f.flush()?)), |_| 0) as c_int
}

unsafe extern "C" fn vfs_truncate(stream: *mut VfsFileHandle, length: i64) -> i64 {
    let Ok(length) = u64::try_from(length) else {
        return -1;
    };
    let truncated = with_file(handle_of(stream), |f| Ok(f.set_len(length)?));
    report("truncate", truncated, |_| 0)
}

unsafe extern "C" fn vfs_remove(path: *const c_char) -> c_int {
    let Some(path) = (unsafe { abi::cstr::to_str(path) }) else {
        return -1;
    };
    report("remove", std::fs::remove_file(path).map_err(VfsError::from), |_| 0) as c_int
}

unsafe extern "C" fn vfs_rename(old: *const c_char, new: *const c_char) -> c_int {
    let (Some(old), Some(new)) = (unsafe { abi::cstr::to_str(old) }, unsafe { abi::cstr::to_str(new) })
    else {
        return -1;
    };
    report(
        "rename",
        std::fs::rename(Path::new(old), Path::new(new)).map_err(VfsError::from),
        |_| 0,
    ) as c_int
}

#[cfg(test)]
mod tests {
    use super::*;

    fn c_path(path: &Path) -> CString {
        CString::new(path.to_str().unwrap()).unwrap()
    }

    #[test]
    fn round_trip_through_the_interface() {
        let dir = tempfile::tempdir().unwrap();
        let path = c_path(&dir.path().join("save.bin"));
        let iface = &INTERFACE;
        let data = b"retro vfs round trip";

        unsafe {
            let h = (iface.open.unwrap())(path.as_ptr(), vfs_flags::ACCESS_READ_WRITE, 0);
            assert!(!h.is_null());
            assert_eq!(
                (iface.write.unwrap())(h, data.as_ptr().cast(), data.len() as u64),
                data.len() as i64
            );
            assert_eq!((iface.seek.unwrap())(h, 0, vfs_flags::SEEK_POSITION_START), 0);

            let mut back = [0u8; 20];
            assert_eq!(
                (iface.read.unwrap())(h, back.as_mut_ptr().cast(), back.len() as u64),
                data.len() as i64
            );
            assert_eq!(&back, data);
            assert_eq!((iface.size.unwrap())(h), data.len() as i64);
            assert_eq!((iface.tell.unwrap())(h), data.len() as i64);
            assert_eq!(abi::cstr::to_str((iface.get_path.unwrap())(h)), path.to_str().ok());

            assert_eq!((iface.truncate.unwrap())(h, 5), 0);
            assert_eq!((iface.size.unwrap())(h), 5);
            assert_eq!((iface.close.unwrap())(h), 0);

            // Closed handles are unknown from now on.
            assert_eq!((iface.tell.unwrap())(h), -1);
            assert_eq!((iface.close.unwrap())(h), -1);
        }
    }

    #[test]
    fn unknown_handles_report_failure() {
        let bogus = usize::MAX as *mut VfsFileHandle;
        let mut buf = [0u8; 4];
        unsafe {
            assert_eq!(vfs_size(bogus), -1);
            assert_eq!(vfs_seek(bogus, 0, vfs_flags::SEEK_POSITION_END), -1);
            assert_eq!(vfs_read(bogus, buf.as_mut_ptr().cast(), 4), -1);
            assert_eq!(vfs_flush(bogus), -1);
            assert!(vfs_get_path(bogus).is_null());
        }
    }

    #[test]
    fn read_only_open_of_missing_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.bin");
        assert!(open_file(missing.to_str().unwrap(), vfs_flags::ACCESS_READ).is_err());
        assert!(matches!(
            open_file(missing.to_str().unwrap(), 0),
            Err(VfsError::InvalidMode(0))
        ));
    }

    #[test]
    fn update_existing_keeps_contents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("keep.bin");
        std::fs::write(&path, b"abcdef").unwrap();

        let mode = vfs_flags::ACCESS_WRITE | vfs_flags::ACCESS_UPDATE_EXISTING;
        let h = open(path.to_str().unwrap(), mode).unwrap();
        with_file(h, |f| {
            f.seek(SeekFrom::Start(2))?;
            Ok(f.write_all(b"XY")?)
        })
        .unwrap();
        close(h).unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"abXYef");
    }

    #[test]
    fn io_runs_without_the_table_lock() {
        let dir = tempfile::tempdir().unwrap();
        let a = open(dir.path().join("a.bin").to_str().unwrap(), vfs_flags::ACCESS_WRITE).unwrap();
        let b = open(dir.path().join("b.bin").to_str().unwrap(), vfs_flags::ACCESS_WRITE).unwrap();

        // While one file is busy, the table still serves lookups and other files.
        let nested = with_file(a, |_| {
            let stream = b as *mut VfsFileHandle;
            Ok(unsafe { (vfs_write(stream, b"xyz".as_ptr().cast(), 3), vfs_size(stream)) })
        })
        .unwrap();
        assert_eq!(nested, (3, 3));

        close(a).unwrap();
        close(b).unwrap();
    }

    #[test]
    fn handles_are_closed_per_owner() {
        let dir = tempfile::tempdir().unwrap();
        let path = |name: &str| dir.path().join(name).to_str().unwrap().to_owned();
        let me = thread::current().id();

        let first = open(&path("one.bin"), vfs_flags::ACCESS_WRITE).unwrap();
        open(&path("two.bin"), vfs_flags::ACCESS_WRITE).unwrap();
        let (other, theirs) = {
            let path = path("three.bin");
            thread::spawn(move || {
                let h = open(&path, vfs_flags::ACCESS_WRITE).unwrap();
                (thread::current().id(), h)
            })
            .join()
            .unwrap()
        };
        assert_eq!(open_files_for(me), 2);
        assert_eq!(open_files_for(other), 1);

        assert_eq!(close_owned_by(me), 2);
        assert_eq!(open_files_for(me), 0);
        assert!(matches!(close(first), Err(VfsError::UnknownHandle(_))));

        // Another owner's handle is untouched and still usable from here.
        assert_eq!(with_file(theirs, |f| Ok(f.metadata()?.len())).unwrap(), 0);
        assert_eq!(close_owned_by(other), 1);
    }

    #[test]
    fn remove_and_rename_work_on_paths() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.txt");
        let b = dir.path().join("b.txt");
        std::fs::write(&a, b"x").unwrap();
        unsafe {
            assert_eq!(vfs_rename(c_path(&a).as_ptr(), c_path(&b).as_ptr()), 0);
            assert!(b.is_file() && !a.exists());
            assert_eq!(vfs_remove(c_path(&b).as_ptr()), 0);
            assert_eq!(vfs_remove(c_path(&b).as_ptr()), -1);
        }
    }

    #[test]
    fn negotiation_caps_at_supported_version() {
        let mut info = VfsInterfaceInfo {
            required_interface_version: 1,
            iface: std::ptr::null(),
        };
        assert!(negotiate(&mut info));
        assert_eq!(info.required_interface_version, SUPPORTED_VERSION);
        assert!(!info.iface.is_null());

        info.required_interface_version = 3;
        assert!(!negotiate(&mut info));
    }
}
