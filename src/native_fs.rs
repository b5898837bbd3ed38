//! A backend that remaps every path under a configured root and forwards to real host
//! syscalls -- a chroot-style view without requiring an actual `chroot(2)`.

use std::cell::RefCell;
use std::collections::HashMap;
use std::ffi::CString;
use std::os::unix::io::RawFd;

use log::debug;

use crate::continuation::Continuation;
use crate::filesystem::{DentsResult, Filesystem, ReadResult, StatResult};

/// Forwards every operation to the host filesystem, rooted under `root`.
///
/// Continuations resolve synchronously (the syscall has already completed by the time
/// the continuation is constructed); a future rework could defer to a worker pool
/// without changing this type's interface, since callers only ever see
/// `Continuation<T>`.
pub struct NativeFilesystem {
    root: String,
    // Local FD -> translated path, kept for diagnostics only; never consulted for
    // correctness.
    open_files: RefCell<HashMap<RawFd, String>>,
}

impl NativeFilesystem {
    pub fn new(root: impl Into<String>) -> Self {
        NativeFilesystem {
            root: root.into(),
            open_files: RefCell::new(HashMap::new()),
        }
    }

    /// `translate(p) = root + "/" + p`. No canonicalization: the VFS is responsible for
    /// presenting an already-absolute, already-mount-relative path.
    fn translate(&self, path: &str) -> String {
        format!("{}/{}", self.root, path.trim_start_matches('/'))
    }

    fn errno() -> i32 {
        std::io::Error::last_os_error().raw_os_error().unwrap_or(libc::EIO)
    }
}

impl Filesystem for NativeFilesystem {
    fn open(&self, name: &str, flags: i32, mode: u32) -> Continuation<i32> {
        let full = self.translate(name);
        debug!("native open: {}", full);
        let ret = match CString::new(full.clone()) {
            Ok(c) => {
                let fd = unsafe { libc::open(c.as_ptr(), flags, mode) };
                if fd >= 0 {
                    self.open_files.borrow_mut().insert(fd, full);
                    fd
                } else {
                    -Self::errno()
                }
            }
            Err(_) => -libc::EINVAL,
        };
        Continuation::from_value(ret)
    }

    fn close(&self, fd: i32) -> Continuation<i32> {
        let ret = unsafe { libc::close(fd) };
        let ret = if ret == 0 { 0 } else { -Self::errno() };
        self.open_files.borrow_mut().remove(&fd);
        Continuation::from_value(ret)
    }

    fn read(&self, fd: i32, count: usize) -> Continuation<ReadResult> {
        let mut buf = vec![0u8; count];
        let n = unsafe { libc::read(fd, buf.as_mut_ptr() as *mut libc::c_void, count) };
        let result = if n >= 0 {
            buf.truncate(n as usize);
            ReadResult {
                retval: n as isize,
                data: buf,
            }
        } else {
            ReadResult {
                retval: -Self::errno() as isize,
                data: Vec::new(),
            }
        };
        Continuation::from_value(result)
    }

    fn write(&self, fd: i32, data: Vec<u8>) -> Continuation<isize> {
        let n = unsafe { libc::write(fd, data.as_ptr() as *const libc::c_void, data.len()) };
        let ret = if n >= 0 { n as isize } else { -Self::errno() as isize };
        Continuation::from_value(ret)
    }

    fn lseek(&self, fd: i32, offset: i64, whence: i32) -> Continuation<i64> {
        let off = unsafe { libc::lseek(fd, offset, whence) };
        let ret = if off >= 0 { off } else { -Self::errno() as i64 };
        Continuation::from_value(ret)
    }

    fn fstat(&self, fd: i32) -> Continuation<StatResult> {
        let mut stat: libc::stat = unsafe { std::mem::zeroed() };
        let rc = unsafe { libc::fstat(fd, &mut stat) };
        let retval = if rc == 0 { 0 } else { -Self::errno() };
        Continuation::from_value(StatResult { retval, stat })
    }

    fn stat(&self, path: &str) -> Continuation<StatResult> {
        let full = self.translate(path);
        let mut stat: libc::stat = unsafe { std::mem::zeroed() };
        let retval = match CString::new(full) {
            Ok(c) => {
                let rc = unsafe { libc::stat(c.as_ptr(), &mut stat) };
                if rc == 0 { 0 } else { -Self::errno() }
            }
            Err(_) => -libc::EINVAL,
        };
        Continuation::from_value(StatResult { retval, stat })
    }

    fn lstat(&self, path: &str) -> Continuation<StatResult> {
        let full = self.translate(path);
        let mut stat: libc::stat = unsafe { std::mem::zeroed() };
        let retval = match CString::new(full) {
            Ok(c) => {
                let rc = unsafe { libc::lstat(c.as_ptr(), &mut stat) };
                if rc == 0 { 0 } else { -Self::errno() }
            }
            Err(_) => -libc::EINVAL,
        };
        Continuation::from_value(StatResult { retval, stat })
    }

    fn access(&self, path: &str, mode: i32) -> Continuation<i32> {
        let full = self.translate(path);
        let ret = match CString::new(full) {
            Ok(c) => {
                let rc = unsafe { libc::access(c.as_ptr(), mode) };
                if rc == 0 { 0 } else { -Self::errno() }
            }
            Err(_) => -libc::EINVAL,
        };
        Continuation::from_value(ret)
    }

    fn getdents(&self, fd: i32, count: usize) -> Continuation<DentsResult> {
        let mut buf = vec![0u8; count];
        let n = unsafe {
            libc::syscall(
                libc::SYS_getdents64,
                fd,
                buf.as_mut_ptr() as *mut libc::c_void,
                count,
            )
        };
        let result = if n >= 0 {
            buf.truncate(n as usize);
            DentsResult {
                retval: n as i32,
                data: buf,
            }
        } else {
            DentsResult {
                retval: -Self::errno(),
                data: Vec::new(),
            }
        };
        Continuation::from_value(result)
    }

    fn readlink(&self, path: &str, bufsize: usize) -> Continuation<ReadResult> {
        let full = self.translate(path);
        let mut buf = vec![0u8; bufsize];
        let result = match CString::new(full) {
            Ok(c) => {
                let n = unsafe {
                    libc::readlink(c.as_ptr(), buf.as_mut_ptr() as *mut libc::c_char, bufsize)
                };
                if n >= 0 {
                    buf.truncate(n as usize);
                    ReadResult {
                        retval: n as isize,
                        data: buf,
                    }
                } else {
                    ReadResult {
                        retval: -Self::errno() as isize,
                        data: Vec::new(),
                    }
                }
            }
            Err(_) => ReadResult {
                retval: -libc::EINVAL as isize,
                data: Vec::new(),
            },
        };
        Continuation::from_value(result)
    }
}
