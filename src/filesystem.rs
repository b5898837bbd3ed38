//! Abstract POSIX-like operations a backend filesystem must implement.
//!
//! Every operation mirrors a syscall's native return convention: success is `>= 0`,
//! failure is a negative errno. Backends must not panic on ordinary failures -- return
//! the errno instead. Data-bearing operations hand the VFS an owned buffer rather than
//! writing through a raw pointer, since it is the VFS's job (not the backend's) to copy
//! bytes into guest memory.

use crate::continuation::Continuation;

/// Result of a `read`-shaped operation: a `ssize_t`-style return code paired with
/// whatever bytes were actually produced (valid when `retval >= 0`).
#[derive(Debug, Clone, Default)]
pub struct ReadResult {
    pub retval: isize,
    pub data: Vec<u8>,
}

/// Result of a `stat`-family operation.
#[derive(Debug, Clone)]
pub struct StatResult {
    pub retval: i32,
    pub stat: libc::stat,
}

impl Default for StatResult {
    fn default() -> Self {
        StatResult {
            retval: -libc::ENOSYS as i32,
            // SAFETY: an all-zero `libc::stat` is a valid (if meaningless) bit pattern.
            stat: unsafe { std::mem::zeroed() },
        }
    }
}

/// Result of a `getdents` call: the packed `linux_dirent` byte buffer plus the raw
/// return value (total bytes written, or a negative errno).
#[derive(Debug, Clone, Default)]
pub struct DentsResult {
    pub retval: i32,
    pub data: Vec<u8>,
}

/// A backend filesystem, leaf-typed (no deep hierarchies) and object-safe so the VFS
/// can hold a heterogeneous mount table of `Rc<dyn Filesystem>`.
pub trait Filesystem {
    fn open(&self, name: &str, flags: i32, mode: u32) -> Continuation<i32>;
    fn close(&self, fd: i32) -> Continuation<i32>;
    fn read(&self, fd: i32, count: usize) -> Continuation<ReadResult>;
    fn write(&self, fd: i32, data: Vec<u8>) -> Continuation<isize>;
    fn lseek(&self, fd: i32, offset: i64, whence: i32) -> Continuation<i64>;
    fn fstat(&self, fd: i32) -> Continuation<StatResult>;
    fn stat(&self, path: &str) -> Continuation<StatResult>;
    fn lstat(&self, path: &str) -> Continuation<StatResult>;
    fn access(&self, path: &str, mode: i32) -> Continuation<i32>;
    fn getdents(&self, fd: i32, count: usize) -> Continuation<DentsResult>;
    fn readlink(&self, path: &str, bufsize: usize) -> Continuation<ReadResult>;
}
