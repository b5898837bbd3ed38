//! A handle binding a backend-local file descriptor to the backend that produced it.

use std::rc::Rc;
use std::sync::atomic::{AtomicI32, Ordering};

use log::warn;

use crate::continuation::Continuation;
use crate::filesystem::{DentsResult, Filesystem, ReadResult, StatResult};

/// Integer ≥ `FIRST_VIRTUAL_FD` that the guest sees as a file descriptor; the kernel
/// never sees it.
pub const FIRST_VIRTUAL_FD: i32 = 4096;

// Process-wide so multiple `Vfs` instances can coexist without colliding virtual FDs.
static NEXT_VIRTUAL_FD: AtomicI32 = AtomicI32::new(FIRST_VIRTUAL_FD);

fn allocate_virtual_fd() -> i32 {
    NEXT_VIRTUAL_FD.fetch_add(1, Ordering::Relaxed)
}

/// An open file: a backend-local descriptor, the virtual descriptor the guest sees,
/// the virtual path that produced it, and a reference to the owning backend.
pub struct File {
    local_fd: i32,
    virtual_fd: i32,
    path: String,
    fs: Rc<dyn Filesystem>,
    closed: bool,
}

impl File {
    /// Wrap a freshly opened backend descriptor, allocating a new virtual FD.
    pub fn new(local_fd: i32, path: impl Into<String>, fs: Rc<dyn Filesystem>) -> Self {
        File {
            local_fd,
            virtual_fd: allocate_virtual_fd(),
            path: path.into(),
            fs,
            closed: false,
        }
    }

    pub fn local_fd(&self) -> i32 {
        self.local_fd
    }

    pub fn virtual_fd(&self) -> i32 {
        self.virtual_fd
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn fs(&self) -> Rc<dyn Filesystem> {
        self.fs.clone()
    }

    pub fn read(&self, count: usize) -> Continuation<ReadResult> {
        if self.closed {
            return Continuation::from_value(ReadResult {
                retval: -(libc::EBADF as isize),
                data: Vec::new(),
            });
        }
        self.fs.read(self.local_fd, count)
    }

    pub fn write(&self, data: Vec<u8>) -> Continuation<isize> {
        if self.closed {
            return Continuation::from_value(-(libc::EBADF as isize));
        }
        self.fs.write(self.local_fd, data)
    }

    pub fn lseek(&self, offset: i64, whence: i32) -> Continuation<i64> {
        if self.closed {
            return Continuation::from_value(-(libc::EBADF as i64));
        }
        self.fs.lseek(self.local_fd, offset, whence)
    }

    pub fn fstat(&self) -> Continuation<StatResult> {
        if self.closed {
            let mut r = StatResult::default();
            r.retval = -libc::EBADF;
            return Continuation::from_value(r);
        }
        self.fs.fstat(self.local_fd)
    }

    pub fn getdents(&self, count: usize) -> Continuation<DentsResult> {
        if self.closed {
            return Continuation::from_value(DentsResult {
                retval: -libc::EBADF,
                data: Vec::new(),
            });
        }
        self.fs.getdents(self.local_fd, count)
    }

    /// Close the backend descriptor and mark this handle invalid. Subsequent calls
    /// return `-EBADF` without touching the backend.
    pub fn close(&mut self) -> Continuation<i32> {
        if self.closed {
            return Continuation::from_value(-libc::EBADF);
        }
        self.closed = true;
        self.fs.close(self.local_fd)
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

impl Drop for File {
    fn drop(&mut self) {
        if !self.closed {
            self.closed = true;
            let fs = self.fs.clone();
            let local_fd = self.local_fd;
            // Best-effort: fire the close and log if the backend reports failure, but
            // never let a drop block or panic. `spawn_local` outside a `LocalSet`
            // panics immediately (not inside the spawned future), so guard it instead
            // of letting a teardown-time drop bring down the process.
            let spawned = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                tokio::task::spawn_local(async move {
                    let ret = fs.close(local_fd).resolve().await;
                    if ret < 0 {
                        warn!("best-effort close of fd {} failed: {}", local_fd, ret);
                    }
                });
            }));
            if spawned.is_err() {
                warn!(
                    "dropped open file (fd {}) outside a local task set; backend close skipped",
                    local_fd
                );
            }
        }
    }
}
