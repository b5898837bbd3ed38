//! Interfaces consumed from the syscall interception mechanism.
//!
//! The tracer itself, and the guest-memory peek/poke primitives it is built on, are
//! external collaborators -- this module only defines the shapes the VFS needs from
//! them so it can be exercised (and tested) without a real ptrace-based sandbox.

use std::io;

/// An opaque location in guest memory. Never dereferenced directly by the VFS; only
/// ever handed to [`Sandbox::copy_string`], [`Sandbox::copy_data`] or
/// [`Sandbox::write_data`].
pub type Address = u64;

/// The tracer's mutable representation of a pending guest syscall.
///
/// `id == -1` marks the call as already serviced by the VFS; the tracer must not
/// dispatch it to the kernel in that case. Any other `id` is a syscall number the
/// kernel should still run (possibly after the VFS has left `args` untouched, as with a
/// whitelisted path).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyscallCall {
    pub id: i64,
    pub pid: i32,
    pub args: [i64; 6],
    pub return_val: i64,
}

impl SyscallCall {
    pub fn new(id: i64, pid: i32, args: [i64; 6]) -> Self {
        SyscallCall {
            id,
            pid,
            args,
            return_val: 0,
        }
    }

    /// Mark the call serviced with `value` as its result for the guest.
    pub fn service(&mut self, value: i64) {
        self.id = -1;
        self.return_val = value;
    }
}

/// Guest-memory access primitives supplied by the sandbox collaborator.
///
/// Implementations are expected to be cheap and synchronous from the VFS's point of
/// view (a real tracer backs these with `/proc/<pid>/mem` or `PTRACE_PEEKDATA`); the
/// VFS never calls these from inside a spawned continuation body without immediately
/// `.await`-ing the result.
pub trait Sandbox {
    /// Read a NUL-terminated byte string of at most `max_len` bytes from the guest.
    fn copy_string(&self, pid: i32, addr: Address, max_len: usize) -> io::Result<String>;

    /// Read exactly `len` bytes from the guest.
    fn copy_data(&self, pid: i32, addr: Address, len: usize) -> io::Result<Vec<u8>>;

    /// Write `data` into the guest at `addr`.
    fn write_data(&self, pid: i32, addr: Address, data: &[u8]) -> io::Result<()>;
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use std::cell::RefCell;
    use std::collections::HashMap;

    /// An in-process stand-in for guest memory, addressed by `Address` instead of a
    /// real process's address space. Good enough to drive VFS handler tests end to
    /// end without a tracer.
    #[derive(Default)]
    pub struct FakeSandbox {
        memory: RefCell<HashMap<Address, Vec<u8>>>,
    }

    impl FakeSandbox {
        pub fn new() -> Self {
            FakeSandbox::default()
        }

        pub fn put_string(&self, addr: Address, s: &str) {
            let mut bytes = s.as_bytes().to_vec();
            bytes.push(0);
            self.memory.borrow_mut().insert(addr, bytes);
        }

        pub fn read_back(&self, addr: Address) -> Vec<u8> {
            self.memory.borrow().get(&addr).cloned().unwrap_or_default()
        }
    }

    impl Sandbox for FakeSandbox {
        fn copy_string(&self, _pid: i32, addr: Address, max_len: usize) -> io::Result<String> {
            let mem = self.memory.borrow();
            let bytes = mem.get(&addr).ok_or_else(|| {
                io::Error::new(io::ErrorKind::NotFound, "no such guest address")
            })?;
            let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
            let end = end.min(max_len);
            Ok(String::from_utf8_lossy(&bytes[..end]).into_owned())
        }

        fn copy_data(&self, _pid: i32, addr: Address, len: usize) -> io::Result<Vec<u8>> {
            let mem = self.memory.borrow();
            let bytes = mem.get(&addr).ok_or_else(|| {
                io::Error::new(io::ErrorKind::NotFound, "no such guest address")
            })?;
            let mut out = bytes.clone();
            out.resize(len, 0);
            Ok(out)
        }

        fn write_data(&self, _pid: i32, addr: Address, data: &[u8]) -> io::Result<()> {
            self.memory.borrow_mut().insert(addr, data.to_vec());
            Ok(())
        }
    }
}
