//! Filesystem virtualization core for a ptrace-style process sandbox.
//!
//! This crate owns the part of the sandbox that decides what a guest's filesystem
//! syscalls actually see: a mount table of backend [`filesystem::Filesystem`]
//! implementations, a whitelist of paths the guest may touch directly, a virtual file
//! descriptor table, and per-process current-working-directory tracking. Everything
//! that crosses an await point is expressed as a [`continuation::Continuation`] rather
//! than a bare `Future`, matching the single-threaded cooperative event loop the tracer
//! and the VFS are expected to share (see [`vfs`] and [`session`]).
//!
//! What this crate does *not* do: intercept syscalls, read or write guest memory
//! directly (that's [`sandbox::Sandbox`]'s job), or drive the event loop itself
//! ([`session::VfsSession`] only wraps the dispatch; something else owns `main`).

pub mod config;
pub mod continuation;
pub mod dirent;
pub mod file;
pub mod filesystem;
pub mod memory;
pub mod native_fs;
pub mod sandbox;
pub mod session;
pub mod vfs;

pub use config::{MountConfig, SandboxConfig};
pub use continuation::Continuation;
pub use file::File;
pub use filesystem::{DentsResult, Filesystem, ReadResult, StatResult};
pub use memory::MemoryFilesystem;
pub use native_fs::NativeFilesystem;
pub use sandbox::{Address, Sandbox, SyscallCall};
pub use session::VfsSession;
pub use vfs::Vfs;
