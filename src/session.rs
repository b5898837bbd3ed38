//! Runnable wrapper around a [`Vfs`].
//!
//! A session receives [`SyscallCall`]s dispatched by the (out-of-scope) tracer over a
//! channel, drives each one through the VFS, and sends the serviced call back out.
//! Construction and teardown are logged, and the run loop selects between new work and
//! a shutdown signal rather than blocking the tracer thread.

use log::info;
use tokio::sync::mpsc;

use crate::sandbox::SyscallCall;
use crate::vfs::Vfs;

/// Drives a [`Vfs`] against a stream of syscalls handed to it by a tracer.
#[derive(Clone)]
pub struct VfsSession {
    vfs: Vfs,
}

impl VfsSession {
    pub fn new(vfs: Vfs) -> Self {
        info!("starting VFS session");
        VfsSession { vfs }
    }

    pub fn vfs(&self) -> &Vfs {
        &self.vfs
    }

    /// Run the receive-dispatch loop: pull a [`SyscallCall`] from `calls`, service it
    /// through the VFS, and push the result onto `replies`. Exits when `calls` closes
    /// or when `shutdown` fires, whichever comes first.
    pub async fn run_with_signal(
        &self,
        mut calls: mpsc::Receiver<SyscallCall>,
        replies: mpsc::Sender<SyscallCall>,
        mut shutdown: mpsc::Receiver<()>,
    ) {
        loop {
            tokio::select! {
                _ = shutdown.recv() => {
                    info!("VFS session received shutdown signal");
                    break;
                }
                maybe_call = calls.recv() => {
                    match maybe_call {
                        Some(call) => {
                            let serviced = self.vfs.handle_syscall(call).resolve().await;
                            if replies.send(serviced).await.is_err() {
                                // Reply receiver gone; nothing left to drive.
                                break;
                            }
                        }
                        None => break,
                    }
                }
            }
        }
    }
}

impl Drop for VfsSession {
    fn drop(&mut self) {
        info!("VFS session stopped");
    }
}
