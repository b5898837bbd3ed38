//! Drives a [`sandbox_vfs::VfsSession`] over an in-memory backend until Ctrl+C.
//!
//! Stands in for the real tracer: instead of intercepting actual guest syscalls it
//! feeds a couple of synthetic ones in to show the session servicing them, then waits
//! for a shutdown signal the same way the real sandbox's event loop would deliver one.

use std::cell::RefCell;
use std::collections::HashMap;
use std::io;
use std::rc::Rc;

use log::info;
use sandbox_vfs::{
    Address, MemoryFilesystem, MountConfig, Sandbox, SandboxConfig, SyscallCall, Vfs, VfsSession,
};
use tokio::signal;
use tokio::sync::mpsc;

const GUEST_PATH_ADDR: u64 = 1000;

/// A standalone-process analogue of a real tracer's guest-memory access: here there is
/// no guest, just a table of bytes this demo seeds up front.
#[derive(Default)]
struct DemoSandbox {
    memory: RefCell<HashMap<Address, Vec<u8>>>,
}

impl DemoSandbox {
    fn put_string(&self, addr: Address, s: &str) {
        let mut bytes = s.as_bytes().to_vec();
        bytes.push(0);
        self.memory.borrow_mut().insert(addr, bytes);
    }
}

impl Sandbox for DemoSandbox {
    fn copy_string(&self, _pid: i32, addr: Address, max_len: usize) -> io::Result<String> {
        let mem = self.memory.borrow();
        let bytes = mem
            .get(&addr)
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "no such guest address"))?;
        let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
        let end = end.min(max_len);
        Ok(String::from_utf8_lossy(&bytes[..end]).into_owned())
    }

    fn copy_data(&self, _pid: i32, addr: Address, len: usize) -> io::Result<Vec<u8>> {
        let mem = self.memory.borrow();
        let bytes = mem
            .get(&addr)
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "no such guest address"))?;
        let mut out = bytes.clone();
        out.resize(len, 0);
        Ok(out)
    }

    fn write_data(&self, _pid: i32, addr: Address, data: &[u8]) -> io::Result<()> {
        self.memory.borrow_mut().insert(addr, data.to_vec());
        Ok(())
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    env_logger::init();

    let local = tokio::task::LocalSet::new();
    local
        .run_until(async {
            let sandbox = Rc::new(DemoSandbox::default());
            sandbox.put_string(GUEST_PATH_ADDR, "/greeting");

            let backend = Rc::new(MemoryFilesystem::new());
            backend.put_file("greeting", b"hello from the sandboxed vfs\n".to_vec());

            let vfs = Vfs::new(SandboxConfig::new(sandbox));
            vfs.mount_filesystem(MountConfig::new("/", backend));
            let session = VfsSession::new(vfs);

            let (call_tx, call_rx) = mpsc::channel(4);
            let (reply_tx, mut reply_rx) = mpsc::channel(4);
            let (shutdown_tx, shutdown_rx) = mpsc::channel(1);

            let run = tokio::task::spawn_local(async move {
                session.run_with_signal(call_rx, reply_tx, shutdown_rx).await;
            });

            call_tx
                .send(SyscallCall::new(
                    libc::SYS_open,
                    std::process::id() as i32,
                    [GUEST_PATH_ADDR as i64, libc::O_RDONLY as i64, 0, 0, 0, 0],
                ))
                .await
                .unwrap();

            if let Some(reply) = reply_rx.recv().await {
                info!("serviced open(), guest fd = {}", reply.return_val);
            }

            let ctrl_c = tokio::task::spawn_local(async move {
                signal::ctrl_c().await.expect("failed to listen for ctrl+c");
                info!("received Ctrl+C, shutting down");
                shutdown_tx.send(()).await.ok();
            });

            let _ = futures::join!(ctrl_c, run);
        })
        .await;
}
