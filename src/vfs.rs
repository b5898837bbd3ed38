//! Mount table, virtual FD registry, CWD tracking and per-syscall translation.
//!
//! This is the component a traced guest actually talks to: [`Vfs::handle_syscall`]
//! takes a [`SyscallCall`], decides whether it is virtualized, and if so drives it
//! through the matching backend [`Filesystem`] via a [`Continuation`].

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::io;
use std::rc::Rc;

use log::{debug, warn};

use crate::config::{MountConfig, SandboxConfig};
use crate::continuation::Continuation;
use crate::file::{File, FIRST_VIRTUAL_FD};
use crate::filesystem::Filesystem;
use crate::sandbox::{Address, Sandbox, SyscallCall};

fn default_whitelist() -> HashSet<String> {
    const LIBS: &[&str] = &[
        "libc.so.6",
        "libdl.so.2",
        "librt.so.1",
        "libpthread.so.0",
    ];
    const LIB_DIRS: &[&str] = &["/lib64/tls/x86_64", "/lib64/tls", "/lib64/x86_64", "/lib64"];

    let mut set = HashSet::new();
    for dir in LIB_DIRS {
        for lib in LIBS {
            set.insert(format!("{dir}/{lib}"));
        }
    }
    for extra in [
        "/lib64/libstdc++.so.6",
        "/lib64/libm.so.6",
        "/lib64/libgcc_s.so.1",
        "/etc/ld.so.cache",
        "/etc/ld.so.preload",
        "/proc/self/exe",
    ] {
        set.insert(extra.to_string());
    }
    set
}

fn trim_one_trailing_slash(path: &str) -> String {
    if path.len() > 1 && path.ends_with('/') {
        path[..path.len() - 1].to_string()
    } else {
        path.to_string()
    }
}

fn parent_of(path: &str) -> String {
    match path.rfind('/') {
        Some(0) => "/".to_string(),
        Some(idx) => path[..idx].to_string(),
        None => "/".to_string(),
    }
}

/// Join a `.`/`..`-leading relative path onto `cwd`, the same way `do_openat` joins a
/// plain relative name onto its resolved prefix.
fn resolve_relative(cwd: &str, path: &str) -> String {
    if path == "." {
        cwd.to_string()
    } else if let Some(rest) = path.strip_prefix("./") {
        format!("{}/{}", cwd.trim_end_matches('/'), rest)
    } else if path == ".." {
        parent_of(cwd)
    } else if let Some(rest) = path.strip_prefix("../") {
        format!("{}/{}", parent_of(cwd), rest)
    } else {
        format!("{}/{}", cwd.trim_end_matches('/'), path)
    }
}

// SAFETY: `libc::stat` is a plain-old-data struct; reading its bytes is always valid.
fn stat_to_bytes(stat: &libc::stat) -> Vec<u8> {
    let size = std::mem::size_of::<libc::stat>();
    let ptr = stat as *const libc::stat as *const u8;
    unsafe { std::slice::from_raw_parts(ptr, size) }.to_vec()
}

struct Inner {
    sandbox: Rc<dyn Sandbox>,
    // Linear; real deployments mount a handful of filesystems, so a scan for the
    // longest matching prefix is cheap and avoids a trie for little benefit.
    mountpoints: Vec<(String, Rc<dyn Filesystem>)>,
    open_files: HashMap<i32, File>,
    whitelist: HashSet<String>,
    cwd: Option<File>,
}

/// The virtual filesystem for a single guest. Cheap to clone (an `Rc` handle); clones
/// share the same mount table, open-file registry and CWD.
#[derive(Clone)]
pub struct Vfs {
    inner: Rc<RefCell<Inner>>,
}

impl Vfs {
    pub fn new(config: SandboxConfig) -> Self {
        let mut whitelist = default_whitelist();
        whitelist.extend(config.extra_whitelist);
        Vfs {
            inner: Rc::new(RefCell::new(Inner {
                sandbox: config.sandbox,
                mountpoints: Vec::new(),
                open_files: HashMap::new(),
                whitelist,
                cwd: None,
            })),
        }
    }

    fn sandbox(&self) -> Rc<dyn Sandbox> {
        self.inner.borrow().sandbox.clone()
    }

    /// Add a mount. No overlap check; mounting the same path again simply adds another
    /// entry ahead of it in scan order (longest-prefix selection makes duplicate exact
    /// prefixes pick whichever was mounted last, since it is scanned first).
    pub fn mount_filesystem(&self, config: MountConfig) {
        debug!("mounting filesystem at {}", config.path);
        let mut inner = self.inner.borrow_mut();
        inner.mountpoints.insert(0, (config.path, config.backend));
    }

    pub fn is_virtual_fd(&self, fd: i32) -> bool {
        fd >= FIRST_VIRTUAL_FD
    }

    pub fn is_whitelisted(&self, path: &str) -> bool {
        self.inner.borrow().whitelist.contains(path)
    }

    pub fn get_cwd(&self) -> String {
        self.inner
            .borrow()
            .cwd
            .as_ref()
            .map(|f| f.path().to_string())
            .unwrap_or_default()
    }

    /// Resolve `path` against the mount table, choosing the longest matching prefix.
    ///
    /// A leading `.` is resolved against CWD first (§4.6 step 1): if CWD is unset this
    /// yields no match, which callers surface as `-ENOENT`.
    fn resolve_mount(&self, path: &str) -> Option<(String, Rc<dyn Filesystem>)> {
        let inner = self.inner.borrow();
        let search = if path.starts_with('.') {
            let cwd_path = inner.cwd.as_ref()?.path().to_string();
            resolve_relative(&cwd_path, path)
        } else {
            path.to_string()
        };

        let mut best: Option<(&str, &Rc<dyn Filesystem>)> = None;
        for (prefix, fs) in &inner.mountpoints {
            if search.starts_with(prefix.as_str()) {
                if best.map(|(p, _)| prefix.len() > p.len()).unwrap_or(true) {
                    best = Some((prefix.as_str(), fs));
                }
            }
        }
        best.map(|(prefix, fs)| {
            // The `- 1` preserves the leading '/' for the backend, matching a mount
            // prefix stored with its trailing slash.
            let tail = search[prefix.len() - 1..].to_string();
            (tail, fs.clone())
        })
    }

    fn read_path(&self, pid: i32, addr: i64) -> io::Result<String> {
        self.sandbox().copy_string(pid, addr as Address, 1024)
    }

    /// `setCWD`: resolve `path` through the mount table, open it with `O_DIRECTORY`,
    /// and replace CWD on success.
    pub fn set_cwd(&self, path: impl Into<String>) -> Continuation<i32> {
        let vfs = self.clone();
        let path = path.into();
        Continuation::new(move || async move {
            let trimmed = trim_one_trailing_slash(&path);
            match vfs.resolve_mount(&trimmed) {
                Some((tail, fs)) => {
                    let fd = fs.open(&tail, libc::O_DIRECTORY, 0).resolve().await;
                    if fd >= 0 {
                        let file = File::new(fd, trimmed, fs);
                        vfs.inner.borrow_mut().cwd = Some(file);
                        0
                    } else {
                        fd
                    }
                }
                None => -libc::ENOENT,
            }
        })
    }

    /// Dispatch a single intercepted syscall. Unhandled syscall numbers are returned
    /// unchanged so the tracer lets the kernel service them.
    pub fn handle_syscall(&self, call: SyscallCall) -> Continuation<SyscallCall> {
        let vfs = self.clone();
        Continuation::new(move || async move {
            let mut call = call;
            match call.id {
                id if id == libc::SYS_open => vfs.do_open(&mut call).await,
                id if id == libc::SYS_openat => vfs.do_openat(&mut call).await,
                id if id == libc::SYS_close => vfs.do_close(&mut call).await,
                id if id == libc::SYS_read => vfs.do_read(&mut call).await,
                id if id == libc::SYS_write => vfs.do_write(&mut call).await,
                id if id == libc::SYS_lseek => vfs.do_lseek(&mut call).await,
                id if id == libc::SYS_fstat => vfs.do_fstat(&mut call).await,
                id if id == libc::SYS_stat => vfs.do_stat(&mut call).await,
                id if id == libc::SYS_lstat => vfs.do_lstat(&mut call).await,
                id if id == libc::SYS_access => vfs.do_access(&mut call).await,
                id if id == libc::SYS_getdents => vfs.do_getdents(&mut call).await,
                id if id == libc::SYS_chdir => vfs.do_chdir(&mut call).await,
                id if id == libc::SYS_fchdir => vfs.do_fchdir(&mut call).await,
                id if id == libc::SYS_getcwd => vfs.do_getcwd(&mut call).await,
                id if id == libc::SYS_readlink => vfs.do_readlink(&mut call).await,
                _ => {}
            }
            call
        })
    }

    async fn open_common(&self, call: &mut SyscallCall, path: String, flags: i64, mode: i64) {
        if self.is_whitelisted(&path) {
            return;
        }
        call.id = -1;
        match self.resolve_mount(&path) {
            Some((tail, fs)) => {
                let fd = fs.open(&tail, flags as i32, mode as u32).resolve().await;
                if fd >= 0 {
                    let file = File::new(fd, path, fs);
                    let vfd = file.virtual_fd();
                    self.inner.borrow_mut().open_files.insert(vfd, file);
                    call.return_val = vfd as i64;
                } else {
                    call.return_val = fd as i64;
                }
            }
            None => call.return_val = -(libc::ENOENT as i64),
        }
    }

    async fn do_open(&self, call: &mut SyscallCall) {
        let path = match self.read_path(call.pid, call.args[0]) {
            Ok(p) => p,
            Err(_) => {
                call.id = -1;
                call.return_val = -(libc::ENOENT as i64);
                return;
            }
        };
        self.open_common(call, path, call.args[1], call.args[2]).await;
    }

    async fn do_openat(&self, call: &mut SyscallCall) {
        let fname = match self.read_path(call.pid, call.args[1]) {
            Ok(p) => p,
            Err(_) => {
                call.id = -1;
                call.return_val = -(libc::ENOENT as i64);
                return;
            }
        };
        let full = if fname.starts_with('/') {
            fname
        } else {
            let dirfd = call.args[0];
            let prefix = if dirfd == libc::AT_FDCWD as i64 {
                self.get_cwd()
            } else if self.is_virtual_fd(dirfd as i32) {
                let inner = self.inner.borrow();
                inner
                    .open_files
                    .get(&(dirfd as i32))
                    .map(|f| f.path().to_string())
                    .unwrap_or_default()
            } else {
                String::new()
            };
            format!("{}/{}", prefix.trim_end_matches('/'), fname)
        };
        self.open_common(call, full, call.args[2], call.args[3]).await;
    }

    async fn do_close(&self, call: &mut SyscallCall) {
        let vfd = call.args[0] as i32;
        if !self.is_virtual_fd(vfd) {
            return;
        }
        call.id = -1;
        let close_cont = {
            let mut inner = self.inner.borrow_mut();
            inner.open_files.get_mut(&vfd).map(|f| f.close())
        };
        match close_cont {
            Some(cont) => {
                let ret = cont.resolve().await;
                call.return_val = ret as i64;
                self.inner.borrow_mut().open_files.remove(&vfd);
            }
            None => call.return_val = -(libc::EBADF as i64),
        }
    }

    async fn do_read(&self, call: &mut SyscallCall) {
        let vfd = call.args[0] as i32;
        if !self.is_virtual_fd(vfd) {
            return;
        }
        call.id = -1;
        let count = call.args[2] as usize;
        let cont = {
            let inner = self.inner.borrow();
            inner.open_files.get(&vfd).map(|f| f.read(count))
        };
        match cont {
            Some(c) => {
                let result = c.resolve().await;
                call.return_val = result.retval as i64;
                if result.retval >= 0 {
                    if let Err(e) =
                        self.sandbox()
                            .write_data(call.pid, call.args[1] as Address, &result.data)
                    {
                        warn!("failed to write read() result to guest: {}", e);
                    }
                }
            }
            None => call.return_val = -(libc::EBADF as i64),
        }
    }

    async fn do_write(&self, call: &mut SyscallCall) {
        let vfd = call.args[0] as i32;
        if !self.is_virtual_fd(vfd) {
            return;
        }
        call.id = -1;
        let count = call.args[2] as usize;
        let data = match self
            .sandbox()
            .copy_data(call.pid, call.args[1] as Address, count)
        {
            Ok(d) => d,
            Err(_) => {
                call.return_val = -(libc::EFAULT as i64);
                return;
            }
        };
        let cont = {
            let inner = self.inner.borrow();
            inner.open_files.get(&vfd).map(|f| f.write(data))
        };
        match cont {
            Some(c) => call.return_val = c.resolve().await as i64,
            None => call.return_val = -(libc::EBADF as i64),
        }
    }

    async fn do_lseek(&self, call: &mut SyscallCall) {
        let vfd = call.args[0] as i32;
        if !self.is_virtual_fd(vfd) {
            return;
        }
        call.id = -1;
        let cont = {
            let inner = self.inner.borrow();
            inner
                .open_files
                .get(&vfd)
                .map(|f| f.lseek(call.args[1], call.args[2] as i32))
        };
        match cont {
            Some(c) => call.return_val = c.resolve().await,
            None => call.return_val = -(libc::EBADF as i64),
        }
    }

    async fn do_fstat(&self, call: &mut SyscallCall) {
        let vfd = call.args[0] as i32;
        if !self.is_virtual_fd(vfd) {
            return;
        }
        call.id = -1;
        let cont = {
            let inner = self.inner.borrow();
            inner.open_files.get(&vfd).map(|f| f.fstat())
        };
        match cont {
            Some(c) => {
                let result = c.resolve().await;
                call.return_val = result.retval as i64;
                if result.retval == 0 {
                    let bytes = stat_to_bytes(&result.stat);
                    let _ = self
                        .sandbox()
                        .write_data(call.pid, call.args[1] as Address, &bytes);
                }
            }
            None => call.return_val = -(libc::EBADF as i64),
        }
    }

    async fn stat_common(&self, call: &mut SyscallCall, is_lstat: bool) {
        let path = match self.read_path(call.pid, call.args[0]) {
            Ok(p) => p,
            Err(_) => {
                call.id = -1;
                call.return_val = -(libc::ENOENT as i64);
                return;
            }
        };
        if self.is_whitelisted(&path) {
            return;
        }
        call.id = -1;
        match self.resolve_mount(&path) {
            Some((tail, fs)) => {
                let cont = if is_lstat { fs.lstat(&tail) } else { fs.stat(&tail) };
                let result = cont.resolve().await;
                call.return_val = result.retval as i64;
                if result.retval == 0 {
                    let bytes = stat_to_bytes(&result.stat);
                    let _ = self
                        .sandbox()
                        .write_data(call.pid, call.args[1] as Address, &bytes);
                }
            }
            None => call.return_val = -(libc::ENOENT as i64),
        }
    }

    async fn do_stat(&self, call: &mut SyscallCall) {
        self.stat_common(call, false).await;
    }

    async fn do_lstat(&self, call: &mut SyscallCall) {
        self.stat_common(call, true).await;
    }

    async fn do_access(&self, call: &mut SyscallCall) {
        let path = match self.read_path(call.pid, call.args[0]) {
            Ok(p) => p,
            Err(_) => {
                call.id = -1;
                call.return_val = -(libc::ENOENT as i64);
                return;
            }
        };
        if self.is_whitelisted(&path) {
            return;
        }
        call.id = -1;
        match self.resolve_mount(&path) {
            Some((tail, fs)) => {
                call.return_val = fs.access(&tail, call.args[1] as i32).resolve().await as i64
            }
            None => call.return_val = -(libc::ENOENT as i64),
        }
    }

    async fn do_getdents(&self, call: &mut SyscallCall) {
        let vfd = call.args[0] as i32;
        if !self.is_virtual_fd(vfd) {
            return;
        }
        call.id = -1;
        let count = call.args[2] as usize;
        let cont = {
            let inner = self.inner.borrow();
            inner.open_files.get(&vfd).map(|f| f.getdents(count))
        };
        match cont {
            Some(c) => {
                let result = c.resolve().await;
                call.return_val = result.retval as i64;
                if result.retval > 0 {
                    let _ = self
                        .sandbox()
                        .write_data(call.pid, call.args[1] as Address, &result.data);
                }
            }
            None => call.return_val = -(libc::EBADF as i64),
        }
    }

    async fn do_readlink(&self, call: &mut SyscallCall) {
        let path = match self.read_path(call.pid, call.args[0]) {
            Ok(p) => p,
            Err(_) => {
                call.id = -1;
                call.return_val = -(libc::ENOENT as i64);
                return;
            }
        };
        if self.is_whitelisted(&path) {
            return;
        }
        call.id = -1;
        let bufsize = call.args[2] as usize;
        match self.resolve_mount(&path) {
            Some((tail, fs)) => {
                let result = fs.readlink(&tail, bufsize).resolve().await;
                call.return_val = result.retval as i64;
                if result.retval >= 0 {
                    let n = (result.retval as usize).min(bufsize);
                    let _ = self
                        .sandbox()
                        .write_data(call.pid, call.args[1] as Address, &result.data[..n]);
                }
            }
            None => call.return_val = -(libc::ENOENT as i64),
        }
    }

    async fn do_chdir(&self, call: &mut SyscallCall) {
        let path = match self.read_path(call.pid, call.args[0]) {
            Ok(p) => p,
            Err(_) => {
                call.id = -1;
                call.return_val = -(libc::ENOENT as i64);
                return;
            }
        };
        call.id = -1;
        call.return_val = self.set_cwd(path).resolve().await as i64;
    }

    async fn do_fchdir(&self, call: &mut SyscallCall) {
        let vfd = call.args[0] as i32;
        if !self.is_virtual_fd(vfd) {
            return;
        }
        call.id = -1;
        let path = {
            let inner = self.inner.borrow();
            inner.open_files.get(&vfd).map(|f| f.path().to_string())
        };
        match path {
            Some(p) => call.return_val = self.set_cwd(p).resolve().await as i64,
            None => call.return_val = -(libc::EBADF as i64),
        }
    }

    async fn do_getcwd(&self, call: &mut SyscallCall) {
        call.id = -1;
        let path = self.get_cwd();
        if path.is_empty() && self.inner.borrow().cwd.is_none() {
            call.return_val = -(libc::ENOENT as i64);
            return;
        }
        let max = call.args[1] as usize;
        let bytes = path.as_bytes();
        let n = bytes.len().min(max);
        if let Err(e) = self
            .sandbox()
            .write_data(call.pid, call.args[0] as Address, &bytes[..n])
        {
            warn!("failed to write getcwd() result to guest: {}", e);
        }
        call.return_val = path.len() as i64;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::native_fs::NativeFilesystem;
    use crate::sandbox::test_support::FakeSandbox;

    fn new_vfs() -> (Vfs, Rc<FakeSandbox>) {
        let sandbox = Rc::new(FakeSandbox::new());
        (Vfs::new(SandboxConfig::new(sandbox.clone())), sandbox)
    }

    fn syscall(id: i64, pid: i32, args: [i64; 6]) -> SyscallCall {
        SyscallCall::new(id, pid, args)
    }

    #[tokio::test(flavor = "current_thread")]
    async fn open_read_close_through_mounted_backend() {
        tokio::task::LocalSet::new()
            .run_until(async {
                let dir = std::env::temp_dir().join(format!("sandbox-vfs-vfstest-{}", std::process::id()));
                std::fs::create_dir_all(&dir).unwrap();
                std::fs::write(dir.join("hello"), b"hi\n").unwrap();

                let (vfs, sandbox) = new_vfs();
                vfs.mount_filesystem(MountConfig::new("/", Rc::new(NativeFilesystem::new(dir.to_str().unwrap()))));

                sandbox.put_string(100, "/hello");
                let open_call = syscall(libc::SYS_open, 1, [100, libc::O_RDONLY as i64, 0, 0, 0, 0]);
                let open_result = vfs.handle_syscall(open_call).resolve().await;
                assert_eq!(open_result.id, -1);
                assert_eq!(open_result.return_val, FIRST_VIRTUAL_FD as i64);

                let read_call = syscall(
                    libc::SYS_read,
                    1,
                    [open_result.return_val, 200, 8, 0, 0, 0],
                );
                let read_result = vfs.handle_syscall(read_call).resolve().await;
                assert_eq!(read_result.return_val, 3);
                assert_eq!(sandbox.read_back(200), b"hi\n");

                let close_call = syscall(libc::SYS_close, 1, [open_result.return_val, 0, 0, 0, 0, 0]);
                let close_result = vfs.handle_syscall(close_call).resolve().await;
                assert_eq!(close_result.return_val, 0);

                std::fs::remove_dir_all(&dir).ok();
            })
            .await;
    }

    #[tokio::test(flavor = "current_thread")]
    async fn whitelisted_path_passes_through_unchanged() {
        tokio::task::LocalSet::new()
            .run_until(async {
                let (vfs, sandbox) = new_vfs();
                sandbox.put_string(100, "/etc/ld.so.cache");
                let call = syscall(libc::SYS_open, 1, [100, libc::O_RDONLY as i64, 0, 0, 0, 0]);
                let original_id = call.id;
                let result = vfs.handle_syscall(call).resolve().await;
                assert_eq!(result.id, original_id);
                assert_eq!(result.return_val, 0);
            })
            .await;
    }

    #[tokio::test(flavor = "current_thread")]
    async fn unmounted_path_yields_enoent() {
        tokio::task::LocalSet::new()
            .run_until(async {
                let (vfs, sandbox) = new_vfs();
                sandbox.put_string(100, "/nope");
                let call = syscall(libc::SYS_stat, 1, [100, 200, 0, 0, 0, 0]);
                let result = vfs.handle_syscall(call).resolve().await;
                assert_eq!(result.id, -1);
                assert_eq!(result.return_val, -(libc::ENOENT as i64));
                assert!(sandbox.read_back(200).is_empty());
            })
            .await;
    }

    #[tokio::test(flavor = "current_thread")]
    async fn chdir_then_getcwd_round_trips() {
        tokio::task::LocalSet::new()
            .run_until(async {
                let dir = std::env::temp_dir().join(format!("sandbox-vfs-cwdtest-{}", std::process::id()));
                std::fs::create_dir_all(&dir).unwrap();

                let (vfs, sandbox) = new_vfs();
                vfs.mount_filesystem(MountConfig::new("/", Rc::new(NativeFilesystem::new(dir.to_str().unwrap()))));

                sandbox.put_string(100, "/data/");
                std::fs::create_dir_all(dir.join("data")).unwrap();
                let chdir_call = syscall(libc::SYS_chdir, 1, [100, 0, 0, 0, 0, 0]);
                let chdir_result = vfs.handle_syscall(chdir_call).resolve().await;
                assert_eq!(chdir_result.return_val, 0);
                assert_eq!(vfs.get_cwd(), "/data");

                let getcwd_call = syscall(libc::SYS_getcwd, 1, [300, 64, 0, 0, 0, 0]);
                let getcwd_result = vfs.handle_syscall(getcwd_call).resolve().await;
                assert_eq!(getcwd_result.return_val, "/data".len() as i64);
                assert_eq!(sandbox.read_back(300), b"/data");

                std::fs::remove_dir_all(&dir).ok();
            })
            .await;
    }

    #[tokio::test(flavor = "current_thread")]
    async fn dot_relative_paths_resolve_against_cwd() {
        tokio::task::LocalSet::new()
            .run_until(async {
                let dir = std::env::temp_dir().join(format!("sandbox-vfs-dottest-{}", std::process::id()));
                std::fs::create_dir_all(dir.join("data")).unwrap();
                std::fs::write(dir.join("data").join("x"), b"dotted\n").unwrap();

                let (vfs, sandbox) = new_vfs();
                vfs.mount_filesystem(MountConfig::new("/", Rc::new(NativeFilesystem::new(dir.to_str().unwrap()))));

                sandbox.put_string(100, "/data");
                let chdir_result = vfs
                    .handle_syscall(syscall(libc::SYS_chdir, 1, [100, 0, 0, 0, 0, 0]))
                    .resolve()
                    .await;
                assert_eq!(chdir_result.return_val, 0);

                sandbox.put_string(200, ".");
                let access_dot = vfs
                    .handle_syscall(syscall(libc::SYS_access, 1, [200, libc::F_OK as i64, 0, 0, 0, 0]))
                    .resolve()
                    .await;
                assert_eq!(access_dot.return_val, 0);

                sandbox.put_string(300, "./x");
                let open_result = vfs
                    .handle_syscall(syscall(libc::SYS_open, 1, [300, libc::O_RDONLY as i64, 0, 0, 0, 0]))
                    .resolve()
                    .await;
                assert!(open_result.return_val >= FIRST_VIRTUAL_FD as i64);

                sandbox.put_string(400, "..");
                let access_parent = vfs
                    .handle_syscall(syscall(libc::SYS_access, 1, [400, libc::F_OK as i64, 0, 0, 0, 0]))
                    .resolve()
                    .await;
                assert_eq!(access_parent.return_val, 0);

                std::fs::remove_dir_all(&dir).ok();
            })
            .await;
    }

    #[tokio::test(flavor = "current_thread")]
    async fn longest_prefix_mount_wins() {
        tokio::task::LocalSet::new()
            .run_until(async {
                let root = std::env::temp_dir().join(format!("sandbox-vfs-root-{}", std::process::id()));
                let data = std::env::temp_dir().join(format!("sandbox-vfs-data-{}", std::process::id()));
                std::fs::create_dir_all(&root).unwrap();
                std::fs::create_dir_all(&data).unwrap();
                std::fs::write(data.join("x"), b"specific").unwrap();
                std::fs::write(root.join("data_x_shadow"), b"generic").unwrap();

                let (vfs, sandbox) = new_vfs();
                vfs.mount_filesystem(MountConfig::new("/", Rc::new(NativeFilesystem::new(root.to_str().unwrap()))));
                vfs.mount_filesystem(MountConfig::new("/data/", Rc::new(NativeFilesystem::new(data.to_str().unwrap()))));

                sandbox.put_string(100, "/data/x");
                let open_call = syscall(libc::SYS_open, 1, [100, libc::O_RDONLY as i64, 0, 0, 0, 0]);
                let open_result = vfs.handle_syscall(open_call).resolve().await;
                assert!(open_result.return_val >= FIRST_VIRTUAL_FD as i64);

                let read_call = syscall(libc::SYS_read, 1, [open_result.return_val, 200, 16, 0, 0, 0]);
                let read_result = vfs.handle_syscall(read_call).resolve().await;
                assert_eq!(sandbox.read_back(200), b"specific");
                assert_eq!(read_result.return_val, "specific".len() as i64);

                std::fs::remove_dir_all(&root).ok();
                std::fs::remove_dir_all(&data).ok();
            })
            .await;
    }

    #[tokio::test(flavor = "current_thread")]
    async fn openat_at_fdcwd_resolves_against_cwd() {
        tokio::task::LocalSet::new()
            .run_until(async {
                let root = std::env::temp_dir().join(format!("sandbox-vfs-openat-{}", std::process::id()));
                std::fs::create_dir_all(root.join("data")).unwrap();
                std::fs::write(root.join("data").join("x"), b"payload").unwrap();

                let (vfs, sandbox) = new_vfs();
                vfs.mount_filesystem(MountConfig::new("/", Rc::new(NativeFilesystem::new(root.to_str().unwrap()))));

                sandbox.put_string(100, "/data");
                let chdir_call = syscall(libc::SYS_chdir, 1, [100, 0, 0, 0, 0, 0]);
                let chdir_result = vfs.handle_syscall(chdir_call).resolve().await;
                assert_eq!(chdir_result.return_val, 0);

                sandbox.put_string(200, "x");
                let openat_call = syscall(
                    libc::SYS_openat,
                    1,
                    [libc::AT_FDCWD as i64, 200, libc::O_RDONLY as i64, 0, 0, 0],
                );
                let openat_result = vfs.handle_syscall(openat_call).resolve().await;
                assert!(openat_result.return_val >= FIRST_VIRTUAL_FD as i64);

                std::fs::remove_dir_all(&root).ok();
            })
            .await;
    }
}
