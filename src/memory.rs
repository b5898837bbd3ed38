//! A simple in-memory filesystem backend, handy for tests and demos that don't want to
//! touch the host filesystem at all.
//!
//! Holds a flat table of named in-memory files keyed by path rather than by inode,
//! since the VFS above already does path-to-backend routing and this backend never
//! needs to reason about directory structure beyond the single synthesized listing it
//! serves.

use std::cell::RefCell;
use std::collections::HashMap;

use log::debug;

use crate::continuation::Continuation;
use crate::dirent::DirentBuilder;
use crate::filesystem::{DentsResult, Filesystem, ReadResult, StatResult};

struct OpenHandle {
    name: String,
    cursor: usize,
    is_dir: bool,
}

/// An in-memory backend. Each `open` of an existing name allocates a local FD; reads
/// and seeks are served from an in-memory byte buffer.
pub struct MemoryFilesystem {
    files: RefCell<HashMap<String, Vec<u8>>>,
    handles: RefCell<HashMap<i32, OpenHandle>>,
    next_fd: RefCell<i32>,
}

impl MemoryFilesystem {
    pub fn new() -> Self {
        MemoryFilesystem {
            files: RefCell::new(HashMap::new()),
            handles: RefCell::new(HashMap::new()),
            next_fd: RefCell::new(0),
        }
    }

    /// Seed a regular file's contents, creating it if absent.
    pub fn put_file(&self, name: impl Into<String>, data: impl Into<Vec<u8>>) {
        self.files.borrow_mut().insert(name.into(), data.into());
    }

    /// Names currently known to this backend. Used to build the listing for the
    /// synthesized root directory ("" or "/").
    fn names(&self) -> Vec<String> {
        self.files.borrow().keys().cloned().collect()
    }

    fn allocate_fd(&self) -> i32 {
        let mut next = self.next_fd.borrow_mut();
        let fd = *next;
        *next += 1;
        fd
    }
}

impl Default for MemoryFilesystem {
    fn default() -> Self {
        Self::new()
    }
}

impl Filesystem for MemoryFilesystem {
    fn open(&self, name: &str, _flags: i32, _mode: u32) -> Continuation<i32> {
        debug!("memory open: {}", name);
        let is_dir = name.is_empty() || name == "/";
        let ret = if is_dir || self.files.borrow().contains_key(name) {
            let fd = self.allocate_fd();
            self.handles.borrow_mut().insert(
                fd,
                OpenHandle {
                    name: name.to_string(),
                    cursor: 0,
                    is_dir,
                },
            );
            fd
        } else {
            -libc::ENOENT
        };
        Continuation::from_value(ret)
    }

    fn close(&self, fd: i32) -> Continuation<i32> {
        let ret = if self.handles.borrow_mut().remove(&fd).is_some() {
            0
        } else {
            -libc::EBADF
        };
        Continuation::from_value(ret)
    }

    fn read(&self, fd: i32, count: usize) -> Continuation<ReadResult> {
        let result = {
            let mut handles = self.handles.borrow_mut();
            match handles.get_mut(&fd) {
                Some(handle) if !handle.is_dir => {
                    let files = self.files.borrow();
                    let data = files.get(&handle.name).cloned().unwrap_or_default();
                    let start = handle.cursor.min(data.len());
                    let end = (start + count).min(data.len());
                    let chunk = data[start..end].to_vec();
                    handle.cursor = end;
                    ReadResult {
                        retval: chunk.len() as isize,
                        data: chunk,
                    }
                }
                Some(_) => ReadResult {
                    retval: -(libc::EISDIR as isize),
                    data: Vec::new(),
                },
                None => ReadResult {
                    retval: -(libc::EBADF as isize),
                    data: Vec::new(),
                },
            }
        };
        Continuation::from_value(result)
    }

    fn write(&self, fd: i32, data: Vec<u8>) -> Continuation<isize> {
        let ret = {
            let handles = self.handles.borrow();
            match handles.get(&fd) {
                Some(handle) if !handle.is_dir => {
                    let mut files = self.files.borrow_mut();
                    let entry = files.entry(handle.name.clone()).or_default();
                    entry.extend_from_slice(&data);
                    data.len() as isize
                }
                Some(_) => -(libc::EISDIR as isize),
                None => -(libc::EBADF as isize),
            }
        };
        Continuation::from_value(ret)
    }

    fn lseek(&self, fd: i32, offset: i64, whence: i32) -> Continuation<i64> {
        let ret = {
            let mut handles = self.handles.borrow_mut();
            match handles.get_mut(&fd) {
                Some(handle) => {
                    let len = self
                        .files
                        .borrow()
                        .get(&handle.name)
                        .map(|d| d.len())
                        .unwrap_or(0) as i64;
                    let base = match whence {
                        libc::SEEK_SET => 0,
                        libc::SEEK_CUR => handle.cursor as i64,
                        libc::SEEK_END => len,
                        _ => -1, // sentinel, overwritten below before use
                    };
                    if whence != libc::SEEK_SET && whence != libc::SEEK_CUR && whence != libc::SEEK_END {
                        -(libc::EINVAL as i64)
                    } else {
                        let new_pos = (base + offset).max(0);
                        handle.cursor = new_pos as usize;
                        new_pos
                    }
                }
                None => -(libc::EBADF as i64),
            }
        };
        Continuation::from_value(ret)
    }

    fn fstat(&self, fd: i32) -> Continuation<StatResult> {
        let mut result = StatResult::default();
        let handles = self.handles.borrow();
        match handles.get(&fd) {
            Some(handle) => {
                result.retval = 0;
                if handle.is_dir {
                    result.stat.st_mode = libc::S_IFDIR | 0o755;
                } else {
                    result.stat.st_mode = libc::S_IFREG | 0o644;
                    result.stat.st_size = self
                        .files
                        .borrow()
                        .get(&handle.name)
                        .map(|d| d.len())
                        .unwrap_or(0) as i64;
                }
            }
            None => result.retval = -libc::EBADF,
        }
        Continuation::from_value(result)
    }

    fn stat(&self, path: &str) -> Continuation<StatResult> {
        let mut result = StatResult::default();
        if path.is_empty() || path == "/" {
            result.retval = 0;
            result.stat.st_mode = libc::S_IFDIR | 0o755;
        } else if let Some(data) = self.files.borrow().get(path) {
            result.retval = 0;
            result.stat.st_mode = libc::S_IFREG | 0o644;
            result.stat.st_size = data.len() as i64;
        } else {
            result.retval = -libc::ENOENT;
        }
        Continuation::from_value(result)
    }

    fn lstat(&self, path: &str) -> Continuation<StatResult> {
        self.stat(path)
    }

    fn access(&self, path: &str, _mode: i32) -> Continuation<i32> {
        let ret = if path.is_empty() || path == "/" || self.files.borrow().contains_key(path) {
            0
        } else {
            -libc::ENOENT
        };
        Continuation::from_value(ret)
    }

    fn getdents(&self, fd: i32, _count: usize) -> Continuation<DentsResult> {
        let result = {
            let handles = self.handles.borrow();
            match handles.get(&fd) {
                Some(handle) if handle.is_dir => {
                    let mut builder = DirentBuilder::new();
                    for name in self.names() {
                        builder.append(name);
                    }
                    let data = builder.data();
                    DentsResult {
                        retval: data.len() as i32,
                        data,
                    }
                }
                Some(_) => DentsResult {
                    retval: -libc::ENOTDIR,
                    data: Vec::new(),
                },
                None => DentsResult {
                    retval: -libc::EBADF,
                    data: Vec::new(),
                },
            }
        };
        Continuation::from_value(result)
    }

    fn readlink(&self, _path: &str, _bufsize: usize) -> Continuation<ReadResult> {
        Continuation::from_value(ReadResult {
            retval: -(libc::EINVAL as isize),
            data: Vec::new(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(flavor = "current_thread")]
    async fn getdents_lists_seeded_names() {
        tokio::task::LocalSet::new()
            .run_until(async {
                let fs = MemoryFilesystem::new();
                fs.put_file("a", b"1".to_vec());
                fs.put_file("b", b"2".to_vec());
                fs.put_file("c", b"3".to_vec());

                let fd = fs.open("/", 0, 0).resolve().await;
                let dents = fs.getdents(fd, 4096).resolve().await;
                let records = crate::dirent::parse(&dents.data);
                let mut names: Vec<&str> = records.iter().map(|r| r.name.as_str()).collect();
                names.sort();
                assert_eq!(names, vec!["a", "b", "c"]);
            })
            .await;
    }

    #[tokio::test(flavor = "current_thread")]
    async fn read_respects_cursor_across_calls() {
        tokio::task::LocalSet::new()
            .run_until(async {
                let fs = MemoryFilesystem::new();
                fs.put_file("hello", b"hi\n".to_vec());
                let fd = fs.open("hello", libc::O_RDONLY, 0).resolve().await;
                let first = fs.read(fd, 2).resolve().await;
                assert_eq!(first.data, b"hi");
                let second = fs.read(fd, 2).resolve().await;
                assert_eq!(second.data, b"\n");
            })
            .await;
    }

    #[tokio::test(flavor = "current_thread")]
    async fn write_to_unknown_name_creates_it() {
        tokio::task::LocalSet::new()
            .run_until(async {
                let fs = MemoryFilesystem::new();
                fs.put_file("out", Vec::new());
                let fd = fs.open("out", libc::O_WRONLY, 0).resolve().await;
                let written = fs.write(fd, b"abc".to_vec()).resolve().await;
                assert_eq!(written, 3);
                let stat = fs.stat("out").resolve().await;
                assert_eq!(stat.stat.st_size, 3);
            })
            .await;
    }
}
