//! Construction-time configuration: the sandbox collaborator plus any whitelist
//! additions a caller wants on top of the built-in defaults, and a mount descriptor
//! bundling a prefix path with the backend that serves it.
//!
//! Neither type parses a file format -- callers build these programmatically with
//! plain constructor arguments rather than a config file.

use std::rc::Rc;

use crate::filesystem::Filesystem;
use crate::sandbox::Sandbox;

/// Handed to [`crate::vfs::Vfs::new`]: the guest-memory collaborator, plus any paths
/// to add to the default whitelist.
pub struct SandboxConfig {
    pub(crate) sandbox: Rc<dyn Sandbox>,
    pub(crate) extra_whitelist: Vec<String>,
}

impl SandboxConfig {
    pub fn new(sandbox: Rc<dyn Sandbox>) -> Self {
        SandboxConfig {
            sandbox,
            extra_whitelist: Vec::new(),
        }
    }

    /// Add a path to the whitelist on top of the built-in defaults.
    pub fn whitelist(mut self, path: impl Into<String>) -> Self {
        self.extra_whitelist.push(path.into());
        self
    }
}

/// Handed to [`crate::vfs::Vfs::mount_filesystem`]: an absolute prefix path paired
/// with the backend that serves everything under it.
pub struct MountConfig {
    pub(crate) path: String,
    pub(crate) backend: Rc<dyn Filesystem>,
}

impl MountConfig {
    pub fn new(path: impl Into<String>, backend: Rc<dyn Filesystem>) -> Self {
        MountConfig {
            path: path.into(),
            backend,
        }
    }
}
