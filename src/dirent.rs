//! Packs file names into the `linux_dirent` byte layout expected by `getdents`.
//!
//! ```text
//! unsigned long  d_ino;
//! unsigned long  d_off;     // unused, always 0
//! unsigned short d_reclen;
//! char           d_name[];  // NUL-terminated
//! char           pad;
//! char           d_type;    // trailing byte, defaults to DT_REG
//! ```
//!
//! Records are concatenated with no padding between them.

const INODE_SEED: u64 = 4242;

/// Builds a packed `getdents` buffer from an ordered sequence of names.
pub struct DirentBuilder {
    names: Vec<String>,
}

impl DirentBuilder {
    pub fn new() -> Self {
        DirentBuilder { names: Vec::new() }
    }

    pub fn append(&mut self, name: impl Into<String>) {
        self.names.push(name.into());
    }

    /// Serialize the accumulated names into a single buffer. Ownership of the buffer
    /// transfers to the caller.
    pub fn data(&self) -> Vec<u8> {
        let mut out = Vec::new();
        let mut inode = INODE_SEED;
        for name in &self.names {
            push_record(&mut out, inode, name);
            inode += 1;
        }
        out
    }
}

impl Default for DirentBuilder {
    fn default() -> Self {
        Self::new()
    }
}

// sizeof(unsigned long) * 2 + sizeof(unsigned short), matching the fixed-size prefix
// of `struct linux_dirent` before the flexible `d_name` array.
const FIXED_HEADER_LEN: usize = 8 + 8 + 2;

fn push_record(out: &mut Vec<u8>, ino: u64, name: &str) {
    // + 3 == NUL terminator + one pad byte + the trailing d_type byte.
    let reclen = FIXED_HEADER_LEN + name.len() + 3;

    out.extend_from_slice(&ino.to_ne_bytes());
    out.extend_from_slice(&0u64.to_ne_bytes()); // d_off, unused
    out.extend_from_slice(&(reclen as u16).to_ne_bytes());
    out.extend_from_slice(name.as_bytes());
    out.push(0); // NUL terminator
    out.push(0); // pad
    out.push(libc::DT_REG);
}

/// A single parsed record, used by tests and by callers that need to walk a buffer
/// produced by [`DirentBuilder::data`].
#[derive(Debug, PartialEq, Eq)]
pub struct DirentRecord {
    pub ino: u64,
    pub reclen: u16,
    pub name: String,
    pub d_type: u8,
}

/// Parse a packed `getdents` buffer back into its records. Exposed primarily for
/// tests; backends that synthesize directory listings build with [`DirentBuilder`]
/// and never need to parse their own output.
pub fn parse(buf: &[u8]) -> Vec<DirentRecord> {
    let mut records = Vec::new();
    let mut offset = 0;
    while offset + FIXED_HEADER_LEN <= buf.len() {
        let ino = u64::from_ne_bytes(buf[offset..offset + 8].try_into().unwrap());
        let reclen = u16::from_ne_bytes(buf[offset + 16..offset + 18].try_into().unwrap());
        let name_start = offset + FIXED_HEADER_LEN;
        let nul = buf[name_start..]
            .iter()
            .position(|&b| b == 0)
            .map(|p| name_start + p)
            .unwrap_or(buf.len());
        let name = String::from_utf8_lossy(&buf[name_start..nul]).into_owned();
        let d_type = buf[offset + reclen as usize - 1];
        records.push(DirentRecord {
            ino,
            reclen,
            name,
            d_type,
        });
        offset += reclen as usize;
    }
    records
}
