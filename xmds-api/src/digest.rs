//! Content digests used for change detection
//!
//! XMDS declares file checksums as lowercase md5 hex; the same digest keys the
//! persisted manifest and schedule snapshots.

use std::io::{self, Read};

use md5::{Digest, Md5};

/// md5 of `data` as lowercase hex
pub fn md5_hex(data: &[u8]) -> String {
    let mut hasher = Md5::new();
    hasher.update(data);
    format!("{:x}", hasher.finalize())
}

/// md5 of everything `reader` yields, read in 64 KiB blocks
pub fn md5_reader<R: Read>(mut reader: R) -> io::Result<String> {
    let mut hasher = Md5::new();
    let mut buf = vec![0u8; 64 * 1024];
    loop {
        let n = reader.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(format!("{:x}", hasher.finalize()))
}

/// Case-insensitive digest comparison
pub fn digest_eq(a: &str, b: &str) -> bool {
    a.trim().eq_ignore_ascii_case(b.trim())
}
