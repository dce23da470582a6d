//! Line Counter - newline totals used to size progress and the row cap

use crate::error::{CsvqlError, Result};
use std::fs::File;
use std::io::{self, ErrorKind, Read};
use std::path::Path;

pub const BUFFER_MAX_LENGTH: usize = 32 * 1024;

/// Counts `\n` bytes in the file at `path`
pub fn count_lines(path: &Path) -> Result<u64> {
    let file = File::open(path).map_err(|source| CsvqlError::Count {
        path: path.to_path_buf(),
        source,
    })?;

    count_newlines(file).map_err(|source| CsvqlError::Count {
        path: path.to_path_buf(),
        source,
    })
}

/// Streams `reader` through a fixed buffer counting newline bytes
pub fn count_newlines<R: Read>(mut reader: R) -> io::Result<u64> {
    let mut buf = vec![0u8; BUFFER_MAX_LENGTH];
    let mut lines = 0u64;

    loop {
        match reader.read(&mut buf) {
            Ok(0) => return Ok(lines),
            Ok(n) => lines += buf[..n].iter().filter(|&&b| b == b'\n').count() as u64,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
}
