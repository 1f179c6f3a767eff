//! Line count and size of a candidate.
//!
//! Lines are counted on the decoded stream; the size is the transport's
//! stored size, so a gzip file reports its compressed size next to its
//! logical line count.

use std::io::{self, BufRead, BufReader};

use super::compression::{SNIFF_WINDOW, decoded, read_prefix, sniff};
use super::{OpenedFile, ScanError, Transport};

/// Line length (newline excluded) at which the scan is aborted.
pub const MAX_LINE_BYTES: usize = 1024 * 1024;

/// Compute `(lines_count, file_size)` for an opened candidate.
pub fn stats(file: &mut OpenedFile) -> io::Result<(u64, u64)> {
    file.rewind()?;
    let head = read_prefix(file.reader(), SNIFF_WINDOW)?;
    if head.is_empty() {
        return Ok((0, 0));
    }

    let encoding = sniff(&head);
    file.rewind()?;
    let size = file.size();
    let reader = BufReader::new(decoded(file.reader(), encoding));
    let lines = count_lines(reader)?;
    Ok((lines, size))
}

/// Open `path` through `transport` and compute its stats.
pub fn file_stats(transport: &dyn Transport, path: &str) -> Result<(u64, u64), ScanError> {
    let mut file = transport.open(path)?;
    stats(&mut file).map_err(|source| ScanError::Stats {
        path: path.to_string(),
        source,
    })
}

/// Count newline-delimited records; a trailing unterminated line counts.
pub fn count_lines<R: BufRead>(mut reader: R) -> io::Result<u64> {
    let mut lines = 0u64;
    let mut current = 0usize;

    loop {
        let buf = match reader.fill_buf() {
            Ok(buf) => buf,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        if buf.is_empty() {
            break;
        }
        let consumed = buf.len();

        let mut rest = buf;
        while let Some(pos) = rest.iter().position(|&b| b == b'\n') {
            check_line_len(current + pos)?;
            lines += 1;
            current = 0;
            rest = &rest[pos + 1..];
        }
        current += rest.len();
        check_line_len(current)?;

        reader.consume(consumed);
    }

    if current > 0 {
        lines += 1;
    }
    Ok(lines)
}

fn check_line_len(len: usize) -> io::Result<()> {
    if len >= MAX_LINE_BYTES {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("line reaches {MAX_LINE_BYTES} bytes"),
        ));
    }
    Ok(())
}
