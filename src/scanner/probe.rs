//! Readability probing.
//!
//! A candidate is usable when it is empty, or when its leading window (after
//! transparent gzip decoding) passes the optional UTF-8 check.

use std::io;

use super::compression::{
    Encoding, SNIFF_WINDOW, decoded, is_valid_utf8_prefix, read_prefix, sniff,
};
use super::{OpenedFile, ScanError, Transport};

/// Decide whether an opened candidate is usable.
///
/// `Ok(false)` means "not text"; `Err` is reserved for I/O failures.
pub fn probe(file: &mut OpenedFile, check_utf8: bool) -> io::Result<bool> {
    if file.size() == 0 {
        return Ok(true);
    }

    file.rewind()?;
    let head = read_prefix(file.reader(), SNIFF_WINDOW)?;
    if head.is_empty() {
        return Ok(true);
    }

    let sample = match sniff(&head) {
        Encoding::Plain => head,
        Encoding::Gzip => {
            file.rewind()?;
            let mut decoder = decoded(file.reader(), Encoding::Gzip);
            read_prefix(&mut decoder, SNIFF_WINDOW)?
        }
    };

    if check_utf8 {
        return Ok(is_valid_utf8_prefix(&sample, SNIFF_WINDOW));
    }
    Ok(true)
}

/// Open `path` through `transport` and probe it.
pub fn is_readable_file(
    transport: &dyn Transport,
    path: &str,
    check_utf8: bool,
) -> Result<bool, ScanError> {
    let mut file = transport.open(path)?;
    probe(&mut file, check_utf8).map_err(|source| ScanError::Probe {
        path: path.to_string(),
        source,
    })
}
