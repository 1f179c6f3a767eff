//! Content sniffing shared by the prober and the stats engine.
//!
//! Both look at the same leading window and apply the same rule, so a
//! gzip-compressed log is indistinguishable from a plain one downstream.

use std::io::{self, Read};

use flate2::read::MultiGzDecoder;

/// Bytes inspected at the head of every candidate.
pub const SNIFF_WINDOW: usize = 512;

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Encoding of a candidate's content.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    Plain,
    Gzip,
}

/// Detect the encoding from a content prefix.
pub fn sniff(prefix: &[u8]) -> Encoding {
    if is_gzip(prefix) {
        Encoding::Gzip
    } else {
        Encoding::Plain
    }
}

/// True when `buffer` starts with the gzip magic number.
pub fn is_gzip(buffer: &[u8]) -> bool {
    buffer.starts_with(&GZIP_MAGIC)
}

/// Read up to `limit` bytes, stopping early only at end of stream.
pub fn read_prefix<R: Read + ?Sized>(reader: &mut R, limit: usize) -> io::Result<Vec<u8>> {
    let mut buf = vec![0u8; limit];
    let mut filled = 0;
    while filled < limit {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    buf.truncate(filled);
    Ok(buf)
}

/// Wrap `reader` in a decoder when `encoding` calls for it.
pub fn decoded<'a, R: Read + 'a>(reader: R, encoding: Encoding) -> Box<dyn Read + 'a> {
    match encoding {
        Encoding::Plain => Box::new(reader),
        Encoding::Gzip => Box::new(MultiGzDecoder::new(reader)),
    }
}

/// UTF-8 check over a sample read with `read_prefix(_, window)`.
///
/// A multibyte sequence cut off at the end is only tolerated when the
/// sample filled the window; a shorter sample is the whole stream.
pub fn is_valid_utf8_prefix(bytes: &[u8], window: usize) -> bool {
    match std::str::from_utf8(bytes) {
        Ok(_) => true,
        Err(e) => {
            bytes.len() == window
                && e.error_len().is_none()
                && bytes.len() - e.valid_up_to() < 4
        }
    }
}
