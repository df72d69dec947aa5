//! Whole-file text reading for the mapper, with transparent zstd decoding.
//! Deadlines are enforced by `concurrency::ReaderPool`.

use anyhow::{Context, Result};
use std::io::{BufReader, Read};
use std::path::Path;
use zstd::stream::read::Decoder;

use crate::util::open_with_backoff;

fn is_zst(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("zst"))
        .unwrap_or(false)
}

/// Read the whole file as UTF-8 text. `.zst` files are decompressed on the fly.
///
/// We request `window_log_max(31)` up front to avoid "Frame requires too much memory"
/// on large frames. Invalid UTF-8 is an error, not a lossy conversion.
pub fn read_text(path: &Path, read_buf_bytes: usize) -> Result<String> {
    let file = open_with_backoff(path, 16, 50).with_context(|| format!("open {}", path.display()))?;
    let mut text = String::new();
    if is_zst(path) {
        let mut decoder = Decoder::new(file)?;
        decoder.window_log_max(31)?;
        BufReader::with_capacity(read_buf_bytes, decoder)
            .read_to_string(&mut text)
            .with_context(|| format!("decode {}", path.display()))?;
    } else {
        BufReader::with_capacity(read_buf_bytes, file)
            .read_to_string(&mut text)
            .with_context(|| format!("read {}", path.display()))?;
    }
    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::{self, File};
    use std::io::Write;

    #[test]
    fn reads_plain_and_zst_files() {
        let dir = tempfile::tempdir().unwrap();
        let plain = dir.path().join("a.txt");
        fs::write(&plain, "hello world").unwrap();
        assert_eq!(read_text(&plain, 8 * 1024).unwrap(), "hello world");

        let packed = dir.path().join("b.txt.zst");
        let mut enc = zstd::stream::write::Encoder::new(File::create(&packed).unwrap(), 3).unwrap();
        enc.write_all(b"compressed words").unwrap();
        enc.finish().unwrap();
        assert_eq!(read_text(&packed, 8 * 1024).unwrap(), "compressed words");
    }

    #[test]
    fn invalid_utf8_and_bad_zst_are_errors() {
        let dir = tempfile::tempdir().unwrap();
        let bad_utf8 = dir.path().join("bin.txt");
        fs::write(&bad_utf8, [0x66, 0x6f, 0xff, 0xfe]).unwrap();
        assert!(read_text(&bad_utf8, 8 * 1024).is_err());

        let bad_zst = dir.path().join("fake.zst");
        fs::write(&bad_zst, "not a zstd frame").unwrap();
        assert!(read_text(&bad_zst, 8 * 1024).is_err());
    }
}
