//! Read-only window onto the admin action log.
//!
//! The scripts own the log format; this module only returns the last lines
//! verbatim. The file is read backwards in chunks and reading stops as soon
//! as enough lines have been seen.

use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Smallest and largest line counts a caller may ask for.
pub const MIN_LINES: usize = 10;
pub const MAX_LINES: usize = 5000;
pub const DEFAULT_LINES: usize = 500;

const CHUNK_SIZE: usize = 8 * 1024;

#[derive(Error, Debug)]
pub enum AuditError {
    #[error("admin log file not found: {0}")]
    NotFound(PathBuf),
    #[error("failed to read admin log: {0}")]
    Io(#[from] io::Error),
}

/// Last `max_lines` lines of the log, in file order, invalid UTF-8 replaced.
pub fn tail(path: &Path, max_lines: usize) -> Result<String, AuditError> {
    tail_chunked(path, max_lines, CHUNK_SIZE)
}

fn tail_chunked(path: &Path, max_lines: usize, chunk_size: usize) -> Result<String, AuditError> {
    let mut file = match File::open(path) {
        Ok(f) => f,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            return Err(AuditError::NotFound(path.to_path_buf()))
        }
        Err(e) => return Err(e.into()),
    };
    if max_lines == 0 {
        return Ok(String::new());
    }

    let len = file.seek(SeekFrom::End(0))?;
    let mut pos = len;
    let mut seen = 0;
    let mut cut = 0;
    // Chunks in reverse file order; each byte is read and scanned once
    let mut chunks: Vec<Vec<u8>> = Vec::new();

    while pos > 0 {
        let step = (chunk_size as u64).min(pos);
        pos -= step;
        file.seek(SeekFrom::Start(pos))?;
        let mut chunk = vec![0u8; step as usize];
        file.read_exact(&mut chunk)?;

        let found = line_start(&chunk, pos, len, max_lines, &mut seen);
        chunks.push(chunk);
        if let Some(offset) = found {
            cut = offset;
            break;
        }
    }

    let mut out = Vec::with_capacity(chunks.iter().map(Vec::len).sum::<usize>() - cut);
    let mut ordered = chunks.iter().rev();
    if let Some(first) = ordered.next() {
        out.extend_from_slice(&first[cut..]);
    }
    for chunk in ordered {
        out.extend_from_slice(chunk);
    }

    Ok(String::from_utf8_lossy(&out).into_owned())
}

/// Scan `chunk` (read from file offset `offset`) backwards for newlines,
/// adding to `seen`. Returns the index in `chunk` where the last `max_lines`
/// lines begin once that many separators have been passed. The newline that
/// ends the file terminates the last line and is not counted.
fn line_start(chunk: &[u8], offset: u64, file_len: u64, max_lines: usize, seen: &mut usize) -> Option<usize> {
    for (i, byte) in chunk.iter().enumerate().rev() {
        if *byte != b'\n' || offset + i as u64 + 1 == file_len {
            continue;
        }
        *seen += 1;
        if *seen == max_lines {
            return Some(i + 1);
        }
    }
    None
}

/// Run [`tail`] on the blocking pool.
pub async fn tail_async(path: PathBuf, max_lines: usize) -> Result<String, AuditError> {
    tokio::task::spawn_blocking(move || tail(&path, max_lines))
        .await
        .map_err(|e| AuditError::Io(io::Error::new(io::ErrorKind::Other, e)))?
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn log_with(contents: &[u8]) -> NamedTempFile {
        let mut tmp = NamedTempFile::new().unwrap();
        tmp.write_all(contents).unwrap();
        tmp.flush().unwrap();
        tmp
    }

    #[test]
    fn test_last_three_lines() {
        let log = log_with(b"a\nb\nc\nd\ne\n");
        assert_eq!(tail(log.path(), 3).unwrap(), "c\nd\ne\n");
    }

    #[test]
    fn test_unterminated_last_line() {
        let log = log_with(b"a\nb\nc");
        assert_eq!(tail(log.path(), 2).unwrap(), "b\nc");
    }

    #[test]
    fn test_fewer_lines_than_requested() {
        let log = log_with(b"only\nthese\n");
        assert_eq!(tail(log.path(), 500).unwrap(), "only\nthese\n");
    }

    #[test]
    fn test_empty_log() {
        let log = log_with(b"");
        assert_eq!(tail(log.path(), 10).unwrap(), "");
    }

    #[test]
    fn test_invalid_utf8_is_replaced() {
        let log = log_with(b"ok\nbad \xff byte\nlast\n");
        assert_eq!(tail(log.path(), 2).unwrap(), "bad \u{fffd} byte\nlast\n");
    }

    #[test]
    fn test_missing_file() {
        let err = tail(Path::new("/nonexistent/orion/admin-actions.log"), 10).unwrap_err();
        assert!(matches!(err, AuditError::NotFound(_)));
    }

    #[test]
    fn test_chunk_boundaries() {
        let lines: Vec<String> = (0..200).map(|i| format!("[2025-01-01 00:00:{:02}] step {}", i % 60, i)).collect();
        let contents = lines.join("\n") + "\n";
        let log = log_with(contents.as_bytes());

        let expected = lines[150..].join("\n") + "\n";
        for chunk in [1, 7, 64, 4096] {
            assert_eq!(tail_chunked(log.path(), 50, chunk).unwrap(), expected, "chunk {}", chunk);
        }
    }

    #[test]
    fn test_long_lines_read_once() {
        // Fewer lines than requested, each far longer than a chunk
        let lines: Vec<String> = (0..300).map(|i| format!("{:04} {}", i, "x".repeat(4096))).collect();
        let contents = lines.join("\n") + "\n";
        let log = log_with(contents.as_bytes());

        assert_eq!(tail_chunked(log.path(), 5000, 64).unwrap(), contents);
        assert_eq!(tail(log.path(), 5000).unwrap(), contents);

        let expected = lines[290..].join("\n") + "\n";
        assert_eq!(tail_chunked(log.path(), 10, 64).unwrap(), expected);
    }

    #[test]
    fn test_only_newlines() {
        let log = log_with(b"\n\n\n");
        assert_eq!(tail(log.path(), 2).unwrap(), "\n\n");
    }

    #[tokio::test]
    async fn test_tail_async() {
        let log = log_with(b"x\ny\n");
        assert_eq!(tail_async(log.path().to_path_buf(), 1).await.unwrap(), "y\n");
    }
}
