//! Codebase size: total lines across every tracked file at HEAD.
//!
//! Counting is a lazy stream of per-file results. Binary and unreadable
//! files surface as [`SkippedFile`] items which the caller drops, so one bad
//! file never aborts the measurement.

use std::fs::File;
use std::io::{BufRead, BufReader, ErrorKind, Read};
use std::path::{Path, PathBuf};

use churnrate_core::ChurnError;
use git2::Repository;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

/// Bytes inspected for a NUL byte before a file is considered binary.
const BINARY_SNIFF_LEN: usize = 8000;

/// Index mode of a submodule entry.
const GITLINK_MODE: u32 = 0o160000;

/// Line count of one tracked file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileLines {
    /// Path relative to the repository root.
    pub path: PathBuf,
    /// Number of lines counted.
    pub lines: u64,
}

/// A tracked file that contributes nothing to the codebase size.
#[derive(Debug)]
pub struct SkippedFile {
    /// Path relative to the repository root.
    pub path: PathBuf,
    /// Why it was skipped.
    pub reason: SkipReason,
}

/// Why a file was left out of the line count.
#[derive(Debug)]
pub enum SkipReason {
    /// A NUL byte appeared near the start of the file.
    Binary,
    /// The file could not be opened.
    Unreadable(std::io::Error),
}

/// Failure modes of [`count_lines`].
#[derive(Debug)]
pub enum LineCountError {
    /// The input looks binary.
    Binary,
    /// Reading stopped early; `lines` were counted before the failure.
    Interrupted {
        /// Lines counted before the read failed.
        lines: u64,
        /// The underlying read error.
        source: std::io::Error,
    },
}

/// Count lines in `reader`.
///
/// Every `\n` ends a line; trailing bytes after the last `\n` count as one
/// more line.
///
/// # Errors
///
/// Returns [`LineCountError::Binary`] if a NUL byte appears in the first
/// 8000 bytes, or [`LineCountError::Interrupted`] with the partial count if
/// a read fails.
///
/// # Examples
///
/// ```
/// use churnrate_engine::sizer::count_lines;
///
/// assert_eq!(count_lines("one\ntwo\n".as_bytes()).unwrap(), 2);
/// assert_eq!(count_lines("one\ntwo".as_bytes()).unwrap(), 2);
/// assert_eq!(count_lines("".as_bytes()).unwrap(), 0);
/// ```
pub fn count_lines<R: Read>(reader: R) -> Result<u64, LineCountError> {
    let mut reader = BufReader::new(reader);
    let mut lines = 0u64;
    let mut sniffed = 0usize;
    let mut unterminated = false;

    loop {
        let buf = match reader.fill_buf() {
            Ok([]) => break,
            Ok(buf) => buf,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(source) => return Err(LineCountError::Interrupted { lines, source }),
        };

        if sniffed < BINARY_SNIFF_LEN {
            let window = &buf[..buf.len().min(BINARY_SNIFF_LEN - sniffed)];
            if window.contains(&0) {
                return Err(LineCountError::Binary);
            }
        }

        lines += buf.iter().filter(|&&b| b == b'\n').count() as u64;
        unterminated = buf.last() != Some(&b'\n');

        let len = buf.len();
        sniffed = sniffed.saturating_add(len);
        reader.consume(len);
    }

    if unterminated {
        lines += 1;
    }
    Ok(lines)
}

/// List the files tracked in the index of the repository at `root`.
///
/// Submodules and conflict stages are skipped, as are paths that are not
/// valid UTF-8.
///
/// # Errors
///
/// Returns [`ChurnError::Git`] if the repository or its index cannot be read.
pub fn tracked_files(root: &Path) -> Result<Vec<PathBuf>, ChurnError> {
    let repo = Repository::open(root)
        .map_err(|e| ChurnError::Git(format!("failed to open repository: {e}")))?;
    let index = repo
        .index()
        .map_err(|e| ChurnError::Git(format!("failed to read index: {e}")))?;

    let mut files = Vec::with_capacity(index.len());
    for entry in index.iter() {
        if entry.mode == GITLINK_MODE || index_stage(entry.flags) != 0 {
            continue;
        }
        match std::str::from_utf8(&entry.path) {
            Ok(path) => files.push(PathBuf::from(path)),
            Err(_) => trace!(
                path = %String::from_utf8_lossy(&entry.path),
                "skipping non-UTF-8 path"
            ),
        }
    }
    Ok(files)
}

fn index_stage(flags: u16) -> u16 {
    (flags >> 12) & 0x3
}

/// Lazily count every file in `files`, relative to `root`.
pub fn file_line_counts<'a>(
    root: &'a Path,
    files: &'a [PathBuf],
) -> impl Iterator<Item = Result<FileLines, SkippedFile>> + 'a {
    files.iter().map(move |rel| count_file(root, rel))
}

fn count_file(root: &Path, rel: &Path) -> Result<FileLines, SkippedFile> {
    let file = File::open(root.join(rel)).map_err(|e| SkippedFile {
        path: rel.to_path_buf(),
        reason: SkipReason::Unreadable(e),
    })?;

    let lines = match count_lines(file) {
        Ok(lines) => lines,
        Err(LineCountError::Binary) => {
            return Err(SkippedFile {
                path: rel.to_path_buf(),
                reason: SkipReason::Binary,
            })
        }
        Err(LineCountError::Interrupted { lines, source }) => {
            trace!(path = %rel.display(), lines, error = %source, "partial line count");
            lines
        }
    };

    Ok(FileLines {
        path: rel.to_path_buf(),
        lines,
    })
}

/// Sum the line counts of all tracked files under `root`.
///
/// Returns `Ok(0)` for an empty index; the caller decides whether that is
/// fatal. Checks `cancel` between files.
///
/// # Errors
///
/// Returns [`ChurnError::Git`] if the index cannot be read, or
/// [`ChurnError::Cancelled`] if `cancel` fires.
pub fn codebase_size(root: &Path, cancel: &CancellationToken) -> Result<u64, ChurnError> {
    let files = tracked_files(root)?;
    let mut total = 0u64;
    let mut skipped = 0usize;

    for item in file_line_counts(root, &files) {
        if cancel.is_cancelled() {
            return Err(ChurnError::Cancelled);
        }
        match item {
            Ok(file) => total += file.lines,
            Err(skip) => {
                skipped += 1;
                trace!(path = %skip.path.display(), reason = ?skip.reason, "skipped file");
            }
        }
    }

    debug!(files = files.len(), skipped, total, "measured codebase size");
    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FailAfter {
        data: &'static [u8],
        served: bool,
    }

    impl Read for FailAfter {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            if self.served {
                return Err(std::io::Error::new(ErrorKind::Other, "disk on fire"));
            }
            self.served = true;
            let n = self.data.len().min(buf.len());
            buf[..n].copy_from_slice(&self.data[..n]);
            Ok(n)
        }
    }

    #[test]
    fn counts_terminated_and_trailing_lines() {
        assert_eq!(count_lines("a\nb\nc\n".as_bytes()).unwrap(), 3);
        assert_eq!(count_lines("a\nb\nc".as_bytes()).unwrap(), 3);
        assert_eq!(count_lines("\n\n".as_bytes()).unwrap(), 2);
        assert_eq!(count_lines("a\r\nb\r\n".as_bytes()).unwrap(), 2);
    }

    #[test]
    fn empty_input_has_no_lines() {
        assert_eq!(count_lines(std::io::empty()).unwrap(), 0);
    }

    #[test]
    fn nul_byte_marks_binary() {
        let data = b"PNG\x00\x01\x02\nmore\n";
        assert!(matches!(
            count_lines(&data[..]),
            Err(LineCountError::Binary)
        ));
    }

    #[test]
    fn nul_byte_past_sniff_window_is_text() {
        let mut data = vec![b'x'; BINARY_SNIFF_LEN];
        data.push(b'\n');
        data.push(0);
        data.push(b'\n');
        assert_eq!(count_lines(&data[..]).unwrap(), 2);
    }

    #[test]
    fn read_failure_keeps_partial_count() {
        let reader = FailAfter {
            data: b"one\ntwo\nthr",
            served: false,
        };
        match count_lines(reader) {
            Err(LineCountError::Interrupted { lines, .. }) => assert_eq!(lines, 2),
            other => panic!("expected interrupted count, got {other:?}"),
        }
    }

    #[test]
    fn missing_file_is_skipped_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("present.txt"), "1\n2\n3\n").unwrap();
        let files = vec![PathBuf::from("present.txt"), PathBuf::from("gone.txt")];

        let results: Vec<_> = file_line_counts(dir.path(), &files).collect();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].as_ref().unwrap().lines, 3);
        let skipped = results[1].as_ref().unwrap_err();
        assert!(matches!(skipped.reason, SkipReason::Unreadable(_)));
        assert_eq!(skipped.path, PathBuf::from("gone.txt"));
    }

    #[test]
    fn codebase_size_sums_tracked_text_files() {
        let dir = tempfile::tempdir().unwrap();
        let repo = Repository::init(dir.path()).unwrap();
        std::fs::write(dir.path().join("a.rs"), "fn a() {}\nfn b() {}\n").unwrap();
        std::fs::write(dir.path().join("b.txt"), "x\ny\nz").unwrap();
        std::fs::write(dir.path().join("logo.png"), b"\x89PNG\x00\x00\n\n").unwrap();
        std::fs::write(dir.path().join("untracked.txt"), "not\ncounted\n").unwrap();

        let mut index = repo.index().unwrap();
        for name in ["a.rs", "b.txt", "logo.png"] {
            index.add_path(Path::new(name)).unwrap();
        }
        index.write().unwrap();

        let size = codebase_size(dir.path(), &CancellationToken::new()).unwrap();
        assert_eq!(size, 5);
    }

    #[test]
    fn empty_index_measures_zero() {
        let dir = tempfile::tempdir().unwrap();
        Repository::init(dir.path()).unwrap();
        assert_eq!(
            codebase_size(dir.path(), &CancellationToken::new()).unwrap(),
            0
        );
    }

    #[test]
    fn cancelled_sizing_stops() {
        let dir = tempfile::tempdir().unwrap();
        let repo = Repository::init(dir.path()).unwrap();
        std::fs::write(dir.path().join("a.txt"), "1\n").unwrap();
        let mut index = repo.index().unwrap();
        index.add_path(Path::new("a.txt")).unwrap();
        index.write().unwrap();

        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = codebase_size(dir.path(), &cancel).unwrap_err();
        assert!(matches!(err, ChurnError::Cancelled));
    }
}
