// Path: crates/vault/src/io.rs
//! Small disk helpers shared by the store, index and audit log.

use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, ErrorKind, Write};
use std::path::Path;

fn is_transient(kind: ErrorKind) -> bool {
    matches!(
        kind,
        ErrorKind::Interrupted | ErrorKind::WouldBlock | ErrorKind::TimedOut
    )
}

/// Runs `op`, running it a second time if the first attempt failed with a
/// transient error. The second failure is returned as-is.
pub(crate) fn retry_once<T>(mut op: impl FnMut() -> io::Result<T>) -> io::Result<T> {
    match op() {
        Err(e) if is_transient(e.kind()) => {
            tracing::debug!(target: "vault", "retrying after transient I/O error: {e}");
            op()
        }
        other => other,
    }
}

/// Writes `bytes` to `tmp`, syncs it, then renames it over `dest`.
pub(crate) fn write_atomic(tmp: &Path, dest: &Path, bytes: &[u8]) -> io::Result<()> {
    let result = retry_once(|| {
        let mut file = BufWriter::new(
            OpenOptions::new()
                .create(true)
                .write(true)
                .truncate(true)
                .open(tmp)?,
        );
        file.write_all(bytes)?;
        file.flush()?;
        file.get_ref().sync_data()?;
        fs::rename(tmp, dest)
    });
    if result.is_err() {
        let _ = fs::remove_file(tmp);
    }
    result
}

/// Appends one line to a line-delimited file and syncs it.
pub(crate) fn append_line(path: &Path, line: &str) -> io::Result<u64> {
    append_lines(path, std::slice::from_ref(&line))
}

/// Appends lines in a single write and syncs them. Returns the file length
/// before the append; a failed write is cut back to that length so no
/// partial line is left behind.
pub(crate) fn append_lines<S: AsRef<str>>(path: &Path, lines: &[S]) -> io::Result<u64> {
    let mut buf = String::new();
    for line in lines {
        buf.push_str(line.as_ref());
        buf.push('\n');
    }
    retry_once(|| {
        let mut file = OpenOptions::new().create(true).append(true).open(path)?;
        let before = file.metadata()?.len();
        if let Err(e) = file.write_all(buf.as_bytes()).and_then(|()| file.sync_data()) {
            let _ = file.set_len(before);
            return Err(e);
        }
        Ok(before)
    })
}

/// Cuts a file back to `len` bytes, undoing an earlier append.
pub(crate) fn truncate_to(path: &Path, len: u64) -> io::Result<()> {
    retry_once(|| {
        let file = OpenOptions::new().write(true).open(path)?;
        file.set_len(len)?;
        file.sync_data()
    })
}

/// Reads a file's lines, treating a missing file as empty.
pub(crate) fn read_lines(path: &Path) -> io::Result<Vec<String>> {
    match retry_once(|| fs::read_to_string(path)) {
        Ok(text) => Ok(text.lines().map(str::to_string).collect()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(Vec::new()),
        Err(e) => Err(e),
    }
}

/// Opens (creating if needed) a file used only as a lock target.
pub(crate) fn open_lock_file(path: &Path) -> io::Result<File> {
    OpenOptions::new()
        .create(true)
        .read(true)
        .write(true)
        .truncate(false)
        .open(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn transient_failure_is_retried_once() {
        let calls = Cell::new(0);
        let result = retry_once(|| {
            calls.set(calls.get() + 1);
            if calls.get() == 1 {
                Err(io::Error::from(ErrorKind::Interrupted))
            } else {
                Ok(7)
            }
        });
        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.get(), 2);
    }

    #[test]
    fn second_transient_failure_surfaces() {
        let calls = Cell::new(0);
        let result: io::Result<()> = retry_once(|| {
            calls.set(calls.get() + 1);
            Err(io::Error::from(ErrorKind::TimedOut))
        });
        assert_eq!(result.unwrap_err().kind(), ErrorKind::TimedOut);
        assert_eq!(calls.get(), 2);
    }

    #[test]
    fn permanent_failure_is_not_retried() {
        let calls = Cell::new(0);
        let result: io::Result<()> = retry_once(|| {
            calls.set(calls.get() + 1);
            Err(io::Error::from(ErrorKind::PermissionDenied))
        });
        assert!(result.is_err());
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn appended_lines_read_back_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("log.jsonl");
        assert!(read_lines(&path).unwrap().is_empty());
        append_line(&path, "one").unwrap();
        append_line(&path, "two").unwrap();
        assert_eq!(read_lines(&path).unwrap(), vec!["one", "two"]);
    }

    #[test]
    fn batch_append_can_be_cut_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("log.jsonl");
        append_line(&path, "kept").unwrap();
        let before = append_lines(&path, &["a", "b", "c"]).unwrap();
        assert_eq!(before, 5);
        assert_eq!(read_lines(&path).unwrap(), vec!["kept", "a", "b", "c"]);
        truncate_to(&path, before).unwrap();
        assert_eq!(read_lines(&path).unwrap(), vec!["kept"]);
    }

    #[test]
    fn atomic_write_replaces_destination() {
        let dir = tempfile::tempdir().unwrap();
        let (tmp, dest) = (dir.path().join("x.tmp"), dir.path().join("x"));
        write_atomic(&tmp, &dest, b"first").unwrap();
        write_atomic(&tmp, &dest, b"second").unwrap();
        assert_eq!(fs::read(&dest).unwrap(), b"second");
        assert!(!tmp.exists());
    }
}
