//! Daily rotating file sink.
//!
//! # Responsibilities
//! - Append records to `<dir>/<base>.<YYYY-MM-DD>`
//! - Keep `<dir>/<base>` pointing at the active file (unix symlink)
//! - Delete dated files older than the retention window
//!
//! # Design Decisions
//! - Rotation is checked when a writer is handed out, under the same lock
//!   as the write itself; there is no background task
//! - Opening the first file is fallible and reported at build; failures
//!   after that are reported on stderr and never reach the caller

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{Days, Local, NaiveDate};
use parking_lot::{Mutex, MutexGuard};
use tracing_subscriber::fmt::MakeWriter;

const DATE_FORMAT: &str = "%Y-%m-%d";

/// File sink rotating at local midnight.
#[derive(Debug, Clone)]
pub struct RollingFile {
    state: Arc<Mutex<RollingState>>,
}

#[derive(Debug)]
struct RollingState {
    dir: PathBuf,
    base: String,
    retention_days: u32,
    date: NaiveDate,
    file: File,
}

impl RollingFile {
    /// Create `dir` if needed and open today's file.
    pub fn open(dir: impl AsRef<Path>, base: impl Into<String>, retention_days: u32) -> io::Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;

        let base = base.into();
        let date = Local::now().date_naive();
        let file = open_dated(&dir, &base, date)?;

        let state = RollingState {
            dir,
            base,
            retention_days,
            date,
            file,
        };
        state.link();
        state.purge();

        Ok(Self {
            state: Arc::new(Mutex::new(state)),
        })
    }

    /// Path of the file records are currently written to.
    pub fn active_path(&self) -> PathBuf {
        let state = self.state.lock();
        dated_path(&state.dir, &state.base, state.date)
    }

    /// Path of the stable link to the active file.
    pub fn link_path(&self) -> PathBuf {
        let state = self.state.lock();
        state.dir.join(&state.base)
    }
}

fn dated_path(dir: &Path, base: &str, date: NaiveDate) -> PathBuf {
    dir.join(format!("{base}.{}", date.format(DATE_FORMAT)))
}

fn open_dated(dir: &Path, base: &str, date: NaiveDate) -> io::Result<File> {
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(dated_path(dir, base, date))
}

impl RollingState {
    fn rotate_if_needed(&mut self, today: NaiveDate) {
        if today == self.date {
            return;
        }
        match open_dated(&self.dir, &self.base, today) {
            Ok(file) => {
                self.file = file;
                self.date = today;
                self.link();
                self.purge();
            }
            Err(e) => eprintln!(
                "log rotation failed for {}: {e}",
                dated_path(&self.dir, &self.base, today).display()
            ),
        }
    }

    #[cfg(unix)]
    fn link(&self) {
        let link = self.dir.join(&self.base);
        let target = dated_path(Path::new(""), &self.base, self.date);

        if let Ok(meta) = fs::symlink_metadata(&link) {
            if !meta.file_type().is_symlink() {
                eprintln!("not replacing {}: not a symlink", link.display());
                return;
            }
            if let Err(e) = fs::remove_file(&link) {
                eprintln!("failed to remove stale link {}: {e}", link.display());
                return;
            }
        }
        if let Err(e) = std::os::unix::fs::symlink(&target, &link) {
            eprintln!("failed to link {}: {e}", link.display());
        }
    }

    #[cfg(not(unix))]
    fn link(&self) {}

    /// Remove dated files older than the retention window.
    fn purge(&self) {
        let Some(cutoff) = self.date.checked_sub_days(Days::new(u64::from(self.retention_days))) else {
            return;
        };
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) => {
                eprintln!("failed to list {}: {e}", self.dir.display());
                return;
            }
        };

        let prefix = format!("{}.", self.base);
        for entry in entries.flatten() {
            let name = entry.file_name();
            let Some(suffix) = name.to_str().and_then(|n| n.strip_prefix(&prefix)) else {
                continue;
            };
            let Ok(date) = NaiveDate::parse_from_str(suffix, DATE_FORMAT) else {
                continue;
            };
            if date < cutoff {
                if let Err(e) = fs::remove_file(entry.path()) {
                    eprintln!("failed to purge {}: {e}", entry.path().display());
                }
            }
        }
    }
}

/// Writer handed out for one record; holds the file lock until dropped.
pub struct RollingWriter<'a> {
    state: MutexGuard<'a, RollingState>,
}

impl Write for RollingWriter<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if let Err(e) = self.state.file.write_all(buf) {
            eprintln!("failed to write log record: {e}");
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        if let Err(e) = self.state.file.flush() {
            eprintln!("failed to flush log file: {e}");
        }
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for RollingFile {
    type Writer = RollingWriter<'a>;

    fn make_writer(&'a self) -> Self::Writer {
        let mut state = self.state.lock();
        state.rotate_if_needed(Local::now().date_naive());
        RollingWriter { state }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_creates_directory_and_dated_file() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("nested/logs");
        let sink = RollingFile::open(&dir, "access.log", 30).unwrap();

        sink.make_writer().write_all(b"hello\n").unwrap();

        let active = sink.active_path();
        assert!(active
            .file_name()
            .unwrap()
            .to_str()
            .unwrap()
            .starts_with("access.log."));
        assert_eq!(fs::read_to_string(&active).unwrap(), "hello\n");
    }

    #[cfg(unix)]
    #[test]
    fn link_points_at_active_file() {
        let tmp = tempfile::tempdir().unwrap();
        let sink = RollingFile::open(tmp.path(), "track.log", 30).unwrap();
        sink.make_writer().write_all(b"x\n").unwrap();

        assert_eq!(fs::read_to_string(sink.link_path()).unwrap(), "x\n");
    }

    #[test]
    fn purge_removes_only_expired_files() {
        let tmp = tempfile::tempdir().unwrap();
        let today = Local::now().date_naive();
        let old = today.checked_sub_days(Days::new(45)).unwrap();
        let recent = today.checked_sub_days(Days::new(3)).unwrap();

        fs::write(dated_path(tmp.path(), "error.log", old), "old").unwrap();
        fs::write(dated_path(tmp.path(), "error.log", recent), "recent").unwrap();
        fs::write(tmp.path().join("unrelated.txt"), "keep").unwrap();

        RollingFile::open(tmp.path(), "error.log", 30).unwrap();

        assert!(!dated_path(tmp.path(), "error.log", old).exists());
        assert!(dated_path(tmp.path(), "error.log", recent).exists());
        assert!(tmp.path().join("unrelated.txt").exists());
    }

    #[test]
    fn open_fails_when_directory_cannot_be_created() {
        let tmp = tempfile::tempdir().unwrap();
        let file = tmp.path().join("plain");
        fs::write(&file, "").unwrap();

        assert!(RollingFile::open(file.join("logs"), "access.log", 30).is_err());
    }
}
