// Copyright 2024 FastLabs Developers
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::fs;
use std::fs::File;
use std::fs::OpenOptions;
use std::io;
use std::io::Write;
use std::path::Path;
use std::path::PathBuf;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;

use jiff::Zoned;

use crate::Error;
use crate::ErrorKind;
use crate::Trap;

const DATE_FORMAT: &str = "%Y-%m-%d_%H";

// distinguishes staging links of sinks sharing a directory within one process
static STAGING_SEQ: AtomicU64 = AtomicU64::new(0);

/// Where and how hourly files are named.
#[derive(Debug, Clone)]
pub(crate) struct Layout {
    pub(crate) basedir: PathBuf,
    pub(crate) filename_prefix: String,
    pub(crate) current_link: String,
}

impl Layout {
    pub(crate) fn filename(&self, now: &Zoned) -> String {
        let date = now.strftime(DATE_FORMAT);
        format!("{}_{date}.log", self.filename_prefix)
    }
}

/// The active hourly file.
#[derive(Debug)]
pub(crate) struct State {
    log_dir: PathBuf,
    filename: String,
    file: File,
}

impl State {
    /// Resolve the log directory, open the file for the hour of `now` and point the current-log
    /// alias at it.
    ///
    /// A failure to replace the alias is trapped rather than returned: the file itself is usable.
    pub(crate) fn open(layout: &Layout, now: &Zoned, trap: &dyn Trap) -> Result<State, Error> {
        let log_dir = resolve_dir(&layout.basedir)?;
        let filename = layout.filename(now);

        let file = OpenOptions::new()
            .append(true)
            .create(true)
            .open(log_dir.join(&filename))
            .map_err(|err| {
                Error::new(ErrorKind::Io, "failed to open log file")
                    .with_context("file", log_dir.join(&filename).display())
                    .with_source(err)
            })?;

        if let Err(err) = link_current(&log_dir, &layout.current_link, &filename) {
            let err = Error::new(ErrorKind::Io, "failed to replace current log link")
                .with_context("link", log_dir.join(&layout.current_link).display())
                .with_context("target", &filename)
                .with_source(err);
            trap.trap(&err);
        }

        Ok(State {
            log_dir,
            filename,
            file,
        })
    }

    pub(crate) fn path(&self) -> PathBuf {
        self.log_dir.join(&self.filename)
    }

    pub(crate) fn write(&mut self, buf: &[u8]) -> Result<(), Error> {
        self.file.write_all(buf).map_err(|err| {
            Error::from_io_error(err).with_context("file", self.path().display())
        })
    }

    pub(crate) fn sync(&mut self) -> Result<(), Error> {
        self.file
            .flush()
            .and_then(|()| self.file.sync_all())
            .map_err(|err| {
                Error::new(ErrorKind::Io, "failed to sync log file")
                    .with_context("file", self.path().display())
                    .with_source(err)
            })
    }

    #[cfg(test)]
    pub(crate) fn replace_file(&mut self, file: File) {
        self.file = file;
    }
}

/// Make `dir` absolute and create it with all missing parents. An empty path is the current
/// directory.
fn resolve_dir(dir: &Path) -> Result<PathBuf, Error> {
    let dir = if dir.as_os_str().is_empty() {
        Path::new(".")
    } else {
        dir
    };

    let log_dir = std::path::absolute(dir).map_err(|err| {
        Error::new(ErrorKind::Init, "failed to resolve log directory")
            .with_context("dir", dir.display())
            .with_source(err)
    })?;

    fs::create_dir_all(&log_dir).map_err(|err| {
        Error::new(ErrorKind::Init, "failed to create log directory")
            .with_context("dir", log_dir.display())
            .with_source(err)
    })?;

    Ok(log_dir)
}

/// Point `dir/link` at `target` by renaming a freshly created link over it, so the alias always
/// resolves to either the old or the new file.
fn link_current(dir: &Path, link: &str, target: &str) -> io::Result<()> {
    let seq = STAGING_SEQ.fetch_add(1, Ordering::Relaxed);
    let staging = dir.join(format!(".{link}.{}.{seq}.tmp", std::process::id()));
    match fs::remove_file(&staging) {
        Ok(()) => {}
        Err(err) if err.kind() == io::ErrorKind::NotFound => {}
        Err(err) => return Err(err),
    }

    symlink(Path::new(target), &staging)?;
    fs::rename(&staging, dir.join(link)).inspect_err(|_| {
        let _ = fs::remove_file(&staging);
    })
}

#[cfg(unix)]
fn symlink(target: &Path, link: &Path) -> io::Result<()> {
    std::os::unix::fs::symlink(target, link)
}

#[cfg(windows)]
fn symlink(target: &Path, link: &Path) -> io::Result<()> {
    std::os::windows::fs::symlink_file(target, link)
}

#[cfg(not(any(unix, windows)))]
fn symlink(_: &Path, _: &Path) -> io::Result<()> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        "symbolic links are not supported on this platform",
    ))
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use tempfile::TempDir;

    use super::*;
    use crate::DefaultTrap;

    fn layout(dir: &Path) -> Layout {
        Layout {
            basedir: dir.to_path_buf(),
            filename_prefix: "text".to_string(),
            current_link: "text.log".to_string(),
        }
    }

    #[test]
    fn test_filename_is_zero_padded() {
        let layout = layout(Path::new("logs"));
        let now = Zoned::from_str("2024-03-05T07:12:52[UTC]").unwrap();
        assert_eq!(layout.filename(&now), "text_2024-03-05_07.log");
    }

    #[test]
    fn test_open_creates_nested_directory() {
        let temp_dir = TempDir::new().expect("failed to create a temporary directory");
        let basedir = temp_dir.path().join("a").join("b");
        let now = Zoned::from_str("2024-08-10T14:59:59[UTC]").unwrap();

        let state = State::open(&layout(&basedir), &now, &DefaultTrap::default()).unwrap();
        assert!(state.path().is_absolute());
        assert!(state.path().ends_with("a/b/text_2024-08-10_14.log"));
        assert!(state.path().exists());
    }

    #[test]
    fn test_empty_directory_is_current_directory() {
        let resolved = resolve_dir(Path::new("")).unwrap();
        assert_eq!(resolved, std::path::absolute(".").unwrap());
    }

    #[test]
    fn test_open_fails_when_directory_is_a_file() {
        let temp_dir = TempDir::new().expect("failed to create a temporary directory");
        let basedir = temp_dir.path().join("occupied");
        fs::write(&basedir, b"not a directory").unwrap();
        let now = Zoned::from_str("2024-08-10T14:59:59[UTC]").unwrap();

        let err = State::open(&layout(&basedir), &now, &DefaultTrap::default()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Init);
    }

    #[cfg(unix)]
    #[test]
    fn test_link_current_replaces_existing_link() {
        let temp_dir = TempDir::new().expect("failed to create a temporary directory");
        let dir = temp_dir.path();

        link_current(dir, "text.log", "text_2024-08-10_14.log").unwrap();
        link_current(dir, "text.log", "text_2024-08-10_15.log").unwrap();

        let target = fs::read_link(dir.join("text.log")).unwrap();
        assert_eq!(target, Path::new("text_2024-08-10_15.log"));

        // no staging links are left behind
        let entries = fs::read_dir(dir).unwrap().count();
        assert_eq!(entries, 1);
    }

    #[cfg(unix)]
    #[test]
    fn test_concurrent_link_replacement_in_shared_directory() {
        let temp_dir = TempDir::new().expect("failed to create a temporary directory");
        let dir = temp_dir.path();

        std::thread::scope(|scope| {
            for hour in 0..4 {
                scope.spawn(move || {
                    let target = format!("text_2024-08-10_{hour:02}.log");
                    for _ in 0..200 {
                        link_current(dir, "text.log", &target).unwrap();
                    }
                });
            }
        });

        let target = fs::read_link(dir.join("text.log")).unwrap();
        assert!(target.to_str().unwrap().starts_with("text_2024-08-10_"));
        let entries = fs::read_dir(dir).unwrap().count();
        assert_eq!(entries, 1);
    }
}
