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

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;
use std::time::Duration;

use log::Level;
use log::LevelFilter;

use crate::DefaultTrap;
use crate::Error;
use crate::ErrorKind;
use crate::Trap;
use crate::Writer;
use crate::alert::AlertForwarder;
use crate::hourly::boundary::DEFAULT_TICK_INTERVAL;
use crate::hourly::boundary::HourBoundary;
use crate::hourly::clock::Clock;
use crate::hourly::state::Layout;
use crate::hourly::state::State;

/// A builder to configure and create an [`HourlyFile`] sink.
#[derive(Debug)]
pub struct HourlyFileBuilder {
    // required
    basedir: PathBuf,

    // has default
    filename_prefix: String,
    current_link: String,
    level: LevelFilter,
    tick_interval: Duration,
    alerts: Option<AlertForwarder>,
    clock: Clock,
    trap: Box<dyn Trap>,
}

impl HourlyFileBuilder {
    /// Create a new builder writing hourly files under `basedir`.
    ///
    /// A relative `basedir` is resolved against the current directory, an empty one is the
    /// current directory itself.
    pub fn new(basedir: impl Into<PathBuf>) -> Self {
        Self {
            basedir: basedir.into(),
            filename_prefix: "text".to_string(),
            current_link: "text.log".to_string(),
            level: LevelFilter::Error,
            tick_interval: DEFAULT_TICK_INTERVAL,
            alerts: None,
            clock: Clock::DefaultClock,
            trap: Box::new(DefaultTrap::default()),
        }
    }

    /// Set the filename prefix. Files are named `<prefix>_<YYYY-MM-DD>_<HH>.log`.
    ///
    /// Default to `text`.
    pub fn filename_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.filename_prefix = prefix.into();
        self
    }

    /// Set the name of the link that always points at the active file.
    ///
    /// Default to `text.log`.
    pub fn current_link(mut self, name: impl Into<String>) -> Self {
        self.current_link = name.into();
        self
    }

    /// Set the alert threshold. Messages at or above it are forwarded as alerts.
    ///
    /// Default to [`LevelFilter::Error`].
    pub fn level(mut self, level: LevelFilter) -> Self {
        self.level = level;
        self
    }

    /// Set how often the wall clock is sampled for hour boundaries.
    ///
    /// Default to 1 second. It bounds how late after the hour a write can still land in the
    /// previous hour's file.
    pub fn tick_interval(mut self, interval: Duration) -> Self {
        self.tick_interval = interval;
        self
    }

    /// Forward messages at or above the alert threshold through `forwarder`.
    pub fn alerts(mut self, forwarder: AlertForwarder) -> Self {
        self.alerts = Some(forwarder);
        self
    }

    /// Set the trap for errors that are reported but not returned.
    ///
    /// Default to [`DefaultTrap`].
    pub fn trap(mut self, trap: impl Into<Box<dyn Trap>>) -> Self {
        self.trap = trap.into();
        self
    }

    #[cfg(test)]
    fn clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    /// Build the [`HourlyFile`] sink and open the file for the current hour.
    ///
    /// # Errors
    ///
    /// Return an error if either:
    ///
    /// * The filename prefix or the link name is empty.
    /// * The log directory cannot be created.
    /// * The log file cannot be opened.
    /// * The hour boundary thread cannot be spawned.
    pub fn build(self) -> Result<HourlyFile, Error> {
        let Self {
            basedir,
            filename_prefix,
            current_link,
            level,
            tick_interval,
            alerts,
            clock,
            trap,
        } = self;

        if filename_prefix.is_empty() {
            return Err(Error::new(ErrorKind::Init, "filename prefix must not be empty"));
        }
        if current_link.is_empty() {
            return Err(Error::new(ErrorKind::Init, "current link name must not be empty"));
        }

        let trap: Arc<dyn Trap> = Arc::from(trap);
        let layout = Layout {
            basedir,
            filename_prefix,
            current_link,
        };

        // the boundary thread compares against the hour the file is opened for, so an hour
        // turning over during setup is never missed
        let now = clock.now();
        let boundary = HourBoundary::start(clock.clone(), &now, tick_interval)?;
        let state = State::open(&layout, &now, trap.as_ref())?;

        let inner = Inner {
            layout,
            clock,
            level,
            state: Some(state),
            rotation_pending: false,
            boundary,
            alerts,
        };

        Ok(HourlyFile {
            inner: Mutex::new(inner),
            trap,
        })
    }
}

/// A sink that writes log messages to one file per wall-clock hour.
///
/// Files are named `<prefix>_<YYYY-MM-DD>_<HH>.log` and a link (default `text.log`) in the same
/// directory always points at the active one. Messages at or above the alert threshold are also
/// handed to the configured [`AlertForwarder`]; the threshold never filters what is written.
///
/// Rotation is lazy: a background thread notices the hour change, but the file is only switched
/// by the next [`write`](Writer::write). A sink nobody writes to keeps its file open across hours
/// and does no rotation work.
///
/// # Examples
///
/// ```
/// use hourlog::HourlyFileBuilder;
/// use hourlog::Writer;
/// use log::Level;
///
/// let dir = tempfile::tempdir().unwrap();
/// let sink = HourlyFileBuilder::new(dir.path()).build().unwrap();
///
/// sink.write("service started\n", Level::Info).unwrap();
/// sink.close().unwrap();
/// ```
#[derive(Debug)]
pub struct HourlyFile {
    inner: Mutex<Inner>,
    trap: Arc<dyn Trap>,
}

#[derive(Debug)]
struct Inner {
    layout: Layout,
    clock: Clock,
    level: LevelFilter,
    // `None` once closed
    state: Option<State>,
    rotation_pending: bool,
    boundary: HourBoundary,
    alerts: Option<AlertForwarder>,
}

impl HourlyFile {
    fn inner(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// The path of the file currently written to, or `None` once closed.
    pub fn current_file(&self) -> Option<PathBuf> {
        self.inner().state.as_ref().map(State::path)
    }
}

impl Inner {
    /// Open the file for the current hour and swap it in. The previous file stays active if
    /// opening fails.
    fn reopen(&mut self, trap: &dyn Trap) -> Result<(), Error> {
        let Some(state) = self.state.as_mut() else {
            return Err(Error::closed());
        };

        let next = State::open(&self.layout, &self.clock.now(), trap)?;
        if let Err(err) = state.sync() {
            trap.trap(&err);
        }
        *state = next;
        self.rotation_pending = false;
        Ok(())
    }

    fn rotate_if_due(&mut self, trap: &dyn Trap) -> Result<(), Error> {
        if self.boundary.poll().is_some() {
            self.rotation_pending = true;
        }
        if !self.rotation_pending {
            return Ok(());
        }

        let current = self.state.as_ref().map(State::path);
        self.reopen(trap).map_err(|err| {
            let err = Error::new(ErrorKind::Rotate, "failed to rotate log file").with_source(err);
            match current {
                Some(current) => err.with_context("retained", current.display()),
                None => err,
            }
        })
    }

    fn close(&mut self, trap: &dyn Trap) -> Result<(), Error> {
        let Some(mut state) = self.state.take() else {
            return Ok(());
        };

        self.boundary.stop();
        if let Some(alerts) = self.alerts.as_mut() {
            if let Err(err) = alerts.shutdown() {
                trap.trap(&err);
            }
        }
        state.sync()
    }
}

impl Writer for HourlyFile {
    /// Re-open the file for the current hour and repoint the link at it.
    fn init(&self) -> Result<(), Error> {
        self.inner().reopen(self.trap.as_ref())
    }

    /// Write `message` as is to the active file.
    ///
    /// If the hour turned since the last write, the file is rotated first. If that fails, the
    /// message still goes to the previous file, the rotation error is returned and rotation is
    /// retried on the next write. A storage error takes precedence over a rotation error.
    fn write(&self, message: &str, level: Level) -> Result<(), Error> {
        let mut guard = self.inner();
        let inner = &mut *guard;
        if inner.state.is_none() {
            return Err(Error::closed());
        }

        if level <= inner.level {
            if let Some(alerts) = inner.alerts.as_ref() {
                if let Err(err) = alerts.submit(message) {
                    self.trap.trap(&err);
                }
            }
        }

        let rotated = inner.rotate_if_due(self.trap.as_ref());
        let state = inner.state.as_mut().ok_or_else(Error::closed)?;
        state.write(message.as_bytes())?;
        rotated
    }

    fn flush(&self) -> Result<(), Error> {
        match self.inner().state.as_mut() {
            Some(state) => state.sync(),
            None => Err(Error::closed()),
        }
    }

    /// Sync and release the active file, then stop the background threads.
    ///
    /// Closing twice is a no-op. Any other operation after close returns
    /// [`ErrorKind::Closed`].
    fn close(&self) -> Result<(), Error> {
        self.inner().close(self.trap.as_ref())
    }

    fn set_level(&self, level: LevelFilter) {
        self.inner().level = level;
    }

    fn level(&self) -> LevelFilter {
        self.inner().level
    }
}

impl Drop for HourlyFile {
    fn drop(&mut self) {
        let inner = self.inner.get_mut().unwrap_or_else(|e| e.into_inner());
        if let Err(err) = inner.close(self.trap.as_ref()) {
            let err = Error::new(ErrorKind::Io, "failed to close hourly file on dropped")
                .with_source(err);
            self.trap.trap(&err);
        }
    }
}
