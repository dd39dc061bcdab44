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

use std::fmt;

use log::Level;
use log::LevelFilter;

use crate::Error;

/// A destination that formatted log messages can be written to.
///
/// This is the whole surface a logging front end needs from a destination, so any implementor is
/// interchangeable with [`HourlyFile`](crate::HourlyFile).
pub trait Writer: fmt::Debug + Send + Sync + 'static {
    /// (Re-)initialize the destination, replacing any previously held resources.
    ///
    /// Default to a no-op.
    fn init(&self) -> Result<(), Error> {
        Ok(())
    }

    /// Write a formatted message of the given level.
    fn write(&self, message: &str, level: Level) -> Result<(), Error>;

    /// Force buffered data to stable storage.
    ///
    /// Default to a no-op.
    fn flush(&self) -> Result<(), Error> {
        Ok(())
    }

    /// Release the resources held by this destination.
    ///
    /// Default to a no-op.
    fn close(&self) -> Result<(), Error> {
        Ok(())
    }

    /// Set the level threshold.
    ///
    /// What the threshold gates is up to the implementor. [`HourlyFile`](crate::HourlyFile) uses it
    /// for alert routing only and writes every message regardless of its level.
    fn set_level(&self, level: LevelFilter);

    /// Return the level threshold.
    fn level(&self) -> LevelFilter;
}

impl<T: Writer> From<T> for Box<dyn Writer> {
    fn from(value: T) -> Self {
        Box::new(value)
    }
}
