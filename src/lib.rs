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

//! Hourlog is a log sink that writes to one file per wall-clock hour and forwards high-severity
//! messages to a chat webhook.
//!
//! # Overview
//!
//! [`HourlyFile`] writes formatted messages to `<prefix>_<YYYY-MM-DD>_<HH>.log` under a base
//! directory and keeps a `text.log` link pointing at the active file. When the hour turns, the
//! next write switches to a new file. Messages at or above the alert threshold are also handed to
//! an [`AlertForwarder`](alert::AlertForwarder), which posts them from a background thread so a
//! slow endpoint never delays a write.
//!
//! Level taxonomy and message formatting belong to the logging front end; this crate receives
//! already formatted messages together with their [`log::Level`].
//!
//! # Examples
//!
//! ```
//! use hourlog::HourlyFileBuilder;
//! use hourlog::Writer;
//! use log::Level;
//!
//! let dir = tempfile::tempdir().unwrap();
//! let sink = HourlyFileBuilder::new(dir.path()).build().unwrap();
//!
//! sink.write("2024-08-10T14:59:59Z INFO hello\n", Level::Info).unwrap();
//! sink.flush().unwrap();
//! sink.close().unwrap();
//! ```

#![cfg_attr(docsrs, feature(doc_auto_cfg))]

pub mod alert;
pub mod config;
pub mod hourly;
pub mod trap;

mod error;
mod writer;

pub use self::error::Error;
pub use self::error::ErrorKind;
pub use self::hourly::HourlyFile;
pub use self::hourly::HourlyFileBuilder;
pub use self::trap::DefaultTrap;
pub use self::trap::Trap;
pub use self::writer::Writer;
