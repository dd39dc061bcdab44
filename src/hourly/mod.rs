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

//! Sink for writing log messages to hourly rolling files.
//!
//! # Example
//!
//!```
//! use hourlog::Writer;
//! use hourlog::alert::AlertForwarderBuilder;
//! use hourlog::alert::Webhook;
//! use hourlog::hourly::HourlyFileBuilder;
//! use log::Level;
//! use log::LevelFilter;
//!
//! let webhook = Webhook::new("http://127.0.0.1:9/hooks/alerts").unwrap();
//! let alerts = AlertForwarderBuilder::new(webhook, "logbot", "#alerts")
//!     .build()
//!     .unwrap();
//!
//! let dir = tempfile::tempdir().unwrap();
//! let sink = HourlyFileBuilder::new(dir.path())
//!     .filename_prefix("app")
//!     .level(LevelFilter::Error)
//!     .alerts(alerts)
//!     .build()
//!     .unwrap();
//!
//! sink.write("This line goes to app_<date>_<hour>.log\n", Level::Info).unwrap();
//! sink.close().unwrap();
//! ```

pub use self::sink::HourlyFile;
pub use self::sink::HourlyFileBuilder;

mod boundary;
mod clock;
mod sink;
mod state;
