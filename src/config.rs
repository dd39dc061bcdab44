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

//! Declarative configuration for an [`HourlyFile`] sink.
//!
//! Loading the configuration is up to the application. Any serde format works:
//!
//! ```
//! use hourlog::config::HourlyFileConfig;
//!
//! let config: HourlyFileConfig = serde_json::from_str(
//!     r##"{
//!         "dir": "logs",
//!         "level": "warn",
//!         "webhook": {
//!             "url": "https://hooks.example.com/services/T000/B000/XXXX",
//!             "username": "logbot",
//!             "channel": "#alerts"
//!         }
//!     }"##,
//! )
//! .unwrap();
//!
//! assert_eq!(config.filename_prefix, "text");
//! ```

use std::path::PathBuf;

use log::LevelFilter;
use serde::Deserialize;
use serde::Serialize;

use crate::Error;
use crate::HourlyFile;
use crate::HourlyFileBuilder;

/// Configuration of an [`HourlyFile`] sink. Missing fields take the builder's defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HourlyFileConfig {
    /// Directory the hourly files are written to.
    pub dir: PathBuf,
    /// Prefix of the hourly file names.
    pub filename_prefix: String,
    /// Name of the link to the active file.
    pub current_link: String,
    /// Alert threshold.
    pub level: LevelFilter,
    /// Where alerts are posted. No alerts are sent if absent.
    #[cfg(feature = "webhook")]
    pub webhook: Option<WebhookConfig>,
}

impl Default for HourlyFileConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("./"),
            filename_prefix: "text".to_string(),
            current_link: "text.log".to_string(),
            level: LevelFilter::Error,
            #[cfg(feature = "webhook")]
            webhook: None,
        }
    }
}

/// Configuration of the alert webhook.
#[cfg(feature = "webhook")]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebhookConfig {
    /// The incoming-webhook URL.
    pub url: String,
    /// Display name of the sender.
    pub username: String,
    /// Destination channel.
    pub channel: String,
    /// Pending alerts kept before the oldest is dropped.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
}

#[cfg(feature = "webhook")]
fn default_queue_capacity() -> usize {
    64
}

impl HourlyFileConfig {
    /// Turn this configuration into a builder, for further adjustments such as a custom trap.
    pub fn into_builder(self) -> Result<HourlyFileBuilder, Error> {
        let builder = HourlyFileBuilder::new(self.dir)
            .filename_prefix(self.filename_prefix)
            .current_link(self.current_link)
            .level(self.level);

        #[cfg(feature = "webhook")]
        let builder = match self.webhook {
            Some(webhook) => {
                let notify = crate::alert::Webhook::new(webhook.url)?;
                let alerts =
                    crate::alert::AlertForwarderBuilder::new(notify, webhook.username, webhook.channel)
                        .queue_capacity(webhook.queue_capacity)
                        .build()?;
                builder.alerts(alerts)
            }
            None => builder,
        };

        Ok(builder)
    }

    /// Build the sink described by this configuration.
    pub fn build(self) -> Result<HourlyFile, Error> {
        self.into_builder()?.build()
    }
}
