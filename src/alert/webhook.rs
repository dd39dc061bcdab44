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

use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::CONTENT_TYPE;

use crate::Error;
use crate::ErrorKind;
use crate::alert::AlertMessage;
use crate::alert::Notify;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Deliver alerts as JSON `POST` requests to an incoming-webhook URL.
///
/// # Examples
///
/// ```
/// use hourlog::alert::Webhook;
///
/// let webhook = Webhook::new("https://hooks.example.com/services/T000/B000/XXXX").unwrap();
/// ```
#[derive(Debug, Clone)]
pub struct Webhook {
    url: String,
    client: Client,
}

impl Webhook {
    /// Create a webhook backend with the default request timeout of 10 seconds.
    ///
    /// # Errors
    ///
    /// Return an error if the HTTP client cannot be initialized.
    pub fn new(url: impl Into<String>) -> Result<Self, Error> {
        Self::with_timeout(url, DEFAULT_TIMEOUT)
    }

    /// Create a webhook backend whose requests give up after `timeout`.
    pub fn with_timeout(url: impl Into<String>, timeout: Duration) -> Result<Self, Error> {
        let client = Client::builder().timeout(timeout).build().map_err(|err| {
            Error::new(ErrorKind::Alert, "failed to build webhook client").with_source(err)
        })?;

        Ok(Self {
            url: url.into(),
            client,
        })
    }

    /// The URL alerts are posted to.
    pub fn url(&self) -> &str {
        &self.url
    }
}

impl Notify for Webhook {
    fn notify(&self, alert: &AlertMessage) -> Result<(), Error> {
        let body = serde_json::to_vec(alert).map_err(|err| {
            Error::new(ErrorKind::Alert, "failed to serialize alert").with_source(err)
        })?;

        let response = self
            .client
            .post(&self.url)
            .header(CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .map_err(|err| {
                Error::new(ErrorKind::Alert, "failed to post alert")
                    .with_context("url", &self.url)
                    .with_source(err)
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::new(ErrorKind::Alert, "webhook rejected alert")
                .with_context("url", &self.url)
                .with_context("status", status));
        }

        Ok(())
    }
}
