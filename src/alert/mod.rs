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

//! Forwarding of high-severity messages to an external notification endpoint.

use std::fmt;

use crate::Error;

mod forwarder;
mod message;
#[cfg(feature = "webhook")]
mod webhook;

pub use self::forwarder::AlertForwarder;
pub use self::forwarder::AlertForwarderBuilder;
pub use self::message::AlertMessage;
#[cfg(feature = "webhook")]
pub use self::webhook::Webhook;

/// A backend that delivers alerts.
pub trait Notify: fmt::Debug + Send + Sync + 'static {
    /// Deliver one alert.
    fn notify(&self, alert: &AlertMessage) -> Result<(), Error>;
}

impl<T: Notify> From<T> for Box<dyn Notify> {
    fn from(value: T) -> Self {
        Box::new(value)
    }
}
