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

use jiff::Zoned;

/// The time source shared by the sink and its boundary thread.
#[derive(Debug, Clone)]
pub(crate) enum Clock {
    DefaultClock,
    #[cfg(test)]
    ManualClock(ManualClock),
}

impl Clock {
    pub(crate) fn now(&self) -> Zoned {
        match self {
            Clock::DefaultClock => Zoned::now(),
            #[cfg(test)]
            Clock::ManualClock(clock) => clock.now(),
        }
    }
}

/// The time could be reset. Clones observe the same time.
#[derive(Debug, Clone)]
#[cfg(test)]
pub(crate) struct ManualClock {
    now: std::sync::Arc<std::sync::Mutex<Zoned>>,
}

#[cfg(test)]
impl ManualClock {
    pub(crate) fn new(now: Zoned) -> ManualClock {
        ManualClock {
            now: std::sync::Arc::new(std::sync::Mutex::new(now)),
        }
    }

    fn now(&self) -> Zoned {
        self.now.lock().unwrap().clone()
    }

    pub(crate) fn set_now(&self, now: Zoned) {
        *self.now.lock().unwrap() = now;
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::*;

    #[test]
    fn test_manual_clock_adjusting() {
        let now = Zoned::from_str("2023-01-01T12:00:00[UTC]").unwrap();
        let clock = ManualClock::new(now.clone());
        let shared = Clock::ManualClock(clock.clone());
        assert_eq!(shared.now(), now);

        let now = Zoned::from_str("2024-01-01T12:00:00[UTC]").unwrap();
        clock.set_now(now.clone());
        assert_eq!(shared.now(), now);
    }
}
