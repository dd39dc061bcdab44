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

use std::thread::JoinHandle;
use std::time::Duration;

use crossbeam_channel::Receiver;
use crossbeam_channel::Sender;
use crossbeam_channel::TrySendError;
use crossbeam_channel::bounded;
use crossbeam_channel::select;
use crossbeam_channel::tick;
use jiff::Zoned;
use jiff::civil::Date;

use crate::Error;
use crate::ErrorKind;
use crate::hourly::clock::Clock;

/// How often the boundary thread samples the clock by default.
pub(crate) const DEFAULT_TICK_INTERVAL: Duration = Duration::from_secs(1);

/// Detects wall-clock hour transitions on a dedicated thread.
///
/// Events go through a one-slot channel. When the slot is still occupied the new event is
/// dropped: the consumer only needs to know that a boundary was crossed, not how many times.
/// The thread never waits for the consumer, so an idle sink does not pin it.
#[derive(Debug)]
pub(crate) struct HourBoundary {
    events: Receiver<Zoned>,
    running: Option<Running>,
}

#[derive(Debug)]
struct Running {
    shutdown: Sender<()>,
    handle: JoinHandle<()>,
}

impl HourBoundary {
    /// Start watching for the first hour after the one `now` falls in.
    ///
    /// `now` must be the instant the caller opened its file at, so a transition that happens
    /// before the thread first samples the clock is still reported.
    pub(crate) fn start(
        clock: Clock,
        now: &Zoned,
        interval: Duration,
    ) -> Result<HourBoundary, Error> {
        let (event_sender, events) = bounded(1);
        let (shutdown, shutdown_receiver) = bounded(0);

        let ticker = Ticker {
            clock,
            current: HourMark::of(now),
            interval,
            events: event_sender,
            shutdown: shutdown_receiver,
        };
        let handle = std::thread::Builder::new()
            .name("hourlog-boundary".to_string())
            .spawn(move || ticker.run())
            .map_err(|err| {
                Error::new(ErrorKind::Init, "failed to spawn hour boundary thread").with_source(err)
            })?;

        Ok(HourBoundary {
            events,
            running: Some(Running { shutdown, handle }),
        })
    }

    /// Take the pending boundary event, if any, without blocking.
    pub(crate) fn poll(&self) -> Option<Zoned> {
        self.events.try_recv().ok()
    }

    /// Stop the boundary thread and wait for it to exit. Calling it again does nothing.
    pub(crate) fn stop(&mut self) {
        if let Some(Running { shutdown, handle }) = self.running.take() {
            // dropping the sender disconnects the channel and wakes the ticker
            drop(shutdown);
            let _ = handle.join();
        }
    }

    #[cfg(test)]
    pub(crate) fn is_pending(&self) -> bool {
        !self.events.is_empty()
    }
}

impl Drop for HourBoundary {
    fn drop(&mut self) {
        self.stop();
    }
}

struct Ticker {
    clock: Clock,
    current: HourMark,
    interval: Duration,
    events: Sender<Zoned>,
    shutdown: Receiver<()>,
}

impl Ticker {
    fn run(self) {
        let Self {
            clock,
            mut current,
            interval,
            events,
            shutdown,
        } = self;

        let ticks = tick(interval);

        loop {
            let stopped = select! {
                recv(shutdown) -> _ => true,
                recv(ticks) -> _ => false,
            };
            if stopped {
                break;
            }

            let now = clock.now();
            let mark = HourMark::of(&now);
            if mark == current {
                continue;
            }
            current = mark;

            match events.try_send(now) {
                Ok(()) | Err(TrySendError::Full(_)) => {}
                Err(TrySendError::Disconnected(_)) => break,
            }
        }
    }
}

/// The civil hour a timestamp falls in.
///
/// The date is part of the mark so that a jump of exactly one day still counts as a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct HourMark {
    date: Date,
    hour: i8,
}

impl HourMark {
    fn of(now: &Zoned) -> HourMark {
        HourMark {
            date: now.date(),
            hour: now.hour(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;
    use std::time::Instant;

    use super::*;
    use crate::hourly::clock::ManualClock;

    const TICK: Duration = Duration::from_millis(1);

    fn zoned(s: &str) -> Zoned {
        Zoned::from_str(s).unwrap()
    }

    fn start(clock: &ManualClock) -> HourBoundary {
        let clock = Clock::ManualClock(clock.clone());
        let now = clock.now();
        HourBoundary::start(clock, &now, TICK).unwrap()
    }

    fn wait_until(mut cond: impl FnMut() -> bool) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while !cond() {
            assert!(Instant::now() < deadline, "condition not met in time");
            std::thread::sleep(Duration::from_millis(1));
        }
    }

    #[test]
    fn test_hour_mark_includes_date() {
        let a = HourMark::of(&zoned("2024-08-10T14:00:00[UTC]"));
        let b = HourMark::of(&zoned("2024-08-10T14:59:59[UTC]"));
        let c = HourMark::of(&zoned("2024-08-11T14:00:00[UTC]"));
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_no_event_within_the_same_hour() {
        let clock = ManualClock::new(zoned("2024-08-10T14:00:00[UTC]"));
        let mut boundary = start(&clock);

        clock.set_now(zoned("2024-08-10T14:59:59[UTC]"));
        std::thread::sleep(Duration::from_millis(50));
        assert!(boundary.poll().is_none());

        boundary.stop();
    }

    #[test]
    fn test_hour_turning_right_after_start_is_reported() {
        for _ in 0..50 {
            let clock = ManualClock::new(zoned("2024-08-10T14:59:59[UTC]"));
            let mut boundary = start(&clock);

            // the thread may not have sampled the clock yet
            clock.set_now(zoned("2024-08-10T15:00:01[UTC]"));
            wait_until(|| boundary.is_pending());

            let event = boundary.poll().unwrap();
            assert_eq!(event.hour(), 15);
            boundary.stop();
        }
    }

    #[test]
    fn test_pending_events_are_coalesced() {
        let clock = ManualClock::new(zoned("2024-08-10T14:30:00[UTC]"));
        let mut boundary = start(&clock);

        clock.set_now(zoned("2024-08-10T15:00:01[UTC]"));
        wait_until(|| boundary.is_pending());

        // the slot is occupied, so this transition is dropped
        clock.set_now(zoned("2024-08-10T16:00:01[UTC]"));
        std::thread::sleep(Duration::from_millis(100));

        let event = boundary.poll().unwrap();
        assert_eq!(event.hour(), 15);
        assert!(boundary.poll().is_none());

        boundary.stop();
    }

    #[test]
    fn test_stop_is_idempotent_with_undrained_events() {
        let clock = ManualClock::new(zoned("2024-08-10T14:30:00[UTC]"));
        let mut boundary = start(&clock);

        for hour in 15..18 {
            clock.set_now(zoned(&format!("2024-08-10T{hour}:00:00[UTC]")));
            std::thread::sleep(Duration::from_millis(20));
        }
        assert!(boundary.is_pending());

        let (done_sender, done) = crossbeam_channel::bounded(1);
        std::thread::spawn(move || {
            boundary.stop();
            boundary.stop();
            done_sender.send(()).unwrap();
        });
        done.recv_timeout(Duration::from_secs(5))
            .expect("boundary thread did not stop");
    }
}
