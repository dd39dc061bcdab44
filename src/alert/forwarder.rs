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

use std::sync::Arc;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::thread::JoinHandle;
use std::time::Duration;

use crossbeam_channel::Receiver;
use crossbeam_channel::SendTimeoutError;
use crossbeam_channel::Sender;
use crossbeam_channel::TrySendError;
use crossbeam_channel::bounded;

use crate::DefaultTrap;
use crate::Error;
use crate::ErrorKind;
use crate::Trap;
use crate::alert::AlertMessage;
use crate::alert::Notify;

const DEFAULT_QUEUE_CAPACITY: usize = 64;
const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(1);

#[derive(Debug)]
enum Message {
    Alert(AlertMessage),
    Shutdown,
}

/// A builder for configuring an [`AlertForwarder`].
#[derive(Debug)]
pub struct AlertForwarderBuilder {
    notify: Box<dyn Notify>,
    username: String,
    channel: String,
    thread_name: String,
    queue_capacity: usize,
    shutdown_timeout: Duration,
    trap: Box<dyn Trap>,
}

impl AlertForwarderBuilder {
    /// Create a new builder that delivers through `notify` as `username` into `channel`.
    pub fn new(
        notify: impl Into<Box<dyn Notify>>,
        username: impl Into<String>,
        channel: impl Into<String>,
    ) -> Self {
        Self {
            notify: notify.into(),
            username: username.into(),
            channel: channel.into(),
            thread_name: "hourlog-alert".to_string(),
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
            trap: Box::new(DefaultTrap::default()),
        }
    }

    /// Set the number of pending alerts kept before the oldest is dropped.
    ///
    /// Default to 64. A capacity of zero is treated as one.
    pub fn queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity.max(1);
        self
    }

    /// Set how long [`AlertForwarder::shutdown`] waits for queued alerts to be delivered.
    ///
    /// Default to 1 second.
    pub fn shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    /// Override the dispatcher thread's name.
    pub fn thread_name(mut self, name: impl Into<String>) -> Self {
        self.thread_name = name.into();
        self
    }

    /// Set the trap for delivery failures.
    ///
    /// Default to [`DefaultTrap`].
    pub fn trap(mut self, trap: impl Into<Box<dyn Trap>>) -> Self {
        self.trap = trap.into();
        self
    }

    /// Build the forwarder and start its dispatcher thread.
    pub fn build(self) -> Result<AlertForwarder, Error> {
        let Self {
            notify,
            username,
            channel,
            thread_name,
            queue_capacity,
            shutdown_timeout,
            trap,
        } = self;

        let notify: Arc<dyn Notify> = Arc::from(notify);
        let trap: Arc<dyn Trap> = Arc::from(trap);

        let (sender, receiver) = bounded(queue_capacity);
        let (shutdown_sender, shutdown_receiver) = bounded(0);

        let dispatcher = Dispatcher {
            notify: notify.clone(),
            receiver: receiver.clone(),
            shutdown: shutdown_receiver,
            trap: trap.clone(),
        };
        let handle = std::thread::Builder::new()
            .name(thread_name)
            .spawn(move || dispatcher.run())
            .map_err(|err| {
                Error::new(ErrorKind::Alert, "failed to spawn alert dispatcher thread")
                    .with_source(err)
            })?;

        Ok(AlertForwarder {
            username,
            channel,
            notify,
            dropped: AtomicUsize::new(0),
            trap,
            guard: Some(DispatcherGuard {
                sender,
                receiver,
                handle,
                shutdown: shutdown_sender,
                shutdown_timeout,
            }),
            abandoned: None,
        })
    }
}

/// Best-effort delivery of alert-worthy messages.
///
/// [`forward`](Self::forward) delivers on the caller's thread. [`submit`](Self::submit) hands the
/// message to a dedicated dispatcher thread through a bounded queue and never blocks: when the
/// queue is full, the oldest pending alert is dropped to make room for the newest one.
///
/// # Examples
///
/// ```
/// use hourlog::alert::AlertForwarderBuilder;
/// use hourlog::alert::Webhook;
///
/// let webhook = Webhook::new("https://hooks.example.com/services/T000/B000/XXXX").unwrap();
/// let forwarder = AlertForwarderBuilder::new(webhook, "logbot", "#alerts")
///     .queue_capacity(16)
///     .build()
///     .unwrap();
/// ```
#[derive(Debug)]
pub struct AlertForwarder {
    username: String,
    channel: String,
    notify: Arc<dyn Notify>,
    dropped: AtomicUsize,
    trap: Arc<dyn Trap>,
    guard: Option<DispatcherGuard>,
    // a dispatcher that did not stop within the shutdown timeout
    abandoned: Option<JoinHandle<()>>,
}

impl AlertForwarder {
    /// Build the alert record for `text` with the configured identity and channel.
    pub fn message(&self, text: impl Into<String>) -> AlertMessage {
        AlertMessage {
            text: text.into(),
            username: self.username.clone(),
            channel: self.channel.clone(),
        }
    }

    /// Deliver an alert synchronously.
    pub fn forward(&self, text: impl Into<String>) -> Result<(), Error> {
        self.notify.notify(&self.message(text))
    }

    /// Queue an alert for the dispatcher thread without blocking.
    ///
    /// # Errors
    ///
    /// Return an error only if the forwarder has been shut down. Saturation is not an error: the
    /// oldest pending alert is dropped and counted in [`dropped`](Self::dropped).
    pub fn submit(&self, text: impl Into<String>) -> Result<(), Error> {
        let Some(guard) = self.guard.as_ref() else {
            return Err(Error::new(ErrorKind::Closed, "alert forwarder is shut down"));
        };

        let message = Message::Alert(self.message(text));
        let message = match guard.sender.try_send(message) {
            Ok(()) => return Ok(()),
            Err(TrySendError::Full(message)) => message,
            Err(TrySendError::Disconnected(_)) => return Err(disconnected()),
        };

        if guard.receiver.try_recv().is_ok() {
            self.dropped.fetch_add(1, Ordering::Relaxed);
        }
        match guard.sender.try_send(message) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => {
                // another producer took the freed slot
                self.dropped.fetch_add(1, Ordering::Relaxed);
                Ok(())
            }
            Err(TrySendError::Disconnected(_)) => Err(disconnected()),
        }
    }

    /// The number of alerts dropped because the queue was full.
    pub fn dropped(&self) -> usize {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Stop the dispatcher after the alerts queued so far have been delivered.
    ///
    /// Waits at most the configured shutdown timeout. After that the dispatcher is abandoned: it
    /// finishes the alerts still queued and exits on its own. Calling it again does nothing.
    pub fn shutdown(&mut self) -> Result<(), Error> {
        let Some(guard) = self.guard.take() else {
            return Ok(());
        };

        guard.shutdown().map_err(|(err, handle)| {
            self.abandoned = Some(handle);
            err
        })
    }

    #[cfg(test)]
    fn dispatcher_exited(&self) -> bool {
        self.abandoned
            .as_ref()
            .is_none_or(|handle| handle.is_finished())
    }
}

impl Drop for AlertForwarder {
    fn drop(&mut self) {
        if let Err(err) = self.shutdown() {
            self.trap.trap(&err);
        }
    }
}

fn disconnected() -> Error {
    Error::new(ErrorKind::Alert, "alert dispatcher has exited")
}

#[derive(Debug)]
struct DispatcherGuard {
    sender: Sender<Message>,
    // kept to evict the oldest pending alert when the queue is full
    receiver: Receiver<Message>,
    handle: JoinHandle<()>,
    shutdown: Sender<()>,
    shutdown_timeout: Duration,
}

impl DispatcherGuard {
    /// Stop the dispatcher, handing back its thread if it did not stop in time.
    ///
    /// Every channel end held here is dropped on return, so an abandoned dispatcher still exits
    /// once it has drained the queue.
    fn shutdown(self) -> Result<(), (Error, JoinHandle<()>)> {
        let Self {
            sender,
            receiver,
            handle,
            shutdown,
            shutdown_timeout,
        } = self;
        drop(receiver);

        match stop_dispatcher(sender, shutdown, shutdown_timeout) {
            Ok(()) => {
                let _ = handle.join();
                Ok(())
            }
            Err(err) => Err((err, handle)),
        }
    }
}

fn stop_dispatcher(
    sender: Sender<Message>,
    shutdown: Sender<()>,
    timeout: Duration,
) -> Result<(), Error> {
    let timed_out = || {
        Error::new(ErrorKind::Alert, "timed out waiting for alert dispatcher")
            .with_context("timeout", format!("{timeout:?}"))
    };

    match sender.send_timeout(Message::Shutdown, timeout) {
        Ok(()) => {}
        Err(SendTimeoutError::Disconnected(_)) => return Ok(()),
        Err(SendTimeoutError::Timeout(_)) => return Err(timed_out()),
    }

    // The dispatcher calls `recv()` on this zero-capacity channel once every alert queued
    // before the shutdown marker has been handled.
    match shutdown.send_timeout((), timeout) {
        Ok(()) | Err(SendTimeoutError::Disconnected(_)) => Ok(()),
        Err(SendTimeoutError::Timeout(_)) => Err(timed_out()),
    }
}

struct Dispatcher {
    notify: Arc<dyn Notify>,
    receiver: Receiver<Message>,
    shutdown: Receiver<()>,
    trap: Arc<dyn Trap>,
}

impl Dispatcher {
    fn run(self) {
        let Self {
            notify,
            receiver,
            shutdown,
            trap,
        } = self;

        while let Ok(message) = receiver.recv() {
            match message {
                Message::Alert(alert) => {
                    if let Err(err) = notify.notify(&alert) {
                        trap.trap(&err.with_context("channel", &alert.channel));
                    }
                }
                Message::Shutdown => {
                    let _ = shutdown.recv();
                    break;
                }
            }
        }
    }
}
