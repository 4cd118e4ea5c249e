//! Fire-and-forget notification delivery on a background worker.
//!
//! The trading loop hands message text to [`NotificationDispatcher::dispatch`]
//! and moves on; the worker owns the notifier and retries each message under
//! its own policy. Failures are logged and dropped.

use std::sync::Arc;
use std::sync::mpsc::{self, Sender};
use std::thread::{self, JoinHandle};

use tracing::{debug, warn};

use crate::domain::error::AgentError;
use crate::domain::retry::RetryPolicy;
use crate::ports::clock_port::Clock;
use crate::ports::notifier_port::NotifierPort;

pub struct NotificationDispatcher {
    sender: Option<Sender<String>>,
    worker: Option<JoinHandle<()>>,
}

impl NotificationDispatcher {
    pub fn spawn(
        notifier: Box<dyn NotifierPort>,
        policy: RetryPolicy,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, AgentError> {
        let (sender, receiver) = mpsc::channel::<String>();
        let worker = thread::Builder::new()
            .name("notifier".into())
            .spawn(move || {
                for text in receiver {
                    if policy
                        .run(clock.as_ref(), "notify", || notifier.send(&text))
                        .is_ok()
                    {
                        debug!(bytes = text.len(), "notification delivered");
                    }
                }
            })?;
        Ok(Self {
            sender: Some(sender),
            worker: Some(worker),
        })
    }

    pub fn dispatch(&self, text: String) {
        let delivered = self
            .sender
            .as_ref()
            .is_some_and(|sender| sender.send(text).is_ok());
        if !delivered {
            warn!("notification worker is gone, message dropped");
        }
    }

    /// Deliver what is queued, then stop the worker.
    pub fn shutdown(&mut self) {
        self.sender.take();
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                warn!("notification worker panicked");
            }
        }
    }
}

impl Drop for NotificationDispatcher {
    fn drop(&mut self) {
        self.shutdown();
    }
}
