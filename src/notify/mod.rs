//! Notification channel for medgate.
//!
//! Delivery of one-time codes is an external concern: the surrounding
//! service wires in whatever transport it uses for outbound mail. This
//! module defines the seam and two in-crate implementations — a
//! tracing-backed channel for development and a capturing double for
//! tests.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use tracing::info;

use crate::auth::code::CodeFlow;
use crate::{AuthError, Result};

/// Delivers a one-time code to an address.
///
/// Implementations must be cheap to call from request handling; anything
/// slow belongs behind the implementor's own queue.
pub trait NotificationChannel: Send + Sync {
    /// Deliver `code` to `address` for the given flow.
    fn send(&self, address: &str, code: &str, purpose: CodeFlow) -> Result<()>;
}

/// Channel that records dispatches in the log instead of sending them.
///
/// The code itself is never logged.
#[derive(Debug, Default)]
pub struct LogNotifier;

impl LogNotifier {
    /// Create a new log-backed channel.
    pub fn new() -> Self {
        Self
    }
}

impl NotificationChannel for LogNotifier {
    fn send(&self, address: &str, _code: &str, purpose: CodeFlow) -> Result<()> {
        info!(address = %address, purpose = %purpose, "one-time code dispatched");
        Ok(())
    }
}

/// A recorded dispatch.
#[derive(Debug, Clone)]
pub struct SentCode {
    /// Destination address.
    pub address: String,
    /// The delivered code.
    pub code: String,
    /// The flow the code belongs to.
    pub purpose: CodeFlow,
}

/// Capturing channel for tests.
#[derive(Debug, Default)]
pub struct MemoryNotifier {
    sent: Mutex<Vec<SentCode>>,
    fail: AtomicBool,
}

impl MemoryNotifier {
    /// Create a new capturing channel.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent sends fail, to simulate a delivery outage.
    pub fn set_failing(&self, failing: bool) {
        self.fail.store(failing, Ordering::SeqCst);
    }

    /// All dispatches recorded so far.
    pub fn sent(&self) -> Vec<SentCode> {
        self.sent.lock().unwrap().clone()
    }

    /// Codes sent to a specific address, in order.
    pub fn codes_for(&self, address: &str) -> Vec<String> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .filter(|s| s.address == address)
            .map(|s| s.code.clone())
            .collect()
    }

    /// The most recent code sent to an address, if any.
    pub fn last_code_for(&self, address: &str) -> Option<String> {
        self.codes_for(address).pop()
    }
}

impl NotificationChannel for MemoryNotifier {
    fn send(&self, address: &str, code: &str, purpose: CodeFlow) -> Result<()> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(AuthError::Notification("delivery failed".to_string()));
        }
        self.sent.lock().unwrap().push(SentCode {
            address: address.to_string(),
            code: code.to_string(),
            purpose,
        });
        Ok(())
    }
}
