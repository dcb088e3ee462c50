//! Time source abstraction for real and simulated time.
//!
//! The scheduler never reads the clock or sleeps directly; it asks a
//! [`TimeSource`]. Production uses [`RealTimeSource`]. Tests and the
//! `--simulate` run use [`SimulatedTimeSource`], which jumps through every
//! sleep instantly and records how long each one was.

use chrono::{DateTime, Duration as ChronoDuration, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;
use std::sync::Mutex;
use std::sync::mpsc::{Receiver, RecvTimeoutError, TryRecvError};
use std::time::Duration as StdDuration;

use crate::io::signals::SignalMessage;

/// Trait for abstracting time operations.
pub trait TimeSource: Send + Sync {
    /// Get the current time.
    fn now(&self) -> DateTime<Utc>;

    /// Sleep for `duration`, returning early with the first message that
    /// arrives on `signals`.
    fn sleep(&self, duration: StdDuration, signals: &Receiver<SignalMessage>)
    -> Option<SignalMessage>;

    /// Check if this is a simulated time source.
    fn is_simulated(&self) -> bool;

    /// Check if simulation has ended (always false for real time).
    fn is_ended(&self) -> bool {
        false
    }
}

/// Real-time implementation that uses actual system time.
pub struct RealTimeSource;

impl TimeSource for RealTimeSource {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn sleep(
        &self,
        duration: StdDuration,
        signals: &Receiver<SignalMessage>,
    ) -> Option<SignalMessage> {
        match signals.recv_timeout(duration) {
            Ok(message) => Some(message),
            Err(RecvTimeoutError::Timeout) => None,
            Err(RecvTimeoutError::Disconnected) => {
                // No producer left to wake us
                std::thread::sleep(duration);
                None
            }
        }
    }

    fn is_simulated(&self) -> bool {
        false
    }
}

/// Fast-forward simulated time.
///
/// Every sleep advances the clock by exactly the requested duration (capped
/// at the end time) without waiting. Pending signal messages are delivered
/// before the clock moves, so a queued shutdown stops the loop at once.
pub struct SimulatedTimeSource {
    end_time: DateTime<Utc>,
    current: Mutex<DateTime<Utc>>,
    sleeps: Mutex<Vec<StdDuration>>,
}

impl SimulatedTimeSource {
    pub fn new(start_time: DateTime<Utc>, end_time: DateTime<Utc>) -> Self {
        Self {
            end_time,
            current: Mutex::new(start_time),
            sleeps: Mutex::new(Vec::new()),
        }
    }

    /// Every sleep requested so far, in order.
    pub fn sleeps(&self) -> Vec<StdDuration> {
        self.sleeps
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn end_time(&self) -> DateTime<Utc> {
        self.end_time
    }
}

impl TimeSource for SimulatedTimeSource {
    fn now(&self) -> DateTime<Utc> {
        *self
            .current
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn sleep(
        &self,
        duration: StdDuration,
        signals: &Receiver<SignalMessage>,
    ) -> Option<SignalMessage> {
        match signals.try_recv() {
            Ok(message) => return Some(message),
            Err(TryRecvError::Empty | TryRecvError::Disconnected) => {}
        }

        self.sleeps
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(duration);

        let mut current = self
            .current
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let advanced = ChronoDuration::from_std(duration)
            .ok()
            .and_then(|step| current.checked_add_signed(step))
            .unwrap_or(self.end_time);
        *current = advanced.min(self.end_time);

        None
    }

    fn is_simulated(&self) -> bool {
        true
    }

    fn is_ended(&self) -> bool {
        self.now() >= self.end_time
    }
}

/// Parse a datetime string in the format "YYYY-MM-DD HH:MM:SS" as local time
/// in `tz`.
pub fn parse_datetime_in_tz(s: &str, tz: Tz) -> Result<DateTime<Utc>, String> {
    let naive = NaiveDateTime::parse_from_str(s.trim(), "%Y-%m-%d %H:%M:%S")
        .map_err(|e| format!("Invalid datetime format: {e}. Use YYYY-MM-DD HH:MM:SS"))?;

    tz.from_local_datetime(&naive)
        .earliest()
        .map(|local| local.with_timezone(&Utc))
        .ok_or_else(|| format!("{s} does not exist in timezone {tz}"))
}
