//! Signal handling for the scheduler loop.
//!
//! A background thread turns process signals into [`SignalMessage`]s on a
//! channel. The scheduler sleeps by waiting on that channel, so a shutdown
//! request interrupts any sleep immediately and a reload request wakes it
//! for an early tick.

use anyhow::{Context, Result};
use signal_hook::{
    consts::signal::{SIGHUP, SIGINT, SIGTERM, SIGUSR2},
    iterator::Signals,
};
use std::sync::mpsc::{Receiver, Sender};
use std::{
    sync::Arc,
    sync::atomic::{AtomicBool, Ordering},
    thread,
};

/// Messages that can wake the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalMessage {
    /// Run a regular tick now (SIGHUP, SIGUSR2, config file change).
    Reload,
    /// Stop the scheduler (SIGINT, SIGTERM).
    Shutdown,
}

/// Signal handling state shared between threads.
pub struct SignalState {
    /// Cleared once shutdown has been requested.
    pub running: Arc<AtomicBool>,
    pub signal_receiver: Receiver<SignalMessage>,
    /// Kept so other producers (the config watcher) can wake the loop.
    pub signal_sender: Sender<SignalMessage>,
}

impl SignalState {
    /// A state with no signal thread behind it, for driving the loop directly.
    pub fn detached() -> Self {
        let (signal_sender, signal_receiver) = std::sync::mpsc::channel();
        Self {
            running: Arc::new(AtomicBool::new(true)),
            signal_receiver,
            signal_sender,
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Apply a message received while sleeping.
    pub fn handle_message(&self, message: SignalMessage, debug_enabled: bool) {
        match message {
            SignalMessage::Shutdown => {
                self.running.store(false, Ordering::SeqCst);
            }
            SignalMessage::Reload => {
                if debug_enabled {
                    log_pipe!();
                    log_debug!("Woken early for an immediate tick");
                }
            }
        }
    }
}

/// Set up signal handling for the application.
///
/// Spawns a thread that forwards SIGINT/SIGTERM as shutdown requests and
/// SIGHUP/SIGUSR2 as reload requests.
pub fn setup_signal_handler(debug_enabled: bool) -> Result<SignalState> {
    let state = SignalState::detached();

    let mut signals = Signals::new([SIGINT, SIGTERM, SIGHUP, SIGUSR2])
        .context("failed to register signal handlers")?;

    let running = state.running.clone();
    let sender = state.signal_sender.clone();

    thread::spawn(move || {
        for sig in signals.forever() {
            match sig {
                SIGHUP | SIGUSR2 => {
                    log_pipe!();
                    log_info!("Received reload signal, running an immediate tick");
                    if sender.send(SignalMessage::Reload).is_err() {
                        break;
                    }
                }
                _ => {
                    log_pipe!();
                    if debug_enabled && sig == SIGINT {
                        log_info!("Received SIGINT (Ctrl+C), initiating graceful shutdown...");
                    } else {
                        log_info!("Received termination request, initiating graceful shutdown...");
                    }

                    running.store(false, Ordering::SeqCst);

                    if let Err(e) = sender.send(SignalMessage::Shutdown) {
                        log_warning!("Failed to send shutdown message: {e}");
                        break;
                    }
                }
            }
        }
    });

    Ok(state)
}
