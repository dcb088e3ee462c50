//! File watching for prompt config pickup.
//!
//! The scheduler re-reads the config on every tick anyway; the watcher only
//! shortens the wait. When the config file changes it sends
//! [`SignalMessage::Reload`], which wakes the main loop for an immediate
//! regular tick instead of waiting out the rest of the sleep interval.

use anyhow::{Context, Result};
use notify::{
    Config as NotifyConfig, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher,
};
use std::path::{Path, PathBuf};
use std::sync::mpsc::Sender;
use std::thread;
use std::time::Instant;

use crate::common::constants::WATCHER_DEBOUNCE;
use crate::io::signals::SignalMessage;

/// Configuration file watcher that triggers early ticks.
pub struct ConfigWatcher {
    signal_sender: Sender<SignalMessage>,
    debug_enabled: bool,
    config_path: PathBuf,
}

impl ConfigWatcher {
    pub fn new(config_path: &Path, signal_sender: Sender<SignalMessage>, debug_enabled: bool) -> Self {
        Self {
            signal_sender,
            debug_enabled,
            config_path: config_path.to_path_buf(),
        }
    }

    /// Spawn the watcher thread.
    ///
    /// The parent directory is watched rather than the file itself so that
    /// editors which replace the file on save are still noticed.
    pub fn start(self) -> Result<()> {
        let directory = match self.config_path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let file_name = self
            .config_path
            .file_name()
            .context("Config path has no file name")?
            .to_os_string();

        let (tx, rx) = std::sync::mpsc::channel();

        let mut watcher = RecommendedWatcher::new(
            move |res: Result<Event, notify::Error>| {
                if let Ok(event) = res
                    && matches!(
                        event.kind,
                        EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
                    )
                {
                    let _ = tx.send(event);
                }
            },
            NotifyConfig::default(),
        )
        .context("Failed to create file watcher")?;

        watcher
            .watch(&directory, RecursiveMode::NonRecursive)
            .with_context(|| format!("Failed to watch directory: {}", directory.display()))?;

        if self.debug_enabled {
            log_pipe!();
            log_debug!("Watching {} for changes", self.config_path.display());
        }

        let signal_sender = self.signal_sender;
        let debug_enabled = self.debug_enabled;

        thread::spawn(move || {
            // Keep the watcher alive for as long as the thread runs
            let _watcher = watcher;
            let mut last_reload: Option<Instant> = None;

            for event in rx {
                let affects_config = event
                    .paths
                    .iter()
                    .any(|path| path.file_name() == Some(file_name.as_os_str()));
                if !affects_config {
                    continue;
                }

                if last_reload.is_some_and(|at| at.elapsed() < WATCHER_DEBOUNCE) {
                    continue;
                }

                if debug_enabled {
                    log_pipe!();
                    log_debug!("Configuration file change detected");
                }

                if signal_sender.send(SignalMessage::Reload).is_err() {
                    // Main loop is gone
                    break;
                }
                last_reload = Some(Instant::now());
            }
        });

        Ok(())
    }
}

/// Start the configuration file watcher.
pub fn start_config_watcher(
    config_path: &Path,
    signal_sender: Sender<SignalMessage>,
    debug_enabled: bool,
) -> Result<()> {
    ConfigWatcher::new(config_path, signal_sender, debug_enabled).start()
}
