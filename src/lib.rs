//! # Lightkeeper Library
//!
//! Internal library for the lightkeeper binary. It exists so the scheduler
//! internals can be tested, and to keep CLI dispatch (main.rs) apart from
//! application logic.
//!
//! ## Architecture
//!
//! - **Entry Point**: `Lightkeeper` builder wires production collaborators
//!   and runs the scheduler
//! - **Core Logic**: `core` holds the forbidden-window resolver, weather
//!   gate, light decision engine, device reconciler and the boundary
//!   scheduler loop
//! - **Collaborators**: `zmanim` (day times and the forbidden-day
//!   calendar), `device` (Kasa switches), `weather` (cloud coverage)
//! - **Configuration**: `config` for the per-tick config file, startup
//!   environment and hot-reload watcher
//! - **Commands**: `commands` for one-shot CLI subcommands
//! - **Infrastructure**: signal handling, the time source and logging

// Import macros from logger module for use in all submodules
#[macro_use]
pub mod common;

pub mod args;
pub mod commands;
pub mod config;
pub mod core;
pub mod device;
pub mod io;
pub mod lightkeeper;
pub mod time;
pub mod weather;
pub mod zmanim;

#[cfg(any(test, feature = "testing-support"))]
pub mod testing;

pub use lightkeeper::Lightkeeper;
