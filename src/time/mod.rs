//! Clock and sleep abstraction.

pub mod source;
