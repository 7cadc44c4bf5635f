//! Session driver for the `keyprobe` binary.
//!
//! The interactive entry point lives in `main.rs`; everything it does after
//! collecting input is driven through [`session`] so the flow can be exercised
//! headlessly with mock providers.

#![warn(missing_docs, clippy::pedantic)]

pub mod session;
