//! Shared fakes and randomized-testing scaffolding used by more than one of
//! Locksmith's crates.
//!
//! The `fakes` feature gates the in-memory collaborator implementations so
//! `locksmith-core`'s own test suite (and integration tests elsewhere) can
//! exercise the full interposition protocol without linking `libc` or
//! `backtrace`.

#![warn(missing_docs)]

#[cfg(feature = "fakes")]
pub mod fakes;

pub mod ops;

mod loom_model;
