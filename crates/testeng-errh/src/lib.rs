//! Floating-point exception and errno verification.
//!
//! Verification logic works on explicit [`ExceptionState`] values; the
//! [`fenv`] module is the thread-local channel through which kernels under
//! test report their exceptions.

#![deny(unsafe_code)]

pub mod error;
pub mod fenv;
pub mod reference;
pub mod state;
pub mod verifier;

pub use error::ErrhError;
pub use reference::{ErrhKind, GLOBAL_SENTINEL, Position, RefState, read_enable_directive};
pub use state::{Errno, ExceptionState, FeFlags};
pub use verifier::{ErrhMismatch, ErrhOptions, ErrhStatus, ErrhVerifier, Expected, Indicator};
