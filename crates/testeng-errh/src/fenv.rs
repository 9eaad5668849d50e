//! Modeled floating-point environment.
//!
//! Kernels under test report exceptions by calling [`raise`] and
//! [`set_errno`]; the harness installs a state before each call and
//! samples it afterwards. The environment is per thread.

use std::cell::Cell;

use crate::state::{Errno, ExceptionState, FeFlags};

thread_local! {
    static CURRENT: Cell<ExceptionState> = const { Cell::new(ExceptionState::CLEAR) };
}

/// Raises `flags` in addition to those already set.
pub fn raise(flags: FeFlags) {
    CURRENT.with(|cur| {
        let mut state = cur.get();
        state.flags |= flags;
        cur.set(state);
    });
}

pub fn set_errno(errno: Errno) {
    CURRENT.with(|cur| {
        let mut state = cur.get();
        state.errno = errno;
        cur.set(state);
    });
}

/// Replaces the whole state.
pub fn install(state: ExceptionState) {
    CURRENT.with(|cur| cur.set(state));
}

/// Current state.
pub fn sample() -> ExceptionState {
    CURRENT.with(Cell::get)
}

pub fn clear() {
    install(ExceptionState::CLEAR);
}
