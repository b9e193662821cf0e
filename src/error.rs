//! Thread-local error codes, per section 7 of the spec.
//!
//! Every fallible operation in this crate documents which of these variants
//! it can set. Unlike the C interpreter this crate is modeled on, we return
//! `Result<T, PurcError>` from fallible functions instead of a sentinel plus
//! a side-channel error; the thread-local slot is kept anyway so the
//! "exception variant" machinery in the scheduler (section 7's propagation
//! policy) can recover the most recent error without threading it through
//! every call site.

use std::cell::Cell;
use thiserror::Error;

/// One of the non-exhaustive error kinds enumerated in spec section 7.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum PurcError {
    #[error("invalid value")]
    InvalidValue,
    #[error("out of memory")]
    OutOfMemory,
    #[error("entity does not exist")]
    NotExists,
    #[error("duplicated")]
    Duplicated,
    #[error("no such key")]
    NoSuchKey,
    #[error("wrong data type")]
    WrongDataType,
    #[error("value too long")]
    TooLong,
    #[error("too many values")]
    TooMany,
    #[error("a required argument is missing")]
    ArgumentMissed,
    #[error("division by zero")]
    DivByZero,
    #[error("numeric overflow")]
    Overflow,
    #[error("operation timed out")]
    Timeout,
    #[error("entity not found")]
    EntityNotFound,
    #[error("not the desired entity")]
    NotDesiredEntity,
    #[error("bad name")]
    BadName,
    #[error("internal failure")]
    InternalFailure,
    /// Distinguished control-flow code: the caller should retry. Used by the
    /// expression evaluator to record partial state and yield to the
    /// scheduler (spec section 7).
    #[error("try again")]
    Again,
}

pub type PurcResult<T> = Result<T, PurcError>;

thread_local! {
    static LAST_ERROR: Cell<Option<PurcError>> = Cell::new(None);
}

/// Sets the thread-local error code, mirroring `set_error` from the spec.
pub fn set_error(code: PurcError) {
    LAST_ERROR.with(|cell| cell.set(Some(code)));
}

/// Returns the last error code set on this thread, if any.
pub fn get_last_error() -> Option<PurcError> {
    LAST_ERROR.with(|cell| cell.get())
}

pub fn clear_error() {
    LAST_ERROR.with(|cell| cell.set(None));
}

/// Records `code` in the thread-local slot and returns it as an `Err`, so
/// call sites can write `return fail(PurcError::NoSuchKey)`.
pub fn fail<T>(code: PurcError) -> PurcResult<T> {
    set_error(code);
    Err(code)
}
