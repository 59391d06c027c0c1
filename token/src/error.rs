//! Failure categories shared by the ledger and the sale engine.

use std::fmt;

/// Coarse category of a rejected operation.
///
/// Lets a caller decide whether resubmitting can help: `State` failures may
/// clear with time, `Resource` failures need different amounts, while
/// `Authorization` and `Arithmetic` failures will not change on retry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Authorization,
    State,
    Arithmetic,
    Resource,
    Lock,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorKind::Authorization => "authorization",
            ErrorKind::State => "state",
            ErrorKind::Arithmetic => "arithmetic",
            ErrorKind::Resource => "resource",
            ErrorKind::Lock => "lock",
        };
        f.write_str(s)
    }
}
