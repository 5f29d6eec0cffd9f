//! Change cursors
//!
//! A cursor is either a wall-clock time (milliseconds since epoch) or a
//! monotonic sequence id. The two are never compared with each other.
//! A negative value means "no prior cursor" (first synchronization).

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Which cursor representation (and finder entry point) a poll uses
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CursorMode {
    Time,
    Sequence,
}

impl CursorMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            CursorMode::Time => "time",
            CursorMode::Sequence => "sequence",
        }
    }
}

/// Opaque progress marker
///
/// # Examples
///
/// ```rust
/// use drivesync_core::domain::{ChangeCursor, CursorMode};
///
/// let first = ChangeCursor::initial(CursorMode::Sequence);
/// assert!(first.is_initial());
/// assert!(ChangeCursor::Sequence(12) > ChangeCursor::Sequence(3));
/// assert_eq!(ChangeCursor::Time(5).partial_cmp(&ChangeCursor::Sequence(5)), None);
/// ```
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", content = "value", rename_all = "camelCase")]
pub enum ChangeCursor {
    /// Milliseconds since epoch
    Time(i64),
    /// Change log sequence id
    Sequence(i64),
}

impl ChangeCursor {
    /// Raw value meaning "no prior cursor"
    pub const NONE: i64 = -1;

    /// Cursor for a client that never synchronized
    pub fn initial(mode: CursorMode) -> Self {
        Self::of(mode, Self::NONE)
    }

    pub fn of(mode: CursorMode, value: i64) -> Self {
        match mode {
            CursorMode::Time => ChangeCursor::Time(value),
            CursorMode::Sequence => ChangeCursor::Sequence(value),
        }
    }

    pub fn mode(&self) -> CursorMode {
        match self {
            ChangeCursor::Time(_) => CursorMode::Time,
            ChangeCursor::Sequence(_) => CursorMode::Sequence,
        }
    }

    pub fn value(&self) -> i64 {
        match self {
            ChangeCursor::Time(v) | ChangeCursor::Sequence(v) => *v,
        }
    }

    /// Negative values carry no prior state
    pub fn is_initial(&self) -> bool {
        self.value() < 0
    }

    /// Lower bound usable for a scan, if any
    pub fn lower_bound(&self) -> Option<i64> {
        (!self.is_initial()).then_some(self.value())
    }
}

impl PartialOrd for ChangeCursor {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (ChangeCursor::Time(a), ChangeCursor::Time(b))
            | (ChangeCursor::Sequence(a), ChangeCursor::Sequence(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }
}

impl fmt::Display for ChangeCursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChangeCursor::Time(v) => write!(f, "time:{}", v),
            ChangeCursor::Sequence(v) => write!(f, "seq:{}", v),
        }
    }
}
