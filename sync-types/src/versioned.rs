//! Versioned values - the atomic unit of conflict resolution.
//!
//! Every mergeable field carries the wall-clock time of its last write.
//! Merging two copies of a field keeps the newer write. There are no
//! vector clocks and no relay-assigned sequence numbers: convergence rests
//! entirely on these per-field timestamps.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// Milliseconds since the Unix epoch.
///
/// Timestamp zero marks a placeholder value that any real write overrides.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
#[serde(transparent)]
pub struct Timestamp(i64);

impl Timestamp {
    /// Create a Timestamp from milliseconds since the epoch.
    pub fn new(millis: i64) -> Self {
        Self(millis)
    }

    /// The placeholder timestamp.
    pub fn zero() -> Self {
        Self(0)
    }

    /// The current wall-clock time.
    pub fn now() -> Self {
        let millis = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_millis() as i64)
            .unwrap_or(0);
        Self(millis)
    }

    /// Milliseconds since the epoch.
    pub fn value(&self) -> i64 {
        self.0
    }

    /// The next millisecond.
    pub fn next(&self) -> Self {
        Self(self.0.saturating_add(1))
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Timestamp({})", self.0)
    }
}

/// A value paired with the time it was last written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Versioned<T> {
    /// The current value.
    pub content: T,
    /// When `content` was written.
    pub timestamp: Timestamp,
}

impl<T> Versioned<T> {
    /// Pair a value with a timestamp.
    pub fn new(content: T, timestamp: Timestamp) -> Self {
        Self { content, timestamp }
    }

    /// A placeholder value at timestamp zero.
    pub fn placeholder(content: T) -> Self {
        Self::new(content, Timestamp::zero())
    }
}

impl<T: PartialEq> Versioned<T> {
    /// Record a local write if `content` differs from the held value.
    ///
    /// The new timestamp is `now`, bumped past the held timestamp when the
    /// clock has gone backwards, so successive local writes never decrease.
    /// Returns whether the value changed.
    pub fn set(&mut self, content: T, now: Timestamp) -> bool {
        if self.content == content {
            return false;
        }
        self.timestamp = now.max(self.timestamp.next());
        self.content = content;
        true
    }
}

impl<T: PartialEq + Serialize> Versioned<T> {
    /// Merge another copy of this field into `self`.
    ///
    /// The newer timestamp wins. On an exact tie, identical contents are a
    /// no-op and differing contents are ordered by their JSON encoding, the
    /// greater one winning. That makes merge a max over a total order:
    /// idempotent, commutative and associative.
    ///
    /// Returns whether `self` changed.
    pub fn merge(&mut self, incoming: &Versioned<T>) -> bool
    where
        T: Clone,
    {
        let take = match self.timestamp.cmp(&incoming.timestamp) {
            Ordering::Greater => false,
            Ordering::Less => true,
            Ordering::Equal => {
                self.content != incoming.content
                    && tie_key(&incoming.content) > tie_key(&self.content)
            }
        };
        if take {
            *self = incoming.clone();
        }
        take
    }
}

fn tie_key<T: Serialize>(content: &T) -> Vec<u8> {
    serde_json::to_vec(content).unwrap_or_default()
}
