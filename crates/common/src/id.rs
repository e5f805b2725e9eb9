//! ID generation utilities.

use std::sync::Mutex;

use ulid::Ulid;
use uuid::Uuid;

/// ID generator for entities.
#[derive(Debug, Clone, Default)]
pub struct IdGenerator {
    _private: (),
}

impl IdGenerator {
    /// Create a new ID generator.
    #[must_use]
    pub const fn new() -> Self {
        Self { _private: () }
    }

    /// Generate a new ULID-based ID.
    ///
    /// ULIDs are:
    /// - Lexicographically sortable
    /// - Monotonically increasing within the same millisecond
    /// - Shorter than UUIDs when represented as strings
    #[must_use]
    pub fn generate(&self) -> String {
        Ulid::new().to_string().to_lowercase()
    }

    /// Generate a cryptographically secure random token.
    #[must_use]
    pub fn generate_token(&self) -> String {
        // UUID v4 for tokens (no time component)
        Uuid::new_v4().simple().to_string()
    }
}

/// Strictly monotonic ID generator.
///
/// Commit-time ids must be strictly increasing and never reused so that
/// `max_id`-bounded page queries stay stable under concurrent writes.
/// Plain [`Ulid::new`] only guarantees ordering across milliseconds; this
/// generator serializes through [`ulid::Generator`] so two ids issued in
/// the same millisecond still order correctly.
pub struct MonotonicIdGenerator {
    inner: Mutex<ulid::Generator>,
}

impl std::fmt::Debug for MonotonicIdGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MonotonicIdGenerator").finish_non_exhaustive()
    }
}

impl Default for MonotonicIdGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl MonotonicIdGenerator {
    /// Create a new monotonic ID generator.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(ulid::Generator::new()),
        }
    }

    /// Generate the next id, strictly greater than every id issued before.
    #[must_use]
    pub fn generate(&self) -> String {
        let mut generator = match self.inner.lock() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        };
        loop {
            if let Ok(id) = generator.generate() {
                return id.to_string().to_lowercase();
            }
            // Random component overflowed within this millisecond; wait
            // for the next tick.
            std::thread::sleep(std::time::Duration::from_millis(1));
        }
    }
}
