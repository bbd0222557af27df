//! ID generation utilities.

use ulid::Ulid;
use uuid::Uuid;

/// ID generator for tasks and tokens.
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

    /// Generate a new task ID.
    ///
    /// ULIDs are lexicographically sortable, so task IDs sort by
    /// enqueue time in Redis key scans.
    #[must_use]
    pub fn task_id(&self) -> String {
        Ulid::new().to_string().to_lowercase()
    }

    /// Generate a new token ID.
    ///
    /// UUID v4 carries no time component, so a token ID leaks nothing
    /// about when the session was opened.
    #[must_use]
    pub fn token_id(&self) -> Uuid {
        Uuid::new_v4()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_id_shape() {
        let id_gen = IdGenerator::new();
        let id1 = id_gen.task_id();
        let id2 = id_gen.task_id();

        assert_eq!(id1.len(), 26);
        assert_eq!(id2.len(), 26);
        assert_ne!(id1, id2);
    }

    #[test]
    fn test_token_id_uniqueness() {
        let id_gen = IdGenerator::new();
        assert_ne!(id_gen.token_id(), id_gen.token_id());
    }
}
