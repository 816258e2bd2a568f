use uuid::Uuid;

/// Opaque key identifying the claiming process.
///
/// Generated lazily on the first claim and reused for every claim made
/// through the owning dispatcher. It only has to be practically
/// non-colliding, not globally unique; a v4 UUID is plenty of entropy.
#[derive(Debug, Default)]
pub struct WorkerIdentity {
    key: Option<String>,
}

impl WorkerIdentity {
    pub fn new() -> Self {
        Self { key: None }
    }

    pub fn key(&mut self) -> &str {
        self.key.get_or_insert_with(generate_key)
    }

    /// Drop the cached key; the next call to `key()` generates a fresh one.
    pub fn clear_key(&mut self) {
        self.key = None;
    }
}

fn generate_key() -> String {
    Uuid::new_v4().simple().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_is_stable_until_cleared() {
        let mut identity = WorkerIdentity::new();
        let first = identity.key().to_string();
        assert_eq!(identity.key(), first);

        identity.clear_key();
        assert_ne!(identity.key(), first);
    }

    #[test]
    fn keys_are_distinct_across_instances() {
        let mut a = WorkerIdentity::new();
        let mut b = WorkerIdentity::new();
        assert_ne!(a.key(), b.key());
    }
}
