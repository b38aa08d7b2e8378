//! Utility functions for getting hashes
use std::hash::{DefaultHasher, Hash, Hasher};

/// Hash any hashable value with the (fixed key) default hasher
pub(crate) fn calculate_hash<T: Hash + ?Sized>(t: &T) -> u64 {
    let mut s = DefaultHasher::new();
    t.hash(&mut s);
    s.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equal_values_hash_equal() {
        assert_eq!(calculate_hash("A(s!1).B(a!1)"), calculate_hash("A(s!1).B(a!1)"));
        assert_ne!(calculate_hash("A(s)"), calculate_hash("B(s)"));
    }
}
