//! Short opaque identifiers for tree nodes.
//!
//! Ids are 11 characters drawn from `[a-z0-9]`. There is no registry:
//! uniqueness is probabilistic (36^11 ≈ 1.3e17 values per id).

use rand::Rng;

/// Opaque tree node identifier (the `x-uid` of a schema node).
pub type NodeId = String;

pub const ID_LEN: usize = 11;

const ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";

/// Generate a fresh node id.
pub fn new_id() -> NodeId {
    let mut rng = rand::thread_rng();
    (0..ID_LEN)
        .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char)
        .collect()
}

/// Whether `id` can address a node.
///
/// Stores may hold ids minted by other generators, so this accepts any
/// non-empty ASCII token of letters, digits, `-` and `_`, up to 64 chars.
pub fn is_well_formed(id: &str) -> bool {
    !id.is_empty()
        && id.len() <= 64
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_new_id_shape() {
        let id = new_id();
        assert_eq!(id.len(), ID_LEN);
        assert!(id
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit()));
        assert!(is_well_formed(&id));
    }

    #[test]
    fn test_new_id_no_collisions_in_batch() {
        let ids: HashSet<NodeId> = (0..10_000).map(|_| new_id()).collect();
        assert_eq!(ids.len(), 10_000);
    }

    #[test]
    fn test_well_formed() {
        assert!(is_well_formed("abc123xyz00"));
        assert!(is_well_formed("page_root-1"));
        assert!(!is_well_formed(""));
        assert!(!is_well_formed("a/b"));
        assert!(!is_well_formed("has space"));
        assert!(!is_well_formed(&"x".repeat(65)));
    }
}
