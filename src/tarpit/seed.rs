//! Deterministic seeding: `seed = H(system_seed ‖ canonicalize(path))`.
//!
//! Uses `blake3` (grounded on the pack's heavy use of `blake3` for
//! content-addressed hashing) truncated to a `u64` digest, then fed into
//! `rand::rngs::StdRng::seed_from_u64` for all subsequent per-page
//! randomness. The same `(system_seed, path)` pair always yields the same
//! seed — this is the stability contract the Tarpit Generator depends on.

/// Canonicalizes a request path for seeding purposes: strips a trailing
/// slash (except for the root `/`) and collapses repeated slashes, so
/// `/about/team`, `/about/team/`, and `/about//team` all seed identically.
pub fn canonicalize_path(path: &str) -> String {
    let collapsed: String = path.split('/').filter(|s| !s.is_empty()).collect::<Vec<_>>().join("/");
    format!("/{collapsed}")
}

/// Computes the 64-bit page seed for `(system_seed, path)`.
pub fn page_seed(system_seed: &str, path: &str) -> u64 {
    digest(system_seed, &canonicalize_path(path))
}

/// Computes a derived seed for the `i`-th outbound link slug on a page,
/// `slug_i = H(seed ‖ i) mod slug_space`.
pub fn link_slug(seed: u64, index: u32, slug_space: u64) -> u64 {
    let mut hasher = blake3::Hasher::new();
    hasher.update(&seed.to_le_bytes());
    hasher.update(&index.to_le_bytes());
    let bytes = hasher.finalize();
    u64::from_le_bytes(bytes.as_bytes()[0..8].try_into().unwrap()) % slug_space.max(1)
}

/// Computes the daily archive-pool reseed value, `H(system_seed ‖ date)`.
pub fn archive_pool_seed(system_seed: &str, date: &str) -> u64 {
    digest(system_seed, date)
}

fn digest(a: &str, b: &str) -> u64 {
    let mut hasher = blake3::Hasher::new();
    hasher.update(a.as_bytes());
    hasher.update(b"\u{1}");
    hasher.update(b.as_bytes());
    let bytes = hasher.finalize();
    u64::from_le_bytes(bytes.as_bytes()[0..8].try_into().unwrap())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_inputs_yield_same_seed() {
        assert_eq!(page_seed("seed-X", "/about/team"), page_seed("seed-X", "/about/team"));
    }

    #[test]
    fn different_paths_yield_different_seeds() {
        assert_ne!(page_seed("seed-X", "/about/team"), page_seed("seed-X", "/contact"));
    }

    #[test]
    fn different_system_seeds_yield_different_seeds() {
        assert_ne!(page_seed("seed-X", "/about/team"), page_seed("seed-Y", "/about/team"));
    }

    #[test]
    fn canonicalize_strips_trailing_slash_and_collapses_repeats() {
        assert_eq!(canonicalize_path("/about/team/"), "/about/team");
        assert_eq!(canonicalize_path("/about//team"), "/about/team");
        assert_eq!(canonicalize_path("/"), "/");
    }

    #[test]
    fn canonicalization_makes_equivalent_paths_seed_identically() {
        let a = page_seed("seed-X", "/about/team");
        let b = page_seed("seed-X", "/about/team/");
        let c = page_seed("seed-X", "/about//team");
        assert_eq!(a, b);
        assert_eq!(b, c);
    }

    #[test]
    fn link_slug_is_deterministic_and_bounded() {
        let seed = page_seed("seed-X", "/about/team");
        for i in 0..8 {
            let slug = link_slug(seed, i, 1_000_000);
            assert!(slug < 1_000_000);
            assert_eq!(slug, link_slug(seed, i, 1_000_000));
        }
    }

    #[test]
    fn link_slugs_vary_by_index() {
        let seed = page_seed("seed-X", "/about/team");
        let slugs: Vec<u64> = (0..8).map(|i| link_slug(seed, i, 1_000_000)).collect();
        assert!(slugs.windows(2).all(|w| w[0] != w[1]) || slugs.iter().collect::<std::collections::HashSet<_>>().len() > 1);
    }
}
