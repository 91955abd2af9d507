//! `PageDescriptor` — the pure-function realization of the "Tarpit Page
//! Descriptor is a pure function of (system_seed, path)" invariant.
//!
//! Deliberately free of any I/O or `Serialize` derive: it exists only to be
//! called twice with the same seed and compared, which is exactly what the
//! unit tests below do.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::seed::link_slug;

/// Derived, seed-pure description of one synthetic tarpit page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageDescriptor {
    pub seed: u64,
    pub title_seed: u64,
    pub paragraph_count: u32,
    pub link_slugs: Vec<u64>,
    pub archive_ref: u64,
}

/// Parameters that shape page generation; all come from `TarpitConfig`.
#[derive(Debug, Clone, Copy)]
pub struct PageParams {
    pub paragraph_count_min: u32,
    pub paragraph_count_max: u32,
    pub outbound_links: u32,
    pub slug_space: u64,
}

impl PageDescriptor {
    /// Derives a page descriptor from `seed` and `params`. Pure: the same
    /// `(seed, params)` pair always produces byte-identical output.
    pub fn derive(seed: u64, params: PageParams) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);

        let title_seed = rng.gen::<u64>();
        let lo = params.paragraph_count_min.min(params.paragraph_count_max);
        let hi = params.paragraph_count_max.max(params.paragraph_count_min);
        let paragraph_count = if lo == hi { lo } else { rng.gen_range(lo..=hi) };

        let link_slugs =
            (0..params.outbound_links).map(|i| link_slug(seed, i, params.slug_space)).collect();

        let archive_ref = rng.gen::<u64>() % params.slug_space.max(1);

        Self { seed, title_seed, paragraph_count, link_slugs, archive_ref }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> PageParams {
        PageParams { paragraph_count_min: 3, paragraph_count_max: 12, outbound_links: 8, slug_space: 1_000_000 }
    }

    #[test]
    fn derive_is_byte_stable_across_calls() {
        let a = PageDescriptor::derive(42, params());
        let b = PageDescriptor::derive(42, params());
        assert_eq!(a, b);
    }

    #[test]
    fn different_seeds_produce_different_descriptors() {
        let a = PageDescriptor::derive(1, params());
        let b = PageDescriptor::derive(2, params());
        assert_ne!(a, b);
    }

    #[test]
    fn paragraph_count_is_within_configured_bounds() {
        for seed in 0..50u64 {
            let d = PageDescriptor::derive(seed, params());
            assert!(d.paragraph_count >= 3 && d.paragraph_count <= 12);
        }
    }

    #[test]
    fn link_slug_count_matches_outbound_links_param() {
        let d = PageDescriptor::derive(7, params());
        assert_eq!(d.link_slugs.len(), 8);
    }

    #[test]
    fn equal_min_max_paragraph_bounds_do_not_panic() {
        let p = PageParams { paragraph_count_min: 5, paragraph_count_max: 5, ..params() };
        let d = PageDescriptor::derive(1, p);
        assert_eq!(d.paragraph_count, 5);
    }
}
