//! Zip honeypot decoys.
//!
//! `archive(archive_id)` returns a valid zip file whose entries are
//! themselves deterministically generated from the id. The whole pool
//! reseeds daily from `H(system_seed ‖ date)`; callers pass in `date`
//! explicitly (never read a clock inside this pure builder) so the same
//! `(seed, date)` pair always yields the same bytes.

use std::io::{Cursor, Write as _};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

use super::seed::link_slug;

#[derive(Debug, Clone, Copy)]
pub struct ArchiveParams {
    pub entry_count: u32,
    pub entry_size_min: usize,
    pub entry_size_max: usize,
}

/// Builds a zip archive in memory from `seed`. Deterministic: the same seed
/// and params always produce byte-identical zip entry contents (note: the
/// zip *container* may still differ byte-for-byte across the `zip` crate's
/// internal timestamps/ordering — the guarantee is over entry name/size/
/// content, which is what the spec's determinism contract is about).
pub fn build_archive(seed: u64, params: ArchiveParams) -> anyhow::Result<Vec<u8>> {
    let mut buf = Cursor::new(Vec::new());
    {
        let mut zip = ZipWriter::new(&mut buf);
        let options = SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated);

        for i in 0..params.entry_count {
            let entry_seed = link_slug(seed, i, u64::MAX);
            let mut rng = StdRng::seed_from_u64(entry_seed);
            let size = if params.entry_size_min >= params.entry_size_max {
                params.entry_size_min
            } else {
                rng.gen_range(params.entry_size_min..=params.entry_size_max)
            };

            zip.start_file(format!("decoy_{i:04}.dat"), options)?;
            let mut data = vec![0u8; size];
            rng.fill(&mut data[..]);
            zip.write_all(&data)?;
        }

        zip.finish()?;
    }
    Ok(buf.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> ArchiveParams {
        ArchiveParams { entry_count: 4, entry_size_min: 16, entry_size_max: 64 }
    }

    #[test]
    fn build_archive_produces_a_valid_zip() {
        let bytes = build_archive(42, params()).expect("archive should build");
        let reader = zip::ZipArchive::new(Cursor::new(bytes)).expect("should parse as zip");
        assert_eq!(reader.len(), 4);
    }

    #[test]
    fn same_seed_produces_same_entry_contents() {
        let a = build_archive(42, params()).unwrap();
        let b = build_archive(42, params()).unwrap();
        let mut za = zip::ZipArchive::new(Cursor::new(a)).unwrap();
        let mut zb = zip::ZipArchive::new(Cursor::new(b)).unwrap();
        for i in 0..za.len() {
            let mut fa = za.by_index(i).unwrap();
            let name = fa.name().to_string();
            let mut buf_a = Vec::new();
            std::io::Read::read_to_end(&mut fa, &mut buf_a).unwrap();
            drop(fa);

            let mut fb = zb.by_name(&name).unwrap();
            let mut buf_b = Vec::new();
            std::io::Read::read_to_end(&mut fb, &mut buf_b).unwrap();
            assert_eq!(buf_a, buf_b, "entry {name} content should be stable across builds");
        }
    }

    #[test]
    fn different_seeds_produce_different_archives() {
        let a = build_archive(1, params()).unwrap();
        let b = build_archive(2, params()).unwrap();
        assert_ne!(a, b);
    }
}
