//! Tarpit Generator — synthesizes a deterministic fake website whose pages
//! are internally consistent, slow to download, link-rich, and cheap for
//! the defender.

pub mod archive;
mod error;
pub mod page;
pub mod seed;
pub mod stream;

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use futures_util::Stream;

pub use error::TarpitError;
use page::{PageDescriptor, PageParams};
use stream::StreamParams;

use crate::config::TarpitConfig;
use crate::markov::Backend as MarkovBackend;
use crate::store::Store;

/// Result of a `render` call: the HTML body paced as a byte stream, plus the
/// descriptor it was built from (useful for logging/testing).
pub struct RenderedPage {
    pub descriptor: PageDescriptor,
    pub stream: std::pin::Pin<Box<dyn Stream<Item = anyhow::Result<Bytes>> + Send>>,
}

pub struct Generator {
    system_seed: String,
    config: TarpitConfig,
    markov: Arc<MarkovBackend>,
    store: Arc<Store>,
}

impl Generator {
    pub fn new(system_seed: String, config: TarpitConfig, markov: Arc<MarkovBackend>, store: Arc<Store>) -> Self {
        Self { system_seed, config, markov, store }
    }

    fn page_params(&self) -> PageParams {
        PageParams {
            paragraph_count_min: self.config.paragraph_count_min,
            paragraph_count_max: self.config.paragraph_count_max,
            outbound_links: self.config.outbound_links_per_page,
            slug_space: self.config.slug_space,
        }
    }

    fn stream_params(&self) -> StreamParams {
        StreamParams {
            chunk_bytes_min: self.config.chunk_bytes_min,
            chunk_bytes_max: self.config.chunk_bytes_max,
            delay_ms_min: self.config.delay_ms_min,
            delay_ms_max: self.config.delay_ms_max,
            page_max_bytes: self.config.page_max_bytes,
        }
    }

    /// `render(path) → byte stream`. Bumps the IP's hop counter; if the new
    /// count exceeds `MAX_HOPS` the IP is also blocked, but the in-flight
    /// stream still finishes (the block takes effect on the *next* request).
    pub async fn render(&self, path: &str, ip: &str) -> RenderedPage {
        let page_seed = seed::page_seed(&self.system_seed, path);
        let descriptor = PageDescriptor::derive(page_seed, self.page_params());
        let prose = self.markov.generate(page_seed, descriptor.paragraph_count, self.config.words_per_paragraph);
        let html = render_html(&descriptor, &prose);

        self.account_hop(ip).await;

        let stream = Box::pin(stream::slow_stream(Bytes::from(html), page_seed, self.stream_params()));
        RenderedPage { descriptor, stream }
    }

    async fn account_hop(&self, ip: &str) {
        let hop_window = Duration::from_secs(self.config.hop_window_seconds);
        let count = match self.store.bump_hop(ip, hop_window).await {
            Ok(count) => count,
            Err(e) => {
                tracing::warn!(error = %e, ip, "hop accounting failed, continuing without a hop count");
                return;
            }
        };

        if count > self.config.max_hops as u64 {
            let block_ttl = Duration::from_secs(self.config.block_ttl_seconds);
            if let Err(e) = self.store.block(ip, block_ttl, "tarpit_hops").await {
                tracing::warn!(error = %e, ip, "failed to block IP after exceeding hop limit");
            }
            if self.config.clear_counters_on_scorer_block {
                let _ = self.store.clear_counters(ip).await;
            }
        }
    }

    /// `archive(archive_id) → byte stream`. `date` is supplied by the caller
    /// (e.g. `main.rs` computes it once from `Utc::now()`), keeping this
    /// function itself a pure seed → bytes mapping.
    pub fn archive(&self, archive_id: &str, date: &str) -> RenderedArchive {
        let pool_seed = seed::archive_pool_seed(&self.system_seed, date);
        let entry_seed = seed::link_slug(pool_seed, hash_archive_id(archive_id), u64::MAX);

        let params = archive::ArchiveParams { entry_count: 6, entry_size_min: 512, entry_size_max: 4096 };
        let bytes = archive::build_archive(entry_seed, params).unwrap_or_default();

        let stream = Box::pin(stream::slow_stream(Bytes::from(bytes), entry_seed, self.stream_params()));
        RenderedArchive { stream }
    }
}

pub struct RenderedArchive {
    pub stream: std::pin::Pin<Box<dyn Stream<Item = anyhow::Result<Bytes>> + Send>>,
}

fn hash_archive_id(archive_id: &str) -> u32 {
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    std::hash::Hash::hash(archive_id, &mut hasher);
    std::hash::Hasher::finish(&hasher) as u32
}

/// Renders the HTML document for a page descriptor. Pure function of its
/// arguments — no I/O, no clock reads.
fn render_html(descriptor: &PageDescriptor, prose: &str) -> String {
    let title = format!("Page {:016x}", descriptor.title_seed);
    let paragraphs: String =
        prose.split("\n\n").map(|p| format!("<p>{}</p>\n", escape_html(p))).collect();
    let links: String = descriptor
        .link_slugs
        .iter()
        .map(|slug| format!(r#"<a href="/p/{slug}">related-{slug}</a><br/>"#))
        .collect();

    format!(
        "<!DOCTYPE html>\n<html><head><title>{title}</title></head><body>\n\
         <h1>{title}</h1>\n{paragraphs}\n<nav>{links}</nav>\n\
         <a href=\"/archive/{archive_ref}\">download</a>\n</body></html>\n",
        archive_ref = descriptor.archive_ref,
    )
}

fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_html_is_pure() {
        let descriptor = PageDescriptor::derive(
            42,
            PageParams { paragraph_count_min: 2, paragraph_count_max: 2, outbound_links: 3, slug_space: 1000 },
        );
        let a = render_html(&descriptor, "Hello there.\n\nGeneral Kenobi.");
        let b = render_html(&descriptor, "Hello there.\n\nGeneral Kenobi.");
        assert_eq!(a, b);
        assert!(a.contains("related-"));
    }

    #[test]
    fn escape_html_neutralizes_angle_brackets() {
        assert_eq!(escape_html("<script>"), "&lt;script&gt;");
    }
}
