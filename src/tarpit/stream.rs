//! Slow-stream transport for tarpit pages.
//!
//! Grounded directly on `Xevion-xevion.dev`'s `tarpit.rs`
//! `create_fake_html_stream`: a `futures::stream::unfold` state machine that
//! sleeps a random delay, then emits one chunk, until the body is exhausted
//! or the bound on total bytes is hit. `axum::body::Body::from_stream`
//! already stops pulling the stream on client disconnect (its `Drop`), so no
//! extra cancellation plumbing is needed here — that satisfies the
//! "generator must stop within one chunk" requirement for free.

use bytes::Bytes;
use futures_util::stream::{self, Stream};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::time::Duration;

/// Bounds controlling chunking and pacing, sourced from `TarpitConfig`.
#[derive(Debug, Clone, Copy)]
pub struct StreamParams {
    pub chunk_bytes_min: usize,
    pub chunk_bytes_max: usize,
    pub delay_ms_min: u64,
    pub delay_ms_max: u64,
    pub page_max_bytes: usize,
}

struct StreamState {
    body: Bytes,
    offset: usize,
    rng: StdRng,
    params: StreamParams,
}

/// Wraps `body` (already truncated to at most `params.page_max_bytes`) in a
/// stream that emits it in randomly-sized chunks with a randomized
/// inter-chunk delay drawn from `[delay_ms_min, delay_ms_max]`.
pub fn slow_stream(body: Bytes, seed: u64, params: StreamParams) -> impl Stream<Item = anyhow::Result<Bytes>> {
    let truncated = if body.len() > params.page_max_bytes {
        body.slice(0..params.page_max_bytes)
    } else {
        body
    };

    let state = StreamState { body: truncated, offset: 0, rng: StdRng::seed_from_u64(seed), params };

    stream::unfold(state, |mut state| async move {
        if state.offset >= state.body.len() {
            return None;
        }

        let delay_ms = if state.params.delay_ms_min >= state.params.delay_ms_max {
            state.params.delay_ms_min
        } else {
            state.rng.gen_range(state.params.delay_ms_min..=state.params.delay_ms_max)
        };
        tokio::time::sleep(Duration::from_millis(delay_ms)).await;

        let remaining = state.body.len() - state.offset;
        let max_chunk = state.params.chunk_bytes_max.max(state.params.chunk_bytes_min).min(remaining);
        let min_chunk = state.params.chunk_bytes_min.min(max_chunk).max(1);
        let chunk_len = if min_chunk >= max_chunk {
            max_chunk
        } else {
            state.rng.gen_range(min_chunk..=max_chunk)
        };

        let chunk = state.body.slice(state.offset..state.offset + chunk_len);
        state.offset += chunk_len;
        Some((Ok(chunk), state))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::StreamExt;

    fn params() -> StreamParams {
        StreamParams { chunk_bytes_min: 4, chunk_bytes_max: 8, delay_ms_min: 0, delay_ms_max: 1, page_max_bytes: 1024 }
    }

    #[tokio::test]
    async fn stream_emits_full_body() {
        let body = Bytes::from_static(b"0123456789abcdef0123456789abcdef");
        let mut stream = Box::pin(slow_stream(body.clone(), 1, params()));
        let mut collected = Vec::new();
        while let Some(chunk) = stream.next().await {
            collected.extend_from_slice(&chunk.unwrap());
        }
        assert_eq!(Bytes::from(collected), body);
    }

    #[tokio::test]
    async fn stream_truncates_to_page_max_bytes() {
        let body = Bytes::from(vec![b'x'; 2000]);
        let small_params = StreamParams { page_max_bytes: 100, ..params() };
        let mut stream = Box::pin(slow_stream(body, 1, small_params));
        let mut total = 0;
        while let Some(chunk) = stream.next().await {
            total += chunk.unwrap().len();
        }
        assert!(total <= 100);
    }

    #[tokio::test]
    async fn dropping_the_stream_early_stops_further_chunks() {
        let body = Bytes::from(vec![b'x'; 1000]);
        let mut stream = Box::pin(slow_stream(body, 1, params()));
        let _first = stream.next().await;
        drop(stream);
        // Nothing to assert beyond "this doesn't hang or panic" — cancellation
        // is structural (the unfold future is simply never polled again).
    }

    #[tokio::test]
    async fn same_seed_produces_same_chunk_boundaries() {
        let body = Bytes::from(vec![b'x'; 500]);
        let lens_a: Vec<usize> =
            Box::pin(slow_stream(body.clone(), 99, params())).map(|c| c.unwrap().len()).collect().await;
        let lens_b: Vec<usize> =
            Box::pin(slow_stream(body.clone(), 99, params())).map(|c| c.unwrap().len()).collect().await;
        assert_eq!(lens_a, lens_b);
    }
}
