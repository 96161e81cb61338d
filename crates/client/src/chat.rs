// crates/client/src/chat.rs
//! Chat streaming driver.
//!
//! Sends one message and folds the `text/event-stream` response into
//! the caller's transcript. Transport failure anywhere — connect,
//! mid-stream body read — produces the same generic failure entry as
//! a protocol-level `error` frame; the UI cannot tell them apart.

use futures_util::StreamExt;
use tracing::warn;

use repopulse_core::chat::{ChatEvent, TranscriptAssembler};
use repopulse_core::sse::SseFrameParser;

use crate::api::{ApiClient, ChatRequest};

/// Stream one chat exchange into `assembler`.
///
/// Infallible from the caller's perspective: every failure mode ends
/// up in the transcript. Dropping the returned future mid-stream
/// releases the response body reader.
pub async fn stream_chat(
    api: &ApiClient,
    request: &ChatRequest,
    assembler: &mut TranscriptAssembler,
) {
    let resp = match api.send_chat(request).await {
        Ok(resp) => resp,
        Err(e) => {
            warn!(error = %e, "chat request failed");
            assembler.fail();
            return;
        }
    };

    let mut parser = SseFrameParser::new();
    let mut body = resp.bytes_stream();

    while let Some(chunk) = body.next().await {
        match chunk {
            Ok(bytes) => apply_frames(parser.push(&bytes), assembler),
            Err(e) => {
                warn!(error = %e, "chat stream interrupted");
                assembler.fail();
                return;
            }
        }
    }

    // Stream ended: flush a partially-accumulated frame exactly once.
    apply_frames(parser.finish(), assembler);
}

fn apply_frames(frames: Vec<repopulse_core::sse::SseFrame>, assembler: &mut TranscriptAssembler) {
    for frame in frames {
        if let Some(event) = ChatEvent::decode(&frame) {
            assembler.apply(event);
        }
    }
}
