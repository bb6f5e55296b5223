//! Stream consumption: a pure reducer over decoded frames plus an async driver.
//!
//! [`StreamAccumulator::apply`] folds one frame into the running text and is
//! tested by feeding synthetic frame sequences. [`consume`] drives a live
//! [`FrameStream`], invoking the progress sink after every frame that added
//! visible text.

use crate::error::UpstreamError;
use crate::provider::wire::WireResponse;
use crate::provider::{FrameStream, StreamFrame};
use crate::types::{join_visible, ContentPart};
use futures::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::debug;

pub mod sse;

/// Decode one frame payload into content parts.
pub fn parse_frame(payload: &str) -> Result<Vec<ContentPart>, serde_json::Error> {
    let response: WireResponse = serde_json::from_str(payload)?;
    Ok(response.into_parts().0)
}

/// Effect of applying one frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameEffect {
    /// Visible text was appended
    Appended,
    /// Nothing visible: malformed payload, reasoning only, or empty
    Skipped,
    /// End-of-stream sentinel
    End,
}

/// Running text of one streamed attempt
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StreamAccumulator {
    text: String,
    chunks: Vec<String>,
    skipped: usize,
}

impl StreamAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn apply(&mut self, frame: &StreamFrame) -> FrameEffect {
        let payload = match frame {
            StreamFrame::End => return FrameEffect::End,
            StreamFrame::Data(payload) => payload,
        };
        let parts = match parse_frame(payload) {
            Ok(parts) => parts,
            Err(err) => {
                debug!(error = %err, "Skipping malformed stream frame");
                self.skipped += 1;
                return FrameEffect::Skipped;
            }
        };
        let chunk = join_visible(&parts);
        if chunk.is_empty() {
            return FrameEffect::Skipped;
        }
        self.text.push_str(&chunk);
        self.chunks.push(chunk);
        FrameEffect::Appended
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn chunks(&self) -> &[String] {
        &self.chunks
    }

    /// Frames dropped because their payload did not parse
    pub fn skipped(&self) -> usize {
        self.skipped
    }

    pub fn into_parts(self) -> (String, Vec<String>) {
        (self.text, self.chunks)
    }
}

/// Why a stream stopped before its end
#[derive(Debug, Clone, PartialEq)]
pub enum StreamInterrupted {
    Upstream(UpstreamError),
    Cancelled,
}

/// Read `frames` to the end, calling `sink` with the accumulated text after
/// each frame that added visible text. The sink is never called once `cancel`
/// has fired.
pub async fn consume<S>(
    mut frames: FrameStream,
    sink: &mut S,
    cancel: &CancellationToken,
) -> Result<StreamAccumulator, StreamInterrupted>
where
    S: FnMut(&str) + ?Sized,
{
    let mut acc = StreamAccumulator::new();
    loop {
        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(StreamInterrupted::Cancelled),
            next = frames.next() => next,
        };
        let frame = match next {
            None => break,
            Some(Ok(frame)) => frame,
            Some(Err(err)) => return Err(StreamInterrupted::Upstream(err)),
        };
        match acc.apply(&frame) {
            FrameEffect::End => break,
            FrameEffect::Skipped => {}
            FrameEffect::Appended => {
                if cancel.is_cancelled() {
                    return Err(StreamInterrupted::Cancelled);
                }
                sink(acc.text());
            }
        }
    }
    Ok(acc)
}
