//! Stream Pipeline
//!
//! Wires the demultiplexer, the frame decoder and the thinking filter into a
//! single byte-in, events-out transformation. The pipeline is synchronous and
//! owns no I/O; the session feeds it whatever the transport delivers.

use super::decoder::{decode_frame, StreamDelta};
use super::demux::LineDemuxer;
use super::filter::{FilterState, ThinkingFilter};

/// Output of the pipeline
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PipelineEvent {
    /// Newly visible text (an increment, not the accumulated total)
    Visible(String),
    /// The stream ended; nothing follows
    Finished,
}

/// Counters for one stream
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PipelineStats {
    /// Chunks received from the transport
    pub chunks: u64,
    /// Frames handed to the decoder
    pub frames: u64,
    /// Frames skipped because they could not be decoded
    pub skipped: u64,
    /// Content deltas handed to the filter
    pub content_deltas: u64,
}

/// Demux → decode → filter
#[derive(Debug, Default)]
pub struct StreamPipeline {
    demux: LineDemuxer,
    filter: ThinkingFilter,
    finished: bool,
    stats: PipelineStats,
}

impl StreamPipeline {
    /// Create a pipeline for a new stream
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Process a raw chunk from the transport
    ///
    /// Chunks arriving after the stream ended (terminal sentinel or done
    /// flag) are ignored.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<PipelineEvent> {
        let mut events = Vec::new();
        if self.finished {
            return events;
        }

        self.stats.chunks += 1;
        for frame in self.demux.push(chunk) {
            self.process_frame(&frame, &mut events);
            if self.finished {
                break;
            }
        }
        events
    }

    /// The transport finished without an explicit end signal
    ///
    /// Decodes the leftover fragment as a final frame, then flushes the
    /// filter. Calling it again, or after the stream already ended, yields
    /// nothing.
    pub fn end_of_stream(&mut self) -> Vec<PipelineEvent> {
        let mut events = Vec::new();
        if self.finished {
            return events;
        }

        if let Some(frame) = self.demux.finish() {
            self.process_frame(&frame, &mut events);
        }
        if !self.finished {
            self.finish_into(&mut events);
        }
        events
    }

    /// Whether the stream has ended
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Counters so far
    #[must_use]
    pub fn stats(&self) -> PipelineStats {
        self.stats
    }

    /// Current filter state
    #[must_use]
    pub fn filter_state(&self) -> &FilterState {
        self.filter.state()
    }

    /// Tag of the thinking block that was removed, if any
    #[must_use]
    pub fn suppressed_tag(&self) -> Option<&str> {
        self.filter.suppressed_tag()
    }

    fn process_frame(&mut self, frame: &str, events: &mut Vec<PipelineEvent>) {
        self.stats.frames += 1;

        let deltas = match decode_frame(frame) {
            Ok(deltas) => deltas,
            Err(e) => {
                self.stats.skipped += 1;
                tracing::trace!(error = %e, frame_len = frame.len(), "Skipping undecodable frame");
                return;
            }
        };

        for delta in deltas {
            match delta {
                StreamDelta::Content(text) => {
                    self.stats.content_deltas += 1;
                    if let Some(visible) = self.filter.push(&text) {
                        events.push(PipelineEvent::Visible(visible));
                    }
                }
                StreamDelta::Done | StreamDelta::Terminal => {
                    self.finish_into(events);
                    return;
                }
            }
        }
    }

    fn finish_into(&mut self, events: &mut Vec<PipelineEvent>) {
        self.finished = true;
        if let Some(visible) = self.filter.finish() {
            events.push(PipelineEvent::Visible(visible));
        }
        events.push(PipelineEvent::Finished);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn visible(text: &str) -> PipelineEvent {
        PipelineEvent::Visible(text.to_string())
    }

    fn sse(content: &str) -> String {
        format!(
            "data: {}\n\n",
            serde_json::json!({ "choices": [{ "delta": { "content": content } }] })
        )
    }

    #[test]
    fn test_sse_stream() {
        let mut pipeline = StreamPipeline::new();
        let mut events = pipeline.push(sse("Hello").as_bytes());
        events.extend(pipeline.push(sse(" world").as_bytes()));
        events.extend(pipeline.push(b"data: [DONE]\n\n"));

        assert_eq!(
            events,
            vec![visible("Hello"), visible(" world"), PipelineEvent::Finished]
        );
        assert!(pipeline.is_finished());
    }

    #[test]
    fn test_local_stream_with_done() {
        let mut pipeline = StreamPipeline::new();
        let events = pipeline.push(
            b"{\"message\":{\"content\":\"Hi\"},\"done\":false}\n\
              {\"message\":{\"content\":\"\"},\"done\":true}\n",
        );
        assert_eq!(events, vec![visible("Hi"), PipelineEvent::Finished]);
    }

    #[test]
    fn test_frame_split_across_chunks() {
        let frame = sse("split");
        let (a, b) = frame.as_bytes().split_at(12);

        let mut pipeline = StreamPipeline::new();
        assert!(pipeline.push(a).is_empty());
        assert_eq!(pipeline.push(b), vec![visible("split")]);
    }

    #[test]
    fn test_malformed_frame_skipped() {
        let mut pipeline = StreamPipeline::new();
        let mut input = sse("a");
        input.push_str("not-json\n");
        input.push_str(&sse("b"));

        let events = pipeline.push(input.as_bytes());
        assert_eq!(events, vec![visible("a"), visible("b")]);
        assert_eq!(pipeline.stats().skipped, 1);
        assert_eq!(pipeline.stats().content_deltas, 2);
    }

    #[test]
    fn test_thinking_block_across_frames() {
        let mut pipeline = StreamPipeline::new();
        let mut events = Vec::new();
        for piece in ["<thi", "nk>analyzing", "...</think>", "\n\nHello there"] {
            events.extend(pipeline.push(sse(piece).as_bytes()));
        }
        events.extend(pipeline.push(b"data: [DONE]\n"));

        assert_eq!(events, vec![visible("Hello there"), PipelineEvent::Finished]);
        assert_eq!(pipeline.suppressed_tag(), Some("think"));
    }

    #[test]
    fn test_terminal_flushes_unterminated_block() {
        let mut pipeline = StreamPipeline::new();
        let mut events = pipeline.push(sse("<think> kept ").as_bytes());
        events.extend(pipeline.push(b"data: [DONE]\n"));
        assert_eq!(events, vec![visible("kept"), PipelineEvent::Finished]);
    }

    #[test]
    fn test_frames_after_terminal_ignored() {
        let mut pipeline = StreamPipeline::new();
        let mut input = String::from("data: [DONE]\n");
        input.push_str(&sse("late"));

        assert_eq!(pipeline.push(input.as_bytes()), vec![PipelineEvent::Finished]);
        assert!(pipeline.push(sse("later").as_bytes()).is_empty());
        assert!(pipeline.end_of_stream().is_empty());
    }

    #[test]
    fn test_end_of_stream_decodes_leftover() {
        let mut pipeline = StreamPipeline::new();
        assert!(pipeline
            .push(b"{\"message\":{\"content\":\"tail\"}}")
            .is_empty());

        let events = pipeline.end_of_stream();
        assert_eq!(events, vec![visible("tail"), PipelineEvent::Finished]);
        assert!(pipeline.end_of_stream().is_empty());
    }

    #[test]
    fn test_end_of_stream_without_content() {
        let mut pipeline = StreamPipeline::new();
        assert_eq!(pipeline.end_of_stream(), vec![PipelineEvent::Finished]);
    }

    #[test]
    fn test_stats() {
        let mut pipeline = StreamPipeline::new();
        pipeline.push(sse("x").as_bytes());
        pipeline.push(b"data: [DONE]\n");

        let stats = pipeline.stats();
        assert_eq!(stats.chunks, 2);
        // content line, blank separator, sentinel
        assert_eq!(stats.frames, 3);
        assert_eq!(stats.skipped, 0);
        assert_eq!(stats.content_deltas, 1);
    }
}
