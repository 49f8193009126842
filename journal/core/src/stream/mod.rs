//! Streaming Response Processing
//!
//! Pure, synchronous transformations from raw backend bytes to visible text.
//! Nothing in this module performs I/O, spawns tasks or takes locks; the
//! session layer drives it from whatever thread the transport delivers on.
//!
//! ```text
//! bytes ─▶ LineDemuxer ─▶ decode_frame ─▶ ThinkingFilter ─▶ PipelineEvent
//! ```

pub mod decoder;
pub mod demux;
pub mod filter;
pub mod pipeline;

pub use decoder::{decode_frame, StreamDelta, WireFormat};
pub use demux::LineDemuxer;
pub use filter::{FilterState, ThinkingFilter};
pub use pipeline::{PipelineEvent, PipelineStats, StreamPipeline};
