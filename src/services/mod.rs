//! 业务能力层
//!
//! 每个服务只提供单一能力，不关心调度流程。

pub mod block_detector;
pub mod extractor;
pub mod results_writer;
pub mod throttle;

pub use block_detector::{BlockDetector, BlockSignal};
pub use extractor::{Extractor, ExtractorPolicy, FrameWalkTimeouts};
pub use results_writer::ResultsWriter;
pub use throttle::{BackoffGate, Pacer};
