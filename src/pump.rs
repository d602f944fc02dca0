mod frame_pump;
mod source;

pub use frame_pump::{FramePump, PumpCommand, PumpEvent, PumpOptions, Published};
pub use source::{FrameSource, ImageSequenceSource, ReplaySource, SourceKind};
