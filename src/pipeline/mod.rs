// Pipeline collaborators: the capture device, the publish sinks, and the
// factory the supervisor builds sessions through.

pub mod camera;
pub mod factory;
pub mod sink;

pub use camera::V4l2Capture;
pub use factory::{FfmpegFactory, PipelineFactory};
pub use sink::{metadata_path, replay_buffer, BufferFileSink, RtspPublisher};
