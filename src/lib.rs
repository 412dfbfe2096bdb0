/// ### English
/// `offscreen_effect_player` crate root.
/// The public API is re-exported here; the implementation lives under `engine`.
///
/// ### 中文
/// `offscreen_effect_player` 的 crate 根。
/// 公开 API 在此重新导出；具体实现位于 `engine` 模块。
mod engine;

pub use engine::config::{PlayerConfig, PlayerConfigBuilder};
pub use engine::convert::{Bt601Converter, PixelFormatConverter};
pub use engine::effect::{Effect, EffectEngine, EffectManager, EngineControl};
pub use engine::error::{FrameError, PlayerError, RenderTargetError};
pub use engine::frame::{Frame, PixelFormat};
pub use engine::lockfree::{LatestReceiver, LatestSender, Publish, latest_slot};
pub use engine::preview::{FrameConsumer, FrameProducer, PreviewRenderer, PreviewThread, frame_relay};
pub use engine::rendering::{CameraOrientation, GlRenderTarget, RenderTarget};
pub use engine::runtime::{BufferId, OffscreenEffectPlayer, PixelBuffer, PlayerInit};
pub use engine::scheduler::{Task, TaskScheduler};
