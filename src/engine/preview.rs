//! ### English
//! Preview output: a double-buffered frame relay and the render thread that consumes it.
//!
//! Processed frames are published from any thread; a single render thread draws only the
//! latest one, dropping frames while it is busy rather than queueing them.
//!
//! ### 中文
//! 预览输出：双缓冲帧中继以及消费它的渲染线程。
//!
//! 处理后的帧可由任意线程发布；唯一的渲染线程只绘制最新一帧，忙碌时丢帧而不是排队。

mod relay;
mod thread;

use dpi::PhysicalSize;

use super::frame::Frame;

pub use relay::{FrameConsumer, FrameProducer, frame_relay};
pub use thread::PreviewThread;

/// ### English
/// Draws frames onto a visible surface. Created and used on the preview thread only.
///
/// ### 中文
/// 把帧绘制到可见表面。只在预览线程上创建与使用。
pub trait PreviewRenderer {
    fn surface_changed(&mut self, size: PhysicalSize<u32>);

    fn draw(&mut self, frame: &Frame);

    /// ### English
    /// Presents what was drawn (buffer swap).
    ///
    /// ### 中文
    /// 呈现已绘制的内容（交换缓冲）。
    fn present(&mut self);
}
