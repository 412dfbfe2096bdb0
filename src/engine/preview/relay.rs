//! ### English
//! Frame-typed wrapper over the latest-value slot.
//!
//! ### 中文
//! 基于最新值槽、以帧为元素的封装。

use crate::engine::frame::Frame;
use crate::engine::lockfree::{LatestReceiver, LatestSender, Publish, latest_slot};

use super::PreviewRenderer;

/// ### English
/// Creates a connected producer/consumer pair.
///
/// ### 中文
/// 创建一对相连的生产端/消费端。
pub fn frame_relay() -> (FrameProducer, FrameConsumer) {
    let (sender, receiver) = latest_slot();
    (FrameProducer { sender }, FrameConsumer { receiver })
}

/// ### English
/// Publishing side; cheap to clone, never blocks.
///
/// ### 中文
/// 发布端；clone 开销低，从不阻塞。
#[derive(Clone)]
pub struct FrameProducer {
    sender: LatestSender<Frame>,
}

impl FrameProducer {
    /// ### English
    /// Publishes `frame` and wakes the bound consumer thread.
    ///
    /// ### 中文
    /// 发布 `frame` 并唤醒已绑定的消费线程。
    pub fn update_data(&self, frame: Frame) -> Publish {
        self.sender.publish(frame)
    }

    pub fn is_pending(&self) -> bool {
        self.sender.is_pending()
    }
}

pub struct FrameConsumer {
    receiver: LatestReceiver<Frame>,
}

impl FrameConsumer {
    /// ### English
    /// Binds the calling thread so [`FrameProducer::update_data`] unparks it.
    ///
    /// ### 中文
    /// 绑定调用线程，使 [`FrameProducer::update_data`] 会 unpark 它。
    pub fn bind_current_thread(&self) -> bool {
        self.receiver.bind_current_thread()
    }

    pub fn has_pending(&self) -> bool {
        self.receiver.has_pending()
    }

    /// ### English
    /// Draws the pending frame, if any. Returns whether a frame was drawn.
    ///
    /// ### 中文
    /// 绘制挂起的帧（若有）。返回是否绘制了帧。
    pub fn draw(&mut self, renderer: &mut dyn PreviewRenderer) -> bool {
        self.receiver.consume(|frame| renderer.draw(frame)).is_some()
    }

    /// ### English
    /// Draws the last consumed frame again, e.g. after a resize.
    ///
    /// ### 中文
    /// 重新绘制最近一次消费的帧，例如在尺寸变化之后。
    pub fn redraw(&self, renderer: &mut dyn PreviewRenderer) -> bool {
        match self.receiver.show() {
            Some(frame) => {
                renderer.draw(frame);
                true
            }
            None => false,
        }
    }
}
