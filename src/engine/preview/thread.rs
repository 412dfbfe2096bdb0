//! ### English
//! Dedicated preview render thread.
//!
//! The renderer is built on the thread itself so any context it creates stays current there.
//! The loop parks while there is neither a new frame nor a resize.
//!
//! ### 中文
//! 独立的预览渲染线程。
//!
//! 渲染器在该线程内部构建，使其创建的上下文始终在该线程 current。
//! 既没有新帧也没有尺寸变化时，循环会 park。

use std::fmt;
use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

use dpi::PhysicalSize;
use tracing::{debug, error};

use crate::engine::frame::Frame;
use crate::engine::lockfree::{LatestReceiver, LatestSender, Publish, latest_slot};

use super::PreviewRenderer;
use super::relay::{FrameConsumer, FrameProducer, frame_relay};

/// ### English
/// Owns the preview render thread. Dropping it stops and joins the thread.
///
/// ### 中文
/// 持有预览渲染线程。drop 时停止并 join 该线程。
pub struct PreviewThread {
    frames: FrameProducer,
    resize: LatestSender<PhysicalSize<u32>>,
    cancelled: Arc<AtomicBool>,
    thread: Option<thread::JoinHandle<()>>,
}

impl PreviewThread {
    /// ### English
    /// Spawns the thread, builds the renderer there with `make_renderer(size)` and reports
    /// `size` to it once.
    ///
    /// ### 中文
    /// 创建线程，在其中以 `make_renderer(size)` 构建渲染器，并先向其报告一次 `size`。
    pub fn spawn<R, F>(size: PhysicalSize<u32>, make_renderer: F) -> io::Result<Self>
    where
        R: PreviewRenderer,
        F: FnOnce(PhysicalSize<u32>) -> R + Send + 'static,
    {
        let (frames, consumer) = frame_relay();
        let (resize, resize_rx) = latest_slot();
        let cancelled = Arc::new(AtomicBool::new(false));
        let cancelled_for_thread = cancelled.clone();

        let thread = thread::Builder::new()
            .name("preview-render".to_string())
            .spawn(move || {
                let mut renderer = make_renderer(size);
                renderer.surface_changed(size);
                run_preview_loop(&mut renderer, consumer, resize_rx, &cancelled_for_thread);
            })?;

        Ok(Self {
            frames,
            resize,
            cancelled,
            thread: Some(thread),
        })
    }

    pub fn update_data(&self, frame: Frame) -> Publish {
        self.frames.update_data(frame)
    }

    /// ### English
    /// Reports a new surface size. Coalesced: only the latest size is applied.
    ///
    /// ### 中文
    /// 报告新的表面尺寸。会被合并：只应用最新的尺寸。
    pub fn surface_changed(&self, size: PhysicalSize<u32>) -> Publish {
        self.resize.publish(size)
    }

    /// ### English
    /// A producer handle for publishing from other threads (for example a player callback).
    ///
    /// ### 中文
    /// 用于从其他线程发布的生产端句柄（例如播放器回调）。
    pub fn producer(&self) -> FrameProducer {
        self.frames.clone()
    }
}

fn run_preview_loop(
    renderer: &mut dyn PreviewRenderer,
    mut frames: FrameConsumer,
    mut resize: LatestReceiver<PhysicalSize<u32>>,
    cancelled: &AtomicBool,
) {
    frames.bind_current_thread();
    resize.bind_current_thread();

    while !cancelled.load(Ordering::Acquire) {
        let resized = resize
            .consume(|size| renderer.surface_changed(*size))
            .is_some();

        let drew = frames.draw(renderer) || (resized && frames.redraw(renderer));
        if drew {
            renderer.present();
        }

        if cancelled.load(Ordering::Acquire) {
            break;
        }
        if !frames.has_pending() && !resize.has_pending() {
            thread::park();
        }
    }
    debug!("preview thread exiting");
}

impl fmt::Debug for PreviewThread {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PreviewThread")
            .field("cancelled", &self.cancelled.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

impl Drop for PreviewThread {
    fn drop(&mut self) {
        self.cancelled.store(true, Ordering::Release);
        if let Some(thread) = self.thread.take() {
            thread.thread().unpark();
            if thread.join().is_err() {
                error!("preview thread panicked");
            }
        }
    }
}
