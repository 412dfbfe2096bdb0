//! ### English
//! Handle to one delivered frame.
//!
//! The handle only knows its [`BufferId`] and the player's shared control block. Every read goes
//! through the worker thread, which checks the id against the slot table first. A player that
//! is gone never runs the read and never calls back.
//!
//! ### 中文
//! 单次交付帧的句柄。
//!
//! 句柄只知道自己的 [`BufferId`] 与播放器的共享控制块。每次读取都经由工作线程执行，并先与槽表
//! 比对 id。已销毁的播放器不会执行读取，也不会回调。

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel as channel;
use dpi::PhysicalSize;
use tracing::{debug, warn};

use crate::engine::frame::{Frame, PixelFormat};

use super::slots::BufferId;
use super::worker::PlayerShared;

/// ### English
/// The processed output of one `process_image_async` call.
///
/// At most one handle is outstanding per player; dropping it frees the player for the next
/// frame.
///
/// ### 中文
/// 一次 `process_image_async` 调用的处理结果。
///
/// 每个播放器最多同时存在一个句柄；drop 后播放器才能接收下一帧。
pub struct PixelBuffer {
    id: BufferId,
    size: PhysicalSize<u32>,
    shared: Arc<PlayerShared>,
}

impl PixelBuffer {
    pub(super) fn new(id: BufferId, size: PhysicalSize<u32>, shared: Arc<PlayerShared>) -> Self {
        Self { id, size, shared }
    }

    #[inline]
    pub fn id(&self) -> BufferId {
        self.id
    }

    /// ### English
    /// Size of the frame this handle was created for.
    ///
    /// ### 中文
    /// 该句柄对应帧的尺寸。
    #[inline]
    pub fn size(&self) -> PhysicalSize<u32> {
        self.size
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.size.width
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.size.height
    }

    /// ### English
    /// Whether the player is alive and this handle still refers to its slot's current frame.
    ///
    /// ### 中文
    /// 播放器是否存活，且该句柄仍指向其槽中的当前帧。
    pub fn is_valid(&self) -> bool {
        !self.shared.scheduler.is_cancelled() && self.shared.slots.is_current(self.id)
    }

    /// ### English
    /// Locks the render target texture so the worker will not start a new draw over it.
    /// Returns `false` for a stale handle.
    ///
    /// ### 中文
    /// 锁定渲染目标纹理，使工作线程不会在其上开始新的绘制。句柄过期时返回 `false`。
    pub fn lock(&self) -> bool {
        if self.shared.scheduler.is_cancelled() {
            return false;
        }
        self.shared.slots.lock(self.id).is_some()
    }

    pub fn unlock(&self) {
        self.shared.slots.unlock(self.id);
    }

    pub fn is_locked(&self) -> bool {
        self.shared.slots.is_locked(self.id)
    }

    /// ### English
    /// Reads the frame back as RGBA on the worker thread and calls `callback` there.
    ///
    /// `callback` receives `None` if the handle was superseded before the read ran. It is never
    /// called if the player is destroyed first.
    ///
    /// ### 中文
    /// 在工作线程上以 RGBA 读回该帧，并在该线程调用 `callback`。
    ///
    /// 若读取执行前句柄已被取代，`callback` 收到 `None`；若播放器先被销毁则永不调用。
    pub fn get_rgba(&self, callback: impl FnOnce(Option<Frame>) + Send + 'static) {
        self.request(PixelFormat::Rgba, Box::new(callback));
    }

    /// ### English
    /// Like [`PixelBuffer::get_rgba`] but converts to NV12 first.
    ///
    /// ### 中文
    /// 与 [`PixelBuffer::get_rgba`] 相同，但先转换为 NV12。
    pub fn get_nv12(&self, callback: impl FnOnce(Option<Frame>) + Send + 'static) {
        self.request(PixelFormat::Nv12, Box::new(callback));
    }

    pub fn get_rgba_blocking(&self, timeout: Duration) -> Option<Frame> {
        self.request_blocking(PixelFormat::Rgba, timeout)
    }

    pub fn get_nv12_blocking(&self, timeout: Duration) -> Option<Frame> {
        self.request_blocking(PixelFormat::Nv12, timeout)
    }

    fn request(&self, format: PixelFormat, callback: Box<dyn FnOnce(Option<Frame>) + Send>) {
        let id = self.id;
        if !self
            .shared
            .scheduler
            .spawn(move |state| state.read_pixels(id, format, callback))
        {
            debug!(?format, "player is shut down; read-back dropped");
        }
    }

    /// ### English
    /// Waits up to `timeout` for the worker to deliver. Refused on the worker thread itself,
    /// where waiting would deadlock.
    ///
    /// ### 中文
    /// 最多等待 `timeout` 让工作线程交付结果。在工作线程自身上调用会被拒绝（否则会死锁）。
    fn request_blocking(&self, format: PixelFormat, timeout: Duration) -> Option<Frame> {
        if self.shared.scheduler.is_worker_thread() {
            warn!(?format, "blocking read-back requested on the worker thread");
            return None;
        }
        let (tx, rx) = channel::bounded(1);
        self.request(
            format,
            Box::new(move |frame| {
                let _ = tx.send(frame);
            }),
        );
        rx.recv_timeout(timeout).ok().flatten()
    }
}

impl fmt::Debug for PixelBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PixelBuffer")
            .field("id", &self.id)
            .field("size", &self.size)
            .finish_non_exhaustive()
    }
}

impl Drop for PixelBuffer {
    /// ### English
    /// Unlocks and hands the slot back to the player.
    ///
    /// ### 中文
    /// 解锁并把槽归还给播放器。
    fn drop(&mut self) {
        self.shared.slots.release(self.id);
    }
}
