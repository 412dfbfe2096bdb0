//! ### English
//! Worker thread: owns the render target, the engine data plane and the converter, and runs
//! every queued task with exclusive access to them.
//!
//! ### 中文
//! 工作线程：持有渲染目标、引擎数据面与格式转换器，并以独占方式执行所有排队任务。

use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::Bytes;
use crossbeam_channel as channel;
use tracing::{debug, error, warn};

use crate::engine::config::PlayerConfig;
use crate::engine::convert::PixelFormatConverter;
use crate::engine::effect::{EffectEngine, EngineControl};
use crate::engine::error::RenderTargetError;
use crate::engine::frame::{Frame, PixelFormat};
use crate::engine::lockfree::Backoff;
use crate::engine::rendering::{CameraOrientation, RenderTarget};
use crate::engine::scheduler::TaskScheduler;

use super::pixel_buffer::PixelBuffer;
use super::slots::{BufferId, SlotTable};

/// ### English
/// State shared between the player, its pixel buffers and the worker thread.
/// Never holds GPU or engine objects.
///
/// ### 中文
/// 播放器、其像素缓冲句柄与工作线程之间共享的状态。从不持有 GPU 或引擎对象。
pub(super) struct PlayerShared {
    pub(super) scheduler: TaskScheduler<WorkerState>,
    pub(super) slots: SlotTable,
}

impl PlayerShared {
    pub(super) fn new() -> Self {
        Self {
            scheduler: TaskScheduler::new(),
            slots: SlotTable::new(),
        }
    }
}

/// ### English
/// Components moved onto the worker thread at construction.
///
/// ### 中文
/// 构造时移动到工作线程的组件。
pub(super) struct WorkerParts {
    pub(super) engine: Box<dyn EffectEngine>,
    pub(super) render_target: Box<dyn RenderTarget>,
    pub(super) converter: Box<dyn PixelFormatConverter>,
    pub(super) control: Arc<dyn EngineControl>,
    pub(super) orientation: CameraOrientation,
    pub(super) flip_y: bool,
    pub(super) draw_timeout: Option<Duration>,
}

impl WorkerParts {
    pub(super) fn new(
        config: &PlayerConfig,
        engine: Box<dyn EffectEngine>,
        render_target: Box<dyn RenderTarget>,
        converter: Box<dyn PixelFormatConverter>,
        control: Arc<dyn EngineControl>,
    ) -> Self {
        Self {
            engine,
            render_target,
            converter,
            control,
            orientation: config.orientation,
            flip_y: config.flip_y,
            draw_timeout: config.draw_timeout,
        }
    }
}

/// ### English
/// Worker-owned state handed to every task as `&mut WorkerState`.
///
/// ### 中文
/// 由工作线程持有、以 `&mut WorkerState` 传给每个任务的状态。
pub(crate) struct WorkerState {
    shared: Arc<PlayerShared>,
    engine: Box<dyn EffectEngine>,
    render_target: Box<dyn RenderTarget>,
    converter: Box<dyn PixelFormatConverter>,
    control: Arc<dyn EngineControl>,
    orientation: CameraOrientation,
    flip_y: bool,
    draw_timeout: Option<Duration>,
}

/// ### English
/// Worker thread entry. Initializes the render target and the engine surface, reports the
/// result through `init_tx`, then runs tasks until the scheduler is cancelled.
///
/// ### 中文
/// 工作线程入口。初始化渲染目标与引擎 surface，通过 `init_tx` 报告结果，然后执行任务直到调度器
/// 被取消。
pub(super) fn run_worker(
    shared: Arc<PlayerShared>,
    parts: WorkerParts,
    init_tx: channel::Sender<Result<(), RenderTargetError>>,
) {
    let mut state = match WorkerState::init(shared.clone(), parts) {
        Ok(state) => state,
        Err(err) => {
            error!(%err, "render target initialization failed");
            let _ = init_tx.send(Err(err));
            return;
        }
    };
    let _ = init_tx.send(Ok(()));
    debug!("worker initialized");

    shared.scheduler.run_until_cancelled(&mut state);
    debug!("worker exiting");
}

impl WorkerState {
    fn init(shared: Arc<PlayerShared>, parts: WorkerParts) -> Result<Self, RenderTargetError> {
        let WorkerParts {
            mut engine,
            mut render_target,
            converter,
            control,
            orientation,
            flip_y,
            draw_timeout,
        } = parts;

        render_target.init()?;
        render_target.activate_context()?;
        engine.surface_created(render_target.size());

        Ok(Self {
            shared,
            engine,
            render_target,
            converter,
            control,
            orientation,
            flip_y,
            draw_timeout,
        })
    }

    /// ### English
    /// Draws one submitted frame into slot `id` and delivers it through `callback`.
    ///
    /// Any failure aborts the draw: the slot returns to idle and `callback` is dropped unrun.
    ///
    /// ### 中文
    /// 把一帧提交的图像绘制到槽 `id`，并通过 `callback` 交付。
    ///
    /// 任何失败都会中止本次绘制：槽回到空闲，`callback` 不会被调用。
    pub(super) fn render_frame(
        &mut self,
        id: BufferId,
        frame: Frame,
        callback: Box<dyn FnOnce(PixelBuffer) + Send>,
    ) {
        if let Err(err) = self.render_target.prepare_rendering() {
            error!(%err, "failed to prepare rendering; dropping frame");
            self.shared.slots.abort(id);
            return;
        }

        let size = frame.size();
        self.engine.push_frame(frame);
        if !self.wait_for_draw() {
            self.shared.slots.abort(id);
            return;
        }

        if let Err(err) = self
            .render_target
            .orient_image(self.orientation, self.flip_y)
        {
            error!(%err, "failed to orient image; dropping frame");
            self.shared.slots.abort(id);
            return;
        }

        if !self.shared.slots.lease(id) {
            debug!(generation = id.generation(), "slot was reclaimed before delivery");
            return;
        }
        let size = self.shared.slots.size(id.index()).unwrap_or(size);
        callback(PixelBuffer::new(id, size, self.shared.clone()));
    }

    /// ### English
    /// Polls `draw()` until the engine reports completion.
    ///
    /// Not interrupted by cancellation: a started draw always runs to completion. Returns `false`
    /// only when the opt-in `draw_timeout` elapses first.
    ///
    /// ### 中文
    /// 轮询 `draw()` 直到引擎报告完成。
    ///
    /// 不受取消影响：已开始的绘制总会完成。仅当配置的 `draw_timeout` 先到期时返回 `false`。
    fn wait_for_draw(&mut self) -> bool {
        let deadline = self.draw_timeout.map(|timeout| Instant::now() + timeout);
        let mut backoff = Backoff::new();
        loop {
            if self.engine.draw() >= 0 {
                return true;
            }
            if deadline.is_some_and(|deadline| Instant::now() >= deadline) {
                warn!(timeout = ?self.draw_timeout, "engine draw timed out; dropping frame");
                return false;
            }
            backoff.snooze();
        }
    }

    /// ### English
    /// Reads the latest output and converts it for handle `id`. Delivers `None` for a stale
    /// handle, a read-back failure or an unsupported conversion.
    ///
    /// ### 中文
    /// 为句柄 `id` 读回最新输出并转换。句柄过期、读回失败或不支持的转换都会交付 `None`。
    pub(super) fn read_pixels(
        &mut self,
        id: BufferId,
        format: PixelFormat,
        callback: Box<dyn FnOnce(Option<Frame>) + Send>,
    ) {
        let Some(acquired) = self.shared.slots.lock(id) else {
            debug!(generation = id.generation(), "pixel buffer is stale");
            callback(None);
            return;
        };

        let frame = self.read_frame(format);
        if acquired {
            self.shared.slots.unlock(id);
        }
        callback(frame);
    }

    fn read_frame(&mut self, format: PixelFormat) -> Option<Frame> {
        let pixels = match self.render_target.read_current_buffer() {
            Ok(pixels) => pixels,
            Err(err) => {
                error!(%err, "read-back failed");
                return None;
            }
        };
        let rgba = match Frame::rgba(self.render_target.size(), pixels) {
            Ok(frame) => frame,
            Err(err) => {
                error!(%err, "read-back returned a malformed buffer");
                return None;
            }
        };
        let converted = self.converter.convert(&rgba, format);
        if converted.is_none() {
            warn!(?format, "conversion is not supported");
        }
        converted
    }

    pub(super) fn read_current_buffer(&mut self, callback: Box<dyn FnOnce(Bytes) + Send>) {
        match self.render_target.read_current_buffer() {
            Ok(pixels) => callback(Bytes::from(pixels)),
            Err(err) => error!(%err, "read-back failed"),
        }
    }

    pub(super) fn load_effect(&mut self, path: &str) {
        match self.control.effect_manager() {
            Some(manager) => {
                debug!(path, "loading effect");
                manager.load(path);
            }
            None => error!(path, "effect manager is not initialized; cannot load effect"),
        }
    }
}
