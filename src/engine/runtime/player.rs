//! ### English
//! Offscreen effect player: spawns and owns the worker thread, and exposes the thread-safe API.
//!
//! ### 中文
//! 离屏特效播放器：创建并持有工作线程，对外提供线程安全的 API。

use std::fmt;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use bytes::Bytes;
use crossbeam_channel::{self as channel, RecvTimeoutError};
use dpi::PhysicalSize;
use tracing::{debug, error, warn};

use crate::engine::config::PlayerConfig;
use crate::engine::convert::{Bt601Converter, PixelFormatConverter};
use crate::engine::effect::{EffectEngine, EngineControl};
use crate::engine::error::PlayerError;
use crate::engine::frame::Frame;
use crate::engine::rendering::{GlRenderTarget, RenderTarget};

use super::pixel_buffer::PixelBuffer;
use super::worker::{self, PlayerShared, WorkerParts};

/// ### English
/// Components a player is built from. Every component is moved onto the worker thread.
///
/// ### 中文
/// 构建播放器所需的组件。所有组件都会被移动到工作线程。
pub struct PlayerInit {
    pub config: PlayerConfig,
    pub engine: Box<dyn EffectEngine>,
    pub render_target: Box<dyn RenderTarget>,
    pub converter: Box<dyn PixelFormatConverter>,
}

/// ### English
/// Headless effect player with a dedicated GPU worker thread.
///
/// All methods may be called from any thread. Data-plane calls (`process_image_async`,
/// `load_effect`, `read_current_buffer`) are queued onto the worker in FIFO order; control-plane
/// calls (`pause`, `resume`, `enable_audio`, `call_js_method`) run immediately on the caller's
/// thread.
///
/// ### 中文
/// 带独立 GPU 工作线程的无窗口特效播放器。
///
/// 所有方法都可在任意线程调用。数据面调用（`process_image_async`、`load_effect`、
/// `read_current_buffer`）按 FIFO 顺序排队到工作线程；控制面调用（`pause`、`resume`、
/// `enable_audio`、`call_js_method`）则在调用线程上立即执行。
pub struct OffscreenEffectPlayer {
    config: PlayerConfig,
    shared: Arc<PlayerShared>,
    control: Arc<dyn EngineControl>,
    /// ### English
    /// Join handle for the worker thread (taken on shutdown).
    ///
    /// ### 中文
    /// 工作线程的 join handle（关闭时取走）。
    thread: Option<thread::JoinHandle<()>>,
}

impl OffscreenEffectPlayer {
    /// ### English
    /// Spawns the worker thread and blocks until it reports initialization (or
    /// `config.init_timeout` elapses).
    ///
    /// ### 中文
    /// 创建工作线程，并阻塞等待其报告初始化结果（或等待 `config.init_timeout` 到期）。
    pub fn new(init: PlayerInit) -> Result<Self, PlayerError> {
        let PlayerInit {
            config,
            engine,
            render_target,
            converter,
        } = init;
        config.validate()?;

        let control = engine.control();
        let shared = Arc::new(PlayerShared::new());
        let parts = WorkerParts::new(&config, engine, render_target, converter, control.clone());

        let (init_tx, init_rx) = channel::bounded(1);
        let shared_for_thread = shared.clone();
        let thread = thread::Builder::new()
            .name(config.worker_name.clone())
            .spawn(move || worker::run_worker(shared_for_thread, parts, init_tx))
            .map_err(PlayerError::WorkerSpawn)?;

        match init_rx.recv_timeout(config.init_timeout) {
            Ok(Ok(())) => {
                debug!(name = %config.worker_name, "player started");
                Ok(Self {
                    config,
                    shared,
                    control,
                    thread: Some(thread),
                })
            }
            Ok(Err(err)) => {
                let _ = thread.join();
                Err(PlayerError::RenderTarget(err))
            }
            Err(RecvTimeoutError::Timeout) => {
                // The worker may still be stuck inside the driver; it exits on its own once
                // initialization returns.
                shared.scheduler.cancel();
                thread.thread().unpark();
                warn!(timeout = ?config.init_timeout, "worker initialization timed out");
                Err(PlayerError::InitTimeout)
            }
            Err(RecvTimeoutError::Disconnected) => {
                let _ = thread.join();
                Err(PlayerError::WorkerExited)
            }
        }
    }

    /// ### English
    /// Builds a player with the default [`GlRenderTarget`] sized to `config.size` and the
    /// default [`Bt601Converter`].
    ///
    /// ### 中文
    /// 使用默认的 [`GlRenderTarget`]（尺寸为 `config.size`）与默认的 [`Bt601Converter`]
    /// 构建播放器。
    pub fn create(config: PlayerConfig, engine: Box<dyn EffectEngine>) -> Result<Self, PlayerError> {
        let render_target = Box::new(GlRenderTarget::new(config.size));
        Self::new(PlayerInit {
            config,
            engine,
            render_target,
            converter: Box::new(Bt601Converter),
        })
    }

    /// ### English
    /// Submits `frame` for processing. `callback` runs on the worker thread with the result.
    ///
    /// Fails with [`PlayerError::ResourceBusy`] while a previous frame is still pending or its
    /// [`PixelBuffer`] is still held. In that case nothing is queued and `callback` is dropped.
    ///
    /// ### 中文
    /// 提交 `frame` 进行处理。`callback` 在工作线程上以结果调用。
    ///
    /// 当上一帧仍在处理或其 [`PixelBuffer`] 仍被持有时，返回 [`PlayerError::ResourceBusy`]；
    /// 此时不会排队任何任务，`callback` 被直接丢弃。
    pub fn process_image_async(
        &self,
        frame: Frame,
        callback: impl FnOnce(PixelBuffer) + Send + 'static,
    ) -> Result<(), PlayerError> {
        if self.shared.scheduler.is_cancelled() {
            return Err(PlayerError::ShutDown);
        }

        let Some(id) = self.shared.slots.reserve(frame.size()) else {
            warn!("previous frame is still in use; dropping frame");
            return Err(PlayerError::ResourceBusy);
        };

        let callback: Box<dyn FnOnce(PixelBuffer) + Send> = Box::new(callback);
        if self
            .shared
            .scheduler
            .spawn(move |state| state.render_frame(id, frame, callback))
        {
            Ok(())
        } else {
            self.shared.slots.abort(id);
            Err(PlayerError::ShutDown)
        }
    }

    /// ### English
    /// Queues loading of the effect at `path`. An empty path deactivates the current effect.
    ///
    /// ### 中文
    /// 排队加载 `path` 处的特效。空路径表示停用当前特效。
    pub fn load_effect(&self, path: impl Into<String>) -> Result<(), PlayerError> {
        let path = path.into();
        self.spawn(move |state| state.load_effect(&path))
    }

    pub fn unload_effect(&self) -> Result<(), PlayerError> {
        self.load_effect(String::new())
    }

    pub fn pause(&self) {
        self.control.playback_pause();
    }

    pub fn resume(&self) {
        self.control.playback_play();
    }

    pub fn enable_audio(&self, enable: bool) {
        self.control.enable_audio(enable);
    }

    /// ### English
    /// Calls a script method of the active effect on the caller's thread.
    ///
    /// ### 中文
    /// 在调用线程上调用当前激活特效的脚本方法。
    pub fn call_js_method(&self, method: &str, params: &str) -> Result<(), PlayerError> {
        let Some(manager) = self.control.effect_manager() else {
            error!(method, "effect manager is not initialized");
            return Err(PlayerError::EffectManagerUnavailable);
        };
        let Some(effect) = manager.current() else {
            error!(method, "no effect is loaded");
            return Err(PlayerError::EffectNotLoaded);
        };
        effect.call_js_method(method, params);
        Ok(())
    }

    /// ### English
    /// Queues a raw RGBA read-back of the latest output. `callback` runs on the worker thread and
    /// is skipped if the read-back fails or the player is destroyed first.
    ///
    /// ### 中文
    /// 排队读回最新输出的原始 RGBA。`callback` 在工作线程上执行；若读回失败或播放器先被销毁，
    /// 则不会调用。
    pub fn read_current_buffer(
        &self,
        callback: impl FnOnce(Bytes) + Send + 'static,
    ) -> Result<(), PlayerError> {
        let callback: Box<dyn FnOnce(Bytes) + Send> = Box::new(callback);
        self.spawn(move |state| state.read_current_buffer(callback))
    }

    pub fn read_current_buffer_blocking(&self, timeout: Duration) -> Option<Bytes> {
        if self.shared.scheduler.is_worker_thread() {
            warn!("blocking read-back requested on the worker thread");
            return None;
        }
        let (tx, rx) = channel::bounded(1);
        self.read_current_buffer(move |pixels| {
            let _ = tx.send(pixels);
        })
        .ok()?;
        rx.recv_timeout(timeout).ok()
    }

    #[inline]
    pub fn size(&self) -> PhysicalSize<u32> {
        self.config.size
    }

    #[inline]
    pub fn config(&self) -> &PlayerConfig {
        &self.config
    }

    pub fn is_shut_down(&self) -> bool {
        self.shared.scheduler.is_cancelled()
    }

    /// ### English
    /// Cancels the worker and joins it. The running task finishes; queued tasks never run.
    /// Idempotent.
    ///
    /// ### 中文
    /// 取消工作线程并 join。正在执行的任务会完成；排队任务永不执行。可重复调用。
    pub fn shutdown(&mut self) {
        self.shared.scheduler.cancel();
        let Some(thread) = self.thread.take() else {
            return;
        };

        if thread.thread().id() == thread::current().id() {
            debug!("player dropped on its own worker thread; skipping join");
            return;
        }
        thread.thread().unpark();
        if thread.join().is_err() {
            error!("worker thread panicked");
        }
    }

    fn spawn(
        &self,
        task: impl FnOnce(&mut worker::WorkerState) + Send + 'static,
    ) -> Result<(), PlayerError> {
        if self.shared.scheduler.spawn(task) {
            Ok(())
        } else {
            Err(PlayerError::ShutDown)
        }
    }
}

impl fmt::Debug for OffscreenEffectPlayer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OffscreenEffectPlayer")
            .field("config", &self.config)
            .field("shut_down", &self.is_shut_down())
            .finish_non_exhaustive()
    }
}

impl Drop for OffscreenEffectPlayer {
    fn drop(&mut self) {
        self.shutdown();
    }
}
