//! ### English
//! Error types surfaced by the player, the render target and frame construction.
//!
//! Asynchronous failures never travel through these types: they are logged and the
//! corresponding callback is simply not invoked. These errors cover the synchronous edges
//! (construction, submission, control-plane calls).
//!
//! ### 中文
//! 播放器、渲染目标以及帧构造相关的错误类型。
//!
//! 异步失败不会通过这些类型传递：只记录日志，且对应回调不会被调用。
//! 这里的错误只覆盖同步边界（构造、提交、控制面调用）。

use thiserror::Error;

use super::frame::PixelFormat;

/// ### English
/// Errors returned by [`crate::OffscreenEffectPlayer`].
///
/// ### 中文
/// [`crate::OffscreenEffectPlayer`] 返回的错误。
#[derive(Error, Debug)]
pub enum PlayerError {
    /// Rejected configuration (zero-sized surface, empty worker name, ...).
    #[error("Invalid player configuration: {0}")]
    InvalidConfig(String),

    /// The worker thread could not be spawned.
    #[error("Failed to spawn worker thread")]
    WorkerSpawn(#[source] std::io::Error),

    /// The render target failed to initialize on the worker thread.
    ///
    /// Fatal: construction is aborted.
    #[error("Render target initialization failed: {0}")]
    RenderTarget(#[from] RenderTargetError),

    /// The worker thread did not report initialization within `init_timeout`.
    #[error("Timed out initializing worker thread")]
    InitTimeout,

    /// The worker thread exited before reporting initialization.
    #[error("Worker thread exited during initialization")]
    WorkerExited,

    /// A previously delivered pixel buffer is still held, or a frame is still in flight.
    ///
    /// The submission is dropped and its callback is never invoked.
    #[error("Previous pixel buffer is still held; frame dropped")]
    ResourceBusy,

    /// The engine reports no effect manager.
    #[error("Effect manager is not initialized")]
    EffectManagerUnavailable,

    /// No effect is currently active.
    #[error("Effect is not loaded")]
    EffectNotLoaded,

    /// The player is shut down (or shutting down) and no longer accepts work.
    #[error("Player is shut down")]
    ShutDown,
}

/// ### English
/// Errors raised by a [`crate::RenderTarget`].
///
/// `ContextCreation` and `FunctionLoading` are fatal when returned from `init()`;
/// `IncompleteFramebuffer` only aborts the current draw.
///
/// ### 中文
/// [`crate::RenderTarget`] 产生的错误。
///
/// `init()` 返回 `ContextCreation` 与 `FunctionLoading` 时属于致命错误；
/// `IncompleteFramebuffer` 只会中止当前这一次绘制。
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RenderTargetError {
    #[error("Failed to create GL context: {0}")]
    ContextCreation(String),

    #[error("Failed to load GL function pointers: {0}")]
    FunctionLoading(String),

    #[error("Render target is not initialized")]
    NotInitialized,

    #[error("Failed to make complete framebuffer object (status {0:#x})")]
    IncompleteFramebuffer(u32),

    #[error("GL resource allocation failed: {0}")]
    Allocation(String),
}

/// ### English
/// Errors raised while constructing a [`crate::Frame`].
///
/// ### 中文
/// 构造 [`crate::Frame`] 时产生的错误。
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FrameError {
    #[error("Frame dimensions must be non-zero (got {width}x{height})")]
    EmptyDimensions { width: u32, height: u32 },

    #[error("{format:?} frames need {expected} planes, got {actual}")]
    PlaneCount {
        format: PixelFormat,
        expected: usize,
        actual: usize,
    },

    #[error("Plane {index} holds {actual} bytes, expected at least {expected}")]
    PlaneTooSmall {
        index: usize,
        expected: usize,
        actual: usize,
    },
}
