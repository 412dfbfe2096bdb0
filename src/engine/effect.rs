//! ### English
//! Contracts of the external effect engine.
//!
//! The engine is split along the player's two calling conventions:
//!
//! - [`EffectEngine`] is the data-plane half. It is moved onto the worker thread at
//!   construction and only ever called from there (`&mut self`).
//! - [`EngineControl`] is the control-plane half. The player calls it synchronously on whatever
//!   thread invokes `pause`/`resume`/`enable_audio`/`call_js_method`, so implementations must
//!   be thread-safe. It has no ordering relationship with queued data-plane work.
//!
//! ### 中文
//! 外部特效引擎的接口契约。
//!
//! 引擎按播放器的两种调用约定拆分：
//!
//! - [`EffectEngine`] 为数据面。构造时被移动到工作线程，之后只在该线程调用（`&mut self`）。
//! - [`EngineControl`] 为控制面。播放器在调用 `pause`/`resume`/`enable_audio`/`call_js_method`
//!   的线程上同步调用它，因此实现必须线程安全。它与已排队的数据面任务之间没有顺序关系。

use std::sync::Arc;

use dpi::PhysicalSize;

use super::frame::Frame;

/// ### English
/// Data-plane side of the effect engine, owned by the worker thread.
///
/// ### 中文
/// 特效引擎的数据面，由工作线程持有。
pub trait EffectEngine: Send {
    /// ### English
    /// Called once on the worker thread after the render target is initialized.
    ///
    /// ### 中文
    /// 渲染目标初始化完成后，在工作线程上调用一次。
    fn surface_created(&mut self, size: PhysicalSize<u32>);

    /// ### English
    /// Hands one input frame to the engine.
    ///
    /// ### 中文
    /// 把一帧输入交给引擎。
    fn push_frame(&mut self, frame: Frame);

    /// ### English
    /// Draws into the currently bound framebuffer.
    ///
    /// A negative code means the frame is not complete yet and the caller must poll again.
    ///
    /// ### 中文
    /// 绘制到当前绑定的 framebuffer。
    ///
    /// 返回负值表示该帧尚未完成，调用方需要再次轮询。
    fn draw(&mut self) -> i64;

    /// ### English
    /// Returns the thread-safe control-plane handle for this engine.
    ///
    /// ### 中文
    /// 返回该引擎线程安全的控制面句柄。
    fn control(&self) -> Arc<dyn EngineControl>;
}

/// ### English
/// Control-plane side of the effect engine. Called from arbitrary threads.
///
/// ### 中文
/// 特效引擎的控制面。可在任意线程调用。
pub trait EngineControl: Send + Sync {
    fn playback_pause(&self);

    fn playback_play(&self);

    fn enable_audio(&self, enable: bool);

    /// ### English
    /// The effect manager, or `None` if the engine has not created one.
    ///
    /// ### 中文
    /// 特效管理器；若引擎尚未创建则为 `None`。
    fn effect_manager(&self) -> Option<Arc<dyn EffectManager>>;
}

/// ### English
/// Loads effects and exposes the active one.
///
/// ### 中文
/// 负责加载特效并暴露当前激活的特效。
pub trait EffectManager: Send + Sync {
    /// ### English
    /// Loads and activates the effect at `path`. An empty path deactivates the current effect.
    ///
    /// ### 中文
    /// 加载并激活 `path` 处的特效。空路径表示停用当前特效。
    fn load(&self, path: &str);

    fn current(&self) -> Option<Arc<dyn Effect>>;
}

/// ### English
/// An active effect with a scripting hook.
///
/// ### 中文
/// 带脚本钩子的已激活特效。
pub trait Effect: Send + Sync {
    /// ### English
    /// Calls `method` defined by the effect's script with `params` as a JSON string.
    ///
    /// ### 中文
    /// 以 JSON 字符串 `params` 作为参数调用特效脚本中定义的 `method`。
    fn call_js_method(&self, method: &str, params: &str);
}
