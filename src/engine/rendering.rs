//! ### English
//! Rendering module entry point.
//! Splits the render-target contract and the surfman/glow implementation into submodules.
//!
//! ### 中文
//! 渲染模块入口。
//! 将渲染目标契约与基于 surfman/glow 的实现拆分到子模块。

mod gl_target;
mod target;

pub use gl_target::GlRenderTarget;
pub use target::{CameraOrientation, RenderTarget};
