/// ### English
/// Engine internal modules (worker thread, scheduling, rendering, frame handoff).
///
/// ### 中文
/// 引擎内部模块（工作线程、调度、渲染、帧交接等）。
pub mod config;
pub mod convert;
pub mod effect;
pub mod error;
pub mod frame;
pub mod lockfree;
pub mod preview;
pub mod rendering;
pub mod runtime;
pub mod scheduler;
