//! ### English
//! Lock-free primitives shared across the engine.
//!
//! These utilities sit on the frame handoff hot paths (atomics, O(1) allocation reuse,
//! spin/yield/park backoff).
//!
//! ### 中文
//! 引擎内复用的无锁原语。
//!
//! 这些工具位于帧交接热路径上（原子操作、O(1) 分配复用、自旋/让出/park 退避）。
mod backoff;
mod latest;

pub(crate) use backoff::Backoff;
pub use latest::{LatestReceiver, LatestSender, Publish, latest_slot};
