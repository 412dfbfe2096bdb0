//! ### English
//! Spin-then-yield-then-park backoff for waits whose end is signalled only by polling.
//!
//! - Spin briefly to cover short gaps (an engine draw that completes on the next poll).
//! - Yield after the spin budget.
//! - Park with a bounded, growing timeout after the yield budget, so a stalled wait stops
//!   burning a core while still re-polling.
//!
//! ### 中文
//! 适用于“只能靠轮询得知结束”的等待：短自旋 + 让出调度 + park 退避。
//!
//! - 先短暂自旋，覆盖很短的间隙（例如下一次轮询就完成的引擎绘制）；
//! - 超过自旋预算后让出调度；
//! - 超过让出预算后以有上限、逐步增长的超时 park，避免卡住时空转占满 CPU，同时仍会继续轮询。

use std::thread;
use std::time::Duration;

const SPIN_LIMIT: u32 = 64;

const YIELD_LIMIT: u32 = SPIN_LIMIT + 64;

/// ### English
/// Upper bound for a single park step.
///
/// ### 中文
/// 单次 park 的时长上限。
const MAX_PARK: Duration = Duration::from_millis(2);

/// ### English
/// Spin/yield/park backoff state.
///
/// ### 中文
/// 自旋/让出/park 的退避状态。
pub(crate) struct Backoff {
    steps: u32,
}

impl Backoff {
    #[inline]
    pub(crate) fn new() -> Self {
        Self { steps: 0 }
    }

    /// ### English
    /// Performs one backoff step.
    ///
    /// ### 中文
    /// 执行一次退避步骤。
    #[inline]
    pub(crate) fn snooze(&mut self) {
        if self.steps < SPIN_LIMIT {
            std::hint::spin_loop();
        } else if self.steps < YIELD_LIMIT {
            thread::yield_now();
        } else {
            thread::park_timeout(self.park_duration());
        }
        self.steps = self.steps.saturating_add(1);
    }

    /// ### English
    /// Park duration for the current step: doubles from 16µs up to [`MAX_PARK`].
    ///
    /// ### 中文
    /// 当前步骤的 park 时长：从 16µs 开始翻倍，直到 [`MAX_PARK`]。
    fn park_duration(&self) -> Duration {
        let exp = (self.steps - YIELD_LIMIT).min(7);
        Duration::from_micros(16u64 << exp).min(MAX_PARK)
    }
}
