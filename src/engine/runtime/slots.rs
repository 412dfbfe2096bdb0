//! ### English
//! Owner-held slot table backing [`crate::PixelBuffer`] handles.
//!
//! A handle never points at GPU state; it carries a [`BufferId`] (`index` + `generation`) that
//! is checked against this table. Slot state machine:
//!
//! - `IDLE -> PENDING`: `reserve()` when a frame is submitted (generation advances).
//! - `PENDING -> LEASED`: `lease()` when the worker delivers the handle.
//! - `PENDING -> IDLE`: `abort()` when the draw is abandoned.
//! - `LEASED -> IDLE`: `release()` when the handle is dropped.
//!
//! ### 中文
//! 由播放器持有、支撑 [`crate::PixelBuffer`] 句柄的槽表。
//!
//! 句柄从不直接指向 GPU 状态；它携带 [`BufferId`]（`index` + `generation`），并与本表比对。
//! 槽状态机：
//!
//! - `IDLE -> PENDING`：提交帧时 `reserve()`（generation 递增）；
//! - `PENDING -> LEASED`：工作线程交付句柄时 `lease()`；
//! - `PENDING -> IDLE`：放弃绘制时 `abort()`；
//! - `LEASED -> IDLE`：句柄 drop 时 `release()`。

use std::sync::OnceLock;
use std::sync::atomic::{AtomicBool, AtomicU8, AtomicU64, Ordering};

use dpi::PhysicalSize;

/// ### English
/// Number of frame slots per player. One slot enforces at most one frame in flight.
///
/// ### 中文
/// 每个播放器的帧槽数量。单槽即保证最多一帧在途。
pub(crate) const FRAME_SLOT_COUNT: usize = 1;

const SLOT_IDLE: u8 = 0;
const SLOT_PENDING: u8 = 1;
const SLOT_LEASED: u8 = 2;

/// ### English
/// Identity of one delivered frame: slot index plus the generation it was reserved under.
///
/// ### 中文
/// 一次交付帧的标识：槽索引加上其被预留时的 generation。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BufferId {
    index: u32,
    generation: u64,
}

impl BufferId {
    #[inline]
    pub fn index(&self) -> u32 {
        self.index
    }

    #[inline]
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

struct SlotEntry {
    state: AtomicU8,
    generation: AtomicU64,
    locked: AtomicBool,
    /// ### English
    /// Recorded from the first frame reserved into this slot.
    ///
    /// ### 中文
    /// 由第一帧预留到该槽时记录。
    size: OnceLock<PhysicalSize<u32>>,
}

impl SlotEntry {
    fn new() -> Self {
        Self {
            state: AtomicU8::new(SLOT_IDLE),
            generation: AtomicU64::new(0),
            locked: AtomicBool::new(false),
            size: OnceLock::new(),
        }
    }
}

pub(crate) struct SlotTable {
    entries: [SlotEntry; FRAME_SLOT_COUNT],
}

impl SlotTable {
    pub(crate) fn new() -> Self {
        Self {
            entries: std::array::from_fn(|_| SlotEntry::new()),
        }
    }

    fn entry(&self, id: BufferId) -> Option<&SlotEntry> {
        let entry = self.entries.get(id.index as usize)?;
        (entry.generation.load(Ordering::Acquire) == id.generation).then_some(entry)
    }

    /// ### English
    /// Claims an idle slot for a frame of `size`. Returns `None` while every slot is pending or
    /// leased.
    ///
    /// ### 中文
    /// 为尺寸为 `size` 的帧占用一个空闲槽。所有槽都处于 pending 或 leased 时返回 `None`。
    pub(crate) fn reserve(&self, size: PhysicalSize<u32>) -> Option<BufferId> {
        for (index, entry) in self.entries.iter().enumerate() {
            if entry
                .state
                .compare_exchange(SLOT_IDLE, SLOT_PENDING, Ordering::AcqRel, Ordering::Acquire)
                .is_err()
            {
                continue;
            }
            entry.locked.store(false, Ordering::Release);
            let generation = entry.generation.fetch_add(1, Ordering::AcqRel) + 1;
            entry.size.get_or_init(|| size);
            return Some(BufferId {
                index: index as u32,
                generation,
            });
        }
        None
    }

    pub(crate) fn lease(&self, id: BufferId) -> bool {
        self.transition(id, SLOT_PENDING, SLOT_LEASED)
    }

    pub(crate) fn abort(&self, id: BufferId) -> bool {
        self.transition(id, SLOT_PENDING, SLOT_IDLE)
    }

    pub(crate) fn release(&self, id: BufferId) -> bool {
        let Some(entry) = self.entry(id) else {
            return false;
        };
        entry.locked.store(false, Ordering::Release);
        self.transition(id, SLOT_LEASED, SLOT_IDLE)
    }

    fn transition(&self, id: BufferId, from: u8, to: u8) -> bool {
        self.entry(id).is_some_and(|entry| {
            entry
                .state
                .compare_exchange(from, to, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
        })
    }

    /// ### English
    /// Whether `id` is the leased, not yet released frame of its slot.
    ///
    /// ### 中文
    /// `id` 是否为其槽中已交付且尚未释放的帧。
    pub(crate) fn is_current(&self, id: BufferId) -> bool {
        self.entry(id)
            .is_some_and(|entry| entry.state.load(Ordering::Acquire) == SLOT_LEASED)
    }

    /// ### English
    /// Raises the logical lock for a current handle.
    ///
    /// - `None`: the handle is stale.
    /// - `Some(true)`: this call acquired the lock.
    /// - `Some(false)`: the lock was already held.
    ///
    /// ### 中文
    /// 为当前有效的句柄加逻辑锁。
    ///
    /// - `None`：句柄已过期；
    /// - `Some(true)`：本次调用获得了锁；
    /// - `Some(false)`：锁此前已被持有。
    pub(crate) fn lock(&self, id: BufferId) -> Option<bool> {
        if !self.is_current(id) {
            return None;
        }
        let entry = self.entry(id)?;
        let acquired = !entry.locked.swap(true, Ordering::AcqRel);
        // A release may have slipped in between the check and the swap.
        if !self.is_current(id) {
            if acquired {
                entry.locked.store(false, Ordering::Release);
            }
            return None;
        }
        Some(acquired)
    }

    pub(crate) fn unlock(&self, id: BufferId) {
        if let Some(entry) = self.entry(id) {
            entry.locked.store(false, Ordering::Release);
        }
    }

    pub(crate) fn is_locked(&self, id: BufferId) -> bool {
        self.entry(id)
            .is_some_and(|entry| entry.locked.load(Ordering::Acquire))
    }

    pub(crate) fn size(&self, index: u32) -> Option<PhysicalSize<u32>> {
        self.entries.get(index as usize)?.size.get().copied()
    }
}
