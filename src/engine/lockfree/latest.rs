//! ### English
//! Latest-value single-slot channel with an explicit drop-on-backpressure rule.
//!
//! This is not a queue: at most one value waits in the `update` slot, and a newer value
//! replaces an older one that has not been consumed yet. The consumer owns a second `show` slot
//! holding the value it is currently (or last) working on.
//!
//! Drop rule: when a value is already pending (`need_swap`) **and** the consumer is in the
//! middle of using its `show` value (`using_frame`), an incoming value is dropped and the
//! pending one is kept. Memory stays bounded to two live values plus one recycled node.
//!
//! ### 中文
//! 带显式“背压丢弃”规则的最新值单槽 channel。
//!
//! 它不是队列：`update` 槽最多只等待一个值，新值会替换尚未被消费的旧值。消费者持有第二个
//! `show` 槽，存放其正在（或最近）处理的值。
//!
//! 丢弃规则：当已有值待交换（`need_swap`）**且**消费者正在使用 `show` 值（`using_frame`）时，
//! 新到达的值会被丢弃，保留已挂起的值。内存上限为两个存活值加一个复用节点。

use std::marker::PhantomData;
use std::ptr;
use std::sync::atomic::{AtomicBool, AtomicPtr, Ordering};
use std::sync::{Arc, OnceLock};
use std::thread;

/// ### English
/// Outcome of [`LatestSender::publish`].
///
/// ### 中文
/// [`LatestSender::publish`] 的结果。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Publish {
    /// ### English
    /// Stored into an empty `update` slot.
    ///
    /// ### 中文
    /// 写入了空的 `update` 槽。
    Stored,
    /// ### English
    /// Replaced a pending value that the consumer never saw.
    ///
    /// ### 中文
    /// 替换了消费者尚未看到的挂起值。
    Replaced,
    /// ### English
    /// Dropped: a value was pending and the consumer was busy.
    ///
    /// ### 中文
    /// 被丢弃：已有挂起值且消费者正忙。
    Dropped,
}

struct Shared<T> {
    update: AtomicPtr<T>,
    /// ### English
    /// Single recycled node so steady-state publishing does not allocate.
    ///
    /// ### 中文
    /// 单个复用节点，使稳定状态下的发布不再分配内存。
    free: AtomicPtr<T>,
    need_swap: AtomicBool,
    using_frame: AtomicBool,
    consumer: OnceLock<thread::Thread>,
    _marker: PhantomData<*mut T>,
}

unsafe impl<T: Send> Send for Shared<T> {}
unsafe impl<T: Send> Sync for Shared<T> {}

impl<T> Shared<T> {
    #[inline]
    fn pop_free(&self) -> Option<Box<T>> {
        let ptr = self.free.swap(ptr::null_mut(), Ordering::AcqRel);
        if ptr.is_null() {
            None
        } else {
            Some(unsafe { Box::from_raw(ptr) })
        }
    }

    #[inline]
    fn push_free(&self, node: Box<T>) {
        let old = self.free.swap(Box::into_raw(node), Ordering::AcqRel);
        if !old.is_null() {
            unsafe {
                drop(Box::from_raw(old));
            }
        }
    }

    #[inline]
    fn wake_consumer(&self) {
        if let Some(consumer) = self.consumer.get() {
            consumer.unpark();
        }
    }
}

impl<T> Drop for Shared<T> {
    fn drop(&mut self) {
        for slot in [&self.update, &self.free] {
            let ptr = slot.swap(ptr::null_mut(), Ordering::AcqRel);
            if !ptr.is_null() {
                unsafe {
                    drop(Box::from_raw(ptr));
                }
            }
        }
    }
}

/// ### English
/// Creates a connected sender/receiver pair.
///
/// ### 中文
/// 创建一对相连的发送端/接收端。
pub fn latest_slot<T: Send>() -> (LatestSender<T>, LatestReceiver<T>) {
    let shared = Arc::new(Shared {
        update: AtomicPtr::new(ptr::null_mut()),
        free: AtomicPtr::new(ptr::null_mut()),
        need_swap: AtomicBool::new(false),
        using_frame: AtomicBool::new(false),
        consumer: OnceLock::new(),
        _marker: PhantomData,
    });
    (
        LatestSender {
            shared: shared.clone(),
        },
        LatestReceiver { shared, show: None },
    )
}

/// ### English
/// Producer side. Any thread may publish; publishing never blocks.
///
/// ### 中文
/// 生产端。任意线程都可发布；发布永不阻塞。
pub struct LatestSender<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Clone for LatestSender<T> {
    fn clone(&self) -> Self {
        Self {
            shared: self.shared.clone(),
        }
    }
}

impl<T> LatestSender<T> {
    /// ### English
    /// Publishes `value` into the `update` slot, applying the drop rule, and unparks the bound
    /// consumer thread (if any).
    ///
    /// ### 中文
    /// 把 `value` 发布到 `update` 槽（应用丢弃规则），并 unpark 已绑定的消费者线程（若有）。
    pub fn publish(&self, value: T) -> Publish {
        let shared = &*self.shared;
        if shared.need_swap.load(Ordering::Acquire) && shared.using_frame.load(Ordering::Acquire)
        {
            return Publish::Dropped;
        }

        let node = match shared.pop_free() {
            Some(mut node) => {
                *node = value;
                node
            }
            None => Box::new(value),
        };

        let old = shared.update.swap(Box::into_raw(node), Ordering::AcqRel);
        shared.need_swap.store(true, Ordering::Release);

        let outcome = if old.is_null() {
            Publish::Stored
        } else {
            shared.push_free(unsafe { Box::from_raw(old) });
            Publish::Replaced
        };

        shared.wake_consumer();
        outcome
    }

    /// ### English
    /// Whether a published value is waiting for the consumer.
    ///
    /// ### 中文
    /// 是否有已发布的值在等待消费者。
    #[inline]
    pub fn is_pending(&self) -> bool {
        self.shared.need_swap.load(Ordering::Acquire)
    }
}

/// ### English
/// Consumer side. Exactly one exists per slot; it owns the `show` value.
///
/// ### 中文
/// 消费端。每个槽恰好一个；它持有 `show` 值。
pub struct LatestReceiver<T> {
    shared: Arc<Shared<T>>,
    show: Option<Box<T>>,
}

impl<T> LatestReceiver<T> {
    /// ### English
    /// Binds the calling thread as the consumer so publishes `unpark()` it.
    /// Returns `false` if a consumer thread was already bound.
    ///
    /// ### 中文
    /// 把调用线程绑定为消费者，使发布时会 `unpark()` 它。
    /// 若已绑定过消费者线程则返回 `false`。
    pub fn bind_current_thread(&self) -> bool {
        self.shared.consumer.set(thread::current()).is_ok()
    }

    /// ### English
    /// Whether a value is pending in the `update` slot.
    ///
    /// ### 中文
    /// `update` 槽中是否有挂起值。
    #[inline]
    pub fn has_pending(&self) -> bool {
        self.shared.need_swap.load(Ordering::Acquire)
    }

    /// ### English
    /// Swaps the pending value into `show` and runs `f` on it while `using_frame` is raised.
    ///
    /// Returns `None` (without calling `f`) when nothing is pending.
    ///
    /// ### 中文
    /// 把挂起值交换到 `show`，并在 `using_frame` 置位期间对其执行 `f`。
    ///
    /// 没有挂起值时返回 `None`（不会调用 `f`）。
    pub fn consume<R>(&mut self, f: impl FnOnce(&T) -> R) -> Option<R> {
        let shared = &*self.shared;
        shared.using_frame.store(true, Ordering::Release);

        // `need_swap` is cleared before the take so a publish racing with us re-raises it.
        shared.need_swap.store(false, Ordering::Release);
        let ptr = shared.update.swap(ptr::null_mut(), Ordering::AcqRel);
        if ptr.is_null() {
            shared.using_frame.store(false, Ordering::Release);
            return None;
        }

        if let Some(old) = self.show.replace(unsafe { Box::from_raw(ptr) }) {
            shared.push_free(old);
        }

        let result = self.show.as_deref().map(f);
        shared.using_frame.store(false, Ordering::Release);
        result
    }

    /// ### English
    /// The value most recently consumed, if any.
    ///
    /// ### 中文
    /// 最近一次被消费的值（若有）。
    #[inline]
    pub fn show(&self) -> Option<&T> {
        self.show.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_consume_sees_latest_of_two() {
        let (tx, mut rx) = latest_slot();
        assert_eq!(tx.publish(1), Publish::Stored);
        assert_eq!(tx.publish(2), Publish::Replaced);

        assert_eq!(rx.consume(|v| *v), Some(2));
        assert_eq!(rx.consume(|v| *v), None);
        assert_eq!(rx.show(), Some(&2));
    }

    #[test]
    fn test_drops_when_pending_and_consumer_busy() {
        let (tx, mut rx) = latest_slot();
        tx.publish(0);

        let outcomes = rx.consume(|_| {
            let first = tx.publish(1);
            let second = tx.publish(2);
            (first, second)
        });
        assert_eq!(outcomes, Some((Publish::Stored, Publish::Dropped)));

        assert_eq!(rx.consume(|v| *v), Some(1));
    }

    #[test]
    fn test_replaces_while_consumer_idle() {
        let (tx, mut rx) = latest_slot();
        for i in 0..10 {
            tx.publish(i);
        }
        assert!(rx.has_pending());
        assert_eq!(rx.consume(|v| *v), Some(9));
        assert!(!rx.has_pending());
    }

    #[test]
    fn test_cross_thread_publish_wakes_consumer() {
        let (tx, mut rx) = latest_slot::<u64>();
        let consumer = thread::spawn(move || {
            assert!(rx.bind_current_thread());
            loop {
                if let Some(v) = rx.consume(|v| *v) {
                    if v == 99 {
                        return v;
                    }
                    continue;
                }
                thread::park();
            }
        });

        for i in 0..99 {
            tx.publish(i);
        }
        while tx.publish(99) == Publish::Dropped {
            thread::yield_now();
        }
        assert_eq!(consumer.join().unwrap(), 99);
    }

    #[test]
    fn test_drop_releases_pending_values() {
        let value = Arc::new(());
        let (tx, mut rx) = latest_slot();
        tx.publish(value.clone());
        rx.consume(|_| ());
        tx.publish(value.clone());
        tx.publish(value.clone());
        assert_eq!(Arc::strong_count(&value), 4);

        drop(tx);
        drop(rx);
        assert_eq!(Arc::strong_count(&value), 1);
    }
}
