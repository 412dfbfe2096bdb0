//! ### English
//! Single-consumer cooperative task scheduler.
//!
//! Any thread may [`TaskScheduler::spawn`] work; exactly one worker thread runs it, in FIFO
//! order, with exclusive `&mut S` access to the worker-owned state. The worker parks while the
//! queue is empty and producers `unpark()` it (coalesced through a wake flag).
//!
//! Shutdown: once [`TaskScheduler::cancel`] is observed the worker stops before the next task.
//! Tasks that never started are dropped unrun and are not reported anywhere.
//!
//! ### 中文
//! 单消费者的协作式任务调度器。
//!
//! 任意线程都可 [`TaskScheduler::spawn`] 任务；仅由一个工作线程按 FIFO 顺序执行，并独占访问
//! 工作线程持有的状态 `&mut S`。队列为空时工作线程 park，生产者通过 `unpark()` 唤醒它
//!（经由唤醒标记合并）。
//!
//! 关闭：一旦观察到 [`TaskScheduler::cancel`]，工作线程会在下一个任务之前停止。
//! 尚未开始的任务会被直接丢弃，不做任何报告。

use std::sync::OnceLock;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::thread;

use crossbeam_channel as channel;
use tracing::{debug, warn};

use super::lockfree::Backoff;

/// ### English
/// A deferred unit of work executed on the worker thread.
///
/// ### 中文
/// 在工作线程上执行的延迟任务。
pub type Task<S> = Box<dyn FnOnce(&mut S) + Send + 'static>;

/// ### English
/// FIFO, single-consumer executor relaying work onto one worker thread.
///
/// ### 中文
/// FIFO、单消费者的执行器：把任务转交到单个工作线程执行。
pub struct TaskScheduler<S> {
    /// ### English
    /// Producer end of the unbounded task queue.
    ///
    /// ### 中文
    /// 无界任务队列的生产端。
    sender: channel::Sender<Task<S>>,
    /// ### English
    /// Consumer end; only the worker thread receives from it.
    ///
    /// ### 中文
    /// 消费端；只有工作线程从中接收。
    receiver: channel::Receiver<Task<S>>,
    /// ### English
    /// Worker thread handle, bound on the first drain.
    ///
    /// ### 中文
    /// 工作线程句柄，在第一次 drain 时绑定。
    worker: OnceLock<thread::Thread>,
    /// ### English
    /// Coalesced "wake pending" flag to avoid unpark storms.
    ///
    /// ### 中文
    /// 合并的 “wake pending” 标记，用于避免 unpark 风暴。
    wake_pending: AtomicBool,
    cancelled: AtomicBool,
    /// ### English
    /// Number of producers currently publishing into the queue.
    ///
    /// ### 中文
    /// 当前正在向队列发布的生产者数量。
    in_flight: AtomicUsize,
    running: AtomicBool,
}

impl<S> Default for TaskScheduler<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S> TaskScheduler<S> {
    pub fn new() -> Self {
        let (sender, receiver) = channel::unbounded();
        Self {
            sender,
            receiver,
            worker: OnceLock::new(),
            wake_pending: AtomicBool::new(false),
            cancelled: AtomicBool::new(false),
            in_flight: AtomicUsize::new(0),
            running: AtomicBool::new(false),
        }
    }

    /// ### English
    /// Enqueues `task` for the worker thread. Never runs it inline.
    ///
    /// Returns `false` (dropping the task) once the scheduler is cancelled.
    ///
    /// ### 中文
    /// 把 `task` 入队给工作线程执行，绝不在调用线程内联执行。
    ///
    /// 调度器取消后返回 `false`（并丢弃该任务）。
    pub fn spawn(&self, task: impl FnOnce(&mut S) + Send + 'static) -> bool {
        self.spawn_boxed(Box::new(task))
    }

    pub fn spawn_boxed(&self, task: Task<S>) -> bool {
        if self.cancelled.load(Ordering::Acquire) {
            debug!("task rejected: scheduler is cancelled");
            return false;
        }
        self.in_flight.fetch_add(1, Ordering::AcqRel);
        if self.cancelled.load(Ordering::Acquire) {
            self.in_flight.fetch_sub(1, Ordering::Release);
            debug!("task rejected: scheduler is cancelled");
            return false;
        }

        // Both channel ends live in `self`, so sending cannot fail.
        let _ = self.sender.send(task);
        self.in_flight.fetch_sub(1, Ordering::Release);
        self.wake();
        true
    }

    /// ### English
    /// Runs the tasks present at call time, in submission order.
    ///
    /// Must be called from the worker thread (the first caller becomes the worker). Re-entrant
    /// calls from inside a task are refused. Cancellation is checked before every task.
    /// Returns the number of tasks executed.
    ///
    /// ### 中文
    /// 按提交顺序执行调用时刻已存在的任务。
    ///
    /// 必须在工作线程调用（第一个调用者即成为工作线程）。任务内部的重入调用会被拒绝。
    /// 每个任务执行前都会检查取消标记。返回执行的任务数量。
    pub fn run_all_tasks(&self, state: &mut S) -> usize {
        self.bind_current_thread();
        debug_assert!(
            self.is_worker_thread(),
            "run_all_tasks called off the worker thread"
        );

        if self.running.swap(true, Ordering::Acquire) {
            warn!("run_all_tasks re-entered; ignoring nested call");
            return 0;
        }

        let batch = self.receiver.len();
        let mut executed = 0;
        for _ in 0..batch {
            if self.is_cancelled() {
                break;
            }
            let Ok(task) = self.receiver.try_recv() else {
                break;
            };
            task(state);
            executed += 1;
        }

        self.running.store(false, Ordering::Release);
        executed
    }

    /// ### English
    /// Worker loop: drains batches and parks while idle, until cancelled. Unstarted tasks are
    /// dropped before returning.
    ///
    /// ### 中文
    /// 工作线程主循环：批量 drain，空闲时 park，直到被取消。返回前丢弃所有未开始的任务。
    pub fn run_until_cancelled(&self, state: &mut S) {
        self.bind_current_thread();

        while !self.is_cancelled() {
            self.wake_pending.store(false, Ordering::Release);
            self.run_all_tasks(state);

            if self.is_cancelled() {
                break;
            }
            if self.wake_pending.load(Ordering::Acquire) || !self.receiver.is_empty() {
                continue;
            }
            thread::park();
        }

        let abandoned = self.close();
        if abandoned > 0 {
            debug!(abandoned, "scheduler closed with unstarted tasks");
        }
    }

    /// ### English
    /// Requests cancellation and wakes the worker. Idempotent.
    ///
    /// ### 中文
    /// 请求取消并唤醒工作线程。可重复调用。
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
        if let Some(worker) = self.worker.get() {
            worker.unpark();
        }
    }

    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    /// ### English
    /// Whether the calling thread is this scheduler's worker thread.
    ///
    /// ### 中文
    /// 调用线程是否为该调度器的工作线程。
    pub fn is_worker_thread(&self) -> bool {
        self.worker
            .get()
            .is_some_and(|worker| worker.id() == thread::current().id())
    }

    /// ### English
    /// Number of queued, not yet started tasks.
    ///
    /// ### 中文
    /// 已入队但尚未开始的任务数量。
    pub fn pending(&self) -> usize {
        self.receiver.len()
    }

    fn bind_current_thread(&self) {
        let _ = self.worker.set(thread::current());
    }

    fn wake(&self) {
        if self.wake_pending.swap(true, Ordering::AcqRel) {
            return;
        }
        if let Some(worker) = self.worker.get() {
            worker.unpark();
        }
    }

    /// ### English
    /// Cancels, waits for in-flight producers to finish publishing, then drops every queued
    /// task without running it. Returns how many were dropped.
    ///
    /// ### 中文
    /// 取消，等待正在发布的生产者完成，然后丢弃所有排队任务（不执行）。返回丢弃数量。
    fn close(&self) -> usize {
        self.cancelled.store(true, Ordering::Release);
        let mut backoff = Backoff::new();
        while self.in_flight.load(Ordering::Acquire) != 0 {
            backoff.snooze();
        }

        let mut abandoned = 0;
        while let Ok(task) = self.receiver.try_recv() {
            drop(task);
            abandoned += 1;
        }
        abandoned
    }
}
