//! Cancellable periodic tasks.
//!
//! The escalation countdown is a scheduled task rather than a bare interval so that
//! cancellation is an explicit operation and tests can step time by hand.
//!
//! * [`ManualScheduler`]: every call to [`ManualScheduler::tick`] is one period for
//!   every live task. Deterministic; used by tests and simulations.
//! * [`TokioScheduler`]: drives tasks with `tokio::time::interval` on a runtime handle.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tracing::debug;

/// What a tick closure wants next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickControl {
    Continue,
    Stop,
}

pub type TickFn = Box<dyn FnMut() -> TickControl + Send>;

static NEXT_TASK_ID: AtomicU64 = AtomicU64::new(1);

/// Handle to a scheduled task.
#[derive(Debug, Clone)]
pub struct TaskHandle {
    id: u64,
    cancelled: Arc<AtomicBool>,
    finished: Arc<AtomicBool>,
}

impl TaskHandle {
    fn new() -> Self {
        Self {
            id: NEXT_TASK_ID.fetch_add(1, Ordering::Relaxed),
            cancelled: Arc::new(AtomicBool::new(false)),
            finished: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    /// Stop the task before its next tick. Returns `false` if it had already ended.
    pub fn cancel(&self) -> bool {
        if self.finished.load(Ordering::Acquire) {
            return false;
        }
        !self.cancelled.swap(true, Ordering::AcqRel)
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    pub fn is_finished(&self) -> bool {
        self.finished.load(Ordering::Acquire)
    }

    pub fn is_live(&self) -> bool {
        !self.is_cancelled() && !self.is_finished()
    }

    fn mark_finished(&self) {
        self.finished.store(true, Ordering::Release);
    }
}

/// Runs a tick closure once per period until it returns [`TickControl::Stop`] or the
/// returned handle is cancelled. The first tick happens one period after scheduling.
pub trait Scheduler: Send + Sync {
    fn every(&self, period: Duration, tick: TickFn) -> TaskHandle;
}

struct ManualTask {
    handle: TaskHandle,
    tick: TickFn,
}

/// Scheduler stepped explicitly; ignores wall-clock time.
#[derive(Default)]
pub struct ManualScheduler {
    tasks: Mutex<Vec<ManualTask>>,
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    fn tasks(&self) -> MutexGuard<'_, Vec<ManualTask>> {
        self.tasks.lock().unwrap_or_else(|p| p.into_inner())
    }

    /// Advance one period. Returns how many tasks ran.
    ///
    /// Tasks scheduled from inside a tick first run on the following call.
    pub fn tick(&self) -> usize {
        let due = std::mem::take(&mut *self.tasks());
        let mut kept = Vec::with_capacity(due.len());
        let mut ran = 0;

        for mut task in due {
            if task.handle.is_cancelled() {
                continue;
            }
            ran += 1;
            match (task.tick)() {
                TickControl::Continue if !task.handle.is_cancelled() => kept.push(task),
                TickControl::Continue => {}
                TickControl::Stop => task.handle.mark_finished(),
            }
        }

        let mut tasks = self.tasks();
        let scheduled_meanwhile = std::mem::take(&mut *tasks);
        *tasks = kept;
        tasks.extend(scheduled_meanwhile);
        ran
    }

    pub fn advance(&self, ticks: u32) {
        for _ in 0..ticks {
            self.tick();
        }
    }

    /// Number of tasks that will run on the next tick.
    pub fn pending(&self) -> usize {
        self.tasks().iter().filter(|t| t.handle.is_live()).count()
    }
}

impl Scheduler for ManualScheduler {
    fn every(&self, _period: Duration, tick: TickFn) -> TaskHandle {
        let handle = TaskHandle::new();
        self.tasks().push(ManualTask {
            handle: handle.clone(),
            tick,
        });
        handle
    }
}

/// Scheduler backed by a tokio runtime.
#[derive(Debug, Clone)]
pub struct TokioScheduler {
    runtime: tokio::runtime::Handle,
}

impl TokioScheduler {
    pub fn new(runtime: tokio::runtime::Handle) -> Self {
        Self { runtime }
    }

    /// Scheduler on the ambient runtime, if called from inside one.
    pub fn current() -> Option<Self> {
        tokio::runtime::Handle::try_current().ok().map(Self::new)
    }
}

impl Scheduler for TokioScheduler {
    fn every(&self, period: Duration, mut tick: TickFn) -> TaskHandle {
        let handle = TaskHandle::new();
        let task = handle.clone();
        self.runtime.spawn(async move {
            let mut interval = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
            loop {
                interval.tick().await;
                if task.is_cancelled() {
                    debug!(task = task.id(), "[SCHEDULER] Task cancelled");
                    break;
                }
                if tick() == TickControl::Stop {
                    task.mark_finished();
                    break;
                }
            }
        });
        handle
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU32;

    fn counting_task(limit: u32) -> (Arc<AtomicU32>, TickFn) {
        let count = Arc::new(AtomicU32::new(0));
        let c = Arc::clone(&count);
        let tick: TickFn = Box::new(move || {
            let n = c.fetch_add(1, Ordering::SeqCst) + 1;
            if n >= limit {
                TickControl::Stop
            } else {
                TickControl::Continue
            }
        });
        (count, tick)
    }

    #[test]
    fn test_manual_runs_until_stop() {
        let scheduler = ManualScheduler::new();
        let (count, tick) = counting_task(3);
        let handle = scheduler.every(Duration::from_secs(1), tick);

        scheduler.advance(5);
        assert_eq!(count.load(Ordering::SeqCst), 3);
        assert!(handle.is_finished());
        assert!(!handle.cancel());
        assert_eq!(scheduler.pending(), 0);
    }

    #[test]
    fn test_manual_cancel_stops_future_ticks() {
        let scheduler = ManualScheduler::new();
        let (count, tick) = counting_task(100);
        let handle = scheduler.every(Duration::from_secs(1), tick);

        scheduler.advance(2);
        assert!(handle.cancel());
        assert!(!handle.cancel());
        scheduler.advance(2);
        assert_eq!(count.load(Ordering::SeqCst), 2);
        assert_eq!(scheduler.pending(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_tokio_scheduler_ticks_per_period() {
        let scheduler = TokioScheduler::current().unwrap();
        let (count, tick) = counting_task(3);
        let handle = scheduler.every(Duration::from_secs(1), tick);

        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(count.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(count.load(Ordering::SeqCst), 3);
        assert!(handle.is_finished());
    }

    #[tokio::test(start_paused = true)]
    async fn test_tokio_scheduler_cancel() {
        let scheduler = TokioScheduler::current().unwrap();
        let (count, tick) = counting_task(100);
        let handle = scheduler.every(Duration::from_secs(1), tick);

        tokio::time::sleep(Duration::from_millis(2500)).await;
        handle.cancel();
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }
}
