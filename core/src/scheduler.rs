//! Keyed one-shot timers.
//!
//! Scheduling under a key that already has a pending task cancels the earlier
//! task, which is what remount debouncing and transient error labels need.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;

pub type ScheduledTask = Box<dyn FnOnce() + Send + 'static>;

pub trait Scheduler: Send + Sync {
    /// Runs `task` after `delay`, replacing any task pending under `key`.
    fn schedule_after(&self, key: &str, delay: Duration, task: ScheduledTask);

    fn cancel(&self, key: &str);

    fn cancel_all(&self);
}

type PendingMap = HashMap<String, (u64, JoinHandle<()>)>;

/// [`Scheduler`] backed by tokio tasks. Must be used from inside a runtime.
#[derive(Debug, Default)]
pub struct TokioScheduler {
    pending: Arc<Mutex<PendingMap>>,
    next_ticket: AtomicU64,
}

impl TokioScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pending_count(&self) -> usize {
        lock_pending(&self.pending).len()
    }
}

fn lock_pending(pending: &Mutex<PendingMap>) -> std::sync::MutexGuard<'_, PendingMap> {
    pending.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl Scheduler for TokioScheduler {
    fn schedule_after(&self, key: &str, delay: Duration, task: ScheduledTask) {
        let ticket = self.next_ticket.fetch_add(1, Ordering::Relaxed);
        let pending = Arc::clone(&self.pending);
        let owned_key = key.to_string();

        let mut guard = lock_pending(&self.pending);
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            {
                let mut guard = lock_pending(&pending);
                match guard.get(&owned_key) {
                    Some((current, _)) if *current == ticket => {
                        guard.remove(&owned_key);
                    }
                    _ => return,
                }
            }
            task();
        });

        if let Some((_, previous)) = guard.insert(key.to_string(), (ticket, handle)) {
            previous.abort();
        }
    }

    fn cancel(&self, key: &str) {
        if let Some((_, handle)) = lock_pending(&self.pending).remove(key) {
            handle.abort();
        }
    }

    fn cancel_all(&self) {
        for (_, (_, handle)) in lock_pending(&self.pending).drain() {
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn counter_task(counter: &Arc<AtomicUsize>, value: usize) -> ScheduledTask {
        let counter = Arc::clone(counter);
        Box::new(move || {
            counter.fetch_add(value, Ordering::SeqCst);
        })
    }

    #[tokio::test(start_paused = true)]
    async fn reschedule_replaces_pending_task() {
        let scheduler = TokioScheduler::new();
        let counter = Arc::new(AtomicUsize::new(0));

        scheduler.schedule_after("k", Duration::from_millis(100), counter_task(&counter, 1));
        tokio::time::sleep(Duration::from_millis(50)).await;
        scheduler.schedule_after("k", Duration::from_millis(100), counter_task(&counter, 10));

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 10);
        assert_eq!(scheduler.pending_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn independent_keys_both_fire() {
        let scheduler = TokioScheduler::new();
        let counter = Arc::new(AtomicUsize::new(0));

        scheduler.schedule_after("a", Duration::from_millis(10), counter_task(&counter, 1));
        scheduler.schedule_after("b", Duration::from_millis(10), counter_task(&counter, 2));

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_all_drops_everything() {
        let scheduler = TokioScheduler::new();
        let counter = Arc::new(AtomicUsize::new(0));

        scheduler.schedule_after("a", Duration::from_millis(10), counter_task(&counter, 1));
        scheduler.schedule_after("b", Duration::from_millis(10), counter_task(&counter, 1));
        scheduler.cancel("a");
        scheduler.cancel_all();

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 0);
    }
}
