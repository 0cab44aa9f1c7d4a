//! Cache-to-view reapplication for representations that (re)mount.
//!
//! Virtualized views destroy and recreate items while they scroll. The watcher
//! listens to mount notifications, batches them behind a debounce, and pushes
//! whatever the store says is currently translated back into the new mount.
//! It only reads the store and never issues a translation request.

use crate::host::MountEvent;
use crate::scheduler::Scheduler;
use crate::session::Session;
use crate::store::lock_store;
use log::debug;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

pub(crate) const RECONCILE_KEY: &str = "reconcile";

#[derive(Clone)]
pub struct ReconciliationWatcher {
    session: Arc<Session>,
}

impl ReconciliationWatcher {
    pub(crate) fn new(session: Arc<Session>) -> Self {
        Self { session }
    }

    /// Reapplies the cached translation for one newly mounted representation.
    /// Returns true when content was reapplied.
    pub fn reconcile(&self, event: &MountEvent) -> bool {
        match event {
            MountEvent::Item(id) => {
                let content = lock_store(&self.session.store)
                    .get(id)
                    .and_then(|entry| entry.displayed_translation())
                    .map(str::to_string);
                match content {
                    Some(content) => {
                        self.session.host.apply_item(id, &content);
                        true
                    }
                    None => false,
                }
            }
            MountEvent::Title(mount) => {
                let content = lock_store(&self.session.store)
                    .title()
                    .and_then(|title| title.displayed_translation())
                    .map(str::to_string);
                match content {
                    Some(content) => {
                        self.session.host.apply_title(*mount, &content);
                        true
                    }
                    None => false,
                }
            }
        }
    }

    pub(crate) fn attach(self, mut mounts: mpsc::Receiver<MountEvent>) -> WatcherHandle {
        let pending: Arc<Mutex<Vec<MountEvent>>> = Arc::default();
        let detached = Arc::new(AtomicBool::new(false));
        let scheduler = Arc::clone(&self.session.scheduler);
        let debounce = self.session.config.remount_debounce();

        let task = {
            let pending = Arc::clone(&pending);
            let detached = Arc::clone(&detached);
            let scheduler = Arc::clone(&scheduler);
            tokio::spawn(async move {
                while let Some(event) = mounts.recv().await {
                    {
                        let mut queued = lock_pending(&pending);
                        if !queued.contains(&event) {
                            queued.push(event);
                        }
                    }

                    let watcher = self.clone();
                    let pending = Arc::clone(&pending);
                    let detached = Arc::clone(&detached);
                    scheduler.schedule_after(
                        RECONCILE_KEY,
                        debounce,
                        Box::new(move || {
                            if detached.load(Ordering::SeqCst) {
                                return;
                            }
                            let batch = std::mem::take(&mut *lock_pending(&pending));
                            let reapplied = batch
                                .iter()
                                .filter(|event| watcher.reconcile(event))
                                .count();
                            if reapplied > 0 {
                                debug!(
                                    "reapplied cached translation to {reapplied} of {} remounted views",
                                    batch.len()
                                );
                            }
                        }),
                    );
                }
                debug!("mount notifications closed; watcher stopped");
            })
        };

        WatcherHandle {
            task,
            scheduler,
            detached,
        }
    }
}

fn lock_pending(pending: &Mutex<Vec<MountEvent>>) -> std::sync::MutexGuard<'_, Vec<MountEvent>> {
    pending
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Keeps an attached watcher alive until [`WatcherHandle::detach`].
pub struct WatcherHandle {
    task: JoinHandle<()>,
    scheduler: Arc<dyn Scheduler>,
    detached: Arc<AtomicBool>,
}

impl WatcherHandle {
    pub fn detach(self) {
        self.detached.store(true, Ordering::SeqCst);
        self.task.abort();
        self.scheduler.cancel(RECONCILE_KEY);
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}
