use crate::models::GroupId;
use crate::{DockGroupError, Result};
use std::collections::{BTreeSet, HashMap};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::debug;

/// Host-provided timer driving the coalescing tick of open transactions
pub trait TickScheduler: Send + Sync {
    /// Start ticking `group` every `interval`; restarting replaces the old timer
    fn start(&self, group: GroupId, interval: Duration);

    /// Stop ticking `group`; unknown groups are ignored
    fn stop(&self, group: GroupId);
}

/// Scheduler for hosts that call `tick` themselves
#[derive(Debug, Default)]
pub struct ManualTickScheduler {
    active: Mutex<BTreeSet<GroupId>>,
}

impl ManualTickScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_active(&self, group: GroupId) -> bool {
        self.active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(&group)
    }

    pub fn active_groups(&self) -> Vec<GroupId> {
        self.active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .copied()
            .collect()
    }
}

impl TickScheduler for ManualTickScheduler {
    fn start(&self, group: GroupId, _interval: Duration) {
        self.active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(group);
    }

    fn stop(&self, group: GroupId) {
        self.active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&group);
    }
}

/// Receiving end of a [`TokioTickScheduler`]; yields the group due for a tick
pub type TickReceiver = mpsc::UnboundedReceiver<GroupId>;

/// Runs one `tokio::time::interval` task per ticking group and forwards each
/// tick through a channel, so the host can call `tick` from its own loop.
pub struct TokioTickScheduler {
    handle: Handle,
    sender: mpsc::UnboundedSender<GroupId>,
    tasks: Mutex<HashMap<GroupId, JoinHandle<()>>>,
}

impl TokioTickScheduler {
    pub fn new(handle: Handle) -> (Self, TickReceiver) {
        let (sender, receiver) = mpsc::unbounded_channel();
        let scheduler = Self {
            handle,
            sender,
            tasks: Mutex::new(HashMap::new()),
        };
        (scheduler, receiver)
    }

    /// Bind to the runtime of the calling task
    pub fn from_current() -> Result<(Self, TickReceiver)> {
        let handle = Handle::try_current().map_err(|err| {
            DockGroupError::ConfigurationError(format!("No tokio runtime available: {}", err))
        })?;
        Ok(Self::new(handle))
    }

    pub fn active_count(&self) -> usize {
        self.tasks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .filter(|task| !task.is_finished())
            .count()
    }
}

impl TickScheduler for TokioTickScheduler {
    fn start(&self, group: GroupId, interval: Duration) {
        let period = interval.max(Duration::from_millis(1));
        let sender = self.sender.clone();
        let task = self.handle.spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            // the first tick completes immediately
            ticker.tick().await;
            loop {
                ticker.tick().await;
                if sender.send(group).is_err() {
                    break;
                }
            }
        });

        let previous = self
            .tasks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(group, task);
        if let Some(previous) = previous {
            previous.abort();
        }
        debug!(%group, ?period, "Tick started");
    }

    fn stop(&self, group: GroupId) {
        let task = self
            .tasks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&group);
        if let Some(task) = task {
            task.abort();
            debug!(%group, "Tick stopped");
        }
    }
}

impl Drop for TokioTickScheduler {
    fn drop(&mut self) {
        let tasks = self.tasks.get_mut().unwrap_or_else(PoisonError::into_inner);
        for (_, task) in tasks.drain() {
            task.abort();
        }
    }
}
