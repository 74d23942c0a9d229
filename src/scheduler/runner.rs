//! Reminder scheduler background loop.
//!
//! A single tokio task owns a [`DelayQueue`] of armed reminders. Request
//! handlers arm reminders by sending a command over an unbounded channel,
//! so scheduling never blocks the HTTP path. When an entry expires its
//! delivery runs on a separate tokio task; a slow or failing send never
//! holds up the queue.
//!
//! Armed reminders live only in memory and are lost when the process
//! stops.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use futures_util::StreamExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::time::DelayQueue;
use tracing::{debug, info, warn};

use super::reminder::{
    DEFAULT_LEAD_FRACTION, DeliveryStatus, ReminderOutcome, ScheduledReminder, plan_reminder,
};
use super::render::render_reminder;
use crate::config::ReminderConfig;
use crate::error::Result;
use crate::notify::Notifier;
use crate::store::Task;

/// Number of outcomes kept in memory by default.
const DEFAULT_HISTORY_LIMIT: usize = 200;

/// Longest single wait handed to the delay queue. Reminders further out
/// are re-armed when this slice elapses.
const MAX_ARM_SLICE: Duration = Duration::from_secs(30 * 24 * 60 * 60);

/// Runtime settings for the scheduler.
#[derive(Debug, Clone)]
pub struct ReminderSettings {
    /// Fraction of the remaining time at which the reminder fires.
    pub lead_fraction: f64,
    /// Timezone deadlines are rendered in.
    pub timezone: Tz,
    /// Max outcomes kept in the recent-history ring.
    pub history_limit: usize,
}

impl Default for ReminderSettings {
    fn default() -> Self {
        Self {
            lead_fraction: DEFAULT_LEAD_FRACTION,
            timezone: chrono_tz::Asia::Almaty,
            history_limit: DEFAULT_HISTORY_LIMIT,
        }
    }
}

impl ReminderSettings {
    pub fn from_config(config: &ReminderConfig) -> Result<Self> {
        Ok(Self {
            lead_fraction: config.lead_fraction,
            timezone: config.parsed_timezone()?,
            history_limit: config.outcome_history.max(1),
        })
    }
}

enum Command {
    Arm(Armed),
}

struct Armed {
    reminder: ScheduledReminder,
    deadline: Instant,
}

/// State shared between the handle, the loop and delivery tasks.
struct Shared {
    notifier: Arc<dyn Notifier>,
    timezone: Tz,
    pending: AtomicUsize,
    history: Mutex<VecDeque<ReminderOutcome>>,
    history_limit: usize,
    outcome_tx: Option<mpsc::UnboundedSender<ReminderOutcome>>,
}

impl Shared {
    fn record(&self, outcome: ReminderOutcome) {
        {
            let mut history = match self.history.lock() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            history.push_back(outcome.clone());
            while history.len() > self.history_limit {
                history.pop_front();
            }
        }
        if let Some(tx) = &self.outcome_tx {
            // Receiver may have gone away; outcomes are still in history.
            let _ = tx.send(outcome);
        }
    }
}

struct Inner {
    commands: mpsc::UnboundedSender<Command>,
    shared: Arc<Shared>,
    lead_fraction: f64,
    handle: JoinHandle<()>,
}

impl Drop for Inner {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Handle to the background reminder scheduler. Cheap to clone; the loop
/// stops when the last clone is dropped.
#[derive(Clone)]
pub struct ReminderScheduler {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for ReminderScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReminderScheduler")
            .field("pending", &self.pending())
            .field("lead_fraction", &self.inner.lead_fraction)
            .finish()
    }
}

impl ReminderScheduler {
    /// Start the scheduler loop on the current tokio runtime.
    ///
    /// Every finished attempt is pushed to `outcome_tx` when given.
    pub fn spawn(
        settings: ReminderSettings,
        notifier: Arc<dyn Notifier>,
        outcome_tx: Option<mpsc::UnboundedSender<ReminderOutcome>>,
    ) -> Self {
        let (commands, rx) = mpsc::unbounded_channel();
        let shared = Arc::new(Shared {
            notifier,
            timezone: settings.timezone,
            pending: AtomicUsize::new(0),
            history: Mutex::new(VecDeque::new()),
            history_limit: settings.history_limit.max(1),
            outcome_tx,
        });
        let handle = tokio::spawn(run_loop(rx, Arc::clone(&shared)));
        info!(
            lead_fraction = settings.lead_fraction,
            timezone = %settings.timezone,
            "reminder scheduler started"
        );
        Self {
            inner: Arc::new(Inner {
                commands,
                shared,
                lead_fraction: settings.lead_fraction,
                handle,
            }),
        }
    }

    /// Arm a reminder for a freshly persisted task.
    ///
    /// Returns the computed fire-at instant, or `None` when the reminder
    /// point is not in the future and nothing was armed. The snapshot is
    /// rendered as-is when the reminder fires.
    pub fn schedule_for_new_task(
        &self,
        snapshot: Task,
        recipient: Option<String>,
        now: DateTime<Utc>,
    ) -> Option<DateTime<Utc>> {
        let Some(plan) = plan_reminder(now, snapshot.due_date, self.inner.lead_fraction) else {
            debug!(task_id = %snapshot.id, "reminder point already passed, nothing armed");
            return None;
        };

        let task_id = snapshot.id.clone();
        let armed = Armed {
            reminder: ScheduledReminder {
                snapshot,
                recipient,
                fire_at: plan.fire_at,
            },
            deadline: Instant::now() + plan.delay,
        };

        self.inner.shared.pending.fetch_add(1, Ordering::SeqCst);
        if self.inner.commands.send(Command::Arm(armed)).is_err() {
            self.inner.shared.pending.fetch_sub(1, Ordering::SeqCst);
            warn!(task_id = %task_id, "reminder scheduler is not running");
            return None;
        }
        debug!(task_id = %task_id, fire_at = %plan.fire_at, "reminder armed");
        Some(plan.fire_at)
    }

    /// Number of armed reminders that have not fired yet.
    pub fn pending(&self) -> usize {
        self.inner.shared.pending.load(Ordering::SeqCst)
    }

    /// Most recent delivery outcomes, oldest first.
    pub fn recent_outcomes(&self) -> Vec<ReminderOutcome> {
        match self.inner.shared.history.lock() {
            Ok(history) => history.iter().cloned().collect(),
            Err(poisoned) => poisoned.into_inner().iter().cloned().collect(),
        }
    }
}

fn arm(queue: &mut DelayQueue<Armed>, armed: Armed) {
    let now = Instant::now();
    let wait = armed.deadline.saturating_duration_since(now).min(MAX_ARM_SLICE);
    queue.insert_at(armed, now + wait);
}

async fn run_loop(mut commands: mpsc::UnboundedReceiver<Command>, shared: Arc<Shared>) {
    let mut queue: DelayQueue<Armed> = DelayQueue::new();

    loop {
        tokio::select! {
            command = commands.recv() => match command {
                Some(Command::Arm(armed)) => arm(&mut queue, armed),
                None => break,
            },
            Some(expired) = queue.next(), if !queue.is_empty() => {
                let armed = expired.into_inner();
                if armed.deadline > Instant::now() {
                    arm(&mut queue, armed);
                    continue;
                }
                shared.pending.fetch_sub(1, Ordering::SeqCst);
                tokio::spawn(deliver(Arc::clone(&shared), armed.reminder));
            }
        }
    }

    debug!(dropped = queue.len(), "reminder scheduler stopped");
}

async fn deliver(shared: Arc<Shared>, reminder: ScheduledReminder) {
    let task_id = reminder.snapshot.id.clone();

    let status = match reminder.resolved_recipient() {
        None => DeliveryStatus::Skipped("no recipient address".to_owned()),
        Some(to) => {
            let message = render_reminder(&reminder.snapshot, to, shared.timezone);
            match shared.notifier.send(&message).await {
                Ok(()) => DeliveryStatus::Sent,
                Err(e) => DeliveryStatus::Failed(e.to_string()),
            }
        }
    };

    match &status {
        DeliveryStatus::Sent => info!(
            task_id = %task_id,
            sender = shared.notifier.id(),
            "reminder sent"
        ),
        DeliveryStatus::Skipped(reason) => debug!(task_id = %task_id, reason, "reminder skipped"),
        DeliveryStatus::Failed(error) => warn!(task_id = %task_id, error, "reminder failed"),
    }

    shared.record(ReminderOutcome {
        task_id,
        recipient: reminder.recipient,
        fire_at: reminder.fire_at,
        finished_at: Utc::now(),
        status,
    });
}
