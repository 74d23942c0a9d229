//! Deadline reminders.
//!
//! When a task is created a reminder is armed to fire once 70% of the time
//! left until its deadline has elapsed. Reminders carry a snapshot of the
//! task and are rendered in a configured timezone when they fire.

pub mod reminder;
pub mod render;
pub mod runner;

pub use reminder::{
    DEFAULT_LEAD_FRACTION, DeliveryStatus, ReminderOutcome, ReminderPlan, ScheduledReminder,
    plan_reminder,
};
pub use render::{local_deadline, render_reminder};
pub use runner::{ReminderScheduler, ReminderSettings};
