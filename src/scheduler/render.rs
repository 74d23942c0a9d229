//! Reminder content.
//!
//! Pure: the same snapshot, recipient and timezone always produce the same
//! message.

use chrono_tz::Tz;

use crate::notify::ReminderMessage;
use crate::store::Task;

/// Local timestamp format used in reminder bodies.
pub const LOCAL_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Format a UTC instant as wall-clock time in `tz`.
pub fn local_deadline(task: &Task, tz: Tz) -> String {
    task.due_date
        .with_timezone(&tz)
        .format(LOCAL_TIME_FORMAT)
        .to_string()
}

/// Build the subject and body for a task reminder.
pub fn render_reminder(task: &Task, recipient: &str, tz: Tz) -> ReminderMessage {
    let deadline = local_deadline(task, tz);

    let mut body = format!(
        "Hello! We remind you that the task \"{}\" is close to the deadline. Finish on time!\n\n\
         Deadline: {deadline} ({})\n\
         Priority: {}",
        task.title,
        tz.name(),
        task.priority,
    );
    if !task.category.is_empty() {
        body.push_str(&format!("\nCategory: {}", task.category));
    }
    if !task.description.is_empty() {
        body.push_str(&format!("\n\n{}", task.description));
    }

    ReminderMessage {
        to: recipient.to_owned(),
        subject: format!("Reminder about the task: {}", task.title),
        body,
    }
}
