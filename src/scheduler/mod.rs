mod reminders;

pub use reminders::start_reminder_scheduler;
