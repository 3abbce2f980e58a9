mod reminder_sweep;

pub use reminder_sweep::{SweepReport, run_reminder_sweep};
