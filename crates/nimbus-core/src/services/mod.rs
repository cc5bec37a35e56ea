//! Services shared by every client of the core.

mod reports;
mod store;

pub use reports::{ReportService, SubmitOutcome};
pub use store::LocalStore;
