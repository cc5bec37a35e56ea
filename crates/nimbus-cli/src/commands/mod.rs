pub mod cleanup;
pub mod common;
pub mod daemon;
pub mod home;
pub mod queue;
pub mod refresh;
pub mod report;
pub mod status;
pub mod sync;
