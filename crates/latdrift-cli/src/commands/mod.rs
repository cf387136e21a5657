pub mod diff;
pub mod snapshot;
