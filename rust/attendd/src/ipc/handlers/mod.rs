pub mod attendance;
pub mod backup;
pub mod batches;
pub mod core;
pub mod dashboards;
pub mod reports;
pub mod store;
pub mod students;
pub mod trainings;
