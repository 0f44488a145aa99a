pub mod bell;
pub mod live_alerts;
pub mod runtime;
pub mod scheduler;
pub mod snapshot;
