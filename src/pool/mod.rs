pub mod endpoint_pool;
pub mod quota;
pub mod reclaim;
pub mod usage;

pub use endpoint_pool::{EndpointHandle, EndpointPool, HandleStatus};
pub use quota::QuotaGuard;
pub use reclaim::ReclaimScheduler;
pub use usage::UsageTracker;
