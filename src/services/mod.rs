pub mod aggregate;
pub mod assessment;
pub mod dispatch;
pub mod document_cache;
pub mod extract;
pub mod fetch;
pub mod links;
pub mod queue;
pub mod readiness;
pub mod snapshot;
pub mod worker;
