//! SurrealDB repository implementations.

mod audit;
mod join_request;
mod managed_group;
mod user_record;

pub use audit::SurrealAuditLogRepository;
pub use join_request::SurrealJoinRequestRepository;
pub use managed_group::SurrealManagedGroupRepository;
pub use user_record::SurrealUserRecordRepository;
