//! Repository layer.
//!
//! Each repository is a zero-sized struct providing async methods that
//! accept `&PgPool`, or `&mut Transaction` when the call must join the
//! caller's claim transaction.

pub mod factory_repo;
pub mod failure_repo;
pub mod job_repo;
pub mod lease_repo;
pub mod nonce_repo;
pub mod request_group_repo;

pub use factory_repo::FactoryRepo;
pub use failure_repo::FailureRepo;
pub use job_repo::JobRepo;
pub use lease_repo::LeaseRepo;
pub use nonce_repo::NonceRepo;
pub use request_group_repo::RequestGroupRepo;
