//! Domain model structs and DTOs.
//!
//! Each submodule contains:
//! - A `FromRow` + `Serialize` entity struct matching the database row
//! - A `Deserialize` create DTO for inserts, where the table has one

pub mod factory;
pub mod job;
pub mod lease;
pub mod nonce;
pub mod request_group;
