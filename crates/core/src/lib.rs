//! Pure domain logic for the screenshot factory dispatcher.
//!
//! Nothing in this crate performs I/O: the store lives in `shotserver-db`
//! and the HTTP surface in `shotserver-api`. Everything here is shared by
//! both and tested in isolation.

pub mod crypt;
pub mod error;
pub mod job_state;
pub mod lease;
pub mod matching;
pub mod options;
pub mod poll;
pub mod types;
pub mod validation;
