//! Copy the upstream `/comments` collection into Postgres, one page per
//! transaction.
pub mod comment;
pub mod config;
pub mod db;
pub mod error;
pub mod fetch;
pub mod load;
pub mod sync;
