//! Application services layer.

pub mod error;
pub mod plan;
pub mod repos;
