//! Corpsite: tag-based cache invalidation for a company-profile site.

pub mod application;
pub mod cache;
pub mod config;
pub mod domain;
pub mod infra;
