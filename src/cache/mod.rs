//! Corpsite cache system.
//!
//! Rendered public pages are cached under semantic tags. Content writes are
//! published as [`ChangeEvent`]s after commit; the [`ChangeConsumer`] plans
//! each batch and the [`InvalidationRouter`] evicts exactly the tags whose
//! pages may show the changed record.
//!
//! ## Configuration
//!
//! Cache behavior is controlled via `corpsite.toml`:
//!
//! ```toml
//! [cache]
//! enabled = true
//! default_ttl_seconds = 3600
//! capacity = 1000
//! consume_batch_limit = 100
//! ```

mod backend;
mod config;
mod consumer;
mod events;
mod keys;
mod lock;
mod planner;
mod registry;
mod router;
mod store;
mod trigger;

pub use backend::{CacheBackend, CacheError};
pub use config::CacheConfig;
pub use consumer::ChangeConsumer;
pub use events::{
    ChangeEnvelope, ChangeEvent, ChangeOperation, ChangeQueue, Epoch, QueuedChange, Subject,
};
pub use keys::{CacheTag, DivisionRef, TagParseError, TagSet, normalize_identifier};
pub use planner::InvalidationPlan;
pub use registry::CacheRegistry;
pub use router::InvalidationRouter;
pub use store::{TagCache, TaggedCache};
pub use trigger::{CacheTrigger, UnitOfWork};
