//! Tenant bookkeeping for Switchyard: backend descriptor storage with
//! removal cooldowns and inactivity tracking, and per-tenant rebuild
//! serialization.

pub mod descriptors;
pub mod locks;

pub use descriptors::{DescriptorStore, StoreStats};
pub use locks::RebuildLockMap;
