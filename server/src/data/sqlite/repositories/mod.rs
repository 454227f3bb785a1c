//! Repository implementations over the SQLite pool

pub mod discovery;
pub mod span;
pub mod tenant;

pub use discovery::DiscoveryRepository;
pub use span::{BatchOutcome, SpanRepository};
pub use tenant::TenantRepository;
