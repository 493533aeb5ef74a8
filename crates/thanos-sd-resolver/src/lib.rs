//! Store target resolution
//!
//! Lists the records of a hosted zone, keeps the ones that name Thanos store gRPC
//! endpoints and turns them into `host:port` targets for Thanos Query.
//!
//! # Directories
//!
//! - **Route53**: [`Route53Directory`] pages through `ListResourceRecordSets`
//! - Anything else implementing [`RecordDirectory`] (tests use an in-memory directory)

use std::fmt;

use async_trait::async_trait;

pub mod error;
pub mod record;
pub mod resolver;
pub mod route53;
pub mod target;

pub use error::{ResolverError, Result};
pub use record::{PageToken, Record, RecordPage};
pub use resolver::{DEFAULT_RECORD_MARKER, TargetResolver};
pub use route53::Route53Directory;
pub use target::{DEFAULT_TARGET_PORT, Target, TargetSequence};

/// A paginated source of DNS-style records
#[async_trait]
pub trait RecordDirectory: Send + Sync + fmt::Debug {
    /// Fetch one page of records
    ///
    /// # Arguments
    ///
    /// * `zone_id` - Opaque zone identifier (a Route53 hosted zone ID)
    /// * `start` - Continuation token from the previous page, `None` for the first page
    ///
    /// # Errors
    ///
    /// Returns `ResolverError` if the directory cannot be queried
    async fn list_page(&self, zone_id: &str, start: Option<&PageToken>) -> Result<RecordPage>;
}
