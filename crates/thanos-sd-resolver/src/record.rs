//! Directory record types and paging

/// A record returned by the directory listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    /// Fully qualified record name (Route53 returns it with a trailing dot)
    pub name: String,

    /// Record type (e.g., "CNAME", "A")
    pub record_type: String,
}

impl Record {
    /// Create a new record
    pub fn new(name: impl Into<String>, record_type: impl Into<String>) -> Self {
        Self { name: name.into(), record_type: record_type.into() }
    }
}

/// Where the next page of a listing starts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageToken {
    /// First record name of the next page
    pub name: String,

    /// First record type of the next page
    pub record_type: Option<String>,

    /// Set identifier, for weighted/latency/failover record sets
    pub identifier: Option<String>,
}

/// One page of a record listing
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordPage {
    /// Records on this page, in directory order
    pub records: Vec<Record>,

    /// Continuation token; `None` on the last page
    pub next: Option<PageToken>,
}

impl RecordPage {
    /// A final page
    pub fn last(records: Vec<Record>) -> Self {
        Self { records, next: None }
    }

    /// A page followed by another one
    pub fn truncated(records: Vec<Record>, next: PageToken) -> Self {
        Self { records, next: Some(next) }
    }
}
