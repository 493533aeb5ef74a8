use async_trait::async_trait;
use parking_lot::Mutex;
use thanos_sd_resolver::{PageToken, Record, RecordDirectory, RecordPage, ResolverError, Result};

/// In-memory record directory that pages like Route53
///
/// Continuation tokens point at the first record of the next page by name and type.
#[derive(Debug)]
pub struct StaticDirectory {
    records: Vec<Record>,
    page_size: usize,
    failure: Option<String>,
    calls: Mutex<Vec<Option<PageToken>>>,
}

impl StaticDirectory {
    /// Directory serving every record on a single page
    pub fn new(records: Vec<Record>) -> Self {
        Self { records, page_size: usize::MAX, failure: None, calls: Mutex::new(Vec::new()) }
    }

    /// Directory of `(name, type)` pairs
    pub fn from_pairs(pairs: &[(&str, &str)]) -> Self {
        Self::new(pairs.iter().map(|(name, kind)| Record::new(*name, *kind)).collect())
    }

    /// Directory whose every call fails with a directory API error
    pub fn failing(message: impl Into<String>) -> Self {
        Self { failure: Some(message.into()), ..Self::new(Vec::new()) }
    }

    /// Serve at most `page_size` records per page
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Number of pages requested so far
    pub fn calls(&self) -> usize {
        self.calls.lock().len()
    }

    /// Continuation tokens received, in call order
    pub fn tokens(&self) -> Vec<Option<PageToken>> {
        self.calls.lock().clone()
    }

    fn start_index(&self, start: Option<&PageToken>) -> usize {
        let Some(token) = start else {
            return 0;
        };
        self.records
            .iter()
            .position(|r| {
                r.name == token.name
                    && token.record_type.as_deref().is_none_or(|t| t == r.record_type)
            })
            .unwrap_or(self.records.len())
    }
}

#[async_trait]
impl RecordDirectory for StaticDirectory {
    async fn list_page(&self, _zone_id: &str, start: Option<&PageToken>) -> Result<RecordPage> {
        self.calls.lock().push(start.cloned());

        if let Some(message) = &self.failure {
            return Err(ResolverError::DirectoryApi(message.clone()));
        }

        let from = self.start_index(start);
        let to = from.saturating_add(self.page_size).min(self.records.len());
        let records = self.records[from..to].to_vec();

        Ok(match self.records.get(to) {
            Some(next) => RecordPage::truncated(
                records,
                PageToken {
                    name: next.name.clone(),
                    record_type: Some(next.record_type.clone()),
                    identifier: None,
                },
            ),
            None => RecordPage::last(records),
        })
    }
}
