//! Record listing, filtering and normalization into store targets

use std::sync::Arc;

use tracing::{debug, info};

use crate::{Record, RecordDirectory, ResolverError, Result, Target, TargetSequence};

/// Substring identifying Thanos store gRPC records
pub const DEFAULT_RECORD_MARKER: &str = "-grpc.";

/// Resolves the desired store targets from a record directory
#[derive(Debug, Clone)]
pub struct TargetResolver {
    directory: Arc<dyn RecordDirectory>,
    marker: String,
    port: u16,
}

impl TargetResolver {
    /// Create a resolver with the default record marker and target port
    pub fn new(directory: Arc<dyn RecordDirectory>) -> Self {
        Self {
            directory,
            marker: DEFAULT_RECORD_MARKER.to_string(),
            port: crate::DEFAULT_TARGET_PORT,
        }
    }

    /// Override the record name marker
    pub fn with_marker(mut self, marker: impl Into<String>) -> Self {
        self.marker = marker.into();
        self
    }

    /// Override the port appended to every target
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// List every record in the zone, following continuation tokens
    ///
    /// Errors from the directory are returned unchanged; nothing is retried here.
    pub async fn list_all_records(&self, zone_id: &str) -> Result<Vec<Record>> {
        let mut records = Vec::new();
        let mut next = None;
        let mut pages = 0usize;

        loop {
            let page = self.directory.list_page(zone_id, next.as_ref()).await?;
            pages += 1;
            records.extend(page.records);

            match page.next {
                Some(token) if token.name.is_empty() => {
                    return Err(ResolverError::InvalidResponse(format!(
                        "page {} of zone {} is truncated but has no next record name",
                        pages, zone_id
                    )));
                },
                Some(token) => {
                    debug!(
                        zone_id = %zone_id,
                        page = pages,
                        next_name = %token.name,
                        "Following record page"
                    );
                    next = Some(token);
                },
                None => break,
            }
        }

        debug!(zone_id = %zone_id, pages = pages, records = records.len(), "Listed zone records");
        Ok(records)
    }

    /// Keep the names of records carrying the store marker, in listing order
    pub fn filter_store_records(&self, records: &[Record]) -> Vec<String> {
        records.iter().filter(|r| r.name.contains(&self.marker)).map(|r| r.name.clone()).collect()
    }

    /// Append the store port to each record name
    pub fn add_port_to_targets(&self, names: &[String]) -> TargetSequence {
        names.iter().map(|name| Target::new(name, self.port)).collect()
    }

    /// Resolve the desired target sequence for a zone
    ///
    /// An empty sequence is a valid result: the zone holds no store records.
    pub async fn resolve(&self, zone_id: &str) -> Result<TargetSequence> {
        let records = self.list_all_records(zone_id).await?;
        let names = self.filter_store_records(&records);

        info!(
            zone_id = %zone_id,
            records = records.len(),
            store_records = names.len(),
            marker = %self.marker,
            "Resolved store records"
        );

        Ok(self.add_port_to_targets(&names))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::{PageToken, RecordPage};

    /// Serves canned pages and remembers the token each call started from
    #[derive(Debug)]
    struct Pages {
        pages: Vec<RecordPage>,
        starts: Mutex<Vec<Option<PageToken>>>,
    }

    #[async_trait]
    impl RecordDirectory for Pages {
        async fn list_page(&self, _zone_id: &str, start: Option<&PageToken>) -> Result<RecordPage> {
            let mut starts = self.starts.lock().unwrap();
            let index = starts.len();
            starts.push(start.cloned());
            self.pages
                .get(index)
                .cloned()
                .ok_or_else(|| ResolverError::DirectoryApi("no more pages".to_string()))
        }
    }

    fn token(name: &str) -> PageToken {
        PageToken { name: name.to_string(), record_type: Some("CNAME".to_string()), identifier: None }
    }

    fn resolver_with(pages: Vec<RecordPage>) -> (TargetResolver, Arc<Pages>) {
        let directory = Arc::new(Pages { pages, starts: Default::default() });
        (TargetResolver::new(directory.clone()), directory)
    }

    #[tokio::test]
    async fn test_list_follows_continuation_tokens() {
        let (resolver, directory) = resolver_with(vec![
            RecordPage::truncated(vec![Record::new("a-grpc.zone.", "CNAME")], token("b")),
            RecordPage::truncated(vec![Record::new("b.zone.", "A")], token("c")),
            RecordPage::last(vec![Record::new("c-grpc.zone.", "CNAME")]),
        ]);

        let records = resolver.list_all_records("Z1").await.unwrap();

        assert_eq!(records.len(), 3);
        let starts = directory.starts.lock().unwrap().clone();
        assert_eq!(starts, vec![None, Some(token("b")), Some(token("c"))]);
    }

    #[tokio::test]
    async fn test_truncated_page_without_name_is_invalid() {
        let (resolver, _) = resolver_with(vec![RecordPage::truncated(vec![], token(""))]);

        let err = resolver.list_all_records("Z1").await.unwrap_err();
        assert!(matches!(err, ResolverError::InvalidResponse(_)));
    }

    #[tokio::test]
    async fn test_directory_error_is_returned_as_is() {
        let (resolver, _) = resolver_with(vec![]);

        let err = resolver.resolve("Z1").await.unwrap_err();
        assert!(matches!(err, ResolverError::DirectoryApi(msg) if msg == "no more pages"));
    }

    #[test]
    fn test_filter_keeps_marker_records_in_order() {
        let (resolver, _) = resolver_with(vec![]);
        let records = vec![
            Record::new("z-grpc.zone.", "CNAME"),
            Record::new("query.zone.", "CNAME"),
            Record::new("a-grpc.zone.", "CNAME"),
            Record::new("grpc.zone.", "CNAME"),
        ];

        let names = resolver.filter_store_records(&records);
        assert_eq!(names, vec!["z-grpc.zone.".to_string(), "a-grpc.zone.".to_string()]);
    }

    #[test]
    fn test_add_port_preserves_order() {
        let (resolver, _) = resolver_with(vec![]);
        let names = vec!["b-grpc.zone.".to_string(), "a-grpc.zone.".to_string()];

        let targets = resolver.add_port_to_targets(&names);
        assert_eq!(targets.to_strings(), vec!["b-grpc.zone.:10901", "a-grpc.zone.:10901"]);
    }

    #[tokio::test]
    async fn test_resolve_with_custom_marker_and_port() {
        let (resolver, _) = resolver_with(vec![RecordPage::last(vec![
            Record::new("store-sidecar.zone.", "CNAME"),
            Record::new("a-grpc.zone.", "CNAME"),
        ])]);
        let resolver = resolver.with_marker("-sidecar.").with_port(19090);

        let targets = resolver.resolve("Z1").await.unwrap();
        assert_eq!(targets.to_strings(), vec!["store-sidecar.zone.:19090"]);
    }

    #[tokio::test]
    async fn test_resolve_without_store_records_is_empty() {
        let (resolver, _) =
            resolver_with(vec![RecordPage::last(vec![Record::new("query.zone.", "CNAME")])]);

        let targets = resolver.resolve("Z1").await.unwrap();
        assert!(targets.is_empty());
    }
}
