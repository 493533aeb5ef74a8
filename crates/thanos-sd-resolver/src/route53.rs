//! Route53 record directory
//!
//! Pages through `ListResourceRecordSets` for a private hosted zone. Listing starts at
//! name `c` / type `CNAME`, where the store records live.

use async_trait::async_trait;
use aws_config::{BehaviorVersion, meta::region::RegionProviderChain};
use aws_sdk_route53::{
    Client, error::DisplayErrorContext,
    operation::list_resource_record_sets::ListResourceRecordSetsOutput, types::RrType,
};
use tracing::debug;

use crate::{PageToken, Record, RecordDirectory, RecordPage, ResolverError, Result};

const START_RECORD_NAME: &str = "c";

/// Route53 is a global service; its API lives in us-east-1
const FALLBACK_REGION: &str = "us-east-1";

/// Record directory backed by the Route53 API
#[derive(Debug, Clone)]
pub struct Route53Directory {
    client: Client,
}

impl Route53Directory {
    /// Wrap an existing Route53 client
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Build a client from the ambient AWS configuration (env, profile, IRSA, IMDS)
    pub async fn from_env() -> Self {
        let region = RegionProviderChain::default_provider().or_else(FALLBACK_REGION);
        let config = aws_config::defaults(BehaviorVersion::latest()).region(region).load().await;
        Self::new(Client::new(&config))
    }
}

#[async_trait]
impl RecordDirectory for Route53Directory {
    async fn list_page(&self, zone_id: &str, start: Option<&PageToken>) -> Result<RecordPage> {
        let mut request = self.client.list_resource_record_sets().hosted_zone_id(zone_id);

        request = match start {
            None => request.start_record_name(START_RECORD_NAME).start_record_type(RrType::Cname),
            Some(token) => {
                let mut request = request.start_record_name(&token.name);
                if let Some(ref record_type) = token.record_type {
                    request = request.start_record_type(RrType::from(record_type.as_str()));
                }
                if let Some(ref identifier) = token.identifier {
                    request = request.start_record_identifier(identifier);
                }
                request
            },
        };

        let output = request.send().await.map_err(|e| {
            ResolverError::DirectoryApi(format!(
                "Failed to list record sets for hosted zone {}: {}",
                zone_id,
                DisplayErrorContext(&e)
            ))
        })?;

        page_from_output(zone_id, &output)
    }
}

/// Map one `ListResourceRecordSets` response onto a record page
///
/// # Errors
///
/// Returns `ResolverError::InvalidResponse` for a truncated response without
/// `NextRecordName`, which would otherwise restart the listing from the top.
fn page_from_output(zone_id: &str, output: &ListResourceRecordSetsOutput) -> Result<RecordPage> {
    let records: Vec<Record> = output
        .resource_record_sets()
        .iter()
        .map(|rrset| Record::new(rrset.name(), rrset.r#type().as_str()))
        .collect();

    debug!(
        zone_id = %zone_id,
        count = records.len(),
        truncated = output.is_truncated(),
        "Fetched Route53 record page"
    );

    if !output.is_truncated() {
        return Ok(RecordPage::last(records));
    }

    let name = output.next_record_name().filter(|n| !n.is_empty()).ok_or_else(|| {
        ResolverError::InvalidResponse(format!(
            "Route53 listing for {} is truncated without NextRecordName",
            zone_id
        ))
    })?;

    let next = PageToken {
        name: name.to_string(),
        record_type: output.next_record_type().map(|t| t.as_str().to_string()),
        identifier: output.next_record_identifier().map(str::to_string),
    };

    Ok(RecordPage::truncated(records, next))
}
