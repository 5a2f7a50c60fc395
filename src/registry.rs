use std::sync::Arc;

use alloy::primitives::Address;
use async_trait::async_trait;
use tracing::debug;

use crate::error::VerifyResult;
use crate::types::ApplicationEvent;

/// Raw access to the chain's `Apply` event log.
#[async_trait]
pub trait EventSource: Send + Sync {
    /// Current head block height.
    async fn head_height(&self) -> VerifyResult<u64>;

    /// `Apply` events with block number in `[from_block, to_block]`,
    /// optionally restricted to one applicant, in log order.
    async fn query_events(
        &self,
        from_block: u64,
        to_block: u64,
        applicant: Option<Address>,
    ) -> VerifyResult<Vec<ApplicationEvent>>;
}

/// Read-only queries over the registry's application events.
///
/// Every call re-scans the chain; nothing is cached.
#[derive(Clone)]
pub struct RegistryClient {
    source: Arc<dyn EventSource>,
}

impl RegistryClient {
    pub fn new(source: Arc<dyn EventSource>) -> Self {
        Self { source }
    }

    pub async fn head_height(&self) -> VerifyResult<u64> {
        self.source.head_height().await
    }

    /// All events in `[from_block, to_block]`, inclusive on both ends.
    pub async fn query_range(
        &self,
        from_block: u64,
        to_block: u64,
    ) -> VerifyResult<Vec<ApplicationEvent>> {
        let events = self.source.query_events(from_block, to_block, None).await?;
        debug!(
            "Fetched {} application(s) in blocks {from_block}..={to_block}",
            events.len()
        );
        Ok(events)
    }

    /// Every application ever made by `applicant`, genesis to current head.
    pub async fn query_by_applicant(
        &self,
        applicant: Address,
    ) -> VerifyResult<Vec<ApplicationEvent>> {
        let head = self.source.head_height().await?;
        let events = self.source.query_events(0, head, Some(applicant)).await?;
        debug!(
            "Fetched {} application(s) by {applicant:#x} up to block {head}",
            events.len()
        );
        Ok(events)
    }
}
