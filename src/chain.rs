//! `EventSource` backed by an Ethereum JSON-RPC node.

use std::future::Future;
use std::time::Duration;

use alloy::primitives::Address;
use alloy::providers::{Provider, RootProvider};
use alloy::rpc::types::{Filter, Log};
use alloy::sol;
use alloy::sol_types::SolEvent;
use alloy::transports::http::{Client, Http};
use anyhow::{Context, Result};
use async_trait::async_trait;
use tracing::warn;
use url::Url;

use crate::error::{VerifyError, VerifyResult};
use crate::registry::EventSource;
use crate::types::ApplicationEvent;

sol! {
    /// Emitted by `TwitterHumanityApplicant` for every application.
    event Apply(uint256 indexed proposalId, address indexed applicant, string username);
}

pub struct RpcEventSource {
    provider: RootProvider<Http<Client>>,
    registry: Address,
    timeout: Duration,
}

impl RpcEventSource {
    pub fn new(rpc_url: &str, registry: Address, timeout: Duration) -> Result<Self> {
        let url: Url = rpc_url
            .parse()
            .with_context(|| format!("invalid RPC URL {rpc_url}"))?;
        Ok(Self {
            provider: RootProvider::new_http(url),
            registry,
            timeout,
        })
    }

    /// Run an RPC call, mapping timeouts and transport errors to
    /// `RegistryUnavailable`.
    async fn call<T, E, F>(&self, what: &str, fut: F) -> VerifyResult<T>
    where
        F: Future<Output = Result<T, E>>,
        E: std::fmt::Display,
    {
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => Err(VerifyError::registry(format!("{what}: {e}"))),
            Err(_) => Err(VerifyError::registry(format!(
                "{what}: timed out after {}s",
                self.timeout.as_secs()
            ))),
        }
    }

    fn filter(&self, from_block: u64, to_block: u64, applicant: Option<Address>) -> Filter {
        let filter = Filter::new()
            .address(self.registry)
            .event_signature(Apply::SIGNATURE_HASH)
            .from_block(from_block)
            .to_block(to_block);
        match applicant {
            Some(addr) => filter.topic2(addr.into_word()),
            None => filter,
        }
    }
}

#[async_trait]
impl EventSource for RpcEventSource {
    async fn head_height(&self) -> VerifyResult<u64> {
        self.call("eth_blockNumber", self.provider.get_block_number())
            .await
    }

    async fn query_events(
        &self,
        from_block: u64,
        to_block: u64,
        applicant: Option<Address>,
    ) -> VerifyResult<Vec<ApplicationEvent>> {
        let filter = self.filter(from_block, to_block, applicant);
        let logs = self.call("eth_getLogs", self.provider.get_logs(&filter)).await?;
        Ok(logs.iter().filter_map(decode_apply).collect())
    }
}

/// Decode an `Apply` log, skipping anything malformed.
fn decode_apply(log: &Log) -> Option<ApplicationEvent> {
    match log.log_decode::<Apply>() {
        Ok(decoded) => {
            let Apply {
                proposalId: proposal_id,
                applicant,
                username,
            } = decoded.inner.data;
            Some(ApplicationEvent {
                proposal_id,
                applicant,
                username,
                block_number: log.block_number,
            })
        }
        Err(e) => {
            warn!(
                "Skipping undecodable log at block {:?}: {e}",
                log.block_number
            );
            None
        }
    }
}
