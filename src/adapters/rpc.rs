use alloy::primitives::Address;
use alloy::providers::{DynProvider, Provider, ProviderBuilder};
use alloy::rpc::types::Filter;
use async_trait::async_trait;
use tracing::{debug, info};

use super::contract_logs::{decode_logs, event_signatures};
use crate::config::ChainConfig;
use crate::domain::ChainEvent;
use crate::error::{PredictronError, Result};
use crate::services::EventSource;

/// Arena logs over JSON-RPC (`eth_blockNumber` / `eth_getLogs`)
pub struct RpcEventSource {
    chain_id: u64,
    contract: Address,
    provider: DynProvider,
}

impl RpcEventSource {
    pub fn connect(chain: &ChainConfig) -> Result<Self> {
        let contract: Address = chain
            .contract_address
            .parse()
            .map_err(|e| PredictronError::AddressParsing(format!("{}: {}", chain.contract_address, e)))?;
        let url = chain
            .rpc_url
            .parse()
            .map_err(|e| PredictronError::Validation(format!("rpc_url {}: {}", chain.rpc_url, e)))?;

        let provider = ProviderBuilder::new().connect_http(url).erased();
        info!(
            "RPC source for chain {} ready (contract {})",
            chain.chain_id, contract
        );

        Ok(Self {
            chain_id: chain.chain_id,
            contract,
            provider,
        })
    }
}

#[async_trait]
impl EventSource for RpcEventSource {
    fn chain_id(&self) -> u64 {
        self.chain_id
    }

    async fn latest_block(&self) -> Result<u64> {
        Ok(self.provider.get_block_number().await?)
    }

    async fn fetch_events(&self, from_block: u64, to_block: u64) -> Result<Vec<ChainEvent>> {
        let filter = Filter::new()
            .address(self.contract)
            .event_signature(event_signatures())
            .from_block(from_block)
            .to_block(to_block);

        let logs = self.provider.get_logs(&filter).await?;
        debug!(
            "Chain {}: {} logs in blocks {}..={}",
            self.chain_id,
            logs.len(),
            from_block,
            to_block
        );

        decode_logs(self.chain_id, &logs)
    }
}
