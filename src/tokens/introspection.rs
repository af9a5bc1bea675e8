use std::time::Duration;

use alloy::primitives::Address;
use alloy::providers::DynProvider;
use async_trait::async_trait;

use crate::abis::IERC20Metadata;
use crate::error::ValuationError;

/// Best-effort ERC-20 metadata reads against an arbitrary contract.
///
/// Each read fails independently; callers decide what a failure defaults to. Implementations
/// must bound every read with their own timeout and report expiry as an error.
#[async_trait]
pub trait TokenIntrospector: Send + Sync {
    async fn symbol(&self, address: &str) -> Result<String, ValuationError>;

    async fn decimals(&self, address: &str) -> Result<u8, ValuationError>;
}

/// Introspector backed by a live JSON-RPC connection.
#[derive(Clone)]
pub struct ChainIntrospector {
    provider: DynProvider,
    /// Timeout for individual RPC calls
    call_timeout: Duration,
}

impl ChainIntrospector {
    pub fn new(provider: DynProvider, call_timeout: Duration) -> Self {
        Self {
            provider,
            call_timeout,
        }
    }

    fn parse_address(address: &str) -> Result<Address, ValuationError> {
        address
            .parse()
            .map_err(|_| ValuationError::Introspection(format!("invalid address {address}")))
    }
}

#[async_trait]
impl TokenIntrospector for ChainIntrospector {
    async fn symbol(&self, address: &str) -> Result<String, ValuationError> {
        let token_contract = IERC20Metadata::new(Self::parse_address(address)?, &self.provider);

        let symbol = tokio::time::timeout(self.call_timeout, token_contract.symbol().call())
            .await
            .map_err(|_| ValuationError::Introspection(format!("symbol() timed out on {address}")))?
            .map_err(|e| ValuationError::Introspection(format!("symbol() on {address}: {e}")))?;

        Ok(symbol.to_string())
    }

    async fn decimals(&self, address: &str) -> Result<u8, ValuationError> {
        let token_contract = IERC20Metadata::new(Self::parse_address(address)?, &self.provider);

        tokio::time::timeout(self.call_timeout, token_contract.decimals().call())
            .await
            .map_err(|_| {
                ValuationError::Introspection(format!("decimals() timed out on {address}"))
            })?
            .map_err(|e| ValuationError::Introspection(format!("decimals() on {address}: {e}")))
    }
}
