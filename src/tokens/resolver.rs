use std::sync::Arc;
use std::time::Duration;

use log::{debug, warn};
use moka::future::Cache;

use super::introspection::TokenIntrospector;
use super::registry::{TokenConfig, TokenRegistry};
use crate::error::DIAGNOSTICS_TARGET;

/// How a token identity was obtained, from most to least trustworthy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub enum ResolutionSource {
    /// Exact address match in the registry
    Registry,
    /// On-chain `symbol()` matched a registry symbol at a different address
    IntrospectedRegistryMatch,
    /// Built from on-chain metadata only
    Introspected,
    /// Nothing readable; synthetic placeholder
    Unknown,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedToken {
    pub config: TokenConfig,
    pub source: ResolutionSource,
}

/// Maps raw token addresses to a [`TokenConfig`].
///
/// Resolution order:
/// 1. Registry address match
/// 2. On-chain introspection (`symbol()` and `decimals()`, each optional)
/// 3. Introspected symbol matched against the registry
/// 4. Synthetic config from whatever was readable
///
/// Never fails; the worst case is an `UNKNOWN` 18-decimal placeholder.
#[derive(Clone)]
pub struct TokenResolver {
    registry: Arc<TokenRegistry>,
    introspector: Option<Arc<dyn TokenIntrospector>>,
    /// Introspected tokens, keyed by lowercase address. Registry hits are never stored here.
    introspected: Cache<String, ResolvedToken>,
}

impl TokenResolver {
    pub fn new(
        registry: Arc<TokenRegistry>,
        introspector: Option<Arc<dyn TokenIntrospector>>,
    ) -> Self {
        // TTL ensures a token that was unreadable during an RPC hiccup gets retried eventually
        let introspected = Cache::builder()
            .max_capacity(10_000)
            .time_to_live(Duration::from_secs(3600))
            .build();

        Self {
            registry,
            introspector,
            introspected,
        }
    }

    pub async fn resolve(&self, address: &str) -> TokenConfig {
        self.resolve_detailed(address).await.config
    }

    pub async fn resolve_detailed(&self, address: &str) -> ResolvedToken {
        let address = address.to_lowercase();

        if let Some(token) = self.registry.lookup_by_address(&address) {
            return ResolvedToken {
                config: token.clone(),
                source: ResolutionSource::Registry,
            };
        }

        if let Some(cached) = self.introspected.get(&address).await {
            return cached;
        }

        let Some(introspector) = &self.introspector else {
            warn!(
                target: DIAGNOSTICS_TARGET,
                "unknown_token address={} reason=no chain connection", address
            );
            return ResolvedToken {
                config: TokenConfig::synthetic(&address, None, None),
                source: ResolutionSource::Unknown,
            };
        };

        // Implementations bound each read with their own timeout
        let (symbol, decimals) =
            tokio::join!(introspector.symbol(&address), introspector.decimals(&address));

        let symbol = symbol
            .map_err(|e| debug!("symbol() unavailable for {}: {}", address, e))
            .ok()
            .filter(|s| !s.trim().is_empty());
        let decimals = decimals
            .map_err(|e| debug!("decimals() unavailable for {}: {}", address, e))
            .ok();

        let readable = symbol.is_some() || decimals.is_some();

        let resolved = match symbol
            .as_deref()
            .and_then(|s| self.registry.lookup_by_symbol(s))
        {
            Some(known) => ResolvedToken {
                config: known.with_address(&address),
                source: ResolutionSource::IntrospectedRegistryMatch,
            },
            None if readable => ResolvedToken {
                config: TokenConfig::synthetic(&address, symbol, decimals),
                source: ResolutionSource::Introspected,
            },
            None => ResolvedToken {
                config: TokenConfig::synthetic(&address, None, None),
                source: ResolutionSource::Unknown,
            },
        };

        if resolved.config.is_unknown() {
            warn!(
                target: DIAGNOSTICS_TARGET,
                "unknown_token address={} decimals={}", address, resolved.config.decimals
            );
        }

        // Fully unreadable tokens are likely a transient RPC failure; don't pin that for an hour
        if readable {
            self.introspected.insert(address, resolved.clone()).await;
        }

        resolved
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::default_tokens;
    use crate::error::ValuationError;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const USDC: &str = "0xa0b86991c6218b36c1d19d4a2e9eb0ce3606eb48";
    const BRIDGED_USDC: &str = "0x3c499c542cef5e3811e1192ce70d8cc03d5c3359";
    const MYSTERY: &str = "0x00000000000000000000000000000000deadbeef";

    #[derive(Default)]
    struct FakeIntrospector {
        symbols: HashMap<String, String>,
        decimals: HashMap<String, u8>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl TokenIntrospector for FakeIntrospector {
        async fn symbol(&self, address: &str) -> Result<String, ValuationError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.symbols
                .get(address)
                .cloned()
                .ok_or_else(|| ValuationError::Introspection("reverted".to_string()))
        }

        async fn decimals(&self, address: &str) -> Result<u8, ValuationError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.decimals
                .get(address)
                .copied()
                .ok_or_else(|| ValuationError::Introspection("reverted".to_string()))
        }
    }

    fn resolver(introspector: Option<Arc<FakeIntrospector>>) -> TokenResolver {
        let registry = Arc::new(TokenRegistry::from_settings(&default_tokens(), "USDC").unwrap());
        TokenResolver::new(
            registry,
            introspector.map(|i| i as Arc<dyn TokenIntrospector>),
        )
    }

    #[tokio::test]
    async fn test_registry_hit_skips_introspection() {
        let fake = Arc::new(FakeIntrospector::default());
        let resolver = resolver(Some(fake.clone()));

        let resolved = resolver.resolve_detailed(&USDC.to_uppercase().replace("0X", "0x")).await;
        assert_eq!(resolved.source, ResolutionSource::Registry);
        assert_eq!(resolved.config.symbol, "USDC");
        assert_eq!(fake.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_introspected_symbol_adopts_registry_entry() {
        let mut fake = FakeIntrospector::default();
        fake.symbols.insert(BRIDGED_USDC.to_string(), "USDC".to_string());
        let resolver = resolver(Some(Arc::new(fake)));

        let resolved = resolver.resolve_detailed(BRIDGED_USDC).await;
        assert_eq!(resolved.source, ResolutionSource::IntrospectedRegistryMatch);
        assert_eq!(resolved.config.decimals, 6);
        assert_eq!(resolved.config.price_feed_id.as_deref(), Some("usd-coin"));
        assert_eq!(resolved.config.address.as_deref(), Some(BRIDGED_USDC));
    }

    #[tokio::test]
    async fn test_partial_introspection_keeps_what_was_read() {
        let mut fake = FakeIntrospector::default();
        fake.decimals.insert(MYSTERY.to_string(), 9);
        let resolver = resolver(Some(Arc::new(fake)));

        let resolved = resolver.resolve_detailed(MYSTERY).await;
        assert_eq!(resolved.source, ResolutionSource::Introspected);
        assert_eq!(resolved.config.symbol, "UNKNOWN");
        assert_eq!(resolved.config.decimals, 9);
    }

    #[tokio::test]
    async fn test_unreadable_token_degrades_to_unknown() {
        let resolver = resolver(Some(Arc::new(FakeIntrospector::default())));

        let config = resolver.resolve(MYSTERY).await;
        assert_eq!(config.symbol, "UNKNOWN");
        assert_eq!(config.decimals, 18);
        assert!(config.price_feed_id.is_none());
    }

    #[tokio::test]
    async fn test_no_chain_connection_degrades_to_unknown() {
        let resolved = resolver(None).resolve_detailed(MYSTERY).await;
        assert_eq!(resolved.source, ResolutionSource::Unknown);
        assert_eq!(resolved.config.decimals, 18);
    }

    #[tokio::test]
    async fn test_introspected_tokens_are_cached() {
        let mut fake = FakeIntrospector::default();
        fake.symbols.insert(MYSTERY.to_string(), "PEPE".to_string());
        fake.decimals.insert(MYSTERY.to_string(), 18);
        let fake = Arc::new(fake);
        let resolver = resolver(Some(fake.clone()));

        let first = resolver.resolve(MYSTERY).await;
        let second = resolver.resolve(MYSTERY).await;
        assert_eq!(first, second);
        assert_eq!(first.symbol, "PEPE");
        assert_eq!(fake.calls.load(Ordering::SeqCst), 2);
    }
}
