//! Gas-Price & EVM-Param caches (§4.7, C8): both are TTL-by-second caches —
//! a value is recomputed the first time it's asked for in a new wall-clock
//! second and reused for the rest of that second. Grounded in the typed
//! accessor-over-a-map shape of the reference's `CachedElfParams`.
use std::{
    collections::HashMap,
    sync::RwLock,
    time::{SystemTime, UNIX_EPOCH},
};

fn current_second() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).expect("system clock before epoch").as_secs()
}

#[derive(Debug, Clone, Copy, Default)]
pub struct GasPrice {
    pub suggested_gas_price: u128,
    pub min_gas_price: u128,
    pub min_executable_gas_price: u128,
}

struct Cached<T> {
    value: T,
    refreshed_at_second: u64,
}

/// Refreshed by whatever owns the pricing oracle (not modeled here, per
/// §1's non-goal on pricing policy); this cache only governs how often
/// that refresh happens.
pub struct GasPriceCache {
    inner: RwLock<Option<Cached<GasPrice>>>,
}

impl GasPriceCache {
    #[must_use]
    pub fn new() -> Self {
        Self { inner: RwLock::new(None) }
    }

    /// Returns the cached price if it was refreshed within the current
    /// wall-clock second, otherwise `None` so the caller knows to refresh
    /// and call [`Self::set`].
    #[must_use]
    pub fn get(&self) -> Option<GasPrice> {
        let guard = self.inner.read().expect("gas price cache lock poisoned");
        guard.as_ref().filter(|cached| cached.refreshed_at_second == current_second()).map(|cached| cached.value)
    }

    /// The last value obtained, regardless of staleness — §4.8's "on failure
    /// it keeps the previous value" fallback.
    #[must_use]
    pub fn stale(&self) -> Option<GasPrice> {
        let guard = self.inner.read().expect("gas price cache lock poisoned");
        guard.as_ref().map(|cached| cached.value)
    }

    pub fn set(&self, value: GasPrice) {
        let mut guard = self.inner.write().expect("gas price cache lock poisoned");
        *guard = Some(Cached { value, refreshed_at_second: current_second() });
    }

    /// §4.8 — refresh once per wall-clock second via `refresh`; on a failed
    /// refresh, fall back to whatever value was last obtained (however
    /// stale) and only propagate the error if nothing has ever been cached.
    pub async fn get_or_refresh<F, Fut, E>(&self, refresh: F) -> Result<GasPrice, E>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Result<GasPrice, E>>,
    {
        if let Some(fresh) = self.get() {
            return Ok(fresh);
        }
        match refresh().await {
            Ok(value) => {
                self.set(value);
                Ok(value)
            }
            Err(err) => self.stale().ok_or(err),
        }
    }
}

impl Default for GasPriceCache {
    fn default() -> Self {
        Self::new()
    }
}

/// EVM config parameters (chain list, Chain-Instruction program version,
/// compute budget constants) as a typed accessor over a string map, the
/// shape the Chain program itself reports them in.
pub struct EvmParamCache {
    inner: RwLock<Option<Cached<HashMap<String, String>>>>,
}

impl EvmParamCache {
    #[must_use]
    pub fn new() -> Self {
        Self { inner: RwLock::new(None) }
    }

    #[must_use]
    pub fn get(&self) -> Option<HashMap<String, String>> {
        let guard = self.inner.read().expect("evm param cache lock poisoned");
        guard
            .as_ref()
            .filter(|cached| cached.refreshed_at_second == current_second())
            .map(|cached| cached.value.clone())
    }

    /// The last params obtained, regardless of staleness.
    #[must_use]
    pub fn stale(&self) -> Option<HashMap<String, String>> {
        let guard = self.inner.read().expect("evm param cache lock poisoned");
        guard.as_ref().map(|cached| cached.value.clone())
    }

    pub fn set(&self, params: HashMap<String, String>) {
        let mut guard = self.inner.write().expect("evm param cache lock poisoned");
        *guard = Some(Cached { value: params, refreshed_at_second: current_second() });
    }

    /// §4.8 — same refresh-or-keep-stale contract as [`GasPriceCache::get_or_refresh`].
    pub async fn get_or_refresh<F, Fut, E>(&self, refresh: F) -> Result<HashMap<String, String>, E>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Result<HashMap<String, String>, E>>,
    {
        if let Some(fresh) = self.get() {
            return Ok(fresh);
        }
        match refresh().await {
            Ok(value) => {
                self.set(value.clone());
                Ok(value)
            }
            Err(err) => self.stale().ok_or(err),
        }
    }

    /// §4.8 — the EVM-param cache gates API visibility: always-allowed
    /// read-only methods are servable as soon as *any* params are known
    /// (even stale ones), everything else requires the proxy's and the
    /// on-chain program's `NEON_EVM_VERSION` to agree on major.minor.
    #[must_use]
    pub fn method_is_allowed(&self, method: &str, proxy_version: (u32, u32)) -> bool {
        if ALWAYS_ALLOWED_METHODS.contains(&method) {
            return self.stale().is_some();
        }
        self.stale()
            .and_then(|params| params.get("NEON_EVM_VERSION").and_then(|v| parse_major_minor(v)))
            .is_some_and(|evm_version| evm_version == proxy_version)
    }
}

/// §4.8 — JSON-RPC methods servable with only the EVM params known, no
/// version-compatibility check. Everything else (chiefly the write path)
/// requires `NEON_EVM_VERSION` to match this proxy's version.
pub const ALWAYS_ALLOWED_METHODS: &[&str] = &[
    "eth_chainId",
    "net_version",
    "eth_blockNumber",
    "eth_getBalance",
    "eth_getTransactionCount",
    "eth_getTransactionReceipt",
    "eth_getLogs",
    "neon_getLogs",
    "web3_clientVersion",
];

fn parse_major_minor(version: &str) -> Option<(u32, u32)> {
    let mut parts = version.split('.');
    let major = parts.next()?.parse().ok()?;
    let minor = parts.next()?.parse().ok()?;
    Some((major, minor))
}

impl Default for EvmParamCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gas_price_cache_starts_empty() {
        let cache = GasPriceCache::new();
        assert!(cache.get().is_none());
    }

    #[test]
    fn gas_price_cache_returns_value_set_this_second() {
        let cache = GasPriceCache::new();
        cache.set(GasPrice { suggested_gas_price: 1, min_gas_price: 1, min_executable_gas_price: 1 });
        let cached = cache.get().expect("value set moments ago");
        assert_eq!(cached.suggested_gas_price, 1);
    }

    #[test]
    fn evm_param_cache_round_trips_map() {
        let cache = EvmParamCache::new();
        let mut params = HashMap::new();
        params.insert("NEON_CHAIN_ID".to_owned(), "245022940".to_owned());
        cache.set(params.clone());
        assert_eq!(cache.get(), Some(params));
    }

    #[tokio::test]
    async fn get_or_refresh_keeps_stale_value_on_failed_refresh() {
        let cache = GasPriceCache::new();
        cache.set(GasPrice { suggested_gas_price: 7, min_gas_price: 1, min_executable_gas_price: 1 });

        // Force the cached value to read as stale by backdating it; the
        // refresh closure then fails and the stale value must still win.
        {
            let mut guard = cache.inner.write().unwrap();
            guard.as_mut().unwrap().refreshed_at_second = 0;
        }

        let result: Result<GasPrice, &str> = cache.get_or_refresh(|| async { Err("oracle unreachable") }).await;
        assert_eq!(result.unwrap().suggested_gas_price, 7);
    }

    #[tokio::test]
    async fn get_or_refresh_fails_when_never_populated() {
        let cache = GasPriceCache::new();
        let result: Result<GasPrice, &str> = cache.get_or_refresh(|| async { Err("oracle unreachable") }).await;
        assert_eq!(result.unwrap_err(), "oracle unreachable");
    }

    #[test]
    fn method_is_allowed_gates_writes_on_version_match_not_reads() {
        let cache = EvmParamCache::new();
        let mut params = HashMap::new();
        params.insert("NEON_EVM_VERSION".to_owned(), "1.14.2".to_owned());
        cache.set(params);

        assert!(cache.method_is_allowed("eth_getBalance", (2, 0)));
        assert!(cache.method_is_allowed("eth_sendRawTransaction", (1, 14)));
        assert!(!cache.method_is_allowed("eth_sendRawTransaction", (1, 15)));
    }

    #[test]
    fn method_is_allowed_denies_everything_before_params_are_known() {
        let cache = EvmParamCache::new();
        assert!(!cache.method_is_allowed("eth_getBalance", (1, 0)));
        assert!(!cache.method_is_allowed("eth_sendRawTransaction", (1, 0)));
    }
}
