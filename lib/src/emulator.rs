//! The Emulator (§1, "gas estimation and emulation"): an external oracle the
//! Proxy calls but never implements. The validator and the ladder invoke it
//! to populate/refresh [`crate::types::exec_cfg::ExecCfg`].
use async_trait::async_trait;

use crate::{
    errors::ProxyError,
    types::{eth_tx::EthTx, exec_cfg::EmulationOutcome},
};

#[async_trait]
pub trait Emulator: Send + Sync {
    /// Emulates `tx` and returns the touched-account list, approximate step
    /// count, and any other sizing hints the ladder needs. May return
    /// [`ProxyError::Reschedule`] (§4.6, `eth_call` retries up to
    /// `retry_on_fail` on this).
    async fn emulate(&self, tx: &EthTx) -> Result<EmulationOutcome, ProxyError>;
}
