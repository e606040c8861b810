use evm_proxy_lib::errors::ProxyError;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::NeonApiState;

#[derive(Debug)]
pub struct NeonApiError(pub ProxyError);

impl From<ProxyError> for NeonApiError {
    fn from(value: ProxyError) -> Self {
        NeonApiError(value)
    }
}

/// A JSON-RPC 2.0 request envelope (§4.6).
#[derive(Debug, Deserialize)]
pub struct JsonRpcRequest {
    pub id: Value,
    pub method: String,
    #[serde(default)]
    pub params: Value,
}

fn param_str(params: &Value, index: usize) -> Result<String, ProxyError> {
    params
        .get(index)
        .and_then(Value::as_str)
        .map(ToOwned::to_owned)
        .ok_or_else(|| ProxyError::InvalidParam {
            field: format!("params[{index}]"),
            reason: "expected a string".to_owned(),
        })
}

/// Dispatches one JSON-RPC call to the worker and wraps the outcome in a
/// JSON-RPC 2.0 response object. Unknown methods and `ProxyError`s both
/// become a JSON-RPC `error` member rather than an HTTP error status —
/// matching how the reference worker surfaces `EthereumError` to callers.
pub async fn dispatch(state: &NeonApiState, request: JsonRpcRequest) -> Value {
    let result = dispatch_inner(state, &request.method, &request.params).await;

    match result {
        Ok(value) => json!({ "jsonrpc": "2.0", "id": request.id, "result": value }),
        Err(err) => json!({
            "jsonrpc": "2.0",
            "id": request.id,
            "error": { "code": err.error_code(), "message": err.to_string() },
        }),
    }
}

async fn dispatch_inner(state: &NeonApiState, method: &str, params: &Value) -> Result<Value, ProxyError> {
    let worker = &state.worker;

    // §4.8 — keep the EVM-param cache warm so `is_method_allowed` has a
    // value to gate on; a failed refresh still leaves the last-known params
    // in place (or denies everything if none were ever obtained).
    let _ = worker.refresh_evm_params().await;
    if !worker.is_method_allowed(method) {
        return Err(ProxyError::EthereumError(format!(
            "'{method}' unavailable: proxy/EVM version mismatch or EVM params not yet known"
        )));
    }

    match method {
        "eth_chainId" => Ok(worker.eth_chain_id()),
        "net_version" => Ok(worker.net_version()),
        "eth_gasPrice" => worker.eth_gas_price().await,
        "neon_gasPrice" => worker.neon_gas_price().await,
        "eth_blockNumber" => worker.eth_block_number().await,
        "eth_getBalance" => {
            let address = param_str(params, 0)?;
            let tag = param_str(params, 1).unwrap_or_else(|_| "latest".to_owned());
            worker.eth_get_balance(&address, &tag).await
        }
        "eth_getTransactionCount" => {
            let address = param_str(params, 0)?;
            let tag = param_str(params, 1).unwrap_or_else(|_| "latest".to_owned());
            worker.eth_get_transaction_count(&address, &tag).await
        }
        "eth_getTransactionReceipt" => {
            let tx_sig = param_str(params, 0)?;
            Ok(worker.eth_get_transaction_receipt(&tx_sig).await?.unwrap_or(Value::Null))
        }
        "eth_sendRawTransaction" => {
            let raw_tx = param_str(params, 0)?;
            worker.eth_send_raw_transaction(&raw_tx).await
        }
        "eth_getLogs" => {
            let filter = params.get(0).cloned().unwrap_or(Value::Null);
            let from_block = filter.get("fromBlock").and_then(Value::as_str).unwrap_or("latest").to_owned();
            let to_block = filter.get("toBlock").and_then(Value::as_str).unwrap_or("latest").to_owned();
            let addresses = match filter.get("address") {
                Some(Value::String(s)) => vec![s.clone()],
                Some(Value::Array(arr)) => arr.iter().filter_map(|v| v.as_str().map(ToOwned::to_owned)).collect(),
                _ => Vec::new(),
            };
            let topics = filter
                .get("topics")
                .and_then(Value::as_array)
                .map(|values| values.iter().filter_map(|v| v.as_str().map(ToOwned::to_owned)).collect())
                .unwrap_or_default();
            worker.eth_get_logs(&from_block, &to_block, &addresses, &topics).await
        }
        _ => Err(ProxyError::InvalidParam { field: "method".to_owned(), reason: format!("unknown method '{method}'") }),
    }
}
