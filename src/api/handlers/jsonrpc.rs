use actix_web::{web, HttpResponse};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

use crate::error::{AppError, AppResult};
use crate::services::{SigningService, WalletService};

const CODE_FAILURE: i32 = -1;
const CODE_PARSE_ERROR: i32 = -32700;
const CODE_METHOD_NOT_FOUND: i32 = -32601;

#[derive(Debug, Deserialize)]
pub struct JsonRpcRequest {
    #[serde(default)]
    pub id: Value,
    #[serde(default)]
    pub jsonrpc: Option<String>,
    pub method: String,
    #[serde(default)]
    pub params: Vec<Value>,
}

#[derive(Debug, Serialize)]
pub struct JsonRpcResponse {
    pub id: Value,
    pub result: Value,
    pub error: Option<RpcError>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RpcError {
    pub code: i32,
    pub message: String,
}

impl RpcError {
    fn failure(message: impl Into<String>) -> Self {
        Self {
            code: CODE_FAILURE,
            message: message.into(),
        }
    }
}

impl JsonRpcResponse {
    fn success(id: Value, result: Value) -> Self {
        Self {
            id,
            result,
            error: None,
        }
    }

    fn failure(id: Value, error: RpcError) -> Self {
        Self {
            id,
            result: Value::Null,
            error: Some(error),
        }
    }
}

/// A wallet method with its positional params already validated
#[derive(Debug, Clone, PartialEq)]
pub enum RpcCall {
    GenerateAddress {
        count: usize,
    },
    SignTransaction {
        raw_tx: String,
        encrypted_key: String,
    },
    GenerateMultiAddress {
        required: usize,
        public_keys: Vec<String>,
    },
    MultiSignTransaction {
        raw_tx: String,
        encrypted_keys: Vec<String>,
        redeem_script: String,
    },
    ImportAddresses {
        addresses: Vec<String>,
    },
    QueryUtxos {
        address: String,
    },
}

impl RpcCall {
    pub fn parse(method: &str, params: &[Value]) -> Result<Self, RpcError> {
        match method {
            "generate_address" => {
                check_arity(method, params, 1, 1)?;
                Ok(Self::GenerateAddress {
                    count: count_param(method, &params[0])?,
                })
            }
            // The trailing utxo list is accepted and ignored
            "sign_transaction" => {
                check_arity(method, params, 2, 3)?;
                Ok(Self::SignTransaction {
                    raw_tx: string_param(method, params, 0)?,
                    encrypted_key: string_param(method, params, 1)?,
                })
            }
            "generate_multi_address" => {
                check_arity(method, params, 2, 2)?;
                Ok(Self::GenerateMultiAddress {
                    required: count_param(method, &params[0])?,
                    public_keys: comma_list(method, &string_param(method, params, 1)?)?,
                })
            }
            "multi_sign_transaction" => {
                check_arity(method, params, 3, 4)?;
                Ok(Self::MultiSignTransaction {
                    raw_tx: string_param(method, params, 0)?,
                    encrypted_keys: comma_list(method, &string_param(method, params, 1)?)?,
                    redeem_script: string_param(method, params, 2)?,
                })
            }
            "import_addresses" => {
                if params.is_empty() {
                    return Err(RpcError::failure(format!("{}: expected at least one address", method)));
                }
                let addresses = (0..params.len())
                    .map(|i| string_param(method, params, i))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Self::ImportAddresses { addresses })
            }
            "query_utxos" => {
                check_arity(method, params, 1, 1)?;
                Ok(Self::QueryUtxos {
                    address: string_param(method, params, 0)?,
                })
            }
            _ => Err(RpcError {
                code: CODE_METHOD_NOT_FOUND,
                message: format!("Method not found: {}", method),
            }),
        }
    }

    pub fn method_name(&self) -> &'static str {
        match self {
            Self::GenerateAddress { .. } => "generate_address",
            Self::SignTransaction { .. } => "sign_transaction",
            Self::GenerateMultiAddress { .. } => "generate_multi_address",
            Self::MultiSignTransaction { .. } => "multi_sign_transaction",
            Self::ImportAddresses { .. } => "import_addresses",
            Self::QueryUtxos { .. } => "query_utxos",
        }
    }
}

fn check_arity(method: &str, params: &[Value], min: usize, max: usize) -> Result<(), RpcError> {
    if params.len() < min || params.len() > max {
        let expected = if min == max {
            min.to_string()
        } else {
            format!("{} to {}", min, max)
        };
        return Err(RpcError::failure(format!(
            "{}: expected {} params, got {}",
            method,
            expected,
            params.len()
        )));
    }
    Ok(())
}

fn string_param(method: &str, params: &[Value], index: usize) -> Result<String, RpcError> {
    match params.get(index) {
        Some(Value::String(s)) => Ok(s.trim().to_string()),
        _ => Err(RpcError::failure(format!(
            "{}: param {} must be a string",
            method, index
        ))),
    }
}

/// Accepts `3` as well as `"3"`
fn count_param(method: &str, value: &Value) -> Result<usize, RpcError> {
    let parsed = match value {
        Value::Number(n) => n.as_u64().and_then(|n| usize::try_from(n).ok()),
        Value::String(s) => s.trim().parse::<usize>().ok(),
        _ => None,
    };
    parsed.ok_or_else(|| {
        RpcError::failure(format!(
            "{}: expected a non-negative integer, got {}",
            method, value
        ))
    })
}

fn comma_list(method: &str, text: &str) -> Result<Vec<String>, RpcError> {
    let items: Vec<String> = text.split(',').map(|s| s.trim().to_string()).collect();
    if items.iter().any(String::is_empty) {
        return Err(RpcError::failure(format!(
            "{}: empty entry in comma-separated list",
            method
        )));
    }
    Ok(items)
}

async fn dispatch(
    call: RpcCall,
    wallet_service: &WalletService,
    signing_service: &SigningService,
) -> AppResult<Value> {
    let result = match call {
        RpcCall::GenerateAddress { count } => {
            to_json(wallet_service.generate_addresses(count).await?)?
        }
        RpcCall::SignTransaction {
            raw_tx,
            encrypted_key,
        } => Value::String(signing_service.sign_transaction(&raw_tx, &encrypted_key).await?),
        RpcCall::GenerateMultiAddress {
            required,
            public_keys,
        } => to_json(wallet_service.generate_multisig_address(required, &public_keys)?)?,
        RpcCall::MultiSignTransaction {
            raw_tx,
            encrypted_keys,
            redeem_script,
        } => Value::String(
            signing_service
                .multi_sign_transaction(&raw_tx, &encrypted_keys, &redeem_script)
                .await?,
        ),
        RpcCall::ImportAddresses { addresses } => {
            wallet_service.import_addresses(&addresses).await?;
            Value::Null
        }
        RpcCall::QueryUtxos { address } => to_json(wallet_service.query_utxos(&address).await?)?,
    };
    Ok(result)
}

fn to_json<T: Serialize>(value: T) -> AppResult<Value> {
    serde_json::to_value(value)
        .map_err(|e| AppError::InternalError(format!("Failed to serialize result: {}", e)))
}

/// JSON-RPC endpoint for all wallet methods. Failures are reported in the
/// `error` member with HTTP 200.
pub async fn wallet_rpc(
    body: web::Bytes,
    wallet_service: web::Data<Arc<WalletService>>,
    signing_service: web::Data<Arc<SigningService>>,
) -> HttpResponse {
    let request: JsonRpcRequest = match serde_json::from_slice(&body) {
        Ok(request) => request,
        Err(e) => {
            tracing::warn!("Unparsable JSON-RPC body: {}", e);
            return HttpResponse::Ok().json(JsonRpcResponse::failure(
                Value::Null,
                RpcError {
                    code: CODE_PARSE_ERROR,
                    message: format!("Parse error: {}", e),
                },
            ));
        }
    };

    let id = request.id;
    let call = match RpcCall::parse(&request.method, &request.params) {
        Ok(call) => call,
        Err(error) => {
            tracing::warn!("Rejected {} call: {}", request.method, error.message);
            return HttpResponse::Ok().json(JsonRpcResponse::failure(id, error));
        }
    };

    let method = call.method_name();
    tracing::debug!(
        "Dispatching {} (jsonrpc {})",
        method,
        request.jsonrpc.as_deref().unwrap_or("-")
    );

    match dispatch(call, &wallet_service, &signing_service).await {
        Ok(result) => HttpResponse::Ok().json(JsonRpcResponse::success(id, result)),
        Err(e) => {
            if e.is_client_error() {
                tracing::warn!("{} failed: {}", method, e);
            } else {
                tracing::error!("{} failed: {}", method, e);
            }
            HttpResponse::Ok().json(JsonRpcResponse::failure(id, RpcError::failure(e.to_string())))
        }
    }
}
