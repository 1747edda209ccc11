use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A UTXO row as maintained by the chain indexer.
///
/// `amount` is stored as text in BTC units; `used` and `pending` are 0/1 flags.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Utxo {
    pub id: i32,
    pub txid: String,
    pub vout: i32,
    pub amount: String,
    pub used: i32,
    pub address: String,
    pub scriptpubkey: String,
    pub coin_symbol: String,
    pub pending: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UtxoResponse {
    pub address: String,
    pub txid: String,
    pub vout: i32,
    pub amount: String,
    #[serde(rename = "scriptPubKey")]
    pub script_pub_key: String,
}

impl From<Utxo> for UtxoResponse {
    fn from(utxo: Utxo) -> Self {
        UtxoResponse {
            amount: format_amount(&utxo.amount),
            address: utxo.address,
            txid: utxo.txid,
            vout: utxo.vout,
            script_pub_key: utxo.scriptpubkey,
        }
    }
}

/// Render a stored amount with exactly eight decimal places.
///
/// Unparsable amounts render as zero.
pub fn format_amount(amount: &str) -> String {
    let amount = amount.trim();
    let value = Decimal::from_str(amount)
        .or_else(|_| Decimal::from_scientific(amount))
        .unwrap_or_else(|_| {
            tracing::warn!("Unparsable UTXO amount {:?}, reporting 0", amount);
            Decimal::ZERO
        });

    format!("{:.8}", value.round_dp(8))
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratedAddress {
    pub address: String,
    #[serde(rename = "privateKey")]
    pub private_key: String,
    pub encrypted: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MultisigAddressResponse {
    #[serde(rename = "redeemScript")]
    pub redeem_script: String,
    #[serde(rename = "multiSigAddress")]
    pub multi_sig_address: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_amount() {
        assert_eq!(format_amount("1.5"), "1.50000000");
        assert_eq!(format_amount("0.00000001"), "0.00000001");
        assert_eq!(format_amount("21"), "21.00000000");
        assert_eq!(format_amount("1e-8"), "0.00000001");
        assert_eq!(format_amount("garbage"), "0.00000000");
    }

    #[test]
    fn test_utxo_response_field_names() {
        let utxo = Utxo {
            id: 1,
            txid: "ab".repeat(32),
            vout: 2,
            amount: "0.1".to_string(),
            used: 0,
            address: "1BgGZ9tcN4rm9KBzDn7KprQz87SZ26SAMH".to_string(),
            scriptpubkey: "76a914751e76e8199196d454941c45d1b3a323f1433bd688ac".to_string(),
            coin_symbol: "BTC".to_string(),
            pending: 0,
        };

        let json = serde_json::to_value(UtxoResponse::from(utxo)).unwrap();
        assert_eq!(json["amount"], "0.10000000");
        assert_eq!(json["vout"], 2);
        assert_eq!(
            json["scriptPubKey"],
            "76a914751e76e8199196d454941c45d1b3a323f1433bd688ac"
        );
    }
}
