//! Bitcoin legacy transaction signing engine
//!
//! Key material, Base58Check addresses, script construction, the raw transaction
//! codec and the per-input legacy sighash signer. Everything here is synchronous
//! and stateless; callers own the private keys for the duration of one call.

pub mod address;
pub mod keys;
pub mod multisig;
pub mod script;
pub mod signer;
pub mod transaction;

pub use address::{hash160, multisig_address, to_address, validate_address};
pub use keys::{compress_public_key, private_key_to_wif, KeyPair};
pub use multisig::MultisigCoordinator;
pub use script::{multisig_redeem_script, multisig_redeem_script_from_hex};
pub use signer::SigningEngine;
pub use transaction::{Transaction, TxIn, TxOut};

/// Bitcoin protocol constants
pub mod constants {
    /// Mainnet P2PKH address version byte
    pub const P2PKH_VERSION: u8 = 0x00;

    /// Mainnet P2SH address version byte
    pub const P2SH_VERSION: u8 = 0x05;

    /// Mainnet WIF private key prefix
    pub const WIF_PREFIX: u8 = 0x80;

    /// WIF suffix marking a compressed public key
    pub const WIF_COMPRESSED_FLAG: u8 = 0x01;

    /// The only sighash type this engine produces
    pub const SIGHASH_ALL: u32 = 0x01;

    pub const PRIVATE_KEY_SIZE: usize = 32;
    pub const RAW_PUBLIC_KEY_SIZE: usize = 64;
    pub const COMPRESSED_PUBLIC_KEY_SIZE: usize = 33;
    pub const HASH160_SIZE: usize = 20;
    pub const CHECKSUM_SIZE: usize = 4;

    /// Upper bound on keys in a standard CHECKMULTISIG redeem script
    pub const MAX_MULTISIG_KEYS: usize = 16;
}

/// Error types for the signing engine
#[derive(Debug, thiserror::Error)]
pub enum SigningError {
    #[error("Invalid key length: expected {expected} bytes, got {actual}")]
    InvalidKeyLength { expected: usize, actual: usize },

    #[error("Invalid threshold: {required}-of-{total} (need 1 <= m <= n <= 16)")]
    InvalidThreshold { required: usize, total: usize },

    #[error("Invalid private key: {0}")]
    InvalidPrivateKey(String),

    #[error("Invalid public key: {0}")]
    InvalidPublicKey(String),

    #[error("Invalid hex: {0}")]
    InvalidHex(#[from] hex::FromHexError),

    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error("Invalid input: {0}")]
    InputValidation(String),

    #[error("Malformed transaction: {0}")]
    MalformedTransaction(String),

    #[error("Malformed signature: {0}")]
    MalformedSignature(String),

    #[error("Crypto failure: {0}")]
    CryptoFailure(String),

    #[error("Signature self-check failed for input {input_index}")]
    SignatureSelfCheckFailed { input_index: usize },
}

impl SigningError {
    /// True for every error caused by bad caller input rather than by the engine
    pub fn is_input_validation(&self) -> bool {
        matches!(
            self,
            SigningError::InvalidKeyLength { .. }
                | SigningError::InvalidThreshold { .. }
                | SigningError::InvalidPrivateKey(_)
                | SigningError::InvalidPublicKey(_)
                | SigningError::InvalidHex(_)
                | SigningError::InvalidAddress(_)
                | SigningError::InputValidation(_)
        )
    }
}

/// Result type for signing engine operations
pub type SigningResult<T> = Result<T, SigningError>;

/// `SHA256(SHA256(data))`
pub(crate) fn double_sha256(data: &[u8]) -> [u8; 32] {
    use sha2::{Digest, Sha256};

    let first = Sha256::digest(data);
    let second = Sha256::digest(first);

    let mut output = [0u8; 32];
    output.copy_from_slice(&second);
    output
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_double_sha256_empty() {
        // Well-known SHA256d of the empty string
        assert_eq!(
            hex::encode(double_sha256(&[])),
            "5df6e0e2761359d30a8275058e299fcc0381534545f55cf43e41983f5d4c9456"
        );
    }

    #[test]
    fn test_input_validation_classification() {
        assert!(SigningError::InvalidThreshold { required: 0, total: 3 }.is_input_validation());
        assert!(SigningError::InvalidKeyLength { expected: 32, actual: 31 }.is_input_validation());
        assert!(!SigningError::MalformedTransaction("eof".into()).is_input_validation());
        assert!(!SigningError::SignatureSelfCheckFailed { input_index: 0 }.is_input_validation());
    }
}
