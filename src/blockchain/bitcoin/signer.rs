//! Legacy SIGHASH_ALL signing
//!
//! The digest for input `i` is `SHA256d(serialize(tx with input i's scriptSig set to the
//! spent script) ‖ u32_le(SIGHASH_ALL))`. Other inputs' scriptSigs are hashed exactly as
//! received, so callers must submit unsigned transactions with empty scriptSigs.

use secp256k1::{ecdsa::Signature, All, Message, PublicKey, Secp256k1};

use super::address::hash160;
use super::constants::SIGHASH_ALL;
use super::keys::KeyPair;
use super::script::{p2pkh_locking_script, p2pkh_unlocking_script};
use super::transaction::Transaction;
use super::{double_sha256, SigningError, SigningResult};

/// Signs legacy transaction inputs with RFC 6979 ECDSA
pub struct SigningEngine {
    secp: Secp256k1<All>,
}

impl Default for SigningEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl SigningEngine {
    pub fn new() -> Self {
        Self {
            secp: Secp256k1::new(),
        }
    }

    /// Legacy SIGHASH_ALL digest of `tx` for input `input_index` spending `spent_script`
    pub fn sighash(tx: &Transaction, input_index: usize, spent_script: &[u8]) -> SigningResult<[u8; 32]> {
        if input_index >= tx.inputs.len() {
            return Err(SigningError::InputValidation(format!(
                "Input index {} out of range ({} inputs)",
                input_index,
                tx.inputs.len()
            )));
        }

        let mut preimage_tx = tx.clone();
        preimage_tx.inputs[input_index].script_sig = spent_script.to_vec();

        let mut preimage = preimage_tx.encode();
        preimage.extend_from_slice(&SIGHASH_ALL.to_le_bytes());

        Ok(double_sha256(&preimage))
    }

    /// Sign a digest and check the result against the signer's own public key.
    ///
    /// Returns the DER signature without the sighash type byte.
    pub fn sign_digest(&self, key: &KeyPair, digest: &[u8; 32], input_index: usize) -> SigningResult<Vec<u8>> {
        let message = Message::from_digest(*digest);
        let mut secret_key = key.secret_key()?;

        let signature = self.secp.sign_ecdsa(&message, &secret_key);
        secret_key.non_secure_erase();

        if self.secp.verify_ecdsa(&message, &signature, key.public_key()).is_err() {
            tracing::error!(input_index, "Freshly produced signature failed verification");
            return Err(SigningError::SignatureSelfCheckFailed { input_index });
        }

        Ok(signature.serialize_der().to_vec())
    }

    /// Verify a DER signature (no sighash type byte) against a compressed public key
    pub fn verify(&self, compressed_public_key: &[u8], digest: &[u8; 32], der: &[u8]) -> SigningResult<bool> {
        let public_key = PublicKey::from_slice(compressed_public_key)
            .map_err(|e| SigningError::InvalidPublicKey(e.to_string()))?;
        let mut signature = Signature::from_der(der)
            .map_err(|e| SigningError::MalformedSignature(e.to_string()))?;
        // libsecp256k1 only verifies low-S; high-S is still a valid ECDSA signature
        signature.normalize_s();

        let message = Message::from_digest(*digest);
        Ok(self.secp.verify_ecdsa(&message, &signature, &public_key).is_ok())
    }

    /// Sign every input of `unsigned` against the same spent script.
    ///
    /// Each digest is computed from a fresh decode of the original bytes, and the
    /// scriptSigs built by `assemble(sig ‖ SIGHASH_ALL)` are installed only after all
    /// inputs are signed.
    pub fn sign_inputs<F>(
        &self,
        unsigned: &[u8],
        key: &KeyPair,
        spent_script: &[u8],
        assemble: F,
    ) -> SigningResult<Transaction>
    where
        F: Fn(&[u8]) -> Vec<u8>,
    {
        let mut signed = Transaction::decode(unsigned)?;
        if signed.inputs.is_empty() {
            return Err(SigningError::InputValidation(
                "Transaction has no inputs".to_string(),
            ));
        }

        let mut script_sigs = Vec::with_capacity(signed.inputs.len());
        for input_index in 0..signed.inputs.len() {
            let original = Transaction::decode(unsigned)?;
            let digest = Self::sighash(&original, input_index, spent_script)?;

            let mut signature = self.sign_digest(key, &digest, input_index)?;
            signature.push(SIGHASH_ALL as u8);

            tracing::debug!(
                input_index,
                sighash = %hex::encode(digest),
                "Signed input"
            );

            script_sigs.push(assemble(&signature));
        }

        for (input, script_sig) in signed.inputs.iter_mut().zip(script_sigs) {
            input.script_sig = script_sig;
        }

        Ok(signed)
    }

    /// Sign a P2PKH spend where every input pays to `key`'s compressed-key address
    pub fn sign_p2pkh(&self, unsigned: &[u8], key: &KeyPair) -> SigningResult<Transaction> {
        let compressed = key.compressed_public_key();
        let spent_script = p2pkh_locking_script(&hash160(&compressed));

        self.sign_inputs(unsigned, key, &spent_script, |signature| {
            p2pkh_unlocking_script(signature, &compressed)
        })
    }
}
