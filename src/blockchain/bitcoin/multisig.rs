//! Partial signing for P2SH multisig spends
//!
//! Each cosigner produces a transaction whose every input carries
//! `OP_0 <sig> <redeem script>` with that cosigner's signature alone. Merging the
//! partial transactions into a spendable one is left to an external combiner.

use std::collections::HashSet;

use super::keys::KeyPair;
use super::script::{parse_multisig_redeem_script, partial_multisig_unlocking_script};
use super::signer::SigningEngine;
use super::transaction::Transaction;
use super::{SigningError, SigningResult};

pub struct MultisigCoordinator<'a> {
    engine: &'a SigningEngine,
}

impl<'a> MultisigCoordinator<'a> {
    pub fn new(engine: &'a SigningEngine) -> Self {
        Self { engine }
    }

    /// Sign every input of `unsigned` with one cosigner key
    pub fn sign_partial(
        &self,
        unsigned: &[u8],
        redeem_script: &[u8],
        key: &KeyPair,
    ) -> SigningResult<Transaction> {
        let (_, cosigners) = parse_multisig_redeem_script(redeem_script)?;
        let signer = key.compressed_public_key();

        if !cosigners.contains(&signer) {
            return Err(SigningError::InputValidation(format!(
                "Key {} is not a cosigner of the redeem script",
                hex::encode(signer)
            )));
        }

        self.engine.sign_inputs(unsigned, key, redeem_script, |signature| {
            partial_multisig_unlocking_script(signature, redeem_script)
        })
    }

    /// One partial transaction per key, in key order
    pub fn sign_all(
        &self,
        unsigned: &[u8],
        redeem_script: &[u8],
        keys: &[KeyPair],
    ) -> SigningResult<Vec<Transaction>> {
        if keys.is_empty() {
            return Err(SigningError::InputValidation("No signing keys provided".to_string()));
        }

        let mut seen = HashSet::with_capacity(keys.len());
        for key in keys {
            if !seen.insert(key.compressed_public_key()) {
                return Err(SigningError::InputValidation(format!(
                    "Duplicate signing key {}",
                    hex::encode(key.compressed_public_key())
                )));
            }
        }

        keys.iter()
            .map(|key| self.sign_partial(unsigned, redeem_script, key))
            .collect()
    }
}
