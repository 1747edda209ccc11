use std::sync::Arc;

use zeroize::Zeroizing;

use crate::blockchain::bitcoin::{KeyPair, MultisigCoordinator, SigningEngine, Transaction};
use crate::blockchain::SignatureCombiner;
use crate::crypto::KeyCipher;
use crate::db::repositories::UtxoRepository;
use crate::error::{AppError, AppResult};

/// Signs P2PKH and P2SH-multisig spends with keys encrypted by [`KeyCipher`]
pub struct SigningService {
    engine: Arc<SigningEngine>,
    cipher: Arc<KeyCipher>,
    combiner: Arc<dyn SignatureCombiner>,
    utxo_repo: UtxoRepository,
}

impl SigningService {
    pub fn new(
        engine: Arc<SigningEngine>,
        cipher: Arc<KeyCipher>,
        combiner: Arc<dyn SignatureCombiner>,
        utxo_repo: UtxoRepository,
    ) -> Self {
        Self {
            engine,
            cipher,
            combiner,
            utxo_repo,
        }
    }

    /// Sign every input of an unsigned P2PKH transaction with one encrypted key
    pub async fn sign_transaction(&self, raw_tx: &str, encrypted_key: &str) -> AppResult<String> {
        let unsigned = decode_raw_tx(raw_tx)?;
        let key = self.decrypt_key(encrypted_key)?;

        let engine = self.engine.clone();
        let signed = tokio::task::spawn_blocking(move || engine.sign_p2pkh(&unsigned, &key))
            .await
            .map_err(|e| AppError::InternalError(format!("Signing task failed: {}", e)))??;

        tracing::info!(
            "Signed P2PKH transaction {} ({} inputs)",
            signed.txid(),
            signed.inputs.len()
        );
        Ok(signed.to_hex())
    }

    /// Partially sign with every key, merge through the combiner, then reserve the spent UTXOs
    pub async fn multi_sign_transaction(
        &self,
        raw_tx: &str,
        encrypted_keys: &[String],
        redeem_script_hex: &str,
    ) -> AppResult<String> {
        let unsigned = decode_raw_tx(raw_tx)?;
        let redeem_script = hex::decode(redeem_script_hex.trim()).map_err(|e| {
            AppError::ValidationError(format!("Invalid redeem script hex: {}", e))
        })?;

        let keys = encrypted_keys
            .iter()
            .map(|encrypted| self.decrypt_key(encrypted))
            .collect::<AppResult<Vec<_>>>()?;

        let engine = self.engine.clone();
        let unsigned_for_task = unsigned.clone();
        let partials = tokio::task::spawn_blocking(move || {
            MultisigCoordinator::new(&engine).sign_all(&unsigned_for_task, &redeem_script, &keys)
        })
        .await
        .map_err(|e| AppError::InternalError(format!("Signing task failed: {}", e)))??;

        let partial_hexes: Vec<String> = partials.iter().map(Transaction::to_hex).collect();
        tracing::info!(
            "Produced {} partial signatures, combining",
            partial_hexes.len()
        );

        let combined = self.combiner.combine(&partial_hexes).await?;

        let spent = Transaction::decode(&unsigned)?;
        for input in &spent.inputs {
            let txid = input.prev_txid_hex();
            self.utxo_repo
                .mark_pending(&txid, input.prev_vout, true)
                .await
                .map_err(|e| {
                    tracing::error!("Marking UTXO {}:{} pending failed: {}", txid, input.prev_vout, e);
                    e
                })?;
        }

        tracing::info!(
            "Multisig transaction combined, {} UTXOs marked pending",
            spent.inputs.len()
        );
        Ok(combined)
    }

    fn decrypt_key(&self, encrypted_key: &str) -> AppResult<KeyPair> {
        let encrypted_key = encrypted_key.trim();
        if encrypted_key.is_empty() {
            return Err(AppError::ValidationError("Empty encrypted key".to_string()));
        }

        let plaintext: Zeroizing<String> = self.cipher.decrypt(encrypted_key)?;
        Ok(KeyPair::parse(&plaintext)?)
    }
}

fn decode_raw_tx(raw_tx: &str) -> AppResult<Vec<u8>> {
    hex::decode(raw_tx.trim())
        .map_err(|e| AppError::ValidationError(format!("Invalid raw transaction hex: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blockchain::bitcoin::{multisig_redeem_script, TxIn, TxOut};
    use async_trait::async_trait;
    use sqlx::mysql::MySqlPoolOptions;
    use std::sync::Mutex;

    /// Records what it was asked to combine and fails, so no UTXO update is attempted
    struct RecordingCombiner {
        seen: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl SignatureCombiner for RecordingCombiner {
        async fn combine(&self, partials: &[String]) -> AppResult<String> {
            self.seen.lock().unwrap().extend_from_slice(partials);
            Err(AppError::ExternalServiceFailure("combiner offline".to_string()))
        }
    }

    fn test_cipher() -> Arc<KeyCipher> {
        Arc::new(KeyCipher::new("correct horse battery staple", "btc-sign-salt").unwrap())
    }

    fn test_service(combiner: Arc<RecordingCombiner>) -> SigningService {
        let pool = MySqlPoolOptions::new()
            .connect_lazy("mysql://root:@127.0.0.1:3306/btc_wallet")
            .unwrap();
        SigningService::new(
            Arc::new(SigningEngine::new()),
            test_cipher(),
            combiner,
            UtxoRepository::new(pool),
        )
    }

    fn recording_combiner() -> Arc<RecordingCombiner> {
        Arc::new(RecordingCombiner {
            seen: Mutex::new(Vec::new()),
        })
    }

    fn unsigned_hex() -> String {
        Transaction {
            version: 2,
            inputs: vec![TxIn {
                prev_txid: [0x5a; 32],
                prev_vout: 1,
                script_sig: Vec::new(),
                sequence: 0xffffffff,
            }],
            outputs: vec![TxOut {
                value: 12_345,
                script_pubkey: vec![0x51],
            }],
            lock_time: 0,
        }
        .to_hex()
    }

    #[actix_rt::test]
    async fn test_sign_transaction_with_encrypted_key() {
        let service = test_service(recording_combiner());
        let key = KeyPair::from_bytes(&[7u8; 32]).unwrap();
        let encrypted = test_cipher().encrypt(&hex::encode(key.secret_bytes())).unwrap();

        let signed_hex = service.sign_transaction(&unsigned_hex(), &encrypted).await.unwrap();
        let signed = Transaction::from_hex(&signed_hex).unwrap();

        let script_sig = &signed.inputs[0].script_sig;
        assert_eq!(&script_sig[script_sig.len() - 33..], &key.compressed_public_key()[..]);
        assert_eq!(signed.outputs[0].value, 12_345);
    }

    #[actix_rt::test]
    async fn test_sign_transaction_rejects_bad_inputs() {
        let service = test_service(recording_combiner());

        assert!(matches!(
            service.sign_transaction("zz", "00").await,
            Err(AppError::ValidationError(_))
        ));
        assert!(matches!(
            service.sign_transaction(&unsigned_hex(), "deadbeef").await,
            Err(AppError::EncryptionError(_))
        ));
    }

    #[actix_rt::test]
    async fn test_multi_sign_hands_partials_to_combiner() {
        let combiner = recording_combiner();
        let service = test_service(combiner.clone());
        let cipher = test_cipher();

        let keys: Vec<KeyPair> = (1u8..=3).map(|b| KeyPair::from_bytes(&[b; 32]).unwrap()).collect();
        let pubkeys: Vec<[u8; 33]> = keys.iter().map(|k| k.compressed_public_key()).collect();
        let redeem = multisig_redeem_script(2, &pubkeys).unwrap();
        let encrypted: Vec<String> = keys[..2]
            .iter()
            .map(|k| cipher.encrypt(&hex::encode(k.secret_bytes())).unwrap())
            .collect();

        let result = service
            .multi_sign_transaction(&unsigned_hex(), &encrypted, &hex::encode(&redeem))
            .await;
        assert!(matches!(result, Err(AppError::ExternalServiceFailure(_))));

        let seen = combiner.seen.lock().unwrap();
        assert_eq!(seen.len(), 2);
        for partial in seen.iter() {
            let tx = Transaction::from_hex(partial).unwrap();
            let script = &tx.inputs[0].script_sig;
            assert_eq!(script[0], 0x00);
            assert_eq!(&script[script.len() - redeem.len()..], &redeem[..]);
        }
    }

    #[actix_rt::test]
    async fn test_multi_sign_rejects_duplicate_keys() {
        let combiner = recording_combiner();
        let service = test_service(combiner.clone());
        let cipher = test_cipher();

        let key = KeyPair::from_bytes(&[1u8; 32]).unwrap();
        let other = KeyPair::from_bytes(&[2u8; 32]).unwrap();
        let redeem =
            multisig_redeem_script(1, &[key.compressed_public_key(), other.compressed_public_key()])
                .unwrap();

        // Two ciphertexts of the same key differ by nonce but decrypt identically
        let secret = hex::encode(key.secret_bytes());
        let encrypted = vec![cipher.encrypt(&secret).unwrap(), cipher.encrypt(&secret).unwrap()];

        let result = service
            .multi_sign_transaction(&unsigned_hex(), &encrypted, &hex::encode(&redeem))
            .await;
        assert!(matches!(
            result,
            Err(AppError::SigningError(ref e)) if e.is_input_validation()
        ));
        assert!(combiner.seen.lock().unwrap().is_empty());
    }
}
