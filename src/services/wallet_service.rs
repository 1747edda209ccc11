use std::sync::Arc;

use crate::blockchain::bitcoin::{multisig_address, multisig_redeem_script_from_hex, validate_address, KeyPair};
use crate::crypto::KeyCipher;
use crate::db::models::{GeneratedAddress, MultisigAddressResponse, UtxoResponse};
use crate::db::repositories::{AddressRepository, UtxoRepository};
use crate::error::{AppError, AppResult};

/// Address generation, address import and UTXO queries
pub struct WalletService {
    address_repo: AddressRepository,
    utxo_repo: UtxoRepository,
    cipher: Arc<KeyCipher>,
    max_generate_count: usize,
}

impl WalletService {
    pub fn new(
        address_repo: AddressRepository,
        utxo_repo: UtxoRepository,
        cipher: Arc<KeyCipher>,
        max_generate_count: usize,
    ) -> Self {
        Self {
            address_repo,
            utxo_repo,
            cipher,
            max_generate_count,
        }
    }

    /// Generate `count` fresh P2PKH addresses with encrypted private keys.
    ///
    /// `count` is clamped to the configured maximum. Addresses are stored before
    /// the keys are returned.
    pub async fn generate_addresses(&self, count: usize) -> AppResult<Vec<GeneratedAddress>> {
        let count = if count > self.max_generate_count {
            tracing::warn!(
                "generate_address count {} capped at {}",
                count,
                self.max_generate_count
            );
            self.max_generate_count
        } else {
            count
        };

        let cipher = self.cipher.clone();
        let generated = tokio::task::spawn_blocking(move || generate_encrypted(&cipher, count))
            .await
            .map_err(|e| AppError::InternalError(format!("Address generation task failed: {}", e)))??;

        let addresses: Vec<String> = generated.iter().map(|g| g.address.clone()).collect();
        self.address_repo.add_if_absent(&addresses).await?;

        tracing::info!("Generated {} new addresses", generated.len());
        Ok(generated)
    }

    /// Build an m-of-n redeem script and its P2SH address from comma-separated public keys
    pub fn generate_multisig_address(
        &self,
        required: usize,
        public_keys: &[String],
    ) -> AppResult<MultisigAddressResponse> {
        let redeem_script = multisig_redeem_script_from_hex(required, public_keys)?;
        let address = multisig_address(&redeem_script);

        tracing::info!(
            "Created {}-of-{} multisig address {}",
            required,
            public_keys.len(),
            address
        );

        Ok(MultisigAddressResponse {
            redeem_script: hex::encode(redeem_script),
            multi_sig_address: address,
        })
    }

    pub async fn import_addresses(&self, addresses: &[String]) -> AppResult<()> {
        if let Some(invalid) = addresses.iter().find(|a| !validate_address(a)) {
            return Err(AppError::ValidationError(format!("Invalid address: {}", invalid)));
        }

        let inserted = self.address_repo.add_if_absent(addresses).await?;
        tracing::info!("Imported {} addresses ({} new)", addresses.len(), inserted);
        Ok(())
    }

    pub async fn query_utxos(&self, address: &str) -> AppResult<Vec<UtxoResponse>> {
        let utxos = self.utxo_repo.list_unspent(address).await?;
        tracing::debug!("Address {} has {} spendable UTXOs", address, utxos.len());
        Ok(utxos.into_iter().map(UtxoResponse::from).collect())
    }
}

fn generate_encrypted(cipher: &KeyCipher, count: usize) -> AppResult<Vec<GeneratedAddress>> {
    (0..count)
        .map(|_| -> AppResult<GeneratedAddress> {
            let key = KeyPair::generate()?;
            let secret_hex = zeroize::Zeroizing::new(hex::encode(key.secret_bytes()));

            Ok(GeneratedAddress {
                address: key.address(),
                private_key: cipher.encrypt(&secret_hex)?,
                encrypted: true,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::mysql::MySqlPoolOptions;

    fn test_cipher() -> Arc<KeyCipher> {
        Arc::new(KeyCipher::new("correct horse battery staple", "btc-sign-salt").unwrap())
    }

    // Lazy pool: never connects unless a query runs
    fn test_service() -> WalletService {
        let pool = MySqlPoolOptions::new()
            .connect_lazy("mysql://root:@127.0.0.1:3306/btc_wallet")
            .unwrap();
        WalletService::new(
            AddressRepository::new(pool.clone()),
            UtxoRepository::new(pool),
            test_cipher(),
            1000,
        )
    }

    #[test]
    fn test_generate_encrypted_keys_decrypt_to_address() {
        let cipher = test_cipher();
        let generated = generate_encrypted(&cipher, 3).unwrap();
        assert_eq!(generated.len(), 3);

        for entry in &generated {
            assert!(entry.encrypted);
            assert!(entry.address.starts_with('1'));

            let secret = cipher.decrypt(&entry.private_key).unwrap();
            let key = KeyPair::parse(&secret).unwrap();
            assert_eq!(key.address(), entry.address);
        }
    }

    #[actix_rt::test]
    async fn test_generate_multisig_address() {
        let service = test_service();
        let keys: Vec<String> = [
            "0303b98c2753cb48a456d88c89727936797d7fa890eb600dddf32940a1e835188b",
            "02cd7c2fe2be798cf062de43783177fab7a3436af29a6aeb65c78399cbf25f84a9",
            "0351519038c945c71a5268ae27729731f886b56b5e14b202d351530a92bdec8f59",
            "02ec30578e5647e00a20ad3ef98b08381cd57e28e00293ff5a27bf0981bac008b5",
            "036ff86d871899f06bd68f201c894cd872a19b15f4e284c2d86227176fbdc0a9bf",
        ]
        .iter()
        .map(|k| k.to_string())
        .collect();

        let response = service.generate_multisig_address(3, &keys).unwrap();
        assert_eq!(response.multi_sig_address, "3MDSq8EZGz71f9BCLy1tpndHjvbXH8Wj4V");
        assert!(response.redeem_script.starts_with("53"));
        assert!(response.redeem_script.ends_with("55ae"));

        assert!(matches!(
            service.generate_multisig_address(6, &keys),
            Err(AppError::SigningError(_))
        ));
    }

    #[actix_rt::test]
    async fn test_import_rejects_invalid_address_before_db() {
        let service = test_service();
        let result = service
            .import_addresses(&["1BgGZ9tcN4rm9KBzDn7KprQz87SZ26SAMH".to_string(), "bogus".to_string()])
            .await;
        assert!(matches!(result, Err(AppError::ValidationError(_))));
    }
}
