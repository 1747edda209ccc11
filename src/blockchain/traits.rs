use async_trait::async_trait;

use crate::error::AppResult;

/// Merges per-cosigner partial multisig transactions into one spendable transaction
#[async_trait]
pub trait SignatureCombiner: Send + Sync {
    /// Combine partial raw transactions (hex) into one fully signed raw transaction (hex)
    async fn combine(&self, partials: &[String]) -> AppResult<String>;
}
