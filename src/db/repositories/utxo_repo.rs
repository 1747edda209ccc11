use crate::db::models::Utxo;
use crate::error::{AppError, AppResult};
use sqlx::MySqlPool;

pub struct UtxoRepository {
    pool: MySqlPool,
}

impl UtxoRepository {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }

    /// UTXOs of `address` that are neither spent nor reserved by an in-flight signing
    pub async fn list_unspent(&self, address: &str) -> AppResult<Vec<Utxo>> {
        let utxos = sqlx::query_as::<_, Utxo>(
            "SELECT id, txid, vout, amount, used, address, scriptpubkey, coin_symbol, pending FROM utxo WHERE address = ? AND used = 0 AND pending = 0 ORDER BY id"
        )
        .bind(address)
        .fetch_all(&self.pool)
        .await?;

        Ok(utxos)
    }

    pub async fn mark_pending(&self, txid: &str, vout: u32, pending: bool) -> AppResult<()> {
        let mut tx = self.pool.begin().await?;

        let exists: Option<(i32,)> = sqlx::query_as(
            "SELECT id FROM utxo WHERE txid = ? AND vout = ? FOR UPDATE"
        )
        .bind(txid)
        .bind(vout)
        .fetch_optional(&mut *tx)
        .await?;

        if exists.is_none() {
            return Err(AppError::NotFound(format!("UTXO {}:{}", txid, vout)));
        }

        sqlx::query("UPDATE utxo SET pending = ?, updated_at = NOW() WHERE txid = ? AND vout = ?")
            .bind(i32::from(pending))
            .bind(txid)
            .bind(vout)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }
}
