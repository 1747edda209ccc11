use crate::error::AppResult;
use sqlx::MySqlPool;

pub struct AddressRepository {
    pool: MySqlPool,
}

impl AddressRepository {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }

    /// Insert every address not already present, in one transaction.
    ///
    /// Returns how many rows were actually inserted.
    pub async fn add_if_absent(&self, addresses: &[String]) -> AppResult<u64> {
        if addresses.is_empty() {
            return Ok(0);
        }

        let mut tx = self.pool.begin().await?;
        let mut inserted = 0;

        for address in addresses {
            let result = sqlx::query("INSERT IGNORE INTO address (address) VALUES (?)")
                .bind(address)
                .execute(&mut *tx)
                .await?;
            inserted += result.rows_affected();
        }

        tx.commit().await?;

        tracing::debug!(
            "Stored {} new of {} submitted addresses",
            inserted,
            addresses.len()
        );
        Ok(inserted)
    }
}
