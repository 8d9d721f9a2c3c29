use sqlx::{PgPool, Pool, Postgres};
use trawl_core::batch::PreparedBatch;
use trawl_core::error::AppError;
use trawl_core::models::{BatchReport, PersistOutcome, Stock};
use trawl_core::traits::{BatchStore, RecordStore};

/// Insert-or-update storage for stocks, keyed by `symbol`.
///
/// Single upserts use `RETURNING (xmax = 0)` to tell a fresh insert from a
/// refresh. Batches count existing symbols first, then upsert in one
/// statement, both inside one transaction.
#[derive(Clone)]
pub struct StockRepository {
    pool: Pool<Postgres>,
}

impl StockRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insert or refresh one stock.
    pub async fn upsert(&self, stock: &Stock) -> Result<PersistOutcome, AppError> {
        if !stock.is_valid() {
            return Ok(PersistOutcome::Failed("missing required fields".to_string()));
        }

        let (inserted,): (bool,) = sqlx::query_as(
            r#"
            INSERT INTO stocks (symbol, name, category)
            VALUES ($1, $2, $3)
            ON CONFLICT (symbol) DO UPDATE
                SET name = EXCLUDED.name,
                    category = EXCLUDED.category,
                    updated_at = NOW()
            RETURNING (xmax = 0) AS inserted
            "#,
        )
        .bind(&stock.symbol)
        .bind(&stock.name)
        .bind(&stock.category)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(e.to_string()))?;

        Ok(if inserted {
            PersistOutcome::Created
        } else {
            PersistOutcome::Duplicate
        })
    }

    /// Insert or refresh a batch of stocks.
    ///
    /// Invalid rows are counted as failed; duplicate symbols within the batch
    /// collapse to their last occurrence.
    pub async fn upsert_batch(&self, stocks: &[Stock]) -> Result<BatchReport, AppError> {
        let batch = PreparedBatch::prepare(stocks);
        if batch.is_empty() {
            return Ok(batch.report(0));
        }

        let symbols = batch.keys();
        let names: Vec<String> = batch.rows.iter().map(|s| s.name.clone()).collect();
        let categories: Vec<String> = batch.rows.iter().map(|s| s.category.clone()).collect();

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| AppError::DatabaseError(e.to_string()))?;

        let (existing,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM stocks WHERE symbol = ANY($1)")
                .bind(&symbols)
                .fetch_one(&mut *tx)
                .await
                .map_err(|e| AppError::DatabaseError(e.to_string()))?;

        sqlx::query(
            r#"
            INSERT INTO stocks (symbol, name, category)
            SELECT * FROM UNNEST($1::text[], $2::text[], $3::text[])
            ON CONFLICT (symbol) DO UPDATE
                SET name = EXCLUDED.name,
                    category = EXCLUDED.category,
                    updated_at = NOW()
            "#,
        )
        .bind(&symbols)
        .bind(&names)
        .bind(&categories)
        .execute(&mut *tx)
        .await
        .map_err(|e| AppError::DatabaseError(e.to_string()))?;

        tx.commit()
            .await
            .map_err(|e| AppError::DatabaseError(e.to_string()))?;

        let report = batch.report(existing as usize);
        tracing::debug!(
            created = report.created,
            duplicate = report.duplicate,
            failed = report.failed,
            "Stock batch upserted"
        );
        Ok(report)
    }

    pub async fn get(&self, symbol: &str) -> Result<Option<Stock>, AppError> {
        let row = sqlx::query_as::<_, StockRow>(
            "SELECT symbol, name, category FROM stocks WHERE symbol = $1",
        )
        .bind(symbol)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(e.to_string()))?;

        Ok(row.map(Into::into))
    }

    /// Highest surrogate id in the table, or 0 when empty.
    pub async fn max_id(&self) -> Result<i64, AppError> {
        let (max,): (Option<i64>,) = sqlx::query_as("SELECT MAX(id) FROM stocks")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(e.to_string()))?;
        Ok(max.unwrap_or(0))
    }

    pub async fn count(&self) -> Result<i64, AppError> {
        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM stocks")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(e.to_string()))?;
        Ok(row.0)
    }
}

#[derive(sqlx::FromRow)]
struct StockRow {
    symbol: String,
    name: String,
    category: String,
}

impl From<StockRow> for Stock {
    fn from(row: StockRow) -> Self {
        Stock {
            symbol: row.symbol,
            name: row.name,
            category: row.category,
        }
    }
}

impl BatchStore<Stock> for StockRepository {
    async fn upsert_batch(&self, records: &[Stock]) -> Result<BatchReport, AppError> {
        StockRepository::upsert_batch(self, records).await
    }
}

impl RecordStore<Stock> for StockRepository {
    async fn persist(&self, record: &Stock) -> PersistOutcome {
        self.upsert(record)
            .await
            .unwrap_or_else(|e| PersistOutcome::Failed(e.to_string()))
    }
}
