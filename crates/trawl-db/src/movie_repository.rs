use sqlx::{PgPool, Pool, Postgres};
use trawl_core::error::AppError;
use trawl_core::models::{Movie, PersistOutcome};
use trawl_core::traits::RecordStore;

/// Insert-or-reject storage for movies.
///
/// Both `id` and `url` are unique; a conflicting insert is reported as
/// [`PersistOutcome::Duplicate`] rather than raised.
#[derive(Clone)]
pub struct MovieRepository {
    pool: Pool<Postgres>,
}

impl MovieRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insert a movie, classifying unique-key conflicts as duplicates.
    pub async fn insert(&self, movie: &Movie) -> PersistOutcome {
        if !movie.is_valid() {
            return PersistOutcome::Failed("missing required fields".to_string());
        }

        let result = sqlx::query(
            r#"
            INSERT INTO movies (id, title, year, director, rating, url)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(movie.id)
        .bind(&movie.title)
        .bind(&movie.year)
        .bind(&movie.director)
        .bind(movie.rating)
        .bind(&movie.url)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => PersistOutcome::Created,
            Err(sqlx::Error::Database(db)) if db.is_unique_violation() => {
                PersistOutcome::Duplicate
            }
            Err(e) => PersistOutcome::Failed(e.to_string()),
        }
    }

    /// Highest stored movie id, or 0 when the table is empty.
    pub async fn max_id(&self) -> Result<i64, AppError> {
        let row: (Option<i64>,) = sqlx::query_as("SELECT MAX(id) FROM movies")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(e.to_string()))?;
        Ok(row.0.unwrap_or(0))
    }

    pub async fn get(&self, id: i64) -> Result<Option<Movie>, AppError> {
        let row = sqlx::query_as::<_, MovieRow>(
            r#"
            SELECT id, title, year, director, rating, url
            FROM movies
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(e.to_string()))?;

        Ok(row.map(Into::into))
    }

    pub async fn count(&self) -> Result<i64, AppError> {
        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM movies")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(e.to_string()))?;
        Ok(row.0)
    }
}

// -- Internal row type for sqlx deserialization --

#[derive(sqlx::FromRow)]
struct MovieRow {
    id: i64,
    title: String,
    year: String,
    director: String,
    rating: Option<f64>,
    url: String,
}

impl From<MovieRow> for Movie {
    fn from(row: MovieRow) -> Self {
        Movie {
            id: row.id,
            title: row.title,
            year: row.year,
            director: row.director,
            rating: row.rating,
            url: row.url,
        }
    }
}

// -- Trait implementation --

impl RecordStore<Movie> for MovieRepository {
    async fn persist(&self, record: &Movie) -> PersistOutcome {
        let outcome = self.insert(record).await;
        if let PersistOutcome::Failed(reason) = &outcome {
            tracing::error!(id = record.id, url = %record.url, %reason, "Movie insert failed");
        }
        outcome
    }
}
