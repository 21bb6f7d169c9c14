//! Access repository for persistent storage of permission records.

use sqlx::Row;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};

use super::model::{AccessFlag, AccessRecord, AccessVerdict};
use crate::Result;

/// Repository for access records.
pub struct AccessRepository {
    pool: SqlitePool,
}

impl AccessRepository {
    /// Create a new repository with the given database path.
    ///
    /// Creates the database and tables if they don't exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the database connection fails or schema creation fails.
    pub async fn new(database_path: &str) -> Result<Self> {
        let url = format!("sqlite:{database_path}?mode=rwc");
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(&url)
            .await?;

        let repo = Self { pool };
        repo.initialize().await?;
        Ok(repo)
    }

    /// Create an in-memory repository for testing.
    ///
    /// # Errors
    ///
    /// Returns an error if the database connection fails or schema creation fails.
    pub async fn in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;

        let repo = Self { pool };
        repo.initialize().await?;
        Ok(repo)
    }

    /// Initialize database schema.
    ///
    /// The pair index is not unique: concurrent first grants
    /// may insert twice, and lookups read the oldest row.
    async fn initialize(&self) -> Result<()> {
        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS access_records (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                primary_id TEXT NOT NULL,
                secondary_id TEXT NOT NULL,
                has_access TEXT NOT NULL DEFAULT 'N',
                created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
            )
            ",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r"
            CREATE INDEX IF NOT EXISTS idx_access_pair
            ON access_records(primary_id, secondary_id)
            ",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Get the record for a pair, if one was ever written.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn get_record(
        &self,
        primary_id: &str,
        secondary_id: &str,
    ) -> Result<Option<AccessRecord>> {
        let row = sqlx::query(
            r"
            SELECT id, primary_id, secondary_id, has_access, created_at
            FROM access_records
            WHERE primary_id = ? AND secondary_id = ?
            ORDER BY id
            LIMIT 1
            ",
        )
        .bind(primary_id.trim())
        .bind(secondary_id.trim())
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| row_to_record(&r)))
    }

    /// Look up the verdict for a pair.
    ///
    /// A pair that was never written is [`AccessVerdict::Unknown`], not an
    /// error.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn check_access(&self, primary_id: &str, secondary_id: &str) -> Result<AccessVerdict> {
        let record = self.get_record(primary_id, secondary_id).await?;
        let verdict = AccessVerdict::from(record.map(|r| r.flag));
        tracing::debug!(primary_id, secondary_id, ?verdict, "access checked");
        Ok(verdict)
    }

    /// Grant access unless it is already granted.
    ///
    /// Returns `true` when the store changed: a revoked record was flipped
    /// or a new granted record was inserted.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub async fn grant_if_revoked(&self, primary_id: &str, secondary_id: &str) -> Result<bool> {
        match self.get_record(primary_id, secondary_id).await? {
            Some(record) if record.flag == AccessFlag::Granted => Ok(false),
            Some(record) => {
                self.update_flag(record.id, AccessFlag::Granted).await?;
                tracing::info!(primary_id, secondary_id, "access re-granted");
                Ok(true)
            }
            None => {
                self.insert(primary_id, secondary_id, AccessFlag::Granted)
                    .await?;
                tracing::info!(primary_id, secondary_id, "access granted");
                Ok(true)
            }
        }
    }

    /// Set an explicit flag, updating the existing record or inserting one.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub async fn set_access(
        &self,
        primary_id: &str,
        secondary_id: &str,
        flag: AccessFlag,
    ) -> Result<()> {
        match self.get_record(primary_id, secondary_id).await? {
            Some(record) => self.update_flag(record.id, flag).await?,
            None => self.insert(primary_id, secondary_id, flag).await?,
        }
        tracing::info!(primary_id, secondary_id, flag = flag.as_str(), "access set");
        Ok(())
    }

    /// Secondary identities the primary has been granted, oldest first.
    ///
    /// Like [`AccessRepository::check_access`], only the oldest record of
    /// each pair counts.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn list_granted(&self, primary_id: &str) -> Result<Vec<String>> {
        let rows = sqlx::query(
            r"
            SELECT r.secondary_id
            FROM access_records r
            WHERE r.primary_id = ?
              AND r.has_access = 'Y'
              AND r.id = (
                  SELECT MIN(o.id)
                  FROM access_records o
                  WHERE o.primary_id = r.primary_id
                    AND o.secondary_id = r.secondary_id
              )
            ORDER BY r.id
            ",
        )
        .bind(primary_id.trim())
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(|r| r.get("secondary_id")).collect())
    }

    async fn insert(&self, primary_id: &str, secondary_id: &str, flag: AccessFlag) -> Result<()> {
        sqlx::query(
            r"
            INSERT INTO access_records (primary_id, secondary_id, has_access)
            VALUES (?, ?, ?)
            ",
        )
        .bind(primary_id.trim())
        .bind(secondary_id.trim())
        .bind(flag.as_str())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn update_flag(&self, id: i64, flag: AccessFlag) -> Result<()> {
        sqlx::query("UPDATE access_records SET has_access = ? WHERE id = ?")
            .bind(flag.as_str())
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

/// Convert a database row to an `AccessRecord`.
fn row_to_record(row: &sqlx::sqlite::SqliteRow) -> AccessRecord {
    AccessRecord {
        id: row.get("id"),
        primary_id: row.get("primary_id"),
        secondary_id: row.get("secondary_id"),
        flag: AccessFlag::parse(row.get("has_access")),
        created_at: row.get("created_at"),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_never_written_pair_is_unknown() {
        let repo = AccessRepository::in_memory().await.unwrap();
        let verdict = repo.check_access("doctor-1", "patient-1").await.unwrap();
        assert_eq!(verdict, AccessVerdict::Unknown);
    }

    #[tokio::test]
    async fn test_grant_is_idempotent() {
        let repo = AccessRepository::in_memory().await.unwrap();

        assert!(repo.grant_if_revoked("doctor-1", "patient-1").await.unwrap());
        assert_eq!(
            repo.check_access("doctor-1", "patient-1").await.unwrap(),
            AccessVerdict::Granted
        );

        let before = repo.get_record("doctor-1", "patient-1").await.unwrap();
        assert!(!repo.grant_if_revoked("doctor-1", "patient-1").await.unwrap());
        let after = repo.get_record("doctor-1", "patient-1").await.unwrap();
        assert_eq!(before, after);
    }

    #[tokio::test]
    async fn test_revoked_record_flips_in_place() {
        let repo = AccessRepository::in_memory().await.unwrap();

        repo.set_access("doctor-1", "patient-1", AccessFlag::Revoked)
            .await
            .unwrap();
        assert_eq!(
            repo.check_access("doctor-1", "patient-1").await.unwrap(),
            AccessVerdict::NotGranted
        );
        let revoked = repo.get_record("doctor-1", "patient-1").await.unwrap().unwrap();

        assert!(repo.grant_if_revoked("doctor-1", "patient-1").await.unwrap());
        let granted = repo.get_record("doctor-1", "patient-1").await.unwrap().unwrap();
        assert_eq!(granted.id, revoked.id);
        assert_eq!(granted.flag, AccessFlag::Granted);
    }

    #[tokio::test]
    async fn test_pairs_are_directional() {
        let repo = AccessRepository::in_memory().await.unwrap();
        repo.grant_if_revoked("doctor-1", "patient-1").await.unwrap();

        assert_eq!(
            repo.check_access("patient-1", "doctor-1").await.unwrap(),
            AccessVerdict::Unknown
        );
        assert_eq!(
            repo.check_access(" doctor-1 ", "patient-1").await.unwrap(),
            AccessVerdict::Granted
        );
    }

    #[tokio::test]
    async fn test_list_granted() {
        let repo = AccessRepository::in_memory().await.unwrap();
        repo.grant_if_revoked("doctor-1", "patient-2").await.unwrap();
        repo.grant_if_revoked("doctor-1", "patient-1").await.unwrap();
        repo.set_access("doctor-1", "patient-3", AccessFlag::Revoked)
            .await
            .unwrap();
        repo.grant_if_revoked("doctor-2", "patient-4").await.unwrap();

        let granted = repo.list_granted("doctor-1").await.unwrap();
        assert_eq!(granted, vec!["patient-2", "patient-1"]);

        repo.set_access("doctor-1", "patient-2", AccessFlag::Revoked)
            .await
            .unwrap();
        assert_eq!(repo.list_granted("doctor-1").await.unwrap(), vec!["patient-1"]);
    }

    #[tokio::test]
    async fn test_duplicate_rows_follow_the_oldest() {
        let repo = AccessRepository::in_memory().await.unwrap();
        repo.insert("doctor-1", "patient-1", AccessFlag::Revoked).await.unwrap();
        repo.insert("doctor-1", "patient-1", AccessFlag::Granted).await.unwrap();
        repo.insert("doctor-1", "patient-2", AccessFlag::Granted).await.unwrap();
        repo.insert("doctor-1", "patient-2", AccessFlag::Revoked).await.unwrap();

        assert_eq!(
            repo.check_access("doctor-1", "patient-1").await.unwrap(),
            AccessVerdict::NotGranted
        );
        assert_eq!(
            repo.check_access("doctor-1", "patient-2").await.unwrap(),
            AccessVerdict::Granted
        );
        assert_eq!(repo.list_granted("doctor-1").await.unwrap(), vec!["patient-2"]);
    }
}
