//! [`Table`] persisted in a SQLite file.
//!
//! Layout: `table_headers(position, header)` holds the column order and
//! `table_cells(header, row, value)` one row per cell. The whole grid is loaded
//! on open and rewritten in one transaction on save.

use async_trait::async_trait;
use sqlx::SqliteConnection;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool};
use std::path::{Path, PathBuf};

use super::{Grid, Table};
use crate::error::TableError;

type TableResult<T> = std::result::Result<T, TableError>;

/// How a [`SqliteTable`] is opened
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TableMode {
    /// Start from an empty table, discarding any stored content
    Create,
    /// Load the stored table, creating the file if needed
    ReadWrite,
    /// Load the stored table; [`Table::save`] fails
    ReadOnly,
}

impl TableMode {
    fn writable(self) -> bool {
        !matches!(self, TableMode::ReadOnly)
    }
}

/// SQLite-backed table
#[derive(Debug)]
pub struct SqliteTable {
    pool: SqlitePool,
    path: PathBuf,
    grid: Grid,
    mode: TableMode,
}

impl SqliteTable {
    /// Open a table file
    ///
    /// A writable table is saved once before returning, so an unwritable file
    /// fails here rather than after a long run.
    pub async fn open(path: impl AsRef<Path>, mode: TableMode) -> TableResult<Self> {
        let path = path.as_ref().to_path_buf();
        let options = SqliteConnectOptions::new()
            .filename(&path)
            .create_if_missing(mode.writable())
            .read_only(!mode.writable());

        let pool = SqlitePool::connect_with(options).await.map_err(|e| {
            TableError::Storage(format!("failed to open table {}: {}", path.display(), e))
        })?;

        let mut table = Self {
            pool,
            path,
            grid: Grid::new(),
            mode,
        };

        if mode.writable() {
            table.run_migrations().await?;
        }
        if mode != TableMode::Create {
            table.grid = table.load().await?;
        }
        if mode.writable() {
            table.save().await?;
        }

        tracing::debug!(
            path = %table.path.display(),
            ?mode,
            columns = table.grid.headers().len(),
            rows = table.grid.row_count(),
            "table opened"
        );
        Ok(table)
    }

    /// Create a table file holding exactly `columns`
    pub async fn import_rows<I, H>(path: impl AsRef<Path>, columns: I) -> TableResult<Self>
    where
        I: IntoIterator<Item = (H, Vec<String>)>,
        H: Into<String>,
    {
        let grid = Grid::from_columns(columns)?;
        let mut table = Self::open(path, TableMode::Create).await?;
        table.grid = grid;
        table.save().await?;
        Ok(table)
    }

    /// File backing this table
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loaded grid
    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    /// Close the connection pool
    pub async fn close(self) {
        self.pool.close().await;
    }

    async fn load(&self) -> TableResult<Grid> {
        let headers: Vec<String> =
            sqlx::query_scalar("SELECT header FROM table_headers ORDER BY position")
                .fetch_all(&self.pool)
                .await?;

        let mut grid = Grid::from_columns(headers.into_iter().map(|h| (h, Vec::new())))?;

        let cells: Vec<(String, i64, String)> =
            sqlx::query_as("SELECT header, row, value FROM table_cells ORDER BY header, row")
                .fetch_all(&self.pool)
                .await?;

        for (header, row, value) in cells {
            let Ok(row) = usize::try_from(row) else {
                tracing::warn!(header = %header, row, "skipping cell with negative row index");
                continue;
            };
            grid.set_cell(&header, row, value);
        }

        Ok(grid)
    }

    async fn write_all(conn: &mut SqliteConnection, grid: &Grid) -> TableResult<()> {
        sqlx::query("DELETE FROM table_cells")
            .execute(&mut *conn)
            .await?;
        sqlx::query("DELETE FROM table_headers")
            .execute(&mut *conn)
            .await?;

        for (position, header) in grid.headers().iter().enumerate() {
            sqlx::query("INSERT INTO table_headers (position, header) VALUES (?, ?)")
                .bind(position as i64)
                .bind(header)
                .execute(&mut *conn)
                .await?;

            for (row, value) in grid.raw_column(header).unwrap_or_default().iter().enumerate() {
                sqlx::query("INSERT INTO table_cells (header, row, value) VALUES (?, ?, ?)")
                    .bind(header)
                    .bind(row as i64)
                    .bind(value)
                    .execute(&mut *conn)
                    .await?;
            }
        }
        Ok(())
    }

    /// Run schema migrations
    async fn run_migrations(&self) -> TableResult<()> {
        let mut conn = self.pool.acquire().await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS schema_version (
                version INTEGER PRIMARY KEY,
                applied_at INTEGER NOT NULL
            )
            "#,
        )
        .execute(&mut *conn)
        .await?;

        let current_version: Option<i64> =
            sqlx::query_scalar::<_, Option<i64>>("SELECT MAX(version) FROM schema_version")
                .fetch_optional(&mut *conn)
                .await?
                .flatten();

        if current_version.unwrap_or(0) < 1 {
            Self::migrate_v1(&mut conn).await?;
        }

        Ok(())
    }

    /// Migration v1: header and cell tables
    async fn migrate_v1(conn: &mut SqliteConnection) -> TableResult<()> {
        tracing::info!("Applying table migration v1");

        sqlx::query("BEGIN").execute(&mut *conn).await?;

        let result = async {
            sqlx::query(
                r#"
                CREATE TABLE table_headers (
                    position INTEGER PRIMARY KEY,
                    header TEXT NOT NULL
                )
                "#,
            )
            .execute(&mut *conn)
            .await?;

            sqlx::query(
                r#"
                CREATE TABLE table_cells (
                    header TEXT NOT NULL,
                    row INTEGER NOT NULL,
                    value TEXT NOT NULL,
                    PRIMARY KEY (header, row)
                )
                "#,
            )
            .execute(&mut *conn)
            .await?;

            let now = std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .map(|d| d.as_secs() as i64)
                .unwrap_or(0);
            sqlx::query("INSERT INTO schema_version (version, applied_at) VALUES (?, ?)")
                .bind(1_i64)
                .bind(now)
                .execute(&mut *conn)
                .await?;
            Ok::<(), TableError>(())
        }
        .await;

        match result {
            Ok(()) => {
                sqlx::query("COMMIT").execute(&mut *conn).await?;
            }
            Err(e) => {
                let _ = sqlx::query("ROLLBACK").execute(&mut *conn).await;
                return Err(e);
            }
        }

        tracing::info!("Table migration v1 complete");
        Ok(())
    }
}

#[async_trait]
impl Table for SqliteTable {
    fn headers(&self) -> Vec<String> {
        self.grid.headers().to_vec()
    }

    fn get_column(&self, header: &str) -> Vec<String> {
        self.grid.column(header)
    }

    fn add_column(&mut self, header: &str, values: &[String]) {
        self.grid.add_column(header, values);
    }

    async fn save(&mut self) -> TableResult<()> {
        if !self.mode.writable() {
            return Err(TableError::ReadOnly);
        }

        let mut conn = self.pool.acquire().await?;
        sqlx::query("BEGIN").execute(&mut *conn).await?;

        match Self::write_all(&mut conn, &self.grid).await {
            Ok(()) => {
                sqlx::query("COMMIT").execute(&mut *conn).await?;
            }
            Err(e) => {
                let _ = sqlx::query("ROLLBACK").execute(&mut *conn).await;
                return Err(e);
            }
        }

        tracing::debug!(path = %self.path.display(), rows = self.grid.row_count(), "table saved");
        Ok(())
    }
}
