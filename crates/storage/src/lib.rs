use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow},
    Pool, Row, Sqlite,
};
use std::{
    fs,
    path::{Path, PathBuf},
    str::FromStr,
};

use shared::domain::{normalize_annotator_name, Annotator, AnnotatorId};

/// Durable annotator records backed by SQLite.
///
/// Missing rows are reported through the return type (`Option` / `bool`);
/// `Err` is reserved for connectivity and query failures.
#[derive(Clone)]
pub struct Storage {
    pool: Pool<Sqlite>,
}

impl Storage {
    pub async fn new(database_url: &str) -> Result<Self> {
        ensure_sqlite_parent_dir_exists(database_url)?;

        let connect_options = SqliteConnectOptions::from_str(database_url)
            .with_context(|| format!("invalid sqlite database url '{database_url}'"))?
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(connect_options)
            .await
            .with_context(|| format!("failed to open sqlite database '{database_url}'"))?;
        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .context("failed to apply annotator migrations")?;
        Ok(Self { pool })
    }

    pub async fn health_check(&self) -> Result<()> {
        let _: i64 = sqlx::query_scalar("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .context("sqlite ping failed")?;
        Ok(())
    }

    pub async fn list_annotators(&self) -> Result<Vec<Annotator>> {
        let rows = sqlx::query("SELECT id, name, start_time FROM annotators ORDER BY id")
            .fetch_all(&self.pool)
            .await
            .context("failed to list annotators")?;
        rows.iter().map(annotator_from_row).collect()
    }

    pub async fn get_annotator(&self, id: AnnotatorId) -> Result<Option<Annotator>> {
        let row = sqlx::query("SELECT id, name, start_time FROM annotators WHERE id = ?")
            .bind(id.0)
            .fetch_optional(&self.pool)
            .await
            .with_context(|| format!("failed to load annotator {id}"))?;
        row.as_ref().map(annotator_from_row).transpose()
    }

    pub async fn create_annotator(&self, name: &str) -> Result<Annotator> {
        let name = normalize_annotator_name(name).context("annotator name must not be empty")?;

        let row = sqlx::query(
            "INSERT INTO annotators (name, start_time) VALUES (?, NULL)
             RETURNING id, name, start_time",
        )
        .bind(name)
        .fetch_one(&self.pool)
        .await
        .context("failed to insert annotator")?;
        annotator_from_row(&row)
    }

    /// Returns `false` when no row had this id.
    pub async fn delete_annotator(&self, id: AnnotatorId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM annotators WHERE id = ?")
            .bind(id.0)
            .execute(&self.pool)
            .await
            .with_context(|| format!("failed to delete annotator {id}"))?;
        Ok(result.rows_affected() > 0)
    }

    /// Overwrites `start_time` only. `None` clears the timer.
    pub async fn set_start_time(
        &self,
        id: AnnotatorId,
        start_time: Option<DateTime<Utc>>,
    ) -> Result<Option<Annotator>> {
        let row = sqlx::query(
            "UPDATE annotators SET start_time = ? WHERE id = ?
             RETURNING id, name, start_time",
        )
        .bind(start_time)
        .bind(id.0)
        .fetch_optional(&self.pool)
        .await
        .with_context(|| format!("failed to update start time of annotator {id}"))?;
        row.as_ref().map(annotator_from_row).transpose()
    }
}

fn annotator_from_row(row: &SqliteRow) -> Result<Annotator> {
    Ok(Annotator {
        id: AnnotatorId(row.try_get::<i64, _>("id")?),
        name: row.try_get::<String, _>("name")?,
        start_time: row.try_get::<Option<DateTime<Utc>>, _>("start_time")?,
    })
}

/// Creates the directory that will hold a file-backed sqlite database.
pub fn ensure_sqlite_parent_dir_exists(database_url: &str) -> Result<()> {
    let Some(path) = sqlite_path(database_url) else {
        return Ok(());
    };

    let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) else {
        return Ok(());
    };

    fs::create_dir_all(parent).with_context(|| {
        format!(
            "failed to create parent directory '{}' for database url '{database_url}'",
            parent.display()
        )
    })?;

    Ok(())
}

/// File path behind a sqlite url, or `None` for in-memory and non-sqlite urls.
pub fn sqlite_path(database_url: &str) -> Option<PathBuf> {
    if database_url.starts_with("sqlite::memory:") || !database_url.starts_with("sqlite:") {
        return None;
    }

    let path = database_url
        .trim_start_matches("sqlite://")
        .trim_start_matches("sqlite:")
        .split('?')
        .next()
        .unwrap_or_default();

    if path.is_empty() {
        return None;
    }

    Some(Path::new(path).to_path_buf())
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
