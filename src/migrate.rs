use anyhow::Result;
use sqlx::SqlitePool;

use crate::config::Config;
use crate::db;

pub async fn run_migrations(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;
    apply_schema(
        &pool,
        &config.store.books_table,
        &config.store.curators_table,
    )
    .await?;
    pool.close().await;

    println!("init");
    println!("  database: {}", config.store.path.display());
    println!("  tables: {}, {}", config.store.books_table, config.store.curators_table);
    println!("ok");
    Ok(())
}

/// Create the books and curators tables and their indexes if missing.
pub async fn apply_schema(pool: &SqlitePool, books: &str, curators: &str) -> Result<()> {
    // Create curators table
    sqlx::query(&format!(
        r#"
        CREATE TABLE IF NOT EXISTS "{curators}" (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            department TEXT
        )
        "#
    ))
    .execute(pool)
    .await?;

    // Create books table; uri and (source, source_id) are both unique
    sqlx::query(&format!(
        r#"
        CREATE TABLE IF NOT EXISTS "{books}" (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            uri TEXT UNIQUE,
            source TEXT NOT NULL,
            source_id TEXT NOT NULL,
            legacy_id INTEGER,
            title TEXT NOT NULL,
            author TEXT,
            classification TEXT,
            language TEXT,
            subject TEXT,
            publisher TEXT,
            publication_date TEXT,
            description TEXT,
            cover_uri TEXT,
            curator_id INTEGER REFERENCES "{curators}"(id),
            created_at INTEGER NOT NULL DEFAULT (strftime('%s', 'now')),
            UNIQUE(source, source_id)
        )
        "#
    ))
    .execute(pool)
    .await?;

    // Create indexes
    sqlx::query(&format!(
        r#"CREATE INDEX IF NOT EXISTS "idx_{books}_classification" ON "{books}"(classification)"#
    ))
    .execute(pool)
    .await?;
    sqlx::query(&format!(
        r#"CREATE INDEX IF NOT EXISTS "idx_{books}_curator_id" ON "{books}"(curator_id)"#
    ))
    .execute(pool)
    .await?;

    Ok(())
}
