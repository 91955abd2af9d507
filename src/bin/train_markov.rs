//! Offline corpus-training entry point for the Markov Content Backend.
//!
//! Usage: `tarwall-train-markov <db-path> <corpus-file> [max-distinct-words]`
//!
//! This does not run against live traffic; it is the `xtask`-style
//! maintenance tool an operator runs to (re)populate the n-gram table before
//! deploying `tarwall` itself.

use std::path::PathBuf;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use tarwall::markov::train::Trainer;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_env_filter(tracing_subscriber::EnvFilter::from_default_env()).init();

    let mut args = std::env::args().skip(1);
    let db_path = args.next().ok_or_else(|| anyhow::anyhow!("usage: tarwall-train-markov <db-path> <corpus-file> [max-distinct-words]"))?;
    let corpus_path: PathBuf =
        args.next().ok_or_else(|| anyhow::anyhow!("missing corpus file argument"))?.into();
    let max_distinct_words: u64 = args.next().map(|s| s.parse()).transpose()?.unwrap_or(200_000);

    let options = SqliteConnectOptions::new().filename(&db_path).create_if_missing(true);
    let pool = SqlitePoolOptions::new().max_connections(1).connect_with(options).await?;
    sqlx::query(
        r#"
        create table if not exists words (id integer primary key, token text not null unique);
        "#,
    )
    .execute(&pool)
    .await?;
    sqlx::query(
        r#"
        create table if not exists transitions (
            prev_id integer not null,
            next_id integer not null,
            weight  integer not null,
            primary key (prev_id, next_id)
        );
        "#,
    )
    .execute(&pool)
    .await?;
    sqlx::query("create index if not exists transitions_prev_idx on transitions (prev_id)")
        .execute(&pool)
        .await?;
    sqlx::query("insert or ignore into words (id, token) values (1, '')").execute(&pool).await?;

    let trainer = Trainer::new(&pool, max_distinct_words);
    let sentences = trainer.train_file(&corpus_path).await?;
    tracing::info!(sentences, db_path, "training complete");

    Ok(())
}
