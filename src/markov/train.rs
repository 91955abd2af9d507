//! Offline corpus training for the Markov Content Backend.
//!
//! Invoked by the `tarwall-train-markov` bin target (spec only — training is
//! explicitly out of the online request path). Tokenizes a plain-text
//! corpus line-by-line, lowercases, strips punctuation except sentence
//! terminators, and additively upserts `transitions` rows. This is the
//! minimal realization of "populated offline from a corpus" that the spec
//! leaves unspecified in mechanism.

use std::path::Path;

use sqlx::SqlitePool;
use tokio::io::AsyncBufReadExt;

use super::{MarkovError, SENTINEL};

pub struct Trainer<'a> {
    pool: &'a SqlitePool,
    max_distinct_words: u64,
}

impl<'a> Trainer<'a> {
    pub fn new(pool: &'a SqlitePool, max_distinct_words: u64) -> Self {
        Self { pool, max_distinct_words }
    }

    /// Trains on every line of the file at `path`. Returns the number of
    /// sentences ingested.
    pub async fn train_file(&self, path: &Path) -> Result<u64, MarkovError> {
        let file = tokio::fs::File::open(path).await?;
        let mut lines = tokio::io::BufReader::new(file).lines();
        let mut count = 0u64;
        while let Some(line) = lines.next_line().await? {
            for sentence in tokenize_sentences(&line) {
                self.ingest_sentence(&sentence).await?;
                count += 1;
            }
        }
        Ok(count)
    }

    /// Ingests a single pre-tokenized sentence (ordered lowercase tokens,
    /// punctuation already stripped).
    pub async fn ingest_sentence(&self, tokens: &[String]) -> Result<(), MarkovError> {
        if tokens.is_empty() {
            return Ok(());
        }

        let mut ids = Vec::with_capacity(tokens.len() + 2);
        ids.push(SENTINEL);
        for token in tokens {
            ids.push(self.word_id(token).await?);
        }
        ids.push(SENTINEL);

        for pair in ids.windows(2) {
            self.bump_transition(pair[0], pair[1]).await?;
        }

        self.evict_if_over_budget().await?;
        Ok(())
    }

    async fn word_id(&self, token: &str) -> Result<i64, MarkovError> {
        sqlx::query("insert or ignore into words (token) values (?)")
            .bind(token)
            .execute(self.pool)
            .await?;
        let (id,): (i64,) =
            sqlx::query_as("select id from words where token = ?").bind(token).fetch_one(self.pool).await?;
        Ok(id)
    }

    async fn bump_transition(&self, prev_id: i64, next_id: i64) -> Result<(), MarkovError> {
        sqlx::query(
            r#"
            insert into transitions (prev_id, next_id, weight) values (?, ?, 1)
            on conflict(prev_id, next_id) do update set weight = weight + 1
            "#,
        )
        .bind(prev_id)
        .bind(next_id)
        .execute(self.pool)
        .await?;
        Ok(())
    }

    /// Evicts the least-frequent non-sentinel word once the distinct-word
    /// budget is exceeded, along with every transition that references it.
    async fn evict_if_over_budget(&self) -> Result<(), MarkovError> {
        let (count,): (i64,) = sqlx::query_as("select count(*) from words").fetch_one(self.pool).await?;
        if (count as u64) <= self.max_distinct_words {
            return Ok(());
        }

        let victim: Option<(i64,)> = sqlx::query_as(
            r#"
            select w.id from words w
            left join transitions t1 on t1.prev_id = w.id
            left join transitions t2 on t2.next_id = w.id
            where w.id != ?
            group by w.id
            order by coalesce(sum(t1.weight), 0) + coalesce(sum(t2.weight), 0) asc
            limit 1
            "#,
        )
        .bind(SENTINEL)
        .fetch_optional(self.pool)
        .await?;

        let Some((victim_id,)) = victim else { return Ok(()) };
        sqlx::query("delete from transitions where prev_id = ? or next_id = ?")
            .bind(victim_id)
            .bind(victim_id)
            .execute(self.pool)
            .await?;
        sqlx::query("delete from words where id = ?").bind(victim_id).execute(self.pool).await?;
        Ok(())
    }
}

/// Splits a line into sentences on `.`/`!`/`?`, lowercases, and strips all
/// punctuation except the sentence terminators themselves (which are
/// consumed as delimiters, not tokens).
fn tokenize_sentences(line: &str) -> Vec<Vec<String>> {
    line.split(['.', '!', '?'])
        .map(|sentence| {
            sentence
                .split_whitespace()
                .map(|word| word.chars().filter(|c| c.is_alphanumeric() || *c == '\'').collect::<String>())
                .map(|word| word.to_lowercase())
                .filter(|word| !word.is_empty())
                .collect::<Vec<_>>()
        })
        .filter(|tokens: &Vec<String>| !tokens.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokenize_splits_on_sentence_terminators() {
        let sentences = tokenize_sentences("The quick fox jumps. Over the lazy dog!");
        assert_eq!(sentences.len(), 2);
        assert_eq!(sentences[0], vec!["the", "quick", "fox", "jumps"]);
        assert_eq!(sentences[1], vec!["over", "the", "lazy", "dog"]);
    }

    #[test]
    fn tokenize_strips_punctuation_and_lowercases() {
        let sentences = tokenize_sentences("Wow, RUST is great -- isn't it?");
        assert_eq!(sentences.len(), 1);
        assert_eq!(sentences[0], vec!["wow", "rust", "is", "great", "isn't", "it"]);
    }

    #[test]
    fn blank_lines_produce_no_sentences() {
        assert!(tokenize_sentences("   ").is_empty());
        assert!(tokenize_sentences("...").is_empty());
    }

    #[tokio::test]
    async fn ingesting_a_sentence_populates_transitions() {
        let pool = SqlitePool::connect("sqlite::memory:").await.expect("in-memory db");
        sqlx::query(
            r#"
            create table words (id integer primary key, token text not null unique);
            "#,
        )
        .execute(&pool)
        .await
        .expect("create words");
        sqlx::query(
            r#"
            create table transitions (
                prev_id integer not null,
                next_id integer not null,
                weight  integer not null,
                primary key (prev_id, next_id)
            );
            "#,
        )
        .execute(&pool)
        .await
        .expect("create transitions");
        sqlx::query("insert into words (id, token) values (1, '')").execute(&pool).await.expect("sentinel");

        let trainer = Trainer::new(&pool, 10_000);
        trainer
            .ingest_sentence(&["the".into(), "fox".into()])
            .await
            .expect("ingest should succeed");

        let (count,): (i64,) =
            sqlx::query_as("select count(*) from transitions").fetch_one(&pool).await.expect("count");
        // sentinel->the, the->fox, fox->sentinel
        assert_eq!(count, 3);
    }
}
