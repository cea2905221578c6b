use sea_orm::{ConnectionTrait, DbErr, Statement};
use std::time::Duration;
use tokio::time::Instant;

const DEFAULT_BATCH_SIZE: usize = 2_000;
const DEFAULT_MAX_LATENCY: Duration = Duration::from_secs(60);

fn aborted() -> DbErr {
    DbErr::Custom("microbatch aborted by an earlier statement error".into())
}

/// Size- and latency-bounded batching of parameterized statements inside an
/// open transaction.
///
/// Statements queue in memory and execute in enqueue order once the queue
/// holds [`DEFAULT_BATCH_SIZE`] entries or [`DEFAULT_MAX_LATENCY`] has
/// elapsed since the first unflushed enqueue. A statement error poisons the
/// batcher: nothing further executes, and the error also surfaces from
/// [`Microbatcher::done`].
pub struct Microbatcher<'a, C> {
    conn: &'a C,
    size: usize,
    max_latency: Duration,
    queue: Vec<Statement>,
    oldest: Option<Instant>,
    executed: usize,
    poisoned: bool,
}

impl<'a, C: ConnectionTrait> Microbatcher<'a, C> {
    pub fn new(conn: &'a C) -> Self {
        Self::with_bounds(conn, DEFAULT_BATCH_SIZE, DEFAULT_MAX_LATENCY)
    }

    pub fn with_bounds(conn: &'a C, size: usize, max_latency: Duration) -> Self {
        Self {
            conn,
            size: size.max(1),
            max_latency,
            queue: Vec::new(),
            oldest: None,
            executed: 0,
            poisoned: false,
        }
    }

    /// Queue a statement, flushing if the batch is full or too old.
    pub async fn queue(&mut self, stmt: Statement) -> Result<(), DbErr> {
        if self.poisoned {
            return Err(aborted());
        }

        if self.queue.is_empty() {
            self.oldest = Some(Instant::now());
        }
        self.queue.push(stmt);

        let overdue = self
            .oldest
            .is_some_and(|first| first.elapsed() >= self.max_latency);
        if self.queue.len() >= self.size || overdue {
            self.flush().await?;
        }

        Ok(())
    }

    /// Flush the remainder and return the number of statements executed.
    pub async fn done(mut self) -> Result<usize, DbErr> {
        if self.poisoned {
            return Err(aborted());
        }
        self.flush().await?;
        Ok(self.executed)
    }

    async fn flush(&mut self) -> Result<(), DbErr> {
        for stmt in self.queue.drain(..) {
            if let Err(err) = self.conn.execute(stmt).await {
                self.poisoned = true;
                return Err(err);
            }
            self.executed += 1;
        }
        self.oldest = None;

        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use sea_orm::{DbBackend, MockDatabase, MockExecResult};

    fn statement(n: usize) -> Statement {
        Statement::from_string(DbBackend::Postgres, format!("SELECT {n}"))
    }

    fn exec_ok() -> MockExecResult {
        MockExecResult {
            last_insert_id: 0,
            rows_affected: 1,
        }
    }

    #[tokio::test]
    async fn flushes_on_size_bound() -> Result<(), anyhow::Error> {
        let db = MockDatabase::new(DbBackend::Postgres)
            .append_exec_results((0..4).map(|_| exec_ok()).collect::<Vec<_>>())
            .into_connection();

        let mut batcher = Microbatcher::with_bounds(&db, 2, Duration::from_secs(60));
        for n in 0..3 {
            batcher.queue(statement(n)).await?;
        }

        // two statements flushed eagerly, the third only via done
        let log = db.into_transaction_log();
        assert_eq!(log.len(), 2);

        Ok(())
    }

    #[tokio::test]
    async fn done_flushes_remainder() -> Result<(), anyhow::Error> {
        let db = MockDatabase::new(DbBackend::Postgres)
            .append_exec_results((0..3).map(|_| exec_ok()).collect::<Vec<_>>())
            .into_connection();

        let mut batcher = Microbatcher::with_bounds(&db, 100, Duration::from_secs(60));
        for n in 0..3 {
            batcher.queue(statement(n)).await?;
        }
        assert_eq!(batcher.done().await?, 3);

        Ok(())
    }

    #[tokio::test]
    async fn zero_latency_flushes_each_statement() -> Result<(), anyhow::Error> {
        let db = MockDatabase::new(DbBackend::Postgres)
            .append_exec_results((0..2).map(|_| exec_ok()).collect::<Vec<_>>())
            .into_connection();

        let mut batcher = Microbatcher::with_bounds(&db, 100, Duration::ZERO);
        batcher.queue(statement(0)).await?;
        batcher.queue(statement(1)).await?;
        assert_eq!(batcher.done().await?, 2);

        Ok(())
    }

    #[tokio::test]
    async fn statement_error_poisons_the_batcher() {
        // no exec results appended: every execute fails
        let db = MockDatabase::new(DbBackend::Postgres).into_connection();

        let mut batcher = Microbatcher::with_bounds(&db, 1, Duration::from_secs(60));
        assert!(batcher.queue(statement(0)).await.is_err());
        assert!(batcher.queue(statement(1)).await.is_err());
        assert!(batcher.done().await.is_err());
    }
}
