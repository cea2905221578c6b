use itertools::{IntoChunks, Itertools};

/// Maximum number of rows per `INSERT … VALUES` statement, staying clear of
/// the PostgreSQL bind-parameter limit for wide tables.
pub const CHUNK_SIZE: usize = 500;

/// Split an iterator of active models into insert-sized chunks.
pub trait EntityChunkedIter: Sized + Iterator {
    fn chunked(self) -> IntoChunks<Self>;
}

impl<T> EntityChunkedIter for T
where
    T: Sized + Iterator,
{
    fn chunked(self) -> IntoChunks<Self> {
        self.chunks(CHUNK_SIZE)
    }
}
