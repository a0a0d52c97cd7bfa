pub use self::filter::Filter;
pub use self::project::ProjectIterator;
pub use self::scan::RemoteScan;
use common::{MedError, TableSchema, Tuple};

mod filter;
mod project;
mod scan;

/// Trait implemented by every node in the physical plan.
pub trait OpIterator {
    /// Opens the iterator. This must be called before any of the other methods.
    fn open(&mut self) -> Result<(), MedError>;

    /// Advances the iterator and returns the next tuple, or None when exhausted.
    ///
    /// # Panics
    ///
    /// Panics if the iterator is not open.
    fn next(&mut self) -> Result<Option<Tuple>, MedError>;

    /// Closes the iterator.
    fn close(&mut self) -> Result<(), MedError>;

    /// Returns the iterator to the start.
    ///
    /// # Panics
    ///
    /// Panics if the iterator is not open.
    fn rewind(&mut self) -> Result<(), MedError>;

    /// Returns the schema associated with this OpIterator.
    fn get_schema(&self) -> &TableSchema;
}
