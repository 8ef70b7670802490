pub mod attribute;
pub mod bm25;
pub mod error;
pub mod expand;
pub mod fusion;
pub mod handle;
pub mod index;
pub mod lexical;
pub mod narrate;
pub mod persist;
pub mod query;
pub mod record;
pub mod retrieve;
pub mod searcher;
pub mod semantic;
pub mod tokenizer;

pub use error::{CollaboratorError, PersistError, RecordError, SearchWarning};
pub use handle::{IndexHandle, SearchIndex};
pub use index::*;
pub use query::{ExpandedQuery, QueryInput, Season};
pub use record::{Constellation, RecordStore};
pub use searcher::{RankedRecord, SearchOutcome, Searcher};
