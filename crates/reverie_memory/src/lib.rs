pub mod extractor;
pub mod fragment;
pub mod sqlite;
pub mod store;

pub use extractor::{HeuristicExtractor, MemoryExtractor};
pub use fragment::{
    FragmentContext, FragmentDate, FragmentLocation, FragmentPerson, FragmentStatus,
    MemoryFragment, TimePeriod,
};
pub use sqlite::SqliteStore;
pub use store::{InMemoryStore, NarrativeStore};
