pub mod entry;
pub mod source;

pub use entry::{meta, EnrichedEntry, EntryDetails, FeedEntry};
pub use source::{FilterConfig, Source};
