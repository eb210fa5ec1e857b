//! Plugins shipped with the engine.

mod field_pattern;
mod required_fields;
mod sequence_number;
mod summary_file;

pub use field_pattern::FieldPattern;
pub use required_fields::RequiredFields;
pub use sequence_number::SequenceNumber;
pub use summary_file::SummaryFile;
