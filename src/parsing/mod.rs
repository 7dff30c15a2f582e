//! TAG file decoding and value matching

pub mod dictionary;
pub mod dumper;
pub mod file_name;
pub mod matchers;
pub mod tag_file;
pub mod value_names;

pub use dictionary::{DictionaryItem, FieldType, TagDictionary};
pub use tag_file::{ReadResult, TagFileReader, TagFileWriter, TagValueSink};
