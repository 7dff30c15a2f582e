use std::io::Write;

use crate::error::Result;
use crate::parsing::dictionary::{DictionaryItem, TagDictionary};
use crate::parsing::tag_file::TagValueSink;

/// Writes every decoded record as one line of text
pub struct TagFileDumper<W: Write> {
    out: W,
    record_count: u64,
}

impl<W: Write> TagFileDumper<W> {
    pub fn new(out: W) -> Self {
        TagFileDumper {
            out,
            record_count: 0,
        }
    }

    pub fn record_count(&self) -> u64 {
        self.record_count
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn line(&mut self, item: &DictionaryItem, value: &str) -> Result<bool> {
        self.record_count += 1;
        writeln!(
            self.out,
            "{:>8}  {:<4} {:<13} {}",
            self.record_count,
            item.name,
            format!("{:?}", item.field_type),
            value
        )?;
        Ok(true)
    }
}

impl<W: Write> TagValueSink for TagFileDumper<W> {
    fn starting(&mut self, dictionary: &TagDictionary) -> Result<bool> {
        writeln!(self.out, "Dictionary ({} entries)", dictionary.len())?;
        for item in dictionary.iter() {
            writeln!(self.out, "  {:>4}  {:<4} {:?}", item.id, item.name, item.field_type)?;
        }
        writeln!(self.out, "Values")?;
        Ok(true)
    }

    fn read_integer(&mut self, item: &DictionaryItem, value: i64) -> Result<bool> {
        self.line(item, &value.to_string())
    }

    fn read_unsigned_integer(&mut self, item: &DictionaryItem, value: u64) -> Result<bool> {
        self.line(item, &value.to_string())
    }

    fn read_double(&mut self, item: &DictionaryItem, value: f64) -> Result<bool> {
        self.line(item, &format!("{:.4}", value))
    }

    fn read_ansi_string(&mut self, item: &DictionaryItem, value: &str) -> Result<bool> {
        self.line(item, &format!("{:?}", value))
    }

    fn read_unicode_string(&mut self, item: &DictionaryItem, value: &str) -> Result<bool> {
        self.line(item, &format!("{:?}", value))
    }

    fn read_empty(&mut self, item: &DictionaryItem) -> Result<bool> {
        self.line(item, "")
    }

    fn finishing(&mut self) -> Result<bool> {
        writeln!(self.out, "{} records", self.record_count)?;
        self.out.flush()?;
        Ok(true)
    }
}
