//! TAG file reader and writer.
//!
//! Layout:
//!
//! ```text
//! +--------------------+---------------------------+--------------------------+
//! | header (14 bytes)  | value stream (nybbles)    | field-and-type table     |
//! +--------------------+---------------------------+--------------------------+
//!                      ^ byte 14                   ^ header.table_offset
//! ```
//!
//! The value stream is a sequence of `(varint id, value)` records whose types are defined by the
//! field-and-type table at the end of the file.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::core::encoding::{NybbleReader, NybbleWriter};
use crate::core::geometry::Xyz;
use crate::error::Result;
use crate::parsing::dictionary::{DictionaryItem, FieldType, TagDictionary};
use crate::parsing::value_names;

/// Size of the fixed header in bytes
pub const HEADER_SIZE: usize = 14;

pub const FILE_MAJOR_VERSION: u8 = 1;
pub const FILE_MINOR_VERSION: u8 = 0;

/// Outcome of reading a TAG file. Everything except `NoError` stops processing of the file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReadResult {
    NoError,
    ZeroLengthFile,
    InvalidHeader,
    InvalidDictionary,
    UnknownDictionaryEntry,
    UnexpectedEndOfStream,
    ValueRejected,
    InvalidPosition,
}

impl ReadResult {
    pub fn is_success(self) -> bool {
        self == ReadResult::NoError
    }
}

impl fmt::Display for ReadResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            ReadResult::NoError => "no error",
            ReadResult::ZeroLengthFile => "zero length file",
            ReadResult::InvalidHeader => "invalid header",
            ReadResult::InvalidDictionary => "invalid field and type dictionary",
            ReadResult::UnknownDictionaryEntry => "value references an unknown dictionary entry",
            ReadResult::UnexpectedEndOfStream => "unexpected end of value stream",
            ReadResult::ValueRejected => "value rejected by matcher",
            ReadResult::InvalidPosition => "epoch with invalid position",
        };
        write!(f, "{}", text)
    }
}

/// Receives decoded values from a [`TagFileReader`].
///
/// Each callback returns `Ok(false)` to reject the value, which stops the read. `Err` is reserved
/// for fatal errors and is propagated to the caller of [`TagFileReader::read`].
pub trait TagValueSink {
    fn starting(&mut self, _dictionary: &TagDictionary) -> Result<bool> {
        Ok(true)
    }

    fn read_integer(&mut self, item: &DictionaryItem, value: i64) -> Result<bool>;

    fn read_unsigned_integer(&mut self, item: &DictionaryItem, value: u64) -> Result<bool>;

    fn read_double(&mut self, item: &DictionaryItem, value: f64) -> Result<bool>;

    fn read_ansi_string(&mut self, item: &DictionaryItem, value: &str) -> Result<bool>;

    fn read_unicode_string(&mut self, item: &DictionaryItem, value: &str) -> Result<bool>;

    fn read_empty(&mut self, item: &DictionaryItem) -> Result<bool>;

    /// Called after the last record
    fn finishing(&mut self) -> Result<bool> {
        Ok(true)
    }

    /// More specific reason for the most recent rejection, if the sink has one
    fn rejection_reason(&self) -> Option<ReadResult> {
        None
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TagFileHeader {
    pub file_major_version: u8,
    pub file_minor_version: u8,
    pub dictionary_id: u16,
    pub dictionary_major_version: u8,
    pub dictionary_minor_version: u8,
    pub field_and_type_table_offset: u64,
}

impl Default for TagFileHeader {
    fn default() -> Self {
        Self {
            file_major_version: FILE_MAJOR_VERSION,
            file_minor_version: FILE_MINOR_VERSION,
            dictionary_id: 0,
            dictionary_major_version: 1,
            dictionary_minor_version: 0,
            field_and_type_table_offset: HEADER_SIZE as u64,
        }
    }
}

impl TagFileHeader {
    fn read(reader: &mut NybbleReader<'_>) -> Option<Self> {
        Some(Self {
            file_major_version: reader.read_unsigned(2)? as u8,
            file_minor_version: reader.read_unsigned(2)? as u8,
            dictionary_id: reader.read_unsigned(4)? as u16,
            dictionary_major_version: reader.read_unsigned(2)? as u8,
            dictionary_minor_version: reader.read_unsigned(2)? as u8,
            field_and_type_table_offset: reader.read_unsigned(16)?,
        })
    }

    fn write(&self, writer: &mut NybbleWriter) {
        writer.write_unsigned(u64::from(self.file_major_version), 2);
        writer.write_unsigned(u64::from(self.file_minor_version), 2);
        writer.write_unsigned(u64::from(self.dictionary_id), 4);
        writer.write_unsigned(u64::from(self.dictionary_major_version), 2);
        writer.write_unsigned(u64::from(self.dictionary_minor_version), 2);
        writer.write_unsigned(self.field_and_type_table_offset, 16);
    }
}

/// Decodes a TAG file held in memory and pushes its values into a [`TagValueSink`].
pub struct TagFileReader<'a> {
    data: &'a [u8],
    header: Option<TagFileHeader>,
    dictionary: TagDictionary,
}

impl<'a> TagFileReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            header: None,
            dictionary: TagDictionary::new(),
        }
    }

    /// Header of the last read, if it got that far
    pub fn header(&self) -> Option<&TagFileHeader> {
        self.header.as_ref()
    }

    pub fn dictionary(&self) -> &TagDictionary {
        &self.dictionary
    }

    pub fn read<S: TagValueSink + ?Sized>(&mut self, sink: &mut S) -> Result<ReadResult> {
        let data = self.data;
        if data.is_empty() {
            return Ok(ReadResult::ZeroLengthFile);
        }

        let mut reader = NybbleReader::new(data);
        let Some(header) = TagFileHeader::read(&mut reader) else {
            return Ok(ReadResult::InvalidHeader);
        };
        self.header = Some(header);

        let table_offset = header.field_and_type_table_offset;
        if table_offset < HEADER_SIZE as u64 || table_offset > data.len() as u64 {
            return Ok(ReadResult::InvalidDictionary);
        }
        let table_offset = table_offset as usize;

        self.dictionary = match Self::read_dictionary(data, table_offset) {
            Some(dictionary) => dictionary,
            None => return Ok(ReadResult::InvalidDictionary),
        };

        if !sink.starting(&self.dictionary)? {
            return Ok(sink.rejection_reason().unwrap_or(ReadResult::ValueRejected));
        }

        let mut reader = NybbleReader::new(data);
        reader.seek_to_byte(HEADER_SIZE);
        reader.set_end_byte(table_offset);

        // A single trailing nybble is alignment padding
        while reader.remaining() >= 2 {
            let Some(id) = reader.read_varint() else {
                return Ok(ReadResult::UnexpectedEndOfStream);
            };
            let Some(item) = self.dictionary.get(id) else {
                return Ok(ReadResult::UnknownDictionaryEntry);
            };

            let accepted = match Self::dispatch_value(&mut reader, item, sink)? {
                Some(accepted) => accepted,
                None => return Ok(ReadResult::UnexpectedEndOfStream),
            };

            if !accepted {
                return Ok(sink.rejection_reason().unwrap_or(ReadResult::ValueRejected));
            }
        }

        if !sink.finishing()? {
            return Ok(sink.rejection_reason().unwrap_or(ReadResult::ValueRejected));
        }

        Ok(ReadResult::NoError)
    }

    fn read_dictionary(data: &[u8], table_offset: usize) -> Option<TagDictionary> {
        let mut reader = NybbleReader::new(data);
        reader.seek_to_byte(table_offset);

        let mut dictionary = TagDictionary::new();
        loop {
            let name = reader.read_ansi_string()?;
            if name.is_empty() {
                return Some(dictionary);
            }
            let field_type = FieldType::from_code(reader.read_nybble()?)?;
            let id = reader.read_varint()?;
            if !dictionary.add(DictionaryItem {
                name,
                field_type,
                id,
            }) {
                return None;
            }
        }
    }

    /// Read one value and hand it to the sink. `Ok(None)` means the stream was truncated.
    fn dispatch_value<S: TagValueSink + ?Sized>(
        reader: &mut NybbleReader<'_>,
        item: &DictionaryItem,
        sink: &mut S,
    ) -> Result<Option<bool>> {
        let accepted = match item.field_type {
            FieldType::Int4
            | FieldType::Int8
            | FieldType::Int12
            | FieldType::Int16
            | FieldType::Int32 => {
                let nybbles = item.field_type.integer_nybbles().unwrap_or(0);
                let Some(value) = reader.read_signed(nybbles) else { return Ok(None) };
                sink.read_integer(item, value)?
            }
            FieldType::UInt4
            | FieldType::UInt8
            | FieldType::UInt12
            | FieldType::UInt16
            | FieldType::UInt32 => {
                let nybbles = item.field_type.integer_nybbles().unwrap_or(0);
                let Some(value) = reader.read_unsigned(nybbles) else { return Ok(None) };
                sink.read_unsigned_integer(item, value)?
            }
            FieldType::IeeeDouble => {
                let Some(value) = reader.read_double() else { return Ok(None) };
                sink.read_double(item, value)?
            }
            FieldType::AnsiString => {
                let Some(value) = reader.read_ansi_string() else { return Ok(None) };
                sink.read_ansi_string(item, &value)?
            }
            FieldType::UnicodeString => {
                let Some(value) = reader.read_unicode_string() else { return Ok(None) };
                sink.read_unicode_string(item, &value)?
            }
            FieldType::Empty => sink.read_empty(item)?,
        };
        Ok(Some(accepted))
    }
}

/// Builds TAG files. Dictionary entries are allocated on first use of each (name, type) pair.
#[derive(Debug, Default)]
pub struct TagFileWriter {
    header: TagFileHeader,
    values: NybbleWriter,
    dictionary: Vec<DictionaryItem>,
    ids: HashMap<(String, FieldType), u32>,
}

impl TagFileWriter {
    pub fn new() -> Self {
        Self::default()
    }

    fn id_for(&mut self, name: &str, field_type: FieldType) -> u32 {
        if let Some(&id) = self.ids.get(&(name.to_string(), field_type)) {
            return id;
        }
        let id = self.dictionary.len() as u32 + 1;
        self.dictionary.push(DictionaryItem::new(name, field_type, id));
        self.ids.insert((name.to_string(), field_type), id);
        id
    }

    /// Write an unsigned value; `field_type` must be one of the unsigned integer types
    pub fn write_unsigned(&mut self, name: &str, field_type: FieldType, value: u64) -> &mut Self {
        let id = self.id_for(name, field_type);
        self.values.write_varint(id);
        self.values.write_unsigned(value, field_type.integer_nybbles().unwrap_or(8));
        self
    }

    /// Write a signed value; `field_type` must be one of the signed integer types
    pub fn write_integer(&mut self, name: &str, field_type: FieldType, value: i64) -> &mut Self {
        let id = self.id_for(name, field_type);
        self.values.write_varint(id);
        self.values.write_signed(value, field_type.integer_nybbles().unwrap_or(8));
        self
    }

    pub fn write_double(&mut self, name: &str, value: f64) -> &mut Self {
        let id = self.id_for(name, FieldType::IeeeDouble);
        self.values.write_varint(id);
        self.values.write_double(value);
        self
    }

    pub fn write_ansi_string(&mut self, name: &str, value: &str) -> &mut Self {
        let id = self.id_for(name, FieldType::AnsiString);
        self.values.write_varint(id);
        self.values.write_ansi_string(value);
        self
    }

    pub fn write_unicode_string(&mut self, name: &str, value: &str) -> &mut Self {
        let id = self.id_for(name, FieldType::UnicodeString);
        self.values.write_varint(id);
        self.values.write_unicode_string(value);
        self
    }

    pub fn write_empty(&mut self, name: &str) -> &mut Self {
        let id = self.id_for(name, FieldType::Empty);
        self.values.write_varint(id);
        self
    }

    /// Absolute GPS week
    pub fn write_week(&mut self, week: u32) -> &mut Self {
        self.write_unsigned(value_names::WEEK, FieldType::UInt16, u64::from(week))
    }

    /// Absolute millisecond-of-week time; starts a new epoch when read
    pub fn write_time(&mut self, milliseconds: u32) -> &mut Self {
        self.write_unsigned(value_names::TIME, FieldType::UInt32, u64::from(milliseconds))
    }

    /// Time offset from the previous time in tenths of a second
    pub fn write_time_offset(&mut self, tenths: u8) -> &mut Self {
        if tenths < 16 {
            self.write_unsigned(value_names::TIME, FieldType::UInt4, u64::from(tenths))
        } else {
            self.write_unsigned(value_names::TIME, FieldType::UInt8, u64::from(tenths))
        }
    }

    /// Select a side (for example [`value_names::BLADE_LEFT`]) and write its absolute position
    pub fn write_position(&mut self, side: &str, position: Xyz) -> &mut Self {
        self.write_empty(side)
            .write_double(value_names::EASTING, position.x)
            .write_double(value_names::NORTHING, position.y)
            .write_double(value_names::ELEVATION, position.z)
    }

    /// Select a side and write millimetre offsets from its previous position
    pub fn write_position_offset(
        &mut self,
        side: &str,
        dx_mm: i64,
        dy_mm: i64,
        dz_mm: i64,
    ) -> &mut Self {
        self.write_empty(side)
            .write_integer(value_names::EASTING, FieldType::Int16, dx_mm)
            .write_integer(value_names::NORTHING, FieldType::Int16, dy_mm)
            .write_integer(value_names::ELEVATION, FieldType::Int16, dz_mm)
    }

    /// Blade left and right absolute positions
    pub fn write_blade(&mut self, left: Xyz, right: Xyz) -> &mut Self {
        self.write_position(value_names::BLADE_LEFT, left)
            .write_position(value_names::BLADE_RIGHT, right)
    }

    /// Assemble header, value stream and dictionary
    pub fn finish(&self) -> Vec<u8> {
        let mut values = self.values.clone();
        values.align_to_byte();
        let values = values.into_bytes();

        let mut header = self.header;
        header.field_and_type_table_offset = (HEADER_SIZE + values.len()) as u64;

        let mut out = NybbleWriter::new();
        header.write(&mut out);
        out.write_bytes(&values);
        for item in &self.dictionary {
            out.write_ansi_string(&item.name);
            out.write_nybble(item.field_type.code());
            out.write_varint(item.id);
        }
        out.write_ansi_string("");
        out.align_to_byte();
        out.into_bytes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct RecordingSink {
        records: Vec<String>,
        reject_name: Option<&'static str>,
    }

    impl RecordingSink {
        fn push(&mut self, item: &DictionaryItem, text: String) -> Result<bool> {
            self.records.push(format!("{}={}", item.name, text));
            Ok(self.reject_name != Some(item.name.as_str()))
        }
    }

    impl TagValueSink for RecordingSink {
        fn read_integer(&mut self, item: &DictionaryItem, value: i64) -> Result<bool> {
            self.push(item, value.to_string())
        }
        fn read_unsigned_integer(&mut self, item: &DictionaryItem, value: u64) -> Result<bool> {
            self.push(item, value.to_string())
        }
        fn read_double(&mut self, item: &DictionaryItem, value: f64) -> Result<bool> {
            self.push(item, format!("{:.3}", value))
        }
        fn read_ansi_string(&mut self, item: &DictionaryItem, value: &str) -> Result<bool> {
            self.push(item, value.to_string())
        }
        fn read_unicode_string(&mut self, item: &DictionaryItem, value: &str) -> Result<bool> {
            self.push(item, value.to_string())
        }
        fn read_empty(&mut self, item: &DictionaryItem) -> Result<bool> {
            self.push(item, String::new())
        }
    }

    fn sample_file() -> Vec<u8> {
        let mut writer = TagFileWriter::new();
        writer
            .write_ansi_string(value_names::MACHINE_ID, "0187J008YU")
            .write_week(2000)
            .write_time(1000)
            .write_integer(value_names::EASTING, FieldType::Int4, -2)
            .write_double(value_names::ELEVATION, 101.25)
            .write_unicode_string(value_names::DESIGN, "Haul Road")
            .write_empty(value_names::MAP_RESET)
            .write_time_offset(5);
        writer.finish()
    }

    #[test]
    fn test_reads_every_record_in_order() {
        let bytes = sample_file();
        let mut reader = TagFileReader::new(&bytes);
        let mut sink = RecordingSink::default();

        assert_eq!(reader.read(&mut sink).unwrap(), ReadResult::NoError);
        assert_eq!(
            sink.records,
            vec![
                "MID=0187J008YU",
                "WEEK=2000",
                "TIME=1000",
                "EAST=-2",
                "ELEV=101.250",
                "DES=Haul Road",
                "MRST=",
                "TIME=5",
            ]
        );
        assert_eq!(reader.header().map(|h| h.file_major_version), Some(FILE_MAJOR_VERSION));
        assert_eq!(reader.dictionary().len(), 8);
    }

    #[test]
    fn test_rejection_stops_the_read() {
        let bytes = sample_file();
        let mut reader = TagFileReader::new(&bytes);
        let mut sink = RecordingSink {
            reject_name: Some("EAST"),
            ..Default::default()
        };

        assert_eq!(reader.read(&mut sink).unwrap(), ReadResult::ValueRejected);
        assert_eq!(sink.records.len(), 4);
    }

    #[test]
    fn test_empty_and_short_files() {
        let mut sink = RecordingSink::default();
        assert_eq!(TagFileReader::new(&[]).read(&mut sink).unwrap(), ReadResult::ZeroLengthFile);
        assert_eq!(
            TagFileReader::new(&[1, 0, 0]).read(&mut sink).unwrap(),
            ReadResult::InvalidHeader
        );
    }

    #[test]
    fn test_table_offset_out_of_range() {
        let mut bytes = sample_file();
        let len = bytes.len() as u64 + 10;
        bytes[6..14].copy_from_slice(&len.to_be_bytes());
        let mut sink = RecordingSink::default();
        assert_eq!(
            TagFileReader::new(&bytes).read(&mut sink).unwrap(),
            ReadResult::InvalidDictionary
        );
    }

    #[test]
    fn test_unknown_dictionary_reference() {
        let mut writer = TagFileWriter::new();
        writer.write_week(2000);
        let mut bytes = writer.finish();
        // First value record id lives in the first byte after the header
        bytes[HEADER_SIZE] = 0x7F;
        let mut sink = RecordingSink::default();
        assert_eq!(
            TagFileReader::new(&bytes).read(&mut sink).unwrap(),
            ReadResult::UnknownDictionaryEntry
        );
    }

    #[test]
    fn test_truncated_value_stream() {
        let mut writer = TagFileWriter::new();
        writer.write_time(123_456);
        let full = writer.finish();

        // Rebuild with the table offset pulled back into the middle of the TIME value
        let mut bytes = full.clone();
        let offset = (HEADER_SIZE + 3) as u64;
        bytes[6..14].copy_from_slice(&offset.to_be_bytes());
        // Dictionary must still be readable at the new offset, so splice it in
        let dictionary_start = HEADER_SIZE + 5;
        let mut spliced = bytes[..HEADER_SIZE + 3].to_vec();
        spliced.extend_from_slice(&full[dictionary_start..]);

        let mut sink = RecordingSink::default();
        assert_eq!(
            TagFileReader::new(&spliced).read(&mut sink).unwrap(),
            ReadResult::UnexpectedEndOfStream
        );
    }
}
