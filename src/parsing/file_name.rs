use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use regex::Regex;

use crate::error::Result;

/// Parts of a conventionally named TAG file: `<serial>--<machine name>--<yymmddhhmmss>.tag`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagFileName {
    pub serial: String,
    pub machine_name: String,
    pub time: Option<DateTime<Utc>>,
}

pub struct TagFileNameParser {
    file_name_regex: Regex,
}

impl TagFileNameParser {
    pub fn new() -> Result<Self> {
        Ok(TagFileNameParser {
            file_name_regex: Regex::new(r"(?i)^([^-]+(?:-[^-]+)*)--(.+)--(\d{12})\.tag$")?,
        })
    }

    /// `None` if the name does not follow the convention
    pub fn parse(&self, file_name: &str) -> Option<TagFileName> {
        let base = file_name.rsplit(['/', '\\']).next().unwrap_or(file_name);
        let captures = self.file_name_regex.captures(base)?;
        let time = NaiveDateTime::parse_from_str(&captures[3], "%y%m%d%H%M%S")
            .ok()
            .map(|naive| Utc.from_utc_datetime(&naive));
        Some(TagFileName {
            serial: captures[1].to_string(),
            machine_name: captures[2].to_string(),
            time,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_conventional_name() {
        let parser = TagFileNameParser::new().unwrap();
        let parsed = parser.parse("incoming/0523J019SW--CB54 Roller--190814094812.tag").unwrap();
        assert_eq!(parsed.serial, "0523J019SW");
        assert_eq!(parsed.machine_name, "CB54 Roller");
        assert_eq!(parsed.time, Some(Utc.with_ymd_and_hms(2019, 8, 14, 9, 48, 12).unwrap()));
    }

    #[test]
    fn test_unconventional_names() {
        let parser = TagFileNameParser::new().unwrap();
        assert!(parser.parse("capture.tag").is_none());
        assert!(parser.parse("A--B--1234.tag").is_none());

        let bad_date = parser.parse("A--B--999999999999.TAG").unwrap();
        assert_eq!(bad_date.time, None);
    }
}
