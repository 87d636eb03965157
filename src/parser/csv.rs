//! CSV record reading and writing on top of the `csv` crate

use std::io;

use ::csv::{ReaderBuilder, Writer, WriterBuilder};

/// A CSV record with the 1-based line it starts on
pub type Record = (usize, Vec<String>);

/// Split CSV text into records of fields
///
/// No header handling is done here; the first record is returned like any
/// other. Rows may differ in length. Blank lines are skipped.
pub fn read_records(input: &str) -> Result<Vec<Record>, ::csv::Error> {
    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(input.as_bytes());

    let mut records = Vec::new();
    for result in reader.records() {
        let record = result?;
        if record.len() == 1 && record[0].trim().is_empty() {
            continue;
        }
        let line = record.position().map_or(0, |p| p.line() as usize);
        records.push((line, record.iter().map(String::from).collect()));
    }

    Ok(records)
}

/// Builds CSV text in memory, one record per line
pub struct RecordWriter {
    inner: Writer<Vec<u8>>,
}

impl RecordWriter {
    /// Create a writer that starts with `header`
    pub fn with_header<I, S>(header: I) -> Result<Self, ::csv::Error>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<[u8]>,
    {
        let mut writer = Self {
            inner: WriterBuilder::new().from_writer(Vec::new()),
        };
        writer.write(header)?;
        Ok(writer)
    }

    /// Append one record
    pub fn write<I, S>(&mut self, fields: I) -> Result<(), ::csv::Error>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<[u8]>,
    {
        self.inner.write_record(fields)
    }

    /// Flush and return the text
    pub fn finish(self) -> Result<String, ::csv::Error> {
        let bytes = self
            .inner
            .into_inner()
            .map_err(|e| ::csv::Error::from(e.into_error()))?;
        String::from_utf8(bytes)
            .map_err(|e| ::csv::Error::from(io::Error::new(io::ErrorKind::InvalidData, e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_one(fields: &[&str]) -> String {
        let mut writer = RecordWriter::with_header(fields).unwrap();
        writer.write(["tail"]).unwrap();
        let text = writer.finish().unwrap();
        text.lines().next().unwrap().to_string()
    }

    #[test]
    fn test_simple_records() {
        let records = read_records("a,b\n1,2\r\n3,4").unwrap();
        assert_eq!(records.len(), 3);
        assert_eq!(records[1], (2, vec!["1".to_string(), "2".to_string()]));
        assert_eq!(records[2].1, vec!["3", "4"]);
    }

    #[test]
    fn test_quoted_fields() {
        let records = read_records("\"x, y\",\"say \"\"hi\"\"\"\n\"multi\nline\",z\n").unwrap();
        assert_eq!(records[0].1, vec!["x, y", "say \"hi\""]);
        assert_eq!(records[1].1, vec!["multi\nline", "z"]);
        assert_eq!(records[1].0, 2);
    }

    #[test]
    fn test_blank_lines_skipped() {
        let records = read_records("a\n\nb\n   \nc\n").unwrap();
        let fields: Vec<_> = records.iter().map(|(_, r)| r[0].as_str()).collect();
        assert_eq!(fields, ["a", "b", "c"]);
    }

    #[test]
    fn test_ragged_rows_allowed() {
        let records = read_records("a,b,c\n1\n").unwrap();
        assert_eq!(records[0].1.len(), 3);
        assert_eq!(records[1].1.len(), 1);
    }

    #[test]
    fn test_quoting_on_write() {
        assert_eq!(write_one(&["plain", "x"]), "plain,x");
        assert_eq!(write_one(&["a,b", "x"]), "\"a,b\",x");
        assert_eq!(write_one(&["q\"uote", "x"]), "\"q\"\"uote\",x");
    }

    #[test]
    fn test_write_then_read_preserves_fields() {
        let fields = ["Cyber - Intrusion", "comma, inside", "quote \" inside", "line\nbreak"];
        let mut writer = RecordWriter::with_header(fields).unwrap();
        writer.write(["", "", "", ""]).unwrap();
        let records = read_records(&writer.finish().unwrap()).unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].1, fields);
        assert_eq!(records[1].1, ["", "", "", ""]);
    }
}
