use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::sync::Arc;

use csv::{ByteRecord, ReaderBuilder};

use super::model::{coerce_number, FieldSchema, Record};
use crate::error::{Error, Result};

// ---------------------------------------------------------------------------
// RecordReader – pull-based, one record at a time
// ---------------------------------------------------------------------------

/// Streaming reader for header-prefixed delimited text.
///
/// The first line defines the [`FieldSchema`]. Every following non-blank line
/// becomes one [`Record`]. Tokens are split on a single delimiter byte with
/// no quoting or escaping, and fields declared numeric are coerced to `f64`
/// (`NaN` on failure).
///
/// The reader keeps exactly one line of lookahead so that [`has_next`] can
/// answer without consuming input, and refills a single [`Record`] in place.
/// [`next`] returns a borrow of that record, valid until the next call.
/// Fields the current line has no token for are cleared rather than keeping
/// the previous line's value.
///
/// [`has_next`]: RecordReader::has_next
/// [`next`]: RecordReader::next
pub struct RecordReader<R> {
    inner: csv::Reader<R>,
    schema: Arc<FieldSchema>,
    numeric: Vec<bool>,
    numeric_names: Vec<String>,
    lookahead: ByteRecord,
    pending: bool,
    deferred: Option<csv::Error>,
    record: Record,
    records_read: u64,
}

impl<'a> RecordReader<&'a [u8]> {
    /// Read comma-separated records from in-memory text.
    pub fn from_text(text: &'a str) -> Result<Self> {
        RecordReader::new(text.as_bytes(), ',')
    }
}

impl RecordReader<File> {
    pub fn from_path(path: &Path, delimiter: char) -> Result<Self> {
        let file = File::open(path)?;
        RecordReader::new(file, delimiter)
    }
}

impl<R: Read> RecordReader<R> {
    /// Consume the header line and position the cursor on the first record.
    /// Empty input yields an empty schema and no records.
    pub fn new(input: R, delimiter: char) -> Result<Self> {
        let delimiter = u8::try_from(delimiter)
            .ok()
            .filter(u8::is_ascii)
            .ok_or(Error::InvalidDelimiter(delimiter))?;

        let mut inner = ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .quoting(false)
            .delimiter(delimiter)
            .from_reader(input);

        let mut header = ByteRecord::new();
        let schema = if inner.read_byte_record(&mut header)? {
            FieldSchema::from_header(header.iter().enumerate().map(|(i, token)| {
                let name = String::from_utf8_lossy(token);
                if i == 0 {
                    name.trim_start_matches('\u{feff}').to_string()
                } else {
                    name.into_owned()
                }
            }))
        } else {
            FieldSchema::default()
        };
        let schema = Arc::new(schema);

        let mut reader = RecordReader {
            inner,
            numeric: vec![false; schema.len()],
            numeric_names: Vec::new(),
            lookahead: ByteRecord::new(),
            pending: false,
            deferred: None,
            record: Record::new(Arc::clone(&schema)),
            schema,
            records_read: 0,
        };
        reader.fetch();
        Ok(reader)
    }

    /// The header-defined field list.
    pub fn fields(&self) -> &FieldSchema {
        &self.schema
    }

    /// Fields currently subject to numeric coercion, in declaration order.
    pub fn numeric_fields(&self) -> &[String] {
        &self.numeric_names
    }

    /// Number of records handed out so far.
    pub fn records_read(&self) -> u64 {
        self.records_read
    }

    /// Add fields to the numeric set. Declarations accumulate across calls;
    /// names that are not in the header are remembered but have no effect.
    pub fn declare_numeric_fields<I, S>(&mut self, names: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for name in names {
            let name = name.into();
            match self.schema.position(&name) {
                Some(position) => self.numeric[position] = true,
                None => log::debug!("numeric field {name:?} is not in the header"),
            }
            self.numeric_names.push(name);
        }
    }

    /// Whether another record (or a pending read error) is available.
    pub fn has_next(&self) -> bool {
        self.pending || self.deferred.is_some()
    }

    /// Parse the line at the cursor and advance.
    ///
    /// Returns `Ok(None)` once the input is exhausted. The only error is a
    /// failure of the underlying reader.
    pub fn next(&mut self) -> Result<Option<&Record>> {
        if let Some(err) = self.deferred.take() {
            return Err(err.into());
        }
        if !self.pending {
            return Ok(None);
        }

        for position in 0..self.schema.len() {
            match self.lookahead.get(position) {
                Some(token) => {
                    let token = String::from_utf8_lossy(token);
                    if self.numeric[position] {
                        self.record.set_number(position, coerce_number(&token));
                    } else {
                        self.record.set_text(position, &token);
                    }
                }
                None => self.record.clear(position),
            }
        }
        self.records_read += 1;
        self.fetch();

        Ok(Some(&self.record))
    }

    fn fetch(&mut self) {
        match self.inner.read_byte_record(&mut self.lookahead) {
            Ok(more) => self.pending = more,
            Err(err) => {
                self.pending = false;
                self.deferred = Some(err);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::model::FieldValue;

    #[test]
    fn numeric_fields_are_coerced() {
        let mut reader = RecordReader::from_text("a,b,c\n1,2,3\n4,x,6\n").unwrap();
        reader.declare_numeric_fields(["b"]);

        let first = reader.next().unwrap().unwrap();
        assert_eq!(first.get("a"), Some(&FieldValue::Text("1".into())));
        assert_eq!(first.get("b"), Some(&FieldValue::Number(2.0)));
        assert_eq!(first.get("c"), Some(&FieldValue::Text("3".into())));

        let second = reader.next().unwrap().unwrap();
        assert_eq!(second.text("a"), Some("4"));
        assert!(second.number("b").is_nan());
        assert_eq!(second.text("c"), Some("6"));

        assert!(!reader.has_next());
        assert!(reader.next().unwrap().is_none());
        assert_eq!(reader.records_read(), 2);
    }

    #[test]
    fn empty_input_has_no_schema() {
        let mut reader = RecordReader::from_text("").unwrap();
        assert!(reader.fields().is_empty());
        assert!(!reader.has_next());
        assert!(reader.next().unwrap().is_none());
    }

    #[test]
    fn header_only_input_has_no_records() {
        let reader = RecordReader::from_text(" x , y ,z\n").unwrap();
        assert_eq!(reader.fields().names(), ["x", "y", "z"]);
        assert!(!reader.has_next());
    }

    #[test]
    fn short_lines_clear_trailing_fields() {
        let mut reader = RecordReader::from_text("a,b,c\n1,2,3\n4\n").unwrap();
        reader.declare_numeric_fields(["c"]);

        let first = reader.next().unwrap().unwrap();
        assert_eq!(first.number("c"), 3.0);

        let second = reader.next().unwrap().unwrap();
        assert_eq!(second.text("a"), Some("4"));
        assert_eq!(second.get("b"), None);
        assert_eq!(second.get("c"), None);
        assert!(second.number("c").is_nan());
    }

    #[test]
    fn extra_tokens_are_ignored() {
        let mut reader = RecordReader::from_text("a,b\n1,2,3,4\n").unwrap();
        let record = reader.next().unwrap().unwrap();
        assert_eq!(record.iter().count(), 2);
        assert_eq!(record.text("b"), Some("2"));
    }

    #[test]
    fn numeric_declarations_accumulate() {
        let mut reader = RecordReader::from_text("a,b,c\n1,2,3\n").unwrap();
        reader.declare_numeric_fields(["a"]);
        reader.declare_numeric_fields(["c", "not-a-column"]);
        assert_eq!(reader.numeric_fields(), ["a", "c", "not-a-column"]);

        let record = reader.next().unwrap().unwrap();
        assert_eq!(record.get("a"), Some(&FieldValue::Number(1.0)));
        assert_eq!(record.get("b"), Some(&FieldValue::Text("2".into())));
        assert_eq!(record.get("c"), Some(&FieldValue::Number(3.0)));
        assert_eq!(record.iter().count(), 3);
    }

    #[test]
    fn blank_lines_and_crlf() {
        let mut reader = RecordReader::from_text("a,b\r\n1,2\r\n\r\n3,4\r\n").unwrap();
        reader.declare_numeric_fields(["b"]);

        assert_eq!(reader.next().unwrap().unwrap().number("b"), 2.0);
        assert!(reader.has_next());
        assert_eq!(reader.next().unwrap().unwrap().number("b"), 4.0);
        assert!(!reader.has_next());
    }

    #[test]
    fn custom_delimiter_and_quotes_are_literal() {
        let input = "name;depth\n\"hole, 1\";12.5\n";
        let mut reader = RecordReader::new(input.as_bytes(), ';').unwrap();
        reader.declare_numeric_fields(["depth"]);

        let record = reader.next().unwrap().unwrap();
        assert_eq!(record.text("name"), Some("\"hole, 1\""));
        assert_eq!(record.number("depth"), 12.5);
    }

    #[test]
    fn multibyte_delimiter_is_rejected() {
        let err = RecordReader::new("a\n".as_bytes(), '→').err().unwrap();
        assert!(matches!(err, Error::InvalidDelimiter('→')));
    }
}
