use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

// ---------------------------------------------------------------------------
// FieldValue – a single cell of a record
// ---------------------------------------------------------------------------

/// A typed cell value. Fields declared numeric are coerced to `Number`,
/// everything else stays as the raw token text.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Number(f64),
    Text(String),
}

impl FieldValue {
    /// Numeric view of the value. Text is parsed the same way numeric
    /// fields are coerced, so non-numeric text yields `NaN`.
    pub fn as_f64(&self) -> f64 {
        match self {
            FieldValue::Number(v) => *v,
            FieldValue::Text(s) => coerce_number(s),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s),
            FieldValue::Number(_) => None,
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Number(v) => write!(f, "{v}"),
            FieldValue::Text(s) => write!(f, "{s}"),
        }
    }
}

/// Coerce a raw token to a number. Surrounding whitespace is ignored;
/// empty or unparsable tokens become `NaN` rather than an error.
///
/// Infinity is only spelled `Infinity` (optionally signed). The other
/// spellings `f64::from_str` accepts, such as `inf` or `INFINITY`, are
/// treated as text.
pub fn coerce_number(token: &str) -> f64 {
    let token = token.trim();
    if token.is_empty() {
        return f64::NAN;
    }
    let unsigned = token.trim_start_matches(['+', '-']);
    if unsigned.starts_with(|c: char| c.is_ascii_alphabetic()) && unsigned != "Infinity" {
        return f64::NAN;
    }
    token.parse::<f64>().unwrap_or(f64::NAN)
}

// ---------------------------------------------------------------------------
// FieldSchema – column names from the header line
// ---------------------------------------------------------------------------

/// Ordered column names taken from the first input line.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldSchema {
    names: Vec<String>,
    positions: HashMap<String, usize>,
}

impl FieldSchema {
    /// Build a schema from raw header tokens, trimming surrounding whitespace.
    /// When a name repeats, lookups resolve to its last position.
    pub fn from_header<I, S>(header: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let names: Vec<String> = header
            .into_iter()
            .map(|name| name.as_ref().trim().to_string())
            .collect();
        let positions = names
            .iter()
            .enumerate()
            .map(|(i, name)| (name.clone(), i))
            .collect();
        FieldSchema { names, positions }
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.positions.get(name).copied()
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Record – one parsed line
// ---------------------------------------------------------------------------

/// One parsed line, with exactly one slot per schema field.
///
/// `None` marks a field the line had no token for. The reader refills the
/// same record for every line and hands it out by reference, so a record is
/// only readable until the next call to `RecordReader::next`.
#[derive(Debug, Clone, Default)]
pub struct Record {
    schema: Arc<FieldSchema>,
    values: Vec<Option<FieldValue>>,
}

impl Record {
    pub(crate) fn new(schema: Arc<FieldSchema>) -> Self {
        let values = vec![None; schema.len()];
        Record { schema, values }
    }

    pub fn schema(&self) -> &FieldSchema {
        &self.schema
    }

    /// Value by field name; `None` for unknown fields and absent tokens.
    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.schema.position(name).and_then(|i| self.value(i))
    }

    /// Value by schema position.
    pub fn value(&self, position: usize) -> Option<&FieldValue> {
        self.values.get(position).and_then(Option::as_ref)
    }

    /// Numeric value by name; `NaN` when unknown, absent or not a number.
    pub fn number(&self, name: &str) -> f64 {
        self.get(name).map_or(f64::NAN, FieldValue::as_f64)
    }

    /// Numeric value by schema position; `NaN` when absent or not a number.
    pub fn number_at(&self, position: usize) -> f64 {
        self.value(position).map_or(f64::NAN, FieldValue::as_f64)
    }

    pub fn text(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(FieldValue::as_str)
    }

    /// `(name, value)` pairs in schema order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, Option<&FieldValue>)> {
        self.schema
            .names()
            .iter()
            .zip(self.values.iter())
            .map(|(name, value)| (name.as_str(), value.as_ref()))
    }

    pub(crate) fn set_text(&mut self, position: usize, token: &str) {
        match &mut self.values[position] {
            // Reuse the existing allocation when the slot already holds text.
            Some(FieldValue::Text(s)) => {
                s.clear();
                s.push_str(token);
            }
            slot => *slot = Some(FieldValue::Text(token.to_string())),
        }
    }

    pub(crate) fn set_number(&mut self, position: usize, value: f64) {
        self.values[position] = Some(FieldValue::Number(value));
    }

    pub(crate) fn clear(&mut self, position: usize) {
        self.values[position] = None;
    }
}
