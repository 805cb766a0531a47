//! Fixed-width table rows and their byte layout.
//!
//! A [`Schema`] packs a [`Row`] into a little-endian buffer of
//! [`Schema::record_size`] bytes, one field after another, and names the field
//! the tree clusters on. Values are coerced to the field kind before packing,
//! so the key a row is filed under always equals the key read back from disk.

use std::cmp::Ordering;
use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::storage::btree::{KeyCodec, RecordCodec};
use crate::types::{BTreeError, Result};

/// Width of a packed `YYYY-MM-DD` date.
pub const DATE_LEN: usize = 10;

/// Storage type of a column.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    /// 4-byte signed integer.
    Int32,
    /// 8-byte signed integer.
    Int64,
    /// 4-byte float.
    Float32,
    /// 8-byte float.
    Float64,
    /// Fixed-width UTF-8 text, NUL padded.
    Char(usize),
    /// `YYYY-MM-DD` text.
    Date,
}

impl FieldKind {
    /// Packed width in bytes.
    pub fn width(self) -> usize {
        match self {
            FieldKind::Int32 | FieldKind::Float32 => 4,
            FieldKind::Int64 | FieldKind::Float64 => 8,
            FieldKind::Char(len) => len,
            FieldKind::Date => DATE_LEN,
        }
    }
}

/// A named column.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Field {
    /// Column name, unique within a schema.
    pub name: String,
    /// Storage type.
    pub kind: FieldKind,
}

impl Field {
    /// Creates a field.
    pub fn new(name: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }
}

/// A single column value.
///
/// Ordered totally: numbers compare by value (floats via `total_cmp`) and sort
/// before text.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    /// Integer value.
    Int(i64),
    /// Floating point value.
    Float(f64),
    /// Text value.
    Text(String),
}

impl Value {
    fn rank(&self) -> u8 {
        match self {
            Value::Int(_) | Value::Float(_) => 0,
            Value::Text(_) => 1,
        }
    }
}

impl Ord for Value {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Value::Int(a), Value::Int(b)) => a.cmp(b),
            (Value::Float(a), Value::Float(b)) => a.total_cmp(b),
            (Value::Int(a), Value::Float(b)) => (*a as f64).total_cmp(b),
            (Value::Float(a), Value::Int(b)) => a.total_cmp(&(*b as f64)),
            (Value::Text(a), Value::Text(b)) => a.cmp(b),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Value {}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_owned())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Text(value)
    }
}

const INT_TAG: u8 = 0;
const FLOAT_TAG: u8 = 1;
const TEXT_TAG: u8 = 2;

impl KeyCodec for Value {
    fn encode_key(&self, out: &mut Vec<u8>) {
        match self {
            Value::Int(v) => {
                out.push(INT_TAG);
                out.extend_from_slice(&v.to_le_bytes());
            }
            Value::Float(v) => {
                out.push(FLOAT_TAG);
                out.extend_from_slice(&v.to_le_bytes());
            }
            Value::Text(v) => {
                out.push(TEXT_TAG);
                out.extend_from_slice(v.as_bytes());
            }
        }
    }

    fn decode_key(bytes: &[u8]) -> Result<Self> {
        let (tag, body) = bytes
            .split_first()
            .ok_or(BTreeError::InvalidPage("empty value key"))?;
        match *tag {
            INT_TAG => Ok(Value::Int(i64::decode_key(body)?)),
            FLOAT_TAG => {
                let raw: [u8; 8] = body
                    .try_into()
                    .map_err(|_| BTreeError::InvalidPage("float key length mismatch"))?;
                Ok(Value::Float(f64::from_le_bytes(raw)))
            }
            TEXT_TAG => Ok(Value::Text(String::decode_key(body)?)),
            _ => Err(BTreeError::InvalidPage("unknown value key tag")),
        }
    }
}

/// A table row: one value per schema field, in field order.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Row(pub Vec<Value>);

/// Serialized form of a [`Schema`].
#[derive(Clone, Debug, Serialize, Deserialize)]
struct SchemaDef {
    fields: Vec<Field>,
    key: String,
}

/// Fixed-size row layout plus the clustering key column.
///
/// Deserializes from a table such as:
///
/// ```toml
/// key = "id"
/// fields = [
///     { name = "id", kind = "int32" },
///     { name = "name", kind = { char = 20 } },
///     { name = "born", kind = "date" },
/// ]
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "SchemaDef", into = "SchemaDef")]
pub struct Schema {
    fields: Vec<Field>,
    key_index: usize,
    record_size: usize,
}

impl TryFrom<SchemaDef> for Schema {
    type Error = BTreeError;

    fn try_from(def: SchemaDef) -> Result<Self> {
        Schema::new(def.fields, &def.key)
    }
}

impl From<Schema> for SchemaDef {
    fn from(schema: Schema) -> Self {
        let key = schema.key_field().name.clone();
        SchemaDef {
            fields: schema.fields,
            key,
        }
    }
}

impl Schema {
    /// Builds a schema clustered on the field named `key_field`.
    pub fn new(fields: Vec<Field>, key_field: &str) -> Result<Self> {
        if fields.is_empty() {
            return Err(BTreeError::Invalid("schema has no fields"));
        }
        let mut names = HashSet::new();
        for field in &fields {
            if field.kind == FieldKind::Char(0) {
                return Err(BTreeError::Invalid("char field needs a positive width"));
            }
            if !names.insert(field.name.as_str()) {
                return Err(BTreeError::Invalid("duplicate field name"));
            }
        }
        let key_index = fields
            .iter()
            .position(|field| field.name == key_field)
            .ok_or(BTreeError::Invalid("key field not in schema"))?;
        let record_size = fields.iter().map(|field| field.kind.width()).sum();
        Ok(Self {
            fields,
            key_index,
            record_size,
        })
    }

    /// Parses a schema from TOML.
    pub fn from_toml_str(src: &str) -> Result<Self> {
        toml::from_str(src).map_err(|err| BTreeError::Config(err.to_string()))
    }

    /// Columns in packing order.
    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    /// The clustering key column.
    pub fn key_field(&self) -> &Field {
        &self.fields[self.key_index]
    }

    /// Position of the column called `name`.
    pub fn field_index(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|field| field.name == name)
    }

    /// Value of the column called `name` in `row`.
    pub fn value<'r>(&self, row: &'r Row, name: &str) -> Option<&'r Value> {
        self.field_index(name).and_then(|idx| row.0.get(idx))
    }

    /// Coerces a lookup value to the form keys of this schema take.
    ///
    /// Rows are filed under their coerced key, so a query for `"5"` on an
    /// integer key column has to be turned into `Int(5)` before searching.
    pub fn key(&self, value: &Value) -> Result<Value> {
        coerce_value(self.key_field(), value)
    }

    /// Coerces every value of `row` to the form it takes after a pack and unpack.
    pub fn coerce(&self, row: &Row) -> Result<Row> {
        self.check_arity(row)?;
        self.fields
            .iter()
            .zip(&row.0)
            .map(|(field, value)| coerce_value(field, value))
            .collect::<Result<Vec<_>>>()
            .map(Row)
    }

    fn check_arity(&self, row: &Row) -> Result<()> {
        if row.0.len() != self.fields.len() {
            return Err(BTreeError::Codec(format!(
                "row has {} values but schema has {} fields",
                row.0.len(),
                self.fields.len()
            )));
        }
        Ok(())
    }
}

impl RecordCodec for Schema {
    type Record = Row;
    type Key = Value;

    fn record_size(&self) -> usize {
        self.record_size
    }

    fn pack(&self, record: &Row, out: &mut [u8]) -> Result<()> {
        self.check_arity(record)?;
        if out.len() != self.record_size {
            return Err(BTreeError::Codec(format!(
                "record buffer is {} bytes, expected {}",
                out.len(),
                self.record_size
            )));
        }
        let mut offset = 0;
        for (field, value) in self.fields.iter().zip(&record.0) {
            let width = field.kind.width();
            let slot = &mut out[offset..offset + width];
            match (field.kind, coerce_value(field, value)?) {
                (FieldKind::Int32, Value::Int(v)) => {
                    let v = i32::try_from(v).map_err(|_| out_of_range(field))?;
                    slot.copy_from_slice(&v.to_le_bytes());
                }
                (FieldKind::Int64, Value::Int(v)) => slot.copy_from_slice(&v.to_le_bytes()),
                (FieldKind::Float32, Value::Float(v)) => {
                    slot.copy_from_slice(&(v as f32).to_le_bytes())
                }
                (FieldKind::Float64, Value::Float(v)) => slot.copy_from_slice(&v.to_le_bytes()),
                (FieldKind::Char(_) | FieldKind::Date, Value::Text(text)) => {
                    slot.fill(0);
                    slot[..text.len()].copy_from_slice(text.as_bytes());
                }
                _ => {
                    return Err(BTreeError::Codec(format!(
                        "field {} coerced to the wrong kind",
                        field.name
                    )))
                }
            }
            offset += width;
        }
        Ok(())
    }

    fn unpack(&self, bytes: &[u8]) -> Result<Row> {
        if bytes.len() != self.record_size {
            return Err(BTreeError::Codec(format!(
                "record is {} bytes, expected {}",
                bytes.len(),
                self.record_size
            )));
        }
        let mut offset = 0;
        let mut values = Vec::with_capacity(self.fields.len());
        for field in &self.fields {
            let width = field.kind.width();
            let slot = &bytes[offset..offset + width];
            values.push(match field.kind {
                FieldKind::Int32 => Value::Int(i64::from(i32::from_le_bytes(fixed(slot)?))),
                FieldKind::Int64 => Value::Int(i64::from_le_bytes(fixed(slot)?)),
                FieldKind::Float32 => Value::Float(f64::from(f32::from_le_bytes(fixed(slot)?))),
                FieldKind::Float64 => Value::Float(f64::from_le_bytes(fixed(slot)?)),
                FieldKind::Char(_) | FieldKind::Date => Value::Text(unpad(slot)),
            });
            offset += width;
        }
        Ok(Row(values))
    }

    fn key_of(&self, record: &Row) -> Result<Value> {
        let value = record
            .0
            .get(self.key_index)
            .ok_or_else(|| BTreeError::Codec("row is missing its key field".into()))?;
        self.key(value)
    }

    fn max_key_len(&self) -> Option<usize> {
        let body = match self.key_field().kind {
            FieldKind::Char(width) => width,
            FieldKind::Date => DATE_LEN,
            FieldKind::Int32 | FieldKind::Int64 | FieldKind::Float32 | FieldKind::Float64 => 8,
        };
        Some(1 + body)
    }
}

fn out_of_range(field: &Field) -> BTreeError {
    BTreeError::Codec(format!("value out of range for field {}", field.name))
}

fn coerce_value(field: &Field, value: &Value) -> Result<Value> {
    match field.kind {
        FieldKind::Int32 | FieldKind::Int64 => {
            let v = match value {
                Value::Int(v) => *v,
                Value::Float(v) if v.is_finite() => v.trunc() as i64,
                Value::Float(_) => return Err(out_of_range(field)),
                Value::Text(text) if text.trim().is_empty() => 0,
                Value::Text(text) => text.trim().parse::<i64>().map_err(|_| {
                    BTreeError::Codec(format!("field {} expects an integer", field.name))
                })?,
            };
            if field.kind == FieldKind::Int32 && i32::try_from(v).is_err() {
                return Err(out_of_range(field));
            }
            Ok(Value::Int(v))
        }
        FieldKind::Float32 | FieldKind::Float64 => {
            let v = match value {
                Value::Int(v) => *v as f64,
                Value::Float(v) => *v,
                Value::Text(text) if text.trim().is_empty() => 0.0,
                Value::Text(text) => text.trim().parse::<f64>().map_err(|_| {
                    BTreeError::Codec(format!("field {} expects a number", field.name))
                })?,
            };
            if field.kind == FieldKind::Float32 {
                return Ok(Value::Float(f64::from(v as f32)));
            }
            Ok(Value::Float(v))
        }
        FieldKind::Char(width) => Ok(Value::Text(fit_text(&text_of(value), width))),
        FieldKind::Date => Ok(Value::Text(fit_text(&text_of(value), DATE_LEN))),
    }
}

fn text_of(value: &Value) -> String {
    match value {
        Value::Int(v) => v.to_string(),
        Value::Float(v) => v.to_string(),
        Value::Text(text) => text.clone(),
    }
}

/// Truncates to `width` bytes on a char boundary, then drops what unpacking would strip.
fn fit_text(text: &str, width: usize) -> String {
    let mut end = text.len().min(width);
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    text[..end].trim_end_matches('\0').trim_end().to_owned()
}

fn unpad(slot: &[u8]) -> String {
    String::from_utf8_lossy(slot)
        .trim_end_matches('\0')
        .trim_end()
        .to_owned()
}

fn fixed<const N: usize>(slot: &[u8]) -> Result<[u8; N]> {
    slot.try_into()
        .map_err(|_| BTreeError::Codec("field width mismatch".into()))
}
