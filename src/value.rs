//! Decoded values: the tree a decode produces and an encode consumes.

use bitvec::prelude::*;
use bytes::Bytes;

/// A single decoded value (field or compound).
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// OPTIONAL/DEFAULT or extension field not present in the encoding.
    Absent,
    Null,
    Boolean(bool),
    Integer(i64),
    /// Global item index: root items first, then extension items.
    Enumerated(u64),
    BitString(BitVec<u8, Msb0>),
    OctetString(Bytes),
    Open(OpenValue),
    Sequence(SequenceValue),
    Choice(Box<ChoiceValue>),
    /// SEQUENCE OF / SET OF elements in wire order.
    List(Vec<Value>),
}

/// Fields of a SEQUENCE in declaration order. Equality compares present fields by name only, so
/// a hand-built value equals its decoded counterpart regardless of order or `Absent` entries.
#[derive(Debug, Clone, Default)]
pub struct SequenceValue {
    fields: Vec<(String, Value)>,
}

/// Selected CHOICE alternative. `index` counts root alternatives first, then extension
/// alternatives; `name` is `None` for an extension alternative this schema does not know, whose
/// `value` is then the skipped content as [`Value::Open`].
#[derive(Debug, Clone, PartialEq)]
pub struct ChoiceValue {
    pub index: usize,
    pub name: Option<String>,
    pub value: Value,
}

/// Complete encoding of another value carried as an octet string. `containing` names the type
/// it holds when the schema declares one; decoding it is left to the caller
/// ([`Codec::decode_embedded`](crate::Codec::decode_embedded)).
#[derive(Debug, Clone, PartialEq)]
pub struct OpenValue {
    pub bytes: Bytes,
    pub containing: Option<String>,
}

impl OpenValue {
    pub fn new(bytes: impl Into<Bytes>) -> Self {
        OpenValue {
            bytes: bytes.into(),
            containing: None,
        }
    }

    pub fn containing(type_name: impl Into<String>, bytes: impl Into<Bytes>) -> Self {
        OpenValue {
            bytes: bytes.into(),
            containing: Some(type_name.into()),
        }
    }
}

impl ChoiceValue {
    pub fn new(index: usize, name: impl Into<String>, value: Value) -> Self {
        ChoiceValue {
            index,
            name: Some(name.into()),
            value,
        }
    }
}

impl SequenceValue {
    pub fn new() -> Self {
        SequenceValue::default()
    }

    /// Builder form of [`insert`](Self::insert).
    pub fn with(mut self, name: impl Into<String>, value: Value) -> Self {
        self.insert(name, value);
        self
    }

    /// Set a field, replacing an earlier entry of the same name.
    pub fn insert(&mut self, name: impl Into<String>, value: Value) {
        let name = name.into();
        match self.fields.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => slot.1 = value,
            None => self.fields.push((name, value)),
        }
    }

    /// A present field; `Absent` entries read as `None`.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields
            .iter()
            .find(|(n, v)| n == name && !v.is_absent())
            .map(|(_, v)| v)
    }

    pub fn is_present(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Every entry, absent ones included, in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(n, v)| (n.as_str(), v))
    }

    pub fn present(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.iter().filter(|(_, v)| !v.is_absent())
    }

    pub fn len(&self) -> usize {
        self.present().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl PartialEq for SequenceValue {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len() && self.present().all(|(n, v)| other.get(n) == Some(v))
    }
}

impl<N: Into<String>> FromIterator<(N, Value)> for SequenceValue {
    fn from_iter<I: IntoIterator<Item = (N, Value)>>(iter: I) -> Self {
        let mut seq = SequenceValue::new();
        for (n, v) in iter {
            seq.insert(n, v);
        }
        seq
    }
}

impl Value {
    pub fn octets(bytes: impl Into<Bytes>) -> Self {
        Value::OctetString(bytes.into())
    }

    /// Bit string from a `'0'`/`'1'` text; other characters are ignored.
    pub fn bits(text: &str) -> Self {
        Value::BitString(
            text.chars()
                .filter(|c| matches!(c, '0' | '1'))
                .map(|c| c == '1')
                .collect(),
        )
    }

    pub fn sequence<N: Into<String>>(fields: impl IntoIterator<Item = (N, Value)>) -> Self {
        Value::Sequence(fields.into_iter().collect())
    }

    pub fn choice(index: usize, name: impl Into<String>, value: Value) -> Self {
        Value::Choice(Box::new(ChoiceValue::new(index, name, value)))
    }

    pub fn is_absent(&self) -> bool {
        matches!(self, Value::Absent)
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Integer(x) => Some(*x),
            Value::Enumerated(x) => i64::try_from(*x).ok(),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_enumerated(&self) -> Option<u64> {
        match self {
            Value::Enumerated(x) => Some(*x),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::OctetString(b) => Some(b),
            Value::Open(o) => Some(&o.bytes),
            _ => None,
        }
    }

    pub fn as_bits(&self) -> Option<&BitSlice<u8, Msb0>> {
        match self {
            Value::BitString(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_open(&self) -> Option<&OpenValue> {
        match self {
            Value::Open(o) => Some(o),
            _ => None,
        }
    }

    pub fn as_sequence(&self) -> Option<&SequenceValue> {
        match self {
            Value::Sequence(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_choice(&self) -> Option<&ChoiceValue> {
        match self {
            Value::Choice(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(v) => Some(v),
            _ => None,
        }
    }

    /// Field of a SEQUENCE value by name.
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.as_sequence()?.get(name)
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Absent => "absent",
            Value::Null => "NULL",
            Value::Boolean(_) => "BOOLEAN",
            Value::Integer(_) => "INTEGER",
            Value::Enumerated(_) => "ENUMERATED",
            Value::BitString(_) => "BIT STRING",
            Value::OctetString(_) => "OCTET STRING",
            Value::Open(_) => "open type",
            Value::Sequence(_) => "SEQUENCE",
            Value::Choice(_) => "CHOICE",
            Value::List(_) => "SEQUENCE OF",
        }
    }
}
