// Flat parameter set for cluster requests
//
// The wire contract is a flat map of string keys. Lists are rendered as
// bracketed comma-joined strings, booleans as lowercase true/false. A set is
// built fresh per request and consumed by the call that sends it.

use std::fmt;

/// A single wire parameter value.
#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    /// Rendered as `[a,b,c]`.
    List(Vec<String>),
    /// A server-side object key (frame or model id).
    Key(String),
}

impl ParamValue {
    /// List value from numeric entries.
    pub fn floats(values: &[f64]) -> Self {
        Self::List(values.iter().map(|v| v.to_string()).collect())
    }

    /// List value from string-like entries.
    pub fn strings<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::List(values.into_iter().map(Into::into).collect())
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Str(s) => write!(f, "{}", s),
            Self::Int(i) => write!(f, "{}", i),
            Self::Float(x) => write!(f, "{}", x),
            Self::Bool(b) => write!(f, "{}", b),
            Self::List(items) => write!(f, "[{}]", items.join(",")),
            Self::Key(k) => write!(f, "{}", k),
        }
    }
}

/// Ordered name/value pairs sent with one request. Insertion order is kept
/// so rendered requests are deterministic; setting a name twice replaces the
/// earlier value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParamSet {
    entries: Vec<(String, ParamValue)>,
}

impl ParamSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, name: &str, value: ParamValue) {
        if let Some(slot) = self.entries.iter_mut().find(|(n, _)| n == name) {
            slot.1 = value;
        } else {
            self.entries.push((name.to_string(), value));
        }
    }

    pub fn get(&self, name: &str) -> Option<&ParamValue> {
        self.entries.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[(String, ParamValue)] {
        &self.entries
    }

    /// Flat string pairs in insertion order, ready for form or query encoding.
    pub fn render(&self) -> Vec<(String, String)> {
        self.entries
            .iter()
            .map(|(name, value)| (name.clone(), value.to_string()))
            .collect()
    }

    /// One-line `name=value&...` rendering, used by the request-capture log.
    pub fn render_query(&self) -> String {
        self.entries
            .iter()
            .map(|(name, value)| format!("{}={}", name, value))
            .collect::<Vec<_>>()
            .join("&")
    }
}
