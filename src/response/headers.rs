//! Response headers folded to one string per name.

use std::borrow::Cow;
use std::fmt;

use http::header::GetAll;
use http::{HeaderMap, HeaderValue};

/// The shape of the values received for one header name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeaderValueShape<'a> {
    /// A single value.
    Single(Cow<'a, str>),

    /// Several values for the same name, in the order received.
    List(Vec<Cow<'a, str>>),

    /// No value was received.
    Other,
}

impl<'a> HeaderValueShape<'a> {
    /// Classify every value received for a header name.
    ///
    /// Values are decoded as latin-1, so every byte maps to one character and
    /// no value is ever dropped. Visible ASCII values are borrowed as-is.
    pub fn of(values: GetAll<'a, HeaderValue>) -> Self {
        let mut values: Vec<Cow<'a, str>> = values.iter().map(decode).collect();

        match values.len() {
            0 => HeaderValueShape::Other,
            1 => HeaderValueShape::Single(values.remove(0)),
            _ => HeaderValueShape::List(values),
        }
    }

    /// Fold this shape to a single string: lists are joined with `", "`, and
    /// a missing value becomes an empty string.
    pub fn normalize(self) -> String {
        match self {
            HeaderValueShape::Single(value) => value.into_owned(),
            HeaderValueShape::List(values) => values.join(", "),
            HeaderValueShape::Other => String::new(),
        }
    }
}

fn decode(value: &HeaderValue) -> Cow<'_, str> {
    match value.to_str() {
        Ok(text) => Cow::Borrowed(text),
        Err(_) => Cow::Owned(value.as_bytes().iter().map(|&byte| char::from(byte)).collect()),
    }
}

/// Response headers, with exactly one string value per header name.
///
/// Names are kept as received from the transport (which lower-cases them), in the
/// order they were first seen.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Headers {
    entries: Vec<(String, String)>,
}

impl Headers {
    /// Fold a raw header map.
    pub fn from_map(map: &HeaderMap) -> Self {
        let entries = map
            .keys()
            .map(|name| {
                let value = HeaderValueShape::of(map.get_all(name)).normalize();
                (name.as_str().to_owned(), value)
            })
            .collect();

        Self { entries }
    }

    /// Look up a header value. Names are matched ignoring ASCII case.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// Returns true if a header with this name was received.
    pub fn contains_key(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Iterate over header names and values.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .map(|(name, value)| (name.as_str(), value.as_str()))
    }

    /// Number of distinct header names.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if there are no headers.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl From<&HeaderMap> for Headers {
    fn from(map: &HeaderMap) -> Self {
        Headers::from_map(map)
    }
}

impl fmt::Debug for Headers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

impl<'a> IntoIterator for &'a Headers {
    type Item = (&'a str, &'a str);
    type IntoIter = Box<dyn Iterator<Item = (&'a str, &'a str)> + 'a>;

    fn into_iter(self) -> Self::IntoIter {
        Box::new(self.iter())
    }
}
