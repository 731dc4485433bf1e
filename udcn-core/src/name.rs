use std::fmt;

use serde::{Deserialize, Serialize};

/// Hierarchical NDN name made of opaque byte components.
///
/// Names are immutable once built; the builder-style helpers consume `self`
/// and return a new value. Ordering is component-wise, so a prefix always
/// sorts before every name it is a prefix of.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Name {
    components: Vec<Vec<u8>>,
}

impl Name {
    /// Create the root name `/`
    pub fn new() -> Self {
        Self {
            components: Vec::new(),
        }
    }

    /// `/localhost`, the namespace that must never leave the local host
    pub fn localhost() -> Self {
        Self::new().with_component("localhost")
    }

    /// `/localhop`, the namespace that may travel one hop past a local requester
    pub fn localhop() -> Self {
        Self::new().with_component("localhop")
    }

    /// Create a name from raw components
    pub fn from_components<I, C>(components: I) -> Self
    where
        I: IntoIterator<Item = C>,
        C: Into<Vec<u8>>,
    {
        Self {
            components: components.into_iter().map(Into::into).collect(),
        }
    }

    /// Parse an NDN URI such as `/hello/world` or `ndn:/hello/world`.
    ///
    /// Empty components (`//`) are skipped; `%XX` escapes are decoded.
    pub fn from_str(uri: &str) -> Result<Self, NameParseError> {
        let path = uri.strip_prefix("ndn:").unwrap_or(uri);
        let mut components = Vec::new();
        for part in path.split('/') {
            if !part.is_empty() {
                components.push(percent_decode(part)?);
            }
        }
        Ok(Self { components })
    }

    /// Return a copy of this name with one more component
    pub fn with_component(mut self, component: impl Into<Vec<u8>>) -> Self {
        self.components.push(component.into());
        self
    }

    /// Return a copy of this name with a sequence-number component appended
    pub fn with_sequence(self, seq: u64) -> Self {
        self.with_component(seq.to_string())
    }

    /// Get the number of components
    pub fn len(&self) -> usize {
        self.components.len()
    }

    /// Check if this is the root name
    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    /// Get a component by index
    pub fn get(&self, index: usize) -> Option<&[u8]> {
        self.components.get(index).map(Vec::as_slice)
    }

    pub fn components(&self) -> impl Iterator<Item = &[u8]> {
        self.components.iter().map(Vec::as_slice)
    }

    /// Check if this name is a prefix of (or equal to) another name
    pub fn is_prefix_of(&self, other: &Name) -> bool {
        if self.len() > other.len() {
            return false;
        }
        self.components
            .iter()
            .zip(other.components.iter())
            .all(|(a, b)| a == b)
    }

    /// Get a prefix of this name with at most `length` components
    pub fn get_prefix(&self, length: usize) -> Name {
        Name {
            components: self.components.iter().take(length).cloned().collect(),
        }
    }

    /// All prefixes from longest (the name itself) down to the root
    pub fn prefixes(&self) -> impl Iterator<Item = Name> + '_ {
        (0..=self.len()).rev().map(move |len| self.get_prefix(len))
    }

    pub fn to_uri(&self) -> String {
        if self.is_empty() {
            return "/".to_string();
        }
        let mut uri = String::new();
        for component in &self.components {
            uri.push('/');
            percent_encode_into(component, &mut uri);
        }
        uri
    }
}

impl Default for Name {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_uri())
    }
}

impl TryFrom<String> for Name {
    type Error = NameParseError;

    fn try_from(uri: String) -> Result<Self, Self::Error> {
        Name::from_str(&uri)
    }
}

impl From<Name> for String {
    fn from(name: Name) -> Self {
        name.to_uri()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NameParseError {
    #[error("truncated percent escape in component {0:?}")]
    TruncatedEscape(String),
    #[error("invalid percent escape in component {0:?}")]
    InvalidEscape(String),
}

fn percent_decode(part: &str) -> Result<Vec<u8>, NameParseError> {
    let bytes = part.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            if i + 2 >= bytes.len() {
                return Err(NameParseError::TruncatedEscape(part.to_string()));
            }
            let (hi, lo) = (bytes[i + 1], bytes[i + 2]);
            if !hi.is_ascii_hexdigit() || !lo.is_ascii_hexdigit() {
                return Err(NameParseError::InvalidEscape(part.to_string()));
            }
            out.push(hex_value(hi) << 4 | hex_value(lo));
            i += 3;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    Ok(out)
}

fn hex_value(digit: u8) -> u8 {
    match digit {
        b'0'..=b'9' => digit - b'0',
        b'a'..=b'f' => digit - b'a' + 10,
        _ => digit - b'A' + 10,
    }
}

fn percent_encode_into(component: &[u8], out: &mut String) {
    for &byte in component {
        let unreserved = byte.is_ascii_alphanumeric() || matches!(byte, b'-' | b'.' | b'_' | b'~');
        if unreserved {
            out.push(byte as char);
        } else {
            out.push_str(&format!("%{:02X}", byte));
        }
    }
}
