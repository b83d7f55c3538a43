//! Structured cache keys.

use chrono::NaiveDate;
use std::collections::BTreeMap;
use std::fmt;

/// One component of a fingerprint.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Segment {
  Text(String),
  Int(i64),
  /// Request parameters, kept sorted so equal maps compare equal
  Params(BTreeMap<String, String>),
}

impl From<&str> for Segment {
  fn from(value: &str) -> Self {
    Self::Text(value.to_string())
  }
}

impl From<String> for Segment {
  fn from(value: String) -> Self {
    Self::Text(value)
  }
}

impl From<u32> for Segment {
  fn from(value: u32) -> Self {
    Self::Int(i64::from(value))
  }
}

impl From<NaiveDate> for Segment {
  fn from(value: NaiveDate) -> Self {
    Self::Text(value.format("%Y-%m-%d").to_string())
  }
}

impl From<BTreeMap<String, String>> for Segment {
  fn from(value: BTreeMap<String, String>) -> Self {
    Self::Params(value)
  }
}

impl fmt::Display for Segment {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::Text(s) => f.write_str(s),
      Self::Int(n) => write!(f, "{}", n),
      Self::Params(params) => {
        f.write_str("{")?;
        for (i, (k, v)) in params.iter().enumerate() {
          if i > 0 {
            f.write_str(",")?;
          }
          write!(f, "{}={}", k, v)?;
        }
        f.write_str("}")
      }
    }
  }
}

/// Identity of a cached resource: resource kind followed by its parameters.
///
/// Two fingerprints are equal iff every segment matches by value. A
/// fingerprint also acts as a prefix for invalidation: `["nutrition",
/// "history"]` covers `["nutrition", "history", 7]`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Fingerprint(Vec<Segment>);

impl Fingerprint {
  /// Start a fingerprint with its resource kind
  pub fn new(kind: &str) -> Self {
    Self(vec![Segment::from(kind)])
  }

  /// Append a parameter segment
  pub fn with(mut self, segment: impl Into<Segment>) -> Self {
    self.0.push(segment.into());
    self
  }

  /// Whether `prefix` matches the leading segments of this fingerprint
  pub fn starts_with(&self, prefix: &Fingerprint) -> bool {
    self.0.starts_with(&prefix.0)
  }
}

impl fmt::Display for Fingerprint {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    for (i, segment) in self.0.iter().enumerate() {
      if i > 0 {
        f.write_str("/")?;
      }
      write!(f, "{}", segment)?;
    }
    Ok(())
  }
}
