//! Store targets as written into the Thanos Query service discovery file

use std::{fmt, slice};

use serde::{Deserialize, Serialize};

/// gRPC port Thanos store APIs listen on
pub const DEFAULT_TARGET_PORT: u16 = 10901;

/// A single `host:port` store address
///
/// Targets compare textually: a target decoded from the stored configuration equals a
/// freshly resolved one only if both render to the same string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Target(String);

impl Target {
    /// Build a target from a record name and a port
    pub fn new(host: &str, port: u16) -> Self {
        Self(format!("{}:{}", host, port))
    }

    /// Wrap an address exactly as it was stored
    pub fn from_stored(address: impl Into<String>) -> Self {
        Self(address.into())
    }

    /// The rendered address
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Ordered list of targets
///
/// Order follows the directory listing and is significant when comparing sequences.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TargetSequence(Vec<Target>);

impl TargetSequence {
    /// Create an empty sequence
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// Number of targets
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether there are no targets
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate targets in order
    pub fn iter(&self) -> slice::Iter<'_, Target> {
        self.0.iter()
    }

    /// Borrow the targets as a slice
    pub fn as_slice(&self) -> &[Target] {
        &self.0
    }

    /// Rendered addresses, in order
    pub fn to_strings(&self) -> Vec<String> {
        self.0.iter().map(|t| t.as_str().to_string()).collect()
    }
}

impl From<Vec<Target>> for TargetSequence {
    fn from(targets: Vec<Target>) -> Self {
        Self(targets)
    }
}

impl FromIterator<Target> for TargetSequence {
    fn from_iter<I: IntoIterator<Item = Target>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl IntoIterator for TargetSequence {
    type Item = Target;
    type IntoIter = std::vec::IntoIter<Target>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a TargetSequence {
    type Item = &'a Target;
    type IntoIter = slice::Iter<'a, Target>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl fmt::Display for TargetSequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]", self.to_strings().join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_target_new_appends_port() {
        let target = Target::new("store-a-grpc.example.internal.", DEFAULT_TARGET_PORT);
        assert_eq!(target.as_str(), "store-a-grpc.example.internal.:10901");
    }

    #[test]
    fn test_stored_target_equals_resolved_target() {
        let stored = Target::from_stored("store-a-grpc.example.internal:10901");
        let resolved = Target::new("store-a-grpc.example.internal", 10901);
        assert_eq!(stored, resolved);
    }

    #[test]
    fn test_sequence_display() {
        let seq: TargetSequence =
            vec![Target::from_stored("a:10901"), Target::from_stored("b:10901")].into();
        assert_eq!(seq.to_string(), "[a:10901, b:10901]");
        assert_eq!(seq.len(), 2);
        assert!(!seq.is_empty());
    }

    #[test]
    fn test_sequence_serializes_as_plain_list() {
        let seq: TargetSequence = vec![Target::from_stored("a:10901")].into();
        let json = serde_json::to_string(&seq).unwrap();
        assert_eq!(json, r#"["a:10901"]"#);
    }
}
