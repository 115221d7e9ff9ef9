use std::fmt;

/// One local-to-remote column pair implementing a relation. `local` is read from
/// the document being resolved, `remote` is matched on the related resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyPair {
    pub local: String,
    pub remote: String,
}

/// A single step of a compiled owner field path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OwnerStep {
    /// Read a plain field. Always the last step of a path.
    Field(String),
    /// Resolve the related entity of `resource` whose `remote` fields equal the
    /// current document's `local` fields. Exactly one entity must match.
    Relation {
        name: String,
        resource: String,
        keys: Vec<KeyPair>,
    },
}

/// An owner field path such as `event.organizer`, compiled at startup into an
/// explicit sequence of steps.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OwnerPath {
    raw: String,
    steps: Vec<OwnerStep>,
}

impl OwnerPath {
    pub fn new(raw: impl Into<String>, steps: Vec<OwnerStep>) -> Self {
        Self {
            raw: raw.into(),
            steps,
        }
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn steps(&self) -> &[OwnerStep] {
        &self.steps
    }
}

impl fmt::Display for OwnerPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// Restricts a read query to documents where any of `paths` resolves to `user`.
#[derive(Debug, Clone)]
pub struct OwnerFilter {
    pub paths: Vec<OwnerPath>,
    pub user: i64,
}
