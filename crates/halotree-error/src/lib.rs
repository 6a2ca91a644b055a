//! Error types shared by every halotree crate.
//!
//! All conditions here are fatal for the file being processed: no component
//! retries or recovers, and partially loaded tree data is never handed out.
//! Missing-but-optional record members are not errors at all; they are
//! reported through `tracing` and the schema report instead.

use std::fmt;
use std::path::PathBuf;

/// Result alias used across the workspace.
pub type Result<T, E = HaloTreeError> = std::result::Result<T, E>;

/// One problem found while parsing a field-format file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigProblem {
    /// A line names a tag outside the fixed tag set.
    UnknownTag { line: usize, tag: String },
    /// A tag appears on more than one line.
    DuplicateTag {
        line: usize,
        tag: String,
        first_line: usize,
    },
    /// A required tag never appears in the file.
    MissingTag { tag: String },
}

impl ConfigProblem {
    /// The tag this problem refers to.
    #[must_use]
    pub fn tag(&self) -> &str {
        match self {
            Self::UnknownTag { tag, .. }
            | Self::DuplicateTag { tag, .. }
            | Self::MissingTag { tag } => tag,
        }
    }
}

impl fmt::Display for ConfigProblem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownTag { line, tag } => {
                write!(f, "line {line}: tag '{tag}' not allowed")
            }
            Self::DuplicateTag {
                line,
                tag,
                first_line,
            } => write!(
                f,
                "line {line}: tag '{tag}' already defined on line {first_line}"
            ),
            Self::MissingTag { tag } => write!(f, "missing a value for tag '{tag}'"),
        }
    }
}

/// Primary error type for the merger-tree reader.
#[derive(Debug, thiserror::Error)]
pub enum HaloTreeError {
    /// The field-format file could not be read.
    #[error("field format file {} not found: {source}", path.display())]
    MissingConfigFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The field-format file was read but is incorrect. Every offending
    /// line and missing tag is listed.
    #[error("field format file {} incorrect: {}", path.display(), join_problems(problems))]
    Config {
        path: PathBuf,
        problems: Vec<ConfigProblem>,
    },

    /// A mapped member exists on disk with a different type.
    #[error("different datatype used for {tag}: member '{member}' is {found}, expected {expected}")]
    SchemaMismatch {
        tag: String,
        member: String,
        expected: String,
        found: String,
    },

    /// A declared count disagrees with the actual extent of an array.
    #[error("{what}: declared {declared} but found {actual}")]
    SizeMismatch {
        what: String,
        declared: u64,
        actual: u64,
    },

    /// A file, group, attribute or dataset could not be opened or read.
    #[error("cannot access {what} '{path}': {detail}")]
    Resource {
        what: &'static str,
        path: String,
        detail: String,
    },

    /// The input holds values that cannot be valid (negative counts, etc).
    #[error("input file corrupt: {detail}")]
    CorruptInput { detail: String },

    /// A windowed read was requested for a tree the file does not hold.
    #[error("tree {tree} out of range: file holds {tree_count} trees")]
    TreeOutOfRange { tree: usize, tree_count: usize },

    /// The runtime settings could not be parsed.
    #[error("invalid reader settings: {detail}")]
    Settings { detail: String },

    /// Internal logic error.
    #[error("internal error: {0}")]
    Internal(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl HaloTreeError {
    /// Build an [`HaloTreeError::Internal`] from any message.
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Build an [`HaloTreeError::Resource`].
    pub fn resource(what: &'static str, path: impl Into<String>, detail: impl fmt::Display) -> Self {
        Self::Resource {
            what,
            path: path.into(),
            detail: detail.to_string(),
        }
    }

    /// Build an [`HaloTreeError::CorruptInput`].
    pub fn corrupt(detail: impl Into<String>) -> Self {
        Self::CorruptInput {
            detail: detail.into(),
        }
    }

    /// Whether this error comes from the field-format file.
    #[must_use]
    pub const fn is_config_error(&self) -> bool {
        matches!(self, Self::MissingConfigFile { .. } | Self::Config { .. })
    }

    /// Whether this error means the on-disk schema disagrees with the
    /// in-memory record layout.
    #[must_use]
    pub const fn is_schema_error(&self) -> bool {
        matches!(self, Self::SchemaMismatch { .. })
    }

    /// Config problems carried by this error, if any.
    #[must_use]
    pub fn config_problems(&self) -> &[ConfigProblem] {
        match self {
            Self::Config { problems, .. } => problems,
            _ => &[],
        }
    }
}

fn join_problems(problems: &[ConfigProblem]) -> String {
    problems
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}
