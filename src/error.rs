use thiserror::Error;

/// Errors returned by the fragment clustering pipeline.
#[derive(Debug, Error)]
pub enum Error {
    /// The raw linkage routine needs at least two items.
    #[error("empty input: linkage needs at least two items, got {n_items}")]
    EmptyInput {
        /// Number of items supplied.
        n_items: usize,
    },

    /// Cut criterion parameter is out of range.
    #[error("invalid criterion {name}: {message}")]
    InvalidCriterion {
        /// Criterion name.
        name: &'static str,
        /// Human-readable explanation.
        message: &'static str,
    },

    /// Invalid parameter value.
    #[error("invalid parameter {name}: {message}")]
    InvalidParameter {
        /// Parameter name.
        name: &'static str,
        /// Human-readable explanation.
        message: &'static str,
    },

    /// Cluster labels are not aligned with the fragment list.
    #[error("label mismatch: {labels} labels for {fragments} fragments")]
    LabelMismatch {
        /// Number of labels supplied.
        labels: usize,
        /// Number of fragments supplied.
        fragments: usize,
    },

    /// Matrix or vector input has the wrong shape.
    #[error("dimension mismatch: expected {expected}, found {found}")]
    DimensionMismatch {
        /// Expected length.
        expected: usize,
        /// Found length.
        found: usize,
    },

    /// A SMILES string could not be read.
    #[error("invalid SMILES at position {position}: {message}")]
    Smiles {
        /// Byte offset of the offending character.
        position: usize,
        /// Human-readable explanation.
        message: String,
    },

    /// Configuration file could not be parsed.
    #[error("invalid configuration: {0}")]
    Config(#[from] toml::de::Error),

    /// I/O failure while reading configuration or writing exports.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    pub(crate) fn smiles(position: usize, message: impl Into<String>) -> Self {
        Self::Smiles {
            position,
            message: message.into(),
        }
    }
}

/// Result type used by this crate.
pub type Result<T> = std::result::Result<T, Error>;
