use thiserror::Error;

// ---------------------------------------------------------------------------
// Library error type
// ---------------------------------------------------------------------------

/// Everything that can go wrong inside the library.
///
/// Bad input data is never an error here: malformed lines, unparsable numbers
/// and invalid coordinates degrade silently. What remains are I/O failures,
/// configuration mistakes and running out of memory while growing the store.
#[derive(Debug, Error)]
pub enum Error {
    /// Growing a point buffer failed to allocate.
    #[error("out of memory while growing the point store to {requested} slots")]
    OutOfMemory { requested: usize },

    /// Buffer sizes derived from this capacity do not fit in memory
    /// addressing, or exceed the u32 primitive index range.
    #[error("point capacity {0} is too large for the point buffers")]
    CapacityOverflow(usize),

    #[error("growth increment must be at least one point")]
    ZeroGrowthIncrement,

    /// Two attribute bindings share a name.
    #[error("attribute {0:?} is bound more than once")]
    DuplicateAttribute(String),

    #[error("delimiter {0:?} is not a single-byte character")]
    InvalidDelimiter(char),

    #[error("reading delimited input: {0}")]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("invalid configuration: {0}")]
    Config(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
