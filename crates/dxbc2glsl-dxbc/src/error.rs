use thiserror::Error;

/// Errors produced while reading a `DXBC` container or one of its chunks.
///
/// Every variant carries a human readable context string describing which
/// field or range failed validation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DxbcError {
    /// The container header or chunk table violates the format.
    #[error("malformed DXBC container: {context}")]
    MalformedContainer {
        /// Which structure failed validation.
        context: String,
    },
    /// A field or payload extends past the end of the supplied bytes.
    #[error("truncated DXBC data: {context}")]
    TruncatedData {
        /// Which range ran past the end of the buffer.
        context: String,
    },
    /// A chunk payload (signature, `RDEF`, ...) is structurally invalid.
    #[error("invalid DXBC chunk: {context}")]
    InvalidChunk {
        /// Which field of the chunk failed validation.
        context: String,
    },
}

impl DxbcError {
    pub(crate) fn malformed_header(context: impl Into<String>) -> Self {
        Self::MalformedContainer {
            context: context.into(),
        }
    }

    pub(crate) fn malformed_offsets(context: impl Into<String>) -> Self {
        Self::MalformedContainer {
            context: context.into(),
        }
    }

    pub(crate) fn out_of_bounds(context: impl Into<String>) -> Self {
        Self::TruncatedData {
            context: context.into(),
        }
    }

    pub(crate) fn invalid_chunk(context: impl Into<String>) -> Self {
        Self::InvalidChunk {
            context: context.into(),
        }
    }

    pub(crate) fn malformed_chunk(context: impl Into<String>) -> Self {
        Self::MalformedContainer {
            context: context.into(),
        }
    }

    /// Prefixes the context with `scope` (a chunk tag, record index, ...)
    /// while keeping the error kind.
    pub fn within(self, scope: impl core::fmt::Display) -> Self {
        match self {
            Self::MalformedContainer { context } => Self::MalformedContainer {
                context: format!("{scope}: {context}"),
            },
            Self::TruncatedData { context } => Self::TruncatedData {
                context: format!("{scope}: {context}"),
            },
            Self::InvalidChunk { context } => Self::InvalidChunk {
                context: format!("{scope}: {context}"),
            },
        }
    }

    /// Returns the context string without the variant prefix.
    pub fn context(&self) -> &str {
        match self {
            Self::MalformedContainer { context }
            | Self::TruncatedData { context }
            | Self::InvalidChunk { context } => context,
        }
    }

    /// Returns `true` for structural violations (header, offsets or chunk
    /// contents), as opposed to data that simply ends too early.
    pub fn is_malformed(&self) -> bool {
        !matches!(self, Self::TruncatedData { .. })
    }
}
