use anyhow::anyhow;

pub type Result<T> = std::result::Result<T, LibError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The user's document has never been written.
    DocumentMissing,
    NotFound,
    Unauthenticated,
    WriteFailed,
    Database,
    InvalidInput,
    /// An update carried a revision that no longer matches the stored graph.
    Conflict,
    Unknown,
}

#[derive(Debug)]
pub struct LibError {
    pub kind: ErrorKind,
    pub code: &'static str,
    pub public: &'static str,
    pub source: anyhow::Error,
}

impl LibError {
    pub fn document_missing(source: anyhow::Error) -> Self {
        Self {
            kind: ErrorKind::DocumentMissing,
            code: "document_missing",
            public: "User document does not exist",
            source,
        }
    }

    pub fn not_found(public: &'static str, source: anyhow::Error) -> Self {
        Self {
            kind: ErrorKind::NotFound,
            code: "not_found",
            public,
            source,
        }
    }

    pub fn graph_not_found(source: anyhow::Error) -> Self {
        Self::not_found("Graph not found", source)
    }

    pub fn unauthenticated(source: anyhow::Error) -> Self {
        Self {
            kind: ErrorKind::Unauthenticated,
            code: "not_authenticated",
            public: "User not authenticated",
            source,
        }
    }

    pub fn write_failed(public: &'static str, source: anyhow::Error) -> Self {
        Self {
            kind: ErrorKind::WriteFailed,
            code: "write_failed",
            public,
            source,
        }
    }

    pub fn database(public: &'static str, source: anyhow::Error) -> Self {
        Self {
            kind: ErrorKind::Database,
            code: "database_error",
            public,
            source,
        }
    }

    pub fn invalid(public: &'static str, source: anyhow::Error) -> Self {
        Self {
            kind: ErrorKind::InvalidInput,
            code: "invalid_input",
            public,
            source,
        }
    }

    pub fn conflict(source: anyhow::Error) -> Self {
        Self {
            kind: ErrorKind::Conflict,
            code: "revision_conflict",
            public: "Graph was changed elsewhere. Reload and try again.",
            source,
        }
    }

    pub fn unknown(public: &'static str, source: anyhow::Error) -> Self {
        Self {
            kind: ErrorKind::Unknown,
            code: "unknown_error",
            public,
            source,
        }
    }

    pub fn message(public: &'static str) -> Self {
        Self::unknown(public, anyhow!(public))
    }

    /// Re-labels the user-visible message while keeping kind, code and cause.
    pub fn with_public(mut self, public: &'static str) -> Self {
        self.public = public;
        self
    }
}

impl std::fmt::Display for LibError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({}): {}", self.public, self.code, self.source)
    }
}

#[cfg(feature = "sqlx")]
impl From<sqlx::Error> for LibError {
    fn from(value: sqlx::Error) -> Self {
        Self::database("Database request failed", anyhow!(value))
    }
}
