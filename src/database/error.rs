use std::fmt;

/// Classified kinds of database failure
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatabaseErrorKind {
    /// Entity lookup returned no row
    NotFound { entity: String, id: String },
    /// Unique constraint violated
    UniqueViolation { constraint: String },
    /// Foreign key constraint violated
    ForeignKeyViolation { constraint: String },
    /// Could not reach the database or acquire a connection
    ConnectionFailure { message: String },
    /// Query executed but failed
    QueryFailed { message: String },
    /// Anything we could not classify
    Unknown { message: String },
}

impl fmt::Display for DatabaseErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DatabaseErrorKind::NotFound { entity, id } => {
                write!(f, "{} not found: {}", entity, id)
            }
            DatabaseErrorKind::UniqueViolation { constraint } => {
                write!(f, "Unique constraint violated: {}", constraint)
            }
            DatabaseErrorKind::ForeignKeyViolation { constraint } => {
                write!(f, "Foreign key constraint violated: {}", constraint)
            }
            DatabaseErrorKind::ConnectionFailure { message } => {
                write!(f, "Database connection failure: {}", message)
            }
            DatabaseErrorKind::QueryFailed { message } => {
                write!(f, "Query failed: {}", message)
            }
            DatabaseErrorKind::Unknown { message } => write!(f, "Database error: {}", message),
        }
    }
}

/// Database error with a classified kind
#[derive(Debug)]
pub struct DatabaseError {
    kind: DatabaseErrorKind,
}

impl DatabaseError {
    pub fn new(kind: DatabaseErrorKind) -> Self {
        Self { kind }
    }

    pub fn kind(&self) -> &DatabaseErrorKind {
        &self.kind
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self.kind, DatabaseErrorKind::NotFound { .. })
    }

    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        Self::new(DatabaseErrorKind::NotFound {
            entity: entity.into(),
            id: id.into(),
        })
    }

    /// Classify a raw sqlx error
    pub fn from_sqlx(err: sqlx::Error) -> Self {
        let kind = match &err {
            sqlx::Error::RowNotFound => DatabaseErrorKind::NotFound {
                entity: "row".to_string(),
                id: "unknown".to_string(),
            },
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed => {
                DatabaseErrorKind::ConnectionFailure {
                    message: err.to_string(),
                }
            }
            sqlx::Error::Io(io_err) => DatabaseErrorKind::ConnectionFailure {
                message: io_err.to_string(),
            },
            sqlx::Error::Database(db_err) => match db_err.code().as_deref() {
                Some("23505") => DatabaseErrorKind::UniqueViolation {
                    constraint: db_err.constraint().unwrap_or("unknown").to_string(),
                },
                Some("23503") => DatabaseErrorKind::ForeignKeyViolation {
                    constraint: db_err.constraint().unwrap_or("unknown").to_string(),
                },
                _ => DatabaseErrorKind::QueryFailed {
                    message: db_err.message().to_string(),
                },
            },
            other => DatabaseErrorKind::Unknown {
                message: other.to_string(),
            },
        };

        Self::new(kind)
    }
}

impl fmt::Display for DatabaseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)
    }
}

impl std::error::Error for DatabaseError {}
