use std::fmt;

/// Store error kinds
#[derive(Debug, Clone)]
pub enum StoreErrorKind {
    /// Connection pool is exhausted
    PoolExhausted,
    /// Database connection error
    Connection { message: String },
    /// Unique constraint violation (e.g. duplicate live order)
    UniqueViolation { message: String },
    /// Query execution error
    Query { message: String },
    /// Configuration error
    Config { message: String },
    /// Unknown error
    Unknown { message: String },
}

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, Clone)]
pub struct StoreError {
    pub kind: StoreErrorKind,
    pub context: Option<String>,
    is_retryable: bool,
}

impl StoreError {
    pub fn new(kind: StoreErrorKind) -> Self {
        let is_retryable = matches!(
            kind,
            StoreErrorKind::PoolExhausted | StoreErrorKind::Connection { .. }
        );

        Self {
            kind,
            context: None,
            is_retryable,
        }
    }

    pub fn with_context<S: Into<String>>(mut self, context: S) -> Self {
        self.context = Some(context.into());
        self
    }

    /// Transient failures; the caller must not assume the write was applied.
    pub fn is_retryable(&self) -> bool {
        self.is_retryable
    }

    pub fn is_unique_violation(&self) -> bool {
        matches!(self.kind, StoreErrorKind::UniqueViolation { .. })
    }

    /// Map a sqlx error to our store error type
    pub fn from_sqlx(error: sqlx::Error) -> Self {
        match error {
            sqlx::Error::PoolTimedOut => Self::new(StoreErrorKind::PoolExhausted),
            sqlx::Error::PoolClosed => Self::new(StoreErrorKind::Connection {
                message: "Connection pool is closed".to_string(),
            }),
            sqlx::Error::Io(io_err) => Self::new(StoreErrorKind::Connection {
                message: io_err.to_string(),
            }),
            sqlx::Error::Configuration(msg) => Self::new(StoreErrorKind::Config {
                message: msg.to_string(),
            }),
            sqlx::Error::Database(db_err) => {
                // 23505: Postgres unique_violation
                if db_err.code().as_deref() == Some("23505") {
                    Self::new(StoreErrorKind::UniqueViolation {
                        message: db_err.message().to_string(),
                    })
                } else {
                    Self::new(StoreErrorKind::Query {
                        message: db_err.message().to_string(),
                    })
                }
            }
            _ => Self::new(StoreErrorKind::Unknown {
                message: error.to_string(),
            }),
        }
    }
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let message = match &self.kind {
            StoreErrorKind::PoolExhausted => {
                "Store connection pool exhausted. Please try again.".to_string()
            }
            StoreErrorKind::Connection { message } => {
                format!("Store connection error: {}", message)
            }
            StoreErrorKind::UniqueViolation { message } => {
                format!("A conflicting record already exists: {}", message)
            }
            StoreErrorKind::Query { message } => {
                format!("Store query failed: {}", message)
            }
            StoreErrorKind::Config { message } => {
                format!("Store configuration error: {}", message)
            }
            StoreErrorKind::Unknown { message } => {
                format!("Unknown store error: {}", message)
            }
        };

        if let Some(context) = &self.context {
            write!(f, "{} ({})", message, context)
        } else {
            write!(f, "{}", message)
        }
    }
}

impl std::error::Error for StoreError {}
