use std::fmt;

/// Reasons a command is rejected before (or by) the store
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// `+`/`-` without a user mention
    MissingMention,
    /// Mention not followed by the literal `for`
    MissingFor,
    /// Nothing left after normalizing the reason
    MissingReason,
    /// Actor tried to adjust their own score
    SelfRating,
    /// `score` argument that is not a mention
    UnknownUser(String),
    /// `quote add` without any text
    MissingQuote,
    /// `quote del` with a missing or non-numeric id
    InvalidQuoteId(String),
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::MissingMention => {
                write!(f, "no-one was mentioned in this score adjustment")
            }
            ValidationError::MissingFor => write!(f, "expected `for` after the mention"),
            ValidationError::MissingReason => write!(f, "missing reason"),
            ValidationError::SelfRating => write!(f, "self-rating is not allowed"),
            ValidationError::UnknownUser(who) => write!(f, "no idea who {} is", who),
            ValidationError::MissingQuote => write!(f, "missing quote text"),
            ValidationError::InvalidQuoteId(id) => write!(f, "invalid quote id {:?}", id),
        }
    }
}

/// Error type shared by the store and the command layer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BotError {
    /// Malformed command or self-targeting; shown to the user as-is
    Validation(ValidationError),
    /// Nothing stored for the queried subject
    NotFound(String),
    /// Transaction, connection or codec failure
    Storage(String),
    /// Chat session failure
    Transport(String),
}

impl BotError {
    pub fn storage(message: impl Into<String>) -> Self {
        BotError::Storage(message.into())
    }

    /// Operator incidents are logged with full detail; everything else is
    /// ordinary user feedback.
    pub fn is_incident(&self) -> bool {
        matches!(self, BotError::Storage(_) | BotError::Transport(_))
    }
}

impl fmt::Display for BotError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BotError::Validation(e) => write!(f, "validation error: {}", e),
            BotError::NotFound(what) => write!(f, "not found: {}", what),
            BotError::Storage(msg) => write!(f, "storage error: {}", msg),
            BotError::Transport(msg) => write!(f, "transport error: {}", msg),
        }
    }
}

impl std::error::Error for BotError {}

impl From<ValidationError> for BotError {
    fn from(e: ValidationError) -> Self {
        BotError::Validation(e)
    }
}

impl From<rusqlite::Error> for BotError {
    fn from(e: rusqlite::Error) -> Self {
        BotError::Storage(format!("sqlite: {}", e))
    }
}

impl From<r2d2::Error> for BotError {
    fn from(e: r2d2::Error) -> Self {
        BotError::Storage(format!("connection pool: {}", e))
    }
}

pub type BotResult<T> = Result<T, BotError>;
