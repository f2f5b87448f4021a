use thiserror::Error;

pub const DEFAULT_MAX_MESSAGE_LENGTH: usize = 500;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Message cannot be empty.")]
    Empty,
    #[error("Message is too long. Please keep it to {max} characters or fewer.")]
    TooLong { max: usize },
}

/// Trim `raw` and check it's non-empty and at most `max_length`
/// characters. The trimmed text is the cache key, so `" hi "` and
/// `"hi"` validate to the same value.
pub fn validate(raw: &str, max_length: usize) -> Result<String, ValidationError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::Empty);
    }
    if trimmed.chars().count() > max_length {
        return Err(ValidationError::TooLong { max: max_length });
    }
    Ok(trimmed.to_string())
}
