//! Errors a recommendation request surfaces to its caller.

/// Input errors. Every other failure inside the pipeline degrades to partial
/// data or the fallback list instead of reaching the caller.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum PicksError {
    #[error("authentication or handle required")]
    IdentityRequired,
    #[error("invalid GitHub handle `{0}`")]
    InvalidHandle(String),
}

impl PicksError {
    /// HTTP-like status class for request-handling layers.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::IdentityRequired => 401,
            Self::InvalidHandle(_) => 400,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_classes() {
        assert_eq!(PicksError::IdentityRequired.status_code(), 401);
        assert_eq!(PicksError::InvalidHandle("-x".into()).status_code(), 400);
    }

    #[test]
    fn test_invalid_handle_message_names_handle() {
        let err = PicksError::InvalidHandle("bad--name".into());
        assert!(err.to_string().contains("bad--name"));
    }
}
