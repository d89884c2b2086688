use thiserror::Error;

#[derive(Debug, Error)]
pub enum BlitzChatError {
    #[error("configuration error: {0}")]
    Config(String),
    #[error("http error: {0}")]
    Http(String),
    #[error("database error: {0}")]
    Database(String),
    #[error("serialization error: {0}")]
    Serialization(String),
    #[error("runtime error: {0}")]
    Runtime(String),
}

pub type Result<T> = std::result::Result<T, BlitzChatError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_variant_prefix() {
        let err = BlitzChatError::Config("missing api key".to_string());
        assert!(format!("{err}").contains("configuration error"));
        let err = BlitzChatError::Database("locked".to_string());
        assert!(format!("{err}").contains("database error"));
    }
}
