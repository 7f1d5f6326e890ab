//! Messenger error types

use thiserror::Error;

/// Errors from delivering messages to the chat transport
#[derive(Debug, Error)]
pub enum MessengerError {
    #[error("Network error: {0}")]
    Network(reqwest::Error),

    #[error("Transport rejected {method}: {description}")]
    Rejected { method: String, description: String },

    #[error("Transport returned HTTP {status} for {method}")]
    Http { method: String, status: u16 },

    #[error("Missing bot token: set the {0} environment variable")]
    MissingToken(String),
}

/// Drops the request URL, which embeds the bot token
impl From<reqwest::Error> for MessengerError {
    fn from(e: reqwest::Error) -> Self {
        MessengerError::Network(e.without_url())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let err = MessengerError::Rejected {
            method: "sendMessage".to_string(),
            description: "Bad Request: chat not found".to_string(),
        };
        assert_eq!(err.to_string(), "Transport rejected sendMessage: Bad Request: chat not found");

        let err = MessengerError::Http {
            method: "sendMessage".to_string(),
            status: 502,
        };
        assert_eq!(err.to_string(), "Transport returned HTTP 502 for sendMessage");
    }
}
