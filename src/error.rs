use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScrapeError {
    #[error("Fetch failed for {url}: {reason}")]
    Fetch { url: String, reason: String },

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Unparseable date: {0:?}")]
    DateParse(String),

    #[error("Database error: {0}")]
    Persistence(#[from] rusqlite::Error),

    #[error("Property {account_number} has not been saved yet")]
    Unpersisted { account_number: i64 },
}

pub type Result<T> = std::result::Result<T, ScrapeError>;
