/// Domain-specific error types for the pricing service.
/// Pricing errors are raised synchronously and never partially computed:
/// - InvalidOptionType / Domain come from the pricer itself
/// - everything else comes from the layers around it (spot feed, CSV, IO, DB, config)
#[derive(Debug, thiserror::Error)]
pub enum IpvError {
    #[error("invalid option type '{0}': must be either 'call' or 'put'")]
    InvalidOptionType(String),

    #[error("domain error: {0}")]
    Domain(String),

    #[error("spot feed error: {0}")]
    SpotFeed(String),

    #[error("csv error: {0}")]
    Csv(String),

    #[error("missing required column: {0}")]
    MissingColumn(String),

    #[error("io error: {0}")]
    Io(String),

    #[error("database error: {0}")]
    Database(String),

    #[error("config error: {0}")]
    Config(String),
}

impl IpvError {
    /// True for errors caused by the caller's input rather than by this service
    /// or its upstreams.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            IpvError::InvalidOptionType(_)
                | IpvError::Domain(_)
                | IpvError::Csv(_)
                | IpvError::MissingColumn(_)
        )
    }
}

impl From<csv::Error> for IpvError {
    fn from(e: csv::Error) -> Self {
        if e.is_io_error() {
            return IpvError::Io(e.to_string());
        }
        match e.position() {
            Some(pos) => IpvError::Csv(format!("line {}: {e}", pos.line())),
            None => IpvError::Csv(e.to_string()),
        }
    }
}

impl From<rusqlite::Error> for IpvError {
    fn from(e: rusqlite::Error) -> Self {
        IpvError::Database(e.to_string())
    }
}

impl From<std::io::Error> for IpvError {
    fn from(e: std::io::Error) -> Self {
        IpvError::Io(e.to_string())
    }
}

pub type IpvResult<T> = Result<T, IpvError>;
