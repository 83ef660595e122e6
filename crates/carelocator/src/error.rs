use thiserror::Error;

#[derive(Error, Debug)]
pub enum CarelocatorError {
    #[error("Index error: {0}")]
    Index(#[from] crate::index::IndexError),
    #[error("Geocoding error: {0}")]
    Geocoding(#[from] crate::geocode::GeocodingError),
    #[error("Data processing error: {0}")]
    DataProcessing(#[from] carelocator_data_processing::DataError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Init Logging error: {0}")]
    InitLoggingError(#[from] tracing_subscriber::filter::ParseError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, CarelocatorError>;
