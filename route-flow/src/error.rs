use thiserror::Error;

/// Failures reported by a recommendation gateway.
///
/// The flow treats every variant as "recommendation failed"; the variants only
/// exist so hosts can tell the cases apart when they report them.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GatewayError {
    #[error("Unknown file: {0}")]
    UnknownFile(String),

    #[error("Malformed recommendation payload: {0}")]
    Malformed(String),

    #[error("Recommendation rejected ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("Transport error: {0}")]
    Transport(String),
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum FlowError {
    #[error("Recommendation failed: {0}")]
    Gateway(#[from] GatewayError),

    #[error("No analysis session is active")]
    MissingSession,

    #[error("A recommendation request is already in flight")]
    RequestInFlight,

    #[error("Unknown route: {0}")]
    UnknownRoute(String),

    #[error("Place index {index} out of range for route with {len} places")]
    PlaceOutOfRange { index: usize, len: usize },

    #[error("Unknown marker: {0}")]
    UnknownMarker(u64),

    #[error("Unsupported file type: {0}")]
    UnsupportedFile(String),

    #[error("No file selected")]
    NoFileSelected,

    #[error("Preference text is empty")]
    EmptyPreference,

    #[error("Result view is not ready")]
    NotReady,
}

pub type Result<T> = std::result::Result<T, FlowError>;
