use crate::gateway::GatewayError;
use crate::session::SessionState;

/// Everything the redaction core can report to a caller.
///
/// `NegligibleSelection` is a no-op signal rather than a failure: the caller
/// simply does not redact. None of these are fatal; a fresh `load` always
/// recovers the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// Display metrics cannot be mapped (zero or non-finite size).
    InvalidGeometry(String),
    /// The selection is smaller than the minimum size, or clips to nothing.
    NegligibleSelection { width: u32, height: u32 },
    /// Fetching or decoding the asset failed.
    LoadFailed(String),
    /// A load or export is still outstanding.
    SessionBusy(SessionState),
    /// Encoding or writing the export failed.
    SaveFailed(String),
    /// The asset directory could not be enumerated.
    ListingUnavailable(String),
    /// The operation is not valid in the current state (e.g. reset with no document).
    InvalidState(SessionState),
    /// Buffer and origin sizes disagree.
    DimensionMismatch {
        expected: (u32, u32),
        actual: (u32, u32),
    },
}

impl SessionError {
    /// Any gateway rejection during a fetch is a load failure.
    pub fn load_failed(err: GatewayError) -> Self {
        SessionError::LoadFailed(err.to_string())
    }

    /// Any gateway rejection during a write is a save failure.
    pub fn save_failed(err: GatewayError) -> Self {
        SessionError::SaveFailed(err.to_string())
    }

    /// Listing failures keep their own variant; anything else is folded in.
    pub fn listing(err: GatewayError) -> Self {
        match err {
            GatewayError::ListingUnavailable(msg) => SessionError::ListingUnavailable(msg),
            other => SessionError::ListingUnavailable(other.to_string()),
        }
    }

    /// `true` for the signals that mean "nothing happened, nothing is wrong".
    pub fn is_benign(&self) -> bool {
        matches!(self, SessionError::NegligibleSelection { .. })
    }
}

impl std::fmt::Display for SessionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionError::InvalidGeometry(e) => write!(f, "Invalid geometry: {}", e),
            SessionError::NegligibleSelection { width, height } => {
                write!(f, "Selection {}x{} is too small to redact", width, height)
            }
            SessionError::LoadFailed(e) => write!(f, "Load failed: {}", e),
            SessionError::SessionBusy(state) => {
                write!(f, "Session busy ({}), try again when it finishes", state)
            }
            SessionError::SaveFailed(e) => write!(f, "Save failed: {}", e),
            SessionError::ListingUnavailable(e) => write!(f, "Listing unavailable: {}", e),
            SessionError::InvalidState(state) => {
                write!(f, "Operation not allowed while session is {}", state)
            }
            SessionError::DimensionMismatch { expected, actual } => write!(
                f,
                "Buffer is {}x{} but the image is {}x{}",
                actual.0, actual.1, expected.0, expected.1
            ),
        }
    }
}

impl std::error::Error for SessionError {}
