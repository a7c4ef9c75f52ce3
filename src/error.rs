// Error taxonomy for the capture/render pipeline.
//
// Most fallible calls propagate through `anyhow::Result` like the rest of the crate;
// `CaptureError` exists only for the handful of cases a caller needs to match on
// (recoverable vs. fatal vs. transient), per the taxonomy in the error handling design.

use std::fmt;

/// Outcome of a single capture-engine iteration's attempt to acquire a frame.
#[derive(Debug)]
pub enum CaptureError {
    /// `DXGI_ERROR_WAIT_TIMEOUT`: no frame within the timeout. Not an error, just idle.
    Timeout,
    /// `DXGI_ERROR_ACCESS_LOST`: duplication interface invalidated (resize, mode change,
    /// desktop switch, GPU reset). Recoverable by tearing down and reacquiring.
    AccessLost,
    /// Duplication could not be created at all (source monitor gone, already duplicated
    /// by another process that holds it exclusively, etc). Fatal.
    DuplicationUnavailable(anyhow::Error),
    /// Any other per-frame failure. Reported once, then skipped.
    Transient(anyhow::Error),
}

impl fmt::Display for CaptureError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CaptureError::Timeout => write!(f, "capture wait timed out"),
            CaptureError::AccessLost => write!(f, "duplication access lost"),
            CaptureError::DuplicationUnavailable(e) => write!(f, "duplication unavailable: {e}"),
            CaptureError::Transient(e) => write!(f, "transient capture error: {e}"),
        }
    }
}

impl std::error::Error for CaptureError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CaptureError::DuplicationUnavailable(e) | CaptureError::Transient(e) => {
                Some(e.as_ref())
            }
            _ => None,
        }
    }
}

impl CaptureError {
    /// Whether the capture thread should keep running after this error.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, CaptureError::DuplicationUnavailable(_))
    }
}
