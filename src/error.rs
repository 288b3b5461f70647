use thiserror::Error;

/// Failures coming back from the remote diary service or its collaborators
/// (generators, upload endpoint). A missing entry is never an error; loads
/// return `Ok(None)` for dates that have no diary entry yet.
#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("server returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("unexpected response: {0}")]
    Decode(String),

    #[error("upload failed: {0}")]
    Upload(String),
}
