/// Transient state of a photo upload for one image slot. Lives only in UI
/// state and is never serialized: the save path persists the durable URL
/// from `Resolved`, never an in-progress marker.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum UploadState {
    #[default]
    Idle,
    Pending,
    Resolved(String),
    Failed,
}

impl UploadState {
    pub fn is_pending(&self) -> bool {
        matches!(self, UploadState::Pending)
    }

    pub fn url(&self) -> Option<&str> {
        match self {
            UploadState::Resolved(url) => Some(url),
            _ => None,
        }
    }
}
