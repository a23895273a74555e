use consult_types::TextError;

#[derive(Debug, thiserror::Error)]
pub enum ConsultError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("invalid text: {0}")]
    Text(#[from] TextError),
    #[error("patient {patient_id} is not authorized in this session")]
    PermissionDenied { patient_id: String },
    #[error("consultation has already been reviewed")]
    AlreadyReviewed,
    #[error("consultation has not been approved by a clinician")]
    NotApproved,
    #[error("failed to create storage directory: {0}")]
    StorageDirCreation(std::io::Error),
    #[error("failed to write record store {path}: {source}", path = path.display())]
    FileWrite {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("record store {path} exists but cannot be read: {reason}", path = path.display())]
    StoreUnreadable {
        path: std::path::PathBuf,
        reason: String,
    },
    #[error("failed to serialize records: {0}")]
    Serialization(serde_json::Error),
    #[error("{0} lock poisoned")]
    LockPoisoned(&'static str),
}

pub type ConsultResult<T> = std::result::Result<T, ConsultError>;

/// Failure reported by an external collaborator (retrieval, transcription, presence).
///
/// Collaborator failures are never surfaced to callers of the core: the stage or gate
/// consuming the collaborator decides how to degrade.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum CollaboratorError {
    #[error("collaborator unavailable: {0}")]
    Unavailable(String),
    #[error("collaborator failed: {0}")]
    Failed(String),
}
