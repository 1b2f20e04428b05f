//! Maps raw git diagnostic text to a failure taxonomy. Only `Offline` is
//! retry-eligible; everything else needs user intervention.

/// Classification of a failed git operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncFailure {
    /// The remote repository does not exist or cannot be found.
    RepoNotFound,
    /// Push access to the remote was denied.
    PermissionDenied,
    /// The local working copy is not a valid git repository.
    InvalidLocalRepo,
    /// Host resolution or other network failure; likely to self-resolve.
    Offline,
    /// Nothing matched.
    Unknown,
}

impl SyncFailure {
    pub fn is_retryable(self) -> bool {
        matches!(self, SyncFailure::Offline)
    }

    /// Human-readable cause for the user-facing warning.
    pub fn describe(self, raw: &str) -> String {
        match self {
            SyncFailure::RepoNotFound => {
                "configured repository does not exist or the URL is incorrect".to_string()
            }
            SyncFailure::PermissionDenied => {
                "no permission to push to this repository".to_string()
            }
            SyncFailure::InvalidLocalRepo => {
                "local copy is invalid or was not initialized correctly".to_string()
            }
            SyncFailure::Offline => "remote unreachable, will retry when back online".to_string(),
            SyncFailure::Unknown => format!("sync failed: {raw}"),
        }
    }
}

/// Ordered pattern table; within a class, any substring hit wins.
const PATTERNS: &[(SyncFailure, &[&str])] = &[
    (
        SyncFailure::RepoNotFound,
        &[
            "repository not found",
            "does not appear to be a git repository",
            "repository does not exist",
        ],
    ),
    (
        SyncFailure::PermissionDenied,
        &[
            "permission denied",
            "authentication failed",
            "access denied",
            "403",
        ],
    ),
    (SyncFailure::InvalidLocalRepo, &["not a git repository"]),
    (
        SyncFailure::Offline,
        &[
            "could not resolve host",
            "unable to access",
            "connection",
            "network",
            "timed out",
            "temporary failure",
        ],
    ),
];

/// Classify a raw git failure message. Case-insensitive, first match wins.
pub fn classify(message: &str) -> SyncFailure {
    let haystack = message.to_lowercase();
    for (failure, needles) in PATTERNS {
        if needles.iter().any(|n| haystack.contains(n)) {
            return *failure;
        }
    }
    SyncFailure::Unknown
}
