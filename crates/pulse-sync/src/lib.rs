pub mod classify;
pub mod engine;
pub mod git;

pub use classify::{classify, SyncFailure};
pub use engine::{AttemptResult, SyncEngine, SyncHandle, SyncNotice};
pub use git::{GitBackend, GitCli, GitError, MockGit};
