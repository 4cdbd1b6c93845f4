//! Pure data types for git operations.

use serde::{Deserialize, Serialize};

/// Result of a git commit operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommitResult {
    /// Status message.
    pub message: String,
    /// Full commit SHA, or `None` when nothing was staged.
    pub commit_hash: Option<String>,
}

impl CommitResult {
    pub fn nothing_to_commit() -> Self {
        Self {
            message: "Nothing to commit".to_string(),
            commit_hash: None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.commit_hash.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_commit_result_serialization() {
        let result = CommitResult {
            message: "1 file changed".to_string(),
            commit_hash: Some("0123abcd".to_string()),
        };
        let json = serde_json::to_string(&result).unwrap();
        assert!(json.contains("\"commitHash\":\"0123abcd\""));
    }

    #[test]
    fn test_nothing_to_commit_is_empty() {
        assert!(CommitResult::nothing_to_commit().is_empty());
    }
}
