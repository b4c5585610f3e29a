use thiserror::Error;

/// Errors raised by the rollout environment.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum EnvError {
    #[error("Unsupported augmentation factor {0}: expected 1 or 8")]
    UnsupportedAugmentation(usize),

    #[error("Invalid environment configuration: {0}")]
    InvalidConfig(String),

    #[error("Saved problem pool exhausted: requested {requested} at cursor {cursor}, pool holds {available}")]
    SavedPoolExhausted {
        requested: usize,
        cursor: usize,
        available: usize,
    },

    #[error("Problem size mismatch: environment expects {expected} nodes, source provides {actual}")]
    ProblemSizeMismatch { expected: usize, actual: usize },

    #[error("Expected {expected} selections, got {actual}")]
    ShapeMismatch { expected: usize, actual: usize },

    #[error("Node index {node} out of range for {node_count} locations")]
    NodeOutOfRange { node: usize, node_count: usize },

    #[error("Node {node} is not a legal selection for instance {batch}, rollout {pomo}")]
    IllegalAction {
        batch: usize,
        pomo: usize,
        node: usize,
    },

    #[error("No problems loaded: call load_problems first")]
    NotLoaded,

    #[error("Environment not reset: call reset first")]
    NotReset,

    #[error("I/O error: {0}")]
    Io(String),

    #[error("Failed to parse saved problems: {0}")]
    Parse(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unsupported_augmentation_display() {
        let e = EnvError::UnsupportedAugmentation(4);
        assert_eq!(
            e.to_string(),
            "Unsupported augmentation factor 4: expected 1 or 8"
        );
    }

    #[test]
    fn pool_exhausted_display() {
        let e = EnvError::SavedPoolExhausted {
            requested: 10,
            cursor: 95,
            available: 100,
        };
        let s = e.to_string();
        assert!(s.contains("requested 10"));
        assert!(s.contains("cursor 95"));
        assert!(s.contains("holds 100"));
    }

    #[test]
    fn illegal_action_display() {
        let e = EnvError::IllegalAction {
            batch: 1,
            pomo: 2,
            node: 3,
        };
        assert_eq!(
            e.to_string(),
            "Node 3 is not a legal selection for instance 1, rollout 2"
        );
    }

    #[test]
    fn error_equality() {
        assert_eq!(EnvError::NotLoaded, EnvError::NotLoaded);
        assert_ne!(EnvError::NotLoaded, EnvError::NotReset);
    }
}
