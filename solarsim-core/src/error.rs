//! Error taxonomy for the simulation engine.
//!
//! Engine entry points return `anyhow::Result`; failures they raise carry a
//! [SimError] that callers can recover with [SimError::find] or
//! `anyhow::Error::downcast_ref`.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SimError {
    /// Malformed or insufficient velocity input
    #[error("validation error: {0}")]
    Validation(String),
    /// Unknown stage, or a simulation parameter out of its domain
    #[error("configuration error: {0}")]
    Configuration(String),
}

impl SimError {
    /// Walks the error chain of `err` and returns the first [SimError] found
    pub fn find(err: &anyhow::Error) -> Option<&SimError> {
        err.chain().find_map(|e| e.downcast_ref::<SimError>())
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;

    #[test]
    fn test_find_through_context() {
        let res: anyhow::Result<()> = Err(anyhow::Error::new(SimError::Configuration(
            "unknown stage".into(),
        )))
        .with_context(|| "while running batch idx 3");
        let err = res.unwrap_err();
        let found = SimError::find(&err).unwrap();
        assert!(found.is_configuration());
        assert!(!found.is_validation());
    }

    #[test]
    fn test_bail_macros() {
        fn fails_validation() -> anyhow::Result<()> {
            crate::bail_validation!("sample {} is negative", 4)
        }
        let err = fails_validation().unwrap_err();
        assert_eq!(
            SimError::find(&err),
            Some(&SimError::Validation("sample 4 is negative".into()))
        );
        assert_eq!(
            err.to_string(),
            "validation error: sample 4 is negative".to_string()
        );
    }
}
