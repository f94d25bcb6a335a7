/// Domain-level failures shared by every lockkeeper crate.
///
/// Benign outcomes (a release that matched nothing, a held lock) are not
/// errors; they are reported through return values instead.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CoreError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("User {user} may not revoke the lock on {key}")]
    RevokeDenied { user: String, key: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_invalid_argument() {
        let err = CoreError::InvalidArgument("office_id must not be empty".into());
        assert_eq!(
            err.to_string(),
            "Invalid argument: office_id must not be empty"
        );
    }

    #[test]
    fn display_revoke_denied() {
        let err = CoreError::RevokeDenied {
            user: "q0hecxyz".into(),
            key: "SPK/lockRelease/test_release".into(),
        };
        assert_eq!(
            err.to_string(),
            "User q0hecxyz may not revoke the lock on SPK/lockRelease/test_release"
        );
    }
}
