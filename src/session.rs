use crate::api::ApiError;

/// Bearer-token state for the current run. There is no refresh flow: a
/// session is replaced wholesale by a successful login and dies with the
/// process.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Session {
    #[default]
    Unauthenticated,
    Authenticated {
        token: String,
    },
}

impl Session {
    pub fn authenticated(token: impl Into<String>) -> Self {
        Self::Authenticated {
            token: token.into(),
        }
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self, Self::Authenticated { .. })
    }

    /// The token to put behind `Authorization: Bearer`. An unauthenticated
    /// session is a local error, not an empty header on the wire.
    pub fn bearer(&self) -> Result<&str, ApiError> {
        match self {
            Self::Authenticated { token } => Ok(token),
            Self::Unauthenticated => Err(ApiError::Unauthenticated),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unauthenticated_session_has_no_bearer() {
        let session = Session::default();
        assert!(!session.is_authenticated());
        assert!(matches!(session.bearer(), Err(ApiError::Unauthenticated)));
    }

    #[test]
    fn login_replaces_token_wholesale() {
        let session = Session::authenticated("tok1");
        assert_eq!(session.bearer().unwrap(), "tok1");

        let session = Session::authenticated("tok2");
        assert_eq!(session.bearer().unwrap(), "tok2");
    }
}
