use thiserror::Error;

pub type CoreResult<T> = Result<T, CoreError>;

/// Reason a QR token (or its credential) is no longer consumable.
/// Mirrors the precondition ordering in the consume flow: once one of
/// these fires, later checks are not evaluated.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GoneReason {
    Revoked,
    Expired,
    UsedUp,
}

impl GoneReason {
    pub fn as_str(self) -> &'static str {
        match self {
            GoneReason::Revoked => "revoked",
            GoneReason::Expired => "expired",
            GoneReason::UsedUp => "used_up",
        }
    }
}

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("validation: {0}")]
    Validation(&'static str),

    #[error("not found: {0}")]
    NotFound(&'static str),

    #[error("forbidden: {0}")]
    Forbidden(&'static str),

    #[error("gone: {0}", .0.as_str())]
    Gone(GoneReason),

    #[error("device failure: {0}")]
    DeviceFailure(String),

    #[error("gateway failure: {0}")]
    GatewayFailure(&'static str),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),

    #[error(transparent)]
    Db(#[from] sqlx::Error),
}

impl CoreError {
    /// HTTP-equivalent status family, per spec §7, for handlers that need it.
    pub fn status_family(&self) -> u16 {
        match self {
            CoreError::Validation(_) => 400,
            CoreError::NotFound(_) => 404,
            CoreError::Forbidden(_) => 403,
            CoreError::Gone(_) => 410,
            CoreError::DeviceFailure(_) => 200, // device failure never fails the HTTP call itself
            CoreError::GatewayFailure(_) => 502,
            CoreError::Internal(_) | CoreError::Db(_) => 500,
        }
    }
}
