use crate::error::{ErrorKind, PalletError, PalletResult};

/// Final state of a two-phase command
#[derive(Debug, Clone, PartialEq)]
pub enum CommandResolution<T> {
    /// The remote service accepted the command; local state reflects its answer
    Confirmed(T),
    /// Refused locally or by the remote service; local state was rolled back
    Rejected(PalletError),
    /// The outcome is unknown (timeout or disconnect); local state was rolled back
    TransportFailed(PalletError),
}

impl<T> CommandResolution<T> {
    /// Sort a failure into `Rejected` or `TransportFailed` by its kind
    pub fn failed(error: PalletError) -> Self {
        if error.kind() == ErrorKind::Transport {
            Self::TransportFailed(error)
        } else {
            Self::Rejected(error)
        }
    }

    pub fn is_confirmed(&self) -> bool {
        matches!(self, Self::Confirmed(_))
    }

    pub fn error(&self) -> Option<&PalletError> {
        match self {
            Self::Confirmed(_) => None,
            Self::Rejected(e) | Self::TransportFailed(e) => Some(e),
        }
    }

    pub fn into_result(self) -> PalletResult<T> {
        match self {
            Self::Confirmed(value) => Ok(value),
            Self::Rejected(e) | Self::TransportFailed(e) => Err(e),
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> CommandResolution<U> {
        match self {
            Self::Confirmed(value) => CommandResolution::Confirmed(f(value)),
            Self::Rejected(e) => CommandResolution::Rejected(e),
            Self::TransportFailed(e) => CommandResolution::TransportFailed(e),
        }
    }
}
