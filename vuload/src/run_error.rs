use crate::exit_codes::ExitCode;

#[derive(Debug)]
pub enum RunError {
    InvalidInput(anyhow::Error),
    RuntimeError(anyhow::Error),
    Interrupted,
}

impl RunError {
    #[must_use]
    pub fn exit_code(&self) -> ExitCode {
        match self {
            Self::InvalidInput(_) => ExitCode::InvalidInput,
            Self::RuntimeError(_) => ExitCode::RuntimeError,
            Self::Interrupted => ExitCode::Interrupted,
        }
    }

    /// Errors from planning a scenario are the user's input; everything after that is ours.
    pub fn from_core(err: vuload_core::Error) -> Self {
        use vuload_core::Error as E;

        match err {
            E::UnknownScenario { .. }
            | E::MissingBaseUrl
            | E::InvalidBaseUrl(_)
            | E::NoEndpoints
            | E::InvalidVus
            | E::InvalidInjectionRate
            | E::InvalidDuration(_)
            | E::InvalidRampUp
            | E::InvalidWeight(_) => Self::InvalidInput(err.into()),
            E::Interrupted => Self::Interrupted,
            E::Join(_) | E::Http(_) | E::Pattern(_) | E::CollectorShared => {
                Self::RuntimeError(err.into())
            }
        }
    }
}

impl std::fmt::Display for RunError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidInput(e) | Self::RuntimeError(e) => write!(f, "{e:#}"),
            Self::Interrupted => f.write_str("run interrupted; no report was written"),
        }
    }
}

impl std::error::Error for RunError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::InvalidInput(e) | Self::RuntimeError(e) => Some(e.as_ref()),
            Self::Interrupted => None,
        }
    }
}
