/// Result of wiring up an external collaborator at construction time.
///
/// `Unconfigured` selects the deterministic local path and is never an error.
/// Failures of a configured service surface per call instead.
#[derive(Debug)]
pub enum ServiceStatus<T> {
    Available(T),
    Unconfigured { reason: String },
}

impl<T> ServiceStatus<T> {
    pub fn unconfigured(reason: impl Into<String>) -> Self {
        ServiceStatus::Unconfigured {
            reason: reason.into(),
        }
    }

    pub fn is_available(&self) -> bool {
        matches!(self, ServiceStatus::Available(_))
    }

    pub fn map<U, F>(self, f: F) -> ServiceStatus<U>
    where
        F: FnOnce(T) -> U,
    {
        match self {
            ServiceStatus::Available(inner) => ServiceStatus::Available(f(inner)),
            ServiceStatus::Unconfigured { reason } => ServiceStatus::Unconfigured { reason },
        }
    }
}
