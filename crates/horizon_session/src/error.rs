/// Errors a component may report from its lifecycle hooks.
///
/// Lookups and duplicate registrations are not errors in this crate; they
/// are reported as `Option`/`bool` returns because callers probe for
/// optional state all the time.
#[derive(Debug, thiserror::Error)]
pub enum ComponentError {
    /// `on_create` could not bring the component into a usable state
    #[error("Component {component} failed to initialize: {reason}")]
    CreateFailed { component: String, reason: String },
    /// `on_remove` could not release everything it held
    #[error("Component {component} failed to tear down: {reason}")]
    RemoveFailed { component: String, reason: String },
}

impl ComponentError {
    pub fn create_failed(component: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::CreateFailed {
            component: component.into(),
            reason: reason.into(),
        }
    }

    pub fn remove_failed(component: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::RemoveFailed {
            component: component.into(),
            reason: reason.into(),
        }
    }
}
