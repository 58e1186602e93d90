use std::fmt;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, BeansError>;

#[derive(Debug, Error)]
pub enum BeansError {
    #[error("Duplicate bean: an instance of '{type_name}' is already registered")]
    DuplicateBean { type_name: String },

    #[error("Dependency not found: no bean satisfies '{type_name}'")]
    DependencyNotFound { type_name: String },

    #[error(
        "Ambiguous match: {} beans of type '{type_name}' carry profile '{profile}' ({})",
        candidates.len(),
        candidates.join(", ")
    )]
    AmbiguousProfileMatch {
        type_name: String,
        profile: String,
        candidates: Vec<String>,
    },

    #[error("No bean of type '{type_name}' carries profile '{profile}'")]
    NoProfileMatch { type_name: String, profile: String },

    #[error("Circular dependency detected: {cycle}")]
    CircularDependency { cycle: String },

    #[error("Unable to wire: {}", display_stalled(remaining))]
    Stalled { remaining: Vec<StalledBean> },

    #[error("Wiring action '{action}' failed for bean '{bean}': {source}")]
    WiringFailed {
        bean: String,
        action: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("Invalid configuration: {message}")]
    InvalidConfiguration { message: String },

    #[error("Failed to instantiate '{type_name}': {source}")]
    InstantiationFailed {
        type_name: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("Failed to downcast type: {type_name}")]
    DowncastFailed { type_name: String },

    #[error("Argument {index} ('{type_name}') was not resolved")]
    MissingArgument { index: usize, type_name: String },
}

impl BeansError {
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfiguration {
            message: message.into(),
        }
    }

    pub fn not_found(type_name: impl Into<String>) -> Self {
        Self::DependencyNotFound {
            type_name: type_name.into(),
        }
    }

    pub fn downcast_failed(type_name: impl Into<String>) -> Self {
        Self::DowncastFailed {
            type_name: type_name.into(),
        }
    }

    /// Wraps an error raised by a wiring action.
    ///
    /// Engine errors raised from inside the action (for example a dependency the
    /// action pulled on demand) are passed through untouched.
    pub fn wiring_failed(
        bean: impl Into<String>,
        action: impl Into<String>,
        source: anyhow::Error,
    ) -> Self {
        match source.downcast::<BeansError>() {
            Ok(inner) => inner,
            Err(source) => Self::WiringFailed {
                bean: bean.into(),
                action: action.into(),
                source,
            },
        }
    }
}

/// A bean left unloaded by a stalled fixed-point pass, with the wiring actions
/// that never resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StalledBean {
    pub bean: String,
    pub actions: Vec<String>,
}

impl fmt::Display for StalledBean {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}]", self.bean, self.actions.join(", "))
    }
}

fn display_stalled(remaining: &[StalledBean]) -> String {
    remaining
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wiring_failed_passes_engine_errors_through() {
        let inner = anyhow::Error::new(BeansError::not_found("app::Repo"));
        let err = BeansError::wiring_failed("app::Service", "init", inner);
        assert!(matches!(err, BeansError::DependencyNotFound { .. }));
    }

    #[test]
    fn test_wiring_failed_wraps_foreign_errors() {
        let err = BeansError::wiring_failed("app::Service", "init", anyhow::anyhow!("boom"));
        match err {
            BeansError::WiringFailed { bean, action, source } => {
                assert_eq!(bean, "app::Service");
                assert_eq!(action, "init");
                assert_eq!(source.to_string(), "boom");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_stalled_display_lists_beans_and_actions() {
        let err = BeansError::Stalled {
            remaining: vec![StalledBean {
                bean: "app::A".into(),
                actions: vec!["set_b".into(), "set_c".into()],
            }],
        };
        assert_eq!(err.to_string(), "Unable to wire: app::A [set_b, set_c]");
    }
}
