use thiserror::Error;

use crate::wire::DecodeError;

/// Errors surfaced by the runtime.
///
/// Most call sites degrade gracefully: errors arising from user data
/// (configuration typos, wrong types, unknown names) are logged and the
/// offending operation becomes a no-op. Only structural violations, like the
/// emission recursion limit, are fatal for the current tick.
#[derive(Debug, Error)]
pub enum Error {
    #[error("unknown component key `{0}`")]
    UnknownComponent(String),

    #[error("unknown event `{0}`")]
    UnknownEvent(String),

    #[error("component type `{0}` is not registered")]
    UnregisteredType(&'static str),

    #[error("hook `{component}:{field}` does not hold a `{expected}`")]
    TypeMismatch {
        component: String,
        field: String,
        expected: &'static str,
    },

    #[error("invalid hook expression `{0}`")]
    InvalidHook(String),

    #[error("missing configuration field `{field}` for `{component}`")]
    MissingField { component: String, field: String },

    #[error("event emission nested deeper than {0} levels")]
    RecursionLimit(usize),

    #[error("plugin `{name}`: {message}")]
    Plugin { name: String, message: String },

    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error("configuration parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    pub(crate) fn plugin(name: impl Into<String>, message: impl ToString) -> Self {
        Self::Plugin {
            name: name.into(),
            message: message.to_string(),
        }
    }
}
