use crate::Error;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Exception {
    pub kind: String,
    pub message: String,
}

impl Exception {
    pub fn new(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for Exception {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.message.is_empty() {
            f.write_str(&self.kind)
        } else {
            write!(f, "{}: {}", self.kind, self.message)
        }
    }
}

impl std::error::Error for Exception {}

pub(super) fn exception_from_error(err: &anyhow::Error) -> Exception {
    if let Some(exc) = err.downcast_ref::<Exception>() {
        return exc.clone();
    }
    if let Some(error) = err.downcast_ref::<Error>() {
        let kind = match error {
            Error::UnknownAgent { .. } => "LookupError",
            Error::TransferDepth(_) => "RecursionError",
            Error::Config(_) | Error::Provider(_) => "RuntimeError",
        };
        return Exception::new(kind, error.to_string());
    }
    Exception::new("RuntimeError", format!("{err:#}"))
}
