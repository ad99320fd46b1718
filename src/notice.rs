use std::fmt;

use crate::error::ClientError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Success,
    Info,
    Error,
}

/// Transient message shown to the user after an action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

impl Notice {
    pub fn success(message: impl Into<String>) -> Self {
        Self { level: NoticeLevel::Success, message: message.into() }
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self { level: NoticeLevel::Info, message: message.into() }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self { level: NoticeLevel::Error, message: message.into() }
    }

    pub fn from_error(err: &ClientError) -> Self {
        match err {
            ClientError::Conflict(_, msg) => Notice::error(format!("Conflict: {msg}")),
            ClientError::Validation(msg) => Notice::error(format!("Please check the form: {msg}")),
            ClientError::SessionExpired => Notice::error("Your session has expired. Please sign in again."),
            ClientError::Forbidden(..) => Notice::error("You are not allowed to do that."),
            ClientError::NotFound(..) => Notice::error("The requested record no longer exists."),
            _ => Notice::error("Something went wrong. Please try again."),
        }
    }
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self.level {
            NoticeLevel::Success => "ok",
            NoticeLevel::Info => "info",
            NoticeLevel::Error => "error",
        };
        write!(f, "[{tag}] {}", self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conflict_differs_from_generic_failure() {
        let conflict = Notice::from_error(&ClientError::Conflict("OVERLAP".into(), "slot taken".into()));
        let generic = Notice::from_error(&ClientError::Server(500, "boom".into()));
        assert_eq!(conflict.message, "Conflict: slot taken");
        assert_ne!(conflict.message, generic.message);
        assert_eq!(conflict.level, NoticeLevel::Error);
    }

    #[test]
    fn renders_with_level_tag() {
        assert_eq!(Notice::success("saved").to_string(), "[ok] saved");
    }
}
