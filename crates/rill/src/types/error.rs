use crate::errors::Error;

/// An error as a first-class runtime value.
///
/// With `raised` set, the value behaves like an exception: it aborts the
/// current frame and propagates to the caller. With `raised` cleared it is a
/// plain data value that can be stored and inspected, which is what the
/// `try` builtin produces.
#[derive(Debug, Clone)]
pub struct ErrorValue {
    error: Error,
    raised: bool,
}

impl ErrorValue {
    #[must_use]
    pub fn raised(error: Error) -> Self {
        Self { error, raised: true }
    }

    #[must_use]
    pub fn plain(error: Error) -> Self {
        Self {
            error,
            raised: false,
        }
    }

    #[must_use]
    pub fn error(&self) -> &Error {
        &self.error
    }

    #[must_use]
    pub fn is_raised(&self) -> bool {
        self.raised
    }

    /// The full error message, including the kind prefix.
    #[must_use]
    pub fn message(&self) -> String {
        self.error.to_string()
    }
}
