//! Errors that can occur before the server starts serving requests

use std::fmt::{Display, Formatter};
use std::io;

/// All reasons server startup can fail
#[derive(Debug)]
pub enum StartServerError {
    /// Binding the listen address or running the accept loop failed
    Bind(io::Error),
}

impl Display for StartServerError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            StartServerError::Bind(err) => write!(f, "Could not start server: {err}"),
        }
    }
}

impl std::error::Error for StartServerError {}

impl From<io::Error> for StartServerError {
    fn from(value: io::Error) -> Self {
        Self::Bind(value)
    }
}
