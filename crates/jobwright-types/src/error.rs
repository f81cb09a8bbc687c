//! Error type shared by the engine and its adapters.

use std::fmt;

use crate::{descriptor::JobState, types::JobId};

pub type JwResult<T> = std::result::Result<T, Error>;

#[derive(Debug)]
pub enum Error {
	NotFound,
	/// No registered creator knows this job kind
	CreatorNotFound(Box<str>),
	ValidationError(String),
	InvalidTransition {
		id: JobId,
		from: JobState,
		to: JobState,
	},
	DbError,
	Serialization(String),
	/// The dispatch queue task is gone (shut down or panicked)
	QueueClosed,
	AlreadyRestored,
	Internal(String),

	// externals
	Io(std::io::Error),
}

impl fmt::Display for Error {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		match self {
			Error::NotFound => write!(f, "not found"),
			Error::CreatorNotFound(kind) => write!(f, "no creator registered for job kind '{}'", kind),
			Error::ValidationError(msg) => write!(f, "validation error: {}", msg),
			Error::InvalidTransition { id, from, to } => {
				write!(f, "invalid transition of job {} from {} to {}", id, from, to)
			}
			Error::DbError => write!(f, "database error"),
			Error::Serialization(msg) => write!(f, "serialization error: {}", msg),
			Error::QueueClosed => write!(f, "dispatch queue closed"),
			Error::AlreadyRestored => write!(f, "persisted jobs were already restored"),
			Error::Internal(msg) => write!(f, "internal error: {}", msg),
			Error::Io(err) => write!(f, "io error: {}", err),
		}
	}
}

impl std::error::Error for Error {
	fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
		match self {
			Error::Io(err) => Some(err),
			_ => None,
		}
	}
}

impl From<std::io::Error> for Error {
	fn from(err: std::io::Error) -> Self {
		Self::Io(err)
	}
}

impl From<serde_json::Error> for Error {
	fn from(err: serde_json::Error) -> Self {
		Self::Serialization(err.to_string())
	}
}

// vim: ts=4
