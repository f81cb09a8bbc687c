pub use crate::error::{Error, JwResult};
pub use crate::types::{JobId, Limit, Timestamp};
pub use tracing::{debug, error, info, trace, warn};

// vim: ts=4
