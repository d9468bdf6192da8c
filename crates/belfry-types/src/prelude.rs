pub use crate::error::{BfResult, Error};
pub use crate::types::{OrgId, Timestamp};

pub use tracing::{debug, debug_span, error, error_span, info, info_span, warn, warn_span};

// vim: ts=4
