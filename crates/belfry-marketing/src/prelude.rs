pub use belfry_core::app::App;
pub use belfry_types::error::{BfResult, Error};
pub use belfry_types::types::{OrgId, Timestamp};

pub use tracing::{debug, debug_span, error, error_span, info, info_span, warn, warn_span};

// vim: ts=4
