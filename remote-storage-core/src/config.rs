use serde::{Deserialize, Serialize};
use std::num::NonZeroUsize;
use tracing::{debug, info};

/// Options applied uniformly to every object uploaded by one call.
///
/// Immutable once handed to an upload; shared read-only across tasks.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadOptions {
    /// MIME type set on every uploaded object. Left to the backend default when `None`.
    #[serde(default)]
    pub content_type: Option<String>,
    /// Upper bound on concurrent uploads in a directory upload. `None` spawns one
    /// task per file with no cap.
    #[serde(default)]
    pub max_in_flight: Option<NonZeroUsize>,
}

impl UploadOptions {
    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    pub fn with_max_in_flight(mut self, max_in_flight: NonZeroUsize) -> Self {
        self.max_in_flight = Some(max_in_flight);
        self
    }

    pub fn trace_loaded(&self) {
        info!(
            content_type = self.content_type.as_deref().unwrap_or("<unset>"),
            max_in_flight = self.max_in_flight.map(NonZeroUsize::get),
            "Loaded UploadOptions"
        );
        debug!(?self, "UploadOptions loaded (full debug)");
    }
}
