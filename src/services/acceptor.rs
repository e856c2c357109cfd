//! Ingestion boundary.

use super::window::DedupWindow;
use crate::models::{AcceptOutcome, Identifier};
use crate::{Error, Result};
use std::sync::Arc;
use tracing::instrument;

/// Forwards submitted identifiers to the open window.
///
/// Store failures never escape: they are logged and turned into
/// [`AcceptOutcome::Failed`]. The optional endpoint tag is logged and has no
/// other effect; every identifier goes to the one global window.
pub struct RequestAcceptor {
    window: Arc<DedupWindow>,
}

impl RequestAcceptor {
    /// Creates an acceptor feeding `window`.
    #[must_use]
    pub const fn new(window: Arc<DedupWindow>) -> Self {
        Self { window }
    }

    /// The window identifiers are forwarded to.
    #[must_use]
    pub const fn window(&self) -> &Arc<DedupWindow> {
        &self.window
    }

    /// Records `id` in the open window.
    #[instrument(skip(self), fields(operation = "accept"))]
    pub fn accept(&self, id: Identifier, tag: Option<&str>) -> AcceptOutcome {
        if let Some(tag) = tag.map(str::trim).filter(|t| !t.is_empty()) {
            tracing::info!(id, endpoint = tag, "Received identifier with endpoint tag");
        }

        match self.window.add(id) {
            Ok(_) => AcceptOutcome::Accepted,
            Err(e) => {
                tracing::warn!(id, error = %e, "Dropping identifier");
                AcceptOutcome::Failed
            },
        }
    }

    /// Parses a raw `id` parameter.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidInput` if `raw` is missing, blank or not a
    /// 64-bit signed integer.
    pub fn parse_identifier(raw: Option<&str>) -> Result<Identifier> {
        let raw = raw
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .ok_or_else(|| Error::InvalidInput("missing id parameter".to_string()))?;

        raw.parse::<Identifier>()
            .map_err(|e| Error::InvalidInput(format!("id '{raw}' is not an integer: {e}")))
    }
}
