//! Seam to the host application's remote draft API.

use std::future::Future;
use std::sync::Arc;

use smol_str::SmolStr;

use crate::document::DocumentState;
use crate::error::GatewayError;

/// Result of a successful remote draft write.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SavedDraft {
    /// Identifier of the remote draft, assigned on first create.
    pub draft_id: SmolStr,
}

/// Network operations against the remote draft store.
///
/// Implementations must be idempotent under retry once `doc.draft_id` is set:
/// a repeated write with the same id updates the same record.
pub trait RemoteDraftGateway: Send + Sync + 'static {
    /// Create a draft when `doc.draft_id` is `None`, otherwise update it.
    fn create_or_update_draft(
        &self,
        doc: &DocumentState,
    ) -> impl Future<Output = Result<SavedDraft, GatewayError>> + Send;

    /// Delete a remote draft. Deleting a missing draft should not be an error.
    fn delete_draft(&self, draft_id: &str) -> impl Future<Output = Result<(), GatewayError>> + Send;
}

impl<T: RemoteDraftGateway> RemoteDraftGateway for Arc<T> {
    fn create_or_update_draft(
        &self,
        doc: &DocumentState,
    ) -> impl Future<Output = Result<SavedDraft, GatewayError>> + Send {
        (**self).create_or_update_draft(doc)
    }

    fn delete_draft(&self, draft_id: &str) -> impl Future<Output = Result<(), GatewayError>> + Send {
        (**self).delete_draft(draft_id)
    }
}
