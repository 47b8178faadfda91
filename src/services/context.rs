use std::future::Future;

use tokio_util::sync::{CancellationToken, DropGuard};

use super::ServiceError;
use crate::policy::Viewer;

/// Per-request view state: who is asking, and whether anyone still waits
/// for the answer.
///
/// The token is a child of the server's shutdown token and is cancelled when
/// the context is dropped, so work started through [`ViewContext::run`]
/// stops once the request that asked for it is gone.
pub struct ViewContext {
    pub viewer: Viewer,
    token: Option<String>,
    cancel: CancellationToken,
    _guard: DropGuard,
}

impl ViewContext {
    pub fn new(viewer: Viewer, token: Option<String>, parent: &CancellationToken) -> Self {
        let cancel = parent.child_token();
        let guard = cancel.clone().drop_guard();
        Self {
            viewer,
            token,
            cancel,
            _guard: guard,
        }
    }

    pub fn anonymous(parent: &CancellationToken) -> Self {
        Self::new(Viewer::Anonymous, None, parent)
    }

    /// The bearer token the viewer was resolved from, if any.
    pub fn bearer_token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Await `fut` unless the view is torn down first.
    pub async fn run<F, T, E>(&self, fut: F) -> Result<T, ServiceError>
    where
        F: Future<Output = Result<T, E>>,
        E: Into<ServiceError>,
    {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(ServiceError::Cancelled),
            result = fut => result.map_err(Into::into),
        }
    }
}

impl std::fmt::Debug for ViewContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ViewContext")
            .field("viewer", &self.viewer)
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}
