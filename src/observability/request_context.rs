//! Request ID propagation.
//!
//! The HTTP layer assigns every request an ID (taken from `x-request-id` or
//! generated). The ID follows the request across `.await` points through a
//! task-local, and into blocking store calls through a thread-local.

use std::cell::RefCell;
use std::future::Future;
use uuid::Uuid;

/// Header carrying the request ID in both directions.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Longest caller-supplied request ID that is accepted as-is.
const MAX_REQUEST_ID_LEN: usize = 128;

/// Per-request context.
#[derive(Clone, Debug)]
pub struct RequestContext {
    request_id: String,
}

impl RequestContext {
    /// Creates a context with a generated ID.
    #[must_use]
    pub fn new() -> Self {
        Self {
            request_id: Uuid::new_v4().to_string(),
        }
    }

    /// Uses the caller's ID when it is printable and short, otherwise
    /// generates one.
    #[must_use]
    pub fn from_header(value: Option<&str>) -> Self {
        match value.map(str::trim) {
            Some(id)
                if !id.is_empty()
                    && id.len() <= MAX_REQUEST_ID_LEN
                    && id.chars().all(|c| c.is_ascii_graphic()) =>
            {
                Self {
                    request_id: id.to_string(),
                }
            },
            _ => Self::new(),
        }
    }

    const fn from_id(request_id: String) -> Self {
        Self { request_id }
    }

    /// Returns the request ID.
    #[must_use]
    pub fn request_id(&self) -> &str {
        &self.request_id
    }
}

impl Default for RequestContext {
    fn default() -> Self {
        Self::new()
    }
}

tokio::task_local! {
    static TASK_CONTEXT: RequestContext;
}

thread_local! {
    static THREAD_CONTEXT: RefCell<Option<RequestContext>> = const { RefCell::new(None) };
}

/// Restores the previous thread-local context on drop.
pub struct RequestContextGuard {
    previous: Option<RequestContext>,
}

impl Drop for RequestContextGuard {
    fn drop(&mut self) {
        THREAD_CONTEXT.with(|slot| {
            *slot.borrow_mut() = self.previous.take();
        });
    }
}

/// Enters a request context on the current thread.
#[must_use]
pub fn enter_request_context(context: RequestContext) -> RequestContextGuard {
    let previous = THREAD_CONTEXT.with(|slot| slot.borrow_mut().replace(context));
    RequestContextGuard { previous }
}

/// Scopes a request context across an async future.
pub async fn scope_request_context<F, T>(context: RequestContext, fut: F) -> T
where
    F: Future<Output = T>,
{
    TASK_CONTEXT.scope(context, fut).await
}

/// Returns the current request ID, if set.
#[must_use]
pub fn current_request_id() -> Option<String> {
    if let Ok(id) = TASK_CONTEXT.try_with(|ctx| ctx.request_id.clone()) {
        return Some(id);
    }

    THREAD_CONTEXT.with(|slot| slot.borrow().as_ref().map(|ctx| ctx.request_id.clone()))
}

/// Runs `f` on the blocking pool with the caller's request context.
///
/// # Errors
///
/// Returns the join error if `f` panicked.
pub async fn spawn_blocking_in_context<F, T>(f: F) -> Result<T, tokio::task::JoinError>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    let context = current_request_id().map(RequestContext::from_id);
    tokio::task::spawn_blocking(move || {
        let _guard = context.map(enter_request_context);
        f()
    })
    .await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_header_accepts_reasonable_ids() {
        let context = RequestContext::from_header(Some(" abc-123 "));
        assert_eq!(context.request_id(), "abc-123");
    }

    #[test]
    fn test_from_header_replaces_bad_ids() {
        for bad in [None, Some(""), Some("has space"), Some(&*"x".repeat(200))] {
            let context = RequestContext::from_header(bad);
            assert!(Uuid::parse_str(context.request_id()).is_ok());
        }
    }

    #[test]
    fn test_thread_guard_restores_previous() {
        let outer = enter_request_context(RequestContext::from_header(Some("outer")));
        {
            let _inner = enter_request_context(RequestContext::from_header(Some("inner")));
            assert_eq!(current_request_id().as_deref(), Some("inner"));
        }
        assert_eq!(current_request_id().as_deref(), Some("outer"));
        drop(outer);
        assert_eq!(current_request_id(), None);
    }

    #[tokio::test]
    async fn test_context_reaches_blocking_pool() {
        let context = RequestContext::from_header(Some("req-7"));
        let observed = scope_request_context(context, async {
            tokio::task::yield_now().await;
            spawn_blocking_in_context(current_request_id).await
        })
        .await
        .unwrap();
        assert_eq!(observed.as_deref(), Some("req-7"));
    }
}
