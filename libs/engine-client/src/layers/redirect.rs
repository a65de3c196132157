//! Redirect policy for engine API requests
//!
//! Standard clients replay a request against the `Location` of a 3xx
//! response, silently turning POST into GET on 301/302. Against a daemon
//! that can duplicate side effects (a second container create, a second
//! delete), so this policy only follows redirects for safe methods:
//!
//! - `GET`/`HEAD`: followed, up to `max_redirects`
//! - every other method: the call fails with [`RedirectBlocked`]

use crate::error::RedirectBlocked;
use http::{Method, Request, StatusCode};
use tower_http::follow_redirect::policy::{Action, Attempt, Policy};

/// Default redirect limit for safe methods
pub const DEFAULT_MAX_REDIRECTS: usize = 10;

/// Outcome of [`decide`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedirectDecision {
    /// Not a redirect; deliver the response as is
    PassThrough,
    /// Follow the `Location` header
    Follow,
    /// Refuse and fail the call
    Block,
}

/// Decide what to do with a response, given the method of the original request.
#[must_use]
pub fn decide(method: &Method, status: StatusCode) -> RedirectDecision {
    if !is_redirect(status) {
        return RedirectDecision::PassThrough;
    }
    if is_safe_method(method) {
        RedirectDecision::Follow
    } else {
        RedirectDecision::Block
    }
}

fn is_redirect(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::MOVED_PERMANENTLY
            | StatusCode::FOUND
            | StatusCode::SEE_OTHER
            | StatusCode::TEMPORARY_REDIRECT
            | StatusCode::PERMANENT_REDIRECT
    )
}

fn is_safe_method(method: &Method) -> bool {
    *method == Method::GET || *method == Method::HEAD
}

/// [`Policy`] that follows redirects for `GET`/`HEAD` only.
///
/// The follow-redirect service rewrites POST to GET on 301/302 before asking
/// the policy, so the original method is captured in `on_request`, which
/// runs for the initial request first. A fresh clone is used per request.
#[derive(Debug, Clone)]
pub struct MutationSafeRedirectPolicy {
    max_redirects: usize,
    redirect_count: usize,
    original_method: Option<Method>,
}

impl MutationSafeRedirectPolicy {
    #[must_use]
    pub fn new(max_redirects: usize) -> Self {
        Self {
            max_redirects,
            redirect_count: 0,
            original_method: None,
        }
    }
}

impl Default for MutationSafeRedirectPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_REDIRECTS)
    }
}

impl<B: Clone, E: From<RedirectBlocked>> Policy<B, E> for MutationSafeRedirectPolicy {
    fn redirect(&mut self, attempt: &Attempt<'_>) -> Result<Action, E> {
        let method = self.original_method.clone().unwrap_or(Method::GET);

        match decide(&method, attempt.status()) {
            RedirectDecision::PassThrough => Ok(Action::Stop),
            RedirectDecision::Block => {
                tracing::warn!(
                    method = %method,
                    target = %attempt.location(),
                    status = %attempt.status(),
                    "refusing to follow redirect for mutating request"
                );
                Err(E::from(RedirectBlocked {
                    method,
                    location: attempt.location().clone(),
                    status: attempt.status(),
                }))
            }
            RedirectDecision::Follow => {
                self.redirect_count += 1;
                if self.redirect_count > self.max_redirects {
                    tracing::debug!(
                        count = self.redirect_count,
                        max = self.max_redirects,
                        "Redirect limit reached"
                    );
                    return Ok(Action::Stop);
                }
                Ok(Action::Follow)
            }
        }
    }

    fn on_request(&mut self, request: &mut Request<B>) {
        if self.original_method.is_none() {
            self.original_method = Some(request.method().clone());
        }
    }

    fn clone_body(&self, body: &B) -> Option<B> {
        Some(body.clone())
    }
}
