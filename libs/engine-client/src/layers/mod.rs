//! Tower layers for the engine client middleware stack
//!
//! - [`UserAgentLayer`] - Adds a default `User-Agent` header
//! - [`MutationSafeRedirectPolicy`] - Follows redirects for `GET`/`HEAD` only

mod redirect;
mod user_agent;

pub use redirect::{DEFAULT_MAX_REDIRECTS, MutationSafeRedirectPolicy, RedirectDecision, decide};
pub use user_agent::{UserAgentLayer, UserAgentService};
