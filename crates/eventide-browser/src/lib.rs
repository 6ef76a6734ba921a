//! Browser rendering for JavaScript-heavy listing pages.
//!
//! Provides headless page rendering with user-agent rotation and per-host
//! request pacing shared by every extraction strategy.

pub mod engine;
pub mod error;
pub mod fingerprint;
pub mod rate_limit;

pub use engine::{BrowserEngine, PageRequest};
pub use error::{BrowserError, Result};
pub use fingerprint::{pick_user_agent, FingerprintConfig, DEFAULT_USER_AGENTS};
pub use rate_limit::{extract_domain, RateLimiter};
