//! GitHub webhook intake.
//!
//! - [`signature`]: HMAC-SHA256 delivery verification
//! - [`parser`]: payload parsing into [`WebhookEvent`]
//! - [`events`]: the typed events

pub mod events;
pub mod parser;
pub mod signature;

pub use events::{PullRequestAction, PullRequestEvent, WebhookEvent};
pub use parser::{ParseError, parse_webhook};
pub use signature::{SignatureError, parse_signature_header, sign, verify_signature};
