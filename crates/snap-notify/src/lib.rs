//! Change notification for the SnapMenu content backend.
//!
//! Every successful content mutation is announced to the real-time clients
//! currently connected. Delivery is best-effort: subscribers that are gone
//! are dropped, subscribers that fall behind lose messages, and nothing is
//! kept for clients that connect later.

pub mod error;
pub mod notifier;

pub use error::{NotifyError, Result};
pub use notifier::{ChangeNotifier, NotifierConfig, Subscription, DEFAULT_TOKEN};
