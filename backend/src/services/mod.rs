pub mod anomaly_notifier;
pub mod session;

pub use anomaly_notifier::{AnomalyNotifier, WebhookNotifier};
pub use session::{ClientContext, IssuedTokens, SessionService, TokenPolicy};
