pub mod billing_webhook;
pub mod retry;
pub mod subscriptions;
