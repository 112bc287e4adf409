pub mod billing_webhook;
pub mod enums;
pub mod subscriptions;
