pub mod alerts;
pub mod payments;
pub mod portfolio;
pub mod signals;
pub mod subscriptions;
pub mod users;
