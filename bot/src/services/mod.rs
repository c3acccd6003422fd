pub mod alert_service;
pub mod session;
pub mod signal_service;
pub mod stream_service;
pub mod subscription_service;
