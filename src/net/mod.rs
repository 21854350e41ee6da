pub mod boot_notifier;
pub mod connection;
pub mod ping_responder;
