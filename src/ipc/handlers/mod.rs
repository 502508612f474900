pub mod attendance;
pub mod core;
pub mod directory;
pub mod fleet;
pub mod notifications;
pub mod requests;
