pub mod cooldown;
pub mod session;
