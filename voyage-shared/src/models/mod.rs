pub mod events;
pub mod user;
