pub mod flags;
pub mod health;
pub mod page;
pub mod sessions;
