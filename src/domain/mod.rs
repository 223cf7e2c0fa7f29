pub mod expiration;
pub mod share;
pub mod timestamp;
