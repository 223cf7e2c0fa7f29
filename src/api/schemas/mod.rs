pub mod health;
pub mod shares;
pub mod uploads;
