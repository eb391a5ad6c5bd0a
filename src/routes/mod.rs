pub mod health;
pub mod recommendations;
pub mod usage;
pub mod weather;
