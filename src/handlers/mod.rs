pub mod alerts;
pub mod inventory;
pub mod orders;
