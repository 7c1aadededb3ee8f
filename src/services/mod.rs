pub mod inventory;
pub mod low_stock;
pub mod movements;
pub mod orders;
pub mod reservation_sweeper;
