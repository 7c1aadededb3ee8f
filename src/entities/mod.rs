pub mod inventory_item;
pub mod low_stock_alert;
pub mod order;
pub mod order_item;
pub mod stock_movement;
pub mod stock_reservation;
