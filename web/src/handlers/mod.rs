//! HTTP request handlers, one module per resource.

pub mod availability;
pub mod checkout;
pub mod health;
pub mod orders;

pub use availability::ticket_class_availability;
pub use checkout::checkout;
pub use health::health_check;
pub use orders::get_order;
