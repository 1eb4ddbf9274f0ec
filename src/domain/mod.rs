pub mod date_range;
pub mod models;
pub mod window;
