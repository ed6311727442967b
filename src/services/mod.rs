// Services module - Business logic

pub mod analytics;
pub mod attendance;
pub mod qr_code;
pub mod qr_decoder;
pub mod signature;
