// Background jobs

pub mod session_expirer;
