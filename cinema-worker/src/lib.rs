pub mod worker;

pub use worker::run_expiration_worker;
