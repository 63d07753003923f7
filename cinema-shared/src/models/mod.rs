pub mod booking;
pub mod events;
pub mod hold;
pub mod payment;
pub mod show;
pub mod wallet;
