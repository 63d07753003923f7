pub mod models;
pub mod pii;

pub use models::booking::{
    Booking, BookingDetails, BookingOwner, BookingStatus, Caller, PaymentType, ReservationHandle,
    SeatAssignment, WalkInCustomer,
};
pub use models::events::{BookingEvent, ReleaseReason};
pub use models::hold::ReservationHold;
pub use models::payment::{CardDetails, PaymentMethod, PaymentMethodKind, PaymentTransaction, Receipt};
pub use models::show::Show;
pub use models::wallet::{Wallet, WalletTransaction, WalletTransactionType};
pub use pii::Masked;
