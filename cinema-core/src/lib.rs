pub mod clock;
pub mod error;
pub mod events;
pub mod locks;
pub mod payment;
pub mod repository;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{BookingError, CoreResult, ErrorKind, StoreError};
pub use events::EventPublisher;
pub use locks::{SeatLock, SeatLocker};
pub use payment::{GatewayError, PaymentGateway};
pub use repository::{
    BalanceUpdate, BookingRepository, HoldClaim, HoldRepository, PaymentRepository, PendingRelease,
    ShowRepository, WalletRepository,
};
