//! Cart and checkout state, their codec, and the persistence stores.

pub mod cart;
pub mod checkout;
pub mod clock;
pub mod codec;
pub mod debounce;
mod ids;
pub mod state;

pub use cart::CartStore;
pub use checkout::{CheckoutSession, SessionUpdate};
pub use clock::{Clock, ManualClock, SystemClock};
pub use codec::{CartSnapshot, CheckoutSnapshot};
pub use debounce::Debouncer;
pub use state::{
    Address, CardDetails, CartItem, CartLock, CartState, CheckoutError, CheckoutErrorKind,
    CheckoutState, CheckoutStep, GuestInfo, OrderData, OrderLine, PaymentMethod, PaymentType,
    Product, ShippingInfo, ShippingMethod, StoredPaymentMethod,
};
