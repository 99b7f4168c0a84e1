//! Lab service models

pub mod booking;
pub mod equipment;
pub mod group;
pub mod session;
pub mod user;

// Re-export for convenience
pub use booking::{Booking, BookingEntry, NewBooking};
pub use equipment::{Equipment, NewEquipment};
pub use group::Group;
pub use session::{Identity, Session};
pub use user::{AccessUpdate, NewUser, User};
