mod handler;
mod model;

pub use handler::{get_booking, list_bookings, update_booking_status};
pub use model::{Booking, BookingStatus};
