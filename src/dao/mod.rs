/// Class, booking, waitlist and member persistence operations.
pub mod booking_store;
/// Database model definitions.
pub mod models;
/// Storage abstraction layer for database operations.
pub mod storage;
