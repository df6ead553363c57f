/// Seat booking, cancellation and attendance operations.
pub mod booking_service;
/// Class session management operations.
pub mod class_service;
/// OpenAPI documentation generation.
pub mod documentation;
/// Health check service.
pub mod health_service;
/// Push composition, delivery and audit logging.
pub mod notification_service;
/// Reminder scheduling and firing.
pub mod reminder_service;
/// Storage reconnection supervisor.
pub mod storage_supervisor;
/// Late-cancellation amnesty operations.
pub mod strike_service;
/// Dispatch loop for fired scheduler tasks.
pub mod task_dispatcher;
/// Waitlist queueing, seat offers and offer expiry.
pub mod waitlist_service;
