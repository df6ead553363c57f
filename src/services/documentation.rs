use utoipa::OpenApi;

#[derive(OpenApi)]
/// Aggregated OpenAPI specification for Studio Sched.
#[openapi(
    paths(
        crate::routes::health::healthcheck,
        crate::routes::class::create_class,
        crate::routes::class::list_classes,
        crate::routes::class::get_class,
        crate::routes::class::delete_class,
        crate::routes::booking::create_booking,
        crate::routes::booking::cancel_booking,
        crate::routes::waitlist::join_waitlist,
        crate::routes::waitlist::leave_waitlist,
        crate::routes::waitlist::list_waitlist,
        crate::routes::attendance::mark_attendance,
        crate::routes::admin::manual_bookings,
        crate::routes::admin::strike_reset,
        crate::routes::admin::whitelist_user,
        crate::routes::admin::send_notification,
    ),
    components(
        schemas(
            crate::dto::health::HealthResponse,
            crate::dto::class::CreateClassRequest,
            crate::dto::class::ClassSummary,
            crate::dto::booking::CreateBookingRequest,
            crate::dto::booking::CancelBookingRequest,
            crate::dto::booking::BookingResponse,
            crate::dto::booking::CancelBookingResponse,
            crate::dto::waitlist::JoinWaitlistRequest,
            crate::dto::waitlist::LeaveWaitlistRequest,
            crate::dto::waitlist::WaitlistEntryResponse,
            crate::dto::attendance::AttendanceStatusDto,
            crate::dto::attendance::MarkAttendanceRequest,
            crate::dto::attendance::AttendanceResponse,
            crate::dto::admin::ManualBookingsRequest,
            crate::dto::admin::ManualBookingsResponse,
            crate::dto::admin::StrikeResetResponse,
            crate::dto::admin::WhitelistResponse,
            crate::dto::admin::DirectNotificationRequest,
            crate::dto::admin::DirectNotificationResponse,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "classes", description = "Class session management"),
        (name = "bookings", description = "Booking lifecycle operations"),
        (name = "waitlist", description = "Waitlist queueing and seat offers"),
        (name = "attendance", description = "Attendance marking"),
        (name = "admin", description = "Staff operations"),
    )
)]
pub struct ApiDoc;
