use tracing::{debug, warn};
use uuid::Uuid;

use crate::{
    dao::{
        booking_store::{
            CancelBookingOutcome, CancelledBooking, CreateBookingOutcome, ManualBookingsOutcome,
        },
        models::{AttendanceEntity, BookingEntity, ClassSessionEntity, UserEntity},
    },
    dto::{
        admin::{ManualBookingsRequest, ManualBookingsResponse},
        attendance::MarkAttendanceRequest,
    },
    error::ServiceError,
    services::{notification_service, reminder_service, waitlist_service},
    state::SharedState,
};

/// Book one seat for a member.
///
/// Blacklisted members are turned away before the capacity transaction runs.
/// On success the member's waitlist entry for this class (if any) is
/// dropped, reminders are scheduled and staff devices are alerted.
pub async fn book_seat(
    state: &SharedState,
    class_id: Uuid,
    user_id: String,
) -> Result<BookingEntity, ServiceError> {
    let store = state.require_store().await?;

    let user = store.find_user(user_id.clone()).await?;
    if let Some(user) = &user
        && user.strikes.blacklisted
    {
        return Err(ServiceError::UserBlacklisted);
    }

    let outcome = store
        .create_booking(class_id, user_id.clone(), state.now())
        .await?;
    let booking = match outcome {
        CreateBookingOutcome::Created(booking) => booking,
        CreateBookingOutcome::ClassNotFound => return Err(ServiceError::ClassNotFound),
        CreateBookingOutcome::DuplicateBooking => return Err(ServiceError::DuplicateBooking),
        CreateBookingOutcome::CapacityExceeded { remaining } => {
            return Err(ServiceError::CapacityExceeded { remaining });
        }
    };

    // A confirmed seat supersedes a spot in the queue.
    if let Some(entry) = store
        .remove_user_waitlist_entry(class_id, user_id.clone())
        .await?
    {
        debug!(%class_id, %user_id, position = entry.position, "dropped waitlist entry on booking");
    }

    let class = store.find_class(class_id).await?;
    let booking = match &class {
        Some(class) => {
            let user = user.clone().unwrap_or_else(|| placeholder_member(&user_id));
            attach_reminders(state, class, &user, booking).await?
        }
        None => booking,
    };

    if let Some(class) = &class {
        let user_name = user.as_ref().map_or(user_id.as_str(), |u| u.name.as_str());
        notification_service::send_admin_alert(state, user_name, class).await;
    }

    Ok(booking)
}

/// Book seats for a group of members at once, on behalf of staff.
///
/// Members already holding a seat are skipped; the rest are admitted
/// all-or-nothing against the remaining capacity. Seat holds and
/// blacklists do not apply to staff bookings.
pub async fn manual_bookings(
    state: &SharedState,
    class_id: Uuid,
    request: ManualBookingsRequest,
) -> Result<ManualBookingsResponse, ServiceError> {
    let store = state.require_store().await?;

    let outcome = store
        .create_manual_bookings(class_id, request.user_ids, state.now())
        .await?;
    let (bookings, skipped) = match outcome {
        ManualBookingsOutcome::Created { bookings, skipped } => (bookings, skipped),
        ManualBookingsOutcome::ClassNotFound => return Err(ServiceError::ClassNotFound),
        ManualBookingsOutcome::CapacityExceeded { remaining, .. } => {
            return Err(ServiceError::CapacityExceeded { remaining });
        }
    };

    let class = store.find_class(class_id).await?;
    let mut created = Vec::with_capacity(bookings.len());
    for booking in bookings {
        let user_id = booking.user_id.clone();
        if let Some(class) = &class {
            let user = store
                .find_user(user_id.clone())
                .await?
                .unwrap_or_else(|| placeholder_member(&user_id));
            attach_reminders(state, class, &user, booking).await?;
        }
        created.push(user_id);
    }

    Ok(ManualBookingsResponse { created, skipped })
}

/// Cancel a member's booking.
///
/// The storage transaction judges lateness and applies the strike; this
/// layer revokes the booking's reminder timers and tries to hand the freed
/// seat to the waitlist.
pub async fn cancel_booking(
    state: &SharedState,
    class_id: Uuid,
    user_id: String,
) -> Result<CancelledBooking, ServiceError> {
    let store = state.require_store().await?;

    let outcome = store
        .cancel_booking(
            class_id,
            user_id,
            state.now(),
            state.config().cancellation_rules(),
        )
        .await?;
    let cancelled = match outcome {
        CancelBookingOutcome::Cancelled(cancelled) => cancelled,
        CancelBookingOutcome::BookingNotFound => return Err(ServiceError::BookingNotFound),
    };

    for handle in &cancelled.booking.reminder_tasks {
        state.tasks().cancel(handle);
    }

    // The freed seat goes to the waitlist; a failed offer must not undo
    // the cancellation the member already got confirmed.
    if cancelled.class_found
        && let Err(err) = waitlist_service::offer_next_seat(state, class_id).await
    {
        warn!(%class_id, error = %err, "failed to offer freed seat to waitlist");
    }

    Ok(cancelled)
}

/// Record attendance for one member of a session, keyed by the session's
/// calendar date so re-marking overwrites.
pub async fn mark_attendance(
    state: &SharedState,
    class_id: Uuid,
    request: MarkAttendanceRequest,
) -> Result<AttendanceEntity, ServiceError> {
    let store = state.require_store().await?;

    let Some(class) = store.find_class(class_id).await? else {
        return Err(ServiceError::ClassNotFound);
    };

    let record = AttendanceEntity {
        class_date: class.class_date,
        class_id,
        user_id: request.user_id,
        status: request.status.into(),
        marked_at: state.now(),
    };
    store.record_attendance(record.clone()).await?;
    Ok(record)
}

/// Schedule reminders for a booking and persist their handles on it.
async fn attach_reminders(
    state: &SharedState,
    class: &ClassSessionEntity,
    user: &UserEntity,
    mut booking: BookingEntity,
) -> Result<BookingEntity, ServiceError> {
    let handles = reminder_service::schedule_for_booking(state, class, user);
    if !handles.is_empty() {
        let store = state.require_store().await?;
        store
            .store_task_handles(class.id, booking.user_id.clone(), handles.clone())
            .await?;
        booking.reminder_tasks = handles;
    }
    Ok(booking)
}

/// Stand-in profile for a member id with no stored document. Carries no
/// tokens and no aggregator flag, so it only affects reminder scheduling.
fn placeholder_member(user_id: &str) -> UserEntity {
    UserEntity {
        id: user_id.to_owned(),
        name: user_id.to_owned(),
        fcm_tokens: Vec::new(),
        strikes: Default::default(),
        is_admin: false,
        uses_aggregator_pass: false,
    }
}
