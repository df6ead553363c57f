use std::sync::Arc;

use futures::{TryStreamExt, future::BoxFuture};
use mongodb::{
    Client, ClientSession, Collection, Database,
    bson::{Bson, doc},
    error::{
        Error as DriverError, ErrorKind, Result as DriverResult, TRANSIENT_TRANSACTION_ERROR,
        UNKNOWN_TRANSACTION_COMMIT_RESULT, WriteFailure,
    },
    options::{IndexOptions, ReturnDocument},
};
use time::OffsetDateTime;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{
    config::MongoConfig,
    connection::establish_connection,
    error::{MongoDaoError, MongoResult},
    models::{
        AttendanceDocument, BookingDocument, ClassDocument, NotificationDocument, UserDocument,
        WaitlistDocument, attendance_doc_id, booking_doc_id, doc_id, from_millis, millis,
        uuid_as_binary,
    },
};
use crate::dao::{
    booking_store::{
        BookingStore, CancelBookingOutcome, CancellationRules, CancelledBooking,
        CreateBookingOutcome, JoinWaitlistOutcome, ManualBookingsOutcome, StrikeResetOutcome,
        WhitelistOutcome,
    },
    models::{
        AttendanceEntity, BookingEntity, ClassSessionEntity, NotificationLogEntity, UserEntity,
        WaitlistEntryEntity,
    },
    storage::StorageResult,
};
use crate::domain::{capacity, lateness, strikes, waitlist};
use crate::domain::strikes::{AmnestyEffect, StrikeRecord};

const CLASS_COLLECTION_NAME: &str = "classes";
const BOOKING_COLLECTION_NAME: &str = "bookings";
const WAITLIST_COLLECTION_NAME: &str = "waitlists";
const USER_COLLECTION_NAME: &str = "users";
const ATTENDANCE_COLLECTION_NAME: &str = "attendance";
const NOTIFICATION_COLLECTION_NAME: &str = "notifications";

#[derive(Clone)]
pub struct MongoBookingStore {
    inner: Arc<MongoInner>,
}

struct MongoInner {
    state: RwLock<MongoState>,
    config: MongoConfig,
}

struct MongoState {
    client: Client,
    database: Database,
}

impl MongoInner {
    async fn ping(&self) -> MongoResult<()> {
        let database = {
            let guard = self.state.read().await;
            guard.database.clone()
        };

        database
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|source| MongoDaoError::HealthPing { source })?;
        Ok(())
    }

    async fn reconnect(&self) -> MongoResult<()> {
        let (client, database) =
            establish_connection(&self.config.options, &self.config.database_name).await?;
        let mut guard = self.state.write().await;
        guard.client = client;
        guard.database = database;
        Ok(())
    }
}

async fn commit_with_retry(session: &mut ClientSession) -> DriverResult<()> {
    loop {
        match session.commit_transaction().await {
            Ok(()) => return Ok(()),
            Err(err) if err.contains_label(UNKNOWN_TRANSACTION_COMMIT_RESULT) => continue,
            Err(err) => return Err(err),
        }
    }
}

fn is_duplicate_key(err: &DriverError) -> bool {
    matches!(
        err.kind.as_ref(),
        ErrorKind::Write(WriteFailure::WriteError(write)) if write.code == 11000
    )
}

/// What the cancellation transaction decided, before document conversion.
#[derive(Default)]
struct CancelTxn {
    booking: Option<BookingDocument>,
    late: bool,
    strikes: u8,
    blacklisted: bool,
    newly_blacklisted: bool,
    class_found: bool,
}

fn class_start_from_doc(class: &ClassDocument) -> Option<OffsetDateTime> {
    class
        .start_at_ms
        .and_then(|ms| from_millis(ms).ok())
        .or_else(|| {
            lateness::resolve_start(None, None, Some(&class.class_date), Some(&class.class_time))
        })
}

impl MongoBookingStore {
    /// Establish a connection to MongoDB and ensure indexes are present.
    pub async fn connect(config: MongoConfig) -> MongoResult<Self> {
        let (client, database) =
            establish_connection(&config.options, &config.database_name).await?;

        let inner = Arc::new(MongoInner {
            state: RwLock::new(MongoState { client, database }),
            config,
        });

        let store = Self { inner };
        store.ensure_indexes().await?;
        Ok(store)
    }

    async fn ensure_indexes(&self) -> MongoResult<()> {
        let database = self.database().await;

        let bookings = database.collection::<BookingDocument>(BOOKING_COLLECTION_NAME);
        let booking_index = mongodb::IndexModel::builder()
            .keys(doc! {"class_id": 1})
            .options(
                IndexOptions::builder()
                    .name(Some("booking_class_idx".to_owned()))
                    .build(),
            )
            .build();
        bookings
            .create_index(booking_index)
            .await
            .map_err(|source| MongoDaoError::EnsureIndex {
                collection: BOOKING_COLLECTION_NAME,
                index: "class_id",
                source,
            })?;

        let waitlists = database.collection::<WaitlistDocument>(WAITLIST_COLLECTION_NAME);
        let position_index = mongodb::IndexModel::builder()
            .keys(doc! {"class_id": 1, "position": 1})
            .options(
                IndexOptions::builder()
                    .name(Some("waitlist_position_idx".to_owned()))
                    .build(),
            )
            .build();
        waitlists
            .create_index(position_index)
            .await
            .map_err(|source| MongoDaoError::EnsureIndex {
                collection: WAITLIST_COLLECTION_NAME,
                index: "class_id,position",
                source,
            })?;

        // One queue slot per user per class, enforced at the storage level.
        let user_index = mongodb::IndexModel::builder()
            .keys(doc! {"class_id": 1, "user_id": 1})
            .options(
                IndexOptions::builder()
                    .name(Some("waitlist_user_idx".to_owned()))
                    .unique(Some(true))
                    .build(),
            )
            .build();
        waitlists
            .create_index(user_index)
            .await
            .map_err(|source| MongoDaoError::EnsureIndex {
                collection: WAITLIST_COLLECTION_NAME,
                index: "class_id,user_id",
                source,
            })?;

        let users = database.collection::<UserDocument>(USER_COLLECTION_NAME);
        let token_index = mongodb::IndexModel::builder()
            .keys(doc! {"fcm_tokens": 1})
            .options(
                IndexOptions::builder()
                    .name(Some("user_token_idx".to_owned()))
                    .build(),
            )
            .build();
        users
            .create_index(token_index)
            .await
            .map_err(|source| MongoDaoError::EnsureIndex {
                collection: USER_COLLECTION_NAME,
                index: "fcm_tokens",
                source,
            })?;

        Ok(())
    }

    async fn database(&self) -> Database {
        let guard = self.inner.state.read().await;
        guard.database.clone()
    }

    async fn client(&self) -> Client {
        let guard = self.inner.state.read().await;
        guard.client.clone()
    }

    async fn classes(&self) -> Collection<ClassDocument> {
        self.database().await.collection(CLASS_COLLECTION_NAME)
    }

    async fn bookings(&self) -> Collection<BookingDocument> {
        self.database().await.collection(BOOKING_COLLECTION_NAME)
    }

    async fn waitlists(&self) -> Collection<WaitlistDocument> {
        self.database().await.collection(WAITLIST_COLLECTION_NAME)
    }

    async fn users(&self) -> Collection<UserDocument> {
        self.database().await.collection(USER_COLLECTION_NAME)
    }

    async fn attendance(&self) -> Collection<AttendanceDocument> {
        self.database().await.collection(ATTENDANCE_COLLECTION_NAME)
    }

    async fn notifications(&self) -> Collection<NotificationDocument> {
        self.database()
            .await
            .collection(NOTIFICATION_COLLECTION_NAME)
    }

    /// Run `body` inside a transaction, restarting it on transient errors
    /// and retrying commits whose result is unknown.
    async fn run_transaction<T, F>(&self, op: &'static str, mut body: F) -> MongoResult<T>
    where
        T: Send,
        F: for<'s> FnMut(&'s mut ClientSession) -> BoxFuture<'s, DriverResult<T>> + Send,
    {
        let client = self.client().await;
        let mut session = client
            .start_session()
            .await
            .map_err(|source| MongoDaoError::Session { source })?;

        loop {
            session
                .start_transaction()
                .await
                .map_err(|source| MongoDaoError::Transaction { op, source })?;

            match body(&mut session).await {
                Ok(value) => match commit_with_retry(&mut session).await {
                    Ok(()) => return Ok(value),
                    Err(err) if err.contains_label(TRANSIENT_TRANSACTION_ERROR) => continue,
                    Err(source) => return Err(MongoDaoError::Transaction { op, source }),
                },
                Err(err) => {
                    let _ = session.abort_transaction().await;
                    if err.contains_label(TRANSIENT_TRANSACTION_ERROR) {
                        continue;
                    }
                    return Err(MongoDaoError::Transaction { op, source: err });
                }
            }
        }
    }

    async fn create_booking(
        &self,
        class_id: Uuid,
        user_id: String,
        now: OffsetDateTime,
    ) -> MongoResult<CreateBookingOutcome> {
        let classes = self.classes().await;
        let bookings = self.bookings().await;

        let result = self
            .run_transaction("create booking", move |session| {
                let classes = classes.clone();
                let bookings = bookings.clone();
                let user_id = user_id.clone();
                Box::pin(async move {
                    let Some(class) = classes
                        .find_one(doc_id(class_id))
                        .session(&mut *session)
                        .await?
                    else {
                        return Ok(CreateBookingOutcome::ClassNotFound);
                    };

                    let booking_id = booking_doc_id(class_id, &user_id);
                    if bookings
                        .find_one(doc! {"_id": &booking_id})
                        .session(&mut *session)
                        .await?
                        .is_some()
                    {
                        return Ok(CreateBookingOutcome::DuplicateBooking);
                    }

                    // The seat hold is advisory; capacity is checked against
                    // the enrolled count alone.
                    if let Err(err) = capacity::occupy(class.enrolled_count, class.capacity, 1) {
                        return Ok(CreateBookingOutcome::CapacityExceeded {
                            remaining: err.remaining,
                        });
                    }

                    let mut update = doc! {"$inc": {"enrolled_count": 1}};
                    if class.hold.as_ref().is_some_and(|hold| hold.user_id == user_id) {
                        update.insert("$unset", doc! {"hold": ""});
                    }
                    classes
                        .update_one(doc_id(class_id), update)
                        .session(&mut *session)
                        .await?;

                    let booking = BookingEntity {
                        class_id,
                        user_id,
                        booked_at: now,
                        class_start_at: class_start_from_doc(&class),
                        reminder_tasks: Vec::new(),
                    };
                    bookings
                        .insert_one(BookingDocument::from(booking.clone()))
                        .session(&mut *session)
                        .await?;
                    Ok(CreateBookingOutcome::Created(booking))
                })
            })
            .await;

        match result {
            Err(MongoDaoError::Transaction { source, .. }) if is_duplicate_key(&source) => {
                Ok(CreateBookingOutcome::DuplicateBooking)
            }
            other => other,
        }
    }

    async fn create_manual_bookings(
        &self,
        class_id: Uuid,
        user_ids: Vec<String>,
        now: OffsetDateTime,
    ) -> MongoResult<ManualBookingsOutcome> {
        let classes = self.classes().await;
        let bookings = self.bookings().await;

        self.run_transaction("create manual bookings", move |session| {
            let classes = classes.clone();
            let bookings = bookings.clone();
            let user_ids = user_ids.clone();
            Box::pin(async move {
                let Some(class) = classes
                    .find_one(doc_id(class_id))
                    .session(&mut *session)
                    .await?
                else {
                    return Ok(ManualBookingsOutcome::ClassNotFound);
                };

                let mut seen = std::collections::HashSet::new();
                let mut fresh = Vec::new();
                let mut skipped = Vec::new();
                for user_id in user_ids {
                    if !seen.insert(user_id.clone()) {
                        continue;
                    }
                    let booking_id = booking_doc_id(class_id, &user_id);
                    if bookings
                        .find_one(doc! {"_id": &booking_id})
                        .session(&mut *session)
                        .await?
                        .is_some()
                    {
                        skipped.push(user_id);
                    } else {
                        fresh.push(user_id);
                    }
                }

                let requested = fresh.len() as u32;
                if let Err(err) = capacity::occupy(class.enrolled_count, class.capacity, requested)
                {
                    return Ok(ManualBookingsOutcome::CapacityExceeded {
                        remaining: err.remaining,
                        requested,
                    });
                }

                let start = class_start_from_doc(&class);
                let created: Vec<BookingEntity> = fresh
                    .into_iter()
                    .map(|user_id| BookingEntity {
                        class_id,
                        user_id,
                        booked_at: now,
                        class_start_at: start,
                        reminder_tasks: Vec::new(),
                    })
                    .collect();

                if !created.is_empty() {
                    let documents: Vec<BookingDocument> =
                        created.iter().cloned().map(Into::into).collect();
                    bookings
                        .insert_many(documents)
                        .session(&mut *session)
                        .await?;
                    classes
                        .update_one(
                            doc_id(class_id),
                            doc! {"$inc": {"enrolled_count": i64::from(requested)}},
                        )
                        .session(&mut *session)
                        .await?;
                }

                Ok(ManualBookingsOutcome::Created {
                    bookings: created,
                    skipped,
                })
            })
        })
        .await
    }

    async fn cancel_booking(
        &self,
        class_id: Uuid,
        user_id: String,
        now: OffsetDateTime,
        rules: CancellationRules,
    ) -> MongoResult<CancelBookingOutcome> {
        let classes = self.classes().await;
        let bookings = self.bookings().await;
        let users = self.users().await;

        let txn = self
            .run_transaction("cancel booking", move |session| {
                let classes = classes.clone();
                let bookings = bookings.clone();
                let users = users.clone();
                let user_id = user_id.clone();
                Box::pin(async move {
                    let booking_id = booking_doc_id(class_id, &user_id);
                    let Some(booking) = bookings
                        .find_one_and_delete(doc! {"_id": &booking_id})
                        .session(&mut *session)
                        .await?
                    else {
                        return Ok(CancelTxn::default());
                    };

                    let class = classes
                        .find_one(doc_id(class_id))
                        .session(&mut *session)
                        .await?;
                    let class_found = class.is_some();
                    let mut from_class = None;
                    if let Some(class) = class {
                        let released = capacity::release(class.enrolled_count);
                        classes
                            .update_one(
                                doc_id(class_id),
                                doc! {"$set": {"enrolled_count": i64::from(released)}},
                            )
                            .session(&mut *session)
                            .await?;
                        from_class = class_start_from_doc(&class);
                    }

                    let booked_start = booking
                        .class_start_at_ms
                        .and_then(|ms| from_millis(ms).ok());
                    let start = lateness::resolve_start(booked_start, from_class, None, None);
                    let late = lateness::is_late(start, now, rules.late_window);

                    let mut txn = CancelTxn {
                        booking: Some(booking),
                        late,
                        class_found,
                        ..CancelTxn::default()
                    };

                    let user = users
                        .find_one(doc! {"_id": &user_id})
                        .session(&mut *session)
                        .await?;
                    if late {
                        if let Some(user) = user {
                            let mut record = StrikeRecord {
                                late_cancellations: user.late_cancellations,
                                blacklisted: user.blacklisted,
                                blacklisted_at: user
                                    .blacklisted_at_ms
                                    .and_then(|ms| from_millis(ms).ok()),
                            };
                            let outcome = strikes::register_late_cancellation(
                                &mut record,
                                rules.strike_limit,
                                now,
                            );
                            users
                                .update_one(
                                    doc! {"_id": &user_id},
                                    doc! {"$set": {
                                        "late_cancellations": i32::from(record.late_cancellations),
                                        "blacklisted": record.blacklisted,
                                        "blacklisted_at_ms": record.blacklisted_at.map(millis),
                                    }},
                                )
                                .session(&mut *session)
                                .await?;
                            txn.strikes = outcome.strikes;
                            txn.blacklisted = record.blacklisted;
                            txn.newly_blacklisted = outcome.newly_blacklisted;
                        }
                    } else if let Some(user) = user {
                        txn.strikes = user.late_cancellations;
                        txn.blacklisted = user.blacklisted;
                    }

                    Ok(txn)
                })
            })
            .await?;

        let Some(document) = txn.booking else {
            return Ok(CancelBookingOutcome::BookingNotFound);
        };
        let booking: BookingEntity =
            document
                .try_into()
                .map_err(|source| MongoDaoError::Corrupt {
                    collection: BOOKING_COLLECTION_NAME,
                    source,
                })?;
        Ok(CancelBookingOutcome::Cancelled(CancelledBooking {
            booking,
            late: txn.late,
            strikes: txn.strikes,
            blacklisted: txn.blacklisted,
            newly_blacklisted: txn.newly_blacklisted,
            class_found: txn.class_found,
        }))
    }

    async fn join_waitlist(
        &self,
        class_id: Uuid,
        user_id: String,
        now: OffsetDateTime,
    ) -> MongoResult<JoinWaitlistOutcome> {
        let classes = self.classes().await;
        let bookings = self.bookings().await;
        let waitlists = self.waitlists().await;

        let result = self
            .run_transaction("join waitlist", move |session| {
                let classes = classes.clone();
                let bookings = bookings.clone();
                let waitlists = waitlists.clone();
                let user_id = user_id.clone();
                Box::pin(async move {
                    if classes
                        .find_one(doc_id(class_id))
                        .session(&mut *session)
                        .await?
                        .is_none()
                    {
                        return Ok(JoinWaitlistOutcome::ClassNotFound);
                    }

                    let booking_id = booking_doc_id(class_id, &user_id);
                    if bookings
                        .find_one(doc! {"_id": &booking_id})
                        .session(&mut *session)
                        .await?
                        .is_some()
                    {
                        return Ok(JoinWaitlistOutcome::AlreadyBooked);
                    }

                    if waitlists
                        .find_one(
                            doc! {"class_id": uuid_as_binary(class_id), "user_id": &user_id},
                        )
                        .session(&mut *session)
                        .await?
                        .is_some()
                    {
                        return Ok(JoinWaitlistOutcome::AlreadyWaitlisted);
                    }

                    let mut cursor = waitlists
                        .find(doc! {"class_id": uuid_as_binary(class_id)})
                        .sort(doc! {"position": -1})
                        .limit(1)
                        .session(&mut *session)
                        .await?;
                    let current_max = match cursor.next(&mut *session).await {
                        Some(tail) => Some(tail?.position),
                        None => None,
                    };

                    let entry = WaitlistEntryEntity {
                        id: Uuid::new_v4(),
                        class_id,
                        user_id,
                        position: waitlist::next_position(current_max),
                        joined_at: now,
                        notified_at: None,
                        expires_at: None,
                    };
                    waitlists
                        .insert_one(WaitlistDocument::from(entry.clone()))
                        .session(&mut *session)
                        .await?;
                    Ok(JoinWaitlistOutcome::Joined(entry))
                })
            })
            .await;

        match result {
            Err(MongoDaoError::Transaction { source, .. }) if is_duplicate_key(&source) => {
                Ok(JoinWaitlistOutcome::AlreadyWaitlisted)
            }
            other => other,
        }
    }

    async fn remove_entry_by(
        &self,
        filter: mongodb::bson::Document,
    ) -> MongoResult<Option<WaitlistEntryEntity>> {
        let classes = self.classes().await;
        let waitlists = self.waitlists().await;

        let removed = self
            .run_transaction("remove waitlist entry", move |session| {
                let classes = classes.clone();
                let waitlists = waitlists.clone();
                let filter = filter.clone();
                Box::pin(async move {
                    let Some(entry) = waitlists
                        .find_one_and_delete(filter)
                        .session(&mut *session)
                        .await?
                    else {
                        return Ok(None);
                    };

                    waitlists
                        .update_many(
                            doc! {
                                "class_id": uuid_as_binary(entry.class_id),
                                "position": {"$gt": i64::from(entry.position)},
                            },
                            doc! {"$inc": {"position": -1}},
                        )
                        .session(&mut *session)
                        .await?;

                    // Only clear the hold when it still points at this entry.
                    classes
                        .update_one(
                            doc! {
                                "_id": uuid_as_binary(entry.class_id),
                                "hold.entry_id": uuid_as_binary(entry.id),
                            },
                            doc! {"$unset": {"hold": ""}},
                        )
                        .session(&mut *session)
                        .await?;

                    Ok(Some(entry))
                })
            })
            .await?;

        removed
            .map(TryInto::try_into)
            .transpose()
            .map_err(|source| MongoDaoError::Corrupt {
                collection: WAITLIST_COLLECTION_NAME,
                source,
            })
    }

    async fn reset_strikes(&self, batch_size: u32) -> MongoResult<StrikeResetOutcome> {
        let users = self.users().await;
        let query_err = |source| MongoDaoError::Query {
            op: "reset strikes",
            source,
        };

        let users_scanned = users.count_documents(doc! {}).await.map_err(query_err)?;
        let flagged: Vec<UserDocument> = users
            .find(doc! {"$or": [
                {"late_cancellations": {"$gt": 0}},
                {"blacklisted": true},
            ]})
            .await
            .map_err(query_err)?
            .try_collect()
            .await
            .map_err(query_err)?;

        let mut outcome = StrikeResetOutcome {
            users_scanned,
            ..StrikeResetOutcome::default()
        };
        for user in &flagged {
            if user.late_cancellations > 0 {
                outcome.struck_count += 1;
            }
            if user.blacklisted {
                outcome.blacklisted_count += 1;
            }
        }

        let ids: Vec<&str> = flagged.iter().map(|user| user.id.as_str()).collect();
        for chunk in ids.chunks(batch_size.max(1) as usize) {
            users
                .update_many(
                    doc! {"_id": {"$in": chunk.to_vec()}},
                    doc! {"$set": {
                        "late_cancellations": 0,
                        "blacklisted": false,
                        "blacklisted_at_ms": Bson::Null,
                    }},
                )
                .await
                .map_err(query_err)?;
            outcome.batches += 1;
        }

        let mut unblacklisted = Vec::new();
        for user in flagged.into_iter().filter(|user| user.blacklisted) {
            let mut entity: UserEntity =
                user.try_into().map_err(|source| MongoDaoError::Corrupt {
                    collection: USER_COLLECTION_NAME,
                    source,
                })?;
            entity.strikes = StrikeRecord::default();
            unblacklisted.push(entity);
        }
        unblacklisted.sort_by(|a, b| a.id.cmp(&b.id));
        outcome.unblacklisted = unblacklisted;

        Ok(outcome)
    }
}

impl BookingStore for MongoBookingStore {
    fn insert_class(&self, class: ClassSessionEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            let classes = store.classes().await;
            classes
                .replace_one(doc_id(class.id), ClassDocument::from(class))
                .upsert(true)
                .await
                .map_err(|source| MongoDaoError::Query {
                    op: "insert class",
                    source,
                })?;
            Ok(())
        })
    }

    fn find_class(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<ClassSessionEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            let classes = store.classes().await;
            let document = classes
                .find_one(doc_id(id))
                .await
                .map_err(|source| MongoDaoError::Query {
                    op: "find class",
                    source,
                })?;
            Ok(document
                .map(TryInto::try_into)
                .transpose()
                .map_err(|source| MongoDaoError::Corrupt {
                    collection: CLASS_COLLECTION_NAME,
                    source,
                })?)
        })
    }

    fn list_classes(&self) -> BoxFuture<'static, StorageResult<Vec<ClassSessionEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            let classes = store.classes().await;
            let query_err = |source| MongoDaoError::Query {
                op: "list classes",
                source,
            };
            let documents: Vec<ClassDocument> = classes
                .find(doc! {})
                .sort(doc! {"class_date": 1, "class_time": 1})
                .await
                .map_err(query_err)?
                .try_collect()
                .await
                .map_err(query_err)?;
            let entities = documents
                .into_iter()
                .map(TryInto::try_into)
                .collect::<Result<Vec<_>, _>>()
                .map_err(|source| MongoDaoError::Corrupt {
                    collection: CLASS_COLLECTION_NAME,
                    source,
                })?;
            Ok(entities)
        })
    }

    fn delete_class(&self, id: Uuid) -> BoxFuture<'static, StorageResult<bool>> {
        let store = self.clone();
        Box::pin(async move {
            let classes = store.classes().await;
            let bookings = store.bookings().await;
            let waitlists = store.waitlists().await;
            let found = store
                .run_transaction("delete class", move |session| {
                    let classes = classes.clone();
                    let bookings = bookings.clone();
                    let waitlists = waitlists.clone();
                    Box::pin(async move {
                        let result = classes
                            .delete_one(doc_id(id))
                            .session(&mut *session)
                            .await?;
                        bookings
                            .delete_many(doc! {"class_id": uuid_as_binary(id)})
                            .session(&mut *session)
                            .await?;
                        waitlists
                            .delete_many(doc! {"class_id": uuid_as_binary(id)})
                            .session(&mut *session)
                            .await?;
                        Ok(result.deleted_count > 0)
                    })
                })
                .await?;
            Ok(found)
        })
    }

    fn create_booking(
        &self,
        class_id: Uuid,
        user_id: String,
        now: OffsetDateTime,
    ) -> BoxFuture<'static, StorageResult<CreateBookingOutcome>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .create_booking(class_id, user_id, now)
                .await
                .map_err(Into::into)
        })
    }

    fn create_manual_bookings(
        &self,
        class_id: Uuid,
        user_ids: Vec<String>,
        now: OffsetDateTime,
    ) -> BoxFuture<'static, StorageResult<ManualBookingsOutcome>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .create_manual_bookings(class_id, user_ids, now)
                .await
                .map_err(Into::into)
        })
    }

    fn find_booking(
        &self,
        class_id: Uuid,
        user_id: String,
    ) -> BoxFuture<'static, StorageResult<Option<BookingEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            let bookings = store.bookings().await;
            let document = bookings
                .find_one(doc! {"_id": booking_doc_id(class_id, &user_id)})
                .await
                .map_err(|source| MongoDaoError::Query {
                    op: "find booking",
                    source,
                })?;
            Ok(document
                .map(TryInto::try_into)
                .transpose()
                .map_err(|source| MongoDaoError::Corrupt {
                    collection: BOOKING_COLLECTION_NAME,
                    source,
                })?)
        })
    }

    fn cancel_booking(
        &self,
        class_id: Uuid,
        user_id: String,
        now: OffsetDateTime,
        rules: CancellationRules,
    ) -> BoxFuture<'static, StorageResult<CancelBookingOutcome>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .cancel_booking(class_id, user_id, now, rules)
                .await
                .map_err(Into::into)
        })
    }

    fn store_task_handles(
        &self,
        class_id: Uuid,
        user_id: String,
        handles: Vec<String>,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            let bookings = store.bookings().await;
            bookings
                .update_one(
                    doc! {"_id": booking_doc_id(class_id, &user_id)},
                    doc! {"$set": {"reminder_tasks": handles}},
                )
                .await
                .map_err(|source| MongoDaoError::Query {
                    op: "store task handles",
                    source,
                })?;
            Ok(())
        })
    }

    fn join_waitlist(
        &self,
        class_id: Uuid,
        user_id: String,
        now: OffsetDateTime,
    ) -> BoxFuture<'static, StorageResult<JoinWaitlistOutcome>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .join_waitlist(class_id, user_id, now)
                .await
                .map_err(Into::into)
        })
    }

    fn find_waitlist_entry(
        &self,
        entry_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Option<WaitlistEntryEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            let waitlists = store.waitlists().await;
            let document = waitlists
                .find_one(doc_id(entry_id))
                .await
                .map_err(|source| MongoDaoError::Query {
                    op: "find waitlist entry",
                    source,
                })?;
            Ok(document
                .map(TryInto::try_into)
                .transpose()
                .map_err(|source| MongoDaoError::Corrupt {
                    collection: WAITLIST_COLLECTION_NAME,
                    source,
                })?)
        })
    }

    fn class_waitlist(
        &self,
        class_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Vec<WaitlistEntryEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            let waitlists = store.waitlists().await;
            let query_err = |source| MongoDaoError::Query {
                op: "list class waitlist",
                source,
            };
            let documents: Vec<WaitlistDocument> = waitlists
                .find(doc! {"class_id": uuid_as_binary(class_id)})
                .sort(doc! {"position": 1})
                .await
                .map_err(query_err)?
                .try_collect()
                .await
                .map_err(query_err)?;
            let entities = documents
                .into_iter()
                .map(TryInto::try_into)
                .collect::<Result<Vec<_>, _>>()
                .map_err(|source| MongoDaoError::Corrupt {
                    collection: WAITLIST_COLLECTION_NAME,
                    source,
                })?;
            Ok(entities)
        })
    }

    fn waitlist_candidates(
        &self,
        class_id: Uuid,
        now: OffsetDateTime,
        lookahead: u32,
    ) -> BoxFuture<'static, StorageResult<Vec<WaitlistEntryEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            let waitlists = store.waitlists().await;
            let query_err = |source| MongoDaoError::Query {
                op: "waitlist candidates",
                source,
            };
            let mut cursor = waitlists
                .find(doc! {"class_id": uuid_as_binary(class_id)})
                .sort(doc! {"position": 1})
                .limit(i64::from(lookahead))
                .await
                .map_err(query_err)?;

            let mut candidates = Vec::new();
            while let Some(document) = cursor.try_next().await.map_err(query_err)? {
                let notified = document.notified_at_ms.and_then(|ms| from_millis(ms).ok());
                let expires = document.expires_at_ms.and_then(|ms| from_millis(ms).ok());
                if waitlist::is_promotable(notified, expires, now) {
                    let entity =
                        document
                            .try_into()
                            .map_err(|source| MongoDaoError::Corrupt {
                                collection: WAITLIST_COLLECTION_NAME,
                                source,
                            })?;
                    candidates.push(entity);
                }
            }
            Ok(candidates)
        })
    }

    fn place_seat_hold(
        &self,
        entry_id: Uuid,
        notified_at: OffsetDateTime,
        expires_at: OffsetDateTime,
    ) -> BoxFuture<'static, StorageResult<bool>> {
        let store = self.clone();
        Box::pin(async move {
            let waitlists = store.waitlists().await;
            let classes = store.classes().await;
            let query_err = |source| MongoDaoError::Query {
                op: "place seat hold",
                source,
            };

            let Some(entry) = waitlists
                .find_one_and_update(
                    doc_id(entry_id),
                    doc! {"$set": {
                        "notified_at_ms": millis(notified_at),
                        "expires_at_ms": millis(expires_at),
                    }},
                )
                .return_document(ReturnDocument::After)
                .await
                .map_err(query_err)?
            else {
                return Ok(false);
            };

            classes
                .update_one(
                    doc_id(entry.class_id),
                    doc! {"$set": {"hold": {
                        "user_id": &entry.user_id,
                        "entry_id": uuid_as_binary(entry_id),
                        "expires_at_ms": millis(expires_at),
                    }}},
                )
                .await
                .map_err(query_err)?;
            Ok(true)
        })
    }

    fn remove_waitlist_entry(
        &self,
        entry_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Option<WaitlistEntryEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.remove_entry_by(doc_id(entry_id)).await.map_err(Into::into) })
    }

    fn remove_user_waitlist_entry(
        &self,
        class_id: Uuid,
        user_id: String,
    ) -> BoxFuture<'static, StorageResult<Option<WaitlistEntryEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .remove_entry_by(doc! {
                    "class_id": uuid_as_binary(class_id),
                    "user_id": user_id,
                })
                .await
                .map_err(Into::into)
        })
    }

    fn clear_class_hold_if_matches(
        &self,
        class_id: Uuid,
        entry_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<bool>> {
        let store = self.clone();
        Box::pin(async move {
            let classes = store.classes().await;
            let result = classes
                .update_one(
                    doc! {
                        "_id": uuid_as_binary(class_id),
                        "hold.entry_id": uuid_as_binary(entry_id),
                    },
                    doc! {"$unset": {"hold": ""}},
                )
                .await
                .map_err(|source| MongoDaoError::Query {
                    op: "clear class hold",
                    source,
                })?;
            Ok(result.modified_count > 0)
        })
    }

    fn record_attendance(
        &self,
        record: AttendanceEntity,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            let attendance = store.attendance().await;
            let document = AttendanceDocument::from(record);
            attendance
                .replace_one(doc! {"_id": &document.id}, &document)
                .upsert(true)
                .await
                .map_err(|source| MongoDaoError::Query {
                    op: "record attendance",
                    source,
                })?;
            Ok(())
        })
    }

    fn find_user(&self, id: String) -> BoxFuture<'static, StorageResult<Option<UserEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            let users = store.users().await;
            let document = users
                .find_one(doc! {"_id": &id})
                .await
                .map_err(|source| MongoDaoError::Query {
                    op: "find user",
                    source,
                })?;
            Ok(document
                .map(TryInto::try_into)
                .transpose()
                .map_err(|source| MongoDaoError::Corrupt {
                    collection: USER_COLLECTION_NAME,
                    source,
                })?)
        })
    }

    fn upsert_user(&self, user: UserEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            let users = store.users().await;
            let document = UserDocument::from(user);
            users
                .replace_one(doc! {"_id": &document.id}, &document)
                .upsert(true)
                .await
                .map_err(|source| MongoDaoError::Query {
                    op: "upsert user",
                    source,
                })?;
            Ok(())
        })
    }

    fn list_admins(&self) -> BoxFuture<'static, StorageResult<Vec<UserEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            let users = store.users().await;
            let query_err = |source| MongoDaoError::Query {
                op: "list admins",
                source,
            };
            let documents: Vec<UserDocument> = users
                .find(doc! {"is_admin": true})
                .sort(doc! {"_id": 1})
                .await
                .map_err(query_err)?
                .try_collect()
                .await
                .map_err(query_err)?;
            let entities = documents
                .into_iter()
                .map(TryInto::try_into)
                .collect::<Result<Vec<_>, _>>()
                .map_err(|source| MongoDaoError::Corrupt {
                    collection: USER_COLLECTION_NAME,
                    source,
                })?;
            Ok(entities)
        })
    }

    fn reset_strikes(
        &self,
        batch_size: u32,
    ) -> BoxFuture<'static, StorageResult<StrikeResetOutcome>> {
        let store = self.clone();
        Box::pin(async move { store.reset_strikes(batch_size).await.map_err(Into::into) })
    }

    fn clear_strikes(
        &self,
        user_id: String,
    ) -> BoxFuture<'static, StorageResult<WhitelistOutcome>> {
        let store = self.clone();
        Box::pin(async move {
            let users = store.users().await;
            let before = users
                .find_one_and_update(
                    doc! {"_id": &user_id},
                    doc! {"$set": {
                        "late_cancellations": 0,
                        "blacklisted": false,
                        "blacklisted_at_ms": Bson::Null,
                    }},
                )
                .return_document(ReturnDocument::Before)
                .await
                .map_err(|source| MongoDaoError::Query {
                    op: "clear strikes",
                    source,
                })?;

            let Some(before) = before else {
                return Ok(WhitelistOutcome::UserNotFound);
            };
            let effect = AmnestyEffect {
                had_strikes: before.late_cancellations != 0,
                was_blacklisted: before.blacklisted,
            };
            let mut user: UserEntity =
                before
                    .try_into()
                    .map_err(|source| MongoDaoError::Corrupt {
                        collection: USER_COLLECTION_NAME,
                        source,
                    })?;
            user.strikes = StrikeRecord::default();
            Ok(WhitelistOutcome::Cleared { user, effect })
        })
    }

    fn prune_token(&self, token: String) -> BoxFuture<'static, StorageResult<u64>> {
        let store = self.clone();
        Box::pin(async move {
            let users = store.users().await;
            let result = users
                .update_many(
                    doc! {"fcm_tokens": &token},
                    doc! {"$pull": {"fcm_tokens": &token}},
                )
                .await
                .map_err(|source| MongoDaoError::Query {
                    op: "prune token",
                    source,
                })?;
            Ok(result.modified_count)
        })
    }

    fn record_notification(
        &self,
        log: NotificationLogEntity,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            let notifications = store.notifications().await;
            notifications
                .insert_one(NotificationDocument::from(log))
                .await
                .map_err(|source| MongoDaoError::Query {
                    op: "record notification",
                    source,
                })?;
            Ok(())
        })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.inner.ping().await.map_err(Into::into) })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.inner.reconnect().await.map_err(Into::into) })
    }
}
