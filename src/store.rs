use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

use chrono::NaiveDate;
use serde_json::{Map, Value};
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};

use crate::{
    gateway::{Collection, Gateway},
    model::{
        Dinner, DinnerPatch, FamilyMember, MealRequest, NewPantryItem, PantryItem,
        PantryItemPatch, RequestStatus, Vote, MEMBERS_NOT_FOUND, MEMBERS_NOTIFICATIONS_OFF,
        MEMBERS_NO_EMAIL, PANTRY_NOT_FOUND, PANTRY_NO_LOW_STOCK, REQUESTS_INVALID_REF,
        REQUESTS_NOT_FOUND, VOTES_DUPLICATE,
    },
    notify::{templates, NotificationPort},
    time::{convert_to_12_hour, format_date_key, format_long_date},
    AppError, AppResult,
};

// TODO: make the low-stock recipient a household setting instead of a name
// literal.
const LOW_STOCK_RECIPIENT: &str = "Shingo";

/// In-memory mirror of the five collections plus the domain operations.
///
/// Mutations go to the gateway; the mirror itself is refreshed by the
/// change-feed watchers (or an explicit `load_all`), so an operation's own
/// writes become visible only after the corresponding notification lands.
/// The last copy selected from the store always wins.
pub struct KitchenStore {
    gateway: Arc<Gateway>,
    notifier: Arc<dyn NotificationPort>,
    family_members: RwLock<Vec<FamilyMember>>,
    dinners: RwLock<Vec<Dinner>>,
    requests: RwLock<Vec<MealRequest>>,
    pantry_items: RwLock<Vec<PantryItem>>,
    votes: RwLock<Vec<Vote>>,
    loading: AtomicBool,
}

impl KitchenStore {
    pub fn new(gateway: Arc<Gateway>, notifier: Arc<dyn NotificationPort>) -> Arc<Self> {
        Arc::new(KitchenStore {
            gateway,
            notifier,
            family_members: RwLock::new(Vec::new()),
            dinners: RwLock::new(Vec::new()),
            requests: RwLock::new(Vec::new()),
            pantry_items: RwLock::new(Vec::new()),
            votes: RwLock::new(Vec::new()),
            loading: AtomicBool::new(false),
        })
    }

    pub fn gateway(&self) -> &Gateway {
        &self.gateway
    }

    pub fn loading(&self) -> bool {
        self.loading.load(Ordering::SeqCst)
    }

    pub fn family_members(&self) -> Vec<FamilyMember> {
        self.family_members.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn dinners(&self) -> Vec<Dinner> {
        self.dinners.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn requests(&self) -> Vec<MealRequest> {
        self.requests.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn pantry_items(&self) -> Vec<PantryItem> {
        self.pantry_items.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn votes(&self) -> Vec<Vote> {
        self.votes.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Re-select every collection. Individual failures keep the previous
    /// copy of that collection, matching the refresh-on-notification path.
    pub async fn load_all(&self) {
        self.loading.store(true, Ordering::SeqCst);
        for collection in Collection::ALL {
            if let Err(err) = self.refresh(*collection).await {
                warn!(
                    target: "kitchenhub",
                    area = "store",
                    collection = collection.table(),
                    error = %err,
                    "load_failed"
                );
            }
        }
        self.loading.store(false, Ordering::SeqCst);
    }

    /// Full re-select of one collection, replacing the in-memory copy.
    pub async fn refresh(&self, collection: Collection) -> AppResult<()> {
        match collection {
            Collection::FamilyMembers => {
                let rows = self.gateway.select_family_members().await?;
                *self.family_members.write().unwrap_or_else(|e| e.into_inner()) = rows;
            }
            Collection::Dinners => {
                let rows = self.gateway.select_dinners().await?;
                *self.dinners.write().unwrap_or_else(|e| e.into_inner()) = rows;
            }
            Collection::Requests => {
                let rows = self.gateway.select_requests().await?;
                *self.requests.write().unwrap_or_else(|e| e.into_inner()) = rows;
            }
            Collection::PantryItems => {
                let rows = self.gateway.select_pantry_items().await?;
                *self.pantry_items.write().unwrap_or_else(|e| e.into_inner()) = rows;
            }
            Collection::Votes => {
                let rows = self.gateway.select_votes().await?;
                *self.votes.write().unwrap_or_else(|e| e.into_inner()) = rows;
            }
        }
        Ok(())
    }

    /// Start one watcher task per collection: each change notification
    /// triggers a full re-select. A lagged receiver just re-selects; the
    /// next copy from the store wins either way.
    pub fn spawn_watchers(self: &Arc<Self>) {
        for collection in Collection::ALL {
            let store = Arc::clone(self);
            let mut rx = store.gateway.subscribe(*collection);
            let collection = *collection;
            tokio::spawn(async move {
                loop {
                    match rx.recv().await {
                        Ok(()) | Err(RecvError::Lagged(_)) => {
                            if let Err(err) = store.refresh(collection).await {
                                warn!(
                                    target: "kitchenhub",
                                    area = "store",
                                    collection = collection.table(),
                                    error = %err,
                                    "refresh_failed"
                                );
                            }
                        }
                        Err(RecvError::Closed) => break,
                    }
                }
            });
        }
    }

    /// Send one personalized email per opted-in member. Failures are logged
    /// and never fail the calling operation.
    async fn broadcast_to_members<F>(&self, subject: &str, build_body: F)
    where
        F: Fn(&FamilyMember) -> String,
    {
        let recipients: Vec<FamilyMember> = self
            .family_members()
            .into_iter()
            .filter(FamilyMember::email_opted_in)
            .collect();

        for member in recipients {
            let body = build_body(&member);
            if let Err(err) = self
                .notifier
                .send_email(&[member.email.clone()], subject, &body)
                .await
            {
                warn!(
                    target: "kitchenhub",
                    area = "notify",
                    member = %member.name,
                    error = %err,
                    "broadcast_email_failed"
                );
            }
        }
    }

    // ---- family members ----

    /// Presence of name/email is the caller's responsibility; this always
    /// opts the new member into email notifications.
    pub async fn add_family_member(
        &self,
        name: &str,
        email: &str,
        phone: Option<&str>,
        preferences: Option<&str>,
    ) -> AppResult<FamilyMember> {
        let mut data = Map::new();
        data.insert("name".into(), Value::from(name));
        data.insert("email".into(), Value::from(email));
        data.insert("phone".into(), phone.map(Value::from).unwrap_or(Value::Null));
        data.insert(
            "preferences".into(),
            preferences.map(Value::from).unwrap_or(Value::Null),
        );
        data.insert("email_notifications".into(), Value::from(true));

        let created = self.gateway.insert(Collection::FamilyMembers, data).await?;
        let member: FamilyMember = serde_json::from_value(created)?;
        info!(target: "kitchenhub", area = "members", member = %member.name, "member_added");
        Ok(member)
    }

    /// Unconditional. Dinners, requests and votes that reference the member
    /// by name keep their snapshots.
    pub async fn delete_family_member(&self, id: &str) -> AppResult<()> {
        self.gateway.delete(Collection::FamilyMembers, id).await
    }

    // ---- dinners ----

    pub async fn add_dinner(
        &self,
        date: NaiveDate,
        meal: &str,
        chef_name: &str,
        time: &str,
        notes: Option<&str>,
    ) -> AppResult<Dinner> {
        let mut data = Map::new();
        data.insert("date".into(), Value::from(format_date_key(date)));
        data.insert("meal".into(), Value::from(meal));
        data.insert("chef".into(), Value::from(chef_name));
        data.insert("time".into(), Value::from(convert_to_12_hour(time)));
        data.insert("notes".into(), notes.map(Value::from).unwrap_or(Value::Null));

        let created = self.gateway.insert(Collection::Dinners, data).await?;
        Ok(serde_json::from_value(created)?)
    }

    pub async fn edit_dinner(&self, id: &str, patch: DinnerPatch) -> AppResult<()> {
        let mut data = Map::new();
        if let Some(date) = patch.date {
            data.insert("date".into(), Value::from(date));
        }
        if let Some(meal) = patch.meal {
            data.insert("meal".into(), Value::from(meal));
        }
        if let Some(chef) = patch.chef {
            data.insert("chef".into(), Value::from(chef));
        }
        if let Some(time) = patch.time {
            data.insert("time".into(), Value::from(convert_to_12_hour(&time)));
        }
        if let Some(notes) = patch.notes {
            data.insert("notes".into(), Value::from(notes));
        }
        if data.is_empty() {
            return Ok(());
        }
        self.gateway.update(Collection::Dinners, id, data).await
    }

    pub async fn delete_dinner(&self, id: &str) -> AppResult<()> {
        self.gateway.delete(Collection::Dinners, id).await
    }

    // ---- requests ----

    /// Creates the request and then announces it to every opted-in member.
    /// The announcement is best-effort.
    pub async fn add_request(&self, meal: &str, requestor_name: &str) -> AppResult<MealRequest> {
        let mut data = Map::new();
        data.insert("meal".into(), Value::from(meal));
        data.insert("requested_by".into(), Value::from(requestor_name));
        data.insert("status".into(), Value::from(RequestStatus::Pending.as_str()));
        data.insert("votes".into(), Value::from(0));

        let created = self.gateway.insert(Collection::Requests, data).await?;
        let request: MealRequest = serde_json::from_value(created)?;

        self.broadcast_to_members(&templates::new_request_subject(meal), |member| {
            templates::new_request_body(&member.name, requestor_name, meal)
        })
        .await;

        info!(
            target: "kitchenhub",
            area = "requests",
            meal = %request.meal,
            requested_by = %request.requested_by,
            "request_added"
        );
        Ok(request)
    }

    /// Promote a pending request onto the dinner schedule.
    ///
    /// Resolves the request and chef from the current in-memory copies, so a
    /// stale mirror can miss rows another client just wrote. The dinner
    /// insert short-circuits with its own error; afterwards the request
    /// update's result is what gets reported, while the chef email/SMS are
    /// attempted regardless and only logged.
    pub async fn schedule_request(
        &self,
        request_id: &str,
        date: NaiveDate,
        chef_id: &str,
        time: &str,
    ) -> AppResult<()> {
        let request = self.requests().into_iter().find(|r| r.id == request_id);
        let chef = self.family_members().into_iter().find(|m| m.id == chef_id);
        let (Some(request), Some(chef)) = (request, chef) else {
            return Err(AppError::new(REQUESTS_INVALID_REF, "Invalid request or chef")
                .with_context("request_id", request_id.to_string())
                .with_context("chef_id", chef_id.to_string()));
        };

        let canonical_time = convert_to_12_hour(time);
        let mut dinner = Map::new();
        dinner.insert("date".into(), Value::from(format_date_key(date)));
        dinner.insert("meal".into(), Value::from(request.meal.clone()));
        dinner.insert("chef".into(), Value::from(chef.name.clone()));
        dinner.insert("time".into(), Value::from(canonical_time.clone()));
        self.gateway.insert(Collection::Dinners, dinner).await?;

        let mut status = Map::new();
        status.insert(
            "status".into(),
            Value::from(RequestStatus::Scheduled.as_str()),
        );
        let request_result = self
            .gateway
            .update(Collection::Requests, request_id, status)
            .await;

        let date_label = format_long_date(date);
        if chef.email_opted_in() {
            if let Err(err) = self
                .notifier
                .send_email(
                    &[chef.email.clone()],
                    &templates::chef_subject(&request.meal),
                    &templates::chef_body(&chef.name, &request.meal, &date_label, &canonical_time),
                )
                .await
            {
                warn!(
                    target: "kitchenhub",
                    area = "notify",
                    chef = %chef.name,
                    error = %err,
                    "chef_email_failed"
                );
            }
        }
        match &chef.phone {
            Some(phone) if !phone.is_empty() && chef.sms_opted_in() => {
                if let Err(err) = self
                    .notifier
                    .send_sms(
                        phone,
                        &templates::chef_sms(&request.meal, &date_label, &canonical_time),
                    )
                    .await
                {
                    warn!(
                        target: "kitchenhub",
                        area = "notify",
                        chef = %chef.name,
                        error = %err,
                        "chef_sms_failed"
                    );
                }
            }
            _ => {}
        }

        request_result
    }

    /// Scheduled requests are demoted back to pending (their dinner stays on
    /// the schedule); pending requests are removed outright.
    pub async fn delete_request(&self, request_id: &str) -> AppResult<()> {
        let Some(request) = self.requests().into_iter().find(|r| r.id == request_id) else {
            return Err(AppError::new(REQUESTS_NOT_FOUND, "Request not found")
                .with_context("request_id", request_id.to_string()));
        };

        if request.status == RequestStatus::Scheduled {
            let mut status = Map::new();
            status.insert("status".into(), Value::from(RequestStatus::Pending.as_str()));
            self.gateway
                .update(Collection::Requests, request_id, status)
                .await
        } else {
            self.gateway.delete(Collection::Requests, request_id).await
        }
    }

    /// One vote per member per request, checked against the in-memory votes
    /// before writing. The denormalized count is recomputed the same way, so
    /// concurrent voters can still race each other.
    pub async fn vote_on_request(&self, request_id: &str, voter_name: &str) -> AppResult<()> {
        let matching = {
            let votes = self.votes.read().unwrap_or_else(|e| e.into_inner());
            if votes
                .iter()
                .any(|v| v.request_id == request_id && v.voter_name == voter_name)
            {
                return Err(AppError::new(
                    VOTES_DUPLICATE,
                    format!("{voter_name} has already voted for this meal!"),
                )
                .with_context("request_id", request_id.to_string()));
            }
            votes.iter().filter(|v| v.request_id == request_id).count() as i64
        };

        let mut vote = Map::new();
        vote.insert("request_id".into(), Value::from(request_id));
        vote.insert("voter_name".into(), Value::from(voter_name));
        self.gateway.insert(Collection::Votes, vote).await?;

        let mut count = Map::new();
        count.insert("votes".into(), Value::from(matching + 1));
        self.gateway
            .update(Collection::Requests, request_id, count)
            .await
    }

    /// Email the member who created the request. Unlike the broadcasts this
    /// is a direct send, so a dispatch failure is the caller's result.
    pub async fn message_request_creator(
        &self,
        request: &MealRequest,
        sender_name: &str,
        message: &str,
    ) -> AppResult<()> {
        let Some(creator) = self
            .family_members()
            .into_iter()
            .find(|m| m.name == request.requested_by)
        else {
            return Err(AppError::new(
                MEMBERS_NOT_FOUND,
                format!("Could not find {} in family members.", request.requested_by),
            ));
        };
        if creator.email.is_empty() {
            return Err(AppError::new(
                MEMBERS_NO_EMAIL,
                format!("{} does not have an email address set up.", creator.name),
            ));
        }
        if !creator.email_notifications {
            return Err(AppError::new(
                MEMBERS_NOTIFICATIONS_OFF,
                format!("{} has email notifications disabled.", creator.name),
            ));
        }

        self.notifier
            .send_email(
                &[creator.email.clone()],
                &templates::message_subject(&request.meal),
                &templates::message_body(&creator.name, sender_name, &request.meal, message),
            )
            .await?;
        Ok(())
    }

    // ---- pantry ----

    /// Any caller-supplied id is dropped so the store assigns one, and the
    /// item always starts in stock. A `(name, source)` collision comes back
    /// as the distinct pantry conflict.
    pub async fn add_pantry_item(&self, input: NewPantryItem) -> AppResult<PantryItem> {
        let mut data = Map::new();
        data.insert("name".into(), Value::from(input.name));
        data.insert("quantity".into(), Value::from(input.quantity));
        data.insert("category".into(), Value::from(input.category.as_str()));
        data.insert("source".into(), Value::from(input.source.as_str()));
        data.insert(
            "notes".into(),
            input.notes.map(Value::from).unwrap_or(Value::Null),
        );
        data.insert("low_stock".into(), Value::from(false));

        let created = self.gateway.insert(Collection::PantryItems, data).await?;
        Ok(serde_json::from_value(created)?)
    }

    pub async fn edit_pantry_item(&self, id: &str, patch: PantryItemPatch) -> AppResult<()> {
        let mut data = Map::new();
        if let Some(name) = patch.name {
            data.insert("name".into(), Value::from(name));
        }
        if let Some(quantity) = patch.quantity {
            data.insert("quantity".into(), Value::from(quantity));
        }
        if let Some(category) = patch.category {
            data.insert("category".into(), Value::from(category.as_str()));
        }
        if let Some(source) = patch.source {
            data.insert("source".into(), Value::from(source.as_str()));
        }
        if let Some(notes) = patch.notes {
            data.insert("notes".into(), Value::from(notes));
        }
        if data.is_empty() {
            return Ok(());
        }
        self.gateway.update(Collection::PantryItems, id, data).await
    }

    pub async fn delete_pantry_item(&self, id: &str) -> AppResult<()> {
        self.gateway.delete(Collection::PantryItems, id).await
    }

    /// Flip the low-stock flag; returns the new value. Going low additionally
    /// alerts the designated member, silently.
    pub async fn toggle_low_stock(&self, id: &str) -> AppResult<bool> {
        let Some(item) = self.pantry_items().into_iter().find(|i| i.id == id) else {
            return Err(AppError::new(PANTRY_NOT_FOUND, "Item not found")
                .with_context("id", id.to_string()));
        };

        let new_status = !item.low_stock;
        let mut data = Map::new();
        data.insert("low_stock".into(), Value::from(new_status));
        self.gateway.update(Collection::PantryItems, id, data).await?;

        if new_status {
            let recipient = self
                .family_members()
                .into_iter()
                .find(|m| m.name == LOW_STOCK_RECIPIENT);
            if let Some(recipient) = recipient.filter(FamilyMember::email_opted_in) {
                debug!(
                    target: "kitchenhub",
                    area = "pantry",
                    item = %item.name,
                    "low_stock_alert"
                );
                if let Err(err) = self
                    .notifier
                    .send_email(
                        &[recipient.email.clone()],
                        &templates::low_stock_subject(&item.name),
                        &templates::low_stock_body(&recipient.name, &item),
                    )
                    .await
                {
                    warn!(
                        target: "kitchenhub",
                        area = "notify",
                        item = %item.name,
                        error = %err,
                        "low_stock_email_failed"
                    );
                }
            }
        }

        Ok(new_status)
    }

    /// Mail the current low-stock list to each given address. Errors if
    /// nothing is marked low.
    pub async fn send_shopping_list(&self, target_emails: &[String]) -> AppResult<()> {
        let low_stock: Vec<PantryItem> = self
            .pantry_items()
            .into_iter()
            .filter(|i| i.low_stock)
            .collect();
        if low_stock.is_empty() {
            return Err(AppError::new(
                PANTRY_NO_LOW_STOCK,
                "No pantry items are marked low stock.",
            ));
        }

        let subject = templates::shopping_list_subject();
        let body = templates::shopping_list_body(&low_stock);
        for email in target_emails {
            self.notifier
                .send_email(&[email.clone()], &subject, &body)
                .await?;
        }
        Ok(())
    }
}
