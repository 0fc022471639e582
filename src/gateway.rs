use std::collections::HashMap;

use serde_json::{Map, Value};
use sqlx::{sqlite::SqliteRow, Error as SqlxError, Row, SqlitePool};
use tokio::sync::broadcast;

use crate::{
    id::new_uuid_v7,
    model::{
        Dinner, FamilyMember, MealRequest, PantryCategory, PantryItem, PantrySource,
        RequestStatus, Vote, PANTRY_DUPLICATE, STORE_DECODE_ERROR,
    },
    time::now_ms,
    AppError, AppResult,
};

/// The five domain collections the store mirrors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    FamilyMembers,
    Dinners,
    Requests,
    PantryItems,
    Votes,
}

impl Collection {
    pub const ALL: &'static [Collection] = &[
        Collection::FamilyMembers,
        Collection::Dinners,
        Collection::Requests,
        Collection::PantryItems,
        Collection::Votes,
    ];

    pub fn table(&self) -> &'static str {
        match self {
            Collection::FamilyMembers => "family_members",
            Collection::Dinners => "dinners",
            Collection::Requests => "requests",
            Collection::PantryItems => "pantry_items",
            Collection::Votes => "votes",
        }
    }
}

/// Gateway to the backing store: CRUD over the domain tables plus a
/// payload-free change feed per collection. Consumers are expected to
/// re-select the whole collection on every notification rather than apply
/// diffs.
pub struct Gateway {
    pool: SqlitePool,
    changes: HashMap<Collection, broadcast::Sender<()>>,
}

impl Gateway {
    pub fn new(pool: SqlitePool) -> Self {
        let mut changes = HashMap::new();
        for collection in Collection::ALL {
            let (tx, _) = broadcast::channel(32);
            changes.insert(*collection, tx);
        }
        Gateway { pool, changes }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Subscribe to change notifications for one collection. The event
    /// carries no payload; callers re-select.
    pub fn subscribe(&self, collection: Collection) -> broadcast::Receiver<()> {
        self.changes[&collection].subscribe()
    }

    fn notify(&self, collection: Collection) {
        // send only fails when nobody is listening, which is fine
        let _ = self.changes[&collection].send(());
    }

    /// Insert a record, assigning an id and timestamps when absent.
    /// Returns the record as written.
    pub async fn insert(
        &self,
        collection: Collection,
        mut data: Map<String, Value>,
    ) -> AppResult<Value> {
        let id = data
            .get("id")
            .and_then(|v| v.as_str())
            .map(|s| s.to_string())
            .unwrap_or_else(new_uuid_v7);
        data.insert("id".into(), Value::String(id));
        let now = now_ms();
        data.entry(String::from("created_at"))
            .or_insert(Value::from(now));
        data.insert("updated_at".into(), Value::from(now));

        let cols: Vec<String> = data.keys().cloned().collect();
        let placeholders: Vec<String> = cols.iter().map(|_| "?".into()).collect();
        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            collection.table(),
            cols.join(","),
            placeholders.join(",")
        );
        let mut query = sqlx::query(&sql);
        for c in &cols {
            let value = data.get(c).ok_or_else(|| {
                AppError::new("GATEWAY/MISSING_FIELD", "Payload missing value for column")
                    .with_context("column", c.clone())
            })?;
            query = bind_value(query, value);
        }
        query
            .execute(&self.pool)
            .await
            .map_err(|err| map_insert_error(collection, err, &data))?;

        self.notify(collection);
        Ok(Value::Object(data))
    }

    /// Partial update by id. Absent columns are left untouched.
    pub async fn update(
        &self,
        collection: Collection,
        id: &str,
        mut data: Map<String, Value>,
    ) -> AppResult<()> {
        data.remove("id");
        data.remove("created_at");
        data.insert("updated_at".into(), Value::from(now_ms()));

        let cols: Vec<String> = data.keys().cloned().collect();
        let set_clause: Vec<String> = cols.iter().map(|c| format!("{c} = ?")).collect();
        let sql = format!(
            "UPDATE {} SET {} WHERE id = ?",
            collection.table(),
            set_clause.join(",")
        );
        let mut query = sqlx::query(&sql);
        for c in &cols {
            let value = data.get(c).ok_or_else(|| {
                AppError::new("GATEWAY/MISSING_FIELD", "Payload missing value for column")
                    .with_context("column", c.clone())
            })?;
            query = bind_value(query, value);
        }
        query
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(AppError::from)?;

        self.notify(collection);
        Ok(())
    }

    pub async fn delete(&self, collection: Collection, id: &str) -> AppResult<()> {
        let sql = format!("DELETE FROM {} WHERE id = ?", collection.table());
        sqlx::query(&sql)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(AppError::from)?;

        self.notify(collection);
        Ok(())
    }

    pub async fn select_family_members(&self) -> AppResult<Vec<FamilyMember>> {
        let rows = sqlx::query(
            "SELECT id, name, email, phone, preferences, email_notifications, \
             sms_notifications, color, created_at, updated_at \
             FROM family_members ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(AppError::from)?;
        rows.into_iter().map(deserialize_member).collect()
    }

    pub async fn select_dinners(&self) -> AppResult<Vec<Dinner>> {
        let rows = sqlx::query(
            "SELECT id, date, meal, chef, time, notes, created_at, updated_at \
             FROM dinners ORDER BY date",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(AppError::from)?;
        rows.into_iter().map(deserialize_dinner).collect()
    }

    pub async fn select_requests(&self) -> AppResult<Vec<MealRequest>> {
        let rows = sqlx::query(
            "SELECT id, meal, requested_by, status, votes, created_at, updated_at \
             FROM requests ORDER BY created_at DESC, id DESC",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(AppError::from)?;
        rows.into_iter().map(deserialize_request).collect()
    }

    pub async fn select_pantry_items(&self) -> AppResult<Vec<PantryItem>> {
        let rows = sqlx::query(
            "SELECT id, name, quantity, category, source, low_stock, notes, \
             created_at, updated_at \
             FROM pantry_items ORDER BY name",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(AppError::from)?;
        rows.into_iter().map(deserialize_pantry_item).collect()
    }

    pub async fn select_votes(&self) -> AppResult<Vec<Vote>> {
        let rows = sqlx::query(
            "SELECT id, request_id, voter_name, created_at, updated_at FROM votes",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(AppError::from)?;
        rows.into_iter().map(deserialize_vote).collect()
    }
}

fn bind_value<'q>(
    q: sqlx::query::Query<'q, sqlx::Sqlite, sqlx::sqlite::SqliteArguments<'q>>,
    v: &Value,
) -> sqlx::query::Query<'q, sqlx::Sqlite, sqlx::sqlite::SqliteArguments<'q>> {
    match v {
        Value::Null => q.bind(Option::<i64>::None),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                q.bind(i)
            } else if let Some(f) = n.as_f64() {
                q.bind(f)
            } else {
                q.bind(Option::<i64>::None)
            }
        }
        Value::Bool(b) => q.bind(*b as i64),
        Value::String(s) => q.bind(s.clone()),
        _ => q.bind(v.to_string()),
    }
}

fn map_insert_error(collection: Collection, err: SqlxError, data: &Map<String, Value>) -> AppError {
    if collection == Collection::PantryItems {
        if let SqlxError::Database(db) = &err {
            if db.is_unique_violation() {
                let name = data.get("name").and_then(|v| v.as_str()).unwrap_or("");
                let source = data.get("source").and_then(|v| v.as_str()).unwrap_or("");
                return AppError::new(
                    PANTRY_DUPLICATE,
                    "An item with that name already exists for this source.",
                )
                .with_context("name", name.to_string())
                .with_context("source", source.to_string());
            }
        }
    }
    err.into()
}

fn decode_error(entity: &'static str, field: &'static str, value: &str) -> AppError {
    AppError::new(STORE_DECODE_ERROR, format!("Invalid {entity} {field}"))
        .with_context("value", value.to_string())
}

fn deserialize_member(row: SqliteRow) -> AppResult<FamilyMember> {
    let email_notifications: i64 = row.get("email_notifications");
    let sms_notifications: Option<i64> = row.try_get("sms_notifications").ok().flatten();

    Ok(FamilyMember {
        id: row.get("id"),
        name: row.get("name"),
        email: row.get("email"),
        phone: row.try_get("phone").ok().flatten(),
        preferences: row.try_get("preferences").ok().flatten(),
        email_notifications: email_notifications != 0,
        sms_notifications: sms_notifications.map(|v| v != 0),
        color: row.try_get("color").ok().flatten(),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

fn deserialize_dinner(row: SqliteRow) -> AppResult<Dinner> {
    Ok(Dinner {
        id: row.get("id"),
        date: row.get("date"),
        meal: row.get("meal"),
        chef: row.get("chef"),
        time: row.get("time"),
        notes: row.try_get("notes").ok().flatten(),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

fn deserialize_request(row: SqliteRow) -> AppResult<MealRequest> {
    let status_str: String = row.get("status");
    let status = RequestStatus::parse(&status_str)
        .ok_or_else(|| decode_error("request", "status", &status_str))?;

    Ok(MealRequest {
        id: row.get("id"),
        meal: row.get("meal"),
        requested_by: row.get("requested_by"),
        status,
        votes: row.get("votes"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

fn deserialize_pantry_item(row: SqliteRow) -> AppResult<PantryItem> {
    let category_str: String = row.get("category");
    let category = PantryCategory::parse(&category_str)
        .ok_or_else(|| decode_error("pantry item", "category", &category_str))?;
    let source_str: String = row.get("source");
    let source = PantrySource::parse(&source_str)
        .ok_or_else(|| decode_error("pantry item", "source", &source_str))?;
    let low_stock: i64 = row.get("low_stock");

    Ok(PantryItem {
        id: row.get("id"),
        name: row.get("name"),
        quantity: row.get("quantity"),
        category,
        source,
        low_stock: low_stock != 0,
        notes: row.try_get("notes").ok().flatten(),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

fn deserialize_vote(row: SqliteRow) -> AppResult<Vote> {
    Ok(Vote {
        id: row.get("id"),
        request_id: row.get("request_id"),
        voter_name: row.get("voter_name"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}
