use serde::{Deserialize, Serialize};

pub const MEMBERS_NOT_FOUND: &str = "MEMBERS/NOT_FOUND";
pub const MEMBERS_NO_EMAIL: &str = "MEMBERS/NO_EMAIL";
pub const MEMBERS_NOTIFICATIONS_OFF: &str = "MEMBERS/NOTIFICATIONS_OFF";
pub const REQUESTS_INVALID_REF: &str = "REQUESTS/INVALID_REF";
pub const REQUESTS_NOT_FOUND: &str = "REQUESTS/NOT_FOUND";
pub const VOTES_DUPLICATE: &str = "VOTES/DUPLICATE";
pub const PANTRY_DUPLICATE: &str = "PANTRY/DUPLICATE";
pub const PANTRY_NOT_FOUND: &str = "PANTRY/NOT_FOUND";
pub const PANTRY_NO_LOW_STOCK: &str = "PANTRY/NO_LOW_STOCK";
pub const STORE_DECODE_ERROR: &str = "STORE/DECODE";

/// Fixed palette of display tags a member card can carry.
pub const MEMBER_COLORS: &[&str] = &["red", "orange", "amber", "green", "teal", "blue", "purple"];

/// A household participant with contact info and notification preferences.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FamilyMember {
    pub id: String,
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub preferences: Option<String>,
    pub email_notifications: bool,
    /// Absent means opted in; only an explicit `false` opts out.
    #[serde(default)]
    pub sms_notifications: Option<bool>,
    #[serde(default)]
    pub color: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl FamilyMember {
    pub fn email_opted_in(&self) -> bool {
        self.email_notifications && !self.email.is_empty()
    }

    pub fn sms_opted_in(&self) -> bool {
        self.sms_notifications.unwrap_or(true)
    }
}

/// A scheduled meal on a specific date with an assigned cook.
///
/// `chef` is a name snapshot copied from a member at creation time, not a
/// foreign key; renaming or deleting the member leaves it as-is.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dinner {
    pub id: String,
    /// `YYYY-MM-DD` key.
    pub date: String,
    pub meal: String,
    pub chef: String,
    /// 12-hour `H:MM AM/PM`, canonicalized on write.
    pub time: String,
    #[serde(default)]
    pub notes: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestStatus {
    Pending,
    Scheduled,
}

impl RequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestStatus::Pending => "pending",
            RequestStatus::Scheduled => "scheduled",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(RequestStatus::Pending),
            "scheduled" => Some(RequestStatus::Scheduled),
            _ => None,
        }
    }
}

/// A suggested meal awaiting scheduling, subject to voting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MealRequest {
    pub id: String,
    pub meal: String,
    /// Name snapshot of the requesting member.
    pub requested_by: String,
    pub status: RequestStatus,
    /// Denormalized count maintained by the store; the vote rows are the
    /// source of truth.
    pub votes: i64,
    pub created_at: i64,
    pub updated_at: i64,
}

/// One member's endorsement of a request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Vote {
    pub id: String,
    pub request_id: String,
    pub voter_name: String,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PantryCategory {
    Freezer,
    Fridge,
    Produce,
    #[default]
    Pantry,
    Spices,
}

impl PantryCategory {
    pub const ALL: &'static [PantryCategory] = &[
        PantryCategory::Freezer,
        PantryCategory::Fridge,
        PantryCategory::Produce,
        PantryCategory::Pantry,
        PantryCategory::Spices,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PantryCategory::Freezer => "freezer",
            PantryCategory::Fridge => "fridge",
            PantryCategory::Produce => "produce",
            PantryCategory::Pantry => "pantry",
            PantryCategory::Spices => "spices",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "freezer" => Some(PantryCategory::Freezer),
            "fridge" => Some(PantryCategory::Fridge),
            "produce" => Some(PantryCategory::Produce),
            "pantry" => Some(PantryCategory::Pantry),
            "spices" => Some(PantryCategory::Spices),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            PantryCategory::Freezer => "Freezer",
            PantryCategory::Fridge => "Fridge",
            PantryCategory::Produce => "Produce",
            PantryCategory::Pantry => "Pantry",
            PantryCategory::Spices => "Spices",
        }
    }

    pub fn emoji(&self) -> &'static str {
        match self {
            PantryCategory::Freezer => "\u{2744}\u{fe0f}",
            PantryCategory::Fridge => "\u{1f9ca}",
            PantryCategory::Produce => "\u{1f96c}",
            PantryCategory::Pantry => "\u{1f96b}",
            PantryCategory::Spices => "\u{1f336}\u{fe0f}",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PantrySource {
    Costco,
    #[default]
    Other,
}

impl PantrySource {
    pub fn as_str(&self) -> &'static str {
        match self {
            PantrySource::Costco => "costco",
            PantrySource::Other => "other",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "costco" => Some(PantrySource::Costco),
            "other" => Some(PantrySource::Other),
            _ => None,
        }
    }
}

/// A tracked household supply with a stock-level flag.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PantryItem {
    pub id: String,
    pub name: String,
    /// Free text, e.g. "2 bags"; never parsed as a number.
    pub quantity: String,
    pub category: PantryCategory,
    pub source: PantrySource,
    pub low_stock: bool,
    #[serde(default)]
    pub notes: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Input for creating a pantry item. Any incoming id is discarded so the
/// store assigns one, and `low_stock` always starts false.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewPantryItem {
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
    pub quantity: String,
    #[serde(default)]
    pub category: PantryCategory,
    #[serde(default)]
    pub source: PantrySource,
    #[serde(default)]
    pub notes: Option<String>,
}

/// Partial update for a dinner; unset fields are left untouched.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DinnerPatch {
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub meal: Option<String>,
    #[serde(default)]
    pub chef: Option<String>,
    #[serde(default)]
    pub time: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

/// Partial update for a pantry item.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PantryItemPatch {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub quantity: Option<String>,
    #[serde(default)]
    pub category: Option<PantryCategory>,
    #[serde(default)]
    pub source: Option<PantrySource>,
    #[serde(default)]
    pub notes: Option<String>,
}
