//! Core order record, its enums and the timestamp wrapper
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, TimeZone, Utc};

use crate::error::EngineError;
use crate::pricing::PricingInput;
use crate::tier::ApprovalTier;

#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Clone, Copy)]
pub struct TimeStamp(DateTime<Utc>);

impl TimeStamp {
    pub fn now() -> Self {
        Self(Utc::now())
    }
    pub fn from_ymd_hms(
        year: i32,
        month: u32,
        day: u32,
        hour: u32,
        min: u32,
        sec: u32,
    ) -> Option<Self> {
        Utc.with_ymd_and_hms(year, month, day, hour, min, sec)
            .single()
            .map(Self)
    }
    pub fn plus_hours(&self, hours: i64) -> Self {
        Self(self.0 + Duration::hours(hours))
    }
    pub fn to_datetime_utc(&self) -> DateTime<Utc> {
        self.0
    }
}

impl From<DateTime<Utc>> for TimeStamp {
    fn from(value: DateTime<Utc>) -> Self {
        TimeStamp(value)
    }
}

impl<C> minicbor::Encode<C> for TimeStamp {
    fn encode<W: minicbor::encode::Write>(
        &self,
        e: &mut minicbor::Encoder<W>,
        _: &mut C,
    ) -> Result<(), minicbor::encode::Error<W::Error>> {
        if let Some(nsec) = self.0.timestamp_nanos_opt() {
            return e.i64(nsec)?.ok();
        }

        Err(minicbor::encode::Error::message(
            "timestamp is outside the nanosecond-representable range",
        ))
    }
}

impl<'b, C> minicbor::Decode<'b, C> for TimeStamp {
    fn decode(d: &mut minicbor::Decoder<'b>, _: &mut C) -> Result<Self, minicbor::decode::Error> {
        let nsecs = d.i64()?;

        Ok(TimeStamp(DateTime::from_timestamp_nanos(nsecs)))
    }
}

// Enums below are stored by CBOR index; an unknown index fails to decode
// instead of falling back to a default.

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    #[n(0)]
    Admin,
    #[n(1)]
    Technician,
    #[n(2)]
    Customer,
    #[n(3)]
    SuperAdmin,
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Status {
    #[n(0)]
    Pending,
    #[n(1)]
    Assigned,
    #[n(2)]
    Accepted,
    #[n(3)]
    InProgress,
    #[n(4)]
    WaitingParts,
    #[n(5)]
    Completed,
    #[n(6)]
    Delivered,
    #[n(7)]
    Cancelled,
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PricingStatus {
    #[n(0)]
    None,
    #[n(1)]
    Proposed,
    #[n(2)]
    Countered,
    #[n(3)]
    ReAccepted,
    #[n(4)]
    Approved,
    #[n(5)]
    Rejected,
}

impl Role {
    pub const ALL: [Role; 4] = [Role::Admin, Role::Technician, Role::Customer, Role::SuperAdmin];

    pub fn as_str(self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Technician => "technician",
            Role::Customer => "customer",
            Role::SuperAdmin => "super_admin",
        }
    }

    pub fn is_admin(self) -> bool {
        matches!(self, Role::Admin | Role::SuperAdmin)
    }
}

impl Status {
    pub const ALL: [Status; 8] = [
        Status::Pending,
        Status::Assigned,
        Status::Accepted,
        Status::InProgress,
        Status::WaitingParts,
        Status::Completed,
        Status::Delivered,
        Status::Cancelled,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Status::Pending => "pending",
            Status::Assigned => "assigned",
            Status::Accepted => "accepted",
            Status::InProgress => "in_progress",
            Status::WaitingParts => "waiting_parts",
            Status::Completed => "completed",
            Status::Delivered => "delivered",
            Status::Cancelled => "cancelled",
        }
    }

    // in_progress and waiting_parts share a stage so work can pause for parts and resume
    fn stage(self) -> u8 {
        match self {
            Status::Pending => 0,
            Status::Assigned => 1,
            Status::Accepted => 2,
            Status::InProgress | Status::WaitingParts => 3,
            Status::Completed => 4,
            Status::Delivered => 5,
            Status::Cancelled => 6,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Status::Delivered | Status::Cancelled)
    }

    /// Statuses at or past `in_progress`, all of which imply work was priced.
    pub fn needs_approved_pricing(self) -> bool {
        matches!(
            self,
            Status::InProgress | Status::WaitingParts | Status::Completed | Status::Delivered
        )
    }

    /// Forward-only ordering with `cancelled` reachable from every
    /// non-terminal status. Re-entering the current status is not a move.
    pub fn can_advance_to(self, next: Status) -> bool {
        if self.is_terminal() || self == next {
            return false;
        }
        next == Status::Cancelled || next.stage() >= self.stage()
    }
}

impl PricingStatus {
    pub const ALL: [PricingStatus; 6] = [
        PricingStatus::None,
        PricingStatus::Proposed,
        PricingStatus::Countered,
        PricingStatus::ReAccepted,
        PricingStatus::Approved,
        PricingStatus::Rejected,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            PricingStatus::None => "none",
            PricingStatus::Proposed => "proposed",
            PricingStatus::Countered => "countered",
            PricingStatus::ReAccepted => "re_accepted",
            PricingStatus::Approved => "approved",
            PricingStatus::Rejected => "rejected",
        }
    }

    /// The complete negotiation edge table.
    pub fn can_transition_to(self, next: PricingStatus) -> bool {
        use PricingStatus::*;
        matches!(
            (self, next),
            (None | Rejected | Countered, Proposed)
                | (Proposed, Approved | Rejected | Countered)
                | (Countered, ReAccepted)
                | (ReAccepted, Approved | Rejected)
        )
    }
}

macro_rules! string_enum {
    ($ty:ty, $label:literal) => {
        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $ty {
            type Err = EngineError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                <$ty>::ALL
                    .into_iter()
                    .find(|v| v.as_str() == s)
                    .ok_or_else(|| EngineError::InvalidInput(format!("unknown {} `{s}`", $label)))
            }
        }
    };
}

string_enum!(Role, "role");
string_enum!(Status, "status");
string_enum!(PricingStatus, "pricing status");

/// The authenticated caller of an engine operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    pub id: String,
    pub role: Role,
}

impl Actor {
    pub fn new(id: impl Into<String>, role: Role) -> Self {
        Self { id: id.into(), role }
    }
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq, Eq)]
pub struct Proposal {
    #[n(0)]
    pub pricing: PricingInput,
    #[n(1)]
    pub recommended_total: Option<u64>, // advisory until approval copies it
    #[n(2)]
    pub tier: ApprovalTier,
    #[n(3)]
    pub duration_minutes: u32,
    #[n(4)]
    pub arrival_eta: Option<TimeStamp>,
    #[n(5)]
    pub note: Option<String>,
    #[n(6)]
    pub media_urls: Vec<String>,
    #[n(7)]
    pub technician_id: String,
    #[n(8)]
    pub proposed_at: TimeStamp,
    #[n(9)]
    pub expires_at: TimeStamp,
}

impl Proposal {
    pub fn is_expired(&self, now: &TimeStamp) -> bool {
        *now > self.expires_at
    }
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq, Eq)]
pub struct CounterOffer {
    #[n(0)]
    pub price: u64,
    #[n(1)]
    pub duration_minutes: u32,
    #[n(2)]
    pub arrival_eta: Option<TimeStamp>,
    #[n(3)]
    pub admin_id: String,
    #[n(4)]
    pub countered_at: TimeStamp,
}

/// Which record the approved price was taken from.
#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Copy, PartialEq, Eq)]
pub enum PriceSource {
    #[n(0)]
    Proposal,
    #[n(1)]
    CounterOffer,
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq, Eq)]
pub struct Approval {
    #[n(0)]
    pub price: u64,
    #[n(1)]
    pub duration_minutes: u32,
    #[n(2)]
    pub arrival_eta: Option<TimeStamp>,
    #[n(3)]
    pub admin_id: String,
    #[n(4)]
    pub approved_at: TimeStamp,
    #[n(5)]
    pub source: PriceSource,
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq, Eq)]
pub struct HistoryEntry {
    #[n(0)]
    pub status: Status,
    #[n(1)]
    pub timestamp: TimeStamp,
    #[n(2)]
    pub note: Option<String>,
}

/// Intake data supplied when a customer books a repair.
#[derive(Debug, Clone, Default)]
pub struct NewOrder {
    pub customer_id: Option<String>,
    pub customer_name: String,
    pub device: String,
    pub issue: String,
    pub price: u64,
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq, Eq)]
pub struct Order {
    #[n(0)]
    pub id: String, // bech32 `order_` id
    #[n(1)]
    pub customer_id: Option<String>,
    #[n(2)]
    pub customer_name: String,
    #[n(3)]
    pub device: String,
    #[n(4)]
    pub issue: String,
    #[n(5)]
    pub price: u64, // intake quote, not the negotiated price
    #[n(6)]
    pub status: Status,
    #[n(7)]
    pub technician_id: Option<String>,
    #[n(8)]
    pub technician_name: Option<String>,
    #[n(9)]
    pub pricing_status: PricingStatus,
    #[n(10)]
    pub proposal: Option<Proposal>,
    #[n(11)]
    pub counter: Option<CounterOffer>,
    #[n(12)]
    pub approval: Option<Approval>,
    #[n(13)]
    pub approved_by_admin_id: Option<String>,
    #[n(14)]
    pub status_history: Vec<HistoryEntry>,
    #[n(15)]
    pub invoice_number: Option<String>,
    #[n(16)]
    pub created_at: TimeStamp,
    #[n(17)]
    pub updated_at: TimeStamp,
}

impl Order {
    pub fn new(id: String, intake: NewOrder, now: TimeStamp) -> Self {
        let mut order = Self {
            id,
            customer_id: intake.customer_id,
            customer_name: intake.customer_name,
            device: intake.device,
            issue: intake.issue,
            price: intake.price,
            status: Status::Pending,
            technician_id: None,
            technician_name: None,
            pricing_status: PricingStatus::None,
            proposal: None,
            counter: None,
            approval: None,
            approved_by_admin_id: None,
            status_history: vec![],
            invoice_number: None,
            created_at: now,
            updated_at: now,
        };
        order.record_status(Status::Pending, now, Some("Order created".into()));
        order
    }

    /// Set the status and append the matching history entry.
    pub fn record_status(&mut self, status: Status, now: TimeStamp, note: Option<String>) {
        self.status = status;
        self.status_history.push(HistoryEntry {
            status,
            timestamp: now,
            note,
        });
        self.updated_at = now;
    }

    pub fn is_assigned_to(&self, technician_id: &str) -> bool {
        self.technician_id.as_deref() == Some(technician_id)
    }

    pub fn approved_price(&self) -> Option<u64> {
        self.approval.as_ref().map(|a| a.price)
    }

    pub fn proposed_price(&self) -> Option<u64> {
        self.proposal.as_ref().and_then(|p| p.recommended_total)
    }
}
