//! Fire-and-forget notification records consumed by badge/list UIs
use std::fmt;

use sled::Tree;

use crate::error::EngineError;
use crate::order::{Role, Status, TimeStamp};
use crate::tier::ApprovalTier;

pub const NOTIFICATIONS_TREE: &str = "notifications";

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationKind {
    #[n(0)]
    PricingProposed,
    #[n(1)]
    PricingReview(#[n(0)] ApprovalTier),
    #[n(2)]
    PricingApproved,
    #[n(3)]
    PricingRejected,
    #[n(4)]
    PricingCountered,
    #[n(5)]
    CounterReAccepted,
    #[n(6)]
    OrderAssigned,
    #[n(7)]
    OrderAccepted,
    #[n(8)]
    StatusChanged(#[n(0)] Status),
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq, Eq)]
pub enum Target {
    #[n(0)]
    Role(#[n(0)] Role),
    #[n(1)]
    User(#[n(0)] String),
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    #[n(0)]
    pub kind: NotificationKind,
    #[n(1)]
    pub title: String,
    #[n(2)]
    pub message: String,
    #[n(3)]
    pub target: Target,
    #[n(4)]
    pub order_id: String,
    #[n(5)]
    pub link: String,
    #[n(6)]
    pub created_at: TimeStamp,
}

/// Write-only delivery of notifications. There is no acknowledgement.
pub trait NotificationSink: Send + Sync {
    fn dispatch(&self, notification: &Notification) -> anyhow::Result<()>;
}

impl Notification {
    pub fn new(
        kind: NotificationKind,
        target: Target,
        order_id: &str,
        title: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            title: title.into(),
            message: message.into(),
            target,
            order_id: order_id.to_string(),
            link: format!("/orders/{order_id}"),
            created_at: TimeStamp::now(),
        }
    }

    /// CBOR encoding and its sha256 digest, used as the storage key.
    pub fn build(&self) -> Result<(String, Vec<u8>), EngineError> {
        let cbor = minicbor::to_vec(self)?;
        let hash = sha256::digest(&cbor);

        Ok((hash, cbor))
    }

    pub fn is_for_role(&self, role: Role) -> bool {
        self.target == Target::Role(role)
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Target::Role(role) => write!(f, "role:{role}"),
            Target::User(id) => write!(f, "user:{id}"),
        }
    }
}

/// Send every notification, logging and discarding failures. The state
/// change that produced them has already been committed.
pub fn dispatch_all(sink: &dyn NotificationSink, notifications: &[Notification]) {
    for n in notifications {
        match sink.dispatch(n) {
            Ok(()) => tracing::debug!(
                order_id = %n.order_id,
                target = %n.target,
                kind = ?n.kind,
                "notification dispatched"
            ),
            Err(e) => tracing::warn!(
                error = %e,
                order_id = %n.order_id,
                target = %n.target,
                "failed to dispatch notification"
            ),
        }
    }
}

/// Notifications persisted in a sled tree, keyed by content hash.
#[derive(Clone)]
pub struct SledNotificationLog {
    tree: Tree,
}

impl SledNotificationLog {
    pub fn open(db: &sled::Db) -> Result<Self, EngineError> {
        Ok(Self {
            tree: db.open_tree(NOTIFICATIONS_TREE)?,
        })
    }

    pub fn all(&self) -> Result<Vec<Notification>, EngineError> {
        let mut out = vec![];
        for entry in self.tree.iter() {
            let (_, value) = entry?;
            out.push(minicbor::decode(&value)?);
        }
        out.sort_by_key(|n: &Notification| n.created_at);
        Ok(out)
    }

    pub fn for_order(&self, order_id: &str) -> Result<Vec<Notification>, EngineError> {
        Ok(self
            .all()?
            .into_iter()
            .filter(|n| n.order_id == order_id)
            .collect())
    }

    pub fn for_target(&self, target: &Target) -> Result<Vec<Notification>, EngineError> {
        Ok(self
            .all()?
            .into_iter()
            .filter(|n| &n.target == target)
            .collect())
    }
}

impl NotificationSink for SledNotificationLog {
    fn dispatch(&self, notification: &Notification) -> anyhow::Result<()> {
        let (hash, cbor) = notification.build()?;
        self.tree.insert(hash.as_bytes(), cbor)?;
        Ok(())
    }
}
