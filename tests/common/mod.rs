#![allow(dead_code)]

use std::sync::Arc;

use repair_orders::{
    config::EngineConfig,
    notify::{Notification, NotificationKind, NotificationSink, SledNotificationLog},
    order::{Actor, NewOrder, Role},
    parts::SledPartsRequests,
    service::RepairService,
    utils,
};
use tempfile::{TempDir, tempdir};

/// Everything a scenario needs, backed by its own temporary sled database.
///
/// Sled locks its directory, so each test opens a separate one.
pub struct Harness {
    _dir: TempDir,
    pub service: RepairService,
    pub log: SledNotificationLog,
    pub parts: Arc<SledPartsRequests>,
    pub admin: Actor,
    pub super_admin: Actor,
    pub technician: Actor,
}

pub fn harness() -> anyhow::Result<Harness> {
    harness_with_sink(None)
}

/// Same as [`harness`] but routes notifications to `sink` instead of the log.
pub fn harness_with_sink(sink: Option<Arc<dyn NotificationSink>>) -> anyhow::Result<Harness> {
    let temp_dir = tempdir()?;
    let db = Arc::new(sled::open(temp_dir.path().join("repair.db"))?);

    let log = SledNotificationLog::open(&db)?;
    let parts = Arc::new(SledPartsRequests::open(&db)?);
    let notifier: Arc<dyn NotificationSink> = match sink {
        Some(sink) => sink,
        None => Arc::new(log.clone()),
    };
    let service = RepairService::new(db, EngineConfig::default(), notifier, parts.clone())?;

    Ok(Harness {
        _dir: temp_dir,
        service,
        log,
        parts,
        admin: Actor::new(utils::new_bech32_id("user_")?, Role::Admin),
        super_admin: Actor::new(utils::new_bech32_id("user_")?, Role::SuperAdmin),
        technician: Actor::new(utils::new_bech32_id("user_")?, Role::Technician),
    })
}

impl Harness {
    pub fn intake(&self) -> NewOrder {
        NewOrder {
            customer_id: Some("user_customer".into()),
            customer_name: "Dana Reyes".into(),
            device: "Laptop".into(),
            issue: "Cracked hinge".into(),
            price: 120,
        }
    }

    /// A pending order assigned to the harness technician.
    pub fn assigned_order(&self) -> anyhow::Result<String> {
        let order = self.service.create_order(self.intake())?;
        self.service
            .lifecycle()
            .assign(&order.id, &self.admin, &self.technician.id, "Sam Ortiz")?;
        Ok(order.id)
    }

    /// An order the harness technician has assigned and accepted.
    pub fn accepted_order(&self) -> anyhow::Result<String> {
        let id = self.assigned_order()?;
        self.service.lifecycle().accept_assigned(&id, &self.technician)?;
        Ok(id)
    }

    pub fn notifications_of(
        &self,
        order_id: &str,
        kind: NotificationKind,
    ) -> anyhow::Result<Vec<Notification>> {
        Ok(self
            .log
            .for_order(order_id)?
            .into_iter()
            .filter(|n| n.kind == kind)
            .collect())
    }
}
