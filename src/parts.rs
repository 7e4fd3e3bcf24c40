//! Parts/service requests that block completion while open
use sled::Tree;

use crate::error::EngineError;
use crate::order::TimeStamp;
use crate::utils;

pub const PARTS_TREE: &str = "parts_requests";

/// Read side used by the status engine before completing an order.
pub trait PartsRequestQueue: Send + Sync {
    fn pending_count(&self, order_id: &str) -> anyhow::Result<u32>;
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestState {
    #[n(0)]
    Pending,
    #[n(1)]
    Approved,
    #[n(2)]
    Rejected,
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq, Eq)]
pub struct PartsRequest {
    #[n(0)]
    pub id: String,
    #[n(1)]
    pub order_id: String,
    #[n(2)]
    pub description: String,
    #[n(3)]
    pub requested_by: String,
    #[n(4)]
    pub state: RequestState,
    #[n(5)]
    pub created_at: TimeStamp,
    #[n(6)]
    pub resolved_at: Option<TimeStamp>,
}

/// Requests stored under `<order_id>/<request_id>` so one order's requests
/// form a contiguous prefix.
#[derive(Clone)]
pub struct SledPartsRequests {
    tree: Tree,
}

impl SledPartsRequests {
    pub fn open(db: &sled::Db) -> Result<Self, EngineError> {
        Ok(Self {
            tree: db.open_tree(PARTS_TREE)?,
        })
    }

    pub fn open_request(
        &self,
        order_id: &str,
        requested_by: &str,
        description: &str,
    ) -> anyhow::Result<PartsRequest> {
        let request = PartsRequest {
            id: utils::new_bech32_id("parts_")?,
            order_id: order_id.to_string(),
            description: description.to_string(),
            requested_by: requested_by.to_string(),
            state: RequestState::Pending,
            created_at: TimeStamp::now(),
            resolved_at: None,
        };
        self.tree
            .insert(key(order_id, &request.id), minicbor::to_vec(&request)?)?;
        tracing::info!(order_id, request_id = %request.id, "parts request opened");

        Ok(request)
    }

    pub fn resolve(
        &self,
        order_id: &str,
        request_id: &str,
        state: RequestState,
    ) -> anyhow::Result<PartsRequest> {
        anyhow::ensure!(
            state != RequestState::Pending,
            "a request can only be resolved to approved or rejected"
        );
        let k = key(order_id, request_id);
        let bytes = self
            .tree
            .get(&k)?
            .ok_or_else(|| anyhow::anyhow!("parts request {request_id} not found"))?;

        let mut request: PartsRequest = minicbor::decode(&bytes)?;
        anyhow::ensure!(
            request.state == RequestState::Pending,
            "parts request {request_id} already resolved"
        );
        request.state = state;
        request.resolved_at = Some(TimeStamp::now());
        self.tree.insert(k, minicbor::to_vec(&request)?)?;
        tracing::info!(order_id, request_id, state = ?state, "parts request resolved");

        Ok(request)
    }

    pub fn for_order(&self, order_id: &str) -> anyhow::Result<Vec<PartsRequest>> {
        let mut out = vec![];
        for entry in self.tree.scan_prefix(format!("{order_id}/")) {
            let (_, value) = entry?;
            out.push(minicbor::decode(&value)?);
        }
        Ok(out)
    }
}

impl PartsRequestQueue for SledPartsRequests {
    fn pending_count(&self, order_id: &str) -> anyhow::Result<u32> {
        let pending = self
            .for_order(order_id)?
            .iter()
            .filter(|r| r.state == RequestState::Pending)
            .count();
        Ok(u32::try_from(pending)?)
    }
}

fn key(order_id: &str, request_id: &str) -> String {
    format!("{order_id}/{request_id}")
}
