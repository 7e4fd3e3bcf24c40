//! Review routing by recommended total.
//!
//! The tier only picks who is told a proposal needs looking at. It never
//! decides who may approve; see [`crate::auth`].
use std::fmt;

use crate::config::TierThresholds;
use crate::order::Role;

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ApprovalTier {
    #[n(0)]
    AutoApproveRecommended,
    #[n(1)]
    AdminReview,
    #[n(2)]
    SuperAdminReview,
    #[n(3)]
    Unknown,
}

pub fn classify(total: Option<u64>, thresholds: &TierThresholds) -> ApprovalTier {
    match total {
        None => ApprovalTier::Unknown,
        Some(t) if t < thresholds.auto_approve_below => ApprovalTier::AutoApproveRecommended,
        Some(t) if t <= thresholds.super_admin_above => ApprovalTier::AdminReview,
        Some(_) => ApprovalTier::SuperAdminReview,
    }
}

impl ApprovalTier {
    /// Role that receives the routing notification, if any.
    pub fn review_role(self) -> Option<Role> {
        match self {
            ApprovalTier::AutoApproveRecommended | ApprovalTier::AdminReview => Some(Role::Admin),
            ApprovalTier::SuperAdminReview => Some(Role::SuperAdmin),
            ApprovalTier::Unknown => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ApprovalTier::AutoApproveRecommended => "auto_approve_recommended",
            ApprovalTier::AdminReview => "admin_review",
            ApprovalTier::SuperAdminReview => "super_admin_review",
            ApprovalTier::Unknown => "unknown",
        }
    }
}

impl fmt::Display for ApprovalTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
