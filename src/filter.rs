//! Filter/search compositor over the reconciled overview set.
//!
//! All filter dimensions are optional and combine by logical AND: an item
//! survives only if it independently satisfies every active dimension.
//! The per-stage dimension supports drill-downs like "ID = review AND
//! risk = pending".

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::config::EngineConfig;
use crate::status::resolve_statuses;
use crate::types::{
    DocsStatus, IdStatus, MatterStatus, NextAction, OverviewItem, OverviewRow,
    PaymentStatus, RiskStatus, StageStatusSet,
};

/// Area-filter sentinel matching any area that is empty or not one of the
/// configured canonical areas.
pub const AREA_OTHER: &str = "other";

/// Per-stage allowed-status sets. A `None` stage is unconstrained; a
/// `Some` stage passes only items whose status is a member.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StageFilter {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<HashSet<IdStatus>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment: Option<HashSet<PaymentStatus>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub risk: Option<HashSet<RiskStatus>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub matter: Option<HashSet<MatterStatus>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub documents: Option<HashSet<DocsStatus>>,
}

impl StageFilter {
    fn matches(&self, status: &StageStatusSet) -> bool {
        fn stage_ok<T: Eq + std::hash::Hash>(allowed: &Option<HashSet<T>>, value: &T) -> bool {
            allowed.as_ref().map_or(true, |set| set.contains(value))
        }
        stage_ok(&self.id, &status.id)
            && stage_ok(&self.payment, &status.payment)
            && stage_ok(&self.risk, &status.risk)
            && stage_ok(&self.matter, &status.matter)
            && stage_ok(&self.documents, &status.documents)
    }
}

/// Active filter specification, as sent by the dashboard.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterSpec {
    /// Keep only items whose derived next action equals this.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<NextAction>,
    /// Case-insensitive substring over client full name, company name,
    /// instruction reference, and email.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search: Option<String>,
    #[serde(default)]
    pub stages: StageFilter,
    /// Allowed areas of work (lowercased), possibly including the
    /// [`AREA_OTHER`] sentinel.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub areas: Option<HashSet<String>>,
}

impl FilterSpec {
    /// True if `row` satisfies every active dimension.
    pub fn matches(&self, row: &OverviewRow, config: &EngineConfig) -> bool {
        if let Some(action) = self.action {
            if row.next_action != action {
                return false;
            }
        }

        if let Some(ref term) = self.search {
            let needle = term.trim().to_lowercase();
            if !needle.is_empty() && !search_haystack(&row.item).contains(&needle) {
                return false;
            }
        }

        if !self.stages.matches(&row.status) {
            return false;
        }

        if let Some(ref areas) = self.areas {
            if !area_matches(areas, &row.item, config) {
                return false;
            }
        }

        true
    }

    /// Filter a row set down to the matching subset.
    pub fn apply(&self, rows: Vec<OverviewRow>, config: &EngineConfig) -> Vec<OverviewRow> {
        rows.into_iter()
            .filter(|row| self.matches(row, config))
            .collect()
    }
}

/// Lowercased searchable text for one item.
fn search_haystack(item: &OverviewItem) -> String {
    let mut parts: Vec<&str> = Vec::new();
    if let Some(ref instruction) = item.instruction {
        parts.extend(instruction.first_name.as_deref());
        parts.extend(instruction.last_name.as_deref());
        parts.extend(instruction.name.as_deref());
        parts.extend(instruction.company_name.as_deref());
        parts.extend(instruction.instruction_ref.as_deref());
        parts.extend(instruction.email.as_deref());
    }
    if let Some(ref deal) = item.deal {
        parts.extend(deal.instruction_ref.as_deref());
        parts.extend(deal.lead_client_email.as_deref());
        parts.extend(deal.service_description.as_deref());
    }
    parts.join(" ").to_lowercase()
}

fn area_matches(allowed: &HashSet<String>, item: &OverviewItem, config: &EngineConfig) -> bool {
    let area = item
        .instruction
        .as_ref()
        .and_then(|i| i.area_of_work.as_deref())
        .or_else(|| item.deal.as_ref().and_then(|d| d.area_of_work.as_deref()))
        .unwrap_or_default()
        .trim()
        .to_lowercase();

    if allowed.contains(&area) {
        return true;
    }
    // The sentinel catches everything outside the canonical list,
    // including a missing area.
    allowed.contains(AREA_OTHER) && (area.is_empty() || !config.is_known_area(&area))
}

// =============================================================================
// Next action
// =============================================================================

/// Derive the single highest-priority incomplete stage. First matching
/// rule wins.
pub fn next_action(item: &OverviewItem, status: &StageStatusSet) -> NextAction {
    if status.id != IdStatus::Complete {
        return NextAction::VerifyId;
    }
    if status.risk == RiskStatus::Pending {
        return NextAction::AssessRisk;
    }
    if status.matter == MatterStatus::Pending && status.payment == PaymentStatus::Complete {
        return NextAction::OpenMatter;
    }
    let ccl_submitted = item
        .instruction
        .as_ref()
        .and_then(|i| i.ccl_submitted)
        .unwrap_or(false);
    if status.matter == MatterStatus::Complete && !ccl_submitted {
        return NextAction::DraftCcl;
    }
    NextAction::Complete
}

/// Compose items with their derived status set and next action: the rows
/// the compositor filters and presentation renders.
pub fn build_rows(items: Vec<OverviewItem>) -> Vec<OverviewRow> {
    items
        .into_iter()
        .map(|item| {
            let status = resolve_statuses(&item);
            let action = next_action(&item, &status);
            OverviewRow {
                item,
                status,
                next_action: action,
            }
        })
        .collect()
}
