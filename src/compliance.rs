//! Risk/compliance grouper: a compliance-focused view distinct from the
//! main overview. Groups risk and EID records by instruction reference
//! and enriches each group's client list.
//!
//! Upstream compliance exports arrive as one mixed, loosely-typed list;
//! records are bucketed into "risk" vs "ID verification" by the presence
//! of EID-specific marker fields. A record with no marker defaults to
//! the risk bucket.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::types::{ClientName, IdVerification, OverviewItem, RiskAssessment};
use crate::util::normalize_match_key;

/// Field names that mark a raw record as an ID verification.
const EID_MARKER_FIELDS: &[&str] = &[
    "CheckId",
    "EIDStatus",
    "EIDCheckedDate",
    "EIDOverallResult",
];

/// Postal address carried by the enriched record set.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Address {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub house_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub street: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub county: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub postcode: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
}

/// One entry of the identity resolver's enriched record set, keyed by
/// normalized email.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrichedClient {
    #[serde(default)]
    pub name: ClientName,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<Address>,
}

/// A lead or joint client on a group's instruction, with the most recent
/// email-matched verification attached.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupClient {
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub is_lead: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<Address>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latest_verification: Option<IdVerification>,
}

/// All compliance records for one instruction reference.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ComplianceGroup {
    pub instruction_ref: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub risk_assessments: Vec<RiskAssessment>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub id_verifications: Vec<IdVerification>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub clients: Vec<GroupClient>,
}

/// Bucket a mixed raw record list into risk vs ID-verification records by
/// marker-field presence. Records that deserialize to neither shape are
/// dropped with a debug log.
pub fn classify_records(
    records: &[serde_json::Value],
) -> (Vec<RiskAssessment>, Vec<IdVerification>) {
    let mut risks = Vec::new();
    let mut eids = Vec::new();

    for record in records {
        let is_eid = EID_MARKER_FIELDS
            .iter()
            .any(|f| record.get(f).is_some_and(|v| !v.is_null()));
        if is_eid {
            match serde_json::from_value::<IdVerification>(record.clone()) {
                Ok(eid) => eids.push(eid),
                Err(e) => log::debug!("Dropping unreadable EID record: {}", e),
            }
        } else {
            match serde_json::from_value::<RiskAssessment>(record.clone()) {
                Ok(risk) => risks.push(risk),
                Err(e) => log::debug!("Dropping unreadable risk record: {}", e),
            }
        }
    }
    (risks, eids)
}

/// Group the overview set's compliance records by instruction reference.
///
/// `reference_filter` narrows to one instruction; `enriched` backfills
/// client names and addresses when the instruction's own fields are
/// absent. Pitches carry no compliance records and are skipped.
pub fn group_by_instruction(
    items: &[OverviewItem],
    reference_filter: Option<&str>,
    enriched: &HashMap<String, EnrichedClient>,
) -> Vec<ComplianceGroup> {
    let wanted = reference_filter.map(normalize_match_key);
    let mut groups = Vec::new();

    for item in items {
        let Some(instruction) = item.instruction.as_ref() else {
            continue;
        };
        let Some(reference) = instruction
            .instruction_ref
            .as_deref()
            .map(str::trim)
            .filter(|r| !r.is_empty())
        else {
            continue;
        };
        if let Some(ref w) = wanted {
            if normalize_match_key(reference) != *w {
                continue;
            }
        }

        let risk_assessments: Vec<RiskAssessment> = item.risk.clone().into_iter().collect();
        let id_verifications = item.id_verifications.clone();
        let clients = build_clients(item, &id_verifications, enriched);

        groups.push(ComplianceGroup {
            instruction_ref: reference.to_string(),
            risk_assessments,
            id_verifications,
            clients,
        });
    }

    groups
}

/// Lead client first, then joint clients, each with the most recent
/// email-matched EID and any enrichment backfill.
fn build_clients(
    item: &OverviewItem,
    eids: &[IdVerification],
    enriched: &HashMap<String, EnrichedClient>,
) -> Vec<GroupClient> {
    let mut clients = Vec::new();

    if let Some(instruction) = item.instruction.as_ref() {
        if let Some(email) = instruction.email.as_deref().filter(|e| !e.trim().is_empty()) {
            clients.push(make_client(
                email,
                instruction.first_name.as_deref().unwrap_or_default(),
                instruction.last_name.as_deref().unwrap_or_default(),
                true,
                eids,
                enriched,
            ));
        }
    }

    for joint in &item.joint_clients {
        if let Some(email) = joint.client_email.as_deref().filter(|e| !e.trim().is_empty()) {
            clients.push(make_client(
                email,
                joint.first_name.as_deref().unwrap_or_default(),
                joint.last_name.as_deref().unwrap_or_default(),
                false,
                eids,
                enriched,
            ));
        }
    }

    clients
}

fn make_client(
    email: &str,
    first_name: &str,
    last_name: &str,
    is_lead: bool,
    eids: &[IdVerification],
    enriched: &HashMap<String, EnrichedClient>,
) -> GroupClient {
    let enrichment = enriched.get(&normalize_match_key(email));

    // Name fields backfill from enrichment only when absent on the record.
    let (mut first, mut last) = (first_name.trim().to_string(), last_name.trim().to_string());
    if first.is_empty() && last.is_empty() {
        if let Some(e) = enrichment {
            first = e.name.first_name.clone();
            last = e.name.last_name.clone();
        }
    }

    GroupClient {
        email: email.to_string(),
        first_name: first,
        last_name: last,
        is_lead,
        address: enrichment.and_then(|e| e.address.clone()),
        latest_verification: latest_eid_for_email(eids, email).cloned(),
    }
}

/// Most recent verification matched by email, falling back to list order
/// when no matching record carries a parseable date.
fn latest_eid_for_email<'a>(
    eids: &'a [IdVerification],
    email: &str,
) -> Option<&'a IdVerification> {
    let key = normalize_match_key(email);
    let matching: Vec<&IdVerification> = eids
        .iter()
        .filter(|e| {
            e.client_email
                .as_deref()
                .is_some_and(|c| normalize_match_key(c) == key)
        })
        .collect();

    matching
        .iter()
        .filter(|e| e.checked_at().is_some())
        .max_by_key(|e| e.checked_at())
        .copied()
        .or_else(|| matching.first().copied())
}
