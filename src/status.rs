//! Pipeline status resolver: one overview item in, one status per stage out.
//!
//! Pure derivation, no I/O. The layered precedence for the ID stage exists
//! because the same fact (identity verified) is recorded in three places
//! that can disagree after partial writes or retried checks: the
//! instruction stage marker, the legacy result field on the instruction,
//! and the EID records. The most authoritative signal wins; later rules
//! apply only when earlier ones are silent.

use crate::types::{
    DocsStatus, IdStatus, MatterStatus, OverviewItem, PaymentStatus, RiskStatus,
    StageStatusSet,
};

/// Stage marker meaning proof-of-id has been completed by the client.
pub const STAGE_POID_COMPLETE: &str = "proof-of-id-complete";

/// Stage markers meaning the engagement is already instructed. An item in
/// one of these stages can never present an ID status of pending.
const INSTRUCTED_STAGES: &[&str] = &["instructed", "completed"];

/// EID overall results that count as a clean pass.
const ACCEPTED_EID_RESULTS: &[&str] = &["passed", "approved", "verified", "pass"];

/// Risk results that count as a clean pass.
const ACCEPTED_RISK_RESULTS: &[&str] = &["low", "low risk", "pass", "approved"];

/// Derive the full status set for one item.
pub fn resolve_statuses(item: &OverviewItem) -> StageStatusSet {
    StageStatusSet {
        id: resolve_id_status(item),
        payment: resolve_payment_status(item),
        risk: resolve_risk_status(item),
        matter: resolve_matter_status(item),
        documents: resolve_docs_status(item),
    }
}

/// The authoritative EID overall result for an item: the most recent EID
/// record's, falling back to the legacy field stored on the instruction.
fn eid_overall_result(item: &OverviewItem) -> Option<String> {
    let from_record = item
        .latest_eid()
        .and_then(|e| e.eid_overall_result.as_deref())
        .map(str::trim)
        .filter(|s| !s.is_empty());
    let from_legacy = item
        .instruction
        .as_ref()
        .and_then(|i| i.eid_overall_result.as_deref())
        .map(str::trim)
        .filter(|s| !s.is_empty());
    from_record.or(from_legacy).map(|s| s.to_lowercase())
}

fn is_accepted_eid(result: Option<&str>) -> bool {
    result.is_some_and(|r| ACCEPTED_EID_RESULTS.contains(&r))
}

fn resolve_id_status(item: &OverviewItem) -> IdStatus {
    let stage = item
        .instruction
        .as_ref()
        .map(|i| i.stage_normalized())
        .unwrap_or_default();
    let overall = eid_overall_result(item);
    let latest = item.latest_eid();

    let status = if stage == STAGE_POID_COMPLETE {
        // The stage marker says the client finished the ID step. Without a
        // clean pass this must read review, never pending: a completed step
        // with a failed or missing check needs a human.
        if is_accepted_eid(overall.as_deref()) {
            IdStatus::Complete
        } else {
            IdStatus::Review
        }
    } else if latest.is_none() || latest_status_is_pending(item) {
        // No authoritative check yet. Raw proof-of-id on file plus at least
        // one attempt in flight reads as received.
        let has_poid = item
            .instruction
            .as_ref()
            .is_some_and(|i| i.has_proof_of_id_fields());
        if has_poid && !item.id_verifications.is_empty() {
            IdStatus::Received
        } else {
            IdStatus::Pending
        }
    } else if is_accepted_eid(overall.as_deref()) {
        IdStatus::Complete
    } else {
        IdStatus::Review
    };

    // Safety net: an instructed engagement can never present as
    // not-yet-started.
    if status == IdStatus::Pending && INSTRUCTED_STAGES.contains(&stage.as_str()) {
        IdStatus::Review
    } else {
        status
    }
}

fn latest_status_is_pending(item: &OverviewItem) -> bool {
    item.latest_eid()
        .and_then(|e| e.eid_status.as_deref())
        .is_some_and(|s| s.trim().eq_ignore_ascii_case("pending"))
}

fn resolve_payment_status(item: &OverviewItem) -> PaymentStatus {
    let internal_flag = item
        .instruction
        .as_ref()
        .and_then(|i| i.internal_status.as_deref())
        .is_some_and(|s| s.trim().eq_ignore_ascii_case("paid"));
    if internal_flag {
        return PaymentStatus::Complete;
    }

    // Most recent payment first (list is reverse-chronological upstream).
    let Some(latest) = item.payments().first() else {
        return PaymentStatus::Pending;
    };

    let internal = lower(latest.internal_status.as_deref());
    if internal == "completed" || internal == "paid" {
        return PaymentStatus::Complete;
    }
    if lower(latest.payment_status.as_deref()) == "processing" {
        return PaymentStatus::Processing;
    }
    PaymentStatus::Pending
}

fn resolve_risk_status(item: &OverviewItem) -> RiskStatus {
    let result = item
        .risk
        .as_ref()
        .and_then(|r| r.risk_assessment_result.as_deref())
        .map(str::trim)
        .filter(|s| !s.is_empty());
    match result {
        None => RiskStatus::Pending,
        Some(r) if ACCEPTED_RISK_RESULTS.contains(&r.to_lowercase().as_str()) => {
            RiskStatus::Complete
        }
        Some(_) => RiskStatus::Flagged,
    }
}

fn resolve_matter_status(item: &OverviewItem) -> MatterStatus {
    let opened = item.instruction.as_ref().is_some_and(|i| {
        i.matter_id
            .as_deref()
            .is_some_and(|m| !m.trim().is_empty())
            || !i.matters.is_empty()
    });
    if opened {
        MatterStatus::Complete
    } else {
        MatterStatus::Pending
    }
}

fn resolve_docs_status(item: &OverviewItem) -> DocsStatus {
    if item.documents.is_empty() {
        DocsStatus::Neutral
    } else {
        DocsStatus::Complete
    }
}

fn lower(value: Option<&str>) -> String {
    value.unwrap_or_default().trim().to_lowercase()
}
