//! Record normalizer: merges raw per-prospect collections into one
//! overview item per instruction reference (or per unconverted deal).
//!
//! The same fact arrives from up to three levels (prospect-scoped,
//! instruction-scoped, deal-embedded-instruction-scoped), so every child
//! collection is pooled across levels and deduplicated before it lands on
//! an item. The result map is first-occurrence-wins: a deal that appears
//! in more than one prospect's list is counted once, never merged.

use std::collections::HashSet;

use crate::types::{
    Deal, Document, IdVerification, Instruction, JointClient, OverviewItem, Prospect,
    ProspectId, RiskAssessment,
};
use crate::util::normalize_match_key;

/// Build the ordered overview list: converted instructions first, then
/// unlinked deals (pitches). Recomputed wholesale on every upstream
/// refresh; never mutated incrementally.
pub fn build_overview_items(prospects: &[Prospect]) -> Vec<OverviewItem> {
    let mut items: Vec<OverviewItem> = Vec::new();
    let mut instruction_keys: HashSet<String> = HashSet::new();
    let mut item_keys: HashSet<String> = HashSet::new();

    // Pass 1: one item per distinct instruction reference.
    for prospect in prospects {
        for instruction in &prospect.instructions {
            let Some(reference) = instruction
                .instruction_ref
                .as_deref()
                .map(str::trim)
                .filter(|r| !r.is_empty())
            else {
                log::debug!("Skipping instruction with no reference");
                continue;
            };
            let norm = normalize_match_key(reference);
            if !item_keys.insert(norm.clone()) {
                log::debug!("Dropping duplicate instruction {}", reference);
                continue;
            }
            instruction_keys.insert(norm.clone());
            items.push(build_instruction_item(prospect, instruction, &norm));
        }
    }

    // Pass 2: deals with no matching instruction become pitches.
    for prospect in prospects {
        for deal in &prospect.deals {
            let linked = deal
                .instruction_ref
                .as_deref()
                .map(normalize_match_key)
                .is_some_and(|r| instruction_keys.contains(&r));
            if linked {
                continue;
            }
            let key = format!("deal-{}", deal.deal_id.unwrap_or(0));
            if !item_keys.insert(key.clone()) {
                log::debug!("Dropping duplicate deal {}", key);
                continue;
            }
            items.push(build_pitch_item(prospect, deal));
        }
    }

    items
}

/// Build the full aggregate for one converted instruction.
fn build_instruction_item(
    prospect: &Prospect,
    instruction: &Instruction,
    norm_ref: &str,
) -> OverviewItem {
    let matches_ref =
        |r: Option<&str>| r.is_some_and(|v| normalize_match_key(v) == norm_ref);

    // All deals converted into this instruction.
    let deals: Vec<Deal> = prospect
        .deals
        .iter()
        .filter(|d| matches_ref(d.instruction_ref.as_deref()))
        .cloned()
        .collect();

    // Deal-embedded instruction copies contribute child collections only.
    let embedded: Vec<&Instruction> = prospect
        .deals
        .iter()
        .flat_map(|d| d.instructions.iter())
        .filter(|i| matches_ref(i.instruction_ref.as_deref()))
        .collect();

    let joint_clients = collect_joint_clients(prospect, &deals);

    // Risk: pool the three levels, keep the first record keyed to this ref.
    let risk: Option<RiskAssessment> = prospect
        .risk_assessments
        .iter()
        .chain(instruction.risk_assessments.iter())
        .chain(embedded.iter().flat_map(|i| i.risk_assessments.iter()))
        .find(|r| matches_ref(r.pipeline_key()))
        .cloned();

    // EID: keep every keyed attempt; the status resolver picks the most
    // recent one.
    let id_verifications: Vec<IdVerification> = prospect
        .id_verifications
        .iter()
        .chain(instruction.id_verifications.iter())
        .chain(embedded.iter().flat_map(|i| i.id_verifications.iter()))
        .filter(|e| matches_ref(e.pipeline_key()))
        .cloned()
        .collect();

    let documents = dedup_documents(
        prospect
            .documents
            .iter()
            .chain(instruction.documents.iter())
            .chain(embedded.iter().flat_map(|i| i.documents.iter())),
    );

    let prospect_id = resolve_prospect_id(prospect, Some(instruction), deals.first());

    OverviewItem {
        instruction: Some(instruction.clone()),
        deal: deals.first().cloned(),
        deals,
        joint_clients,
        risk,
        id_verifications,
        documents,
        prospect_id,
    }
}

/// Build the lighter aggregate for an unconverted deal.
fn build_pitch_item(prospect: &Prospect, deal: &Deal) -> OverviewItem {
    let joint_clients = collect_joint_clients(prospect, std::slice::from_ref(deal));
    let documents = dedup_documents(prospect.documents.iter());
    let prospect_id = resolve_prospect_id(prospect, None, Some(deal));

    OverviewItem {
        instruction: None,
        deal: Some(deal.clone()),
        deals: vec![deal.clone()],
        joint_clients,
        risk: None,
        id_verifications: Vec::new(),
        documents,
        prospect_id,
    }
}

/// Joint clients referencing any of the given deals, pooled from the
/// prospect-level and deal-level lists, deduplicated by
/// `(DealId, lowercased email)`.
fn collect_joint_clients(prospect: &Prospect, deals: &[Deal]) -> Vec<JointClient> {
    let deal_ids: HashSet<i64> = deals.iter().filter_map(|d| d.deal_id).collect();
    let mut seen: HashSet<(i64, String)> = HashSet::new();
    let mut out = Vec::new();

    let prospect_level = prospect
        .joint_clients
        .iter()
        .filter(|jc| jc.deal_id.is_some_and(|id| deal_ids.contains(&id)));
    let deal_level = deals.iter().flat_map(|d| d.joint_clients.iter());

    for jc in prospect_level.chain(deal_level) {
        let key = (
            jc.deal_id.unwrap_or(0),
            jc.client_email
                .as_deref()
                .unwrap_or_default()
                .to_lowercase(),
        );
        if seen.insert(key) {
            out.push(jc.clone());
        }
    }
    out
}

/// Union documents from all source levels, first occurrence wins per
/// dedup key.
fn dedup_documents<'a>(docs: impl Iterator<Item = &'a Document>) -> Vec<Document> {
    let mut seen: HashSet<String> = HashSet::new();
    let mut out = Vec::new();
    for doc in docs {
        if seen.insert(doc.dedup_key()) {
            out.push(doc.clone());
        }
    }
    out
}

/// Best available prospect id: the prospect container's own, else the
/// instruction's, else the primary deal's.
fn resolve_prospect_id(
    prospect: &Prospect,
    instruction: Option<&Instruction>,
    deal: Option<&Deal>,
) -> Option<ProspectId> {
    prospect
        .prospect_id
        .clone()
        .or_else(|| instruction.and_then(|i| i.prospect_id.clone()))
        .or_else(|| deal.and_then(|d| d.prospect_id.clone()))
}
