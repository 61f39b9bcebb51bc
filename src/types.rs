//! Serde data model: raw source records and derived view types.
//!
//! Raw records arrive from two generations of upstream systems. The legacy
//! system writes PascalCase fields (`DealId`, `InstructionRef`) and reuses
//! `MatterId` to mean `InstructionRef` on risk/EID records; the payment
//! service writes snake_case. Field-name drift between the two is absorbed
//! here with `#[serde(alias)]` so nothing downstream branches on field names.
//! Derived types serialize camelCase for the dashboard.

use serde::{Deserialize, Serialize};

use crate::util::{normalize_match_key, parse_timestamp};

// =============================================================================
// Prospect identifier
// =============================================================================

/// Prospect identifier as it appears in the wild: sometimes a number,
/// sometimes a string, occasionally with stray whitespace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ProspectId {
    Number(i64),
    Text(String),
}

impl ProspectId {
    /// Canonical string form used as every map key.
    pub fn normalized(&self) -> String {
        match self {
            ProspectId::Number(n) => n.to_string(),
            ProspectId::Text(s) => normalize_match_key(s),
        }
    }
}

impl std::fmt::Display for ProspectId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProspectId::Number(n) => write!(f, "{}", n),
            ProspectId::Text(s) => write!(f, "{}", s),
        }
    }
}

// =============================================================================
// Raw source records
// =============================================================================

/// One prospect's worth of raw collections, as handed over by the fetch
/// layer. Every field is optional; absence means an empty list.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Prospect {
    #[serde(default, alias = "prospectId")]
    pub prospect_id: Option<ProspectId>,
    #[serde(default)]
    pub deals: Vec<Deal>,
    #[serde(default)]
    pub instructions: Vec<Instruction>,
    /// Legacy callers send this as `jointClients`.
    #[serde(default, alias = "jointClients")]
    pub joint_clients: Vec<JointClient>,
    /// Legacy callers send this as `compliance`.
    #[serde(default, alias = "compliance", alias = "riskAssessments")]
    pub risk_assessments: Vec<RiskAssessment>,
    /// Legacy callers send this as `idVerifications`.
    #[serde(default, alias = "idVerifications", alias = "eidVerifications")]
    pub id_verifications: Vec<IdVerification>,
    #[serde(default)]
    pub documents: Vec<Document>,
    #[serde(default)]
    pub payments: Vec<Payment>,
}

/// A pitch: a prospective engagement prior to (or without) conversion
/// into an instruction.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Deal {
    #[serde(default)]
    pub deal_id: Option<i64>,
    #[serde(default)]
    pub instruction_ref: Option<String>,
    #[serde(default)]
    pub prospect_id: Option<ProspectId>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub service_description: Option<String>,
    #[serde(default)]
    pub area_of_work: Option<String>,
    #[serde(default)]
    pub lead_client_email: Option<String>,
    #[serde(default)]
    pub amount: Option<f64>,
    /// Deal-scoped joint clients (legacy payloads embed them here).
    #[serde(default, alias = "jointClients")]
    pub joint_clients: Vec<JointClient>,
    /// Deal-embedded instruction copies from legacy payloads. Their child
    /// collections are pooled during normalization; the copies themselves
    /// are never promoted to aggregates.
    #[serde(default)]
    pub instructions: Vec<Instruction>,
}

/// A converted engagement with a unique reference and a compliance
/// pipeline to complete.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Instruction {
    #[serde(default)]
    pub instruction_ref: Option<String>,
    #[serde(default)]
    pub prospect_id: Option<ProspectId>,
    /// Free-text workflow marker ("initialised", "proof-of-id-complete",
    /// "instructed", ...). Compared lowercased.
    #[serde(default)]
    pub stage: Option<String>,
    #[serde(default)]
    pub client_type: Option<String>,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    /// Combined display name on very old records, split on first whitespace
    /// when the structured fields are absent.
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub company_name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    /// Raw proof-of-identity fields captured at intake, before any
    /// electronic check has run.
    #[serde(default)]
    pub passport_number: Option<String>,
    #[serde(default)]
    pub drivers_license_number: Option<String>,
    /// Legacy electronic-ID result stored directly on the instruction,
    /// consulted only when no EID record exists.
    #[serde(default, rename = "EIDOverallResult")]
    pub eid_overall_result: Option<String>,
    /// Internal billing flag; "paid" short-circuits the payment stage.
    #[serde(default)]
    pub internal_status: Option<String>,
    #[serde(default)]
    pub matter_id: Option<String>,
    #[serde(default)]
    pub matters: Vec<MatterRef>,
    #[serde(default, rename = "CCLSubmitted")]
    pub ccl_submitted: Option<bool>,
    #[serde(default)]
    pub area_of_work: Option<String>,
    /// Instruction-scoped collections, overlapping with the prospect-scoped
    /// ones. Pooled and deduplicated during normalization.
    #[serde(default, alias = "compliance", alias = "riskAssessments")]
    pub risk_assessments: Vec<RiskAssessment>,
    #[serde(default, alias = "idVerifications", alias = "eidVerifications")]
    pub id_verifications: Vec<IdVerification>,
    #[serde(default)]
    pub documents: Vec<Document>,
    #[serde(default)]
    pub payments: Vec<Payment>,
}

impl Instruction {
    /// Lowercased stage marker, empty string when absent.
    pub fn stage_normalized(&self) -> String {
        self.stage
            .as_deref()
            .unwrap_or_default()
            .trim()
            .to_lowercase()
    }

    /// True if intake captured any raw proof-of-identity field.
    pub fn has_proof_of_id_fields(&self) -> bool {
        let filled = |f: &Option<String>| f.as_deref().is_some_and(|v| !v.trim().is_empty());
        filled(&self.passport_number) || filled(&self.drivers_license_number)
    }
}

/// A link to an opened matter. Only the id matters to the pipeline; the
/// rest is carried through for presentation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct MatterRef {
    #[serde(default)]
    pub matter_id: Option<String>,
    #[serde(default)]
    pub display_number: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

/// Secondary party on a deal, keyed by `(DealId, ClientEmail)`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct JointClient {
    #[serde(default)]
    pub deal_id: Option<i64>,
    #[serde(default)]
    pub client_email: Option<String>,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
}

/// Risk assessment record. `MatterId` is overloaded upstream and actually
/// holds the instruction reference; use [`RiskAssessment::pipeline_key`]
/// instead of reading either field directly.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RiskAssessment {
    #[serde(default)]
    pub matter_id: Option<String>,
    #[serde(default)]
    pub instruction_ref: Option<String>,
    /// Free text, compared case-insensitively ("Low", "low risk", "Pass",
    /// "Approved" all read as a clean pass).
    #[serde(default)]
    pub risk_assessment_result: Option<String>,
    #[serde(default)]
    pub risk_assessor: Option<String>,
    #[serde(default)]
    pub compliance_date: Option<String>,
    #[serde(default)]
    pub client_type: Option<String>,
    #[serde(default)]
    pub transaction_risk_level: Option<String>,
}

impl RiskAssessment {
    /// Normalized instruction reference this record belongs to. Newer
    /// writers fill `InstructionRef`; legacy writers only fill `MatterId`.
    pub fn pipeline_key(&self) -> Option<&str> {
        non_empty(&self.instruction_ref).or_else(|| non_empty(&self.matter_id))
    }
}

/// Electronic identity verification (EID) attempt. Multiple records may
/// exist per instruction (retries); the most recently checked one is
/// authoritative.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct IdVerification {
    #[serde(default)]
    pub matter_id: Option<String>,
    #[serde(default)]
    pub instruction_ref: Option<String>,
    #[serde(default)]
    pub check_id: Option<String>,
    #[serde(default)]
    pub client_email: Option<String>,
    #[serde(default, rename = "EIDOverallResult")]
    pub eid_overall_result: Option<String>,
    #[serde(default, rename = "EIDStatus")]
    pub eid_status: Option<String>,
    #[serde(default, rename = "EIDCheckedDate")]
    pub eid_checked_date: Option<String>,
    #[serde(default)]
    pub address_verification_result: Option<String>,
    #[serde(default, rename = "PEPAndSanctionsCheckResult")]
    pub pep_sanctions_result: Option<String>,
}

impl IdVerification {
    /// Normalized instruction reference this record belongs to (same
    /// `MatterId` overload as risk assessments).
    pub fn pipeline_key(&self) -> Option<&str> {
        non_empty(&self.instruction_ref).or_else(|| non_empty(&self.matter_id))
    }

    /// Checked date parsed for recency ordering, `None` when absent or
    /// unparseable.
    pub fn checked_at(&self) -> Option<chrono::DateTime<chrono::Utc>> {
        self.eid_checked_date.as_deref().and_then(parse_timestamp)
    }
}

/// Payment record from the payment service (snake_case source).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Payment {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub amount: Option<f64>,
    /// Provider-side status: "succeeded", "confirmed", "processing", ...
    #[serde(default)]
    pub payment_status: Option<String>,
    /// Our ledger status: "completed", "paid", ...
    #[serde(default)]
    pub internal_status: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub metadata: serde_json::Value,
}

/// Uploaded document. Keyed by `DocumentId` when present, else by
/// `(FileName, UploadedAt)`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Document {
    #[serde(default)]
    pub document_id: Option<i64>,
    #[serde(default)]
    pub file_name: Option<String>,
    #[serde(default)]
    pub uploaded_at: Option<String>,
    #[serde(default)]
    pub uploaded_by: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

impl Document {
    /// Dedup key across the prospect/instruction/deal source levels.
    pub fn dedup_key(&self) -> String {
        match self.document_id {
            Some(id) => format!("doc-{}", id),
            None => format!(
                "{}|{}",
                self.file_name.as_deref().unwrap_or_default(),
                self.uploaded_at.as_deref().unwrap_or_default()
            ),
        }
    }
}

fn non_empty(field: &Option<String>) -> Option<&str> {
    field.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

// =============================================================================
// Derived view types
// =============================================================================

/// The merged per-instruction (or per-pitch) view object produced by the
/// normalizer. One per distinct instruction reference; unconverted deals
/// get a lighter item with `instruction = None` and key `deal-<DealId>`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OverviewItem {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instruction: Option<Instruction>,
    /// Primary deal (first matching by instruction ref, or the pitch itself).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deal: Option<Deal>,
    /// All deals sharing this instruction reference.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub deals: Vec<Deal>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub joint_clients: Vec<JointClient>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub risk: Option<RiskAssessment>,
    #[serde(rename = "eids", skip_serializing_if = "Vec::is_empty")]
    pub id_verifications: Vec<IdVerification>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub documents: Vec<Document>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prospect_id: Option<ProspectId>,
}

impl OverviewItem {
    /// Map key: the instruction reference, or `deal-<DealId>` for a pitch.
    pub fn key(&self) -> String {
        if let Some(r) = self
            .instruction
            .as_ref()
            .and_then(|i| i.instruction_ref.as_deref())
        {
            return r.to_string();
        }
        let deal_id = self.deal.as_ref().and_then(|d| d.deal_id).unwrap_or(0);
        format!("deal-{}", deal_id)
    }

    /// True for an unconverted deal (pitch).
    pub fn is_pitch(&self) -> bool {
        self.instruction.is_none()
    }

    /// Most recent EID attempt by checked date, falling back to list order
    /// (first element) when no record carries a parseable date.
    pub fn latest_eid(&self) -> Option<&IdVerification> {
        let dated = self
            .id_verifications
            .iter()
            .filter(|e| e.checked_at().is_some())
            .max_by_key(|e| e.checked_at());
        dated.or_else(|| self.id_verifications.first())
    }

    /// Payments for this item, instruction-scoped list first (assumed
    /// reverse-chronological by the upstream writer).
    pub fn payments(&self) -> &[Payment] {
        self.instruction
            .as_ref()
            .map(|i| i.payments.as_slice())
            .unwrap_or_default()
    }
}

/// Resolved display name for a prospect. Both fields may be empty when no
/// source can supply a name; callers must render that gracefully.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientName {
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
}

impl ClientName {
    pub fn is_empty(&self) -> bool {
        self.first_name.trim().is_empty() && self.last_name.trim().is_empty()
    }

    pub fn full(&self) -> String {
        let full = format!("{} {}", self.first_name, self.last_name);
        full.trim().to_string()
    }
}

// =============================================================================
// Pipeline statuses
// =============================================================================

/// ID stage status. `Received` marks raw proof-of-id on file with an
/// electronic check still outstanding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IdStatus {
    Pending,
    Received,
    Review,
    Complete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Processing,
    Complete,
}

/// Risk stage status. `Flagged` covers every recorded result that is not a
/// clean pass (rendered as "review" in the dashboard).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskStatus {
    Pending,
    Flagged,
    Complete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatterStatus {
    Pending,
    Complete,
}

/// Documents are optional, so absence is `Neutral`, not a failure state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocsStatus {
    Neutral,
    Complete,
}

/// One status per pipeline stage, derived wholesale from an overview item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StageStatusSet {
    pub id: IdStatus,
    pub payment: PaymentStatus,
    pub risk: RiskStatus,
    pub matter: MatterStatus,
    pub documents: DocsStatus,
}

/// The single highest-priority incomplete pipeline stage for an item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum NextAction {
    VerifyId,
    AssessRisk,
    OpenMatter,
    DraftCcl,
    Complete,
}

impl NextAction {
    /// Dashboard label.
    pub fn label(&self) -> &'static str {
        match self {
            NextAction::VerifyId => "Verify ID",
            NextAction::AssessRisk => "Assess Risk",
            NextAction::OpenMatter => "Open Matter",
            NextAction::DraftCcl => "Draft CCL",
            NextAction::Complete => "Complete",
        }
    }
}

/// An overview item with its derived status set and next action attached,
/// the unit the filter compositor and presentation consume.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OverviewRow {
    pub item: OverviewItem,
    pub status: StageStatusSet,
    pub next_action: NextAction,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prospect_id_normalized() {
        assert_eq!(ProspectId::Number(12345).normalized(), "12345");
        assert_eq!(ProspectId::Text(" 12345 ".to_string()).normalized(), "12345");
        assert_eq!(ProspectId::Text("AB-99".to_string()).normalized(), "ab99");
    }

    #[test]
    fn test_prospect_deserializes_legacy_aliases() {
        let raw = serde_json::json!({
            "prospectId": 42,
            "Deals": [{"DealId": 1, "InstructionRef": "HLX-100"}],
            "compliance": [{"MatterId": "HLX-100", "RiskAssessmentResult": "Low"}],
            "idVerifications": [{"MatterId": "HLX-100", "EIDStatus": "completed"}],
            "jointClients": [{"DealId": 1, "ClientEmail": "a@b.com"}]
        });
        let p: Prospect = serde_json::from_value(raw).unwrap();
        assert_eq!(p.prospect_id, Some(ProspectId::Number(42)));
        assert_eq!(p.deals.len(), 1);
        assert_eq!(p.risk_assessments.len(), 1);
        assert_eq!(p.id_verifications.len(), 1);
        assert_eq!(p.joint_clients.len(), 1);
    }

    #[test]
    fn test_pipeline_key_prefers_instruction_ref() {
        let r = RiskAssessment {
            matter_id: Some("LEGACY-1".to_string()),
            instruction_ref: Some("HLX-100".to_string()),
            ..Default::default()
        };
        assert_eq!(r.pipeline_key(), Some("HLX-100"));

        let legacy = RiskAssessment {
            matter_id: Some("HLX-101".to_string()),
            ..Default::default()
        };
        assert_eq!(legacy.pipeline_key(), Some("HLX-101"));

        let blank = RiskAssessment {
            matter_id: Some("  ".to_string()),
            ..Default::default()
        };
        assert_eq!(blank.pipeline_key(), None);
    }

    #[test]
    fn test_document_dedup_key() {
        let by_id = Document {
            document_id: Some(7),
            file_name: Some("passport.pdf".to_string()),
            ..Default::default()
        };
        assert_eq!(by_id.dedup_key(), "doc-7");

        let by_name = Document {
            file_name: Some("passport.pdf".to_string()),
            uploaded_at: Some("2026-01-02".to_string()),
            ..Default::default()
        };
        assert_eq!(by_name.dedup_key(), "passport.pdf|2026-01-02");
    }

    #[test]
    fn test_latest_eid_prefers_checked_date() {
        let item = OverviewItem {
            instruction: None,
            deal: None,
            deals: vec![],
            joint_clients: vec![],
            risk: None,
            id_verifications: vec![
                IdVerification {
                    check_id: Some("old".to_string()),
                    eid_checked_date: Some("2026-01-01".to_string()),
                    ..Default::default()
                },
                IdVerification {
                    check_id: Some("new".to_string()),
                    eid_checked_date: Some("2026-02-01".to_string()),
                    ..Default::default()
                },
            ],
            documents: vec![],
            prospect_id: None,
        };
        assert_eq!(item.latest_eid().unwrap().check_id.as_deref(), Some("new"));
    }

    #[test]
    fn test_latest_eid_falls_back_to_list_order() {
        let item = OverviewItem {
            instruction: None,
            deal: None,
            deals: vec![],
            joint_clients: vec![],
            risk: None,
            id_verifications: vec![
                IdVerification {
                    check_id: Some("first".to_string()),
                    ..Default::default()
                },
                IdVerification {
                    check_id: Some("second".to_string()),
                    ..Default::default()
                },
            ],
            documents: vec![],
            prospect_id: None,
        };
        assert_eq!(item.latest_eid().unwrap().check_id.as_deref(), Some("first"));
    }
}
