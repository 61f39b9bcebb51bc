//! Instruction reconciliation and pipeline-status engine.
//!
//! The intake dashboard tracks prospective clients ("deals"), converts
//! some into formal "instructions", and walks each instruction through a
//! fixed compliance pipeline (identity verification, payment, risk
//! assessment, matter creation, document collection). This crate is the
//! dashboard's core: it merges loosely-keyed record collections from
//! several upstream sources into one coherent per-instruction view and
//! deterministically derives which pipeline stage each instruction
//! occupies.
//!
//! Flow: raw prospect collections → [`normalize::build_overview_items`] →
//! [`filter::build_rows`] (status set + next action per item) →
//! [`filter::FilterSpec::apply`] → presentation. The identity resolver
//! ([`identity::IdentityResolver`]) runs alongside; its cache is the only
//! persistent state in the crate. Everything else is a pure function over
//! immutable inputs and is recomputed wholesale on every upstream refresh.

pub mod compliance;
pub mod config;
pub mod error;
pub mod filter;
pub mod identity;
pub mod normalize;
pub mod status;
pub mod types;
pub mod util;

pub use config::EngineConfig;
pub use error::EngineError;
pub use filter::{build_rows, next_action, FilterSpec, StageFilter};
pub use identity::{FileNameCache, IdentityResolver, InMemoryNameCache, NameCache};
pub use normalize::build_overview_items;
pub use status::resolve_statuses;
pub use types::{
    ClientName, NextAction, OverviewItem, OverviewRow, Prospect, ProspectId, StageStatusSet,
};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{IdStatus, PaymentStatus};

    /// End to end: raw JSON payload through normalization, status
    /// derivation and filtering.
    #[test]
    fn test_pipeline_from_raw_payload() {
        let raw = serde_json::json!([{
            "prospectId": 42,
            "Instructions": [{
                "InstructionRef": "HLX-100",
                "Stage": "proof-of-id-complete",
                "FirstName": "Jane",
                "LastName": "Doe",
                "Email": "jane.doe@example.com",
                "Payments": [
                    {"id": "pay_2", "payment_status": "succeeded",
                     "internal_status": "completed", "created_at": "2026-02-01T10:00:00Z"},
                    {"id": "pay_1", "payment_status": "failed",
                     "internal_status": "abandoned", "created_at": "2026-01-15T10:00:00Z"}
                ]
            }],
            "Deals": [
                {"DealId": 1, "InstructionRef": "HLX-100", "Status": "Closed"},
                {"DealId": 2, "InstructionRef": "HLX-900", "Status": "Open",
                 "LeadClientEmail": "new.prospect@example.com"}
            ],
            "compliance": [
                {"MatterId": "HLX-100", "RiskAssessmentResult": "Low"}
            ],
            "idVerifications": [
                {"MatterId": "HLX-100", "EIDOverallResult": "Passed",
                 "EIDStatus": "completed", "EIDCheckedDate": "2026-01-20"}
            ]
        }]);

        let prospects: Vec<Prospect> = serde_json::from_value(raw).unwrap();
        let rows = build_rows(build_overview_items(&prospects));
        assert_eq!(rows.len(), 2);

        // HLX-100: identity passed, paid, low risk, no matter yet.
        let converted = &rows[0];
        assert_eq!(converted.item.key(), "HLX-100");
        assert_eq!(converted.status.id, IdStatus::Complete);
        assert_eq!(converted.status.payment, PaymentStatus::Complete);
        assert_eq!(converted.next_action, NextAction::OpenMatter);

        // Deal 2 references an instruction that does not exist: a pitch.
        let pitch = &rows[1];
        assert_eq!(pitch.item.key(), "deal-2");
        assert!(pitch.item.is_pitch());
        assert_eq!(pitch.status.id, IdStatus::Pending);

        // Filtering down to pending-ID items keeps only the pitch.
        let spec = FilterSpec {
            stages: StageFilter {
                id: Some([IdStatus::Pending].into_iter().collect()),
                ..Default::default()
            },
            ..Default::default()
        };
        let filtered = spec.apply(rows, &EngineConfig::default());
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].item.key(), "deal-2");
    }
}
