//! Identity resolver: best-effort display name for a loosely-typed
//! prospect identifier.
//!
//! The canonical name lives in different places depending on whether an
//! instruction has been created yet, so resolution walks a fallback chain:
//! durable cache → enquiry index → instruction/deal scan → lead-email
//! derivation. Name resolution runs per row during render cycles; the
//! cache is what keeps repeated lookups over a large un-indexed record
//! set cheap. Only non-empty results are cached, so a true negative never
//! poisons a later, richer fetch.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::error::EngineError;
use crate::types::{ClientName, Deal, Instruction, ProspectId};
use crate::util::{atomic_write_str, name_from_email};

// =============================================================================
// Cache
// =============================================================================

/// Name cache seam. Injected into the resolver so hosts choose their own
/// durable store and tests stay singleton-free.
pub trait NameCache {
    fn get(&self, key: &str) -> Option<ClientName>;
    fn put(&mut self, key: &str, name: &ClientName);
}

/// Plain in-memory cache for hosts without durable storage and for tests.
#[derive(Debug, Default)]
pub struct InMemoryNameCache {
    entries: HashMap<String, ClientName>,
}

impl NameCache for InMemoryNameCache {
    fn get(&self, key: &str) -> Option<ClientName> {
        self.entries.get(key).cloned()
    }

    fn put(&mut self, key: &str, name: &ClientName) {
        self.entries.insert(key.to_string(), name.clone());
    }
}

/// One persisted `(prospectId, name)` pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CacheEntry {
    prospect_id: String,
    name: ClientName,
}

/// JSON-file-backed cache: loaded once at construction, rewritten
/// atomically after every successful put. A missing file is an empty
/// cache, not an error.
#[derive(Debug)]
pub struct FileNameCache {
    path: PathBuf,
    entries: RwLock<HashMap<String, ClientName>>,
}

impl FileNameCache {
    /// Load the cache from `path`.
    pub fn load(path: &Path) -> Result<Self, EngineError> {
        let entries = if path.exists() {
            let content =
                std::fs::read_to_string(path).map_err(|e| EngineError::CacheRead {
                    path: path.to_path_buf(),
                    source: e,
                })?;
            let list: Vec<CacheEntry> =
                serde_json::from_str(&content).map_err(|e| EngineError::CacheParse {
                    path: path.to_path_buf(),
                    source: e,
                })?;
            list.into_iter().map(|e| (e.prospect_id, e.name)).collect()
        } else {
            HashMap::new()
        };
        Ok(Self {
            path: path.to_path_buf(),
            entries: RwLock::new(entries),
        })
    }

    /// Load the cache, degrading to empty (with a warning) when the file
    /// is unreadable or malformed.
    pub fn load_or_empty(path: &Path) -> Self {
        match Self::load(path) {
            Ok(cache) => cache,
            Err(e) => {
                log::warn!("Name cache load failed, starting empty: {}", e);
                Self {
                    path: path.to_path_buf(),
                    entries: RwLock::new(HashMap::new()),
                }
            }
        }
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Persist the current state. Entries are sorted by key so the file is
    /// deterministic and round-trips exactly.
    pub fn save(&self) -> Result<(), EngineError> {
        let mut list: Vec<CacheEntry> = self
            .entries
            .read()
            .iter()
            .map(|(k, v)| CacheEntry {
                prospect_id: k.clone(),
                name: v.clone(),
            })
            .collect();
        list.sort_by(|a, b| a.prospect_id.cmp(&b.prospect_id));
        let content = serde_json::to_string_pretty(&list)?;
        atomic_write_str(&self.path, &content).map_err(|e| EngineError::CacheWrite {
            path: self.path.clone(),
            source: e,
        })
    }
}

impl NameCache for FileNameCache {
    fn get(&self, key: &str) -> Option<ClientName> {
        self.entries.read().get(key).cloned()
    }

    fn put(&mut self, key: &str, name: &ClientName) {
        self.entries
            .write()
            .insert(key.to_string(), name.clone());
        if let Err(e) = self.save() {
            log::warn!("Name cache persist failed: {}", e);
        }
    }
}

// =============================================================================
// Resolver
// =============================================================================

/// Resolves display names against the current reconciliation pass's
/// collections. Rebuilt wholesale on refresh, like everything else.
pub struct IdentityResolver<'a> {
    cache: &'a mut dyn NameCache,
    enquiry_index: Option<&'a HashMap<String, ClientName>>,
    instructions: &'a [Instruction],
    deals: &'a [Deal],
}

impl<'a> IdentityResolver<'a> {
    pub fn new(
        cache: &'a mut dyn NameCache,
        instructions: &'a [Instruction],
        deals: &'a [Deal],
    ) -> Self {
        Self {
            cache,
            enquiry_index: None,
            instructions,
            deals,
        }
    }

    /// Attach an index over the current enquiries record set, keyed by
    /// normalized prospect id.
    pub fn with_enquiry_index(mut self, index: &'a HashMap<String, ClientName>) -> Self {
        self.enquiry_index = Some(index);
        self
    }

    /// Resolve a display name. Never fails; both fields of the result may
    /// be empty when no source can supply a name.
    pub fn resolve(&mut self, prospect_id: &ProspectId) -> ClientName {
        let key = prospect_id.normalized();

        // 1. Cache hit with any non-empty name returns immediately.
        if let Some(hit) = self.cache.get(&key) {
            if !hit.is_empty() {
                return hit;
            }
        }

        // 2. Enquiry index.
        if let Some(index) = self.enquiry_index {
            if let Some(name) = index.get(&key).filter(|n| !n.is_empty()) {
                let name = name.clone();
                self.remember(&key, &name);
                return name;
            }
        }

        // 3. Scan the current instruction/deal collections.
        if let Some(name) = self.scan_collections(&key) {
            self.remember(&key, &name);
            return name;
        }

        // 4. Last resort: derive from the lead client's email local-part.
        if let Some(name) = self.derive_from_email(&key) {
            self.remember(&key, &name);
            return name;
        }

        ClientName::default()
    }

    fn remember(&mut self, key: &str, name: &ClientName) {
        if !name.is_empty() {
            self.cache.put(key, name);
        }
    }

    fn scan_collections(&self, key: &str) -> Option<ClientName> {
        let matches = |id: &Option<ProspectId>| {
            id.as_ref().is_some_and(|p| p.normalized() == key)
        };

        let direct = self
            .instructions
            .iter()
            .filter(|i| matches(&i.prospect_id));
        let embedded = self
            .deals
            .iter()
            .filter(|d| matches(&d.prospect_id))
            .flat_map(|d| d.instructions.iter());

        direct
            .chain(embedded)
            .find_map(instruction_name)
            .filter(|n| !n.is_empty())
    }

    fn derive_from_email(&self, key: &str) -> Option<ClientName> {
        let matches = |id: &Option<ProspectId>| {
            id.as_ref().is_some_and(|p| p.normalized() == key)
        };

        let lead_email = self
            .deals
            .iter()
            .filter(|d| matches(&d.prospect_id))
            .find_map(|d| d.lead_client_email.as_deref())
            .or_else(|| {
                self.instructions
                    .iter()
                    .filter(|i| matches(&i.prospect_id))
                    .find_map(|i| i.email.as_deref())
            })?;

        let (first, last) = name_from_email(lead_email);
        let name = ClientName {
            first_name: first,
            last_name: last,
        };
        (!name.is_empty()).then_some(name)
    }
}

/// Extract a name from an instruction's structured fields, splitting the
/// combined legacy `Name` field when they are absent.
fn instruction_name(instruction: &Instruction) -> Option<ClientName> {
    let first = instruction.first_name.as_deref().unwrap_or_default().trim();
    let last = instruction.last_name.as_deref().unwrap_or_default().trim();
    if !first.is_empty() || !last.is_empty() {
        return Some(ClientName {
            first_name: first.to_string(),
            last_name: last.to_string(),
        });
    }

    let combined = instruction.name.as_deref()?.trim();
    if combined.is_empty() {
        return None;
    }
    match combined.split_once(char::is_whitespace) {
        Some((first, rest)) => Some(ClientName {
            first_name: first.to_string(),
            last_name: rest.trim().to_string(),
        }),
        None => Some(ClientName {
            first_name: combined.to_string(),
            last_name: String::new(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn name(first: &str, last: &str) -> ClientName {
        ClientName {
            first_name: first.to_string(),
            last_name: last.to_string(),
        }
    }

    #[test]
    fn test_cache_hit_short_circuits() {
        let mut cache = InMemoryNameCache::default();
        cache.put("42", &name("Cached", "Hit"));
        let mut resolver = IdentityResolver::new(&mut cache, &[], &[]);
        assert_eq!(
            resolver.resolve(&ProspectId::Number(42)),
            name("Cached", "Hit")
        );
    }

    #[test]
    fn test_enquiry_index_hit_is_cached() {
        let mut cache = InMemoryNameCache::default();
        let mut index = HashMap::new();
        index.insert("42".to_string(), name("Indexed", "Person"));
        {
            let mut resolver =
                IdentityResolver::new(&mut cache, &[], &[]).with_enquiry_index(&index);
            assert_eq!(
                resolver.resolve(&ProspectId::Number(42)),
                name("Indexed", "Person")
            );
        }
        assert_eq!(cache.get("42"), Some(name("Indexed", "Person")));
    }

    #[test]
    fn test_instruction_scan_structured_fields() {
        let instructions = vec![Instruction {
            prospect_id: Some(ProspectId::Number(42)),
            first_name: Some("Sarah".to_string()),
            last_name: Some("Chen".to_string()),
            ..Default::default()
        }];
        let mut cache = InMemoryNameCache::default();
        let mut resolver = IdentityResolver::new(&mut cache, &instructions, &[]);
        assert_eq!(
            resolver.resolve(&ProspectId::Number(42)),
            name("Sarah", "Chen")
        );
    }

    #[test]
    fn test_instruction_scan_splits_combined_name() {
        let instructions = vec![Instruction {
            prospect_id: Some(ProspectId::Text("AB-7".to_string())),
            name: Some("Mary Jane Watson".to_string()),
            ..Default::default()
        }];
        let mut cache = InMemoryNameCache::default();
        let mut resolver = IdentityResolver::new(&mut cache, &instructions, &[]);
        assert_eq!(
            resolver.resolve(&ProspectId::Text("ab7".to_string())),
            name("Mary", "Jane Watson")
        );
    }

    #[test]
    fn test_email_fallback() {
        // Spec scenario: nothing on record but a lead email.
        let deals = vec![Deal {
            deal_id: Some(1),
            prospect_id: Some(ProspectId::Number(42)),
            lead_client_email: Some("jane.doe@example.com".to_string()),
            ..Default::default()
        }];
        let mut cache = InMemoryNameCache::default();
        let mut resolver = IdentityResolver::new(&mut cache, &[], &deals);
        assert_eq!(
            resolver.resolve(&ProspectId::Number(42)),
            name("Jane", "Doe")
        );
        // A derived name is worth caching.
        assert_eq!(cache.get("42"), Some(name("Jane", "Doe")));
    }

    #[test]
    fn test_unresolvable_returns_empty_and_is_not_cached() {
        let mut cache = InMemoryNameCache::default();
        {
            let mut resolver = IdentityResolver::new(&mut cache, &[], &[]);
            let resolved = resolver.resolve(&ProspectId::Number(99));
            assert!(resolved.is_empty());
        }
        // True negative never lands in the cache.
        assert!(cache.get("99").is_none());
    }

    #[test]
    fn test_file_cache_round_trip() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("name-cache.json");

        let mut cache = FileNameCache::load(&path).unwrap();
        assert!(cache.is_empty());
        cache.put("42", &name("Jane", "Doe"));
        cache.put("7", &name("Bob", "Ray"));

        // Reload and compare: load → use → save → reload → identical.
        let reloaded = FileNameCache::load(&path).unwrap();
        assert_eq!(reloaded.len(), 2);
        assert_eq!(reloaded.get("42"), Some(name("Jane", "Doe")));
        assert_eq!(reloaded.get("7"), Some(name("Bob", "Ray")));

        reloaded.save().unwrap();
        let again = FileNameCache::load(&path).unwrap();
        assert_eq!(again.get("42"), Some(name("Jane", "Doe")));
        assert_eq!(again.get("7"), Some(name("Bob", "Ray")));
    }

    #[test]
    fn test_file_cache_malformed_file_degrades_to_empty() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("name-cache.json");
        std::fs::write(&path, "not json").unwrap();

        assert!(FileNameCache::load(&path).is_err());
        let cache = FileNameCache::load_or_empty(&path);
        assert!(cache.is_empty());
    }
}
