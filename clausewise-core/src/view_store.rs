//! Persistence of the dashboard's view model and settings.
//!
//! Each (analysis kind, custom query) pair owns one slot holding the last
//! [`AnalysisResult`] produced for it. Fixed kinds have exactly one slot;
//! every distinct custom query gets its own slot keyed by a short SHA-256
//! prefix of the query text. Writes overwrite; nothing is versioned.
//!
//! All operations go through [`StorageAdapter`] and therefore never fail.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::storage::StorageAdapter;
use crate::types::{AnalysisKind, AnalysisResult, Credentials, DisplayTab};

pub const RESULT_KEY_PREFIX: &str = "contract-data";
pub const CREDENTIALS_KEY: &str = "apiConfig";
pub const SELECTION_KEY: &str = "analysis-settings";
pub const ACTIVE_TAB_KEY: &str = "contract-active-tab";
/// Keys of every custom-query slot written so far, so a global clear can
/// find slots whose query text is no longer known.
pub const CUSTOM_INDEX_KEY: &str = "contract-data-index";

/// Hex characters of the SHA-256 digest kept in a custom-query key.
const QUERY_HASH_LEN: usize = 16;

/// The persisted analysis-kind selection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SavedSelection {
    pub kind: AnalysisKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_query: Option<String>,
}

/// Derive the storage key for a selector.
///
/// Pure and deterministic. For `Custom Query` the (trimmed) query text is
/// hashed into the key; other kinds ignore the text.
pub fn key_for(kind: AnalysisKind, custom_query: Option<&str>) -> String {
    if kind.is_custom() {
        let text = custom_query.unwrap_or("").trim();
        format!(
            "{RESULT_KEY_PREFIX}:{}:{}",
            kind.slug(),
            query_hash(text)
        )
    } else {
        format!("{RESULT_KEY_PREFIX}:{}", kind.slug())
    }
}

fn query_hash(text: &str) -> String {
    format!("{:x}", Sha256::digest(text.as_bytes()))[..QUERY_HASH_LEN].to_string()
}

/// Slot and settings persistence over a [`StorageAdapter`].
#[derive(Debug, Clone)]
pub struct ViewStore {
    storage: StorageAdapter,
}

impl ViewStore {
    pub fn new(storage: StorageAdapter) -> Self {
        Self { storage }
    }

    pub fn storage(&self) -> &StorageAdapter {
        &self.storage
    }

    pub fn load(&self, kind: AnalysisKind, custom_query: Option<&str>) -> Option<AnalysisResult> {
        self.storage.get_json(&key_for(kind, custom_query))
    }

    pub fn store(&self, result: &AnalysisResult, kind: AnalysisKind, custom_query: Option<&str>) {
        let key = key_for(kind, custom_query);
        debug!(key = %key, "Storing analysis result");
        self.storage.set_json(&key, result);
        if kind.is_custom() {
            self.remember_custom_key(key);
        }
    }

    pub fn evict(&self, kind: AnalysisKind, custom_query: Option<&str>) {
        let key = key_for(kind, custom_query);
        debug!(key = %key, "Evicting analysis result");
        self.storage.remove(&key);
        if kind.is_custom() {
            let mut index = self.custom_index();
            if let Some(pos) = index.iter().position(|k| k == &key) {
                index.remove(pos);
                self.storage.set_json(CUSTOM_INDEX_KEY, &index);
            }
        }
    }

    /// Clear every slot for `known_kinds` plus all auxiliary settings
    /// (active tab, credentials, kind selection).
    ///
    /// Custom-query slots are found through the index of keys written by
    /// [`ViewStore::store`].
    pub fn evict_all(&self, known_kinds: &[AnalysisKind]) {
        for kind in known_kinds {
            if kind.is_custom() {
                for key in self.custom_index() {
                    self.storage.remove(&key);
                }
                self.storage.remove(CUSTOM_INDEX_KEY);
            } else {
                self.storage.remove(&key_for(*kind, None));
            }
        }
        self.storage.remove(ACTIVE_TAB_KEY);
        self.storage.remove(CREDENTIALS_KEY);
        self.storage.remove(SELECTION_KEY);
    }

    fn custom_index(&self) -> Vec<String> {
        self.storage
            .get_json::<Vec<String>>(CUSTOM_INDEX_KEY)
            .unwrap_or_default()
    }

    fn remember_custom_key(&self, key: String) {
        let mut index = self.custom_index();
        if !index.contains(&key) {
            index.push(key);
            self.storage.set_json(CUSTOM_INDEX_KEY, &index);
        }
    }

    pub fn load_credentials(&self) -> Option<Credentials> {
        self.storage
            .get_json::<Credentials>(CREDENTIALS_KEY)
            .filter(Credentials::is_valid)
    }

    pub fn save_credentials(&self, credentials: &Credentials) {
        self.storage.set_json(CREDENTIALS_KEY, credentials);
    }

    pub fn clear_credentials(&self) {
        self.storage.remove(CREDENTIALS_KEY);
    }

    pub fn load_selection(&self) -> Option<SavedSelection> {
        self.storage.get_json(SELECTION_KEY)
    }

    pub fn save_selection(&self, selection: &SavedSelection) {
        self.storage.set_json(SELECTION_KEY, selection);
    }

    pub fn load_active_tab(&self) -> Option<DisplayTab> {
        self.storage.get_json(ACTIVE_TAB_KEY)
    }

    pub fn save_active_tab(&self, tab: DisplayTab) {
        self.storage.set_json(ACTIVE_TAB_KEY, &tab);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::tests::BrokenBackend;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    fn result(score: f64) -> AnalysisResult {
        AnalysisResult {
            analysis: format!("analysis {score}"),
            key_points: "- point".into(),
            recommendations: "- do this".into(),
            risk_score: score,
        }
    }

    fn store() -> ViewStore {
        ViewStore::new(StorageAdapter::in_memory())
    }

    #[test]
    fn test_key_for_fixed_kind() {
        assert_eq!(
            key_for(AnalysisKind::ContractReview, None),
            "contract-data:contract-review"
        );
        assert_eq!(
            key_for(AnalysisKind::RiskAssessment, Some("ignored")),
            "contract-data:risk-assessment"
        );
    }

    #[test]
    fn test_key_for_custom_query_is_stable_and_distinct() {
        let a1 = key_for(AnalysisKind::CustomQuery, Some("What is the termination clause?"));
        let a2 = key_for(AnalysisKind::CustomQuery, Some("What is the termination clause?"));
        let b = key_for(AnalysisKind::CustomQuery, Some("Who owns IP?"));
        assert_eq!(a1, a2);
        assert_ne!(a1, b);
        assert!(a1.starts_with("contract-data:custom-query:"));
        assert_eq!(a1.rsplit(':').next().unwrap().len(), QUERY_HASH_LEN);
    }

    #[test]
    fn test_key_for_custom_query_is_sha256_prefix() {
        assert_eq!(
            key_for(AnalysisKind::CustomQuery, Some("Who owns IP?")),
            "contract-data:custom-query:f90b71e911710a7a"
        );
    }

    #[test]
    fn test_key_for_custom_query_trims() {
        assert_eq!(
            key_for(AnalysisKind::CustomQuery, Some("  Who owns IP?\n")),
            key_for(AnalysisKind::CustomQuery, Some("Who owns IP?"))
        );
    }

    #[test]
    fn test_store_load_overwrite() {
        let vs = store();
        assert!(vs.load(AnalysisKind::ContractReview, None).is_none());
        vs.store(&result(1.0), AnalysisKind::ContractReview, None);
        vs.store(&result(2.0), AnalysisKind::ContractReview, None);
        assert_eq!(vs.load(AnalysisKind::ContractReview, None), Some(result(2.0)));
    }

    #[test]
    fn test_slots_are_isolated() {
        let vs = store();
        vs.store(&result(1.0), AnalysisKind::ContractReview, None);
        vs.store(&result(9.0), AnalysisKind::CustomQuery, Some("Who owns IP?"));

        assert!(vs.load(AnalysisKind::RiskAssessment, None).is_none());
        assert!(vs.load(AnalysisKind::CustomQuery, Some("Other question")).is_none());
        assert_eq!(vs.load(AnalysisKind::ContractReview, None), Some(result(1.0)));

        vs.evict(AnalysisKind::ContractReview, None);
        assert_eq!(
            vs.load(AnalysisKind::CustomQuery, Some("Who owns IP?")),
            Some(result(9.0))
        );
    }

    #[test]
    fn test_evict_all_clears_slots_and_settings() {
        let vs = store();
        vs.store(&result(1.0), AnalysisKind::ContractReview, None);
        vs.store(&result(2.0), AnalysisKind::LegalResearch, None);
        vs.store(&result(3.0), AnalysisKind::CustomQuery, Some("q1"));
        vs.store(&result(4.0), AnalysisKind::CustomQuery, Some("q2"));
        vs.save_credentials(&Credentials::new("sk-test").unwrap());
        vs.save_active_tab(DisplayTab::Recommendations);
        vs.save_selection(&SavedSelection {
            kind: AnalysisKind::CustomQuery,
            custom_query: Some("q1".into()),
        });

        vs.evict_all(&AnalysisKind::ALL);

        for kind in AnalysisKind::ALL {
            assert!(vs.load(kind, None).is_none());
        }
        assert!(vs.load(AnalysisKind::CustomQuery, Some("q1")).is_none());
        assert!(vs.load(AnalysisKind::CustomQuery, Some("q2")).is_none());
        assert!(vs.load_credentials().is_none());
        assert!(vs.load_active_tab().is_none());
        assert!(vs.load_selection().is_none());
    }

    #[test]
    fn test_evict_custom_updates_index() {
        let vs = store();
        vs.store(&result(3.0), AnalysisKind::CustomQuery, Some("q1"));
        vs.store(&result(3.0), AnalysisKind::CustomQuery, Some("q1"));
        assert_eq!(vs.custom_index().len(), 1);
        vs.evict(AnalysisKind::CustomQuery, Some("q1"));
        assert!(vs.custom_index().is_empty());
    }

    #[test]
    fn test_settings_roundtrip() {
        let vs = store();
        let creds = Credentials::new("sk-test").unwrap();
        vs.save_credentials(&creds);
        assert_eq!(vs.load_credentials(), Some(creds));

        vs.save_active_tab(DisplayTab::KeyPoints);
        assert_eq!(vs.load_active_tab(), Some(DisplayTab::KeyPoints));

        let selection = SavedSelection {
            kind: AnalysisKind::RiskAssessment,
            custom_query: None,
        };
        vs.save_selection(&selection);
        assert_eq!(vs.load_selection(), Some(selection));
    }

    #[test]
    fn test_blank_persisted_credentials_are_absent() {
        let vs = store();
        vs.storage().set(CREDENTIALS_KEY, r#"{"openai_api_key":"  "}"#);
        assert!(vs.load_credentials().is_none());
    }

    #[test]
    fn test_unknown_persisted_tab_is_absent() {
        let vs = store();
        vs.storage().set(ACTIVE_TAB_KEY, "\"chat\"");
        assert!(vs.load_active_tab().is_none());
    }

    #[test]
    fn test_broken_storage_degrades_to_absent() {
        let vs = ViewStore::new(StorageAdapter::new(Arc::new(BrokenBackend::default())));
        vs.store(&result(1.0), AnalysisKind::ContractReview, None);
        assert!(vs.load(AnalysisKind::ContractReview, None).is_none());
        vs.evict(AnalysisKind::CustomQuery, Some("q"));
        vs.evict_all(&AnalysisKind::ALL);
        assert!(vs.load_credentials().is_none());
    }
}
