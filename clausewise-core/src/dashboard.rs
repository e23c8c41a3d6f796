//! Dashboard controller: the composition root of the client.
//!
//! Owns the UI state (selected analysis kind, custom query text, credentials,
//! in-flight flag, current result, active tab) and orchestrates the analysis
//! backend and the view store. Both collaborators are injected at
//! construction so tests can substitute fakes.
//!
//! State machine:
//!
//! ```text
//!            submit (valid)               backend Ok -> store slot
//!   Idle ─────────────────────► Analyzing ───────────────────────► Idle(result)
//!    ▲                             │
//!    └──── backend Err (prior result kept, nothing stored) ◄──────┘
//! ```
//!
//! At most one submission is in flight per dashboard; a second one is
//! rejected with [`DashboardError::Busy`].

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{debug, info, warn};

use crate::client::{AnalysisBackend, HttpAnalysisClient};
use crate::config::ClientConfig;
use crate::error::{AnalysisError, DashboardError};
use crate::storage::StorageAdapter;
use crate::types::{
    AnalysisKind, AnalysisRequest, AnalysisResult, ContractFile, Credentials, DisplayTab,
};
use crate::view_store::{SavedSelection, ViewStore};

/// Observable controller state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DashboardState {
    /// Idle, nothing to display for the active selector.
    Empty,
    /// Idle, a result is displayed.
    Ready,
    /// A submission is outstanding.
    Analyzing,
}

impl std::fmt::Display for DashboardState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DashboardState::Empty => write!(f, "idle (no result)"),
            DashboardState::Ready => write!(f, "idle (result present)"),
            DashboardState::Analyzing => write!(f, "analyzing"),
        }
    }
}

/// A point-in-time copy of everything the display layer needs.
#[derive(Debug, Clone, PartialEq)]
pub struct DashboardSnapshot {
    pub state: DashboardState,
    pub kind: AnalysisKind,
    pub custom_query: String,
    pub has_credentials: bool,
    pub active_tab: DisplayTab,
    pub result: Option<AnalysisResult>,
}

#[derive(Debug, Default)]
struct Inner {
    kind: AnalysisKind,
    custom_query: String,
    credentials: Option<Credentials>,
    analyzing: bool,
    result: Option<AnalysisResult>,
    active_tab: DisplayTab,
}

impl Inner {
    fn state(&self) -> DashboardState {
        if self.analyzing {
            DashboardState::Analyzing
        } else if self.result.is_some() {
            DashboardState::Ready
        } else {
            DashboardState::Empty
        }
    }

    fn request(&self) -> AnalysisRequest {
        AnalysisRequest::new(self.kind, Some(&self.custom_query))
    }

    fn selection(&self) -> SavedSelection {
        let query = self.custom_query.trim();
        SavedSelection {
            kind: self.kind,
            custom_query: (!query.is_empty()).then(|| query.to_string()),
        }
    }

    fn ensure_idle(&self) -> Result<(), DashboardError> {
        if self.analyzing {
            Err(DashboardError::Busy)
        } else {
            Ok(())
        }
    }
}

/// The dashboard controller.
pub struct Dashboard {
    backend: Arc<dyn AnalysisBackend>,
    store: ViewStore,
    default_tab: DisplayTab,
    inner: Mutex<Inner>,
}

impl Dashboard {
    /// Mount the dashboard, restoring persisted credentials, selection, tab,
    /// and the stored result for the restored selector. Makes no network call.
    pub fn mount(backend: Arc<dyn AnalysisBackend>, store: ViewStore) -> Self {
        Self::mount_with_default_tab(backend, store, DisplayTab::default())
    }

    /// Like [`Dashboard::mount`], with the tab to show when none is persisted.
    pub fn mount_with_default_tab(
        backend: Arc<dyn AnalysisBackend>,
        store: ViewStore,
        default_tab: DisplayTab,
    ) -> Self {
        let selection = store.load_selection().unwrap_or_default();
        let mut inner = Inner {
            kind: selection.kind,
            custom_query: selection.custom_query.unwrap_or_default(),
            credentials: store.load_credentials(),
            analyzing: false,
            result: None,
            active_tab: store.load_active_tab().unwrap_or(default_tab),
        };
        inner.result = Self::resolve_slot(&store, &inner);

        debug!(
            backend = backend.name(),
            storage = store.storage().backend_name(),
            kind = %inner.kind,
            state = %inner.state(),
            has_credentials = inner.credentials.is_some(),
            "Dashboard mounted"
        );

        Self {
            backend,
            store,
            default_tab,
            inner: Mutex::new(inner),
        }
    }

    /// Mount over the HTTP backend and storage medium described by `config`.
    pub fn from_config(config: &ClientConfig) -> crate::Result<Self> {
        let backend = Arc::new(HttpAnalysisClient::new(&config.backend)?);
        let store = ViewStore::new(StorageAdapter::from_config(&config.storage));
        Ok(Self::mount_with_default_tab(
            backend,
            store,
            config.ui.default_tab,
        ))
    }

    pub fn store(&self) -> &ViewStore {
        &self.store
    }

    fn inner(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Look up the stored result for the current selector.
    ///
    /// A `Custom Query` selector with blank text has no slot.
    fn resolve_slot(store: &ViewStore, inner: &Inner) -> Option<AnalysisResult> {
        if inner.kind.is_custom() && inner.custom_query.trim().is_empty() {
            return None;
        }
        store.load(inner.kind, Some(&inner.custom_query))
    }

    pub fn state(&self) -> DashboardState {
        self.inner().state()
    }

    pub fn result(&self) -> Option<AnalysisResult> {
        self.inner().result.clone()
    }

    pub fn kind(&self) -> AnalysisKind {
        self.inner().kind
    }

    pub fn custom_query(&self) -> String {
        self.inner().custom_query.clone()
    }

    pub fn has_credentials(&self) -> bool {
        self.inner().credentials.is_some()
    }

    pub fn active_tab(&self) -> DisplayTab {
        self.inner().active_tab
    }

    pub fn snapshot(&self) -> DashboardSnapshot {
        let inner = self.inner();
        DashboardSnapshot {
            state: inner.state(),
            kind: inner.kind,
            custom_query: inner.custom_query.clone(),
            has_credentials: inner.credentials.is_some(),
            active_tab: inner.active_tab,
            result: inner.result.clone(),
        }
    }

    /// Save the API key in memory and in storage.
    ///
    /// A blank key is rejected and the previous credential is kept.
    pub fn save_credentials(&self, api_key: &str) -> Result<(), AnalysisError> {
        let credentials = Credentials::new(api_key)
            .ok_or_else(|| AnalysisError::configuration("API key must not be empty"))?;
        self.store.save_credentials(&credentials);
        self.inner().credentials = Some(credentials);
        info!("API configuration saved");
        Ok(())
    }

    /// Use an API key for this session only, without persisting it.
    pub fn use_session_credentials(&self, api_key: &str) -> Result<(), AnalysisError> {
        let credentials = Credentials::new(api_key)
            .ok_or_else(|| AnalysisError::configuration("API key must not be empty"))?;
        self.inner().credentials = Some(credentials);
        Ok(())
    }

    pub fn clear_credentials(&self) {
        self.store.clear_credentials();
        self.inner().credentials = None;
    }

    /// Switch analysis kind and show whatever its slot holds.
    ///
    /// The previous kind's stored result stays in its own slot.
    pub fn select_kind(&self, kind: AnalysisKind) -> Result<(), DashboardError> {
        let mut inner = self.inner();
        inner.ensure_idle()?;
        inner.kind = kind;
        self.store.save_selection(&inner.selection());
        inner.result = Self::resolve_slot(&self.store, &inner);
        debug!(kind = %kind, state = %inner.state(), "Analysis kind selected");
        Ok(())
    }

    /// Change the custom query text and re-resolve the slot.
    pub fn set_custom_query(&self, text: &str) -> Result<(), DashboardError> {
        let mut inner = self.inner();
        inner.ensure_idle()?;
        inner.custom_query = text.to_string();
        self.store.save_selection(&inner.selection());
        inner.result = Self::resolve_slot(&self.store, &inner);
        Ok(())
    }

    pub fn set_active_tab(&self, tab: DisplayTab) {
        self.inner().active_tab = tab;
        self.store.save_active_tab(tab);
    }

    /// Analyze a contract under the active selector.
    ///
    /// Rejected synchronously, with no state change and no network call,
    /// when credentials are missing, a custom query is blank, or the file
    /// type is not accepted. On backend
    /// failure the prior result is kept and nothing is persisted.
    pub async fn submit(&self, file: &ContractFile) -> Result<AnalysisResult, DashboardError> {
        let (request, credentials) = {
            let mut inner = self.inner();
            inner.ensure_idle()?;
            let credentials = inner
                .credentials
                .clone()
                .ok_or_else(|| AnalysisError::configuration("API configuration not set"))?;
            let request = inner.request();
            request.validate()?;
            file.validate()?;
            inner.analyzing = true;
            (request, credentials)
        };
        let _in_flight = InFlight(self);

        info!(
            file = %file.file_name,
            kind = %request.kind(),
            backend = self.backend.name(),
            "Analyzing contract"
        );

        let outcome = self
            .backend
            .analyze(file, &request, Some(&credentials))
            .await;

        let mut inner = self.inner();
        match outcome {
            Ok(result) => {
                self.store
                    .store(&result, request.kind(), request.custom_query());
                inner.result = Some(result.clone());
                info!(risk_score = result.risk_score, "Analysis complete");
                Ok(result)
            }
            Err(e) => {
                warn!(error = %e, "Analysis failed; keeping previous result");
                Err(e.into())
            }
        }
    }

    /// "New upload": forget the active slot's result.
    pub fn new_upload(&self) -> Result<(), DashboardError> {
        let mut inner = self.inner();
        inner.ensure_idle()?;
        if !(inner.kind.is_custom() && inner.custom_query.trim().is_empty()) {
            self.store.evict(inner.kind, Some(&inner.custom_query));
        }
        inner.result = None;
        Ok(())
    }

    /// "Clear all data": evict every slot and setting, reset to defaults.
    pub fn clear_all(&self) -> Result<(), DashboardError> {
        let mut inner = self.inner();
        inner.ensure_idle()?;
        self.store.evict_all(&AnalysisKind::ALL);
        *inner = Inner {
            active_tab: self.default_tab,
            ..Inner::default()
        };
        info!("All dashboard data cleared");
        Ok(())
    }
}

/// Clears the in-flight flag when a submission ends, including when its
/// future is dropped before completion.
struct InFlight<'a>(&'a Dashboard);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.inner().analyzing = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::MockAnalysisBackend;
    use crate::config::StorageKind;
    use pretty_assertions::assert_eq;

    fn sample(score: f64) -> AnalysisResult {
        AnalysisResult {
            analysis: "analysis".into(),
            key_points: "points".into(),
            recommendations: "recs".into(),
            risk_score: score,
        }
    }

    fn contract() -> ContractFile {
        ContractFile::new("contract.pdf", b"%PDF-1.4".to_vec())
    }

    fn mount(mock: Arc<MockAnalysisBackend>, store: &ViewStore) -> Dashboard {
        Dashboard::mount(mock, store.clone())
    }

    #[test]
    fn test_fresh_mount_defaults() {
        let store = ViewStore::new(StorageAdapter::in_memory());
        let dash = mount(Arc::new(MockAnalysisBackend::new()), &store);
        let snap = dash.snapshot();
        assert_eq!(snap.state, DashboardState::Empty);
        assert_eq!(snap.kind, AnalysisKind::ContractReview);
        assert_eq!(snap.active_tab, DisplayTab::Analysis);
        assert!(!snap.has_credentials);
    }

    #[test]
    fn test_blank_credentials_rejected_and_prior_kept() {
        let store = ViewStore::new(StorageAdapter::in_memory());
        let dash = mount(Arc::new(MockAnalysisBackend::new()), &store);
        dash.save_credentials("sk-one").unwrap();
        assert!(dash.save_credentials("   ").is_err());
        assert!(dash.has_credentials());
        assert_eq!(store.load_credentials().unwrap().api_key(), "sk-one");
    }

    #[test]
    fn test_session_credentials_not_persisted() {
        let store = ViewStore::new(StorageAdapter::in_memory());
        let dash = mount(Arc::new(MockAnalysisBackend::new()), &store);
        dash.use_session_credentials("sk-temp").unwrap();
        assert!(dash.has_credentials());
        assert!(store.load_credentials().is_none());
    }

    #[tokio::test]
    async fn test_submit_success_stores_and_displays() {
        let store = ViewStore::new(StorageAdapter::in_memory());
        let mock = Arc::new(MockAnalysisBackend::with_outcomes(vec![Ok(sample(7.2))]));
        let dash = mount(mock.clone(), &store);
        dash.save_credentials("sk-test").unwrap();

        let result = dash.submit(&contract()).await.unwrap();
        assert_eq!(result, sample(7.2));
        assert_eq!(dash.state(), DashboardState::Ready);
        assert_eq!(store.load(AnalysisKind::ContractReview, None), Some(sample(7.2)));
        assert_eq!(mock.call_count(), 1);
    }

    #[tokio::test]
    async fn test_submit_without_credentials_is_rejected() {
        let store = ViewStore::new(StorageAdapter::in_memory());
        let mock = Arc::new(MockAnalysisBackend::with_outcomes(vec![Ok(sample(1.0))]));
        let dash = mount(mock.clone(), &store);

        let err = dash.submit(&contract()).await.unwrap_err();
        assert!(matches!(
            err,
            DashboardError::Analysis(AnalysisError::Configuration { .. })
        ));
        assert_eq!(mock.call_count(), 0);
        assert_eq!(dash.state(), DashboardState::Empty);
    }

    #[tokio::test]
    async fn test_submit_unsupported_file_type_is_rejected() {
        let store = ViewStore::new(StorageAdapter::in_memory());
        let mock = Arc::new(MockAnalysisBackend::with_outcomes(vec![Ok(sample(1.0))]));
        let dash = mount(mock.clone(), &store);
        dash.save_credentials("sk-test").unwrap();

        let err = dash
            .submit(&ContractFile::new("contract.exe", vec![0x4d, 0x5a]))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DashboardError::Analysis(AnalysisError::Configuration { .. })
        ));
        assert_eq!(mock.call_count(), 0);
        assert_eq!(dash.state(), DashboardState::Empty);
    }

    #[tokio::test]
    async fn test_failed_submit_keeps_prior_result() {
        let store = ViewStore::new(StorageAdapter::in_memory());
        let mock = Arc::new(MockAnalysisBackend::with_outcomes(vec![
            Ok(sample(2.0)),
            Err(AnalysisError::Parse {
                message: "bad".into(),
            }),
        ]));
        let dash = mount(mock, &store);
        dash.save_credentials("sk-test").unwrap();

        dash.submit(&contract()).await.unwrap();
        assert!(dash.submit(&contract()).await.is_err());
        assert_eq!(dash.result(), Some(sample(2.0)));
        assert_eq!(dash.state(), DashboardState::Ready);
        assert_eq!(store.load(AnalysisKind::ContractReview, None), Some(sample(2.0)));
    }

    #[tokio::test]
    async fn test_switching_kinds_keeps_slots() {
        let store = ViewStore::new(StorageAdapter::in_memory());
        let mock = Arc::new(MockAnalysisBackend::with_outcomes(vec![
            Ok(sample(1.0)),
            Ok(sample(5.0)),
        ]));
        let dash = mount(mock, &store);
        dash.save_credentials("sk-test").unwrap();

        dash.submit(&contract()).await.unwrap();
        dash.select_kind(AnalysisKind::RiskAssessment).unwrap();
        assert_eq!(dash.state(), DashboardState::Empty);
        dash.submit(&contract()).await.unwrap();

        dash.select_kind(AnalysisKind::ContractReview).unwrap();
        assert_eq!(dash.result(), Some(sample(1.0)));
        dash.select_kind(AnalysisKind::RiskAssessment).unwrap();
        assert_eq!(dash.result(), Some(sample(5.0)));
    }

    #[tokio::test]
    async fn test_new_upload_evicts_only_active_slot() {
        let store = ViewStore::new(StorageAdapter::in_memory());
        store.store(&sample(4.0), AnalysisKind::LegalResearch, None);
        store.store(&sample(6.0), AnalysisKind::ContractReview, None);
        let dash = mount(Arc::new(MockAnalysisBackend::new()), &store);
        assert_eq!(dash.state(), DashboardState::Ready);

        dash.new_upload().unwrap();
        assert_eq!(dash.state(), DashboardState::Empty);
        assert!(store.load(AnalysisKind::ContractReview, None).is_none());
        assert_eq!(store.load(AnalysisKind::LegalResearch, None), Some(sample(4.0)));
    }

    #[test]
    fn test_clear_all_resets_everything() {
        let store = ViewStore::new(StorageAdapter::in_memory());
        store.store(&sample(4.0), AnalysisKind::RiskAssessment, None);
        let dash = mount(Arc::new(MockAnalysisBackend::new()), &store);
        dash.save_credentials("sk-test").unwrap();
        dash.select_kind(AnalysisKind::RiskAssessment).unwrap();
        dash.set_active_tab(DisplayTab::Recommendations);

        dash.clear_all().unwrap();

        let snap = dash.snapshot();
        assert_eq!(snap.state, DashboardState::Empty);
        assert_eq!(snap.kind, AnalysisKind::ContractReview);
        assert_eq!(snap.active_tab, DisplayTab::Analysis);
        assert!(!snap.has_credentials);
        assert!(store.load(AnalysisKind::RiskAssessment, None).is_none());
        assert!(store.load_selection().is_none());
    }

    #[test]
    fn test_mount_restores_selection_tab_and_result() {
        let store = ViewStore::new(StorageAdapter::in_memory());
        store.store(&sample(8.0), AnalysisKind::CustomQuery, Some("Who owns IP?"));
        store.save_selection(&SavedSelection {
            kind: AnalysisKind::CustomQuery,
            custom_query: Some("Who owns IP?".into()),
        });
        store.save_active_tab(DisplayTab::KeyPoints);

        let dash = mount(Arc::new(MockAnalysisBackend::new()), &store);
        let snap = dash.snapshot();
        assert_eq!(snap.kind, AnalysisKind::CustomQuery);
        assert_eq!(snap.custom_query, "Who owns IP?");
        assert_eq!(snap.active_tab, DisplayTab::KeyPoints);
        assert_eq!(snap.result, Some(sample(8.0)));
    }

    #[test]
    fn test_default_tab_used_when_nothing_persisted() {
        let store = ViewStore::new(StorageAdapter::in_memory());
        let dash = Dashboard::mount_with_default_tab(
            Arc::new(MockAnalysisBackend::new()),
            store,
            DisplayTab::Recommendations,
        );
        assert_eq!(dash.active_tab(), DisplayTab::Recommendations);
    }

    #[test]
    fn test_from_config_uses_configured_medium_and_tab() {
        let mut config = ClientConfig::default();
        config.storage.backend = StorageKind::Memory;
        config.ui.default_tab = DisplayTab::KeyPoints;

        let dash = Dashboard::from_config(&config).unwrap();
        assert_eq!(dash.store().storage().backend_name(), "memory");
        assert_eq!(dash.active_tab(), DisplayTab::KeyPoints);
        assert_eq!(dash.state(), DashboardState::Empty);
    }
}
