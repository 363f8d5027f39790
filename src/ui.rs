//! Loading indicators, in-flight flags, and panel alerts.
//!
//! Every network-backed operation holds a [`LoadingGuard`] for its panel
//! while the request is outstanding. The guard clears the indicator when it
//! is dropped, so the indicator is restored on success, on error, and when
//! the future is cancelled mid-request.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// The three panels of the application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Panel {
    Chat,
    Collection,
    Upload,
}

impl Panel {
    fn index(self) -> usize {
        match self {
            Panel::Chat => 0,
            Panel::Collection => 1,
            Panel::Upload => 2,
        }
    }
}

/// Loading state per panel. Cheap to clone; clones share state.
///
/// Nested guards on the same panel are counted, so the indicator stays on
/// until the last one is released.
#[derive(Debug, Clone, Default)]
pub struct LoadingIndicators {
    active: Arc<[AtomicUsize; 3]>,
}

impl LoadingIndicators {
    pub fn new() -> Self {
        Self::default()
    }

    /// Show the indicator for `panel` until the returned guard is dropped.
    pub fn begin(&self, panel: Panel) -> LoadingGuard {
        self.active[panel.index()].fetch_add(1, Ordering::SeqCst);
        LoadingGuard {
            indicators: self.clone(),
            panel,
        }
    }

    pub fn is_loading(&self, panel: Panel) -> bool {
        self.active[panel.index()].load(Ordering::SeqCst) > 0
    }
}

/// Scoped loading state; see [`LoadingIndicators::begin`].
#[must_use = "the loading indicator is cleared as soon as the guard is dropped"]
#[derive(Debug)]
pub struct LoadingGuard {
    indicators: LoadingIndicators,
    panel: Panel,
}

impl Drop for LoadingGuard {
    fn drop(&mut self) {
        self.indicators.active[self.panel.index()].fetch_sub(1, Ordering::SeqCst);
    }
}

/// Single-slot "request in flight" flag for one operation.
#[derive(Debug, Clone, Default)]
pub struct InFlight {
    busy: Arc<AtomicBool>,
}

impl InFlight {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the flag. Returns `None` if a request is already running.
    pub fn try_begin(&self) -> Option<InFlightGuard> {
        self.busy
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .ok()
            .map(|_| InFlightGuard {
                busy: self.busy.clone(),
            })
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::SeqCst)
    }
}

#[must_use = "the in-flight flag is released as soon as the guard is dropped"]
#[derive(Debug)]
pub struct InFlightGuard {
    busy: Arc<AtomicBool>,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.busy.store(false, Ordering::SeqCst);
    }
}

// ============ Alerts ============

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertKind {
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Alert {
    pub kind: AlertKind,
    pub message: String,
}

impl Alert {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            kind: AlertKind::Success,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            kind: AlertKind::Error,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for Alert {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.kind {
            AlertKind::Success => write!(f, "✓ {}", self.message),
            AlertKind::Error => write!(f, "✗ {}", self.message),
        }
    }
}

/// Latest alert per panel. Showing a new alert replaces the previous one.
#[derive(Debug, Clone, Default)]
pub struct Alerts {
    slots: Arc<Mutex<[Option<Alert>; 3]>>,
}

impl Alerts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn show(&self, panel: Panel, alert: Alert) {
        match alert.kind {
            AlertKind::Success => tracing::info!(?panel, "{}", alert.message),
            AlertKind::Error => tracing::warn!(?panel, "{}", alert.message),
        }
        self.lock()[panel.index()] = Some(alert);
    }

    pub fn current(&self, panel: Panel) -> Option<Alert> {
        self.lock()[panel.index()].clone()
    }

    pub fn dismiss(&self, panel: Panel) {
        self.lock()[panel.index()] = None;
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, [Option<Alert>; 3]> {
        // A poisoned slot array is still a valid slot array.
        self.slots.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_guard_clears_on_drop() {
        let loading = LoadingIndicators::new();
        {
            let _guard = loading.begin(Panel::Chat);
            assert!(loading.is_loading(Panel::Chat));
            assert!(!loading.is_loading(Panel::Upload));
        }
        assert!(!loading.is_loading(Panel::Chat));
    }

    #[test]
    fn test_nested_guards() {
        let loading = LoadingIndicators::new();
        let outer = loading.begin(Panel::Collection);
        let inner = loading.begin(Panel::Collection);
        drop(inner);
        assert!(loading.is_loading(Panel::Collection));
        drop(outer);
        assert!(!loading.is_loading(Panel::Collection));
    }

    #[test]
    fn test_guard_clears_on_early_return() {
        fn failing(loading: &LoadingIndicators) -> Result<(), String> {
            let _guard = loading.begin(Panel::Upload);
            Err("boom".into())
        }
        let loading = LoadingIndicators::new();
        assert!(failing(&loading).is_err());
        assert!(!loading.is_loading(Panel::Upload));
    }

    #[test]
    fn test_in_flight_rejects_second_claim() {
        let flag = InFlight::new();
        let guard = flag.try_begin().unwrap();
        assert!(flag.is_busy());
        assert!(flag.try_begin().is_none());
        drop(guard);
        assert!(flag.try_begin().is_some());
    }

    #[test]
    fn test_alert_replaces_previous() {
        let alerts = Alerts::new();
        alerts.show(Panel::Collection, Alert::error("first"));
        alerts.show(Panel::Collection, Alert::success("second"));
        assert_eq!(
            alerts.current(Panel::Collection),
            Some(Alert::success("second"))
        );
        assert_eq!(alerts.current(Panel::Upload), None);
        alerts.dismiss(Panel::Collection);
        assert_eq!(alerts.current(Panel::Collection), None);
    }
}
