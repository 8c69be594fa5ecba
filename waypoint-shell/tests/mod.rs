use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use url::Url;

use waypoint_core::settings::ButtonSide;
use waypoint_core::{
    AuthProbe, BrowsingContext, ConfigFetcher, ContentLoader, LoadError, LoadedContent,
    PropertyMap, PropertyValue, VisitAction,
};
use waypoint_shell::{ExternalOpener, Inbound, Shell, ShellConfig, ShellEvent, SourceOrder};

const BASE: &str = "https://app.example.com";

fn url(path: &str) -> Url {
    Url::parse(&format!("{}{}", BASE, path)).unwrap()
}

fn config() -> ShellConfig {
    let mut config = ShellConfig::default();
    config.override_base_url(BASE);
    config.app_name = "Field Notes".to_string();
    config
}

// ============================================================================
// Fakes
// ============================================================================

const SIGNED_IN: &str = r#"<html><head><meta name="turbo:authenticated" content="true"></head></html>"#;
const SIGNED_OUT: &str = r#"<html><head><meta name="turbo:authenticated" content="false"></head></html>"#;

/// Serves canned pages by path. Unknown paths answer with a signed-out page.
#[derive(Default)]
struct FakeSite {
    pages: Mutex<BTreeMap<String, Result<String, LoadError>>>,
    hang: Mutex<Vec<String>>,
    requests: Mutex<Vec<(String, String, bool)>>,
}

impl FakeSite {
    fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn page(&self, path: &str, body: &str) {
        self.pages
            .lock()
            .unwrap()
            .insert(path.to_string(), Ok(body.to_string()));
    }

    fn fail(&self, path: &str, err: LoadError) {
        self.pages.lock().unwrap().insert(path.to_string(), Err(err));
    }

    fn hang(&self, path: &str) {
        self.hang.lock().unwrap().push(path.to_string());
    }

    fn requests(&self) -> Vec<(String, String, bool)> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl ContentLoader for FakeSite {
    async fn load(
        &self,
        url: &Url,
        context: &BrowsingContext,
        bypass_cache: bool,
    ) -> anyhow::Result<LoadedContent> {
        let path = url.path().to_string();
        self.requests
            .lock()
            .unwrap()
            .push((path.clone(), context.label().to_string(), bypass_cache));

        if self.hang.lock().unwrap().contains(&path) {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        }

        let page = self.pages.lock().unwrap().get(&path).cloned();
        match page.unwrap_or_else(|| Ok(SIGNED_OUT.to_string())) {
            Ok(body) => Ok(LoadedContent {
                url: url.clone(),
                status: 200,
                content_type: Some("text/html".into()),
                body,
            }),
            Err(e) => Err(e.into()),
        }
    }
}

struct FakeConfig {
    body: Mutex<Option<String>>,
}

impl FakeConfig {
    fn serving(body: &str) -> Arc<Self> {
        Arc::new(Self {
            body: Mutex::new(Some(body.to_string())),
        })
    }

    fn offline() -> Arc<Self> {
        Arc::new(Self {
            body: Mutex::new(None),
        })
    }

    fn set(&self, body: &str) {
        *self.body.lock().unwrap() = Some(body.to_string());
    }
}

#[async_trait]
impl ConfigFetcher for FakeConfig {
    async fn fetch(&self, _url: &Url) -> anyhow::Result<String> {
        self.body
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| anyhow::anyhow!("offline"))
    }
}

#[derive(Default)]
struct RecordingOpener {
    opened: Mutex<Vec<Url>>,
}

#[async_trait]
impl ExternalOpener for RecordingOpener {
    async fn open(&self, url: &Url) -> anyhow::Result<()> {
        self.opened.lock().unwrap().push(url.clone());
        Ok(())
    }
}

struct HangingProbe;

#[async_trait]
impl AuthProbe for HangingProbe {
    async fn probe(&self, _content: &LoadedContent) -> anyhow::Result<bool> {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        Ok(true)
    }
}

const REMOTE: &str = r#"{
    "settings": {
        "tabs": [
            { "title": "Home", "icon_ios": "house", "visit": "/" },
            { "title": "Inbox", "icon_ios": "tray", "visit": "/inbox", "protected": true }
        ],
        "buttons": [
            { "path": "/", "title": "Compose", "side": "right", "visit": "/notes/new" },
            { "path": "/", "icon_ios": "gear", "side": "left", "script": "openSettings()", "protected": true }
        ]
    },
    "rules": [
        { "patterns": [".*"], "properties": { "presentation": "default" } },
        { "patterns": ["/new$"], "properties": { "presentation": "modal" } },
        { "patterns": ["^/refresh$"], "properties": { "action": "replace" } }
    ]
}"#;

struct Harness {
    shell: Shell,
    site: Arc<FakeSite>,
    fetcher: Arc<FakeConfig>,
    opener: Arc<RecordingOpener>,
}

async fn booted_with(site: Arc<FakeSite>, fetcher: Arc<FakeConfig>, config: ShellConfig) -> Harness {
    let opener = Arc::new(RecordingOpener::default());
    let mut shell = Shell::new(config, site.clone(), fetcher.clone(), opener.clone()).unwrap();
    shell.boot().await.unwrap();
    shell.settle().await;
    Harness {
        shell,
        site,
        fetcher,
        opener,
    }
}

async fn booted(site: Arc<FakeSite>) -> Harness {
    booted_with(site, FakeConfig::serving(REMOTE), config()).await
}

impl Harness {
    async fn send(&mut self, event: ShellEvent) {
        let _ = self.shell.handle(event).await;
        self.shell.settle().await;
    }

    async fn visit(&mut self, path: &str) {
        self.send(ShellEvent::visit(url(path), VisitAction::Advance))
            .await;
    }

    fn stack_paths(&self) -> Vec<String> {
        self.shell
            .state()
            .stack
            .entries()
            .iter()
            .map(|s| s.url().path().to_string())
            .collect()
    }
}

// ============================================================================
// Boot Tests
// ============================================================================

#[tokio::test]
async fn test_boot_visits_root_and_loads_it() {
    let h = booted(FakeSite::new()).await;
    let snapshot = h.shell.snapshot();
    assert_eq!(snapshot.stack.len(), 1);
    assert_eq!(snapshot.stack[0].url, url("/"));
    assert_eq!(snapshot.stack[0].state, "loaded");
    assert!(snapshot.modal.is_none());
    assert_eq!(h.site.requests(), vec![("/".to_string(), "primary".to_string(), false)]);
}

#[tokio::test]
async fn test_boot_with_unreachable_config_uses_bundled_settings() {
    let h = booted_with(FakeSite::new(), FakeConfig::offline(), config()).await;
    assert_eq!(h.shell.settings().tabs[0].title.as_deref(), Some("Home"));
    assert_eq!(h.stack_paths(), vec!["/"]);
}

#[tokio::test]
async fn test_signed_out_boot_hides_protected_affordances() {
    let h = booted(FakeSite::new()).await;
    let affordances = &h.shell.state().affordances;
    assert_eq!(affordances.tabs.len(), 1);
    assert_eq!(affordances.right_buttons.len(), 1);
    assert!(affordances.left_buttons.is_empty());
    assert!(!h.shell.state().gate.is_authenticated());
}

// ============================================================================
// Visit Routing Through The Shell
// ============================================================================

#[tokio::test]
async fn test_advance_then_home_collapses() {
    let mut h = booted(FakeSite::new()).await;
    h.visit("/notes").await;
    h.visit("/notes/7").await;
    assert_eq!(h.stack_paths(), vec!["/", "/notes", "/notes/7"]);

    h.visit("/").await;
    assert_eq!(h.stack_paths(), vec!["/"]);
    assert!(h.shell.snapshot().stack[0].state == "loaded");
}

#[tokio::test]
async fn test_modal_rule_presents_without_touching_stack() {
    let mut h = booted(FakeSite::new()).await;
    h.visit("/notes").await;
    let top_before = h.shell.state().stack.top().unwrap().id();

    h.visit("/notes/new").await;
    assert_eq!(h.stack_paths(), vec!["/", "/notes"]);
    assert_eq!(h.shell.state().stack.top().unwrap().id(), top_before);

    let modal = h.shell.snapshot().modal.unwrap();
    assert_eq!(modal.url, url("/notes/new"));
    assert_eq!(modal.state, "loaded");
    assert_eq!(h.site.requests().last().unwrap().1, "modal");
}

#[tokio::test]
async fn test_visit_while_modal_presented_dismisses_it() {
    let mut h = booted(FakeSite::new()).await;
    h.visit("/notes/new").await;
    assert!(h.shell.state().modal.is_presented());

    h.visit("/notes").await;
    assert!(!h.shell.state().modal.is_presented());
    assert_eq!(h.stack_paths(), vec!["/", "/notes"]);
}

#[tokio::test]
async fn test_dismiss_modal() {
    let mut h = booted(FakeSite::new()).await;
    h.visit("/notes/new").await;
    h.send(ShellEvent::DismissModal).await;
    assert!(h.shell.snapshot().modal.is_none());
    assert_eq!(h.stack_paths(), vec!["/"]);
}

#[tokio::test]
async fn test_replace_rule_forces_reload() {
    let mut h = booted(FakeSite::new()).await;
    h.visit("/notes").await;
    h.visit("/refresh").await;
    assert_eq!(h.stack_paths(), vec!["/", "/refresh"]);

    let last = h.site.requests().last().cloned().unwrap();
    assert_eq!(last, ("/refresh".to_string(), "primary".to_string(), true));
}

#[tokio::test]
async fn test_same_url_refreshes_in_place() {
    let mut h = booted(FakeSite::new()).await;
    h.visit("/notes").await;
    let old_top = h.shell.state().stack.top().unwrap().id();
    h.visit("/notes").await;
    assert_eq!(h.stack_paths(), vec!["/", "/notes"]);
    assert_ne!(h.shell.state().stack.top().unwrap().id(), old_top);
}

#[tokio::test]
async fn test_caller_properties_overlay_rules() {
    let mut h = booted(FakeSite::new()).await;
    let properties: PropertyMap = [("presentation", PropertyValue::Text("modal".into()))]
        .into_iter()
        .collect();
    h.send(ShellEvent::Propose {
        url: url("/notes/3"),
        action: VisitAction::Advance,
        properties,
    })
    .await;
    assert!(h.shell.state().modal.is_presented());
    assert_eq!(h.stack_paths(), vec!["/"]);
}

#[tokio::test]
async fn test_back_pops_and_reloads_new_top() {
    let mut h = booted(FakeSite::new()).await;
    h.visit("/notes").await;
    h.send(ShellEvent::Back).await;
    assert_eq!(h.stack_paths(), vec!["/"]);
    assert_eq!(h.site.requests().last().unwrap().0, "/");

    h.send(ShellEvent::Back).await;
    assert_eq!(h.stack_paths(), vec!["/"]);
}

// ============================================================================
// External Links
// ============================================================================

#[tokio::test]
async fn test_external_link_bypasses_routing() {
    let mut h = booted(FakeSite::new()).await;
    let before = h.site.requests().len();
    h.send(ShellEvent::visit(
        Url::parse("https://docs.example.org/guide").unwrap(),
        VisitAction::Advance,
    ))
    .await;

    assert_eq!(h.stack_paths(), vec!["/"]);
    assert_eq!(h.site.requests().len(), before);
    assert_eq!(
        h.opener.opened.lock().unwrap().as_slice(),
        &[Url::parse("https://docs.example.org/guide").unwrap()]
    );
}

// ============================================================================
// Error Notices
// ============================================================================

#[tokio::test]
async fn test_unauthorized_load_shows_one_login_notice() {
    let site = FakeSite::new();
    site.fail("/private", LoadError::http(401));
    let mut h = booted(site).await;
    let authenticated_before = h.shell.state().gate.is_authenticated();

    h.visit("/private").await;

    let snapshot = h.shell.snapshot();
    let top = snapshot.stack.last().unwrap();
    let notice = top.notice.as_ref().unwrap();
    assert_eq!(notice.title, "Login Required");
    assert_eq!(notice.icon, "lock.shield");
    assert_eq!(notice.screen_title, "Field Notes");
    assert_eq!(h.shell.state().notices_shown(), 1);
    assert_eq!(h.shell.state().gate.is_authenticated(), authenticated_before);
}

#[tokio::test]
async fn test_failure_keeps_authenticated_state() {
    let site = FakeSite::new();
    site.page("/", SIGNED_IN);
    site.fail("/private", LoadError::http(401));
    let mut h = booted(site).await;
    assert!(h.shell.state().gate.is_authenticated());

    h.visit("/private").await;
    assert!(h.shell.state().gate.is_authenticated());
    assert_eq!(h.shell.state().affordances.tabs.len(), 2);
}

#[tokio::test]
async fn test_each_failure_kind_gets_its_notice() {
    let site = FakeSite::new();
    site.fail("/missing", LoadError::http(404));
    site.fail("/offline", LoadError::NetworkFailure { reason: "no route".into() });
    site.fail("/image", LoadError::ContentTypeMismatch { content_type: "image/png".into() });
    let mut h = booted(site).await;

    for (path, title) in [
        ("/missing", "Page Not Found"),
        ("/offline", "Network Failure"),
        ("/image", "Content Type Mismatch"),
    ] {
        h.visit(path).await;
        let snapshot = h.shell.snapshot();
        let top = snapshot.stack.last().unwrap();
        assert_eq!(top.notice.as_ref().unwrap().title, title);
        assert!(top.state.starts_with("failed"));
    }
    assert_eq!(h.shell.state().notices_shown(), 3);
}

#[tokio::test]
async fn test_failed_modal_gets_notice() {
    let site = FakeSite::new();
    site.fail("/notes/new", LoadError::http(500));
    let mut h = booted(site).await;
    h.visit("/notes/new").await;
    let modal = h.shell.snapshot().modal.unwrap();
    assert_eq!(modal.notice.unwrap().title, "Problem Loading Page");
}

// ============================================================================
// Capability Gate Through The Shell
// ============================================================================

#[tokio::test]
async fn test_marker_reveals_protected_affordances_immediately() {
    let site = FakeSite::new();
    site.page("/session", SIGNED_IN);
    let mut h = booted(site).await;
    let mut affordances = h.shell.subscribe();
    assert_eq!(affordances.borrow().tabs.len(), 1);

    h.visit("/session").await;

    assert!(h.shell.state().gate.is_authenticated());
    assert!(affordances.has_changed().unwrap());
    assert_eq!(affordances.borrow_and_update().tabs.len(), 2);
}

#[tokio::test]
async fn test_missing_marker_signs_out() {
    let site = FakeSite::new();
    site.page("/", SIGNED_IN);
    site.page("/plain", "<p>no marker here</p>");
    let mut h = booted(site).await;
    assert!(h.shell.state().gate.is_authenticated());

    h.visit("/plain").await;
    assert!(!h.shell.state().gate.is_authenticated());
    assert_eq!(h.shell.state().affordances.tabs.len(), 1);
}

#[tokio::test]
async fn test_hung_probe_times_out_as_signed_out() {
    let mut config = config();
    config.probe_timeout_ms = 50;
    let site = FakeSite::new();
    let opener = Arc::new(RecordingOpener::default());
    let mut shell = Shell::new(config, site, FakeConfig::serving(REMOTE), opener)
        .unwrap()
        .with_probe(Arc::new(HangingProbe));
    shell.boot().await.unwrap();
    shell.settle().await;

    assert_eq!(shell.snapshot().stack[0].state, "loaded");
    assert!(!shell.state().gate.is_authenticated());
}

// ============================================================================
// Tabs And Buttons
// ============================================================================

#[tokio::test]
async fn test_select_tab_resets_stack() {
    let site = FakeSite::new();
    site.page("/", SIGNED_IN);
    site.page("/inbox", SIGNED_IN);
    site.page("/notes", SIGNED_IN);
    let mut h = booted(site).await;
    h.visit("/notes").await;

    h.send(ShellEvent::SelectTab(1)).await;
    assert_eq!(h.stack_paths(), vec!["/inbox"]);
    assert_eq!(h.shell.state().affordances.selected_tab, Some(1));
}

#[tokio::test]
async fn test_selected_tab_survives_later_loads() {
    let site = FakeSite::new();
    site.page("/", SIGNED_IN);
    site.page("/inbox", SIGNED_IN);
    site.page("/inbox/4", SIGNED_IN);
    let mut h = booted(site).await;
    assert_eq!(h.shell.state().affordances.selected_tab, Some(0));

    h.send(ShellEvent::SelectTab(1)).await;
    h.visit("/inbox/4").await;
    assert_eq!(h.stack_paths(), vec!["/inbox", "/inbox/4"]);
    assert_eq!(h.shell.state().affordances.selected_tab, Some(1));
    assert_eq!(h.shell.subscribe().borrow().selected_tab, Some(1));
}

#[tokio::test]
async fn test_hidden_selected_tab_falls_back_to_first() {
    let site = FakeSite::new();
    site.page("/", SIGNED_IN);
    site.page("/inbox", SIGNED_IN);
    site.page("/plain", "<p>signed out</p>");
    let mut h = booted(site).await;

    h.send(ShellEvent::SelectTab(1)).await;
    assert_eq!(h.shell.state().affordances.selected_tab, Some(1));

    h.visit("/plain").await;
    assert_eq!(h.shell.state().affordances.tabs.len(), 1);
    assert_eq!(h.shell.state().affordances.selected_tab, Some(0));
}

#[tokio::test]
async fn test_protected_tab_ignored_when_signed_out() {
    let mut h = booted(FakeSite::new()).await;
    h.send(ShellEvent::SelectTab(1)).await;
    assert_eq!(h.stack_paths(), vec!["/"]);
}

#[tokio::test]
async fn test_button_visit_follows_rules() {
    let mut h = booted(FakeSite::new()).await;
    h.send(ShellEvent::TapButton {
        side: ButtonSide::Right,
        index: 0,
    })
    .await;
    assert_eq!(h.shell.snapshot().modal.unwrap().url, url("/notes/new"));
}

#[tokio::test]
async fn test_button_script_failure_is_not_a_notice() {
    let site = FakeSite::new();
    site.page("/", SIGNED_IN);
    let mut h = booted(site).await;
    assert_eq!(h.shell.state().affordances.left_buttons.len(), 1);

    h.send(ShellEvent::TapButton {
        side: ButtonSide::Left,
        index: 0,
    })
    .await;
    assert_eq!(h.shell.state().notices_shown(), 0);
    assert_eq!(h.stack_paths(), vec!["/"]);
}

#[tokio::test]
async fn test_refresh_configuration_replaces_settings() {
    let mut h = booted(FakeSite::new()).await;
    h.fetcher.set(
        r#"{ "settings": { "tabs": [ { "title": "Only", "visit": "/" } ] }, "rules": [] }"#,
    );
    assert_eq!(h.shell.settings().tabs.len(), 2);

    h.send(ShellEvent::RefreshConfiguration).await;
    assert_eq!(h.shell.settings().tabs.len(), 1);
    assert_eq!(h.shell.state().affordances.tabs[0].title.as_deref(), Some("Only"));
}

#[tokio::test]
async fn test_bundled_first_order_lets_remote_rules_win() {
    let mut config = config();
    config.source_order = SourceOrder::BundledFirst;
    let remote = r#"{ "rules": [ { "patterns": ["/new$"], "properties": { "presentation": "default" } } ] }"#;
    let mut h = booted_with(FakeSite::new(), FakeConfig::serving(remote), config).await;

    h.visit("/notes/new").await;
    assert!(!h.shell.state().modal.is_presented());
    assert_eq!(h.stack_paths(), vec!["/", "/notes/new"]);
}

#[tokio::test]
async fn test_remote_only_modal_rule_applies_under_default_order() {
    let remote = r#"{ "rules": [ { "patterns": ["^/compose$"], "properties": { "presentation": "modal" } } ] }"#;
    let mut h = booted_with(FakeSite::new(), FakeConfig::serving(remote), config()).await;

    h.visit("/compose").await;
    assert_eq!(h.shell.snapshot().modal.unwrap().url, url("/compose"));
    assert_eq!(h.stack_paths(), vec!["/"]);
}

#[tokio::test]
async fn test_bundled_configuration_file_replaces_builtin_rules() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("rules.json");
    std::fs::write(
        &path,
        r#"{ "settings": { "tabs": [ { "title": "Local", "visit": "/" } ] },
             "rules": [ { "patterns": ["^/compose$"], "properties": { "presentation": "modal" } } ] }"#,
    )
    .unwrap();
    let mut config = config();
    config.bundled_configuration = Some(path);

    let mut h = booted_with(FakeSite::new(), FakeConfig::offline(), config).await;
    assert_eq!(h.shell.settings().tabs[0].title.as_deref(), Some("Local"));

    h.visit("/compose").await;
    assert!(h.shell.state().modal.is_presented());
    h.send(ShellEvent::DismissModal).await;

    h.visit("/notes/new").await;
    assert!(!h.shell.state().modal.is_presented());
    assert_eq!(h.stack_paths(), vec!["/", "/notes/new"]);
}

// ============================================================================
// Supersession
// ============================================================================

#[tokio::test]
async fn test_newer_visit_supersedes_hung_load() {
    let site = FakeSite::new();
    site.hang("/slow");
    let mut h = booted(site).await;

    let _ = h
        .shell
        .handle(ShellEvent::visit(url("/slow"), VisitAction::Advance))
        .await;
    assert!(h.shell.is_loading());
    h.visit("/fast").await;

    let snapshot = h.shell.snapshot();
    assert_eq!(h.stack_paths(), vec!["/", "/slow", "/fast"]);
    assert_eq!(snapshot.stack[1].state, "pending");
    assert_eq!(snapshot.stack[2].state, "loaded");
    assert!(!h.shell.is_loading());
}

// ============================================================================
// Event Loop
// ============================================================================

#[tokio::test]
async fn test_run_loop_reports_after_loads_settle() {
    let site = FakeSite::new();
    let opener = Arc::new(RecordingOpener::default());
    let mut shell = Shell::new(config(), site, FakeConfig::serving(REMOTE), opener).unwrap();
    shell.boot().await.unwrap();
    shell.settle().await;

    let (tx, rx) = mpsc::channel(8);
    let task = tokio::spawn(shell.run(rx));

    tx.send(ShellEvent::visit(url("/notes"), VisitAction::Advance).into())
        .await
        .unwrap();
    let (reply, report) = oneshot::channel();
    tx.send(Inbound::Snapshot(reply)).await.unwrap();
    let snapshot = report.await.unwrap();

    assert_eq!(snapshot.stack.len(), 2);
    assert!(snapshot.stack.iter().all(|s| s.state == "loaded"));

    tx.send(ShellEvent::Shutdown.into()).await.unwrap();
    tokio::time::timeout(Duration::from_secs(5), task)
        .await
        .unwrap()
        .unwrap();
}

#[tokio::test]
async fn test_run_loop_stops_when_senders_drop() {
    let opener = Arc::new(RecordingOpener::default());
    let shell = Shell::new(config(), FakeSite::new(), FakeConfig::serving(REMOTE), opener).unwrap();
    let (tx, rx) = mpsc::channel::<Inbound>(1);
    let task = tokio::spawn(shell.run(rx));
    drop(tx);
    tokio::time::timeout(Duration::from_secs(5), task)
        .await
        .unwrap()
        .unwrap();
}
