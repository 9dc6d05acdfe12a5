//! Router navigation, view caching, and fault containment.
//!
//! Run with: `cargo test -p vellum --test router`

use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use vellum::prelude::*;
use vellum::router::topics;

// =============================================================================
// Test View
// =============================================================================

struct Page {
    id: ComponentId,
    title: &'static str,
    ctx: AppContext,
    config: Value,
    notes: String,
    initialized: u32,
    updates: Vec<Value>,
    init_delay: Option<Duration>,
    needs: Option<&'static str>,
    fail_init: bool,
    fail_destroy: bool,
    destroy_delay: Option<Duration>,
    panic_destroy: bool,
}

#[async_trait]
impl Component for Page {
    fn id(&self) -> ComponentId {
        self.id
    }

    fn name(&self) -> &str {
        self.title
    }

    async fn initialize(&mut self) -> Result<()> {
        if let Some(delay) = self.init_delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(dependency) = self.needs {
            self.ctx.readiness.wait(dependency).await?;
        }
        if self.fail_init {
            return Err(Error::component(self.title, "character data missing"));
        }
        self.ctx
            .bus
            .subscribe("character:saved", |_| Ok(()), SubscribeOptions::new().owned_by(self.id))?;
        self.initialized += 1;
        Ok(())
    }

    fn render(&self) -> Node {
        Node::element("main")
            .attr("data-view", self.title)
            .child(Node::text(self.notes.clone()))
    }

    async fn update(&mut self, data: Value) -> Result<()> {
        self.updates.push(data);
        Ok(())
    }

    async fn destroy(&mut self) -> Result<()> {
        if let Some(delay) = self.destroy_delay {
            tokio::time::sleep(delay).await;
        }
        if self.panic_destroy {
            panic!("listener map poisoned");
        }
        if self.fail_destroy {
            return Err(Error::component(self.title, "listener already detached"));
        }
        Ok(())
    }

    impl_component_any!();
}

type Factory = Box<dyn Fn(ComponentId, Value, &AppContext) -> Result<Box<dyn Component>> + Send + Sync>;

fn page_with(title: &'static str, tweak: fn(&mut Page)) -> Factory {
    Box::new(move |id, config, ctx| {
        let mut page = Page {
            id,
            title,
            ctx: ctx.clone(),
            config,
            notes: String::new(),
            initialized: 0,
            updates: Vec::new(),
            init_delay: None,
            needs: None,
            fail_init: false,
            fail_destroy: false,
            destroy_delay: None,
            panic_destroy: false,
        };
        tweak(&mut page);
        let component: Box<dyn Component> = Box::new(page);
        Ok(component)
    })
}

fn page(title: &'static str) -> Factory {
    page_with(title, |_| {})
}

fn router_with(config: RuntimeConfig, views: Vec<(&str, Factory)>) -> Router {
    let router = Router::new(AppContext::new(config));
    for (name, factory) in views {
        router.register_view(name, factory).unwrap();
    }
    router
}

fn root(router: &Router) -> Container {
    router.context().root_container().unwrap()
}

// =============================================================================
// Navigation
// =============================================================================

#[tokio::test]
async fn test_navigate_mounts_single_view() {
    let router = router_with(RuntimeConfig::default(), vec![("roster", page("roster")), ("sheet", page("sheet"))]);
    assert_eq!(router.state(), RouterState::NoView);

    router.navigate_to("roster", json!({})).await.unwrap();
    router.navigate_to("sheet", json!({})).await.unwrap();

    assert_eq!(router.state(), RouterState::Viewing("sheet".to_string()));
    let container = root(&router);
    assert_eq!(container.len(), 1);
    let current = router.current_view().unwrap();
    assert_eq!(container.owners(), vec![current.lock().await.id()]);
    assert!(container.to_markup().contains("data-view=\"sheet\""));
    assert_eq!(router.cached_views(), vec!["roster", "sheet"]);
}

#[tokio::test]
async fn test_unknown_view_changes_nothing() {
    let router = router_with(RuntimeConfig::default(), vec![("roster", page("roster"))]);
    router.navigate_to("roster", json!({})).await.unwrap();
    let before = root(&router).to_markup();

    let err = router.navigate_to("merits", json!({})).await.unwrap_err();

    assert!(matches!(
        err,
        Error::NotRegistered { kind: EntryKind::View, ref name } if name == "merits"
    ));
    assert_eq!(root(&router).to_markup(), before);
    assert_eq!(router.current_view_name().as_deref(), Some("roster"));
    assert!(router.current_view().unwrap().lock().await.is_mounted());
}

#[tokio::test]
async fn test_round_trip_keeps_instance_state() {
    let router = router_with(RuntimeConfig::default(), vec![("a", page("a")), ("b", page("b"))]);

    router.navigate_to("a", json!({})).await.unwrap();
    let first = router.view("a").unwrap();
    first.lock().await.downcast_mut::<Page>().unwrap().notes = "Vitae 7/10".to_string();

    router.navigate_to("b", json!({})).await.unwrap();
    {
        let a = first.lock().await;
        assert_eq!(a.state(), LifecycleState::Destroyed);
    }
    router.navigate_to("a", json!({})).await.unwrap();

    let current = router.current_view().unwrap();
    assert!(Arc::ptr_eq(&current, &first));
    let host = current.lock().await;
    let page = host.downcast_ref::<Page>().unwrap();
    assert_eq!(page.notes, "Vitae 7/10");
    assert_eq!(page.initialized, 2);
    assert_eq!(host.mount_count(), 2);
    assert!(root(&router).to_markup().contains("Vitae 7/10"));
}

#[tokio::test]
async fn test_params_reach_fresh_and_reused_views() {
    let router = router_with(RuntimeConfig::default(), vec![("roster", page("roster")), ("sheet", page("sheet"))]);
    let mira = json!({"character": "mira"});
    let ash = json!({"character": "ash"});

    router.navigate_to("sheet", mira.clone()).await.unwrap();
    {
        let view = router.view("sheet").unwrap();
        let host = view.lock().await;
        let page = host.downcast_ref::<Page>().unwrap();
        assert_eq!(page.config, mira);
        assert!(page.updates.is_empty());
    }

    router.navigate_to("roster", json!({})).await.unwrap();
    router.navigate_to("sheet", ash.clone()).await.unwrap();

    let view = router.view("sheet").unwrap();
    let host = view.lock().await;
    let page = host.downcast_ref::<Page>().unwrap();
    assert_eq!(page.config, mira);
    assert_eq!(page.updates, vec![ash.clone()]);
    assert_eq!(router.current_params(), Some(ash));
}

#[tokio::test]
async fn test_navigate_to_current_view_remounts_it() {
    let router = router_with(RuntimeConfig::default(), vec![("sheet", page("sheet"))]);

    router.navigate_to("sheet", json!({"tab": "traits"})).await.unwrap();
    router.navigate_to("sheet", json!({"tab": "merits"})).await.unwrap();

    let view = router.current_view().unwrap();
    let host = view.lock().await;
    assert_eq!(host.mount_count(), 2);
    assert_eq!(host.downcast_ref::<Page>().unwrap().updates, vec![json!({"tab": "merits"})]);
    assert_eq!(root(&router).len(), 1);
}

#[tokio::test]
async fn test_unmounted_views_release_subscriptions() {
    let router = router_with(RuntimeConfig::default(), vec![("a", page("a")), ("b", page("b"))]);
    let bus = router.context().bus.clone();

    router.navigate_to("a", json!({})).await.unwrap();
    assert_eq!(bus.subscriber_count("character:saved"), 1);

    router.navigate_to("b", json!({})).await.unwrap();
    assert_eq!(bus.subscriber_count("character:saved"), 1);

    let a_id = router.view("a").unwrap().lock().await.id();
    assert_eq!(bus.unsubscribe(a_id), 0);
}

#[tokio::test]
async fn test_navigated_event_is_published() {
    let router = router_with(RuntimeConfig::default(), vec![("roster", page("roster")), ("sheet", page("sheet"))]);
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    router
        .context()
        .bus
        .subscribe(
            topics::NAVIGATED,
            move |event| {
                sink.lock().unwrap().push(event.payload.clone());
                Ok(())
            },
            SubscribeOptions::new(),
        )
        .unwrap();

    router.navigate_to("roster", json!({})).await.unwrap();
    router.navigate_to("sheet", json!({"character": "mira"})).await.unwrap();

    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 2);
    assert_eq!(seen[0], json!({"from": null, "to": "roster", "params": {}}));
    assert_eq!(
        seen[1],
        json!({"from": "roster", "to": "sheet", "params": {"character": "mira"}})
    );
}

// =============================================================================
// Fault Containment
// =============================================================================

#[tokio::test]
async fn test_observer_faults_are_contained() {
    let router = router_with(RuntimeConfig::default(), vec![("roster", page("roster"))]);
    let changes = Arc::new(Mutex::new(Vec::new()));
    let sink = changes.clone();

    router.on_view_change(|_| Err("breadcrumb missing".into()));
    router.on_view_change(|_| panic!("title bar exploded"));
    router.on_view_change(move |change| {
        sink.lock().unwrap().push(change.clone());
        Ok(())
    });

    router.navigate_to("roster", json!({"filter": "kindred"})).await.unwrap();

    assert_eq!(
        *changes.lock().unwrap(),
        vec![ViewChange {
            from: None,
            to: "roster".to_string(),
            params: json!({"filter": "kindred"}),
        }]
    );
    let faults = router.context().diagnostics.faults();
    assert_eq!(faults.len(), 2);
    assert_eq!(
        faults[0].source,
        FaultSource::Observer {
            index: 0,
            view: "roster".to_string()
        }
    );
    assert!(faults[0].message.contains("breadcrumb missing"));
    assert!(matches!(faults[1].source, FaultSource::Observer { index: 1, .. }));
}

#[tokio::test]
async fn test_failed_cleanup_does_not_block_navigation() {
    let router = router_with(
        RuntimeConfig::default(),
        vec![
            ("sticky", page_with("sticky", |p| p.fail_destroy = true)),
            ("roster", page("roster")),
        ],
    );

    router.navigate_to("sticky", json!({})).await.unwrap();
    router.navigate_to("roster", json!({})).await.unwrap();

    assert_eq!(router.current_view_name().as_deref(), Some("roster"));
    let container = root(&router);
    assert_eq!(container.len(), 1);
    assert!(!container.to_markup().contains("sticky"));

    let faults = router.context().diagnostics.faults();
    assert_eq!(faults.len(), 1);
    assert_eq!(faults[0].source, FaultSource::Cleanup { view: "sticky".to_string() });
}

#[tokio::test]
async fn test_panicking_cleanup_does_not_block_navigation() {
    let router = router_with(
        RuntimeConfig::default(),
        vec![
            ("sticky", page_with("sticky", |p| p.panic_destroy = true)),
            ("roster", page("roster")),
        ],
    );

    router.navigate_to("sticky", json!({})).await.unwrap();
    router.navigate_to("roster", json!({})).await.unwrap();

    assert_eq!(router.state(), RouterState::Viewing("roster".to_string()));
    let container = root(&router);
    assert_eq!(container.len(), 1);
    assert!(!container.to_markup().contains("sticky"));
    let sticky = router.view("sticky").unwrap();
    assert_eq!(sticky.lock().await.state(), LifecycleState::Destroyed);
    assert_eq!(router.context().bus.subscriber_count("character:saved"), 1);

    let faults = router.context().diagnostics.faults();
    assert_eq!(faults.len(), 1);
    assert_eq!(faults[0].source, FaultSource::Cleanup { view: "sticky".to_string() });
    assert!(faults[0].message.contains("listener map poisoned"));
}

#[tokio::test]
async fn test_failed_mount_leaves_no_view() {
    let router = router_with(
        RuntimeConfig::default(),
        vec![("roster", page("roster")), ("broken", page_with("broken", |p| p.fail_init = true))],
    );
    router.navigate_to("roster", json!({})).await.unwrap();

    let err = router.navigate_to("broken", json!({})).await.unwrap_err();

    assert!(matches!(err, Error::Component { .. }));
    assert_eq!(router.state(), RouterState::NoView);
    assert!(root(&router).is_empty());
    assert!(matches!(
        router.context().diagnostics.faults()[0].source,
        FaultSource::Mount { ref view } if view == "broken"
    ));

    // The router stays usable.
    router.navigate_to("roster", json!({})).await.unwrap();
    assert_eq!(root(&router).len(), 1);
}

#[tokio::test]
async fn test_missing_root_container_is_fatal() {
    let ctx = AppContext::new(RuntimeConfig::default()).with_document(Document::new());
    let router = Router::new(ctx);
    router.register_view("roster", page("roster")).unwrap();

    let err = router.navigate_to("roster", json!({})).await.unwrap_err();

    assert!(err.is_fatal());
    assert!(matches!(err, Error::ContainerNotFound(ref id) if id == "app"));
    assert_eq!(router.state(), RouterState::NoView);
}

#[tokio::test(start_paused = true)]
async fn test_unready_dependency_aborts_mount() {
    let config = RuntimeConfig::new().with_dependency_wait(Duration::from_millis(10), 5);
    let router = router_with(config, vec![("sheet", page_with("sheet", |p| p.needs = Some("rules")))]);
    let start = tokio::time::Instant::now();

    let err = router.navigate_to("sheet", json!({})).await.unwrap_err();

    assert_eq!(start.elapsed(), Duration::from_millis(50));
    assert!(matches!(err, Error::DependencyUnavailable { ref dependency, .. } if dependency == "rules"));
    assert!(root(&router).is_empty());
    assert_eq!(router.context().bus.subscriber_count("character:saved"), 0);
}

#[tokio::test(start_paused = true)]
async fn test_late_dependency_is_awaited() {
    let router = router_with(
        RuntimeConfig::default(),
        vec![("sheet", page_with("sheet", |p| p.needs = Some("rules")))],
    );
    let readiness = router.context().readiness.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(300)).await;
        readiness.announce("rules");
    });

    router.navigate_to("sheet", json!({})).await.unwrap();

    assert_eq!(router.current_view_name().as_deref(), Some("sheet"));
}

// =============================================================================
// Concurrent Navigation
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_queue_policy_serializes_navigations() {
    let slow = |p: &mut Page| p.init_delay = Some(Duration::from_millis(20));
    let router = router_with(
        RuntimeConfig::new().with_navigation_policy(NavigationPolicy::Queue),
        vec![("a", page_with("a", slow)), ("b", page_with("b", slow))],
    );

    let (a, b) = tokio::join!(
        router.navigate_to("a", json!({})),
        router.navigate_to("b", json!({}))
    );
    a.unwrap();
    b.unwrap();

    let container = root(&router);
    assert_eq!(container.len(), 1);
    let current = router.current_view().unwrap();
    assert_eq!(container.owners(), vec![current.lock().await.id()]);

    let mut mounted = 0;
    for name in ["a", "b"] {
        if router.view(name).unwrap().lock().await.is_mounted() {
            mounted += 1;
        }
    }
    assert_eq!(mounted, 1);
}

#[tokio::test(start_paused = true)]
async fn test_reject_policy_refuses_overlap() {
    let slow = |p: &mut Page| p.init_delay = Some(Duration::from_millis(20));
    let router = router_with(
        RuntimeConfig::new().with_navigation_policy(NavigationPolicy::Reject),
        vec![("a", page_with("a", slow)), ("b", page_with("b", slow))],
    );

    let (a, b) = tokio::join!(
        router.navigate_to("a", json!({})),
        router.navigate_to("b", json!({}))
    );

    let (winner, rejected) = match (a, b) {
        (Ok(()), Err(err)) => ("a", err),
        (Err(err), Ok(())) => ("b", err),
        other => panic!("expected exactly one rejection, got {other:?}"),
    };
    match rejected {
        Error::NavigationInProgress { requested, active } => {
            assert_ne!(requested, winner);
            assert_eq!(active, winner);
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(router.current_view_name().as_deref(), Some(winner));
    assert_eq!(root(&router).len(), 1);

    // Once the slot is free, navigation proceeds again.
    router.navigate_to(if winner == "a" { "b" } else { "a" }, json!({})).await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_dropped_navigation_still_completes() {
    let router = router_with(
        RuntimeConfig::default(),
        vec![
            ("a", page_with("a", |p| p.destroy_delay = Some(Duration::from_millis(100)))),
            ("b", page("b")),
            ("c", page("c")),
        ],
    );
    router.navigate_to("a", json!({})).await.unwrap();

    let abandoned = tokio::time::timeout(Duration::from_millis(10), router.navigate_to("b", json!({}))).await;
    assert!(abandoned.is_err());

    router.navigate_to("c", json!({})).await.unwrap();

    assert_eq!(router.state(), RouterState::Viewing("c".to_string()));
    let container = root(&router);
    assert_eq!(container.len(), 1);
    let markup = container.to_markup();
    assert!(markup.contains("data-view=\"c\""));
    assert!(!markup.contains("data-view=\"a\""));
    for name in ["a", "b"] {
        let view = router.view(name).unwrap();
        let host = view.lock().await;
        assert_eq!(host.state(), LifecycleState::Destroyed);
        assert_eq!(host.mount_count(), 1);
    }
    assert_eq!(router.context().bus.subscriber_count("character:saved"), 1);
    assert!(router.context().diagnostics.is_empty());
}
