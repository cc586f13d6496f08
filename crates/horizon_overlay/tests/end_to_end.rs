use horizon_host::{
    ClientKey, ConnectedClients, ConnectionHub, LocalEventBus, RecordingTransport, TickScheduler,
    WireOperation,
};
use horizon_overlay::{
    presets, DisplayRenderer, Overlay, OverlayComponent, OverlayRegistry, OverlayRuntime,
    OverlaySettings, Tag, TagSources, OVERLAY_COMPONENT_ID,
};
use horizon_session::SessionRegistry;
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::Arc;

struct Host {
    hub: ConnectionHub,
    sessions: Arc<SessionRegistry>,
    overlays: Arc<OverlayRegistry>,
    scheduler: Arc<TickScheduler>,
    transport: Arc<RecordingTransport>,
    clients: Arc<ConnectedClients>,
}

fn host(settings: OverlaySettings) -> Host {
    let bus = Arc::new(LocalEventBus::new());
    let clients = Arc::new(ConnectedClients::new());
    let scheduler = Arc::new(TickScheduler::new());
    let transport = Arc::new(RecordingTransport::new());

    let sessions = Arc::new(SessionRegistry::new(bus.clone()));
    let runtime = OverlayRuntime::new(
        Arc::new(DisplayRenderer::new(transport.clone())),
        scheduler.clone(),
        clients.clone(),
    );
    let overlays = OverlayRegistry::new(sessions.clone(), runtime, settings);

    let hub = ConnectionHub::new(clients.clone(), bus);
    hub.add_listener(sessions.clone());
    hub.add_listener(overlays.clone());

    Host {
        hub,
        sessions,
        overlays,
        scheduler,
        transport,
        clients,
    }
}

fn kinds(ops: &[WireOperation]) -> Vec<&'static str> {
    ops.iter().map(WireOperation::kind).collect()
}

#[test]
fn connect_auto_display_refresh_and_disconnect() {
    let host = host(OverlaySettings::default());
    let kills = Arc::new(AtomicI32::new(0));
    let counter = kills.clone();
    host.overlays.register(
        Overlay::builder("stats", "Stats", "test")
            .refresh_interval(10)
            .line("Kills: {kills}", 1)
            .tag(Tag::new("kills", "Kill count", move |_: &ClientKey| {
                counter.load(Ordering::SeqCst)
            }))
            .build(),
    );

    let client = ClientKey::new();
    assert!(host.hub.connect(client, "Alice"));
    assert!(host.sessions.get_session(&client).is_some());
    assert!(host.transport.is_empty(), "auto-display must be deferred");

    host.scheduler.advance(19);
    assert!(host.transport.is_empty());
    host.scheduler.advance(1);

    let ops = host.transport.take();
    assert_eq!(
        ops.iter().map(|(_, op)| op.kind()).collect::<Vec<_>>(),
        vec!["create_display_surface", "replace_entries"]
    );
    assert!(ops.iter().all(|(target, _)| *target == client));

    kills.store(3, Ordering::SeqCst);
    host.scheduler.advance(10);
    let ops: Vec<WireOperation> = host.transport.take().into_iter().map(|(_, op)| op).collect();
    assert_eq!(
        kinds(&ops),
        vec![
            "destroy_display_surface",
            "create_display_surface",
            "replace_entries"
        ]
    );
    let WireOperation::ReplaceEntries { entries, .. } = &ops[2] else {
        panic!("expected entries");
    };
    assert_eq!(entries[0].text, "Kills: 3");

    let component = host
        .sessions
        .component_as::<OverlayComponent>(&client, OVERLAY_COMPONENT_ID)
        .unwrap();
    assert!(host.hub.disconnect(&client));
    assert!(!component.is_showing());
    assert!(!component.has_refresh_timer());
    assert_eq!(
        kinds(&host.transport.operations_for(&client)),
        vec!["destroy_display_surface"]
    );
    assert!(host.sessions.get_session(&client).is_none());

    host.transport.take();
    host.scheduler.advance(100);
    assert!(host.transport.is_empty());
    assert_eq!(host.scheduler.pending_tasks(), 0);
}

#[test]
fn client_gone_before_deferred_display_gets_nothing() {
    let host = host(OverlaySettings::default());
    host.overlays
        .register(presets::with_lines("hello", "Hello", "test", ["hi"]));

    let client = ClientKey::new();
    host.hub.connect(client, "Bob");
    host.hub.disconnect(&client);
    host.scheduler.advance(40);

    assert!(host.transport.is_empty());
}

#[test]
fn auto_display_can_be_disabled() {
    let host = host(OverlaySettings {
        auto_display: false,
        ..OverlaySettings::default()
    });
    host.overlays
        .register(presets::with_lines("hello", "Hello", "test", ["hi"]));

    host.hub.connect(ClientKey::new(), "Carol");
    host.scheduler.advance(40);

    assert!(host.transport.is_empty());
    assert_eq!(host.scheduler.pending_tasks(), 0);
}

#[test]
fn clients_see_their_own_values() {
    let host = host(OverlaySettings {
        auto_display_delay_ticks: 1,
        ..OverlaySettings::default()
    });
    let sources = TagSources::new(host.clients.clone(), 10);
    let overlay = presets::player_info("me", "Me", "test", &sources);
    overlay.add_line(horizon_overlay::Line::new("Hi {player}", 1));
    host.overlays.register(overlay);

    let (alice, bob) = (ClientKey::new(), ClientKey::new());
    host.hub.connect(alice, "Alice");
    host.hub.connect(bob, "Bob");
    host.scheduler.tick();

    for (client, expected) in [(alice, "Hi Alice"), (bob, "Hi Bob")] {
        let ops = host.transport.operations_for(&client);
        let Some(WireOperation::ReplaceEntries { entries, .. }) = ops.last() else {
            panic!("expected entries for {}", client);
        };
        assert_eq!(entries[0].text, expected);
    }
    assert_eq!(host.overlays.viewers_of("me").len(), 2);
}

#[test]
fn late_overlay_module_reaches_existing_clients() {
    let bus = Arc::new(LocalEventBus::new());
    let clients = Arc::new(ConnectedClients::new());
    let sessions = Arc::new(SessionRegistry::new(bus.clone()));
    let hub = ConnectionHub::new(clients.clone(), bus);
    hub.add_listener(sessions.clone());

    let client = ClientKey::new();
    hub.connect(client, "Dave");

    let transport = Arc::new(RecordingTransport::new());
    let runtime = OverlayRuntime::new(
        Arc::new(DisplayRenderer::new(transport.clone())),
        Arc::new(TickScheduler::new()),
        clients,
    );
    let overlays = OverlayRegistry::new(sessions, runtime, OverlaySettings::default());
    overlays.register(Overlay::builder("late", "Late", "test").line("x", 1).build());

    assert!(overlays.show_to(&client, "late"));
    assert_eq!(transport.len(), 2);
}
