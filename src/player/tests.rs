use std::cell::RefCell;
use std::rc::Rc;
use std::sync::mpsc;
use std::time::{Duration, Instant};

use serde_json::json;

use super::lifecycle::CREATE_RETRY_INTERVAL;
use super::testing::{Call, FakeFactory};
use super::*;

struct Rig {
    factory: FakeFactory,
    slot: SurfaceSlot,
    volume: Rc<RefCell<f64>>,
    url: Rc<RefCell<String>>,
    autoplay: Rc<RefCell<bool>>,
    looping: Rc<RefCell<bool>>,
    player: Player,
}

fn surface() -> Surface {
    Surface {
        label: "test".to_string(),
        window_id: None,
    }
}

fn rig(attached: bool) -> Rig {
    let factory = FakeFactory::default();
    let slot = SurfaceSlot::default();
    if attached {
        slot.attach(surface());
    }
    let volume = Rc::new(RefCell::new(0.5));
    let url = Rc::new(RefCell::new("https://cdn/ep1.m3u8".to_string()));
    let autoplay = Rc::new(RefCell::new(true));
    let looping = Rc::new(RefCell::new(false));
    let options = PlayerOptions::default()
        .url(Dynamic::Shared(Rc::clone(&url)))
        .volume(Dynamic::Shared(Rc::clone(&volume)))
        .muted(false)
        .autoplay(Dynamic::Shared(Rc::clone(&autoplay)))
        .loop_playback(Dynamic::Shared(Rc::clone(&looping)));
    let player = Player::new(options, factory.boxed(), Rc::new(slot.clone()));
    Rig {
        factory,
        slot,
        volume,
        url,
        autoplay,
        looping,
        player,
    }
}

fn ms(n: u64) -> Duration {
    Duration::from_millis(n)
}

#[test]
fn mount_binds_engine_with_resolved_snapshot_and_baseline_listeners() {
    let mut rig = rig(true);
    assert_eq!(rig.player.mount(Instant::now()), CreateOutcome::Bound);
    assert!(rig.player.is_bound());

    let instance = rig.factory.instance(0);
    assert_eq!(instance.snapshot.fields.volume, Some(0.5));
    assert_eq!(instance.snapshot.fields.autoplay, Some(true));
    assert_eq!(instance.surface, surface());
    assert_eq!(
        instance.calls,
        vec![Call::On("ready".to_string()), Call::On("error".to_string())]
    );
}

#[test]
fn mount_retries_until_surface_is_attached() {
    let mut rig = rig(false);
    let start = Instant::now();
    assert_eq!(rig.player.mount(start), CreateOutcome::Pending);
    assert!(rig.player.has_pending_create());

    assert_eq!(rig.player.poll(start + ms(50)), None);
    assert_eq!(
        rig.player.poll(start + CREATE_RETRY_INTERVAL),
        Some(CreateOutcome::Pending)
    );
    assert!(rig.factory.instances().is_empty());

    rig.slot.attach(surface());
    let later = start + CREATE_RETRY_INTERVAL * 2;
    assert_eq!(rig.player.poll(later), Some(CreateOutcome::Bound));
    assert_eq!(rig.factory.live_count(), 1);
    assert!(!rig.player.has_pending_create());
}

#[test]
fn retry_uses_options_as_resolved_at_attempt_time() {
    let mut rig = rig(false);
    let start = Instant::now();
    rig.player.mount(start);
    *rig.volume.borrow_mut() = 0.9;
    rig.slot.attach(surface());
    rig.player.poll(start + CREATE_RETRY_INTERVAL);
    assert_eq!(rig.factory.instance(0).snapshot.fields.volume, Some(0.9));
}

#[test]
fn unmount_during_pending_retry_leaves_no_engine_and_no_retry() {
    let mut rig = rig(false);
    let start = Instant::now();
    rig.player.mount(start);
    rig.player.unmount();
    assert!(!rig.player.has_pending_create());

    rig.slot.attach(surface());
    assert_eq!(rig.player.poll(start + CREATE_RETRY_INTERVAL * 10), None);
    assert!(rig.factory.instances().is_empty());
    assert!(!rig.player.is_bound());
}

#[test]
fn construction_failure_is_reported_and_not_retried() {
    let mut rig = rig(true);
    rig.factory.fail_next("mpv missing");
    let start = Instant::now();
    assert_eq!(rig.player.mount(start), CreateOutcome::Failed);
    assert!(!rig.player.is_bound());
    assert!(!rig.player.has_pending_create());
    assert_eq!(rig.player.last_error(), Some("mpv missing"));
    assert_eq!(rig.player.poll(start + CREATE_RETRY_INTERVAL * 5), None);
    assert!(rig.factory.instances().is_empty());

    assert_eq!(rig.player.mount(start), CreateOutcome::Bound);
    assert_eq!(rig.player.last_error(), None);
}

#[test]
fn unmount_destroys_bound_engine_and_is_idempotent() {
    let mut rig = rig(true);
    rig.player.mount(Instant::now());
    rig.player.unmount();
    rig.player.unmount();
    let instance = rig.factory.instance(0);
    assert!(instance.destroyed);
    assert_eq!(
        instance.calls.iter().filter(|c| **c == Call::Destroy).count(),
        1
    );
}

#[test]
fn volume_change_calls_setter_once_without_reconstruction() {
    let mut rig = rig(true);
    let now = Instant::now();
    rig.player.mount(now);
    *rig.volume.borrow_mut() = 0.25;
    rig.player.sync(now);
    rig.player.sync(now);

    assert_eq!(rig.factory.instances().len(), 1);
    assert_eq!(
        rig.factory.instance(0).control_calls(),
        vec![Call::Volume(0.25)]
    );
}

#[test]
fn sync_without_changes_makes_no_engine_calls() {
    let mut rig = rig(true);
    let now = Instant::now();
    rig.player.mount(now);
    let before = rig.factory.instance(0).calls.len();
    for _ in 0..3 {
        rig.player.sync(now);
    }
    assert_eq!(rig.factory.instance(0).calls.len(), before);
}

#[test]
fn url_change_switches_source_instead_of_recreating() {
    let mut rig = rig(true);
    let now = Instant::now();
    rig.player.mount(now);
    *rig.url.borrow_mut() = "https://cdn/ep2.m3u8".to_string();
    rig.player.sync(now);
    assert_eq!(rig.factory.instances().len(), 1);
    assert_eq!(
        rig.factory.instance(0).control_calls(),
        vec![Call::SwitchUrl("https://cdn/ep2.m3u8".to_string())]
    );
}

#[test]
fn loop_change_recreates_engine_exactly_once() {
    let mut rig = rig(true);
    let now = Instant::now();
    rig.player.mount(now);
    *rig.looping.borrow_mut() = true;
    rig.player.sync(now);

    assert!(rig.factory.instance(0).destroyed);
    assert!(!rig.player.is_bound());
    assert!(rig.player.has_pending_create());

    rig.player.play();
    assert_eq!(rig.factory.instance(0).control_calls(), vec![Call::Destroy]);

    assert_eq!(
        rig.player.poll(now + CREATE_RETRY_INTERVAL),
        Some(CreateOutcome::Bound)
    );
    rig.player.poll(now + CREATE_RETRY_INTERVAL * 3);
    rig.player.sync(now + CREATE_RETRY_INTERVAL * 3);

    let instances = rig.factory.instances();
    assert_eq!(instances.len(), 2);
    assert_eq!(instances[1].snapshot.fields.loop_playback, Some(true));
    assert_eq!(rig.player.generation(), 2);

    rig.player.play();
    assert_eq!(rig.factory.instance(1).control_calls(), vec![Call::Play]);
    assert_eq!(rig.factory.instance(0).control_calls(), vec![Call::Destroy]);
}

#[test]
fn recreation_detaches_subscribers_before_the_engine_goes_down() {
    let mut rig = rig(true);
    let now = Instant::now();
    rig.player.mount(now);
    let hits = Rc::new(RefCell::new(0));
    let counter = Rc::clone(&hits);
    rig.player
        .on(EventKind::Destroy, move |_| *counter.borrow_mut() += 1);

    *rig.looping.borrow_mut() = true;
    rig.player.sync(now);
    rig.player.poll(now + CREATE_RETRY_INTERVAL);

    assert_eq!(*hits.borrow(), 0);
    let calls = rig.factory.instance(0).calls;
    let tail = &calls[calls.len() - 2..];
    assert!(matches!(tail[0], Call::Off(_)));
    assert_eq!(tail[1], Call::Destroy);
}

#[test]
fn engine_initiated_destroy_still_reaches_subscribers() {
    let mut rig = rig(true);
    let now = Instant::now();
    rig.player.mount(now);
    let hits = Rc::new(RefCell::new(0));
    let counter = Rc::clone(&hits);
    rig.player
        .on(EventKind::Destroy, move |_| *counter.borrow_mut() += 1);

    rig.factory.emit("destroy", vec![]);
    rig.player.poll(now);
    assert_eq!(*hits.borrow(), 1);
}

#[test]
fn autoplay_change_applies_live_fields_before_recreating() {
    let mut rig = rig(true);
    let now = Instant::now();
    rig.player.mount(now);
    *rig.volume.borrow_mut() = 0.1;
    *rig.autoplay.borrow_mut() = false;
    rig.player.sync(now);

    assert_eq!(
        rig.factory.instance(0).control_calls(),
        vec![Call::Volume(0.1), Call::Destroy]
    );
    rig.player.poll(now + CREATE_RETRY_INTERVAL);
    let fresh = rig.factory.instance(1);
    assert_eq!(fresh.snapshot.fields.autoplay, Some(false));
    assert_eq!(fresh.snapshot.fields.volume, Some(0.1));
}

#[test]
fn changes_while_unbound_are_dropped_not_replayed() {
    let mut rig = rig(false);
    let now = Instant::now();
    rig.player.sync(now);
    *rig.volume.borrow_mut() = 0.3;
    *rig.looping.borrow_mut() = true;
    rig.player.sync(now);
    assert!(!rig.player.has_pending_create());

    rig.slot.attach(surface());
    rig.player.mount(now);
    rig.player.sync(now);
    assert_eq!(rig.factory.instance(0).control_calls(), Vec::<Call>::new());
    assert_eq!(rig.factory.instances().len(), 1);
}

#[test]
fn controls_are_ignored_while_unbound() {
    let mut rig = rig(false);
    rig.player.play();
    rig.player.seek(12.0);
    rig.player.set_volume(0.2);
    assert!(!rig.player.is_playing());
    assert_eq!(rig.player.duration(), 0.0);
    assert_eq!(rig.player.current_time(), 0.0);
    assert_eq!(rig.player.current_volume(), 0.0);
    assert!(!rig.player.is_muted());
}

#[test]
fn controls_validate_their_inputs() {
    let mut rig = rig(true);
    rig.player.mount(Instant::now());
    rig.player.set_volume(3.0);
    rig.player.set_playback_rate(-1.0);
    rig.player.set_playback_rate(1.5);
    rig.player.seek(f64::NAN);
    rig.player.seek(-4.0);
    rig.player.set_muted(true);
    rig.player.toggle();
    assert_eq!(
        rig.factory.instance(0).control_calls(),
        vec![
            Call::Volume(1.0),
            Call::Rate(1.5),
            Call::Seek(0.0),
            Call::Muted(true),
            Call::Toggle,
        ]
    );
    assert!(rig.player.is_muted());
    assert_eq!(rig.player.current_volume(), 1.0);
}

#[test]
fn subscription_while_unbound_is_not_attached() {
    let mut rig = rig(false);
    assert!(rig.player.on(EventKind::Play, |_| {}).is_none());
    rig.slot.attach(surface());
    rig.player.mount(Instant::now());
    rig.factory.emit("play", vec![]);
    rig.player.poll(Instant::now());
    assert_eq!(rig.factory.instance(0).calls.len(), 2);
}

#[test]
fn subscribed_events_arrive_typed_on_poll() {
    let mut rig = rig(true);
    let now = Instant::now();
    rig.player.mount(now);
    let (tx, rx) = mpsc::channel();
    let tx_time = tx.clone();
    rig.player
        .on(EventKind::TimeUpdate, move |event| {
            let _ = tx_time.send(event.clone());
        })
        .expect("bound player accepts subscriptions");
    rig.player
        .on(EventKind::VolumeChange, move |event| {
            let _ = tx.send(event.clone());
        })
        .expect("bound player accepts subscriptions");

    rig.factory.emit("timeupdate", vec![json!(42.5)]);
    rig.factory.emit("volumechange", vec![json!(0.4), json!(false)]);
    rig.factory.emit("timeupdate", vec![json!("bad")]);
    assert!(rx.try_recv().is_err());

    rig.player.poll(now);
    let events: Vec<_> = rx.try_iter().collect();
    assert_eq!(
        events,
        vec![
            PlayerEvent::TimeUpdate(42.5),
            PlayerEvent::VolumeChange {
                volume: 0.4,
                muted: false
            },
        ]
    );
}

#[test]
fn off_detaches_a_single_subscription() {
    let mut rig = rig(true);
    let now = Instant::now();
    rig.player.mount(now);
    let hits = Rc::new(RefCell::new(0));
    let counter = Rc::clone(&hits);
    let id = rig
        .player
        .on(EventKind::Ended, move |_| *counter.borrow_mut() += 1)
        .expect("subscription");
    assert!(rig.player.off(id));
    assert!(!rig.player.off(id));
    rig.factory.emit("ended", vec![]);
    rig.player.poll(now);
    assert_eq!(*hits.borrow(), 0);
}

#[test]
fn unmount_removes_listeners_before_destroying() {
    let mut rig = rig(true);
    rig.player.mount(Instant::now());
    rig.player.on(EventKind::Pause, |_| {});
    rig.player.unmount();
    let calls = rig.factory.instance(0).calls;
    let tail = &calls[calls.len() - 2..];
    assert!(matches!(tail[0], Call::Off(_)));
    assert_eq!(tail[1], Call::Destroy);
}

#[test]
fn recreation_requires_fresh_subscriptions() {
    let mut rig = rig(true);
    let now = Instant::now();
    rig.player.mount(now);
    let hits = Rc::new(RefCell::new(0));
    let counter = Rc::clone(&hits);
    rig.player
        .on(EventKind::Ended, move |_| *counter.borrow_mut() += 1);

    *rig.looping.borrow_mut() = true;
    rig.player.sync(now);
    rig.player.poll(now + CREATE_RETRY_INTERVAL);
    rig.factory.emit("ended", vec![]);
    rig.player.poll(now + CREATE_RETRY_INTERVAL);
    assert_eq!(*hits.borrow(), 0);
}

#[test]
fn dropping_player_destroys_engine() {
    let rig = rig(true);
    let factory = rig.factory.clone();
    let mut player = rig.player;
    player.mount(Instant::now());
    drop(player);
    assert_eq!(factory.live_count(), 0);
}
