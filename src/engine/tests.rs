//! Engine scenario tests, driven by a manual clock

use std::time::{Duration, Instant};

use super::*;

const DEVICE: &str = "deck-1";

struct Harness {
    engine: SyncEngine,
    base: Instant,
}

impl Harness {
    fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    fn with_config(config: EngineConfig) -> Self {
        Self {
            engine: SyncEngine::new(config),
            base: Instant::now(),
        }
    }

    fn at(&self, ms: u64) -> Instant {
        self.base + Duration::from_millis(ms)
    }

    fn send(&mut self, ms: u64, event: EngineEvent) -> Vec<Effect> {
        let now = self.at(ms);
        self.engine.handle(event, now);
        self.engine.take_effects()
    }

    fn advance(&mut self, ms: u64) -> Vec<Effect> {
        let now = self.at(ms);
        self.engine.advance(now);
        self.engine.take_effects()
    }

    fn appear(&mut self, ms: u64, device: &str, context: &str, cc: u8, mode: ButtonMode) -> Vec<Effect> {
        self.send(ms, command(device, context, cc, mode))
    }

    fn press(&mut self, ms: u64, context: &str) -> Vec<Effect> {
        self.send(
            ms,
            EngineEvent::PressIntent {
                context_id: context.to_string(),
            },
        )
    }

    fn feedback(&mut self, ms: u64, cc: u8, value: u8) -> Vec<Effect> {
        self.send(
            ms,
            EngineEvent::Feedback {
                channel: 13,
                controller: cc,
                value,
            },
        )
    }

    fn track(&mut self, ms: u64, name: &str) -> Vec<Effect> {
        self.send(ms, EngineEvent::TrackChanged { name: name.to_string() })
    }

    fn active(&self, context: &str) -> Option<(bool, StateSource)> {
        self.engine.context(context).map(|ctx| (ctx.active, ctx.source))
    }
}

fn control(cc: u8) -> LogicalControl {
    LogicalControl::new(13, cc)
}

fn command(device: &str, context: &str, cc: u8, mode: ButtonMode) -> EngineEvent {
    EngineEvent::ContextAppeared {
        device_id: device.to_string(),
        context_id: context.to_string(),
        kind: ButtonKind::Command(CommandBinding {
            control: control(cc),
            mode,
        }),
    }
}

fn articulation(device: &str, context: &str) -> EngineEvent {
    EngineEvent::ContextAppeared {
        device_id: device.to_string(),
        context_id: context.to_string(),
        kind: ButtonKind::Articulation,
    }
}

fn sends(effects: &[Effect]) -> Vec<(LogicalControl, u8)> {
    effects
        .iter()
        .filter_map(|effect| match effect {
            Effect::SendControl { control, value } => Some((*control, *value)),
            _ => None,
        })
        .collect()
}

fn commits(effects: &[Effect]) -> Vec<(String, bool)> {
    effects
        .iter()
        .filter_map(|effect| match effect {
            Effect::SetVisualState { context_id, active } => Some((context_id.clone(), *active)),
            _ => None,
        })
        .collect()
}

fn renders(effects: &[Effect]) -> Vec<String> {
    effects
        .iter()
        .filter_map(|effect| match effect {
            Effect::RenderProfile { device_id, .. } => Some(device_id.clone()),
            _ => None,
        })
        .collect()
}

fn notes(effects: &[Effect]) -> Vec<(u8, u8)> {
    effects
        .iter()
        .filter_map(|effect| match effect {
            Effect::SendNote { note, velocity, .. } => Some((*note, *velocity)),
            _ => None,
        })
        .collect()
}

fn pressed(device: &str, index: usize, note: u8) -> EngineEvent {
    EngineEvent::ArticulationPressed {
        device_id: device.to_string(),
        index,
        note,
    }
}

// --- Dispatcher ---

#[test]
fn test_ack_gating_blocks_second_momentary_send() {
    let mut h = Harness::new();
    h.appear(0, DEVICE, "ctx", 10, ButtonMode::Momentary);

    let first = h.press(1000, "ctx");
    assert_eq!(sends(&first), vec![(control(10), 127)]);
    assert!(h.engine.is_awaiting_ack(&control(10)));

    // Past debounce and cooldown, but still unconfirmed
    let second = h.press(1400, "ctx");
    assert!(sends(&second).is_empty());
}

#[test]
fn test_ack_timeout_releases_gate() {
    let mut h = Harness::new();
    h.appear(0, DEVICE, "ctx", 10, ButtonMode::Momentary);
    h.press(1000, "ctx");

    h.advance(1899);
    assert!(h.engine.is_awaiting_ack(&control(10)));
    h.advance(1900);
    assert!(!h.engine.is_awaiting_ack(&control(10)));

    let effects = h.press(1950, "ctx");
    assert_eq!(sends(&effects), vec![(control(10), 127)]);
}

#[test]
fn test_any_feedback_resolves_ack() {
    let mut h = Harness::new();
    h.appear(0, DEVICE, "ctx", 10, ButtonMode::Momentary);
    h.press(1000, "ctx");

    // Not an echo of 127, still resolves the ack
    h.feedback(1050, 10, 0);
    assert!(!h.engine.is_awaiting_ack(&control(10)));
    assert!(!h.engine.is_timer_scheduled(&TimerKey::AckTimeout(control(10))));

    let effects = h.press(1300, "ctx");
    assert_eq!(sends(&effects), vec![(control(10), 127)]);
}

#[test]
fn test_cooldown_shared_across_contexts() {
    let mut h = Harness::new();
    h.appear(0, "deck-a", "ctx-a", 10, ButtonMode::Toggle);
    h.appear(0, "deck-b", "ctx-b", 10, ButtonMode::Toggle);

    assert_eq!(sends(&h.press(1000, "ctx-a")), vec![(control(10), 127)]);

    h.engine.advance(h.at(1100));
    assert_eq!(
        h.engine.try_press("ctx-b", h.at(1100)),
        Err(PressRejected::Cooldown { remaining_ms: 120 })
    );
    assert!(sends(&h.engine.take_effects()).is_empty());

    // The rejected press still counted as a tap for ctx-b
    assert!(sends(&h.press(1250, "ctx-b")).is_empty());
    assert_eq!(sends(&h.press(1330, "ctx-b")), vec![(control(10), 127)]);
}

#[test]
fn test_tap_debounce_per_context() {
    let mut h = Harness::new();
    h.appear(0, DEVICE, "ctx", 10, ButtonMode::Toggle);

    h.engine.advance(h.at(1000));
    assert!(h.engine.try_press("ctx", h.at(1000)).is_ok());
    assert_eq!(
        h.engine.try_press("ctx", h.at(1100)),
        Err(PressRejected::TapDebounce { since_ms: 100 })
    );
}

#[test]
fn test_unknown_context_press_is_dropped() {
    let mut h = Harness::new();
    assert_eq!(
        h.engine.try_press("ghost", h.at(0)),
        Err(PressRejected::UnknownContext)
    );
    assert!(h.engine.take_effects().is_empty());
}

#[test]
fn test_toggle_is_optimistic_and_not_ack_gated() {
    let mut h = Harness::new();
    h.appear(0, DEVICE, "ctx", 10, ButtonMode::Toggle);
    h.advance(400);

    let on = h.press(1000, "ctx");
    assert_eq!(sends(&on), vec![(control(10), 127)]);
    assert_eq!(commits(&on), vec![("ctx".to_string(), true)]);
    assert_eq!(h.active("ctx"), Some((true, StateSource::Optimistic)));
    assert!(!h.engine.is_awaiting_ack(&control(10)));

    let off = h.press(1300, "ctx");
    assert_eq!(sends(&off), vec![(control(10), 0)]);
    assert_eq!(h.active("ctx"), Some((false, StateSource::Optimistic)));
}

#[test]
fn test_settled_feedback_overwrites_optimistic_toggle() {
    let mut h = Harness::new();
    h.appear(0, DEVICE, "ctx", 10, ButtonMode::Toggle);
    h.advance(400);

    h.press(1000, "ctx");
    assert_eq!(h.active("ctx"), Some((true, StateSource::Optimistic)));

    h.feedback(1050, 10, 0);
    // Optimistic value holds until the settle window closes
    assert_eq!(h.active("ctx"), Some((true, StateSource::Optimistic)));

    let effects = h.advance(1210);
    assert_eq!(commits(&effects), vec![("ctx".to_string(), false)]);
    assert_eq!(h.active("ctx"), Some((false, StateSource::Feedback)));
}

// --- Settler ---

#[test]
fn test_settle_coalesces_burst_into_one_commit() {
    let mut h = Harness::new();
    h.appear(0, DEVICE, "ctx", 10, ButtonMode::Momentary);
    h.advance(400);

    for (ms, value) in [(1000, 10), (1040, 90), (1080, 5), (1120, 120)] {
        let effects = h.feedback(ms, 10, value);
        assert!(commits(&effects).is_empty());
    }

    assert!(commits(&h.advance(1279)).is_empty());
    let effects = h.advance(1280);
    assert_eq!(commits(&effects), vec![("ctx".to_string(), true)]);
    assert!(commits(&h.advance(5000)).is_empty());
}

#[test]
fn test_settle_commits_to_every_bound_context() {
    let mut h = Harness::new();
    h.appear(0, "deck-a", "ctx-a", 10, ButtonMode::Momentary);
    h.appear(0, "deck-b", "ctx-b", 10, ButtonMode::Momentary);
    h.advance(400);

    h.feedback(1000, 10, 127);
    let effects = h.advance(1160);
    assert_eq!(
        commits(&effects),
        vec![("ctx-a".to_string(), true), ("ctx-b".to_string(), true)]
    );
}

#[test]
fn test_redundant_commit_follows_config() {
    let mut forced = Harness::new();
    forced.appear(0, DEVICE, "ctx", 10, ButtonMode::Momentary);
    forced.advance(400);
    forced.feedback(1000, 10, 0);
    assert_eq!(commits(&forced.advance(1160)), vec![("ctx".to_string(), false)]);

    let mut quiet = Harness::with_config(EngineConfig {
        force_resync_after_settle: false,
        ..EngineConfig::default()
    });
    quiet.appear(0, DEVICE, "ctx", 10, ButtonMode::Momentary);
    quiet.advance(400);
    quiet.feedback(1000, 10, 0);
    assert!(commits(&quiet.advance(1160)).is_empty());
    assert_eq!(quiet.active("ctx"), Some((false, StateSource::Feedback)));
}

#[test]
fn test_malformed_feedback() {
    let mut h = Harness::new();
    h.appear(0, DEVICE, "ctx", 10, ButtonMode::Momentary);
    h.advance(400);

    h.send(
        1000,
        EngineEvent::Feedback {
            channel: 16,
            controller: 10,
            value: 127,
        },
    );
    h.send(
        1000,
        EngineEvent::Feedback {
            channel: 13,
            controller: 200,
            value: 127,
        },
    );
    assert_eq!(h.engine.cached(&control(10)), None);
    assert!(!h.engine.is_timer_scheduled(&TimerKey::Settle(control(10))));

    // Out-of-range value is clamped, not dropped
    h.feedback(1100, 10, 200);
    assert_eq!(commits(&h.advance(1260)), vec![("ctx".to_string(), true)]);
}

#[test]
fn test_unbound_feedback_is_cached_without_settle() {
    let mut h = Harness::new();
    h.feedback(0, 10, 127);

    assert!(h.engine.cached(&control(10)).is_some_and(|entry| entry.state));
    assert!(!h.engine.is_timer_scheduled(&TimerKey::Settle(control(10))));
}

#[test]
fn test_ack_survives_context_churn() {
    let mut h = Harness::new();
    h.appear(0, DEVICE, "ctx", 10, ButtonMode::Momentary);
    h.press(1000, "ctx");
    h.send(
        1010,
        EngineEvent::ContextDisappeared {
            context_id: "ctx".to_string(),
        },
    );

    assert!(h.engine.is_awaiting_ack(&control(10)));
    assert!(h.engine.is_timer_scheduled(&TimerKey::AckTimeout(control(10))));

    // Re-appearing context is still gated by the outstanding ack
    h.appear(1020, DEVICE, "ctx-2", 10, ButtonMode::Momentary);
    assert!(sends(&h.press(1300, "ctx-2")).is_empty());

    h.feedback(1350, 10, 127);
    assert!(!h.engine.is_awaiting_ack(&control(10)));
}

// --- Cache and resync ---

#[test]
fn test_appear_without_cache_neutralizes() {
    let mut h = Harness::new();

    let effects = h.appear(0, DEVICE, "ctx", 10, ButtonMode::Momentary);
    assert_eq!(commits(&effects), vec![("ctx".to_string(), false)]);
    assert_eq!(h.active("ctx"), Some((false, StateSource::Neutralized)));

    let effects = h.advance(260);
    assert_eq!(commits(&effects), vec![("ctx".to_string(), false)]);
}

#[test]
fn test_appear_restores_fresh_cache() {
    let mut h = Harness::new();
    h.feedback(0, 10, 127);

    let effects = h.appear(500, DEVICE, "ctx", 10, ButtonMode::Momentary);
    assert_eq!(commits(&effects), vec![("ctx".to_string(), true)]);
    assert_eq!(h.active("ctx"), Some((true, StateSource::Restored)));
}

#[test]
fn test_per_track_isolation() {
    let mut h = Harness::new();
    h.track(0, "Violin KS");
    h.feedback(10, 10, 127);

    h.track(100, "Cello KS");
    assert_eq!(h.engine.cached(&control(10)), None);

    let effects = h.appear(200, DEVICE, "ctx", 10, ButtonMode::Momentary);
    assert_eq!(commits(&effects), vec![("ctx".to_string(), false)]);

    // Back on the first track the entry is still there, case-insensitively
    h.track(300, "violin ks");
    assert!(h.engine.cached(&control(10)).is_some_and(|entry| entry.state));
    let effects = h.appear(400, DEVICE, "ctx-2", 10, ButtonMode::Momentary);
    assert_eq!(commits(&effects), vec![("ctx-2".to_string(), true)]);
}

#[test]
fn test_global_fallback_when_per_track_disabled() {
    let mut h = Harness::with_config(EngineConfig {
        cache: CachePolicy {
            per_track: false,
            clear_on_track_change: false,
        },
        ..EngineConfig::default()
    });
    h.track(0, "Violin KS");
    h.feedback(10, 10, 127);
    h.track(100, "Cello KS");

    let effects = h.appear(200, DEVICE, "ctx", 10, ButtonMode::Momentary);
    assert_eq!(commits(&effects), vec![("ctx".to_string(), true)]);
}

#[test]
fn test_clear_on_track_change_drops_global_fallback() {
    let mut h = Harness::with_config(EngineConfig {
        cache: CachePolicy {
            per_track: false,
            clear_on_track_change: true,
        },
        ..EngineConfig::default()
    });
    h.track(0, "Violin KS");
    h.feedback(10, 10, 127);
    h.track(100, "Cello KS");

    let effects = h.appear(200, DEVICE, "ctx", 10, ButtonMode::Momentary);
    assert_eq!(commits(&effects), vec![("ctx".to_string(), false)]);
}

#[test]
fn test_stale_cache_skipped_until_forced_resync() {
    let mut h = Harness::new();
    h.feedback(0, 10, 127);

    let effects = h.appear(4000, DEVICE, "ctx", 10, ButtonMode::Momentary);
    assert!(commits(&effects).is_empty());
    assert_eq!(h.active("ctx"), Some((false, StateSource::Initial)));
    assert_eq!(
        h.engine.restore_context("ctx", false, h.at(4100)),
        RestoreOutcome::SkippedStale
    );

    let effects = h.advance(4260);
    assert_eq!(commits(&effects), vec![("ctx".to_string(), true)]);
    assert_eq!(h.active("ctx"), Some((true, StateSource::Restored)));
}

#[test]
fn test_stale_skip_keeps_optimistic_state() {
    let mut h = Harness::new();
    h.feedback(0, 10, 0);
    h.appear(4000, DEVICE, "ctx", 10, ButtonMode::Toggle);
    h.advance(4260);

    h.press(5000, "ctx");
    assert_eq!(h.active("ctx"), Some((true, StateSource::Optimistic)));

    assert_eq!(
        h.engine.restore_context("ctx", false, h.at(9000)),
        RestoreOutcome::SkippedStale
    );
    assert_eq!(h.active("ctx"), Some((true, StateSource::Optimistic)));
}

#[test]
fn test_three_appearances_schedule_one_resync() {
    let mut h = Harness::new();
    h.appear(0, DEVICE, "ctx-1", 10, ButtonMode::Momentary);
    h.appear(10, DEVICE, "ctx-2", 11, ButtonMode::Momentary);
    h.appear(20, DEVICE, "ctx-3", 12, ButtonMode::Momentary);

    assert_eq!(h.engine.visible_count(DEVICE, Page::Command), 3);
    assert_eq!(
        h.engine.timer_deadline(&TimerKey::Resync(DEVICE.to_string())),
        Some(h.at(260))
    );

    let effects = h.advance(260);
    assert_eq!(commits(&effects).len(), 3);
    assert!(commits(&h.advance(2000)).is_empty());
}

#[test]
fn test_page_hidden_before_resync_cancels_it() {
    let mut h = Harness::new();
    h.appear(0, DEVICE, "ctx", 10, ButtonMode::Momentary);
    h.send(
        100,
        EngineEvent::ContextDisappeared {
            context_id: "ctx".to_string(),
        },
    );

    assert!(!h.engine.is_timer_scheduled(&TimerKey::Resync(DEVICE.to_string())));
    assert!(h.advance(1000).is_empty());
}

#[test]
fn test_rebinding_context_keeps_count() {
    let mut h = Harness::new();
    h.appear(0, DEVICE, "ctx", 10, ButtonMode::Momentary);
    h.appear(50, DEVICE, "ctx", 12, ButtonMode::Toggle);

    assert_eq!(h.engine.visible_count(DEVICE, Page::Command), 1);
    let ctx = h.engine.context("ctx").unwrap();
    assert_eq!(ctx.control, control(12));
    assert_eq!(ctx.mode, ButtonMode::Toggle);
}

#[test]
fn test_rebinding_same_control_keeps_state() {
    let mut h = Harness::new();
    h.appear(0, DEVICE, "ctx-1", 10, ButtonMode::Toggle);
    h.appear(0, DEVICE, "ctx-2", 11, ButtonMode::Toggle);
    h.advance(260);

    h.press(1000, "ctx-1");
    h.feedback(1010, 10, 127);
    h.advance(1170);
    assert_eq!(h.active("ctx-1"), Some((true, StateSource::Feedback)));

    // Settings round-trip long after the cache went stale
    let effects = h.appear(7000, DEVICE, "ctx-1", 10, ButtonMode::Toggle);
    assert_eq!(commits(&effects), vec![("ctx-1".to_string(), true)]);
    assert_eq!(h.active("ctx-1"), Some((true, StateSource::Feedback)));

    let press = h.press(7500, "ctx-1");
    assert_eq!(sends(&press), vec![(control(10), 0)]);
}

#[test]
fn test_rebinding_new_control_ignores_staleness() {
    let mut h = Harness::new();
    h.appear(0, DEVICE, "ctx-1", 10, ButtonMode::Toggle);
    h.appear(0, DEVICE, "ctx-2", 11, ButtonMode::Toggle);
    h.advance(260);
    h.feedback(1000, 12, 127);

    let effects = h.appear(7000, DEVICE, "ctx-1", 12, ButtonMode::Toggle);
    assert_eq!(commits(&effects), vec![("ctx-1".to_string(), true)]);
    assert_eq!(h.active("ctx-1"), Some((true, StateSource::Restored)));
}

#[test]
fn test_device_disconnect_drops_contexts() {
    let mut h = Harness::new();
    h.send(0, EngineEvent::DeviceConnected { device_id: DEVICE.to_string() });
    h.appear(0, DEVICE, "ctx", 10, ButtonMode::Momentary);
    h.send(0, articulation(DEVICE, "art"));

    h.send(100, EngineEvent::DeviceDisconnected { device_id: DEVICE.to_string() });

    assert!(h.engine.context("ctx").is_none());
    assert_eq!(h.engine.visible_count(DEVICE, Page::Command), 0);
    assert_eq!(h.engine.visible_count(DEVICE, Page::Articulation), 0);
    assert!(!h.engine.is_timer_scheduled(&TimerKey::Resync(DEVICE.to_string())));
}

// --- Track changes ---

#[test]
fn test_track_change_clears_dispatcher_state() {
    let mut h = Harness::new();
    h.appear(0, DEVICE, "ctx", 10, ButtonMode::Momentary);
    h.press(1000, "ctx");
    assert!(h.engine.is_awaiting_ack(&control(10)));

    h.track(1050, "Cello KS");
    assert!(!h.engine.is_awaiting_ack(&control(10)));
    assert!(!h.engine.is_timer_scheduled(&TimerKey::AckTimeout(control(10))));

    // Debounce and cooldown went with it
    assert_eq!(sends(&h.press(1100, "ctx")), vec![(control(10), 127)]);
}

#[test]
fn test_track_change_resyncs_visible_pages() {
    let mut h = Harness::new();
    h.appear(0, "deck-a", "ctx", 10, ButtonMode::Momentary);
    h.send(0, articulation("deck-b", "art"));
    h.advance(400);

    let effects = h.track(1000, "Cello KS");
    assert!(effects.contains(&Effect::TrackChanged {
        name: "Cello KS".to_string()
    }));
    assert_eq!(renders(&effects), vec!["deck-b".to_string()]);

    assert_eq!(
        h.engine.timer_deadline(&TimerKey::Resync("deck-a".to_string())),
        Some(h.at(1260))
    );
    assert!(!h.engine.is_timer_scheduled(&TimerKey::Resync("deck-b".to_string())));
    assert_eq!(commits(&h.advance(1260)), vec![("ctx".to_string(), false)]);
}

#[test]
fn test_track_name_is_debounced_and_deduplicated() {
    let mut h = Harness::new();
    h.send(0, EngineEvent::TrackNameReceived { name: "Violin".into() });
    h.send(50, EngineEvent::TrackNameReceived { name: "Viola ".into() });
    h.send(60, EngineEvent::TrackNameReceived { name: "viola".into() });

    assert!(h.advance(169).is_empty());
    let effects = h.advance(170);
    assert_eq!(effects, vec![Effect::TrackChanged { name: "Viola".into() }]);
    assert_eq!(h.engine.current_track(), "Viola");

    h.send(500, EngineEvent::TrackNameReceived { name: "VIOLA".into() });
    h.send(510, EngineEvent::TrackNameReceived { name: "   ".into() });
    assert!(!h.engine.is_timer_scheduled(&TimerKey::TrackName));
}

#[test]
fn test_first_articulation_appearance_renders_profile() {
    let mut h = Harness::new();
    let first = h.send(0, articulation(DEVICE, "art-1"));
    let second = h.send(5, articulation(DEVICE, "art-2"));

    assert_eq!(renders(&first), vec![DEVICE.to_string()]);
    assert!(renders(&second).is_empty());
}

#[test]
fn test_track_color_coalesced_into_hex() {
    let mut h = Harness::new();
    h.send(0, articulation(DEVICE, "art"));

    for (ms, component, value) in [
        (0, ColorComponent::Red, 127),
        (5, ColorComponent::Green, 0),
        (10, ColorComponent::Blue, 64),
    ] {
        h.send(ms, EngineEvent::TrackColorComponent { component, value });
    }

    assert!(h.advance(34).is_empty());
    let effects = h.advance(35);
    assert_eq!(
        effects,
        vec![
            Effect::TrackColor {
                hex: "#ff0081".into()
            },
            Effect::RenderProfile {
                device_id: DEVICE.into(),
                selected: None,
            },
        ]
    );
}

#[test]
fn test_articulation_note_released_after_note_length() {
    let mut h = Harness::new();
    let press = h.send(0, pressed(DEVICE, 2, 36));
    assert_eq!(notes(&press), vec![(36, 127)]);

    assert!(h.advance(109).is_empty());
    assert_eq!(
        h.advance(110),
        vec![Effect::SendNote {
            channel: 0,
            note: 36,
            velocity: 0
        }]
    );
}

#[test]
fn test_articulation_repress_ends_sounding_note() {
    let mut h = Harness::new();
    h.send(0, pressed(DEVICE, 2, 36));
    let effects = h.send(50, pressed(DEVICE, 2, 36));

    assert_eq!(notes(&effects), vec![(36, 0), (36, 127)]);
    assert_eq!(h.engine.timer_deadline(&TimerKey::NoteRelease(36)), Some(h.at(160)));
}

#[test]
fn test_articulation_press_selects_and_renders() {
    let mut h = Harness::new();
    h.send(0, articulation(DEVICE, "art"));

    let first = h.send(100, pressed(DEVICE, 2, 36));
    assert!(first.contains(&Effect::RenderProfile {
        device_id: DEVICE.into(),
        selected: Some(2),
    }));

    h.send(500, pressed(DEVICE, 5, 40));
    assert_eq!(h.engine.selected_articulation(DEVICE), Some(5));
    assert_eq!(h.engine.selected_articulation("deck-b"), None);

    // Colour updates keep the highlight
    for component in [ColorComponent::Red, ColorComponent::Green, ColorComponent::Blue] {
        h.send(600, EngineEvent::TrackColorComponent { component, value: 10 });
    }
    assert!(h.advance(700).contains(&Effect::RenderProfile {
        device_id: DEVICE.into(),
        selected: Some(5),
    }));
}

#[test]
fn test_track_change_resets_selection() {
    let mut h = Harness::new();
    h.send(0, articulation(DEVICE, "art"));
    h.send(100, pressed(DEVICE, 3, 38));

    let effects = h.track(1000, "Cello KS");
    assert_eq!(h.engine.selected_articulation(DEVICE), None);
    assert!(effects.contains(&Effect::RenderProfile {
        device_id: DEVICE.into(),
        selected: None,
    }));
}

#[test]
fn test_device_disconnect_forgets_selection() {
    let mut h = Harness::new();
    h.send(0, articulation(DEVICE, "art"));
    h.send(100, pressed(DEVICE, 1, 37));

    h.send(200, EngineEvent::DeviceDisconnected { device_id: DEVICE.to_string() });
    assert_eq!(h.engine.selected_articulation(DEVICE), None);
}

#[test]
fn test_snapshot() {
    let mut h = Harness::new();
    h.track(0, "Violin KS");
    h.appear(0, DEVICE, "ctx-b", 11, ButtonMode::Momentary);
    h.appear(0, DEVICE, "ctx-a", 10, ButtonMode::Momentary);
    h.press(1000, "ctx-a");

    let snapshot = h.engine.snapshot();
    assert_eq!(snapshot.track, "Violin KS");
    assert_eq!(snapshot.contexts.len(), 2);
    assert_eq!(snapshot.contexts[0].context_id, "ctx-a");
    assert_eq!(snapshot.pending_acks, 1);
}
