//! Integration test: end-to-end proctoring scenarios against a simulated browser.
//!
//! ## Scenarios
//! 1. Three different violations escalate warning -> danger -> critical; the countdown
//!    only starts after the third.
//! 2. Unacknowledged critical state forces submission exactly at tick T.
//! 3. Acknowledging before tick T prevents forced submission for that episode.
//! 4. A stopped monitor ignores every browser signal.
//! 5. Stopping the monitor mid-countdown does not stop the countdown.
//! 6. N signals while active give count N and a full in-order window.
//! 7. A panicking subscriber does not starve the others or the escalation policy.
//! 8. Two sessions in one process share nothing.
//! 9. Lockdown keyboard denylist runs alongside, without touching the violation count.
//! 10. Clearing the monitor history directly keeps severity a function of the count.
//! 11. A violation landing as the countdown expires neither restarts it nor resubmits.

use std::sync::{Arc, Mutex};

use proctor_core::{
    severity_for, Acknowledgement, AssessmentUrl, BrowserSignal, Clock, Dimensions,
    EscalationConfig, EscalationEvent, InputDisposition, InputEvent, KeyStroke, ManualClock,
    ManualScheduler, ProctorConfig, ProctorSession, SessionParts, Severity, SimulatedHost,
    ViolationKind,
};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

struct Harness {
    host: Arc<SimulatedHost>,
    clock: Arc<ManualClock>,
    scheduler: Arc<ManualScheduler>,
    session: ProctorSession,
    submits: Arc<Mutex<Vec<usize>>>,
}

fn harness(max_violations: u32, countdown_seconds: u32) -> Harness {
    let host = Arc::new(SimulatedHost::new());
    let clock = Arc::new(ManualClock::new());
    let scheduler = Arc::new(ManualScheduler::new());
    let config = ProctorConfig {
        escalation: EscalationConfig {
            max_violations,
            countdown_seconds,
            ..Default::default()
        },
        ..Default::default()
    };
    let session = ProctorSession::create(
        &config,
        AssessmentUrl::parse("https://docs.example.com/forms/exam").unwrap(),
        SessionParts::simulated(host.clone(), clock.clone(), scheduler.clone()),
    );

    let submits = Arc::new(Mutex::new(Vec::new()));
    let s = Arc::clone(&submits);
    session.on_forced_submit(move |fs| s.lock().unwrap().push(fs.violation_count));

    Harness {
        host,
        clock,
        scheduler,
        session,
        submits,
    }
}

impl Harness {
    fn focus_lost(&self) {
        self.host.fire(BrowserSignal::Blur, self.session.monitor());
    }

    fn tab_switch(&self) {
        self.host.set_hidden(true);
        self.host.fire(BrowserSignal::VisibilityChange, self.session.monitor());
        self.host.set_hidden(false);
        self.host.fire(BrowserSignal::VisibilityChange, self.session.monitor());
    }

    fn fullscreen_exit(&self) {
        self.host.set_fullscreen_element(false);
        self.host.fire(BrowserSignal::FullscreenChange, self.session.monitor());
    }

    fn submit_count(&self) -> usize {
        self.submits.lock().unwrap().len()
    }
}

// ===========================================================================
// Scenario 1: severities in order, countdown after the third violation
// ===========================================================================

#[test]
fn test_three_violations_escalate_to_critical() {
    let h = harness(3, 10);
    assert!(h.session.begin().is_ready());

    let severities = Arc::new(Mutex::new(Vec::new()));
    let countdown_started_at = Arc::new(Mutex::new(None));
    let s = Arc::clone(&severities);
    let c = Arc::clone(&countdown_started_at);
    h.session.on_escalation(move |event| match event {
        EscalationEvent::SeverityChanged { to, .. } => s.lock().unwrap().push(*to),
        EscalationEvent::CountdownStarted { .. } => {
            *c.lock().unwrap() = Some(s.lock().unwrap().len());
        }
        _ => {}
    });

    h.focus_lost();
    assert_eq!(h.session.escalation().countdown_remaining(), None);
    h.tab_switch();
    assert_eq!(h.session.escalation().countdown_remaining(), None);
    h.fullscreen_exit();

    assert_eq!(
        *severities.lock().unwrap(),
        vec![Severity::Warning, Severity::Danger, Severity::Critical]
    );
    assert_eq!(*countdown_started_at.lock().unwrap(), Some(3));
    assert_eq!(h.session.escalation().countdown_remaining(), Some(10));

    let kinds: Vec<ViolationKind> = h.session.monitor().violations().iter().map(|v| v.kind).collect();
    assert_eq!(
        kinds,
        vec![ViolationKind::FocusLost, ViolationKind::TabSwitch, ViolationKind::FullscreenExit]
    );
}

// ===========================================================================
// Scenario 2 & 3: countdown determinism and cancellation
// ===========================================================================

#[test]
fn test_forced_submit_exactly_once_at_tick_t() {
    let h = harness(3, 10);
    h.session.begin();
    for _ in 0..3 {
        h.focus_lost();
    }

    for tick in 1..10 {
        h.scheduler.tick();
        assert_eq!(h.submit_count(), 0, "submitted early at tick {tick}");
    }
    h.scheduler.tick();
    assert_eq!(*h.submits.lock().unwrap(), vec![3]);

    h.scheduler.advance(50);
    h.focus_lost();
    h.scheduler.advance(50);
    assert_eq!(h.submit_count(), 1);
    assert!(h.session.record().submitted);
    assert!(h.session.warning_view().message.contains("submitted"));
}

#[test]
fn test_acknowledge_before_expiry_prevents_submit() {
    let h = harness(3, 10);
    h.session.begin();
    for _ in 0..3 {
        h.focus_lost();
    }
    h.scheduler.advance(9);
    assert_eq!(
        h.session.acknowledge(),
        Acknowledgement::CountdownCancelled { remaining: 1 }
    );
    h.scheduler.advance(100);
    assert_eq!(h.submit_count(), 0);
    assert_eq!(h.session.monitor().count(None), 3);
    assert_eq!(h.session.acknowledge(), Acknowledgement::NoOp);
}

// ===========================================================================
// Scenario 4 & 5: inactive monitor, stop during countdown
// ===========================================================================

#[test]
fn test_stopped_monitor_ignores_signals() {
    let h = harness(3, 10);
    let callbacks = Arc::new(Mutex::new(0usize));
    let c = Arc::clone(&callbacks);
    h.session.on_violation(move |_| *c.lock().unwrap() += 1);

    h.session.begin();
    assert!(h.session.pause_monitoring());

    for signal in [
        BrowserSignal::Blur,
        BrowserSignal::VisibilityChange,
        BrowserSignal::FullscreenChange,
        BrowserSignal::Resize,
    ] {
        h.session.monitor().handle_signal(signal);
    }
    h.host.set_viewport(Dimensions::new(5000, 5000));
    h.session.monitor().handle_signal(BrowserSignal::Resize);

    assert_eq!(h.session.monitor().count(None), 0);
    assert_eq!(*callbacks.lock().unwrap(), 0);
    assert_eq!(h.session.escalation().severity(), Severity::Calm);
}

#[test]
fn test_countdown_survives_monitor_stop() {
    let h = harness(2, 5);
    h.session.begin();
    h.focus_lost();
    h.focus_lost();
    h.scheduler.advance(2);

    h.session.pause_monitoring();
    h.scheduler.advance(3);
    assert_eq!(h.submit_count(), 1);
}

#[test]
fn test_session_end_cancels_countdown() {
    let h = harness(1, 5);
    h.session.begin();
    h.focus_lost();
    h.session.end();
    h.scheduler.advance(10);
    assert_eq!(h.submit_count(), 0);
}

// ===========================================================================
// Scenario 6: count and window
// ===========================================================================

#[test]
fn test_count_and_window_match_signals() {
    let h = harness(100, 10);
    h.session.begin();
    h.host.set_viewport(Dimensions::new(2560, 1440));

    let n = 12;
    let t0 = h.clock.now();
    for i in 0..n {
        h.clock.advance(250);
        match i % 3 {
            0 => h.focus_lost(),
            1 => h.tab_switch(),
            _ => {
                h.session.monitor().handle_signal(BrowserSignal::Resize);
            }
        }
    }
    let t_last = h.session.monitor().last_violation().unwrap().occurred_at;

    assert_eq!(h.session.monitor().count(None), n);
    assert_eq!(h.session.monitor().count(Some(ViolationKind::WindowResize)), 4);
    let window = h.session.monitor().violations_between(t0, t_last);
    assert_eq!(window.len(), n);
    assert!(window.windows(2).all(|w| w[0].occurred_at <= w[1].occurred_at));
    assert_eq!(window, h.session.monitor().violations());
}

// ===========================================================================
// Scenario 7: subscriber isolation
// ===========================================================================

#[test]
fn test_panicking_subscriber_is_isolated() {
    let h = harness(3, 10);
    h.session.on_violation(|_| panic!("view crashed"));
    let seen = Arc::new(Mutex::new(0usize));
    let s = Arc::clone(&seen);
    h.session.on_violation(move |_| *s.lock().unwrap() += 1);

    h.session.begin();
    h.focus_lost();

    assert_eq!(*seen.lock().unwrap(), 1);
    assert_eq!(h.session.monitor().count(None), 1);
    assert_eq!(h.session.escalation().severity(), Severity::Warning);
    assert_eq!(h.session.monitor().subscribers().take_failures().len(), 1);
}

// ===========================================================================
// Scenario 8: independent sessions
// ===========================================================================

#[test]
fn test_sessions_do_not_share_state() {
    let a = harness(3, 10);
    let b = harness(3, 10);
    a.session.begin();
    b.session.begin();

    a.focus_lost();
    a.focus_lost();

    assert_eq!(a.session.monitor().count(None), 2);
    assert_eq!(b.session.monitor().count(None), 0);
    assert_eq!(b.session.escalation().severity(), Severity::Calm);
    assert_ne!(a.session.id(), b.session.id());

    a.session.dispose();
    assert!(b.session.monitor().is_active());
}

// ===========================================================================
// Scenario 9: lockdown runs in parallel
// ===========================================================================

#[test]
fn test_lockdown_does_not_count_as_violations() {
    let h = harness(3, 10);
    h.session.begin();

    let blocked = [
        KeyStroke::ctrl("c"),
        KeyStroke::ctrl_shift("C"),
        KeyStroke::alt("Tab"),
        KeyStroke::plain("F12"),
    ];
    for key in blocked {
        assert_eq!(
            h.host.dispatch_input(&InputEvent::KeyDown(key), h.session.lockdown()),
            InputDisposition::Suppressed
        );
    }
    for key in [KeyStroke::plain("c"), KeyStroke::plain("Tab")] {
        assert_eq!(
            h.host.dispatch_input(&InputEvent::KeyDown(key), h.session.lockdown()),
            InputDisposition::PassThrough
        );
    }
    h.host.dispatch_input(&InputEvent::ContextMenu, h.session.lockdown());

    assert_eq!(h.session.lockdown().log().len(), 5);
    assert_eq!(h.session.monitor().count(None), 0);
    assert_eq!(h.session.escalation().severity(), Severity::Calm);
}

// ===========================================================================
// Scenario 10 & 11: escalation stays consistent with the log
// ===========================================================================

#[test]
fn test_direct_monitor_clear_keeps_severity_in_step() {
    let h = harness(3, 10);
    h.session.begin();
    h.focus_lost();
    h.focus_lost();
    assert_eq!(h.session.escalation().severity(), Severity::Danger);

    h.session.monitor().clear();
    h.focus_lost();

    let count = h.session.monitor().count(None);
    assert_eq!(count, 1);
    assert_eq!(h.session.escalation().severity(), severity_for(count, 3));
    assert_eq!(h.session.escalation().countdown_remaining(), None);
    h.scheduler.advance(20);
    assert_eq!(h.submit_count(), 0);
}

#[test]
fn test_violation_at_countdown_expiry_stays_submitted() {
    let host = Arc::new(SimulatedHost::new());
    let scheduler = Arc::new(ManualScheduler::new());
    let config = ProctorConfig {
        escalation: EscalationConfig {
            max_violations: 1,
            countdown_seconds: 2,
            ..Default::default()
        },
        ..Default::default()
    };
    let session = Arc::new(ProctorSession::create(
        &config,
        AssessmentUrl::parse("https://docs.example.com/forms/exam").unwrap(),
        SessionParts::simulated(host.clone(), Arc::new(ManualClock::new()), scheduler.clone()),
    ));

    let submits = Arc::new(Mutex::new(0usize));
    let s = Arc::clone(&submits);
    session.on_forced_submit(move |_| *s.lock().unwrap() += 1);

    // The student leaves the window again at the very moment time runs out.
    let weak = Arc::downgrade(&session);
    let signal_host = Arc::clone(&host);
    session.on_escalation(move |event| {
        if let EscalationEvent::CountdownTick { remaining: 0, .. } = event {
            if let Some(session) = weak.upgrade() {
                signal_host.fire(BrowserSignal::Blur, session.monitor());
            }
        }
    });

    session.begin();
    host.fire(BrowserSignal::Blur, session.monitor());
    scheduler.advance(2);

    assert_eq!(session.monitor().count(None), 2);
    assert_eq!(*submits.lock().unwrap(), 1);
    assert!(session.escalation().is_submitted());
    assert_eq!(session.escalation().countdown_remaining(), None);
    assert_eq!(scheduler.pending(), 0);

    scheduler.advance(10);
    assert_eq!(*submits.lock().unwrap(), 1);
}
