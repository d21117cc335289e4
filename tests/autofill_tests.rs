use std::time::Duration;

use form_recall::autofill::error::AutofillError;
use form_recall::autofill::frames::{FrameId, PageContext, Tab, TabPage, same_origin};
use form_recall::autofill::orchestrator::{
    AutofillSession, SessionPhase, SubmitOutcome, TimingConfig, run_session,
};
use form_recall::autofill::readiness::{ReadinessPolicy, field_presence, is_ready};
use form_recall::autofill::scheduler::{CancelHandle, Clock, ManualClock, TimerQueue};
use form_recall::autofill::submit::{
    SubmitTier, find_submit_button, locate_submit_in, mentions_get_started, mentions_login,
    mentions_submit_intent,
};
use form_recall::dom::dom_model::{Document, Mutation, Rect};
use form_recall::field::field_model::{FieldDescriptor, FieldValue};
use form_recall::messaging::coordinator::RelayOutcome;
use form_recall::trace::logger::TraceLogger;
use serde_json::json;

use crate::common::fixtures::{
    LOGIN_URL, captured_record, doc, el, field, first, hidden, html, input, login_form,
    login_page, login_record, node_by_id, relay_coordinator, text_el,
};

mod common;

fn clicks(doc: &Document) -> usize {
    doc.journal()
        .iter()
        .filter(|m| matches!(m, Mutation::Click { .. }))
        .count()
}

/// Runs a closure on every refresh, the way a live page changes between
/// timer ticks.
struct ScriptedPage<F: FnMut(usize, &mut Tab)> {
    inner: TabPage,
    refreshes: usize,
    on_refresh: F,
}

impl<F: FnMut(usize, &mut Tab)> ScriptedPage<F> {
    fn new(inner: TabPage, on_refresh: F) -> Self {
        ScriptedPage {
            inner,
            refreshes: 0,
            on_refresh,
        }
    }
}

impl<F: FnMut(usize, &mut Tab)> PageContext for ScriptedPage<F> {
    fn frame(&self) -> FrameId {
        self.inner.frame
    }

    fn tab(&self) -> &Tab {
        &self.inner.tab
    }

    fn tab_mut(&mut self) -> &mut Tab {
        &mut self.inner.tab
    }

    fn refresh(&mut self) -> Result<(), AutofillError> {
        self.refreshes += 1;
        (self.on_refresh)(self.refreshes, &mut self.inner.tab);
        Ok(())
    }
}

// ============================================================================
// Visibility gate
// ============================================================================

fn four_field_page(visible: usize) -> Document {
    let inputs = (0..4)
        .map(|i| {
            let node = input(json!({ "id": format!("f{}", i) }));
            if i < visible { node } else { hidden(node) }
        })
        .collect();
    doc(html(inputs))
}

fn four_fields() -> Vec<FieldDescriptor> {
    (0..4)
        .map(|i| field(&format!("#f{}", i), None, "text", FieldValue::from("x")))
        .collect()
}

#[test]
fn half_of_resolvable_fields_must_be_visible() {
    let policy = ReadinessPolicy::default();
    let fields = four_fields();

    let presence = field_presence(&four_field_page(2), &fields);
    assert_eq!(presence.resolvable, 4);
    assert_eq!(presence.visible, 2);
    assert!(presence.is_ready(&policy));

    assert!(!field_presence(&four_field_page(1), &fields).is_ready(&policy));
}

#[test]
fn nothing_resolvable_is_never_ready() {
    let page = doc(html(vec![text_el("p", json!({}), "Loading...")]));
    let presence = field_presence(&page, &four_fields());
    assert_eq!(presence.resolvable, 0);
    assert!(!presence.is_ready(&ReadinessPolicy::default()));
}

#[test]
fn odd_counts_round_up() {
    let policy = ReadinessPolicy::default();
    assert_eq!(policy.required_visible(3), 2);
    assert_eq!(policy.required_visible(1), 1);
    let strict = ReadinessPolicy { min_visible_ratio: 1.0 };
    assert_eq!(strict.required_visible(4), 4);
}

#[test]
fn any_ready_record_makes_page_ready() {
    let page = login_page();
    let absent = captured_record(LOGIN_URL, &four_field_page(0), &[]);
    let present = login_record(true, false);
    assert!(!is_ready(&page, std::slice::from_ref(&absent), &ReadinessPolicy::default()));
    assert!(is_ready(&page, &[absent, present], &ReadinessPolicy::default()));
}

// ============================================================================
// Submit locator
// ============================================================================

#[test]
fn text_patterns() {
    assert!(mentions_login("Log in"));
    assert!(mentions_login("LOGIN"));
    assert!(mentions_login("Log   In to continue"));
    assert!(!mentions_login("Logout"));

    assert!(mentions_get_started("Get Started"));
    assert!(mentions_get_started("getstarted"));

    assert!(mentions_submit_intent("Sign-in"));
    assert!(mentions_submit_intent("Signin"));
    assert!(mentions_submit_intent("Next"));
    assert!(!mentions_submit_intent("Nextstep"));
    assert!(!mentions_submit_intent("next_page"));
    assert!(mentions_submit_intent("Sign up"));
    assert!(mentions_submit_intent("Continue to payment"));
    assert!(!mentions_submit_intent("Nextcloud"));
    assert!(!mentions_submit_intent("Research"));
}

#[test]
fn get_started_is_skipped_for_continue() {
    let page = doc(html(vec![
        input(json!({ "type": "submit", "value": "Get Started" })),
        text_el("button", json!({}), "Continue"),
    ]));
    let (node, tier) = locate_submit_in(&page).unwrap();
    assert_eq!(tier, SubmitTier::SubmitVocabulary);
    assert_eq!(page.inner_text(node), "Continue");
}

#[test]
fn login_text_outranks_submit_type() {
    let page = doc(html(vec![
        text_el("button", json!({ "type": "submit" }), "Create account"),
        text_el("div", json!({ "role": "button", "id": "signin" }), "Log In"),
    ]));
    let (node, tier) = locate_submit_in(&page).unwrap();
    assert_eq!(tier, SubmitTier::LoginText);
    assert_eq!(node, node_by_id(&page, "signin"));
}

#[test]
fn invisible_controls_are_never_chosen() {
    let page = doc(html(vec![
        hidden(text_el("button", json!({}), "Log in")),
        input(json!({ "type": "submit", "value": "Go", "id": "go" })),
    ]));
    let (node, tier) = locate_submit_in(&page).unwrap();
    assert_eq!(tier, SubmitTier::SubmitInput);
    assert_eq!(node, node_by_id(&page, "go"));

    let nothing = doc(html(vec![hidden(text_el("button", json!({}), "Submit"))]));
    assert_eq!(locate_submit_in(&nothing), None);
}

#[test]
fn frames_are_searched_in_order() {
    let mut tab = Tab::new(
        "https://shop.example.com/",
        doc(html(vec![text_el("button", json!({ "type": "submit" }), "Pay")])),
    );
    let inner = tab.add_frame(
        FrameId::TOP,
        "https://shop.example.com/card",
        doc(html(vec![input(json!({ "name": "card" }))])),
    );

    let found = find_submit_button(&tab, &[inner, FrameId::TOP]).unwrap();
    assert_eq!(found.frame, FrameId::TOP);
    assert_eq!(found.tier, SubmitTier::SubmitButton);
    assert!(find_submit_button(&tab, &[inner]).is_none());
}

// ============================================================================
// Frames
// ============================================================================

#[test]
fn search_frames_skips_cross_origin_ancestors() {
    let mut tab = Tab::new("https://shop.example.com/", Document::new());
    let same = tab.add_frame(FrameId::TOP, "https://shop.example.com/a", Document::new());
    let nested = tab.add_frame(same, "https://shop.example.com/b", Document::new());
    let foreign = tab.add_frame(FrameId::TOP, "https://pay.example.net/", Document::new());

    assert_eq!(tab.search_frames(FrameId::TOP), vec![FrameId::TOP]);
    assert_eq!(tab.search_frames(same), vec![same, FrameId::TOP]);
    assert_eq!(tab.search_frames(nested), vec![nested, same, FrameId::TOP]);
    assert_eq!(tab.search_frames(foreign), vec![foreign]);
    assert!(tab.is_embedded(foreign));
    assert_eq!(tab.top(nested), FrameId::TOP);
}

#[test]
fn origin_comparison() {
    assert!(same_origin("https://a.example.com/x", "https://a.example.com:443/y?z"));
    assert!(!same_origin("https://a.example.com/", "http://a.example.com/"));
    assert!(!same_origin("https://a.example.com/", "https://b.example.com/"));
    assert!(!same_origin("not a url", "not a url"));
}

// ============================================================================
// Scheduler
// ============================================================================

#[test]
fn timer_queue_orders_by_deadline_then_insertion() {
    let mut queue = TimerQueue::new();
    queue.schedule(Duration::from_millis(10), "a");
    queue.schedule(Duration::from_millis(5), "b");
    queue.schedule(Duration::from_millis(10), "c");
    queue.schedule(Duration::from_millis(5), "d");
    assert_eq!(queue.len(), 4);
    assert_eq!(queue.peek_due(), Some(Duration::from_millis(5)));

    let order: Vec<&str> = std::iter::from_fn(|| queue.pop().map(|(_, t)| t)).collect();
    assert_eq!(order, vec!["b", "d", "a", "c"]);
    assert!(queue.is_empty());
}

#[test]
fn manual_clock_only_moves_forward() {
    let mut clock = ManualClock::new();
    clock.sleep_until(Duration::from_millis(500));
    assert_eq!(clock.now(), Duration::from_millis(500));
    clock.sleep_until(Duration::from_millis(100));
    assert_eq!(clock.now(), Duration::from_millis(500));
    clock.advance(Duration::from_millis(50));
    assert_eq!(clock.now(), Duration::from_millis(550));
}

#[test]
fn cancel_handle_is_shared() {
    let handle = CancelHandle::new();
    let other = handle.clone();
    assert!(!other.is_cancelled());
    handle.cancel();
    assert!(other.is_cancelled());
}

// ============================================================================
// Orchestrator
// ============================================================================

#[test]
fn records_without_flags_leave_session_idle() {
    let session = AutofillSession::start(vec![login_record(false, false)], TimingConfig::default());
    assert_eq!(session.phase(), SessionPhase::Idle);

    let mut page = TabPage::top_level(LOGIN_URL, login_page());
    let report = run_session(
        vec![login_record(false, false)],
        TimingConfig::default(),
        &mut page,
        &mut relay_coordinator(),
        &mut ManualClock::new(),
        &TraceLogger::disabled(),
    );
    assert_eq!(report.phase, SessionPhase::Idle);
    assert_eq!(report.ticks, 0);
    assert!(page.tab.document(FrameId::TOP).unwrap().journal().is_empty());
}

#[test]
fn auto_submit_only_records_poll_but_never_fill() {
    let session = AutofillSession::start(vec![login_record(false, true)], TimingConfig::default());
    assert_eq!(session.phase(), SessionPhase::Polling);

    let mut page = TabPage::top_level(LOGIN_URL, login_page());
    let report = run_session(
        vec![login_record(false, true)],
        TimingConfig::default(),
        &mut page,
        &mut relay_coordinator(),
        &mut ManualClock::new(),
        &TraceLogger::disabled(),
    );
    assert_eq!(report.ticks, 61);
    assert_eq!(report.ready_ticks, 0);
    assert_eq!(report.outcome, SubmitOutcome::NotRequested);
    assert!(page.tab.document(FrameId::TOP).unwrap().journal().is_empty());
}

#[test]
fn fills_every_ready_tick_and_submits_once() {
    let mut page = TabPage::top_level(LOGIN_URL, login_page());
    let mut clock = ManualClock::new();
    let report = run_session(
        vec![login_record(true, true)],
        TimingConfig::default(),
        &mut page,
        &mut relay_coordinator(),
        &mut clock,
        &TraceLogger::disabled(),
    );

    assert_eq!(report.ticks, 61);
    assert_eq!(report.ready_ticks, 61);
    assert_eq!(report.fields_filled, 3 * 61);
    assert_eq!(report.submit_attempts, 1);
    assert_eq!(report.submit_retries, 0);
    assert_eq!(report.outcome, SubmitOutcome::Clicked);
    assert_eq!(report.clicked.map(|m| m.tier), Some(SubmitTier::LoginText));
    assert_eq!(report.phase, SessionPhase::Stopped);
    assert_eq!(report.elapsed, Duration::from_secs(30));
    assert_eq!(clock.now(), Duration::from_secs(30));

    let top = page.tab.document(FrameId::TOP).unwrap();
    assert_eq!(clicks(top), 1);
    assert_eq!(top.value(node_by_id(top, "email")), Some("ada@example.com"));
    assert!(top.checked(first(top, "[name=\"remember\"]")));
}

#[test]
fn fill_only_records_never_click() {
    let mut page = TabPage::top_level(LOGIN_URL, login_page());
    let report = run_session(
        vec![login_record(true, false)],
        TimingConfig::default(),
        &mut page,
        &mut relay_coordinator(),
        &mut ManualClock::new(),
        &TraceLogger::disabled(),
    );
    assert_eq!(report.outcome, SubmitOutcome::NotRequested);
    assert_eq!(report.submit_attempts, 0);
    assert_eq!(clicks(page.tab.document(FrameId::TOP).unwrap()), 0);
}

#[test]
fn page_that_never_renders_the_form_times_out() {
    let blank = doc(html(vec![text_el("p", json!({}), "Loading...")]));
    let mut page = TabPage::top_level(LOGIN_URL, blank);
    let report = run_session(
        vec![login_record(true, true)],
        TimingConfig::default(),
        &mut page,
        &mut relay_coordinator(),
        &mut ManualClock::new(),
        &TraceLogger::disabled(),
    );
    assert_eq!(report.ticks, 61);
    assert_eq!(report.ready_ticks, 0);
    assert_eq!(report.outcome, SubmitOutcome::NotRequested);
    assert_eq!(report.elapsed, Duration::from_secs(30));
}

#[test]
fn form_revealed_late_is_filled_when_it_appears() {
    let tab = Tab::new(
        LOGIN_URL,
        doc(html(vec![hidden(el("div", json!({ "id": "step" }), vec![login_form()]))])),
    );
    let wrapper = node_by_id(tab.document(FrameId::TOP).unwrap(), "step");
    let mut page = ScriptedPage::new(TabPage::new(tab, FrameId::TOP), move |refresh, tab| {
        if refresh == 5 {
            if let Some(doc) = tab.document_mut(FrameId::TOP) {
                doc.set_rect(wrapper, Rect::DEFAULT_BOX);
            }
        }
    });

    let report = run_session(
        vec![login_record(true, false)],
        TimingConfig::default(),
        &mut page,
        &mut relay_coordinator(),
        &mut ManualClock::new(),
        &TraceLogger::disabled(),
    );
    assert_eq!(report.ticks, 61);
    assert_eq!(report.ready_ticks, 57);
}

#[test]
fn submit_retries_until_button_appears() {
    let tab = Tab::new(
        LOGIN_URL,
        doc(html(vec![
            input(json!({ "type": "email", "id": "email", "name": "email" })),
            hidden(text_el("button", json!({ "id": "late" }), "Continue")),
        ])),
    );
    let button = node_by_id(tab.document(FrameId::TOP).unwrap(), "late");
    let mut page = ScriptedPage::new(TabPage::new(tab, FrameId::TOP), move |refresh, tab| {
        if refresh == 6 {
            if let Some(doc) = tab.document_mut(FrameId::TOP) {
                doc.set_rect(button, Rect::DEFAULT_BOX);
            }
        }
    });

    let mut record = captured_record(LOGIN_URL, &login_page(), &[]);
    record.fields = vec![field("#email", Some("email"), "email", FieldValue::from("ada@example.com"))];
    record.auto_fill = true;
    record.auto_confirm = true;

    let report = run_session(
        vec![record],
        TimingConfig::default(),
        &mut page,
        &mut relay_coordinator(),
        &mut ManualClock::new(),
        &TraceLogger::disabled(),
    );
    assert_eq!(report.submit_attempts, 1);
    assert_eq!(report.submit_retries, 2);
    assert_eq!(report.outcome, SubmitOutcome::Clicked);
    assert_eq!(clicks(page.inner.tab.document(FrameId::TOP).unwrap()), 1);
}

#[test]
fn gives_up_after_retry_budget() {
    let page_doc = doc(html(vec![input(json!({ "type": "email", "id": "email" }))]));
    let mut page = TabPage::top_level(LOGIN_URL, page_doc);
    let mut record = login_record(true, true);
    record.fields = vec![field("#email", None, "email", FieldValue::from("ada@example.com"))];

    let report = run_session(
        vec![record],
        TimingConfig::default(),
        &mut page,
        &mut relay_coordinator(),
        &mut ManualClock::new(),
        &TraceLogger::disabled(),
    );
    assert_eq!(report.submit_attempts, 1);
    assert_eq!(report.submit_retries, 10);
    assert_eq!(report.outcome, SubmitOutcome::GaveUp);
    // Polling keeps going after the submit loop has given up.
    assert_eq!(report.ticks, 61);
}

#[test]
fn isolated_frame_relays_submit_to_top() {
    let mut tab = Tab::new(
        "https://shop.example.com/checkout",
        doc(html(vec![text_el("button", json!({ "type": "submit" }), "Place order")])),
    );
    let card_doc = doc(html(vec![input(json!({ "id": "cc", "name": "cardnumber" }))]));
    let card_url = "https://pay.example.net/card?session=1";
    let mut record = captured_record(card_url, &card_doc, &[("cardnumber", FieldValue::from("4242"))]);
    record.auto_fill = true;
    record.auto_confirm = true;
    let frame = tab.add_frame(FrameId::TOP, card_url, card_doc);

    let mut page = TabPage::new(tab, frame);
    let report = run_session(
        vec![record],
        TimingConfig::default(),
        &mut page,
        &mut relay_coordinator(),
        &mut ManualClock::new(),
        &TraceLogger::disabled(),
    );

    assert_eq!(report.outcome, SubmitOutcome::Relayed(RelayOutcome::Clicked));
    assert_eq!(report.submit_retries, 0);
    assert_eq!(clicks(page.tab.document(FrameId::TOP).unwrap()), 1);
    assert_eq!(clicks(page.tab.document(frame).unwrap()), 0);
    let card = page.tab.document(frame).unwrap();
    assert_eq!(card.value(node_by_id(card, "cc")), Some("4242"));
}

#[test]
fn relay_reports_missing_receiver() {
    let mut tab = Tab::new("https://shop.example.com/", doc(html(vec![])));
    let card_doc = doc(html(vec![input(json!({ "id": "cc" }))]));
    let frame = tab.add_frame(FrameId::TOP, "https://pay.example.net/", card_doc.clone());
    tab.detach(FrameId::TOP);

    let mut record = captured_record("https://pay.example.net/", &card_doc, &[]);
    record.auto_fill = true;
    record.auto_confirm = true;

    let mut page = TabPage::new(tab, frame);
    let report = run_session(
        vec![record],
        TimingConfig::default(),
        &mut page,
        &mut relay_coordinator(),
        &mut ManualClock::new(),
        &TraceLogger::disabled(),
    );
    assert_eq!(report.outcome, SubmitOutcome::Relayed(RelayOutcome::NoReceiver));
}

#[test]
fn same_origin_frame_clicks_parent_button_directly() {
    let mut tab = Tab::new(
        "https://shop.example.com/checkout",
        doc(html(vec![text_el("button", json!({ "type": "submit" }), "Place order")])),
    );
    let card_doc = doc(html(vec![input(json!({ "id": "cc" }))]));
    let card_url = "https://shop.example.com/embedded/card";
    let mut record = captured_record(card_url, &card_doc, &[]);
    record.auto_fill = true;
    record.auto_confirm = true;
    let frame = tab.add_frame(FrameId::TOP, card_url, card_doc);

    let mut page = TabPage::new(tab, frame);
    let report = run_session(
        vec![record],
        TimingConfig::default(),
        &mut page,
        &mut relay_coordinator(),
        &mut ManualClock::new(),
        &TraceLogger::disabled(),
    );
    assert_eq!(report.outcome, SubmitOutcome::Clicked);
    assert_eq!(report.clicked.map(|m| m.frame), Some(FrameId::TOP));
}

#[test]
fn cancel_before_submit_marks_outcome_cancelled() {
    let mut session = AutofillSession::start(vec![login_record(true, true)], TimingConfig::default());
    let handle = session.cancel_handle();

    let tab = Tab::new(LOGIN_URL, login_page());
    let mut page = ScriptedPage::new(TabPage::new(tab, FrameId::TOP), move |refresh, _| {
        if refresh == 2 {
            handle.cancel();
        }
    });

    let report = session.run(
        &mut page,
        &mut relay_coordinator(),
        &mut ManualClock::new(),
        &TraceLogger::disabled(),
    );
    assert!(report.cancelled);
    assert!(session.submit_requested());
    assert_eq!(report.ticks, 2);
    assert_eq!(report.outcome, SubmitOutcome::Cancelled);
    assert_eq!(report.phase, SessionPhase::Stopped);
    assert_eq!(clicks(page.inner.tab.document(FrameId::TOP).unwrap()), 0);
}

#[test]
fn custom_timing_shortens_session() {
    let timing = TimingConfig {
        max_poll_attempts: 4,
        poll_interval_ms: 100,
        ..TimingConfig::default()
    };
    let mut page = TabPage::top_level(LOGIN_URL, login_page());
    let report = run_session(
        vec![login_record(true, true)],
        timing,
        &mut page,
        &mut relay_coordinator(),
        &mut ManualClock::new(),
        &TraceLogger::disabled(),
    );
    assert_eq!(report.ticks, 5);
    // The submit timer outlives the polling window.
    assert_eq!(report.outcome, SubmitOutcome::Clicked);
    assert_eq!(report.elapsed, Duration::from_millis(1000));
}

#[test]
fn session_events_are_traced_as_jsonl() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("trace.jsonl");
    let tracer = TraceLogger::new(&path);
    assert!(tracer.is_enabled());

    let timing = TimingConfig {
        max_poll_attempts: 2,
        ..TimingConfig::default()
    };
    let mut page = TabPage::top_level(LOGIN_URL, login_page());
    run_session(
        vec![login_record(true, true)],
        timing,
        &mut page,
        &mut relay_coordinator(),
        &mut ManualClock::new(),
        &tracer,
    );

    let text = std::fs::read_to_string(&path).unwrap();
    let events: Vec<serde_json::Value> = text
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect();
    let decisions: Vec<&str> = events.iter().filter_map(|e| e["decision"].as_str()).collect();
    // The submit timer was scheduled before the third poll, so it runs first.
    assert_eq!(decisions, vec!["filled", "filled", "clicked", "filled", "stopped"]);
    assert_eq!(events[0]["filled"], 3);
    assert_eq!(events[2]["at_ms"], 1000);
    assert_eq!(events[2]["detail"], "LoginText");
}
