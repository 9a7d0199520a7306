//! Tests for `src/engine/session.rs`.

use outreach::contacts::{Contact, ContactQueue};
use outreach::engine::session::{Mode, Session, SessionControl};

fn queue() -> ContactQueue {
    ContactQueue::load(&[Contact::new("Amit", "111"), Contact::new("Riya", "222")])
        .expect("non-empty list loads")
}

#[test]
fn idle_placeholder_has_nil_id_and_no_contacts() {
    let session = Session::idle();
    assert!(session.id().is_nil());
    assert_eq!(session.mode(), Mode::Idle);
    assert!(session.queue().is_empty());
    assert_eq!(session.pending_message(), "");
}

#[test]
fn new_session_carries_sent_count() {
    let session = Session::new(Mode::Save, queue(), String::new(), 7);
    assert_eq!(session.control().sent_count(), 7);
    assert!(!session.id().is_nil());
}

#[test]
fn pending_message_follows_the_cursor() {
    let session = Session::new(Mode::Send, queue(), "Hi {name} ({number})".to_owned(), 0);
    assert_eq!(session.pending_message(), "Hi Amit (111)");
    assert_eq!(session.queue().claim(), Some(0));
    assert_eq!(session.pending_message(), "Hi Riya (222)");
}

#[test]
fn pause_twice_then_resume_once() {
    let control = SessionControl::default();
    control.pause();
    control.pause();
    assert!(control.is_paused());
    assert!(control.resume());
    assert!(!control.is_paused());
}
