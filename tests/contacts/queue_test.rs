//! Tests for `src/contacts.rs`.

use outreach::contacts::{normalize_number, parse_contacts, Contact, ContactQueue};
use outreach::engine::EngineError;

#[test]
fn empty_list_is_invalid_input() {
    assert!(matches!(
        ContactQueue::load(&[]),
        Err(EngineError::InvalidInput(_))
    ));
}

#[test]
fn duplicates_are_kept_in_order() {
    let amit = Contact::new("Amit", "111");
    let queue = ContactQueue::load(&[amit.clone(), amit.clone()]).expect("loads");
    assert_eq!(queue.len(), 2);
    assert_eq!(queue.contacts(), &[amit.clone(), amit]);
}

#[test]
fn queue_is_a_snapshot_of_the_input() {
    let mut input = vec![Contact::new("Amit", "111")];
    let queue = ContactQueue::load(&input).expect("loads");
    input.push(Contact::new("Riya", "222"));
    if let Some(first) = input.first_mut() {
        first.name = "Changed".to_owned();
    }
    assert_eq!(queue.len(), 1);
    assert_eq!(queue.current().map(|c| c.name.as_str()), Some("Amit"));
}

#[test]
fn claim_saturates_at_len() {
    let queue = ContactQueue::load(&[Contact::new("Amit", "111")]).expect("loads");
    assert_eq!(queue.claim(), Some(0));
    assert_eq!(queue.claim(), None);
    assert_eq!(queue.index(), 1);
    assert!(queue.is_exhausted());
    assert!(queue.current().is_none());
}

#[test]
fn concurrent_claims_hand_out_every_position_once() {
    let contacts: Vec<Contact> = (0..5_000)
        .map(|i| Contact::new(format!("c{i}"), i.to_string()))
        .collect();
    let queue = ContactQueue::load(&contacts).expect("loads");

    let mut claimed: Vec<usize> = std::thread::scope(|scope| {
        let workers: Vec<_> = (0..4)
            .map(|_| {
                scope.spawn(|| {
                    let mut mine = Vec::new();
                    while let Some(index) = queue.claim() {
                        mine.push(index);
                    }
                    mine
                })
            })
            .collect();
        workers
            .into_iter()
            .flat_map(|w| w.join().expect("worker finishes"))
            .collect()
    });

    claimed.sort_unstable();
    assert_eq!(claimed, (0..5_000).collect::<Vec<_>>());
    assert_eq!(queue.index(), 5_000);
}

#[test]
fn parses_flat_and_wrapped_contact_files() {
    let flat = r#"[{"name":"Amit","number":"111"}]"#;
    let wrapped = r#"{"contacts":[{"name":"Riya","number":"222","city":"Pune"}]}"#;

    let flat = parse_contacts(flat).expect("flat parses");
    assert_eq!(flat, vec![Contact::new("Amit", "111")]);

    let wrapped = parse_contacts(wrapped).expect("wrapped parses");
    let riya = wrapped.first().expect("one contact");
    assert_eq!(riya.name, "Riya");
    assert_eq!(riya.extra.get("city"), Some(&serde_json::json!("Pune")));
}

#[test]
fn missing_fields_default_to_empty() {
    let parsed = parse_contacts(r#"[{"name":"Amit"}]"#).expect("parses");
    assert_eq!(parsed.first().map(|c| c.number.as_str()), Some(""));
}

#[test]
fn malformed_contact_file_is_rejected() {
    assert!(parse_contacts("{not json").is_err());
    assert!(parse_contacts(r#"{"people":[]}"#).is_err());
}

#[test]
fn payload_passes_extra_fields_through() {
    let contacts = parse_contacts(r#"[{"name":"Amit","number":"111","tag":"vip"}]"#)
        .expect("parses");
    let queue = ContactQueue::load(&contacts).expect("loads");
    let payload: serde_json::Value =
        serde_json::from_str(&queue.to_payload().expect("serializes")).expect("valid json");
    assert_eq!(payload[0]["tag"], "vip");
    assert_eq!(payload[0]["number"], "111");
}

#[test]
fn normalize_number_keeps_plus_and_digits() {
    assert_eq!(normalize_number(" +1 (555) 010-2030 "), "+1(555)0102030");
}
