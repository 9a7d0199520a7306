//! Tests for `src/personalize.rs`.

use outreach::contacts::Contact;
use outreach::personalize::render;

#[test]
fn placeholders_are_case_insensitive() {
    let contact = Contact::new("Amit", "111");
    assert_eq!(render("Hi {NAME}", Some(&contact)), "Hi Amit");
    assert_eq!(render("{Name}/{nUmBeR}", Some(&contact)), "Amit/111");
}

#[test]
fn every_occurrence_is_replaced() {
    let contact = Contact::new("Riya", "222");
    assert_eq!(
        render("{name}, {name}! Call {number}.", Some(&contact)),
        "Riya, Riya! Call 222."
    );
}

#[test]
fn template_without_placeholders_is_unchanged() {
    let contact = Contact::new("Amit", "111");
    assert_eq!(render("Hello there", Some(&contact)), "Hello there");
}

#[test]
fn empty_template_renders_empty() {
    let contact = Contact::new("Amit", "111");
    assert_eq!(render("", Some(&contact)), "");
}

#[test]
fn missing_contact_blanks_placeholders() {
    assert_eq!(render("Hi {name} ({number})", None), "Hi  ()");
}

#[test]
fn missing_fields_render_empty() {
    let contact = Contact::default();
    assert_eq!(render("[{name}]", Some(&contact)), "[]");
}

#[test]
fn unknown_placeholders_are_left_alone() {
    let contact = Contact::new("Amit", "111");
    assert_eq!(render("{city} {name}", Some(&contact)), "{city} Amit");
}
