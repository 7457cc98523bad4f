//! Pure per-entity payload validators.
//!
//! Every sync payload must carry its primary key, the owning user reference
//! where the model has one, and `updated_at`. Beyond that each entity
//! enforces its own field contracts. Failures are `invalid_request` errors
//! with `{field, code}` details so clients can map them onto form fields.

use std::sync::OnceLock;

use regex::Regex;
use serde_json::{json, Value};

use crate::domain::document::{self, Document};
use crate::domain::entity::EntityKind;
use crate::domain::error::Error;

const USER_ROLES: &[&str] = &["admin", "fieldworker", "volunteer", "coordinator"];
const GENDERS: &[&str] = &["male", "female", "other", "prefer_not_to_say"];
const REGISTRATION_STATUSES: &[&str] =
    &["pending", "in_progress", "completed", "transferred", "discharged"];
const SUPPLY_STATUSES: &[&str] = &["active", "expired", "used"];
const TASK_STATUSES: &[&str] =
    &["todo", "pending", "in_progress", "review", "completed", "cancelled"];
const ASSIGNMENT_STATUSES: &[&str] =
    &["assigned", "accepted", "in_progress", "completed", "rejected", "declined"];
const PRIORITIES: &[&str] = &["low", "normal", "high"];
const LOCATION_TYPES: &[&str] =
    &["hospital", "clinic", "pharmacy", "laboratory", "emergency", "other"];
const SENT_VIA: &[&str] = &["app", "sms", "email"];

fn email_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("valid email regex"))
}

fn phone_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\+?[0-9][0-9 \-]*$").expect("valid phone regex"))
}

/// `true` when the value looks like an email address.
pub fn email_ok(raw: &str) -> bool {
    email_regex().is_match(raw.trim())
}

/// `true` when the value is a plausible phone number: an optional leading
/// `+`, then digits, spaces, and dashes totalling 10 to 15 digits.
pub fn phone_ok(raw: &str) -> bool {
    let raw = raw.trim();
    if !phone_regex().is_match(raw) {
        return false;
    }
    let digits = raw.chars().filter(char::is_ascii_digit).count();
    (10..=15).contains(&digits)
}

/// Canonical storage form for email addresses.
pub fn normalize_email(raw: &str) -> String {
    raw.trim().to_lowercase()
}

/// `true` when the value is a known user role.
pub fn role_ok(raw: &str) -> bool {
    USER_ROLES.iter().any(|role| role.eq_ignore_ascii_case(raw.trim()))
}

/// Password policy shared by registration and reset.
pub fn password_ok(raw: &str) -> bool {
    raw.len() >= 6
}

fn field_error(field: &str, code: &str, message: impl Into<String>) -> Error {
    Error::invalid_request(message).with_details(json!({ "field": field, "code": code }))
}

fn require_present(doc: &Document, field: &str) -> Result<(), Error> {
    if document::is_blank(doc, field) {
        return Err(field_error(
            field,
            "missing_field",
            format!("missing required field: {field}"),
        ));
    }
    Ok(())
}

fn require_str<'a>(doc: &'a Document, field: &str) -> Result<&'a str, Error> {
    require_present(doc, field)?;
    document::get_str(doc, field).ok_or_else(|| {
        field_error(field, "invalid_type", format!("{field} must be a string"))
    })
}

fn check_enum(doc: &Document, field: &str, allowed: &[&str]) -> Result<(), Error> {
    if document::is_blank(doc, field) {
        return Ok(());
    }
    let value = document::get_str(doc, field).ok_or_else(|| {
        field_error(field, "invalid_type", format!("{field} must be a string"))
    })?;
    if allowed.iter().any(|v| v.eq_ignore_ascii_case(value)) {
        Ok(())
    } else {
        Err(
            Error::invalid_request(format!("{field} must be one of {allowed:?}")).with_details(
                json!({ "field": field, "code": "invalid_enum", "allowed": allowed }),
            ),
        )
    }
}

fn require_enum(doc: &Document, field: &str, allowed: &[&str]) -> Result<(), Error> {
    require_present(doc, field)?;
    check_enum(doc, field, allowed)
}

fn check_email_field(doc: &Document, field: &str) -> Result<(), Error> {
    let value = require_str(doc, field)?;
    if email_ok(value) {
        Ok(())
    } else {
        Err(field_error(field, "invalid_email", format!("{field} must be an email address")))
    }
}

fn check_optional_phone(doc: &Document, field: &str) -> Result<(), Error> {
    if document::is_blank(doc, field) {
        return Ok(());
    }
    let value = document::get_str(doc, field).ok_or_else(|| {
        field_error(field, "invalid_type", format!("{field} must be a string"))
    })?;
    if phone_ok(value) {
        Ok(())
    } else {
        Err(field_error(field, "invalid_phone", format!("{field} must be a phone number")))
    }
}

fn check_person_name(doc: &Document, field: &str) -> Result<(), Error> {
    let value = require_str(doc, field)?;
    if (2..=100).contains(&value.chars().count()) {
        Ok(())
    } else {
        Err(field_error(
            field,
            "invalid_length",
            format!("{field} must be between 2 and 100 characters"),
        ))
    }
}

fn check_age(doc: &Document, field: &str) -> Result<(), Error> {
    require_present(doc, field)?;
    let age = doc.get(field).and_then(Value::as_i64).ok_or_else(|| {
        field_error(field, "invalid_type", format!("{field} must be an integer"))
    })?;
    if (0..=150).contains(&age) {
        Ok(())
    } else {
        Err(field_error(field, "out_of_range", format!("{field} must be between 0 and 150")))
    }
}

fn check_non_negative(doc: &Document, field: &str) -> Result<(), Error> {
    require_present(doc, field)?;
    let value = document::get_f64(doc, field).ok_or_else(|| {
        field_error(field, "invalid_type", format!("{field} must be a number"))
    })?;
    if value >= 0.0 {
        Ok(())
    } else {
        Err(field_error(field, "out_of_range", format!("{field} must not be negative")))
    }
}

fn check_coordinates(doc: &Document) -> Result<(), Error> {
    let latitude = doc.get("latitude").filter(|v| !v.is_null());
    let longitude = doc.get("longitude").filter(|v| !v.is_null());
    match (latitude, longitude) {
        (None, None) => Ok(()),
        (Some(lat), Some(lon)) => {
            let lat = lat.as_f64().ok_or_else(|| {
                field_error("latitude", "invalid_type", "latitude must be a number")
            })?;
            let lon = lon.as_f64().ok_or_else(|| {
                field_error("longitude", "invalid_type", "longitude must be a number")
            })?;
            if !(-90.0..=90.0).contains(&lat) {
                return Err(field_error(
                    "latitude",
                    "out_of_range",
                    "latitude must be between -90 and 90",
                ));
            }
            if !(-180.0..=180.0).contains(&lon) {
                return Err(field_error(
                    "longitude",
                    "out_of_range",
                    "longitude must be between -180 and 180",
                ));
            }
            Ok(())
        }
        _ => Err(field_error(
            "latitude",
            "incomplete_pair",
            "latitude and longitude must both be present or both be absent",
        )),
    }
}

/// Validate a sync payload for the given entity kind.
pub fn validate(kind: EntityKind, doc: &Document) -> Result<(), Error> {
    let descriptor = kind.descriptor();
    require_str(doc, descriptor.primary_key)?;
    if let Some(owner) = descriptor.owner_field {
        require_str(doc, owner)?;
    }
    require_present(doc, "updated_at")?;

    match kind {
        EntityKind::User => {
            check_person_name(doc, "name")?;
            check_email_field(doc, "email")?;
            check_optional_phone(doc, "phone_number")?;
            require_enum(doc, "role", USER_ROLES)
        }
        EntityKind::Registration => {
            check_person_name(doc, "person_name")?;
            check_age(doc, "age")?;
            require_enum(doc, "gender", GENDERS)?;
            require_str(doc, "location_id")?;
            require_present(doc, "timestamp")?;
            require_enum(doc, "status", REGISTRATION_STATUSES)
        }
        EntityKind::Supply => {
            require_str(doc, "item_name")?;
            check_non_negative(doc, "quantity")?;
            require_present(doc, "expiry_date")?;
            require_str(doc, "location_id")?;
            require_present(doc, "timestamp")?;
            require_enum(doc, "status", SUPPLY_STATUSES)
        }
        EntityKind::Task => {
            require_str(doc, "title")?;
            require_present(doc, "due_date")?;
            require_enum(doc, "status", TASK_STATUSES)?;
            require_enum(doc, "priority", PRIORITIES)
        }
        EntityKind::TaskAssignment => {
            require_str(doc, "task_id")?;
            require_present(doc, "assigned_at")?;
            require_enum(doc, "status", ASSIGNMENT_STATUSES)
        }
        EntityKind::Location => {
            require_str(doc, "name")?;
            require_enum(doc, "type", LOCATION_TYPES)?;
            require_present(doc, "added_at")?;
            check_coordinates(doc)
        }
        EntityKind::Alert => {
            require_str(doc, "type")?;
            require_str(doc, "location_id")?;
            require_str(doc, "description")?;
            require_present(doc, "timestamp")?;
            require_enum(doc, "priority", PRIORITIES)?;
            require_enum(doc, "sent_via", SENT_VIA)
        }
        EntityKind::Notification => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde_json::json;

    fn doc(value: Value) -> Document {
        value.as_object().expect("object fixture").clone()
    }

    fn valid_user() -> Document {
        doc(json!({
            "user_id": "u1", "name": "Ana", "email": "ana@x.io",
            "role": "volunteer", "updated_at": "2024-03-01T10:00:00Z"
        }))
    }

    fn valid_registration() -> Document {
        doc(json!({
            "registration_id": "r1", "user_id": "u1", "person_name": "Ram",
            "age": 40, "gender": "male", "location_id": "loc-1",
            "status": "pending", "timestamp": "2024-03-01T10:00:00Z",
            "updated_at": "2024-03-01T10:00:00Z"
        }))
    }

    fn valid_supply() -> Document {
        doc(json!({
            "supply_id": "s1", "user_id": "u1", "item_name": "Gauze",
            "quantity": 5, "expiry_date": "2025-01-01", "location_id": "loc-1",
            "status": "active", "timestamp": "2024-03-01T10:00:00Z",
            "updated_at": "2024-03-01T10:00:00Z"
        }))
    }

    fn valid_task() -> Document {
        doc(json!({
            "task_id": "t1", "title": "Fix pump", "created_by": "u1",
            "status": "todo", "priority": "normal", "due_date": "2024-04-01",
            "updated_at": "2024-03-01T10:00:00Z"
        }))
    }

    fn valid_assignment() -> Document {
        doc(json!({
            "assignment_id": "a1", "task_id": "t1", "user_id": "u1",
            "assigned_at": "2024-03-01T09:00:00Z", "status": "assigned",
            "updated_at": "2024-03-01T10:00:00Z"
        }))
    }

    fn valid_location() -> Document {
        doc(json!({
            "location_id": "l1", "user_id": "u1", "name": "Clinic",
            "type": "clinic", "added_at": "2024-03-01T09:00:00Z",
            "updated_at": "2024-03-01T10:00:00Z"
        }))
    }

    fn valid_alert() -> Document {
        doc(json!({
            "alert_id": "al1", "user_id": "u1", "type": "outbreak",
            "location_id": "loc-1", "description": "cholera cases rising",
            "priority": "high", "sent_via": "app",
            "timestamp": "2024-03-01T10:00:00Z",
            "updated_at": "2024-03-01T10:00:00Z"
        }))
    }

    fn valid_doc(kind: EntityKind) -> Document {
        match kind {
            EntityKind::User => valid_user(),
            EntityKind::Registration => valid_registration(),
            EntityKind::Supply => valid_supply(),
            EntityKind::Task => valid_task(),
            EntityKind::TaskAssignment => valid_assignment(),
            EntityKind::Location => valid_location(),
            EntityKind::Alert => valid_alert(),
            EntityKind::Notification => doc(json!({
                "notification_id": "n1", "user_id": "u1",
                "updated_at": "2024-03-01T10:00:00Z"
            })),
        }
    }

    #[rstest]
    fn accepts_a_complete_payload_for_every_kind() {
        for kind in EntityKind::ALL {
            let payload = valid_doc(kind);
            assert!(
                validate(kind, &payload).is_ok(),
                "complete {} payload should validate",
                kind.label()
            );
        }
    }

    #[rstest]
    #[case("user_id")]
    #[case("email")]
    #[case("updated_at")]
    #[case("role")]
    fn rejects_user_missing_required_field(#[case] field: &str) {
        let mut user = valid_user();
        user.remove(field);
        assert!(validate(EntityKind::User, &user).is_err());
    }

    #[rstest]
    #[case(EntityKind::Registration, "status")]
    #[case(EntityKind::Registration, "timestamp")]
    #[case(EntityKind::Supply, "status")]
    #[case(EntityKind::Supply, "timestamp")]
    #[case(EntityKind::Task, "status")]
    #[case(EntityKind::Task, "priority")]
    #[case(EntityKind::TaskAssignment, "status")]
    #[case(EntityKind::TaskAssignment, "assigned_at")]
    #[case(EntityKind::Location, "added_at")]
    #[case(EntityKind::Alert, "priority")]
    #[case(EntityKind::Alert, "sent_via")]
    #[case(EntityKind::Alert, "timestamp")]
    fn rejects_payload_missing_required_field(#[case] kind: EntityKind, #[case] field: &str) {
        let mut payload = valid_doc(kind);
        payload.remove(field);
        let err = validate(kind, &payload).expect_err("missing field");
        let details = err.details().expect("details");
        assert_eq!(details["field"], field);
        assert_eq!(details["code"], "missing_field");
    }

    #[rstest]
    #[case("not-an-email")]
    #[case("a@b")]
    #[case("a b@c.io")]
    fn rejects_bad_emails(#[case] email: &str) {
        let mut user = valid_user();
        user.insert("email".into(), json!(email));
        assert!(validate(EntityKind::User, &user).is_err());
    }

    #[rstest]
    #[case("+91 11223 34455", true)]
    #[case("011-2233-4455", true)]
    #[case("12345", false)]
    #[case("12345678901234567", false)]
    #[case("call me", false)]
    fn phone_rule_counts_digits(#[case] phone: &str, #[case] ok: bool) {
        assert_eq!(phone_ok(phone), ok);
    }

    #[rstest]
    #[case(0, true)]
    #[case(150, true)]
    #[case(-1, false)]
    #[case(151, false)]
    fn age_bounds_are_inclusive(#[case] age: i64, #[case] ok: bool) {
        let mut registration = valid_registration();
        registration.insert("age".into(), json!(age));
        assert_eq!(validate(EntityKind::Registration, &registration).is_ok(), ok);
    }

    #[rstest]
    fn gender_is_case_insensitive() {
        let mut registration = valid_registration();
        registration.insert("gender".into(), json!("MALE"));
        assert!(validate(EntityKind::Registration, &registration).is_ok());
        registration.insert("gender".into(), json!("unknown"));
        assert!(validate(EntityKind::Registration, &registration).is_err());
    }

    #[rstest]
    #[case(json!(90.0), json!(0.0), true)]
    #[case(json!(-90.0), json!(180.0), true)]
    #[case(json!(90.5), json!(0.0), false)]
    #[case(json!(0.0), json!(-180.5), false)]
    fn coordinate_bounds_are_inclusive(
        #[case] latitude: Value,
        #[case] longitude: Value,
        #[case] ok: bool,
    ) {
        let mut location = valid_location();
        location.insert("latitude".into(), latitude);
        location.insert("longitude".into(), longitude);
        assert_eq!(validate(EntityKind::Location, &location).is_ok(), ok);
    }

    #[rstest]
    fn coordinates_come_in_pairs() {
        let mut location = valid_location();
        location.insert("latitude".into(), json!(10.0));
        assert!(validate(EntityKind::Location, &location).is_err());
    }

    #[rstest]
    fn supply_quantity_must_not_be_negative() {
        let mut supply = valid_supply();
        supply.insert("quantity".into(), json!(-1));
        assert!(validate(EntityKind::Supply, &supply).is_err());
    }

    #[rstest]
    fn validation_details_name_the_field() {
        let mut user = valid_user();
        user.remove("email");
        let err = validate(EntityKind::User, &user).expect_err("missing email");
        let details = err.details().expect("details");
        assert_eq!(details["field"], "email");
        assert_eq!(details["code"], "missing_field");
    }

    #[rstest]
    fn email_normalization_lowercases_and_trims() {
        assert_eq!(normalize_email("  Ana@X.IO "), "ana@x.io");
    }
}
