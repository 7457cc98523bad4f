//! Same-entity heuristics.
//!
//! When a write trips a secondary-uniqueness probe, these predicates decide
//! whether the colliding record is a duplicate of the same real-world entity
//! (two field devices registering the same patient) or a genuinely distinct
//! record that happens to share a value. The criteria are data: each entity
//! contributes a [`HeuristicSpec`] row naming its comparable fields, their
//! comparators, a primary criterion, and the match-ratio threshold, so a new
//! entity adds a row rather than a branch.
//!
//! The user heuristic accepts a password match as an identity signal. That
//! signal is computed by the sync engine through the auth store's
//! hash-verify call (plaintexts and hashes are never compared here) and it
//! is ONLY ever used to decide whether two profile rows describe one
//! person. It must never be used to grant access.

use crate::domain::document::{self, Document};
use crate::domain::timestamp;

/// How a single field pair is compared.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Comparator {
    /// JSON equality with numeric coercion.
    Exact,
    /// Case-insensitive string equality after trimming.
    CaseInsensitiveExact,
    /// Lowercased, trimmed strings match when equal or when one contains
    /// the other ("Ram" vs "Ram Kumar").
    NameContains,
    /// Digits-only comparison of the last ten digits.
    PhoneLast10,
    /// Numeric values within the given absolute tolerance.
    Within(f64),
    /// Timestamps falling on the same calendar day (UTC).
    SameDay,
}

impl Comparator {
    fn matches(self, doc_a: &Document, doc_b: &Document, field: &str) -> bool {
        match self {
            Comparator::Exact => {
                !document::is_blank(doc_a, field)
                    && document::value_equals(doc_a.get(field), doc_b.get(field))
            }
            Comparator::CaseInsensitiveExact => {
                match (document::get_str(doc_a, field), document::get_str(doc_b, field)) {
                    (Some(a), Some(b)) if !a.is_empty() => a.eq_ignore_ascii_case(b),
                    _ => false,
                }
            }
            Comparator::NameContains => {
                match (document::get_str(doc_a, field), document::get_str(doc_b, field)) {
                    (Some(a), Some(b)) if !a.is_empty() && !b.is_empty() => {
                        let a = a.to_lowercase();
                        let b = b.to_lowercase();
                        a == b || a.contains(&b) || b.contains(&a)
                    }
                    _ => false,
                }
            }
            Comparator::PhoneLast10 => {
                match (document::get_str(doc_a, field), document::get_str(doc_b, field)) {
                    (Some(a), Some(b)) => {
                        let a = last_digits(a, 10);
                        let b = last_digits(b, 10);
                        !a.is_empty() && a == b
                    }
                    _ => false,
                }
            }
            Comparator::Within(tolerance) => {
                match (document::get_f64(doc_a, field), document::get_f64(doc_b, field)) {
                    (Some(a), Some(b)) => (a - b).abs() <= tolerance,
                    _ => false,
                }
            }
            Comparator::SameDay => {
                match (
                    timestamp::field_instant(doc_a, field),
                    timestamp::field_instant(doc_b, field),
                ) {
                    (Some(a), Some(b)) => a.date_naive() == b.date_naive(),
                    _ => false,
                }
            }
        }
    }
}

fn last_digits(raw: &str, count: usize) -> String {
    let digits: Vec<char> = raw.chars().filter(char::is_ascii_digit).collect();
    let skip = digits.len().saturating_sub(count);
    digits[skip..].iter().collect()
}

/// One comparable field in a heuristic row.
#[derive(Debug, Clone, Copy)]
pub struct ComparableField {
    pub field: &'static str,
    pub comparator: Comparator,
}

/// The per-entity shortcut that declares two records the same outright.
#[derive(Debug, Clone, Copy)]
pub enum PrimaryCriterion {
    /// Primary keys equal, or the auth store verified the supplied
    /// plaintext against the stored hash.
    IdOrPasswordMatch { id_field: &'static str },
    /// Every `required` field matches, supported by either an `alt_equal`
    /// field match or at least `min_support` matches among the remaining
    /// comparable fields.
    RequiredWithSupport {
        required: &'static [&'static str],
        alt_equal: Option<&'static str>,
        min_support: usize,
    },
    /// Both halves of a composite key match.
    PairEqual {
        first: &'static str,
        second: &'static str,
    },
    /// Any one of the listed identifier fields matches.
    AnyIdEqual { fields: &'static [&'static str] },
}

/// Per-entity heuristic row.
#[derive(Debug, Clone, Copy)]
pub struct HeuristicSpec {
    pub fields: &'static [ComparableField],
    pub primary: PrimaryCriterion,
    pub threshold: f64,
}

/// Signals the engine precomputes before invoking the pure predicate.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeuristicContext {
    /// The auth store verified the client-supplied plaintext against the
    /// server profile's credential. Only meaningful for the user entity.
    pub password_match: bool,
}

impl HeuristicSpec {
    fn comparator_for(&self, field: &str) -> Comparator {
        self.fields
            .iter()
            .find(|cf| cf.field == field)
            .map(|cf| cf.comparator)
            .unwrap_or(Comparator::Exact)
    }

    fn field_matches(&self, field: &str, client: &Document, server: &Document) -> bool {
        self.comparator_for(field).matches(client, server, field)
    }

    /// Decide whether `client` and `server` describe the same real-world
    /// entity: the primary criterion short-circuits, otherwise the match
    /// ratio over all comparable fields must reach the threshold.
    pub fn is_same_entity(
        &self,
        client: &Document,
        server: &Document,
        ctx: &HeuristicContext,
    ) -> bool {
        if self.primary_holds(client, server, ctx) {
            return true;
        }
        if self.fields.is_empty() {
            return false;
        }
        let matches = self
            .fields
            .iter()
            .filter(|cf| cf.comparator.matches(client, server, cf.field))
            .count();
        matches as f64 / self.fields.len() as f64 >= self.threshold
    }

    fn primary_holds(&self, client: &Document, server: &Document, ctx: &HeuristicContext) -> bool {
        match self.primary {
            PrimaryCriterion::IdOrPasswordMatch { id_field } => {
                Comparator::Exact.matches(client, server, id_field) || ctx.password_match
            }
            PrimaryCriterion::RequiredWithSupport {
                required,
                alt_equal,
                min_support,
            } => {
                if !required
                    .iter()
                    .all(|field| self.field_matches(field, client, server))
                {
                    return false;
                }
                if alt_equal.is_some_and(|field| self.field_matches(field, client, server)) {
                    return true;
                }
                let support = self
                    .fields
                    .iter()
                    .filter(|cf| !required.contains(&cf.field))
                    .filter(|cf| cf.comparator.matches(client, server, cf.field))
                    .count();
                support >= min_support
            }
            PrimaryCriterion::PairEqual { first, second } => {
                self.field_matches(first, client, server)
                    && self.field_matches(second, client, server)
            }
            PrimaryCriterion::AnyIdEqual { fields } => fields
                .iter()
                .any(|field| self.field_matches(field, client, server)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::EntityKind;
    use rstest::rstest;
    use serde_json::{json, Value};

    fn doc(value: Value) -> Document {
        value.as_object().expect("object fixture").clone()
    }

    fn spec(kind: EntityKind) -> &'static HeuristicSpec {
        kind.descriptor().heuristic.as_ref().expect("heuristic row")
    }

    #[rstest]
    fn registration_same_person_with_support() {
        let client = doc(json!({
            "person_name": "ram kumar", "age": 41, "gender": "Male",
            "contact": "111", "location_id": "loc-1"
        }));
        let server = doc(json!({
            "person_name": "Ram Kumar", "age": 40, "gender": "male",
            "contact": "111", "location_id": "loc-1"
        }));
        let ctx = HeuristicContext::default();
        assert!(spec(EntityKind::Registration).is_same_entity(&client, &server, &ctx));
    }

    #[rstest]
    fn registration_distinct_person_same_name() {
        let client = doc(json!({
            "person_name": "Ram", "age": 40, "gender": "male",
            "contact": "222", "location_id": "loc-9"
        }));
        let server = doc(json!({
            "person_name": "Ram", "age": 40, "gender": "male",
            "contact": "111", "location_id": "loc-1"
        }));
        let ctx = HeuristicContext::default();
        // Name and gender match but nothing else supports the claim, and
        // 3/5 comparable fields is below the ratio threshold.
        assert!(!spec(EntityKind::Registration).is_same_entity(&client, &server, &ctx));
    }

    #[rstest]
    fn user_password_match_short_circuits() {
        let client = doc(json!({"user_id": "u-new", "name": "Someone Else", "email": "a@x.io"}));
        let server = doc(json!({"user_id": "u-old", "name": "Ana", "email": "a@x.io"}));
        let ctx = HeuristicContext {
            password_match: true,
        };
        assert!(spec(EntityKind::User).is_same_entity(&client, &server, &ctx));
    }

    #[rstest]
    fn user_ratio_path_needs_most_fields() {
        let client = doc(json!({
            "user_id": "u-new", "name": "ana", "role": "volunteer",
            "email": "ANA@x.io", "phone_number": "+1 555-010-0001"
        }));
        let server = doc(json!({
            "user_id": "u-old", "name": "Ana", "role": "volunteer",
            "email": "ana@x.io", "phone_number": "5550100001"
        }));
        let ctx = HeuristicContext::default();
        assert!(spec(EntityKind::User).is_same_entity(&client, &server, &ctx));
    }

    #[rstest]
    fn supply_barcode_match_is_primary() {
        let client = doc(json!({"item_name": "Bandage L", "barcode": "8901"}));
        let server = doc(json!({"item_name": "Large bandage", "barcode": "8901"}));
        let ctx = HeuristicContext::default();
        assert!(spec(EntityKind::Supply).is_same_entity(&client, &server, &ctx));
    }

    #[rstest]
    fn assignment_pair_must_both_match() {
        let ctx = HeuristicContext::default();
        let server = doc(json!({"task_id": "t1", "user_id": "u1", "status": "assigned"}));
        let same = doc(json!({"task_id": "t1", "user_id": "u1", "status": "accepted"}));
        let other = doc(json!({"task_id": "t1", "user_id": "u2", "status": "assigned"}));
        let spec = spec(EntityKind::TaskAssignment);
        assert!(spec.is_same_entity(&same, &server, &ctx));
        assert!(!spec.is_same_entity(&other, &server, &ctx));
    }

    #[rstest]
    fn location_accepts_address_as_support() {
        let client = doc(json!({"name": "Central Clinic", "address": "12 Main St"}));
        let server = doc(json!({
            "name": "central clinic", "address": "12 main st",
            "type": "hospital", "latitude": 10.0, "longitude": 20.0
        }));
        let ctx = HeuristicContext::default();
        assert!(spec(EntityKind::Location).is_same_entity(&client, &server, &ctx));
    }

    #[rstest]
    fn location_coordinates_within_tolerance_count() {
        let client = doc(json!({
            "name": "Central Clinic", "type": "clinic",
            "latitude": 10.0004, "longitude": 20.0
        }));
        let server = doc(json!({
            "name": "Central Clinic", "type": "clinic",
            "latitude": 10.0, "longitude": 20.0003
        }));
        let ctx = HeuristicContext::default();
        assert!(spec(EntityKind::Location).is_same_entity(&client, &server, &ctx));
    }

    #[rstest]
    #[case("+91 11223 34455", "1122334455", true)]
    #[case("011-2233-4455", "91 1122334455", true)]
    #[case("5550100001", "5550100002", false)]
    fn phone_comparison_uses_last_ten_digits(
        #[case] a: &str,
        #[case] b: &str,
        #[case] expected: bool,
    ) {
        let left = doc(json!({"phone_number": a}));
        let right = doc(json!({"phone_number": b}));
        assert_eq!(
            Comparator::PhoneLast10.matches(&left, &right, "phone_number"),
            expected
        );
    }
}
