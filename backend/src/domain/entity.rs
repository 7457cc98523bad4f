//! Entity kinds and their sync descriptors.
//!
//! Every behavioural difference between the entity kinds lives in these
//! tables: collection names, key fields, critical and identity-defining
//! fields, secondary-uniqueness constraints, status lattices, append-merge
//! fields, and the same-entity heuristic rows. The sync engine and the
//! conflict algebra are generic over a descriptor, so adding an entity means
//! adding a table row here plus a validator.

use crate::domain::conflict::identity::{
    Comparator, ComparableField, HeuristicSpec, PrimaryCriterion,
};

/// The entity kinds served by the sync API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    User,
    Registration,
    Supply,
    Task,
    TaskAssignment,
    Location,
    Alert,
    Notification,
}

impl EntityKind {
    pub const ALL: [EntityKind; 8] = [
        EntityKind::User,
        EntityKind::Registration,
        EntityKind::Supply,
        EntityKind::Task,
        EntityKind::TaskAssignment,
        EntityKind::Location,
        EntityKind::Alert,
        EntityKind::Notification,
    ];

    /// Resolve a URL path segment (`task-assignment`) to a kind.
    pub fn from_route(segment: &str) -> Option<Self> {
        match segment {
            "user" => Some(EntityKind::User),
            "registration" => Some(EntityKind::Registration),
            "supply" => Some(EntityKind::Supply),
            "task" => Some(EntityKind::Task),
            "task-assignment" => Some(EntityKind::TaskAssignment),
            "location" => Some(EntityKind::Location),
            "alert" => Some(EntityKind::Alert),
            "notification" => Some(EntityKind::Notification),
            _ => None,
        }
    }

    /// Snake-case label used in conflict types and log fields.
    pub fn label(self) -> &'static str {
        match self {
            EntityKind::User => "user",
            EntityKind::Registration => "registration",
            EntityKind::Supply => "supply",
            EntityKind::Task => "task",
            EntityKind::TaskAssignment => "task_assignment",
            EntityKind::Location => "location",
            EntityKind::Alert => "alert",
            EntityKind::Notification => "notification",
        }
    }

    /// PascalCase name used in response keys such as `isNewUser`.
    pub fn pascal(self) -> &'static str {
        match self {
            EntityKind::User => "User",
            EntityKind::Registration => "Registration",
            EntityKind::Supply => "Supply",
            EntityKind::Task => "Task",
            EntityKind::TaskAssignment => "TaskAssignment",
            EntityKind::Location => "Location",
            EntityKind::Alert => "Alert",
            EntityKind::Notification => "Notification",
        }
    }

    /// Static descriptor row for this kind.
    pub fn descriptor(self) -> &'static EntityDescriptor {
        match self {
            EntityKind::User => &USER,
            EntityKind::Registration => &REGISTRATION,
            EntityKind::Supply => &SUPPLY,
            EntityKind::Task => &TASK,
            EntityKind::TaskAssignment => &TASK_ASSIGNMENT,
            EntityKind::Location => &LOCATION,
            EntityKind::Alert => &ALERT,
            EntityKind::Notification => &NOTIFICATION,
        }
    }
}

/// A secondary-uniqueness constraint.
///
/// The document store only supports single-field equality queries, so tuple
/// constraints probe on `probe_field` and then require every field in
/// `tuple_fields` to match before a hit counts.
#[derive(Debug, Clone, Copy)]
pub struct UniqueConstraint {
    pub probe_field: &'static str,
    pub tuple_fields: &'static [&'static str],
}

impl UniqueConstraint {
    const fn single(field: &'static str) -> Self {
        Self {
            probe_field: field,
            tuple_fields: &[],
        }
    }

    /// All fields participating in the constraint, probe field included.
    pub fn fields(&self) -> impl Iterator<Item = &'static str> + '_ {
        std::iter::once(self.probe_field).chain(self.tuple_fields.iter().copied())
    }
}

/// Total order on a status field; `merge` never moves a status backwards.
#[derive(Debug, Clone, Copy)]
pub struct StatusLattice {
    pub field: &'static str,
    ranks: &'static [(&'static str, u8)],
}

impl StatusLattice {
    /// Rank of a status value, case-insensitive. Unknown values have no rank.
    pub fn rank(&self, value: &str) -> Option<u8> {
        let value = value.trim();
        self.ranks
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(value))
            .map(|(_, rank)| *rank)
    }

    /// Join of two status values: the higher-ranked one. A value missing or
    /// unknown on one side defers to the other.
    pub fn join<'a>(&self, a: Option<&'a str>, b: Option<&'a str>) -> Option<&'a str> {
        match (
            a.and_then(|v| self.rank(v).map(|r| (v, r))),
            b.and_then(|v| self.rank(v).map(|r| (v, r))),
        ) {
            (Some((av, ar)), Some((_, br))) if ar >= br => Some(av),
            (Some(_), Some((bv, _))) => Some(bv),
            (Some((av, _)), None) => Some(av),
            (None, Some((bv, _))) => Some(bv),
            (None, None) => a.or(b),
        }
    }
}

/// Per-entity behaviour table consumed by the sync engine and the algebra.
#[derive(Debug, Clone, Copy)]
pub struct EntityDescriptor {
    pub kind: EntityKind,
    pub collection: &'static str,
    pub primary_key: &'static str,
    /// Field referencing the owning user, where the model has one.
    pub owner_field: Option<&'static str>,
    /// Fields that only move forward on a newer client timestamp.
    pub critical_fields: &'static [&'static str],
    /// Identity-defining subset preserved by the `update_data` strategy.
    /// Empty means `update_data` is not offered for this entity.
    pub identity_fields: &'static [&'static str],
    pub unique_constraints: &'static [UniqueConstraint],
    pub status_lattice: Option<StatusLattice>,
    /// Free-text fields combined by the text-append merge.
    pub append_fields: &'static [&'static str],
    /// Numeric stock field eligible for the quantity strategies.
    pub quantity_field: Option<&'static str>,
    pub heuristic: Option<HeuristicSpec>,
}

impl EntityDescriptor {
    /// `update_data` is only offered when an identity-defining subset exists.
    pub fn offers_update_data(&self) -> bool {
        !self.identity_fields.is_empty()
    }
}

static USER: EntityDescriptor = EntityDescriptor {
    kind: EntityKind::User,
    collection: "users",
    primary_key: "user_id",
    owner_field: None,
    critical_fields: &["email", "role", "password_hash"],
    identity_fields: &["email", "phone_number"],
    unique_constraints: &[
        UniqueConstraint::single("email"),
        UniqueConstraint::single("phone_number"),
    ],
    status_lattice: None,
    append_fields: &[],
    quantity_field: None,
    heuristic: Some(HeuristicSpec {
        fields: &[
            ComparableField {
                field: "name",
                comparator: Comparator::NameContains,
            },
            ComparableField {
                field: "role",
                comparator: Comparator::CaseInsensitiveExact,
            },
            ComparableField {
                field: "email",
                comparator: Comparator::CaseInsensitiveExact,
            },
            ComparableField {
                field: "phone_number",
                comparator: Comparator::PhoneLast10,
            },
        ],
        primary: PrimaryCriterion::IdOrPasswordMatch {
            id_field: "user_id",
        },
        threshold: 0.8,
    }),
};

static REGISTRATION: EntityDescriptor = EntityDescriptor {
    kind: EntityKind::Registration,
    collection: "registrations",
    primary_key: "registration_id",
    owner_field: Some("user_id"),
    critical_fields: &["person_name", "age", "gender", "status"],
    identity_fields: &["person_name", "age", "gender"],
    unique_constraints: &[UniqueConstraint {
        probe_field: "person_name",
        tuple_fields: &["age", "gender"],
    }],
    status_lattice: Some(StatusLattice {
        field: "status",
        ranks: &[
            ("pending", 1),
            ("in_progress", 2),
            ("completed", 3),
            ("transferred", 4),
            ("discharged", 5),
        ],
    }),
    append_fields: &["medical_history", "notes"],
    quantity_field: None,
    heuristic: Some(HeuristicSpec {
        fields: &[
            ComparableField {
                field: "person_name",
                comparator: Comparator::NameContains,
            },
            ComparableField {
                field: "age",
                comparator: Comparator::Within(1.0),
            },
            ComparableField {
                field: "gender",
                comparator: Comparator::CaseInsensitiveExact,
            },
            ComparableField {
                field: "contact",
                comparator: Comparator::Exact,
            },
            ComparableField {
                field: "location_id",
                comparator: Comparator::Exact,
            },
        ],
        primary: PrimaryCriterion::RequiredWithSupport {
            required: &["person_name", "gender"],
            alt_equal: None,
            min_support: 2,
        },
        threshold: 0.8,
    }),
};

static SUPPLY: EntityDescriptor = EntityDescriptor {
    kind: EntityKind::Supply,
    collection: "supplies",
    primary_key: "supply_id",
    owner_field: Some("user_id"),
    critical_fields: &["item_name", "category", "unit", "expiry_date", "status"],
    identity_fields: &[],
    unique_constraints: &[
        UniqueConstraint::single("barcode"),
        UniqueConstraint::single("sku"),
    ],
    status_lattice: None,
    append_fields: &[],
    quantity_field: Some("quantity"),
    heuristic: Some(HeuristicSpec {
        fields: &[
            ComparableField {
                field: "item_name",
                comparator: Comparator::NameContains,
            },
            ComparableField {
                field: "barcode",
                comparator: Comparator::Exact,
            },
            ComparableField {
                field: "sku",
                comparator: Comparator::Exact,
            },
            ComparableField {
                field: "category",
                comparator: Comparator::CaseInsensitiveExact,
            },
            ComparableField {
                field: "unit",
                comparator: Comparator::CaseInsensitiveExact,
            },
            ComparableField {
                field: "location_id",
                comparator: Comparator::Exact,
            },
        ],
        primary: PrimaryCriterion::AnyIdEqual {
            fields: &["barcode", "sku"],
        },
        threshold: 0.8,
    }),
};

static TASK: EntityDescriptor = EntityDescriptor {
    kind: EntityKind::Task,
    collection: "tasks",
    primary_key: "task_id",
    owner_field: Some("created_by"),
    critical_fields: &["title", "status"],
    identity_fields: &[],
    unique_constraints: &[UniqueConstraint {
        probe_field: "title",
        tuple_fields: &["location_id"],
    }],
    status_lattice: Some(StatusLattice {
        field: "status",
        ranks: &[
            ("todo", 1),
            ("pending", 1),
            ("in_progress", 2),
            ("review", 3),
            ("completed", 4),
            ("cancelled", 5),
        ],
    }),
    append_fields: &[],
    quantity_field: None,
    heuristic: Some(HeuristicSpec {
        fields: &[
            ComparableField {
                field: "title",
                comparator: Comparator::NameContains,
            },
            ComparableField {
                field: "location_id",
                comparator: Comparator::Exact,
            },
            ComparableField {
                field: "created_by",
                comparator: Comparator::Exact,
            },
            ComparableField {
                field: "due_date",
                comparator: Comparator::Exact,
            },
            ComparableField {
                field: "priority",
                comparator: Comparator::CaseInsensitiveExact,
            },
        ],
        primary: PrimaryCriterion::RequiredWithSupport {
            required: &["title"],
            alt_equal: None,
            min_support: 2,
        },
        threshold: 0.8,
    }),
};

static TASK_ASSIGNMENT: EntityDescriptor = EntityDescriptor {
    kind: EntityKind::TaskAssignment,
    collection: "task_assignments",
    primary_key: "assignment_id",
    owner_field: Some("user_id"),
    critical_fields: &["status"],
    identity_fields: &[],
    unique_constraints: &[UniqueConstraint {
        probe_field: "task_id",
        tuple_fields: &["user_id"],
    }],
    status_lattice: Some(StatusLattice {
        field: "status",
        ranks: &[
            ("assigned", 1),
            ("accepted", 2),
            ("in_progress", 3),
            ("completed", 4),
            ("rejected", 5),
            ("declined", 5),
        ],
    }),
    append_fields: &["notes"],
    quantity_field: None,
    heuristic: Some(HeuristicSpec {
        fields: &[
            ComparableField {
                field: "task_id",
                comparator: Comparator::Exact,
            },
            ComparableField {
                field: "user_id",
                comparator: Comparator::Exact,
            },
            ComparableField {
                field: "assigned_by",
                comparator: Comparator::Exact,
            },
            ComparableField {
                field: "assigned_at",
                comparator: Comparator::SameDay,
            },
            ComparableField {
                field: "status",
                comparator: Comparator::CaseInsensitiveExact,
            },
        ],
        primary: PrimaryCriterion::PairEqual {
            first: "task_id",
            second: "user_id",
        },
        threshold: 0.8,
    }),
};

static LOCATION: EntityDescriptor = EntityDescriptor {
    kind: EntityKind::Location,
    collection: "locations",
    primary_key: "location_id",
    owner_field: Some("user_id"),
    critical_fields: &["name", "type"],
    identity_fields: &["name"],
    unique_constraints: &[UniqueConstraint::single("name")],
    status_lattice: None,
    append_fields: &[],
    quantity_field: None,
    heuristic: Some(HeuristicSpec {
        fields: &[
            ComparableField {
                field: "name",
                comparator: Comparator::NameContains,
            },
            ComparableField {
                field: "address",
                comparator: Comparator::NameContains,
            },
            ComparableField {
                field: "type",
                comparator: Comparator::CaseInsensitiveExact,
            },
            ComparableField {
                field: "latitude",
                comparator: Comparator::Within(0.001),
            },
            ComparableField {
                field: "longitude",
                comparator: Comparator::Within(0.001),
            },
        ],
        primary: PrimaryCriterion::RequiredWithSupport {
            required: &["name"],
            alt_equal: Some("address"),
            min_support: 2,
        },
        threshold: 0.8,
    }),
};

static ALERT: EntityDescriptor = EntityDescriptor {
    kind: EntityKind::Alert,
    collection: "alerts",
    primary_key: "alert_id",
    owner_field: Some("user_id"),
    critical_fields: &["type", "priority", "is_active"],
    identity_fields: &[],
    unique_constraints: &[],
    status_lattice: None,
    append_fields: &[],
    quantity_field: None,
    heuristic: None,
};

static NOTIFICATION: EntityDescriptor = EntityDescriptor {
    kind: EntityKind::Notification,
    collection: "notifications",
    primary_key: "notification_id",
    owner_field: Some("user_id"),
    critical_fields: &[],
    identity_fields: &[],
    unique_constraints: &[],
    status_lattice: None,
    append_fields: &[],
    quantity_field: None,
    heuristic: None,
};
