use std::collections::BTreeMap;

use store::Priority;

/// Candidate fields per logical attribute, highest priority first.
pub const SUBJECT_FIELDS: &[&str] = &["subject", "issue", "title"];
pub const DESCRIPTION_FIELDS: &[&str] = &["description", "details"];
pub const PRIORITY_FIELDS: &[&str] = &["priority", "severity"];
pub const EQUIPMENT_FIELDS: &[&str] = &["equipment", "machine", "equipment_name"];
pub const LOCATION_FIELDS: &[&str] = &["location", "site"];
pub const FAULT_FIELDS: &[&str] = &["faulty", "fault"];
pub const METRIC_FIELDS: &[&str] = &["temperature", "pressure", "vibration", "humidity"];
pub const EQUIPMENT_REF_FIELD: &str = "equipment_id";

pub const DEFAULT_EQUIPMENT: &str = "Equipment";
pub const PLACEHOLDER_DESCRIPTION: &str = "Simulated ingestion";

/// Feed record keyed by sanitized header names.
pub type RawRecord = BTreeMap<String, String>;

/// Shared attributes every feed shape may carry.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Readings {
    pub priority: Option<String>,
    pub faulty: Option<String>,
    pub description: Option<String>,
    pub metrics: Vec<(&'static str, String)>,
    pub equipment_ref: Option<String>,
}

/// Maintenance ticket export: already names its problem.
#[derive(Debug, Clone, PartialEq)]
pub struct TicketRow {
    pub subject: String,
    pub readings: Readings,
}

/// Sensor or anomaly export: subject is synthesized from equipment and location.
#[derive(Debug, Clone, PartialEq)]
pub struct SensorRow {
    pub equipment: Option<String>,
    pub location: Option<String>,
    pub readings: Readings,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Template {
    pub subject: &'static str,
    pub priority: Priority,
}

/// Known shapes a candidate row can take.
#[derive(Debug, Clone, PartialEq)]
pub enum FeedRow {
    Ticket(TicketRow),
    Sensor(SensorRow),
    Template(Template),
}

pub const TEMPLATES: [Template; 4] = [
    Template {
        subject: "High vibration detected",
        priority: Priority::High,
    },
    Template {
        subject: "Overheat warning",
        priority: Priority::Critical,
    },
    Template {
        subject: "Oil level low",
        priority: Priority::Medium,
    },
    Template {
        subject: "Bearing anomaly",
        priority: Priority::High,
    },
];

pub fn template_rows() -> Vec<FeedRow> {
    TEMPLATES.iter().copied().map(FeedRow::Template).collect()
}
