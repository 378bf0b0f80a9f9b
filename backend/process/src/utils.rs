use std::{fs, path::Path, sync::LazyLock};

use regex::Regex;
use serde_json::Value;
use store::{NewRequest, Priority, RequestType, Status};
use tracing::{debug, warn};

use crate::{
    error::FeedError,
    models::{
        DEFAULT_EQUIPMENT, DESCRIPTION_FIELDS, EQUIPMENT_FIELDS, EQUIPMENT_REF_FIELD,
        FAULT_FIELDS, FeedRow, LOCATION_FIELDS, METRIC_FIELDS, PLACEHOLDER_DESCRIPTION,
        PRIORITY_FIELDS, RawRecord, Readings, SUBJECT_FIELDS, SensorRow, TicketRow,
    },
};

static SEPARATORS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^a-z0-9]+").expect("separator pattern is valid"));

/// Collapses a feed header into a lookup key, `Equipment ID` becomes `equipment_id`.
pub fn sanitize_header(input: &str) -> String {
    let lowered = input.trim().to_lowercase();

    SEPARATORS
        .replace_all(&lowered, "_")
        .trim_matches('_')
        .to_string()
}

fn insert_populated(record: &mut RawRecord, key: &str, value: &str) {
    let value = value.trim();
    let key = sanitize_header(key);

    if !key.is_empty() && !value.is_empty() {
        record.insert(key, value.to_string());
    }
}

/// Reads a `.csv` or `.json` feed into sanitized records.
pub fn load_feed(path: &Path) -> Result<Vec<RawRecord>, FeedError> {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase);

    match extension.as_deref() {
        Some("csv") => load_csv(path),
        Some("json") => load_json(path),
        _ => Err(FeedError::UnsupportedFormat(path.to_path_buf())),
    }
}

fn load_csv(path: &Path) -> Result<Vec<RawRecord>, FeedError> {
    let mut reader = csv::ReaderBuilder::new().flexible(true).from_path(path)?;
    let headers = reader.headers()?.clone();

    let mut records = Vec::new();
    let mut malformed = 0;
    for (line, result) in reader.records().enumerate() {
        let row = match result {
            Ok(row) => row,
            Err(err) => {
                debug!(record = line + 1, "Skipping malformed CSV record: {err}");
                malformed += 1;
                continue;
            }
        };

        let mut record = RawRecord::new();
        for (header, value) in headers.iter().zip(row.iter()) {
            insert_populated(&mut record, header, value);
        }

        records.push(record);
    }

    report_malformed(path, malformed);
    Ok(records)
}

fn load_json(path: &Path) -> Result<Vec<RawRecord>, FeedError> {
    let text = fs::read_to_string(path).map_err(|source| FeedError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let Value::Array(items) = serde_json::from_str::<Value>(&text)? else {
        return Err(FeedError::NotAnArray);
    };

    let mut records = Vec::with_capacity(items.len());
    let mut malformed = 0;
    for (index, item) in items.into_iter().enumerate() {
        let Value::Object(fields) = item else {
            debug!(item = index, "Skipping JSON feed item that is not an object");
            malformed += 1;
            continue;
        };

        let mut record = RawRecord::new();
        for (key, value) in fields {
            match value {
                Value::Null => {}
                Value::String(s) => insert_populated(&mut record, &key, &s),
                other => insert_populated(&mut record, &key, &other.to_string()),
            }
        }

        records.push(record);
    }

    report_malformed(path, malformed);
    Ok(records)
}

fn report_malformed(path: &Path, malformed: usize) {
    if malformed > 0 {
        warn!(skipped = malformed, path = %path.display(), "Malformed feed records were skipped");
    }
}

fn first_populated(record: &RawRecord, fields: &[&str]) -> Option<String> {
    fields
        .iter()
        .filter_map(|field| record.get(*field))
        .map(|value| value.trim())
        .find(|value| !value.is_empty())
        .map(str::to_string)
}

fn readings(record: &RawRecord) -> Readings {
    Readings {
        priority: first_populated(record, PRIORITY_FIELDS),
        faulty: first_populated(record, FAULT_FIELDS),
        description: first_populated(record, DESCRIPTION_FIELDS),
        metrics: METRIC_FIELDS
            .iter()
            .filter_map(|&name| first_populated(record, &[name]).map(|value| (name, value)))
            .collect(),
        equipment_ref: first_populated(record, &[EQUIPMENT_REF_FIELD]),
    }
}

/// Recognizes the shape of a raw record. `None` means no known shape matched and
/// the record must not be ingested as-is.
pub fn classify(record: &RawRecord) -> Option<FeedRow> {
    let readings = readings(record);

    if let Some(subject) = first_populated(record, SUBJECT_FIELDS) {
        return Some(FeedRow::Ticket(TicketRow { subject, readings }));
    }

    let equipment = first_populated(record, EQUIPMENT_FIELDS);
    let location = first_populated(record, LOCATION_FIELDS);

    let looks_like_sensor = equipment.is_some()
        || location.is_some()
        || readings.faulty.is_some()
        || !readings.metrics.is_empty();

    looks_like_sensor.then_some(FeedRow::Sensor(SensorRow {
        equipment,
        location,
        readings,
    }))
}

pub fn is_truthy(raw: &str) -> bool {
    matches!(
        raw.trim().to_ascii_lowercase().as_str(),
        "1" | "1.0" | "true" | "yes" | "y"
    )
}

fn priority_of(readings: &Readings) -> Priority {
    let explicit = readings.priority.as_deref().and_then(|raw| {
        raw.parse::<Priority>()
            .map_err(|_| debug!(priority = raw, "Unrecognized priority, using fault flag"))
            .ok()
    });

    explicit.unwrap_or_else(|| match readings.faulty.as_deref() {
        Some(flag) if is_truthy(flag) => Priority::Critical,
        _ => Priority::Low,
    })
}

fn description_of(readings: &Readings) -> String {
    if let Some(description) = &readings.description {
        return description.clone();
    }

    if readings.metrics.is_empty() {
        return PLACEHOLDER_DESCRIPTION.to_string();
    }

    readings
        .metrics
        .iter()
        .map(|(name, value)| format!("{name}={value}"))
        .collect::<Vec<_>>()
        .join(", ")
}

fn equipment_ref_of(readings: &Readings) -> Option<i64> {
    let raw = readings.equipment_ref.as_deref()?;

    raw.trim()
        .parse()
        .map_err(|_| debug!(equipment_id = raw, "Ignoring malformed equipment reference"))
        .ok()
}

/// Turns any known feed shape into an insertable request. Always status New.
pub fn normalize(row: &FeedRow) -> NewRequest {
    let (subject, readings) = match row {
        FeedRow::Template(template) => {
            let mut request = NewRequest::new(template.subject);
            request.priority = Some(template.priority);
            request.description = Some(PLACEHOLDER_DESCRIPTION.to_string());

            return request;
        }
        FeedRow::Ticket(ticket) => (ticket.subject.clone(), &ticket.readings),
        FeedRow::Sensor(sensor) => {
            let equipment = sensor.equipment.as_deref().unwrap_or(DEFAULT_EQUIPMENT);
            let subject = match &sensor.location {
                Some(location) => format!("{equipment} anomaly at {location}"),
                None => format!("{equipment} anomaly"),
            };

            (subject, &sensor.readings)
        }
    };

    let mut request = NewRequest::new(subject);
    request.request_type = RequestType::Corrective;
    request.status = Status::New;
    request.priority = Some(priority_of(readings));
    request.description = Some(description_of(readings));
    request.equipment_id = equipment_ref_of(readings);

    request
}
