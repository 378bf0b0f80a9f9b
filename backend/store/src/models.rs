use std::{fmt, str::FromStr};

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::error::MaintenanceError;

/// Kanban bucket of a maintenance request.
///
/// Stored as its display literal, so `In Progress` keeps its space on disk and on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Status {
    New,
    #[serde(rename = "In Progress")]
    InProgress,
    Repaired,
    Scrap,
}

impl Status {
    pub const ALL: [Status; 4] = [
        Status::New,
        Status::InProgress,
        Status::Repaired,
        Status::Scrap,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Status::New => "New",
            Status::InProgress => "In Progress",
            Status::Repaired => "Repaired",
            Status::Scrap => "Scrap",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Status {
    type Err = MaintenanceError;

    // Exact literals only: these strings double as bucket keys.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Status::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| MaintenanceError::InvalidStatus(s.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Priority {
    Low,
    Medium,
    High,
    Critical,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Low => "Low",
            Priority::Medium => "Medium",
            Priority::High => "High",
            Priority::Critical => "Critical",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Priority {
    type Err = MaintenanceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(Priority::Low),
            "medium" => Ok(Priority::Medium),
            "high" => Ok(Priority::High),
            "critical" => Ok(Priority::Critical),
            _ => Err(MaintenanceError::InvalidPriority(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RequestType {
    Preventive,
    #[default]
    Corrective,
}

impl RequestType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestType::Preventive => "Preventive",
            RequestType::Corrective => "Corrective",
        }
    }
}

impl FromStr for RequestType {
    type Err = MaintenanceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "preventive" => Ok(RequestType::Preventive),
            "corrective" => Ok(RequestType::Corrective),
            _ => Err(MaintenanceError::InvalidRequestType(s.to_string())),
        }
    }
}

/// Payload accepted by the single insertion path shared by API clients and the simulator.
#[derive(Debug, Clone, PartialEq)]
pub struct NewRequest {
    pub subject: String,
    pub description: Option<String>,
    pub request_type: RequestType,
    pub status: Status,
    pub priority: Option<Priority>,
    pub equipment_id: Option<i64>,
    pub scheduled_date: Option<NaiveDate>,
    pub duration_hours: Option<f64>,
}

impl NewRequest {
    pub fn new(subject: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            description: None,
            request_type: RequestType::default(),
            status: Status::New,
            priority: None,
            equipment_id: None,
            scheduled_date: None,
            duration_hours: None,
        }
    }
}

/// Raw board row. Status and priority stay as text so the projector can
/// reject rows that break the status invariant instead of failing the decode.
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct RequestRow {
    pub id: i64,
    pub subject: String,
    pub status: String,
    pub priority: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MaintenanceRequest {
    pub id: i64,
    pub subject: String,
    pub description: Option<String>,
    pub request_type: RequestType,
    pub status: Status,
    pub priority: Option<Priority>,
    pub equipment_id: Option<i64>,
    pub scheduled_date: Option<NaiveDate>,
    pub duration_hours: Option<f64>,
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewEquipment {
    pub name: String,
    pub location: Option<String>,
    pub health_score: f64,
    pub is_functional: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Equipment {
    pub id: i64,
    pub name: String,
    pub location: Option<String>,
    pub is_functional: bool,
    pub health_score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EquipmentHealth {
    pub name: String,
    pub score: f64,
    pub status: String,
}
