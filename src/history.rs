//! Append-only CSV log of answered requests, read back by the dashboard.

use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use csv::{ReaderBuilder, WriterBuilder};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::blood_bank::{BloodAvailability, DonorSearchResult};
use crate::blood_request::BloodRequestResponse;
use crate::config::{DEFAULT_HISTORY_PATH, HISTORY_ENV};
use crate::error::Result;
use crate::recommender::HospitalRecommendations;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestKind {
    Hospitals,
    Donors,
    Availability,
    #[serde(rename = "blood_request")]
    BloodRequest,
}

/// One row of the history file. Headers are written once, when the file is
/// created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct HistoryRecord {
    pub timestamp: DateTime<Utc>,
    pub kind: RequestKind,
    pub city: String,
    /// Complaint text for hospital requests, blood type otherwise.
    pub query: String,
    pub detail: String,
    pub result_count: usize,
    pub top_result: Option<String>,
    pub top_score: Option<f64>,
    pub reason: Option<String>,
}

impl HistoryRecord {
    pub fn from_hospitals(description: &str, out: &HospitalRecommendations, at: DateTime<Utc>) -> Self {
        let top = out.results.first();
        HistoryRecord {
            timestamp: at,
            kind: RequestKind::Hospitals,
            city: out.city.clone(),
            query: description.to_string(),
            detail: format!("{} ({})", out.prediction.specialty, out.urgency),
            result_count: out.results.len(),
            top_result: top.map(|r| r.item.name.clone()),
            top_score: top.map(|r| r.score),
            reason: out.reason.map(|r| r.as_str().to_string()),
        }
    }

    pub fn from_donors(out: &DonorSearchResult, at: DateTime<Utc>) -> Self {
        let top = out.results.first();
        HistoryRecord {
            timestamp: at,
            kind: RequestKind::Donors,
            city: out.city.clone(),
            query: out.recipient.to_string(),
            detail: format!("{} km, {} widened", out.search_radius_km, out.widened_included),
            result_count: out.results.len(),
            top_result: top.map(|r| r.item.donor_id.clone()),
            top_score: top.map(|r| r.score),
            reason: out.reason.map(|r| r.as_str().to_string()),
        }
    }

    pub fn from_availability(out: &BloodAvailability, at: DateTime<Utc>) -> Self {
        HistoryRecord {
            timestamp: at,
            kind: RequestKind::Availability,
            city: out.city.clone(),
            query: out.blood_type.to_string(),
            detail: format!("{} units within {} km", out.total_units, out.search_radius_km),
            result_count: out.hospitals_with_blood.len(),
            top_result: out.nearest.as_ref().map(|n| n.name.clone()),
            top_score: None,
            reason: out.reason.map(|r| r.as_str().to_string()),
        }
    }

    /// Top donor when a blood type was given; otherwise the row only records
    /// the classification.
    pub fn from_blood_request(out: &BloodRequestResponse, at: DateTime<Utc>) -> Self {
        let blood_type = out.availability.as_ref().map(|a| a.blood_type.to_string());
        let top = out.donors.as_ref().and_then(|d| d.results.first());
        HistoryRecord {
            timestamp: at,
            kind: RequestKind::BloodRequest,
            city: out.city.clone(),
            query: out.query.clone(),
            detail: format!(
                "{} ({:.2}), {}",
                out.prediction.request_type,
                out.prediction.confidence,
                blood_type.as_deref().unwrap_or("any type")
            ),
            result_count: out.donors.as_ref().map_or(0, |d| d.results.len()),
            top_result: top.map(|r| r.item.donor_id.clone()),
            top_score: top.map(|r| r.score),
            reason: out
                .donors
                .as_ref()
                .and_then(|d| d.reason)
                .map(|r| r.as_str().to_string()),
        }
    }
}

/// `CARE_MATCH_HISTORY`, or `recommendations.csv` in the working directory.
pub fn history_path() -> PathBuf {
    std::env::var_os(HISTORY_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_HISTORY_PATH))
}

pub fn append_record(path: &Path, record: &HistoryRecord) -> Result<()> {
    let file_exists = path.exists() && fs::metadata(path)?.len() > 0;
    let file = OpenOptions::new().create(true).append(true).open(path)?;

    let mut wtr = WriterBuilder::new().has_headers(!file_exists).from_writer(file);
    wtr.serialize(record)?;
    wtr.flush()?;
    debug!(path = %path.display(), kind = ?record.kind, "appended history record");
    Ok(())
}

/// All records in file order. A missing file is an empty history.
pub fn read_history(path: &Path) -> Result<Vec<HistoryRecord>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let file = File::open(path)?;
    let mut rdr = ReaderBuilder::new().has_headers(true).from_reader(file);
    let mut records = Vec::new();
    for result in rdr.deserialize() {
        records.push(result?);
    }
    Ok(records)
}
