//! Typed reference records and the immutable [`ReferenceData`] bundle the
//! recommender is built from.
//!
//! Records are plain serde structs; [`ReferenceData::new`] is the single
//! validating entry point, whether the records were generated, loaded from JSON
//! or assembled by hand.

use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{CareMatchError, InvalidInput, Result};
use crate::geo::{City, GeoPoint};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Specialty {
    Cardiology,
    Neurology,
    Orthopedics,
    Pediatrics,
    Dermatology,
    Oncology,
    Emergency,
}

impl Specialty {
    pub const ALL: [Specialty; 7] = [
        Specialty::Cardiology,
        Specialty::Neurology,
        Specialty::Orthopedics,
        Specialty::Pediatrics,
        Specialty::Dermatology,
        Specialty::Oncology,
        Specialty::Emergency,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Specialty::Cardiology => "cardiology",
            Specialty::Neurology => "neurology",
            Specialty::Orthopedics => "orthopedics",
            Specialty::Pediatrics => "pediatrics",
            Specialty::Dermatology => "dermatology",
            Specialty::Oncology => "oncology",
            Specialty::Emergency => "emergency",
        }
    }
}

impl fmt::Display for Specialty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Specialty {
    type Err = InvalidInput;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        if wanted == "general" {
            return Ok(Specialty::Emergency);
        }
        Specialty::ALL
            .into_iter()
            .find(|sp| sp.as_str() == wanted)
            .ok_or_else(|| InvalidInput::UnknownSpecialty(s.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Urgency {
    Low,
    Medium,
    High,
    Critical,
}

impl Urgency {
    pub fn as_str(self) -> &'static str {
        match self {
            Urgency::Low => "low",
            Urgency::Medium => "medium",
            Urgency::High => "high",
            Urgency::Critical => "critical",
        }
    }

    pub fn is_acute(self) -> bool {
        matches!(self, Urgency::High | Urgency::Critical)
    }
}

impl fmt::Display for Urgency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Urgency {
    type Err = InvalidInput;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "low" => Ok(Urgency::Low),
            "medium" => Ok(Urgency::Medium),
            "high" => Ok(Urgency::High),
            "critical" => Ok(Urgency::Critical),
            _ => Err(InvalidInput::UnknownUrgency(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum BloodType {
    #[serde(rename = "A+")]
    APos,
    #[serde(rename = "A-")]
    ANeg,
    #[serde(rename = "B+")]
    BPos,
    #[serde(rename = "B-")]
    BNeg,
    #[serde(rename = "AB+")]
    AbPos,
    #[serde(rename = "AB-")]
    AbNeg,
    #[serde(rename = "O+")]
    OPos,
    #[serde(rename = "O-")]
    ONeg,
}

impl BloodType {
    pub const ALL: [BloodType; 8] = [
        BloodType::APos,
        BloodType::ANeg,
        BloodType::BPos,
        BloodType::BNeg,
        BloodType::AbPos,
        BloodType::AbNeg,
        BloodType::OPos,
        BloodType::ONeg,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            BloodType::APos => "A+",
            BloodType::ANeg => "A-",
            BloodType::BPos => "B+",
            BloodType::BNeg => "B-",
            BloodType::AbPos => "AB+",
            BloodType::AbNeg => "AB-",
            BloodType::OPos => "O+",
            BloodType::ONeg => "O-",
        }
    }
}

impl fmt::Display for BloodType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BloodType {
    type Err = InvalidInput;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let wanted = s.trim().to_uppercase();
        BloodType::ALL
            .into_iter()
            .find(|bt| bt.as_str() == wanted)
            .ok_or_else(|| InvalidInput::MalformedBloodType(s.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CostTier {
    Low,
    Medium,
    High,
}

/// Per-department figures for one hospital.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpecialtyDetail {
    /// 0 to 5.
    pub rating: f64,
    pub doctor_count: u32,
    /// Percentage, 0 to 100.
    pub success_rate: f64,
    pub wait_time_days: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hospital {
    pub id: String,
    pub name: String,
    pub city: String,
    pub state: String,
    pub location: GeoPoint,
    pub overall_rating: f64,
    pub bed_capacity: u32,
    pub icu_beds: u32,
    pub operation_theaters: u32,
    pub emergency_services: bool,
    pub insurance_accepted: bool,
    pub cost_tier: CostTier,
    /// Typical emergency-room wait.
    pub emergency_wait_minutes: u32,
    #[serde(default)]
    pub contact: String,
    #[serde(default)]
    pub emergency_contact: String,
    #[serde(default)]
    pub specialties: BTreeMap<Specialty, SpecialtyDetail>,
    #[serde(default)]
    pub blood_inventory: BTreeMap<BloodType, u32>,
}

impl Hospital {
    pub fn validate(&self) -> Result<()> {
        let fail = |reason: String| CareMatchError::record("hospital", &self.id, reason);
        require_text("hospital", &self.id, "id", &self.id)?;
        require_text("hospital", &self.id, "name", &self.name)?;
        require_text("hospital", &self.id, "city", &self.city)?;
        require_text("hospital", &self.id, "state", &self.state)?;
        self.location.validate().map_err(|e| fail(e.to_string()))?;
        check_range("hospital", &self.id, "overall_rating", self.overall_rating, 0.0, 5.0)?;
        for (specialty, detail) in &self.specialties {
            check_range("hospital", &self.id, "specialty rating", detail.rating, 0.0, 5.0)?;
            check_range(
                "hospital",
                &self.id,
                "specialty success_rate",
                detail.success_rate,
                0.0,
                100.0,
            )?;
            if detail.doctor_count == 0 {
                return Err(fail(format!("{specialty} department has no doctors")));
            }
        }
        Ok(())
    }

    pub fn specialty(&self, specialty: Specialty) -> Option<&SpecialtyDetail> {
        self.specialties.get(&specialty)
    }

    pub fn blood_units(&self, blood_type: BloodType) -> u32 {
        self.blood_inventory.get(&blood_type).copied().unwrap_or(0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Doctor {
    pub id: String,
    pub hospital_id: String,
    pub name: String,
    pub specialty: Specialty,
    pub qualification: String,
    pub experience_years: u32,
    pub rating: f64,
    pub success_rate: f64,
    pub procedures_performed: u32,
}

impl Doctor {
    pub fn validate(&self) -> Result<()> {
        require_text("doctor", &self.id, "id", &self.id)?;
        require_text("doctor", &self.id, "hospital_id", &self.hospital_id)?;
        require_text("doctor", &self.id, "name", &self.name)?;
        check_range("doctor", &self.id, "rating", self.rating, 0.0, 5.0)?;
        check_range("doctor", &self.id, "success_rate", self.success_rate, 0.0, 100.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Donor {
    pub id: String,
    pub name: String,
    pub blood_type: BloodType,
    pub city: String,
    pub location: GeoPoint,
    pub available: bool,
    pub last_donation: DateTime<Utc>,
    pub age: u32,
    pub weight_kg: f64,
    /// Placeholder contact handle; real numbers are never stored here.
    pub contact: String,
}

impl Donor {
    pub fn validate(&self) -> Result<()> {
        require_text("donor", &self.id, "id", &self.id)?;
        require_text("donor", &self.id, "name", &self.name)?;
        require_text("donor", &self.id, "city", &self.city)?;
        self.location
            .validate()
            .map_err(|e| CareMatchError::record("donor", &self.id, e.to_string()))?;
        if !self.weight_kg.is_finite() || self.weight_kg <= 0.0 {
            return Err(CareMatchError::record("donor", &self.id, "weight must be positive"));
        }
        Ok(())
    }

    pub fn days_since_donation(&self, as_of: DateTime<Utc>) -> i64 {
        (as_of - self.last_donation).num_days().max(0)
    }
}

fn require_text(kind: &'static str, id: &str, field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(CareMatchError::record(kind, id, format!("{field} is empty")));
    }
    Ok(())
}

fn check_range(kind: &'static str, id: &str, field: &str, value: f64, lo: f64, hi: f64) -> Result<()> {
    if !value.is_finite() || value < lo || value > hi {
        return Err(CareMatchError::record(
            kind,
            id,
            format!("{field} {value} outside [{lo}, {hi}]"),
        ));
    }
    Ok(())
}

/// Everything the recommender reads at request time. Read-only once built.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReferenceData {
    pub cities: Vec<City>,
    pub hospitals: Vec<Hospital>,
    pub doctors: Vec<Doctor>,
    pub donors: Vec<Donor>,
}

impl ReferenceData {
    pub fn new(
        cities: Vec<City>,
        hospitals: Vec<Hospital>,
        doctors: Vec<Doctor>,
        donors: Vec<Donor>,
    ) -> Result<Self> {
        let data = ReferenceData {
            cities,
            hospitals,
            doctors,
            donors,
        };
        data.validate()?;
        Ok(data)
    }

    pub fn validate(&self) -> Result<()> {
        for city in &self.cities {
            city.validate()?;
        }

        let mut hospital_ids = HashSet::new();
        for hospital in &self.hospitals {
            hospital.validate()?;
            if !hospital_ids.insert(hospital.id.as_str()) {
                return Err(CareMatchError::record("hospital", &hospital.id, "duplicate id"));
            }
        }

        let mut doctor_ids = HashSet::new();
        for doctor in &self.doctors {
            doctor.validate()?;
            if !doctor_ids.insert(doctor.id.as_str()) {
                return Err(CareMatchError::record("doctor", &doctor.id, "duplicate id"));
            }
            if !hospital_ids.contains(doctor.hospital_id.as_str()) {
                return Err(CareMatchError::record(
                    "doctor",
                    &doctor.id,
                    format!("unknown hospital {:?}", doctor.hospital_id),
                ));
            }
        }

        let mut donor_ids = HashSet::new();
        for donor in &self.donors {
            donor.validate()?;
            if !donor_ids.insert(donor.id.as_str()) {
                return Err(CareMatchError::record("donor", &donor.id, "duplicate id"));
            }
        }
        Ok(())
    }

    pub fn load_json(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)?;
        let data: ReferenceData = serde_json::from_str(&raw)?;
        data.validate()?;
        info!(
            path = %path.display(),
            hospitals = data.hospitals.len(),
            doctors = data.doctors.len(),
            donors = data.donors.len(),
            "loaded reference data"
        );
        Ok(data)
    }

    pub fn save_json(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    pub fn hospital(&self, id: &str) -> Option<&Hospital> {
        self.hospitals.iter().find(|h| h.id == id)
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use chrono::TimeZone;

    use super::*;
    use crate::geo::builtin_cities;

    pub fn hospital(id: &str, city: &City) -> Hospital {
        Hospital {
            id: id.to_string(),
            name: format!("{id} General"),
            city: city.name.clone(),
            state: city.state.clone(),
            location: city.location,
            overall_rating: 4.0,
            bed_capacity: 200,
            icu_beds: 20,
            operation_theaters: 6,
            emergency_services: true,
            insurance_accepted: true,
            cost_tier: CostTier::Medium,
            emergency_wait_minutes: 30,
            contact: format!("+91-11-{id}"),
            emergency_contact: format!("+91-11-{id}-er"),
            specialties: BTreeMap::new(),
            blood_inventory: BTreeMap::new(),
        }
    }

    pub fn detail(rating: f64, doctor_count: u32) -> SpecialtyDetail {
        SpecialtyDetail {
            rating,
            doctor_count,
            success_rate: 95.0,
            wait_time_days: 5,
        }
    }

    pub fn doctor(id: &str, hospital_id: &str, specialty: Specialty, rating: f64) -> Doctor {
        Doctor {
            id: id.to_string(),
            hospital_id: hospital_id.to_string(),
            name: format!("Dr. {id}"),
            specialty,
            qualification: "MD".to_string(),
            experience_years: 10,
            rating,
            success_rate: 90.0,
            procedures_performed: 300,
        }
    }

    pub fn as_of() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap()
    }

    pub fn donor(id: &str, blood_type: BloodType, city: &City, available: bool, days_ago: i64) -> Donor {
        Donor {
            id: id.to_string(),
            name: format!("Donor {id}"),
            blood_type,
            city: city.name.clone(),
            location: city.location,
            available,
            last_donation: as_of() - chrono::Duration::days(days_ago),
            age: 30,
            weight_kg: 70.0,
            contact: format!("contact://{id}"),
        }
    }

    pub fn city(name: &str) -> City {
        builtin_cities()
            .into_iter()
            .find(|c| c.name == name)
            .unwrap()
    }
}
