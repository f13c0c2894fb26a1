//! Composite hospital score and doctor quality score.
//!
//! Every sub-score is normalised to `[0, 1]` and the composite is a convex
//! combination of them, so the composite is also in `[0, 1]`.

use serde::{Deserialize, Serialize};

use crate::data::{Doctor, Hospital, Specialty, Urgency};
use crate::error::{CareMatchError, Result};
use crate::geo::{distance_km, GeoPoint};
use crate::utils::unit;

pub const SPECIALTY_WEIGHT: f64 = 0.40;
pub const BASE_QUALITY_WEIGHT: f64 = 0.30;
pub const URGENCY_WEIGHT: f64 = 0.15;
pub const DISTANCE_WEIGHT: f64 = 0.10;
pub const EMERGENCY_BONUS_WEIGHT: f64 = 0.05;

/// Specialty sub-score for a hospital without the predicted department.
pub const SPECIALTY_MISS_SCORE: f64 = 0.1;

pub const MAX_RATING: f64 = 5.0;
/// Departments with this many doctors or more get full credit for staffing.
pub const FULL_DEPARTMENT_DOCTORS: f64 = 10.0;
pub const MAX_WAIT_DAYS: f64 = 30.0;

pub const NEAR_KM: f64 = 50.0;
pub const NEARBY_KM: f64 = 100.0;
pub const NEARBY_SCORE: f64 = 0.8;
pub const FAR_CUTOFF_KM: f64 = 500.0;

/// ICU beds a hospital needs for a full urgency score on critical requests.
pub const CRITICAL_ICU_BEDS: u32 = 10;
pub const FAST_EMERGENCY_WAIT_MINUTES: u32 = 60;

/// Weights of the composite hospital score.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringWeights {
    pub specialty: f64,
    pub base_quality: f64,
    pub urgency: f64,
    pub distance: f64,
    pub emergency_bonus: f64,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        ScoringWeights {
            specialty: SPECIALTY_WEIGHT,
            base_quality: BASE_QUALITY_WEIGHT,
            urgency: URGENCY_WEIGHT,
            distance: DISTANCE_WEIGHT,
            emergency_bonus: EMERGENCY_BONUS_WEIGHT,
        }
    }
}

impl ScoringWeights {
    fn as_array(&self) -> [f64; 5] {
        [
            self.specialty,
            self.base_quality,
            self.urgency,
            self.distance,
            self.emergency_bonus,
        ]
    }

    pub fn validate(&self) -> Result<()> {
        let weights = self.as_array();
        if weights.iter().any(|w| !w.is_finite() || *w < 0.0) {
            return Err(CareMatchError::InvalidConfig(
                "scoring weights must be finite and non-negative".into(),
            ));
        }
        let sum: f64 = weights.iter().sum();
        if (sum - 1.0).abs() > 1e-6 {
            return Err(CareMatchError::InvalidConfig(format!(
                "scoring weights must sum to 1, got {sum}"
            )));
        }
        Ok(())
    }
}

/// Per-factor sub-scores and the weighted total.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub specialty: f64,
    pub base_quality: f64,
    pub urgency: f64,
    pub distance: f64,
    pub emergency_bonus: f64,
    pub total: f64,
}

pub fn specialty_score(hospital: &Hospital, specialty: Specialty) -> f64 {
    match hospital.specialty(specialty) {
        Some(detail) => unit(
            0.5 * unit(detail.rating / MAX_RATING)
                + 0.2 * unit(f64::from(detail.doctor_count) / FULL_DEPARTMENT_DOCTORS)
                + 0.2 * unit(detail.success_rate / 100.0)
                + 0.1 * (1.0 - unit(f64::from(detail.wait_time_days) / MAX_WAIT_DAYS)),
        ),
        None => SPECIALTY_MISS_SCORE,
    }
}

pub fn base_quality_score(hospital: &Hospital) -> f64 {
    unit(hospital.overall_rating / MAX_RATING)
}

pub fn urgency_score(hospital: &Hospital, urgency: Urgency) -> f64 {
    match urgency {
        Urgency::Critical => match (hospital.emergency_services, hospital.icu_beds > CRITICAL_ICU_BEDS) {
            (true, true) => 1.0,
            (true, false) => 0.8,
            (false, _) => 0.4,
        },
        Urgency::High => {
            if hospital.emergency_services {
                1.0
            } else {
                0.5
            }
        }
        Urgency::Medium => {
            if hospital.emergency_wait_minutes < FAST_EMERGENCY_WAIT_MINUTES {
                0.7
            } else {
                0.5
            }
        }
        Urgency::Low => 0.6,
    }
}

/// Whether the hospital can plausibly handle a request of this urgency.
pub fn urgency_match(hospital: &Hospital, urgency: Urgency) -> bool {
    match urgency {
        Urgency::Critical => hospital.emergency_services && hospital.icu_beds > 5,
        Urgency::High => hospital.emergency_services || hospital.emergency_wait_minutes < 90,
        Urgency::Medium | Urgency::Low => true,
    }
}

/// Non-increasing in distance, bounded to `[0, 1]`.
pub fn distance_score(distance_km: f64) -> f64 {
    if !distance_km.is_finite() {
        return 0.0;
    }
    if distance_km < NEAR_KM {
        1.0
    } else if distance_km < NEARBY_KM {
        NEARBY_SCORE
    } else {
        unit(1.0 - distance_km / FAR_CUTOFF_KM)
    }
}

pub fn emergency_bonus(hospital: &Hospital, urgency: Urgency) -> f64 {
    if urgency.is_acute() && hospital.emergency_services {
        1.0
    } else {
        0.0
    }
}

pub fn score_hospital(
    hospital: &Hospital,
    specialty: Specialty,
    urgency: Urgency,
    distance_km: f64,
    weights: &ScoringWeights,
) -> ScoreBreakdown {
    let specialty = specialty_score(hospital, specialty);
    let base_quality = base_quality_score(hospital);
    let urgency_sub = urgency_score(hospital, urgency);
    let distance = distance_score(distance_km);
    let bonus = emergency_bonus(hospital, urgency);

    let total = weights.specialty * specialty
        + weights.base_quality * base_quality
        + weights.urgency * urgency_sub
        + weights.distance * distance
        + weights.emergency_bonus * bonus;

    ScoreBreakdown {
        specialty,
        base_quality,
        urgency: urgency_sub,
        distance,
        emergency_bonus: bonus,
        total,
    }
}

#[derive(Debug, Clone)]
pub struct ScoredHospital<'a> {
    pub hospital: &'a Hospital,
    pub distance_km: f64,
    pub breakdown: ScoreBreakdown,
}

pub fn score_hospitals<'a>(
    hospitals: &[&'a Hospital],
    origin: GeoPoint,
    specialty: Specialty,
    urgency: Urgency,
    weights: &ScoringWeights,
) -> Vec<ScoredHospital<'a>> {
    let mut scored = Vec::with_capacity(hospitals.len());

    for &hospital in hospitals {
        let distance = distance_km(origin, hospital.location);
        let breakdown = score_hospital(hospital, specialty, urgency, distance, weights);
        scored.push(ScoredHospital {
            hospital,
            distance_km: distance,
            breakdown,
        });
    }

    scored
}

/// Secondary score used to pick the doctors shown with a hospital.
pub fn doctor_quality(doctor: &Doctor) -> f64 {
    0.4 * unit(doctor.rating / MAX_RATING)
        + 0.3 * unit(f64::from(doctor.experience_years) / 40.0)
        + 0.2 * unit(doctor.success_rate / 100.0)
        + 0.1 * unit(f64::from(doctor.procedures_performed) / 1000.0)
}
