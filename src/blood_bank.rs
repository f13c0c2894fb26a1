//! Blood donor matching and hospital blood-stock lookup.

use std::cmp::Ordering;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::data::{BloodType, Donor, Urgency};
use crate::error::{CareMatchError, InvalidInput, Result};
use crate::geo::distance_km;
use crate::recommender::{RankedResult, ReasonCode, Recommender};
use crate::utils::unit;

/// Hospitals listed in [`BloodAvailability::emergency_contacts`].
pub const EMERGENCY_CONTACT_LIMIT: usize = 5;

/// Donor blood types a recipient of the given type can receive.
pub fn compatible_donors(recipient: BloodType) -> &'static [BloodType] {
    use BloodType::*;
    match recipient {
        APos => &[APos, ANeg, OPos, ONeg],
        ANeg => &[ANeg, ONeg],
        BPos => &[BPos, BNeg, OPos, ONeg],
        BNeg => &[BNeg, ONeg],
        AbPos => &[APos, ANeg, BPos, BNeg, AbPos, AbNeg, OPos, ONeg],
        AbNeg => &[ANeg, BNeg, AbNeg, ONeg],
        OPos => &[OPos, ONeg],
        ONeg => &[ONeg],
    }
}

pub fn can_donate(donor: BloodType, recipient: BloodType) -> bool {
    compatible_donors(recipient).contains(&donor)
}

/// How far past the requested radius a donor search may reach, and who is
/// eligible at all.
///
/// Donors inside the radius are always returned. Donors in
/// `(radius, widening_factor * radius]` are candidates for widening; the
/// nearest `ceil(widened_fraction * candidates)` of them, at most
/// `max_widened`, are added. Nobody beyond `widening_factor * radius` is ever
/// returned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DonorSearchPolicy {
    pub widening_factor: f64,
    pub widened_fraction: f64,
    pub max_widened: usize,
    pub min_age: u32,
    pub max_age: u32,
    pub min_weight_kg: f64,
}

impl Default for DonorSearchPolicy {
    fn default() -> Self {
        DonorSearchPolicy {
            widening_factor: 2.0,
            widened_fraction: 0.4,
            max_widened: 10,
            min_age: 18,
            max_age: 65,
            min_weight_kg: 50.0,
        }
    }
}

impl DonorSearchPolicy {
    pub fn validate(&self) -> Result<()> {
        if !self.widening_factor.is_finite() || self.widening_factor < 1.0 {
            return Err(CareMatchError::InvalidConfig(format!(
                "widening_factor must be >= 1, got {}",
                self.widening_factor
            )));
        }
        if !(0.0..=1.0).contains(&self.widened_fraction) {
            return Err(CareMatchError::InvalidConfig(format!(
                "widened_fraction must be within [0, 1], got {}",
                self.widened_fraction
            )));
        }
        if !self.min_weight_kg.is_finite() || self.min_weight_kg < 0.0 {
            return Err(CareMatchError::InvalidConfig(format!(
                "min_weight_kg must be finite and >= 0, got {}",
                self.min_weight_kg
            )));
        }
        if self.min_age > self.max_age {
            return Err(CareMatchError::InvalidConfig("min_age exceeds max_age".into()));
        }
        Ok(())
    }

    pub fn is_eligible(&self, donor: &Donor) -> bool {
        (self.min_age..=self.max_age).contains(&donor.age) && donor.weight_kg >= self.min_weight_kg
    }

    fn widened_quota(&self, candidates: usize) -> usize {
        let share = (self.widened_fraction * candidates as f64).ceil() as usize;
        share.min(self.max_widened).min(candidates)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DonorQuery {
    pub blood_type: BloodType,
    pub city: String,
    pub urgency: Urgency,
    pub radius_km: f64,
}

impl DonorQuery {
    pub fn parse(blood_type: &str, city: &str, urgency: &str, radius_km: f64) -> std::result::Result<Self, InvalidInput> {
        Ok(DonorQuery {
            blood_type: blood_type.parse()?,
            city: city.to_string(),
            urgency: urgency.parse()?,
            radius_km,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DonorMatch {
    pub donor_id: String,
    pub name: String,
    pub blood_type: BloodType,
    pub city: String,
    pub available: bool,
    pub contact: String,
    pub last_donation_days: i64,
    /// Included by the widening policy rather than the requested radius.
    pub widened: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DonorSearchResult {
    pub recipient: BloodType,
    pub compatible_types: Vec<BloodType>,
    pub city: String,
    pub urgency: Urgency,
    pub search_radius_km: f64,
    pub widened_radius_km: f64,
    pub within_radius: usize,
    pub widened_included: usize,
    pub results: Vec<RankedResult<DonorMatch>>,
    pub reason: Option<ReasonCode>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HospitalBloodStock {
    pub hospital_id: String,
    pub name: String,
    pub city: String,
    pub state: String,
    pub distance_km: f64,
    pub units: u32,
    pub contact: String,
    pub emergency_contact: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EmergencyContact {
    pub hospital_id: String,
    pub hospital_name: String,
    pub emergency_contact: String,
    pub distance_km: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BloodAvailability {
    pub blood_type: BloodType,
    pub city: String,
    pub search_radius_km: f64,
    pub hospitals_with_blood: Vec<HospitalBloodStock>,
    pub total_units: u32,
    pub nearest: Option<HospitalBloodStock>,
    /// Nearest hospitals in the radius, stocked or not.
    pub emergency_contacts: Vec<EmergencyContact>,
    pub reason: Option<ReasonCode>,
}

struct Candidate<'a> {
    donor: &'a Donor,
    distance_km: f64,
    days_since: i64,
}

/// Distance ascending, available donors first, then the donor who has rested
/// longest since their last donation.
fn donor_order(a: &Candidate<'_>, b: &Candidate<'_>) -> Ordering {
    a.distance_km
        .total_cmp(&b.distance_km)
        .then_with(|| b.donor.available.cmp(&a.donor.available))
        .then_with(|| b.days_since.cmp(&a.days_since))
        .then_with(|| a.donor.id.cmp(&b.donor.id))
}

fn check_radius(radius_km: f64) -> std::result::Result<(), InvalidInput> {
    if !radius_km.is_finite() || radius_km <= 0.0 {
        return Err(InvalidInput::InvalidRadius(radius_km));
    }
    Ok(())
}

impl Recommender {
    /// Donor search at medium urgency, as of now.
    pub fn find_donors(&self, blood_type: &str, city: &str, radius_km: f64) -> Result<DonorSearchResult> {
        let query = DonorQuery::parse(blood_type, city, "medium", radius_km)?;
        self.search_donors(&query, Utc::now())
    }

    pub fn search_donors(&self, query: &DonorQuery, as_of: DateTime<Utc>) -> Result<DonorSearchResult> {
        check_radius(query.radius_km)?;
        let policy = &self.config().donor_search;
        let origin = self.cities().resolve(&query.city);
        let compatible = compatible_donors(query.blood_type);
        let widened_radius = query.radius_km * policy.widening_factor;
        if !widened_radius.is_finite() {
            return Err(InvalidInput::InvalidRadius(query.radius_km).into());
        }

        info!(
            blood_type = %query.blood_type,
            city = %origin.name,
            radius_km = query.radius_km,
            urgency = %query.urgency,
            "searching donors"
        );

        let mut within = Vec::new();
        let mut beyond = Vec::new();
        for donor in &self.data().donors {
            if !compatible.contains(&donor.blood_type) || !policy.is_eligible(donor) {
                continue;
            }
            if query.urgency == Urgency::Critical && !donor.available {
                continue;
            }
            let candidate = Candidate {
                donor,
                distance_km: distance_km(origin.location, donor.location),
                days_since: donor.days_since_donation(as_of),
            };
            if candidate.distance_km <= query.radius_km {
                within.push(candidate);
            } else if candidate.distance_km <= widened_radius {
                beyond.push(candidate);
            }
        }

        beyond.sort_by(donor_order);
        let quota = policy.widened_quota(beyond.len());
        debug!(
            within = within.len(),
            widening_candidates = beyond.len(),
            quota,
            "donor widening"
        );
        beyond.truncate(quota);

        let within_radius = within.len();
        let widened_included = beyond.len();
        let mut selected: Vec<(Candidate<'_>, bool)> = within
            .into_iter()
            .map(|c| (c, false))
            .chain(beyond.into_iter().map(|c| (c, true)))
            .collect();
        selected.sort_by(|a, b| donor_order(&a.0, &b.0));

        let results: Vec<RankedResult<DonorMatch>> = selected
            .into_iter()
            .enumerate()
            .map(|(idx, (c, widened))| donor_result(idx + 1, &c, widened, query.blood_type, widened_radius))
            .collect();

        let reason = results.is_empty().then_some(ReasonCode::NoCompatibleDonors);
        Ok(DonorSearchResult {
            recipient: query.blood_type,
            compatible_types: compatible.to_vec(),
            city: origin.name,
            urgency: query.urgency,
            search_radius_km: query.radius_km,
            widened_radius_km: widened_radius,
            within_radius,
            widened_included,
            results,
            reason,
        })
    }

    /// Units of exactly `blood_type` held by hospitals within the radius.
    pub fn check_blood_availability(&self, blood_type: &str, city: &str, radius_km: f64) -> Result<BloodAvailability> {
        let blood_type: BloodType = blood_type.parse()?;
        check_radius(radius_km)?;
        let origin = self.cities().resolve(city);

        let nearby = self.nearby_hospitals(&origin.name, radius_km)?;
        let hospitals_with_blood: Vec<HospitalBloodStock> = nearby
            .iter()
            .filter(|(h, _)| h.blood_units(blood_type) > 0)
            .map(|&(h, d)| HospitalBloodStock {
                hospital_id: h.id.clone(),
                name: h.name.clone(),
                city: h.city.clone(),
                state: h.state.clone(),
                distance_km: d,
                units: h.blood_units(blood_type),
                contact: h.contact.clone(),
                emergency_contact: h.emergency_contact.clone(),
            })
            .collect();
        let emergency_contacts = nearby
            .iter()
            .take(EMERGENCY_CONTACT_LIMIT)
            .map(|&(h, d)| EmergencyContact {
                hospital_id: h.id.clone(),
                hospital_name: h.name.clone(),
                emergency_contact: h.emergency_contact.clone(),
                distance_km: d,
            })
            .collect();

        let total_units = hospitals_with_blood.iter().map(|s| s.units).sum();
        let nearest = hospitals_with_blood.first().cloned();
        let reason = hospitals_with_blood
            .is_empty()
            .then_some(ReasonCode::NoHospitalsInRadius);

        Ok(BloodAvailability {
            blood_type,
            city: origin.name,
            search_radius_km: radius_km,
            hospitals_with_blood,
            total_units,
            nearest,
            emergency_contacts,
            reason,
        })
    }
}

fn donor_result(
    rank: usize,
    c: &Candidate<'_>,
    widened: bool,
    recipient: BloodType,
    widened_radius: f64,
) -> RankedResult<DonorMatch> {
    let donor = c.donor;
    let mut reasons = vec![format!(
        "{} donor compatible with {recipient}, {:.1} km away",
        donor.blood_type, c.distance_km
    )];
    reasons.push(if donor.available {
        "available now".to_string()
    } else {
        "currently unavailable".to_string()
    });
    reasons.push(format!("last donated {} days ago", c.days_since));
    if widened {
        reasons.push("outside the requested radius".to_string());
    }

    RankedResult {
        rank,
        score: unit(1.0 - c.distance_km / widened_radius),
        distance_km: c.distance_km,
        item: DonorMatch {
            donor_id: donor.id.clone(),
            name: donor.name.clone(),
            blood_type: donor.blood_type,
            city: donor.city.clone(),
            available: donor.available,
            contact: donor.contact.clone(),
            last_donation_days: c.days_since,
            widened,
        },
        reason_summary: reasons.join("; "),
    }
}
