//! The [`Recommender`] service: reference data, the fitted classifier and the
//! configuration, built once and shared read-only by every request.

use std::cmp::Ordering;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::blood_request::RequestTypeClassifier;
use crate::classifier::{SpecialtyClassifier, SpecialtyPrediction};
use crate::config::CareMatchConfig;
use crate::data::{CostTier, Doctor, Hospital, ReferenceData, Specialty, SpecialtyDetail, Urgency};
use crate::error::{InvalidInput, Result};
use crate::geo::{distance_km, CityDirectory};
use crate::scoring::{doctor_quality, score_hospitals, urgency_match, ScoreBreakdown, ScoredHospital};
use crate::synthetic::{self, SyntheticSpec};

const MAX_REASONS: usize = 3;
const HIGHLY_RATED: f64 = 4.5;
const WELL_EQUIPPED_ICU_BEDS: u32 = 20;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MedicalIssueQuery {
    pub description: String,
    pub city: String,
    pub urgency: Urgency,
    #[serde(default)]
    pub top_n: Option<usize>,
}

impl MedicalIssueQuery {
    pub fn new(description: impl Into<String>, city: impl Into<String>, urgency: Urgency) -> Self {
        MedicalIssueQuery {
            description: description.into(),
            city: city.into(),
            urgency,
            top_n: None,
        }
    }

    /// Build a query from raw request strings, validating the urgency level.
    pub fn parse(description: &str, city: &str, urgency: &str) -> std::result::Result<Self, InvalidInput> {
        Ok(Self::new(description, city, urgency.parse()?))
    }

    pub fn with_top_n(mut self, top_n: usize) -> Self {
        self.top_n = Some(top_n);
        self
    }
}

/// Why a successful response carries no results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReasonCode {
    NoHospitalsInState,
    NoCompatibleDonors,
    NoHospitalsInRadius,
}

impl ReasonCode {
    pub fn as_str(self) -> &'static str {
        match self {
            ReasonCode::NoHospitalsInState => "no_hospitals_in_state",
            ReasonCode::NoCompatibleDonors => "no_compatible_donors",
            ReasonCode::NoHospitalsInRadius => "no_hospitals_in_radius",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedResult<T> {
    /// 1-based.
    pub rank: usize,
    pub score: f64,
    pub distance_km: f64,
    pub item: T,
    pub reason_summary: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedDoctor {
    #[serde(flatten)]
    pub doctor: Doctor,
    pub quality_score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HospitalMatch {
    pub hospital_id: String,
    pub name: String,
    pub city: String,
    pub state: String,
    pub overall_rating: f64,
    pub emergency_services: bool,
    pub insurance_accepted: bool,
    pub cost_tier: CostTier,
    pub specialty_match: bool,
    pub urgency_match: bool,
    pub specialty_detail: Option<SpecialtyDetail>,
    pub top_doctors: Vec<RankedDoctor>,
    pub breakdown: ScoreBreakdown,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HospitalRecommendations {
    pub city: String,
    pub state: String,
    /// The query city was unknown and the default city's state was used.
    pub state_fallback: bool,
    pub urgency: Urgency,
    pub prediction: SpecialtyPrediction,
    pub candidates_in_state: usize,
    pub results: Vec<RankedResult<HospitalMatch>>,
    pub reason: Option<ReasonCode>,
}

#[derive(Debug)]
pub struct Recommender {
    data: ReferenceData,
    cities: CityDirectory,
    classifier: SpecialtyClassifier,
    request_classifier: RequestTypeClassifier,
    config: CareMatchConfig,
}

impl Recommender {
    pub fn new(data: ReferenceData, config: CareMatchConfig) -> Result<Self> {
        config.validate()?;
        data.validate()?;
        let cities = CityDirectory::new(&data.cities, &config.default_city)?;
        let classifier = SpecialtyClassifier::with_builtin_corpus()?;
        let request_classifier = RequestTypeClassifier::with_builtin_corpus()?;
        info!(
            hospitals = data.hospitals.len(),
            doctors = data.doctors.len(),
            donors = data.donors.len(),
            cities = data.cities.len(),
            "recommender ready"
        );
        Ok(Recommender {
            data,
            cities,
            classifier,
            request_classifier,
            config,
        })
    }

    /// Build on seeded synthetic data, using `config.dataset_seed`.
    pub fn synthetic(config: CareMatchConfig, as_of: DateTime<Utc>) -> Result<Self> {
        let spec = SyntheticSpec {
            seed: config.dataset_seed,
            ..SyntheticSpec::default()
        };
        let data = synthetic::generate(spec, as_of)?;
        Self::new(data, config)
    }

    pub fn data(&self) -> &ReferenceData {
        &self.data
    }

    pub fn cities(&self) -> &CityDirectory {
        &self.cities
    }

    pub fn config(&self) -> &CareMatchConfig {
        &self.config
    }

    pub(crate) fn request_classifier(&self) -> &RequestTypeClassifier {
        &self.request_classifier
    }

    pub fn predict_specialty(&self, text: &str) -> std::result::Result<SpecialtyPrediction, InvalidInput> {
        self.classifier.predict_specialty(text)
    }

    pub fn recommend_hospitals(&self, query: &MedicalIssueQuery) -> Result<HospitalRecommendations> {
        let top_n = query.top_n.unwrap_or(self.config.default_top_n);
        if top_n == 0 {
            return Err(InvalidInput::InvalidTopN(top_n).into());
        }
        let prediction = self.classifier.predict_specialty(&query.description)?;
        let origin = self.cities.resolve(&query.city);

        info!(
            city = %query.city,
            state = %origin.state,
            urgency = %query.urgency,
            specialty = %prediction.specialty,
            confidence = prediction.confidence,
            "recommending hospitals"
        );

        // State-only filtering: a hospital in a neighbouring state is never
        // offered, however close it is.
        let in_state: Vec<&Hospital> = self
            .data
            .hospitals
            .iter()
            .filter(|h| same_state(&h.state, &origin.state))
            .collect();

        let mut response = HospitalRecommendations {
            city: origin.name.clone(),
            state: origin.state.clone(),
            state_fallback: origin.fallback,
            urgency: query.urgency,
            prediction: prediction.clone(),
            candidates_in_state: in_state.len(),
            results: Vec::new(),
            reason: None,
        };

        if in_state.is_empty() {
            warn!(state = %origin.state, "no hospitals in state");
            response.reason = Some(ReasonCode::NoHospitalsInState);
            return Ok(response);
        }

        let mut scored = score_hospitals(
            &in_state,
            origin.location,
            prediction.specialty,
            query.urgency,
            &self.config.scoring,
        );
        scored.sort_by(compare_scored);

        response.results = scored
            .into_iter()
            .take(top_n)
            .enumerate()
            .map(|(idx, scored)| self.annotate(idx + 1, scored, prediction.specialty, query.urgency))
            .collect();

        debug!(returned = response.results.len(), "hospital ranking complete");
        Ok(response)
    }

    fn annotate(
        &self,
        rank: usize,
        scored: ScoredHospital<'_>,
        specialty: Specialty,
        urgency: Urgency,
    ) -> RankedResult<HospitalMatch> {
        let hospital = scored.hospital;
        let specialty_detail = hospital.specialty(specialty).cloned();
        let top_doctors = if specialty_detail.is_some() {
            self.top_doctors(specialty, Some(&hospital.id), self.config.doctors_per_hospital)
        } else {
            Vec::new()
        };
        let item = HospitalMatch {
            hospital_id: hospital.id.clone(),
            name: hospital.name.clone(),
            city: hospital.city.clone(),
            state: hospital.state.clone(),
            overall_rating: hospital.overall_rating,
            emergency_services: hospital.emergency_services,
            insurance_accepted: hospital.insurance_accepted,
            cost_tier: hospital.cost_tier,
            specialty_match: specialty_detail.is_some(),
            urgency_match: urgency_match(hospital, urgency),
            specialty_detail,
            top_doctors,
            breakdown: scored.breakdown,
        };
        let reason_summary = hospital_reasons(hospital, specialty, urgency, scored.distance_km);
        RankedResult {
            rank,
            score: scored.breakdown.total,
            distance_km: scored.distance_km,
            item,
            reason_summary,
        }
    }

    /// Best doctors for a specialty, optionally restricted to one hospital.
    pub fn top_doctors(&self, specialty: Specialty, hospital_id: Option<&str>, limit: usize) -> Vec<RankedDoctor> {
        let mut doctors: Vec<RankedDoctor> = self
            .data
            .doctors
            .iter()
            .filter(|d| d.specialty == specialty)
            .filter(|d| hospital_id.map_or(true, |id| d.hospital_id == id))
            .map(|d| RankedDoctor {
                doctor: d.clone(),
                quality_score: doctor_quality(d),
            })
            .collect();

        doctors.sort_by(|a, b| {
            b.quality_score
                .total_cmp(&a.quality_score)
                .then_with(|| b.doctor.rating.total_cmp(&a.doctor.rating))
                .then_with(|| b.doctor.experience_years.cmp(&a.doctor.experience_years))
                .then_with(|| a.doctor.id.cmp(&b.doctor.id))
        });
        doctors.truncate(limit);
        doctors
    }

    /// Hospitals within `radius_km` of the city, nearest first.
    pub fn nearby_hospitals(&self, city: &str, radius_km: f64) -> Result<Vec<(&Hospital, f64)>> {
        if !radius_km.is_finite() || radius_km <= 0.0 {
            return Err(InvalidInput::InvalidRadius(radius_km).into());
        }
        let origin = self.cities.coordinates(city);
        let mut nearby: Vec<(&Hospital, f64)> = self
            .data
            .hospitals
            .iter()
            .map(|h| (h, distance_km(origin, h.location)))
            .filter(|(_, d)| *d <= radius_km)
            .collect();
        nearby.sort_by(|a, b| a.1.total_cmp(&b.1).then_with(|| a.0.id.cmp(&b.0.id)));
        Ok(nearby)
    }
}

fn same_state(a: &str, b: &str) -> bool {
    a.trim().to_lowercase() == b.trim().to_lowercase()
}

/// Score descending, then rating descending, then distance ascending; the id
/// makes the order total.
fn compare_scored(a: &ScoredHospital<'_>, b: &ScoredHospital<'_>) -> Ordering {
    b.breakdown
        .total
        .total_cmp(&a.breakdown.total)
        .then_with(|| b.hospital.overall_rating.total_cmp(&a.hospital.overall_rating))
        .then_with(|| a.distance_km.total_cmp(&b.distance_km))
        .then_with(|| a.hospital.id.cmp(&b.hospital.id))
}

fn hospital_reasons(hospital: &Hospital, specialty: Specialty, urgency: Urgency, distance_km: f64) -> String {
    let mut reasons = Vec::new();

    match hospital.specialty(specialty) {
        Some(detail) => {
            reasons.push(format!(
                "Specialized in {specialty} with {} expert doctors",
                detail.doctor_count
            ));
            reasons.push(format!("{specialty} success rate: {:.1}%", detail.success_rate));
        }
        None => reasons.push(format!("No dedicated {specialty} department")),
    }
    if hospital.overall_rating >= HIGHLY_RATED {
        reasons.push("Highly rated hospital".to_string());
    }
    if hospital.emergency_services && urgency.is_acute() {
        reasons.push("24/7 emergency services available".to_string());
    }
    if distance_km < 10.0 {
        reasons.push("Close to your location".to_string());
    } else if distance_km < 50.0 {
        reasons.push("Within reasonable distance".to_string());
    }
    if hospital.icu_beds > WELL_EQUIPPED_ICU_BEDS {
        reasons.push("Well-equipped ICU facilities".to_string());
    }
    if hospital.insurance_accepted {
        reasons.push("Accepts insurance".to_string());
    }

    reasons.truncate(MAX_REASONS);
    reasons.join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::fixtures::{city, detail, doctor, hospital};
    use crate::error::CareMatchError;
    use crate::geo::builtin_cities;

    fn small_recommender() -> Recommender {
        let mumbai = city("Mumbai");
        let pune = city("Pune");
        let delhi = city("Delhi");

        let mut strong = hospital("mum-strong", &mumbai);
        strong.overall_rating = 4.8;
        strong.specialties.insert(Specialty::Cardiology, detail(4.9, 8));

        let mut weak = hospital("mum-weak", &mumbai);
        weak.overall_rating = 3.6;
        weak.emergency_services = false;

        let mut pune_cardio = hospital("pune-cardio", &pune);
        pune_cardio.specialties.insert(Specialty::Cardiology, detail(4.5, 4));

        let mut delhi_best = hospital("delhi-best", &delhi);
        delhi_best.overall_rating = 5.0;
        delhi_best.specialties.insert(Specialty::Cardiology, detail(5.0, 10));

        let doctors = vec![
            doctor("d1", "mum-strong", Specialty::Cardiology, 4.2),
            doctor("d2", "mum-strong", Specialty::Cardiology, 4.9),
            doctor("d3", "mum-strong", Specialty::Cardiology, 3.9),
            doctor("d4", "mum-strong", Specialty::Cardiology, 4.5),
            doctor("d5", "pune-cardio", Specialty::Cardiology, 5.0),
            doctor("d6", "mum-strong", Specialty::Neurology, 5.0),
        ];

        let data = ReferenceData::new(
            builtin_cities(),
            vec![weak, strong, pune_cardio, delhi_best],
            doctors,
            vec![],
        )
        .unwrap();
        Recommender::new(data, CareMatchConfig::default()).unwrap()
    }

    fn chest_pain(city: &str) -> MedicalIssueQuery {
        MedicalIssueQuery::new("I have severe chest pain and shortness of breath", city, Urgency::High)
    }

    #[test]
    fn only_same_state_hospitals_are_ranked() {
        let rec = small_recommender();
        let out = rec.recommend_hospitals(&chest_pain("Mumbai")).unwrap();
        assert_eq!(out.state, "Maharashtra");
        assert_eq!(out.prediction.specialty, Specialty::Cardiology);
        assert_eq!(out.candidates_in_state, 3);
        assert_eq!(out.results.len(), 3);
        assert!(out.results.iter().all(|r| r.item.state == "Maharashtra"));
        assert!(out.results.iter().all(|r| r.item.hospital_id != "delhi-best"));
    }

    #[test]
    fn strongest_department_ranks_first() {
        let rec = small_recommender();
        let out = rec.recommend_hospitals(&chest_pain("Mumbai")).unwrap();
        assert_eq!(out.results[0].item.hospital_id, "mum-strong");
        assert_eq!(out.results[0].rank, 1);
        assert_eq!(out.results.last().map(|r| r.item.hospital_id.as_str()), Some("mum-weak"));
        for pair in out.results.windows(2) {
            assert!(pair[0].score >= pair[1].score);
        }
    }

    #[test]
    fn top_doctors_are_attached_and_ordered() {
        let rec = small_recommender();
        let out = rec.recommend_hospitals(&chest_pain("Mumbai")).unwrap();
        let first = &out.results[0].item;
        assert!(first.specialty_match);
        let ids: Vec<&str> = first.top_doctors.iter().map(|d| d.doctor.id.as_str()).collect();
        assert_eq!(ids, vec!["d2", "d4", "d1"]);

        let weak = out.results.iter().find(|r| r.item.hospital_id == "mum-weak").unwrap();
        assert!(!weak.item.specialty_match);
        assert!(weak.item.top_doctors.is_empty());
        assert!(weak.reason_summary.starts_with("No dedicated cardiology department"));
    }

    #[test]
    fn top_n_truncates() {
        let rec = small_recommender();
        let out = rec.recommend_hospitals(&chest_pain("Pune").with_top_n(1)).unwrap();
        assert_eq!(out.results.len(), 1);
        assert_eq!(out.candidates_in_state, 3);
    }

    #[test]
    fn zero_top_n_is_rejected() {
        let rec = small_recommender();
        let err = rec.recommend_hospitals(&chest_pain("Mumbai").with_top_n(0)).unwrap_err();
        assert!(matches!(err, CareMatchError::InvalidInput(InvalidInput::InvalidTopN(0))));
    }

    #[test]
    fn empty_state_is_a_successful_empty_result() {
        let rec = small_recommender();
        let out = rec.recommend_hospitals(&chest_pain("Kolkata")).unwrap();
        assert_eq!(out.state, "West Bengal");
        assert!(out.results.is_empty());
        assert_eq!(out.reason, Some(ReasonCode::NoHospitalsInState));
    }

    #[test]
    fn unknown_city_uses_default_state() {
        let rec = small_recommender();
        let out = rec.recommend_hospitals(&chest_pain("El Dorado")).unwrap();
        assert!(out.state_fallback);
        assert_eq!(out.state, "Delhi");
        assert_eq!(out.results[0].item.hospital_id, "delhi-best");
    }

    #[test]
    fn invalid_urgency_and_empty_description_are_rejected() {
        assert_eq!(
            MedicalIssueQuery::parse("chest pain", "Mumbai", "whenever").unwrap_err(),
            InvalidInput::UnknownUrgency("whenever".into())
        );
        let rec = small_recommender();
        let err = rec
            .recommend_hospitals(&MedicalIssueQuery::new("  ", "Mumbai", Urgency::Low))
            .unwrap_err();
        assert!(matches!(err, CareMatchError::InvalidInput(InvalidInput::EmptyDescription)));
    }

    #[test]
    fn equal_scores_prefer_the_closer_hospital() {
        let mumbai = city("Mumbai");
        let mut near = hospital("b-near", &mumbai);
        let mut far = hospital("a-far", &mumbai);
        // ~22 km away: still inside the full distance-score band.
        far.location.lat += 0.2;
        for h in [&mut near, &mut far] {
            h.specialties.insert(Specialty::Cardiology, detail(4.0, 5));
        }
        let data = ReferenceData::new(builtin_cities(), vec![far, near], vec![], vec![]).unwrap();
        let rec = Recommender::new(data, CareMatchConfig::default()).unwrap();
        let out = rec.recommend_hospitals(&chest_pain("Mumbai")).unwrap();
        let ids: Vec<&str> = out.results.iter().map(|r| r.item.hospital_id.as_str()).collect();
        assert_eq!(ids, vec!["b-near", "a-far"]);
        assert_eq!(out.results[0].score, out.results[1].score);
        assert!(out.results[0].distance_km < out.results[1].distance_km);
    }

    #[test]
    fn doctor_listing_can_span_hospitals() {
        let rec = small_recommender();
        let all = rec.top_doctors(Specialty::Cardiology, None, 10);
        assert_eq!(all.len(), 5);
        assert_eq!(all[0].doctor.id, "d5");
        let none = rec.top_doctors(Specialty::Oncology, None, 10);
        assert!(none.is_empty());
    }

    #[test]
    fn nearby_hospitals_sorted_and_validated() {
        let rec = small_recommender();
        let near = rec.nearby_hospitals("Mumbai", 200.0).unwrap();
        assert_eq!(near.len(), 3);
        assert!(near.windows(2).all(|w| w[0].1 <= w[1].1));
        assert!(rec.nearby_hospitals("Mumbai", -1.0).is_err());
        assert!(rec.nearby_hospitals("Mumbai", f64::NAN).is_err());
    }
}
