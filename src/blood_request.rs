//! Free-text blood requests.
//!
//! A request such as "need O- blood for my father's bypass tomorrow" is
//! classified into one of four request types, then answered with the blood
//! stock near the city, compatible donors and national helplines.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::blood_bank::{BloodAvailability, DonorQuery, DonorSearchResult};
use crate::classifier::{CentroidClassifier, FALLBACK_CONFIDENCE};
use crate::data::{BloodType, Urgency};
use crate::error::{InvalidInput, Result};
use crate::recommender::Recommender;

pub const AVAILABILITY_RADIUS_KM: f64 = 50.0;
pub const DONOR_RADIUS_KM: f64 = 200.0;
/// Donors returned with a blood request; the full search is ranked first.
pub const REQUEST_DONOR_LIMIT: usize = 10;

pub const NATIONAL_HELPLINES: &[(&str, &str)] = &[
    ("National Blood Bank", "+91-1800-180-1234"),
    ("Red Cross India", "+91-1800-180-1234"),
    ("Emergency Services", "108"),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BloodRequestType {
    UrgentBloodRequest,
    ScheduledDonation,
    EmergencySurgery,
    ChronicCondition,
}

impl BloodRequestType {
    pub const ALL: [BloodRequestType; 4] = [
        BloodRequestType::UrgentBloodRequest,
        BloodRequestType::ScheduledDonation,
        BloodRequestType::EmergencySurgery,
        BloodRequestType::ChronicCondition,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            BloodRequestType::UrgentBloodRequest => "urgent_blood_request",
            BloodRequestType::ScheduledDonation => "scheduled_donation",
            BloodRequestType::EmergencySurgery => "emergency_surgery",
            BloodRequestType::ChronicCondition => "chronic_condition",
        }
    }

    /// Urgency the donor search runs at. Only urgent requests drop
    /// unavailable donors.
    pub fn urgency(self) -> Urgency {
        match self {
            BloodRequestType::UrgentBloodRequest => Urgency::Critical,
            BloodRequestType::EmergencySurgery => Urgency::High,
            BloodRequestType::ChronicCondition => Urgency::Medium,
            BloodRequestType::ScheduledDonation => Urgency::Low,
        }
    }
}

impl fmt::Display for BloodRequestType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unrecognised requests are treated as urgent.
pub const FALLBACK_REQUEST_TYPE: BloodRequestType = BloodRequestType::UrgentBloodRequest;

pub const REQUEST_CORPUS: &[(BloodRequestType, &str)] = &[
    (BloodRequestType::UrgentBloodRequest, "I need blood urgently for emergency surgery"),
    (BloodRequestType::UrgentBloodRequest, "Urgent blood requirement for accident victim"),
    (BloodRequestType::UrgentBloodRequest, "Emergency blood needed for childbirth"),
    (BloodRequestType::UrgentBloodRequest, "Critical blood shortage in hospital"),
    (BloodRequestType::UrgentBloodRequest, "Immediate blood donation needed"),
    (BloodRequestType::UrgentBloodRequest, "Emergency blood transfusion required"),
    (BloodRequestType::UrgentBloodRequest, "Urgent blood request for patient"),
    (BloodRequestType::UrgentBloodRequest, "Critical blood need right now"),
    (BloodRequestType::UrgentBloodRequest, "Emergency blood donor needed"),
    (BloodRequestType::UrgentBloodRequest, "Urgent blood requirement"),
    (BloodRequestType::ScheduledDonation, "I want to schedule a blood donation"),
    (BloodRequestType::ScheduledDonation, "When can I donate blood next?"),
    (BloodRequestType::ScheduledDonation, "Schedule blood donation appointment"),
    (BloodRequestType::ScheduledDonation, "Regular blood donation program"),
    (BloodRequestType::ScheduledDonation, "Blood donation camp schedule"),
    (BloodRequestType::ScheduledDonation, "When is the next blood drive?"),
    (BloodRequestType::ScheduledDonation, "Blood donation appointment booking"),
    (BloodRequestType::ScheduledDonation, "Scheduled blood donation"),
    (BloodRequestType::ScheduledDonation, "Volunteer to donate at a donation camp"),
    (BloodRequestType::ScheduledDonation, "Blood donation scheduling"),
    (BloodRequestType::EmergencySurgery, "Blood needed for heart surgery"),
    (BloodRequestType::EmergencySurgery, "Blood requirement for organ transplant"),
    (BloodRequestType::EmergencySurgery, "Blood for cancer treatment operation"),
    (BloodRequestType::EmergencySurgery, "Surgery blood transfusion"),
    (BloodRequestType::EmergencySurgery, "Blood needed for major surgery"),
    (BloodRequestType::EmergencySurgery, "Surgical blood requirement"),
    (BloodRequestType::EmergencySurgery, "Blood for emergency operation"),
    (BloodRequestType::EmergencySurgery, "Surgery blood donor needed"),
    (BloodRequestType::EmergencySurgery, "Blood transfusion during bypass or transplant surgery"),
    (BloodRequestType::EmergencySurgery, "Surgical blood need"),
    (BloodRequestType::ChronicCondition, "Blood needed for thalassemia patient"),
    (BloodRequestType::ChronicCondition, "Regular blood transfusion for anemia"),
    (BloodRequestType::ChronicCondition, "Blood for sickle cell disease"),
    (BloodRequestType::ChronicCondition, "Chronic blood requirement"),
    (BloodRequestType::ChronicCondition, "Blood for hemophilia treatment"),
    (BloodRequestType::ChronicCondition, "Monthly transfusions for a dialysis patient"),
    (BloodRequestType::ChronicCondition, "Blood for chronic condition"),
    (BloodRequestType::ChronicCondition, "Long-term blood need"),
    (BloodRequestType::ChronicCondition, "Blood for genetic disorder"),
    (BloodRequestType::ChronicCondition, "Chronic blood transfusion"),
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestTypePrediction {
    pub request_type: BloodRequestType,
    pub confidence: f64,
    pub fallback: bool,
}

#[derive(Debug)]
pub struct RequestTypeClassifier {
    inner: CentroidClassifier<BloodRequestType>,
}

impl RequestTypeClassifier {
    pub fn with_builtin_corpus() -> Result<Self> {
        Ok(RequestTypeClassifier {
            inner: CentroidClassifier::train(&BloodRequestType::ALL, REQUEST_CORPUS)?,
        })
    }

    pub fn predict_request_type(&self, text: &str) -> std::result::Result<RequestTypePrediction, InvalidInput> {
        if text.trim().is_empty() {
            return Err(InvalidInput::EmptyDescription);
        }
        let prediction = match self.inner.classify(text) {
            Some((request_type, confidence)) => RequestTypePrediction {
                request_type,
                confidence,
                fallback: false,
            },
            None => {
                warn!("no recognised terms in blood request, treating as urgent");
                RequestTypePrediction {
                    request_type: FALLBACK_REQUEST_TYPE,
                    confidence: FALLBACK_CONFIDENCE,
                    fallback: true,
                }
            }
        };
        debug!(request_type = %prediction.request_type, confidence = prediction.confidence, "classified blood request");
        Ok(prediction)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Helpline {
    pub name: String,
    pub number: String,
}

pub fn national_helplines() -> Vec<Helpline> {
    NATIONAL_HELPLINES
        .iter()
        .map(|&(name, number)| Helpline {
            name: name.to_string(),
            number: number.to_string(),
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BloodRequestResponse {
    pub query: String,
    pub city: String,
    pub prediction: RequestTypePrediction,
    /// Present only when a blood type was given.
    pub availability: Option<BloodAvailability>,
    pub donors: Option<DonorSearchResult>,
    pub helplines: Vec<Helpline>,
}

impl Recommender {
    pub fn predict_request_type(&self, text: &str) -> std::result::Result<RequestTypePrediction, InvalidInput> {
        self.request_classifier().predict_request_type(text)
    }

    /// Classify a free-text request and, given a blood type, attach stock
    /// within 50 km and the top donors within 200 km.
    pub fn blood_request(&self, query: &str, blood_type: Option<&str>, city: &str) -> Result<BloodRequestResponse> {
        self.blood_request_at(query, blood_type, city, Utc::now())
    }

    pub fn blood_request_at(
        &self,
        query: &str,
        blood_type: Option<&str>,
        city: &str,
        as_of: DateTime<Utc>,
    ) -> Result<BloodRequestResponse> {
        let prediction = self.predict_request_type(query)?;
        let blood_type: Option<BloodType> = blood_type.map(str::parse::<BloodType>).transpose()?;
        let origin = self.cities().resolve(city);

        info!(
            city = %origin.name,
            request_type = %prediction.request_type,
            blood_type = blood_type.map(BloodType::as_str),
            "answering blood request"
        );

        let (availability, donors) = match blood_type {
            Some(bt) => {
                let availability = self.check_blood_availability(bt.as_str(), &origin.name, AVAILABILITY_RADIUS_KM)?;
                let donor_query = DonorQuery {
                    blood_type: bt,
                    city: origin.name.clone(),
                    urgency: prediction.request_type.urgency(),
                    radius_km: DONOR_RADIUS_KM,
                };
                let mut donors = self.search_donors(&donor_query, as_of)?;
                donors.results.truncate(REQUEST_DONOR_LIMIT);
                (Some(availability), Some(donors))
            }
            None => (None, None),
        };

        Ok(BloodRequestResponse {
            query: query.to_string(),
            city: origin.name,
            prediction,
            availability,
            donors,
            helplines: national_helplines(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CareMatchConfig;
    use crate::data::fixtures::{as_of, city, donor, hospital};
    use crate::data::ReferenceData;
    use crate::error::CareMatchError;
    use crate::geo::builtin_cities;

    fn classifier() -> RequestTypeClassifier {
        RequestTypeClassifier::with_builtin_corpus().unwrap()
    }

    #[test]
    fn reference_requests_are_classified() {
        let c = classifier();
        let cases = [
            ("I need blood urgently for emergency surgery", BloodRequestType::UrgentBloodRequest),
            ("I want to schedule a blood donation", BloodRequestType::ScheduledDonation),
            ("Blood needed for thalassemia patient", BloodRequestType::ChronicCondition),
            ("blood for kidney transplant operation", BloodRequestType::EmergencySurgery),
            ("where is the next donation camp", BloodRequestType::ScheduledDonation),
        ];
        for (text, expected) in cases {
            let p = c.predict_request_type(text).unwrap();
            assert_eq!(p.request_type, expected, "{text}");
            assert!(!p.fallback);
            assert!(p.confidence > 0.0 && p.confidence <= 1.0);
        }
    }

    #[test]
    fn unknown_request_is_treated_as_urgent() {
        let p = classifier().predict_request_type("xyzzy frobnicate").unwrap();
        assert_eq!(p.request_type, FALLBACK_REQUEST_TYPE);
        assert_eq!(p.confidence, FALLBACK_CONFIDENCE);
        assert!(p.fallback);
        assert_eq!(
            classifier().predict_request_type("  ").unwrap_err(),
            InvalidInput::EmptyDescription
        );
    }

    #[test]
    fn request_type_serialises_snake_case() {
        let json = serde_json::to_string(&BloodRequestType::EmergencySurgery).unwrap();
        assert_eq!(json, "\"emergency_surgery\"");
        assert_eq!(BloodRequestType::ScheduledDonation.urgency(), Urgency::Low);
    }

    fn recommender() -> Recommender {
        let delhi = city("Delhi");
        let mut stocked = hospital("delhi-1", &delhi);
        stocked.blood_inventory.insert(BloodType::ONeg, 4);
        let bare = hospital("delhi-2", &delhi);
        let mut donors: Vec<_> = (0..12)
            .map(|i| donor(&format!("d{i:02}"), BloodType::ONeg, &delhi, true, 100 + i))
            .collect();
        donors.push(donor("resting", BloodType::ONeg, &delhi, false, 400));
        let data = ReferenceData::new(builtin_cities(), vec![stocked, bare], vec![], donors).unwrap();
        Recommender::new(data, CareMatchConfig::default()).unwrap()
    }

    #[test]
    fn urgent_request_combines_stock_donors_and_helplines() {
        let rec = recommender();
        let out = rec
            .blood_request_at("I need blood urgently for emergency surgery", Some("O-"), "delhi", as_of())
            .unwrap();
        assert_eq!(out.city, "Delhi");
        assert_eq!(out.prediction.request_type, BloodRequestType::UrgentBloodRequest);

        let availability = out.availability.unwrap();
        assert_eq!(availability.total_units, 4);
        assert_eq!(availability.emergency_contacts.len(), 2);

        let donors = out.donors.unwrap();
        assert_eq!(donors.urgency, Urgency::Critical);
        assert_eq!(donors.results.len(), REQUEST_DONOR_LIMIT);
        assert!(donors.results.iter().all(|r| r.item.available));
        // Longest rest first among equally close donors.
        assert_eq!(donors.results[0].item.donor_id, "d11");

        assert_eq!(out.helplines.len(), NATIONAL_HELPLINES.len());
        assert_eq!(out.helplines[2].number, "108");
    }

    #[test]
    fn scheduled_request_keeps_unavailable_donors() {
        let rec = recommender();
        let out = rec
            .blood_request_at("I want to schedule a blood donation", Some("O-"), "Delhi", as_of())
            .unwrap();
        let donors = out.donors.unwrap();
        assert_eq!(donors.urgency, Urgency::Low);
        assert_eq!(donors.within_radius, 13);
        assert_eq!(donors.results.len(), REQUEST_DONOR_LIMIT);
    }

    #[test]
    fn request_without_blood_type_only_classifies() {
        let rec = recommender();
        let out = rec
            .blood_request_at("Blood needed for thalassemia patient", None, "Atlantis", as_of())
            .unwrap();
        assert_eq!(out.prediction.request_type, BloodRequestType::ChronicCondition);
        assert_eq!(out.city, "Delhi");
        assert!(out.availability.is_none());
        assert!(out.donors.is_none());
        assert!(!out.helplines.is_empty());
    }

    #[test]
    fn malformed_blood_type_is_rejected() {
        let rec = recommender();
        let err = rec
            .blood_request_at("urgent blood requirement", Some("Q+"), "Delhi", as_of())
            .unwrap_err();
        assert!(matches!(
            err,
            CareMatchError::InvalidInput(InvalidInput::MalformedBloodType(_))
        ));
    }
}
