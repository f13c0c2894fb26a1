//! Specialty-aware hospital recommendation and blood donor matching.
//!
//! A [`Recommender`] is built once from reference data (loaded from JSON or
//! generated from a seed) and then answers requests read-only: it is
//! `Send + Sync` and can be shared across threads behind an `Arc`.

pub mod blood_bank;
pub mod blood_request;
pub mod classifier;
pub mod config;
pub mod dashboard;
pub mod data;
pub mod error;
pub mod geo;
pub mod history;
pub mod recommender;
pub mod scoring;
pub mod synthetic;
pub mod tfidf;
pub mod utils;

pub use blood_bank::{compatible_donors, BloodAvailability, DonorQuery, DonorSearchPolicy, DonorSearchResult};
pub use blood_request::{BloodRequestResponse, BloodRequestType, RequestTypePrediction};
pub use classifier::{SpecialtyClassifier, SpecialtyPrediction};
pub use config::CareMatchConfig;
pub use data::{BloodType, Doctor, Donor, Hospital, ReferenceData, Specialty, Urgency};
pub use error::{CareMatchError, InvalidInput, Result};
pub use geo::{distance_km, City, GeoPoint};
pub use recommender::{HospitalRecommendations, MedicalIssueQuery, RankedResult, ReasonCode, Recommender};
