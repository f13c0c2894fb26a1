//! Seeded synthetic reference data.
//!
//! All randomness in the crate lives here: the same seed and `as_of` instant
//! always produce the same hospitals, doctors and donors.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use tracing::info;

use crate::data::{BloodType, CostTier, Doctor, Donor, Hospital, ReferenceData, Specialty, SpecialtyDetail};
use crate::error::Result;
use crate::geo::{builtin_cities, GeoPoint};

const HOSPITAL_NAMES: &[&str] = &[
    "Apollo Hospitals",
    "Fortis Healthcare",
    "Max Healthcare",
    "Manipal Hospitals",
    "AIIMS",
    "Tata Memorial Hospital",
    "Narayana Health",
    "Medanta",
    "Kokilaben Hospital",
    "Lilavati Hospital",
    "Sir Ganga Ram Hospital",
    "KEM Hospital",
    "Jaslok Hospital",
    "Wockhardt Hospital",
    "Columbia Asia",
    "Rainbow Hospitals",
];

const DOCTOR_FIRST_NAMES: &[&str] = &[
    "Rajesh", "Priya", "Amit", "Sneha", "Vikram", "Kavya", "Arjun", "Pooja", "Rahul", "Anita",
    "Suresh", "Meera",
];

const DONOR_FIRST_NAMES: &[&str] = &[
    "Raj", "Priya", "Amit", "Sneha", "Vikram", "Anita", "Rahul", "Kavita", "Suresh", "Meera",
    "Arjun", "Pooja", "Sunita", "Vishal", "Ritu", "Ravi", "Shilpa", "Manoj", "Geeta", "Kiran",
];

const LAST_NAMES: &[&str] = &[
    "Sharma", "Patel", "Singh", "Kumar", "Gupta", "Agarwal", "Verma", "Yadav", "Jain", "Shah",
    "Reddy", "Nair", "Iyer", "Pillai", "Choudhary", "Mishra", "Bose", "Das", "Roy", "Ghosh",
];

const QUALIFICATIONS: &[&str] = &["MBBS", "MD", "MS", "DM", "MCh", "DNB"];

/// Knobs for the generator.
#[derive(Debug, Clone, Copy)]
pub struct SyntheticSpec {
    pub seed: u64,
    pub donors: usize,
    pub hospitals_per_city: (u32, u32),
    /// Hospital coordinates are jittered by up to this many degrees around the
    /// city centre. Donors are always placed on the centre.
    pub hospital_jitter_deg: f64,
}

impl Default for SyntheticSpec {
    fn default() -> Self {
        SyntheticSpec {
            seed: 42,
            donors: 1000,
            hospitals_per_city: (3, 5),
            hospital_jitter_deg: 0.1,
        }
    }
}

pub fn generate(spec: SyntheticSpec, as_of: DateTime<Utc>) -> Result<ReferenceData> {
    let mut rng = StdRng::seed_from_u64(spec.seed);
    let cities = builtin_cities();

    let mut hospitals = Vec::new();
    for (city_idx, city) in cities.iter().enumerate() {
        let (lo, hi) = spec.hospitals_per_city;
        let count = rng.gen_range(lo..=hi.max(lo));
        let names: Vec<&str> = HOSPITAL_NAMES
            .choose_multiple(&mut rng, count as usize)
            .copied()
            .collect();
        for (i, name) in names.into_iter().enumerate() {
            let jitter = spec.hospital_jitter_deg;
            let location = GeoPoint {
                lat: city.location.lat + rng.gen_range(-jitter..=jitter),
                lon: city.location.lon + rng.gen_range(-jitter..=jitter),
            };
            hospitals.push(Hospital {
                id: format!("hospital_{city_idx}_{i}"),
                name: format!("{name} - {}", city.name),
                city: city.name.clone(),
                state: city.state.clone(),
                location,
                overall_rating: round1(rng.gen_range(3.5..=5.0)),
                bed_capacity: rng.gen_range(50..=500),
                icu_beds: rng.gen_range(5..=50),
                operation_theaters: rng.gen_range(2..=15),
                emergency_services: rng.gen_bool(0.75),
                insurance_accepted: rng.gen_bool(0.67),
                cost_tier: *[CostTier::Low, CostTier::Medium, CostTier::High]
                    .choose(&mut rng)
                    .unwrap_or(&CostTier::Medium),
                emergency_wait_minutes: rng.gen_range(15..=120),
                contact: phone_number(&mut rng),
                emergency_contact: phone_number(&mut rng),
                specialties: assign_specialties(&mut rng),
                blood_inventory: BloodType::ALL
                    .into_iter()
                    .map(|bt| (bt, rng.gen_range(0..=50)))
                    .collect(),
            });
        }
    }

    let mut doctors = Vec::new();
    for hospital in &hospitals {
        for (specialty, detail) in &hospital.specialties {
            for _ in 0..detail.doctor_count {
                doctors.push(Doctor {
                    id: format!("doctor_{}", doctors.len() + 1),
                    hospital_id: hospital.id.clone(),
                    name: format!("Dr. {} {}", pick(&mut rng, DOCTOR_FIRST_NAMES), pick(&mut rng, LAST_NAMES)),
                    specialty: *specialty,
                    qualification: pick(&mut rng, QUALIFICATIONS).to_string(),
                    experience_years: rng.gen_range(2..=40),
                    rating: round1(rng.gen_range(3.5..=5.0)),
                    success_rate: round1(rng.gen_range(85.0..=99.0)),
                    procedures_performed: rng.gen_range(50..=1000),
                });
            }
        }
    }

    let donors = (0..spec.donors)
        .map(|i| {
            let city = &cities[rng.gen_range(0..cities.len())];
            Donor {
                id: format!("donor_{}", i + 1),
                name: format!("{} {}", pick(&mut rng, DONOR_FIRST_NAMES), pick(&mut rng, LAST_NAMES)),
                blood_type: BloodType::ALL[rng.gen_range(0..BloodType::ALL.len())],
                city: city.name.clone(),
                location: city.location,
                available: rng.gen_bool(0.75),
                last_donation: as_of - Duration::days(rng.gen_range(0..=365)),
                age: rng.gen_range(18..=65),
                weight_kg: f64::from(rng.gen_range(45u32..=100)),
                contact: format!("donor{}@example.com", i + 1),
            }
        })
        .collect();

    let data = ReferenceData::new(cities, hospitals, doctors, donors)?;
    info!(
        seed = spec.seed,
        hospitals = data.hospitals.len(),
        doctors = data.doctors.len(),
        donors = data.donors.len(),
        "generated synthetic reference data"
    );
    Ok(data)
}

fn assign_specialties(rng: &mut StdRng) -> BTreeMap<Specialty, SpecialtyDetail> {
    let count = rng.gen_range(2..=6);
    Specialty::ALL
        .choose_multiple(rng, count)
        .copied()
        .collect::<Vec<_>>()
        .into_iter()
        .map(|specialty| {
            let detail = SpecialtyDetail {
                rating: round1(rng.gen_range(3.0..=5.0)),
                doctor_count: rng.gen_range(1..=10),
                success_rate: round1(rng.gen_range(85.0..=99.0)),
                wait_time_days: rng.gen_range(1..=30),
            };
            (specialty, detail)
        })
        .collect()
}

fn pick<'a>(rng: &mut StdRng, items: &[&'a str]) -> &'a str {
    items[rng.gen_range(0..items.len())]
}

fn phone_number(rng: &mut StdRng) -> String {
    format!("+91-{}", rng.gen_range(1_000_000_000u64..=9_999_999_999))
}

fn round1(x: f64) -> f64 {
    (x * 10.0).round() / 10.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::fixtures::as_of;

    #[test]
    fn same_seed_same_data() {
        let a = generate(SyntheticSpec::default(), as_of()).unwrap();
        let b = generate(SyntheticSpec::default(), as_of()).unwrap();
        assert_eq!(a.hospitals, b.hospitals);
        assert_eq!(a.doctors, b.doctors);
        assert_eq!(a.donors, b.donors);
    }

    #[test]
    fn every_city_gets_hospitals_in_its_state() {
        let data = generate(SyntheticSpec::default(), as_of()).unwrap();
        for city in &data.cities {
            let in_city: Vec<_> = data.hospitals.iter().filter(|h| h.city == city.name).collect();
            assert!((3..=5).contains(&in_city.len()), "{}", city.name);
            assert!(in_city.iter().all(|h| h.state == city.state));
        }
    }

    #[test]
    fn doctor_counts_match_departments() {
        let data = generate(SyntheticSpec::default(), as_of()).unwrap();
        for hospital in &data.hospitals {
            for (specialty, detail) in &hospital.specialties {
                let n = data
                    .doctors
                    .iter()
                    .filter(|d| d.hospital_id == hospital.id && d.specialty == *specialty)
                    .count();
                assert_eq!(n as u32, detail.doctor_count);
            }
        }
    }

    #[test]
    fn donors_sit_on_city_centres() {
        let data = generate(SyntheticSpec { donors: 50, ..Default::default() }, as_of()).unwrap();
        assert_eq!(data.donors.len(), 50);
        for donor in &data.donors {
            let city = data.cities.iter().find(|c| c.name == donor.city).unwrap();
            assert_eq!(donor.location, city.location);
            assert!(donor.last_donation <= as_of());
        }
    }
}
