use std::sync::Arc;
use std::thread;

use chrono::{DateTime, TimeZone, Utc};

use care_match::config::CareMatchConfig;
use care_match::geo::{builtin_cities, distance_km};
use care_match::{MedicalIssueQuery, ReferenceData, Recommender, Specialty, Urgency};

fn as_of() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap()
}

fn recommender() -> Recommender {
    Recommender::synthetic(CareMatchConfig::default(), as_of()).unwrap()
}

#[test]
fn mumbai_chest_pain_stays_in_maharashtra() {
    let rec = recommender();
    let query = MedicalIssueQuery::new(
        "I have severe chest pain and shortness of breath",
        "Mumbai",
        Urgency::High,
    );
    let out = rec.recommend_hospitals(&query).unwrap();

    assert_eq!(out.prediction.specialty, Specialty::Cardiology);
    assert!(out.prediction.confidence > 0.0 && out.prediction.confidence <= 1.0);
    assert_eq!(out.state, "Maharashtra");
    assert!(!out.results.is_empty());
    assert!(out.results.len() <= 10);
    assert!(out.results.iter().all(|r| r.item.state == "Maharashtra"));

    let ranks: Vec<usize> = out.results.iter().map(|r| r.rank).collect();
    assert_eq!(ranks, (1..=out.results.len()).collect::<Vec<_>>());
    for pair in out.results.windows(2) {
        assert!(pair[0].score >= pair[1].score);
    }
    for r in &out.results {
        assert!((0.0..=1.0).contains(&r.score));
        assert!(r.item.top_doctors.len() <= 3);
        assert!(r.item.top_doctors.iter().all(|d| d.doctor.hospital_id == r.item.hospital_id));
        assert!(r.item.top_doctors.iter().all(|d| d.doctor.specialty == Specialty::Cardiology));
        assert_eq!(r.item.specialty_match, r.item.specialty_detail.is_some());
    }
}

#[test]
fn same_query_same_answer() {
    let rec = recommender();
    let query = MedicalIssueQuery::parse("migraine with dizziness", "Bangalore", "medium").unwrap();
    let a = rec.recommend_hospitals(&query).unwrap();
    let b = rec.recommend_hospitals(&query).unwrap();
    assert_eq!(a, b);

    let rebuilt = recommender().recommend_hospitals(&query).unwrap();
    assert_eq!(a, rebuilt);
}

#[test]
fn every_city_gets_in_state_results() {
    let rec = recommender();
    for city in builtin_cities() {
        let query = MedicalIssueQuery::new("broken bone in my arm", city.name.as_str(), Urgency::Low).with_top_n(3);
        let out = rec.recommend_hospitals(&query).unwrap();
        assert_eq!(out.state, city.state);
        assert!(out.results.len() <= 3);
        assert!(out.results.iter().all(|r| r.item.state == city.state), "{}", city.name);
    }
}

#[test]
fn haversine_identity_and_symmetry() {
    let cities = builtin_cities();
    for a in &cities {
        assert_eq!(distance_km(a.location, a.location), 0.0);
        for b in &cities {
            let ab = distance_km(a.location, b.location);
            let ba = distance_km(b.location, a.location);
            assert!((ab - ba).abs() < 1e-9);
            assert!(ab >= 0.0);
        }
    }
}

#[test]
fn reference_data_survives_a_json_round_trip() {
    let rec = recommender();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("data.json");
    rec.data().save_json(&path).unwrap();

    let loaded = ReferenceData::load_json(&path).unwrap();
    let reloaded = Recommender::new(loaded, CareMatchConfig::default()).unwrap();
    let query = MedicalIssueQuery::new("skin rash and itching", "Chennai", Urgency::Medium);
    assert_eq!(
        rec.recommend_hospitals(&query).unwrap(),
        reloaded.recommend_hospitals(&query).unwrap()
    );
}

#[test]
fn custom_weights_are_loaded_from_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.json");
    std::fs::write(
        &path,
        r#"{ "scoring": { "specialty": 0.0, "base_quality": 1.0, "urgency": 0.0, "distance": 0.0, "emergency_bonus": 0.0 } }"#,
    )
    .unwrap();
    let config = CareMatchConfig::load(&path).unwrap();
    let rec = Recommender::synthetic(config, as_of()).unwrap();

    let out = rec
        .recommend_hospitals(&MedicalIssueQuery::new("chest pain", "Delhi", Urgency::Low))
        .unwrap();
    for r in &out.results {
        assert!((r.score - r.item.overall_rating / 5.0).abs() < 1e-9);
    }
}

#[test]
fn recommender_is_shareable_across_threads() {
    fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<Recommender>();

    let rec = Arc::new(recommender());
    let handles: Vec<_> = ["Delhi", "Mumbai", "Kolkata", "Hyderabad"]
        .into_iter()
        .map(|city| {
            let rec = Arc::clone(&rec);
            thread::spawn(move || {
                let query = MedicalIssueQuery::new("child has a fever", city, Urgency::High);
                rec.recommend_hospitals(&query).unwrap()
            })
        })
        .collect();
    for handle in handles {
        let out = handle.join().unwrap();
        assert_eq!(out.prediction.specialty, Specialty::Pediatrics);
    }
}
