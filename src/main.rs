//! `care-match` command line: one request per invocation, appended to the
//! history file that `care-match dashboard` browses.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use chrono::Utc;
use tracing_subscriber::EnvFilter;

use care_match::blood_bank::{BloodAvailability, DonorQuery, DonorSearchResult};
use care_match::blood_request::BloodRequestResponse;
use care_match::config::{default_log_filter, CareMatchConfig, CONFIG_ENV, DATA_ENV};
use care_match::dashboard;
use care_match::history::{append_record, history_path, HistoryRecord};
use care_match::recommender::{HospitalRecommendations, MedicalIssueQuery, Recommender};
use care_match::{ReferenceData, Specialty};

const DEFAULT_RADIUS_KM: f64 = 50.0;

const USAGE: &str = "usage:
  care-match hospitals <city> <urgency> <description...>
  care-match donors <blood_type> <city> [radius_km] [urgency]
  care-match availability <blood_type> <city> [radius_km]
  care-match blood-request <city> <blood_type|-> <request...>
  care-match doctors <specialty> [hospital_id]
  care-match export-data <path.json>
  care-match dashboard";

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_log_filter())),
        )
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let Some(command) = args.first() else {
        println!("{USAGE}");
        return Ok(());
    };

    // The dashboard only reads the history file; no need to build a model.
    if command == "dashboard" {
        println!("Launching dashboard...");
        if let Err(e) = dashboard::run_dashboard(&history_path()) {
            eprintln!("Dashboard error: {}", e);
        }
        return Ok(());
    }

    let recommender = build_recommender()?;
    let rest = &args[1..];

    match command.as_str() {
        "hospitals" => {
            if rest.len() < 3 {
                bail!("hospitals needs <city> <urgency> <description...>\n{USAGE}");
            }
            let description = rest[2..].join(" ");
            let query = MedicalIssueQuery::parse(&description, &rest[0], &rest[1])?;
            let out = recommender.recommend_hospitals(&query)?;
            print_hospitals(&out);
            log_history(HistoryRecord::from_hospitals(&description, &out, Utc::now()));
        }
        "donors" => {
            if rest.len() < 2 {
                bail!("donors needs <blood_type> <city> [radius_km] [urgency]\n{USAGE}");
            }
            let radius = parse_radius(rest.get(2))?;
            let urgency = rest.get(3).map_or("medium", String::as_str);
            let query = DonorQuery::parse(&rest[0], &rest[1], urgency, radius)?;
            let out = recommender.search_donors(&query, Utc::now())?;
            print_donors(&out);
            log_history(HistoryRecord::from_donors(&out, Utc::now()));
        }
        "availability" => {
            if rest.len() < 2 {
                bail!("availability needs <blood_type> <city> [radius_km]\n{USAGE}");
            }
            let radius = parse_radius(rest.get(2))?;
            let out = recommender.check_blood_availability(&rest[0], &rest[1], radius)?;
            print_availability(&out);
            log_history(HistoryRecord::from_availability(&out, Utc::now()));
        }
        "blood-request" => {
            if rest.len() < 3 {
                bail!("blood-request needs <city> <blood_type|-> <request...>\n{USAGE}");
            }
            let text = rest[2..].join(" ");
            let blood_type = Some(rest[1].as_str()).filter(|bt| *bt != "-");
            let out = recommender.blood_request(&text, blood_type, &rest[0])?;
            print_blood_request(&out);
            log_history(HistoryRecord::from_blood_request(&out, Utc::now()));
        }
        "doctors" => {
            let Some(specialty) = rest.first() else {
                bail!("doctors needs <specialty> [hospital_id]\n{USAGE}");
            };
            let specialty: Specialty = specialty.parse()?;
            let hospital = rest.get(1).map(String::as_str);
            let limit = recommender.config().default_top_n;
            let doctors = recommender.top_doctors(specialty, hospital, limit);
            if doctors.is_empty() {
                println!("No {specialty} doctors found.");
            }
            for (i, d) in doctors.iter().enumerate() {
                let hospital_name = recommender
                    .data()
                    .hospital(&d.doctor.hospital_id)
                    .map_or(d.doctor.hospital_id.as_str(), |h| h.name.as_str());
                println!(
                    "{:>2}. {} ({}, {} yrs) at {} | rating {:.1} | success {:.1}% | quality {:.3}",
                    i + 1,
                    d.doctor.name,
                    d.doctor.qualification,
                    d.doctor.experience_years,
                    hospital_name,
                    d.doctor.rating,
                    d.doctor.success_rate,
                    d.quality_score
                );
            }
        }
        "export-data" => {
            let Some(path) = rest.first() else {
                bail!("export-data needs <path.json>\n{USAGE}");
            };
            recommender
                .data()
                .save_json(Path::new(path))
                .with_context(|| format!("writing reference data to {path}"))?;
            println!("Reference data written to {path}");
        }
        other => bail!("unknown command {other:?}\n{USAGE}"),
    }

    Ok(())
}

fn build_recommender() -> anyhow::Result<Recommender> {
    let config = match std::env::var_os(CONFIG_ENV) {
        Some(path) => {
            let path = PathBuf::from(path);
            CareMatchConfig::load(&path).with_context(|| format!("loading config {}", path.display()))?
        }
        None => CareMatchConfig::default(),
    };

    let recommender = match std::env::var_os(DATA_ENV) {
        Some(path) => {
            let path = PathBuf::from(path);
            let data = ReferenceData::load_json(&path)
                .with_context(|| format!("loading reference data {}", path.display()))?;
            Recommender::new(data, config)?
        }
        None => Recommender::synthetic(config, Utc::now())?,
    };
    Ok(recommender)
}

fn parse_radius(arg: Option<&String>) -> anyhow::Result<f64> {
    match arg {
        Some(raw) => raw
            .parse::<f64>()
            .with_context(|| format!("radius {raw:?} is not a number")),
        None => Ok(DEFAULT_RADIUS_KM),
    }
}

/// A failed history write never fails the request itself.
fn log_history(record: HistoryRecord) {
    let path = history_path();
    if let Err(e) = append_record(&path, &record) {
        tracing::warn!(path = %path.display(), error = %e, "could not append to history");
    }
}

fn print_hospitals(out: &HospitalRecommendations) {
    println!(
        "Predicted specialty: {} (confidence {:.2}{})",
        out.prediction.specialty,
        out.prediction.confidence,
        if out.prediction.fallback { ", fallback" } else { "" }
    );
    println!(
        "{} hospitals in {} considered for {}{}",
        out.candidates_in_state,
        out.state,
        out.city,
        if out.state_fallback { " (unknown city, default used)" } else { "" }
    );
    if let Some(reason) = out.reason {
        println!("No results: {}", reason.as_str());
        return;
    }
    for r in &out.results {
        println!(
            "{:>2}. {} ({}) | score {:.3} | {:.1} km | rating {:.1}",
            r.rank, r.item.name, r.item.city, r.score, r.distance_km, r.item.overall_rating
        );
        println!("    {}", r.reason_summary);
        for d in &r.item.top_doctors {
            println!("    - {} ({:.1}, {} yrs)", d.doctor.name, d.doctor.rating, d.doctor.experience_years);
        }
    }
}

fn print_donors(out: &DonorSearchResult) {
    let types: Vec<String> = out.compatible_types.iter().map(|t| t.to_string()).collect();
    println!(
        "Donors for {} near {} within {} km (compatible: {})",
        out.recipient,
        out.city,
        out.search_radius_km,
        types.join(", ")
    );
    if let Some(reason) = out.reason {
        println!("No results: {}", reason.as_str());
        return;
    }
    for r in &out.results {
        println!(
            "{:>3}. {} [{}] {} | {:.1} km | {} | {} days since donation | {}{}",
            r.rank,
            r.item.name,
            r.item.blood_type,
            r.item.city,
            r.distance_km,
            if r.item.available { "available" } else { "unavailable" },
            r.item.last_donation_days,
            r.item.contact,
            if r.item.widened { " (widened)" } else { "" }
        );
    }
    println!(
        "{} within radius, {} added from up to {:.0} km",
        out.within_radius, out.widened_included, out.widened_radius_km
    );
}

fn print_availability(out: &BloodAvailability) {
    println!(
        "{} units of {} within {} km of {}",
        out.total_units, out.blood_type, out.search_radius_km, out.city
    );
    if let Some(reason) = out.reason {
        println!("No results: {}", reason.as_str());
        return;
    }
    for s in &out.hospitals_with_blood {
        println!(
            "  {} ({}) | {:.1} km | {} units | {}",
            s.name, s.city, s.distance_km, s.units, s.contact
        );
    }
    if !out.emergency_contacts.is_empty() {
        println!("Emergency contacts:");
        for c in &out.emergency_contacts {
            println!("  {} | {:.1} km | {}", c.hospital_name, c.distance_km, c.emergency_contact);
        }
    }
}

fn print_blood_request(out: &BloodRequestResponse) {
    println!(
        "Request type: {} (confidence {:.2}{}) near {}",
        out.prediction.request_type,
        out.prediction.confidence,
        if out.prediction.fallback { ", fallback" } else { "" },
        out.city
    );
    match (&out.availability, &out.donors) {
        (Some(availability), Some(donors)) => {
            print_availability(availability);
            print_donors(donors);
        }
        _ => println!("No blood type given; pass one to see stock and donors."),
    }
    println!("Helplines:");
    for h in &out.helplines {
        println!("  {}: {}", h.name, h.number);
    }
}
