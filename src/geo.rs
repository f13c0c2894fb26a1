//! Coordinates, great-circle distance and the city table.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{CareMatchError, Result};

pub const EARTH_RADIUS_KM: f64 = 6371.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lon: f64,
}

impl GeoPoint {
    pub fn new(lat: f64, lon: f64) -> Result<Self> {
        let point = GeoPoint { lat, lon };
        point.validate()?;
        Ok(point)
    }

    pub fn validate(&self) -> Result<()> {
        if !self.lat.is_finite() || !(-90.0..=90.0).contains(&self.lat) {
            return Err(CareMatchError::InvalidConfig(format!(
                "latitude {} outside [-90, 90]",
                self.lat
            )));
        }
        if !self.lon.is_finite() || !(-180.0..=180.0).contains(&self.lon) {
            return Err(CareMatchError::InvalidConfig(format!(
                "longitude {} outside [-180, 180]",
                self.lon
            )));
        }
        Ok(())
    }
}

/// Great-circle distance in kilometres (haversine).
pub fn distance_km(a: GeoPoint, b: GeoPoint) -> f64 {
    if a == b {
        return 0.0;
    }
    let dlat = (b.lat - a.lat).to_radians();
    let dlon = (b.lon - a.lon).to_radians();
    let h = (dlat / 2.0).sin().powi(2)
        + a.lat.to_radians().cos() * b.lat.to_radians().cos() * (dlon / 2.0).sin().powi(2);
    let c = 2.0 * h.sqrt().atan2((1.0 - h).max(0.0).sqrt());
    (EARTH_RADIUS_KM * c).max(0.0)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct City {
    pub name: String,
    pub state: String,
    pub location: GeoPoint,
}

impl City {
    pub fn new(name: &str, state: &str, lat: f64, lon: f64) -> Result<Self> {
        let city = City {
            name: name.to_string(),
            state: state.to_string(),
            location: GeoPoint { lat, lon },
        };
        city.validate()?;
        Ok(city)
    }

    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(CareMatchError::record("city", &self.name, "name is empty"));
        }
        if self.state.trim().is_empty() {
            return Err(CareMatchError::record("city", &self.name, "state is empty"));
        }
        self.location
            .validate()
            .map_err(|e| CareMatchError::record("city", &self.name, e.to_string()))
    }
}

/// Built-in city table: name, state, latitude, longitude.
const INDIAN_CITIES: &[(&str, &str, f64, f64)] = &[
    ("Delhi", "Delhi", 28.7041, 77.1025),
    ("Mumbai", "Maharashtra", 19.0760, 72.8777),
    ("Bangalore", "Karnataka", 12.9716, 77.5946),
    ("Chennai", "Tamil Nadu", 13.0827, 80.2707),
    ("Kolkata", "West Bengal", 22.5726, 88.3639),
    ("Hyderabad", "Telangana", 17.3850, 78.4867),
    ("Pune", "Maharashtra", 18.5204, 73.8567),
    ("Ahmedabad", "Gujarat", 23.0225, 72.5714),
    ("Jaipur", "Rajasthan", 26.9124, 75.7873),
    ("Lucknow", "Uttar Pradesh", 26.8467, 80.9462),
];

pub fn builtin_cities() -> Vec<City> {
    INDIAN_CITIES
        .iter()
        .map(|&(name, state, lat, lon)| City {
            name: name.to_string(),
            state: state.to_string(),
            location: GeoPoint { lat, lon },
        })
        .collect()
}

/// Outcome of looking a city up. `fallback` is set when the city was unknown
/// and the directory's default city was substituted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedCity {
    pub name: String,
    pub state: String,
    pub location: GeoPoint,
    pub fallback: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StateResolution {
    pub state: String,
    pub fallback: bool,
}

/// Case-insensitive city lookup with a documented default for unknown cities.
#[derive(Debug, Clone)]
pub struct CityDirectory {
    cities: BTreeMap<String, City>,
    default_key: String,
}

impl CityDirectory {
    pub fn new(cities: &[City], default_city: &str) -> Result<Self> {
        let mut by_name = BTreeMap::new();
        for city in cities {
            city.validate()?;
            let key = normalise(&city.name);
            if by_name.insert(key, city.clone()).is_some() {
                return Err(CareMatchError::record("city", &city.name, "duplicate city"));
            }
        }
        let default_key = normalise(default_city);
        if !by_name.contains_key(&default_key) {
            return Err(CareMatchError::InvalidConfig(format!(
                "default city {default_city:?} is not in the city table"
            )));
        }
        Ok(CityDirectory {
            cities: by_name,
            default_key,
        })
    }

    pub fn get(&self, city: &str) -> Option<&City> {
        self.cities.get(&normalise(city))
    }

    pub fn default_city(&self) -> &City {
        // checked in `new`
        &self.cities[&self.default_key]
    }

    pub fn resolve(&self, city: &str) -> ResolvedCity {
        match self.get(city) {
            Some(found) => ResolvedCity {
                name: found.name.clone(),
                state: found.state.clone(),
                location: found.location,
                fallback: false,
            },
            None => {
                let default = self.default_city();
                warn!(
                    city,
                    default_city = %default.name,
                    "unknown city, falling back to default"
                );
                ResolvedCity {
                    name: default.name.clone(),
                    state: default.state.clone(),
                    location: default.location,
                    fallback: true,
                }
            }
        }
    }

    pub fn resolve_state(&self, city: &str) -> StateResolution {
        let resolved = self.resolve(city);
        StateResolution {
            state: resolved.state,
            fallback: resolved.fallback,
        }
    }

    pub fn coordinates(&self, city: &str) -> GeoPoint {
        self.resolve(city).location
    }
}

fn normalise(name: &str) -> String {
    name.trim().to_lowercase()
}
