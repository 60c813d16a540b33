//! Immutable station + pickup-point table with id and free-text lookup.
//!
//! Loaded once at start and never mutated. Text matching is case-insensitive
//! substring search (the typed text contains the area, pickup or station
//! name); ties resolve to the first occurrence in table order.

use crate::model::{PickupPoint, Station};

#[derive(Debug, Clone)]
pub struct Catalog {
    stations: Vec<Station>,
    pickups: Vec<PickupPoint>,
}

impl Catalog {
    pub fn new(stations: Vec<Station>, pickups: Vec<PickupPoint>) -> Self {
        Self { stations, pickups }
    }

    pub fn stations(&self) -> &[Station] {
        &self.stations
    }

    pub fn pickup_points(&self) -> &[PickupPoint] {
        &self.pickups
    }

    pub fn station_by_id(&self, id: &str) -> Option<&Station> {
        self.stations.iter().find(|s| s.id == id)
    }

    pub fn pickup_by_id(&self, id: &str) -> Option<&PickupPoint> {
        self.pickups.iter().find(|p| p.id == id)
    }

    /// Resolves ids to pickup points, preserving order and silently dropping
    /// unknowns and duplicates.
    pub fn pickups_for_ids(&self, ids: &[String]) -> Vec<PickupPoint> {
        let mut seen: Vec<&str> = Vec::with_capacity(ids.len());
        let mut out = Vec::with_capacity(ids.len());
        for id in ids {
            if seen.contains(&id.as_str()) {
                continue;
            }
            if let Some(pickup) = self.pickup_by_id(id) {
                seen.push(id.as_str());
                out.push(pickup.clone());
            }
        }
        out
    }

    /// Trims, drops unknown ids, and dedupes while preserving first-occurrence
    /// order. The result is the canonical pickup list for a driver plan.
    pub fn normalize_pickup_ids(&self, ids: &[String]) -> Vec<String> {
        let mut out: Vec<String> = Vec::with_capacity(ids.len());
        for raw in ids {
            let id = raw.trim();
            if id.is_empty() || out.iter().any(|existing| existing == id) {
                continue;
            }
            if self.pickup_by_id(id).is_some() {
                out.push(id.to_string());
            }
        }
        out
    }

    /// Projects pickup ids onto their stations, deduplicated in
    /// first-occurrence order.
    pub fn station_ids_for_pickups(&self, ids: &[String]) -> Vec<String> {
        let mut out: Vec<String> = Vec::new();
        for id in ids {
            if let Some(pickup) = self.pickup_by_id(id) {
                if !out.iter().any(|existing| existing == &pickup.station_id) {
                    out.push(pickup.station_id.clone());
                }
            }
        }
        out
    }

    /// Display label for a pickup, used as the default plan destination.
    pub fn pickup_display_name(&self, id: &str) -> String {
        match self.pickup_by_id(id) {
            Some(p) => format!("{} · {}", p.name, p.station_name),
            None => String::new(),
        }
    }

    /// Finds the first station whose nearby-area (then name) occurs in the
    /// text. Returns the station and the matched area.
    pub fn match_station_by_text(&self, text: &str) -> Option<(&Station, String)> {
        let lower = text.to_lowercase();
        for station in &self.stations {
            for area in &station.nearby_areas {
                if lower.contains(&area.to_lowercase()) {
                    return Some((station, area.clone()));
                }
            }
            if lower.contains(&station.name.to_lowercase()) {
                return Some((station, station.name.clone()));
            }
        }
        None
    }

    /// Finds the first pickup point whose name occurs in the text.
    pub fn match_pickup_by_text(&self, text: &str) -> Option<&PickupPoint> {
        let lower = text.to_lowercase();
        self.pickups
            .iter()
            .find(|p| lower.contains(&p.name.to_lowercase()))
    }

    /// The curated Bengaluru metro dataset: Electronic City + Outer Ring Road
    /// cluster, nine stations and thirty-one pickup clusters.
    pub fn metro_default() -> Self {
        Self::new(default_stations(), default_pickup_points())
    }
}

fn station(id: &str, name: &str, areas: &[&str], lat: f64, lon: f64) -> Station {
    Station {
        id: id.to_string(),
        name: name.to_string(),
        nearby_areas: areas.iter().map(|a| a.to_string()).collect(),
        latitude: lat,
        longitude: lon,
    }
}

fn pickup(id: &str, name: &str, station_id: &str, station_name: &str, lat: f64, lon: f64) -> PickupPoint {
    PickupPoint {
        id: id.to_string(),
        name: name.to_string(),
        station_id: station_id.to_string(),
        station_name: station_name.to_string(),
        latitude: lat,
        longitude: lon,
    }
}

fn default_stations() -> Vec<Station> {
    vec![
        station(
            "station-ecity",
            "Electronic City",
            &["Wipro Gate", "Infosys Gate", "Velankani Tech Park", "Neeladri Road", "Doddathogur Cross", "Singasandra"],
            12.8456,
            77.66,
        ),
        station(
            "station-konappana",
            "Konappana Agrahara",
            &["Konappana Bus Stop", "Siemens Campus", "PES IT Junction", "Hosa Road Junction"],
            12.8519,
            77.6546,
        ),
        station(
            "station-huskur",
            "Huskur Road",
            &["Huskur Junction", "D Mart Huskur", "Electronic City Phase 2"],
            12.8209,
            77.6954,
        ),
        station(
            "station-bommasandra",
            "Bommasandra",
            &["Bommasandra Industrial", "Narayana Health City", "Chandapura Circle", "Attibele Checkpost"],
            12.8006,
            77.7003,
        ),
        station(
            "station-silkboard",
            "Central Silk Board",
            &["Silk Board Flyover", "Madiwala Police Station", "Singasandra"],
            12.9165,
            77.6238,
        ),
        station(
            "station-hsr",
            "HSR Layout",
            &["HSR 27th Main", "HSR BDA Complex", "Agara Lake", "Kudlu Gate", "Haralur Road"],
            12.9121,
            77.6387,
        ),
        station(
            "station-btm",
            "BTM Layout",
            &["BTM 2nd Stage", "Jayadeva Hospital", "Madiwala"],
            12.9122,
            77.6092,
        ),
        station(
            "station-koramangala",
            "Koramangala",
            &["Forum Mall", "Sony World", "Ejipura Signal"],
            12.9345,
            77.6266,
        ),
        station(
            "station-bellandur",
            "Bellandur",
            &["Bellandur Gate", "Iblur Junction", "Kasavanahalli"],
            12.9381,
            77.6951,
        ),
    ]
}

fn default_pickup_points() -> Vec<PickupPoint> {
    vec![
        pickup("pickup-wipro-gate", "Wipro Gate", "station-ecity", "Electronic City", 12.8467, 77.6624),
        pickup("pickup-infosys-gate", "Infosys Gate", "station-ecity", "Electronic City", 12.8459, 77.6666),
        pickup("pickup-velankani", "Velankani Tech Park", "station-ecity", "Electronic City", 12.8449, 77.6615),
        pickup("pickup-neeladri", "Neeladri Road", "station-ecity", "Electronic City", 12.8442, 77.6574),
        pickup("pickup-doddathogur", "Doddathogur Cross", "station-ecity", "Electronic City", 12.8365, 77.6642),
        pickup("pickup-singasandra", "Singasandra", "station-ecity", "Electronic City", 12.884, 77.654),
        pickup("pickup-kudlu-gate", "Kudlu Gate", "station-hsr", "HSR Layout", 12.8936, 77.6513),
        pickup("pickup-hosa-road", "Hosa Road Junction", "station-konappana", "Konappana Agrahara", 12.8721, 77.6647),
        pickup("pickup-konappana", "Konappana Bus Stop", "station-konappana", "Konappana Agrahara", 12.8513, 77.6541),
        pickup("pickup-siemens", "Siemens Campus", "station-konappana", "Konappana Agrahara", 12.8553, 77.6515),
        pickup("pickup-pes-it", "PES IT Junction", "station-konappana", "Konappana Agrahara", 12.8581, 77.6493),
        pickup("pickup-huskur", "Huskur Junction", "station-huskur", "Huskur Road", 12.8188, 77.6924),
        pickup("pickup-dmart", "D Mart Huskur", "station-huskur", "Huskur Road", 12.817, 77.6972),
        pickup("pickup-ecity-phase2", "Electronic City Phase 2", "station-huskur", "Huskur Road", 12.8149, 77.6968),
        pickup("pickup-bommasandra", "Bommasandra Industrial", "station-bommasandra", "Bommasandra", 12.8019, 77.7018),
        pickup("pickup-narayana", "Narayana Health City", "station-bommasandra", "Bommasandra", 12.8008, 77.6846),
        pickup("pickup-chandapura", "Chandapura Circle", "station-bommasandra", "Bommasandra", 12.8011, 77.7039),
        pickup("pickup-attibele", "Attibele Checkpost", "station-bommasandra", "Bommasandra", 12.7842, 77.7721),
        pickup("pickup-silkboard", "Silk Board Flyover", "station-silkboard", "Central Silk Board", 12.916, 77.6239),
        pickup("pickup-madiwala", "Madiwala Police Station", "station-silkboard", "Central Silk Board", 12.9188, 77.6176),
        pickup("pickup-hsr-27th", "HSR 27th Main", "station-hsr", "HSR Layout", 12.9082, 77.6475),
        pickup("pickup-hsr-bda", "HSR BDA Complex", "station-hsr", "HSR Layout", 12.9129, 77.6382),
        pickup("pickup-agara", "Agara Lake", "station-hsr", "HSR Layout", 12.9215, 77.651),
        pickup("pickup-btm2", "BTM 2nd Stage", "station-btm", "BTM Layout", 12.9169, 77.6105),
        pickup("pickup-jayadeva", "Jayadeva Hospital", "station-btm", "BTM Layout", 12.9189, 77.5956),
        pickup("pickup-forum", "Forum Mall", "station-koramangala", "Koramangala", 12.9349, 77.6113),
        pickup("pickup-sonyworld", "Sony World Junction", "station-koramangala", "Koramangala", 12.9353, 77.6393),
        pickup("pickup-ejipura", "Ejipura Signal", "station-koramangala", "Koramangala", 12.9304, 77.626),
        pickup("pickup-bellandur-gate", "Bellandur Gate", "station-bellandur", "Bellandur", 12.9378, 77.679),
        pickup("pickup-iblur", "Iblur Junction", "station-bellandur", "Bellandur", 12.9248, 77.6773),
        pickup("pickup-haralur", "Haralur Road", "station-hsr", "HSR Layout", 12.9004, 77.6492),
    ]
}
