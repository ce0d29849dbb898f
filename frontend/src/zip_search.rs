use serde::Deserialize;
use shared::Coordinate;

pub const NOMINATIM_ROOT: &str = "https://nominatim.openstreetmap.org/search";

#[derive(Debug, Clone, PartialEq)]
pub enum ZipStatus {
    Idle,
    Invalid,
    Loading,
    Found,
    NotFound,
    Failed(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ZipResult {
    pub zip: String,
    pub label: String,
    pub center: Coordinate,
}

/// Client-side state of the landing page ZIP lookup.
#[derive(Debug, Clone, PartialEq)]
pub struct ZipSearch {
    pub query: String,
    pub status: ZipStatus,
    pub result: Option<ZipResult>,
}

impl Default for ZipSearch {
    fn default() -> Self {
        Self {
            query: String::new(),
            status: ZipStatus::Idle,
            result: None,
        }
    }
}

/// One entry of a Nominatim `format=json` answer. Coordinates arrive as
/// strings.
#[derive(Debug, Clone, Deserialize)]
pub struct NominatimPlace {
    pub lat: String,
    pub lon: String,
    #[serde(default)]
    pub display_name: String,
}

impl ZipSearch {
    pub fn set_query(&mut self, query: String) {
        self.query = query;
        if self.status != ZipStatus::Loading {
            self.status = ZipStatus::Idle;
        }
    }

    /// Validate the query and move to `Loading`. Returns the lookup URL, or
    /// `None` when the ZIP is malformed or a lookup is already in flight.
    pub fn begin(&mut self) -> Option<String> {
        if self.status == ZipStatus::Loading {
            return None;
        }
        match normalize_zip(&self.query) {
            Some(zip) => {
                self.status = ZipStatus::Loading;
                Some(lookup_url(&zip))
            }
            None => {
                self.status = ZipStatus::Invalid;
                None
            }
        }
    }

    /// Apply a lookup outcome. Returns the place to center the map on.
    pub fn resolve(&mut self, outcome: Result<Vec<NominatimPlace>, String>) -> Option<Coordinate> {
        let zip = normalize_zip(&self.query).unwrap_or_default();
        match outcome {
            Err(err) => {
                self.status = ZipStatus::Failed(err);
                self.result = None;
                None
            }
            Ok(places) => {
                let found = places.into_iter().find_map(|place| {
                    let lat = place.lat.trim().parse::<f64>().ok()?;
                    let lon = place.lon.trim().parse::<f64>().ok()?;
                    let center = Coordinate::new(lat, lon);
                    center.is_valid().then(|| ZipResult {
                        zip: zip.clone(),
                        label: place.display_name,
                        center,
                    })
                });
                match found {
                    Some(result) => {
                        let center = result.center;
                        self.status = ZipStatus::Found;
                        self.result = Some(result);
                        Some(center)
                    }
                    None => {
                        self.status = ZipStatus::NotFound;
                        self.result = None;
                        None
                    }
                }
            }
        }
    }

    pub fn message(&self) -> Option<String> {
        match &self.status {
            ZipStatus::Idle => None,
            ZipStatus::Invalid => Some("Enter a 5-digit US ZIP code (or ZIP+4).".to_string()),
            ZipStatus::Loading => Some("Looking up ZIP code…".to_string()),
            ZipStatus::Found => self.result.as_ref().map(|r| r.label.clone()),
            ZipStatus::NotFound => Some(format!("No location found for {}.", self.query.trim())),
            ZipStatus::Failed(err) => Some(format!("Lookup failed: {err}")),
        }
    }
}

/// Five digits, optionally followed by `-` and four digits. Returns the
/// five-digit part.
pub fn normalize_zip(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    let (base, plus_four) = match trimmed.split_once('-') {
        Some((base, ext)) => (base, Some(ext)),
        None => (trimmed, None),
    };
    let digits = |s: &str, n: usize| s.len() == n && s.bytes().all(|b| b.is_ascii_digit());

    if !digits(base, 5) {
        return None;
    }
    if let Some(ext) = plus_four {
        if !digits(ext, 4) {
            return None;
        }
    }
    Some(base.to_string())
}

pub fn lookup_url(zip: &str) -> String {
    format!("{NOMINATIM_ROOT}?postalcode={zip}&countrycodes=us&format=json&limit=1")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn place(lat: &str, lon: &str) -> NominatimPlace {
        NominatimPlace {
            lat: lat.to_string(),
            lon: lon.to_string(),
            display_name: "Springfield, IL 62701".to_string(),
        }
    }

    #[test]
    fn zip_validation() {
        assert_eq!(normalize_zip("62701"), Some("62701".to_string()));
        assert_eq!(normalize_zip(" 62701-1234 "), Some("62701".to_string()));
        assert_eq!(normalize_zip("6270"), None);
        assert_eq!(normalize_zip("62701-12"), None);
        assert_eq!(normalize_zip("6270a"), None);
        assert_eq!(normalize_zip(""), None);
    }

    #[test]
    fn invalid_query_never_loads() {
        let mut search = ZipSearch::default();
        search.set_query("abc".into());
        assert_eq!(search.begin(), None);
        assert_eq!(search.status, ZipStatus::Invalid);
    }

    #[test]
    fn lookup_flow_finds_place() {
        let mut search = ZipSearch::default();
        search.set_query("62701".into());
        let url = search.begin().unwrap();
        assert!(url.contains("postalcode=62701"));
        assert_eq!(search.status, ZipStatus::Loading);
        assert_eq!(search.begin(), None, "second lookup while loading");

        let center = search.resolve(Ok(vec![place("39.80", "-89.65")])).unwrap();
        assert_eq!(center, Coordinate::new(39.80, -89.65));
        assert_eq!(search.status, ZipStatus::Found);
        assert_eq!(search.result.as_ref().unwrap().zip, "62701");
    }

    #[test]
    fn nominatim_answer_deserializes() {
        let raw = r#"[{"place_id": 1, "lat": "33.7537", "lon": "-84.3863",
                       "display_name": "Atlanta, Fulton County, Georgia, 30303, United States"}]"#;
        let places: Vec<NominatimPlace> = serde_json::from_str(raw).unwrap();
        let mut search = ZipSearch::default();
        search.set_query("30303".into());
        search.begin();
        let center = search.resolve(Ok(places)).unwrap();
        assert!((center.lat - 33.7537).abs() < 1e-9);
        assert!(search.message().unwrap().starts_with("Atlanta"));
    }

    #[test]
    fn empty_or_garbled_answer_is_not_found() {
        let mut search = ZipSearch::default();
        search.set_query("99999".into());
        search.begin();
        assert_eq!(search.resolve(Ok(vec![place("north", "west")])), None);
        assert_eq!(search.status, ZipStatus::NotFound);
    }

    #[test]
    fn network_failure_is_reported() {
        let mut search = ZipSearch::default();
        search.set_query("62701".into());
        search.begin();
        search.resolve(Err("offline".into()));
        assert_eq!(search.status, ZipStatus::Failed("offline".into()));
        assert!(search.message().unwrap().contains("offline"));
    }
}
