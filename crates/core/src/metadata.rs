use serde::{Deserialize, Serialize, Serializer};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeoLocation {
    #[serde(rename = "hash")]
    pub geohash: String,
    pub latitude: f64,
    pub longitude: f64,
    pub country: String,
    pub division: String,
    pub city: String,
    pub place: String,
}

/// One record per scanned file. Every field is best-effort: anything that
/// could not be read stays at its zero value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageMetadata {
    pub file_size: u64,
    #[serde(rename = "filepath")]
    pub file_path: String,
    pub width: u32,
    pub height: u32,
    pub year: String,
    pub year_taken: String,
    pub year_created: String,
    pub month: String,
    pub month_taken: String,
    pub month_created: String,
    pub date: String,
    pub date_taken: String,
    pub date_created: String,
    pub parent: String,
    pub parent_if_not_date: String,
    // Always written as an object so the presentation layer sees a stable shape.
    #[serde(serialize_with = "serialize_location")]
    pub location: Option<GeoLocation>,
}

impl ImageMetadata {
    pub fn location_hash(&self) -> &str {
        self.location
            .as_ref()
            .map(|l| l.geohash.as_str())
            .unwrap_or_default()
    }

    pub fn location_country(&self) -> &str {
        self.location
            .as_ref()
            .map(|l| l.country.as_str())
            .unwrap_or_default()
    }

    pub fn location_division(&self) -> &str {
        self.location
            .as_ref()
            .map(|l| l.division.as_str())
            .unwrap_or_default()
    }

    pub fn location_city(&self) -> &str {
        self.location
            .as_ref()
            .map(|l| l.city.as_str())
            .unwrap_or_default()
    }

    pub fn location_place(&self) -> &str {
        self.location
            .as_ref()
            .map(|l| l.place.as_str())
            .unwrap_or_default()
    }

    /// Fills `year`/`month`/`date` from the taken values, falling back to the
    /// created values field by field.
    pub fn derive_dates(&mut self) {
        self.year = prefer_taken(&self.year_taken, &self.year_created);
        self.month = prefer_taken(&self.month_taken, &self.month_created);
        self.date = prefer_taken(&self.date_taken, &self.date_created);
    }
}

fn prefer_taken(taken: &str, created: &str) -> String {
    if taken.is_empty() {
        created.to_string()
    } else {
        taken.to_string()
    }
}

fn serialize_location<S>(location: &Option<GeoLocation>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    match location {
        Some(location) => location.serialize(serializer),
        None => GeoLocation::default().serialize(serializer),
    }
}
