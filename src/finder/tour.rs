use chrono::{DateTime, NaiveDate, Utc};
use log::warn;
use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Guest capacity assumed for tours that do not declare one.
pub const DEFAULT_MAX_GUESTS: u32 = 50;

const MILLIS_PER_DAY: f64 = 86_400_000.0;

/// Legacy keys and the field they stand in for. When a record carries both,
/// the current key wins.
const LEGACY_KEYS: [(&str, &str); 5] = [
    ("_id", "id"),
    ("image", "images"),
    ("categories", "category"),
    ("averageRating", "rating"),
    ("departures", "departureOptions"),
];

/// A bookable tour as delivered by the tours API.
///
/// Upstream records are loosely shaped, so most fields are optional
/// and a few accept more than one JSON representation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tour {
    #[serde(default, alias = "_id", deserialize_with = "string_or_number")]
    pub id: String,

    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub title: String,

    #[serde(default)]
    pub description: String,

    #[serde(default, alias = "image", deserialize_with = "one_or_many")]
    pub images: Vec<String>,

    #[serde(default, deserialize_with = "lenient_number")]
    pub price: f64,

    #[serde(default)]
    pub duration: Option<TourDuration>,

    #[serde(default, alias = "categories", deserialize_with = "one_or_many")]
    pub category: Vec<CategoryLabel>,

    #[serde(default)]
    pub destination: Option<String>,

    #[serde(default)]
    pub location: Option<String>,

    #[serde(default)]
    pub country: Option<String>,

    #[serde(default, deserialize_with = "lenient_count")]
    pub max_guests: Option<u32>,

    #[serde(default, deserialize_with = "lenient_count")]
    pub available_slots: Option<u32>,

    #[serde(default, alias = "averageRating", deserialize_with = "lenient_optional_number")]
    pub rating: Option<f64>,

    #[serde(default, alias = "departures")]
    pub departure_options: Vec<Departure>,
}

/// Category entries arrive either as plain strings or as objects with a name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CategoryLabel {
    Plain(String),
    Named { name: String },
}

impl CategoryLabel {
    /// The normalized label used by the index, the filters and suggestions.
    pub fn as_str(&self) -> &str {
        match self {
            CategoryLabel::Plain(name) => name.trim(),
            CategoryLabel::Named { name } => name.trim(),
        }
    }
}

impl From<&str> for CategoryLabel {
    fn from(name: &str) -> Self {
        CategoryLabel::Plain(name.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TourDuration {
    Days(f64),
    Text(String),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Departure {
    #[serde(default)]
    pub departure_date: Option<String>,

    #[serde(default)]
    pub return_date: Option<String>,
}

impl Departure {
    /// Number of calendar days covered by this departure, both ends included.
    pub fn days(&self) -> Option<f64> {
        let departure = parse_date(self.departure_date.as_deref()?)?;
        let back = parse_date(self.return_date.as_deref()?)?;

        let millis = (back - departure).num_milliseconds() as f64;
        Some(((millis / MILLIS_PER_DAY).ceil() + 1.0).max(0.0))
    }
}

impl Tour {
    /// Parses a single upstream record. Legacy keys are folded into their
    /// current names first, so a record carrying both is not a duplicate.
    pub fn from_record(record: Value) -> serde_json::Result<Tour> {
        match record {
            Value::Object(mut fields) => {
                fold_legacy_keys(&mut fields);
                serde_json::from_value(Value::Object(fields))
            }

            other => serde_json::from_value(other),
        }
    }

    /// The label shown to users; falls back to the title for untitled records.
    pub fn display_name(&self) -> &str {
        if self.name.trim().is_empty() {
            &self.title
        } else {
            &self.name
        }
    }

    pub fn category_labels(&self) -> impl Iterator<Item = &str> {
        self.category
            .iter()
            .map(CategoryLabel::as_str)
            .filter(|label| !label.is_empty())
    }

    /// Destination label, preferring `destination` over `location, country`.
    pub fn destination_label(&self) -> Option<String> {
        if let Some(destination) = non_empty(self.destination.as_deref()) {
            return Some(destination.to_string());
        }

        match (non_empty(self.location.as_deref()), non_empty(self.country.as_deref())) {
            (Some(location), Some(country)) => Some(format!("{location}, {country}")),
            (Some(single), None) | (None, Some(single)) => Some(single.to_string()),
            (None, None) => None,
        }
    }

    /// Duration in days. An explicit numeric duration wins, then the first
    /// departure option; anything else counts as zero.
    pub fn duration_days(&self) -> f64 {
        let explicit = match &self.duration {
            Some(TourDuration::Days(days)) => Some(*days),
            Some(TourDuration::Text(text)) => text.trim().parse::<f64>().ok(),
            None => None,
        };

        explicit
            .filter(|days| days.is_finite())
            .or_else(|| self.departure_options.first().and_then(Departure::days))
            .unwrap_or(0.0)
    }

    pub fn max_guests_or_default(&self) -> u32 {
        self.max_guests.unwrap_or(DEFAULT_MAX_GUESTS)
    }

    pub fn rating_or_zero(&self) -> f64 {
        self.rating.unwrap_or(0.0)
    }
}

/// Parses a listing record by record. Records that still fail are logged
/// and skipped, the rest of the listing survives.
pub fn parse_records(records: Vec<Value>) -> Vec<Tour> {
    let total = records.len();

    let tours: Vec<Tour> = records
        .into_iter()
        .enumerate()
        .filter_map(|(position, record)| match Tour::from_record(record) {
            Ok(tour) => Some(tour),
            Err(err) => {
                warn!("Skipping tour record {}: {:?}", position, err);
                None
            }
        })
        .collect();

    if tours.len() < total {
        warn!("Kept {} of {} tour records", tours.len(), total);
    }

    tours
}

fn fold_legacy_keys(fields: &mut Map<String, Value>) {
    for (legacy, current) in LEGACY_KEYS {
        if let Some(value) = fields.remove(legacy) {
            fields.entry(current).or_insert(value);
        }
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|value| !value.is_empty())
}

fn parse_date(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();

    if let Ok(timestamp) = DateTime::parse_from_rfc3339(raw) {
        return Some(timestamp.with_timezone(&Utc));
    }

    // plain dates and the date prefix of non-standard timestamps
    let date_part = raw.get(..10).unwrap_or(raw);
    NaiveDate::parse_from_str(date_part, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|midnight| midnight.and_utc())
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(value) => Ok(value),
        Value::Number(value) => Ok(value.to_string()),
        Value::Null => Ok(String::new()),
        other => Err(de::Error::custom(format!("expected string or number, got {other}"))),
    }
}

fn number_from(value: Value) -> Option<f64> {
    let number = match value {
        Value::Number(value) => value.as_f64(),
        Value::String(value) => value.trim().parse().ok(),
        _ => None,
    };

    number.filter(|number: &f64| number.is_finite())
}

fn lenient_number<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(number_from(Value::deserialize(deserializer)?).unwrap_or_default())
}

fn lenient_optional_number<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(number_from(Value::deserialize(deserializer)?))
}

/// Counts arrive as integers, floats or numeric strings; fractions are dropped.
fn lenient_count<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(number_from(Value::deserialize(deserializer)?)
        .filter(|count| *count >= 0.0)
        .map(|count| count.floor().min(f64::from(u32::MAX)) as u32))
}

fn one_or_many<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany<T> {
        Many(Vec<T>),
        One(T),
        Missing(()),
    }

    Ok(match OneOrMany::deserialize(deserializer)? {
        OneOrMany::Many(values) => values,
        OneOrMany::One(value) => vec![value],
        OneOrMany::Missing(()) => Vec::new(),
    })
}
