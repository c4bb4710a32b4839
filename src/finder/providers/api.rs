use log::info;
use serde::Deserialize;
use serde_json::Value;

use crate::finder::{parse_records, Result, Tour, TourSource};

/// The public tour listing of the booking backend.
pub struct ToursApi {
    endpoint: String,
}

impl ToursApi {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self { endpoint: endpoint.into() }
    }

    pub fn url(&self) -> String {
        format!("{}/api/tours", self.endpoint.trim_end_matches('/'))
    }
}

impl TourSource for ToursApi {
    fn title(&self) -> String {
        self.endpoint.clone()
    }

    fn load(&self) -> Result<Vec<Tour>> {
        let url = self.url();
        let response: Response = ureq::get(&url).call()?.into_json()?;
        let tours = parse_records(response.into_records());

        info!("loaded {} tours from {}", tours.len(), url);
        Ok(tours)
    }
}

/// The listing is either a bare array or wrapped in an envelope. Records
/// stay raw here so a single bad one cannot fail the whole listing.
#[derive(Deserialize)]
#[serde(untagged)]
enum Response {
    Bare(Vec<Value>),
    Envelope {
        #[serde(alias = "tours")]
        data: Vec<Value>,
    },
}

impl Response {
    fn into_records(self) -> Vec<Value> {
        match self {
            Response::Bare(records) => records,
            Response::Envelope { data } => data,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_ignores_trailing_slash() {
        assert_eq!(ToursApi::new("http://localhost:5000/").url(), "http://localhost:5000/api/tours");
    }

    fn tours(body: &str) -> Vec<Tour> {
        let response: Response = serde_json::from_str(body).unwrap();
        parse_records(response.into_records())
    }

    #[test]
    fn accepts_bare_and_wrapped_listings() {
        assert_eq!(tours(r#"[{"id": "1", "name": "Sapa Trek"}]"#).len(), 1);
        assert_eq!(tours(r#"{"success": true, "data": [{"id": "1"}, {"id": "2"}]}"#).len(), 2);
        assert_eq!(tours(r#"{"tours": [{"_id": 7}]}"#)[0].id, "7");
    }

    #[test]
    fn bad_record_is_skipped_not_fatal() {
        let body = r#"{"data": [
            {"id": "1", "name": "Sapa Trek", "maxGuests": 12.0, "rating": "4.5"},
            {"id": "2", "price": {"amount": 10}, "departureOptions": "soon"},
            {"id": "3", "name": "Hue", "image": "a.jpg", "images": ["b.jpg"], "rating": 4, "averageRating": 3}
        ]}"#;

        let loaded = tours(body);
        let ids: Vec<&str> = loaded.iter().map(|tour| tour.id.as_str()).collect();

        assert_eq!(ids, ["1", "3"]);
        assert_eq!(loaded[0].max_guests, Some(12));
        assert_eq!(loaded[1].rating, Some(4.0));
    }
}
