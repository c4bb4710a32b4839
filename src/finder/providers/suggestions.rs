use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::Arc;
use std::thread::spawn;

use log::{debug, warn};
use serde::Deserialize;

use crate::finder::Result;

pub trait SuggestionSource: Send + Sync {
    fn fetch(&self, query: &str, limit: usize) -> Result<Vec<String>>;
}

/// Server side suggestions, `GET {endpoint}/search/suggestions?q=...`.
pub struct SuggestionApi {
    endpoint: String,
}

impl SuggestionApi {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self { endpoint: endpoint.into() }
    }
}

impl SuggestionSource for SuggestionApi {
    fn fetch(&self, query: &str, limit: usize) -> Result<Vec<String>> {
        let url = format!("{}/search/suggestions", self.endpoint.trim_end_matches('/'));

        let response: Response = ureq::get(&url)
            .query("q", query)
            .query("limit", &limit.to_string())
            .call()?
            .into_json()?;

        Ok(response.into_suggestions())
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Response {
    Bare(Vec<String>),
    Wrapped { suggestions: Vec<String> },
}

impl Response {
    fn into_suggestions(self) -> Vec<String> {
        match self {
            Response::Bare(suggestions) => suggestions,
            Response::Wrapped { suggestions } => suggestions,
        }
    }
}

type Delivery = (u64, Result<Vec<String>>);

/// Fetches suggestions on worker threads and keeps only the newest answer.
///
/// Every request gets a generation; responses for older generations are
/// dropped even if they arrive last.
pub struct RemoteSuggestions {
    source: Arc<dyn SuggestionSource>,
    limit: usize,
    latest: u64,
    in_flight: usize,
    current: Vec<String>,
    sender: Sender<Delivery>,
    receiver: Receiver<Delivery>,
}

impl RemoteSuggestions {
    pub fn new(source: Arc<dyn SuggestionSource>, limit: usize) -> Self {
        let (sender, receiver) = channel();

        Self {
            source,
            limit,
            latest: 0,
            in_flight: 0,
            current: Vec::new(),
            sender,
            receiver,
        }
    }

    pub fn current(&self) -> &[String] {
        &self.current
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight
    }

    /// Starts a request for `query`; a blank query clears the suggestions.
    pub fn request(&mut self, query: &str) {
        self.latest += 1;

        let query = query.trim().to_string();
        if query.is_empty() {
            self.current.clear();
            return;
        }

        let generation = self.latest;
        let source = Arc::clone(&self.source);
        let sender = self.sender.clone();
        let limit = self.limit;

        self.in_flight += 1;
        spawn(move || {
            let result = source.fetch(&query, limit);
            // the receiver is gone once the owner was dropped
            let _ = sender.send((generation, result));
        });
    }

    /// Applies delivered responses. Returns true if the suggestions changed.
    pub fn poll(&mut self) -> bool {
        let mut changed = false;

        while let Ok((generation, result)) = self.receiver.try_recv() {
            self.in_flight = self.in_flight.saturating_sub(1);

            if generation != self.latest {
                debug!("dropping stale suggestions for request {generation}");
                continue;
            }

            match result {
                Ok(suggestions) => {
                    self.current = suggestions;
                    changed = true;
                }
                Err(err) => warn!("suggestion request failed: {err}"),
            }
        }

        changed
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::thread::sleep;
    use std::time::{Duration, Instant};

    use super::*;

    /// Answers instantly, except for `slow` which waits for the test to
    /// release it.
    struct Gated {
        slow: &'static str,
        gate: Mutex<Receiver<()>>,
    }

    impl SuggestionSource for Gated {
        fn fetch(&self, query: &str, _limit: usize) -> Result<Vec<String>> {
            if query == self.slow {
                let _ = self.gate.lock().unwrap().recv();
            }
            Ok(vec![format!("{query} suggestion")])
        }
    }

    fn wait_until(mut done: impl FnMut() -> bool) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while !done() {
            assert!(Instant::now() < deadline, "timed out");
            sleep(Duration::from_millis(5));
        }
    }

    #[test]
    fn stale_response_does_not_overwrite_newer_one() {
        let (release, gate) = channel();
        let source = Arc::new(Gated { slow: "ha", gate: Mutex::new(gate) });
        let mut remote = RemoteSuggestions::new(source, 5);

        remote.request("ha");
        remote.request("hanoi");

        wait_until(|| {
            remote.poll();
            remote.current() == ["hanoi suggestion"]
        });

        release.send(()).unwrap();
        wait_until(|| {
            remote.poll();
            remote.in_flight() == 0
        });

        assert_eq!(remote.current(), ["hanoi suggestion"]);
    }

    #[test]
    fn blank_query_clears_suggestions() {
        let (_release, gate) = channel();
        let source = Arc::new(Gated { slow: "", gate: Mutex::new(gate) });
        let mut remote = RemoteSuggestions::new(source, 5);

        remote.request("hue");
        wait_until(|| remote.poll());
        assert_eq!(remote.current(), ["hue suggestion"]);

        remote.request("  ");
        assert!(remote.current().is_empty());
    }

    #[test]
    fn parses_both_response_shapes() {
        let bare: Response = serde_json::from_str(r#"["Sapa", "Sapa Trek"]"#).unwrap();
        assert_eq!(bare.into_suggestions(), ["Sapa", "Sapa Trek"]);

        let wrapped: Response = serde_json::from_str(r#"{"suggestions": ["Hue"]}"#).unwrap();
        assert_eq!(wrapped.into_suggestions(), ["Hue"]);
    }
}
