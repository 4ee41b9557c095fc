//! Location search: debounced geocoding as the user types.
//!
//! The debounce timer itself lives in the [`Store`](crate::store::Store);
//! this state machine only asks for it to be armed or cancelled and guards
//! against timer fires and responses that no longer match the live query.

use tracing::debug;

use crate::{Location, ServiceError, feature::RequestId};

/// Queries shorter than this (in characters) never reach the geocoder.
pub const MIN_QUERY_CHARS: usize = 2;

#[derive(Debug, Clone, PartialEq)]
pub enum SearchAction {
    QueryChanged(String),
    /// The debounce timer armed for this text has fired.
    DebounceElapsed(String),
    /// Search for `text` right away, bypassing the debounce.
    ExecuteSearch(String),
    Response { request: RequestId, query: String, result: Result<Vec<Location>, ServiceError> },
    SelectLocation(Location),
    Clear,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SearchEffect {
    /// (Re)start the debounce timer; replaces any pending timer or search.
    ArmDebounce { text: String },
    /// Drop any pending timer or in-flight search.
    Cancel,
    Search { request: RequestId, query: String },
    /// Output event for the parent: the user picked a location.
    LocationSelected(Location),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SearchPhase<'a> {
    Empty,
    Debouncing(&'a str),
    Searching(&'a str),
    Results(&'a str, &'a [Location]),
    Failed(&'a str, &'a ServiceError),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchState {
    pub query_text: String,
    /// Geocoder ranking order; names may repeat.
    pub results: Vec<Location>,
    pub is_loading: bool,
    pub error: Option<ServiceError>,
    debouncing: bool,
    in_flight: Option<(RequestId, String)>,
    requests: RequestId,
}

impl SearchState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_debouncing(&self) -> bool {
        self.debouncing
    }

    pub fn phase(&self) -> SearchPhase<'_> {
        let text = self.query_text.as_str();

        if self.is_loading {
            SearchPhase::Searching(text)
        } else if self.debouncing {
            SearchPhase::Debouncing(text)
        } else if let Some(error) = &self.error {
            SearchPhase::Failed(text, error)
        } else if text.is_empty() && self.results.is_empty() {
            SearchPhase::Empty
        } else {
            SearchPhase::Results(text, &self.results)
        }
    }

    pub fn reduce(&mut self, action: SearchAction) -> Vec<SearchEffect> {
        match action {
            SearchAction::QueryChanged(text) => {
                self.query_text = text;
                self.error = None;

                if self.query_text.is_empty() {
                    self.results.clear();
                    self.cancel_pending();
                    return vec![SearchEffect::Cancel];
                }

                if self.query_text.chars().count() < MIN_QUERY_CHARS {
                    self.cancel_pending();
                    return vec![SearchEffect::Cancel];
                }

                // Arming replaces whatever occupied the search slot.
                self.cancel_pending();
                self.debouncing = true;
                vec![SearchEffect::ArmDebounce { text: self.query_text.clone() }]
            }

            SearchAction::DebounceElapsed(text) => {
                if !self.debouncing || text != self.query_text {
                    debug!(fired = %text, live = %self.query_text, "ignoring stale debounce");
                    return Vec::new();
                }
                self.debouncing = false;
                debug!(query = %text, "debounce period completed");
                vec![self.execute(text)]
            }

            SearchAction::ExecuteSearch(text) => {
                if text.is_empty() {
                    return Vec::new();
                }
                self.query_text = text.clone();
                self.debouncing = false;
                vec![self.execute(text)]
            }

            SearchAction::Response { request, query, result } => {
                let current = matches!(&self.in_flight, Some((id, _)) if *id == request);
                if !current || query != self.query_text {
                    debug!(
                        %request,
                        %query,
                        live = %self.query_text,
                        "dropping stale search response"
                    );
                    return Vec::new();
                }
                self.in_flight = None;
                self.is_loading = false;

                match result {
                    Ok(locations) => {
                        debug!(%query, count = locations.len(), "search results applied");
                        self.results = locations;
                        self.error = None;
                    }
                    Err(error) => {
                        debug!(%query, %error, "search failed");
                        self.error = Some(error);
                    }
                }
                Vec::new()
            }

            SearchAction::SelectLocation(location) => {
                self.reset();
                vec![SearchEffect::Cancel, SearchEffect::LocationSelected(location)]
            }

            SearchAction::Clear => {
                self.reset();
                vec![SearchEffect::Cancel]
            }
        }
    }

    fn execute(&mut self, query: String) -> SearchEffect {
        let request = self.requests.advance();

        self.is_loading = true;
        self.error = None;
        self.in_flight = Some((request, query.clone()));
        SearchEffect::Search { request, query }
    }

    fn cancel_pending(&mut self) {
        self.debouncing = false;
        if let Some((request, query)) = self.in_flight.take() {
            debug!(%request, %query, "cancelling in-flight search");
        }
        self.is_loading = false;
    }

    fn reset(&mut self) {
        self.cancel_pending();
        self.query_text.clear();
        self.results.clear();
        self.error = None;
    }
}
