//! Dashboard composer: session → user id → metrics → charts.
//!
//! A load is split in three steps so the network part can run anywhere:
//!
//! 1. [`DashboardComposer::begin_load`] resolves the identifier and hands out
//!    a [`LoadTicket`] tagged with it and a generation number.
//! 2. [`LoadTicket::fetch`] performs both fetches (no `&mut` access needed).
//! 3. [`DashboardComposer::apply`] accepts the result only if the ticket is
//!    still the latest one for the current identifier, so a late response for
//!    a superseded user never overwrites the display.
//!
//! When the token yields no identifier the composer still fetches, using the
//! sentinel id, and ends in [`DashboardState::Unidentified`]. It never waits
//! for an identity to appear.

use serde::Serialize;

use crate::identity::{self, UserId};
use crate::metrics::{MetricsClient, ParcelPoint, QuarterPoint};
use crate::session::SessionStore;

/// Observable state of the dashboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DashboardState {
    /// No load applied yet, or one is in flight.
    Loading,
    /// Data applied for an identified user (series may be empty).
    Ready,
    /// Data applied for the sentinel id because the session had no user id.
    Unidentified,
}

/// A pending load, tagged with what it was issued for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadTicket {
    generation: u64,
    user_id: Option<UserId>,
    target: UserId,
}

impl LoadTicket {
    /// The identifier the metrics are requested for.
    pub fn target(&self) -> UserId {
        self.target
    }

    pub fn user_id(&self) -> Option<UserId> {
        self.user_id
    }

    /// Perform both fetches. Each series fails independently to empty.
    pub fn fetch(self, metrics: &MetricsClient) -> Fetched {
        Fetched {
            ticket: self,
            quarterly: metrics.fetch_quarterly_expenses(self.target),
            parcels: metrics.fetch_parcel_crop_counts(self.target),
        }
    }
}

/// Result of a [`LoadTicket::fetch`].
#[derive(Debug, Clone)]
pub struct Fetched {
    pub ticket: LoadTicket,
    pub quarterly: Vec<QuarterPoint>,
    pub parcels: Vec<ParcelPoint>,
}

/// Snapshot handed to the chart renderers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardView {
    pub state: DashboardState,
    pub user_id: Option<UserId>,
    pub quarterly_expenses: Vec<QuarterPoint>,
    pub parcel_crops: Vec<ParcelPoint>,
}

#[derive(Debug)]
pub struct DashboardComposer {
    sentinel: UserId,
    state: DashboardState,
    generation: u64,
    current_user: Option<UserId>,
    loaded_for: Option<Option<UserId>>,
    quarterly: Vec<QuarterPoint>,
    parcels: Vec<ParcelPoint>,
}

impl DashboardComposer {
    pub fn new(sentinel: UserId) -> Self {
        Self {
            sentinel,
            state: DashboardState::Loading,
            generation: 0,
            current_user: None,
            loaded_for: None,
            quarterly: Vec::new(),
            parcels: Vec::new(),
        }
    }

    pub fn state(&self) -> DashboardState {
        self.state
    }

    /// Identifier resolved by the latest [`begin_load`](Self::begin_load).
    pub fn current_user(&self) -> Option<UserId> {
        self.current_user
    }

    /// Resolve the identifier from the session and start a load.
    ///
    /// Any ticket handed out earlier becomes stale.
    pub fn begin_load(&mut self, session: &dyn SessionStore) -> LoadTicket {
        let user_id = identity::extract_user_id(session.read().as_deref());
        self.generation += 1;
        self.current_user = user_id;
        self.state = DashboardState::Loading;
        LoadTicket {
            generation: self.generation,
            user_id,
            target: user_id.unwrap_or(self.sentinel),
        }
    }

    /// Apply fetched data. Returns `false` (and changes nothing) for a stale
    /// ticket.
    pub fn apply(&mut self, fetched: Fetched) -> bool {
        let ticket = fetched.ticket;
        if ticket.generation != self.generation || ticket.user_id != self.current_user {
            return false;
        }

        self.quarterly = fetched.quarterly;
        self.parcels = fetched.parcels;
        self.loaded_for = Some(ticket.user_id);
        self.state = match ticket.user_id {
            Some(_) => DashboardState::Ready,
            None => DashboardState::Unidentified,
        };
        true
    }

    /// Load unconditionally: one fetch per series.
    pub fn refresh(&mut self, session: &dyn SessionStore, metrics: &MetricsClient) -> DashboardView {
        let ticket = self.begin_load(session);
        self.apply(ticket.fetch(metrics));
        self.view()
    }

    /// Load only if the resolved identifier differs from the one the current
    /// data was loaded for (or nothing has been loaded yet).
    pub fn refresh_if_changed(
        &mut self,
        session: &dyn SessionStore,
        metrics: &MetricsClient,
    ) -> DashboardView {
        let user_id = identity::extract_user_id(session.read().as_deref());
        if self.loaded_for == Some(user_id) && self.state != DashboardState::Loading {
            return self.view();
        }
        self.refresh(session, metrics)
    }

    pub fn view(&self) -> DashboardView {
        DashboardView {
            state: self.state,
            user_id: self.current_user,
            quarterly_expenses: self.quarterly.clone(),
            parcel_crops: self.parcels.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activity::events::EventLog;
    use crate::api::ApiClient;
    use crate::session::MemorySessionStore;
    use base64::Engine as _;
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;

    fn token_for(sub: &str) -> String {
        format!("h.{}.s", URL_SAFE_NO_PAD.encode(format!(r#"{{"sub":"{sub}"}}"#)))
    }

    fn unreachable_metrics() -> MetricsClient {
        let api = ApiClient::new("http://127.0.0.1:1", std::time::Duration::from_secs(2));
        MetricsClient::new(api, EventLog::disabled())
    }

    fn fetched(ticket: LoadTicket, period: &str) -> Fetched {
        Fetched {
            ticket,
            quarterly: vec![QuarterPoint {
                period: period.to_string(),
                total: 1.0,
            }],
            parcels: Vec::new(),
        }
    }

    #[test]
    fn starts_loading() {
        let composer = DashboardComposer::new(0);
        assert_eq!(composer.state(), DashboardState::Loading);
        assert!(composer.view().quarterly_expenses.is_empty());
    }

    #[test]
    fn ticket_targets_sentinel_without_identity() {
        let mut composer = DashboardComposer::new(0);
        let ticket = composer.begin_load(&MemorySessionStore::new());
        assert_eq!(ticket.user_id(), None);
        assert_eq!(ticket.target(), 0);

        let ticket = composer.begin_load(&MemorySessionStore::with_token(token_for("42")));
        assert_eq!(ticket.user_id(), Some(42));
        assert_eq!(ticket.target(), 42);
    }

    #[test]
    fn stale_ticket_is_dropped() {
        let mut composer = DashboardComposer::new(0);
        let first = composer.begin_load(&MemorySessionStore::with_token(token_for("1")));
        let second = composer.begin_load(&MemorySessionStore::with_token(token_for("2")));

        assert!(composer.apply(fetched(second, "Q2")));
        assert!(!composer.apply(fetched(first, "Q1")));

        let view = composer.view();
        assert_eq!(view.user_id, Some(2));
        assert_eq!(view.quarterly_expenses[0].period, "Q2");
        assert_eq!(view.state, DashboardState::Ready);
    }

    #[test]
    fn unreachable_api_still_renders_empty_charts() {
        let mut composer = DashboardComposer::new(0);
        let metrics = unreachable_metrics();

        let view = composer.refresh(&MemorySessionStore::with_token("garbage"), &metrics);
        assert_eq!(view.state, DashboardState::Unidentified);
        assert!(view.quarterly_expenses.is_empty());
        assert!(view.parcel_crops.is_empty());

        let view = composer.refresh(&MemorySessionStore::with_token(token_for("5")), &metrics);
        assert_eq!(view.state, DashboardState::Ready);
        assert_eq!(view.user_id, Some(5));
    }

    #[test]
    fn view_serializes_for_charts() {
        let composer = DashboardComposer::new(0);
        let json = serde_json::to_value(composer.view()).unwrap();
        assert_eq!(json["state"], "loading");
        assert!(json["user_id"].is_null());
        assert!(json["quarterly_expenses"].as_array().unwrap().is_empty());
    }
}
