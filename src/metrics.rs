//! Pre-aggregated dashboard metrics.
//!
//! Both endpoints answer `{ "items": [...] }`. A missing `items` is an empty
//! series, and so is any network, status or parse failure: the failure is
//! written to the event log and the chart renders empty.

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::activity::events::EventLog;
use crate::api::ApiClient;
use crate::identity::UserId;

/// Total expenses for one quarter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuarterPoint {
    pub period: String,
    pub total: f64,
}

/// Number of crops registered on one parcel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParcelPoint {
    pub parcel: String,
    pub crop_count: u64,
}

// Wire shapes.

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    items: Option<Vec<T>>,
}

#[derive(Debug, Deserialize)]
struct WireQuarter {
    trimestre: String,
    #[serde(default)]
    total: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct WireParcel {
    parcela: String,
    #[serde(default)]
    cultivos: Option<u64>,
}

impl From<WireQuarter> for QuarterPoint {
    fn from(w: WireQuarter) -> Self {
        Self {
            period: w.trimestre,
            total: w.total.unwrap_or(0.0),
        }
    }
}

impl From<WireParcel> for ParcelPoint {
    fn from(w: WireParcel) -> Self {
        Self {
            parcel: w.parcela,
            crop_count: w.cultivos.unwrap_or(0),
        }
    }
}

pub fn quarterly_expenses_path(user_id: UserId) -> String {
    format!("/metrics/gastos-trimestrales/{user_id}")
}

pub fn parcel_crop_counts_path(user_id: UserId) -> String {
    format!("/metrics/parcelas-cultivos/{user_id}")
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// Fetches the two dashboard series.
#[derive(Debug, Clone)]
pub struct MetricsClient {
    api: ApiClient,
    log: EventLog,
}

impl MetricsClient {
    pub fn new(api: ApiClient, log: EventLog) -> Self {
        Self { api, log }
    }

    /// Quarterly expense totals for `user_id`, empty on any failure.
    pub fn fetch_quarterly_expenses(&self, user_id: UserId) -> Vec<QuarterPoint> {
        let path = quarterly_expenses_path(user_id);
        self.try_fetch_quarterly_expenses(user_id)
            .unwrap_or_else(|e| {
                self.log.metrics_fetch_failed(&path, user_id, &e);
                Vec::new()
            })
    }

    /// Crop counts per parcel for `user_id`, empty on any failure.
    pub fn fetch_parcel_crop_counts(&self, user_id: UserId) -> Vec<ParcelPoint> {
        let path = parcel_crop_counts_path(user_id);
        self.try_fetch_parcel_crop_counts(user_id)
            .unwrap_or_else(|e| {
                self.log.metrics_fetch_failed(&path, user_id, &e);
                Vec::new()
            })
    }

    pub fn try_fetch_quarterly_expenses(&self, user_id: UserId) -> Result<Vec<QuarterPoint>> {
        let envelope: Envelope<WireQuarter> =
            self.api.get_json(&quarterly_expenses_path(user_id))?;
        Ok(envelope
            .items
            .unwrap_or_default()
            .into_iter()
            .map(QuarterPoint::from)
            .collect())
    }

    pub fn try_fetch_parcel_crop_counts(&self, user_id: UserId) -> Result<Vec<ParcelPoint>> {
        let envelope: Envelope<WireParcel> =
            self.api.get_json(&parcel_crop_counts_path(user_id))?;
        Ok(envelope
            .items
            .unwrap_or_default()
            .into_iter()
            .map(ParcelPoint::from)
            .collect())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
