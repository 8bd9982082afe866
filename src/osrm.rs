//! OSRM HTTP adapter for leg matrices.
//!
//! Hosts that want road-network distances call this before planning; the
//! engine only sees the resulting `LegMatrix`. Any failure degrades to the
//! great-circle estimate.

use serde::Deserialize;

use crate::haversine::HaversineMatrix;
use crate::matrix::LegMatrix;
use crate::model::Coordinates;
use crate::traits::DistanceMatrixProvider;

const METERS_PER_MILE: f64 = 1609.344;

#[derive(Debug, Clone)]
pub struct OsrmConfig {
    pub base_url: String,
    pub profile: String,
    pub timeout_secs: u64,
}

impl Default for OsrmConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:5000".to_string(),
            profile: "driving".to_string(),
            timeout_secs: 10,
        }
    }
}

#[derive(Debug, Clone)]
pub struct OsrmClient {
    config: OsrmConfig,
    client: reqwest::blocking::Client,
    fallback: HaversineMatrix,
}

impl OsrmClient {
    pub fn new(config: OsrmConfig) -> Result<Self, reqwest::Error> {
        let client = reqwest::blocking::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            config,
            client,
            fallback: HaversineMatrix::default(),
        })
    }

    fn table_url(&self, locations: &[Coordinates], avoid_tolls: bool) -> String {
        let coords = locations
            .iter()
            .map(|c| format!("{:.6},{:.6}", c.lng, c.lat))
            .collect::<Vec<_>>()
            .join(";");

        let mut url = format!(
            "{}/table/v1/{}/{}?annotations=duration,distance",
            self.config.base_url, self.config.profile, coords
        );
        if avoid_tolls {
            url.push_str("&exclude=toll");
        }
        url
    }

    fn fetch_table(&self, locations: &[Coordinates], avoid_tolls: bool) -> Result<OsrmTableResponse, reqwest::Error> {
        self.client
            .get(self.table_url(locations, avoid_tolls))
            .send()
            .and_then(|resp| resp.error_for_status())
            .and_then(|resp| resp.json::<OsrmTableResponse>())
    }
}

impl DistanceMatrixProvider for OsrmClient {
    fn matrix_for(&self, locations: &[Coordinates], avoid_tolls: bool) -> LegMatrix {
        if locations.is_empty() {
            return LegMatrix::empty();
        }

        let body = match self.fetch_table(locations, avoid_tolls) {
            Ok(body) => body,
            Err(err) => {
                tracing::warn!(error = %err, "OSRM table request failed, using great-circle estimates");
                return self.fallback.matrix_for(locations, avoid_tolls);
            }
        };

        let (Some(durations), Some(distances)) = (body.durations, body.distances) else {
            tracing::warn!(code = %body.code, "OSRM table response incomplete, using great-circle estimates");
            return self.fallback.matrix_for(locations, avoid_tolls);
        };
        if durations.len() != locations.len() || distances.len() != locations.len() {
            tracing::warn!("OSRM table size mismatch, using great-circle estimates");
            return self.fallback.matrix_for(locations, avoid_tolls);
        }

        let n = locations.len();
        let mut miles = vec![vec![0.0; n]; n];
        let mut hours = vec![vec![0.0; n]; n];
        for i in 0..n {
            for j in 0..n {
                if i == j {
                    continue;
                }
                let seconds = durations[i].get(j).copied().flatten();
                let meters = distances[i].get(j).copied().flatten();
                match (seconds, meters) {
                    (Some(seconds), Some(meters)) => {
                        hours[i][j] = seconds / 3600.0;
                        miles[i][j] = meters / METERS_PER_MILE;
                    }
                    // Unroutable pair (e.g. snapped to a disconnected road).
                    _ => {
                        let leg = self.fallback.estimate(locations[i], locations[j]);
                        hours[i][j] = leg.hours;
                        miles[i][j] = leg.miles;
                    }
                }
            }
        }

        LegMatrix::new(locations, miles, hours)
    }
}

#[derive(Debug, Deserialize)]
struct OsrmTableResponse {
    #[serde(default)]
    code: String,
    durations: Option<Vec<Vec<Option<f64>>>>,
    distances: Option<Vec<Vec<Option<f64>>>>,
}
