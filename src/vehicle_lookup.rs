use crate::{config::VehicleLookupConfig, http_client::handle_http_response};
use anyhow::{Context, Result};
use log::info;
#[cfg(any(test, feature = "mock"))]
use mockall::automock;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use trait_variant::make;

const NOT_AVAILABLE: &str = "N/A";

/// Vehicle identity as decoded from a VIN
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct VehicleInfo {
    pub make: Option<String>,
    pub model: Option<String>,
    pub year: Option<String>,
}

impl VehicleInfo {
    /// Human readable "{year} {make} {model}", skipping unknown parts
    ///
    /// Returns `None` if nothing useful was decoded.
    pub fn display_name(&self) -> Option<String> {
        let parts: Vec<&str> = [&self.year, &self.make, &self.model]
            .into_iter()
            .filter_map(|part| part.as_deref().map(str::trim))
            .filter(|part| !part.is_empty() && *part != NOT_AVAILABLE)
            .collect();

        (!parts.is_empty()).then(|| parts.join(" "))
    }
}

#[make(Send)]
#[cfg_attr(any(test, feature = "mock"), automock)]
pub trait VehicleLookup {
    async fn decode_vin(&self, vin: &str) -> Result<VehicleInfo>;
}

#[derive(Deserialize)]
struct DecodeVinResponse {
    #[serde(rename = "Results", default)]
    results: Vec<DecodeVinVariable>,
}

#[derive(Deserialize)]
struct DecodeVinVariable {
    #[serde(rename = "Variable")]
    variable: Option<String>,
    #[serde(rename = "Value")]
    value: Option<String>,
}

impl From<DecodeVinResponse> for VehicleInfo {
    fn from(response: DecodeVinResponse) -> Self {
        let mut info = VehicleInfo::default();

        for DecodeVinVariable { variable, value } in response.results {
            match variable.as_deref() {
                Some("Make") => info.make = value,
                Some("Model") => info.model = value,
                Some("Model Year") => info.year = value,
                _ => {}
            }
        }

        info
    }
}

/// VIN decoder backed by the NHTSA vPIC service
#[derive(Clone)]
pub struct NhtsaVehicleLookup {
    client: Client,
    base_url: String,
    timeout: Duration,
}

impl NhtsaVehicleLookup {
    pub fn new(client: Client, config: &VehicleLookupConfig, timeout: Duration) -> Self {
        Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            timeout,
        }
    }

    fn build_url(&self, vin: &str) -> String {
        format!("{}/{}?format=json", self.base_url, vin.trim())
    }
}

impl VehicleLookup for NhtsaVehicleLookup {
    async fn decode_vin(&self, vin: &str) -> Result<VehicleInfo> {
        let url = self.build_url(vin);
        info!("GET {url}");

        let res = self
            .client
            .get(&url)
            .timeout(self.timeout)
            .send()
            .await
            .context(format!("failed to send GET request to {url}"))?;

        let body = handle_http_response(res, &format!("GET {url}")).await?;
        let response: DecodeVinResponse =
            serde_json::from_str(&body).context("failed to parse VIN decode response")?;

        Ok(response.into())
    }
}
