use crate::{
    config::RequestTimeouts,
    http_client::handle_http_response,
    services::settings::{SettingsDocument, UpdatePayload},
    vehicle_lookup::VehicleLookup,
};
use anyhow::{Context, Result};
use futures_util::future::join_all;
use log::{debug, info, warn};
#[cfg(any(test, feature = "mock"))]
use mockall::automock;
use reqwest::{Client, RequestBuilder, header::ACCEPT};
use serde::{Deserialize, Serialize};
use serde_valid::Validate;
use std::time::Duration;
use trait_variant::make;

const NOT_AVAILABLE: &str = "N/A";

#[derive(Serialize)]
struct TokenRequest<'a> {
    api_key: ApiKey<'a>,
}

#[derive(Serialize)]
struct ApiKey<'a> {
    key: &'a str,
    secret: &'a str,
}

#[derive(Deserialize)]
struct TokenResponse {
    token: Option<String>,
}

#[derive(Deserialize)]
struct RavenList {
    #[serde(default)]
    results: Vec<RavenRecord>,
}

#[derive(Deserialize)]
struct RavenRecord {
    uuid: Option<String>,
    enclosure_serial_no: Option<String>,
    vin: Option<String>,
}

/// Device as offered for selection
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Device {
    pub uuid: String,
    pub name: String,
}

/// Result of a device listing
///
/// Vehicle lookups that failed do not fail the listing; they are reported
/// here instead.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct DeviceListing {
    pub devices: Vec<Device>,
    pub warnings: Vec<String>,
}

/// One-time message shown on the driver's screen
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct DriverMessage {
    #[validate(min_length = 1)]
    #[validate(max_length = 15)]
    pub message: String,
    /// Seconds the message stays on screen
    #[validate(minimum = 1)]
    pub duration: u64,
}

#[make(Send)]
#[cfg_attr(any(test, feature = "mock"), automock)]
pub trait RavenApi {
    async fn request_token(&self, key: &str, secret: &str) -> Result<String>;
    async fn list_devices(&self, token: &str) -> Result<DeviceListing>;
    async fn get_settings(&self, token: &str, uuid: &str) -> Result<SettingsDocument>;
    async fn update_settings(
        &self,
        token: &str,
        uuid: &str,
        payload: &UpdatePayload,
    ) -> Result<String>;
    async fn send_message(&self, token: &str, uuid: &str, message: &DriverMessage)
    -> Result<String>;
    async fn clear_message(&self, token: &str, uuid: &str) -> Result<String>;
}

#[derive(Clone)]
pub struct RavenApiClient<V> {
    client: Client,
    domain: String,
    timeouts: RequestTimeouts,
    vehicle_lookup: V,
}

impl<V> RavenApiClient<V>
where
    V: VehicleLookup + Sync,
{
    // API endpoint constants
    const TOKEN_ENDPOINT: &str = "/auth/token";
    const RAVENS_ENDPOINT: &str = "/ravens";

    pub fn new(client: Client, domain: &str, timeouts: RequestTimeouts, vehicle_lookup: V) -> Self {
        RavenApiClient {
            client,
            domain: domain.trim_end_matches('/').to_string(),
            timeouts,
            vehicle_lookup,
        }
    }

    fn build_url(&self, path: &str) -> String {
        // Normalize path to always start with a single "/"
        let normalized_path = path.trim_start_matches('/');
        format!("{}/{normalized_path}", self.domain)
    }

    fn settings_endpoint(uuid: &str) -> String {
        format!("{}/{uuid}/settings", Self::RAVENS_ENDPOINT)
    }

    fn driver_message_endpoint(uuid: &str) -> String {
        format!("{}/{uuid}/driver-message", Self::RAVENS_ENDPOINT)
    }

    fn authorized(request: RequestBuilder, token: &str, timeout: Duration) -> RequestBuilder {
        request
            .bearer_auth(token)
            .header(ACCEPT, "application/json")
            .timeout(timeout)
    }

    async fn send(request: RequestBuilder, context_msg: &str) -> Result<String> {
        let res = request
            .send()
            .await
            .context(format!("failed to send {context_msg} request"))?;

        handle_http_response(res, context_msg).await
    }

    /// Display name for a listed device, plus a warning if the VIN lookup failed
    async fn device_name(&self, record: &RavenRecord) -> (String, Option<String>) {
        let serial = record
            .enclosure_serial_no
            .as_deref()
            .filter(|serial| !serial.is_empty())
            .unwrap_or(NOT_AVAILABLE);
        let fallback = format!("Vehicle SN: {serial}");

        let Some(vin) = record
            .vin
            .as_deref()
            .map(str::trim)
            .filter(|vin| !vin.is_empty())
        else {
            return (fallback, None);
        };

        match self.vehicle_lookup.decode_vin(vin).await {
            Ok(vehicle) => (vehicle.display_name().unwrap_or(fallback), None),
            Err(e) => {
                let warning = format!("could not look up VIN {vin}: {e:#}");
                warn!("{warning}");
                (fallback, Some(warning))
            }
        }
    }
}

impl<V> RavenApi for RavenApiClient<V>
where
    V: VehicleLookup + Sync,
{
    async fn request_token(&self, key: &str, secret: &str) -> Result<String> {
        let url = self.build_url(Self::TOKEN_ENDPOINT);
        info!("POST {url}");

        let request = self
            .client
            .post(&url)
            .header(ACCEPT, "application/json")
            .timeout(self.timeouts.default)
            .json(&TokenRequest {
                api_key: ApiKey { key, secret },
            });

        let body = Self::send(request, &format!("POST {url}")).await?;
        let response: TokenResponse =
            serde_json::from_str(&body).context("failed to parse token response")?;

        response
            .token
            .filter(|token| !token.is_empty())
            .context("failed to get token: response did not contain one")
    }

    async fn list_devices(&self, token: &str) -> Result<DeviceListing> {
        let url = self.build_url(Self::RAVENS_ENDPOINT);
        info!("GET {url}");

        let request = Self::authorized(self.client.get(&url), token, self.timeouts.default);
        let body = Self::send(request, &format!("GET {url}")).await?;
        let list: RavenList = serde_json::from_str(&body).context("failed to parse device list")?;

        let mut listing = DeviceListing::default();
        let mut records = Vec::with_capacity(list.results.len());

        for record in list.results {
            match record.uuid.clone().filter(|uuid| !uuid.is_empty()) {
                Some(uuid) => records.push((uuid, record)),
                None => {
                    let serial = record.enclosure_serial_no.as_deref().unwrap_or(NOT_AVAILABLE);
                    let warning = format!("skipped device without uuid (SN: {serial})");
                    warn!("{warning}");
                    listing.warnings.push(warning);
                }
            }
        }

        // lookups run concurrently, a failing one only affects its own device
        let names = join_all(records.iter().map(|(_, record)| self.device_name(record))).await;

        for ((uuid, _), (name, warning)) in records.into_iter().zip(names) {
            info!("found: {name} (UUID: {uuid})");
            listing.warnings.extend(warning);
            listing.devices.push(Device { uuid, name });
        }

        Ok(listing)
    }

    async fn get_settings(&self, token: &str, uuid: &str) -> Result<SettingsDocument> {
        let url = self.build_url(&Self::settings_endpoint(uuid));
        info!("GET {url}");

        let request = Self::authorized(self.client.get(&url), token, self.timeouts.default);
        let body = Self::send(request, &format!("GET {url}")).await?;
        let value: serde_json::Value =
            serde_json::from_str(&body).context("failed to parse settings")?;

        SettingsDocument::try_from(value)
    }

    async fn update_settings(
        &self,
        token: &str,
        uuid: &str,
        payload: &UpdatePayload,
    ) -> Result<String> {
        let url = self.build_url(&Self::settings_endpoint(uuid));
        info!("PATCH {url}");
        debug!(
            "PATCH {url} with sections: {}",
            payload.section_names().collect::<Vec<_>>().join(",")
        );

        let request =
            Self::authorized(self.client.patch(&url), token, self.timeouts.update).json(payload);
        Self::send(request, &format!("PATCH {url}")).await?;

        Ok("Settings updated successfully!".to_string())
    }

    async fn send_message(
        &self,
        token: &str,
        uuid: &str,
        message: &DriverMessage,
    ) -> Result<String> {
        let url = self.build_url(&Self::driver_message_endpoint(uuid));
        info!("POST {url} with duration: {}s", message.duration);

        let request =
            Self::authorized(self.client.post(&url), token, self.timeouts.default).json(message);
        Self::send(request, &format!("POST {url}")).await?;

        Ok("Message sent successfully!".to_string())
    }

    async fn clear_message(&self, token: &str, uuid: &str) -> Result<String> {
        let url = self.build_url(&Self::driver_message_endpoint(uuid));
        info!("DELETE {url}");

        let request = Self::authorized(self.client.delete(&url), token, self.timeouts.default);
        Self::send(request, &format!("DELETE {url}")).await?;

        Ok("Clear message request sent successfully!".to_string())
    }
}
