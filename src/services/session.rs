//! Session state machine for one dashboard user.
//!
//! Holds the API token, the device list, the selected device and its settings
//! form. Every state carries exactly the data that is valid in it, so a token
//! can never be paired with settings of a device that is no longer selected.

use crate::{
    config::ApiCredentials,
    http_client::is_auth_failure,
    raven_api_client::{Device, DeviceListing, DriverMessage, RavenApi},
    services::settings::{FieldValue, FormError, SettingsForm},
};
use anyhow::Result;
use log::{info, warn};
use serde::Serialize;
use serde_valid::Validate;

const TOKEN_PREVIEW_CHARS: usize = 15;

#[derive(Clone, Debug, Default, PartialEq)]
pub enum SessionState {
    #[default]
    Unauthenticated,
    Authenticated {
        token: String,
    },
    DeviceSelected {
        token: String,
        uuid: String,
    },
    SettingsLoaded {
        token: String,
        uuid: String,
        form: SettingsForm,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    Unauthenticated,
    Authenticated,
    DeviceSelected,
    SettingsLoaded,
}

impl SessionState {
    pub fn phase(&self) -> SessionPhase {
        match self {
            SessionState::Unauthenticated => SessionPhase::Unauthenticated,
            SessionState::Authenticated { .. } => SessionPhase::Authenticated,
            SessionState::DeviceSelected { .. } => SessionPhase::DeviceSelected,
            SessionState::SettingsLoaded { .. } => SessionPhase::SettingsLoaded,
        }
    }

    pub fn token(&self) -> Option<&str> {
        match self {
            SessionState::Unauthenticated => None,
            SessionState::Authenticated { token }
            | SessionState::DeviceSelected { token, .. }
            | SessionState::SettingsLoaded { token, .. } => Some(token),
        }
    }

    pub fn selected_uuid(&self) -> Option<&str> {
        match self {
            SessionState::DeviceSelected { uuid, .. } | SessionState::SettingsLoaded { uuid, .. } => {
                Some(uuid)
            }
            _ => None,
        }
    }

    pub fn form(&self) -> Option<&SettingsForm> {
        match self {
            SessionState::SettingsLoaded { form, .. } => Some(form),
            _ => None,
        }
    }
}

/// Operation attempted in a state that does not allow it
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum PreconditionError {
    #[error("no API token, request one first")]
    TokenRequired,
    #[error("no device selected")]
    DeviceRequired,
    #[error("no settings loaded for the selected device")]
    SettingsRequired,
    #[error("device {0} is not in the device list")]
    UnknownDevice(String),
}

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("invalid driver message: {0}")]
pub struct InvalidMessage(String);

/// Result of a settings save
///
/// The update itself succeeded whenever an outcome is returned. A failed
/// refresh afterwards is reported here rather than as an error.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateOutcome {
    pub message: String,
    pub sections: Vec<String>,
    pub refreshed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_error: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSummary {
    pub phase: SessionPhase,
    pub token_preview: Option<String>,
    pub devices: Vec<Device>,
    pub selected_device: Option<String>,
    pub edited_sections: Vec<&'static str>,
}

pub struct SessionController<C> {
    client: C,
    credentials: ApiCredentials,
    devices: Vec<Device>,
    state: SessionState,
}

impl<C> SessionController<C>
where
    C: RavenApi,
{
    pub fn new(client: C, credentials: ApiCredentials) -> Self {
        Self {
            client,
            credentials,
            devices: Vec::new(),
            state: SessionState::Unauthenticated,
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn devices(&self) -> &[Device] {
        &self.devices
    }

    pub fn summary(&self) -> SessionSummary {
        SessionSummary {
            phase: self.state.phase(),
            token_preview: self.state.token().map(|token| {
                let preview: String = token.chars().take(TOKEN_PREVIEW_CHARS).collect();
                format!("{preview}...")
            }),
            devices: self.devices.clone(),
            selected_device: self.state.selected_uuid().map(String::from),
            edited_sections: self
                .state
                .form()
                .map(|form| form.edited_sections().into_iter().collect())
                .unwrap_or_default(),
        }
    }

    pub fn form(&self) -> Result<&SettingsForm, PreconditionError> {
        self.state.form().ok_or(PreconditionError::SettingsRequired)
    }

    fn token(&self) -> Result<String, PreconditionError> {
        self.state
            .token()
            .map(String::from)
            .ok_or(PreconditionError::TokenRequired)
    }

    fn selection(&self) -> Result<(String, String), PreconditionError> {
        let token = self.token()?;
        let uuid = self
            .state
            .selected_uuid()
            .ok_or(PreconditionError::DeviceRequired)?;

        Ok((token, uuid.to_string()))
    }

    /// Drop the token if the upstream rejected it
    fn check_auth(&mut self, error: anyhow::Error) -> anyhow::Error {
        if is_auth_failure(&error) {
            warn!("API token rejected, session needs a new token: {error:#}");
            self.state = SessionState::Unauthenticated;
        }
        error
    }

    pub async fn request_token(&mut self) -> Result<()> {
        let result = self
            .client
            .request_token(&self.credentials.key, &self.credentials.secret)
            .await;

        match result {
            Ok(token) => {
                info!("API token acquired");
                self.state = SessionState::Authenticated { token };
                Ok(())
            }
            Err(e) => {
                self.state = SessionState::Unauthenticated;
                Err(e)
            }
        }
    }

    pub async fn list_devices(&mut self) -> Result<DeviceListing> {
        let token = self.token()?;
        let result = self.client.list_devices(&token).await;
        let listing = result.map_err(|e| self.check_auth(e))?;

        info!("listed {} device(s)", listing.devices.len());
        self.devices = listing.devices.clone();

        let selection_gone = self
            .state
            .selected_uuid()
            .is_some_and(|uuid| !self.devices.iter().any(|device| device.uuid == uuid));

        if selection_gone {
            warn!("selected device is no longer listed, dropping selection");
            self.state = SessionState::Authenticated { token };
        }

        Ok(listing)
    }

    /// Select a listed device
    ///
    /// Selecting another device drops the settings held for the previous one;
    /// re-selecting the current device keeps them.
    pub fn select_device(&mut self, uuid: &str) -> Result<()> {
        let token = self.token()?;

        if !self.devices.iter().any(|device| device.uuid == uuid) {
            return Err(PreconditionError::UnknownDevice(uuid.to_string()).into());
        }

        if self.state.selected_uuid() == Some(uuid) {
            return Ok(());
        }

        info!("selected device {uuid}");
        self.state = SessionState::DeviceSelected {
            token,
            uuid: uuid.to_string(),
        };

        Ok(())
    }

    /// Fetch the settings of the selected device, discarding pending edits
    pub async fn load_settings(&mut self) -> Result<&SettingsForm> {
        let (token, uuid) = self.selection()?;
        let result = self.client.get_settings(&token, &uuid).await;

        match result {
            Ok(document) => {
                self.state = SessionState::SettingsLoaded {
                    token,
                    uuid,
                    form: SettingsForm::new(document),
                };
                self.form().map_err(Into::into)
            }
            Err(e) => {
                self.state = SessionState::DeviceSelected { token, uuid };
                Err(self.check_auth(e))
            }
        }
    }

    pub fn apply_edit(&mut self, field_id: &str, value: FieldValue) -> Result<()> {
        let SessionState::SettingsLoaded { form, .. } = &mut self.state else {
            return Err(PreconditionError::SettingsRequired.into());
        };

        form.apply_edit(field_id, value)?;
        Ok(())
    }

    pub fn discard_edits(&mut self) -> Result<()> {
        let SessionState::SettingsLoaded { form, .. } = &mut self.state else {
            return Err(PreconditionError::SettingsRequired.into());
        };

        form.discard_edits();
        Ok(())
    }

    /// Submit sections of the form and refresh from the server
    ///
    /// Without an explicit list the edited sections are submitted. After a
    /// successful update the held document is always replaced by a fresh
    /// fetch, never by the payload that was sent.
    pub async fn save_settings(&mut self, sections: Option<Vec<String>>) -> Result<UpdateOutcome> {
        let (token, uuid) = self.selection()?;
        let form = self.form()?;

        let sections = sections.unwrap_or_else(|| {
            form.edited_sections()
                .into_iter()
                .map(String::from)
                .collect()
        });

        if sections.is_empty() {
            return Err(FormError::NothingToSubmit.into());
        }

        let payload = form.assemble_payload(sections.iter().map(String::as_str))?;
        info!("updating sections {} of device {uuid}", sections.join(","));

        let result = self.client.update_settings(&token, &uuid, &payload).await;
        let message = result.map_err(|e| self.check_auth(e))?;

        let refreshed = self.client.get_settings(&token, &uuid).await;

        let outcome = match refreshed {
            Ok(document) => {
                self.state = SessionState::SettingsLoaded {
                    token,
                    uuid,
                    form: SettingsForm::new(document),
                };
                UpdateOutcome {
                    message,
                    sections,
                    refreshed: true,
                    refresh_error: None,
                }
            }
            Err(e) => {
                self.state = SessionState::DeviceSelected { token, uuid };
                let e = self.check_auth(e);
                warn!("failed to refresh settings after update: {e:#}");
                UpdateOutcome {
                    message,
                    sections,
                    refreshed: false,
                    refresh_error: Some(format!("{e:#}")),
                }
            }
        };

        Ok(outcome)
    }

    pub async fn send_message(&mut self, message: DriverMessage) -> Result<String> {
        let (token, uuid) = self.selection()?;

        message
            .validate()
            .map_err(|e| InvalidMessage(e.to_string()))?;

        let result = self.client.send_message(&token, &uuid, &message).await;
        result.map_err(|e| self.check_auth(e))
    }

    pub async fn clear_message(&mut self) -> Result<String> {
        let (token, uuid) = self.selection()?;
        let result = self.client.clear_message(&token, &uuid).await;
        result.map_err(|e| self.check_auth(e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        http_client::HttpStatusError, raven_api_client::MockRavenApi,
        services::settings::SettingsDocument,
    };
    use reqwest::StatusCode;
    use serde_json::{Value, json};

    const TOKEN: &str = "eyJhbGciOiJIUzI1NiJ9.fake-token";

    fn credentials() -> ApiCredentials {
        ApiCredentials {
            key: "key-1".to_string(),
            secret: "secret-1".to_string(),
        }
    }

    fn upstream_error(status: StatusCode) -> anyhow::Error {
        HttpStatusError {
            context: "test request".to_string(),
            status,
            body: "{\"detail\":\"request failed\"}".to_string(),
        }
        .into()
    }

    fn expect_token(api: &mut MockRavenApi) {
        api.expect_request_token()
            .withf(|key, secret| key == "key-1" && secret == "secret-1")
            .times(1)
            .returning(|_, _| Box::pin(async { Ok(TOKEN.to_string()) }));
    }

    fn expect_listing(api: &mut MockRavenApi, uuids: &[&str]) {
        let listing = DeviceListing {
            devices: uuids
                .iter()
                .map(|uuid| Device {
                    uuid: uuid.to_string(),
                    name: format!("Vehicle SN: {uuid}"),
                })
                .collect(),
            warnings: Vec::new(),
        };

        api.expect_list_devices()
            .withf(|token| token == TOKEN)
            .times(1)
            .returning(move |_| {
                let listing = listing.clone();
                Box::pin(async move { Ok(listing) })
            });
    }

    fn expect_settings(api: &mut MockRavenApi, uuid: &'static str, settings: Value) {
        let document = SettingsDocument::try_from(settings).unwrap();

        api.expect_get_settings()
            .withf(move |token, requested| token == TOKEN && requested == uuid)
            .times(1)
            .returning(move |_, _| {
                let document = document.clone();
                Box::pin(async move { Ok(document) })
            });
    }

    fn expect_update(api: &mut MockRavenApi, uuid: &'static str) {
        api.expect_update_settings()
            .withf(move |token, requested, _| token == TOKEN && requested == uuid)
            .times(1)
            .returning(|_, _, _| Box::pin(async { Ok("Settings updated successfully!".to_string()) }));
    }

    fn controller(api: MockRavenApi) -> SessionController<MockRavenApi> {
        SessionController::new(api, credentials())
    }

    async fn selected(uuids: &[&str]) -> SessionController<MockRavenApi> {
        let mut api = MockRavenApi::default();
        expect_token(&mut api);
        expect_listing(&mut api, uuids);

        let mut session = controller(api);
        session.request_token().await.unwrap();
        session.list_devices().await.unwrap();
        session.select_device(uuids[0]).unwrap();
        session
    }

    async fn loaded(uuids: &[&'static str], settings: Value) -> SessionController<MockRavenApi> {
        let mut session = selected(uuids).await;
        expect_settings(&mut session.client, uuids[0], settings);
        session.load_settings().await.unwrap();
        session
    }

    fn precondition(error: &anyhow::Error) -> Option<&PreconditionError> {
        error.downcast_ref::<PreconditionError>()
    }

    mod preconditions {
        use super::*;

        #[tokio::test]
        async fn listing_requires_token() {
            let mut api = MockRavenApi::default();
            api.expect_list_devices().never();
            let mut session = controller(api);

            let error = session.list_devices().await.unwrap_err();

            assert_eq!(precondition(&error), Some(&PreconditionError::TokenRequired));
        }

        #[tokio::test]
        async fn loading_requires_selected_device() {
            let mut api = MockRavenApi::default();
            expect_token(&mut api);
            api.expect_get_settings().never();
            let mut session = controller(api);
            session.request_token().await.unwrap();

            let error = session.load_settings().await.unwrap_err();

            assert_eq!(precondition(&error), Some(&PreconditionError::DeviceRequired));
        }

        #[tokio::test]
        async fn saving_requires_loaded_settings() {
            let mut session = selected(&["a"]).await;
            session.client.expect_update_settings().never();

            let error = session.save_settings(None).await.unwrap_err();

            assert_eq!(
                precondition(&error),
                Some(&PreconditionError::SettingsRequired)
            );
        }

        #[tokio::test]
        async fn selecting_requires_listed_device() {
            let mut api = MockRavenApi::default();
            expect_token(&mut api);
            expect_listing(&mut api, &["a"]);
            let mut session = controller(api);
            session.request_token().await.unwrap();
            session.list_devices().await.unwrap();

            let error = session.select_device("zzz").unwrap_err();

            assert_eq!(
                precondition(&error),
                Some(&PreconditionError::UnknownDevice("zzz".to_string()))
            );
            assert_eq!(session.state().phase(), SessionPhase::Authenticated);
        }

        #[tokio::test]
        async fn message_requires_selected_device() {
            let mut api = MockRavenApi::default();
            expect_token(&mut api);
            api.expect_send_message().never();
            let mut session = controller(api);
            session.request_token().await.unwrap();

            let error = session
                .send_message(DriverMessage {
                    message: "Hi".to_string(),
                    duration: 5,
                })
                .await
                .unwrap_err();

            assert_eq!(precondition(&error), Some(&PreconditionError::DeviceRequired));
        }
    }

    mod transitions {
        use super::*;

        #[tokio::test]
        async fn token_failure_is_unauthenticated() {
            let mut api = MockRavenApi::default();
            api.expect_request_token()
                .times(1)
                .returning(|_, _| {
                    Box::pin(async { Err(upstream_error(StatusCode::INTERNAL_SERVER_ERROR)) })
                });
            let mut session = controller(api);

            assert!(session.request_token().await.is_err());
            assert_eq!(session.state(), &SessionState::Unauthenticated);
        }

        #[tokio::test]
        async fn full_flow_reaches_settings_loaded() {
            let session = loaded(&["a", "b"], json!({"audio": {}})).await;

            assert_eq!(session.state().phase(), SessionPhase::SettingsLoaded);
            assert_eq!(session.devices().len(), 2);
            assert_eq!(session.state().selected_uuid(), Some("a"));
        }

        #[tokio::test]
        async fn selecting_other_device_drops_settings() {
            let mut session = loaded(&["a", "b"], json!({"audio": {}})).await;

            session.select_device("b").unwrap();

            assert_eq!(
                session.state(),
                &SessionState::DeviceSelected {
                    token: TOKEN.to_string(),
                    uuid: "b".to_string()
                }
            );
            assert!(session.form().is_err());
        }

        #[tokio::test]
        async fn reselecting_current_device_keeps_settings() {
            let mut session = loaded(&["a", "b"], json!({"audio": {}})).await;
            session
                .apply_edit("audio.streaming_audio_enabled", FieldValue::Boolean(true))
                .unwrap();

            session.select_device("a").unwrap();

            assert!(session.form().unwrap().is_dirty());
        }

        #[tokio::test]
        async fn new_token_keeps_devices_and_drops_selection() {
            let mut session = loaded(&["a"], json!({})).await;
            expect_token(&mut session.client);

            session.request_token().await.unwrap();

            assert_eq!(session.state().phase(), SessionPhase::Authenticated);
            assert_eq!(session.devices().len(), 1);
        }

        #[tokio::test]
        async fn failed_load_stays_device_selected() {
            let mut session = loaded(&["a"], json!({})).await;
            session
                .client
                .expect_get_settings()
                .times(1)
                .returning(|_, _| {
                    Box::pin(async { Err(upstream_error(StatusCode::INTERNAL_SERVER_ERROR)) })
                });

            assert!(session.load_settings().await.is_err());
            assert_eq!(session.state().phase(), SessionPhase::DeviceSelected);
        }

        #[tokio::test]
        async fn relisting_without_selected_device_drops_selection() {
            let mut session = loaded(&["a"], json!({})).await;
            session
                .client
                .expect_list_devices()
                .times(1)
                .returning(|_| Box::pin(async { Ok(DeviceListing::default()) }));

            session.list_devices().await.unwrap();

            assert_eq!(session.state().phase(), SessionPhase::Authenticated);
            assert!(session.devices().is_empty());
        }

        #[tokio::test]
        async fn auth_failure_clears_token() {
            let mut session = loaded(&["a"], json!({})).await;
            session
                .client
                .expect_list_devices()
                .times(1)
                .returning(|_| Box::pin(async { Err(upstream_error(StatusCode::UNAUTHORIZED)) }));

            assert!(session.list_devices().await.is_err());
            assert_eq!(session.state(), &SessionState::Unauthenticated);
            assert_eq!(session.summary().token_preview, None);
        }

        #[tokio::test]
        async fn forbidden_during_load_clears_token() {
            let mut session = loaded(&["a"], json!({})).await;
            session
                .client
                .expect_get_settings()
                .times(1)
                .returning(|_, _| Box::pin(async { Err(upstream_error(StatusCode::FORBIDDEN)) }));

            assert!(session.load_settings().await.is_err());
            assert_eq!(session.state(), &SessionState::Unauthenticated);
        }
    }

    mod save {
        use super::*;

        #[tokio::test]
        async fn nothing_edited_is_rejected() {
            let mut session = loaded(&["a"], json!({"audio": {}})).await;
            session.client.expect_update_settings().never();

            let error = session.save_settings(None).await.unwrap_err();

            assert_eq!(
                error.downcast_ref::<FormError>(),
                Some(&FormError::NothingToSubmit)
            );
        }

        #[tokio::test]
        async fn submits_edited_sections_only() {
            let mut session = loaded(
                &["a"],
                json!({
                    "audio": {"streaming_audio_enabled": false},
                    "system": {"timezone": "UTC"}
                }),
            )
            .await;
            session
                .apply_edit("audio.streaming_audio_enabled", FieldValue::Boolean(true))
                .unwrap();
            session
                .client
                .expect_update_settings()
                .withf(|_, _, payload| {
                    payload.section("audio").is_some_and(|audio| {
                        audio.get("streaming_audio_enabled") == Some(&json!(true))
                    }) && payload.section("system").is_none()
                })
                .times(1)
                .returning(|_, _, _| Box::pin(async { Ok("Settings updated successfully!".to_string()) }));
            expect_settings(&mut session.client, "a", json!({}));

            let outcome = session.save_settings(None).await.unwrap();

            assert_eq!(outcome.sections, vec!["audio"]);
        }

        #[tokio::test]
        async fn refresh_replaces_document_with_server_response() {
            let mut session = loaded(&["a"], json!({"audio": {"streaming_audio_enabled": false}})).await;
            session
                .apply_edit("audio.streaming_audio_enabled", FieldValue::Boolean(true))
                .unwrap();
            expect_update(&mut session.client, "a");
            expect_settings(
                &mut session.client,
                "a",
                json!({"audio": {"streaming_audio_enabled": false, "volume": 3}}),
            );

            let outcome = session.save_settings(None).await.unwrap();

            assert!(outcome.refreshed);
            assert_eq!(outcome.message, "Settings updated successfully!");
            let form = session.form().unwrap();
            assert!(!form.is_dirty());
            assert_eq!(
                serde_json::to_value(form.document()).unwrap(),
                json!({"audio": {"streaming_audio_enabled": false, "volume": 3}})
            );
        }

        #[tokio::test]
        async fn explicit_sections_are_submitted_without_edits() {
            let mut session = loaded(&["a"], json!({"eld": {"enabled": true}})).await;
            session
                .client
                .expect_update_settings()
                .withf(|_, _, payload| {
                    serde_json::to_value(payload).unwrap() == json!({"eld": {"enabled": true}})
                })
                .times(1)
                .returning(|_, _, _| Box::pin(async { Ok("Settings updated successfully!".to_string()) }));
            expect_settings(&mut session.client, "a", json!({"eld": {"enabled": true}}));

            let outcome = session
                .save_settings(Some(vec!["eld".to_string()]))
                .await
                .unwrap();

            assert_eq!(outcome.sections, vec!["eld"]);
        }

        #[tokio::test]
        async fn failed_update_keeps_edits() {
            let mut session = loaded(&["a"], json!({"audio": {}})).await;
            session
                .apply_edit("audio.audio_notifications_enabled", FieldValue::Boolean(true))
                .unwrap();
            session
                .client
                .expect_update_settings()
                .times(1)
                .returning(|_, _, _| Box::pin(async { Err(upstream_error(StatusCode::BAD_REQUEST)) }));

            let error = session.save_settings(None).await.unwrap_err();

            assert!(error.to_string().contains("request failed"));
            assert_eq!(session.state().phase(), SessionPhase::SettingsLoaded);
            assert!(session.form().unwrap().is_dirty());
        }

        #[tokio::test]
        async fn failed_refresh_is_reported_in_outcome() {
            let mut session = loaded(&["a"], json!({"audio": {}})).await;
            session
                .apply_edit("audio.audio_notifications_enabled", FieldValue::Boolean(true))
                .unwrap();
            expect_update(&mut session.client, "a");
            session
                .client
                .expect_get_settings()
                .times(1)
                .returning(|_, _| {
                    Box::pin(async { Err(upstream_error(StatusCode::SERVICE_UNAVAILABLE)) })
                });
            expect_settings(&mut session.client, "a", json!({"audio": {}}));

            let outcome = session.save_settings(None).await.unwrap();

            assert!(!outcome.refreshed);
            assert!(outcome.refresh_error.is_some());
            assert_eq!(session.state().phase(), SessionPhase::DeviceSelected);

            session.load_settings().await.unwrap();
            assert_eq!(session.state().phase(), SessionPhase::SettingsLoaded);
        }
    }

    mod messages {
        use super::*;

        #[tokio::test]
        async fn valid_message_is_sent() {
            let mut session = loaded(&["a"], json!({})).await;
            session
                .client
                .expect_send_message()
                .withf(|token, uuid, message| {
                    token == TOKEN
                        && uuid == "a"
                        && message.message == "Call dispatch"
                        && message.duration == 300
                })
                .times(1)
                .returning(|_, _, _| Box::pin(async { Ok("Message sent successfully!".to_string()) }));

            let message = session
                .send_message(DriverMessage {
                    message: "Call dispatch".to_string(),
                    duration: 300,
                })
                .await
                .unwrap();

            assert_eq!(message, "Message sent successfully!");
        }

        #[tokio::test]
        async fn long_message_is_rejected_before_any_request() {
            let mut session = loaded(&["a"], json!({})).await;
            session.client.expect_send_message().never();

            let error = session
                .send_message(DriverMessage {
                    message: "this is far too long".to_string(),
                    duration: 300,
                })
                .await
                .unwrap_err();

            assert!(error.downcast_ref::<InvalidMessage>().is_some());
        }

        #[tokio::test]
        async fn zero_duration_is_rejected() {
            let mut session = loaded(&["a"], json!({})).await;
            session.client.expect_send_message().never();

            let error = session
                .send_message(DriverMessage {
                    message: "Stop".to_string(),
                    duration: 0,
                })
                .await
                .unwrap_err();

            assert!(error.downcast_ref::<InvalidMessage>().is_some());
        }

        #[tokio::test]
        async fn clear_works_without_loaded_settings() {
            let mut session = selected(&["a"]).await;
            session
                .client
                .expect_clear_message()
                .withf(|token, uuid| token == TOKEN && uuid == "a")
                .times(1)
                .returning(|_, _| {
                    Box::pin(async { Ok("Clear message request sent successfully!".to_string()) })
                });

            let message = session.clear_message().await.unwrap();

            assert_eq!(message, "Clear message request sent successfully!");
        }
    }

    mod summary {
        use super::*;

        #[tokio::test]
        async fn token_is_previewed_not_exposed() {
            let mut api = MockRavenApi::default();
            expect_token(&mut api);
            let mut session = controller(api);
            session.request_token().await.unwrap();

            let summary = session.summary();

            assert_eq!(summary.phase, SessionPhase::Authenticated);
            assert_eq!(
                summary.token_preview.as_deref(),
                Some("eyJhbGciOiJIUzI...")
            );
        }

        #[tokio::test]
        async fn lists_edited_sections() {
            let mut session = loaded(&["a"], json!({})).await;
            session
                .apply_edit("obd.canbus_enabled", FieldValue::Boolean(true))
                .unwrap();
            session
                .apply_edit("audio.streaming_audio_enabled", FieldValue::Boolean(true))
                .unwrap();

            let summary = session.summary();

            assert_eq!(summary.selected_device.as_deref(), Some("a"));
            assert_eq!(summary.edited_sections, vec!["audio", "obd"]);
        }
    }
}
