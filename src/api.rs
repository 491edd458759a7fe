use crate::{
    http_client::HttpStatusError,
    raven_api_client::{DriverMessage, RavenApi},
    services::{
        session::{InvalidMessage, PreconditionError, SessionController},
        settings::{
            FieldDescriptor, FieldValue, FormError, SettingsForm,
            schema::{self, SectionSpec},
        },
    },
};
use actix_web::{HttpResponse, Responder, http::StatusCode, web};
use anyhow::Result;
use log::{debug, error, warn};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveSettingsPayload {
    sections: Option<Vec<String>>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SectionView {
    section: SectionSpec,
    fields: Vec<FieldDescriptor>,
    passthrough_keys: Vec<String>,
}

#[derive(Serialize)]
struct MessageResponse {
    message: String,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

/// Dashboard HTTP interface on top of the single per-process session
pub struct Api<Client>
where
    Client: RavenApi,
{
    session: Mutex<SessionController<Client>>,
}

impl<Client> Api<Client>
where
    Client: RavenApi + 'static,
{
    pub fn new(session: SessionController<Client>) -> Self {
        Api {
            session: Mutex::new(session),
        }
    }

    pub fn configure(cfg: &mut web::ServiceConfig) {
        cfg.route("/version", web::get().to(Self::version))
            .route("/session", web::get().to(Self::session))
            .route("/token", web::post().to(Self::token))
            .route("/devices", web::get().to(Self::devices))
            .route("/devices/{uuid}/select", web::post().to(Self::select_device))
            .route("/settings/load", web::post().to(Self::load_settings))
            .route("/settings", web::get().to(Self::settings))
            .route("/settings/sections", web::get().to(Self::sections))
            .route("/settings/sections/{section}", web::get().to(Self::section))
            .route("/settings/fields/{field_id}", web::put().to(Self::apply_edit))
            .route("/settings/edits", web::delete().to(Self::discard_edits))
            .route("/settings/save", web::post().to(Self::save_settings))
            .route("/driver-message", web::post().to(Self::send_message))
            .route("/driver-message", web::delete().to(Self::clear_message));
    }

    pub async fn version() -> impl Responder {
        HttpResponse::Ok().body(env!("CARGO_PKG_VERSION"))
    }

    pub async fn session(api: web::Data<Self>) -> impl Responder {
        debug!("session() called");
        HttpResponse::Ok().json(api.session.lock().await.summary())
    }

    pub async fn token(api: web::Data<Self>) -> impl Responder {
        debug!("token() called");

        let mut session = api.session.lock().await;
        let result = session.request_token().await.map(|_| session.summary());

        handle_service_result(result, "token")
    }

    pub async fn devices(api: web::Data<Self>) -> impl Responder {
        debug!("devices() called");
        handle_service_result(api.session.lock().await.list_devices().await, "devices")
    }

    pub async fn select_device(path: web::Path<String>, api: web::Data<Self>) -> impl Responder {
        let uuid = path.into_inner();
        debug!("select_device() called with uuid: {uuid}");

        let mut session = api.session.lock().await;
        let result = session.select_device(&uuid).map(|_| session.summary());

        handle_service_result(result, "select_device")
    }

    pub async fn load_settings(api: web::Data<Self>) -> impl Responder {
        debug!("load_settings() called");

        let mut session = api.session.lock().await;
        let result = session
            .load_settings()
            .await
            .map(|form| form.document().clone());

        handle_service_result(result, "load_settings")
    }

    pub async fn settings(api: web::Data<Self>) -> impl Responder {
        debug!("settings() called");

        let session = api.session.lock().await;
        let result = session
            .form()
            .map(|form| form.document().clone())
            .map_err(Into::into);

        handle_service_result(result, "settings")
    }

    pub async fn sections() -> impl Responder {
        HttpResponse::Ok().json(schema::SECTIONS)
    }

    pub async fn section(path: web::Path<String>, api: web::Data<Self>) -> impl Responder {
        let name = path.into_inner();
        debug!("section() called with section: {name}");

        let session = api.session.lock().await;
        let result = session
            .form()
            .map_err(Into::into)
            .and_then(|form| section_view(form, &name));

        handle_service_result(result, "section")
    }

    pub async fn apply_edit(
        path: web::Path<String>,
        body: web::Json<FieldValue>,
        api: web::Data<Self>,
    ) -> impl Responder {
        let field_id = path.into_inner();
        debug!("apply_edit() called for field: {field_id}");

        let mut session = api.session.lock().await;
        let result = session
            .apply_edit(&field_id, body.into_inner())
            .and_then(|_| {
                let section = schema::field(&field_id)
                    .map(|field| field.section)
                    .ok_or_else(|| FormError::UnknownField(field_id.clone()))?;
                section_view(session.form()?, section)
            });

        handle_service_result(result, "apply_edit")
    }

    pub async fn discard_edits(api: web::Data<Self>) -> impl Responder {
        debug!("discard_edits() called");

        let mut session = api.session.lock().await;
        let result = session.discard_edits().map(|_| session.summary());

        handle_service_result(result, "discard_edits")
    }

    pub async fn save_settings(
        body: Option<web::Json<SaveSettingsPayload>>,
        api: web::Data<Self>,
    ) -> impl Responder {
        let sections = body.and_then(|body| body.into_inner().sections);
        debug!("save_settings() called with sections: {sections:?}");

        let result = api.session.lock().await.save_settings(sections).await;

        handle_service_result(result, "save_settings")
    }

    pub async fn send_message(
        body: web::Json<DriverMessage>,
        api: web::Data<Self>,
    ) -> impl Responder {
        debug!("send_message() called");

        let result = api
            .session
            .lock()
            .await
            .send_message(body.into_inner())
            .await
            .map(|message| MessageResponse { message });

        handle_service_result(result, "send_message")
    }

    pub async fn clear_message(api: web::Data<Self>) -> impl Responder {
        debug!("clear_message() called");

        let result = api
            .session
            .lock()
            .await
            .clear_message()
            .await
            .map(|message| MessageResponse { message });

        handle_service_result(result, "clear_message")
    }
}

fn section_view(form: &SettingsForm, name: &str) -> Result<SectionView> {
    let section = *schema::section(name).ok_or_else(|| FormError::UnknownSection(name.to_string()))?;

    Ok(SectionView {
        section,
        fields: form.derive_fields(name)?,
        passthrough_keys: form.passthrough_keys(name)?,
    })
}

/// Status code for a failed operation
///
/// Callers' mistakes map to 4xx, upstream rejections to 401/502.
fn error_status(e: &anyhow::Error) -> StatusCode {
    if e.downcast_ref::<PreconditionError>().is_some() {
        return StatusCode::CONFLICT;
    }

    if e.downcast_ref::<FormError>().is_some() || e.downcast_ref::<InvalidMessage>().is_some() {
        return StatusCode::BAD_REQUEST;
    }

    match e.downcast_ref::<HttpStatusError>() {
        Some(status_error) if status_error.is_auth_failure() => StatusCode::UNAUTHORIZED,
        Some(_) => StatusCode::BAD_GATEWAY,
        None => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Handle a session operation result, mapping it to an HTTP response
pub fn handle_service_result<T>(result: Result<T>, operation: &str) -> HttpResponse
where
    T: Serialize,
{
    match result {
        Ok(data) => HttpResponse::Ok().json(data),
        Err(e) => {
            let status = error_status(&e);

            if status.is_server_error() {
                error!("{operation} failed: {e:#}");
            } else {
                warn!("{operation} rejected: {e:#}");
            }

            HttpResponse::build(status).json(ErrorResponse {
                error: format!("{e:#}"),
            })
        }
    }
}
