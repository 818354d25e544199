//! `/secret` endpoints: create a one-time secret and read it back exactly once.

use axum::{
    extract::{FromRequest, Multipart, Query, Request, State},
    http::{header, StatusCode},
    Form, Json,
};
use serde::Deserialize;
use tracing::debug;

use crate::api::error::ApiError;
use crate::api::routes::ApiState;
use crate::services::{CreateSecretRequest, MsgResponse, TokenResponse};
use crate::validation::FileUpload;

/// Form fields of `POST /secret`, from either `multipart/form-data` or
/// `application/x-www-form-urlencoded`. Repeated fields keep their first value.
#[derive(Debug, Default)]
pub struct CreateSecretForm {
    pub msg: Option<String>,
    pub ttl: Option<String>,
    pub file: Option<FileUpload>,
}

impl From<CreateSecretForm> for CreateSecretRequest {
    fn from(form: CreateSecretForm) -> Self {
        CreateSecretRequest {
            msg: form.msg.unwrap_or_default(),
            ttl: form.ttl.unwrap_or_default(),
            file: form.file,
        }
    }
}

impl<S> FromRequest<S> for CreateSecretForm
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let content_type = req
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default()
            .to_ascii_lowercase();

        if content_type.starts_with("multipart/form-data") {
            let multipart = Multipart::from_request(req, state)
                .await
                .map_err(|rejection| rejection_error(rejection.status(), rejection.body_text()))?;
            return read_multipart(multipart).await;
        }

        if content_type.starts_with("application/x-www-form-urlencoded") {
            let Form(pairs) = Form::<Vec<(String, String)>>::from_request(req, state)
                .await
                .map_err(|rejection| rejection_error(rejection.status(), rejection.body_text()))?;

            let mut form = CreateSecretForm::default();
            for (name, value) in pairs {
                match name.as_str() {
                    "msg" if form.msg.is_none() => form.msg = Some(value),
                    "ttl" if form.ttl.is_none() => form.ttl = Some(value),
                    _ => {}
                }
            }
            return Ok(form);
        }

        // Anything else carries no form fields; validation reports the missing message.
        debug!(content_type = %content_type, "Unsupported content type for secret creation");
        Ok(CreateSecretForm::default())
    }
}

async fn read_multipart(mut multipart: Multipart) -> Result<CreateSecretForm, ApiError> {
    let mut form = CreateSecretForm::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| rejection_error(e.status(), e.body_text()))?
    {
        let Some(name) = field.name().map(str::to_owned) else {
            continue;
        };

        match name.as_str() {
            "msg" if form.msg.is_none() => {
                form.msg =
                    Some(field.text().await.map_err(|e| rejection_error(e.status(), e.body_text()))?);
            }
            "ttl" if form.ttl.is_none() => {
                form.ttl =
                    Some(field.text().await.map_err(|e| rejection_error(e.status(), e.body_text()))?);
            }
            // Only real file parts count; a plain `file` text field is ignored.
            "file" if form.file.is_none() && field.file_name().is_some() => {
                let content_disposition = field
                    .headers()
                    .get(header::CONTENT_DISPOSITION)
                    .and_then(|value| value.to_str().ok())
                    .map(str::to_owned);
                let file_name = field.file_name().map(str::to_owned);
                let data =
                    field.bytes().await.map_err(|e| rejection_error(e.status(), e.body_text()))?;

                form.file = Some(FileUpload { file_name, content_disposition, data });
            }
            _ => {}
        }
    }

    Ok(form)
}

fn rejection_error(status: StatusCode, message: String) -> ApiError {
    if status == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::payload_too_large("request body too large")
    } else {
        ApiError::bad_request(message)
    }
}

/// `POST /secret`
pub async fn create_secret(
    State(state): State<ApiState>,
    form: CreateSecretForm,
) -> Result<Json<TokenResponse>, ApiError> {
    let response = state.secrets.create(form.into()).await?;
    Ok(Json(response))
}

#[derive(Debug, Default, Deserialize)]
pub struct TokenQuery {
    #[serde(default)]
    pub token: String,
}

/// `GET /secret?token=...`
pub async fn get_secret(
    State(state): State<ApiState>,
    Query(query): Query<TokenQuery>,
) -> Result<Json<MsgResponse>, ApiError> {
    let response = state.secrets.retrieve(&query.token).await?;
    Ok(Json(response))
}
