use std::collections::HashMap;

use axum::{
    async_trait,
    extract::{FromRequest, Multipart, Request},
    http::header::CONTENT_TYPE,
    Form, Json,
};
use serde_json::Value;

use super::dto::AccountForm;
use crate::{errors::AppError, media::UploadItem};

macro_rules! malformed {
    () => {
        |e| AppError::MalformedBody {
            status: e.status(),
            message: e.body_text(),
        }
    };
}

async fn read_multipart(mut mp: Multipart) -> Result<AccountForm, AppError> {
    let mut form = AccountForm::new();
    while let Some(field) = mp.next_field().await.map_err(malformed!())? {
        let Some(name) = field.name().map(str::to_string) else {
            continue;
        };
        match field.file_name().map(str::to_string) {
            Some(file_name) => {
                let content_type = field.content_type().map(str::to_string);
                let body = field.bytes().await.map_err(malformed!())?;
                // browsers send an empty part for an untouched file input
                if file_name.is_empty() && body.is_empty() {
                    form.insert_text(name, None);
                    continue;
                }
                form.insert_file(
                    name,
                    UploadItem {
                        body,
                        content_type,
                        file_name: Some(file_name),
                    },
                );
            }
            None => {
                let text = field.text().await.map_err(malformed!())?;
                form.insert_text(name, Some(text));
            }
        }
    }
    Ok(form)
}

/// Accepts multipart, urlencoded or JSON bodies. A request without a body
/// yields an empty form so that field rules, not the framework, report it.
/// Bodies that cannot be decoded are rejected with the framework's status
/// inside the usual envelope.
#[async_trait]
impl<S> FromRequest<S> for AccountForm
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let content_type = req
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_ascii_lowercase();

        if content_type.starts_with("multipart/form-data") {
            let mp = Multipart::from_request(req, state)
                .await
                .map_err(malformed!())?;
            return read_multipart(mp).await;
        }

        let mut form = AccountForm::new();
        if content_type.starts_with("application/json") {
            let Json(map) = Json::<serde_json::Map<String, Value>>::from_request(req, state)
                .await
                .map_err(malformed!())?;
            for (name, value) in map {
                match value {
                    Value::Null => form.insert_text(name, None),
                    Value::String(s) => form.insert_text(name, Some(s)),
                    _ => form.insert_non_text(name),
                }
            }
        } else if content_type.starts_with("application/x-www-form-urlencoded") {
            let Form(map) = Form::<HashMap<String, String>>::from_request(req, state)
                .await
                .map_err(malformed!())?;
            for (name, value) in map {
                form.insert_text(name, Some(value));
            }
        }
        Ok(form)
    }
}
