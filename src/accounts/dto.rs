use std::collections::HashMap;

use serde::Serialize;

use super::view::AccountView;
use crate::media::UploadItem;

pub const NAME: &str = "name";
pub const EMAIL: &str = "email";
pub const PASSWORD: &str = "password";
pub const PASSWORD_CONFIRMATION: &str = "password_confirmation";
pub const GENDER: &str = "gender";
pub const BIO: &str = "bio";
pub const PROFILE_PICTURE: &str = "profile_picture";

/// One submitted non-file field.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    /// Explicit null, or a string that was blank after trimming.
    Null,
    Text(String),
    /// A JSON number, boolean, array or object.
    NotText,
}

impl FieldValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s),
            _ => None,
        }
    }
}

/// Passwords are compared byte for byte, so they are kept as sent.
fn keeps_whitespace(name: &str) -> bool {
    name == PASSWORD || name == PASSWORD_CONFIRMATION
}

/// Raw submitted fields, whatever the body encoding was.
///
/// A missing key means the field was not sent at all.
#[derive(Debug, Default, Clone)]
pub struct AccountForm {
    fields: HashMap<String, FieldValue>,
    files: HashMap<String, UploadItem>,
}

impl AccountForm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_text(&mut self, name: impl Into<String>, value: Option<String>) {
        let name = name.into();
        let value = value
            .map(|v| {
                if keeps_whitespace(&name) {
                    v
                } else {
                    v.trim().to_string()
                }
            })
            .filter(|v| !v.is_empty())
            .map_or(FieldValue::Null, FieldValue::Text);
        self.fields.insert(name, value);
    }

    pub fn insert_non_text(&mut self, name: impl Into<String>) {
        self.fields.insert(name.into(), FieldValue::NotText);
    }

    pub fn insert_file(&mut self, name: impl Into<String>, file: UploadItem) {
        self.files.insert(name.into(), file);
    }

    pub fn value(&self, name: &str) -> Option<&FieldValue> {
        self.fields.get(name)
    }

    pub fn file(&self, name: &str) -> Option<&UploadItem> {
        self.files.get(name)
    }

    pub fn has(&self, name: &str) -> bool {
        self.fields.contains_key(name) || self.files.contains_key(name)
    }
}

#[cfg(test)]
impl AccountForm {
    pub fn with(mut self, name: &str, value: &str) -> Self {
        self.insert_text(name, Some(value.to_string()));
        self
    }

    pub fn with_null(mut self, name: &str) -> Self {
        self.insert_text(name, None);
        self
    }

    pub fn with_file(mut self, name: &str, file: UploadItem) -> Self {
        self.insert_file(name, file);
        self
    }
}

#[derive(Debug, Serialize)]
pub struct AuthPayload {
    pub user: AccountView,
    pub token: String,
}

#[derive(Debug, Serialize)]
pub struct UserPayload {
    pub user: AccountView,
}
