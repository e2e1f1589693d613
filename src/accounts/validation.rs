//! Field rules shared by registration, login and profile update.
//!
//! Every rule appends to a [`FieldErrors`] instead of returning early, so a
//! request gets all of its problems reported at once.

use std::collections::BTreeMap;

use lazy_static::lazy_static;
use regex::Regex;
use serde::Serialize;

use super::{dto::FieldValue, gender::Gender};
use crate::media::UploadItem;

pub const MAX_STRING_LEN: usize = 255;
pub const MIN_PASSWORD_LEN: usize = 8;
pub const MAX_PICTURE_KIB: usize = 2048;
pub const PICTURE_TYPES: &str = "jpeg, png, jpg, gif, svg";

/// Field name to messages, serialized as a plain JSON object.
#[derive(Debug, Default, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct FieldErrors(BTreeMap<String, Vec<String>>);

impl FieldErrors {
    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.0.entry(field.to_string()).or_default().push(message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[cfg(test)]
    pub fn get(&self, field: &str) -> Option<&[String]> {
        self.0.get(field).map(Vec::as_slice)
    }

    #[cfg(test)]
    pub fn has(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    fn required(&mut self, field: &str) {
        self.add(field, format!("The {} field is required.", attribute(field)));
    }

    fn not_string(&mut self, field: &str) {
        self.add(field, format!("The {} field must be a string.", attribute(field)));
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Presence {
    /// Must be present and non-null.
    Required,
    /// May be omitted, but a null is not a value.
    Sometimes,
    /// May be omitted or null.
    Nullable,
}

enum Slot<'a> {
    Absent,
    Null,
    NotText,
    Given(&'a str),
}

fn slot(value: Option<&FieldValue>) -> Slot<'_> {
    match value {
        None => Slot::Absent,
        Some(FieldValue::Null) => Slot::Null,
        Some(FieldValue::NotText) => Slot::NotText,
        Some(FieldValue::Text(s)) => Slot::Given(s.as_str()),
    }
}

fn attribute(field: &str) -> String {
    field.replace('_', " ")
}

pub fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

/// Emails are matched case-insensitively and without surrounding blanks.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

pub fn string(
    errors: &mut FieldErrors,
    field: &str,
    value: Option<&FieldValue>,
    presence: Presence,
    max_len: Option<usize>,
) -> Option<String> {
    match slot(value) {
        Slot::Absent | Slot::Null if presence == Presence::Required => {
            errors.required(field);
            None
        }
        Slot::Absent => None,
        Slot::Null => {
            if presence == Presence::Sometimes {
                errors.not_string(field);
            }
            None
        }
        Slot::NotText => {
            errors.not_string(field);
            None
        }
        Slot::Given(s) => match max_len {
            Some(max) if s.chars().count() > max => {
                errors.add(
                    field,
                    format!(
                        "The {} field must not be greater than {} characters.",
                        attribute(field),
                        max
                    ),
                );
                None
            }
            _ => Some(s.to_string()),
        },
    }
}

/// Returns the normalized address when it passes.
pub fn email(
    errors: &mut FieldErrors,
    field: &str,
    value: Option<&FieldValue>,
    presence: Presence,
    max_len: Option<usize>,
) -> Option<String> {
    let raw = string(errors, field, value, presence, None)?;
    let email = normalize_email(&raw);
    let mut ok = true;
    if !is_valid_email(&email) {
        errors.add(
            field,
            format!("The {} field must be a valid email address.", attribute(field)),
        );
        ok = false;
    }
    if let Some(max) = max_len {
        if email.chars().count() > max {
            errors.add(
                field,
                format!(
                    "The {} field must not be greater than {} characters.",
                    attribute(field),
                    max
                ),
            );
            ok = false;
        }
    }
    ok.then_some(email)
}

pub fn password(
    errors: &mut FieldErrors,
    field: &str,
    value: Option<&FieldValue>,
    presence: Presence,
) -> Option<String> {
    let plain = string(errors, field, value, presence, None)?;
    if plain.chars().count() < MIN_PASSWORD_LEN {
        errors.add(
            field,
            format!(
                "The {} field must be at least {} characters.",
                attribute(field),
                MIN_PASSWORD_LEN
            ),
        );
        return None;
    }
    Some(plain)
}

/// Only checked when a confirmation was actually sent.
pub fn confirmed(
    errors: &mut FieldErrors,
    field: &str,
    value: Option<&str>,
    confirmation: Option<&FieldValue>,
) -> bool {
    let (Some(value), Some(confirmation)) = (value, confirmation) else {
        return true;
    };
    if confirmation.as_text() != Some(value) {
        errors.add(
            field,
            format!("The {} field confirmation does not match.", attribute(field)),
        );
        return false;
    }
    true
}

pub fn gender(
    errors: &mut FieldErrors,
    field: &str,
    value: Option<&FieldValue>,
    presence: Presence,
) -> Option<Gender> {
    let invalid = |errors: &mut FieldErrors| {
        errors.add(field, format!("The selected {} is invalid.", attribute(field)));
    };
    match slot(value) {
        Slot::Absent | Slot::Null if presence == Presence::Required => {
            errors.required(field);
            None
        }
        Slot::Absent => None,
        Slot::Null => {
            if presence == Presence::Sometimes {
                invalid(errors);
            }
            None
        }
        Slot::NotText => {
            invalid(errors);
            None
        }
        Slot::Given(s) => match s.parse::<Gender>() {
            Ok(g) => Some(g),
            Err(_) => {
                invalid(errors);
                None
            }
        },
    }
}

/// Optional image upload. `text` is whatever non-file value arrived under
/// the same field name.
pub fn picture(
    errors: &mut FieldErrors,
    field: &str,
    file: Option<&UploadItem>,
    text: Option<&FieldValue>,
) -> Option<UploadItem> {
    let Some(file) = file else {
        if let Slot::Given(_) | Slot::NotText = slot(text) {
            errors.add(field, format!("The {} field must be an image.", attribute(field)));
        }
        return None;
    };

    let mut ok = true;
    if file.image_mime().is_none() {
        errors.add(field, format!("The {} field must be an image.", attribute(field)));
        errors.add(
            field,
            format!(
                "The {} field must be a file of type: {}.",
                attribute(field),
                PICTURE_TYPES
            ),
        );
        ok = false;
    }
    if file.size() > MAX_PICTURE_KIB * 1024 {
        errors.add(
            field,
            format!(
                "The {} field must not be greater than {} kilobytes.",
                attribute(field),
                MAX_PICTURE_KIB
            ),
        );
        ok = false;
    }
    ok.then(|| file.clone())
}
