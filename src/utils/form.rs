//! Helpers shared by the HTML form handlers.

use std::collections::HashMap;

use axum::extract::Multipart;
use serde::Serialize;
use validator::ValidationErrors;

use crate::{error::AppError, utils::media::UploadedFile};

/// Key used for errors that do not belong to a single field.
pub const NON_FIELD: &str = "__all__";

/// Field name to messages, as shown next to each input.
#[derive(Debug, Default, Clone, Serialize)]
pub struct FormErrors(HashMap<String, Vec<String>>);

impl FormErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.0
            .entry(field.to_string())
            .or_default()
            .push(message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }
}

impl From<ValidationErrors> for FormErrors {
    fn from(errors: ValidationErrors) -> Self {
        let mut form_errors = FormErrors::new();
        for (field, field_errors) in errors.field_errors() {
            for error in field_errors {
                let message = error
                    .message
                    .as_ref()
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| format!("Enter a valid {}.", field.replace('_', " ")));
                form_errors.add(&field, message);
            }
        }
        form_errors
    }
}

/// HTML checkboxes send "on" when ticked and nothing otherwise.
pub fn checkbox(value: &Option<String>) -> bool {
    matches!(value.as_deref(), Some("on" | "true" | "1"))
}

/// Blank optional inputs are stored as NULL.
pub fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// A fully buffered `multipart/form-data` submission.
///
/// File inputs left empty by the browser (no file name or no bytes) are
/// dropped, so `file()` only yields real uploads.
#[derive(Debug, Default)]
pub struct MultipartForm {
    fields: HashMap<String, String>,
    files: HashMap<String, UploadedFile>,
}

impl MultipartForm {
    pub async fn read(mut multipart: Multipart) -> Result<Self, AppError> {
        let mut form = MultipartForm::default();

        while let Some(field) = multipart.next_field().await? {
            let name = field.name().unwrap_or_default().to_string();

            match field.file_name().map(str::to_string) {
                Some(file_name) => {
                    let bytes = field.bytes().await?;
                    if !file_name.is_empty() && !bytes.is_empty() {
                        form.files.insert(
                            name,
                            UploadedFile {
                                file_name,
                                bytes: bytes.to_vec(),
                            },
                        );
                    }
                }
                None => {
                    let text = field.text().await?;
                    form.fields.insert(name, text);
                }
            }
        }

        Ok(form)
    }

    pub fn text(&self, name: &str) -> String {
        self.fields.get(name).cloned().unwrap_or_default()
    }

    pub fn take_file(&mut self, name: &str) -> Option<UploadedFile> {
        self.files.remove(name)
    }
}
