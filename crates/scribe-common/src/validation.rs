//! Patient intake form rules.
//!
//! `PatientInput` is what the admin portal submits on create and update.
//! Rules are declared with `validator` and failures are collected into a
//! [`FieldErrors`] map so the API can report every bad field at once.

use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fmt;
use validator::{Validate, ValidateEmail, ValidationError, ValidationErrors, ValidationErrorsKind};

use crate::error::{Result, ScribeError};
use crate::patient::{Address, Sex};

pub const DEFAULT_COUNTRY: &str = "USA";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate)]
pub struct AddressInput {
    #[serde(default)]
    pub street: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    #[validate(custom(function = "validate_state_code"))]
    pub state: Option<String>,
    #[serde(default)]
    #[validate(custom(function = "validate_zip_code"))]
    pub zip_code: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct PatientInput {
    #[validate(custom(function = "validate_name"))]
    pub first_name: String,
    #[validate(custom(function = "validate_name"))]
    pub last_name: String,
    #[validate(custom(function = "validate_date_of_birth"))]
    pub date_of_birth: NaiveDate,
    pub sex: Sex,
    #[serde(default)]
    #[validate(custom(function = "validate_email_address"))]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    #[validate(nested)]
    pub address: AddressInput,
    #[serde(default)]
    pub user_id: Option<String>,
}

/// Cleaned-up form values, ready to persist.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedPatient {
    pub first_name: String,
    pub last_name: String,
    pub date_of_birth: NaiveDate,
    pub sex: Sex,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Address,
    pub user_id: Option<String>,
}

impl PatientInput {
    /// Validate, then trim and canonicalise. Blank optional fields become `None`.
    pub fn normalize(self) -> Result<NormalizedPatient> {
        let blanks_cleared = self.clear_blanks();
        blanks_cleared
            .validate()
            .map_err(|e| ScribeError::Validation(FieldErrors::from(e)))?;

        let a = blanks_cleared.address;
        Ok(NormalizedPatient {
            first_name: blanks_cleared.first_name.trim().to_string(),
            last_name: blanks_cleared.last_name.trim().to_string(),
            date_of_birth: blanks_cleared.date_of_birth,
            sex: blanks_cleared.sex,
            email: blanks_cleared.email.map(|e| e.to_ascii_lowercase()),
            phone: blanks_cleared.phone,
            address: Address {
                street: a.street,
                city: a.city,
                state: a.state.map(|s| s.to_ascii_uppercase()),
                zip_code: a.zip_code,
                country: Some(a.country.unwrap_or_else(|| DEFAULT_COUNTRY.to_string())),
            },
            user_id: blanks_cleared.user_id,
        })
    }

    fn clear_blanks(self) -> Self {
        let a = self.address;
        Self {
            email: non_blank(self.email),
            phone: non_blank(self.phone),
            user_id: non_blank(self.user_id),
            address: AddressInput {
                street: non_blank(a.street),
                city: non_blank(a.city),
                state: non_blank(a.state),
                zip_code: non_blank(a.zip_code),
                country: non_blank(a.country),
            },
            ..self
        }
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn error(code: &'static str, message: &'static str) -> ValidationError {
    let mut err = ValidationError::new(code);
    err.message = Some(Cow::Borrowed(message));
    err
}

fn validate_name(value: &str) -> std::result::Result<(), ValidationError> {
    if value.trim().chars().count() < 2 {
        return Err(error("name_length", "Must be at least 2 characters"));
    }
    Ok(())
}

/// `local@domain.tld`: validator's email check plus a dotted domain with a
/// non-empty top-level label.
fn validate_email_address(value: &str) -> std::result::Result<(), ValidationError> {
    let dotted_domain = value
        .rsplit_once('@')
        .and_then(|(_, domain)| domain.rsplit_once('.'))
        .is_some_and(|(host, tld)| {
            !host.is_empty() && tld.len() >= 2 && tld.chars().all(|c| c.is_ascii_alphabetic())
        });
    if !value.validate_email() || !dotted_domain {
        return Err(error("email", "Enter a valid email address"));
    }
    Ok(())
}

fn validate_state_code(value: &str) -> std::result::Result<(), ValidationError> {
    if value.len() != 2 || !value.chars().all(|c| c.is_ascii_alphabetic()) {
        return Err(error("state_code", "Use the 2-letter state code"));
    }
    Ok(())
}

fn validate_zip_code(value: &str) -> std::result::Result<(), ValidationError> {
    let digits = |s: &str, n: usize| s.len() == n && s.chars().all(|c| c.is_ascii_digit());
    let ok = match value.split_once('-') {
        None => digits(value, 5),
        Some((head, tail)) => digits(head, 5) && digits(tail, 4),
    };
    if !ok {
        return Err(error("zip_code", "Use 12345 or 12345-6789"));
    }
    Ok(())
}

fn validate_date_of_birth(value: &NaiveDate) -> std::result::Result<(), ValidationError> {
    check_date_of_birth(*value, Utc::now().date_naive())
}

/// Date of birth must fall between 1900-01-01 and `today`, inclusive.
pub fn check_date_of_birth(dob: NaiveDate, today: NaiveDate) -> std::result::Result<(), ValidationError> {
    let earliest = NaiveDate::from_ymd_opt(1900, 1, 1).unwrap_or(NaiveDate::MIN);
    if dob > today {
        return Err(error("dob_future", "Date of birth cannot be in the future"));
    }
    if dob < earliest {
        return Err(error("dob_too_old", "Date of birth cannot be before 1900"));
    }
    Ok(())
}

/// Field name → messages. Nested fields are dotted (`address.state`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldErrors(pub BTreeMap<String, Vec<String>>);

impl FieldErrors {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, field: &str) -> Option<&[String]> {
        self.0.get(field).map(Vec::as_slice)
    }

    pub fn push(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.0.entry(field.into()).or_default().push(message.into());
    }

    fn collect(&mut self, prefix: &str, errors: &ValidationErrors) {
        for (field, kind) in errors.errors() {
            let key = if prefix.is_empty() {
                field.to_string()
            } else {
                format!("{prefix}.{field}")
            };
            match kind {
                ValidationErrorsKind::Field(list) => {
                    for e in list {
                        let msg = e
                            .message
                            .as_ref()
                            .map(|m| m.to_string())
                            .unwrap_or_else(|| e.code.to_string());
                        self.push(key.clone(), msg);
                    }
                }
                ValidationErrorsKind::Struct(inner) => self.collect(&key, inner),
                ValidationErrorsKind::List(items) => {
                    for (idx, inner) in items {
                        self.collect(&format!("{key}[{idx}]"), inner);
                    }
                }
            }
        }
    }
}

impl From<ValidationErrors> for FieldErrors {
    fn from(errors: ValidationErrors) -> Self {
        let mut out = FieldErrors::default();
        out.collect("", &errors);
        out
    }
}

impl fmt::Display for FieldErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .0
            .iter()
            .map(|(field, msgs)| format!("{field}: {}", msgs.join("; ")))
            .collect();
        f.write_str(&parts.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn input() -> PatientInput {
        PatientInput {
            first_name: "  Jane ".into(),
            last_name: "Doe".into(),
            date_of_birth: NaiveDate::from_ymd_opt(1985, 3, 2).unwrap(),
            sex: Sex::Female,
            email: Some("Jane.Doe@Example.com".into()),
            phone: Some("".into()),
            address: AddressInput {
                city: Some("Boston".into()),
                state: Some("ma".into()),
                zip_code: Some("02110".into()),
                ..Default::default()
            },
            user_id: None,
        }
    }

    fn field_errors(input: PatientInput) -> FieldErrors {
        match input.normalize() {
            Err(ScribeError::Validation(fields)) => fields,
            other => panic!("expected validation failure, got {other:?}"),
        }
    }

    #[test]
    fn test_normalize_trims_and_uppercases() {
        let p = input().normalize().unwrap();
        assert_eq!(p.first_name, "Jane");
        assert_eq!(p.address.state.as_deref(), Some("MA"));
        assert_eq!(p.address.country.as_deref(), Some(DEFAULT_COUNTRY));
        assert_eq!(p.email.as_deref(), Some("jane.doe@example.com"));
        assert_eq!(p.phone, None);
    }

    #[test]
    fn test_short_names_rejected() {
        let mut bad = input();
        bad.first_name = " J ".into();
        bad.last_name = "D".into();
        let errors = field_errors(bad);
        assert!(errors.get("first_name").is_some());
        assert!(errors.get("last_name").is_some());
    }

    #[test]
    fn test_state_must_be_two_letters() {
        for state in ["MAS", "M1", "M"] {
            let mut bad = input();
            bad.address.state = Some(state.into());
            let errors = field_errors(bad);
            assert_eq!(errors.get("address.state"), Some(&["Use the 2-letter state code".to_string()][..]));
        }
    }

    #[test]
    fn test_zip_and_email_shapes() {
        let mut bad = input();
        bad.address.zip_code = Some("1234".into());
        bad.email = Some("not-an-email".into());
        let errors = field_errors(bad);
        assert!(errors.get("address.zip_code").is_some());
        assert!(errors.get("email").is_some());

        for email in ["jane@localhost", "jane@example.", "jane@.com", "jane@example.c0m"] {
            let mut bad = input();
            bad.email = Some(email.into());
            assert!(field_errors(bad).get("email").is_some(), "{email}");
        }

        let mut ok = input();
        ok.email = Some("Jane.Doe@Mail.Example.org".into());
        assert_eq!(ok.clone().normalize().unwrap().email.as_deref(), Some("jane.doe@mail.example.org"));
        ok.address.zip_code = Some("02110-1234".into());
        assert!(ok.normalize().is_ok());
    }

    #[test]
    fn test_date_of_birth_bounds() {
        let today = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();
        assert!(check_date_of_birth(today, today).is_ok());
        assert!(check_date_of_birth(NaiveDate::from_ymd_opt(1900, 1, 1).unwrap(), today).is_ok());
        assert!(check_date_of_birth(NaiveDate::from_ymd_opt(1899, 12, 31).unwrap(), today).is_err());
        assert!(check_date_of_birth(NaiveDate::from_ymd_opt(2024, 5, 2).unwrap(), today).is_err());
    }

    #[test]
    fn test_errors_display_lists_fields() {
        let mut errors = FieldErrors::default();
        errors.push("first_name", "too short");
        errors.push("address.state", "bad");
        assert_eq!(errors.to_string(), "address.state: bad, first_name: too short");
    }
}
