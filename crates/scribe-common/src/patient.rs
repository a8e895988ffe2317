//! Patient record and demographics.

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::ScribeError;

/// Administrative sex as captured on the intake form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Sex {
    Male,
    Female,
    Other,
}

impl Sex {
    pub fn as_str(&self) -> &'static str {
        match self {
            Sex::Male   => "MALE",
            Sex::Female => "FEMALE",
            Sex::Other  => "OTHER",
        }
    }
}

impl fmt::Display for Sex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Sex {
    type Err = ScribeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "MALE" | "M"   => Ok(Sex::Male),
            "FEMALE" | "F" => Ok(Sex::Female),
            "OTHER"        => Ok(Sex::Other),
            _ => Err(ScribeError::InvalidValue { field: "sex", value: s.to_string() }),
        }
    }
}

/// Postal address. Every part is optional; transcripts often only mention a city.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    #[serde(default)]
    pub street: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub zip_code: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
}

impl Address {
    /// True when neither city nor state is known.
    pub fn is_unlocated(&self) -> bool {
        self.city.as_deref().map_or(true, str::is_empty)
            && self.state.as_deref().map_or(true, str::is_empty)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Patient {
    pub id: Uuid,
    /// Auth subject of the patient's portal login, if one is linked.
    pub user_id: Option<String>,
    pub first_name: String,
    pub last_name: String,
    pub date_of_birth: NaiveDate,
    pub sex: Sex,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Address,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Patient {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    /// Age in whole years on the given day.
    pub fn age_on(&self, today: NaiveDate) -> u32 {
        age_between(self.date_of_birth, today)
    }

    pub fn age(&self) -> u32 {
        self.age_on(Utc::now().date_naive())
    }
}

impl fmt::Display for Patient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Patient(id={}, name={})", self.id, self.full_name())
    }
}

pub(crate) fn age_between(dob: NaiveDate, today: NaiveDate) -> u32 {
    if today < dob {
        return 0;
    }
    let mut years = today.year() - dob.year();
    if (today.month(), today.day()) < (dob.month(), dob.day()) {
        years -= 1;
    }
    years.max(0) as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    fn patient(dob: NaiveDate) -> Patient {
        Patient {
            id: Uuid::new_v4(),
            user_id: None,
            first_name: "John".into(),
            last_name: "Doe".into(),
            date_of_birth: dob,
            sex: Sex::Male,
            email: None,
            phone: None,
            address: Address::default(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_age_before_and_after_birthday() {
        let p = patient(NaiveDate::from_ymd_opt(1980, 6, 15).unwrap());
        assert_eq!(p.age_on(NaiveDate::from_ymd_opt(2023, 6, 14).unwrap()), 42);
        assert_eq!(p.age_on(NaiveDate::from_ymd_opt(2023, 6, 15).unwrap()), 43);
    }

    #[test]
    fn test_sex_parsing_is_lenient() {
        assert_eq!("male".parse::<Sex>().unwrap(), Sex::Male);
        assert_eq!(" F ".parse::<Sex>().unwrap(), Sex::Female);
        assert!("unknown".parse::<Sex>().is_err());
    }

    #[test]
    fn test_unlocated_address() {
        assert!(Address::default().is_unlocated());
        let a = Address { city: Some("Boston".into()), ..Default::default() };
        assert!(!a.is_unlocated());
    }
}
