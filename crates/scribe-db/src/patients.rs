//! Patient repository.

use crate::database::Database;
use crate::error::{DbError, Result};
use chrono::{DateTime, NaiveDate, Utc};
use scribe_common::{Address, NormalizedPatient, Patient};
use std::sync::Arc;
use uuid::Uuid;

const PATIENT_COLUMNS: &str = "id, user_id, first_name, last_name, date_of_birth, sex, email, phone, \
     street, city, state, zip_code, country, created_at, updated_at";

#[derive(Debug, sqlx::FromRow)]
struct PatientRow {
    id: Uuid,
    user_id: Option<String>,
    first_name: String,
    last_name: String,
    date_of_birth: NaiveDate,
    sex: String,
    email: Option<String>,
    phone: Option<String>,
    street: Option<String>,
    city: Option<String>,
    state: Option<String>,
    zip_code: Option<String>,
    country: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<PatientRow> for Patient {
    type Error = DbError;

    fn try_from(row: PatientRow) -> Result<Self> {
        Ok(Patient {
            id: row.id,
            user_id: row.user_id,
            first_name: row.first_name,
            last_name: row.last_name,
            date_of_birth: row.date_of_birth,
            sex: row.sex.parse()?,
            email: row.email,
            phone: row.phone,
            address: Address {
                street: row.street,
                city: row.city,
                state: row.state,
                zip_code: row.zip_code,
                country: row.country,
            },
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// List query options.
#[derive(Debug, Clone, Default)]
pub struct PatientFilter {
    /// Case-insensitive substring of "first last".
    pub search: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// Repository for patient operations.
#[derive(Clone)]
pub struct PatientRepository {
    db: Arc<Database>,
}

impl PatientRepository {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    pub async fn create(&self, input: &NormalizedPatient) -> Result<Patient> {
        let now = Utc::now();
        let patient = Patient {
            id: Uuid::new_v4(),
            user_id: input.user_id.clone(),
            first_name: input.first_name.clone(),
            last_name: input.last_name.clone(),
            date_of_birth: input.date_of_birth,
            sex: input.sex,
            email: input.email.clone(),
            phone: input.phone.clone(),
            address: input.address.clone(),
            created_at: now,
            updated_at: now,
        };

        sqlx::query(
            r#"
            INSERT INTO patients
                (id, user_id, first_name, last_name, date_of_birth, sex, email, phone,
                 street, city, state, zip_code, country, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(patient.id)
        .bind(&patient.user_id)
        .bind(&patient.first_name)
        .bind(&patient.last_name)
        .bind(patient.date_of_birth)
        .bind(patient.sex.as_str())
        .bind(&patient.email)
        .bind(&patient.phone)
        .bind(&patient.address.street)
        .bind(&patient.address.city)
        .bind(&patient.address.state)
        .bind(&patient.address.zip_code)
        .bind(&patient.address.country)
        .bind(patient.created_at)
        .bind(patient.updated_at)
        .execute(self.db.pool())
        .await?;

        Ok(patient)
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<Patient>> {
        let sql = format!("SELECT {PATIENT_COLUMNS} FROM patients WHERE id = ?");
        sqlx::query_as::<_, PatientRow>(&sql)
            .bind(id)
            .fetch_optional(self.db.pool())
            .await?
            .map(Patient::try_from)
            .transpose()
    }

    /// Like [`find_by_id`](Self::find_by_id) but a missing row is an error.
    pub async fn get(&self, id: Uuid) -> Result<Patient> {
        self.find_by_id(id)
            .await?
            .ok_or_else(|| DbError::NotFound(format!("patient {id}")))
    }

    /// Patient linked to a portal login.
    pub async fn find_by_user_id(&self, user_id: &str) -> Result<Option<Patient>> {
        let sql = format!("SELECT {PATIENT_COLUMNS} FROM patients WHERE user_id = ?");
        sqlx::query_as::<_, PatientRow>(&sql)
            .bind(user_id)
            .fetch_optional(self.db.pool())
            .await?
            .map(Patient::try_from)
            .transpose()
    }

    pub async fn list(&self, filter: &PatientFilter) -> Result<Vec<Patient>> {
        let pattern = filter
            .search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| format!("%{}%", s.replace('%', "\\%").replace('_', "\\_")));

        let sql = format!(
            "SELECT {PATIENT_COLUMNS} FROM patients \
             WHERE (? IS NULL OR (first_name || ' ' || last_name) LIKE ? ESCAPE '\\') \
             ORDER BY last_name COLLATE NOCASE, first_name COLLATE NOCASE \
             LIMIT ? OFFSET ?"
        );
        let rows = sqlx::query_as::<_, PatientRow>(&sql)
            .bind(&pattern)
            .bind(&pattern)
            .bind(filter.limit.unwrap_or(-1))
            .bind(filter.offset.unwrap_or(0).max(0))
            .fetch_all(self.db.pool())
            .await?;

        rows.into_iter().map(Patient::try_from).collect()
    }

    /// Replace the editable fields. `user_id` is only overwritten when the
    /// input carries one.
    pub async fn update(&self, id: Uuid, input: &NormalizedPatient) -> Result<Patient> {
        let result = sqlx::query(
            r#"
            UPDATE patients SET
                user_id = COALESCE(?, user_id),
                first_name = ?, last_name = ?, date_of_birth = ?, sex = ?,
                email = ?, phone = ?, street = ?, city = ?, state = ?, zip_code = ?, country = ?,
                updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&input.user_id)
        .bind(&input.first_name)
        .bind(&input.last_name)
        .bind(input.date_of_birth)
        .bind(input.sex.as_str())
        .bind(&input.email)
        .bind(&input.phone)
        .bind(&input.address.street)
        .bind(&input.address.city)
        .bind(&input.address.state)
        .bind(&input.address.zip_code)
        .bind(&input.address.country)
        .bind(Utc::now())
        .bind(id)
        .execute(self.db.pool())
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::NotFound(format!("patient {id}")));
        }
        self.get(id).await
    }

    /// Delete a patient. Transcripts, bookmarks, recommendations and chat
    /// sessions go with it.
    pub async fn delete(&self, id: Uuid) -> Result<()> {
        let result = sqlx::query("DELETE FROM patients WHERE id = ?")
            .bind(id)
            .execute(self.db.pool())
            .await?;
        if result.rows_affected() == 0 {
            return Err(DbError::NotFound(format!("patient {id}")));
        }
        Ok(())
    }

    pub async fn count(&self) -> Result<i64> {
        Ok(sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM patients")
            .fetch_one(self.db.pool())
            .await?)
    }
}
