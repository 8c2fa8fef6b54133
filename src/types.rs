//! Core types for the company registry.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::{SystemTime, UNIX_EPOCH};

/// Unique identifier for a company record (assigned by the store).
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CompanyId(pub u64);

impl CompanyId {
    pub fn next(self) -> Self {
        CompanyId(self.0 + 1)
    }
}

impl fmt::Debug for CompanyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CompanyId({})", self.0)
    }
}

impl fmt::Display for CompanyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Microseconds since Unix epoch.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Timestamp(pub i64);

impl Timestamp {
    /// Current time. Clocks set before the epoch read as zero.
    pub fn now() -> Self {
        let micros = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_micros() as i64)
            .unwrap_or(0);
        Timestamp(micros)
    }
}

impl fmt::Debug for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Timestamp({})", self.0)
    }
}

/// Postal address of a company. All parts are free text.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    pub city: String,
    pub street: String,
    pub house: String,
}

impl Address {
    pub fn new(
        city: impl Into<String>,
        street: impl Into<String>,
        house: impl Into<String>,
    ) -> Self {
        Self {
            city: city.into(),
            street: street.into(),
            house: house.into(),
        }
    }
}

/// A company that has not been persisted yet (no identifier).
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewCompany {
    pub company_name: String,
    pub director_full_name: String,
    pub phone_number: String,
    pub address: Address,
}

impl NewCompany {
    pub fn new(
        company_name: impl Into<String>,
        director_full_name: impl Into<String>,
        phone_number: impl Into<String>,
        address: Address,
    ) -> Self {
        Self {
            company_name: company_name.into(),
            director_full_name: director_full_name.into(),
            phone_number: phone_number.into(),
            address,
        }
    }

    /// Attach the identifier assigned by the store.
    pub fn with_id(self, id: CompanyId) -> Company {
        Company {
            id,
            company_name: self.company_name,
            director_full_name: self.director_full_name,
            phone_number: self.phone_number,
            address: self.address,
        }
    }
}

/// A persisted company record.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Company {
    /// Unique identifier (assigned by store).
    pub id: CompanyId,
    pub company_name: String,
    pub director_full_name: String,
    pub phone_number: String,
    pub address: Address,
}

impl Company {
    /// Value of a sortable field.
    pub fn field(&self, field: SortField) -> &str {
        match field {
            SortField::CompanyName => &self.company_name,
            SortField::DirectorFullName => &self.director_full_name,
        }
    }
}

/// Fields a page request can be sorted by.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SortField {
    CompanyName,
    DirectorFullName,
}

impl SortField {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortField::CompanyName => "companyName",
            SortField::DirectorFullName => "directorFullName",
        }
    }
}

impl fmt::Display for SortField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SortField {
    type Err = crate::error::RegistryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "companyName" => Ok(SortField::CompanyName),
            "directorFullName" => Ok(SortField::DirectorFullName),
            other => Err(crate::error::RegistryError::InvalidOperation(format!(
                "Unknown sort field: {}",
                other
            ))),
        }
    }
}

/// Sort direction.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl SortDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortDirection::Asc => "asc",
            SortDirection::Desc => "desc",
        }
    }
}

impl fmt::Display for SortDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SortDirection {
    type Err = crate::error::RegistryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "asc" => Ok(SortDirection::Asc),
            "desc" => Ok(SortDirection::Desc),
            other => Err(crate::error::RegistryError::InvalidOperation(format!(
                "Unknown sort direction: {}",
                other
            ))),
        }
    }
}

/// Storage statistics.
#[derive(Clone, Debug, Default)]
pub struct StoreStats {
    pub record_count: u64,
    pub log_size_bytes: u64,
    pub schema_version: u32,
    pub next_id: u64,
}
