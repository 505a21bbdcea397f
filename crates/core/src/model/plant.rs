use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::ids::{CompanyId, PlantId};

/// Plant codes that identify a company's main (registered) facility.
pub const MAIN_PLANT_CODES: [&str; 2] = ["C001", "P001"];

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum PlantError {
    #[error("plant name is required")]
    MissingName,

    #[error("plant code is required")]
    MissingCode,
}

/// A company-owned facility.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Plant {
    pub id: PlantId,
    pub company_id: CompanyId,
    #[serde(alias = "plant_code")]
    pub code: String,
    #[serde(alias = "plant_name")]
    pub name: String,
    #[serde(default)]
    pub plant_type: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
}

impl Plant {
    /// Main plants carry one of the reserved codes; every other plant is "other".
    #[must_use]
    pub fn is_main(&self) -> bool {
        let code = self.code.trim();
        MAIN_PLANT_CODES
            .iter()
            .any(|main| main.eq_ignore_ascii_case(code))
    }
}

/// Input for creating a plant.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PlantDraft {
    pub company_id: Option<CompanyId>,
    pub code: String,
    pub name: String,
    pub plant_type: Option<String>,
    pub address: Option<String>,
}

/// A draft that passed validation; what gets posted to the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewPlant {
    pub company_id: CompanyId,
    pub plant_code: String,
    pub plant_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plant_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
}

impl PlantDraft {
    /// Validate the draft for the given company.
    ///
    /// # Errors
    ///
    /// Returns `PlantError` if name or code are blank.
    pub fn validate(self, company_id: CompanyId) -> Result<NewPlant, PlantError> {
        let name = self.name.trim().to_owned();
        if name.is_empty() {
            return Err(PlantError::MissingName);
        }
        let code = self.code.trim().to_uppercase();
        if code.is_empty() {
            return Err(PlantError::MissingCode);
        }

        Ok(NewPlant {
            company_id: self.company_id.unwrap_or(company_id),
            plant_code: code,
            plant_name: name,
            plant_type: normalize_optional(self.plant_type),
            address: normalize_optional(self.address),
        })
    }
}

fn normalize_optional(value: Option<String>) -> Option<String> {
    value
        .map(|val| val.trim().to_string())
        .filter(|val| !val.is_empty())
}
