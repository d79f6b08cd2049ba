use crate::error::{ModelError, Result};
use crate::utils::normalize_years;
use schemars::JsonSchema;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;

/// A company being modelled and the fiscal years it covers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Project {
    pub name: String,

    #[serde(deserialize_with = "lenient_years")]
    #[schemars(description = "Fiscal years covered, ascending. Stored documents may hold them as strings.")]
    pub years: Vec<i32>,
}

impl Project {
    pub fn new(name: impl Into<String>, years: &[i32]) -> Result<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(ModelError::InvalidProject(
                "company name must not be empty".to_string(),
            ));
        }
        let years = normalize_years(years);
        if years.is_empty() {
            return Err(ModelError::InvalidProject(format!(
                "project '{}' must cover at least one year",
                name
            )));
        }
        Ok(Self { name, years })
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum YearValue {
    Number(i32),
    Text(String),
}

fn lenient_years<'de, D>(deserializer: D) -> std::result::Result<Vec<i32>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Vec::<YearValue>::deserialize(deserializer)?;
    let mut years = Vec::with_capacity(raw.len());
    for value in raw {
        let year = match value {
            YearValue::Number(y) => y,
            YearValue::Text(text) => text.trim().parse::<i32>().map_err(|_| {
                serde::de::Error::custom(format!("invalid year '{}'", text))
            })?,
        };
        years.push(year);
    }
    Ok(normalize_years(&years))
}

/// Company id to project, as persisted in `projects.json`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct ProjectRegistry {
    projects: BTreeMap<String, Project>,
}

impl ProjectRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, company_id: &str) -> Option<&Project> {
        self.projects.get(company_id)
    }

    pub fn insert(&mut self, company_id: impl Into<String>, project: Project) {
        self.projects.insert(company_id.into(), project);
    }

    pub fn remove(&mut self, company_id: &str) -> Option<Project> {
        self.projects.remove(company_id)
    }

    pub fn len(&self) -> usize {
        self.projects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.projects.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Project)> {
        self.projects.iter()
    }
}
