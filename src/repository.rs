//! Storage for projects, adjustments and extracted statements.
//!
//! The model itself only consumes values. Whatever owns persistence reads and rewrites each
//! document whole on every write, without locking; two concurrent writers can lose one update.

use crate::config::StoreConfig;
use crate::error::{ModelError, Result};
use crate::ingestion::ExtractionDocument;
use crate::overrides::{AdjustmentStore, AdjustmentUpdate};
use crate::project::{Project, ProjectRegistry};
use crate::schema::ConsolidatedModel;
use crate::ModelBuilder;
use log::{debug, info, warn};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

pub trait FinancialRepository {
    /// Unreadable or corrupt registries load as empty.
    fn load_projects(&self) -> ProjectRegistry;

    fn save_projects(&mut self, registry: &ProjectRegistry) -> Result<()>;

    /// Unreadable or corrupt adjustment stores load as empty.
    fn load_adjustments(&self, company_id: &str) -> AdjustmentStore;

    fn save_adjustments(&mut self, company_id: &str, store: &AdjustmentStore) -> Result<()>;

    /// `None` when the year has not been extracted yet.
    fn load_extraction(&self, company_id: &str, year: i32) -> Option<ExtractionDocument>;

    fn save_extraction(
        &mut self,
        company_id: &str,
        year: i32,
        document: &ExtractionDocument,
    ) -> Result<()>;

    fn save_project(&mut self, company_id: &str, project: &Project) -> Result<()> {
        let mut registry = self.load_projects();
        registry.insert(company_id, project.clone());
        self.save_projects(&registry)
    }
}

#[derive(Debug, Clone, Default)]
pub struct InMemoryRepository {
    projects: ProjectRegistry,
    adjustments: BTreeMap<String, AdjustmentStore>,
    extractions: BTreeMap<(String, i32), ExtractionDocument>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

impl FinancialRepository for InMemoryRepository {
    fn load_projects(&self) -> ProjectRegistry {
        self.projects.clone()
    }

    fn save_projects(&mut self, registry: &ProjectRegistry) -> Result<()> {
        self.projects = registry.clone();
        Ok(())
    }

    fn load_adjustments(&self, company_id: &str) -> AdjustmentStore {
        self.adjustments
            .get(company_id)
            .cloned()
            .unwrap_or_default()
    }

    fn save_adjustments(&mut self, company_id: &str, store: &AdjustmentStore) -> Result<()> {
        self.adjustments
            .insert(company_id.to_string(), store.clone());
        Ok(())
    }

    fn load_extraction(&self, company_id: &str, year: i32) -> Option<ExtractionDocument> {
        self.extractions
            .get(&(company_id.to_string(), year))
            .cloned()
    }

    fn save_extraction(
        &mut self,
        company_id: &str,
        year: i32,
        document: &ExtractionDocument,
    ) -> Result<()> {
        self.extractions
            .insert((company_id.to_string(), year), document.clone());
        Ok(())
    }
}

/// JSON documents on disk:
///
/// ```text
/// {data_dir}/projects.json
/// {data_dir}/{company}/adjustments.json
/// {data_dir}/{company}/{year}/{company}_{year}_extracted.json
/// ```
#[derive(Debug, Clone)]
pub struct JsonFileRepository {
    base_dir: PathBuf,
}

impl JsonFileRepository {
    pub fn new<P: AsRef<Path>>(base_dir: P) -> Self {
        Self {
            base_dir: base_dir.as_ref().to_path_buf(),
        }
    }

    pub fn from_config(config: &StoreConfig) -> Self {
        Self::new(&config.data_dir)
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    fn projects_path(&self) -> PathBuf {
        self.base_dir.join("projects.json")
    }

    fn company_dir(&self, company_id: &str) -> Result<PathBuf> {
        let valid = !company_id.is_empty()
            && company_id != "."
            && company_id != ".."
            && !company_id.contains(|c: char| c == '/' || c == '\\');
        if !valid {
            return Err(ModelError::InvalidProject(format!(
                "company id '{}' cannot be used as a directory name",
                company_id
            )));
        }
        Ok(self.base_dir.join(company_id))
    }

    fn adjustments_path(&self, company_id: &str) -> Result<PathBuf> {
        Ok(self.company_dir(company_id)?.join("adjustments.json"))
    }

    fn extraction_path(&self, company_id: &str, year: i32) -> Result<PathBuf> {
        Ok(self
            .company_dir(company_id)?
            .join(year.to_string())
            .join(format!("{}_{}_extracted.json", company_id, year)))
    }
}

fn read_document<T: DeserializeOwned + Default>(path: &Path) -> T {
    read_optional_document(path).unwrap_or_default()
}

fn read_optional_document<T: DeserializeOwned>(path: &Path) -> Option<T> {
    let contents = match fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!("No document at {}", path.display());
            return None;
        }
        Err(e) => {
            warn!("Could not read {}: {}", path.display(), e);
            return None;
        }
    };

    match serde_json::from_str(&contents) {
        Ok(doc) => Some(doc),
        Err(e) => {
            warn!("Ignoring corrupt document {}: {}", path.display(), e);
            None
        }
    }
}

fn write_document<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(value)?;
    fs::write(path, json)?;
    debug!("Wrote {}", path.display());
    Ok(())
}

impl FinancialRepository for JsonFileRepository {
    fn load_projects(&self) -> ProjectRegistry {
        read_document(&self.projects_path())
    }

    fn save_projects(&mut self, registry: &ProjectRegistry) -> Result<()> {
        write_document(&self.projects_path(), registry)
    }

    fn load_adjustments(&self, company_id: &str) -> AdjustmentStore {
        match self.adjustments_path(company_id) {
            Ok(path) => read_document(&path),
            Err(e) => {
                warn!("{}", e);
                AdjustmentStore::default()
            }
        }
    }

    fn save_adjustments(&mut self, company_id: &str, store: &AdjustmentStore) -> Result<()> {
        write_document(&self.adjustments_path(company_id)?, store)
    }

    fn load_extraction(&self, company_id: &str, year: i32) -> Option<ExtractionDocument> {
        match self.extraction_path(company_id, year) {
            Ok(path) => read_optional_document(&path),
            Err(e) => {
                warn!("{}", e);
                None
            }
        }
    }

    fn save_extraction(
        &mut self,
        company_id: &str,
        year: i32,
        document: &ExtractionDocument,
    ) -> Result<()> {
        write_document(&self.extraction_path(company_id, year)?, document)
    }
}

/// Registers a new project under a fresh company id.
pub fn initialize_project<R: FinancialRepository + ?Sized>(
    repo: &mut R,
    name: &str,
    years: &[i32],
) -> Result<(String, Project)> {
    let project = Project::new(name, years)?;
    let company_id = uuid::Uuid::new_v4().to_string();
    repo.save_project(&company_id, &project)?;
    info!(
        "Initialized project '{}' ({}) covering {:?}",
        project.name, company_id, project.years
    );
    Ok((company_id, project))
}

/// Read-modify-write of one adjustment. Fields the update leaves as `None` keep their stored
/// value; clearing both removes the key.
pub fn update_adjustment<R: FinancialRepository + ?Sized>(
    repo: &mut R,
    company_id: &str,
    key: &str,
    update: AdjustmentUpdate,
) -> Result<AdjustmentStore> {
    if repo.load_projects().get(company_id).is_none() {
        return Err(ModelError::UnknownProject(company_id.to_string()));
    }
    if let Some(Some(v)) = update.value {
        if !v.is_finite() {
            return Err(ModelError::InvalidAdjustment {
                key: key.to_string(),
                details: format!("value {} is not a finite number", v),
            });
        }
    }

    let mut store = repo.load_adjustments(company_id);
    store.update(key, update);
    repo.save_adjustments(company_id, &store)?;
    debug!("Adjustment '{}' updated for {}", key, company_id);
    Ok(store)
}

/// Loads everything stored for a project and builds its model.
///
/// Years without an extraction are consolidated as empty statements.
pub fn consolidate_project<R: FinancialRepository + ?Sized>(
    repo: &R,
    company_id: &str,
) -> Result<ConsolidatedModel> {
    let registry = repo.load_projects();
    let project = registry
        .get(company_id)
        .ok_or_else(|| ModelError::UnknownProject(company_id.to_string()))?;

    let mut documents = BTreeMap::new();
    for &year in &project.years {
        match repo.load_extraction(company_id, year) {
            Some(doc) => {
                documents.insert(year, doc);
            }
            None => debug!("{} has no extraction for {}", project.name, year),
        }
    }

    let adjustments = repo.load_adjustments(company_id);
    ModelBuilder::new(&adjustments).build_from_documents(&project.years, &documents)
}
