//! Resolution pipeline: reads data files, resolves cross-references, builds
//! the core [`Registry`] and the run's [`SimConfig`].
//!
//! Provides format detection (RON/JSON/TOML), file discovery, and
//! deserialization helpers, plus [`load_game_data`] which ties them together.

use crate::schema::{AmountData, DrillData, ItemData, MachineData, RecipeData, RecipeEntryData};
use clocksim_core::config::SimConfig;
use clocksim_core::id::{ItemTypeId, RecipeId};
use clocksim_core::rational::{Ratio, zero};
use clocksim_core::registry::{RecipeEntry, Registry, RegistryBuilder, RegistryError};
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

// ===========================================================================
// Errors
// ===========================================================================

/// Errors that can occur during data loading.
#[derive(Debug, thiserror::Error)]
pub enum DataLoadError {
    /// A required data file was not found in the given directory.
    #[error("required file '{file}' not found in {dir}")]
    MissingRequired { file: String, dir: PathBuf },

    #[error("unsupported format for file: {file}")]
    UnsupportedFormat { file: PathBuf },

    /// Two files with the same base name but different formats exist.
    #[error("conflicting formats: {a} and {b}")]
    ConflictingFormats { a: PathBuf, b: PathBuf },

    #[error("parse error in {file}: {detail}")]
    Parse { file: PathBuf, detail: String },

    /// A name reference could not be resolved.
    #[error("unresolved {expected_kind} reference '{name}' in {file}")]
    UnresolvedRef {
        file: PathBuf,
        name: String,
        expected_kind: &'static str,
    },

    #[error("duplicate name '{name}' in {file}")]
    DuplicateName { file: PathBuf, name: String },

    /// A quantity failed to parse or is out of range for its field.
    #[error("invalid amount for '{name}' in {file}: {detail}")]
    InvalidAmount {
        file: PathBuf,
        name: String,
        detail: String,
    },

    #[error("invalid configuration in {file}: {detail}")]
    InvalidConfig { file: PathBuf, detail: String },

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

// ===========================================================================
// Format detection
// ===========================================================================

/// Supported data file formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Ron,
    Toml,
    Json,
}

/// Detect the format of a file based on its extension.
pub fn detect_format(path: &Path) -> Result<Format, DataLoadError> {
    match path.extension().and_then(|e| e.to_str()) {
        Some("ron") => Ok(Format::Ron),
        Some("toml") => Ok(Format::Toml),
        Some("json") => Ok(Format::Json),
        _ => Err(DataLoadError::UnsupportedFormat {
            file: path.to_path_buf(),
        }),
    }
}

// ===========================================================================
// File discovery
// ===========================================================================

/// Scan a directory for a data file with the given base name (without extension).
///
/// Looks for `{base_name}.ron`, `{base_name}.toml`, and `{base_name}.json`.
/// Returns `Ok(None)` if no file is found, or `Err(ConflictingFormats)` if
/// multiple formats exist for the same base name.
pub fn find_data_file(dir: &Path, base_name: &str) -> Result<Option<PathBuf>, DataLoadError> {
    let mut found: Option<PathBuf> = None;

    for ext in ["ron", "toml", "json"] {
        let candidate = dir.join(format!("{base_name}.{ext}"));
        if candidate.exists() {
            if let Some(existing) = found {
                return Err(DataLoadError::ConflictingFormats {
                    a: existing,
                    b: candidate,
                });
            }
            found = Some(candidate);
        }
    }

    Ok(found)
}

/// Like [`find_data_file`], but returns an error if no file is found.
pub fn require_data_file(dir: &Path, base_name: &str) -> Result<PathBuf, DataLoadError> {
    find_data_file(dir, base_name)?.ok_or_else(|| DataLoadError::MissingRequired {
        file: base_name.to_string(),
        dir: dir.to_path_buf(),
    })
}

// ===========================================================================
// Deserialization
// ===========================================================================

fn parse_error(path: &Path, detail: impl ToString) -> DataLoadError {
    DataLoadError::Parse {
        file: path.to_path_buf(),
        detail: detail.to_string(),
    }
}

/// Read a file and deserialize it according to its format (detected from extension).
pub fn deserialize_file<T: DeserializeOwned>(path: &Path) -> Result<T, DataLoadError> {
    let format = detect_format(path)?;
    let content = std::fs::read_to_string(path)?;

    match format {
        Format::Ron => ron::from_str(&content).map_err(|e| parse_error(path, e)),
        Format::Json => serde_json::from_str(&content).map_err(|e| parse_error(path, e)),
        Format::Toml => toml::from_str(&content).map_err(|e| parse_error(path, e)),
    }
}

/// Deserialize a list from a file. For TOML files, extracts the array at the
/// given `toml_key` from a top-level table. For RON and JSON, deserializes
/// directly as `Vec<T>`.
pub fn deserialize_list<T: DeserializeOwned>(
    path: &Path,
    toml_key: &str,
) -> Result<Vec<T>, DataLoadError> {
    let format = detect_format(path)?;
    let content = std::fs::read_to_string(path)?;

    match format {
        Format::Ron => ron::from_str(&content).map_err(|e| parse_error(path, e)),
        Format::Json => serde_json::from_str(&content).map_err(|e| parse_error(path, e)),
        Format::Toml => {
            let mut table: toml::Table =
                toml::from_str(&content).map_err(|e| parse_error(path, e))?;
            let array = table
                .remove(toml_key)
                .ok_or_else(|| parse_error(path, format!("missing key '{toml_key}' in TOML file")))?;
            array
                .try_into()
                .map_err(|e: toml::de::Error| parse_error(path, e))
        }
    }
}

// ===========================================================================
// Name resolution helpers
// ===========================================================================

/// Look up a name in a map, returning an `UnresolvedRef` error if not found.
pub fn resolve_name<'a, V>(
    map: &'a HashMap<String, V>,
    name: &str,
    file: &Path,
    expected_kind: &'static str,
) -> Result<&'a V, DataLoadError> {
    map.get(name).ok_or_else(|| DataLoadError::UnresolvedRef {
        file: file.to_path_buf(),
        name: name.to_string(),
        expected_kind,
    })
}

/// Check whether a name already exists in a map, returning a `DuplicateName`
/// error if so.
pub fn check_duplicate<V>(
    map: &HashMap<String, V>,
    name: &str,
    file: &Path,
) -> Result<(), DataLoadError> {
    if map.contains_key(name) {
        Err(DataLoadError::DuplicateName {
            file: file.to_path_buf(),
            name: name.to_string(),
        })
    } else {
        Ok(())
    }
}

// ===========================================================================
// Amount conversion
// ===========================================================================

#[derive(Clone, Copy)]
enum Bound {
    Positive,
    NonNegative,
}

fn convert_amount(
    amount: &AmountData,
    bound: Bound,
    file: &Path,
    name: &str,
) -> Result<Ratio, DataLoadError> {
    let invalid = |detail: String| DataLoadError::InvalidAmount {
        file: file.to_path_buf(),
        name: name.to_string(),
        detail,
    };
    let value = amount.to_ratio().map_err(|e| invalid(e.to_string()))?;
    match bound {
        Bound::Positive if value <= zero() => Err(invalid(format!("{value} must be positive"))),
        Bound::NonNegative if value < zero() => {
            Err(invalid(format!("{value} must not be negative")))
        }
        _ => Ok(value),
    }
}

fn optional_amount(
    amount: Option<&AmountData>,
    file: &Path,
    name: &str,
) -> Result<Ratio, DataLoadError> {
    amount.map_or_else(
        || Ok(zero()),
        |amount| convert_amount(amount, Bound::NonNegative, file, name),
    )
}

fn resolve_entries(
    entries: &[RecipeEntryData],
    item_ids: &HashMap<String, ItemTypeId>,
    file: &Path,
    recipe: &str,
) -> Result<Vec<RecipeEntry>, DataLoadError> {
    entries
        .iter()
        .map(|entry| {
            let item = *resolve_name(item_ids, entry.item(), file, "item")?;
            let amount = convert_amount(entry.amount(), Bound::Positive, file, recipe)?;
            Ok(RecipeEntry::new(item, amount))
        })
        .collect()
}

// ===========================================================================
// Loading pipeline
// ===========================================================================

/// Everything one run needs from the data directory.
#[derive(Debug, Clone)]
pub struct GameData {
    pub registry: Registry,
    pub config: SimConfig,
}

/// Load `items`, `recipes` and `machines` (required) plus `drills` and `sim`
/// (optional) from `dir`.
///
/// Each file may be `.ron`, `.toml` or `.json`. A missing `sim` file yields
/// [`SimConfig::default`].
pub fn load_game_data(dir: &Path) -> Result<GameData, DataLoadError> {
    let items_path = require_data_file(dir, "items")?;
    let recipes_path = require_data_file(dir, "recipes")?;
    let machines_path = require_data_file(dir, "machines")?;
    let drills_path = find_data_file(dir, "drills")?;
    let config_path = find_data_file(dir, "sim")?;

    let mut builder = RegistryBuilder::new();

    // Items first: recipes refer to them by name.
    let items: Vec<ItemData> = deserialize_list(&items_path, "items")?;
    let mut item_ids: HashMap<String, ItemTypeId> = HashMap::new();
    for item in &items {
        check_duplicate(&item_ids, &item.name, &items_path)?;
        if item.stack_size == 0 {
            return Err(DataLoadError::InvalidAmount {
                file: items_path.clone(),
                name: item.name.clone(),
                detail: "stack_size must be positive".to_string(),
            });
        }
        let id = match &item.mining_time {
            Some(time) => {
                let time = convert_amount(time, Bound::Positive, &items_path, &item.name)?;
                builder.register_resource(&item.name, item.stack_size, time)
            }
            None => builder.register_item(&item.name, item.stack_size),
        };
        item_ids.insert(item.name.clone(), id);
    }

    let recipes: Vec<RecipeData> = deserialize_list(&recipes_path, "recipes")?;
    let mut recipe_ids: HashMap<String, RecipeId> = HashMap::new();
    for recipe in &recipes {
        check_duplicate(&recipe_ids, &recipe.name, &recipes_path)?;
        let energy = convert_amount(
            &recipe.energy_required,
            Bound::Positive,
            &recipes_path,
            &recipe.name,
        )?;
        let ingredients = resolve_entries(&recipe.ingredients, &item_ids, &recipes_path, &recipe.name)?;
        let products = resolve_entries(&recipe.products, &item_ids, &recipes_path, &recipe.name)?;
        let id = builder.register_recipe(&recipe.name, energy, ingredients, products);
        recipe_ids.insert(recipe.name.clone(), id);
    }

    let machines: Vec<MachineData> = deserialize_list(&machines_path, "machines")?;
    let mut machine_names: HashMap<String, ()> = HashMap::new();
    for machine in &machines {
        check_duplicate(&machine_names, &machine.name, &machines_path)?;
        let speed = convert_amount(
            &machine.crafting_speed,
            Bound::Positive,
            &machines_path,
            &machine.name,
        )?;
        let productivity =
            optional_amount(machine.productivity.as_ref(), &machines_path, &machine.name)?;
        builder.register_machine(&machine.name, speed, productivity);
        machine_names.insert(machine.name.clone(), ());
    }

    let mut drill_count = 0;
    if let Some(drills_path) = &drills_path {
        let drills: Vec<DrillData> = deserialize_list(drills_path, "drills")?;
        let mut drill_names: HashMap<String, ()> = HashMap::new();
        for drill in &drills {
            check_duplicate(&drill_names, &drill.name, drills_path)?;
            let speed = convert_amount(&drill.mining_speed, Bound::Positive, drills_path, &drill.name)?;
            let productivity =
                optional_amount(drill.productivity.as_ref(), drills_path, &drill.name)?;
            builder.register_drill(&drill.name, speed, productivity);
            drill_names.insert(drill.name.clone(), ());
        }
        drill_count = drills.len();
    }

    let registry = builder.build()?;

    let config = match &config_path {
        Some(path) => {
            let config: SimConfig = deserialize_file(path)?;
            config.validate().map_err(|e| DataLoadError::InvalidConfig {
                file: path.clone(),
                detail: e.to_string(),
            })?;
            config
        }
        None => SimConfig::default(),
    };

    tracing::info!(
        items = items.len(),
        recipes = recipes.len(),
        machines = machines.len(),
        drills = drill_count,
        "loaded game data from {}",
        dir.display()
    );

    Ok(GameData { registry, config })
}

// ===========================================================================
// Tests
// ===========================================================================
