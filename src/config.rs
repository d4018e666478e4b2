use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use log::{error, info, warn};

use crate::csv::{CsvFileTable, CsvOptions};
use crate::error::Result;
use crate::json::{FieldFilter, JsonProjector};

const EXPORT_SETTINGS_FILE: &str = ".exportjson.csv";
const EXPORT_CONFIG_FILE: &str = "CONFIG_FILE";
const EXPORT_INCLUDED_FIELDS: &str = "INCLUDED_FIELDS";
const EXPORT_EXCLUDED_FIELDS: &str = "EXCLUDED_FIELDS";

/// The CSV tables loaded from one directory tree.
///
/// Tables are named by their path relative to the directory, lower-cased,
/// joined with `/` and without the `.csv` extension: `items/Weapons.csv`
/// is `items/weapons`.
pub struct ConfigSet {
    directory: PathBuf,
    tables: IndexMap<String, CsvFileTable>,
}

/// A single place to keep every loaded set of configuration tables, by tag.
///
/// It is based on an [`IndexMap`] registry, tags and tables keep the order
/// they were loaded in.
///
/// # Issues
/// - Loading a tag twice from different directories keeps the first
///   directory as the root for exports and write-backs.
pub struct ConfigRegistry {
    registry: IndexMap<String, ConfigSet>,
    options: CsvOptions,
}

impl ConfigSet {
    fn new(directory: &Path) -> ConfigSet {
        ConfigSet {
            directory: directory.to_path_buf(),
            tables: IndexMap::new(),
        }
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    pub fn table(&self, name: &str) -> Option<&CsvFileTable> {
        self.tables.get(&name.to_lowercase())
    }

    pub fn table_mut(&mut self, name: &str) -> Option<&mut CsvFileTable> {
        self.tables.get_mut(&name.to_lowercase())
    }

    pub fn table_names(&self) -> Vec<String> {
        self.tables.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    fn load_dir(&mut self, prefix: Option<&str>, directory: &Path, options: &CsvOptions) -> Result<()> {
        let mut files = Vec::new();
        let mut dirs = Vec::new();
        for entry in fs::read_dir(directory)? {
            let path = entry?.path();
            if path.is_dir() {
                dirs.push(path);
            } else {
                files.push(path);
            }
        }
        files.sort();
        dirs.sort();

        for file in files {
            let is_csv = file
                .extension()
                .is_some_and(|extension| extension.eq_ignore_ascii_case("csv"));
            let Some(file_name) = file.file_name().map(|name| name.to_string_lossy().into_owned()) else {
                continue;
            };
            if !is_csv || file_name.starts_with('.') {
                continue;
            }

            let stem = &file_name[..file_name.len() - ".csv".len()];
            let name = match prefix {
                Some(prefix) => format!("{}/{}", prefix, stem),
                None => stem.to_string(),
            }
            .to_lowercase();

            info!("loading csv config [{}], file \"{}\" ...", name, file.display());
            let mut table = CsvFileTable::new(options.clone());
            if let Err(err) = table.load_from_csv_file(&file) {
                error!("loading csv file \"{}\" failed: {}", file.display(), err);
                return Err(err);
            }
            info!("loading csv config [{}] done, {} rows loaded.", name, table.row_count());

            self.tables.insert(name, table);
        }

        for dir in dirs {
            let Some(dir_name) = dir.file_name().map(|name| name.to_string_lossy().into_owned()) else {
                continue;
            };
            let prefix = match prefix {
                Some(prefix) => format!("{}/{}", prefix, dir_name),
                None => dir_name,
            };
            self.load_dir(Some(&prefix), &dir, options)?;
        }

        Ok(())
    }
}

impl Default for ConfigRegistry {
    fn default() -> Self {
        ConfigRegistry::new(CsvOptions::default())
    }
}

impl ConfigRegistry {
    pub fn new(options: CsvOptions) -> ConfigRegistry {
        ConfigRegistry {
            registry: IndexMap::new(),
            options,
        }
    }

    pub fn exists(&self, tag: &str) -> bool {
        self.registry.contains_key(tag)
    }

    pub fn tags(&self) -> Vec<String> {
        self.registry.keys().cloned().collect()
    }

    pub fn load_config(&mut self, tag: &str, directory: impl AsRef<Path>) -> Result<usize> {
        //! Load every `*.csv` file below `directory` into the set `tag`.
        //! Files starting with a dot are skipped.
        //!
        //! Returns the number of tables in the set. A file that fails to load
        //! aborts the walk, tables loaded before it stay.

        let directory = directory.as_ref();
        info!("loading csv config [{}] from directory \"{}\"", tag, directory.display());

        let set = self
            .registry
            .entry(tag.to_string())
            .or_insert_with(|| ConfigSet::new(directory));
        set.load_dir(None, directory, &self.options)?;

        Ok(set.len())
    }

    pub fn config(&self, tag: &str) -> Option<&ConfigSet> {
        self.registry.get(tag)
    }

    pub fn config_mut(&mut self, tag: &str) -> Option<&mut ConfigSet> {
        self.registry.get_mut(tag)
    }

    pub fn export_as_json(&self, tag: &str, out_dir: impl AsRef<Path>) -> Result<usize> {
        //! Write the tables of `tag` as `<out_dir>/<name>.json`.
        //!
        //! Only tables listed in the `.exportjson.csv` of their directory are
        //! exported, with the fields it selects. The main index column is
        //! always kept when fields are selected.
        //!
        //! Returns the number of files written.

        let Some(set) = self.config(tag) else {
            return Ok(0);
        };
        let out_dir = out_dir.as_ref();

        let mut settings: HashMap<PathBuf, Option<HashMap<String, Option<FieldFilter>>>> =
            HashMap::new();
        let mut exported = 0;

        for (name, csv) in set.tables.iter() {
            let (Some(table), Some(path)) = (csv.table(), csv.path()) else {
                continue;
            };
            let (Some(directory), Some(stem)) = (path.parent(), path.file_stem()) else {
                continue;
            };

            if !settings.contains_key(directory) {
                let loaded = self.load_export_settings(directory)?;
                settings.insert(directory.to_path_buf(), loaded);
            }
            let Some(Some(setting)) = settings.get(directory) else {
                continue;
            };
            let Some(filter) = setting.get(&*stem.to_string_lossy()) else {
                continue;
            };

            let projector = match filter {
                Some(filter) => JsonProjector::for_table(table)
                    .with_filter(filter.clone())
                    .keep_main_index(true),
                None => JsonProjector::for_table(table),
            };

            let path = out_dir.join(format!("{}.json", name));
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(&path, projector.to_json())?;
            info!("csv config [{}] exported to \"{}\"", name, path.display());
            exported += 1;
        }

        Ok(exported)
    }

    fn load_export_settings(
        &self,
        directory: &Path,
    ) -> Result<Option<HashMap<String, Option<FieldFilter>>>> {
        let path = directory.join(EXPORT_SETTINGS_FILE);
        if !path.exists() {
            return Ok(None);
        }

        let mut csv = CsvFileTable::new(self.options.clone());
        csv.load_from_csv_file(&path)?;
        let Some(table) = csv.table().filter(|table| table.row_count() > 0) else {
            return Ok(None);
        };

        let mut settings = HashMap::new();
        for row in table.data_rows() {
            let Some(config_file) = row.field(EXPORT_CONFIG_FILE).as_string() else {
                continue;
            };
            if settings.contains_key(&config_file) {
                warn!(
                    "export setting: duplicated config file {} at path \"{}\"",
                    config_file,
                    directory.display()
                );
                continue;
            }

            let included = split_fields(row.field(EXPORT_INCLUDED_FIELDS).as_string());
            let excluded = split_fields(row.field(EXPORT_EXCLUDED_FIELDS).as_string());
            let filter = if !included.is_empty() {
                Some(FieldFilter::Only(included.into_iter().collect()))
            } else if !excluded.is_empty() {
                Some(FieldFilter::Exclude(excluded.into_iter().collect()))
            } else {
                None
            };
            settings.insert(config_file, filter);
        }

        Ok(Some(settings))
    }

    pub fn write_back(&self, tag: &str, name: &str, new_dir: Option<&Path>) -> Result<bool> {
        //! Write the table `name` of `tag` back to its file, see
        //! [`CsvFileTable::write_back`].
        //!
        //! Returns `false` when there is no such table.

        let Some(set) = self.config(tag) else {
            return Ok(false);
        };
        let Some(csv) = set.table(name) else {
            return Ok(false);
        };

        csv.write_back(Some(&set.directory), new_dir)?;
        Ok(true)
    }
}

fn split_fields(fields: Option<String>) -> Vec<String> {
    fields
        .unwrap_or_default()
        .split(';')
        .map(str::trim)
        .filter(|field| !field.is_empty())
        .map(str::to_string)
        .collect()
}
