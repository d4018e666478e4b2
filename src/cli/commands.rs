//! The commands of the command line.
//!
//! - tabstore inspect <file> [--json]
//! - tabstore json <file> [--only a,b] [--exclude c] [--keep-key]
//! - tabstore convert <file> <out> [--utf16] [--keep-dummy-rows]
//! - tabstore export <dir> <out> [--tag name]
//! - tabstore write-back <dir> <name> [--to new_dir]
//!
//! Every command loads its tables with the same [`CsvOptions`].

use std::path::Path;

use serde::Serialize;

use crate::cli::messages::{highlight_argument, system_message};
use crate::cli::parsers::CliCommand;
use crate::config::ConfigRegistry;
use crate::csv::{CsvFileTable, CsvOptions, TextEncoding};
use crate::error::Result;
use crate::json::JsonProjector;
use crate::persistence::{Table, TypeCode};

/// What `inspect --json` prints for a table.
#[derive(Serialize)]
struct TableSummary {
    name: String,
    row_count: usize,
    data_row_count: usize,
    columns: Vec<ColumnSummary>,
    rows: serde_json::Value,
}

#[derive(Serialize)]
struct ColumnSummary {
    field: String,
    #[serde(rename = "type")]
    type_code: TypeCode,
    key: bool,
}

fn table_summary(table: &Table) -> TableSummary {
    let columns = {
        let schema = table.schema();
        schema
            .columns()
            .iter()
            .enumerate()
            .map(|(col, (field, type_code))| ColumnSummary {
                field: field.clone(),
                type_code: *type_code,
                key: schema.main_index_col() == Some(col),
            })
            .collect()
    };

    TableSummary {
        name: table.name(),
        row_count: table.row_count(),
        data_row_count: table.data_row_count(),
        columns,
        rows: JsonProjector::for_table(table).to_json_value(),
    }
}

pub fn execute(command: CliCommand, options: CsvOptions) -> Result<()> {
    match command {
        CliCommand::Inspect { file, json } => inspect(&file, json, options),
        CliCommand::Json {
            file,
            only,
            exclude,
            keep_key,
        } => print_json(&file, only, exclude, keep_key, options),
        CliCommand::Convert {
            file,
            out,
            utf16,
            keep_dummy_rows,
        } => convert(&file, &out, utf16, keep_dummy_rows, options),
        CliCommand::Export { dir, out, tag } => export(&dir, &out, &tag, options),
        CliCommand::WriteBack { dir, name, to } => write_back(&dir, &name, to.as_deref(), options),
    }
}

fn load(file: &Path, options: CsvOptions) -> Result<CsvFileTable> {
    let mut csv = CsvFileTable::new(options);
    csv.load_from_csv_file(file)?;
    Ok(csv)
}

fn loaded_table(csv: &CsvFileTable) -> Option<&Table> {
    let table = csv.table();
    if table.is_none() {
        println!("{}", system_message("csv", "No table was loaded.".to_string()));
    }
    table
}

fn inspect(file: &Path, json: bool, options: CsvOptions) -> Result<()> {
    let csv = load(file, options)?;
    let Some(table) = loaded_table(&csv) else {
        return Ok(());
    };

    println!(
        "{}",
        system_message(
            "csv",
            format!(
                "Table {}: {} rows, {} data rows, {} columns.",
                highlight_argument(&table.name()),
                table.row_count(),
                table.data_row_count(),
                table.schema().column_count()
            )
        )
    );

    if json {
        match serde_json::to_string_pretty(&table_summary(table)) {
            Ok(text) => println!("{}", text),
            Err(err) => println!("{}", system_message("json", err.to_string())),
        }
    } else {
        println!("{}", table);
    }

    Ok(())
}

fn print_json(
    file: &Path,
    only: Vec<String>,
    exclude: Vec<String>,
    keep_key: bool,
    options: CsvOptions,
) -> Result<()> {
    let csv = load(file, options)?;
    let Some(table) = loaded_table(&csv) else {
        return Ok(());
    };

    let mut projector = JsonProjector::for_table(table).keep_main_index(keep_key);
    if !only.is_empty() {
        projector = projector.only_fields(only);
    }
    for field in exclude.iter() {
        projector = projector.exclude_field(field);
    }

    println!("{}", projector.to_json());
    Ok(())
}

fn convert(
    file: &Path,
    out: &Path,
    utf16: bool,
    keep_dummy_rows: bool,
    options: CsvOptions,
) -> Result<()> {
    let separator = options.separator;
    let csv = load(
        file,
        CsvOptions {
            save_dummy_rows: keep_dummy_rows,
            ..options
        },
    )?;

    let encoding = if utf16 {
        TextEncoding::Utf16Le
    } else {
        TextEncoding::Utf8
    };
    let separator = separator.unwrap_or_else(|| encoding.default_separator());
    csv.save_table_to_csv(out, encoding, separator)?;

    println!(
        "{}",
        system_message(
            "csv",
            format!(
                "Written {} as {}.",
                highlight_argument(&out.display().to_string()),
                encoding.name()
            )
        )
    );
    Ok(())
}

fn export(dir: &Path, out: &Path, tag: &str, options: CsvOptions) -> Result<()> {
    let mut registry = ConfigRegistry::new(options);
    let loaded = registry.load_config(tag, dir)?;
    let exported = registry.export_as_json(tag, out)?;

    println!(
        "{}",
        system_message(
            "export",
            format!(
                "{} of {} tables exported to {}.",
                exported,
                loaded,
                highlight_argument(&out.display().to_string())
            )
        )
    );
    Ok(())
}

fn write_back(dir: &Path, name: &str, to: Option<&Path>, options: CsvOptions) -> Result<()> {
    let tag = "config";
    let mut registry = ConfigRegistry::new(options);
    registry.load_config(tag, dir)?;

    let message = if registry.write_back(tag, name, to)? {
        format!("Table {} written back.", highlight_argument(name))
    } else {
        format!("No table {} below {}.", highlight_argument(name), dir.display())
    };
    println!("{}", system_message("csv", message));
    Ok(())
}
