use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use encoding_rs::{Encoding, UTF_8, UTF_16BE, UTF_16LE, WINDOWS_1252};
use log::{debug, error, info, warn};
use md5::{Digest, Md5};

use super::encoding::{DetectedEncoding, EncodingDetector};
use super::parser::RowParser;
use crate::error::{Result, TableError};
use crate::persistence::{Row, Schema, Table, TypeCode, Value};

const DETECT_CHUNK_SIZE: usize = 4096;
const LINE_END: &str = "\r\n";

/// How the bytes of a CSV file map to text.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TextEncoding {
    Utf8,
    Utf8Bom,
    Utf16Le,
    Utf16Be,
    /// A single byte code page such as Windows-1252.
    Legacy(&'static Encoding),
}

impl TextEncoding {
    pub fn from_detected(detected: DetectedEncoding, fallback: &'static Encoding) -> TextEncoding {
        match detected {
            DetectedEncoding::Utf8Bom => TextEncoding::Utf8Bom,
            DetectedEncoding::Utf8NoBom => TextEncoding::Utf8,
            DetectedEncoding::Utf16LeBom => TextEncoding::Utf16Le,
            DetectedEncoding::Utf16BeBom => TextEncoding::Utf16Be,
            DetectedEncoding::Ascii | DetectedEncoding::Ansi | DetectedEncoding::Unknown => {
                TextEncoding::from_encoding(detected.encoding(fallback))
            }
        }
    }

    pub fn from_encoding(encoding: &'static Encoding) -> TextEncoding {
        if encoding == UTF_8 {
            TextEncoding::Utf8
        } else if encoding == UTF_16LE {
            TextEncoding::Utf16Le
        } else if encoding == UTF_16BE {
            TextEncoding::Utf16Be
        } else {
            TextEncoding::Legacy(encoding)
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            TextEncoding::Utf8 => "UTF-8",
            TextEncoding::Utf8Bom => "UTF-8 (BOM)",
            TextEncoding::Utf16Le => "UTF-16LE",
            TextEncoding::Utf16Be => "UTF-16BE",
            TextEncoding::Legacy(encoding) => encoding.name(),
        }
    }

    pub fn default_separator(&self) -> char {
        //! Spreadsheet programs only split UTF-16 text on tabs.

        match self {
            TextEncoding::Utf16Le | TextEncoding::Utf16Be => '\t',
            _ => ',',
        }
    }

    fn decoder(&self) -> &'static Encoding {
        match self {
            TextEncoding::Utf8 | TextEncoding::Utf8Bom => UTF_8,
            TextEncoding::Utf16Le => UTF_16LE,
            TextEncoding::Utf16Be => UTF_16BE,
            TextEncoding::Legacy(encoding) => *encoding,
        }
    }

    fn bom(&self) -> &'static [u8] {
        match self {
            TextEncoding::Utf8Bom => &[0xEF, 0xBB, 0xBF],
            TextEncoding::Utf16Le => &[0xFF, 0xFE],
            TextEncoding::Utf16Be => &[0xFE, 0xFF],
            TextEncoding::Utf8 | TextEncoding::Legacy(_) => &[],
        }
    }

    pub fn decode(&self, bytes: &[u8]) -> String {
        //! Decode `bytes`, skipping a leading byte order mark of this
        //! encoding. Malformed sequences become U+FFFD.

        let bom = match self {
            TextEncoding::Utf8 => &[0xEF, 0xBB, 0xBF][..],
            other => other.bom(),
        };
        let bytes = bytes.strip_prefix(bom).unwrap_or(bytes);
        let (text, had_errors) = self.decoder().decode_without_bom_handling(bytes);
        if had_errors {
            debug!("malformed {} sequences replaced while decoding", self.name());
        }
        text.into_owned()
    }

    pub fn encode(&self, text: &str) -> Vec<u8> {
        //! Encode `text` with the byte order mark of this encoding.

        let mut bytes = self.bom().to_vec();
        match self {
            TextEncoding::Utf8 | TextEncoding::Utf8Bom => bytes.extend_from_slice(text.as_bytes()),
            TextEncoding::Utf16Le => text
                .encode_utf16()
                .for_each(|unit| bytes.extend_from_slice(&unit.to_le_bytes())),
            TextEncoding::Utf16Be => text
                .encode_utf16()
                .for_each(|unit| bytes.extend_from_slice(&unit.to_be_bytes())),
            TextEncoding::Legacy(encoding) => {
                let (encoded, _, had_unmappable) = encoding.encode(text);
                if had_unmappable {
                    warn!("characters not representable in {} were replaced", encoding.name());
                }
                bytes.extend_from_slice(&encoded);
            }
        }
        bytes
    }
}

/// Settings shared by every CSV table of a process.
#[derive(Clone, Debug)]
pub struct CsvOptions {
    /// Overrides the separator picked from the detected encoding.
    pub separator: Option<char>,
    /// Decoder for files that carry no byte order mark and no UTF-8
    /// multi-byte sequence.
    pub fallback_encoding: &'static Encoding,
    /// Write dummy rows too when saving.
    pub save_dummy_rows: bool,
}

impl Default for CsvOptions {
    fn default() -> Self {
        CsvOptions {
            separator: None,
            fallback_encoding: WINDOWS_1252,
            save_dummy_rows: false,
        }
    }
}

impl CsvOptions {
    pub fn with_fallback_label(mut self, label: &str) -> Option<CsvOptions> {
        //! Pick the fallback encoding by its WHATWG label, such as `gbk` or
        //! `latin1`.

        self.fallback_encoding = Encoding::for_label(label.trim().as_bytes())?;
        Some(self)
    }
}

/// A [`Table`] backed by a CSV file.
///
/// The file holds one header line of type tokens, one of field names, then
/// one line per row. Blank lines are kept as dummy rows. The first column is
/// the main index when its type allows it.
pub struct CsvFileTable {
    table: Option<Table>,
    path: Option<PathBuf>,
    options: CsvOptions,
}

impl CsvFileTable {
    pub fn new(options: CsvOptions) -> CsvFileTable {
        CsvFileTable {
            table: None,
            path: None,
            options,
        }
    }

    pub fn from_table(table: Table, options: CsvOptions) -> CsvFileTable {
        CsvFileTable {
            table: Some(table),
            path: None,
            options,
        }
    }

    pub fn table(&self) -> Option<&Table> {
        self.table.as_ref()
    }

    pub fn table_mut(&mut self) -> Option<&mut Table> {
        self.table.as_mut()
    }

    pub fn into_table(self) -> Option<Table> {
        self.table
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn options(&self) -> &CsvOptions {
        &self.options
    }

    pub fn set_options(&mut self, options: CsvOptions) {
        self.options = options;
    }

    pub fn row_count(&self) -> usize {
        self.table.as_ref().map_or(0, Table::row_count)
    }

    pub fn load_from_csv_file(&mut self, path: impl AsRef<Path>) -> Result<()> {
        //! Load the table from `path`, detecting its encoding.
        //!
        //! UTF-16 files are split on tabs, everything else on commas, unless
        //! [`CsvOptions::separator`] says otherwise.

        let path = path.as_ref();
        let bytes = self.read(path)?;

        let mut detector = EncodingDetector::new();
        for (index, chunk) in bytes.chunks(DETECT_CHUNK_SIZE).enumerate() {
            detector.update(chunk, index == 0);
            if !detector.is_ambiguous() {
                break;
            }
        }

        let encoding = TextEncoding::from_detected(detector.detected(), self.options.fallback_encoding);
        if detector.is_ambiguous() || detector.detected() == DetectedEncoding::Unknown {
            debug!(
                "no encoding detected for \"{}\", reading it as {}",
                path.display(),
                encoding.name()
            );
        }

        let separator = self
            .options
            .separator
            .unwrap_or_else(|| encoding.default_separator());
        let text = encoding.decode(&bytes);
        self.load_text(path, &text, separator)
    }

    pub fn load_from_csv_file_with(
        &mut self,
        path: impl AsRef<Path>,
        encoding: TextEncoding,
        separator: char,
    ) -> Result<()> {
        let path = path.as_ref();
        let bytes = self.read(path)?;
        let text = encoding.decode(&bytes);
        self.load_text(path, &text, separator)
    }

    fn read(&self, path: &Path) -> Result<Vec<u8>> {
        fs::read(path).map_err(|err| {
            error!("load csv table file: \"{}\" failed, error: {}", path.display(), err);
            TableError::from(err)
        })
    }

    fn load_text(&mut self, path: &Path, text: &str, separator: char) -> Result<()> {
        let name = path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_default();

        match parse_table(&name, text, separator) {
            Ok(table) => {
                debug!(
                    "csv table <{}> loaded from \"{}\": {} rows",
                    name,
                    path.display(),
                    table.row_count()
                );
                self.table = Some(table);
                self.path = Some(path.to_path_buf());
                Ok(())
            }
            Err(err) => {
                error!("load csv table file: \"{}\" failed, error: {}", path.display(), err);
                Err(err)
            }
        }
    }

    pub fn save_table_to_csv(
        &self,
        path: impl AsRef<Path>,
        encoding: TextEncoding,
        separator: char,
    ) -> Result<()> {
        self.save(path.as_ref(), encoding, separator, self.options.save_dummy_rows)
    }

    fn save(
        &self,
        path: &Path,
        encoding: TextEncoding,
        separator: char,
        save_dummy_rows: bool,
    ) -> Result<()> {
        let Some(table) = &self.table else {
            debug!("nothing to save at \"{}\": no table loaded", path.display());
            return Ok(());
        };

        let text = serialize_table(table, separator, save_dummy_rows);
        fs::write(path, encoding.encode(&text)).map_err(|err| {
            error!("create table file: \"{}\" failed, error: {}", path.display(), err);
            TableError::from(err)
        })
    }

    pub fn write_back(&self, directory: Option<&Path>, new_dir: Option<&Path>) -> Result<()> {
        //! Save the table over the file it was loaded from.
        //!
        //! The table is first written to `<file>.temp.csv` as tab separated
        //! UTF-16LE, dummy rows included. Without `new_dir` the original file
        //! is kept as `<file>.<md5>.bak` (once per content). With `new_dir`
        //! the result goes to the same path relative to `directory` below
        //! `new_dir`, and the original is left alone.

        let Some(origin) = self.path.clone() else {
            return Err(TableError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "the table was not loaded from a file",
            )));
        };
        let directory = directory
            .map(Path::to_path_buf)
            .or_else(|| origin.parent().map(Path::to_path_buf))
            .unwrap_or_default();

        let temp = with_suffix(&origin, ".temp.csv");
        if temp.exists() {
            fs::remove_file(&temp)?;
        }
        ensure_parent(&temp)?;
        self.save(&temp, TextEncoding::Utf16Le, '\t', true)?;

        if new_dir.is_none() && origin.exists() {
            let backup = with_suffix(&origin, &format!(".{}.bak", md5_of_file(&origin)?));
            if !backup.exists() {
                fs::rename(&origin, &backup)?;
                info!("backup of \"{}\" kept at \"{}\"", origin.display(), backup.display());
            }
        }

        let target = match new_dir {
            Some(new_dir) => {
                let relative = origin
                    .strip_prefix(&directory)
                    .map(Path::to_path_buf)
                    .unwrap_or_else(|_| origin.file_name().map(PathBuf::from).unwrap_or_default());
                new_dir.join(relative)
            }
            None => origin,
        };

        ensure_parent(&target)?;
        if target.exists() {
            fs::remove_file(&target)?;
        }
        fs::rename(&temp, &target)
            .or_else(|_| fs::copy(&temp, &target).and_then(|_| fs::remove_file(&temp)))?;

        info!("csv table written back to \"{}\"", target.display());
        Ok(())
    }

    pub fn new_empty_record(&mut self) -> Option<Arc<Row>> {
        //! Append a new blank row, it stays a dummy row until it is given a
        //! key.

        let table = self.table.as_mut()?;
        let row = table.build_row();
        table.append_as_dummy_row(Arc::clone(&row)).ok()?;
        Some(row)
    }

    pub fn create_row_by_key(&mut self, key: &str) -> Result<Option<Arc<Row>>> {
        //! Add a new data row whose main index column holds `key`.
        //!
        //! Returns [`None`] without a table or without a main index.

        let Some(table) = self.table.as_mut() else {
            return Ok(None);
        };
        let Some(col) = table.main_index_col() else {
            return Ok(None);
        };
        let type_code = table.schema().type_of_col(col);

        let invalid_key = || TableError::InvalidKey {
            key: key.to_string(),
            table: table.name(),
        };
        let value = Value::parse(key, type_code)
            .ok()
            .flatten()
            .ok_or_else(invalid_key)?;

        let row = table.build_row();
        row.set(col, Some(value));
        table.add_row_by_key(key, Arc::clone(&row), false)?;
        Ok(Some(row))
    }

    pub fn get_row_by_key(&self, key: &str) -> Option<Arc<Row>> {
        self.table.as_ref()?.get_row_by_key(key)
    }

    pub fn get_row_by_int_key(&self, key: i64) -> Option<Arc<Row>> {
        self.table.as_ref()?.get_row_by_int_key(key)
    }

    pub fn first_data_row(&self) -> Option<Arc<Row>> {
        self.table.as_ref()?.first_data_row()
    }

    pub fn last_data_row(&self) -> Option<Arc<Row>> {
        self.table.as_ref()?.last_data_row()
    }
}

fn parse_header(parser: &mut RowParser, line: Option<&str>, number: usize) -> Result<Vec<String>> {
    let line = line.ok_or(TableError::MissingHeader { line: number })?;
    parser.set_line(line);
    Ok(parser.columns().collect())
}

fn parse_table(name: &str, text: &str, separator: char) -> Result<Table> {
    let mut parser = RowParser::new(separator);
    let mut lines = text.lines();

    let types = parse_header(&mut parser, lines.next(), 1)?;
    let fields = parse_header(&mut parser, lines.next(), 2)?;
    if types.len() != fields.len() {
        return Err(TableError::HeaderMismatch {
            types: types.len(),
            fields: fields.len(),
        });
    }

    let columns = fields
        .into_iter()
        .zip(types.iter().map(|token| TypeCode::from_token(token)))
        .collect();
    let schema = Schema::new(name, columns, Some(0))?;
    let column_count = schema.column_count();
    let main_index_col = schema.main_index_col();
    let mut table = Table::new(schema);

    for (offset, line) in lines.enumerate() {
        let row = table.build_row();
        if line.is_empty() {
            table.append_as_dummy_row(row)?;
            continue;
        }

        parser.set_line(line);
        let mut contents: Vec<String> = parser.columns().take(column_count).collect();
        contents.resize(column_count, String::new());
        row.deserialize_from_strings(&contents);

        let key = main_index_col
            .map(|col| contents[col].clone())
            .filter(|key| !key.is_empty());
        let label = key.clone().unwrap_or_else(|| format!("line {}", offset + 3));

        let duplicated = key
            .as_deref()
            .is_some_and(|key| table.get_row_by_key(key).is_some());
        if duplicated {
            warn!("csv table error: <{}> row [\"{}\"]: duplicated!", name, label);
        } else if let Err(err) = table.attach_row(Arc::clone(&row), false) {
            warn!("csv table error: <{}> row [\"{}\"]: {}", name, label, err);
        }

        for entry in row.deserializing_error_log() {
            warn!("csv table error: <{}> row [\"{}\"]: {}", name, label, entry);
        }
    }

    table.clear_dirty_flag();
    Ok(table)
}

fn serialize_line(values: &[String], separator: char, quote: bool) -> String {
    let columns: Vec<String> = values
        .iter()
        .map(|value| {
            if quote && value.contains(separator) {
                format!("\"{}\"", value.replace('"', "\"\""))
            } else {
                value.clone()
            }
        })
        .collect();
    columns.join(&separator.to_string())
}

fn serialize_table(table: &Table, separator: char, save_dummy_rows: bool) -> String {
    let mut text = String::new();
    {
        let schema = table.schema();
        text.push_str(&serialize_line(&schema.type_tokens(), separator, false));
        text.push_str(LINE_END);
        text.push_str(&serialize_line(&schema.field_names(), separator, false));
        text.push_str(LINE_END);
    }

    for row in table.all_rows() {
        if !save_dummy_rows && row.is_dummy_row() {
            continue;
        }
        text.push_str(&serialize_line(&row.serialize_to_strings(), separator, true));
        text.push_str(LINE_END);
    }
    text
}

fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(suffix);
    PathBuf::from(name)
}

fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    Ok(())
}

fn md5_of_file(path: &Path) -> Result<String> {
    let bytes = fs::read(path)?;
    Ok(hex::encode(Md5::digest(&bytes)))
}
