#[cfg(test)]
mod file_table {
    use std::fs;
    use std::path::{Path, PathBuf};

    use tabstore::csv::{CsvFileTable, CsvOptions, TextEncoding};
    use tabstore::persistence::{TypeCode, Value};

    const PEOPLE: &str = "INT,STRING,DOUBLE\r\nID,Name,Score\r\n1,Jansen,1.5\r\n2,\"Bonega, Lorem\",2\r\n\r\n3,Jimmy,\r\n";

    fn _write_file(dir: &Path, name: &str, bytes: &[u8]) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, bytes).unwrap();
        path
    }

    fn _load(path: &Path) -> CsvFileTable {
        let mut csv = CsvFileTable::new(CsvOptions::default());
        csv.load_from_csv_file(path).unwrap();
        csv
    }

    fn _backups(dir: &Path) -> Vec<PathBuf> {
        fs::read_dir(dir)
            .unwrap()
            .map(|entry| entry.unwrap().path())
            .filter(|path| path.to_string_lossy().ends_with(".bak"))
            .collect()
    }

    #[test]
    fn csv_load_builds_typed_keyed_table() {
        let dir = tempfile::tempdir().unwrap();
        let path = _write_file(dir.path(), "People.csv", PEOPLE.as_bytes());

        let csv = _load(&path);
        let table = csv.table().unwrap();

        assert_eq!(table.name(), "People");
        assert_eq!(csv.path(), Some(path.as_path()));
        assert_eq!(table.main_index_col(), Some(0));
        assert_eq!(
            table.columns(),
            vec![
                ("ID".to_string(), TypeCode::Int32),
                ("Name".to_string(), TypeCode::String),
                ("Score".to_string(), TypeCode::Double),
            ]
        );
        assert_eq!(table.row_count(), 4);
        assert_eq!(table.data_row_count(), 3);

        let second = csv.get_row_by_int_key(2).unwrap();
        assert_eq!(second.get(1), Some(Value::String("Bonega, Lorem".to_string())));
        assert_eq!(second.get(2), Some(Value::Double(2.0)));
        assert!(csv.get_row_by_key("3").unwrap().is_null(2));
        assert!(table.dirty_rows().is_empty());
    }

    #[test]
    fn csv_bad_cells_make_dummy_rows() {
        let dir = tempfile::tempdir().unwrap();
        let text = "INT,STRING\r\nID,Name\r\nabc,Jansen\r\n2,Bonega\r\n2,Lorem\r\n";
        let path = _write_file(dir.path(), "people.csv", text.as_bytes());

        let csv = _load(&path);
        let table = csv.table().unwrap();

        // the duplicated key 2 is dropped
        assert_eq!(table.row_count(), 2);
        assert_eq!(table.data_row_count(), 1);

        let broken = &table.all_rows()[0];
        assert!(broken.is_dummy_row());
        assert!(!broken.is_well_typed_key());
        assert_eq!(broken.deserializing_error_log().len(), 1);
        assert_eq!(broken.get(0), Some(Value::String("abc".to_string())));

        assert_eq!(
            csv.get_row_by_key("2").unwrap().get(1),
            Some(Value::String("Bonega".to_string()))
        );
    }

    #[test]
    fn csv_save_and_reload_keeps_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = _write_file(dir.path(), "people.csv", PEOPLE.as_bytes());
        let mut csv = _load(&path);

        let row = csv.create_row_by_key("4").unwrap().unwrap();
        row.set(1, Some(Value::String("Quote \"q\", comma".to_string())));
        row.set(2, Some(Value::Double(-0.25)));

        let saved = dir.path().join("saved.csv");
        csv.save_table_to_csv(&saved, TextEncoding::Utf8, ',').unwrap();

        let text = fs::read_to_string(&saved).unwrap();
        assert!(text.starts_with("INT,STRING,DOUBLE\r\nID,Name,Score\r\n"));
        assert!(text.contains("2,\"Bonega, Lorem\",2\r\n"));
        // blank line rows are dropped without save_dummy_rows
        assert!(!text.contains("\r\n\r\n"));

        let reloaded = _load(&saved);
        let table = reloaded.table().unwrap();
        assert_eq!(table.data_row_count(), 4);
        assert_eq!(table.row_count(), 4);

        let row = reloaded.get_row_by_int_key(4).unwrap();
        assert_eq!(row.get(1), Some(Value::String("Quote \"q\", comma".to_string())));
        assert_eq!(row.get(2), Some(Value::Double(-0.25)));
    }

    #[test]
    fn csv_save_can_keep_dummy_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = _write_file(dir.path(), "people.csv", PEOPLE.as_bytes());
        let mut csv = _load(&path);
        csv.set_options(CsvOptions {
            save_dummy_rows: true,
            ..CsvOptions::default()
        });

        let saved = dir.path().join("saved.csv");
        csv.save_table_to_csv(&saved, TextEncoding::Utf8, ',').unwrap();

        let reloaded = _load(&saved);
        assert_eq!(reloaded.row_count(), 4);
        assert!(reloaded.table().unwrap().all_rows()[2].is_dummy_row());
    }

    #[test]
    fn csv_utf16_files_are_tab_separated() {
        let dir = tempfile::tempdir().unwrap();
        let text = "INT\tSTRING\r\nID\tName\r\n1\tJansen, Bonega\r\n";
        let path = _write_file(dir.path(), "wide.csv", &TextEncoding::Utf16Le.encode(text));

        let csv = _load(&path);

        assert_eq!(
            csv.get_row_by_key("1").unwrap().get(1),
            Some(Value::String("Jansen, Bonega".to_string()))
        );
    }

    #[test]
    fn csv_legacy_files_use_fallback_encoding() {
        let dir = tempfile::tempdir().unwrap();
        let path = _write_file(
            dir.path(),
            "legacy.csv",
            b"INT,STRING\r\nID,Name\r\n1,Caf\xE9\r\n",
        );

        let csv = _load(&path);
        assert_eq!(
            csv.get_row_by_key("1").unwrap().get(1),
            Some(Value::String("Café".to_string()))
        );

        let mut forced = CsvFileTable::new(CsvOptions::default());
        forced
            .load_from_csv_file_with(&path, TextEncoding::Utf8, ',')
            .unwrap();
        assert_eq!(
            forced.get_row_by_key("1").unwrap().get(1),
            Some(Value::String("Caf\u{FFFD}".to_string()))
        );
    }

    #[test]
    fn csv_legacy_text_with_utf8_looking_pairs() {
        let dir = tempfile::tempdir().unwrap();
        let path = _write_file(
            dir.path(),
            "marks.csv",
            b"INT,STRING\r\nID,Name\r\n1,\xC2\xAE\r\n2,caf\xE9\r\n",
        );

        let csv = _load(&path);

        assert_eq!(
            csv.get_row_by_key("1").unwrap().get(1),
            Some(Value::String("Â®".to_string()))
        );
        assert_eq!(
            csv.get_row_by_key("2").unwrap().get(1),
            Some(Value::String("café".to_string()))
        );
    }

    #[test]
    fn csv_utf8_bom_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let mut bytes = vec![0xEF, 0xBB, 0xBF];
        bytes.extend_from_slice("STRING,INT\r\nKey,Value\r\nä,1\r\n".as_bytes());
        let path = _write_file(dir.path(), "bom.csv", &bytes);

        let csv = _load(&path);
        let table = csv.table().unwrap();

        assert_eq!(table.columns()[0].1, TypeCode::String);
        assert!(csv.get_row_by_key("ä").is_some());
    }

    #[test]
    fn csv_missing_file_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut csv = CsvFileTable::new(CsvOptions::default());

        assert!(matches!(
            csv.load_from_csv_file(dir.path().join("missing.csv")),
            Err(tabstore::TableError::Io(_))
        ));
        assert!(csv.table().is_none());
    }

    #[test]
    fn csv_write_back_keeps_a_backup() {
        let dir = tempfile::tempdir().unwrap();
        let path = _write_file(dir.path(), "people.csv", PEOPLE.as_bytes());
        let csv = _load(&path);
        csv.get_row_by_key("1")
            .unwrap()
            .set(1, Some(Value::String("Maharashtra".to_string())));

        csv.write_back(None, None).unwrap();

        let backups = _backups(dir.path());
        assert_eq!(backups.len(), 1);
        assert_eq!(fs::read(&backups[0]).unwrap(), PEOPLE.as_bytes());
        assert!(!dir.path().join("people.csv.temp.csv").exists());

        let bytes = fs::read(&path).unwrap();
        assert!(bytes.starts_with(&[0xFF, 0xFE]));

        let reloaded = _load(&path);
        assert_eq!(reloaded.row_count(), 4);
        assert_eq!(
            reloaded.get_row_by_key("1").unwrap().get(1),
            Some(Value::String("Maharashtra".to_string()))
        );

        // same content again, the backup is not duplicated
        _load(&path).write_back(None, None).unwrap();
        assert_eq!(_backups(dir.path()).len(), 2);
        reloaded.write_back(None, None).unwrap();
        assert_eq!(_backups(dir.path()).len(), 2);
    }

    #[test]
    fn csv_write_back_to_new_directory() {
        let dir = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("items")).unwrap();
        let path = _write_file(&dir.path().join("items"), "weapons.csv", PEOPLE.as_bytes());

        let csv = _load(&path);
        csv.write_back(Some(dir.path()), Some(out.path())).unwrap();

        let written = out.path().join("items").join("weapons.csv");
        assert!(written.exists());
        assert_eq!(fs::read(&path).unwrap(), PEOPLE.as_bytes());
        assert!(_backups(&dir.path().join("items")).is_empty());
        assert_eq!(_load(&written).table().unwrap().data_row_count(), 3);
    }

    #[test]
    fn csv_write_back_needs_a_file() {
        let table = tabstore::persistence::Table::with_fields(
            "loose",
            vec![("ID", TypeCode::Int32)],
            Some(0),
        )
        .unwrap();
        let csv = CsvFileTable::from_table(table, CsvOptions::default());

        assert!(csv.write_back(None, None).is_err());
    }

    #[test]
    fn csv_new_records() {
        let dir = tempfile::tempdir().unwrap();
        let path = _write_file(dir.path(), "people.csv", PEOPLE.as_bytes());
        let mut csv = _load(&path);

        let blank = csv.new_empty_record().unwrap();
        assert!(blank.is_dummy_row());
        assert_eq!(csv.row_count(), 5);

        assert!(csv.create_row_by_key("1").is_err());
        assert!(csv.create_row_by_key("one").is_err());

        let created = csv.create_row_by_key("9").unwrap().unwrap();
        assert!(created.is_indexed_row());
        assert_eq!(created.get(0), Some(Value::Int32(9)));
        assert_eq!(
            csv.last_data_row().unwrap().row_index(),
            created.row_index()
        );
        assert_eq!(csv.first_data_row().unwrap().get(0), Some(Value::Int32(1)));
    }
}

#[cfg(test)]
mod parser {
    use tabstore::csv::RowParser;

    fn _columns(parser: &mut RowParser, line: &str) -> Vec<String> {
        parser.set_line(line);
        parser.columns().collect()
    }

    #[test]
    fn parser_splits_quoted_lines() {
        let mut parser = RowParser::new(',');

        assert_eq!(
            _columns(&mut parser, "1,\"a,b\",\"say \"\"hi\"\"\",,"),
            vec!["1", "a,b", "say \"hi\"", "", ""]
        );
        assert_eq!(_columns(&mut parser, "x"), vec!["x"]);
        assert!(!parser.have_error());
    }

    #[test]
    fn parser_follows_separator() {
        let mut parser = RowParser::new('\t');
        assert_eq!(_columns(&mut parser, "a,b\tc"), vec!["a,b", "c"]);

        parser.set_separator(';');
        assert_eq!(parser.separator(), ';');
        assert_eq!(_columns(&mut parser, "a;b"), vec!["a", "b"]);
    }
}
