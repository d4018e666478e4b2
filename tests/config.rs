#[cfg(test)]
mod registry {
    use std::fs;
    use std::path::Path;

    use tabstore::config::ConfigRegistry;
    use tabstore::persistence::Value;

    const PEOPLE: &str = "INT,STRING,DOUBLE\r\nID,Name,Score\r\n1,Jansen,1.5\r\n2,Bonega,2\r\n";
    const WEAPONS: &str = "STRING,INT,INT\r\nKey,Damage,Weight\r\nsword,7,3\r\n";

    fn _write(path: &Path, text: &str) {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, text).unwrap();
    }

    fn _prepare_config_dir(root: &Path) {
        _write(&root.join("People.csv"), PEOPLE);
        _write(&root.join("items").join("Weapons.csv"), WEAPONS);
        _write(&root.join(".hidden.csv"), PEOPLE);
        _write(&root.join("readme.txt"), "not a table");
    }

    fn _prepare_registry(root: &Path) -> ConfigRegistry {
        _prepare_config_dir(root);
        let mut registry = ConfigRegistry::default();
        registry.load_config("cfg", root).unwrap();
        registry
    }

    #[test]
    fn registry_loads_csv_tree() {
        let dir = tempfile::tempdir().unwrap();
        let registry = _prepare_registry(dir.path());

        assert!(registry.exists("cfg"));
        assert!(!registry.exists("other"));
        assert_eq!(registry.tags(), vec!["cfg"]);

        let set = registry.config("cfg").unwrap();
        assert_eq!(set.directory(), dir.path());
        assert_eq!(set.table_names(), vec!["people", "items/weapons"]);
        assert_eq!(set.len(), 2);

        let people = set.table("People").unwrap();
        assert_eq!(people.table().unwrap().name(), "People");
        assert_eq!(people.table().unwrap().data_row_count(), 2);
        assert!(set.table("items/WEAPONS").unwrap().get_row_by_key("sword").is_some());
        assert!(set.table("hidden").is_none());
    }

    #[test]
    fn registry_load_of_broken_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        _write(&dir.path().join("broken.csv"), "INT,STRING\r\n");

        let mut registry = ConfigRegistry::default();
        assert!(registry.load_config("cfg", dir.path()).is_err());
    }

    #[test]
    fn registry_exports_selected_tables() {
        let dir = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        let registry = _prepare_registry(dir.path());

        _write(
            &dir.path().join(".exportjson.csv"),
            "STRING,STRING,STRING\r\nCONFIG_FILE,INCLUDED_FIELDS,EXCLUDED_FIELDS\r\nPeople,Name,\r\n",
        );
        _write(
            &dir.path().join("items").join(".exportjson.csv"),
            "STRING,STRING,STRING\r\nCONFIG_FILE,INCLUDED_FIELDS,EXCLUDED_FIELDS\r\nWeapons,,Key; Weight\r\n",
        );

        assert_eq!(registry.export_as_json("cfg", out.path()).unwrap(), 2);

        assert_eq!(
            fs::read_to_string(out.path().join("people.json")).unwrap(),
            "{\"People\":[{\"ID\":1,\"Name\":\"Jansen\"},{\"ID\":2,\"Name\":\"Bonega\"}]}"
        );
        assert_eq!(
            fs::read_to_string(out.path().join("items").join("weapons.json")).unwrap(),
            "{\"Weapons\":{\"Key\":\"sword\",\"Damage\":7}}"
        );
    }

    #[test]
    fn registry_export_without_settings_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        let registry = _prepare_registry(dir.path());

        _write(
            &dir.path().join(".exportjson.csv"),
            "STRING,STRING,STRING\r\nCONFIG_FILE,INCLUDED_FIELDS,EXCLUDED_FIELDS\r\nPeople,,\r\n",
        );

        assert_eq!(registry.export_as_json("cfg", out.path()).unwrap(), 1);
        assert_eq!(
            fs::read_to_string(out.path().join("people.json")).unwrap(),
            "{\"People\":[{\"ID\":1,\"Name\":\"Jansen\",\"Score\":1.5},{\"ID\":2,\"Name\":\"Bonega\",\"Score\":2}]}"
        );
        assert!(!out.path().join("items").exists());
        assert_eq!(registry.export_as_json("missing", out.path()).unwrap(), 0);
    }

    #[test]
    fn registry_writes_back_changed_tables() {
        let dir = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        let mut registry = _prepare_registry(dir.path());

        let weapons = registry
            .config_mut("cfg")
            .unwrap()
            .table_mut("items/weapons")
            .unwrap();
        weapons
            .get_row_by_key("sword")
            .unwrap()
            .set(1, Some(Value::Int32(9)));

        assert!(registry.write_back("cfg", "items/weapons", Some(out.path())).unwrap());
        assert!(!registry.write_back("cfg", "items/armor", None).unwrap());
        assert!(!registry.write_back("other", "people", None).unwrap());

        let written = out.path().join("items").join("Weapons.csv");
        let mut reloaded = ConfigRegistry::default();
        reloaded.load_config("out", out.path()).unwrap();

        assert!(written.exists());
        assert_eq!(
            reloaded
                .config("out")
                .unwrap()
                .table("items/weapons")
                .unwrap()
                .get_row_by_key("sword")
                .unwrap()
                .get(1),
            Some(Value::Int32(9))
        );
        assert_eq!(
            fs::read_to_string(dir.path().join("items").join("Weapons.csv")).unwrap(),
            WEAPONS
        );
    }
}
