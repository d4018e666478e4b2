#[cfg(test)]
mod projector {
    use std::sync::Arc;

    use chrono::NaiveDate;
    use serde_json::json;
    use tabstore::json::{FieldFilter, JsonProjector};
    use tabstore::persistence::{Table, TypeCode, Value};

    fn _people_table(people: &[(i32, &str, f64)]) -> Table {
        let mut table = Table::with_fields(
            "people",
            vec![
                ("ID", TypeCode::Int32),
                ("Name", TypeCode::String),
                ("Score", TypeCode::Double),
            ],
            Some(0),
        )
        .unwrap();

        for (id, name, score) in people {
            let row = table.build_row();
            row.set(0, Some(Value::Int32(*id)));
            row.set(1, Some(Value::String(name.to_string())));
            row.set(2, Some(Value::Double(*score)));
            table.add_row_by_key(&id.to_string(), row, false).unwrap();
        }
        table
    }

    fn _bag_table() -> Table {
        let mut items = Table::with_fields(
            "items",
            vec![("Name", TypeCode::String), ("Count", TypeCode::Int32)],
            None,
        )
        .unwrap();
        for (name, count) in [("sword", 1), ("shield", 2)] {
            let row = items.build_row();
            row.set(0, Some(Value::String(name.to_string())));
            row.set(1, Some(Value::Int32(count)));
            items.append_as_data_row(row).unwrap();
        }

        let mut bag = Table::with_fields(
            "bag",
            vec![("ID", TypeCode::Int32), ("Items", TypeCode::Table)],
            Some(0),
        )
        .unwrap();
        let row = bag.build_row();
        row.set(0, Some(Value::Int32(1)));
        row.set(1, Some(Value::Table(Arc::new(items))));
        bag.add_row_by_key("1", row, false).unwrap();
        bag
    }

    #[test]
    fn json_table_shape_follows_row_count() {
        let empty = _people_table(&[]);
        assert_eq!(JsonProjector::for_table(&empty).to_json(), "{\"people\":null}");

        let single = _people_table(&[(1, "Jansen", 1.5)]);
        assert_eq!(
            JsonProjector::for_table(&single).to_json(),
            "{\"people\":{\"ID\":1,\"Name\":\"Jansen\",\"Score\":1.5}}"
        );

        let many = _people_table(&[(1, "Jansen", 1.5), (2, "Bonega", 2.0)]);
        assert_eq!(
            JsonProjector::for_table(&many).to_json(),
            "{\"people\":[{\"ID\":1,\"Name\":\"Jansen\",\"Score\":1.5},{\"ID\":2,\"Name\":\"Bonega\",\"Score\":2}]}"
        );
    }

    #[test]
    fn json_skips_dummy_and_empty_rows() {
        let mut table = _people_table(&[(1, "Jansen", 1.5)]);
        let dummy = table.build_row();
        dummy.set(1, Some(Value::String("placeholder".to_string())));
        table.append_as_dummy_row(dummy).unwrap();

        assert_eq!(
            JsonProjector::for_table(&table).to_json(),
            "{\"people\":{\"ID\":1,\"Name\":\"Jansen\",\"Score\":1.5}}"
        );

        let mut notes = Table::with_fields("notes", vec![("Text", TypeCode::String)], None).unwrap();
        let blank = notes.build_row();
        notes.append_as_data_row(blank).unwrap();
        assert_eq!(JsonProjector::for_table(&notes).to_json(), "{\"notes\":null}");
    }

    #[test]
    fn json_field_filters() {
        let table = _people_table(&[(1, "Jansen", 1.5)]);

        let only = JsonProjector::for_table(&table).only_fields(["Name"]);
        assert_eq!(only.to_json(), "{\"people\":{\"Name\":\"Jansen\"}}");

        let keyed = only.clone().keep_main_index(true);
        assert_eq!(keyed.to_json(), "{\"people\":{\"ID\":1,\"Name\":\"Jansen\"}}");

        let excluded = JsonProjector::for_table(&table).exclude_field("Score");
        assert_eq!(excluded.to_json(), "{\"people\":{\"ID\":1,\"Name\":\"Jansen\"}}");
        assert_eq!(
            excluded.filter(),
            &FieldFilter::Exclude(["Score".to_string()].into_iter().collect())
        );

        let narrowed = JsonProjector::for_table(&table)
            .only_fields(["Name", "Score"])
            .exclude_field("Score");
        assert_eq!(narrowed.to_json(), "{\"people\":{\"Name\":\"Jansen\"}}");
    }

    #[test]
    fn json_emptied_allow_list_turns_into_exclusions() {
        let table = _people_table(&[(1, "Jansen", 1.5)]);

        let emptied = JsonProjector::for_table(&table)
            .only_fields(["Name", "Score"])
            .exclude_field("Score")
            .exclude_field("Name");

        assert_eq!(
            emptied.filter(),
            &FieldFilter::Exclude(
                ["Name".to_string(), "Score".to_string()].into_iter().collect()
            )
        );
        assert_eq!(emptied.to_json(), "{\"people\":{\"ID\":1}}");

        let reset = emptied.only_fields(["ID"]).exclude_field("ID");
        assert_eq!(reset.to_json(), "{\"people\":{\"Name\":\"Jansen\",\"Score\":1.5}}");
    }

    #[test]
    fn json_single_row() {
        let table = _people_table(&[(1, "Jansen", 1.5)]);
        let row = table.get_row_by_key("1").unwrap();
        row.set(1, None);

        assert_eq!(
            JsonProjector::for_row(&row).to_json(),
            "{\"ID\":1,\"Name\":null,\"Score\":1.5}"
        );
        assert_eq!(row.field("ID").to_json(), "1");
        assert_eq!(row.field("Name").to_json(), "null");
    }

    #[test]
    fn json_nested_tables_share_the_filter() {
        let bag = _bag_table();

        assert_eq!(
            JsonProjector::for_table(&bag).to_json(),
            "{\"bag\":{\"ID\":1,\"Items\":{\"items\":[{\"Name\":\"sword\",\"Count\":1},{\"Name\":\"shield\",\"Count\":2}]}}}"
        );
        assert_eq!(
            JsonProjector::for_table(&bag).exclude_field("Count").to_json(),
            "{\"bag\":{\"ID\":1,\"Items\":{\"items\":[{\"Name\":\"sword\"},{\"Name\":\"shield\"}]}}}"
        );
    }

    #[test]
    fn json_value_tree() {
        let bag = _bag_table();
        assert_eq!(
            JsonProjector::for_table(&bag).to_json_value(),
            json!([{
                "ID": 1,
                "Items": [
                    {"Name": "sword", "Count": 1},
                    {"Name": "shield", "Count": 2}
                ]
            }])
        );

        let mut odd = Table::with_fields(
            "odd",
            vec![
                ("Ratio", TypeCode::Double),
                ("Blob", TypeCode::ByteArray),
                ("At", TypeCode::DateTime),
                ("On", TypeCode::Boolean),
            ],
            None,
        )
        .unwrap();
        let row = odd.build_row();
        row.set(0, Some(Value::Double(f64::NAN)));
        row.set(1, Some(Value::ByteArray(vec![1, 255])));
        let at = NaiveDate::from_ymd_opt(2024, 1, 2)
            .and_then(|date| date.and_hms_opt(3, 4, 5))
            .unwrap();
        row.set(2, Some(Value::DateTime(at)));
        row.set(3, Some(Value::Boolean(true)));
        odd.append_as_data_row(row.clone()).unwrap();

        assert_eq!(
            JsonProjector::for_row(&row).to_json_value(),
            json!({"Ratio": null, "Blob": [1, 255], "At": "2024-01-02 03:04:05", "On": true})
        );
        assert_eq!(
            JsonProjector::for_row(&row).only_fields(["Blob", "At", "On"]).to_json(),
            "{\"Blob\":\"01ff\",\"At\":\"2024-01-02 03:04:05\",\"On\":true}"
        );
    }

    #[test]
    fn json_escapes_names_and_text() {
        let mut table = Table::with_fields(
            "a/b",
            vec![("Key", TypeCode::String), ("Text", TypeCode::String)],
            Some(0),
        )
        .unwrap();
        let row = table.build_row();
        row.set(0, Some(Value::String("k".to_string())));
        row.set(1, Some(Value::String("line\n\"quoted\"\\".to_string())));
        table.add_row_by_key("k", row, false).unwrap();

        assert_eq!(
            JsonProjector::for_table(&table).to_json(),
            "{\"a\\/b\":{\"Key\":\"k\",\"Text\":\"line\\n\\\"quoted\\\"\\\\\"}}"
        );
    }
}
