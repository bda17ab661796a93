use rowkit::{
    access_table, normalize_datetime, InsertRequest, QueryResult, Request, SelectRequest,
    TableAccessor, UpdateRequest, Value,
};
use serde_json::json;
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

fn setup() -> (PathBuf, TempDir) {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("sistema.db");
    let conn = rusqlite::Connection::open(&db_path).unwrap();
    conn.execute_batch(
        "CREATE TABLE entradas (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            telegram_id INTEGER,
            plataforma TEXT,
            status TEXT,
            datahora TEXT
        )",
    )
    .unwrap();

    let config_path = temp_dir.path().join("config.json");
    fs::write(
        &config_path,
        r#"{"bd": {"HOST": "localhost", "PORT": 3306, "DATABASE": "sistema.db", "USER": "root", "PASSWORD": ""}}"#,
    )
    .unwrap();
    (config_path, temp_dir)
}

fn insert(config: &PathBuf, request: serde_json::Value) -> i64 {
    match access_table("entradas", &request, config) {
        QueryResult::Id(id) => id,
        other => panic!("insert failed: {other:?}"),
    }
}

#[test]
fn test_insert_returns_new_ids() {
    let (config, _temp) = setup();

    let first = insert(
        &config,
        json!({"telegram_id": 123456, "plataforma": "IQOPTION", "status": "PENDENTE"}),
    );
    let second = insert(&config, json!({"modo": "Salvar", "status": "PENDENTE"}));

    assert_eq!(first, 1);
    assert_eq!(second, 2);
}

#[test]
fn test_update_by_id_returns_id() {
    let (config, _temp) = setup();
    for _ in 0..7 {
        insert(&config, json!({"status": "PENDENTE"}));
    }

    let result = access_table("entradas", &json!({"id": 7, "status": "FECHADO"}), &config);
    assert_eq!(result, QueryResult::Id(7));

    let row = access_table(
        "entradas",
        &json!({"modo": "Ler", "id": 7, "LIMIT": 1}),
        &config,
    );
    assert_eq!(
        row.as_row().and_then(|r| r.get("status")),
        Some(&Value::from("FECHADO"))
    );
}

#[test]
fn test_id_zero_inserts() {
    let (config, _temp) = setup();
    insert(&config, json!({"status": "A"}));

    let result = access_table("entradas", &json!({"id": 0, "status": "B"}), &config);
    assert_eq!(result, QueryResult::Id(2));
}

#[test]
fn test_mode_column_is_writable_and_filterable() {
    let temp_dir = TempDir::new().unwrap();
    let conn = rusqlite::Connection::open(temp_dir.path().join("prefs.db")).unwrap();
    conn.execute_batch("CREATE TABLE prefs (id INTEGER PRIMARY KEY, mode TEXT)")
        .unwrap();
    let config = temp_dir.path().join("config.json");
    fs::write(&config, r#"{"bd": {"DATABASE": "prefs.db"}}"#).unwrap();

    assert_eq!(
        access_table("prefs", &json!({"mode": "dark"}), &config),
        QueryResult::Id(1)
    );
    assert_eq!(
        access_table("prefs", &json!({"id": 1, "mode": "light"}), &config),
        QueryResult::Id(1)
    );

    let rows = access_table("prefs", &json!({"modo": "Ler", "mode": "light"}), &config);
    let rows = rows.as_rows().unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].get("id"), Some(&Value::Integer(1)));
}

#[test]
fn test_update_with_custom_where() {
    let (config, _temp) = setup();
    insert(&config, json!({"telegram_id": 123456, "status": "PENDENTE"}));
    insert(&config, json!({"telegram_id": 123456, "status": "FECHADO"}));
    insert(&config, json!({"telegram_id": 999, "status": "PENDENTE"}));

    let result = access_table(
        "entradas",
        &json!({
            "modo": "Salvar",
            "WHERE": {"telegram_id": 123456, "status": "PENDENTE"},
            "plataforma": "IQOPTION"
        }),
        &config,
    );
    assert_eq!(result, QueryResult::Id(0));

    let rows = access_table(
        "entradas",
        &json!({"modo": "Ler", "plataforma": "IQOPTION"}),
        &config,
    );
    let rows = rows.as_rows().unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].get("id"), Some(&Value::Integer(1)));
}

#[test]
fn test_limit_one_returns_single_row() {
    let (config, _temp) = setup();
    insert(&config, json!({"status": "PENDENTE", "plataforma": "IQOPTION"}));

    let result = access_table(
        "entradas",
        &json!({"modo": "Ler", "status": "PENDENTE", "LIMIT": 1}),
        &config,
    );
    let row = result.as_row().expect("single mapping");
    assert_eq!(row.get("plataforma"), Some(&Value::from("IQOPTION")));
    assert_eq!(result.to_json()["status"], json!("PENDENTE"));
}

#[test]
fn test_other_limits_return_sequence() {
    let (config, _temp) = setup();
    insert(&config, json!({"status": "PENDENTE"}));

    let result = access_table(
        "entradas",
        &json!({"modo": "Ler", "status": "PENDENTE", "LIMIT": 2}),
        &config,
    );
    assert_eq!(result.as_rows().map(<[_]>::len), Some(1));

    let none = access_table(
        "entradas",
        &json!({"modo": "Ler", "status": "NADA", "LIMIT": 1}),
        &config,
    );
    assert_eq!(none, QueryResult::Rows(vec![]));
    assert_eq!(none.to_json(), json!([]));
}

#[test]
fn test_advanced_filters_projection_and_order() {
    let (config, _temp) = setup();
    let times = ["2025-07-31 23:00:00", "2025-08-01 10:00:00", "2025-08-02 09:30:00"];
    for (i, t) in times.iter().enumerate() {
        insert(
            &config,
            json!({"telegram_id": i, "status": "PENDENTE", "datahora": t}),
        );
    }

    let result = access_table(
        "entradas",
        &json!({
            "modo": "Ler",
            "filtros": [
                ["status", "=", "PENDENTE"],
                ["datahora", ">", "2025-08-01 00:00:00"]
            ],
            "COLUNAS": ["id", "telegram_id", "datahora"],
            "ORDER_BY": "datahora DESC"
        }),
        &config,
    );
    let rows = result.as_rows().unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].get("datahora"), Some(&Value::from("2025-08-02 09:30:00")));
    assert_eq!(
        rows[0].columns().collect::<Vec<_>>(),
        vec!["id", "telegram_id", "datahora"]
    );
}

#[test]
fn test_invalid_input_is_sentinel() {
    let (config, _temp) = setup();

    assert_eq!(access_table("", &json!({"status": "X"}), &config), QueryResult::Failed);
    assert_eq!(access_table("entradas", &json!([1]), &config), QueryResult::Failed);
    assert_eq!(
        access_table("entradas", &json!({"modo": "Apagar"}), &config),
        QueryResult::Failed
    );
    assert_eq!(
        access_table(
            "entradas",
            &json!({"modo": "Ler", "filtros": [["status", "OR 1=1 --", "x"]]}),
            &config
        ),
        QueryResult::Failed
    );
}

#[test]
fn test_database_errors_are_sentinel() {
    let (config, _temp) = setup();

    let unknown_table = access_table("saidas", &json!({"status": "X"}), &config);
    assert_eq!(unknown_table.to_json(), json!(-1));

    let unknown_column = access_table("entradas", &json!({"nope": 1}), &config);
    assert!(unknown_column.is_failed());
}

#[test]
fn test_missing_database_file_is_sentinel() {
    let temp_dir = TempDir::new().unwrap();
    let config = temp_dir.path().join("config.json");
    fs::write(&config, r#"{"bd": {"DATABASE": "absent.db"}}"#).unwrap();

    let result = access_table("entradas", &json!({"status": "X"}), &config);
    assert!(result.is_failed());
    assert!(!temp_dir.path().join("absent.db").exists());
}

#[test]
fn test_typed_requests() {
    let (config, _temp) = setup();
    let accessor = TableAccessor::new(&config);
    let when = normalize_datetime("2025-08-01", "10:30").unwrap();

    let id = accessor
        .run(
            "entradas",
            &InsertRequest::new([
                ("status", Value::from("PENDENTE")),
                ("datahora", Value::from(when)),
            ])
            .unwrap()
            .into(),
        )
        .unwrap();
    assert_eq!(id, QueryResult::Id(1));

    let update = UpdateRequest::by_predicate([("status", "PENDENTE")], [("status", "FECHADO")])
        .unwrap()
        .with_reported_id(1);
    assert_eq!(
        accessor.run("entradas", &Request::from(update)).unwrap(),
        QueryResult::Id(1)
    );

    let select = SelectRequest::builder()
        .condition("datahora", ">=", Value::from(when))
        .limit(1)
        .build()
        .unwrap();
    let result = accessor.run("entradas", &select.into()).unwrap();
    assert_eq!(
        result.as_row().and_then(|r| r.get("status")),
        Some(&Value::from("FECHADO"))
    );
}
