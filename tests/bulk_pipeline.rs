use serde_json::{json, Value};

use es_row_bridge::alias::FieldAlias;
use es_row_bridge::models::schema::{FieldType, RequiredField, SchemaField};
use es_row_bridge::settings::{
    ES_INDEX_READ_MISSING_AS_EMPTY, ES_MAPPING_ID, ES_MAPPING_NAMES, ES_RESOURCE, ES_UPSERT_DOC,
    ES_WRITE_OPERATION, INTERNAL_ES_MAPPING_NAMES_TABLE,
};
use es_row_bridge::sink::{EsSink, NdjsonTransport};
use es_row_bridge::source::EsSource;
use es_row_bridge::store::MemoryStore;
use es_row_bridge::{create_command, BridgeError, Row, Settings};

fn row(value: Value) -> Row {
    value.as_object().cloned().unwrap_or_default()
}

fn settings(pairs: &[(&str, &str)]) -> Settings {
    Settings::builder().set_all(pairs.iter().copied()).build()
}

#[test]
fn index_with_id_produces_store_ready_payload() {
    let settings = settings(&[(ES_MAPPING_ID, "number"), (ES_RESOURCE, "artists")]);
    let mut ctx = EsSink::new(settings)
        .prepare(NdjsonTransport::new(Vec::new()))
        .unwrap();
    ctx.write(&row(json!({"number": "7", "name": "Joe"}))).unwrap();
    assert_eq!(ctx.get_command().get_operation().as_str(), "index");
    assert_eq!(ctx.cleanup().entries, 1);

    let entry = create_command(&settings_with_id())
        .unwrap()
        .build(&row(json!({"number": 7, "name": "Joe"})))
        .unwrap();
    assert_eq!(entry.get_header().get_metadata().get_id(), Some("7"));
}

fn settings_with_id() -> Settings {
    settings(&[(ES_MAPPING_ID, "number")])
}

#[test]
fn second_create_is_rejected_by_store() {
    let settings = settings(&[
        (ES_WRITE_OPERATION, "create"),
        (ES_MAPPING_ID, "number"),
        (ES_RESOURCE, "json/createwithid"),
    ]);
    let mut store = MemoryStore::new("json/createwithid");
    let sink = EsSink::new(settings);

    let mut ctx = sink.prepare(&mut store).unwrap();
    ctx.write(&row(json!({"number": "1", "name": "a"}))).unwrap();
    let err = ctx.write(&row(json!({"number": "1", "name": "b"}))).unwrap_err();
    match err {
        BridgeError::WriteConflict { status, error_type, .. } => {
            assert_eq!(status, 409);
            assert_eq!(error_type, "version_conflict_engine_exception");
        }
        other => panic!("unexpected error {other:?}"),
    }
    ctx.cleanup();
    assert_eq!(store.len(), 1);
}

#[test]
fn update_needs_upsert_for_missing_documents() {
    let mut store = MemoryStore::new("json/update");
    let strict = EsSink::new(settings(&[
        (ES_WRITE_OPERATION, "update"),
        (ES_MAPPING_ID, "number"),
    ]));
    let mut ctx = strict.prepare(&mut store).unwrap();
    let err = ctx.write(&row(json!({"number": "3", "name": "x"}))).unwrap_err();
    assert!(matches!(err, BridgeError::WriteConflict { status: 404, .. }));
    ctx.cleanup();
    assert!(store.is_empty());

    let upsert = settings(&[
        (ES_WRITE_OPERATION, "update"),
        (ES_MAPPING_ID, "number"),
        (ES_UPSERT_DOC, "true"),
    ]);
    let entry = create_command(&upsert)
        .unwrap()
        .build(&row(json!({"number": "3", "name": "x"})))
        .unwrap();
    let body: Value = serde_json::to_value(entry.get_body()).unwrap();
    assert_eq!(body["doc_as_upsert"], json!(true));

    let mut ctx = EsSink::new(upsert).prepare(&mut store).unwrap();
    ctx.write(&row(json!({"number": "3", "name": "x"}))).unwrap();
    ctx.write(&row(json!({"number": "3", "age": 4}))).unwrap();
    ctx.cleanup();
    assert_eq!(
        store.get("3"),
        Some(&row(json!({"number": "3", "name": "x", "age": 4})))
    );
}

#[test]
fn alias_table_survives_job_settings() {
    let settings = settings(&[(ES_MAPPING_NAMES, "url:address, name:title, picture:image")]);
    let configured = EsSink::configure(&settings).unwrap();
    let encoded = configured
        .get_property(INTERNAL_ES_MAPPING_NAMES_TABLE)
        .unwrap();
    assert!(!encoded.contains('='));

    // a worker only sees the encoded table
    let worker = Settings::builder()
        .set(INTERNAL_ES_MAPPING_NAMES_TABLE, encoded)
        .build();
    let alias = FieldAlias::from_settings(&worker).unwrap();
    assert_eq!(alias.len(), 3);
    assert_eq!(alias.to_es("picture"), "image");
    assert_eq!(alias.from_es("title"), "name");
    assert_eq!(alias.to_es("other"), "other");
}

#[test]
fn missing_target_reads_as_empty_when_allowed() {
    let store = MemoryStore::new("foobar/missing");
    let source = EsSource::new(
        settings(&[(ES_INDEX_READ_MISSING_AS_EMPTY, "true")]),
        Vec::new(),
    );
    let mut ctx = source.prepare(store.scan(&[])).unwrap();
    assert!(!ctx.next().unwrap());
    assert_eq!(ctx.cleanup(), 0);

    let strict = EsSource::new(Settings::default(), Vec::new());
    let mut ctx = strict.prepare(store.scan(&[])).unwrap();
    assert!(matches!(ctx.next(), Err(BridgeError::TargetNotFound(_))));
}

#[test]
fn written_rows_read_back_through_projection() {
    let settings = settings(&[
        (ES_MAPPING_NAMES, "url:address"),
        (ES_MAPPING_ID, "id"),
        (ES_RESOURCE, "artists"),
    ]);
    let schema = vec![
        SchemaField::leaf("id", FieldType::String),
        SchemaField::leaf("url", FieldType::String),
        SchemaField::composite(
            "links",
            vec![
                SchemaField::leaf("home", FieldType::String),
                SchemaField::leaf("picture", FieldType::String),
            ],
        ),
    ];
    let job = EsSink::configure(&settings).unwrap();

    let mut store = MemoryStore::new("artists");
    let mut ctx = EsSink::new(job.clone())
        .with_schema(schema.clone())
        .prepare(&mut store)
        .unwrap();
    ctx.write(&row(json!({
        "id": "1",
        "url": "http://a",
        "links": {"home": "h", "picture": "p"},
        "extra": true
    })))
    .unwrap();
    ctx.cleanup();
    assert_eq!(store.get("1").and_then(|doc| doc.get("address")), Some(&json!("http://a")));

    let source_settings = EsSource::configure(&job, &schema).unwrap();
    let source = EsSource::new(source_settings, schema);
    assert_eq!(
        source.target_fields(),
        vec!["id", "address", "links.home", "links.picture"]
    );

    let required = vec![RequiredField::new("url")];
    let fields = source.project(&required).unwrap();
    assert_eq!(fields, vec!["address"]);

    let mut read = source.prepare(store.scan(&fields)).unwrap();
    assert!(read.next().unwrap());
    assert_eq!(
        Value::Object(read.row().clone()),
        json!({"id": null, "url": "http://a", "links": null})
    );
    assert!(!read.next().unwrap());
}

#[test]
fn nested_field_sharing_an_alias_name_survives_read_back() {
    let settings = settings(&[(ES_MAPPING_NAMES, "picture:image"), (ES_MAPPING_ID, "id")]);
    let schema = vec![
        SchemaField::leaf("id", FieldType::String),
        SchemaField::composite("links", vec![SchemaField::leaf("picture", FieldType::String)]),
    ];
    let job = EsSink::configure(&settings).unwrap();

    let mut store = MemoryStore::new("artists");
    let mut ctx = EsSink::new(job.clone())
        .with_schema(schema.clone())
        .prepare(&mut store)
        .unwrap();
    ctx.write(&row(json!({"id": "1", "links": {"picture": "p"}})))
        .unwrap();
    ctx.cleanup();

    let source = EsSource::new(EsSource::configure(&job, &schema).unwrap(), schema);
    let fields = source.target_fields();
    assert_eq!(fields, vec!["id", "links.picture"]);

    let mut read = source.prepare(store.scan(&fields)).unwrap();
    assert!(read.next().unwrap());
    assert_eq!(
        Value::Object(read.row().clone()),
        json!({"id": "1", "links": {"picture": "p"}})
    );
}
