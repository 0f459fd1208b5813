use arrow_schema::DataType;
use stq_common::Value;
use stq_storage::{
    convert_record, infer_schema, read_json_lines, InferOptions, JsonRowConverter,
};

#[test]
fn inferred_schema_drives_conversion() {
    let opts = InferOptions {
        corrupt_record_column: None,
        ..InferOptions::default()
    };
    let schema = infer_schema([r#"{"a":1,"b":"x"}"#, r#"{"a":2.5}"#], &opts).expect("infer");
    assert_eq!(schema.field(0).data_type(), &DataType::Float64);
    assert_eq!(schema.field(1).data_type(), &DataType::Utf8);
    assert!(schema.field(1).is_nullable());

    let row = convert_record(r#"{"a":3}"#, &schema, "_corrupt");
    assert_eq!(row.values(), &[Value::Float64(3.0), Value::Null]);
}

#[test]
fn json_lines_file_round_trip_through_converter() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("events.jsonl");
    std::fs::write(
        &path,
        "{\"user\":\"ann\",\"n\":1}\n{\"user\":\"bob\"}\n\nnot json\n",
    )
    .expect("write");

    let lines = read_json_lines(&path).expect("read");
    assert_eq!(lines.len(), 3);

    let schema = infer_schema(&lines, &InferOptions::default()).expect("infer");
    let names: Vec<_> = schema.fields().iter().map(|f| f.name().as_str()).collect();
    assert_eq!(names, vec!["user", "n", "_corrupt_record"]);

    let conv = JsonRowConverter::new(&schema, "_corrupt_record");
    let rendered: Vec<String> = conv
        .convert_batch(&lines)
        .iter()
        .map(ToString::to_string)
        .collect();
    assert_eq!(
        rendered,
        vec!["[ann,1,null]", "[bob,null,null]", "[null,null,not json]"]
    );
}

#[test]
fn missing_file_is_io_error() {
    let err = read_json_lines("/definitely/not/here.jsonl").expect_err("missing");
    assert!(matches!(err, stq_common::StqError::Io(_)));
}
