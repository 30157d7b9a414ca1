use groupwise_columnar::{
    BitVec, Column, ColumnData, ColumnarError, DataType, ScalarValue, Table, TableBuilder,
};
use pretty_assertions::assert_eq;

fn build_table(schema: Vec<DataType>, rows: Vec<Vec<ScalarValue>>) -> Table {
    let mut builder = TableBuilder::new(schema);
    for row in rows {
        builder.append_row(&row).unwrap();
    }
    builder.finish()
}

#[test]
fn builder_and_direct_construction_agree() {
    let table = build_table(
        vec![DataType::Int32, DataType::String],
        vec![
            vec![ScalarValue::Int32(1), ScalarValue::string("a")],
            vec![ScalarValue::Null, ScalarValue::string("b")],
            vec![ScalarValue::Int32(3), ScalarValue::Null],
        ],
    );

    assert_eq!(
        table.column(0).unwrap(),
        &Column::from_options(vec![Some(1i32), None, Some(3)])
    );
    assert_eq!(
        table.column(1).unwrap(),
        &Column::from_opt_strs(&[Some("a"), Some("b"), None])
    );
}

#[test]
fn fixed_point_and_timestamp_columns() {
    let decimals = Column::decimal64(vec![15, -20, 0], -1);
    assert_eq!(decimals.data_type(), DataType::Decimal64 { scale: -1 });
    assert_eq!(
        decimals.value(1),
        ScalarValue::Decimal64 { rep: -20, scale: -1 }
    );

    let ts = Column::timestamp_millis(vec![1_700_000_000_000, 0]);
    assert_eq!(ts.data_type(), DataType::TimestampMillis);
    assert_eq!(ts.value(1), ScalarValue::TimestampMillis(0));
}

#[test]
fn dictionary_columns_decode_to_their_keys() {
    let keys = Column::from_strs(&["x", "y"]);
    let dict = Column::dictionary(vec![1, 1, 0], keys)
        .unwrap()
        .with_validity(BitVec::from_bools(&[true, false, true]))
        .unwrap();

    assert_eq!(
        dict.data_type(),
        DataType::Dictionary(Box::new(DataType::String))
    );
    assert_eq!(
        dict.to_values(),
        vec![ScalarValue::string("y"), ScalarValue::Null, ScalarValue::string("x")]
    );
    assert_eq!(
        dict.decode_dictionary(),
        Column::from_opt_strs(&[Some("y"), None, Some("x")])
    );
}

#[test]
fn gathered_dictionaries_own_their_keys() {
    let dict = Column::dictionary(vec![0, 1], Column::from_vec(vec![5i16, 6])).unwrap();
    let picked = dict.gather(&[1]);
    let (ColumnData::Dictionary { keys: a, .. }, ColumnData::Dictionary { keys: b, .. }) =
        (dict.data(), picked.data())
    else {
        panic!("expected dictionary storage");
    };
    assert!(!std::sync::Arc::ptr_eq(a, b));
    assert_eq!(picked.value(0), ScalarValue::Int16(6));
}

#[test]
fn malformed_string_offsets_are_rejected() {
    let err = Column::from_data(
        ColumnData::String {
            offsets: vec![0, 3],
            bytes: b"ab".to_vec(),
        },
        None,
    )
    .unwrap_err();
    assert!(matches!(err, ColumnarError::LengthMismatch { .. }));
}
