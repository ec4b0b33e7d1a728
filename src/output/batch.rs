//! Conversion of proxy attributes into Arrow record batches
//!
//! Column types come from the entity schema where a field is declared, and
//! are inferred from the values otherwise (extras, free-form lists and
//! objects).

use crate::error::{Error, Result};
use crate::schema::{schema_for, FieldType};
use crate::types::{EntityKind, JsonObject, JsonValue};
use arrow::array::{
    Array, ArrayRef, BooleanArray, Float64Array, Int64Array, ListArray, NullArray, StringArray,
    StructArray,
};
use arrow::buffer::OffsetBuffer;
use arrow::datatypes::{DataType, Field, Fields, Schema};
use arrow::record_batch::{RecordBatch, RecordBatchOptions};
use std::sync::Arc;

/// Build a record batch with one row per attribute map and one column per field
pub fn records_to_batch(
    kind: EntityKind,
    fields: &[&str],
    rows: &[JsonObject],
) -> Result<RecordBatch> {
    let schema = schema_for(kind);
    let mut arrow_fields = Vec::with_capacity(fields.len());
    let mut columns: Vec<ArrayRef> = Vec::with_capacity(fields.len());

    for name in fields {
        let values: Vec<Option<&JsonValue>> = rows
            .iter()
            .map(|row| row.get(*name).filter(|v| !v.is_null()))
            .collect();

        let data_type = match schema.field(name) {
            Some(spec) => declared_type(spec.field_type, &values),
            None => infer_column_type(&values),
        };

        columns.push(build_array(&values, &data_type)?);
        arrow_fields.push(Field::new(*name, data_type, true));
    }

    let options = RecordBatchOptions::new().with_row_count(Some(rows.len()));
    Ok(RecordBatch::try_new_with_options(
        Arc::new(Schema::new(arrow_fields)),
        columns,
        &options,
    )?)
}

/// Arrow type of a declared field
fn declared_type(field_type: FieldType, values: &[Option<&JsonValue>]) -> DataType {
    match field_type {
        FieldType::Str
        | FieldType::Timestamp
        | FieldType::Uuid
        | FieldType::Ref(_)
        | FieldType::Enum(_) => DataType::Utf8,
        FieldType::Bool => DataType::Boolean,
        FieldType::Int => DataType::Int64,
        FieldType::RefList(_) => DataType::List(Arc::new(Field::new("item", DataType::Utf8, true))),
        FieldType::List | FieldType::Object | FieldType::Any => infer_column_type(values),
    }
}

fn infer_column_type(values: &[Option<&JsonValue>]) -> DataType {
    values
        .iter()
        .flatten()
        .map(|v| infer_type(v))
        .reduce(|a, b| merge_types(&a, &b))
        .unwrap_or(DataType::Null)
}

/// Infer Arrow DataType from a JSON value
fn infer_type(value: &JsonValue) -> DataType {
    match value {
        JsonValue::Null => DataType::Null,
        JsonValue::Bool(_) => DataType::Boolean,
        JsonValue::Number(n) if n.is_i64() => DataType::Int64,
        JsonValue::Number(_) => DataType::Float64,
        JsonValue::String(_) => DataType::Utf8,
        JsonValue::Array(items) => {
            let element = items
                .iter()
                .filter(|v| !v.is_null())
                .map(infer_type)
                .reduce(|a, b| merge_types(&a, &b))
                .unwrap_or(DataType::Null);
            DataType::List(Arc::new(Field::new("item", element, true)))
        }
        // A struct without children cannot carry a row count
        JsonValue::Object(obj) if obj.is_empty() => DataType::Utf8,
        JsonValue::Object(obj) => {
            let fields: Vec<Field> = obj
                .iter()
                .map(|(k, v)| Field::new(k, infer_type(v), true))
                .collect();
            DataType::Struct(Fields::from(fields))
        }
    }
}

/// Merge two data types into a compatible type
fn merge_types(a: &DataType, b: &DataType) -> DataType {
    match (a, b) {
        (a, b) if a == b => a.clone(),
        (DataType::Null, other) | (other, DataType::Null) => other.clone(),
        (DataType::Int64, DataType::Float64) | (DataType::Float64, DataType::Int64) => {
            DataType::Float64
        }
        (DataType::List(x), DataType::List(y)) => DataType::List(Arc::new(Field::new(
            "item",
            merge_types(x.data_type(), y.data_type()),
            true,
        ))),
        // Anything else is kept as its JSON text
        _ => DataType::Utf8,
    }
}

/// Build an Arrow array from JSON values
fn build_array(values: &[Option<&JsonValue>], data_type: &DataType) -> Result<ArrayRef> {
    match data_type {
        DataType::Null => Ok(Arc::new(NullArray::new(values.len()))),

        DataType::Boolean => {
            let arr: BooleanArray = values
                .iter()
                .map(|v| v.and_then(JsonValue::as_bool))
                .collect();
            Ok(Arc::new(arr))
        }

        DataType::Int64 => {
            let arr: Int64Array = values.iter().map(|v| v.and_then(JsonValue::as_i64)).collect();
            Ok(Arc::new(arr))
        }

        DataType::Float64 => {
            let arr: Float64Array = values.iter().map(|v| v.and_then(JsonValue::as_f64)).collect();
            Ok(Arc::new(arr))
        }

        DataType::List(field) => build_list_array(values, field),

        DataType::Struct(fields) => build_struct_array(values, fields),

        _ => {
            let arr: StringArray = values
                .iter()
                .map(|v| {
                    v.map(|v| match v {
                        JsonValue::String(s) => s.clone(),
                        other => other.to_string(),
                    })
                })
                .collect();
            Ok(Arc::new(arr))
        }
    }
}

fn build_list_array(values: &[Option<&JsonValue>], field: &Arc<Field>) -> Result<ArrayRef> {
    let mut items: Vec<Option<&JsonValue>> = Vec::new();
    let mut offsets: Vec<i32> = vec![0];

    for value in values {
        if let Some(JsonValue::Array(arr)) = value {
            items.extend(arr.iter().map(|item| Some(item).filter(|v| !v.is_null())));
        }
        let offset = i32::try_from(items.len())
            .map_err(|_| Error::Other("list column too large for i32 offsets".to_string()))?;
        offsets.push(offset);
    }

    let nulls = values
        .iter()
        .map(|v| matches!(v, Some(JsonValue::Array(_))))
        .collect::<Vec<bool>>();

    let items_array = build_array(&items, field.data_type())?;
    Ok(Arc::new(ListArray::try_new(
        Arc::clone(field),
        OffsetBuffer::new(offsets.into()),
        items_array,
        Some(nulls.into()),
    )?))
}

fn build_struct_array(values: &[Option<&JsonValue>], fields: &Fields) -> Result<ArrayRef> {
    let mut children: Vec<ArrayRef> = Vec::with_capacity(fields.len());

    for field in fields {
        let child_values: Vec<Option<&JsonValue>> = values
            .iter()
            .map(|v| match v {
                Some(JsonValue::Object(obj)) => obj.get(field.name()).filter(|v| !v.is_null()),
                _ => None,
            })
            .collect();
        children.push(build_array(&child_values, field.data_type())?);
    }

    let nulls = values
        .iter()
        .map(|v| matches!(v, Some(JsonValue::Object(_))))
        .collect::<Vec<bool>>();

    Ok(Arc::new(StructArray::try_new(
        fields.clone(),
        children,
        Some(nulls.into()),
    )?))
}

/// Convert a record batch back into one JSON object per row
pub fn batch_to_records(batch: &RecordBatch) -> Result<Vec<JsonObject>> {
    let schema = batch.schema();
    (0..batch.num_rows())
        .map(|row| {
            schema
                .fields()
                .iter()
                .zip(batch.columns())
                .map(|(field, column)| Ok((field.name().clone(), array_value(column.as_ref(), row)?)))
                .collect()
        })
        .collect()
}

fn downcast<'a, T: 'static>(array: &'a dyn Array) -> Result<&'a T> {
    array
        .as_any()
        .downcast_ref::<T>()
        .ok_or_else(|| Error::Other(format!("unexpected array type {}", array.data_type())))
}

fn array_value(array: &dyn Array, row: usize) -> Result<JsonValue> {
    if array.is_null(row) {
        return Ok(JsonValue::Null);
    }

    Ok(match array.data_type() {
        DataType::Null => JsonValue::Null,
        DataType::Boolean => JsonValue::Bool(downcast::<BooleanArray>(array)?.value(row)),
        DataType::Int64 => JsonValue::from(downcast::<Int64Array>(array)?.value(row)),
        DataType::Float64 => JsonValue::from(downcast::<Float64Array>(array)?.value(row)),
        DataType::Utf8 => JsonValue::String(downcast::<StringArray>(array)?.value(row).to_string()),
        DataType::List(_) => {
            let items = downcast::<ListArray>(array)?.value(row);
            JsonValue::Array(
                (0..items.len())
                    .map(|i| array_value(items.as_ref(), i))
                    .collect::<Result<_>>()?,
            )
        }
        DataType::Struct(_) => {
            let arr = downcast::<StructArray>(array)?;
            JsonValue::Object(
                arr.fields()
                    .iter()
                    .zip(arr.columns())
                    .map(|(f, col)| Ok((f.name().clone(), array_value(col.as_ref(), row)?)))
                    .collect::<Result<_>>()?,
            )
        }
        other => JsonValue::String(format!("{other:?}")),
    })
}
