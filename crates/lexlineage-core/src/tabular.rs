//! Arrow layout for statute groups.
//!
//! One row per group member, with the group's fields repeated on every row.
//! The layout is lossless: [`groups_from_rows`] rebuilds the exact groups
//! that [`group_rows`] flattened, which is what lets Parquet exports be read
//! back and queried by DuckDB.

use std::collections::HashMap;
use std::sync::Arc;

use arrow::array::{
    Array, ArrayRef, BooleanArray, Date32Array, Float32Array, StringArray,
    TimestampNanosecondArray, UInt32Array,
};
use arrow::datatypes::{DataType, Date32Type, Field, Schema, SchemaRef, TimeUnit};
use arrow::error::ArrowError;
use arrow::record_batch::RecordBatch;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::dates::DateSource;
use crate::group::{GroupingMethod, InvariantViolation, NestedStatute, Relation, StatuteGroup};
use crate::province::Province;
use crate::statute::{Section, Statute};

#[derive(Error, Debug)]
pub enum TabularError {
    #[error("arrow: {0}")]
    Arrow(#[from] ArrowError),
    #[error("missing or mistyped column: {0}")]
    Column(&'static str),
    #[error("unrecognised value {value:?} in column {column}")]
    Value { column: &'static str, value: String },
    #[error("sections_json: {0}")]
    Sections(#[from] serde_json::Error),
    #[error("reassembled group {group_id} is invalid: {source}")]
    Invalid {
        group_id: String,
        #[source]
        source: InvariantViolation,
    },
}

fn timestamp_type() -> DataType {
    DataType::Timestamp(TimeUnit::Nanosecond, Some("UTC".into()))
}

/// Schema for flattened group-member rows.
pub fn member_schema() -> Schema {
    Schema::new(vec![
        Field::new("group_id", DataType::Utf8, false),
        Field::new("run_id", DataType::Utf8, false),
        Field::new("base_name", DataType::Utf8, false),
        Field::new("jurisdiction", DataType::Utf8, false),
        Field::new("method", DataType::Utf8, false),
        Field::new("group_confidence", DataType::Float32, false),
        Field::new("member_count", DataType::UInt32, false),
        Field::new("amendment_count", DataType::UInt32, false),
        Field::new("original_id", DataType::Utf8, false),
        Field::new("created_at", timestamp_type(), false),
        Field::new("updated_at", timestamp_type(), false),
        Field::new("statute_id", DataType::Utf8, false),
        Field::new("title", DataType::Utf8, true),
        Field::new("statute_jurisdiction", DataType::Utf8, true),
        Field::new("commencement_date", DataType::Utf8, true),
        Field::new("assent_date", DataType::Utf8, true),
        Field::new("date", DataType::Utf8, true),
        Field::new("preamble", DataType::Utf8, true),
        Field::new("sections_json", DataType::Utf8, false),
        Field::new("version", DataType::UInt32, false),
        Field::new("relation", DataType::Utf8, false),
        Field::new("is_original", DataType::Boolean, false),
        Field::new("resolved_date", DataType::Date32, true),
        Field::new("date_source", DataType::Utf8, true),
        Field::new("confidence", DataType::Float32, false),
    ])
}

pub fn member_schema_ref() -> SchemaRef {
    Arc::new(member_schema())
}

/// Flatten groups into one RecordBatch, one row per member.
pub fn group_rows(groups: &[StatuteGroup]) -> Result<RecordBatch, TabularError> {
    let rows: Vec<(&StatuteGroup, &NestedStatute)> = groups
        .iter()
        .flat_map(|g| g.members.iter().map(move |m| (g, m)))
        .collect();

    let group_str = |f: fn(&StatuteGroup) -> &str| -> ArrayRef {
        Arc::new(StringArray::from_iter_values(rows.iter().map(|(g, _)| f(g))))
    };
    let statute_opt = |f: fn(&Statute) -> Option<&str>| -> ArrayRef {
        Arc::new(StringArray::from(
            rows.iter().map(|(_, m)| f(&m.statute)).collect::<Vec<_>>(),
        ))
    };
    let timestamps = |f: fn(&StatuteGroup) -> DateTime<Utc>| -> ArrayRef {
        Arc::new(
            TimestampNanosecondArray::from_iter_values(
                rows.iter()
                    .map(|(g, _)| f(g).timestamp_nanos_opt().unwrap_or_default()),
            )
            .with_timezone("UTC"),
        )
    };

    let sections = rows
        .iter()
        .map(|(_, m)| serde_json::to_string(&m.statute.sections))
        .collect::<Result<Vec<_>, _>>()?;

    let columns: Vec<ArrayRef> = vec![
        group_str(|g| g.id.as_str()),
        group_str(|g| g.run_id.as_str()),
        group_str(|g| g.base_name.as_str()),
        group_str(|g| g.jurisdiction.as_str()),
        group_str(|g| g.method.as_str()),
        Arc::new(Float32Array::from_iter_values(
            rows.iter().map(|(g, _)| g.confidence),
        )),
        Arc::new(UInt32Array::from_iter_values(
            rows.iter().map(|(g, _)| g.member_count as u32),
        )),
        Arc::new(UInt32Array::from_iter_values(
            rows.iter().map(|(g, _)| g.amendment_count as u32),
        )),
        group_str(|g| g.original_id.as_str()),
        timestamps(|g| g.created_at),
        timestamps(|g| g.updated_at),
        Arc::new(StringArray::from_iter_values(
            rows.iter().map(|(_, m)| m.statute.id.as_str()),
        )),
        statute_opt(|s| s.title.as_deref()),
        statute_opt(|s| s.jurisdiction.as_deref()),
        statute_opt(|s| s.commencement_date.as_deref()),
        statute_opt(|s| s.assent_date.as_deref()),
        statute_opt(|s| s.date.as_deref()),
        statute_opt(|s| s.preamble.as_deref()),
        Arc::new(StringArray::from_iter_values(sections)),
        Arc::new(UInt32Array::from_iter_values(
            rows.iter().map(|(_, m)| m.version),
        )),
        Arc::new(StringArray::from_iter_values(
            rows.iter().map(|(_, m)| m.relation.as_str()),
        )),
        Arc::new(BooleanArray::from(
            rows.iter().map(|(_, m)| m.is_original).collect::<Vec<_>>(),
        )),
        Arc::new(Date32Array::from(
            rows.iter()
                .map(|(_, m)| m.resolved_date.map(Date32Type::from_naive_date))
                .collect::<Vec<_>>(),
        )),
        Arc::new(StringArray::from(
            rows.iter()
                .map(|(_, m)| m.date_source.map(|s| s.as_str()))
                .collect::<Vec<_>>(),
        )),
        Arc::new(Float32Array::from_iter_values(
            rows.iter().map(|(_, m)| m.confidence),
        )),
    ];

    Ok(RecordBatch::try_new(member_schema_ref(), columns)?)
}

fn column<'a, T: Array + 'static>(
    batch: &'a RecordBatch,
    name: &'static str,
) -> Result<&'a T, TabularError> {
    batch
        .column_by_name(name)
        .and_then(|c| c.as_any().downcast_ref::<T>())
        .ok_or(TabularError::Column(name))
}

fn opt_string(arr: &StringArray, i: usize) -> Option<String> {
    (!arr.is_null(i)).then(|| arr.value(i).to_string())
}

/// Rebuild groups from member rows. Groups come back in order of first
/// appearance and every reassembled group is validated.
pub fn groups_from_rows(batches: &[RecordBatch]) -> Result<Vec<StatuteGroup>, TabularError> {
    let mut groups: Vec<StatuteGroup> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for batch in batches {
        let group_id = column::<StringArray>(batch, "group_id")?;
        let run_id = column::<StringArray>(batch, "run_id")?;
        let base_name = column::<StringArray>(batch, "base_name")?;
        let jurisdiction = column::<StringArray>(batch, "jurisdiction")?;
        let method = column::<StringArray>(batch, "method")?;
        let group_confidence = column::<Float32Array>(batch, "group_confidence")?;
        let member_count = column::<UInt32Array>(batch, "member_count")?;
        let amendment_count = column::<UInt32Array>(batch, "amendment_count")?;
        let original_id = column::<StringArray>(batch, "original_id")?;
        let created_at = column::<TimestampNanosecondArray>(batch, "created_at")?;
        let updated_at = column::<TimestampNanosecondArray>(batch, "updated_at")?;
        let statute_id = column::<StringArray>(batch, "statute_id")?;
        let title = column::<StringArray>(batch, "title")?;
        let statute_jurisdiction = column::<StringArray>(batch, "statute_jurisdiction")?;
        let commencement = column::<StringArray>(batch, "commencement_date")?;
        let assent = column::<StringArray>(batch, "assent_date")?;
        let date = column::<StringArray>(batch, "date")?;
        let preamble = column::<StringArray>(batch, "preamble")?;
        let sections = column::<StringArray>(batch, "sections_json")?;
        let version = column::<UInt32Array>(batch, "version")?;
        let relation = column::<StringArray>(batch, "relation")?;
        let is_original = column::<BooleanArray>(batch, "is_original")?;
        let resolved_date = column::<Date32Array>(batch, "resolved_date")?;
        let date_source = column::<StringArray>(batch, "date_source")?;
        let confidence = column::<Float32Array>(batch, "confidence")?;

        for i in 0..batch.num_rows() {
            let id = group_id.value(i);
            let slot = match index.get(id) {
                Some(&slot) => slot,
                None => {
                    let method_str = method.value(i);
                    groups.push(StatuteGroup {
                        id: id.to_string(),
                        run_id: run_id.value(i).to_string(),
                        base_name: base_name.value(i).to_string(),
                        jurisdiction: Province::from_label(Some(jurisdiction.value(i))),
                        method: GroupingMethod::parse(method_str).ok_or_else(|| {
                            TabularError::Value {
                                column: "method",
                                value: method_str.to_string(),
                            }
                        })?,
                        members: Vec::new(),
                        original_id: original_id.value(i).to_string(),
                        member_count: member_count.value(i) as usize,
                        amendment_count: amendment_count.value(i) as usize,
                        confidence: group_confidence.value(i),
                        created_at: DateTime::from_timestamp_nanos(created_at.value(i)),
                        updated_at: DateTime::from_timestamp_nanos(updated_at.value(i)),
                    });
                    index.insert(id.to_string(), groups.len() - 1);
                    groups.len() - 1
                }
            };

            let relation_str = relation.value(i);
            let source = match opt_string(date_source, i) {
                Some(s) => Some(DateSource::parse(&s).ok_or(TabularError::Value {
                    column: "date_source",
                    value: s,
                })?),
                None => None,
            };
            let statute = Statute {
                id: statute_id.value(i).to_string(),
                title: opt_string(title, i),
                jurisdiction: opt_string(statute_jurisdiction, i),
                commencement_date: opt_string(commencement, i),
                assent_date: opt_string(assent, i),
                date: opt_string(date, i),
                preamble: opt_string(preamble, i),
                sections: serde_json::from_str::<Vec<Section>>(sections.value(i))?,
            };

            groups[slot].members.push(NestedStatute {
                statute,
                version: version.value(i),
                relation: Relation::parse(relation_str).ok_or_else(|| TabularError::Value {
                    column: "relation",
                    value: relation_str.to_string(),
                })?,
                is_original: is_original.value(i),
                resolved_date: (!resolved_date.is_null(i))
                    .then(|| Date32Type::to_naive_date(resolved_date.value(i))),
                date_source: source,
                confidence: confidence.value(i),
            });
        }
    }

    for group in &groups {
        group.validate().map_err(|source| TabularError::Invalid {
            group_id: group.id.clone(),
            source,
        })?;
    }
    Ok(groups)
}
