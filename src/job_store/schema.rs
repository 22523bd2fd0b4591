use crate::sqlite_column;
use crate::sqlite_persistence::{
    Column, ForeignKey, SqlType, Table, VersionedSchema, DEFAULT_TIMESTAMP,
};

const OPERATOR_FK: ForeignKey = ForeignKey {
    foreign_table: "operator",
    foreign_column: "id",
};

const CUSTOMER_FK: ForeignKey = ForeignKey {
    foreign_table: "customer",
    foreign_column: "id",
};

const JOB_FK: ForeignKey = ForeignKey {
    foreign_table: "job",
    foreign_column: "id",
};

const OPERATOR_TABLE: Table = Table {
    name: "operator",
    columns: &[
        sqlite_column!("id", &SqlType::Integer, is_primary_key = true),
        sqlite_column!("name", &SqlType::Text, non_null = true),
        sqlite_column!(
            "created",
            &SqlType::Integer,
            default_value = Some(DEFAULT_TIMESTAMP)
        ),
    ],
    indices: &[],
};

const CUSTOMER_TABLE: Table = Table {
    name: "customer",
    columns: &[
        sqlite_column!("id", &SqlType::Integer, is_primary_key = true),
        sqlite_column!("name", &SqlType::Text, non_null = true),
        sqlite_column!("address", &SqlType::Text, non_null = true),
        sqlite_column!(
            "created",
            &SqlType::Integer,
            default_value = Some(DEFAULT_TIMESTAMP)
        ),
    ],
    indices: &[],
};

const JOB_TABLE: Table = Table {
    name: "job",
    columns: &[
        sqlite_column!("id", &SqlType::Integer, is_primary_key = true),
        sqlite_column!(
            "operator_id",
            &SqlType::Integer,
            non_null = true,
            foreign_key = Some(&OPERATOR_FK)
        ),
        sqlite_column!(
            "customer_id",
            &SqlType::Integer,
            non_null = true,
            foreign_key = Some(&CUSTOMER_FK)
        ),
        sqlite_column!("address", &SqlType::Text, non_null = true),
        sqlite_column!("state", &SqlType::Text, non_null = true),
        sqlite_column!("scheduled_date", &SqlType::Text, non_null = true),
        sqlite_column!("start_time", &SqlType::Integer),
        sqlite_column!("stop_time", &SqlType::Integer),
        sqlite_column!("photo_url", &SqlType::Text),
        sqlite_column!("notes", &SqlType::Text),
        sqlite_column!(
            "predecessor_id",
            &SqlType::Integer,
            foreign_key = Some(&JOB_FK)
        ),
        sqlite_column!(
            "created",
            &SqlType::Integer,
            default_value = Some(DEFAULT_TIMESTAMP)
        ),
        sqlite_column!(
            "updated",
            &SqlType::Integer,
            default_value = Some(DEFAULT_TIMESTAMP)
        ),
    ],
    indices: &[
        ("idx_job_operator", "operator_id"),
        ("idx_job_customer", "customer_id"),
        ("idx_job_scheduled_date", "scheduled_date"),
        ("idx_job_predecessor", "predecessor_id"),
    ],
};

const RESCHEDULE_RULE_TABLE: Table = Table {
    name: "reschedule_rule",
    columns: &[
        sqlite_column!("id", &SqlType::Integer, is_primary_key = true),
        // NULL operator_id = rule applies to every operator
        sqlite_column!(
            "operator_id",
            &SqlType::Integer,
            foreign_key = Some(&OPERATOR_FK)
        ),
        sqlite_column!("name", &SqlType::Text, non_null = true),
        sqlite_column!("offset_kind", &SqlType::Text, non_null = true),
        sqlite_column!("offset_days", &SqlType::Integer),
        sqlite_column!("skip_weekdays", &SqlType::Text),
        sqlite_column!("season_start", &SqlType::Text),
        sqlite_column!("season_end", &SqlType::Text),
        sqlite_column!(
            "created",
            &SqlType::Integer,
            default_value = Some(DEFAULT_TIMESTAMP)
        ),
    ],
    indices: &[("idx_reschedule_rule_operator", "operator_id")],
};

pub const OPS_VERSIONED_SCHEMAS: &[VersionedSchema] = &[VersionedSchema {
    version: 1,
    tables: &[
        OPERATOR_TABLE,
        CUSTOMER_TABLE,
        JOB_TABLE,
        RESCHEDULE_RULE_TABLE,
    ],
    migration: None,
}];
