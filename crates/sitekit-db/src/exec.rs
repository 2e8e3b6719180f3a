//! Statement builders and execution over the pool

use std::collections::HashSet;

use once_cell::sync::Lazy;
use regex::Regex;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use sitekit_core::{Error, Result};

use crate::value::{bind_value, rewrite_named, ExecResult, SqlValue};
use crate::{db_error, Database};

/// Characters stripped from table identifiers before statement assembly
static IDENTIFIER_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^a-zA-Z0-9_\-.`]+").expect("Invalid identifier regex"));

/// Runs of whitespace collapsed in custom statement text
static WHITESPACE_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s\s+").expect("Invalid whitespace regex"));

impl Database {
    /// Insert a row built from column/value pairs.
    ///
    /// `db.insert("users", &[("name", "ada".into()), ("age", 36.into())])`
    pub async fn insert(&self, table: &str, data: &[(&str, SqlValue)]) -> Result<ExecResult> {
        let columns: Vec<&str> = data.iter().map(|(k, _)| *k).collect();
        let marks = vec!["?"; data.len()].join(", ");
        let statement = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            sanitize_identifier(table),
            columns.join(", "),
            marks
        );

        let mut query = sqlx::query(&statement);
        for (_, value) in data {
            query = bind_value(query, value);
        }
        let result = query.execute(self.pool()).await.map_err(db_error)?;

        Ok(ExecResult {
            rows_affected: result.rows_affected(),
            last_insert_id: result.last_insert_rowid(),
        })
    }

    /// Insert a row, first replacing `Null` values with empty text for
    /// columns the table declares NOT NULL
    pub async fn insert_checked(&self, table: &str, data: &[(&str, SqlValue)]) -> Result<ExecResult> {
        let table = sanitize_identifier(table);
        let statement = format!("PRAGMA table_info({table})");
        let rows = sqlx::query(&statement)
            .fetch_all(self.pool())
            .await
            .map_err(db_error)?;

        let mut required: HashSet<String> = HashSet::new();
        for row in &rows {
            let notnull: i64 = row.get("notnull");
            if notnull != 0 {
                required.insert(row.get("name"));
            }
        }

        let data: Vec<(&str, SqlValue)> = data
            .iter()
            .map(|(column, value)| {
                if matches!(value, SqlValue::Null) && required.contains(*column) {
                    (*column, SqlValue::Text(String::new()))
                } else {
                    (*column, value.clone())
                }
            })
            .collect();

        self.insert(&table, &data).await
    }

    /// Update rows matched by equality filters.
    ///
    /// `db.update("users", &[("age", 37.into())], &[("name", "ada".into())])`
    pub async fn update(
        &self,
        table: &str,
        data: &[(&str, SqlValue)],
        filter: &[(&str, SqlValue)],
    ) -> Result<ExecResult> {
        let assignments: Vec<String> = data.iter().map(|(k, _)| format!("{k} = ?")).collect();
        let conditions: Vec<String> = filter.iter().map(|(k, _)| format!("{k} = ?")).collect();
        let statement = format!(
            "UPDATE {} SET {} WHERE {}",
            sanitize_identifier(table),
            assignments.join(", "),
            conditions.join(" AND ")
        );

        let mut query = sqlx::query(&statement);
        for (_, value) in data.iter().chain(filter) {
            query = bind_value(query, value);
        }
        let result = query.execute(self.pool()).await.map_err(db_error)?;

        Ok(ExecResult {
            rows_affected: result.rows_affected(),
            last_insert_id: result.last_insert_rowid(),
        })
    }

    /// Run a SELECT with positional `?` parameters
    pub async fn select(&self, statement: &str, params: &[SqlValue]) -> Result<Vec<SqliteRow>> {
        let mut query = sqlx::query(statement);
        for value in params {
            query = bind_value(query, value);
        }
        query.fetch_all(self.pool()).await.map_err(db_error)
    }

    /// Run a SELECT with named `:key` parameters
    pub async fn select_named(
        &self,
        statement: &str,
        params: &[(&str, SqlValue)],
    ) -> Result<Vec<SqliteRow>> {
        let (statement, names) = rewrite_named(statement);
        let mut query = sqlx::query(&statement);
        for name in &names {
            query = bind_value(query, lookup(params, name)?);
        }
        query.fetch_all(self.pool()).await.map_err(db_error)
    }

    /// Run a DELETE with positional `?` parameters
    pub async fn delete(&self, statement: &str, params: &[SqlValue]) -> Result<ExecResult> {
        let mut query = sqlx::query(statement);
        for value in params {
            query = bind_value(query, value);
        }
        let result = query.execute(self.pool()).await.map_err(db_error)?;

        Ok(ExecResult {
            rows_affected: result.rows_affected(),
            last_insert_id: result.last_insert_rowid(),
        })
    }

    /// Run any statement with named `:key` parameters. Runs of whitespace in
    /// the statement text are collapsed, so multi-line literals are fine.
    pub async fn execute(&self, statement: &str, params: &[(&str, SqlValue)]) -> Result<ExecResult> {
        let statement = WHITESPACE_REGEX.replace_all(statement.trim(), " ");
        let (statement, names) = rewrite_named(&statement);
        let mut query = sqlx::query(&statement);
        for name in &names {
            query = bind_value(query, lookup(params, name)?);
        }
        let result = query.execute(self.pool()).await.map_err(db_error)?;

        Ok(ExecResult {
            rows_affected: result.rows_affected(),
            last_insert_id: result.last_insert_rowid(),
        })
    }
}

fn lookup<'a>(params: &'a [(&str, SqlValue)], name: &str) -> Result<&'a SqlValue> {
    params
        .iter()
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value)
        .ok_or_else(|| Error::db(format!("no value bound for placeholder :{name}")))
}

fn sanitize_identifier(name: &str) -> String {
    IDENTIFIER_REGEX.replace_all(name, "").into_owned()
}
