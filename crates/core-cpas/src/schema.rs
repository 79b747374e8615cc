use core_traits::{ColumnDescriptor, QueryOutput, TableIdent};
use snafu::ensure;

use crate::error::{Result, UnparsableResultSnafu};
use crate::query::QueryRunner;
use crate::sql;

/// Infers the column list of a query by materializing it into a throwaway
/// probe table and describing that table.
pub struct SchemaInference<'a> {
    runner: QueryRunner<'a>,
}

impl<'a> SchemaInference<'a> {
    #[must_use]
    pub const fn new(runner: QueryRunner<'a>) -> Self {
        Self { runner }
    }

    /// The probe is dropped on every path; a failing drop is only reported
    /// when nothing else failed before it.
    #[tracing::instrument(
        name = "SchemaInference::infer",
        level = "debug",
        skip(self, probe, query),
        fields(probe = %probe),
        err
    )]
    pub async fn infer(&self, probe: &TableIdent, query: &str) -> Result<Vec<ColumnDescriptor>> {
        let described = self.describe_probe(probe, query).await;
        let dropped = self.runner.execute(&sql::drop_table(probe)).await;
        match (described, dropped) {
            (Ok(columns), Ok(_)) => {
                tracing::debug!("Inferred {} columns for {probe}", columns.len());
                Ok(columns)
            }
            (Ok(_), Err(drop_error)) => Err(drop_error),
            (Err(error), Ok(_)) => Err(error),
            (Err(error), Err(drop_error)) => {
                tracing::warn!("Failed to drop probe table {probe}: {drop_error}");
                Err(error)
            }
        }
    }

    async fn describe_probe(&self, probe: &TableIdent, query: &str) -> Result<Vec<ColumnDescriptor>> {
        self.runner.execute(&sql::create_table_as(probe, query)).await?;
        let statement = sql::describe(self.runner.catalog(), probe);
        let output = self.runner.run(&statement).await?;
        parse_describe_output(&statement, &output)
    }
}

/// Parses `DESCRIBE` rows into columns.
///
/// Engines return either one text cell per row holding tab separated
/// `name type comment` or separate cells per attribute. Blank rows and `#`
/// section headers (partition information) are skipped.
pub fn parse_describe_output(statement: &str, output: &QueryOutput) -> Result<Vec<ColumnDescriptor>> {
    let mut columns = Vec::new();
    for row in &output.rows {
        let cells: Vec<&str> = row.iter().flatten().map(|c| c.trim()).collect();
        let Some(first) = cells.first() else {
            continue;
        };
        if first.is_empty() || first.starts_with('#') {
            continue;
        }
        let (name, r#type) = if cells.len() > 1 {
            (cells[0].to_string(), cells[1].to_string())
        } else {
            split_column_line(first)
        };
        if r#type.is_empty() {
            return UnparsableResultSnafu {
                sql: statement,
                value: Some((*first).to_string()),
            }
            .fail();
        }
        let column = ColumnDescriptor::new(name, r#type);
        sql::validate_column(&column).map_err(|_| {
            UnparsableResultSnafu {
                sql: statement,
                value: Some(column.to_string()),
            }
            .build()
        })?;
        columns.push(column);
    }
    ensure!(
        !columns.is_empty(),
        UnparsableResultSnafu {
            sql: statement,
            value: None::<String>,
        }
    );
    Ok(columns)
}

fn split_column_line(line: &str) -> (String, String) {
    let parts: Vec<&str> = line
        .split('\t')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .collect();
    if parts.len() > 1 {
        return (parts[0].to_string(), parts[1].to_string());
    }
    // No tabs: name, then the type up to the next whitespace outside parentheses.
    let mut words = line.splitn(2, char::is_whitespace);
    let name = words.next().unwrap_or_default().to_string();
    let rest = words.next().unwrap_or_default().trim_start();
    let mut depth = 0_i32;
    let end = rest
        .char_indices()
        .find(|&(_, c)| {
            match c {
                '(' | '<' => depth += 1,
                ')' | '>' => depth -= 1,
                _ => {}
            }
            c.is_whitespace() && depth == 0
        })
        .map_or(rest.len(), |(i, _)| i);
    (name, rest[..end].to_string())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn output(rows: &[&[&str]]) -> QueryOutput {
        QueryOutput {
            columns: vec!["col_name".to_string()],
            rows: rows
                .iter()
                .map(|r| r.iter().map(|c| Some((*c).to_string())).collect())
                .collect(),
            update_count: None,
        }
    }

    fn names_and_types(columns: &[ColumnDescriptor]) -> Vec<String> {
        columns.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn test_tab_separated_single_cell() {
        let parsed = parse_describe_output(
            "DESCRIBE x",
            &output(&[
                &["order_id            \tbigint              \t                    "],
                &["amount              \tdecimal(10,2)       \t                    "],
                &[""],
                &["# Partition Information"],
                &["# col_name            \tdata_type           \tcomment             "],
                &["dt                  \tstring              \t                    "],
            ]),
        )
        .unwrap();
        assert_eq!(
            names_and_types(&parsed),
            vec!["order_id bigint", "amount decimal(10,2)", "dt string"]
        );
    }

    #[test]
    fn test_separate_cells_and_whitespace() {
        let parsed = parse_describe_output(
            "DESCRIBE x",
            &output(&[
                &["id", "int", "primary id"],
                &["price decimal(10, 2) comment"],
                &["tags   array<string>"],
            ]),
        )
        .unwrap();
        assert_eq!(
            names_and_types(&parsed),
            vec!["id int", "price decimal(10, 2)", "tags array<string>"]
        );
    }

    #[test]
    fn test_no_columns_is_an_error() {
        let err = parse_describe_output("DESCRIBE x", &output(&[&[""], &["# comment"]])).unwrap_err();
        insta::assert_snapshot!(err, @"Unexpected result None for `DESCRIBE x`");
    }

    #[test]
    fn test_row_without_type_is_an_error() {
        let err = parse_describe_output("DESCRIBE x", &output(&[&["lonely"]])).unwrap_err();
        insta::assert_snapshot!(err, @r#"Unexpected result Some("lonely") for `DESCRIBE x`"#);
    }
}
