use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Parameter holding the rows of one batch.
pub const BATCH_PARAM: &str = "_batch";
/// Parameter holding the number of outer rows preceding the batch.
pub const COUNT_PARAM: &str = "_count";

static UNWIND_BATCH: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s*UNWIND\s+\$_batch\s+AS\s+\w+").expect("static regex")
});

static PLAIN_IDENTIFIER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("static regex"));

/// How outer rows reach the action statement.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BatchMode {
    /// One execution per row; the row's columns are bound as parameters.
    Single,
    /// One execution per batch; the rows are bound as a list to `$_batch`.
    #[default]
    Batch,
    /// Rows bound as a list, unwound by an injected prefix so the action runs per element.
    BatchSingle,
}

impl BatchMode {
    pub fn binds_list(self) -> bool {
        !matches!(self, BatchMode::Single)
    }
}

/// Action statement rewritten for a batch mode.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PreparedStatement {
    pub statement: String,
    /// Whether the batch is bound as a list rather than row by row.
    pub iterate_list: bool,
}

/// Rewrites `action` for `mode`. Only [`BatchMode::BatchSingle`] changes the
/// text, and only when it does not already unwind `$_batch` itself.
pub fn prepare(action: &str, mode: BatchMode, columns: &[String]) -> PreparedStatement {
    match mode {
        BatchMode::Single => PreparedStatement {
            statement: action.to_owned(),
            iterate_list: false,
        },
        BatchMode::Batch => PreparedStatement {
            statement: action.to_owned(),
            iterate_list: true,
        },
        BatchMode::BatchSingle => {
            let statement = if starts_with_batch_unwind(action) {
                action.to_owned()
            } else {
                format!("{}{action}", unwind_prefix(columns))
            };
            PreparedStatement {
                statement,
                iterate_list: true,
            }
        }
    }
}

pub fn starts_with_batch_unwind(statement: &str) -> bool {
    UNWIND_BATCH.is_match(statement)
}

fn unwind_prefix(columns: &[String]) -> String {
    let item = "_batch";
    if columns.is_empty() {
        return format!("UNWIND ${BATCH_PARAM} AS {item} ");
    }
    let projections = columns
        .iter()
        .map(|column| {
            let quoted = quote(column);
            format!("{item}.{quoted} AS {quoted}")
        })
        .collect::<Vec<_>>()
        .join(", ");
    format!("UNWIND ${BATCH_PARAM} AS {item} WITH {projections} ")
}

fn quote(identifier: &str) -> String {
    if PLAIN_IDENTIFIER.is_match(identifier) {
        identifier.to_owned()
    } else {
        format!("`{}`", identifier.replace('`', "``"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn columns(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn single_and_batch_leave_text_untouched() {
        let action = "MATCH (n) WHERE id(n) = $id SET n.seen = true";
        let single = prepare(action, BatchMode::Single, &columns(&["id"]));
        assert_eq!(single.statement, action);
        assert!(!single.iterate_list);

        let batch = prepare(action, BatchMode::Batch, &columns(&["id"]));
        assert_eq!(batch.statement, action);
        assert!(batch.iterate_list);
    }

    #[test]
    fn batch_single_injects_unwind_with_projections() {
        let prepared = prepare(
            "SET n.score = score",
            BatchMode::BatchSingle,
            &columns(&["n", "score", "odd name"]),
        );
        assert_eq!(
            prepared.statement,
            "UNWIND $_batch AS _batch WITH _batch.n AS n, _batch.score AS score, \
             _batch.`odd name` AS `odd name` SET n.score = score"
        );
        assert!(prepared.iterate_list);
    }

    #[test]
    fn batch_single_does_not_double_wrap() {
        let action = "  unwind $_batch AS row SET row.n.x = 1";
        let prepared = prepare(action, BatchMode::BatchSingle, &columns(&["n"]));
        assert_eq!(prepared.statement, action);
    }

    #[test]
    fn batch_mode_names() {
        let mode: BatchMode = serde_json::from_str("\"BATCH_SINGLE\"").unwrap();
        assert_eq!(mode, BatchMode::BatchSingle);
        assert_eq!(BatchMode::default(), BatchMode::Batch);
        assert!(!BatchMode::Single.binds_list());
    }
}
