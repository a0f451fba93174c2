//! Reading the results table back: charts and summaries.

pub mod charts;
pub mod summary;

use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::storage::schema::StoredRow;
use crate::storage::StorageError;

pub use charts::render_charts;
pub use summary::{summarize, GroupSummary};

#[derive(Debug, Error)]
pub enum ReportError {
    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("failed to create chart directory {}: {source}", .path.display())]
    ChartDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to render {}: {message}", .path.display())]
    Render { path: PathBuf, message: String },
}

/// Rows sharing a (scenario, metric) pair.
#[derive(Debug, Clone, PartialEq)]
pub struct Group<'a> {
    pub scenario: &'a str,
    pub metric: &'a str,
    pub rows: Vec<&'a StoredRow>,
}

/// Group rows by (scenario, metric), groups ordered by first appearance and
/// rows kept in file order.
pub fn group_rows(rows: &[StoredRow]) -> Vec<Group<'_>> {
    let mut groups: Vec<Group<'_>> = Vec::new();
    for row in rows {
        match groups
            .iter_mut()
            .find(|g| g.scenario == row.scenario && g.metric == row.metric)
        {
            Some(group) => group.rows.push(row),
            None => groups.push(Group {
                scenario: &row.scenario,
                metric: &row.metric,
                rows: vec![row],
            }),
        }
    }
    groups
}

/// Read the table at `table` and render every chart into `chart_dir`.
pub fn visualize(table: &Path, chart_dir: &Path) -> Result<Vec<PathBuf>, ReportError> {
    let rows = crate::storage::read_rows(table)?;
    render_charts(&rows, chart_dir)
}
