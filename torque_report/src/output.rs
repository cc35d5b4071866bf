use std::path::{Path, PathBuf};

use color_eyre::{eyre::Context, Result};
use torque_accounting::report::TableRow;
use tracing::info;

/// Where the four tables of one run go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportPaths {
    pub jobs: PathBuf,
    pub usage: PathBuf,
    pub users: PathBuf,
    pub nodes: PathBuf,
}

impl ReportPaths {
    pub fn new(output_dir: &Path, base: &str) -> Self {
        Self {
            jobs: output_dir.join(format!("{base}.csv")),
            usage: output_dir.join(format!("{base}.usage.csv")),
            users: output_dir.join(format!("{base}.users.csv")),
            nodes: output_dir.join(format!("{base}.nodes.csv")),
        }
    }
}

/// Writes one table, replacing whatever was at `path`. Returns the number of rows. The header
/// row is written for an empty table as well.
pub fn write_rows<T, I>(path: &Path, rows: I, headers: bool) -> Result<usize>
where
    T: TableRow,
    I: IntoIterator<Item = T>,
{
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_path(path)
        .wrap_err_with(|| format!("creating {}", path.display()))?;
    if headers {
        writer
            .write_record(T::COLUMNS)
            .wrap_err_with(|| format!("writing {}", path.display()))?;
    }

    let mut count = 0;
    for row in rows {
        writer.serialize(row).wrap_err_with(|| format!("writing {}", path.display()))?;
        count += 1;
    }
    writer.flush().wrap_err_with(|| format!("writing {}", path.display()))?;

    info!(path = %path.display(), rows = count, "wrote table");
    Ok(count)
}
