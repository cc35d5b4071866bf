//! Finding and reading the accounting files.

use std::{
    fs::File,
    io::{BufRead, BufReader, Read},
    path::{Path, PathBuf},
};

use color_eyre::{
    eyre::{ensure, Context},
    Result,
};
use flate2::read::GzDecoder;
use itertools::Itertools as _;
use torque_accounting::EventCollector;
use tracing::{debug, info};

/// Resolves the command line arguments to files. With `pattern` every argument is a prefix,
/// otherwise it is taken as a path verbatim.
pub fn expand(args: &[String], pattern: bool) -> Result<Vec<PathBuf>> {
    let mut paths = Vec::new();
    for arg in args {
        if !pattern {
            paths.push(PathBuf::from(arg));
            continue;
        }
        let matches = glob::glob(&format!("{arg}*")).wrap_err_with(|| format!("invalid pattern `{arg}`"))?;
        for path in matches {
            paths.push(path.wrap_err_with(|| format!("expanding `{arg}*`"))?);
        }
    }
    paths.sort();
    paths.dedup();

    ensure!(!paths.is_empty(), "no accounting file matches {args:?}");
    debug!(?paths, "resolved input files");
    Ok(paths)
}

fn open(path: &Path) -> Result<Box<dyn BufRead>> {
    let file = File::open(path).wrap_err_with(|| format!("opening {}", path.display()))?;
    let reader: Box<dyn Read> = match path.extension() {
        Some(ext) if ext == "gz" => Box::new(GzDecoder::new(file)),
        _ => Box::new(file),
    };
    Ok(Box::new(BufReader::new(reader)))
}

/// Pushes every line of `path` into the collector and returns how many there were.
/// Invalid UTF-8 is replaced instead of failing the whole file.
pub fn feed(path: &Path, collector: &mut EventCollector) -> Result<usize> {
    let source = path.display().to_string();
    let before = collector.stats().lines;

    let reader = open(path)?;
    itertools::process_results(reader.split(b'\n'), |lines| {
        collector.extend_lines(&source, lines.map(|line| String::from_utf8_lossy(&line).into_owned()))
    })
    .wrap_err_with(|| format!("reading {source}"))?;

    let lines = collector.stats().lines - before;
    info!(source, lines, "read accounting file");
    Ok(lines)
}

/// Output base name: the file name of the first argument without `.gz`.
pub fn base_name(first: &str) -> String {
    Path::new(first)
        .file_name()
        .map(|name| name.to_string_lossy())
        .map(|name| name.strip_suffix(".gz").unwrap_or(&*name).to_owned())
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| "accounting".to_owned())
}

/// Reads every file in order into one collector.
pub fn collect_all(paths: &[PathBuf], collector: &mut EventCollector) -> Result<usize> {
    paths.iter().map(|path| feed(path, collector)).fold_ok(0, |total, lines| total + lines)
}

#[allow(non_snake_case)]
#[cfg(test)]
mod test {
    use std::{fs, io::Write as _};

    use flate2::{write::GzEncoder, Compression};
    use torque_accounting::{EventFilter, LogTimeZone, ReconstructOptions};

    use super::*;

    const LINES: &str = "\
01/01/2024 00:00:00;Q;1.srv;queue=batch
01/01/2024 00:01:00;E;1.srv;user=alice exec_host=n01/0 resources_used.walltime=60
";

    fn collector() -> EventCollector {
        EventCollector::new(ReconstructOptions {
            filter: EventFilter::All,
            time_zone: LogTimeZone::Utc,
        })
    }

    #[test_log::test]
    fn expand__prefix_pattern() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["20240102", "20240101.gz", "20231231", "2024.notes"] {
            fs::write(dir.path().join(name), "").unwrap();
        }
        let prefix = dir.path().join("202401").to_string_lossy().into_owned();

        let paths = expand(&[prefix.clone(), prefix], true).unwrap();
        let names: Vec<_> = paths
            .iter()
            .map(|path| path.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, ["20240101.gz", "20240102"]);
    }

    #[test_log::test]
    fn expand__nothing_matches() {
        let dir = tempfile::tempdir().unwrap();
        let prefix = dir.path().join("1999").to_string_lossy().into_owned();
        assert!(expand(&[prefix], true).is_err());
    }

    #[test_log::test]
    fn expand__verbatim_without_pattern() {
        let paths = expand(&["b".to_owned(), "a".to_owned()], false).unwrap();
        assert_eq!(paths, [PathBuf::from("a"), PathBuf::from("b")]);
    }

    #[test_log::test]
    fn feed__plain_and_gzipped() {
        let dir = tempfile::tempdir().unwrap();
        let plain = dir.path().join("20240101");
        fs::write(&plain, LINES).unwrap();

        let gzipped = dir.path().join("20240102.gz");
        let mut encoder = GzEncoder::new(fs::File::create(&gzipped).unwrap(), Compression::default());
        encoder
            .write_all(b"01/02/2024 00:00:00;Q;2.srv;queue=batch user=b\xffb\n")
            .unwrap();
        encoder.finish().unwrap();

        let mut collector = collector();
        assert_eq!(collect_all(&[plain, gzipped], &mut collector).unwrap(), 3);

        let table = collector.finish().unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table.get("2.srv").unwrap().fields().user, "b\u{fffd}b");
    }

    #[test_log::test]
    fn feed__missing_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(feed(&dir.path().join("missing"), &mut collector()).is_err());
    }

    #[test_log::test]
    fn base_name__from_first_argument() {
        assert_eq!(base_name("/var/spool/torque/server_priv/accounting/20240101"), "20240101");
        assert_eq!(base_name("20240101.gz"), "20240101");
        assert_eq!(base_name("2024"), "2024");
        assert_eq!(base_name("/"), "accounting");
    }
}
