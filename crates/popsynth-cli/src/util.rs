use std::{
    fmt,
    fs::File,
    io::{self, BufWriter, StdoutLock, Write as _},
    path::{Path, PathBuf},
};

use anyhow::{Context, bail};
use popsynth_survey::{
    config::PipelineConfig,
    dataset::{Schema, SurveyDataset},
};

/// Destination of a command's JSON result.
#[derive(Debug)]
pub enum Output {
    Stdout(StdoutLock<'static>),
    File {
        writer: BufWriter<File>,
        path: PathBuf,
    },
}

impl Output {
    /// Writes `value` as pretty JSON to `path`, or to stdout without one.
    pub fn save_json<T>(value: &T, path: Option<PathBuf>) -> anyhow::Result<()>
    where
        T: serde::Serialize,
    {
        let mut output = Output::create(path)?;
        output
            .write_json(value)
            .with_context(|| format!("Failed to write JSON to {output}"))?;
        if let Output::File { path, .. } = &output {
            eprintln!("Wrote {}", path.display());
        }
        Ok(())
    }

    pub fn create(path: Option<PathBuf>) -> anyhow::Result<Self> {
        let Some(path) = path else {
            return Ok(Output::Stdout(io::stdout().lock()));
        };
        let file = File::create(&path)
            .with_context(|| format!("Failed to create output file: {}", path.display()))?;
        Ok(Output::File {
            writer: BufWriter::new(file),
            path,
        })
    }

    fn write_json<T>(&mut self, value: &T) -> io::Result<()>
    where
        T: serde::Serialize,
    {
        serde_json::to_writer_pretty(&mut *self, value)?;
        writeln!(self)?;
        self.flush()
    }
}

impl fmt::Display for Output {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Output::Stdout(_) => f.write_str("stdout"),
            Output::File { path, .. } => write!(f, "{}", path.display()),
        }
    }
}

impl io::Write for Output {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Output::Stdout(writer) => writer.write(buf),
            Output::File { writer, .. } => writer.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Output::Stdout(writer) => writer.flush(),
            Output::File { writer, .. } => writer.flush(),
        }
    }
}

pub fn read_json_file<T, P>(file_kind: &str, path: P) -> anyhow::Result<T>
where
    T: serde::de::DeserializeOwned,
    P: AsRef<Path>,
{
    let path = path.as_ref();
    let file = File::open(path)
        .with_context(|| format!("Failed to open {} file: {}", file_kind, path.display()))?;

    let reader = io::BufReader::new(file);
    let value = serde_json::from_reader(reader).with_context(|| {
        format!(
            "Failed to parse {} JSON file: {}",
            file_kind,
            path.display()
        )
    })?;

    Ok(value)
}

/// Reads the pipeline configuration, or the defaults when no path is given.
pub fn read_config_file(path: Option<&Path>) -> anyhow::Result<PipelineConfig> {
    match path {
        Some(path) => read_json_file("config", path),
        None => Ok(PipelineConfig::default()),
    }
}

/// Reads survey responses from a `.csv` or `.json` file.
///
/// The file name is recorded as the dataset's source.
pub fn read_dataset_file<P>(path: P, schema: Schema) -> anyhow::Result<SurveyDataset>
where
    P: AsRef<Path>,
{
    let path = path.as_ref();
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase);
    let file = File::open(path)
        .with_context(|| format!("Failed to open survey data file: {}", path.display()))?;
    let reader = io::BufReader::new(file);

    let dataset = match extension.as_deref() {
        Some("csv") => SurveyDataset::from_csv_reader(reader, schema),
        Some("json") => SurveyDataset::from_json_reader(reader, schema),
        _ => bail!(
            "Unsupported survey data file (expected .csv or .json): {}",
            path.display()
        ),
    }
    .with_context(|| format!("Failed to read survey data file: {}", path.display()))?;

    let source = path
        .file_name()
        .map_or_else(|| path.display().to_string(), |name| name.to_string_lossy().into_owned());
    Ok(dataset.with_source(source))
}
