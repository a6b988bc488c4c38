use crate::{common::*, objective::LossValues};

/// One line of `losses.jsonl`. Loss terms are raw, before weighting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LossRecord {
    pub iteration: usize,
    pub total_loss: f64,
    pub content_loss: f64,
    pub style_loss: f64,
    pub tv_loss: f64,
    pub elapsed_ms: u64,
}

impl LossRecord {
    pub fn new(iteration: usize, values: LossValues, elapsed_ms: u64) -> Self {
        let LossValues {
            total,
            content,
            style,
            tv,
        } = values;

        Self {
            iteration,
            total_loss: total,
            content_loss: content,
            style_loss: style,
            tv_loss: tv,
            elapsed_ms,
        }
    }
}

#[derive(Debug)]
pub struct MetricsWriter {
    path: PathBuf,
    writer: BufWriter<File>,
}

impl MetricsWriter {
    pub fn create<P>(path: P) -> Fallible<Self>
    where
        P: AsRef<Path>,
    {
        let path = path.as_ref().to_owned();
        let file = File::create(&path)
            .with_context(|| format!("unable to create metrics file {}", path.display()))?;
        Ok(Self {
            path,
            writer: BufWriter::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn write(&mut self, record: &LossRecord) -> Fallible<()> {
        serde_json::to_writer(&mut self.writer, record)?;
        self.writer.write_all(b"\n")?;
        self.writer.flush()?;
        Ok(())
    }
}

pub fn read_records<P>(path: P) -> Fallible<Vec<LossRecord>>
where
    P: AsRef<Path>,
{
    let text = fs::read_to_string(path)?;
    text.lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| -> Fallible<LossRecord> { Ok(serde_json::from_str(line)?) })
        .collect()
}
