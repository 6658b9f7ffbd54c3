use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use sorgen_core::CsvData;

/// Write an entity projection as CSV, returning bytes written.
pub fn write_entity_csv(path: &Path, data: &CsvData) -> Result<u64, csv::Error> {
    let writer = BufWriter::new(File::create(path).map_err(csv::Error::from)?);
    let counting = CountingWriter::new(writer);
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(counting);

    writer.write_record(&data.headers)?;
    for row in &data.rows {
        writer.write_record(row)?;
    }

    writer.flush()?;
    let counting = writer.into_inner().map_err(|err| err.into_error())?;
    Ok(counting.bytes_written())
}

struct CountingWriter<W: Write> {
    inner: W,
    bytes: u64,
}

impl<W: Write> CountingWriter<W> {
    fn new(inner: W) -> Self {
        Self { inner, bytes: 0 }
    }

    fn bytes_written(&self) -> u64 {
        self.bytes
    }
}

impl<W: Write> Write for CountingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let size = self.inner.write(buf)?;
        self.bytes = self.bytes.saturating_add(size as u64);
        Ok(size)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.inner.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quotes_fields_and_counts_bytes() {
        let data = CsvData {
            external_id: "things".to_string(),
            display_name: "Thing".to_string(),
            description: None,
            headers: vec!["id".to_string(), "note".to_string()],
            rows: vec![
                vec!["1".to_string(), "plain".to_string()],
                vec!["2".to_string(), "has, comma".to_string()],
            ],
        };
        let path = std::env::temp_dir().join(format!("sorgen_csv_{}.csv", uuid::Uuid::new_v4()));

        let bytes = write_entity_csv(&path, &data).expect("write csv");
        let contents = std::fs::read_to_string(&path).expect("read csv");
        assert_eq!(contents, "id,note\n1,plain\n2,\"has, comma\"\n");
        assert_eq!(bytes, contents.len() as u64);
        let _ = std::fs::remove_file(&path);
    }
}
