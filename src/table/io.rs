use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;
use std::sync::Arc;

use arrow::compute::concat_batches;
use arrow::csv::reader::Format;
use arrow::csv::{ReaderBuilder, WriterBuilder};
use log::debug;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::arrow::ArrowWriter;
use parquet::basic::{Compression, ZstdLevel};
use parquet::file::properties::WriterProperties;

use super::{ObservationTable, TableError};

/// Compression options for persisted Parquet tables
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionType {
    /// ZSTD compression (recommended, best compression ratio)
    Zstd(i32),
    /// Snappy compression (faster, slightly larger files)
    Snappy,
    /// No compression
    Uncompressed,
}

impl Default for CompressionType {
    fn default() -> Self {
        Self::Zstd(3)
    }
}

impl CompressionType {
    fn to_parquet(self) -> Result<Compression, TableError> {
        Ok(match self {
            CompressionType::Zstd(level) => Compression::ZSTD(ZstdLevel::try_new(level)?),
            CompressionType::Snappy => Compression::SNAPPY,
            CompressionType::Uncompressed => Compression::UNCOMPRESSED,
        })
    }
}

impl ObservationTable {
    /// Load a table, choosing the reader from the file extension
    ///
    /// `.csv` files go through schema inference, `.parquet` files keep their
    /// stored schema. The file itself is only read.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, TableError> {
        let path = path.as_ref();
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("csv") => Self::from_csv(path),
            Some(ext) if ext.eq_ignore_ascii_case("parquet") => Self::from_parquet(path),
            _ => Err(TableError::UnsupportedFormat(path.display().to_string())),
        }
    }

    /// Load a CSV file with a header row
    pub fn from_csv<P: AsRef<Path>>(path: P) -> Result<Self, TableError> {
        let path = path.as_ref();
        let table = Self::from_csv_reader(File::open(path)?)?;
        debug!(
            "Loaded {} ({} rows, {} columns)",
            path.display(),
            table.num_rows(),
            table.num_columns()
        );
        Ok(table)
    }

    /// Load CSV data from any seekable reader
    pub fn from_csv_reader<R: Read + Seek>(mut reader: R) -> Result<Self, TableError> {
        let format = Format::default().with_header(true);
        let (schema, _) = format.infer_schema(&mut reader, None)?;
        reader.seek(SeekFrom::Start(0))?;

        let schema = Arc::new(schema);
        let csv_reader = ReaderBuilder::new(schema.clone())
            .with_header(true)
            .build(reader)?;
        let batches = csv_reader.collect::<Result<Vec<_>, _>>()?;
        let batch = concat_batches(&schema, &batches)?;
        Ok(Self::new(batch))
    }

    /// Load a Parquet file
    pub fn from_parquet<P: AsRef<Path>>(path: P) -> Result<Self, TableError> {
        let path = path.as_ref();
        let builder = ParquetRecordBatchReaderBuilder::try_new(File::open(path)?)?;
        let schema = builder.schema().clone();
        let reader = builder.build()?;
        let batches = reader.collect::<Result<Vec<_>, _>>()?;
        let batch = concat_batches(&schema, &batches)?;
        debug!(
            "Loaded {} ({} rows, {} columns)",
            path.display(),
            batch.num_rows(),
            batch.num_columns()
        );
        Ok(Self::new(batch))
    }

    /// Persist the table as Parquet; returns the file size in bytes
    pub fn write_parquet<P: AsRef<Path>>(
        &self,
        path: P,
        compression: CompressionType,
    ) -> Result<u64, TableError> {
        let path = path.as_ref();
        let props = WriterProperties::builder()
            .set_compression(compression.to_parquet()?)
            .build();

        let mut writer = ArrowWriter::try_new(File::create(path)?, self.schema(), Some(props))?;
        writer.write(self.batch())?;
        writer.close()?;

        Ok(std::fs::metadata(path)?.len())
    }

    /// Persist the table as CSV with a header row
    ///
    /// Row identities are not written.
    pub fn write_csv<P: AsRef<Path>>(&self, path: P) -> Result<(), TableError> {
        let mut writer = WriterBuilder::new()
            .with_header(true)
            .build(File::create(path)?);
        writer.write(self.batch())?;
        Ok(())
    }
}
