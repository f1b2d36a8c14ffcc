use std::fs::{self, File};
use std::io::{BufWriter, Cursor, Seek, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local, TimeZone};
use serde::{Deserialize, Serialize};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::error::{RecorderError, Result};
use crate::types::Euler;

pub const CSV_HEADER: &str = "frame,yaw,pitch,roll\n";
const ANGLE_DECIMALS: usize = 3;

/// Where and how a recording archive is written
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportOptions {
    pub output_dir: PathBuf,
    /// Prefix of the archive file name (`<tag>_<timestamp>.zip`)
    pub tag: String,
    pub video_extension: String,
    /// Deflate level 1..=9, `Some(0)` stores entries uncompressed,
    /// `None` for the zip crate's default
    pub compression_level: Option<i64>,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("."),
            tag: "ai".to_string(),
            video_extension: "mp4".to_string(),
            compression_level: None,
        }
    }
}

impl ExportOptions {
    /// Load options from a JSON document; missing fields take their defaults
    pub fn from_json(json: &str) -> Result<Self> {
        let options: ExportOptions = serde_json::from_str(json)?;
        options.validate()?;
        Ok(options)
    }

    pub fn validate(&self) -> Result<()> {
        check_name_part("tag", &self.tag)?;
        check_name_part("video extension", &self.video_extension)?;
        if let Some(level) = self.compression_level {
            if !(0..=9).contains(&level) {
                return Err(RecorderError::InvalidOptions(format!(
                    "compression level {level} outside 0..=9"
                )));
            }
        }
        Ok(())
    }

    fn file_options(&self) -> SimpleFileOptions {
        match self.compression_level {
            // The deflate writer rejects level 0
            Some(0) => SimpleFileOptions::default().compression_method(CompressionMethod::Stored),
            level => SimpleFileOptions::default()
                .compression_method(CompressionMethod::Deflated)
                .compression_level(level),
        }
    }
}

fn check_name_part(what: &str, value: &str) -> Result<()> {
    if value.is_empty() {
        return Err(RecorderError::InvalidOptions(format!("{what} is empty")));
    }
    if value.contains(['/', '\\']) {
        return Err(RecorderError::InvalidOptions(format!(
            "{what} '{value}' contains a path separator"
        )));
    }
    Ok(())
}

/// A finished recording: the video stream plus one Euler record per frame
#[derive(Debug, Clone)]
pub struct RecordingArchive {
    timestamp: String,
    video: Vec<u8>,
    records: Vec<Euler>,
}

impl RecordingArchive {
    pub fn new(timestamp: impl Into<String>, video: Vec<u8>, records: Vec<Euler>) -> Self {
        Self {
            timestamp: timestamp.into(),
            video,
            records,
        }
    }

    /// Concatenate recorder chunks into a single video payload
    pub fn from_chunks<C: AsRef<[u8]>>(
        timestamp: impl Into<String>,
        chunks: &[C],
        records: &[Euler],
    ) -> Self {
        let mut video = Vec::new();
        for chunk in chunks {
            video.extend_from_slice(chunk.as_ref());
        }
        Self::new(timestamp, video, records.to_vec())
    }

    pub fn timestamp(&self) -> &str {
        &self.timestamp
    }

    pub fn records(&self) -> &[Euler] {
        &self.records
    }

    pub fn video_entry_name(&self, options: &ExportOptions) -> String {
        format!("{}.{}", self.timestamp, options.video_extension)
    }

    pub fn csv_entry_name(&self) -> String {
        format!("{}.csv", self.timestamp)
    }

    pub fn archive_file_name(&self, options: &ExportOptions) -> String {
        format!("{}_{}.zip", options.tag, self.timestamp)
    }

    /// Write the zip (video entry, then CSV entry) into `writer`
    pub fn write_to<W: Write + Seek>(&self, writer: W, options: &ExportOptions) -> Result<W> {
        let file_options = options.file_options();
        let mut zip = ZipWriter::new(writer);

        let video_name = self.video_entry_name(options);
        log::debug!("Adding {} ({} bytes)", video_name, self.video.len());
        zip.start_file(video_name, file_options)?;
        zip.write_all(&self.video)?;

        let csv_name = self.csv_entry_name();
        let csv = generate_csv(&self.records);
        log::debug!("Adding {} ({} records)", csv_name, self.records.len());
        zip.start_file(csv_name, file_options)?;
        zip.write_all(csv.as_bytes())?;

        Ok(zip.finish()?)
    }

    /// Build the archive in memory
    pub fn to_bytes(&self, options: &ExportOptions) -> Result<Vec<u8>> {
        let cursor = self.write_to(Cursor::new(Vec::new()), options)?;
        Ok(cursor.into_inner())
    }

    /// Write `<output_dir>/<tag>_<timestamp>.zip`, creating the directory.
    ///
    /// The archive is written to a `.part` sibling and renamed into place, so
    /// a failed save leaves nothing behind in `output_dir`.
    pub fn save(&self, options: &ExportOptions) -> Result<PathBuf> {
        options.validate()?;
        fs::create_dir_all(&options.output_dir)?;

        let file_name = self.archive_file_name(options);
        let path = options.output_dir.join(&file_name);
        let partial = options.output_dir.join(format!("{file_name}.part"));

        let written = self
            .write_file(&partial, options)
            .and_then(|()| fs::rename(&partial, &path).map_err(RecorderError::from));
        if let Err(e) = written {
            log::warn!("Discarding partial archive {}: {}", partial.display(), e);
            let _ = fs::remove_file(&partial);
            return Err(e);
        }

        log::info!(
            "Saved recording {} ({} frames)",
            path.display(),
            self.records.len()
        );
        Ok(path)
    }

    fn write_file(&self, path: &Path, options: &ExportOptions) -> Result<()> {
        let file = BufWriter::new(File::create(path)?);
        let mut file = self.write_to(file, options)?;
        file.flush()?;
        Ok(())
    }
}

/// Package video chunks and Euler records into a timestamped archive on disk
pub fn save_recording_blocking<C: AsRef<[u8]>>(
    chunks: &[C],
    records: &[Euler],
    options: &ExportOptions,
) -> Result<PathBuf> {
    RecordingArchive::from_chunks(generate_timestamp(), chunks, records).save(options)
}

/// Async variant of [`save_recording_blocking`], run on tokio's blocking pool
pub async fn save_recording(
    chunks: Vec<Vec<u8>>,
    records: Vec<Euler>,
    options: ExportOptions,
) -> Result<PathBuf> {
    tokio::task::spawn_blocking(move || save_recording_blocking(&chunks, &records, &options))
        .await
        .map_err(|e| RecorderError::Task(e.to_string()))?
}

/// Current local time as `YYYYMMDD_HHMMSS`
pub fn generate_timestamp() -> String {
    format_timestamp(&Local::now())
}

pub fn format_timestamp<Tz: TimeZone>(time: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    time.format("%Y%m%d_%H%M%S").to_string()
}

/// Render records as `frame,yaw,pitch,roll` rows, angles to 3 decimals
pub fn generate_csv(records: &[Euler]) -> String {
    let mut csv = String::from(CSV_HEADER);
    for (index, record) in records.iter().enumerate() {
        csv.push_str(&format!(
            "{},{},{},{}\n",
            index,
            to_fixed(record.yaw, ANGLE_DECIMALS),
            to_fixed(record.pitch, ANGLE_DECIMALS),
            to_fixed(record.roll, ANGLE_DECIMALS)
        ));
    }
    csv
}

/// Fixed-point formatting, rounding half away from zero on the shortest
/// decimal form of `value` (`1.2345` → `1.235`). This is the CSV layout's
/// rounding rule, not JS `toFixed`, which rounds the exact binary value.
fn to_fixed(value: f64, decimals: usize) -> String {
    if value.is_nan() {
        return "NaN".to_string();
    }
    if value.is_infinite() {
        return if value > 0.0 { "Infinity" } else { "-Infinity" }.to_string();
    }

    // f64 Display never uses exponent notation
    let repr = value.abs().to_string();
    let (int_part, frac_part) = repr.split_once('.').unwrap_or((repr.as_str(), ""));

    let mut digits: Vec<u8> = int_part
        .bytes()
        .chain(frac_part.bytes().chain(std::iter::repeat(b'0')).take(decimals))
        .collect();

    let round_up = frac_part
        .as_bytes()
        .get(decimals)
        .is_some_and(|d| *d >= b'5');
    if round_up {
        let mut carry = true;
        for d in digits.iter_mut().rev() {
            if *d == b'9' {
                *d = b'0';
            } else {
                *d += 1;
                carry = false;
                break;
            }
        }
        if carry {
            digits.insert(0, b'1');
        }
    }

    let split = digits.len() - decimals;
    let mut out = String::with_capacity(digits.len() + 2);
    if value < 0.0 {
        out.push('-');
    }
    out.extend(digits[..split].iter().map(|&b| b as char));
    if decimals > 0 {
        out.push('.');
        out.extend(digits[split..].iter().map(|&b| b as char));
    }
    out
}
