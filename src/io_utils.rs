//! File and stream plumbing for the command-line adapter.
//!
//! The engine itself never touches the filesystem; indicator tables are read
//! and summaries written through this module:
//!
//! - **Delimiter resolution**: `.tsv` selects tab, anything else comma, with
//!   manual override support.
//! - **Encoding**: input decoding and output transcoding via `encoding_rs`,
//!   defaulting to UTF-8.
//! - **stdin/stdout**: the `-` path convention routes through standard streams.
//! - **Quoting**: CSV output quotes only where needed, since country names
//!   such as `Korea, Rep.` carry commas.

use std::{
    fs::File,
    io::{self, BufReader, BufWriter, Read, Write},
    path::Path,
};

use anyhow::{Context, Result, anyhow};
use csv::QuoteStyle;
use encoding_rs::{CoderResult, Encoder, Encoding, UTF_8};

pub const DEFAULT_CSV_DELIMITER: u8 = b',';
pub const DEFAULT_TSV_DELIMITER: u8 = b'\t';

pub fn is_dash(path: &Path) -> bool {
    path == Path::new("-")
}

pub fn resolve_encoding(label: Option<&str>) -> Result<&'static Encoding> {
    match label {
        None => Ok(UTF_8),
        Some(value) => Encoding::for_label(value.trim().as_bytes())
            .ok_or_else(|| anyhow!("Unknown encoding '{value}'")),
    }
}

fn delimiter_for_extension(path: &Path) -> Option<u8> {
    let ext = path.extension()?.to_str()?;
    if ext.eq_ignore_ascii_case("tsv") {
        Some(DEFAULT_TSV_DELIMITER)
    } else if ext.eq_ignore_ascii_case("csv") {
        Some(DEFAULT_CSV_DELIMITER)
    } else {
        None
    }
}

pub fn resolve_input_delimiter(path: &Path, provided: Option<u8>) -> u8 {
    provided
        .or_else(|| delimiter_for_extension(path))
        .unwrap_or(DEFAULT_CSV_DELIMITER)
}

pub fn resolve_output_delimiter(path: Option<&Path>, provided: Option<u8>, fallback: u8) -> u8 {
    provided
        .or_else(|| path.and_then(delimiter_for_extension))
        .unwrap_or(fallback)
}

/// Rows may be shorter than the header; missing trailing cells read as blank.
pub fn open_csv_reader<R: Read>(reader: R, delimiter: u8) -> csv::Reader<R> {
    csv::ReaderBuilder::new()
        .has_headers(true)
        .delimiter(delimiter)
        .double_quote(true)
        .flexible(true)
        .from_reader(reader)
}

pub fn open_csv_reader_from_path(path: &Path, delimiter: u8) -> Result<csv::Reader<Box<dyn Read>>> {
    let reader: Box<dyn Read> = if is_dash(path) {
        Box::new(io::stdin().lock())
    } else {
        let file = File::open(path).with_context(|| format!("Opening indicator table {path:?}"))?;
        Box::new(BufReader::new(file))
    };
    Ok(open_csv_reader(reader, delimiter))
}

/// Opens `path` for writing, or stdout when `path` is `None` or `-`.
pub fn open_output(path: Option<&Path>, encoding: &'static Encoding) -> Result<Box<dyn Write>> {
    let base: Box<dyn Write> = match path {
        Some(p) if !is_dash(p) => Box::new(BufWriter::new(
            File::create(p).with_context(|| format!("Creating output file {p:?}"))?,
        )),
        _ => Box::new(io::stdout()),
    };
    Ok(if encoding == UTF_8 {
        base
    } else {
        Box::new(EncodingWriter::new(base, encoding))
    })
}

pub fn open_csv_writer(
    path: Option<&Path>,
    delimiter: u8,
    encoding: &'static Encoding,
) -> Result<csv::Writer<Box<dyn Write>>> {
    let writer = open_output(path, encoding)?;
    Ok(csv::WriterBuilder::new()
        .delimiter(delimiter)
        .quote_style(QuoteStyle::Necessary)
        .from_writer(writer))
}

/// Decodes one field. Malformed input is an error rather than a silent
/// replacement, so a wrong `--input-encoding` is caught early.
pub fn decode_field(bytes: &[u8], encoding: &'static Encoding) -> Result<String> {
    if encoding == UTF_8 {
        return std::str::from_utf8(bytes)
            .map(str::to_owned)
            .map_err(|err| anyhow!("Invalid UTF-8 in input: {err}"));
    }
    encoding
        .decode_without_bom_handling_and_without_replacement(bytes)
        .map(|text| text.into_owned())
        .ok_or_else(|| anyhow!("Input is not valid {}", encoding.name()))
}

pub fn decode_record(record: &csv::ByteRecord, encoding: &'static Encoding) -> Result<Vec<String>> {
    record
        .iter()
        .map(|field| decode_field(field, encoding))
        .collect()
}

/// Header names with a leading UTF-8 byte order mark removed.
pub fn reader_headers<R: Read>(
    reader: &mut csv::Reader<R>,
    encoding: &'static Encoding,
) -> Result<Vec<String>> {
    let mut headers = decode_record(reader.byte_headers()?, encoding)?;
    if let Some(first) = headers.first_mut() {
        if let Some(stripped) = first.strip_prefix('\u{feff}') {
            *first = stripped.to_string();
        }
    }
    Ok(headers)
}

/// Re-encodes UTF-8 text written to it into `encoding`. Bytes of a code
/// point split across two `write` calls are held until the rest arrives.
struct EncodingWriter<W: Write> {
    inner: W,
    encoder: Encoder,
    pending: Vec<u8>,
}

impl<W: Write> EncodingWriter<W> {
    fn new(inner: W, encoding: &'static Encoding) -> Self {
        Self {
            inner,
            encoder: encoding.new_encoder(),
            pending: Vec::new(),
        }
    }

    fn encode(&mut self, text: &str, last: bool) -> io::Result<()> {
        let mut out = Vec::with_capacity(text.len() + 16);
        let mut remaining = text;
        loop {
            let (result, read, replaced) =
                self.encoder
                    .encode_from_utf8_to_vec(remaining, &mut out, last);
            if replaced {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!(
                        "Output contains characters not representable in {}",
                        self.encoder.encoding().name()
                    ),
                ));
            }
            remaining = &remaining[read..];
            match result {
                CoderResult::InputEmpty => break,
                CoderResult::OutputFull => out.reserve(remaining.len().max(16) * 4),
            }
        }
        self.inner.write_all(&out)
    }

    fn drain_pending(&mut self, last: bool) -> io::Result<()> {
        let complete = match std::str::from_utf8(&self.pending) {
            Ok(_) => self.pending.len(),
            Err(err) if err.error_len().is_none() && !last => err.valid_up_to(),
            Err(err) => {
                return Err(io::Error::new(io::ErrorKind::InvalidData, err));
            }
        };
        let tail = self.pending.split_off(complete);
        let head = std::mem::replace(&mut self.pending, tail);
        let text = String::from_utf8(head)
            .map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err))?;
        self.encode(&text, last)
    }
}

impl<W: Write> Write for EncodingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.pending.extend_from_slice(buf);
        self.drain_pending(false)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.drain_pending(false)?;
        self.inner.flush()
    }
}

impl<W: Write> Drop for EncodingWriter<W> {
    fn drop(&mut self) {
        let _ = self.drain_pending(true);
        let _ = self.inner.flush();
    }
}
