use std::io::{BufRead, BufReader, BufWriter, Read, Write};
use std::path::Path;

use crate::pointcloud::PointCloud;

/// Largest accepted record, in bytes.
const MAX_RECORD_BYTES: usize = 1024;

/// Largest accepted point count.
const MAX_POINTS: usize = 50_000_000;

/// Error types for the PCD module.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum PcdError {
    /// The file could not be accessed
    #[error("Failed to access PCD file")]
    Io(#[from] std::io::Error),

    /// The file uses a feature this reader does not handle
    #[error("Unsupported PCD property: {0}")]
    UnsupportedProperty(String),

    /// The header is inconsistent or truncated
    #[error("Malformed PCD header: {0}")]
    MalformedHeader(String),

    /// The path does not end in `.pcd`
    #[error("Invalid PCD file extension. Got:{0}")]
    InvalidFileExtension(String),

    /// The file contents do not form a valid cloud
    #[error("Invalid point cloud. {0}")]
    InvalidCloud(#[from] crate::error::PointCloudError),
}

/// One entry of the `FIELDS` line with its layout.
#[derive(Debug, Clone, PartialEq)]
struct PcdField {
    name: String,
    size: usize,
    kind: char,
    count: usize,
    offset: usize,
}

/// The parsed header of a PCD file.
#[derive(Debug, Clone, PartialEq)]
struct PcdHeader {
    fields: Vec<PcdField>,
    points: usize,
}

impl PcdHeader {
    /// Layout of `x y z` float32 and, for colored clouds, a packed `rgb`.
    fn for_cloud(cloud: &PointCloud) -> Self {
        let mut names = vec!["x", "y", "z"];
        if cloud.colors().is_some() {
            names.push("rgb");
        }
        let fields = names
            .into_iter()
            .enumerate()
            .map(|(i, name)| PcdField {
                name: name.to_string(),
                size: 4,
                kind: if name == "rgb" { 'U' } else { 'F' },
                count: 1,
                offset: 4 * i,
            })
            .collect();
        Self {
            fields,
            points: cloud.len(),
        }
    }

    /// Bytes per point record.
    fn record_bytes(&self) -> usize {
        self.fields
            .last()
            .map_or(0, |f| f.offset + f.size * f.count)
    }

    fn field(&self, name: &str) -> Option<&PcdField> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Parse header lines up to and including `DATA binary`.
    fn read<R: BufRead>(reader: &mut R) -> Result<Self, PcdError> {
        let mut names: Vec<String> = Vec::new();
        let mut sizes: Vec<usize> = Vec::new();
        let mut kinds: Vec<char> = Vec::new();
        let mut counts: Vec<usize> = Vec::new();
        let mut points = None;
        let mut line = String::new();

        loop {
            line.clear();
            if reader.read_line(&mut line)? == 0 {
                return Err(PcdError::MalformedHeader("missing DATA line".into()));
            }
            let mut tokens = line.split_whitespace();
            let Some(key) = tokens.next() else {
                continue;
            };
            match key {
                "FIELDS" => names = tokens.map(str::to_string).collect(),
                "SIZE" => sizes = parse_numbers(key, tokens)?,
                "COUNT" => counts = parse_numbers(key, tokens)?,
                "TYPE" => {
                    kinds = tokens
                        .map(|t| match t {
                            "F" => Ok('F'),
                            "U" => Ok('U'),
                            "I" => Ok('I'),
                            other => Err(PcdError::UnsupportedProperty(format!("TYPE {other}"))),
                        })
                        .collect::<Result<_, _>>()?;
                }
                "POINTS" => points = parse_numbers(key, tokens)?.first().copied(),
                "DATA" => match tokens.next() {
                    Some("binary") => break,
                    other => {
                        return Err(PcdError::UnsupportedProperty(format!(
                            "DATA {}",
                            other.unwrap_or_default()
                        )))
                    }
                },
                // comments, VERSION, WIDTH, HEIGHT and VIEWPOINT do not affect the layout
                _ => {}
            }
        }

        if names.is_empty() || sizes.len() != names.len() || kinds.len() != names.len() {
            return Err(PcdError::MalformedHeader(format!(
                "{} fields with {} sizes and {} types",
                names.len(),
                sizes.len(),
                kinds.len()
            )));
        }
        if counts.is_empty() {
            counts = vec![1; names.len()];
        } else if counts.len() != names.len() {
            return Err(PcdError::MalformedHeader(format!(
                "{} fields with {} counts",
                names.len(),
                counts.len()
            )));
        }

        let points = points.ok_or_else(|| PcdError::MalformedHeader("missing POINTS".into()))?;
        if points > MAX_POINTS {
            return Err(PcdError::MalformedHeader(format!("{points} points")));
        }

        let mut fields: Vec<PcdField> = Vec::with_capacity(names.len());
        let mut offset = 0usize;
        for (((name, size), kind), count) in names.into_iter().zip(sizes).zip(kinds).zip(counts) {
            if fields.iter().any(|f| f.name == name) {
                return Err(PcdError::MalformedHeader(format!("duplicate field {name}")));
            }
            let end = size
                .checked_mul(count)
                .and_then(|bytes| bytes.checked_add(offset))
                .filter(|end| *end <= MAX_RECORD_BYTES)
                .ok_or_else(|| PcdError::MalformedHeader("record too large".into()))?;
            fields.push(PcdField {
                name,
                size,
                kind,
                count,
                offset,
            });
            offset = end;
        }

        let header = Self { fields, points };
        header.check_supported()?;
        Ok(header)
    }

    /// Coordinates must be float32 and `rgb`, when present, a 4 byte scalar.
    fn check_supported(&self) -> Result<(), PcdError> {
        for axis in ["x", "y", "z"] {
            match self.field(axis) {
                Some(f) if f.size == 4 && f.count == 1 && f.kind == 'F' => {}
                Some(_) => {
                    return Err(PcdError::UnsupportedProperty(format!(
                        "field {axis} must be a float32 scalar"
                    )))
                }
                None => return Err(PcdError::UnsupportedProperty(format!("missing field {axis}"))),
            }
        }
        if let Some(rgb) = self.field("rgb") {
            if rgb.size != 4 || rgb.count != 1 {
                return Err(PcdError::UnsupportedProperty(
                    "field rgb must be a 4 byte scalar".into(),
                ));
            }
        }
        Ok(())
    }

    fn write<W: Write>(&self, writer: &mut W) -> Result<(), PcdError> {
        let fields = &self.fields;
        writeln!(writer, "# .PCD v0.7 - Point Cloud Data file format")?;
        writeln!(writer, "VERSION 0.7")?;
        writeln!(writer, "FIELDS {}", joined(fields, |f| f.name.clone()))?;
        writeln!(writer, "SIZE {}", joined(fields, |f| f.size))?;
        writeln!(writer, "TYPE {}", joined(fields, |f| f.kind))?;
        writeln!(writer, "COUNT {}", joined(fields, |f| f.count))?;
        writeln!(writer, "WIDTH {}", self.points)?;
        writeln!(writer, "HEIGHT 1")?;
        writeln!(writer, "VIEWPOINT 0 0 0 1 0 0 0")?;
        writeln!(writer, "POINTS {}", self.points)?;
        writeln!(writer, "DATA binary")?;
        Ok(())
    }
}

fn joined<T: ToString>(fields: &[PcdField], value: impl Fn(&PcdField) -> T) -> String {
    fields
        .iter()
        .map(|f| value(f).to_string())
        .collect::<Vec<_>>()
        .join(" ")
}

fn parse_numbers<'a>(
    key: &str,
    tokens: impl Iterator<Item = &'a str>,
) -> Result<Vec<usize>, PcdError> {
    tokens
        .map(|t| {
            t.parse()
                .map_err(|_| PcdError::MalformedHeader(format!("{key} value '{t}'")))
        })
        .collect()
}

/// The 4 bytes at `offset`; the header check guarantees they lie in the record.
fn word(record: &[u8], offset: usize) -> [u8; 4] {
    let mut word = [0u8; 4];
    word.copy_from_slice(&record[offset..offset + 4]);
    word
}

fn check_extension(path: &Path) -> Result<(), PcdError> {
    match path.extension() {
        Some(ext) if ext == "pcd" => Ok(()),
        Some(ext) => Err(PcdError::InvalidFileExtension(
            ext.to_string_lossy().into_owned(),
        )),
        None => Err(PcdError::InvalidFileExtension(String::new())),
    }
}

/// Read a binary PCD file.
///
/// # Arguments
/// * `path` - Path to a `.pcd` file.
///
/// # Returns
/// A [`PointCloud`] with the file's points and, when the file has an `rgb`
/// field, their colors. PCD files carry no reference frame, so the cloud
/// has an empty frame tag.
pub fn read_pcd_binary(path: impl AsRef<Path>) -> Result<PointCloud, PcdError> {
    check_extension(path.as_ref())?;
    let mut reader = BufReader::new(std::fs::File::open(path)?);

    let header = PcdHeader::read(&mut reader)?;
    let offset = |name: &str| header.field(name).map(|f| f.offset);
    let (Some(ox), Some(oy), Some(oz)) = (offset("x"), offset("y"), offset("z")) else {
        return Err(PcdError::UnsupportedProperty("missing coordinates".into()));
    };
    let orgb = offset("rgb");

    let mut record = vec![0u8; header.record_bytes()];
    let mut points = Vec::with_capacity(header.points);
    let mut colors = orgb.map(|_| Vec::with_capacity(header.points));

    for _ in 0..header.points {
        reader.read_exact(&mut record)?;
        points.push([ox, oy, oz].map(|o| f32::from_le_bytes(word(&record, o)) as f64));
        if let (Some(o), Some(colors)) = (orgb, colors.as_mut()) {
            // little endian 0x00RRGGBB
            let [b, g, r, _] = word(&record, o);
            colors.push([r, g, b]);
        }
    }

    Ok(PointCloud::new(points, colors, String::new())?)
}

/// Write a point cloud as a binary PCD file.
///
/// Points are stored as float32 `x y z`, followed by a packed `rgb` field
/// when the cloud has colors.
pub fn write_pcd_binary(path: impl AsRef<Path>, cloud: &PointCloud) -> Result<(), PcdError> {
    check_extension(path.as_ref())?;
    let mut writer = BufWriter::new(std::fs::File::create(path)?);

    PcdHeader::for_cloud(cloud).write(&mut writer)?;

    let colors = cloud.colors();
    for (idx, point) in cloud.points().iter().enumerate() {
        for v in point {
            writer.write_all(&(*v as f32).to_le_bytes())?;
        }
        if let Some(&[r, g, b]) = colors.and_then(|c| c.get(idx)) {
            writer.write_all(&[b, g, r, 0])?;
        }
    }

    writer.flush()?;
    Ok(())
}
