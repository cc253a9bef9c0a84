use crate::error::{NetworkError, Result};
use flate2::read::GzDecoder;
use itertools::Itertools;
use log::info;
use std::{fs::File, io::Read, path::Path};

const IMAGE_MAGIC: u32 = 2051;
const LABEL_MAGIC: u32 = 2049;

/// A set of handwritten digits and their labels. `images[i]` holds the raw 0-255 pixel intensities,
/// row by row, of the digit labelled `labels[i]`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dataset {
    pub images: Vec<Vec<u8>>,
    pub labels: Vec<u8>,
}

impl Dataset {
    /// Pairs up the contents of an IDX image file and an IDX label file, both already unzipped.
    pub fn from_idx(image_bytes: &[u8], label_bytes: &[u8]) -> Result<Dataset> {
        let images = parse_images(image_bytes)?;
        let labels = parse_labels(label_bytes)?;

        // There should be an equal number of images and labels. If not, the two files do not
        // belong together.
        if images.len() != labels.len() {
            return Err(NetworkError::InvalidDataset(format!(
                "{} images but {} labels",
                images.len(),
                labels.len()
            )));
        }
        Ok(Dataset { images, labels })
    }

    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&[u8], u8)> {
        self.images
            .iter()
            .map(Vec::as_slice)
            .zip(self.labels.iter().copied())
    }
}

pub struct MnistData {
    pub training: Dataset,
    pub test: Dataset,
}

impl MnistData {
    /// Loads the four gzipped MNIST files from `dir`, under their usual names.
    pub fn load<P: AsRef<Path>>(dir: P) -> Result<MnistData> {
        let dir = dir.as_ref();
        let read = |name: &str| read_gz(&dir.join(name));

        let training = Dataset::from_idx(
            &read("train-images-idx3-ubyte.gz")?,
            &read("train-labels-idx1-ubyte.gz")?,
        )?;
        let test = Dataset::from_idx(
            &read("t10k-images-idx3-ubyte.gz")?,
            &read("t10k-labels-idx1-ubyte.gz")?,
        )?;
        info!(
            "Loaded {} training and {} test digits from {}",
            training.len(),
            test.len(),
            dir.display()
        );

        Ok(MnistData { training, test })
    }
}

// Reads a whole gzip file into memory, unzipped.
fn read_gz(path: &Path) -> Result<Vec<u8>> {
    let file = File::open(path)?;
    let mut unzipped_file = GzDecoder::new(file);
    let mut bytes = Vec::new();
    unzipped_file.read_to_end(&mut bytes)?;
    Ok(bytes)
}

// Reads `count` big-endian 32-bit header fields from the front of `bytes`, checking the first one
// against the expected magic number. Returns the remaining fields and the data after the header.
fn read_header(bytes: &[u8], magic: u32, count: usize) -> Result<(Vec<u32>, &[u8])> {
    if bytes.len() < count * 4 {
        return Err(NetworkError::InvalidDataset(format!(
            "header needs {} bytes, file has {}",
            count * 4,
            bytes.len()
        )));
    }
    let (header, data) = bytes.split_at(count * 4);
    let mut fields = header
        .chunks_exact(4)
        .map(|chunk| u32::from_be_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]));

    match fields.next() {
        Some(found) if found == magic => Ok((fields.collect(), data)),
        found => Err(NetworkError::InvalidDataset(format!(
            "expected magic number {magic}, found {found:?}"
        ))),
    }
}

/// Parses an unzipped IDX image file (magic number 2051) into one byte vector per image.
///
/// The header is four big-endian 32-bit integers: the magic number, the number of images, the
/// number of rows and the number of columns. The pixels follow, one byte each, image after image.
pub fn parse_images(bytes: &[u8]) -> Result<Vec<Vec<u8>>> {
    let (header, data) = read_header(bytes, IMAGE_MAGIC, 4)?;
    let (images, rows, columns) = (header[0] as usize, header[1] as usize, header[2] as usize);
    let too_large = || {
        NetworkError::InvalidDataset(format!("{images} images of {rows}x{columns} is too large"))
    };
    let pixels = rows.checked_mul(columns).ok_or_else(too_large)?;
    let needed = images.checked_mul(pixels).ok_or_else(too_large)?;

    if pixels == 0 || data.len() != needed {
        return Err(NetworkError::InvalidDataset(format!(
            "{images} images of {rows}x{columns} need {needed} bytes, found {}",
            data.len()
        )));
    }

    // Split the pixel bytes into rows*columns chunks (784-byte chunks for 28x28 digits).
    Ok(data
        .iter()
        .copied()
        .chunks(pixels)
        .into_iter()
        .map(|image_chunk| image_chunk.collect())
        .collect())
}

/// Parses an unzipped IDX label file (magic number 2049): the magic number, the number of labels,
/// then one byte per label.
pub fn parse_labels(bytes: &[u8]) -> Result<Vec<u8>> {
    let (header, data) = read_header(bytes, LABEL_MAGIC, 2)?;
    let labels = header[0] as usize;
    if data.len() != labels {
        return Err(NetworkError::InvalidDataset(format!(
            "expected {labels} labels, found {}",
            data.len()
        )));
    }
    Ok(data.to_vec())
}

/// Draws a 28x28 digit as text, one line per pixel row, shading each pixel by intensity.
pub fn render(image: &[u8]) -> String {
    const COLUMNS: usize = 28;

    let mut text = String::with_capacity(image.len() * 4);
    for (index, &pixel) in image.iter().enumerate() {
        if index > 0 && index % COLUMNS == 0 {
            text.push('\n');
        }

        let intensity = f64::from(pixel) / 255.0;
        text.push(match intensity {
            a if a < 0.2 => ' ',
            a if a < 0.4 => '░',
            a if a < 0.6 => '▒',
            a if a < 0.8 => '▓',
            _ => '█',
        });
    }
    text
}
