//! HF2 encoding and decoding.
//!
//! HF2 is a tiled, delta-compressed heightfield container. All multi-byte
//! fields are little-endian.
//!
//! ## File Layout
//!
//! | Field             | Size (bytes) | Description                                  |
//! |-------------------|--------------|----------------------------------------------|
//! | magic             | 4            | ASCII "HF2" plus NUL padding.                |
//! | version           | 2            | Must be 0.                                   |
//! | width             | 4            | Raster width in samples.                     |
//! | height            | 4            | Raster height in samples.                    |
//! | tile size         | 2            | Edge length of the internal tiles.           |
//! | vertical precision| 4            | f32 quantization step in meters.             |
//! | horizontal scale  | 4            | f32 ground spacing in meters per sample.     |
//! | ext header length | 4            | Total byte length of the extended header.    |
//! | ext header blocks | variable     | 4-byte type, 16-byte name, u32 length, data. |
//! | tiles             | variable     | Row-major sequence of internal tiles.        |
//!
//! Each tile starts with an f32 (scale, offset) pair, then one delta stream
//! per row. Rows and columns are clipped at the raster edge for border
//! tiles. A row is a 1-byte delta-width selector (1, 2, or 4), an absolute
//! i32 start value, and `columns - 1` signed deltas at the selected width;
//! samples reconstruct by running sum and map through `value*scale+offset`.
//! Rows are stored bottom-up; the decoder returns the stitched grid in
//! top-to-bottom row order.

use crate::{Hf2Error, Result};

/// File magic: "HF2" with a NUL pad byte.
pub const MAGIC: [u8; 4] = *b"HF2\0";

/// The only format version this crate understands.
pub const SUPPORTED_VERSION: u16 = 0;

/// Fixed header length in bytes, magic through extended-header length.
pub const HEADER_LEN: usize = 28;

/// Fixed geometry and scaling read from the file header.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Hf2Header {
    /// Raster width in samples.
    pub width: u32,
    /// Raster height in samples.
    pub height: u32,
    /// Edge length of the internal tiles.
    pub tile_size: u16,
    /// Vertical quantization step in meters.
    pub vert_precision: f32,
    /// Ground spacing in meters per sample.
    pub horiz_scale: f32,
}

/// One typed, named block from the extended header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtHeaderBlock {
    /// 4-character type tag, NUL padding stripped.
    pub block_type: String,
    /// 16-character block name, NUL padding stripped.
    pub name: String,
    /// Raw block payload.
    pub data: Vec<u8>,
}

/// A fully decoded heightfield.
#[derive(Debug, Clone)]
pub struct Hf2Raster {
    /// Header as read from the file.
    pub header: Hf2Header,
    /// Extended-header blocks in file order.
    pub blocks: Vec<ExtHeaderBlock>,
    /// `width * height` samples, rows top-to-bottom.
    pub samples: Vec<f32>,
}

impl Hf2Raster {
    /// Sample at (col, row), row 0 at the top. None outside the raster.
    pub fn sample(&self, col: u32, row: u32) -> Option<f32> {
        if col >= self.header.width || row >= self.header.height {
            return None;
        }
        self.samples
            .get((row as usize) * (self.header.width as usize) + col as usize)
            .copied()
    }
}

// ============================================================================
// Decoding Functions
// ============================================================================

/// Bounds-checked little-endian cursor over the input buffer.
struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Reader { data, pos: 0 }
    }

    fn need(&self, n: usize) -> Result<()> {
        if self.pos + n > self.data.len() {
            return Err(Hf2Error::Truncated {
                offset: self.pos,
                needed: self.pos + n - self.data.len(),
            });
        }
        Ok(())
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        self.need(n)?;
        let slice = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    fn read_u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    fn read_u16(&mut self) -> Result<u16> {
        let b = self.take(2)?;
        Ok(u16::from_le_bytes([b[0], b[1]]))
    }

    fn read_u32(&mut self) -> Result<u32> {
        let b = self.take(4)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn read_i32(&mut self) -> Result<i32> {
        let b = self.take(4)?;
        Ok(i32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn read_f32(&mut self) -> Result<f32> {
        let b = self.take(4)?;
        Ok(f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    /// Fixed-width ASCII field with NUL padding stripped.
    fn read_padded_str(&mut self, n: usize) -> Result<String> {
        let raw = self.take(n)?;
        let stripped: Vec<u8> = raw.iter().copied().filter(|&b| b != 0).collect();
        Ok(String::from_utf8_lossy(&stripped).into_owned())
    }
}

fn read_header(r: &mut Reader) -> Result<(Hf2Header, usize)> {
    let magic = r.read_padded_str(4)?;
    if magic != "HF2" {
        return Err(Hf2Error::InvalidMagic(magic));
    }

    let version = r.read_u16()?;
    if version != SUPPORTED_VERSION {
        return Err(Hf2Error::UnsupportedVersion(version));
    }

    let width = r.read_u32()?;
    let height = r.read_u32()?;
    let tile_size = r.read_u16()?;
    let vert_precision = r.read_f32()?;
    let horiz_scale = r.read_f32()?;
    let ext_header_len = r.read_u32()? as usize;

    if width == 0 || height == 0 {
        return Err(Hf2Error::geometry(format!(
            "zero raster dimension ({}x{})",
            width, height
        )));
    }
    if tile_size == 0 {
        return Err(Hf2Error::geometry("zero tile size"));
    }

    Ok((
        Hf2Header {
            width,
            height,
            tile_size,
            vert_precision,
            horiz_scale,
        },
        ext_header_len,
    ))
}

fn read_ext_header(r: &mut Reader, declared_len: usize) -> Result<Vec<ExtHeaderBlock>> {
    let end = r.pos + declared_len;
    if end > r.data.len() {
        return Err(Hf2Error::ext_header(
            r.pos,
            "declared length exceeds file size",
        ));
    }

    let mut blocks = Vec::new();
    while r.pos < end {
        // type (4) + name (16) + length (4)
        if r.pos + 24 > end {
            return Err(Hf2Error::ext_header(
                r.pos,
                "block header exceeds declared length",
            ));
        }
        let block_type = r.read_padded_str(4)?;
        let name = r.read_padded_str(16)?;
        let block_len = r.read_u32()? as usize;
        if r.pos + block_len > end {
            return Err(Hf2Error::ext_header(
                r.pos,
                "block payload exceeds declared length",
            ));
        }
        let data = r.take(block_len)?.to_vec();
        blocks.push(ExtHeaderBlock {
            block_type,
            name,
            data,
        });
    }

    Ok(blocks)
}

/// One decoded internal tile: `rows * cols` values, rows bottom-up,
/// row-major with stride `cols`.
struct TileBlock {
    cols: usize,
    values: Vec<f32>,
}

fn read_tile(r: &mut Reader, rows: usize, cols: usize) -> Result<TileBlock> {
    let scale = r.read_f32()?;
    let offset = r.read_f32()?;

    let mut values = Vec::with_capacity(rows * cols);
    for _ in 0..rows {
        let width_pos = r.pos;
        let delta_width = r.read_u8()?;
        let start = r.read_i32()?;

        let mut acc = start;
        values.push(acc as f32 * scale + offset);
        for _ in 1..cols {
            let delta = match delta_width {
                1 => r.read_u8()? as i8 as i32,
                2 => r.read_u16()? as i16 as i32,
                4 => r.read_i32()?,
                other => {
                    return Err(Hf2Error::InvalidDeltaWidth {
                        width: other,
                        offset: width_pos,
                    })
                }
            };
            acc = acc.wrapping_add(delta);
            values.push(acc as f32 * scale + offset);
        }
    }

    Ok(TileBlock { cols, values })
}

/// Decode a complete HF2 buffer into a stitched raster.
///
/// Any gzip wrapping must be removed by the caller first. All failures are
/// fatal for the whole buffer; there is no partial recovery.
pub fn decode(data: &[u8]) -> Result<Hf2Raster> {
    let mut r = Reader::new(data);
    let (header, ext_header_len) = read_header(&mut r)?;

    let blocks = if ext_header_len > 0 {
        read_ext_header(&mut r, ext_header_len)?
    } else {
        Vec::new()
    };

    let width = header.width as usize;
    let height = header.height as usize;
    let ts = header.tile_size as usize;
    let tiles_per_row = width.div_ceil(ts);
    let tiles_per_col = height.div_ceil(ts);

    // Tiles in row-major order, clipped at the raster edge.
    let mut tiles = Vec::new();
    for tile_row in 0..tiles_per_col {
        let rows = ts.min(height - tile_row * ts);
        for tile_col in 0..tiles_per_row {
            let cols = ts.min(width - tile_col * ts);
            tiles.push(read_tile(&mut r, rows, cols)?);
        }
    }

    // Stitch: storage is bottom-up, output is top-to-bottom.
    let mut samples = vec![0.0f32; width * height];
    for out_row in 0..height {
        let src_row = height - 1 - out_row;
        let tile_row = src_row / ts;
        let row_in_tile = src_row % ts;
        for col in 0..width {
            let tile = &tiles[tile_row * tiles_per_row + col / ts];
            samples[out_row * width + col] = tile.values[row_in_tile * tile.cols + col % ts];
        }
    }

    Ok(Hf2Raster {
        header,
        blocks,
        samples,
    })
}

// ============================================================================
// Encoding Functions
// ============================================================================

/// Narrowest delta width (1, 2, or 4 bytes) that holds every delta in a row.
fn row_delta_width(deltas: &[i64]) -> u8 {
    let mut width = 1u8;
    for &d in deltas {
        if d < i8::MIN as i64 || d > i8::MAX as i64 {
            width = width.max(2);
        }
        if d < i16::MIN as i64 || d > i16::MAX as i64 {
            width = 4;
        }
    }
    width
}

/// Encode a top-to-bottom sample grid as an HF2 buffer.
///
/// Per-tile scale is `vert_precision` with zero offset; each row uses the
/// narrowest delta width that fits. The result decodes back to the input
/// up to `vert_precision / 2` per sample.
pub fn encode(
    samples: &[f32],
    width: u32,
    height: u32,
    tile_size: u16,
    vert_precision: f32,
) -> Result<Vec<u8>> {
    if width == 0 || height == 0 {
        return Err(Hf2Error::geometry(format!(
            "zero raster dimension ({}x{})",
            width, height
        )));
    }
    if tile_size == 0 {
        return Err(Hf2Error::geometry("zero tile size"));
    }
    if !(vert_precision > 0.0) {
        return Err(Hf2Error::geometry(format!(
            "non-positive vertical precision {}",
            vert_precision
        )));
    }
    let w = width as usize;
    let h = height as usize;
    if samples.len() != w * h {
        return Err(Hf2Error::geometry(format!(
            "expected {} samples for {}x{}, got {}",
            w * h,
            width,
            height,
            samples.len()
        )));
    }

    let mut buf = Vec::with_capacity(HEADER_LEN + samples.len() * 2);
    buf.extend_from_slice(&MAGIC);
    buf.extend_from_slice(&SUPPORTED_VERSION.to_le_bytes());
    buf.extend_from_slice(&width.to_le_bytes());
    buf.extend_from_slice(&height.to_le_bytes());
    buf.extend_from_slice(&tile_size.to_le_bytes());
    buf.extend_from_slice(&vert_precision.to_le_bytes());
    buf.extend_from_slice(&1.0f32.to_le_bytes()); // horizontal scale
    buf.extend_from_slice(&0u32.to_le_bytes()); // no extended header

    let ts = tile_size as usize;
    let tiles_per_row = w.div_ceil(ts);
    let tiles_per_col = h.div_ceil(ts);

    let mut quantized = Vec::with_capacity(ts);
    for tile_row in 0..tiles_per_col {
        let rows = ts.min(h - tile_row * ts);
        for tile_col in 0..tiles_per_row {
            let cols = ts.min(w - tile_col * ts);

            buf.extend_from_slice(&vert_precision.to_le_bytes()); // scale
            buf.extend_from_slice(&0.0f32.to_le_bytes()); // offset

            for row in 0..rows {
                // Rows are stored bottom-up within the raster.
                let src_row = tile_row * ts + row;
                let grid_row = h - 1 - src_row;
                let base = grid_row * w + tile_col * ts;

                quantized.clear();
                for col in 0..cols {
                    quantized.push((samples[base + col] / vert_precision).round() as i64);
                }
                let start = quantized[0];
                if start < i32::MIN as i64 || start > i32::MAX as i64 {
                    return Err(Hf2Error::geometry(format!(
                        "quantized sample {} exceeds 32-bit range",
                        start
                    )));
                }

                let deltas: Vec<i64> = quantized.windows(2).map(|p| p[1] - p[0]).collect();
                if deltas
                    .iter()
                    .any(|&d| d < i32::MIN as i64 || d > i32::MAX as i64)
                {
                    return Err(Hf2Error::geometry(
                        "sample delta exceeds 32-bit range".to_string(),
                    ));
                }
                let delta_width = row_delta_width(&deltas);

                buf.push(delta_width);
                buf.extend_from_slice(&(start as i32).to_le_bytes());
                for &d in &deltas {
                    match delta_width {
                        1 => buf.push(d as i8 as u8),
                        2 => buf.extend_from_slice(&(d as i16).to_le_bytes()),
                        _ => buf.extend_from_slice(&(d as i32).to_le_bytes()),
                    }
                }
            }
        }
    }

    Ok(buf)
}

// ============================================================================
// Tests
// ============================================================================
