//! Orientation access inside an Exif TIFF block.
//!
//! Only IFD0 is walked: header (`II`/`MM`, 42, IFD0 offset), then 12-byte
//! entries `tag u16, type u16, count u32, value/offset u32`. A SHORT value with
//! count 1 sits inline in the first two bytes of the value field.

pub const ORIENTATION_TAG: u16 = 0x0112;
const TIFF_MAGIC: u16 = 42;
const TYPE_SHORT: u16 = 3;
const IFD_ENTRY_LEN: usize = 12;

/// Camera orientation as stored in tag 0x0112.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Orientation {
    Normal = 1,
    FlipHorizontal = 2,
    Rotate180 = 3,
    FlipVertical = 4,
    /// Rotate 90° clockwise, then mirror horizontally.
    Transpose = 5,
    Rotate90 = 6,
    /// Rotate 90° counter-clockwise, then mirror horizontally.
    Transverse = 7,
    Rotate270 = 8,
}

impl Orientation {
    pub fn from_exif(value: u16) -> Option<Self> {
        match value {
            1 => Some(Orientation::Normal),
            2 => Some(Orientation::FlipHorizontal),
            3 => Some(Orientation::Rotate180),
            4 => Some(Orientation::FlipVertical),
            5 => Some(Orientation::Transpose),
            6 => Some(Orientation::Rotate90),
            7 => Some(Orientation::Transverse),
            8 => Some(Orientation::Rotate270),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ByteOrder {
    Little,
    Big,
}

impl ByteOrder {
    fn read_u16(self, buf: &[u8], off: usize) -> Option<u16> {
        let b = buf.get(off..off.checked_add(2)?)?;
        Some(match self {
            ByteOrder::Little => u16::from_le_bytes([b[0], b[1]]),
            ByteOrder::Big => u16::from_be_bytes([b[0], b[1]]),
        })
    }

    fn read_u32(self, buf: &[u8], off: usize) -> Option<u32> {
        let b = buf.get(off..off.checked_add(4)?)?;
        Some(match self {
            ByteOrder::Little => u32::from_le_bytes([b[0], b[1], b[2], b[3]]),
            ByteOrder::Big => u32::from_be_bytes([b[0], b[1], b[2], b[3]]),
        })
    }

    fn encode_u16(self, value: u16) -> [u8; 2] {
        match self {
            ByteOrder::Little => value.to_le_bytes(),
            ByteOrder::Big => value.to_be_bytes(),
        }
    }
}

fn parse_header(tiff: &[u8]) -> Option<(ByteOrder, usize)> {
    let order = match tiff.get(0..2)? {
        b"II" => ByteOrder::Little,
        b"MM" => ByteOrder::Big,
        _ => return None,
    };
    if order.read_u16(tiff, 2)? != TIFF_MAGIC {
        return None;
    }
    let ifd0 = order.read_u32(tiff, 4)? as usize;
    Some((order, ifd0))
}

/// Byte order and offset of the inline orientation value, if present.
fn locate_orientation(tiff: &[u8]) -> Option<(ByteOrder, usize)> {
    let (order, ifd0) = parse_header(tiff)?;
    let count = order.read_u16(tiff, ifd0)? as usize;

    for i in 0..count {
        let entry = ifd0.checked_add(2 + i * IFD_ENTRY_LEN)?;
        let tag = order.read_u16(tiff, entry)?;
        if tag != ORIENTATION_TAG {
            continue;
        }
        let field_type = order.read_u16(tiff, entry + 2)?;
        let components = order.read_u32(tiff, entry + 4)?;
        if field_type != TYPE_SHORT || components == 0 {
            return None;
        }
        let value_offset = entry + 8;
        order.read_u16(tiff, value_offset)?;
        return Some((order, value_offset));
    }
    None
}

/// Raw tag value, including out-of-range ones.
pub fn orientation_value(tiff: &[u8]) -> Option<u16> {
    let (order, offset) = locate_orientation(tiff)?;
    order.read_u16(tiff, offset)
}

pub fn read_orientation(tiff: &[u8]) -> Option<Orientation> {
    orientation_value(tiff).and_then(Orientation::from_exif)
}

/// Copy of `tiff` with the orientation value set to 1 (unchanged when absent).
pub fn clear_orientation(tiff: &[u8]) -> Vec<u8> {
    let mut out = tiff.to_vec();
    if let Some((order, offset)) = locate_orientation(tiff) {
        out[offset..offset + 2].copy_from_slice(&order.encode_u16(Orientation::Normal as u16));
    }
    out
}
