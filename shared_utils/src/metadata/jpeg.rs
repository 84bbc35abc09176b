//! JPEG segment codec
//!
//! A JPEG stream is `SOI` followed by marker segments
//! `FF <marker> <len: u16 BE, includes itself> <payload>` up to `SOS`, after
//! which entropy-coded data runs to `EOI`. Metadata only ever lives in the
//! header part, so iteration stops after yielding `SOS`.
//!
//! The Exif block is an APP1 segment whose payload is `"Exif\0\0"` followed by
//! a TIFF structure. This module hands out and accepts the bare TIFF bytes.

use thiserror::Error;

pub const SOI: [u8; 2] = [0xFF, 0xD8];
pub const APP1: u8 = 0xE1;
pub const SOS: u8 = 0xDA;
pub const EOI: u8 = 0xD9;
pub const EXIF_HEADER: &[u8; 6] = b"Exif\0\0";

/// Largest payload a single segment can carry (length field counts itself).
pub const MAX_SEGMENT_PAYLOAD: usize = u16::MAX as usize - 2;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SegmentError {
    #[error("missing start-of-image marker")]
    NotJpeg,

    #[error("expected marker at offset {offset}, found 0x{byte:02X}")]
    BadMarker { offset: usize, byte: u8 },

    #[error("segment at offset {offset} runs past end of data")]
    Truncated { offset: usize },

    #[error("segment at offset {offset} declares invalid length {length}")]
    BadLength { offset: usize, length: u16 },

    #[error("Exif payload of {size} bytes does not fit in one segment")]
    TooLarge { size: usize },
}

/// One marker segment. `offset` points at its leading `0xFF`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Segment<'a> {
    pub marker: u8,
    pub offset: usize,
    pub payload: &'a [u8],
}

impl Segment<'_> {
    pub fn is_exif(&self) -> bool {
        self.marker == APP1 && self.payload.starts_with(EXIF_HEADER)
    }
}

/// Iterator over header segments; yields at most one error, then stops.
pub struct Segments<'a> {
    data: &'a [u8],
    pos: usize,
    finished: bool,
}

/// Start iterating the segments after `SOI`.
pub fn segments(data: &[u8]) -> Result<Segments<'_>, SegmentError> {
    if !data.starts_with(&SOI) {
        return Err(SegmentError::NotJpeg);
    }
    Ok(Segments {
        data,
        pos: SOI.len(),
        finished: false,
    })
}

fn is_standalone(marker: u8) -> bool {
    matches!(marker, 0x01 | 0xD0..=0xD9)
}

impl<'a> Segments<'a> {
    fn read_segment(&mut self) -> Result<Segment<'a>, SegmentError> {
        let data = self.data;
        let offset = self.pos;

        if data[offset] != 0xFF {
            return Err(SegmentError::BadMarker {
                offset,
                byte: data[offset],
            });
        }

        // Any number of 0xFF fill bytes may precede the marker code.
        let mut p = offset + 1;
        while data.get(p) == Some(&0xFF) {
            p += 1;
        }
        let marker = *data.get(p).ok_or(SegmentError::Truncated { offset })?;
        if marker == 0x00 {
            return Err(SegmentError::BadMarker { offset, byte: marker });
        }
        p += 1;

        if is_standalone(marker) {
            self.pos = p;
            return Ok(Segment {
                marker,
                offset,
                payload: &[],
            });
        }

        let len_bytes = data
            .get(p..p + 2)
            .ok_or(SegmentError::Truncated { offset })?;
        let length = u16::from_be_bytes([len_bytes[0], len_bytes[1]]);
        if length < 2 {
            return Err(SegmentError::BadLength { offset, length });
        }
        let end = p + length as usize;
        let payload = data
            .get(p + 2..end)
            .ok_or(SegmentError::Truncated { offset })?;
        self.pos = end;

        Ok(Segment {
            marker,
            offset,
            payload,
        })
    }
}

impl<'a> Iterator for Segments<'a> {
    type Item = Result<Segment<'a>, SegmentError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished || self.pos >= self.data.len() {
            return None;
        }
        let result = self.read_segment();
        match &result {
            Ok(segment) if segment.marker == SOS || segment.marker == EOI => self.finished = true,
            Err(_) => self.finished = true,
            Ok(_) => {}
        }
        Some(result)
    }
}

/// Return the TIFF bytes of the first Exif APP1 segment, if any.
pub fn extract_exif(data: &[u8]) -> Result<Option<&[u8]>, SegmentError> {
    for segment in segments(data)? {
        let segment = segment?;
        if segment.is_exif() {
            return Ok(Some(&segment.payload[EXIF_HEADER.len()..]));
        }
    }
    Ok(None)
}

/// Frame `tiff` as an Exif APP1 segment and place it directly after `SOI`.
pub fn insert_exif(jpeg: &[u8], tiff: &[u8]) -> Result<Vec<u8>, SegmentError> {
    if !jpeg.starts_with(&SOI) {
        return Err(SegmentError::NotJpeg);
    }
    let payload_len = EXIF_HEADER.len() + tiff.len();
    if payload_len > MAX_SEGMENT_PAYLOAD {
        return Err(SegmentError::TooLarge { size: payload_len });
    }

    let mut out = Vec::with_capacity(jpeg.len() + payload_len + 4);
    out.extend_from_slice(&SOI);
    out.extend_from_slice(&[0xFF, APP1]);
    out.extend_from_slice(&((payload_len + 2) as u16).to_be_bytes());
    out.extend_from_slice(EXIF_HEADER);
    out.extend_from_slice(tiff);
    out.extend_from_slice(&jpeg[SOI.len()..]);
    Ok(out)
}
