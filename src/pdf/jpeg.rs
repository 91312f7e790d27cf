//! JPEG marker inspection
//!
//! Reads the header facts the image decoder does not report: the frame
//! component count, the Adobe APP14 marker and the JFIF density.

/// Color model of an embedded JPEG
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JpegColorSpace {
    Gray,
    Rgb,
    Cmyk,
}

impl JpegColorSpace {
    /// Color space for a frame with `components` channels
    pub fn from_components(components: u8) -> Option<Self> {
        match components {
            1 => Some(Self::Gray),
            3 => Some(Self::Rgb),
            4 => Some(Self::Cmyk),
            _ => None,
        }
    }

    /// PDF device color space name
    pub fn pdf_name(self) -> &'static [u8] {
        match self {
            Self::Gray => b"DeviceGray",
            Self::Rgb => b"DeviceRGB",
            Self::Cmyk => b"DeviceCMYK",
        }
    }
}

/// Facts collected from the marker segments before the first scan
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct JpegMarkers {
    /// Component count of the first frame header
    pub components: Option<u8>,
    /// An Adobe APP14 segment is present
    pub adobe: bool,
    /// Horizontal and vertical density in dots per inch
    pub density: Option<(f32, f32)>,
}

fn is_frame_header(marker: u8) -> bool {
    matches!(marker, 0xC0..=0xC3 | 0xC5..=0xC7 | 0xC9..=0xCB | 0xCD..=0xCF)
}

/// Walk the marker segments of `bytes` up to the start of scan
///
/// Stops quietly at the first malformed segment and returns what was read.
pub fn read_markers(bytes: &[u8]) -> JpegMarkers {
    let mut markers = JpegMarkers::default();
    if !bytes.starts_with(&[0xFF, 0xD8]) {
        return markers;
    }

    let mut pos = 2;
    while pos + 1 < bytes.len() {
        if bytes[pos] != 0xFF {
            break;
        }
        let marker = bytes[pos + 1];
        match marker {
            // Fill byte
            0xFF => {
                pos += 1;
                continue;
            }
            0x01 | 0xD0..=0xD7 => {
                pos += 2;
                continue;
            }
            0xD9 | 0xDA => break,
            _ => {}
        }

        let Some(length) = bytes.get(pos + 2..pos + 4) else { break };
        let length = u16::from_be_bytes([length[0], length[1]]) as usize;
        let end = pos + 2 + length;
        if length < 2 || end > bytes.len() {
            break;
        }
        let segment = &bytes[pos + 4..end];

        match marker {
            0xE0 if markers.density.is_none() => markers.density = jfif_density(segment),
            0xEE if segment.starts_with(b"Adobe") => markers.adobe = true,
            m if is_frame_header(m) && markers.components.is_none() => {
                markers.components = segment.get(5).copied();
            }
            _ => {}
        }

        pos = end;
    }

    markers
}

/// Density of a JFIF APP0 segment, in dots per inch
///
/// Aspect-ratio-only segments (unit 0) carry no density.
fn jfif_density(segment: &[u8]) -> Option<(f32, f32)> {
    if !segment.starts_with(b"JFIF\0") || segment.len() < 12 {
        return None;
    }

    let x = u16::from_be_bytes([segment[8], segment[9]]) as f32;
    let y = u16::from_be_bytes([segment[10], segment[11]]) as f32;
    if x == 0.0 || y == 0.0 {
        return None;
    }

    match segment[7] {
        1 => Some((x, y)),
        2 => Some((x * 2.54, y * 2.54)),
        _ => None,
    }
}
