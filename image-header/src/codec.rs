//! Conversion between raw header bytes and [`ImageHeader`]s.
//!
//! Fields are read and written one at a time at the offsets of
//! [`image_header_raw::ImageHeader`], in little-endian byte order. No field is interpreted.

use core::{error, fmt, mem::offset_of};

use image_header_raw::ImageHeader as RawImageHeader;

use crate::{GitSha, ImageHeader, RawDeviceId, RawImageType, Version, HEADER_SIZE};

/// Decodes the [`ImageHeader`] stored in the first [`HEADER_SIZE`] bytes of `bytes`.
///
/// Any bytes past the header are ignored.
///
/// # Errors
///
/// Returns [`DecodeError::TruncatedHeader`] if `bytes` is shorter than [`HEADER_SIZE`].
pub fn decode(bytes: &[u8]) -> Result<ImageHeader, DecodeError> {
    let Some(header) = bytes.first_chunk::<HEADER_SIZE>() else {
        return Err(DecodeError::TruncatedHeader {
            length: bytes.len(),
        });
    };

    Ok(ImageHeader {
        magic: read_u16(header, offset_of!(RawImageHeader, image_magic)),
        header_version: read_u16(header, offset_of!(RawImageHeader, image_hdr_version)),
        crc: read_u32(header, offset_of!(RawImageHeader, crc)),
        data_size: read_u32(header, offset_of!(RawImageHeader, data_size)),
        image_type: RawImageType(header[offset_of!(RawImageHeader, image_type)]),
        version: Version {
            major: header[offset_of!(RawImageHeader, version_major)],
            minor: header[offset_of!(RawImageHeader, version_minor)],
            patch: header[offset_of!(RawImageHeader, version_patch)],
        },
        vector_addr: read_u32(header, offset_of!(RawImageHeader, vector_addr)),
        device_id: RawDeviceId(read_u16(header, offset_of!(RawImageHeader, device_id))),
        git_dirty: header[offset_of!(RawImageHeader, git_dirty)],
        git_ahead: header[offset_of!(RawImageHeader, git_ahead)],
        git_sha: GitSha(read_sha(header, offset_of!(RawImageHeader, git_sha))),
    })
}

/// Encodes `header` into its [`HEADER_SIZE`] byte representation.
pub fn encode(header: &ImageHeader) -> [u8; HEADER_SIZE] {
    let mut bytes = [0; HEADER_SIZE];

    write(
        &mut bytes,
        offset_of!(RawImageHeader, image_magic),
        &header.magic.to_le_bytes(),
    );
    write(
        &mut bytes,
        offset_of!(RawImageHeader, image_hdr_version),
        &header.header_version.to_le_bytes(),
    );
    write(
        &mut bytes,
        offset_of!(RawImageHeader, crc),
        &header.crc.to_le_bytes(),
    );
    write(
        &mut bytes,
        offset_of!(RawImageHeader, data_size),
        &header.data_size.to_le_bytes(),
    );
    bytes[offset_of!(RawImageHeader, image_type)] = header.image_type.0;
    bytes[offset_of!(RawImageHeader, version_major)] = header.version.major;
    bytes[offset_of!(RawImageHeader, version_minor)] = header.version.minor;
    bytes[offset_of!(RawImageHeader, version_patch)] = header.version.patch;
    write(
        &mut bytes,
        offset_of!(RawImageHeader, vector_addr),
        &header.vector_addr.to_le_bytes(),
    );
    write(
        &mut bytes,
        offset_of!(RawImageHeader, device_id),
        &header.device_id.0.to_le_bytes(),
    );
    bytes[offset_of!(RawImageHeader, git_dirty)] = header.git_dirty;
    bytes[offset_of!(RawImageHeader, git_ahead)] = header.git_ahead;
    write(
        &mut bytes,
        offset_of!(RawImageHeader, git_sha),
        header.git_sha.as_bytes(),
    );

    bytes
}

fn read_u16(header: &[u8; HEADER_SIZE], offset: usize) -> u16 {
    u16::from_le_bytes([header[offset], header[offset + 1]])
}

fn read_u32(header: &[u8; HEADER_SIZE], offset: usize) -> u32 {
    u32::from_le_bytes([
        header[offset],
        header[offset + 1],
        header[offset + 2],
        header[offset + 3],
    ])
}

fn read_sha(header: &[u8; HEADER_SIZE], offset: usize) -> [u8; 8] {
    let mut sha = [0; 8];
    sha.copy_from_slice(&header[offset..offset + 8]);
    sha
}

fn write(header: &mut [u8; HEADER_SIZE], offset: usize, value: &[u8]) {
    header[offset..offset + value.len()].copy_from_slice(value);
}

/// Various errors that can occur while decoding an [`ImageHeader`].
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq)]
pub enum DecodeError {
    /// Fewer than [`HEADER_SIZE`] bytes were supplied.
    TruncatedHeader {
        /// The number of bytes supplied.
        length: usize,
    },
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TruncatedHeader { length } => write!(
                f,
                "truncated header: {length} bytes supplied, header requires {HEADER_SIZE} bytes"
            ),
        }
    }
}

impl error::Error for DecodeError {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures;

    /// Header bytes laid out by hand following the documented offsets.
    const LAYOUT: [u8; HEADER_SIZE] = [
        0xFE, 0xC0, // magic
        0x01, 0x00, // header version
        0x78, 0x56, 0x34, 0x12, // crc
        0x00, 0x01, 0x00, 0x00, // data size
        0x01, // image type
        0x02, 0x03, 0x04, // version
        0x00, 0x04, 0x00, 0x08, // vector address
        0x03, 0x00, // device id
        0x01, // git dirty
        0x07, // git ahead
        b'd', b'e', b'a', b'd', b'b', b'e', b'e', b'f', // git sha
    ];

    #[test]
    fn decode_follows_layout() {
        let header = decode(&LAYOUT).unwrap();

        assert_eq!(header.magic, 0xC0FE);
        assert_eq!(header.header_version, 1);
        assert_eq!(header.crc, 0x1234_5678);
        assert_eq!(header.data_size, 256);
        assert_eq!(header.image_type, RawImageType::APP);
        assert_eq!(header.version, Version::new(2, 3, 4));
        assert_eq!(header.vector_addr, 0x0800_0400);
        assert_eq!(header.device_id, RawDeviceId::WLP);
        assert_eq!(header.git_dirty, 1);
        assert_eq!(header.git_ahead, 7);
        assert_eq!(header.git_sha, GitSha(*b"deadbeef"));
    }

    #[test]
    fn encode_follows_layout() {
        let header = decode(&LAYOUT).unwrap();
        assert_eq!(encode(&header), LAYOUT);
    }

    #[test]
    fn round_trip() {
        let payload = fixtures::payload();
        let header = fixtures::header_for(&payload);
        assert_eq!(decode(&encode(&header)), Ok(header));

        let extremes = ImageHeader {
            magic: u16::MAX,
            header_version: u16::MAX,
            crc: u32::MAX,
            data_size: u32::MAX,
            image_type: RawImageType(u8::MAX),
            version: Version::new(u8::MAX, u8::MAX, u8::MAX),
            vector_addr: u32::MAX,
            device_id: RawDeviceId(u16::MAX),
            git_dirty: u8::MAX,
            git_ahead: u8::MAX,
            git_sha: GitSha([u8::MAX; 8]),
        };
        assert_eq!(decode(&encode(&extremes)), Ok(extremes));
    }

    #[test]
    fn short_input_is_truncated() {
        for length in 0..HEADER_SIZE {
            assert_eq!(
                decode(&LAYOUT[..length]),
                Err(DecodeError::TruncatedHeader { length })
            );
        }
    }

    #[test]
    fn trailing_bytes_are_ignored() {
        let mut bytes = [0xAA; HEADER_SIZE + 16];
        bytes[..HEADER_SIZE].copy_from_slice(&LAYOUT);

        assert_eq!(decode(&bytes), decode(&LAYOUT));
    }

    #[test]
    fn unknown_enum_values_are_kept_raw() {
        let mut bytes = LAYOUT;
        bytes[offset_of!(RawImageHeader, image_type)] = 0x7F;
        bytes[offset_of!(RawImageHeader, device_id)] = 0x34;
        bytes[offset_of!(RawImageHeader, device_id) + 1] = 0x12;

        let header = decode(&bytes).unwrap();
        assert_eq!(header.image_type, RawImageType(0x7F));
        assert_eq!(header.device_id, RawDeviceId(0x1234));
    }
}
