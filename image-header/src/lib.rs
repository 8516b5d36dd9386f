//! Decoding, validation and stamping of firmware image headers.
//!
//! Every firmware image begins with a fixed [`HEADER_SIZE`] byte header followed by the payload.
//! [`codec`] converts between the raw bytes and an [`ImageHeader`], [`validate`] decides whether
//! an [`ImageHeader`] and its payload form an image that may be booted or flashed, and [`stamp`]
//! patches the integrity fields of a freshly built image.

#![no_std]

use core::{error, fmt};

pub use image_header_raw::{
    DeviceId as RawDeviceId, ImageType as RawImageType, HEADER_SIZE, HEADER_VERSION_1,
    HEADER_VERSION_CURRENT, IMAGE_MAGIC,
};

pub use codec::{decode, encode, DecodeError};
pub use stamp::{stamp, StampError};
pub use validate::{
    validate, DeviceId, HeaderVersion, ImageType, ParseDeviceIdError, ValidImage,
    ValidationError, Validator,
};

pub mod codec;
pub mod stamp;
pub mod validate;

/// A decoded image header.
///
/// The fields hold exactly what was stored in the header; no field has been checked. Use
/// [`Validator`] to turn an [`ImageHeader`] into a [`ValidImage`].
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq)]
pub struct ImageHeader {
    /// Magic number identifying the header.
    pub magic: u16,
    /// The version of the header format.
    pub header_version: u16,
    /// CRC-32 of the payload.
    pub crc: u32,
    /// The size, in bytes, of the payload.
    pub data_size: u32,
    /// The type of the image.
    pub image_type: RawImageType,
    /// The version of the image contents.
    pub version: Version,
    /// The address at which execution begins.
    pub vector_addr: u32,
    /// The device the image is built for.
    pub device_id: RawDeviceId,
    /// Non-zero if the image was built from a tree with uncommitted changes.
    pub git_dirty: u8,
    /// The number of commits between the nearest version tag and the build commit.
    pub git_ahead: u8,
    /// The truncated SHA of the build commit.
    pub git_sha: GitSha,
}

/// The semantic version of an image's contents.
#[derive(Clone, Copy, Debug, Default, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct Version {
    /// The major version.
    pub major: u8,
    /// The minor version.
    pub minor: u8,
    /// The patch version.
    pub patch: u8,
}

impl Version {
    /// Creates a new [`Version`].
    pub const fn new(major: u8, minor: u8, patch: u8) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

/// The truncated SHA of the commit an image was built from.
///
/// The bytes are not guaranteed to be text, nor to be NUL terminated.
#[derive(Clone, Copy, Debug, Default, Hash, PartialEq, Eq)]
pub struct GitSha(pub [u8; 8]);

impl GitSha {
    /// Returns the raw bytes of the SHA.
    pub const fn as_bytes(&self) -> &[u8; 8] {
        &self.0
    }
}

impl fmt::Display for GitSha {
    /// Writes the SHA as text if it is ASCII hex (ignoring trailing NUL bytes), otherwise writes
    /// each byte as two lowercase hex digits.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text_length = self
            .0
            .iter()
            .rposition(|&byte| byte != 0)
            .map_or(0, |index| index + 1);
        let text = &self.0[..text_length];

        if !text.is_empty() && text.iter().all(u8::is_ascii_hexdigit) {
            for &byte in text {
                write!(f, "{}", char::from(byte))?;
            }
        } else {
            for byte in self.0 {
                write!(f, "{byte:02x}")?;
            }
        }

        Ok(())
    }
}

/// Computes the CRC-32 of `payload`, as stored in [`ImageHeader::crc`].
///
/// This is the CRC-32 used by zlib (reflected polynomial `0xEDB88320`, initial value and final
/// XOR of `0xFFFFFFFF`).
pub fn payload_crc(payload: &[u8]) -> u32 {
    crc32fast::hash(payload)
}

/// Splits `image` into its header and payload, then validates it with `expected_device`.
///
/// # Errors
///
/// Returns [`ImageError::Decode`] if `image` is too small to hold a header, and
/// [`ImageError::Validation`] if the header or payload is rejected.
pub fn parse_image(
    image: &[u8],
    expected_device: Option<DeviceId>,
) -> Result<ValidImage, ImageError> {
    let validator = match expected_device {
        Some(device) => Validator::with_expected_device(device),
        None => Validator::new(),
    };

    validator.parse_image(image)
}

/// Various errors that can occur while parsing a complete image.
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq)]
pub enum ImageError {
    /// The header could not be decoded.
    Decode(DecodeError),
    /// The image was rejected.
    Validation(ValidationError),
}

impl From<DecodeError> for ImageError {
    fn from(value: DecodeError) -> Self {
        Self::Decode(value)
    }
}

impl From<ValidationError> for ImageError {
    fn from(value: ValidationError) -> Self {
        Self::Validation(value)
    }
}

impl fmt::Display for ImageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Decode(error) => fmt::Display::fmt(error, f),
            Self::Validation(error) => fmt::Display::fmt(error, f),
        }
    }
}

impl error::Error for ImageError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            Self::Decode(error) => Some(error),
            Self::Validation(error) => Some(error),
        }
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    extern crate std;

    use std::vec::Vec;

    use crate::{encode, payload_crc, GitSha, ImageHeader, RawDeviceId, RawImageType, Version};

    /// A payload long enough to exercise the CRC over several words.
    pub fn payload() -> Vec<u8> {
        (0..=255u8).cycle().take(1000).collect()
    }

    /// A header that validates against `payload`.
    pub fn header_for(payload: &[u8]) -> ImageHeader {
        ImageHeader {
            magic: crate::IMAGE_MAGIC,
            header_version: crate::HEADER_VERSION_1,
            crc: payload_crc(payload),
            data_size: payload.len() as u32,
            image_type: RawImageType::APP,
            version: Version::new(1, 4, 2),
            vector_addr: 0x0800_0400,
            device_id: RawDeviceId::WDDR,
            git_dirty: 0,
            git_ahead: 3,
            git_sha: GitSha(*b"9f3c2a1b"),
        }
    }

    /// A complete image made of `header` followed by `payload`.
    pub fn image(header: &ImageHeader, payload: &[u8]) -> Vec<u8> {
        let mut image = Vec::from(encode(header));
        image.extend_from_slice(payload);
        image
    }
}

#[cfg(test)]
mod tests {
    extern crate std;

    use std::string::ToString;

    use super::*;

    #[test]
    fn crc_matches_zlib_check_value() {
        assert_eq!(payload_crc(b"123456789"), 0xCBF4_3926);
        assert_eq!(payload_crc(&[]), 0);
    }

    #[test]
    fn version_display() {
        assert_eq!(Version::new(2, 0, 13).to_string(), "2.0.13");
        assert!(Version::new(1, 9, 9) < Version::new(2, 0, 0));
    }

    #[test]
    fn git_sha_display() {
        assert_eq!(GitSha(*b"9f3c2a1b").to_string(), "9f3c2a1b");
        assert_eq!(GitSha(*b"abc123\0\0").to_string(), "abc123");
        assert_eq!(
            GitSha([0x9f, 0x3c, 0x2a, 0x1b, 0x00, 0x11, 0x22, 0x33]).to_string(),
            "9f3c2a1b00112233"
        );
        assert_eq!(GitSha([0; 8]).to_string(), "0000000000000000");
    }

    #[test]
    fn parse_image_accepts_valid_image() {
        let payload = fixtures::payload();
        let header = fixtures::header_for(&payload);
        let image = fixtures::image(&header, &payload);

        let valid = parse_image(&image, Some(DeviceId::Wddr)).unwrap();
        assert_eq!(*valid.header(), header);
        assert_eq!(valid.image_type(), ImageType::App);
    }

    #[test]
    fn parse_image_reports_truncated_header() {
        let image = [0xFE, 0xC0, 0x01];
        assert_eq!(
            parse_image(&image, None),
            Err(ImageError::Decode(DecodeError::TruncatedHeader { length: 3 }))
        );
    }

    #[test]
    fn parse_image_reports_validation_failure() {
        let payload = fixtures::payload();
        let header = fixtures::header_for(&payload);
        let image = fixtures::image(&header, &payload[1..]);

        assert!(matches!(
            parse_image(&image, None),
            Err(ImageError::Validation(ValidationError::SizeMismatch { .. }))
        ));
    }
}
