//! Stamping of the integrity fields of a freshly built image.
//!
//! The build links a header with placeholder `crc` and `data_size` fields into the image.
//! [`stamp`] computes both from the payload and writes them into the header in place.

use core::{error, fmt};

use crate::{
    codec::{self, DecodeError},
    payload_crc, ImageHeader, HEADER_SIZE, HEADER_VERSION_1, IMAGE_MAGIC,
};

/// Fills in the `crc` and `data_size` fields of the header at the start of `image`.
///
/// The payload is every byte of `image` after the header. All other header bytes are left
/// untouched. Returns the updated [`ImageHeader`].
///
/// # Errors
///
/// - [`StampError::Decode`] if `image` cannot hold a header.
/// - [`StampError::BadMagic`] if `image` does not start with an image header.
/// - [`StampError::UnsupportedHeaderVersion`] if the header version is unknown.
/// - [`StampError::PayloadTooLarge`] if the payload size does not fit in the header.
pub fn stamp(image: &mut [u8]) -> Result<ImageHeader, StampError> {
    let mut header = codec::decode(image)?;

    if header.magic != IMAGE_MAGIC {
        return Err(StampError::BadMagic {
            magic: header.magic,
        });
    }

    if header.header_version != HEADER_VERSION_1 {
        return Err(StampError::UnsupportedHeaderVersion {
            header_version: header.header_version,
        });
    }

    let (header_bytes, payload) = image.split_at_mut(HEADER_SIZE);
    header.data_size = u32::try_from(payload.len()).map_err(|_| StampError::PayloadTooLarge {
        payload_size: payload.len(),
    })?;
    header.crc = payload_crc(payload);

    header_bytes.copy_from_slice(&codec::encode(&header));

    log::trace!(
        "stamped image: data_size={} crc={:#010x}",
        header.data_size,
        header.crc
    );

    Ok(header)
}

/// Various errors that can occur while stamping an image.
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq)]
pub enum StampError {
    /// The header could not be decoded.
    Decode(DecodeError),
    /// The image does not start with an image header.
    BadMagic {
        /// The magic number found.
        magic: u16,
    },
    /// The header version is unknown.
    UnsupportedHeaderVersion {
        /// The header version found.
        header_version: u16,
    },
    /// The payload is too large for its size to be stored in the header.
    PayloadTooLarge {
        /// The size of the payload.
        payload_size: usize,
    },
}

impl From<DecodeError> for StampError {
    fn from(value: DecodeError) -> Self {
        Self::Decode(value)
    }
}

impl fmt::Display for StampError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Decode(error) => fmt::Display::fmt(error, f),
            Self::BadMagic { magic } => write!(
                f,
                "unsupported binary type: expected magic {IMAGE_MAGIC:#06x}, found {magic:#06x}"
            ),
            Self::UnsupportedHeaderVersion { header_version } => write!(
                f,
                "unsupported image header version: expected {HEADER_VERSION_1}, found \
                {header_version}"
            ),
            Self::PayloadTooLarge { payload_size } => write!(
                f,
                "payload of {payload_size} bytes does not fit in the data_size field"
            ),
        }
    }
}

impl error::Error for StampError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            Self::Decode(error) => Some(error),
            _ => None,
        }
    }
}
