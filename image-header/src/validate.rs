//! Validation of decoded [`ImageHeader`]s against their payloads.
//!
//! Checks run in a fixed order and stop at the first failure:
//!
//! 1. the magic number,
//! 2. the header version,
//! 3. the image type, then the device identifier,
//! 4. the declared payload size,
//! 5. the payload CRC,
//! 6. the target device, if the [`Validator`] expects one.

use core::{error, fmt, str::FromStr};

use crate::{
    codec, payload_crc, GitSha, ImageError, ImageHeader, RawDeviceId, RawImageType, Version,
    HEADER_SIZE, HEADER_VERSION_1, IMAGE_MAGIC,
};

/// The versions of the header format this crate is able to interpret.
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub enum HeaderVersion {
    /// The first version of the header format.
    V1,
}

impl HeaderVersion {
    /// The version produced by current tooling.
    pub const CURRENT: Self = Self::V1;
}

impl TryFrom<u16> for HeaderVersion {
    type Error = ValidationError;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        match value {
            HEADER_VERSION_1 => Ok(Self::V1),
            header_version => Err(ValidationError::UnsupportedHeaderVersion { header_version }),
        }
    }
}

impl From<HeaderVersion> for u16 {
    fn from(value: HeaderVersion) -> Self {
        match value {
            HeaderVersion::V1 => HEADER_VERSION_1,
        }
    }
}

/// The type of an image.
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq)]
pub enum ImageType {
    /// A bootloader image, which loads applications.
    Bootloader,
    /// A standard application image.
    App,
}

impl TryFrom<RawImageType> for ImageType {
    type Error = ValidationError;

    fn try_from(value: RawImageType) -> Result<Self, Self::Error> {
        match value {
            RawImageType::BOOTLOADER => Ok(Self::Bootloader),
            RawImageType::APP => Ok(Self::App),
            image_type => Err(ValidationError::UnknownImageType(image_type)),
        }
    }
}

impl From<ImageType> for RawImageType {
    fn from(value: ImageType) -> Self {
        match value {
            ImageType::Bootloader => Self::BOOTLOADER,
            ImageType::App => Self::APP,
        }
    }
}

impl fmt::Display for ImageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bootloader => f.write_str("bootloader"),
            Self::App => f.write_str("app"),
        }
    }
}

/// The device an image is built to run on.
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq)]
pub enum DeviceId {
    /// The host.
    Host,
    /// The LPDDR device.
    Wddr,
    /// The LPDDR chiplet.
    Wlp,
    /// The template module.
    Wtm,
}

impl DeviceId {
    /// Every known [`DeviceId`].
    pub const ALL: [Self; 4] = [Self::Host, Self::Wddr, Self::Wlp, Self::Wtm];

    /// The name of the device.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Host => "HOST",
            Self::Wddr => "WDDR",
            Self::Wlp => "WLP",
            Self::Wtm => "WTM",
        }
    }
}

impl TryFrom<RawDeviceId> for DeviceId {
    type Error = ValidationError;

    fn try_from(value: RawDeviceId) -> Result<Self, Self::Error> {
        match value {
            RawDeviceId::HOST => Ok(Self::Host),
            RawDeviceId::WDDR => Ok(Self::Wddr),
            RawDeviceId::WLP => Ok(Self::Wlp),
            RawDeviceId::WTM => Ok(Self::Wtm),
            device_id => Err(ValidationError::UnknownDeviceId(device_id)),
        }
    }
}

impl From<DeviceId> for RawDeviceId {
    fn from(value: DeviceId) -> Self {
        match value {
            DeviceId::Host => Self::HOST,
            DeviceId::Wddr => Self::WDDR,
            DeviceId::Wlp => Self::WLP,
            DeviceId::Wtm => Self::WTM,
        }
    }
}

impl FromStr for DeviceId {
    type Err = ParseDeviceIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|device| device.name().eq_ignore_ascii_case(s))
            .ok_or(ParseDeviceIdError)
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The given string does not name a known [`DeviceId`].
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq)]
pub struct ParseDeviceIdError;

impl fmt::Display for ParseDeviceIdError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("unknown device: expected one of `host`, `wddr`, `wlp` or `wtm`")
    }
}

impl error::Error for ParseDeviceIdError {}

/// Validates images, optionally requiring that they target a specific device.
///
/// A bootloader typically uses a [`Validator`] that expects its own device, while tooling that
/// only inspects images uses [`Validator::new`].
#[derive(Clone, Copy, Debug, Default, Hash, PartialEq, Eq)]
pub struct Validator {
    expected_device: Option<DeviceId>,
}

impl Validator {
    /// Creates a [`Validator`] that accepts images for any known device.
    pub const fn new() -> Self {
        Self {
            expected_device: None,
        }
    }

    /// Creates a [`Validator`] that only accepts images built for `device`.
    pub const fn with_expected_device(device: DeviceId) -> Self {
        Self {
            expected_device: Some(device),
        }
    }

    /// The device images must target, if any.
    pub const fn expected_device(&self) -> Option<DeviceId> {
        self.expected_device
    }

    /// Checks that `header` describes a valid image whose payload is `payload`.
    ///
    /// # Errors
    ///
    /// Returns the [`ValidationError`] of the first check that fails.
    pub fn validate(
        &self,
        header: ImageHeader,
        payload: &[u8],
    ) -> Result<ValidImage, ValidationError> {
        match self.check(header, payload) {
            Ok(image) => {
                log::trace!(
                    "accepted {} image {} for {}",
                    image.image_type,
                    image.version(),
                    image.device_id
                );
                Ok(image)
            }
            Err(error) => {
                log::debug!("rejected image: {error}");
                Err(error)
            }
        }
    }

    /// Decodes the header at the start of `image` and validates it against the remaining bytes.
    ///
    /// # Errors
    ///
    /// Returns [`ImageError::Decode`] if `image` cannot hold a header, otherwise
    /// [`ImageError::Validation`] if the image is rejected.
    pub fn parse_image(&self, image: &[u8]) -> Result<ValidImage, ImageError> {
        let header = codec::decode(image)?;
        let payload = &image[HEADER_SIZE..];

        Ok(self.validate(header, payload)?)
    }

    fn check(&self, header: ImageHeader, payload: &[u8]) -> Result<ValidImage, ValidationError> {
        if header.magic != IMAGE_MAGIC {
            return Err(ValidationError::BadMagic {
                magic: header.magic,
            });
        }

        let header_version = HeaderVersion::try_from(header.header_version)?;
        let image_type = ImageType::try_from(header.image_type)?;
        let device_id = DeviceId::try_from(header.device_id)?;

        if u64::from(header.data_size) != payload.len() as u64 {
            return Err(ValidationError::SizeMismatch {
                data_size: header.data_size,
                payload_size: payload.len(),
            });
        }

        let computed = payload_crc(payload);
        if computed != header.crc {
            return Err(ValidationError::CrcMismatch {
                expected: header.crc,
                computed,
            });
        }

        if let Some(expected) = self.expected_device {
            if expected != device_id {
                return Err(ValidationError::DeviceMismatch {
                    expected,
                    found: device_id,
                });
            }
        }

        Ok(ValidImage {
            header,
            header_version,
            image_type,
            device_id,
        })
    }
}

/// Validates `header` against `payload` using a [`Validator`] that expects `expected_device`.
///
/// # Errors
///
/// Returns the [`ValidationError`] of the first check that fails.
pub fn validate(
    header: ImageHeader,
    payload: &[u8],
    expected_device: Option<DeviceId>,
) -> Result<ValidImage, ValidationError> {
    let validator = Validator {
        expected_device,
    };
    validator.validate(header, payload)
}

/// An image that passed every check of a [`Validator`].
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq)]
pub struct ValidImage {
    header: ImageHeader,
    header_version: HeaderVersion,
    image_type: ImageType,
    device_id: DeviceId,
}

impl ValidImage {
    /// The decoded header.
    pub const fn header(&self) -> &ImageHeader {
        &self.header
    }

    /// The version of the header format.
    pub const fn header_version(&self) -> HeaderVersion {
        self.header_version
    }

    /// The type of the image.
    pub const fn image_type(&self) -> ImageType {
        self.image_type
    }

    /// The device the image is built for.
    pub const fn device_id(&self) -> DeviceId {
        self.device_id
    }

    /// The version of the image contents.
    pub const fn version(&self) -> Version {
        self.header.version
    }

    /// The address at which execution begins.
    pub const fn vector_addr(&self) -> u32 {
        self.header.vector_addr
    }

    /// The size, in bytes, of the payload.
    pub const fn data_size(&self) -> u32 {
        self.header.data_size
    }

    /// The CRC-32 of the payload.
    pub const fn crc(&self) -> u32 {
        self.header.crc
    }

    /// The truncated SHA of the build commit.
    pub const fn git_sha(&self) -> GitSha {
        self.header.git_sha
    }

    /// The number of commits between the nearest version tag and the build commit.
    pub const fn git_ahead(&self) -> u8 {
        self.header.git_ahead
    }

    /// Whether the image was built from a tree with uncommitted changes.
    pub const fn is_dirty(&self) -> bool {
        self.header.git_dirty != 0
    }
}

/// The reason an image was rejected.
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq)]
pub enum ValidationError {
    /// The magic number is not [`IMAGE_MAGIC`].
    BadMagic {
        /// The magic number found.
        magic: u16,
    },
    /// The header version cannot be interpreted.
    UnsupportedHeaderVersion {
        /// The header version found.
        header_version: u16,
    },
    /// The image type is not a known [`ImageType`].
    UnknownImageType(RawImageType),
    /// The device identifier is not a known [`DeviceId`].
    UnknownDeviceId(RawDeviceId),
    /// The declared payload size does not match the supplied payload.
    SizeMismatch {
        /// The size declared by the header.
        data_size: u32,
        /// The size of the supplied payload.
        payload_size: usize,
    },
    /// The CRC of the payload does not match the header.
    CrcMismatch {
        /// The CRC stored in the header.
        expected: u32,
        /// The CRC computed over the payload.
        computed: u32,
    },
    /// The image is valid but built for another device.
    DeviceMismatch {
        /// The device the image was required to target.
        expected: DeviceId,
        /// The device the image targets.
        found: DeviceId,
    },
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BadMagic { magic } => write!(
                f,
                "bad magic: expected {IMAGE_MAGIC:#06x}, found {magic:#06x}"
            ),
            Self::UnsupportedHeaderVersion { header_version } => {
                write!(f, "header version {header_version} is not supported")
            }
            Self::UnknownImageType(image_type) => {
                write!(f, "unknown image type {}", image_type.0)
            }
            Self::UnknownDeviceId(device_id) => write!(f, "unknown device id {}", device_id.0),
            Self::SizeMismatch {
                data_size,
                payload_size,
            } => write!(
                f,
                "size mismatch: header declares {data_size} bytes, payload is {payload_size} bytes"
            ),
            Self::CrcMismatch { expected, computed } => write!(
                f,
                "crc mismatch: header holds {expected:#010x}, payload computes to {computed:#010x}"
            ),
            Self::DeviceMismatch { expected, found } => {
                write!(f, "image is built for {found}, expected {expected}")
            }
        }
    }
}

impl error::Error for ValidationError {}
