//! Definitions for the firmware image header format.

#![no_std]

use core::mem;

/// The magic number placed at the start of every image header.
pub const IMAGE_MAGIC: u16 = 0xC0FE;

/// The first version of the image header format.
pub const HEADER_VERSION_1: u16 = 1;
/// The version of the image header format produced by current tooling.
pub const HEADER_VERSION_CURRENT: u16 = HEADER_VERSION_1;

/// The size, in bytes, of an [`ImageHeader`].
pub const HEADER_SIZE: usize = mem::size_of::<ImageHeader>();

const _: () = assert!(HEADER_SIZE == 32);

/// The header placed at the beginning of every firmware image.
///
/// All multi-byte fields are stored in little-endian byte order, and no padding exists between
/// fields. The payload of the image immediately follows this header.
#[repr(C, packed)]
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq)]
pub struct ImageHeader {
    /// Magic number that identifies the image, which should be [`IMAGE_MAGIC`].
    pub image_magic: u16,
    /// The version of this header, which determines the layout and semantics of the rest of
    /// the header.
    pub image_hdr_version: u16,
    /// CRC-32 computed over the payload, not including this header.
    pub crc: u32,
    /// The size, in bytes, of the payload, not including this header.
    pub data_size: u32,
    /// The type of the image.
    pub image_type: u8,
    /// The major version of the image.
    pub version_major: u8,
    /// The minor version of the image.
    pub version_minor: u8,
    /// The patch version of the image.
    pub version_patch: u8,
    /// The address at which the image expects to begin execution.
    pub vector_addr: u32,
    /// The identifier of the device that can execute the image.
    pub device_id: u16,
    /// Non-zero if the commit that generated the image was dirty.
    pub git_dirty: u8,
    /// The distance, in commits, from the commit that generated the image to the nearest
    /// version tag.
    pub git_ahead: u8,
    /// The truncated SHA of the commit that generated the image.
    pub git_sha: [u8; 8],
}

/// The type of an image, which determines how the image should be treated.
#[repr(transparent)]
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct ImageType(pub u8);

impl ImageType {
    /// The image is a bootloader, which loads applications.
    pub const BOOTLOADER: Self = Self(0);
    /// The image is a standard application.
    pub const APP: Self = Self(1);
}

/// The identifier of the device an image is built to run on.
#[repr(transparent)]
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct DeviceId(pub u16);

impl DeviceId {
    /// The host.
    pub const HOST: Self = Self(1);
    /// The LPDDR device.
    pub const WDDR: Self = Self(2);
    /// The LPDDR chiplet.
    pub const WLP: Self = Self(3);
    /// The template module.
    pub const WTM: Self = Self(4);
}
