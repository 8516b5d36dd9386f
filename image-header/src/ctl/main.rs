//! Helper executable for inspecting, validating and stamping firmware images.

use core::fmt;
use std::{
    io::{self, Write},
    path::{Path, PathBuf},
    process::ExitCode,
};

use cli::{parse_arguments, Action};
use image_header::{
    decode, stamp, DeviceId, ImageError, ImageHeader, ImageType, StampError, ValidImage,
    Validator,
};

pub mod cli;
pub mod logging;

fn main() -> ExitCode {
    let arguments = parse_arguments();
    logging::init_logging(arguments.log_level);

    let result = match arguments.action {
        Action::Inspect { image } => inspect(&image),
        Action::Validate {
            image,
            device,
            reject_dirty,
        } => validate(&image, device, reject_dirty),
        Action::Stamp { image, output } => {
            let output = output.unwrap_or_else(|| image.clone());
            stamp_image(&image, &output)
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            eprintln!("error: {error}");
            ExitCode::FAILURE
        }
    }
}

/// Prints every field of the header of the image at `path`, then validates the image.
pub fn inspect(path: &Path) -> Result<(), CtlError> {
    let image = read_image(path)?;
    let header = decode(&image).map_err(ImageError::from)?;

    print!("{}", HeaderReport(&header));

    let valid = Validator::new().parse_image(&image)?;
    println!("verdict:        valid");
    if valid.is_dirty() {
        log::warn!("image was built from a dirty tree");
    }

    Ok(())
}

/// Validates the image at `path`.
///
/// If `device` is given, the image must be built for it. If `reject_dirty` is set, images built
/// from a dirty tree are refused.
pub fn validate(path: &Path, device: Option<DeviceId>, reject_dirty: bool) -> Result<(), CtlError> {
    let image = read_image(path)?;
    let validator = match device {
        Some(device) => Validator::with_expected_device(device),
        None => Validator::new(),
    };

    let valid = validator.parse_image(&image)?;
    if valid.is_dirty() {
        if reject_dirty {
            return Err(CtlError::DirtyImage);
        }
        log::warn!("image was built from a dirty tree");
    }

    println!("{}: {}", path.display(), Summary(&valid));
    Ok(())
}

/// Stamps the CRC and size of the image at `path` and writes the result to `output`.
///
/// The stamped image is written to a temporary file next to `output`, which then replaces
/// `output`.
pub fn stamp_image(path: &Path, output: &Path) -> Result<(), CtlError> {
    let mut image = read_image(path)?;
    let header = stamp(&mut image)?;

    let directory = output
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
    let io_error = |error: io::Error| CtlError::Io {
        path: output.to_path_buf(),
        error,
    };

    let mut file = tempfile::NamedTempFile::new_in(directory).map_err(io_error)?;
    file.write_all(&image).map_err(io_error)?;
    file.as_file().sync_all().map_err(io_error)?;
    file.persist(output).map_err(|error| io_error(error.error))?;

    log::info!(
        "stamped {}: data_size={} crc={:#010x}",
        output.display(),
        header.data_size,
        header.crc
    );

    Ok(())
}

fn read_image(path: &Path) -> Result<Vec<u8>, CtlError> {
    log::debug!("reading {}", path.display());
    std::fs::read(path).map_err(|error| CtlError::Io {
        path: path.to_path_buf(),
        error,
    })
}

/// Multi-line listing of every field of an [`ImageHeader`].
struct HeaderReport<'header>(&'header ImageHeader);

impl fmt::Display for HeaderReport<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let header = self.0;

        writeln!(f, "magic:          {:#06x}", header.magic)?;
        writeln!(f, "header version: {}", header.header_version)?;
        writeln!(f, "crc:            {:#010x}", header.crc)?;
        writeln!(f, "data size:      {} bytes", header.data_size)?;
        match ImageType::try_from(header.image_type) {
            Ok(image_type) => writeln!(f, "image type:     {image_type}")?,
            Err(_) => writeln!(f, "image type:     unknown ({})", header.image_type.0)?,
        }
        writeln!(f, "version:        {}", header.version)?;
        writeln!(f, "vector address: {:#010x}", header.vector_addr)?;
        match DeviceId::try_from(header.device_id) {
            Ok(device_id) => writeln!(f, "device id:      {device_id}")?,
            Err(_) => writeln!(f, "device id:      unknown ({})", header.device_id.0)?,
        }
        writeln!(f, "git dirty:      {}", header.git_dirty != 0)?;
        writeln!(f, "git ahead:      {}", header.git_ahead)?;
        writeln!(f, "git sha:        {}", header.git_sha)
    }
}

/// One line description of a [`ValidImage`].
struct Summary<'image>(&'image ValidImage);

impl fmt::Display for Summary<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let image = self.0;

        write!(
            f,
            "valid {} {} for {} at {:#010x} (git {}",
            image.image_type(),
            image.version(),
            image.device_id(),
            image.vector_addr(),
            image.git_sha()
        )?;
        if image.git_ahead() != 0 {
            write!(f, "+{}", image.git_ahead())?;
        }
        if image.is_dirty() {
            f.write_str("-dirty")?;
        }
        f.write_str(")")
    }
}

/// Various errors that can occur while carrying out an [`Action`].
#[derive(Debug)]
pub enum CtlError {
    /// An error occurred while reading or writing a file.
    Io {
        /// The path of the file.
        path: PathBuf,
        /// The underlying error.
        error: io::Error,
    },
    /// The image was rejected.
    Image(ImageError),
    /// The image could not be stamped.
    Stamp(StampError),
    /// The image is valid but was built from a dirty tree.
    DirtyImage,
}

impl From<ImageError> for CtlError {
    fn from(value: ImageError) -> Self {
        Self::Image(value)
    }
}

impl From<StampError> for CtlError {
    fn from(value: StampError) -> Self {
        Self::Stamp(value)
    }
}

impl fmt::Display for CtlError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io { path, error } => write!(f, "error accessing {}: {error}", path.display()),
            Self::Image(error) => write!(f, "invalid image: {error}"),
            Self::Stamp(error) => write!(f, "error while stamping image: {error}"),
            Self::DirtyImage => f.write_str("image was built from a dirty tree"),
        }
    }
}

impl std::error::Error for CtlError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io { error, .. } => Some(error),
            Self::Image(error) => Some(error),
            Self::Stamp(error) => Some(error),
            Self::DirtyImage => None,
        }
    }
}
