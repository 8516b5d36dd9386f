//! Command line parsing and [`Action`] construction.

use std::path::PathBuf;

use image_header::{DeviceId, ParseDeviceIdError};

/// The parsed command line.
#[derive(Clone, Debug, Hash, PartialEq, Eq)]
pub struct Arguments {
    /// The most verbose level of messages that should be logged.
    pub log_level: log::LevelFilter,
    /// The action to carry out.
    pub action: Action,
}

/// The action to carry out.
#[derive(Clone, Debug, Hash, PartialEq, Eq)]
pub enum Action {
    /// Print every field of an image's header, then validate the image.
    Inspect {
        /// The path to the image.
        image: PathBuf,
    },
    /// Validate an image.
    Validate {
        /// The path to the image.
        image: PathBuf,
        /// The device the image must be built for.
        device: Option<DeviceId>,
        /// Whether images built from a dirty tree should be refused.
        reject_dirty: bool,
    },
    /// Fill in the CRC and size fields of an image's header.
    Stamp {
        /// The path to the image.
        image: PathBuf,
        /// The path the stamped image is written to. If [`None`], `image` is overwritten.
        output: Option<PathBuf>,
    },
}

/// Parses arguments to construct an [`Arguments`].
pub fn parse_arguments() -> Arguments {
    arguments_from_matches(command_parser().get_matches())
}

/// Constructs an [`Arguments`] from the matches produced by [`command_parser`].
pub fn arguments_from_matches(mut matches: clap::ArgMatches) -> Arguments {
    let log_level = log_level(matches.get_count("verbose"));
    let (subcommand_name, subcommand_matches) =
        matches.remove_subcommand().expect("subcommand required");
    let action = match subcommand_name.as_str() {
        "inspect" => parse_inspect_arguments(subcommand_matches),
        "validate" => parse_validate_arguments(subcommand_matches),
        "stamp" => parse_stamp_arguments(subcommand_matches),
        name => unreachable!("unexpected subcommand {name:?}"),
    };

    Arguments { log_level, action }
}

/// Parses subcommand arguments for the [`Action::Inspect`] subcommand.
pub fn parse_inspect_arguments(mut matches: clap::ArgMatches) -> Action {
    let image = matches
        .remove_one::<PathBuf>("image")
        .expect("image is a required argument");

    Action::Inspect { image }
}

/// Parses subcommand arguments for the [`Action::Validate`] subcommand.
pub fn parse_validate_arguments(mut matches: clap::ArgMatches) -> Action {
    let image = matches
        .remove_one::<PathBuf>("image")
        .expect("image is a required argument");
    let device = matches.remove_one::<DeviceId>("device");
    let reject_dirty = matches.get_flag("reject-dirty");

    Action::Validate {
        image,
        device,
        reject_dirty,
    }
}

/// Parses subcommand arguments for the [`Action::Stamp`] subcommand.
pub fn parse_stamp_arguments(mut matches: clap::ArgMatches) -> Action {
    let image = matches
        .remove_one::<PathBuf>("image")
        .expect("image is a required argument");
    let output = matches.remove_one::<PathBuf>("output");

    Action::Stamp { image, output }
}

/// Returns the clap command parser.
pub fn command_parser() -> clap::Command {
    let image_arg = clap::Arg::new("image")
        .help("The path to the firmware image")
        .long("image")
        .short('i')
        .value_parser(clap::builder::PathBufValueParser::new())
        .value_name("IMAGE")
        .value_hint(clap::builder::ValueHint::FilePath)
        .required(true);

    let device_arg = clap::Arg::new("device")
        .help("The device the image must be built for (host, wddr, wlp or wtm)")
        .long("device")
        .short('d')
        .value_parser(parse_device_id)
        .value_name("DEVICE")
        .value_hint(clap::builder::ValueHint::Other);

    let reject_dirty_arg = clap::Arg::new("reject-dirty")
        .help("Refuse images built from a tree with uncommitted changes")
        .long("reject-dirty")
        .action(clap::ArgAction::SetTrue);

    let output_arg = clap::Arg::new("output")
        .help("The path the stamped image is written to, instead of overwriting IMAGE")
        .long("output")
        .short('o')
        .value_parser(clap::builder::PathBufValueParser::new())
        .value_name("OUTPUT")
        .value_hint(clap::builder::ValueHint::FilePath);

    let verbose_arg = clap::Arg::new("verbose")
        .help("Log more details; repeat for more")
        .long("verbose")
        .short('v')
        .action(clap::ArgAction::Count);

    let inspect_subcommand = clap::Command::new("inspect")
        .about("Prints the header of a firmware image and validates it")
        .arg_required_else_help(true)
        .arg(image_arg.clone());

    let validate_subcommand = clap::Command::new("validate")
        .about("Validates a firmware image")
        .arg_required_else_help(true)
        .arg(image_arg.clone())
        .arg(device_arg)
        .arg(reject_dirty_arg);

    let stamp_subcommand = clap::Command::new("stamp")
        .about("Fills in the CRC and size fields of a firmware image's header")
        .arg_required_else_help(true)
        .arg(image_arg)
        .arg(output_arg);

    clap::Command::new("image-header-ctl")
        .about("Utility for managing firmware image headers")
        .arg(verbose_arg)
        .subcommand(inspect_subcommand)
        .subcommand(validate_subcommand)
        .subcommand(stamp_subcommand)
        .subcommand_required(true)
        .arg_required_else_help(true)
}

/// Parses a supplied [`str`] into a [`DeviceId`], ignoring case.
pub fn parse_device_id(input: &str) -> Result<DeviceId, ParseDeviceIdError> {
    input.parse()
}

/// Maps the number of times `--verbose` was given to a [`log::LevelFilter`].
pub fn log_level(verbosity: u8) -> log::LevelFilter {
    match verbosity {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Arguments {
        let matches = command_parser()
            .try_get_matches_from(args.iter().copied())
            .expect("arguments should parse");
        arguments_from_matches(matches)
    }

    #[test]
    fn command_is_well_formed() {
        command_parser().debug_assert();
    }

    #[test]
    fn parses_inspect() {
        let arguments = parse(&["image-header-ctl", "inspect", "--image", "app.bin"]);
        assert_eq!(arguments.log_level, log::LevelFilter::Warn);
        assert_eq!(
            arguments.action,
            Action::Inspect {
                image: PathBuf::from("app.bin")
            }
        );
    }

    #[test]
    fn parses_validate() {
        let arguments = parse(&[
            "image-header-ctl",
            "-vv",
            "validate",
            "-i",
            "app.bin",
            "--device",
            "wddr",
            "--reject-dirty",
        ]);
        assert_eq!(arguments.log_level, log::LevelFilter::Debug);
        assert_eq!(
            arguments.action,
            Action::Validate {
                image: PathBuf::from("app.bin"),
                device: Some(DeviceId::Wddr),
                reject_dirty: true,
            }
        );

        let arguments = parse(&["image-header-ctl", "validate", "-i", "app.bin"]);
        assert_eq!(
            arguments.action,
            Action::Validate {
                image: PathBuf::from("app.bin"),
                device: None,
                reject_dirty: false,
            }
        );
    }

    #[test]
    fn parses_stamp() {
        let arguments = parse(&[
            "image-header-ctl",
            "stamp",
            "--image",
            "app.bin",
            "--output",
            "stamped.bin",
        ]);
        assert_eq!(
            arguments.action,
            Action::Stamp {
                image: PathBuf::from("app.bin"),
                output: Some(PathBuf::from("stamped.bin")),
            }
        );
    }

    #[test]
    fn rejects_unknown_device() {
        let result = command_parser().try_get_matches_from([
            "image-header-ctl",
            "validate",
            "-i",
            "app.bin",
            "-d",
            "gpu",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn verbosity_levels() {
        assert_eq!(log_level(0), log::LevelFilter::Warn);
        assert_eq!(log_level(1), log::LevelFilter::Info);
        assert_eq!(log_level(3), log::LevelFilter::Trace);
        assert_eq!(log_level(u8::MAX), log::LevelFilter::Trace);
    }
}
