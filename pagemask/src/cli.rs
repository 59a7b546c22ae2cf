//! Command line arguments. Paths are `OsString`s, let the system handle character encoding
//! restrictions.

use std::{ffi::OsString, path::PathBuf};

use pagemask_core::OpacityPercent;

pub const USAGE: &str = "usage: pagemask <bottom-image> <top-image> [--mask <mask-image>] \
[--opacity <0-100>] [--preview <out.png>] [-o <out.pdf>] [--save-settings]";

#[derive(thiserror::Error, Debug, PartialEq)]
pub enum ArgsError {
    #[error("missing {0}")]
    Missing(&'static str),
    #[error("{flag} needs a value")]
    NoValue { flag: String },
    #[error("unknown flag {0:?}")]
    UnknownFlag(OsString),
    #[error("unexpected argument {0:?}")]
    Unexpected(OsString),
    #[error("opacity {0:?} is not a whole number in 0..=100")]
    Opacity(OsString),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Args {
    pub bottom: PathBuf,
    pub top: PathBuf,
    /// Grayscale image to start from instead of the all-top mask.
    pub mask: Option<PathBuf>,
    pub opacity: Option<OpacityPercent>,
    /// Where to write the soft preview, if anywhere.
    pub preview: Option<PathBuf>,
    /// Defaults to the configured output file name.
    pub output: Option<PathBuf>,
    pub save_settings: bool,
}
impl Args {
    /// Parse arguments, not including the program name.
    /// # Errors
    /// Missing positionals, unknown flags, or bad values.
    pub fn parse(args: impl IntoIterator<Item = OsString>) -> Result<Self, ArgsError> {
        let mut args = args.into_iter();
        let mut positional = Vec::with_capacity(2);
        let mut mask = None;
        let mut opacity = None;
        let mut preview = None;
        let mut output = None;
        let mut save_settings = false;

        while let Some(arg) = args.next() {
            let mut value = |flag: &str| -> Result<OsString, ArgsError> {
                args.next().ok_or_else(|| ArgsError::NoValue {
                    flag: flag.to_owned(),
                })
            };
            match arg.to_str() {
                Some("--mask") => mask = Some(value("--mask")?.into()),
                Some("--preview") => preview = Some(value("--preview")?.into()),
                Some("-o" | "--output") => output = Some(value("--output")?.into()),
                Some("--opacity") => {
                    let raw = value("--opacity")?;
                    let percent = raw
                        .to_str()
                        .and_then(|s| s.parse::<u8>().ok())
                        .and_then(OpacityPercent::new)
                        .ok_or(ArgsError::Opacity(raw.clone()))?;
                    opacity = Some(percent);
                }
                Some("--save-settings") => save_settings = true,
                Some(flag) if flag.starts_with('-') && flag.len() > 1 => {
                    return Err(ArgsError::UnknownFlag(arg));
                }
                _ if positional.len() < 2 => positional.push(PathBuf::from(arg)),
                _ => return Err(ArgsError::Unexpected(arg)),
            }
        }

        let mut positional = positional.into_iter();
        let bottom = positional.next().ok_or(ArgsError::Missing("bottom image"))?;
        let top = positional.next().ok_or(ArgsError::Missing("top image"))?;
        Ok(Self {
            bottom,
            top,
            mask,
            opacity,
            preview,
            output,
            save_settings,
        })
    }
}

#[cfg(test)]
mod test {
    use std::{ffi::OsString, path::PathBuf};

    use super::{Args, ArgsError};

    fn parse(args: &[&str]) -> Result<Args, ArgsError> {
        Args::parse(args.iter().map(OsString::from))
    }

    #[test]
    fn minimal() {
        let args = parse(&["a.png", "b.png"]).unwrap();
        assert_eq!(args.bottom, PathBuf::from("a.png"));
        assert_eq!(args.top, PathBuf::from("b.png"));
        assert_eq!(args.mask, None);
        assert_eq!(args.output, None);
        assert!(!args.save_settings);
    }
    #[test]
    fn flags_anywhere() {
        let args = parse(&[
            "--opacity",
            "75",
            "a.png",
            "-o",
            "out.pdf",
            "b.png",
            "--mask",
            "m.png",
            "--preview",
            "p.png",
        ])
        .unwrap();
        assert_eq!(args.opacity.unwrap().get(), 75);
        assert_eq!(args.output, Some(PathBuf::from("out.pdf")));
        assert_eq!(args.mask, Some(PathBuf::from("m.png")));
        assert_eq!(args.preview, Some(PathBuf::from("p.png")));
        assert_eq!(args.top, PathBuf::from("b.png"));
    }
    #[test]
    fn errors() {
        assert_eq!(parse(&["a.png"]), Err(ArgsError::Missing("top image")));
        assert!(matches!(parse(&["a", "b", "c"]), Err(ArgsError::Unexpected(_))));
        assert!(matches!(parse(&["a", "b", "--frob"]), Err(ArgsError::UnknownFlag(_))));
        assert!(matches!(parse(&["a", "b", "-o"]), Err(ArgsError::NoValue { .. })));
        assert!(matches!(parse(&["a", "b", "--opacity", "101"]), Err(ArgsError::Opacity(_))));
        assert!(matches!(parse(&["a", "b", "--opacity", "x"]), Err(ArgsError::Opacity(_))));
    }
}
