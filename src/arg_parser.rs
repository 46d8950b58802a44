use std::{env, fmt, io::{self, Write}, time::Duration};

use argparse::{ArgumentParser, Print, StoreOption, StoreTrue};
use tracing::{debug, error};

use crate::errors::ArgsError;

const DEFAULT_FPS: u32 = 60;

const VERBOSE_FLAG: &str = "--verbose";
const FPS_FLAG: &str = "--fps";

// Flags handled by the argument parser itself
const HELP_FLAGS: [&str; 4] = ["-h", "--help", "-V", "--version"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TargetFps(u32);

impl TargetFps {
    // Return None for a zero frame rate
    pub fn new(fps: u32) -> Option<Self> {
        (fps > 0).then_some(Self(fps))
    }

    pub fn get(&self) -> u32 {
        self.0
    }

    // Time to sleep after each frame, rounded to the nearest microsecond
    pub fn frame_interval(&self) -> Duration {
        let micros = (1_000_000.0 / self.0 as f64).round() as u64;

        Duration::from_micros(micros)
    }
}

impl Default for TargetFps {
    fn default() -> Self {
        Self(DEFAULT_FPS)
    }
}

// Reasons for falling back to the default frame rate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FpsWarning {
    Missing,
    Invalid,
}

impl fmt::Display for FpsWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Missing => write!(
                f,
                "No FPS value specified after --fps. Using default {DEFAULT_FPS} FPS."
            ),
            Self::Invalid => {
                write!(f, "Invalid FPS value. Using default {DEFAULT_FPS} FPS.")
            }
        }
    }
}

// Turn the raw --fps value into a frame rate.
// The value is read like C's atoi: leading whitespace, an optional sign
// and the leading digits, ignoring whatever follows them.
// A value without digits or not above zero is rejected
pub fn resolve_fps(value: Option<&str>) -> Result<TargetFps, FpsWarning> {
    let value = value.ok_or(FpsWarning::Missing)?.trim_start();

    let (negative, digits) = match value.as_bytes().first() {
        Some(b'-') => (true, &value[1..]),
        Some(b'+') => (false, &value[1..]),
        _ => (false, value),
    };

    let fps = digits
        .bytes()
        .take_while(u8::is_ascii_digit)
        .fold(0i64, |acc, digit| {
            acc.saturating_mul(10).saturating_add((digit - b'0') as i64)
        });
    let fps = if negative { -fps } else { fps };

    u32::try_from(fps)
        .ok()
        .and_then(TargetFps::new)
        .ok_or(FpsWarning::Invalid)
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct ArgsOptions {
    pub verbose: bool,
    pub fps: TargetFps,
}

impl ArgsOptions {
    pub fn parse() -> Result<Self, ArgsError> {
        Self::parse_from(env::args(), &mut io::stderr())
    }

    // Parse the given arguments, the first one being the program name.
    // Warnings and parser errors are written to `err`
    pub fn parse_from<I, W>(args: I, err: &mut W) -> Result<Self, ArgsError>
    where
        I: IntoIterator,
        I::Item: Into<String>,
        W: Write,
    {
        let args: Vec<String> = args.into_iter().map(Into::into).collect();
        let (normalized, fps_missing) = Self::normalize(&args)?;

        let mut options = ArgsOptions::default();
        let mut fps_value: Option<String> = None;

        {
            let mut parser = ArgumentParser::new();
            parser.set_description(
                "Keep the GPU awake by rendering trivial off-screen frames",
            );

            parser.refer(&mut options.verbose).add_option(
                &[VERBOSE_FLAG],
                StoreTrue,
                "Print the achieved frame rate once per second",
            );

            parser.refer(&mut fps_value).add_option(
                &[FPS_FLAG],
                StoreOption,
                "Target frame rate (default 60)",
            );

            parser.add_option(
                &["-V", "--version"],
                Print(env!("CARGO_PKG_VERSION").to_string()),
                "Show the program version",
            );

            // Help and version end the parse with a zero status
            match parser.parse(normalized, &mut io::stdout(), err) {
                Ok(()) => {}
                Err(0) => return Err(ArgsError::Exit),
                Err(code) => return Err(ArgsError::Parser(code)),
            }
        }

        // An absent --fps keeps the default silently
        if fps_missing || fps_value.is_some() {
            let requested = if fps_missing { None } else { fps_value.as_deref() };

            options.fps = resolve_fps(requested).unwrap_or_else(|warning| {
                writeln!(err, "{warning}").unwrap_or_else(|e| {
                    error!("Failed to write FPS warning: {e}");
                });

                TargetFps::default()
            });
        }

        debug!("Target frame rate: {}", options.fps.get());

        Ok(options)
    }

    // Return the usage line for the given program name
    pub fn usage(program: &str) -> String {
        format!("Usage: {program} [{VERBOSE_FLAG}] [{FPS_FLAG} <frames per second>]")
    }

    // Write the report for a failed parse to `err`.
    // Parser errors were already reported by the parser itself
    pub fn report_error<W: Write>(error: &ArgsError, err: &mut W) -> io::Result<()> {
        if let ArgsError::UnknownArgument { program, .. } = error {
            writeln!(err, "{error}")?;
            writeln!(err, "{}", Self::usage(program))?;
        }

        Ok(())
    }

    // Reject unknown tokens and rewrite "--fps <value>" as "--fps=<value>"
    // so values starting with a dash reach the parser untouched.
    // Also report whether --fps was given without a value
    fn normalize(args: &[String]) -> Result<(Vec<String>, bool), ArgsError> {
        let mut normalized = Vec::with_capacity(args.len());
        let mut fps_missing = false;

        let mut iter = args.iter();

        let program = iter
            .next()
            .cloned()
            .unwrap_or_else(|| env!("CARGO_PKG_NAME").to_string());
        normalized.push(program.clone());

        while let Some(arg) = iter.next() {
            match arg.as_str() {
                VERBOSE_FLAG => normalized.push(arg.clone()),
                FPS_FLAG => match iter.next() {
                    Some(value) => {
                        normalized.push(format!("{FPS_FLAG}={value}"));
                        fps_missing = false;
                    }
                    None => fps_missing = true,
                },
                flag if HELP_FLAGS.contains(&flag) => {
                    normalized.push(arg.clone())
                }
                _ => {
                    return Err(ArgsError::UnknownArgument {
                        arg: arg.clone(),
                        program,
                    });
                }
            }
        }

        Ok((normalized, fps_missing))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Parse and return the result along with everything written to stderr
    fn parse_capturing(args: &[&str]) -> (Result<ArgsOptions, ArgsError>, String) {
        let mut err = Vec::new();
        let result = ArgsOptions::parse_from(
            std::iter::once("gpu-keepalive").chain(args.iter().copied()),
            &mut err,
        );

        (result, String::from_utf8(err).unwrap())
    }

    fn parse(args: &[&str]) -> Result<ArgsOptions, ArgsError> {
        parse_capturing(args).0
    }

    fn unknown(arg: &str) -> ArgsError {
        ArgsError::UnknownArgument {
            arg: arg.to_string(),
            program: "gpu-keepalive".to_string(),
        }
    }

    #[test]
    fn defaults_without_arguments() {
        let options = parse(&[]).unwrap();

        assert!(!options.verbose);
        assert_eq!(options.fps.get(), 60);
    }

    #[test]
    fn verbose_and_fps() {
        let options = parse(&["--verbose", "--fps", "10"]).unwrap();

        assert!(options.verbose);
        assert_eq!(options.fps.get(), 10);
    }

    #[test]
    fn fps_30_sleeps_33333_micros() {
        let options = parse(&["--fps", "30"]).unwrap();

        assert!(!options.verbose);
        assert_eq!(options.fps.frame_interval(), Duration::from_micros(33_333));
    }

    #[test]
    fn frame_interval_is_rounded() {
        for fps in [1u32, 3, 7, 30, 60, 144, 240, 1_000, 999_999] {
            let expected = (1_000_000.0 / fps as f64).round() as u64;
            let interval = TargetFps::new(fps).unwrap().frame_interval();

            assert_eq!(interval, Duration::from_micros(expected), "fps {fps}");
        }

        // 1e6 / 7 = 142857.14... rounds down
        assert_eq!(
            TargetFps::new(7).unwrap().frame_interval().as_micros(),
            142_857
        );
        // 1e6 / 6 = 166666.66... rounds up
        assert_eq!(
            TargetFps::new(6).unwrap().frame_interval().as_micros(),
            166_667
        );
    }

    #[test]
    fn non_numeric_fps_falls_back_with_warning() {
        assert_eq!(resolve_fps(Some("abc")), Err(FpsWarning::Invalid));

        let (options, err) = parse_capturing(&["--fps", "abc"]);
        assert_eq!(options.unwrap().fps.get(), 60);
        assert_eq!(err, "Invalid FPS value. Using default 60 FPS.\n");
    }

    #[test]
    fn non_positive_fps_falls_back_with_warning() {
        assert_eq!(resolve_fps(Some("0")), Err(FpsWarning::Invalid));
        assert_eq!(resolve_fps(Some("-5")), Err(FpsWarning::Invalid));
        assert_eq!(resolve_fps(Some("")), Err(FpsWarning::Invalid));

        let (options, err) = parse_capturing(&["--fps", "-5"]);
        assert_eq!(options.unwrap().fps.get(), 60);
        assert_eq!(err, "Invalid FPS value. Using default 60 FPS.\n");
    }

    #[test]
    fn missing_fps_value_falls_back_with_warning() {
        assert_eq!(resolve_fps(None), Err(FpsWarning::Missing));

        let (options, err) = parse_capturing(&["--verbose", "--fps"]);
        let options = options.unwrap();
        assert!(options.verbose);
        assert_eq!(options.fps.get(), 60);
        assert_eq!(
            err,
            "No FPS value specified after --fps. Using default 60 FPS.\n"
        );
    }

    #[test]
    fn valid_fps_writes_nothing() {
        let (options, err) = parse_capturing(&["--fps", "30"]);

        assert_eq!(options.unwrap().fps.get(), 30);
        assert!(err.is_empty());
    }

    #[test]
    fn fps_uses_the_leading_integer() {
        assert_eq!(resolve_fps(Some("30fps")).unwrap().get(), 30);
        assert_eq!(resolve_fps(Some("30.5")).unwrap().get(), 30);
        assert_eq!(resolve_fps(Some(" 30")).unwrap().get(), 30);
        assert_eq!(resolve_fps(Some("+45")).unwrap().get(), 45);
        assert_eq!(resolve_fps(Some("-30fps")), Err(FpsWarning::Invalid));
        assert_eq!(resolve_fps(Some("fps30")), Err(FpsWarning::Invalid));

        let (options, err) = parse_capturing(&["--fps", "30fps"]);
        assert_eq!(options.unwrap().fps.get(), 30);
        assert!(err.is_empty());
    }

    #[test]
    fn huge_fps_is_invalid() {
        assert_eq!(
            resolve_fps(Some("99999999999999999999999")),
            Err(FpsWarning::Invalid)
        );
    }

    #[test]
    fn warning_messages() {
        assert_eq!(
            FpsWarning::Invalid.to_string(),
            "Invalid FPS value. Using default 60 FPS."
        );
        assert_eq!(
            FpsWarning::Missing.to_string(),
            "No FPS value specified after --fps. Using default 60 FPS."
        );
    }

    #[test]
    fn unknown_argument_is_rejected() {
        let err = parse(&["--bogus"]).unwrap_err();

        assert_eq!(err, unknown("--bogus"));
        assert_eq!(err.to_string(), "Unknown argument: --bogus");
        assert_eq!(err.exit_status(), 255);
    }

    #[test]
    fn unknown_argument_report() {
        let (result, parse_err) = parse_capturing(&["--bogus"]);
        let error = result.unwrap_err();

        // Nothing is written before the report
        assert!(parse_err.is_empty());

        let mut err = Vec::new();
        ArgsOptions::report_error(&error, &mut err).unwrap();

        assert_eq!(
            String::from_utf8(err).unwrap(),
            "Unknown argument: --bogus\n\
             Usage: gpu-keepalive [--verbose] [--fps <frames per second>]\n"
        );
        assert_ne!(error.exit_status(), 0);
    }

    #[test]
    fn unknown_argument_after_valid_ones() {
        let err = parse(&["--verbose", "--fps", "30", "extra"]).unwrap_err();

        assert_eq!(err, unknown("extra"));
    }

    #[test]
    fn exit_status_mapping() {
        assert_eq!(ArgsError::Exit.exit_status(), 0);
        assert_eq!(ArgsError::Parser(2).exit_status(), 255);

        let mut err = Vec::new();
        ArgsOptions::report_error(&ArgsError::Exit, &mut err).unwrap();
        assert!(err.is_empty());
    }

    #[test]
    fn fps_consumes_the_next_token() {
        // "--verbose" is consumed as the --fps value
        let options = parse(&["--fps", "--verbose"]).unwrap();

        assert!(!options.verbose);
        assert_eq!(options.fps.get(), 60);
    }

    #[test]
    fn last_fps_wins() {
        let options = parse(&["--fps", "10", "--fps", "20"]).unwrap();

        assert_eq!(options.fps.get(), 20);
    }

    #[test]
    fn usage_line() {
        assert_eq!(
            ArgsOptions::usage("keepalive"),
            "Usage: keepalive [--verbose] [--fps <frames per second>]"
        );
    }
}
