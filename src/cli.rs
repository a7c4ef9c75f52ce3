// Minimal hand-rolled command-line parser (external collaborator, kept deliberately
// thin). Deliberately not built on a parsing crate: the surface is
// a dozen flags with no subcommands, nesting, or shell-completion needs, so a plain
// `--flag [value]` scanner is the idiomatic-enough choice here rather than pulling in
// a dependency for it.

use crate::config::MirrorConfig;

/// Parsed command-line intent: either "run the mirror" (with a config and whether the
/// user asked for `--sdr-white` explicitly) or "just list monitors and exit".
pub enum Command {
    Run {
        config: MirrorConfig,
        /// `None` means auto-detect the SDR white level from the target monitor's
        /// DisplayConfig at startup; `Some` means the user pinned it explicitly.
        sdr_white_override: Option<f32>,
    },
    ListMonitors,
    Help,
}

/// Parse `args` (excluding argv[0]) into a `Command`. Unknown flags or malformed
/// values are reported as plain `anyhow::Error`s describing the offending argument.
pub fn parse(args: &[String]) -> anyhow::Result<Command> {
    let mut config = MirrorConfig::default();
    let mut sdr_white_override = None;

    let mut i = 0;
    while i < args.len() {
        let arg = args[i].as_str();
        match arg {
            "--help" | "-h" => return Ok(Command::Help),
            "--list" => return Ok(Command::ListMonitors),
            "--source" => {
                config.source_index = next_value(args, &mut i, arg)?.parse().map_err(|_| invalid(arg))?;
            }
            "--target" => {
                config.target_index = next_value(args, &mut i, arg)?.parse().map_err(|_| invalid(arg))?;
            }
            "--stretch" => config.preserve_aspect = false,
            "--no-tonemap" => config.tonemap_enabled = false,
            "--sdr-white" => {
                let value: f32 = next_value(args, &mut i, arg)?.parse().map_err(|_| invalid(arg))?;
                sdr_white_override = Some(value);
            }
            "--no-cursor" => config.show_cursor = false,
            "--no-waitable" => config.use_waitable_swapchain = false,
            "--no-smart-select" => config.use_smart_frame_selection = false,
            "--no-frame-delay" => config.use_frame_delay = false,
            "--frame-delay" => {
                config.frame_delay_micros = next_value(args, &mut i, arg)?.parse().map_err(|_| invalid(arg))?;
            }
            "--debug" => config.debug = true,
            other => anyhow::bail!("unrecognized argument: {other} (try --help)"),
        }
        i += 1;
    }

    if let Some(white) = sdr_white_override {
        config.sdr_white_nits = white;
    }

    Ok(Command::Run { config, sdr_white_override })
}

fn next_value<'a>(args: &'a [String], i: &mut usize, flag: &str) -> anyhow::Result<&'a str> {
    *i += 1;
    args.get(*i)
        .map(String::as_str)
        .ok_or_else(|| anyhow::anyhow!("{flag} requires a value"))
}

fn invalid(flag: &str) -> anyhow::Error {
    anyhow::anyhow!("invalid value for {flag}")
}

pub const USAGE: &str = "\
mirrorwall - real-time HDR-aware display mirroring

USAGE:
    mirrorwall [OPTIONS]

OPTIONS:
    --source <INDEX>      Source monitor index to capture (default 0)
    --target <INDEX>      Target monitor index to mirror onto (default 1)
    --stretch              Fill the target window, ignoring source aspect ratio
    --no-tonemap            Disable HDR->SDR tonemapping (raw passthrough)
    --sdr-white <NITS>      Override the SDR-white reference luminance
    --no-cursor              Do not draw the mouse cursor
    --no-waitable            Disable the waitable swap chain (fixed-delay pacing only)
    --no-smart-select        Disable smart frame selection
    --no-frame-delay         Disable the fixed spin-delay fallback
    --frame-delay <MICROS>   Fixed spin-delay interval in microseconds (default 1000)
    --debug                  Verbose logging
    --list                   List attached monitors and exit
    -h, --help               Show this help text
";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_with_no_args_uses_config_defaults() {
        match parse(&[]).unwrap() {
            Command::Run { config, sdr_white_override } => {
                assert_eq!(config.source_index, 0);
                assert_eq!(config.target_index, 1);
                assert!(sdr_white_override.is_none());
            }
            _ => panic!("expected Run"),
        }
    }

    #[test]
    fn list_flag_short_circuits_everything_else() {
        let args: Vec<String> = vec!["--source".into(), "2".into(), "--list".into()];
        assert!(matches!(parse(&args).unwrap(), Command::ListMonitors));
    }

    #[test]
    fn parses_numeric_and_boolean_flags() {
        let args: Vec<String> = ["--source", "1", "--target", "2", "--stretch", "--no-tonemap", "--sdr-white", "400", "--no-cursor"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        match parse(&args).unwrap() {
            Command::Run { config, sdr_white_override } => {
                assert_eq!(config.source_index, 1);
                assert_eq!(config.target_index, 2);
                assert!(!config.preserve_aspect);
                assert!(!config.tonemap_enabled);
                assert!(!config.show_cursor);
                assert_eq!(sdr_white_override, Some(400.0));
                assert_eq!(config.sdr_white_nits, 400.0);
            }
            _ => panic!("expected Run"),
        }
    }

    #[test]
    fn missing_value_is_an_error() {
        let args: Vec<String> = vec!["--source".into()];
        assert!(parse(&args).is_err());
    }

    #[test]
    fn unknown_flag_is_an_error() {
        let args: Vec<String> = vec!["--bogus".into()];
        assert!(parse(&args).is_err());
    }

    #[test]
    fn help_flag_wins_even_with_other_args() {
        let args: Vec<String> = vec!["--source".into(), "1".into(), "--help".into()];
        assert!(matches!(parse(&args).unwrap(), Command::Help));
    }
}
