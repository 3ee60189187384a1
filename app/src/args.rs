//! Command line arguments.

use std::path::PathBuf;

use clap::Parser;
use graphite_graphics::params::DEFAULT_DIAGNOSTICS_LOG;
use graphite_graphics::ContextParameters;

/// Graphite viewer arguments.
#[derive(Parser, Debug, Clone)]
#[command(
    name = "graphite",
    about = "Opens a window and negotiates a Vulkan swapchain for it",
    long_about = "Opens a window, selects a Vulkan device and negotiates a swapchain.\n\n\
        EXAMPLES:\n\
          # Run with validation and log low-severity messages to a custom file\n\
          ./graphite --validation --log-file vulkan.txt\n\
        \n\
          # Exit after 10 frames (useful for testing)\n\
          ./graphite --frames 10",
    version
)]
pub struct AppArgs {
    /// Window title.
    #[arg(long, default_value = "Graphite")]
    pub title: String,

    /// Initial window width in pixels.
    #[arg(long, default_value = "1280")]
    pub width: u32,

    /// Initial window height in pixels.
    #[arg(long, default_value = "720")]
    pub height: u32,

    /// Enable GPU validation layers (slower but helps catch bugs).
    #[arg(long, conflicts_with = "no_validation")]
    pub validation: bool,

    /// Disable GPU validation layers.
    #[arg(long, conflicts_with = "validation")]
    pub no_validation: bool,

    /// File receiving validation messages below warning severity.
    #[arg(long, default_value = DEFAULT_DIAGNOSTICS_LOG, conflicts_with = "no_log_file")]
    pub log_file: PathBuf,

    /// Send low-severity validation messages to the log instead of a file.
    #[arg(long)]
    pub no_log_file: bool,

    /// Exit after N frames.
    #[arg(long)]
    pub frames: Option<u64>,
}

impl AppArgs {
    /// Whether validation should be enabled.
    ///
    /// `--validation` forces it on, `--no-validation` forces it off, otherwise
    /// it follows the build profile.
    pub fn validation_enabled(&self) -> bool {
        self.validation || (!self.no_validation && cfg!(debug_assertions))
    }

    /// Device context configuration for these arguments.
    pub fn context_parameters(&self) -> ContextParameters {
        let diagnostics_log = (!self.no_log_file).then(|| self.log_file.clone());

        ContextParameters::new()
            .with_application_name(self.title.clone())
            .with_validation(self.validation_enabled())
            .with_diagnostics_log(diagnostics_log)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let args = AppArgs::try_parse_from(["graphite"]).unwrap();
        assert_eq!(args.title, "Graphite");
        assert_eq!((args.width, args.height), (1280, 720));
        assert_eq!(args.frames, None);
        assert_eq!(args.validation_enabled(), cfg!(debug_assertions));

        let params = args.context_parameters();
        assert_eq!(params.application_name, "Graphite");
        assert_eq!(
            params.diagnostics_log,
            Some(PathBuf::from(DEFAULT_DIAGNOSTICS_LOG))
        );
    }

    #[test]
    fn test_overrides() {
        let args = AppArgs::try_parse_from([
            "graphite",
            "--title",
            "Viewer",
            "--width",
            "640",
            "--height",
            "480",
            "--no-validation",
            "--no-log-file",
            "--frames",
            "10",
        ])
        .unwrap();

        assert_eq!(args.frames, Some(10));
        assert!(!args.validation_enabled());

        let params = args.context_parameters();
        assert_eq!(params.application_name, "Viewer");
        assert!(!params.validation);
        assert_eq!(params.diagnostics_log, None);
    }

    #[test]
    fn test_validation_flags_conflict() {
        assert!(AppArgs::try_parse_from(["graphite", "--validation", "--no-validation"]).is_err());
    }

    #[test]
    fn test_force_validation() {
        let args =
            AppArgs::try_parse_from(["graphite", "--validation", "--log-file", "out.txt"]).unwrap();
        assert!(args.context_parameters().validation);
        assert_eq!(
            args.context_parameters().diagnostics_log,
            Some(PathBuf::from("out.txt"))
        );
    }
}
