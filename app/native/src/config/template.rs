//! Configuration template generation.
//!
//! Generates a commented configuration template with all available options.

use std::fs;
use std::path::Path;

/// Generates a configuration template with all options commented out.
///
/// The values shown are the defaults, so an untouched template behaves
/// exactly like having no configuration file at all.
#[must_use]
pub fn generate_config_template() -> String {
    r#"// Skypaper Configuration File
// ============================
// This file uses JSONC format (JSON with comments).
// All options below are commented out and show their default values.
// Uncomment and modify the options you want to configure.
//
// Run `skypaper schema` to print the JSON Schema of this file.

{
  // ============================================================================
  // Imagery
  // ============================================================================
  // Source of the wallpaper:
  //   "earth-h8"     Himawari-8 full disk, single 550px image (every 10 min)
  //   "earth-h8-16"  Himawari-8 full disk, 4x4 mosaic of 550px tiles (every 10 min)
  //   "moon-nasa"    NASA moon phase for the current hour
  //   "sun-nasa"     Latest NASA SDO image of the sun (every 15 min)
  // "source": "earth-h8",

  // ============================================================================
  // Output
  // ============================================================================
  // Directory the wallpaper is written to. Supports "~".
  // Empty uses the Pictures folder: <Pictures>/skypaper
  // "outputDir": "",

  // Keep every downloaded image under its timestamped name.
  // When false a single wallpaper.<ext> file is overwritten on each run.
  // "keepHistory": false,

  // How the image is fitted to the screen: "natural" or "fill".
  // Leave unset to use "fill" for the mosaic and "natural" otherwise.
  // "fillMode": "natural",

  // ============================================================================
  // Daemon
  // ============================================================================
  // Minutes between two updates when running `skypaper daemon`.
  // Suggested values: 10, 30, 60, 720, 1440. Use 0 to disable the timer.
  // "interval": 10,

  // ============================================================================
  // Downloads
  // ============================================================================
  // "fetch": {
  //   // Attempts per URL before giving up
  //   "maxAttempts": 10,
  //
  //   // Seconds to wait between two attempts
  //   "retryDelaySecs": 2,
  //
  //   // Timeout of a single request in seconds
  //   "timeoutSecs": 20,
  //
  //   // Tiles downloaded in parallel
  //   "workers": 4,
  //
  //   // Skip TLS certificate verification (only behind a re-signing proxy)
  //   "acceptInvalidCerts": false
  // }
}
"#
    .to_string()
}

/// Creates a configuration file with the template at the specified path.
///
/// Creates parent directories if they don't exist.
///
/// # Errors
///
/// Returns an error if the file cannot be written.
pub fn create_config_file(path: &Path) -> Result<(), std::io::Error> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    fs::write(path, generate_config_template())
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;
    use crate::config::{SkypaperConfig, load_config_from_path};

    #[test]
    fn test_template_contains_all_options() {
        let template = generate_config_template();
        for key in [
            "\"source\"",
            "\"outputDir\"",
            "\"keepHistory\"",
            "\"fillMode\"",
            "\"interval\"",
            "\"fetch\"",
            "\"maxAttempts\"",
            "\"retryDelaySecs\"",
            "\"timeoutSecs\"",
            "\"workers\"",
            "\"acceptInvalidCerts\"",
        ] {
            assert!(template.contains(key), "template is missing {key}");
        }
    }

    #[test]
    fn test_template_parses_to_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("config.jsonc");

        create_config_file(&path).unwrap();
        let (config, _) = load_config_from_path(&path).unwrap();

        assert_eq!(config, SkypaperConfig::default());
    }

    #[test]
    fn test_uncommented_template_values_are_defaults() {
        // Strip the leading `// ` from option lines and check the result still
        // parses to the defaults.
        let uncommented: String = generate_config_template()
            .lines()
            .filter_map(|line| {
                let trimmed = line.trim_start();
                let option = trimmed.strip_prefix("// \"")?;
                Some(format!("\"{option}\n"))
            })
            .filter(|line| !line.contains("{") && !line.starts_with("\"fillMode\""))
            .collect();
        let json = format!("{{{}}}", uncommented.trim_end().trim_end_matches(','));

        let config: SkypaperConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(config, SkypaperConfig::default());
    }
}
