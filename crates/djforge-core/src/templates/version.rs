//! CLI and template pack version compatibility

use semver::Version;

/// Lenient parse that accepts a leading `v`
fn parse_version(version: &str) -> Option<Version> {
    let trimmed = version.trim();
    Version::parse(trimmed.strip_prefix('v').unwrap_or(trimmed)).ok()
}

/// Warning text when the CLI is older than the pack expects
///
/// Unparseable versions never produce a warning.
pub fn check_compatibility(
    cli_version: &str,
    pack_version: &str,
    upgrade_command: &str,
) -> Option<String> {
    let cli = parse_version(cli_version)?;
    let pack = parse_version(pack_version)?;

    (cli < pack).then(|| {
        format!(
            "This template pack targets djforge {} or newer, you are running {}.\n\
             Consider updating: {}",
            pack, cli, upgrade_command
        )
    })
}
