//! Scanner invocation lines.
//!
//! Pure construction: a job's free-form flags plus the agent's paths become an
//! argv vector, ready to spawn without a shell. Same inputs always produce the
//! same argv.

use std::path::Path;

/// The port scanner (masscan-style).
pub const PORT_SCANNER: &str = "masscan";
/// The service/version scanner (nmap-style).
pub const SERVICE_SCANNER: &str = "nmap";

/// `masscan <flags> -iL <targets> -oJ <json> --http-user-agent <ua>
/// [--excludefile <excluded>]`
pub fn masscan_argv(
    scan_command: &str,
    targets_file: &Path,
    excluded_targets_file: Option<&Path>,
    json_file: &Path,
    http_useragent: &str,
) -> Vec<String> {
    let mut argv = vec![PORT_SCANNER.to_string()];
    argv.extend(scan_command.split_whitespace().map(str::to_string));
    argv.push("-iL".to_string());
    argv.push(targets_file.display().to_string());
    argv.push("-oJ".to_string());
    argv.push(json_file.display().to_string());
    argv.push("--http-user-agent".to_string());
    argv.push(http_useragent.to_string());
    if let Some(excluded) = excluded_targets_file {
        argv.push("--excludefile".to_string());
        argv.push(excluded.display().to_string());
    }
    argv
}

/// `nmap <flags> -iL <targets> -oA <base> --script-args
/// http.useragent='<ua>' [--excludefile <excluded>]`
///
/// The `-oA` base produces `<base>.nmap`, `<base>.gnmap`, and `<base>.xml`;
/// the `.gnmap` file doubles as the resume checkpoint.
pub fn nmap_argv(
    scan_command: &str,
    targets_file: &Path,
    excluded_targets_file: Option<&Path>,
    output_base: &Path,
    http_useragent: &str,
) -> Vec<String> {
    let mut argv = vec![SERVICE_SCANNER.to_string()];
    argv.extend(scan_command.split_whitespace().map(str::to_string));
    argv.push("-iL".to_string());
    argv.push(targets_file.display().to_string());
    argv.push("-oA".to_string());
    argv.push(output_base.display().to_string());
    argv.push("--script-args".to_string());
    argv.push(format!("http.useragent='{http_useragent}'"));
    if let Some(excluded) = excluded_targets_file {
        argv.push("--excludefile".to_string());
        argv.push(excluded.display().to_string());
    }
    argv
}

// ---------- Unit tests ----------
