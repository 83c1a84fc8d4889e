/// Characters that are unsafe in file names on common filesystems
const FORBIDDEN_CHARS: &[char] = &['/', '\\', ':', '*', '?', '"', '<', '>', '|'];

/// Sanitize a media title for safe filesystem usage
///
/// Trims surrounding whitespace, then replaces every forbidden character
/// with an underscore. Everything else (Unicode included) passes through.
pub fn sanitize_file_name(name: &str) -> String {
    name.trim()
        .chars()
        .map(|c| if FORBIDDEN_CHARS.contains(&c) { '_' } else { c })
        .collect()
}

/// Check if the current environment has required tools
pub async fn check_dependencies(yt_dlp_bin: &str, ffmpeg_bin: &str) -> Vec<String> {
    let mut missing = Vec::new();

    if !check_command_available(yt_dlp_bin).await {
        missing.push(format!("{} - required for title lookup and audio download", yt_dlp_bin));
    }

    if !check_command_available(ffmpeg_bin).await {
        missing.push(format!("{} - required for MP3 transcoding", ffmpeg_bin));
    }

    missing
}

/// Check if a command is available in PATH
async fn check_command_available(command: &str) -> bool {
    use tokio::process::Command;

    Command::new(command)
        .arg("--version")
        .output()
        .await
        .map(|output| output.status.success())
        .unwrap_or(false)
}
