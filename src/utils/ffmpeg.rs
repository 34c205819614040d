//! Модуль для работы с FFmpeg
//!
//! Команды запускаются через `tokio::process`, чтобы не блокировать рантайм
//! во время обработки фрагментов.

use tokio::process::Command;

use crate::error::StretchError;

/// Проверка наличия FFmpeg
pub async fn check_ffmpeg_installed() -> bool {
    match Command::new("ffmpeg").arg("-version").output().await {
        Ok(output) => output.status.success(),
        Err(_) => false,
    }
}

/// Получение версии FFmpeg (первая строка вывода `ffmpeg -version`)
pub async fn get_ffmpeg_version() -> Option<String> {
    let output = Command::new("ffmpeg").arg("-version").output().await.ok()?;
    if !output.status.success() {
        return None;
    }

    let version_str = String::from_utf8_lossy(&output.stdout);
    version_str.lines().next().map(|line| line.to_string())
}

/// Запуск команды FFmpeg
pub async fn run_ffmpeg_command(args: &[&str]) -> Result<(), StretchError> {
    log::debug!("Running ffmpeg {}", args.join(" "));
    let output = Command::new("ffmpeg")
        .args(["-hide_banner", "-loglevel", "error"])
        .args(args)
        .output()
        .await?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(StretchError::Primitive(format!(
            "FFmpeg command failed with status {}: {}",
            output.status,
            stderr.trim()
        )));
    }

    Ok(())
}

/// Аргументы фильтра `atempo` для одной ступени
pub fn atempo_filter(factor: f64) -> String {
    format!("atempo={:.6}", factor)
}
