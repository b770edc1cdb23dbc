use anyhow::{Context, Result};
use std::path::Path;
use std::process::Command;

/// Opens `path` with the host's file browser / default handler.
pub fn open_host_location(path: &Path) -> Result<()> {
    let mut command = reveal_command(path)?;
    command
        .spawn()
        .with_context(|| format!("ファイルを開けませんでした: {}", path.display()))?;
    Ok(())
}

#[cfg(target_os = "macos")]
fn reveal_command(path: &Path) -> Result<Command> {
    let mut command = Command::new("open");
    command.arg(path);
    Ok(command)
}

#[cfg(target_os = "windows")]
fn reveal_command(path: &Path) -> Result<Command> {
    let system_root =
        std::env::var_os("SYSTEMROOT").context("SYSTEMROOT が設定されていません")?;
    let run_dll = Path::new(&system_root).join("System32").join("rundll32.exe");
    let mut command = Command::new(run_dll);
    command.arg("url.dll,FileProtocolHandler").arg(path);
    Ok(command)
}

#[cfg(all(unix, not(target_os = "macos")))]
fn reveal_command(path: &Path) -> Result<Command> {
    let mut command = Command::new("xdg-open");
    command.arg(path);
    Ok(command)
}

#[cfg(not(any(unix, windows)))]
fn reveal_command(path: &Path) -> Result<Command> {
    anyhow::bail!("この環境ではファイルを開けません: {}", path.display())
}
