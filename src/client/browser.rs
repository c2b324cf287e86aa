use std::path::Path;
use std::process::Command;
use tracing::{debug, warn};

/// Platform command that opens a file with the default application
fn opener_command(path: &Path) -> Option<Command> {
    let mut cmd = if cfg!(target_os = "macos") {
        Command::new("open")
    } else if cfg!(target_os = "windows") {
        let mut cmd = Command::new("cmd");
        cmd.args(["/c", "start", ""]);
        cmd
    } else if cfg!(any(target_os = "linux", target_os = "freebsd", target_os = "openbsd")) {
        Command::new("xdg-open")
    } else {
        return None;
    };
    cmd.arg(path);
    Some(cmd)
}

/// Open the report in a browser without waiting for it. Failures are
/// logged, not returned.
pub fn open_in_browser(path: &Path) {
    let Some(mut cmd) = opener_command(path) else {
        println!("Open {} in your browser to view results", path.display());
        return;
    };

    match cmd.spawn() {
        Ok(child) => debug!(pid = child.id(), path = %path.display(), "Browser launched"),
        Err(e) => {
            warn!(error = %e, path = %path.display(), "Failed to launch browser");
            println!("Open {} in your browser to view results", path.display());
        }
    }
}
