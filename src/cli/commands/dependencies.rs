use crate::cli::output::Output;
use crate::config::load_settings;
use crate::errors::Result;
use console::style;
use std::process::{Command, Stdio};

/// Report which of the external executables can be run
pub fn run() -> Result<()> {
    let settings = load_settings()?;
    let tools = [
        ("svn", settings.tools.svn.as_str()),
        ("svnversion", settings.tools.svnversion.as_str()),
        ("patch", settings.tools.patch.as_str()),
    ];

    Output::section("External tools:");
    let mut missing = 0;
    for (role, program) in tools {
        match tool_version(program) {
            Some(version) => Output::sub_item(format!(
                "{:<11} {} {}",
                role,
                style("found").green(),
                style(version).dim()
            )),
            None => {
                missing += 1;
                Output::sub_item(format!("{:<11} {} ({program})", role, style("missing").red()));
            }
        }
    }

    if missing > 0 {
        Output::warning(format!(
            "{missing} tool(s) missing; set their path with `svnstash config set tools.<name> <path>`"
        ));
    }
    Ok(())
}

/// First line of `<program> --version`, or None when it cannot be run
fn tool_version(program: &str) -> Option<String> {
    let output = Command::new(program)
        .arg("--version")
        .stdin(Stdio::null())
        .stderr(Stdio::null())
        .output()
        .ok()?;

    if !output.status.success() {
        return None;
    }
    let stdout = String::from_utf8_lossy(&output.stdout);
    Some(stdout.lines().next().unwrap_or_default().trim().to_string())
}
