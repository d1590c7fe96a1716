use std::{error::Error, ffi::OsStr, fs::write, process::Command};

use tempfile::NamedTempFile;

/// Script with marker
fn generate_script(js_code: &str, marker: &str) -> String {
    let print_marker = format!(r#"print("{marker}");"#);

    format!("{print_marker}\n{js_code}\n{print_marker}")
}

/// Search for windows whose caption contains `title`, first match wins
pub fn search_windows_kde(title: &str) -> Result<String, Box<dyn Error>> {
    let found = execute_kwin_script(&format!(
        r#"
        const title = {title:?}.toLowerCase();
        const window = workspace.windowList().find(
            (client) => client.caption.toLowerCase().includes(title)
        );
        if (window) {{
            print(window.internalId);
        }}
        "#,
    ))?;

    if found.is_empty() {
        return Err(format!("No window titled {title:?}").into());
    }

    Ok(found)
}

/// Activate (focus and raise) the window with the given UUID
pub fn window_activate_kde(window_uuid: &str) -> Result<(), Box<dyn Error>> {
    let confirmation = uuid::Uuid::new_v4().to_string();
    let result = execute_kwin_script(&format!(
        r#"
        workspace.windowList().forEach((client) => {{
            if (`${{client.internalId}}` === "{window_uuid}") {{
                print("{confirmation}");
                workspace.activeWindow = client;
            }}
        }});
        "#
    ))?;

    if !result.contains(&confirmation) {
        return Err("Window not found or not activated".into());
    }

    Ok(())
}

/// Caption of the focused window, empty when nothing has the focus
pub fn active_window_caption_kde() -> Result<String, Box<dyn Error>> {
    let printed = execute_kwin_script(
        r#"
        const window = workspace.activeWindow;
        print("[" + (window ? window.caption : "") + "]");
        "#,
    )?;

    bracketed(&printed).ok_or_else(|| "Active window caption missing from the journal".into())
}

/// Text between the first `[` and the last `]`, the journal prefixes lines
fn bracketed(printed: &str) -> Option<String> {
    let start = printed.find('[')?;
    let end = printed.rfind(']')?;

    (start < end).then(|| printed[start + 1..end].to_owned())
}

fn create_temp_file(data: &str) -> Result<NamedTempFile, Box<dyn Error>> {
    let tempfile = tempfile::Builder::new()
        .prefix("kwinscript-")
        .suffix(".js")
        .tempfile()?;

    write(&tempfile, data)?;

    Ok(tempfile)
}

/// Call `KWin` over D-Bus, failing on a non-zero exit
fn qdbus(args: &[&OsStr]) -> Result<String, Box<dyn Error>> {
    let output = Command::new("qdbus").arg("org.kde.KWin").args(args).output()?;

    if !output.status.success() {
        return Err(format!(
            "qdbus {args:?} failed: {}",
            String::from_utf8_lossy(&output.stderr)
        )
        .into());
    }

    Ok(String::from_utf8_lossy(&output.stdout).trim().to_owned())
}

/// Execute a `KWin` script and return what it printed
fn execute_kwin_script(script_content: &str) -> Result<String, Box<dyn Error>> {
    let marker = uuid::Uuid::new_v4().to_string();
    let tmp_file = create_temp_file(&generate_script(script_content, &marker))?;
    let script_path = tmp_file.path().as_os_str();

    let id = qdbus(&[
        "/Scripting".as_ref(),
        "org.kde.kwin.Scripting.loadScript".as_ref(),
        script_path,
    ])?
    .parse::<i32>()
    .ok()
    .filter(|id| *id >= 0)
    .ok_or("Can't load KDE Script")?;
    let object_path = format!("/Scripting/Script{id}");

    qdbus(&[object_path.as_ref(), "org.kde.kwin.Script.run".as_ref()])?;

    // print() lands in the compositor journal
    let journal = Command::new("journalctl")
        .args(["--user", "-u", "plasma-kwin_wayland.service"])
        .args(["-n", "10", "--no-pager", "-o", "cat"])
        .output()?;

    qdbus(&[object_path.as_ref(), "org.kde.kwin.Script.stop".as_ref()])?;
    qdbus(&[
        "/Scripting".as_ref(),
        "org.kde.kwin.Scripting.unloadScript".as_ref(),
        script_path,
    ])?;

    Ok(printed_between(
        &String::from_utf8_lossy(&journal.stdout),
        &marker,
    ))
}

/// Lines the script printed, found between the last two markers of the journal
fn printed_between(journal: &str, marker: &str) -> String {
    journal
        .lines()
        .rev()
        .skip_while(|line| !line.contains(marker))
        .skip(1)
        .take_while(|line| !line.contains(marker))
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .into()
}
