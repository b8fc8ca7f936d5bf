//! Desktop notifications for chimer
//!
//! Each platform gets its own [`Notifier`]; [`detect`] picks one at startup
//! so nothing else has to care which OS it is running on.

use std::process::{Command, Stdio};

use thiserror::Error;

pub const APP_NAME: &str = "Chimer";

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("Failed to launch {program}: {source}")]
    Spawn {
        program: &'static str,
        source: std::io::Error,
    },
}

/// Something that can show a notification to the user
pub trait Notifier: Send + Sync {
    fn name(&self) -> &'static str;

    fn notify(&self, title: &str, body: &str) -> Result<(), NotifyError>;
}

/// Logs the notification instead of showing it
pub struct ConsoleNotifier;

impl Notifier for ConsoleNotifier {
    fn name(&self) -> &'static str {
        "console"
    }

    fn notify(&self, title: &str, body: &str) -> Result<(), NotifyError> {
        tracing::info!("[Notify] {} - {}", title, body);
        Ok(())
    }
}

/// Windows toast through PowerShell's WinRT bindings
pub struct WindowsToastNotifier;

impl WindowsToastNotifier {
    fn script(title: &str, body: &str) -> String {
        format!(
            r#"
            [Windows.UI.Notifications.ToastNotificationManager, Windows.UI.Notifications, ContentType = WindowsRuntime] | Out-Null
            [Windows.Data.Xml.Dom.XmlDocument, Windows.Data.Xml.Dom.XmlDocument, ContentType = WindowsRuntime] | Out-Null

            $template = @"
            <toast scenario="alarm">
                <visual>
                    <binding template="ToastText02">
                        <text id="1">{}</text>
                        <text id="2">{}</text>
                    </binding>
                </visual>
                <audio silent="true"/>
            </toast>
"@

            $xml = New-Object Windows.Data.Xml.Dom.XmlDocument
            $xml.LoadXml($template)
            $toast = [Windows.UI.Notifications.ToastNotification]::new($xml)
            [Windows.UI.Notifications.ToastNotificationManager]::CreateToastNotifier("{}").Show($toast)
            "#,
            escape_xml(title),
            escape_xml(body),
            APP_NAME
        )
    }
}

impl Notifier for WindowsToastNotifier {
    fn name(&self) -> &'static str {
        "windows-toast"
    }

    fn notify(&self, title: &str, body: &str) -> Result<(), NotifyError> {
        let mut cmd = Command::new("powershell");
        cmd.args([
            "-ExecutionPolicy",
            "Bypass",
            "-Command",
            &Self::script(title, body),
        ]);
        #[cfg(target_os = "windows")]
        {
            use std::os::windows::process::CommandExt;
            cmd.creation_flags(0x08000000); // CREATE_NO_WINDOW
        }
        spawn_detached(cmd, "powershell")
    }
}

/// macOS Notification Center through AppleScript
pub struct MacNotifier;

impl MacNotifier {
    fn script(title: &str, body: &str) -> String {
        format!(
            "display notification \"{}\" with title \"{}\"",
            escape_applescript(body),
            escape_applescript(title)
        )
    }
}

impl Notifier for MacNotifier {
    fn name(&self) -> &'static str {
        "osascript"
    }

    fn notify(&self, title: &str, body: &str) -> Result<(), NotifyError> {
        let mut cmd = Command::new("osascript");
        cmd.args(["-e", &Self::script(title, body)]);
        spawn_detached(cmd, "osascript")
    }
}

/// freedesktop notifications through `notify-send`
pub struct LinuxNotifier;

impl LinuxNotifier {
    fn available() -> bool {
        which::which("notify-send").is_ok()
    }
}

impl Notifier for LinuxNotifier {
    fn name(&self) -> &'static str {
        "notify-send"
    }

    fn notify(&self, title: &str, body: &str) -> Result<(), NotifyError> {
        let mut cmd = Command::new("notify-send");
        // No shell involved, so arguments need no escaping
        cmd.args(["--app-name", APP_NAME, "--urgency", "critical", title, body]);
        spawn_detached(cmd, "notify-send")
    }
}

fn spawn_detached(mut cmd: Command, program: &'static str) -> Result<(), NotifyError> {
    cmd.stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .map(|_| ())
        .map_err(|source| NotifyError::Spawn { program, source })
}

fn escape_xml(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        // The template sits in a PowerShell here-string
        .replace('"', "'")
}

fn escape_applescript(text: &str) -> String {
    text.replace('\\', "\\\\").replace('"', "\\\"")
}

/// Pick the notifier for this platform
pub fn detect(enabled: bool) -> Box<dyn Notifier> {
    if !enabled {
        return Box::new(ConsoleNotifier);
    }

    let notifier: Box<dyn Notifier> = if cfg!(target_os = "windows") {
        Box::new(WindowsToastNotifier)
    } else if cfg!(target_os = "macos") {
        Box::new(MacNotifier)
    } else if LinuxNotifier::available() {
        Box::new(LinuxNotifier)
    } else {
        tracing::debug!("[Notify] notify-send not found, notifications go to the log");
        Box::new(ConsoleNotifier)
    };
    tracing::debug!("[Notify] Using {} notifier", notifier.name());
    notifier
}
