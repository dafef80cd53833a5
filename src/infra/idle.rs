//! Platform idle-time probe used to decide AFK.

use std::process::Command;

use crate::error::{NotifyError, Result};

/// Seconds since the last user input.
pub trait IdleProbe: Send + Sync {
    fn idle_seconds(&self) -> Result<u64>;
}

/// AFK decision: threshold 0 disables detection, and a probe error counts as
/// present.
pub fn is_afk(probe: &dyn IdleProbe, threshold_secs: u64) -> bool {
    if threshold_secs == 0 {
        return false;
    }
    match probe.idle_seconds() {
        Ok(idle) => idle >= threshold_secs,
        Err(e) => {
            tracing::debug!("idle probe failed, assuming present: {e}");
            false
        }
    }
}

/// Fixed idle time, for tests and the dashboard dry-run.
#[derive(Debug, Clone, Copy)]
pub struct FixedIdle(pub u64);

impl IdleProbe for FixedIdle {
    fn idle_seconds(&self) -> Result<u64> {
        Ok(self.0)
    }
}

/// The probe for the current platform.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemIdleProbe;

impl IdleProbe for SystemIdleProbe {
    #[cfg(target_os = "linux")]
    fn idle_seconds(&self) -> Result<u64> {
        // xprintidle reports milliseconds.
        let out = run_probe("xprintidle", &[])?;
        let ms: u64 = out
            .trim()
            .parse()
            .map_err(|_| NotifyError::driver("idle", format!("unexpected xprintidle output: {out}")))?;
        Ok(ms / 1000)
    }

    #[cfg(target_os = "macos")]
    fn idle_seconds(&self) -> Result<u64> {
        let out = run_probe("ioreg", &["-c", "IOHIDSystem", "-d", "4"])?;
        parse_hid_idle_time(&out)
            .ok_or_else(|| NotifyError::driver("idle", "HIDIdleTime not found in ioreg output"))
    }

    #[cfg(windows)]
    fn idle_seconds(&self) -> Result<u64> {
        use windows::Win32::System::SystemInformation::GetTickCount;
        use windows::Win32::UI::Input::KeyboardAndMouse::{GetLastInputInfo, LASTINPUTINFO};

        let mut info = LASTINPUTINFO {
            cbSize: std::mem::size_of::<LASTINPUTINFO>() as u32,
            dwTime: 0,
        };
        let ok = unsafe { GetLastInputInfo(&mut info) };
        if !ok.as_bool() {
            return Err(NotifyError::driver("idle", "GetLastInputInfo failed"));
        }
        let now = unsafe { GetTickCount() };
        Ok(u64::from(now.wrapping_sub(info.dwTime)) / 1000)
    }

    #[cfg(not(any(target_os = "linux", target_os = "macos", windows)))]
    fn idle_seconds(&self) -> Result<u64> {
        Err(NotifyError::driver("idle", "idle detection is not supported on this platform"))
    }
}

#[allow(dead_code)]
fn run_probe(program: &str, args: &[&str]) -> Result<String> {
    let output = Command::new(program)
        .args(args)
        .output()
        .map_err(|e| NotifyError::driver("idle", format!("{program}: {e}")))?;
    if !output.status.success() {
        return Err(NotifyError::driver(
            "idle",
            format!("{program} exited with {}", output.status),
        ));
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// Extract `"HIDIdleTime" = <ns>` from ioreg output, in seconds.
#[allow(dead_code)]
fn parse_hid_idle_time(ioreg: &str) -> Option<u64> {
    ioreg
        .lines()
        .find(|l| l.contains("\"HIDIdleTime\""))
        .and_then(|l| l.rsplit('=').next())
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(|ns| ns / 1_000_000_000)
}
