//! Permission detection and guidance for Linux.
//!
//! Camera access on Linux is plain file access to `/dev/video*`; microphone
//! access goes through the user's PipeWire or PulseAudio socket.

use std::path::{Path, PathBuf};

/// A system capability that avcal may need.
#[derive(Debug, Clone)]
pub struct Capability {
    pub name: String,
    pub description: String,
    pub available: bool,
    pub required: bool,
    pub fix_instructions: Option<String>,
}

/// Camera access summary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CameraAccess {
    /// Video device nodes present on the system.
    pub nodes: Vec<PathBuf>,
    /// Subset of `nodes` the current user can open.
    pub readable: Vec<PathBuf>,
}

impl CameraAccess {
    /// Nodes exist but none can be opened: the user lacks permission.
    pub fn is_denied(&self) -> bool {
        !self.nodes.is_empty() && self.readable.is_empty()
    }
}

/// Inspect `/dev/video*` nodes.
pub fn camera_access() -> CameraAccess {
    camera_access_in(Path::new("/dev"))
}

fn camera_access_in(dev_dir: &Path) -> CameraAccess {
    let mut nodes: Vec<PathBuf> = std::fs::read_dir(dev_dir)
        .map(|entries| {
            entries
                .filter_map(Result::ok)
                .map(|entry| entry.path())
                .filter(|path| {
                    path.file_name()
                        .and_then(|n| n.to_str())
                        .map(|n| n.starts_with("video"))
                        .unwrap_or(false)
                })
                .collect()
        })
        .unwrap_or_default();
    nodes.sort();

    let readable = nodes
        .iter()
        .filter(|path| std::fs::File::open(path).is_ok())
        .cloned()
        .collect();

    CameraAccess { nodes, readable }
}

/// Whether a PipeWire or PulseAudio server socket is reachable.
pub fn audio_server_available() -> bool {
    let Ok(runtime_dir) = std::env::var("XDG_RUNTIME_DIR") else {
        return false;
    };
    let runtime_dir = PathBuf::from(runtime_dir);
    runtime_dir.join("pipewire-0").exists() || runtime_dir.join("pulse").join("native").exists()
}

/// Check all capabilities and report status.
pub fn check_capabilities() -> Vec<Capability> {
    vec![check_camera_access(), check_audio_access(), check_video_group()]
}

fn check_camera_access() -> Capability {
    let access = camera_access();
    let available = !access.readable.is_empty();

    Capability {
        name: "Camera Device".to_string(),
        description: format!(
            "Video4Linux capture nodes ({} present, {} readable)",
            access.nodes.len(),
            access.readable.len()
        ),
        available,
        required: true,
        fix_instructions: if access.nodes.is_empty() {
            Some(
                "Connect a camera and verify /dev/video* exists (v4l2-ctl --list-devices)"
                    .to_string(),
            )
        } else if access.is_denied() {
            Some(
                "Add user to video group: sudo usermod -aG video $USER (logout required)"
                    .to_string(),
            )
        } else {
            None
        },
    }
}

fn check_audio_access() -> Capability {
    let available = audio_server_available();

    Capability {
        name: "Audio Server".to_string(),
        description: "PipeWire/PulseAudio socket for microphone capture".to_string(),
        available,
        required: true,
        fix_instructions: if available {
            None
        } else {
            Some("Start PipeWire: systemctl --user start pipewire pipewire-pulse".to_string())
        },
    }
}

fn check_video_group() -> Capability {
    let in_video_group = std::process::Command::new("groups")
        .output()
        .map(|o| {
            String::from_utf8_lossy(&o.stdout)
                .split_whitespace()
                .any(|g| g == "video")
        })
        .unwrap_or(false);

    Capability {
        name: "Video Group".to_string(),
        description: "Membership in the video group (not needed with logind seat ACLs)"
            .to_string(),
        available: in_video_group,
        required: false,
        fix_instructions: if in_video_group {
            None
        } else {
            Some("sudo usermod -aG video $USER (logout required)".to_string())
        },
    }
}

/// Print a user-friendly capability report.
pub fn print_capability_report(capabilities: &[Capability]) {
    println!("avcal System Capabilities:");
    println!("{}", "-".repeat(60));

    for cap in capabilities {
        let status = if cap.available {
            "[OK]"
        } else if cap.required {
            "[MISSING - REQUIRED]"
        } else {
            "[MISSING - OPTIONAL]"
        };

        println!("  {} {}: {}", status, cap.name, cap.description);

        if let Some(ref fix) = cap.fix_instructions {
            println!("    Fix: {fix}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_dev_dir_is_not_denied() {
        let dir = std::env::temp_dir().join("avcal_test_dev_empty");
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();

        let access = camera_access_in(&dir);
        assert!(access.nodes.is_empty());
        assert!(!access.is_denied());

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn readable_nodes_are_listed_in_order() {
        let dir = std::env::temp_dir().join("avcal_test_dev_nodes");
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("video2"), b"").unwrap();
        std::fs::write(dir.join("video0"), b"").unwrap();
        std::fs::write(dir.join("null"), b"").unwrap();

        let access = camera_access_in(&dir);
        assert_eq!(access.nodes, vec![dir.join("video0"), dir.join("video2")]);
        assert_eq!(access.readable, access.nodes);
        assert!(!access.is_denied());

        std::fs::remove_dir_all(&dir).ok();
    }
}
