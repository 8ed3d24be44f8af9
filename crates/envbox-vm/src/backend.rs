//! Parsing for `limactl list --json`, which may emit either a JSON array
//! of instance records or a single bare record object depending on how
//! many instances exist — the controller has to accept both shapes.

use serde::Deserialize;

use crate::error::VmError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VmStatus {
    Absent,
    Created,
    Running,
    Stopped,
    Broken,
}

impl std::fmt::Display for VmStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            VmStatus::Absent => "Absent",
            VmStatus::Created => "Created",
            VmStatus::Running => "Running",
            VmStatus::Stopped => "Stopped",
            VmStatus::Broken => "Broken",
        };
        write!(f, "{s}")
    }
}

impl From<&str> for VmStatus {
    fn from(raw: &str) -> Self {
        match raw {
            "Running" => VmStatus::Running,
            "Stopped" => VmStatus::Stopped,
            "Broken" => VmStatus::Broken,
            _ => VmStatus::Created,
        }
    }
}

#[derive(Debug, Clone)]
pub struct VMInstance {
    pub name: String,
    pub status: VmStatus,
    pub ssh_port: u16,
    pub directory: String,
    pub config_user: Option<String>,
}

#[derive(Debug, Deserialize)]
struct LimaRecord {
    name: String,
    status: String,
    dir: String,
    #[serde(rename = "sshLocalPort", default)]
    ssh_local_port: u16,
    #[serde(default)]
    config: Option<LimaConfig>,
}

#[derive(Debug, Deserialize)]
struct LimaConfig {
    user: Option<LimaUser>,
}

#[derive(Debug, Deserialize)]
struct LimaUser {
    name: Option<String>,
}

impl From<LimaRecord> for VMInstance {
    fn from(r: LimaRecord) -> Self {
        VMInstance {
            name: r.name,
            status: VmStatus::from(r.status.as_str()),
            ssh_port: r.ssh_local_port,
            directory: r.dir,
            config_user: r.config.and_then(|c| c.user).and_then(|u| u.name),
        }
    }
}

/// Parse `limactl list --json` output, accepting either a JSON array of
/// records or a single bare record (the shape limactl emits when there
/// is exactly one matching instance).
pub fn parse_instances(bytes: &[u8]) -> Result<Vec<VMInstance>, VmError> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(Vec::new());
    }

    if let Ok(records) = serde_json::from_slice::<Vec<LimaRecord>>(bytes) {
        return Ok(records.into_iter().map(VMInstance::from).collect());
    }

    match serde_json::from_slice::<LimaRecord>(bytes) {
        Ok(record) => Ok(vec![VMInstance::from(record)]),
        Err(e) => Err(VmError::BackendProtocolError(format!(
            "failed to parse limactl list --json output: {e}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_single_object_payload() {
        let json = br#"{"name":"llima-box","status":"Running","dir":"/home/u/.lima/llima-box","sshLocalPort":60022,"config":{"user":{"name":"lima"}}}"#;
        let instances = parse_instances(json).unwrap();
        assert_eq!(instances.len(), 1);
        assert_eq!(instances[0].name, "llima-box");
        assert_eq!(instances[0].status, VmStatus::Running);
        assert_eq!(instances[0].config_user.as_deref(), Some("lima"));
    }

    #[test]
    fn parses_array_payload_with_two_records() {
        let json = br#"[
            {"name":"llima-box","status":"Running","dir":"/a","sshLocalPort":1},
            {"name":"default","status":"Stopped","dir":"/b","sshLocalPort":2}
        ]"#;
        let instances = parse_instances(json).unwrap();
        assert_eq!(instances.len(), 2);
        assert!(instances.iter().any(|i| i.name == "default" && i.status == VmStatus::Stopped));
    }

    #[test]
    fn invalid_json_reports_parse_failure() {
        let err = parse_instances(b"not json").unwrap_err();
        assert!(err.to_string().contains("failed to parse"));
    }

    #[test]
    fn empty_output_is_no_instances() {
        assert!(parse_instances(b"").unwrap().is_empty());
    }
}
