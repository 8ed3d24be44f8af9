//! The embedded guest configuration: one YAML document compiled into
//! the binary via `include_str!` and rendered to a temp file at `create`
//! time, so `limactl create` always gets a config in sync with the
//! binary it's running, with no path-adjacent template file to drift.

use std::io::Write;

use tempfile::NamedTempFile;
use tera::{Context, Tera};

use crate::error::VmError;

const TEMPLATE: &str = include_str!("../resources/guest.yaml.tera");

pub struct GuestConfigParams {
    pub vm_name: String,
    pub config_user: String,
    pub cpus: u32,
    pub memory_gib: u32,
    pub disk_gib: u32,
}

impl Default for GuestConfigParams {
    fn default() -> Self {
        GuestConfigParams {
            vm_name: "llima-box".to_string(),
            config_user: "lima".to_string(),
            cpus: 4,
            memory_gib: 4,
            disk_gib: 60,
        }
    }
}

/// Render the embedded guest YAML and write it to a temp file. The
/// caller must hold the returned `NamedTempFile` until `limactl` has
/// read it (dropping it unlinks the file).
pub fn render(params: &GuestConfigParams) -> Result<NamedTempFile, VmError> {
    let mut tera = Tera::default();
    tera.add_raw_template("guest.yaml", TEMPLATE)
        .map_err(|e| VmError::ConfigRender(e.to_string()))?;

    let mut ctx = Context::new();
    ctx.insert("vm_name", &params.vm_name);
    ctx.insert("config_user", &params.config_user);
    ctx.insert("cpus", &params.cpus);
    ctx.insert("memory_gib", &params.memory_gib);
    ctx.insert("disk_gib", &params.disk_gib);

    let rendered = tera
        .render("guest.yaml", &ctx)
        .map_err(|e| VmError::ConfigRender(e.to_string()))?;

    let mut tmp = tempfile::Builder::new()
        .prefix("envbox-guest-")
        .suffix(".yaml")
        .tempfile()
        .map_err(VmError::Io)?;
    tmp.write_all(rendered.as_bytes()).map_err(VmError::Io)?;

    Ok(tmp)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_vm_name_into_template() {
        let params = GuestConfigParams {
            vm_name: "llima-box".to_string(),
            ..Default::default()
        };
        let tmp = render(&params).unwrap();
        let contents = std::fs::read_to_string(tmp.path()).unwrap();
        assert!(contents.contains("llima-box"));
        assert!(contents.contains("NOPASSWD"));
    }
}
