//! Fake terraform executable and module fixtures.
//!
//! The fake understands `init` and `apply -state=<file>`. Apply renders the module's
//! `state.tmpl.json` with `TF_VAR_*` values substituted, fails with terraform's missing
//! variable diagnostic for every name listed in `required.txt` that is unset, and fails with
//! the contents of `fail.txt` when that file exists. A successful apply writes the contents
//! of `garbage.txt` as state when that file exists, and no state at all when `no-state.txt`
//! exists.

#![allow(dead_code)]

use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use tempfile::TempDir;
use tfharness::{RunnerConfig, TerraformRunner, Variables};

const FAKE_TERRAFORM: &str = r##"#!/bin/sh
set -u

command="$1"
shift

case "$command" in
init)
  mkdir -p .terraform
  echo "init" >> .terraform/init.log
  echo "Terraform has been successfully initialized!"
  exit 0
  ;;
apply)
  ;;
*)
  echo "unsupported command: $command" >&2
  exit 2
  ;;
esac

if [ ! -d .terraform ]; then
  echo "Error: Required plugins are not installed" >&2
  exit 1
fi

state=""
for arg in "$@"; do
  case "$arg" in
  -state=*) state="${arg#-state=}" ;;
  esac
done

if [ -f fail.txt ]; then
  cat fail.txt >&2
  exit 1
fi

if [ -f required.txt ]; then
  while read -r name; do
    [ -z "$name" ] && continue
    eval "isset=\${TF_VAR_${name}+set}"
    if [ -z "$isset" ]; then
      cat >&2 <<EOF
Error: No value for required variable

  on main.tf line 1:
   1: variable "${name}" {

The root module input variable "${name}" is not set, and has no default
value. Use a -var or -var-file command line argument to provide a value for
this variable.
EOF
      exit 1
    fi
  done < required.txt
fi

if [ -f garbage.txt ]; then
  cat garbage.txt > "$state"
  echo "Apply complete! Resources: 0 added, 0 changed, 0 destroyed."
  exit 0
fi

if [ -f no-state.txt ]; then
  echo "Apply complete! Resources: 0 added, 0 changed, 0 destroyed."
  exit 0
fi

sed \
  -e "s|@AGENT_ID@|${TF_VAR_agent_id-}|g" \
  -e "s|@RESOURCE_ID@|${TF_VAR_resource_id-}|g" \
  -e "s|@ADMIN_USERNAME@|${TF_VAR_admin_username-Administrator}|g" \
  -e "s|@ADMIN_PASSWORD@|${TF_VAR_admin_password-coderRDP!}|g" \
  state.tmpl.json > "$state"

echo "Apply complete! Resources: 2 added, 0 changed, 0 destroyed."
"##;

const MAIN_TF: &str = include_str!("../fixtures/windows-rdp/main.tf");
const SCRIPT_TEMPLATE: &str = include_str!("../fixtures/windows-rdp/script.ps1.tmpl");

/// Path of the fake terraform binary, written once per test binary so no test can be
/// spawning a process while the file is still open for writing.
pub fn fake_terraform() -> &'static Path {
    static BIN: OnceLock<(TempDir, PathBuf)> = OnceLock::new();
    let (_, path) = BIN.get_or_init(|| {
        let dir = tempfile::Builder::new()
            .prefix("fake-terraform-")
            .tempdir_in(env!("CARGO_TARGET_TMPDIR"))
            .unwrap();
        let path = dir.path().join("terraform");
        std::fs::write(&path, FAKE_TERRAFORM).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        (dir, path)
    });
    path
}

/// A windows-rdp module directory understood by the fake terraform.
pub fn windows_rdp_module() -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("main.tf"), MAIN_TF).unwrap();
    std::fs::write(dir.path().join("required.txt"), "agent_id\nresource_id\n").unwrap();

    let state = serde_json::json!({
        "version": 4,
        "terraform_version": "1.9.5",
        "serial": 1,
        "lineage": "6b0a4c57-4a5e-4a38-9d36-8d7e4f3b9a21",
        "outputs": {},
        "resources": [
            {
                "mode": "managed",
                "type": "coder_app",
                "name": "windows-rdp",
                "provider": "provider[\"registry.terraform.io/coder/coder\"]",
                "instances": [{
                    "schema_version": 1,
                    "attributes": {
                        "agent_id": "@AGENT_ID@",
                        "display_name": "Web RDP",
                        "slug": "web-rdp",
                        "share": "owner",
                        "subdomain": true,
                        "url": "http://localhost:7171",
                        "healthcheck": [
                            { "interval": 5, "threshold": 15, "url": "http://localhost:7171" }
                        ]
                    },
                    "sensitive_attributes": []
                }]
            },
            {
                "mode": "managed",
                "type": "coder_script",
                "name": "windows-rdp",
                "provider": "provider[\"registry.terraform.io/coder/coder\"]",
                "instances": [{
                    "schema_version": 0,
                    "attributes": {
                        "agent_id": "@AGENT_ID@",
                        "display_name": "windows-rdp",
                        "icon": "/icon/desktop.svg",
                        "run_on_start": true,
                        "script": SCRIPT_TEMPLATE
                    },
                    "sensitive_attributes": []
                }]
            }
        ]
    });
    std::fs::write(
        dir.path().join("state.tmpl.json"),
        serde_json::to_string_pretty(&state).unwrap(),
    )
    .unwrap();

    dir
}

pub fn runner(module_dir: &Path) -> TerraformRunner {
    TerraformRunner::with_config(module_dir, RunnerConfig::with_binary(fake_terraform()))
}

pub fn vars(pairs: &[(&str, &str)]) -> Variables {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

/// Names of leftover `*.tfstate*` files in a directory.
pub fn state_files(dir: &Path) -> Vec<String> {
    std::fs::read_dir(dir)
        .unwrap()
        .filter_map(|e| e.ok())
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .filter(|name| name.contains(".tfstate"))
        .collect()
}
