//! Convergence procedure template.
//!
//! Templates use Go `text/template` syntax. Available variables:
//!
//! | name               | type        |
//! |--------------------|-------------|
//! | `node_name`        | string      |
//! | `server_url`       | string      |
//! | `client_key`       | string      |
//! | `first_boot_json`  | string      |
//! | `run_list`         | list        |
//! | `secret_items`     | list        |
//! | `vault`            | string      |
//! | `install_url`      | string      |
//! | `has_version`, `version`         | bool, string |
//! | `prerelease`                     | bool         |
//! | `has_proxy`, `proxy`             | bool, string |
//! | `has_environment`, `environment` | bool, string |
//! | `distro`                         | string       |
//! | `has_secret`, `secret`           | bool, string |
//! | `secret_path`                    | string       |

use crate::runtime::constants::node_paths;
use crate::runtime::options::BootstrapOptions;
use gtmpl::Value;
use std::collections::HashMap;
use vaultstrap_shared::errors::BootstrapError;

use super::BootstrapSpec;

/// Built-in procedure for hosts reachable with a POSIX shell.
pub const DEFAULT_TEMPLATE: &str = r#"#!/bin/bash
set -e
{{ if .has_proxy }}
export http_proxy="{{ .proxy }}"
export https_proxy="{{ .proxy }}"
{{ end }}
if ! command -v chef-client >/dev/null 2>&1; then
  echo "Installing agent on {{ .node_name }}"
  curl -L "{{ .install_url }}" | bash -s --{{ if .has_version }} -v {{ .version }}{{ end }}{{ if .prerelease }} -p{{ end }}
fi

mkdir -p /etc/chef

cat > /etc/chef/client.pem <<'VAULTSTRAP_KEY'
{{ .client_key }}
VAULTSTRAP_KEY
chmod 0600 /etc/chef/client.pem
{{ if .has_secret }}
cat > {{ .secret_path }} <<'VAULTSTRAP_SECRET'
{{ .secret }}
VAULTSTRAP_SECRET
chmod 0600 {{ .secret_path }}
{{ end }}
cat > /etc/chef/client.rb <<'VAULTSTRAP_CONFIG'
log_location STDOUT
chef_server_url "{{ .server_url }}"
node_name "{{ .node_name }}"
client_key "/etc/chef/client.pem"
{{ if .has_proxy }}http_proxy "{{ .proxy }}"
https_proxy "{{ .proxy }}"
{{ end }}{{ if .has_environment }}environment "{{ .environment }}"
{{ end }}{{ if .has_secret }}encrypted_data_bag_secret "{{ .secret_path }}"
{{ end }}VAULTSTRAP_CONFIG

cat > /etc/chef/first-boot.json <<'VAULTSTRAP_ATTRS'
{{ .first_boot_json }}
VAULTSTRAP_ATTRS

echo "Secrets readable from vault {{ .vault }}:"
{{ range .secret_items }}echo "  {{ . }}"
{{ end }}
chef-client -j /etc/chef/first-boot.json{{ if .has_environment }} -E {{ .environment }}{{ end }}
"#;

/// Collect template variables for `spec`. `secret` is the already resolved
/// encrypted data bag secret, if any.
pub fn variables(
    spec: &BootstrapSpec,
    options: &BootstrapOptions,
    client_key: &str,
    secret: Option<&str>,
) -> Result<HashMap<String, Value>, BootstrapError> {
    let mut vars: HashMap<String, Value> = HashMap::new();

    vars.insert("node_name".into(), Value::from(spec.node_name.as_str()));
    vars.insert("server_url".into(), Value::from(options.server_url.as_str()));
    vars.insert("client_key".into(), Value::from(client_key.trim_end()));
    vars.insert("first_boot_json".into(), Value::from(first_boot_json(spec)?));
    vars.insert("run_list".into(), list(spec.run_list.entries()));
    vars.insert("secret_items".into(), list(&spec.secret_items));
    vars.insert("vault".into(), Value::from(spec.vault.as_str()));
    vars.insert("install_url".into(), Value::from(node_paths::INSTALL_URL));
    vars.insert("prerelease".into(), Value::from(options.prerelease));
    vars.insert(
        "distro".into(),
        Value::from(options.distro.as_deref().unwrap_or_default()),
    );
    optional(&mut vars, "version", options.bootstrap_version.as_deref());
    optional(&mut vars, "proxy", options.bootstrap_proxy.as_deref());
    optional(&mut vars, "environment", options.environment.as_deref());
    optional(&mut vars, "secret", secret.map(str::trim_end));
    vars.insert("secret_path".into(), Value::from(node_paths::DATA_BAG_SECRET));

    Ok(vars)
}

/// Render `template` with `vars`.
pub fn render(template: &str, vars: HashMap<String, Value>) -> Result<String, BootstrapError> {
    gtmpl::template(template, vars).map_err(|e| BootstrapError::Render(e.to_string()))
}

/// First-boot attributes with the run-list merged in.
fn first_boot_json(spec: &BootstrapSpec) -> Result<String, BootstrapError> {
    let mut attrs = spec.first_boot_attributes.clone();
    attrs.insert(
        "run_list".into(),
        serde_json::Value::from(spec.run_list.entries().to_vec()),
    );
    serde_json::to_string_pretty(&attrs).map_err(|e| BootstrapError::Render(e.to_string()))
}

fn list(items: &[String]) -> Value {
    Value::from(items.iter().map(|s| Value::from(s.as_str())).collect::<Vec<_>>())
}

fn optional(vars: &mut HashMap<String, Value>, name: &str, value: Option<&str>) {
    vars.insert(format!("has_{}", name), Value::from(value.is_some()));
    vars.insert(name.to_string(), Value::from(value.unwrap_or_default()));
}
