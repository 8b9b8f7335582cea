use hcpstatus::crd::{ClusterVersion, HostedControlPlane};
use kube::CustomResourceExt;
use serde_json::{json, Value};

fn main() -> anyhow::Result<()> {
    // Print both CRDs as a v1 List, for seeding test clusters.
    // Use: cargo run --bin gen-crd | python3 -c "import sys,json,yaml; print(yaml.dump(json.load(sys.stdin), default_flow_style=False))"
    // to convert to YAML

    let hosted_control_plane: Value = serde_json::to_value(HostedControlPlane::crd())?;
    let cluster_version: Value = serde_json::to_value(ClusterVersion::crd())?;

    let list = json!({
        "apiVersion": "v1",
        "kind": "List",
        "items": [hosted_control_plane, cluster_version],
    });

    println!("{}", serde_json::to_string_pretty(&list)?);
    Ok(())
}
