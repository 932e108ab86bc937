//! Node labels injected into the startup script as `LABELS`.

/// Label carrying the owning node group.
pub const NODE_GROUP_LABEL: &str = "verdacloud/node-group";

/// Label carrying the instance type of GPU nodes.
pub const ACCELERATOR_LABEL: &str = "verdacloud/accelerator";

/// Instance types are GPU unless they carry the `CPU.` prefix.
pub fn is_gpu_instance_type(instance_type: &str) -> bool {
    !instance_type.starts_with("CPU.")
}

/// Full label list for a node of `group` running `instance_type`.
pub fn node_labels(config_labels: &[String], group: &str, instance_type: &str) -> Vec<String> {
    let mut labels: Vec<String> = config_labels
        .iter()
        .filter(|l| !l.is_empty())
        .cloned()
        .collect();
    labels.push(format!("{NODE_GROUP_LABEL}={group}"));
    if is_gpu_instance_type(instance_type) {
        labels.push(format!("{ACCELERATOR_LABEL}={instance_type}"));
    }
    labels
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn gpu_detection() {
        assert!(is_gpu_instance_type("1H100.80S.22V"));
        assert!(is_gpu_instance_type("GPU.6000PRO.x8"));
        assert!(!is_gpu_instance_type("CPU.4V.16G"));
    }

    #[test]
    fn cpu_nodes_have_no_accelerator() {
        let labels = node_labels(&strings(&["env=prod"]), "asg-cpu", "CPU.4V.16G");
        assert_eq!(labels, strings(&["env=prod", "verdacloud/node-group=asg-cpu"]));
    }

    #[test]
    fn gpu_nodes_carry_accelerator() {
        let labels = node_labels(
            &strings(&["datacrunch.io/gpu.installed=8", "url=http://example.com"]),
            "asg-pro6000-8x",
            "GPU.6000PRO.x8",
        );
        assert_eq!(
            labels.join(","),
            "datacrunch.io/gpu.installed=8,url=http://example.com,\
             verdacloud/node-group=asg-pro6000-8x,verdacloud/accelerator=GPU.6000PRO.x8"
        );
    }
}
