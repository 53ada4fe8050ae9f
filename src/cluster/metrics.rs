// Copyright 2025 RustFS Team
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Conversion of `metrics.k8s.io` PodMetrics into per-pod usage.

use crate::types::application::PodUsage;
use kube::ResourceExt;
use kube::api::DynamicObject;

const MB: f64 = 1024.0 * 1024.0;

/// CPU quantity in cores. Unparseable values count as zero.
pub fn cpu_cores(quantity: &str) -> f64 {
    let q = quantity.trim();
    let (number, scale) = if let Some(n) = q.strip_suffix('n') {
        (n, 1e-9)
    } else if let Some(u) = q.strip_suffix('u') {
        (u, 1e-6)
    } else if let Some(m) = q.strip_suffix('m') {
        (m, 1e-3)
    } else {
        (q, 1.0)
    };
    number.parse::<f64>().map(|v| v * scale).unwrap_or(0.0)
}

/// Memory quantity in MiB. Unparseable values count as zero.
pub fn memory_mb(quantity: &str) -> f64 {
    let q = quantity.trim();
    let suffixes: [(&str, f64); 6] = [
        ("Ki", 1024.0),
        ("Mi", MB),
        ("Gi", MB * 1024.0),
        ("K", 1e3),
        ("M", 1e6),
        ("G", 1e9),
    ];

    let (number, multiplier) = suffixes
        .iter()
        .find_map(|(suffix, mul)| q.strip_suffix(suffix).map(|n| (n, *mul)))
        .unwrap_or((q, 1.0));

    number.parse::<f64>().map(|v| v * multiplier / MB).unwrap_or(0.0)
}

/// Sums container usage of one PodMetrics object.
pub fn pod_usage(metrics: &DynamicObject) -> PodUsage {
    let containers = metrics
        .data
        .get("containers")
        .and_then(|c| c.as_array())
        .cloned()
        .unwrap_or_default();

    let (cpu, memory) = containers
        .iter()
        .filter_map(|c| c.get("usage"))
        .fold((0.0, 0.0), |(cpu, mem), usage| {
            let c = usage.get("cpu").and_then(|v| v.as_str()).map_or(0.0, cpu_cores);
            let m = usage
                .get("memory")
                .and_then(|v| v.as_str())
                .map_or(0.0, memory_mb);
            (cpu + c, mem + m)
        });

    PodUsage {
        pod_name: metrics.name_any(),
        cpu_cores: cpu,
        memory_mb: memory,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kube::api::ApiResource;
    use kube::api::GroupVersionKind;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    // Test: cpu suffixes
    #[test]
    fn test_cpu_cores() {
        assert!(approx(cpu_cores("250m"), 0.25));
        assert!(approx(cpu_cores("2"), 2.0));
        assert!(approx(cpu_cores("1500000n"), 0.0015));
        assert!(approx(cpu_cores("500u"), 0.0005));
        assert!(approx(cpu_cores("garbage"), 0.0));
    }

    // Test: memory suffixes, binary and decimal
    #[test]
    fn test_memory_mb() {
        assert!(approx(memory_mb("128Mi"), 128.0));
        assert!(approx(memory_mb("1Gi"), 1024.0));
        assert!(approx(memory_mb("2048Ki"), 2.0));
        assert!(approx(memory_mb("1048576"), 1.0));
        assert!(approx(memory_mb(""), 0.0));
    }

    // Test: container usage is summed per pod
    #[test]
    fn test_pod_usage() {
        let gvk = GroupVersionKind::gvk("metrics.k8s.io", "v1beta1", "PodMetrics");
        let resource = ApiResource::from_gvk_with_plural(&gvk, "pods");
        let obj = DynamicObject::new("web-0", &resource).data(serde_json::json!({
            "containers": [
                {"name": "app", "usage": {"cpu": "100m", "memory": "64Mi"}},
                {"name": "sidecar", "usage": {"cpu": "50m", "memory": "32Mi"}}
            ]
        }));

        let usage = pod_usage(&obj);
        assert_eq!(usage.pod_name, "web-0");
        assert!(approx(usage.cpu_cores, 0.15));
        assert!(approx(usage.memory_mb, 96.0));
    }
}
