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

use super::{Application, Endpoint, EndpointKind, NetworkConfig, Workload};
use k8s_openapi::api::core::v1 as corev1;
use k8s_openapi::api::networking::v1 as networkingv1;
use k8s_openapi::apimachinery::pkg::util::intstr;

impl Application {
    /// Cron jobs run to completion and get neither a Service nor an Ingress.
    pub fn exposes_service(&self) -> bool {
        !matches!(self.workload, Workload::CronJob(_))
    }

    pub fn tls_secret_name(&self) -> String {
        format!("{}-tls", self.name)
    }

    /// ClusterIP Service selecting the application's pods.
    pub fn new_service(&self, namespace: &str) -> corev1::Service {
        corev1::Service {
            metadata: self.object_meta(namespace),
            spec: Some(corev1::ServiceSpec {
                type_: Some("ClusterIP".to_owned()),
                selector: Some(self.selector_labels()),
                ports: Some(vec![corev1::ServicePort {
                    name: Some("http".to_owned()),
                    port: self.config.port,
                    target_port: Some(intstr::IntOrString::Int(self.config.port)),
                    protocol: Some("TCP".to_owned()),
                    ..Default::default()
                }]),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    /// Ingress routing to the Service, when the network config asks for one.
    pub fn new_ingress(&self, namespace: &str) -> Option<networkingv1::Ingress> {
        let network = self.config.network.as_ref().filter(|n| n.create_ingress)?;

        let mut metadata = self.object_meta(namespace);
        if !network.annotations.is_empty() {
            metadata
                .annotations
                .get_or_insert_with(Default::default)
                .extend(network.annotations.clone());
        }

        let host = network.custom_domain.clone();
        let tls = network.tls_enabled.then(|| {
            vec![networkingv1::IngressTLS {
                hosts: host.clone().map(|h| vec![h]),
                secret_name: Some(self.tls_secret_name()),
            }]
        });

        Some(networkingv1::Ingress {
            metadata,
            spec: Some(networkingv1::IngressSpec {
                rules: Some(vec![networkingv1::IngressRule {
                    host,
                    http: Some(networkingv1::HTTPIngressRuleValue {
                        paths: vec![networkingv1::HTTPIngressPath {
                            path: Some(ingress_path(network)),
                            path_type: "Prefix".to_owned(),
                            backend: networkingv1::IngressBackend {
                                service: Some(networkingv1::IngressServiceBackend {
                                    name: self.name.clone(),
                                    port: Some(networkingv1::ServiceBackendPort {
                                        number: Some(self.config.port),
                                        ..Default::default()
                                    }),
                                }),
                                ..Default::default()
                            },
                        }],
                    }),
                }]),
                tls,
                ..Default::default()
            }),
            ..Default::default()
        })
    }

    /// Endpoints exposed once the Service (and optional Ingress) exist.
    pub fn derive_endpoints(&self, namespace: &str, ingress_created: bool) -> Vec<Endpoint> {
        if !self.exposes_service() {
            return Vec::new();
        }

        let mut endpoints = vec![Endpoint {
            kind: EndpointKind::Service,
            url: format!(
                "http://{}.{}.svc.cluster.local:{}",
                self.name, namespace, self.config.port
            ),
        }];

        if ingress_created
            && let Some(network) = &self.config.network
            && let Some(domain) = &network.custom_domain
        {
            let scheme = if network.tls_enabled { "https" } else { "http" };
            endpoints.push(Endpoint {
                kind: EndpointKind::Ingress,
                url: format!("{scheme}://{domain}{}", ingress_path(network)),
            });
        }

        endpoints
    }
}

fn ingress_path(network: &NetworkConfig) -> String {
    network
        .ingress_path
        .clone()
        .filter(|p| !p.is_empty())
        .unwrap_or_else(|| "/".to_owned())
}

#[cfg(test)]
mod tests {
    use super::super::{CronSpec, NetworkConfig, Workload};
    use crate::tests::create_test_application;

    fn with_network(network: NetworkConfig) -> super::Application {
        let mut app = create_test_application("app-1", Workload::Stateless);
        app.config.network = Some(network);
        app
    }

    // Test: ClusterIP service selects app=<name>
    #[test]
    fn test_new_service_structure() {
        let app = create_test_application("app-1", Workload::Stateless);
        let svc = app.new_service("backend");

        let spec = svc.spec.expect("Service should have spec");
        assert_eq!(spec.type_.as_deref(), Some("ClusterIP"));
        assert_eq!(spec.selector.expect("selector")["app"], "web");
        assert_eq!(spec.ports.expect("ports")[0].port, 8080);
    }

    // Test: no ingress unless requested
    #[test]
    fn test_new_ingress_not_requested() {
        let app = create_test_application("app-1", Workload::Stateless);
        assert!(app.new_ingress("backend").is_none());
        assert!(
            with_network(NetworkConfig::default())
                .new_ingress("backend")
                .is_none()
        );
    }

    // Test: ingress with TLS, prefix path and custom domain
    #[test]
    fn test_new_ingress_tls() {
        let app = with_network(NetworkConfig {
            create_ingress: true,
            ingress_path: Some("/api".to_string()),
            custom_domain: Some("api.example.com".to_string()),
            tls_enabled: true,
            ..Default::default()
        });

        let ingress = app.new_ingress("backend").expect("ingress requested");
        let spec = ingress.spec.expect("Ingress should have spec");

        let rule = &spec.rules.as_ref().expect("rules")[0];
        assert_eq!(rule.host.as_deref(), Some("api.example.com"));
        let path = &rule.http.as_ref().expect("http").paths[0];
        assert_eq!(path.path.as_deref(), Some("/api"));
        assert_eq!(path.path_type, "Prefix");

        let tls = spec.tls.expect("tls");
        assert_eq!(tls[0].secret_name.as_deref(), Some("web-tls"));

        let endpoints = app.derive_endpoints("backend", true);
        assert_eq!(endpoints.len(), 2);
        assert_eq!(endpoints[0].url, "http://web.backend.svc.cluster.local:8080");
        assert_eq!(endpoints[1].url, "https://api.example.com/api");
    }

    // Test: failed ingress leaves only the service endpoint
    #[test]
    fn test_endpoints_without_ingress() {
        let app = with_network(NetworkConfig {
            create_ingress: true,
            custom_domain: Some("api.example.com".to_string()),
            ..Default::default()
        });
        assert_eq!(app.derive_endpoints("backend", false).len(), 1);
    }

    // Test: cron jobs expose no endpoints even with an ingress requested
    #[test]
    fn test_cron_job_has_no_endpoints() {
        let mut app = with_network(NetworkConfig {
            create_ingress: true,
            custom_domain: Some("api.example.com".to_string()),
            ..Default::default()
        });
        app.workload = Workload::CronJob(CronSpec {
            schedule: "*/5 * * * *".to_string(),
            command: vec!["echo".to_string()],
            ..Default::default()
        });

        assert!(!app.exposes_service());
        assert!(app.derive_endpoints("backend", true).is_empty());
    }
}
