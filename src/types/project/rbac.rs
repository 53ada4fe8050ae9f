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

use super::{Project, ProjectRole};
use crate::types::v1alpha2::subnamespace_anchor::SubnamespaceAnchor;
use k8s_openapi::Resource as _;
use k8s_openapi::api::rbac::v1 as rbacv1;
use k8s_openapi::apimachinery::pkg::apis::meta::v1 as metav1;

const USER_KIND: &str = "User";
const RBAC_API_GROUP: &str = "rbac.authorization.k8s.io";

pub fn role_binding_name(user_id: &str) -> String {
    format!("user-{user_id}")
}

impl Project {
    pub fn new_role_binding(&self, user_id: &str, role: ProjectRole) -> rbacv1::RoleBinding {
        rbacv1::RoleBinding {
            metadata: metav1::ObjectMeta {
                name: Some(role_binding_name(user_id)),
                namespace: Some(self.namespace().to_owned()),
                labels: Some(self.labels()),
                ..Default::default()
            },
            subjects: Some(vec![rbacv1::Subject {
                kind: USER_KIND.to_owned(),
                name: user_id.to_owned(),
                api_group: Some(RBAC_API_GROUP.to_owned()),
                ..Default::default()
            }]),
            role_ref: rbacv1::RoleRef {
                api_group: rbacv1::ClusterRole::GROUP.to_owned(),
                kind: rbacv1::ClusterRole::KIND.to_owned(),
                name: role.cluster_role().to_owned(),
            },
        }
    }

    /// HNC anchor making `self` a sub-namespace of `parent`.
    pub fn new_subnamespace_anchor(&self, parent: &Project) -> SubnamespaceAnchor {
        SubnamespaceAnchor::for_child(parent.namespace(), self.namespace(), &self.labels())
    }
}
