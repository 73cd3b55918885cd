//! DockerEnvironment から Docker API パラメータへの変換

// Bollard 0.19 の非推奨APIを使用（teardown 側の ListContainersOptions も同様）
#![allow(deprecated)]

use crate::template::DockerEnvironment;
use bollard::container::{Config, CreateContainerOptions, ListContainersOptions, NetworkingConfig};
use bollard::models::{EndpointSettings, HostConfig};
use std::collections::HashMap;

/// クラスタ所属を示すラベル
pub const CLUSTER_LABEL: &str = "clusterflow.cluster";

/// ノード番号ラベル
pub const NODE_LABEL: &str = "clusterflow.node";

/// クラスタ専用ネットワーク名
pub fn network_name(cluster_id: &str) -> String {
    format!("clusterflow-{}", cluster_id)
}

/// ノードのコンテナ名
pub fn container_name(cluster_id: &str, index: u32) -> String {
    format!("{}-node-{}", cluster_id, index)
}

/// イメージ名にタグがなければ latest を補う
pub fn image_reference(image: &str) -> String {
    // レジストリのポート指定 (host:5000/name) はタグではない
    let last_segment = image.rsplit('/').next().unwrap_or(image);
    if last_segment.contains(':') || last_segment.contains('@') {
        image.to_string()
    } else {
        format!("{}:latest", image)
    }
}

/// テンプレートの1ノード分をコンテナ設定に変換
pub fn node_container_config(
    template: &DockerEnvironment,
    index: u32,
) -> (Config<String>, CreateContainerOptions<String>) {
    let name = container_name(&template.cluster_id, index);
    let network = network_name(&template.cluster_id);

    let env: Vec<String> = template
        .environment
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect();

    let mut labels = HashMap::new();
    labels.insert(CLUSTER_LABEL.to_string(), template.cluster_id.clone());
    labels.insert(NODE_LABEL.to_string(), index.to_string());

    // ノード名でエイリアス
    let mut endpoints = HashMap::new();
    endpoints.insert(
        network.clone(),
        EndpointSettings {
            aliases: Some(vec![name.clone()]),
            ..Default::default()
        },
    );

    let config = Config {
        image: Some(image_reference(&template.image)),
        hostname: Some(name.clone()),
        env: Some(env),
        cmd: template.command.clone(),
        labels: Some(labels),
        host_config: Some(HostConfig {
            network_mode: Some(network),
            ..Default::default()
        }),
        networking_config: Some(NetworkingConfig {
            endpoints_config: endpoints,
        }),
        ..Default::default()
    };

    let options = CreateContainerOptions {
        name,
        platform: None,
    };

    (config, options)
}

/// クラスタの全コンテナ（停止中も含む）を列挙するオプション
pub fn cluster_list_options(cluster_id: &str) -> ListContainersOptions<String> {
    let mut filters = HashMap::new();
    filters.insert(
        "label".to_string(),
        vec![format!("{}={}", CLUSTER_LABEL, cluster_id)],
    );

    ListContainersOptions {
        all: true,
        filters,
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn template() -> DockerEnvironment {
        DockerEnvironment {
            cluster_id: "spark-local".to_string(),
            image: "apache/spark".to_string(),
            node_count: 2,
            environment: BTreeMap::from([("SPARK_MODE".to_string(), "worker".to_string())]),
            command: Some(vec!["sleep".to_string(), "60".to_string()]),
        }
    }

    #[test]
    fn test_names() {
        assert_eq!(network_name("spark-local"), "clusterflow-spark-local");
        assert_eq!(container_name("spark-local", 1), "spark-local-node-1");
    }

    #[test]
    fn test_image_reference() {
        assert_eq!(image_reference("busybox"), "busybox:latest");
        assert_eq!(image_reference("postgres:16"), "postgres:16");
        assert_eq!(
            image_reference("registry.local:5000/spark"),
            "registry.local:5000/spark:latest"
        );
        assert_eq!(
            image_reference("registry.local:5000/spark:3.5"),
            "registry.local:5000/spark:3.5"
        );
    }

    #[test]
    fn test_node_container_config() {
        let (config, options) = node_container_config(&template(), 1);

        assert_eq!(options.name, "spark-local-node-1");
        assert_eq!(config.image.as_deref(), Some("apache/spark:latest"));
        assert_eq!(config.env, Some(vec!["SPARK_MODE=worker".to_string()]));
        assert_eq!(
            config.cmd,
            Some(vec!["sleep".to_string(), "60".to_string()])
        );

        let labels = config.labels.unwrap();
        assert_eq!(labels.get(CLUSTER_LABEL).map(String::as_str), Some("spark-local"));
        assert_eq!(labels.get(NODE_LABEL).map(String::as_str), Some("1"));

        let host_config = config.host_config.unwrap();
        assert_eq!(
            host_config.network_mode.as_deref(),
            Some("clusterflow-spark-local")
        );
    }

    #[test]
    fn test_cluster_list_options_include_stopped() {
        let options = cluster_list_options("spark-local");
        assert!(options.all);
        assert_eq!(
            options.filters.get("label"),
            Some(&vec!["clusterflow.cluster=spark-local".to_string()])
        );
    }
}
