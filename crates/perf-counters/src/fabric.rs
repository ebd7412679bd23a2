//! Fabric discovery: enumerate nodes and their ports as counter sources.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

use crate::error::CounterError;
use crate::netdev::NetDevSource;
use crate::simulated::SimulatedSource;
use crate::source::{AggregateSource, SharedSource};
use crate::sysfs::IbPortSource;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SourceKind {
    /// InfiniBand first, then net devices.
    #[default]
    Auto,
    Infiniband,
    NetDev,
    Simulated,
}

impl FromStr for SourceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "auto" => Ok(SourceKind::Auto),
            "ib" | "infiniband" => Ok(SourceKind::Infiniband),
            "net" | "netdev" => Ok(SourceKind::NetDev),
            "sim" | "simulated" => Ok(SourceKind::Simulated),
            other => Err(format!("unknown counter source {other:?}")),
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SourceKind::Auto => "auto",
            SourceKind::Infiniband => "infiniband",
            SourceKind::NetDev => "netdev",
            SourceKind::Simulated => "simulated",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone)]
pub struct FabricPort {
    pub number: u32,
    pub name: String,
    pub source: SharedSource,
}

#[derive(Debug, Clone)]
pub struct FabricNode {
    pub name: String,
    pub source: SharedSource,
    pub ports: Vec<FabricPort>,
}

#[derive(Debug, Clone)]
pub struct Fabric {
    kind: SourceKind,
    nodes: Vec<FabricNode>,
}

/// Search roots for [`Fabric::discover`].
#[derive(Debug, Clone)]
pub struct DiscoveryRoots {
    pub infiniband: PathBuf,
    pub netdev: PathBuf,
}

impl Default for DiscoveryRoots {
    fn default() -> Self {
        Self {
            infiniband: PathBuf::from(crate::sysfs::DEFAULT_ROOT),
            netdev: PathBuf::from(crate::netdev::DEFAULT_ROOT),
        }
    }
}

/// Directory entries (symlinks followed, as under `/sys/class`) by name.
fn sorted_dir_names(root: &Path) -> Result<Vec<String>, CounterError> {
    let entries = fs::read_dir(root).map_err(|err| CounterError::io(root, err))?;
    let mut names: Vec<String> = entries
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.path().is_dir())
        .filter_map(|entry| entry.file_name().into_string().ok())
        .collect();
    names.sort();
    Ok(names)
}

impl Fabric {
    pub fn discover(kind: SourceKind, roots: &DiscoveryRoots) -> Result<Self, CounterError> {
        match kind {
            SourceKind::Infiniband => Self::infiniband(&roots.infiniband),
            SourceKind::NetDev => Self::netdev(&roots.netdev),
            SourceKind::Simulated => Ok(Self::simulated(4, 2)),
            SourceKind::Auto => match Self::infiniband(&roots.infiniband) {
                Ok(fabric) => Ok(fabric),
                Err(err) => {
                    tracing::info!(error = %err, "no InfiniBand fabric, trying net devices");
                    Self::netdev(&roots.netdev)
                }
            },
        }
    }

    /// Every HCA under `root` becomes a node; `ports/<n>` become its ports.
    pub fn infiniband(root: &Path) -> Result<Self, CounterError> {
        let mut nodes = Vec::new();
        for device in sorted_dir_names(root)? {
            let device_dir = root.join(&device);
            let description = fs::read_to_string(device_dir.join("node_desc"))
                .ok()
                .map(|desc| desc.trim().to_string())
                .filter(|desc| !desc.is_empty())
                .unwrap_or_else(|| device.clone());

            let ports_dir = device_dir.join("ports");
            let Ok(port_names) = sorted_dir_names(&ports_dir) else {
                tracing::debug!(device = %device, "device has no ports directory");
                continue;
            };
            let mut numbers: Vec<u32> = port_names
                .iter()
                .filter_map(|name| name.parse().ok())
                .collect();
            numbers.sort_unstable();

            let ports: Vec<FabricPort> = numbers
                .into_iter()
                .map(|number| {
                    let source: SharedSource = Arc::new(IbPortSource::new(
                        format!("{description} Port {number}"),
                        number,
                        ports_dir.join(number.to_string()),
                    ));
                    FabricPort {
                        number,
                        name: format!("Port {number}"),
                        source,
                    }
                })
                .collect();
            if ports.is_empty() {
                continue;
            }
            nodes.push(aggregate_node(description, ports));
        }
        Self::from_nodes(SourceKind::Infiniband, nodes, root)
    }

    /// One node per interface that exposes a `statistics` directory.
    pub fn netdev(root: &Path) -> Result<Self, CounterError> {
        let mut nodes = Vec::new();
        for iface in sorted_dir_names(root)? {
            if iface == "lo" {
                continue;
            }
            let statistics = root.join(&iface).join("statistics");
            if !statistics.is_dir() {
                continue;
            }
            let source: SharedSource = Arc::new(NetDevSource::new(iface.clone(), statistics));
            nodes.push(FabricNode {
                name: iface,
                source,
                ports: Vec::new(),
            });
        }
        Self::from_nodes(SourceKind::NetDev, nodes, root)
    }

    pub fn simulated(node_count: usize, ports_per_node: u32) -> Self {
        let nodes = (0..node_count.max(1))
            .map(|index| {
                let name = format!("sim-node-{index}");
                let ports = (1..=ports_per_node.max(1))
                    .map(|number| {
                        let bytes = 1_000_000 * (index as u64 + 1) * u64::from(number);
                        let source: SharedSource = Arc::new(SimulatedSource::new(
                            format!("{name} Port {number}"),
                            bytes,
                        ));
                        FabricPort {
                            number,
                            name: format!("Port {number}"),
                            source,
                        }
                    })
                    .collect();
                aggregate_node(name, ports)
            })
            .collect();
        Self {
            kind: SourceKind::Simulated,
            nodes,
        }
    }

    fn from_nodes(
        kind: SourceKind,
        nodes: Vec<FabricNode>,
        root: &Path,
    ) -> Result<Self, CounterError> {
        if nodes.is_empty() {
            return Err(CounterError::NoDevices(root.to_path_buf()));
        }
        tracing::info!(%kind, nodes = nodes.len(), "fabric discovered");
        Ok(Self { kind, nodes })
    }

    pub fn kind(&self) -> SourceKind {
        self.kind
    }

    pub fn nodes(&self) -> &[FabricNode] {
        &self.nodes
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn reset_all(&self) -> Result<(), CounterError> {
        for node in &self.nodes {
            node.source.reset()?;
        }
        Ok(())
    }
}

fn aggregate_node(name: String, ports: Vec<FabricPort>) -> FabricNode {
    let parts = ports.iter().map(|port| port.source.clone()).collect();
    let source: SharedSource = Arc::new(AggregateSource::new(name.clone(), parts));
    FabricNode {
        name,
        source,
        ports,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn fake_hca(root: &Path, device: &str, desc: Option<&str>, ports: &[u32]) {
        let dev = root.join(device);
        for port in ports {
            let counters = dev.join(format!("ports/{port}/counters"));
            fs::create_dir_all(&counters).unwrap();
            fs::write(counters.join("port_xmit_data"), "1\n").unwrap();
        }
        if let Some(desc) = desc {
            fs::write(dev.join("node_desc"), format!("{desc}\n")).unwrap();
        }
    }

    #[test]
    fn infiniband_nodes_and_ports_are_sorted() {
        let tmp = TempDir::new().unwrap();
        fake_hca(tmp.path(), "mlx5_1", None, &[2, 1]);
        fake_hca(tmp.path(), "mlx5_0", Some("compute01 HCA-1"), &[1]);

        let fabric = Fabric::infiniband(tmp.path()).unwrap();
        assert_eq!(fabric.kind(), SourceKind::Infiniband);
        let names: Vec<_> = fabric.nodes().iter().map(|n| n.name.as_str()).collect();
        assert_eq!(names, vec!["compute01 HCA-1", "mlx5_1"]);
        let ports: Vec<_> = fabric.nodes()[1].ports.iter().map(|p| p.number).collect();
        assert_eq!(ports, vec![1, 2]);
        assert_eq!(fabric.nodes()[1].ports[1].source.name(), "mlx5_1 Port 2");
        // node total is the sum of its ports, 4 bytes each
        assert_eq!(fabric.nodes()[1].source.refresh().unwrap().xmit_data_bytes(), 8);
    }

    #[test]
    fn empty_root_reports_no_devices() {
        let tmp = TempDir::new().unwrap();
        let err = Fabric::infiniband(tmp.path()).unwrap_err();
        assert!(matches!(err, CounterError::NoDevices(_)));
    }

    #[test]
    fn auto_falls_back_to_net_devices() {
        let tmp = TempDir::new().unwrap();
        let net = tmp.path().join("net");
        fs::create_dir_all(net.join("lo/statistics")).unwrap();
        fs::create_dir_all(net.join("ib0/statistics")).unwrap();
        let roots = DiscoveryRoots {
            infiniband: tmp.path().join("missing"),
            netdev: net,
        };
        let fabric = Fabric::discover(SourceKind::Auto, &roots).unwrap();
        assert_eq!(fabric.kind(), SourceKind::NetDev);
        assert_eq!(fabric.len(), 1);
        assert_eq!(fabric.nodes()[0].name, "ib0");
    }

    #[test]
    fn simulated_fabric_shape() {
        let fabric = Fabric::simulated(3, 2);
        assert_eq!(fabric.len(), 3);
        assert!(fabric.nodes().iter().all(|n| n.ports.len() == 2));
        fabric.reset_all().unwrap();
    }

    #[test]
    fn source_kind_parses_aliases() {
        assert_eq!("IB".parse::<SourceKind>().unwrap(), SourceKind::Infiniband);
        assert_eq!("sim".parse::<SourceKind>().unwrap(), SourceKind::Simulated);
        assert!("carrier-pigeon".parse::<SourceKind>().is_err());
    }
}
