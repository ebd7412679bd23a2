use std::fs;
use std::path::Path;

use perf_counters::{Counter, CounterError, DiscoveryRoots, Fabric, SourceKind};
use tempfile::TempDir;

fn write_port(root: &Path, device: &str, port: u32, xmit_words: u64, rcv_words: u64) {
    let counters = root.join(format!("{device}/ports/{port}/counters"));
    fs::create_dir_all(&counters).unwrap();
    fs::write(counters.join("port_xmit_data"), format!("{xmit_words}\n")).unwrap();
    fs::write(counters.join("port_rcv_data"), format!("{rcv_words}\n")).unwrap();
    fs::write(counters.join("port_xmit_packets"), "10\n").unwrap();
}

#[test]
fn discover_refresh_and_reset_whole_fabric() {
    let tmp = TempDir::new().unwrap();
    let ib = tmp.path().join("infiniband");
    write_port(&ib, "mlx4_0", 1, 100, 50);
    write_port(&ib, "mlx4_0", 2, 200, 50);
    write_port(&ib, "mlx4_1", 1, 1, 1);
    fs::write(ib.join("mlx4_0/node_desc"), "storage01\n").unwrap();

    let roots = DiscoveryRoots {
        infiniband: ib.clone(),
        netdev: tmp.path().join("net"),
    };
    let fabric = Fabric::discover(SourceKind::Auto, &roots).unwrap();
    assert_eq!(fabric.len(), 2);

    let node = &fabric.nodes()[0];
    assert_eq!(node.name, "storage01");
    let snap = node.source.refresh().unwrap();
    assert_eq!(snap.xmit_data_bytes(), 1200);
    assert_eq!(snap.rcv_data_bytes(), 400);
    assert_eq!(snap.value(Counter::XmitPkts), 20);

    fabric.reset_all().unwrap();
    write_port(&ib, "mlx4_0", 2, 300, 50);
    let snap = node.source.refresh().unwrap();
    assert_eq!(snap.xmit_data_bytes(), 400);
    assert_eq!(snap.rcv_data_bytes(), 0);
    assert_eq!(node.ports[1].source.refresh().unwrap().xmit_data_bytes(), 400);
}

#[test]
fn vanished_port_surfaces_as_error() {
    let tmp = TempDir::new().unwrap();
    write_port(tmp.path(), "mlx5_0", 1, 1, 1);
    let fabric = Fabric::infiniband(tmp.path()).unwrap();
    fs::remove_dir_all(tmp.path().join("mlx5_0/ports/1/counters")).unwrap();
    let err = fabric.nodes()[0].source.refresh().unwrap_err();
    assert!(matches!(err, CounterError::Io { .. }));
}

#[test]
fn explicit_kind_does_not_fall_back() {
    let tmp = TempDir::new().unwrap();
    let roots = DiscoveryRoots {
        infiniband: tmp.path().join("none"),
        netdev: tmp.path().join("none"),
    };
    assert!(Fabric::discover(SourceKind::Infiniband, &roots).is_err());
    let sim = Fabric::discover(SourceKind::Simulated, &roots).unwrap();
    assert_eq!(sim.kind(), SourceKind::Simulated);
}
