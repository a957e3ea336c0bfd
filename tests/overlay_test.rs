//! Overlay semantics: precedence between mounts, unmounting, mixed kinds

use resvfs::{ContainerWriter, MountRegistry};

fn container(files: &[(&str, &[u8])]) -> Vec<u8> {
    let mut writer = ContainerWriter::new();
    for (path, data) in files {
        writer.add_file(path, data).unwrap();
    }
    writer.finish().unwrap()
}

#[test]
fn test_later_mount_shadows_earlier() {
    let mut registry = MountRegistry::new();
    let c1 = registry.mount(container(&[("/x", b"v1")])).unwrap();
    let c2 = registry.mount(container(&[("/x", b"v2")])).unwrap();

    assert_eq!(&registry.read("/x", None).unwrap()[..], b"v2");
    assert_eq!(registry.resolve("/x", None).unwrap().mount(), c2);

    assert!(registry.unmount(c2));
    assert_eq!(&registry.read("/x", None).unwrap()[..], b"v1");
    assert_eq!(registry.resolve("/x", None).unwrap().mount(), c1);

    assert!(registry.unmount(c1));
    assert!(registry.read("/x", None).unwrap_err().is_not_found());
}

#[test]
fn test_unmount_is_idempotent() {
    let mut registry = MountRegistry::new();
    let c1 = registry.mount(container(&[("/x", b"v1")])).unwrap();
    let c2 = registry.mount(container(&[("/x", b"v2")])).unwrap();

    assert!(registry.unmount(c1));
    assert!(!registry.unmount(c1));
    assert_eq!(registry.len(), 1);
    assert_eq!(&registry.read("/x", None).unwrap()[..], b"v2");
    assert!(registry.is_mounted(c2));
}

#[test]
fn test_unmount_middle_keeps_order() {
    let mut registry = MountRegistry::new();
    let c1 = registry.mount(container(&[("/x", b"v1")])).unwrap();
    let c2 = registry.mount(container(&[("/x", b"v2")])).unwrap();
    let c3 = registry.mount(container(&[("/y", b"y3")])).unwrap();

    registry.unmount(c2);
    assert_eq!(registry.handles().collect::<Vec<_>>(), vec![c3, c1]);
    assert_eq!(&registry.read("/x", None).unwrap()[..], b"v1");
    assert_eq!(&registry.read("/y", None).unwrap()[..], b"y3");
}

#[test]
fn test_paths_from_different_mounts() {
    let mut registry = MountRegistry::new();
    registry.mount(container(&[("/shared/a.txt", b"a")])).unwrap();
    registry.mount(container(&[("/shared/b.txt", b"b")])).unwrap();

    assert_eq!(&registry.read("/shared/a.txt", None).unwrap()[..], b"a");
    assert_eq!(&registry.read("/shared/b.txt", None).unwrap()[..], b"b");

    let listed: Vec<String> = registry.list("/", true).unwrap().map(|e| e.path).collect();
    assert_eq!(listed, vec!["/shared", "/shared/b.txt", "/shared/a.txt"]);
}

#[test]
fn test_file_shadows_directory() {
    let mut registry = MountRegistry::new();
    registry
        .mount(container(&[("/assets/icon.png", b"icon")]))
        .unwrap();
    let file_mount = registry.mount(container(&[("/assets", b"flat")])).unwrap();

    // The newest mount wins by recency alone
    let stat = registry.stat("/assets").unwrap();
    assert!(!stat.is_directory);
    assert_eq!(&registry.read("/assets", None).unwrap()[..], b"flat");

    // Deeper paths resolve independently
    assert_eq!(&registry.read("/assets/icon.png", None).unwrap()[..], b"icon");

    let listed: Vec<_> = registry.list("/assets", false).unwrap().collect();
    assert_eq!(listed.len(), 1);
    assert!(!listed[0].is_directory);

    registry.unmount(file_mount);
    assert!(registry.stat("/assets").unwrap().is_directory);
}

#[test]
fn test_directory_shadows_file() {
    let mut registry = MountRegistry::new();
    registry.mount(container(&[("/cfg", b"flat")])).unwrap();
    registry
        .mount(container(&[("/cfg/settings.ini", b"[main]")]))
        .unwrap();

    assert!(registry.stat("/cfg").unwrap().is_directory);
    assert!(registry.read("/cfg", None).unwrap_err().is_not_found());
    let listed: Vec<String> = registry.list("/cfg", true).unwrap().map(|e| e.path).collect();
    assert_eq!(listed, vec!["/cfg/settings.ini"]);
}

#[test]
fn test_stale_resolution_after_unmount() {
    let mut registry = MountRegistry::new();
    registry.mount(container(&[("/x", b"old")])).unwrap();
    let top = registry.mount(container(&[("/x", b"new")])).unwrap();

    let resolved = registry.resolve("/x", None).unwrap();
    registry.unmount(top);

    assert!(registry.revalidate(&resolved).is_none());
    assert!(registry.read_resolved(&resolved).unwrap_err().is_not_found());
    // A fresh resolution sees the older container
    assert_eq!(&registry.read("/x", None).unwrap()[..], b"old");
}

#[test]
fn test_handles_are_not_reused() {
    let mut registry = MountRegistry::new();
    let first = registry.mount(container(&[("/x", b"1")])).unwrap();
    registry.unmount(first);
    let second = registry.mount(container(&[("/x", b"2")])).unwrap();

    assert_ne!(first, second);
    assert!(!registry.is_mounted(first));
    assert!(!registry.unmount(first));
    assert!(registry.is_mounted(second));
}
