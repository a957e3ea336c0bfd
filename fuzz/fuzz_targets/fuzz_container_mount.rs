#![no_main]

use libfuzzer_sys::fuzz_target;
use resvfs::{ContainerWriter, MountRegistry};

fuzz_target!(|data: &[u8]| {
    let mut registry = MountRegistry::new();

    // A known-good base mount must survive whatever happens on top
    let mut writer = ContainerWriter::new();
    if writer.add_file("/base.txt", b"base").is_err() {
        return;
    }
    let Ok(base) = writer.finish() else {
        return;
    };
    if registry.mount(base).is_err() {
        return;
    }

    // Mount the fuzz input - should never panic
    let handle = match registry.mount(data.to_vec()) {
        Ok(h) => h,
        Err(_) => {
            assert_eq!(registry.len(), 1);
            return;
        }
    };

    // Walk and read everything - should never panic
    if let Ok(entries) = registry.list("/", true) {
        for entry in entries {
            let _ = registry.stat(&entry.path);
            let _ = registry.read(&entry.path, None);
            let _ = registry.read(&entry.path, Some("en"));
        }
    }

    let _ = registry.stat("");
    let _ = registry.stat("../../../etc/passwd");
    let _ = registry.read(":/base.txt", None);

    assert!(registry.unmount(handle));
    assert!(registry.read("/base.txt", None).is_ok());
});
