//! Generate seed corpus for fuzzing

use resvfs::{CompressionMethod, ContainerWriter, WriterOptions, FORMAT_VERSION_1};
use std::fs;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let corpus_dir = "fuzz/corpus/fuzz_container_mount";
    fs::create_dir_all(corpus_dir)?;

    println!("Generating seed corpus...");

    let mut seeds: Vec<(&str, ContainerWriter)> = Vec::new();

    // Seed 1: Empty container (root only)
    seeds.push(("seed_empty.rcv", ContainerWriter::new()));

    // Seed 2: Single small file
    let mut writer = ContainerWriter::new();
    writer.add_file("/test.txt", b"Hello, World!")?;
    seeds.push(("seed_single_small.rcv", writer));

    // Seed 3: Nested directories
    let mut writer = ContainerWriter::new();
    writer.add_file("/file1.txt", b"First file")?;
    writer.add_file("/dir/file2.txt", b"Second file")?;
    writer.add_file("/dir/sub/file3.txt", b"Third file in directory")?;
    writer.add_directory("/empty")?;
    seeds.push(("seed_nested.rcv", writer));

    // Seed 4: Every compression method
    let mut writer = ContainerWriter::new();
    let text = b"This is test data for compression. ".repeat(100);
    writer.add_file_with_compression("/none.txt", &text, CompressionMethod::None)?;
    writer.add_file_with_compression("/zlib.txt", &text, CompressionMethod::Zlib)?;
    writer.add_file_with_compression("/zstd.txt", &text, CompressionMethod::Zstd)?;
    seeds.push(("seed_compression.rcv", writer));

    // Seed 5: Locale variants
    let mut writer = ContainerWriter::new();
    writer.add_localized_file("/hello.txt", "", b"Hello", CompressionMethod::None)?;
    writer.add_localized_file("/hello.txt", "en", b"Hi", CompressionMethod::None)?;
    writer.add_localized_file("/hello.txt", "de", b"Hallo", CompressionMethod::None)?;
    seeds.push(("seed_locales.rcv", writer));

    // Seed 6: Format version 1
    let mut writer = ContainerWriter::with_options(WriterOptions {
        format_version: FORMAT_VERSION_1,
        ..WriterOptions::default()
    });
    writer.add_file("/legacy.txt", &b"old layout ".repeat(20))?;
    writer.add_file("/empty.txt", b"")?;
    seeds.push(("seed_version1.rcv", writer));

    let count = seeds.len();
    for (name, writer) in seeds {
        let path = format!("{}/{}", corpus_dir, name);
        writer.write_to_path(&path)?;
        println!("✓ Generated: {}", path);
    }

    println!("\nGenerated {} seed files in {}", count, corpus_dir);
    Ok(())
}
