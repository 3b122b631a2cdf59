//! openchd CLI - disc image inspection tool
//!
//! A tool for inspecting CHD and raw disc images: table of contents,
//! hard-disk geometry, and individual sector dumps.

use std::env;
use std::path::Path;
use std::process;

use openchd_core::AccessMode;
use openchd_images::{open_cd, open_hard_disk, Addressing, DataFormat, Toc};
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = env::args().collect();

    if args.len() < 2 {
        print_usage(&args[0]);
        process::exit(1);
    }

    let command = &args[1];

    match command.as_str() {
        "info" => {
            if args.len() < 3 {
                eprintln!("Usage: {} info <image_file>", args[0]);
                process::exit(1);
            }
            if let Err(e) = cmd_info(&args[2]) {
                eprintln!("Error: {:#}", e);
                process::exit(1);
            }
        }
        "toc" => {
            if args.len() < 3 {
                eprintln!("Usage: {} toc <image_file>", args[0]);
                process::exit(1);
            }
            if let Err(e) = cmd_toc(&args[2]) {
                eprintln!("Error: {:#}", e);
                process::exit(1);
            }
        }
        "geometry" => {
            if args.len() < 3 {
                eprintln!("Usage: {} geometry <image_file>", args[0]);
                process::exit(1);
            }
            if let Err(e) = cmd_geometry(&args[2]) {
                eprintln!("Error: {:#}", e);
                process::exit(1);
            }
        }
        "read" => {
            if args.len() < 4 {
                eprintln!("Usage: {} read <image_file> <lba>", args[0]);
                process::exit(1);
            }
            let lba = match args[3].parse::<u32>() {
                Ok(lba) => lba,
                Err(_) => {
                    eprintln!("Invalid LBA: {}", args[3]);
                    process::exit(1);
                }
            };
            if let Err(e) = cmd_read(&args[2], lba) {
                eprintln!("Error: {:#}", e);
                process::exit(1);
            }
        }
        "--help" | "-h" | "help" => {
            print_usage(&args[0]);
        }
        "--version" | "-v" | "version" => {
            println!("openchd v{}", env!("CARGO_PKG_VERSION"));
        }
        _ => {
            eprintln!("Unknown command: {}", command);
            print_usage(&args[0]);
            process::exit(1);
        }
    }
}

fn print_usage(program: &str) {
    println!("openchd - disc image inspection");
    println!();
    println!("USAGE:");
    println!("    {} <COMMAND> [OPTIONS]", program);
    println!();
    println!("COMMANDS:");
    println!("    info <image>        Display image information");
    println!("    toc <image>         List CD-ROM tracks");
    println!("    geometry <image>    Display hard-disk geometry");
    println!("    read <image> <lba>  Hex-dump the sector at a logical address");
    println!("    help                Print this help message");
    println!("    version             Print version");
    println!();
    println!("EXAMPLES:");
    println!("    {} toc game.chd", program);
    println!("    {} read game.chd 150", program);
}

fn cmd_info(image_path: &str) -> anyhow::Result<()> {
    let path = Path::new(image_path);

    // Hard-disk images carry geometry metadata; everything else is a disc
    if let Ok(mut disk) = open_hard_disk(path, AccessMode::ReadOnly) {
        let geometry = *disk.geometry()?;
        println!("=== Image Information ===");
        println!("Path:   {}", image_path);
        println!("Kind:   hard disk");
        println!(
            "Size:   {} sectors ({:.2} MB)",
            geometry.total_sectors(),
            (geometry.total_sectors() * geometry.sector_bytes as u64) as f64 / 1_048_576.0
        );
        disk.close();
        return Ok(());
    }

    let mut cd = open_cd(path)?;
    let toc = cd.toc()?;
    println!("=== Image Information ===");
    println!("Path:   {}", image_path);
    println!("Kind:   {}", if toc.is_gdrom() { "GD-ROM" } else { "CD-ROM" });
    match cd.version() {
        Some(version) => println!("Format: CHD v{}", version),
        None => println!("Format: raw sector dump"),
    }
    println!("Tracks: {}", cd.toc()?.track_count());
    println!("Frames: {}", cd.toc()?.total_frames(Addressing::Logical));
    cd.close();
    Ok(())
}

fn cmd_toc(image_path: &str) -> anyhow::Result<()> {
    let mut cd = open_cd(Path::new(image_path))?;
    print_toc(cd.toc()?);
    cd.close();
    Ok(())
}

fn print_toc(toc: &Toc) {
    println!("=== Table of Contents ===");
    println!();
    println!(
        "{:<6} {:<14} {:<8} {:<10} {:<8} {:<10}",
        "Track", "Type", "Subcode", "Frames", "Pregap", "Start LBA"
    );
    println!("{}", "-".repeat(60));

    for (index, track) in toc.tracks().iter().enumerate() {
        println!(
            "{:<6} {:<14} {:<8} {:<10} {:<8} {:<10}",
            index + 1,
            track.track_type.as_str(),
            track.sub_type.as_str(),
            track.frames,
            track.pregap,
            track.log_frame_ofs
        );
    }

    if toc.is_gdrom() {
        println!();
        println!("Note: GD-ROM image.");
    }
}

fn cmd_geometry(image_path: &str) -> anyhow::Result<()> {
    let mut disk = open_hard_disk(Path::new(image_path), AccessMode::ReadOnly)?;
    let geometry = *disk.geometry()?;

    println!("=== Hard Disk Geometry ===");
    println!("Cylinders:    {}", geometry.cylinders);
    println!("Heads:        {}", geometry.heads);
    println!("Sectors:      {}", geometry.sectors);
    println!("Sector size:  {} bytes", geometry.sector_bytes);
    println!("Total:        {} sectors", geometry.total_sectors());

    disk.close();
    Ok(())
}

fn cmd_read(image_path: &str, lba: u32) -> anyhow::Result<()> {
    let path = Path::new(image_path);

    if let Ok(mut disk) = open_hard_disk(path, AccessMode::ReadOnly) {
        let bytes = disk.geometry()?.sector_bytes as usize;
        let mut buf = vec![0u8; bytes];
        disk.read(lba as u64, &mut buf)?;
        disk.close();
        hex_dump(&buf);
        return Ok(());
    }

    let mut cd = open_cd(path)?;
    let (index, _) = cd
        .toc()?
        .resolve(lba, Addressing::Logical)
        .ok_or_else(|| anyhow::anyhow!("LBA {} is not on any track", lba))?;
    let size = cd.toc()?.tracks()[index].data_size as usize;

    let mut buf = vec![0u8; size];
    cd.read_data(lba, &mut buf, DataFormat::RawDontCare, Addressing::Logical)?;
    cd.close();
    hex_dump(&buf);
    Ok(())
}

fn hex_dump(data: &[u8]) {
    for (row, chunk) in data.chunks(16).enumerate() {
        let hex: Vec<String> = chunk.iter().map(|b| format!("{:02x}", b)).collect();
        let ascii: String = chunk
            .iter()
            .map(|&b| if (0x20..0x7f).contains(&b) { b as char } else { '.' })
            .collect();
        println!("{:08x}  {:<47}  {}", row * 16, hex.join(" "), ascii);
    }
}
