//! membench CLI
//!
//! Command-line interface for the RAM, file I/O, mmap and RAM disk benchmarks.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use membench_core::{
    run_banner, run_benchmark, BenchmarkConfig, ByteSize, FileIoOptions, FileIoSweep, MmapOptions,
    MmapSweep, RamDisk, ReadStrategy, Settings,
};

#[derive(Parser)]
#[command(name = "membench")]
#[command(about = "Memory and storage throughput micro-benchmarks")]
#[command(version)]
struct Cli {
    /// Settings file (default: ./membench.toml, then the user config directory)
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Measure RAM write and read throughput with parallel workers
    Ram {
        /// Number of threads to run concurrently (default: 1)
        #[arg(short = 'j', long, value_name = "N")]
        threads: Option<usize>,

        /// Buffer size per thread, with optional K, M or G suffix (default: 1G)
        #[arg(short = 'b', long, value_name = "N[KMG]")]
        buffer_size: Option<ByteSize>,

        /// Number of iterations to perform (default: 10)
        #[arg(short = 'n', long, value_name = "N")]
        iterations: Option<u32>,

        /// How the read pass walks the buffer (default: words)
        #[arg(short = 'r', long, value_enum)]
        read_strategy: Option<StrategyArg>,

        /// Print per-thread speeds
        #[arg(short, long)]
        verbose: bool,

        /// Print the full report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Measure sequential write/read throughput on a scratch file
    FileIo {
        /// Scratch file path (default: <tmp>/ssd_benchmark_test.dat)
        #[arg(short, long)]
        path: Option<PathBuf>,

        /// Sizes to test in MB, comma separated
        #[arg(short, long, value_delimiter = ',', value_name = "MB,...")]
        sizes: Option<Vec<u64>>,

        /// Size of each read/write call (default: 1M)
        #[arg(short, long, value_name = "N[KMG]")]
        block_size: Option<ByteSize>,

        /// Keep the OS page cache enabled
        #[arg(long)]
        cache: bool,
    },

    /// Measure memory-mapped file write+msync and read throughput
    Mmap {
        /// Mapped file path (default: test_mmap_file.bin)
        #[arg(short, long)]
        path: Option<PathBuf>,

        /// Sizes to test in MB, comma separated
        #[arg(long, value_delimiter = ',', value_name = "MB,...")]
        sizes: Option<Vec<u64>>,

        /// 1 = MS_SYNC (default), 0 = MS_ASYNC
        #[arg(short = 's', long = "sync", value_parser = clap::value_parser!(u8).range(0..=1))]
        sync: Option<u8>,

        /// 1 = F_NOCACHE on (default), 0 = off
        #[arg(short = 'n', long = "no-cache", value_parser = clap::value_parser!(u8).range(0..=1))]
        no_cache: Option<u8>,
    },

    /// Create, check or eject a RAM disk (macOS)
    Ramdisk {
        /// RAM disk size in MB (default: 2047)
        #[arg(long, global = true)]
        size_mb: Option<u64>,

        /// Volume name (default: RAMDisk)
        #[arg(long, global = true)]
        name: Option<String>,

        #[command(subcommand)]
        action: RamDiskAction,
    },
}

#[derive(Subcommand)]
enum RamDiskAction {
    /// Create and mount the RAM disk
    Create,

    /// Eject the RAM disk
    Eject,

    /// Create the RAM disk, write and read back a file, then eject it
    Check {
        /// Use the current directory instead of a RAM disk
        #[arg(long)]
        local: bool,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum StrategyArg {
    /// 64-byte strides, eight word loads per line
    Words,
    /// Byte-by-byte sum
    Bytes,
    /// Eight independent XOR lanes (vectorises well)
    Wide,
}

impl From<StrategyArg> for ReadStrategy {
    fn from(arg: StrategyArg) -> Self {
        match arg {
            StrategyArg::Words => ReadStrategy::Words,
            StrategyArg::Bytes => ReadStrategy::Bytes,
            StrategyArg::Wide => ReadStrategy::Wide,
        }
    }
}

fn main() -> Result<()> {
    // Logs go to stderr so stdout carries only the report
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("membench=info".parse()?),
        )
        .init();

    let cli = Cli::parse();
    let settings = Settings::load(cli.config.as_deref()).context("Failed to load settings")?;

    match cli.command {
        Commands::Ram {
            threads,
            buffer_size,
            iterations,
            read_strategy,
            verbose,
            json,
        } => {
            let config = BenchmarkConfig::new(
                threads.unwrap_or(settings.ram.threads),
                buffer_size.unwrap_or(settings.ram.buffer_size),
                iterations.unwrap_or(settings.ram.iterations),
                read_strategy.map(Into::into).unwrap_or(settings.ram.read_strategy),
            )
            .context("Invalid RAM benchmark configuration")?;
            cmd_ram(&config, verbose, json)?;
        }
        Commands::FileIo {
            path,
            sizes,
            block_size,
            cache,
        } => {
            let options = FileIoOptions::new(
                path.unwrap_or(settings.file_io.path),
                block_size.unwrap_or(settings.file_io.block_size),
                !cache,
            )
            .context("Invalid file I/O configuration")?;
            cmd_file_io(options, sizes.unwrap_or(settings.file_io.sizes_mb))?;
        }
        Commands::Mmap {
            path,
            sizes,
            sync,
            no_cache,
        } => {
            let options = MmapOptions {
                path: path.unwrap_or(settings.mmap.path),
                sync: sync.map(|v| v == 1).unwrap_or(settings.mmap.sync),
                no_cache: no_cache.map(|v| v == 1).unwrap_or(settings.mmap.no_cache),
            };
            cmd_mmap(options, sizes.unwrap_or(settings.mmap.sizes_mb))?;
        }
        Commands::Ramdisk {
            size_mb,
            name,
            action,
        } => {
            let mut ramdisk = settings.ramdisk;
            if let Some(size_mb) = size_mb {
                ramdisk.size_mb = size_mb;
            }
            if let Some(name) = name {
                ramdisk.volume_name = name;
            }
            cmd_ramdisk(RamDisk::new(ramdisk), action)?;
        }
    }

    Ok(())
}

/// Run the parallel RAM benchmark
fn cmd_ram(config: &BenchmarkConfig, verbose: bool, json: bool) -> Result<()> {
    if !json {
        println!("{}", run_banner(config));
    }

    let report = run_benchmark(config);

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print!("{}", report.render_text(verbose));
    }

    let failed = report.workers.iter().filter(|w| w.allocation_failed).count();
    if failed > 0 {
        tracing::warn!("{} of {} worker(s) could not allocate a buffer; totals are partial", failed, report.workers.len());
    }

    Ok(())
}

/// Run the file I/O size sweep
fn cmd_file_io(options: FileIoOptions, sizes: Vec<u64>) -> Result<()> {
    println!(
        "File I/O on {} ({} blocks, page cache {})",
        options.path.display(),
        ByteSize::new(options.block_size() as u64),
        if options.no_cache { "bypassed" } else { "enabled" }
    );

    let total = sizes.len();
    let mut failures = 0;
    for (size_mb, outcome) in FileIoSweep::new(options, sizes) {
        match outcome {
            Ok(result) => println!("{}", result),
            Err(e) => {
                failures += 1;
                tracing::error!("{} MB: {}", size_mb, e);
            }
        }
    }

    if total > 0 && failures == total {
        bail!("File I/O benchmark failed for every size");
    }
    Ok(())
}

/// Run the mmap size sweep
fn cmd_mmap(options: MmapOptions, sizes: Vec<u64>) -> Result<()> {
    println!("Using MS_{}SYNC", if options.sync { "" } else { "A" });
    println!("F_NOCACHE={}", u8::from(options.no_cache));

    let total = sizes.len();
    let mut failures = 0;
    for (size_mb, outcome) in MmapSweep::new(options, sizes) {
        match outcome {
            Ok(result) => println!("{}\n", result),
            Err(e) => {
                failures += 1;
                tracing::error!("{} MB: {}", size_mb, e);
            }
        }
    }

    if total > 0 && failures == total {
        bail!("mmap benchmark failed for every size");
    }
    Ok(())
}

/// Create, check or eject the RAM disk
fn cmd_ramdisk(ramdisk: RamDisk, action: RamDiskAction) -> Result<()> {
    match action {
        RamDiskAction::Create => {
            let device = ramdisk.create()?;
            println!("RAM disk {} mounted at path: {}", device, ramdisk.mount_path().display());
        }
        RamDiskAction::Eject => {
            ramdisk.eject()?;
            println!("RAM disk successfully removed.");
        }
        RamDiskAction::Check { local } => {
            let dir = if local {
                Some(std::env::current_dir().context("Failed to resolve current directory")?)
            } else {
                None
            };
            let line = ramdisk.check(dir.as_deref())?;
            println!("Read: {}", line);
        }
    }
    Ok(())
}
