use anyhow::{ensure, format_err, Context, Result};
use clap::Parser;
use clip_dataset::{
    config::Config,
    dataset::{ClassVocabulary, GenericDataset, MeccanoDataset, Mode, RandomAccessDataset},
    stats,
};
use futures::stream::{self, StreamExt as _};
use log::{info, warn};
use prettytable::{cell, row, Table};
use std::{
    env,
    path::{Path, PathBuf},
    time::Instant,
};
use tch::{vision, Kind};

#[derive(Debug, Clone, Parser)]
/// MECCANO clip dataset utilities
enum Opts {
    /// Print the clip count and label histogram of a split
    Inspect {
        /// configuration file
        #[clap(long, default_value = "meccano.json5")]
        config_file: PathBuf,
        /// dataset split
        #[clap(long, default_value = "train")]
        mode: Mode,
    },
    /// Sample one clip and save its frames as images
    Sample {
        #[clap(long, default_value = "meccano.json5")]
        config_file: PathBuf,
        #[clap(long, default_value = "train")]
        mode: Mode,
        /// clip index
        #[clap(long)]
        index: usize,
        /// output directory
        output_dir: PathBuf,
    },
    /// Load every clip of a split with concurrent workers
    Iterate {
        #[clap(long, default_value = "meccano.json5")]
        config_file: PathBuf,
        #[clap(long, default_value = "train")]
        mode: Mode,
        /// number of concurrent lookups
        #[clap(long, default_value = "4")]
        workers: usize,
    },
    /// Compute the per-channel mean and std of all frames
    Stats {
        /// dataset root directory
        data_dir: PathBuf,
        /// output report file
        output_file: PathBuf,
    },
    /// Extract the ordered class list from action annotation files
    Classes {
        /// output class file
        #[clap(long)]
        output_file: Option<PathBuf>,
        /// annotation CSV files with action_id and action_name columns
        #[clap(required = true)]
        csv_files: Vec<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    if env::var_os("RUST_LOG").is_none() {
        env::set_var("RUST_LOG", "info");
    }
    pretty_env_logger::init();

    match Opts::parse() {
        Opts::Inspect { config_file, mode } => {
            inspect(config_file, mode)?;
        }
        Opts::Sample {
            config_file,
            mode,
            index,
            output_dir,
        } => {
            sample(config_file, mode, index, output_dir)?;
        }
        Opts::Iterate {
            config_file,
            mode,
            workers,
        } => {
            iterate(config_file, mode, workers).await?;
        }
        Opts::Stats {
            data_dir,
            output_file,
        } => {
            compute_stats(data_dir, output_file).await?;
        }
        Opts::Classes {
            output_file,
            csv_files,
        } => {
            classes(output_file, csv_files)?;
        }
    }

    Ok(())
}

fn load_dataset(config_file: impl AsRef<Path>, mode: Mode) -> Result<MeccanoDataset> {
    let config_file = config_file.as_ref();
    let config = Config::open(config_file)
        .with_context(|| format!("failed to load config file '{}'", config_file.display()))?;
    let dataset = MeccanoDataset::new(&config.data, mode)
        .with_context(|| format!("failed to construct the {} dataset", mode))?;
    Ok(dataset)
}

fn inspect(config_file: impl AsRef<Path>, mode: Mode) -> Result<()> {
    let dataset = load_dataset(config_file, mode)?;
    let catalog = dataset.catalog();
    let classes = dataset.classes();

    println!(
        "{} clips in '{}'",
        catalog.len(),
        catalog.manifest().display()
    );

    let mut table = Table::new();
    table.add_row(row!["label", "class", "clips"]);

    catalog
        .label_histogram()
        .into_iter()
        .for_each(|(label, count)| {
            let name = classes
                .and_then(|classes| classes.name(label))
                .unwrap_or("-");
            table.add_row(row![label, name, count]);
        });

    table.printstd();
    Ok(())
}

fn sample(
    config_file: impl AsRef<Path>,
    mode: Mode,
    index: usize,
    output_dir: impl AsRef<Path>,
) -> Result<()> {
    let output_dir = output_dir.as_ref();
    let dataset = load_dataset(config_file, mode)?;
    let record = dataset
        .catalog()
        .get(index)
        .ok_or_else(|| format_err!("index {} is out of range", index))?
        .clone();

    let sample = dataset
        .get(index)
        .with_context(|| format!("failed to load clip {}", index))?;
    let (_channels, num_frames, _height, _width) = sample.frames.size4()?;

    std::fs::create_dir_all(output_dir)?;

    for frame in 0..num_frames {
        let image = (sample.frames.select(1, frame) * 255.0).to_kind(Kind::Uint8);
        let path = output_dir.join(format!("{:05}.png", frame));
        vision::image::save(&image, &path)
            .with_context(|| format!("failed to save '{}'", path.display()))?;
    }

    let class_name = dataset
        .classes()
        .and_then(|classes| classes.name(sample.label))
        .unwrap_or("-");
    info!(
        "saved {} frames of '{}' [{}, {}] with label {} ({}) to '{}'",
        num_frames,
        record.location.display(),
        record.frame_start,
        record.frame_end,
        sample.label,
        class_name,
        output_dir.display()
    );

    Ok(())
}

async fn iterate(config_file: impl AsRef<Path>, mode: Mode, workers: usize) -> Result<()> {
    ensure!(workers > 0, "workers must be positive");

    let dataset = load_dataset(config_file, mode)?;
    let num_records = dataset.num_records();
    let since = Instant::now();

    let failures: Vec<_> = stream::iter(0..num_records)
        .map(|index| {
            let future = dataset.nth(index);
            async move { (index, future.await) }
        })
        .buffer_unordered(workers)
        .filter_map(|(index, result)| async move {
            let err = result.err()?;
            warn!("clip {} failed: {}", index, err);
            Some(index)
        })
        .collect()
        .await;

    let elapsed = since.elapsed();
    info!(
        "loaded {} of {} clips in {:.2?} ({:.2} clips/s)",
        num_records - failures.len(),
        num_records,
        elapsed,
        num_records as f64 / elapsed.as_secs_f64().max(f64::EPSILON)
    );

    ensure!(
        failures.is_empty(),
        "{} clip(s) failed to load",
        failures.len()
    );
    Ok(())
}

async fn compute_stats(data_dir: PathBuf, output_file: PathBuf) -> Result<()> {
    ensure!(
        data_dir.is_dir(),
        "path '{}' does not exist",
        data_dir.display()
    );

    info!("calculating mean and standard deviation");
    let stats = {
        let data_dir = data_dir.clone();
        tokio::task::spawn_blocking(move || stats::dataset_channel_stats(data_dir)).await??
    };

    println!("Mean: {:?}", stats.mean);
    println!("Std: {:?}", stats.std);
    if stats.num_skipped > 0 {
        warn!("{} image(s) were skipped", stats.num_skipped);
    }

    stats.write(&output_file)?;
    info!("statistics saved to '{}'", output_file.display());
    Ok(())
}

fn classes(output_file: Option<PathBuf>, csv_files: Vec<PathBuf>) -> Result<()> {
    let classes = ClassVocabulary::from_action_csvs(&csv_files)?;
    print!("{}", classes.to_lines());

    if let Some(output_file) = output_file {
        classes.write(&output_file)?;
        info!("class list saved to '{}'", output_file.display());
    }

    Ok(())
}
