use anyhow::Result;
use clap::Parser;
use phylocluster_tools::cli::{Args, Commands};
use phylocluster_tools::commands;
use phylocluster_tools::commands::cluster::ClusterOptions;
use phylocluster_tools::config::Config;
use phylocluster_tools::types::ThresholdLevels;

fn main() {
    let args = Args::parse();

    env_logger::Builder::new()
        .filter_level(match args.verbose {
            0 => log::LevelFilter::Warn,
            1 => log::LevelFilter::Info,
            2 => log::LevelFilter::Debug,
            _ => log::LevelFilter::Trace,
        })
        .init();

    if let Err(e) = run(args) {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn run(args: Args) -> Result<()> {
    let config = match &args.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };

    match args.command {
        Commands::Cluster {
            tree,
            outdir,
            samples,
            previous,
            denylist,
            width,
            thresholds,
            no_subclusters,
            whole_tree_matrix,
            extractor,
            extract_from,
            min_subtree_size,
            no_progress,
        } => {
            let mut options = ClusterOptions::from_config(&config, tree, outdir)?;
            options.samples = samples;
            options.previous = previous;
            options.denylist = denylist;
            options.extract_from = extract_from;
            if let Some(width) = width {
                options.width = width;
            }
            if let Some(thresholds) = thresholds {
                options.levels = ThresholdLevels::new(thresholds)?;
            }
            if no_subclusters {
                options.subclusters = false;
            }
            if whole_tree_matrix {
                options.whole_tree_matrix = true;
            }
            if extractor.is_some() {
                options.extractor = extractor;
            }
            if let Some(size) = min_subtree_size {
                options.min_subtree_size = size;
            }
            if no_progress {
                options.show_progress = false;
            }
            commands::cluster::run(&options)
        }
        Commands::Matrix {
            tree,
            output,
            samples,
            width,
        } => commands::matrix::run(
            &tree,
            samples.as_deref(),
            &output,
            width.unwrap_or(config.integer_width),
            config.show_progress,
        ),
        Commands::ShowConfig => {
            if let Some(path) = Config::default_path() {
                println!("# default location: {}", path.display());
            }
            print!("{}", config.to_toml()?);
            Ok(())
        }
    }
}
