use crate::types::IntegerWidth;
use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Config file to use instead of the platform default
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Cluster samples by SNP distance and reconcile identifiers with a previous run
    Cluster {
        /// Newick tree (plain or compressed)
        tree: PathBuf,

        /// Output directory; created if missing, existing artifacts are never overwritten
        #[arg(short = 'o', long = "outdir")]
        outdir: PathBuf,

        /// Newline-delimited samples to cluster (default: every leaf of the tree)
        #[arg(short = 's', long)]
        samples: Option<PathBuf>,

        /// Membership table from the previous run
        #[arg(short = 'p', long)]
        previous: Option<PathBuf>,

        /// Retired identifiers, appended to in place (default: carried forward from the
        /// previous table's directory into <outdir>/denylist.txt)
        #[arg(long)]
        denylist: Option<PathBuf>,

        /// Matrix cell width
        #[arg(long, value_enum)]
        width: Option<IntegerWidth>,

        /// Comma-separated, strictly decreasing thresholds (e.g. 20,10,5)
        #[arg(long, value_delimiter = ',')]
        thresholds: Option<Vec<u32>>,

        /// Cluster at the first threshold only
        #[arg(long)]
        no_subclusters: bool,

        /// Also write the matrix over every input sample
        #[arg(long)]
        whole_tree_matrix: bool,

        /// Subtree extraction program to run for each cluster
        #[arg(long)]
        extractor: Option<String>,

        /// Tree handed to the extractor (default: the input tree)
        #[arg(long)]
        extract_from: Option<PathBuf>,

        /// Minimum subtree size passed to the extractor
        #[arg(long)]
        min_subtree_size: Option<usize>,

        /// Hide progress bars
        #[arg(long)]
        no_progress: bool,
    },

    /// Write the pairwise distance matrix for a set of samples
    Matrix {
        /// Newick tree (plain or compressed)
        tree: PathBuf,

        /// Output TSV
        #[arg(short = 'o', long = "output")]
        output: PathBuf,

        /// Newline-delimited samples (default: every leaf of the tree)
        #[arg(short = 's', long)]
        samples: Option<PathBuf>,

        /// Matrix cell width
        #[arg(long, value_enum)]
        width: Option<IntegerWidth>,
    },

    /// Print the effective configuration as TOML
    ShowConfig,
}
