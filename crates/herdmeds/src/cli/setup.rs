use clap::{Args, Parser, Subcommand, ValueEnum};
use herdmedsapp::model::{AnimalType, Category};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "herdmeds", bin_name = "herdmeds", version)]
#[command(about = "Keep track of livestock medicines and home remedies", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Data directory (defaults to the OS data directory)
    #[arg(long, global = true, env = "HERDMEDS_DATA", help_heading = "Options")]
    pub data_dir: Option<PathBuf>,

    /// Verbose output (debug logging on stderr)
    #[arg(short, long, global = true, help_heading = "Options")]
    pub verbose: bool,

    /// Print JSON instead of formatted text, where supported
    #[arg(long, global = true, help_heading = "Options")]
    pub json: bool,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum CategoryArg {
    Medicine,
    HomeRemedy,
}

impl From<CategoryArg> for Category {
    fn from(arg: CategoryArg) -> Self {
        match arg {
            CategoryArg::Medicine => Category::Medicine,
            CategoryArg::HomeRemedy => Category::HomeRemedy,
        }
    }
}

#[derive(Args, Debug)]
pub struct AddArgs {
    /// Name of the medicine or remedy
    pub name: String,

    /// Animal it is for (Cow, Goat, Heifer, Buffalo, Sheep)
    #[arg(short, long)]
    pub animal: AnimalType,

    /// Dosage, usage, notes
    #[arg(short, long)]
    pub details: String,

    #[arg(short, long, value_enum, default_value = "medicine")]
    pub category: CategoryArg,

    /// How to prepare it (required for home remedies)
    #[arg(short, long = "prep")]
    pub preparation_method: Option<String>,

    /// Image file to attach (repeatable)
    #[arg(short, long = "image")]
    pub images: Vec<PathBuf>,

    /// Mark as favorite
    #[arg(short, long)]
    pub favorite: bool,
}

#[derive(Args, Debug)]
pub struct EditArgs {
    /// Record id or unique prefix
    pub id: String,

    #[arg(short, long)]
    pub name: Option<String>,

    #[arg(short, long)]
    pub animal: Option<AnimalType>,

    #[arg(short, long)]
    pub details: Option<String>,

    #[arg(short, long, value_enum)]
    pub category: Option<CategoryArg>,

    #[arg(short, long = "prep", conflicts_with = "clear_prep")]
    pub preparation_method: Option<String>,

    /// Remove the preparation method
    #[arg(long)]
    pub clear_prep: bool,

    /// Attach another image (repeatable)
    #[arg(long = "add-image")]
    pub add_images: Vec<PathBuf>,

    /// Remove the image at this position, starting at 1 (repeatable)
    #[arg(long = "remove-image")]
    pub remove_images: Vec<usize>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Add a record
    Add(AddArgs),

    /// List records
    #[command(alias = "ls")]
    List {
        /// Only favorites
        #[arg(long)]
        favorites: bool,
    },

    /// Show one record in full
    Show { id: String },

    /// Change fields or images of a record
    Edit(EditArgs),

    /// Delete a record and its images
    #[command(alias = "rm")]
    Delete { id: String },

    /// Toggle favorite
    Fav { id: String },

    /// Save a backup now, regardless of when the last one was taken
    Backup,

    /// Restore records from the saved backup
    Restore {
        /// Add to the current records instead of replacing them
        #[arg(long)]
        merge: bool,
    },

    /// Export records to a file
    Export {
        /// Directory to write into
        #[arg(long, default_value = ".")]
        dir: PathBuf,

        /// Write the machine-readable backup format (importable) instead of a report
        #[arg(long)]
        snapshot: bool,
    },

    /// Import a backup file written by `export --snapshot`
    Import {
        file: PathBuf,

        /// Add to the current records instead of replacing them
        #[arg(long)]
        merge: bool,
    },

    /// Backup status
    Stats,

    /// Repair image references and remove unreferenced image files
    Doctor,

    /// Run the launch sequence: update check, restore if needed, auto backup
    Startup,
}
