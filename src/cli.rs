use clap::Parser;

use crate::jobs::JobKind;
use crate::output::OutputFormat;
use crate::tally::SortOrder;
use crate::useragent::Category;

// CLI structure - contains all command-line arguments and options
#[derive(Parser, Debug)]
#[command(name = "logtally")]
#[command(about = "Count words or browser usage in text and web access logs")]
#[command(
    long_about = "Count words or browser usage in text and web access logs\n\nJOBS:\n  wordcount   Count whitespace-separated words\n  browsers    Count user agents of combined-style access logs\n\nMODES:\n  (default)   Sequential processing - one partition\n  --parallel  Parallel processing - one partition per batch\n\nCOMMON EXAMPLES:\n  logtally wordcount notes.txt\n  logtally browsers access.log.gz --by os --sort count --top 10\n  logtally browsers --parallel -o out/ access-*.log"
)]
#[command(author = "Dirk Loss <mail@dirk-loss.de>")]
#[command(version)]
#[command(args_override_self = true)]
pub struct Cli {
    /// Counting job to run
    #[arg(value_enum)]
    pub job: JobKind,

    /// Input files (stdin if not specified, or use "-" to explicitly specify stdin)
    pub files: Vec<String>,

    /// User-agent attribute counted by the browsers job
    #[arg(long = "by", value_enum, default_value_t = Category::Browser, help_heading = "Job Options")]
    pub by: Category,

    /// Delimiter whose occurrences locate the user-agent field
    #[arg(long = "field-delimiter", default_value_t = '"', help_heading = "Job Options")]
    pub field_delimiter: char,

    /// Occurrence of the delimiter right before the user-agent field (1-based)
    #[arg(long = "field-index", default_value_t = 7, help_heading = "Job Options")]
    pub field_index: usize,

    /// Base directory for relative input and output paths
    #[arg(long = "root", help_heading = "Input Options")]
    pub root: Option<String>,

    /// Output directory (replaced if it exists). Results go to stdout if not given.
    #[arg(short = 'o', long = "output", help_heading = "Output Options")]
    pub output: Option<String>,

    /// Output format
    #[arg(
        short = 'F',
        long = "output-format",
        value_enum,
        default_value_t = OutputFormat::Tsv,
        help_heading = "Output Options"
    )]
    pub output_format: OutputFormat,

    /// Result ordering
    #[arg(long = "sort", value_enum, default_value_t = SortOrder::Key, help_heading = "Output Options")]
    pub sort: SortOrder,

    /// Only write the first N entries of the sorted result
    #[arg(long = "top", help_heading = "Output Options")]
    pub top: Option<usize>,

    /// Send every emission to the merge instead of summing per partition first
    #[arg(long = "no-combine", help_heading = "Performance Options")]
    pub no_combine: bool,

    /// Enable parallel processing (default: sequential processing).
    #[arg(long = "parallel", help_heading = "Performance Options")]
    pub parallel: bool,

    /// Disable parallel processing explicitly (default mode is sequential).
    #[arg(
        long = "no-parallel",
        help_heading = "Performance Options",
        overrides_with = "parallel"
    )]
    pub no_parallel: bool,

    /// Number of worker threads (0 = number of CPUs). More than one implies --parallel.
    #[arg(long = "threads", default_value_t = 0, help_heading = "Performance Options")]
    pub threads: usize,

    /// Records per batch in parallel mode; every batch is one partition
    #[arg(long = "batch-size", help_heading = "Performance Options")]
    pub batch_size: Option<usize>,

    #[arg(
        long = "batch-timeout",
        default_value_t = 200,
        help_heading = "Performance Options",
        help = "Flush partially full parallel batches after this idle period in milliseconds. Lower values reduce latency; higher values improve throughput."
    )]
    pub batch_timeout: u64,

    /// Print processing statistics to stderr when done
    #[arg(short = 's', long = "stats", help_heading = "Display Options")]
    pub stats: bool,

    /// Disable --stats (e.g. when set in the config file defaults)
    #[arg(long = "no-stats", help_heading = "Display Options", overrides_with = "stats")]
    pub no_stats: bool,

    /// More diagnostics on stderr (use multiple times: -v, -vv, -vvv)
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count, help_heading = "Display Options")]
    pub verbose: u8,

    /// Only report errors on stderr
    #[arg(short = 'q', long = "quiet", help_heading = "Display Options")]
    pub quiet: bool,

    /// Specify custom configuration file path
    #[arg(long = "config-file", help_heading = "Configuration Options")]
    pub config_file: Option<String>,

    /// Ignore configuration file
    #[arg(long = "ignore-config", help_heading = "Configuration Options")]
    pub ignore_config: bool,

    /// Use alias from configuration file
    #[arg(short = 'a', long = "alias", help_heading = "Configuration Options")]
    pub alias: Vec<String>,

    /// Show configuration file and exit
    #[arg(long = "show-config", help_heading = "Configuration Options")]
    pub show_config: bool,
}

impl Cli {
    /// Resolve inverted boolean flags to their actual values
    pub fn resolve_boolean_flags(&mut self) {
        if self.no_stats {
            self.stats = false;
        }
        if self.no_parallel {
            self.parallel = false;
        }
    }
}
