use anyhow::{bail, Context, Result};
use std::path::PathBuf;

use crate::cli::Cli;
use crate::extract::FieldSpec;
use crate::jobs::{JobKind, JobSpec};
use crate::output::OutputFormat;
use crate::parallel::ParallelConfig;
use crate::readers::{physical_path, resolve_path};
use crate::tally::SortOrder;

/// Main configuration struct for logtally
#[derive(Debug, Clone)]
pub struct LogtallyConfig {
    pub input: InputConfig,
    pub job: JobConfig,
    pub output: OutputConfig,
    pub performance: PerformanceConfig,
}

/// Input configuration
#[derive(Debug, Clone)]
pub struct InputConfig {
    pub files: Vec<String>,
    /// Base directory for relative input and output paths
    pub root: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct JobConfig {
    pub spec: JobSpec,
    pub combine: bool,
}

/// Output configuration
#[derive(Debug, Clone)]
pub struct OutputConfig {
    /// Output directory, already resolved against the root
    pub directory: Option<PathBuf>,
    pub format: OutputFormat,
    pub sort: SortOrder,
    pub top: Option<usize>,
    pub stats: bool,
}

/// Performance configuration
#[derive(Debug, Clone)]
pub struct PerformanceConfig {
    pub parallel: bool,
    /// 0 means the number of CPUs
    pub threads: usize,
    pub batch_size: Option<usize>,
    pub batch_timeout: u64,
}

impl LogtallyConfig {
    /// Create configuration from CLI arguments
    pub fn from_cli(cli: &Cli) -> Self {
        let root = cli.root.as_ref().map(PathBuf::from);
        let spec = match cli.job {
            JobKind::Wordcount => JobSpec::WordCount,
            JobKind::Browsers => JobSpec::Browsers {
                field: FieldSpec {
                    delimiter: cli.field_delimiter,
                    occurrence: cli.field_index,
                },
                category: cli.by,
            },
        };

        Self {
            input: InputConfig {
                files: cli.files.clone(),
                root: root.clone(),
            },
            job: JobConfig {
                spec,
                combine: !cli.no_combine,
            },
            output: OutputConfig {
                directory: cli
                    .output
                    .as_deref()
                    .map(|dir| resolve_path(dir, root.as_deref())),
                format: cli.output_format,
                sort: cli.sort,
                top: cli.top,
                stats: cli.stats,
            },
            performance: PerformanceConfig {
                // more than one thread only makes sense in parallel mode
                parallel: cli.parallel || cli.threads > 1,
                threads: cli.threads,
                batch_size: cli.batch_size,
                batch_timeout: cli.batch_timeout,
            },
        }
    }

    /// Reject combinations that cannot run. Errors here are usage errors.
    pub fn validate(&self) -> Result<()> {
        if let JobSpec::Browsers { field, .. } = &self.job.spec {
            if field.occurrence == 0 {
                bail!("--field-index must be at least 1");
            }
        }

        if self.performance.batch_size == Some(0) {
            bail!("--batch-size must be at least 1");
        }

        if self.input.files.iter().filter(|f| f.as_str() == "-").count() > 1 {
            bail!("stdin ('-') can only be given once");
        }

        if let Some(dir) = &self.output.directory {
            let output = physical_path(dir)
                .with_context(|| format!("Failed to resolve output path '{}'", dir.display()))?;
            for file in self.input.files.iter().filter(|f| f.as_str() != "-") {
                let input = resolve_path(file, self.input.root.as_deref());
                let physical = physical_path(&input)
                    .with_context(|| format!("Failed to resolve input path '{}'", input.display()))?;
                if physical.starts_with(&output) {
                    bail!(
                        "Input '{}' lies inside the output directory '{}', which is deleted before the run",
                        input.display(),
                        dir.display()
                    );
                }
            }
        }

        Ok(())
    }

    /// Number of worker threads, resolving 0 to the CPU count
    pub fn effective_threads(&self) -> usize {
        if self.performance.threads == 0 {
            num_cpus::get()
        } else {
            self.performance.threads
        }
    }

    pub fn parallel_config(&self) -> ParallelConfig {
        let defaults = ParallelConfig::default();
        ParallelConfig {
            num_workers: self.effective_threads(),
            batch_size: self.performance.batch_size.unwrap_or(defaults.batch_size),
            batch_timeout_ms: self.performance.batch_timeout,
            buffer_size: defaults.buffer_size,
        }
    }
}
