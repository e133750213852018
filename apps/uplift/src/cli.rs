use std::path::PathBuf;

use clap::Parser;

use crate::config::UpliftConfig;

#[derive(Debug, Parser)]
#[command(
    name = "uplift",
    version,
    about = "Upload files to an HTTP endpoint through a bounded queue",
    long_about = "uplift sends each file as its own multipart/form-data request.\n\n\
                  Directories are expanded recursively. Flags override the \
                  configuration file."
)]
pub struct Cli {
    /// Files or directories to upload
    #[arg(required = true)]
    pub paths: Vec<PathBuf>,

    /// Configuration file (default: ~/.config/uplift/uplift.toml)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Upload endpoint URL
    #[arg(short, long)]
    pub endpoint: Option<String>,

    /// HTTP method
    #[arg(short = 'X', long)]
    pub method: Option<String>,

    /// Maximum simultaneous uploads (0 = unbounded)
    #[arg(short = 'j', long)]
    pub max_parallel: Option<u32>,

    /// Drop finished files from the queue as soon as they complete
    #[arg(long)]
    pub auto_remove: bool,

    /// Extra request header, repeatable
    #[arg(short = 'H', long = "header", value_name = "NAME=VALUE", value_parser = parse_key_val)]
    pub headers: Vec<(String, String)>,

    /// Extra form field sent before the file, repeatable
    #[arg(short = 'F', long = "field", value_name = "NAME=VALUE", value_parser = parse_key_val)]
    pub fields: Vec<(String, String)>,

    /// Keep cookies across requests
    #[arg(long)]
    pub with_credentials: bool,

    /// Print the final report as JSON
    #[arg(long)]
    pub json: bool,
}

impl Cli {
    /// Applies flag overrides on top of the loaded configuration.
    pub fn apply(&self, config: &mut UpliftConfig) {
        if let Some(endpoint) = &self.endpoint {
            config.transport.endpoint = endpoint.clone();
        }
        if let Some(method) = &self.method {
            config.transport.method = method.to_ascii_uppercase();
        }
        if let Some(max) = self.max_parallel {
            config.queue.max_parallel_uploads = max;
        }
        if self.auto_remove {
            config.queue.auto_remove = true;
        }
        if self.with_credentials {
            config.transport.use_credentials = true;
        }
        for (name, value) in &self.headers {
            config.transport.headers.insert(name.clone(), value.clone());
        }
        for (name, value) in &self.fields {
            config.transport.extra_fields.insert(name.clone(), value.clone());
        }
        config.queue.auto_start = true;
    }
}

fn parse_key_val(s: &str) -> Result<(String, String), String> {
    let (name, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=VALUE, got `{s}`"))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(format!("empty name in `{s}`"));
    }
    Ok((name.to_string(), value.to_string()))
}
