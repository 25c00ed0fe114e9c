use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "ftp-get")]
#[command(about = "Download files from an FTP server with progress reporting")]
#[command(version)]
pub struct Cli {
    /// JSON configuration file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// FTP control port
    #[arg(short, long, global = true)]
    pub port: Option<u16>,

    /// Do not print the download percentage
    #[arg(long, global = true)]
    pub no_progress: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Download a remote file
    Get {
        /// Remote file name
        file: String,

        /// Remote directory (server root if omitted)
        #[arg(short, long, default_value = "")]
        dir: String,

        /// Local destination (defaults to the file name)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// FTP server host
        #[arg(short, long)]
        server: Option<String>,
    },

    /// Print the size of a remote file in bytes
    Size {
        /// Remote file name
        file: String,

        /// Remote directory (server root if omitted)
        #[arg(short, long, default_value = "")]
        dir: String,

        /// FTP server host
        #[arg(short, long)]
        server: Option<String>,
    },

    /// Download the monthly CNES database dump
    Cnes {
        /// Month as YYYYMM (defaults to the current month)
        #[arg(long)]
        period: Option<String>,

        /// Local destination (defaults to the file name)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}
