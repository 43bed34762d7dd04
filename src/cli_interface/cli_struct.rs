use clap::Parser;

#[derive(Parser, Debug, PartialEq)]
#[command(author, version, about, long_about)]
pub enum InodeFsCli {
    /// create a new file system image
    Format(FormatArgs),
    /// print the superblock and every valid inode of an image
    Debug(DebugArgs),
}

/// make a new fs subcommand
#[derive(clap::Args, Debug, PartialEq)]
#[command(author, version, about = "make a new file system")]
pub struct FormatArgs {
    /// the path of the file system image file
    #[clap(short = 'p', long)]
    pub image_file_path: String,
    /// the number of 4096 byte blocks in the file system
    #[clap(short, long)]
    pub blocks: u32,
}

/// dump an image subcommand
#[derive(clap::Args, Debug, PartialEq)]
#[command(author, version, about = "dump the metadata of a file system")]
pub struct DebugArgs {
    /// the path of the file system image file
    #[clap(short = 'p', long)]
    pub image_file_path: String,
}
