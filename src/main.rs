use clap::Parser;
use inodefs::{block_store::ImageFile, cli_interface::InodeFsCli};
/// a CLI interface to users to create a filesystem image,
/// or dump the metadata of an existing one.
///
/// set `RUST_LOG` to see what the filesystem is doing.
fn main() -> anyhow::Result<()> {
    env_logger::builder().format_timestamp_nanos().init();
    let args = InodeFsCli::parse();
    match args {
        InodeFsCli::Format(args) => {
            let superblock = inodefs::mkfs::mkfs(&args.image_file_path, args.blocks)?;
            println!(
                "formatted {}: {} blocks, {} inodes",
                args.image_file_path, superblock.blocks, superblock.inodes
            );
        }
        InodeFsCli::Debug(args) => {
            let mut image = ImageFile::open_existing(&args.image_file_path)?;
            let report = inodefs::debug_report(&mut image)?;
            print!("{report}");
            image.close()?;
        }
    }
    Ok(())
}
