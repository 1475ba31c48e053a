use std::io::Write;

use byte_unit::Byte;
use clap::Parser;
use journalfs::{
    block_store::ImageFile,
    cli_interface::{ImageArgs, JournalFsCli},
    Volume, BLOCK_SIZE,
};

/// a CLI interface to users to create our filesystem,
/// or to run one operation on an existing image.
///
/// Every subcommand but `mkfs` mounts the image first, which replays
/// whatever an earlier interrupted run left in the journal.
fn main() -> anyhow::Result<()> {
    env_logger::builder().format_timestamp_nanos().init();
    let args = JournalFsCli::parse();
    match args {
        JournalFsCli::Mkfs(args) => {
            //create a new file system
            journalfs::mkfs::mkfs(&args.image.image_file_path, args.size)?;
            println!(
                "formatted {} ({})",
                args.image.image_file_path,
                Byte::from_bytes(args.size as _).get_appropriate_unit(true)
            );
        }
        JournalFsCli::Create(args) => {
            let mut volume = open(&args.image)?;
            let content = match (args.content, args.input) {
                (Some(content), _) => content.into_bytes(),
                (None, Some(path)) => std::fs::read(path)?,
                (None, None) => anyhow::bail!("either --content or --input is required"),
            };
            if args.inject_fault {
                volume.create_with_fault(&args.name, &content)?;
            } else {
                volume.create(&args.name, &content)?;
            }
            println!("created {} ({} bytes)", args.name, content.len());
        }
        JournalFsCli::Read(args) => {
            let volume = open(&args.image)?;
            let content = volume.read(&args.name)?;
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(&content)?;
            stdout.flush()?;
        }
        JournalFsCli::Delete(args) => {
            let mut volume = open(&args.image)?;
            volume.delete(&args.name)?;
            println!("deleted {}", args.name);
        }
        JournalFsCli::Optimize(args) => {
            let mut volume = open(&args)?;
            let report = volume.optimize()?;
            println!(
                "moved {} files, last used block {} -> {}",
                report.files, report.last_block_before, report.last_block_after
            );
        }
        JournalFsCli::Inspect(args) => {
            let volume = open(&args.image)?;
            println!("{}", volume.inspect(args.block)?);
        }
        JournalFsCli::Info(args) => {
            let volume = open(&args)?;
            let superblock = volume.superblock();
            println!("magic:            {:#x}", superblock.magic);
            println!(
                "size:             {} blocks of {BLOCK_SIZE} bytes ({})",
                superblock.total_blocks,
                Byte::from_bytes((superblock.total_blocks as u64 * BLOCK_SIZE as u64) as _)
                    .get_appropriate_unit(true)
            );
            println!(
                "files:            {}/{}",
                volume.inode_table().used_count(),
                superblock.inode_count
            );
            println!("free blocks:      {}", superblock.free_blocks_count);
            println!("unused blocks:    {}", volume.space_map().free_count());
            println!("last used block:  {}", volume.space_map().last_used());
            println!("created at:       {}s", superblock.created_at.sec);
            if let Some(mounted) = &superblock.last_mounted_at {
                println!("last mounted at:  {}s", mounted.sec);
            }
        }
        JournalFsCli::Map(args) => {
            let volume = open(&args.image)?;
            let map = volume.space_map().render();
            match args.output {
                Some(path) => std::fs::write(path, map)?,
                None => println!("{map}"),
            }
        }
        JournalFsCli::Ls(args) => {
            let volume = open(&args)?;
            for entry in volume.list() {
                println!(
                    "{:>3} {:<31} {:>6} extents={} {:?}",
                    entry.slot, entry.name, entry.size, entry.extents, entry.blocks
                );
            }
        }
        JournalFsCli::Frag(args) => {
            let volume = open(&args)?;
            let report = volume.fragmentation();
            println!("{report}");
            println!(
                "{} of {} files fragmented",
                report.fragmented_files(),
                report.files.len()
            );
        }
    }
    Ok(())
}

/// mount the image, telling the user when recovery had to act
fn open(args: &ImageArgs) -> anyhow::Result<Volume<ImageFile>> {
    let volume = journalfs::mount::mount(&args.image_file_path)?;
    if !volume.recovery().is_clean() {
        println!("recovered from a crash: {}", volume.recovery());
    }
    Ok(volume)
}
