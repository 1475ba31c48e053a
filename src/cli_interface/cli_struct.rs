use byte_unit::Byte;
use clap::Parser;

/// the image file used when `-p` is not given
pub const DEFAULT_IMAGE_FILE: &str = "vdisk.bin";

#[derive(Parser, Debug, PartialEq)]
#[command(author, version, about, long_about)]
pub enum JournalFsCli {
    /// create a new file system
    Mkfs(MkfsArgs),
    /// store a file, optionally crashing halfway through
    Create(CreateArgs),
    /// print the content of a file
    Read(FileArgs),
    /// delete a file and release its blocks
    Delete(FileArgs),
    /// move every file into the lowest free blocks
    Optimize(ImageArgs),
    /// show what one block holds
    Inspect(InspectArgs),
    /// print the superblock and usage counters
    Info(ImageArgs),
    /// print the used/free map of every block
    Map(MapArgs),
    /// list the files
    Ls(ImageArgs),
    /// print how many block runs every file is split into
    Frag(ImageArgs),
}

/// the image every subcommand works on
#[derive(clap::Args, Debug, PartialEq)]
pub struct ImageArgs {
    /// the path of the file system image file
    #[clap(short = 'p', long, default_value = DEFAULT_IMAGE_FILE)]
    pub image_file_path: String,
}

///make a new fs subcommand
#[derive(clap::Args, Debug, PartialEq)]
#[command(author, version, about = "make a new file system")]
pub struct MkfsArgs {
    #[command(flatten)]
    pub image: ImageArgs,
    /// the size of the file system, such as `10MiB` or `40960`
    #[clap(short, long, default_value = "10MiB", value_parser = parse_size)]
    pub size: u64,
}

#[derive(clap::Args, Debug, PartialEq)]
#[command(group(
    clap::ArgGroup::new("source")
        .required(true)
        .args(["content", "input"]),
))]
pub struct CreateArgs {
    #[command(flatten)]
    pub image: ImageArgs,
    /// the name of the new file
    #[clap(short, long)]
    pub name: String,
    /// the content of the new file
    #[clap(short, long)]
    pub content: Option<String>,
    /// read the content of the new file from this path
    #[clap(short, long)]
    pub input: Option<String>,
    /// abort the write halfway, leaving the journal active
    #[clap(long)]
    pub inject_fault: bool,
}

#[derive(clap::Args, Debug, PartialEq)]
pub struct FileArgs {
    #[command(flatten)]
    pub image: ImageArgs,
    /// the name of the file
    #[clap(short, long)]
    pub name: String,
}

#[derive(clap::Args, Debug, PartialEq)]
pub struct InspectArgs {
    #[command(flatten)]
    pub image: ImageArgs,
    /// the index of the block
    #[clap(short, long)]
    pub block: u32,
}

#[derive(clap::Args, Debug, PartialEq)]
pub struct MapArgs {
    #[command(flatten)]
    pub image: ImageArgs,
    /// write the map to this path instead of stdout
    #[clap(short, long)]
    pub output: Option<String>,
}

/// parse a size with an optional unit, `10MiB`, `4 KB` and `4096` are all valid
fn parse_size(s: &str) -> Result<u64, String> {
    let bytes = Byte::from_str(s).map_err(|e| e.to_string())?.get_bytes();
    u64::try_from(bytes).map_err(|e| e.to_string())
}

/// test the `JournalFsCli` struct
/// test `mkfs` subcommand
#[cfg(test)]
mod mkfs_parse_args_tests {
    use super::*;
    /// test short parameter form
    #[test]
    fn test_short_parameter_form() {
        let args = JournalFsCli::parse_from(["journalfs", "mkfs", "-p", "test", "-s", "40960"]);
        assert_eq!(
            args,
            JournalFsCli::Mkfs(MkfsArgs {
                image: ImageArgs {
                    image_file_path: "test".to_string()
                },
                size: 40960,
            })
        );
    }
    /// test long parameter form
    #[test]
    fn test_long_parameter_form() {
        let image_file_path_name = concat!("--", "image-file-path");
        let args = JournalFsCli::parse_from([
            "journalfs",
            "mkfs",
            image_file_path_name,
            "test",
            "--size",
            "1MiB",
        ]);
        assert_eq!(
            args,
            JournalFsCli::Mkfs(MkfsArgs {
                image: ImageArgs {
                    image_file_path: "test".to_string()
                },
                size: 1024 * 1024,
            })
        );
    }
    #[test]
    fn test_defaults() {
        let args = JournalFsCli::parse_from(["journalfs", "mkfs"]);
        assert_eq!(
            args,
            JournalFsCli::Mkfs(MkfsArgs {
                image: ImageArgs {
                    image_file_path: DEFAULT_IMAGE_FILE.to_string()
                },
                size: 10 * 1024 * 1024,
            })
        );
    }
    #[test]
    fn test_bad_size() {
        assert!(JournalFsCli::try_parse_from(["journalfs", "mkfs", "-s", "lots"]).is_err());
    }
}
