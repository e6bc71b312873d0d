/*
 * Interactive Shell
 * =================
 *
 * Line-oriented command dispatcher over the filesystem engine. Commands
 * mirror the traditional inspection/mutation surface:
 *
 *   set N      select active partition
 *   sec N      hex dump of one sector
 *   mbr        parsed partition table
 *   bpb        parsed BIOS parameter block of the active partition
 *   fat        volume geometry summary
 *   nonempty   sector indices with any nonzero byte
 *   cwd        current directory descriptor
 *   ls         list the current directory (directories colorized)
 *   cd P       change directory
 *   mkdir P    create a directory
 *   touch P    create an empty file
 *   rm P       unsupported (reported, never fatal)
 *
 * Every dispatch returns rendered text; errors are printed and the
 * session continues. On exit the image is flushed back to its file if
 * write mode is enabled, otherwise mutations are discarded.
 */

use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use colored::Colorize;

use crate::codec::decode_record;
use crate::config::ShellConfig;
use crate::disk::{
    Timestamp, BPB_EXT_FIELDS, BPB_FIELDS, PARTITION_FIELDS, NUM_PARTITIONS,
    PARTITION_ENTRY_SIZE, PARTITION_TABLE_OFFSET,
};
use crate::error::{FsError, Result};
use crate::fs::FileSystem;

/// Whether the session keeps running after a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Exit,
}

pub struct Shell {
    fs: FileSystem,
    config: ShellConfig,
    write_mode: bool,
    image_path: PathBuf,
}

impl Shell {
    pub fn new(fs: FileSystem, config: ShellConfig, write_mode: bool, image_path: PathBuf) -> Self {
        Shell {
            fs,
            config,
            write_mode,
            image_path,
        }
    }

    pub fn fs(&self) -> &FileSystem {
        &self.fs
    }

    /// Prompt loop over stdin. Ends on EOF or an exit command.
    pub fn run(&mut self) -> Result<()> {
        let stdin = io::stdin();
        let mut stdout = io::stdout();

        loop {
            write!(stdout, "{} ", self.config.prompt)?;
            stdout.flush()?;

            let mut line = String::new();
            if stdin.lock().read_line(&mut line)? == 0 {
                break;
            }

            match self.execute(line.trim()) {
                Ok((output, flow)) => {
                    if !output.is_empty() {
                        println!("{}", output);
                    }
                    if flow == Flow::Exit {
                        break;
                    }
                }
                Err(err) => println!("{}", err),
            }
        }

        if self.write_mode {
            self.fs.flush_to(&self.image_path)?;
        } else {
            log::info!("write mode disabled; discarding changes");
        }
        Ok(())
    }

    /// Runs one command line and returns its rendered output.
    pub fn execute(&mut self, line: &str) -> Result<(String, Flow)> {
        let mut tokens = line.split_whitespace();
        let command = match tokens.next() {
            Some(command) => command,
            None => return Ok((String::new(), Flow::Continue)),
        };
        let arg = tokens.next();

        let output = match (command, arg) {
            ("set", Some(index)) => {
                let index: usize = index
                    .parse()
                    .map_err(|_| FsError::UnknownCommand(line.to_string()))?;
                if index >= NUM_PARTITIONS {
                    return Err(FsError::InvalidPartition(index));
                }
                self.fs.set_active(index)?;
                String::new()
            }
            ("sec", Some(index)) => {
                let index: u32 = index
                    .parse()
                    .map_err(|_| FsError::UnknownCommand(line.to_string()))?;
                hex_dump(self.fs.store().read(index)?)
            }
            ("mbr", None) => self.render_mbr(),
            ("bpb", None) => self.render_bpb()?,
            ("fat", None) => self.fs.volume()?.to_string(),
            ("nonempty", None) => format!("{:?}", self.fs.nonempty_sectors()?),
            ("cwd", None) => self.fs.cwd()?.to_string(),
            ("ls", None) => self.render_listing()?,
            ("cd", Some(path)) => {
                self.fs.chdir(path)?;
                String::new()
            }
            ("mkdir", Some(path)) => {
                self.fs.mkdir(path, &Timestamp::now())?;
                String::new()
            }
            ("touch", Some(path)) => {
                self.fs.touch(path, &Timestamp::now())?;
                String::new()
            }
            ("rm", Some(path)) => {
                log::warn!("rm {}: unlink is not supported", path);
                format!("rm: {}: unlink is not supported", path)
            }
            ("help", None) => HELP.to_string(),
            ("exit", None) | ("quit", None) => return Ok((String::new(), Flow::Exit)),
            _ => return Err(FsError::UnknownCommand(line.to_string())),
        };

        Ok((output, Flow::Continue))
    }

    fn render_mbr(&self) -> String {
        let mbr = self.fs.mbr();
        let raw = mbr.to_bytes();
        let mut out = String::new();

        for index in 0..NUM_PARTITIONS {
            let offset = PARTITION_TABLE_OFFSET + index * PARTITION_ENTRY_SIZE;
            let record = &raw[offset..offset + PARTITION_ENTRY_SIZE];
            out.push_str(&format!("partition {}:\n", index));
            for (name, value) in decode_record(&PARTITION_FIELDS, record) {
                out.push_str(&format!("  {}: {}\n", name, value));
            }
        }
        out.push_str(&format!(
            "signature: {:02x}{:02x}",
            mbr.signature[0], mbr.signature[1]
        ));
        out
    }

    fn render_bpb(&self) -> Result<String> {
        let volume = self.fs.volume()?;
        let sector = self.fs.store().read(volume.partition.sector)?;

        let mut out = String::new();
        for (name, value) in decode_record(&BPB_FIELDS, sector) {
            out.push_str(&format!("{}: {}\n", name, value));
        }
        for (name, value) in decode_record(&BPB_EXT_FIELDS, sector) {
            out.push_str(&format!("{}: {}\n", name, value));
        }
        out.pop();
        Ok(out)
    }

    fn render_listing(&self) -> Result<String> {
        let names: Vec<String> = self
            .fs
            .readdir_cwd()?
            .iter()
            .map(|info| {
                if info.is_directory() && self.config.color {
                    info.display_name().blue().to_string()
                } else {
                    info.display_name()
                }
            })
            .collect();
        Ok(names.join("  "))
    }
}

const HELP: &str = "\
set N     select active partition (0-3)
sec N     hex dump of sector N
mbr       show the partition table
bpb       show the BIOS parameter block
fat       show the volume summary
nonempty  list sectors with nonzero bytes
cwd       show the current directory descriptor
ls        list the current directory
cd P      change directory
mkdir P   create a directory
touch P   create an empty file
rm P      unsupported
exit      leave the shell";

/// Renders a sector as rows of 16 hex bytes with leading offsets.
fn hex_dump(data: &[u8]) -> String {
    let mut out = String::new();
    for (row, chunk) in data.chunks(16).enumerate() {
        out.push_str(&format!("{:04x}:", row * 16));
        for byte in chunk {
            out.push_str(&format!(" {:02x}", byte));
        }
        out.push('\n');
    }
    out.pop();
    out
}
