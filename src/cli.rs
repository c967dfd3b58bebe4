use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "rezip")]
#[command(version)]
#[command(about = "A streaming ZIP rewriter", long_about = None)]
#[command(after_help = "Examples:\n  \
  rezip in.zip -o out.zip -x notes/draft.txt      drop an entry from the archive\n  \
  rezip in.zip -o out.zip -r readme.txt=new.txt   replace an entry's content\n  \
  cat in.zip | rezip - -o - > out.zip             rewrite through a pipe\n  \
  rezip -l in.zip                                 list entry names\n  \
  rezip -c out.zip a.txt=./a.txt docs/            create a new archive")]
pub struct Cli {
    /// ZIP file path, or "-" for stdin (output path in --create mode)
    #[arg(value_name = "FILE")]
    pub file: String,

    /// Entries (NAME=PATH, or NAME/ for a directory) in --create mode
    #[arg(value_name = "ENTRIES")]
    pub entries: Vec<String>,

    /// Output path, or "-" for stdout (default: stdout)
    #[arg(short = 'o', value_name = "FILE")]
    pub output: Option<String>,

    /// List entry names instead of writing an archive
    #[arg(short = 'l', long)]
    pub list: bool,

    /// Remove the named entries
    #[arg(short = 'x', long = "delete", value_name = "NAME")]
    pub delete: Vec<String>,

    /// Replace an entry's content from a file
    #[arg(short = 'r', long = "replace", value_name = "NAME=PATH")]
    pub replace: Vec<String>,

    /// Create a new archive from NAME=PATH entries
    #[arg(short = 'c', long)]
    pub create: bool,

    /// Input read size in bytes
    #[arg(long, value_name = "BYTES", default_value_t = crate::io::DEFAULT_CHUNK_SIZE)]
    pub chunk_size: usize,

    /// Suppress the pass summary
    #[arg(short = 'q')]
    pub quiet: bool,
}

impl Cli {
    pub fn reads_stdin(&self) -> bool {
        self.file == "-"
    }

    pub fn writes_stdout(&self) -> bool {
        self.output.as_deref().is_none_or(|o| o == "-")
    }
}
