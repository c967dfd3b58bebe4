//! Main entry point for the rezip CLI application.
//!
//! This binary streams a ZIP archive from a file or stdin, rewrites it
//! according to the command-line options (delete or replace entries, or
//! just list them), and writes the result to a file or stdout. It can also
//! create a new archive from scratch.

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use clap::Parser;
use std::collections::{HashMap, HashSet};
use std::path::Path;
use tokio::fs;
use tokio::io::AsyncWrite;
use tracing_subscriber::EnvFilter;

use rezip::zip::{EntrySpec, ZipWriter};
use rezip::{
    Action, ChunkSource, Cli, EntryPolicy, FileChunkSource, Outcome, PassSummary,
    StdinChunkSource, modify_zip,
};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if cli.create {
        return create_archive(&cli).await;
    }

    let mut source = open_source(&cli).await?;

    if cli.list {
        return list_entries(source.as_mut()).await;
    }

    let mut policy = RewritePolicy::from_cli(&cli).await?;
    let mut sink = open_sink(&cli).await?;
    let summary = modify_zip(source.as_mut(), &mut policy, &mut sink).await?;

    if !cli.quiet {
        print_summary(&summary);
    }
    Ok(())
}

/// Rewriting policy assembled from `-x` and `-r` options: named entries are
/// removed or get their content swapped for a file's bytes, everything else
/// passes through.
struct RewritePolicy {
    delete: HashSet<String>,
    replace: HashMap<String, Vec<u8>>,
}

impl RewritePolicy {
    async fn from_cli(cli: &Cli) -> Result<Self> {
        let mut replace = HashMap::new();
        for spec in &cli.replace {
            let (name, path) = spec
                .split_once('=')
                .with_context(|| format!("Expected NAME=PATH, got: {spec}"))?;
            let content = fs::read(path)
                .await
                .with_context(|| format!("Cannot read replacement file: {path}"))?;
            replace.insert(name.to_string(), content);
        }
        Ok(Self {
            delete: cli.delete.iter().cloned().collect(),
            replace,
        })
    }
}

#[async_trait]
impl EntryPolicy for RewritePolicy {
    fn inspect(&mut self, name: &str) -> Result<Action> {
        if self.delete.contains(name) || self.replace.contains_key(name) {
            Ok(Action::Transform)
        } else {
            Ok(Action::Keep)
        }
    }

    async fn transform(&mut self, name: &str, data: Vec<u8>) -> Result<Outcome> {
        if let Some(content) = self.replace.get(name) {
            Ok(Outcome::Replace(content.clone()))
        } else if self.delete.contains(name) {
            Ok(Outcome::Remove)
        } else {
            Ok(Outcome::Replace(data))
        }
    }
}

/// Streams the archive to a discarding sink, collecting entry names.
struct ListPolicy {
    names: Vec<String>,
}

#[async_trait]
impl EntryPolicy for ListPolicy {
    fn inspect(&mut self, name: &str) -> Result<Action> {
        self.names.push(name.to_string());
        Ok(Action::Keep)
    }
}

async fn list_entries(source: &mut dyn ChunkSource) -> Result<()> {
    let mut policy = ListPolicy { names: Vec::new() };
    let mut sink = tokio::io::sink();
    modify_zip(source, &mut policy, &mut sink).await?;
    for name in &policy.names {
        println!("{name}");
    }
    Ok(())
}

/// Build a fresh archive at `FILE` from NAME=PATH entry specs; a spec
/// ending in `/` (with no path) becomes a directory entry.
async fn create_archive(cli: &Cli) -> Result<()> {
    if cli.entries.is_empty() {
        bail!("--create needs at least one NAME=PATH entry");
    }
    let sink = open_sink_at(&cli.file).await?;
    let mut writer = ZipWriter::new(sink);
    for spec in &cli.entries {
        match spec.split_once('=') {
            Some((name, path)) => {
                let content = fs::read(path)
                    .await
                    .with_context(|| format!("Cannot read entry file: {path}"))?;
                writer.add_entry(EntrySpec::file(name, content)).await?;
            }
            None if spec.ends_with('/') => {
                writer.add_entry(EntrySpec::directory(spec.clone())).await?;
            }
            None => bail!("Expected NAME=PATH or NAME/, got: {spec}"),
        }
    }
    writer.finish().await?;
    Ok(())
}

async fn open_source(cli: &Cli) -> Result<Box<dyn ChunkSource>> {
    if cli.reads_stdin() {
        Ok(Box::new(StdinChunkSource::with_chunk_size(cli.chunk_size)))
    } else {
        let source =
            FileChunkSource::open_with_chunk_size(Path::new(&cli.file), cli.chunk_size).await?;
        Ok(Box::new(source))
    }
}

async fn open_sink(cli: &Cli) -> Result<Box<dyn AsyncWrite + Unpin + Send>> {
    if cli.writes_stdout() {
        Ok(Box::new(tokio::io::stdout()))
    } else {
        // checked by writes_stdout
        let path = cli.output.as_deref().context("Missing output path")?;
        open_sink_at(path).await
    }
}

async fn open_sink_at(path: &str) -> Result<Box<dyn AsyncWrite + Unpin + Send>> {
    if path == "-" {
        return Ok(Box::new(tokio::io::stdout()));
    }
    let file = fs::File::create(path)
        .await
        .with_context(|| format!("Cannot create output file: {path}"))?;
    Ok(Box::new(file))
}

fn print_summary(summary: &PassSummary) {
    eprintln!(
        "{} entries ({} replaced, {} removed), {} bytes written",
        summary.entries, summary.transformed, summary.removed, summary.bytes_written
    );
}
