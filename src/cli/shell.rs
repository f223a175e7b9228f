//! Interactive command shell over a [`Studio`]

use super::render::{self, NoticeCursor};
use crate::{
    error::BgRemovalError,
    services::ImageIOService,
    studio::Studio,
};
use anyhow::{Context, Result};
use std::io::Write;
use std::path::{Path, PathBuf};
use tokio::io::{AsyncBufReadExt, BufReader};

const PROMPT: &str = "bgremove> ";

const HELP: &str = "\
Commands:
  open PATH        upload a JPEG or PNG image
  clear            forget the current image
  alpha on|off     enable or disable alpha matting
  fg N             foreground threshold (0-255)
  bg N             background threshold (0-255)
  erode N          erode size (0-40)
  remove           remove the background
  save [PATH]      save the result as PNG
  status           show the session state
  about            show the About and Tips panels
  help             show this help
  quit             leave the shell";

/// One parsed shell line
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum ShellCommand {
    Open(PathBuf),
    Clear,
    Alpha(bool),
    Foreground(u8),
    Background(u8),
    Erode(u8),
    Remove,
    Save(Option<PathBuf>),
    Status,
    About,
    Help,
    Quit,
    Empty,
}

impl ShellCommand {
    pub(crate) fn parse(line: &str) -> std::result::Result<Self, String> {
        let line = line.trim();
        let (word, rest) = match line.split_once(char::is_whitespace) {
            Some((word, rest)) => (word, rest.trim()),
            None => (line, ""),
        };

        let command = match word.to_lowercase().as_str() {
            "" => Self::Empty,
            "open" | "upload" => {
                if rest.is_empty() {
                    return Err("usage: open PATH".to_string());
                }
                Self::Open(PathBuf::from(rest))
            },
            "clear" => Self::Clear,
            "alpha" => match rest.to_lowercase().as_str() {
                "on" | "true" | "1" => Self::Alpha(true),
                "off" | "false" | "0" => Self::Alpha(false),
                _ => return Err("usage: alpha on|off".to_string()),
            },
            "fg" => Self::Foreground(parse_value("fg", rest)?),
            "bg" => Self::Background(parse_value("bg", rest)?),
            "erode" => Self::Erode(parse_value("erode", rest)?),
            "remove" | "run" => Self::Remove,
            "save" | "download" => Self::Save((!rest.is_empty()).then(|| PathBuf::from(rest))),
            "status" => Self::Status,
            "about" | "tips" => Self::About,
            "help" | "?" => Self::Help,
            "quit" | "exit" | "q" => Self::Quit,
            other => return Err(format!("unknown command '{other}', type 'help'")),
        };
        Ok(command)
    }
}

fn parse_value(name: &str, raw: &str) -> std::result::Result<u8, String> {
    raw.parse::<u8>()
        .map_err(|_| format!("usage: {name} N (N between 0 and 255)"))
}

/// Front-end state shared by one-shot and interactive runs
#[derive(Debug)]
pub(crate) struct Session {
    studio: Studio,
    cursor: NoticeCursor,
    output_dir: Option<PathBuf>,
}

impl Session {
    pub(crate) fn new(studio: Studio, output_dir: Option<PathBuf>) -> Self {
        let mut session = Self {
            studio,
            cursor: NoticeCursor::default(),
            output_dir,
        };
        session.flush_notices();
        session
    }

    pub(crate) fn studio(&self) -> &Studio {
        &self.studio
    }

    pub(crate) fn flush_notices(&mut self) {
        self.cursor.render(self.studio.notice_board());
    }

    /// Read and upload an image; failures are shown as banners
    pub(crate) async fn open(&mut self, path: &Path) -> bool {
        if !ImageIOService::is_supported_upload_path(path) {
            self.studio
                .notice_board()
                .error("Only JPG, JPEG and PNG files can be uploaded");
            self.flush_notices();
            return false;
        }
        let uploaded = match ImageIOService::read_upload(path).await {
            Ok(bytes) => self.studio.upload(&bytes).is_ok(),
            Err(e) => {
                self.studio
                    .notice_board()
                    .error(format!("Could not open the uploaded file: {e}"));
                false
            },
        };
        self.flush_notices();
        if uploaded {
            render::original_image(&self.studio);
        }
        uploaded
    }

    /// Run a removal under the spinner
    pub(crate) fn remove(&mut self) -> crate::error::Result<()> {
        let spinner = render::processing_spinner();
        let result = tokio::task::block_in_place(|| self.studio.remove_background());
        spinner.finish_and_clear();
        self.flush_notices();

        let status = result?;
        if status.is_cutout() {
            println!("Background Removed ({status})");
        } else {
            println!("Showing the original image ({status})");
        }
        Ok(())
    }

    /// Default download location: the output directory or the working directory
    pub(crate) fn default_save_path(&self) -> PathBuf {
        let file_name = &self.studio.config().download_file_name;
        match &self.output_dir {
            Some(dir) => dir.join(file_name),
            None => PathBuf::from(file_name),
        }
    }

    pub(crate) async fn save(&mut self, path: Option<PathBuf>) -> Result<PathBuf> {
        let download = self.studio.download()?;
        let path = path.unwrap_or_else(|| self.default_save_path());
        ImageIOService::save_bytes(&path, &download.bytes)
            .await
            .with_context(|| format!("Failed to save {}", path.display()))?;
        println!(
            "Download Result: {} ({}, {})",
            path.display(),
            download.mime_type,
            crate::cache::format_size(download.bytes.len() as u64)
        );
        Ok(path)
    }

    /// Apply one command; returns `false` when the shell should exit
    async fn execute(&mut self, command: ShellCommand) -> bool {
        match command {
            ShellCommand::Empty => {},
            ShellCommand::Open(path) => {
                self.open(&path).await;
            },
            ShellCommand::Clear => {
                self.studio.clear();
                println!("Image cleared");
            },
            ShellCommand::Alpha(enabled) => {
                self.studio.set_alpha_matting(enabled);
                println!("Alpha Matting: {}", if enabled { "on" } else { "off" });
            },
            ShellCommand::Foreground(value) => {
                self.studio.set_foreground_threshold(value);
                self.confirm_slider("Foreground Threshold", value);
            },
            ShellCommand::Background(value) => {
                self.studio.set_background_threshold(value);
                self.confirm_slider("Background Threshold", value);
            },
            ShellCommand::Erode(value) => match self.studio.set_erode_size(value) {
                Ok(()) => self.confirm_slider("Erode Size", value),
                Err(e) => eprintln!("{e}"),
            },
            ShellCommand::Remove => {
                if let Err(e) = self.remove() {
                    if matches!(e, BgRemovalError::NoImage) {
                        eprintln!("{e}");
                    }
                }
            },
            ShellCommand::Save(path) => {
                if let Err(e) = self.save(path).await {
                    eprintln!("{e:#}");
                }
            },
            ShellCommand::Status => render::status(&self.studio),
            ShellCommand::About => render::about(),
            ShellCommand::Help => println!("{HELP}"),
            ShellCommand::Quit => return false,
        }
        true
    }

    fn confirm_slider(&self, label: &str, value: u8) {
        if self.studio.controls().alpha_matting {
            println!("{label}: {value}");
        } else {
            println!("{label}: {value} (applies once alpha matting is on)");
        }
    }
}

/// Run the shell until `quit` or end of input
pub(crate) async fn run(mut session: Session) -> Result<()> {
    render::about();
    println!();
    println!("Type 'help' for commands.");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("{PROMPT}");
        std::io::stdout().flush().context("Failed to flush stdout")?;

        let Some(line) = lines.next_line().await.context("Failed to read command")? else {
            println!();
            break;
        };
        match ShellCommand::parse(&line) {
            Ok(command) => {
                if !session.execute(command).await {
                    break;
                }
            },
            Err(message) => eprintln!("{message}"),
        }
    }

    tracing::info!(
        removals = session.studio().cache_stats().misses,
        "Interactive session finished"
    );
    Ok(())
}
