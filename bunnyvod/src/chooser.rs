//! Resolution pickers.
//!
//! The negotiator only needs "which of these options", so the terminal prompt,
//! fzf and a pre-supplied index all sit behind one trait.

use std::io::{self, BufRead, Write};

use fzf_wrapped::Fzf;
use tracing::info;

use crate::error::{Error, InvalidChoice, Result};
use crate::quality::QualityOption;

#[allow(async_fn_in_trait)]
pub trait ResolutionChooser {
    /// Returns the position of the chosen option in `options`.
    async fn choose(&self, options: &[QualityOption]) -> Result<usize>;
}

/// Parse a 1-based selection against `count` options.
pub fn parse_choice(input: &str, count: usize) -> std::result::Result<usize, InvalidChoice> {
    let choice: usize = input
        .trim()
        .parse()
        .map_err(|_| InvalidChoice::NotANumber)?;
    if (1..=count).contains(&choice) {
        Ok(choice - 1)
    } else {
        Err(InvalidChoice::OutOfRange)
    }
}

/// Print the menu and keep asking until the answer is usable. EOF cancels.
pub fn prompt_loop<R: BufRead, W: Write>(
    mut input: R,
    mut output: W,
    options: &[QualityOption],
) -> Result<usize> {
    writeln!(output, "\nAvailable video qualities:")?;
    for option in options {
        writeln!(output, "{}. {}", option.index, option)?;
    }
    loop {
        write!(output, "\nSelect quality number (1 for highest quality): ")?;
        output.flush()?;
        let mut line = String::new();
        if input.read_line(&mut line)? == 0 {
            return Err(Error::Cancelled);
        }
        match parse_choice(&line, options.len()) {
            Ok(choice) => return Ok(choice),
            Err(e) => writeln!(output, "{}", e)?,
        }
    }
}

/// Interactive stdin/stdout prompt.
pub struct TerminalChooser;

impl ResolutionChooser for TerminalChooser {
    async fn choose(&self, options: &[QualityOption]) -> Result<usize> {
        let options = options.to_vec();
        tokio::task::spawn_blocking(move || {
            prompt_loop(io::stdin().lock(), io::stdout().lock(), &options)
        })
        .await
        .map_err(|e| Error::Io(io::Error::other(e)))?
    }
}

/// Pre-supplied 1-based index, for scripted runs.
pub struct FixedChooser(pub usize);

impl ResolutionChooser for FixedChooser {
    async fn choose(&self, options: &[QualityOption]) -> Result<usize> {
        let choice = parse_choice(&self.0.to_string(), options.len()).map_err(|_| {
            Error::Config(format!(
                "quality {} is not available, pick 1 to {}",
                self.0,
                options.len()
            ))
        })?;
        info!("Using quality {}. {}", self.0, options[choice]);
        Ok(choice)
    }
}

/// Pick with the fzf fuzzy finder.
pub struct FzfChooser;

impl ResolutionChooser for FzfChooser {
    async fn choose(&self, options: &[QualityOption]) -> Result<usize> {
        let items: Vec<String> = options
            .iter()
            .map(|option| format!("{}. {}", option.index, option))
            .collect();
        let count = options.len();
        let selection = tokio::task::spawn_blocking(move || -> Result<Option<String>> {
            let mut fzf = Fzf::default();
            fzf.run()?;
            fzf.add_items(items)?;
            Ok(fzf.output())
        })
        .await
        .map_err(|e| Error::Io(io::Error::other(e)))??;

        // fzf returns nothing when the user escapes out
        let selection = selection.ok_or(Error::Cancelled)?;
        let number = selection.split('.').next().unwrap_or_default();
        parse_choice(number, count).map_err(|_| Error::Cancelled)
    }
}
